use crate::annotations::AnnotationStore;
use crate::model::{ImageRef, SphericalCoord, Tour, TourId};

/// Initial camera of a freshly rendered panorama, in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewParams {
    pub pitch: f32,
    pub yaw: f32,
    pub hfov: f32,
}

/// Marker for one committed annotation. `index` is its position in the
/// tour's annotation list and is echoed back on activation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hotspot {
    pub index: usize,
    pub at: SphericalCoord,
}

impl Hotspot {
    pub fn name(&self) -> String {
        format!("comment-{}", self.index)
    }
}

/// Interaction reported by a renderer. Coordinates are raw and checked by
/// the binding before they reach the store.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RendererEvent {
    PointerDown { pitch: f32, yaw: f32 },
    HotspotActivated { index: usize },
}

pub trait PanoramaRenderer {
    fn render(&mut self, image: &ImageRef, view: ViewParams);
    fn place_hotspot(&mut self, hotspot: Hotspot);
    fn clear_hotspots(&mut self);
}

#[derive(Clone, Debug, PartialEq)]
pub enum BindingOutcome {
    DraftStarted(SphericalCoord),
    Disclose(String),
    Ignored,
}

/// Connects one renderer instance to one tour's annotations.
#[derive(Debug)]
pub struct ViewportBinding {
    tour_id: TourId,
    image: ImageRef,
    attached: bool,
    // annotations already turned into hotspots, in store order
    placed: Vec<SphericalCoord>,
}

impl ViewportBinding {
    pub fn new(tour: &Tour) -> Self {
        Self {
            tour_id: tour.id.clone(),
            image: tour.image_ref.clone(),
            attached: false,
            placed: Vec::new(),
        }
    }

    pub fn tour_id(&self) -> &TourId {
        &self.tour_id
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    /// Asks the renderer to load the panorama. Only the first call does
    /// anything; the camera then belongs to the renderer.
    pub fn attach<R: PanoramaRenderer>(&mut self, renderer: &mut R, view: ViewParams) {
        if self.attached {
            return;
        }
        renderer.render(&self.image, view);
        self.attached = true;
    }

    /// Places a hotspot for each committed annotation not shown yet. If the
    /// list changed underneath (a snapshot reordered or dropped entries) all
    /// hotspots are placed again.
    pub fn sync_hotspots<R: PanoramaRenderer>(&mut self, renderer: &mut R, store: &AnnotationStore) {
        let annotations = store.annotations_for(&self.tour_id);
        let still_prefix = self.placed.len() <= annotations.len()
            && self
                .placed
                .iter()
                .zip(annotations)
                .all(|(placed, ann)| *placed == ann.at);
        if !still_prefix {
            renderer.clear_hotspots();
            self.placed.clear();
        }
        for (index, ann) in annotations.iter().enumerate().skip(self.placed.len()) {
            renderer.place_hotspot(Hotspot { index, at: ann.at });
            self.placed.push(ann.at);
        }
    }

    pub fn handle_event(&self, event: RendererEvent, store: &mut AnnotationStore) -> BindingOutcome {
        match event {
            RendererEvent::PointerDown { pitch, yaw } => match SphericalCoord::new(pitch, yaw) {
                Ok(at) => {
                    store.begin_draft(self.tour_id.clone(), at);
                    BindingOutcome::DraftStarted(at)
                }
                Err(err) => {
                    log::warn!("ignoring pointer event on {}: {err}", self.tour_id);
                    BindingOutcome::Ignored
                }
            },
            RendererEvent::HotspotActivated { index } => {
                match store.annotations_for(&self.tour_id).get(index) {
                    Some(ann) => BindingOutcome::Disclose(ann.text.clone()),
                    None => BindingOutcome::Ignored,
                }
            }
        }
    }
}
