use crate::annotations::AnnotationStore;
use crate::config::ViewerConfig;
use crate::model::{ImageRef, TourId};
use crate::panorama::PanoramaView;
use crate::registry::TourRegistry;
use crate::selection::SelectionWindow;
use crate::viewport::{BindingOutcome, ViewParams, ViewportBinding};
use eframe::egui;

const HANDLE_WIDTH: f32 = 6.0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaneLayout {
    Empty,
    Single(TourId),
    Split(TourId, TourId),
}

impl PaneLayout {
    pub fn from_selection(window: &SelectionWindow) -> Self {
        match window.tours() {
            [] => Self::Empty,
            [only] => Self::Single(only.clone()),
            [left, right, ..] => Self::Split(left.clone(), right.clone()),
        }
    }
}

/// Position of the divider between two panes. Ephemeral.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitPane {
    fraction: f32,
    min_size: f32,
}

impl SplitPane {
    pub fn new(min_size: f32) -> Self {
        Self {
            fraction: 0.5,
            min_size,
        }
    }

    pub fn fraction(&self) -> f32 {
        self.fraction
    }

    fn left_width(&self, usable: f32) -> f32 {
        let min = self.min_size.min(usable * 0.5);
        (usable * self.fraction).clamp(min, usable - min)
    }

    /// (left, handle, right)
    pub fn divide(&self, rect: egui::Rect) -> (egui::Rect, egui::Rect, egui::Rect) {
        let usable = (rect.width() - HANDLE_WIDTH).max(0.0);
        let left = egui::Rect::from_min_size(
            rect.min,
            egui::vec2(self.left_width(usable), rect.height()),
        );
        let handle = egui::Rect::from_min_size(
            egui::pos2(left.right(), rect.top()),
            egui::vec2(HANDLE_WIDTH, rect.height()),
        );
        let right = egui::Rect::from_min_max(egui::pos2(handle.right(), rect.top()), rect.max);
        (left, handle, right)
    }

    pub fn drag(&mut self, delta_x: f32, total_width: f32) {
        let usable = total_width - HANDLE_WIDTH;
        if usable <= 0.0 {
            return;
        }
        let min = self.min_size.min(usable * 0.5);
        let left = (self.left_width(usable) + delta_x).clamp(min, usable - min);
        self.fraction = left / usable;
    }
}

struct Pane {
    title: String,
    binding: ViewportBinding,
    view: PanoramaView,
}

/// Zero, one or two independently bound panorama panes, following the
/// selection window.
pub struct ComparisonLayout {
    split: SplitPane,
    panes: Vec<Pane>,
    initial_view: ViewParams,
    hfov_range: (f32, f32),
}

impl ComparisonLayout {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            split: SplitPane::new(config.split_min_size),
            panes: Vec::new(),
            initial_view: config.view_params(),
            hfov_range: (config.min_hfov, config.max_hfov),
        }
    }

    /// Keeps one pane per selected tour, in selection order. Panes of tours
    /// that stay selected keep their camera.
    pub fn reconcile(&mut self, selection: &SelectionWindow, registry: &TourRegistry) {
        let (initial_view, (min_hfov, max_hfov)) = (self.initial_view, self.hfov_range);
        let mut previous = std::mem::take(&mut self.panes);
        self.panes = selection
            .tours()
            .iter()
            .filter_map(|id| {
                if let Some(i) = previous.iter().position(|pane| pane.binding.tour_id() == id) {
                    return Some(previous.swap_remove(i));
                }
                let Some(tour) = registry.get(id) else {
                    log::warn!("selected tour {id} is not in the registry");
                    return None;
                };
                let mut pane = Pane {
                    title: tour.name.clone(),
                    binding: ViewportBinding::new(tour),
                    view: PanoramaView::new(min_hfov, max_hfov),
                };
                pane.binding.attach(&mut pane.view, initial_view);
                log::debug!("opened pane for tour {id}");
                Some(pane)
            })
            .collect();
    }

    /// Renders the panes and routes their events into `store`. Returns the
    /// texts of hotspots the user activated.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        store: &mut AnnotationStore,
        mut texture_for: impl FnMut(&ImageRef) -> Option<egui::TextureHandle>,
    ) -> Vec<String> {
        let rect = ui.available_rect_before_wrap();
        ui.allocate_rect(rect, egui::Sense::hover());

        let rects = match self.panes.len() {
            0 => return Vec::new(),
            1 => vec![rect],
            _ => {
                let (_, handle, _) = self.split.divide(rect);
                let response = ui
                    .interact(handle, ui.id().with("split-handle"), egui::Sense::drag())
                    .on_hover_cursor(egui::CursorIcon::ResizeHorizontal);
                if response.dragged() {
                    self.split.drag(response.drag_delta().x, rect.width());
                }
                let (left, handle, right) = self.split.divide(rect);
                ui.painter().rect_filled(handle, 0.0, ui.visuals().widgets.noninteractive.bg_stroke.color);
                vec![left, right]
            }
        };

        let mut disclosures = Vec::new();
        for (pane, rect) in self.panes.iter_mut().zip(rects) {
            pane.binding.sync_hotspots(&mut pane.view, store);
            let texture = texture_for(pane.binding.image());
            let id = egui::Id::new(("pane", pane.binding.tour_id().as_str()));
            let events = pane.view.show(ui, rect, id, texture.as_ref());
            ui.painter_at(rect).text(
                rect.left_top() + egui::vec2(8.0, 8.0),
                egui::Align2::LEFT_TOP,
                &pane.title,
                egui::FontId::proportional(14.0),
                egui::Color32::WHITE,
            );
            for event in events {
                match pane.binding.handle_event(event, store) {
                    BindingOutcome::Disclose(text) => disclosures.push(text),
                    BindingOutcome::DraftStarted(at) => log::debug!(
                        "draft on {} at pitch {:.1}, yaw {:.1}",
                        pane.binding.tour_id(),
                        at.pitch(),
                        at.yaw()
                    ),
                    BindingOutcome::Ignored => {}
                }
            }
        }
        disclosures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tour;
    use chrono::Utc;

    fn registry(ids: &[&str]) -> TourRegistry {
        let mut registry = TourRegistry::new();
        registry.apply_snapshot(
            ids.iter()
                .map(|id| Tour {
                    id: (*id).into(),
                    name: format!("{id}.jpg"),
                    image_ref: ImageRef::new(format!("images/{id}.jpg")),
                    created_at: Utc::now(),
                })
                .collect(),
        );
        registry
    }

    fn pane_ids(layout: &ComparisonLayout) -> Vec<&str> {
        layout.panes.iter().map(|p| p.binding.tour_id().as_str()).collect()
    }

    #[test]
    fn layout_follows_selection_size() {
        let mut window = SelectionWindow::new();
        assert_eq!(PaneLayout::from_selection(&window), PaneLayout::Empty);
        window.select("a".into());
        assert_eq!(PaneLayout::from_selection(&window), PaneLayout::Single("a".into()));
        window.select("b".into());
        assert_eq!(
            PaneLayout::from_selection(&window),
            PaneLayout::Split("a".into(), "b".into())
        );
    }

    #[test]
    fn split_defaults_to_halves() {
        let split = SplitPane::new(50.0);
        let rect = egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(406.0, 300.0));
        let (left, handle, right) = split.divide(rect);
        assert_eq!(left.width(), 200.0);
        assert_eq!(handle.width(), HANDLE_WIDTH);
        assert_eq!(right.width(), 200.0);
        assert_eq!(right.max, rect.max);
    }

    #[test]
    fn split_drag_respects_minimum_size() {
        let mut split = SplitPane::new(50.0);
        split.drag(-1000.0, 406.0);
        let rect = egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(406.0, 300.0));
        assert_eq!(split.divide(rect).0.width(), 50.0);
        split.drag(1000.0, 406.0);
        assert_eq!(split.divide(rect).2.width(), 50.0);
        split.drag(-150.0, 406.0);
        assert!((split.fraction() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn panes_follow_the_selection_window() {
        let registry = registry(&["a", "b", "c"]);
        let mut layout = ComparisonLayout::new(&ViewerConfig::default());
        let mut window = SelectionWindow::new();

        layout.reconcile(&window, &registry);
        assert!(layout.panes.is_empty());

        window.select("a".into());
        layout.reconcile(&window, &registry);
        assert_eq!(pane_ids(&layout), ["a"]);
        assert_eq!(
            layout.panes[0].view.camera(),
            ViewerConfig::default().view_params()
        );
        assert_eq!(layout.panes[0].view.image(), Some(&ImageRef::new("images/a.jpg")));

        window.select("b".into());
        window.select("c".into());
        layout.reconcile(&window, &registry);
        assert_eq!(pane_ids(&layout), ["b", "c"]);
    }

    #[test]
    fn unknown_tours_get_no_pane() {
        let registry = registry(&["a"]);
        let mut layout = ComparisonLayout::new(&ViewerConfig::default());
        let mut window = SelectionWindow::new();
        window.select("a".into());
        window.select("ghost".into());
        layout.reconcile(&window, &registry);
        assert_eq!(pane_ids(&layout), ["a"]);
    }
}
