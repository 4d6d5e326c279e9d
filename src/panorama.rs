use crate::model::{normalize_yaw, ImageRef, SphericalCoord, PITCH_LIMIT};
use crate::viewport::{Hotspot, PanoramaRenderer, RendererEvent, ViewParams};
use eframe::egui;
use glam::Vec3;

// Tessellation of the view rectangle used to approximate the projection.
const GRID_COLS: usize = 32;
const GRID_ROWS: usize = 20;

const HOTSPOT_RADIUS: f32 = 9.0;
const HOTSPOT_HIT_SLOP: f32 = 4.0;

/// Unit vector for a spherical direction. +z looks at yaw 0, +y is up.
fn direction(pitch: f32, yaw: f32) -> Vec3 {
    let (p, y) = (pitch.to_radians(), yaw.to_radians());
    Vec3::new(p.cos() * y.sin(), p.sin(), p.cos() * y.cos())
}

/// Texture coordinate of a spherical direction on an equirectangular image.
fn equirect_uv(pitch: f32, yaw: f32) -> egui::Pos2 {
    egui::pos2((yaw + 180.0) / 360.0, (90.0 - pitch) / 180.0)
}

/// Egui renderer for one equirectangular panorama with a rectilinear camera.
#[derive(Debug)]
pub struct PanoramaView {
    image: Option<ImageRef>,
    pitch: f32,
    yaw: f32,
    hfov: f32,
    hfov_range: (f32, f32),
    hotspots: Vec<Hotspot>,
}

impl PanoramaView {
    pub fn new(min_hfov: f32, max_hfov: f32) -> Self {
        Self {
            image: None,
            pitch: 0.0,
            yaw: 0.0,
            hfov: max_hfov,
            hfov_range: (min_hfov, max_hfov),
            hotspots: Vec::new(),
        }
    }

    pub fn camera(&self) -> ViewParams {
        ViewParams {
            pitch: self.pitch,
            yaw: self.yaw,
            hfov: self.hfov,
        }
    }

    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    pub fn hotspots(&self) -> &[Hotspot] {
        &self.hotspots
    }

    /// (forward, right, up)
    fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = direction(self.pitch, self.yaw);
        let yaw = self.yaw.to_radians();
        let right = Vec3::new(yaw.cos(), 0.0, -yaw.sin());
        (forward, right, forward.cross(right))
    }

    fn focal_length(&self, rect: egui::Rect) -> f32 {
        rect.width() * 0.5 / (self.hfov.to_radians() * 0.5).tan()
    }

    /// Screen position inside `rect` to (pitch, yaw) in degrees.
    pub fn screen_to_spherical(&self, rect: egui::Rect, pos: egui::Pos2) -> (f32, f32) {
        let (forward, right, up) = self.basis();
        let offset = pos - rect.center();
        let ray = (forward * self.focal_length(rect) + right * offset.x - up * offset.y).normalize();
        (
            ray.y.clamp(-1.0, 1.0).asin().to_degrees(),
            ray.x.atan2(ray.z).to_degrees(),
        )
    }

    /// None when the point is behind the camera.
    pub fn spherical_to_screen(&self, rect: egui::Rect, at: SphericalCoord) -> Option<egui::Pos2> {
        let (forward, right, up) = self.basis();
        let d = direction(at.pitch(), at.yaw());
        let depth = d.dot(forward);
        if depth <= 1e-4 {
            return None;
        }
        let f = self.focal_length(rect) / depth;
        Some(rect.center() + egui::vec2(d.dot(right) * f, -d.dot(up) * f))
    }

    fn rotate(&mut self, rect: egui::Rect, delta: egui::Vec2) {
        let degrees_per_point = self.hfov / rect.width().max(1.0);
        self.yaw = normalize_yaw(self.yaw - delta.x * degrees_per_point);
        self.pitch = (self.pitch + delta.y * degrees_per_point).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    fn zoom(&mut self, scroll_delta: f32) {
        let factor = 1.0 - scroll_delta * 0.002;
        self.hfov = (self.hfov * factor).clamp(self.hfov_range.0, self.hfov_range.1);
    }

    fn hit_test(&self, rect: egui::Rect, pos: egui::Pos2) -> Option<usize> {
        self.hotspots.iter().rev().find_map(|hotspot| {
            let center = self.spherical_to_screen(rect, hotspot.at)?;
            ((center - pos).length() <= HOTSPOT_RADIUS + HOTSPOT_HIT_SLOP).then_some(hotspot.index)
        })
    }

    fn paint_panorama(&self, painter: &egui::Painter, rect: egui::Rect, texture: &egui::TextureHandle) {
        let mut mesh = egui::Mesh::with_texture(texture.id());
        for row in 0..GRID_ROWS {
            for col in 0..GRID_COLS {
                let base = mesh.vertices.len() as u32;
                let mut first_u = None;
                for (c, r) in [(col, row), (col + 1, row), (col + 1, row + 1), (col, row + 1)] {
                    let pos = egui::pos2(
                        rect.left() + rect.width() * c as f32 / GRID_COLS as f32,
                        rect.top() + rect.height() * r as f32 / GRID_ROWS as f32,
                    );
                    let (pitch, yaw) = self.screen_to_spherical(rect, pos);
                    let mut uv = equirect_uv(pitch, yaw);
                    // keep a cell on one side of the seam; the texture repeats
                    let u0 = *first_u.get_or_insert(uv.x);
                    if uv.x - u0 > 0.5 {
                        uv.x -= 1.0;
                    } else if u0 - uv.x > 0.5 {
                        uv.x += 1.0;
                    }
                    mesh.vertices.push(egui::epaint::Vertex {
                        pos,
                        uv,
                        color: egui::Color32::WHITE,
                    });
                }
                mesh.add_triangle(base, base + 1, base + 2);
                mesh.add_triangle(base, base + 2, base + 3);
            }
        }
        painter.add(egui::Shape::mesh(mesh));
    }

    fn paint_hotspots(&self, painter: &egui::Painter, rect: egui::Rect, hovered: Option<usize>) {
        for hotspot in &self.hotspots {
            let Some(center) = self.spherical_to_screen(rect, hotspot.at) else {
                continue;
            };
            let fill = if hovered == Some(hotspot.index) {
                egui::Color32::from_rgb(255, 170, 40)
            } else {
                egui::Color32::from_rgb(0, 120, 255)
            };
            painter.circle(
                center,
                HOTSPOT_RADIUS,
                fill,
                egui::Stroke::new(2.0, egui::Color32::WHITE),
            );
        }
    }

    /// Draws the panorama into `rect` and returns what the user did to it.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        rect: egui::Rect,
        id: egui::Id,
        texture: Option<&egui::TextureHandle>,
    ) -> Vec<RendererEvent> {
        let response = ui.interact(rect, id, egui::Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, egui::Color32::from_gray(40));

        if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.rotate(rect, response.drag_delta());
        }

        if response.hovered() {
            let scroll_delta = ui.input(|i| i.smooth_scroll_delta.y);
            if scroll_delta != 0.0 {
                self.zoom(scroll_delta);
            }
        }

        match texture {
            Some(tex) => self.paint_panorama(&painter, rect, tex),
            None => {
                painter.text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "Loading panorama…",
                    egui::FontId::proportional(16.0),
                    egui::Color32::GRAY,
                );
            }
        }

        let hovered = response
            .hover_pos()
            .and_then(|pos| self.hit_test(rect, pos));
        self.paint_hotspots(&painter, rect, hovered);

        let mut events = Vec::new();
        let pressed_at = ui.input(|i| {
            if i.pointer.primary_pressed() {
                i.pointer.press_origin()
            } else {
                None
            }
        });
        if let Some(pos) = pressed_at.filter(|pos| response.hovered() && rect.contains(*pos)) {
            match self.hit_test(rect, pos) {
                Some(index) => events.push(RendererEvent::HotspotActivated { index }),
                None => {
                    let (pitch, yaw) = self.screen_to_spherical(rect, pos);
                    events.push(RendererEvent::PointerDown { pitch, yaw });
                }
            }
        }
        events
    }
}

impl PanoramaRenderer for PanoramaView {
    fn render(&mut self, image: &ImageRef, view: ViewParams) {
        self.image = Some(image.clone());
        self.pitch = view.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.yaw = normalize_yaw(view.yaw);
        self.hfov = view.hfov.clamp(self.hfov_range.0, self.hfov_range.1);
    }

    fn place_hotspot(&mut self, hotspot: Hotspot) {
        self.hotspots.push(hotspot);
    }

    fn clear_hotspots(&mut self) {
        self.hotspots.clear();
    }
}
