use crate::config::ViewerConfig;
use crate::layout::{ComparisonLayout, PaneLayout};
use crate::model::{ImageRef, Tour};
use crate::session::ProjectSession;
use anyhow::Context;
use eframe::egui;
use std::collections::HashMap;
use std::path::Path;

const THUMBNAIL_WIDTH: u32 = 256;

enum TextureSlot {
    Ready(egui::TextureHandle),
    Failed,
}

fn load_panorama(ctx: &egui::Context, path: &Path, max_width: u32) -> anyhow::Result<egui::TextureHandle> {
    let mut img = image::open(path).with_context(|| format!("decoding {}", path.display()))?;
    if img.width() > max_width {
        let height = (u64::from(img.height()) * u64::from(max_width) / u64::from(img.width())) as u32;
        img = img.resize_exact(max_width, height.max(1), image::imageops::FilterType::Triangle);
    }
    let rgba = img.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let pixels = rgba.as_flat_samples();
    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
    Ok(ctx.load_texture(
        path.display().to_string(),
        color_image,
        egui::TextureOptions::LINEAR_REPEAT,
    ))
}

// ── App ─────────────────────────────────────────────────────────────────────

pub struct ProjectApp {
    session: ProjectSession,
    config: ViewerConfig,
    layout: ComparisonLayout,
    textures: HashMap<ImageRef, TextureSlot>,
    thumbnails: HashMap<ImageRef, TextureSlot>,
    // text of the hotspot the user opened
    disclosure: Option<String>,
}

impl ProjectApp {
    pub fn new(session: ProjectSession, config: ViewerConfig) -> Self {
        Self {
            layout: ComparisonLayout::new(&config),
            session,
            config,
            textures: HashMap::new(),
            thumbnails: HashMap::new(),
            disclosure: None,
        }
    }

    fn ensure_texture(&mut self, ctx: &egui::Context, image: &ImageRef) {
        if self.textures.contains_key(image) {
            return;
        }
        let path = self.session.store().resolve(image);
        let slot = match load_panorama(ctx, &path, self.config.max_texture_width) {
            Ok(texture) => TextureSlot::Ready(texture),
            Err(err) => {
                log::error!("{err:#}");
                TextureSlot::Failed
            }
        };
        self.textures.insert(image.clone(), slot);
    }

    /// Small copy of a panorama for the tour list, decoded once per image.
    fn thumbnail(&mut self, ctx: &egui::Context, image: &ImageRef) -> Option<egui::TextureHandle> {
        let store = self.session.store();
        let slot = self.thumbnails.entry(image.clone()).or_insert_with(|| {
            let path = store.resolve(image);
            match load_panorama(ctx, &path, THUMBNAIL_WIDTH) {
                Ok(texture) => TextureSlot::Ready(texture),
                Err(err) => {
                    log::warn!("no thumbnail: {err:#}");
                    TextureSlot::Failed
                }
            }
        });
        match slot {
            TextureSlot::Ready(texture) => Some(texture.clone()),
            TextureSlot::Failed => None,
        }
    }

    fn upload_dialog(&self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("360° images", &["jpg", "jpeg", "png", "webp"])
            .pick_file()
        {
            self.session.import_tour(path);
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading(&self.session.project().name);
            ui.separator();
            if ui.button("Upload 360° image").clicked() {
                self.upload_dialog();
            }
            if ui
                .add_enabled(!self.session.selection().is_empty(), egui::Button::new("Clear selection"))
                .clicked()
            {
                self.session.clear_selection();
            }
            if let Some(failure) = self.session.last_failure().map(str::to_owned) {
                ui.separator();
                ui.colored_label(ui.visuals().error_fg_color, failure);
                if ui.small_button("Dismiss").clicked() {
                    self.session.dismiss_failure();
                }
            }
        });
    }

    fn tour_list(&mut self, ui: &mut egui::Ui) {
        ui.heading("Tours");
        if self.session.registry().is_empty() {
            ui.label("Upload a 360° image to get started.");
            return;
        }
        let tours: Vec<Tour> = self.session.registry().tours().to_vec();
        let mut clicked = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for tour in &tours {
                let selected = self.session.selection().contains(&tour.id);
                let mut hit = false;
                if let Some(texture) = self.thumbnail(ui.ctx(), &tour.image_ref) {
                    let image = egui::Image::new(egui::load::SizedTexture::from_handle(&texture))
                        .max_width(ui.available_width())
                        .max_height(100.0)
                        .sense(egui::Sense::click());
                    hit = ui.add(image).clicked();
                }
                if ui.selectable_label(selected, &tour.name).clicked() || hit {
                    clicked = Some(tour.id.clone());
                }
                ui.add_space(6.0);
            }
        });
        if let Some(id) = clicked {
            self.session.select(id);
        }
    }

    fn draft_editor(&mut self, ctx: &egui::Context) {
        let Some(draft) = self.session.draft() else {
            return;
        };
        let tour_name = self
            .session
            .registry()
            .get(&draft.tour_id)
            .map_or_else(|| draft.tour_id.to_string(), |tour| tour.name.clone());
        let position = format!(
            "{tour_name}: pitch {:.1}°, yaw {:.1}°",
            draft.at.pitch(),
            draft.at.yaw()
        );

        let (mut save, mut discard) = (false, false);
        egui::Window::new("New comment")
            .anchor(egui::Align2::RIGHT_BOTTOM, [-16.0, -16.0])
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(position);
                if let Some(text) = self.session.annotations_mut().draft_text_mut() {
                    ui.add(
                        egui::TextEdit::multiline(text)
                            .hint_text("Enter your comment")
                            .desired_rows(4),
                    );
                }
                ui.horizontal(|ui| {
                    save = ui.button("Save Comment").clicked();
                    discard = ui.button("Discard").clicked();
                });
            });

        let (save_key, discard_key) = ctx.input(|i| {
            (
                i.modifiers.command && i.key_pressed(egui::Key::Enter),
                i.key_pressed(egui::Key::Escape),
            )
        });
        if save || save_key {
            self.session.commit_draft();
        } else if discard || discard_key {
            self.session.discard_draft();
        }
    }

    fn disclosure(&mut self, ctx: &egui::Context) {
        let Some(text) = &self.disclosure else {
            return;
        };
        let response = egui::Modal::new(egui::Id::new("hotspot-disclosure")).show(ctx, |ui| {
            ui.set_width(280.0);
            ui.label(text);
            ui.add_space(8.0);
            ui.button("OK").clicked()
        });
        if response.inner || response.should_close() {
            self.disclosure = None;
        }
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for ProjectApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.session.pump();
        self.layout
            .reconcile(self.session.selection(), self.session.registry());

        let selected: Vec<ImageRef> = self
            .session
            .selection()
            .tours()
            .iter()
            .filter_map(|id| self.session.registry().get(id))
            .map(|tour| tour.image_ref.clone())
            .collect();
        for image in &selected {
            self.ensure_texture(ctx, image);
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));

        egui::SidePanel::left("tours")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| self.tour_list(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            if PaneLayout::from_selection(self.session.selection()) == PaneLayout::Empty {
                ui.centered_and_justified(|ui| {
                    ui.label("Select up to two tours to compare them side by side.");
                });
                return;
            }
            let textures = &self.textures;
            let disclosures = self.layout.show(ui, self.session.annotations_mut(), |image| {
                match textures.get(image) {
                    Some(TextureSlot::Ready(texture)) => Some(texture.clone()),
                    Some(TextureSlot::Failed) | None => None,
                }
            });
            if let Some(text) = disclosures.into_iter().last() {
                self.disclosure = Some(text);
            }
        });

        self.draft_editor(ctx);
        self.disclosure(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.session.close();
    }
}
