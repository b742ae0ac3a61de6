use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use eframe::egui;
use ecu_marker::editor::ChangeSink;
use ecu_marker::logging::{default_log_level, init_logging};
use ecu_marker::render::{MarkView, MarkViewShape};
use ecu_marker::storage::{export_json, import_json, project_dirs};
use ecu_marker::{
    geometry, photo, Dialog, Editor, EditorConfig, HitTarget, LocalStore, MarkId, ModuleId,
    ModuleLibrary, PointerButton, Tool, Viewport,
};

const CONFIG_FILE: &str = "config.json";
const STAGE_MARGIN: f32 = 8.0;
const LABEL_FONT_SIZE: f32 = 13.0;

const POINT_FILL: egui::Color32 = egui::Color32::from_rgb(230, 57, 70);
const TEXT_STROKE: egui::Color32 = egui::Color32::from_rgb(255, 214, 10);
const TEXT_FILL: egui::Color32 = egui::Color32::from_rgba_premultiplied(40, 34, 2, 40);
const HANDLE_FILL: egui::Color32 = egui::Color32::from_rgb(255, 255, 255);
const DELETE_FILL: egui::Color32 = egui::Color32::from_rgb(90, 90, 90);

// ── Change sink ─────────────────────────────────────────────────────────────

/// Tracks unsaved changes and wakes the UI whenever the editor changes.
struct AppSink {
    dirty: bool,
    ctx: egui::Context,
}

impl ChangeSink for AppSink {
    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.ctx.request_repaint();
    }

    fn render_marks(&mut self) {
        self.ctx.request_repaint();
    }

    fn apply_viewport_transform(&mut self, _viewport: &Viewport) {
        self.ctx.request_repaint();
    }
}

// ── Photo texture ───────────────────────────────────────────────────────────

/// Texture for the active module's photo, keyed by its reference.
struct LoadedPhoto {
    reference: String,
    texture: Option<egui::TextureHandle>,
    size: egui::Vec2,
}

fn load_texture(ctx: &egui::Context, reference: &str) -> Result<(egui::TextureHandle, egui::Vec2)> {
    let image = photo::decode_photo(reference)?;
    let rgba = image.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let pixels = rgba.as_flat_samples();
    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
    let texture = ctx.load_texture("photo", color_image, egui::TextureOptions::LINEAR);
    Ok((texture, egui::vec2(size[0] as f32, size[1] as f32)))
}

enum MarkEditorAction {
    Save,
    Cancel,
    Delete(MarkId),
}

// ── App ─────────────────────────────────────────────────────────────────────

struct MarkerApp {
    editor: Editor<AppSink>,
    store: LocalStore,
    photo: Option<LoadedPhoto>,
    search: String,
    module_query: String,
    status: Option<String>,
}

impl MarkerApp {
    fn new(
        cc: &eframe::CreationContext<'_>,
        config: EditorConfig,
        store: LocalStore,
        library: ModuleLibrary,
    ) -> Self {
        let sink = AppSink {
            dirty: false,
            ctx: cc.egui_ctx.clone(),
        };
        Self {
            editor: Editor::new(config, library, sink),
            store,
            photo: None,
            search: String::new(),
            module_query: String::new(),
            status: None,
        }
    }

    fn save(&mut self) {
        match self.store.save(self.editor.library()) {
            Ok(()) => {
                self.editor.sink_mut().dirty = false;
                self.status = Some("Saved".into());
            }
            Err(err) => {
                log::error!("event=storage_save module=app status=error error={err:#}");
                self.status = Some(format!("Save failed: {err:#}"));
            }
        }
    }

    fn pick_photo(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg", "webp", "bmp"])
            .pick_file()
        else {
            return;
        };
        match photo::embed_photo(&path) {
            Ok(data_url) => {
                self.editor.set_active_photo(&data_url);
            }
            Err(err) => {
                log::warn!("event=photo_embed module=app status=error error={err:#}");
                self.status = Some(format!("{err:#}"));
            }
        }
    }

    fn import(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .pick_file()
        else {
            return;
        };
        let result = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read `{}`", path.display()))
            .and_then(|text| import_json(&text));
        match result {
            Ok(modules) => {
                log::info!(
                    "event=import module=app status=ok modules={}",
                    modules.len()
                );
                self.status = Some(format!("Imported {} modules", modules.len()));
                self.editor.replace_modules(modules);
            }
            Err(err) => {
                log::warn!("event=import module=app status=error error={err:#}");
                self.status = Some(format!("Import failed: {err:#}"));
            }
        }
    }

    fn export(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .set_file_name("ecu-marker-export.json")
            .save_file()
        else {
            return;
        };
        let result = export_json(self.editor.library().modules()).and_then(|json| {
            std::fs::write(&path, json).with_context(|| format!("cannot write `{}`", path.display()))
        });
        self.status = Some(match result {
            Ok(()) => format!("Exported to {}", path.display()),
            Err(err) => {
                log::warn!("event=export module=app status=error error={err:#}");
                format!("Export failed: {err:#}")
            }
        });
    }

    /// Keeps the texture in step with the active module's photo.
    fn ensure_texture(&mut self, ctx: &egui::Context) {
        let Some(module) = self.editor.active_module().filter(|module| module.has_photo()) else {
            self.photo = None;
            return;
        };
        if self
            .photo
            .as_ref()
            .is_some_and(|photo| photo.reference == module.photo)
        {
            return;
        }
        let reference = module.photo.clone();
        self.photo = Some(match load_texture(ctx, &reference) {
            Ok((texture, size)) => LoadedPhoto {
                reference,
                texture: Some(texture),
                size,
            },
            Err(err) => {
                let source = if photo::is_data_url(&reference) {
                    "embedded"
                } else {
                    "file"
                };
                log::warn!("event=photo_load module=app status=error source={source} error={err:#}");
                self.status = Some(format!("{err:#}"));
                LoadedPhoto {
                    reference,
                    texture: None,
                    size: egui::Vec2::ZERO,
                }
            }
        });
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let mut tool = self.editor.tool();
            ui.selectable_value(&mut tool, Tool::Point, "Point");
            ui.selectable_value(&mut tool, Tool::Text, "Text");
            if tool != self.editor.tool() {
                self.editor.set_tool(tool);
            }
            ui.separator();

            let search = ui.add(
                egui::TextEdit::singleline(&mut self.search)
                    .hint_text("Search marks")
                    .desired_width(180.0),
            );
            if search.changed() {
                self.editor.set_search(&self.search);
            }
            ui.separator();

            let has_module = self.editor.active_module().is_some();
            if ui
                .add_enabled(has_module, egui::Button::new("Photo…"))
                .clicked()
            {
                self.pick_photo();
            }
            if ui.button("Import…").clicked() {
                self.import();
            }
            if ui.button("Export…").clicked() {
                self.export();
            }
            let dirty = self.editor.sink().dirty;
            if ui.add_enabled(dirty, egui::Button::new("Save")).clicked() {
                self.save();
            }
            ui.separator();
            ui.label(format!("Zoom: {:.0}%", self.editor.viewport().scale * 100.0));
            if let Some(status) = &self.status {
                ui.separator();
                ui.label(status);
            }
        });
    }

    fn module_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Modules");
        ui.add(egui::TextEdit::singleline(&mut self.module_query).hint_text("Filter"));
        ui.horizontal(|ui| {
            if ui.button("New").clicked() {
                self.editor.create_module();
            }
            let has_module = self.editor.active_module().is_some();
            if ui
                .add_enabled(has_module, egui::Button::new("Delete"))
                .clicked()
            {
                self.editor.request_delete_module();
            }
        });
        ui.separator();

        let current = self.editor.library().current_id().cloned();
        let entries: Vec<(ModuleId, String)> = self
            .editor
            .library()
            .filtered(&self.module_query)
            .map(|module| {
                let name = if module.name.is_empty() {
                    "(unnamed)"
                } else {
                    module.name.as_str()
                };
                (module.id.clone(), format!("{name} ({})", module.marks.len()))
            })
            .collect();
        egui::ScrollArea::vertical()
            .max_height(ui.available_height() * 0.6)
            .show(ui, |ui| {
                for (id, text) in entries {
                    let selected = current.as_ref() == Some(&id);
                    if ui.selectable_label(selected, text).clicked() {
                        self.editor.select_module(&id);
                    }
                }
            });

        let Some(module) = self.editor.active_module() else {
            return;
        };
        let mut name = module.name.clone();
        let mut notes = module.notes.clone();
        ui.separator();
        ui.label("Name");
        if ui.text_edit_singleline(&mut name).changed() {
            self.editor.rename_active_module(&name);
        }
        ui.label("Notes");
        if ui.text_edit_multiline(&mut notes).changed() {
            self.editor.set_active_notes(&notes);
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let canvas_rect = response.rect;
        let painter = painter.with_clip_rect(canvas_rect);
        painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));

        let texture = self
            .photo
            .as_ref()
            .and_then(|photo| photo.texture.as_ref().map(|texture| (texture.id(), photo.size)));
        let stage_rect = texture.and_then(|(_, size)| {
            geometry::fit_image(canvas_rect.shrink(STAGE_MARGIN), size)
        });
        self.editor.set_stage(stage_rect);

        if self.editor.active_module().is_none() {
            painter.text(
                canvas_rect.center(),
                egui::Align2::CENTER_CENTER,
                "Create a module to start",
                egui::FontId::proportional(18.0),
                egui::Color32::from_gray(180),
            );
            return;
        }
        let (Some((texture_id, _)), Some(stage)) = (texture, self.editor.stage().copied()) else {
            painter.text(
                canvas_rect.center(),
                egui::Align2::CENTER_CENTER,
                "Attach a photo of the board",
                egui::FontId::proportional(18.0),
                egui::Color32::from_gray(180),
            );
            return;
        };

        painter.image(
            texture_id,
            stage.image_rect(self.editor.viewport()),
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );

        self.route_input(ctx, &response);

        let views = self.editor.mark_views();
        for view in views.iter().filter(|view| view.visible) {
            draw_mark(&painter, view);
        }

        let hovered = response
            .hover_pos()
            .map(|pos| self.editor.hit_test(pos));
        if let Some(HitTarget::Mark(id)) = hovered {
            let hover_text = views
                .iter()
                .find(|view| view.id == id)
                .and_then(|view| view.hover_text.clone());
            if let Some(text) = hover_text {
                response.on_hover_text_at_pointer(text);
            }
        }
    }

    /// Feeds raw pointer events into the editor's state machine.
    fn route_input(&mut self, ctx: &egui::Context, response: &egui::Response) {
        let canvas_rect = response.rect;
        let (events, now, scroll_y, hover_pos) = ctx.input(|i| {
            (
                i.events.clone(),
                Duration::from_secs_f64(i.time),
                i.raw_scroll_delta.y,
                i.pointer.hover_pos(),
            )
        });

        for event in events {
            match event {
                egui::Event::PointerButton {
                    pos,
                    button,
                    pressed,
                    ..
                } => {
                    let Some(button) = map_button(button) else {
                        continue;
                    };
                    if !pressed {
                        self.editor.pointer_up(pos, button, now);
                    } else if canvas_rect.contains(pos) {
                        self.editor.pointer_down(pos, button, now);
                    }
                }
                egui::Event::PointerMoved(pos) => {
                    if canvas_rect.contains(pos) {
                        self.editor.pointer_move(pos, now);
                    } else {
                        self.editor.pointer_leave(now);
                        self.editor.pointer_move(pos, now);
                    }
                }
                egui::Event::PointerGone => self.editor.pointer_leave(now),
                _ => {}
            }
        }

        if scroll_y != 0.0 {
            if let Some(pos) = hover_pos.filter(|pos| canvas_rect.contains(*pos)) {
                // egui reports wheel-up as positive.
                self.editor.wheel(pos, -scroll_y, now);
            }
        }
        if let Some(pos) = response.interact_pointer_pos() {
            if response.double_clicked() {
                self.editor.double_click(pos, now);
            } else if response.clicked() {
                self.editor.click(pos, now);
            }
        }

        self.editor.tick(now);
        if let Some(deadline) = self.editor.hold_deadline() {
            ctx.request_repaint_after(deadline.saturating_sub(now));
        }
    }

    fn dialogs(&mut self, ctx: &egui::Context) {
        match self.editor.dialog().cloned() {
            None => {}
            Some(Dialog::EditMark(form)) => self.mark_editor_window(ctx, form.is_text),
            Some(Dialog::ConfirmDeleteMark { .. }) => {
                if let Some(accepted) = confirm_window(ctx, "Delete mark?", "This mark will be removed.") {
                    self.editor.confirm(accepted);
                }
            }
            Some(Dialog::ConfirmDeleteModule { module_id }) => {
                let name = self
                    .editor
                    .library()
                    .get(&module_id)
                    .map(|module| module.name.clone())
                    .unwrap_or_default();
                let message = format!("Delete module \"{name}\" and all of its marks?");
                if let Some(accepted) = confirm_window(ctx, "Delete module?", &message) {
                    self.editor.confirm(accepted);
                }
            }
        }
    }

    fn mark_editor_window(&mut self, ctx: &egui::Context, is_text: bool) {
        let title = if is_text { "Text mark" } else { "Point mark" };
        let mut action = None;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                let Some(Dialog::EditMark(form)) = self.editor.dialog_mut() else {
                    return;
                };
                ui.label("Title");
                ui.text_edit_singleline(&mut form.title);
                ui.label("Description");
                ui.text_edit_multiline(&mut form.description);
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        action = Some(MarkEditorAction::Save);
                    }
                    if ui.button("Cancel").clicked() {
                        action = Some(MarkEditorAction::Cancel);
                    }
                    if ui.button("Delete").clicked() {
                        action = Some(MarkEditorAction::Delete(form.mark_id.clone()));
                    }
                });
            });

        match action {
            Some(MarkEditorAction::Save) => {
                self.editor.save_mark_editor();
            }
            Some(MarkEditorAction::Cancel) => self.editor.close_dialog(),
            Some(MarkEditorAction::Delete(id)) => {
                self.editor.request_delete_mark(&id);
            }
            None => {}
        }
    }
}

fn confirm_window(ctx: &egui::Context, title: &str, message: &str) -> Option<bool> {
    let mut answer = None;
    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label(message);
            ui.horizontal(|ui| {
                if ui.button("Delete").clicked() {
                    answer = Some(true);
                }
                if ui.button("Keep").clicked() {
                    answer = Some(false);
                }
            });
        });
    answer
}

fn map_button(button: egui::PointerButton) -> Option<PointerButton> {
    match button {
        egui::PointerButton::Primary => Some(PointerButton::Primary),
        egui::PointerButton::Secondary => Some(PointerButton::Secondary),
        egui::PointerButton::Middle => Some(PointerButton::Middle),
        _ => None,
    }
}

fn draw_mark(painter: &egui::Painter, view: &MarkView) {
    let label_font = egui::FontId::proportional(LABEL_FONT_SIZE);
    match &view.shape {
        MarkViewShape::Point { center, radius } => {
            painter.circle_filled(*center, *radius, POINT_FILL);
            painter.circle_stroke(*center, *radius, egui::Stroke::new(1.5, egui::Color32::WHITE));
            if !view.label.is_empty() {
                painter.text(
                    *center + egui::vec2(radius + 4.0, 0.0),
                    egui::Align2::LEFT_CENTER,
                    &view.label,
                    label_font,
                    egui::Color32::WHITE,
                );
            }
        }
        MarkViewShape::Text { rect, handles } => {
            painter.rect_filled(*rect, 2.0, TEXT_FILL);
            painter.rect_stroke(
                *rect,
                2.0,
                egui::Stroke::new(2.0, TEXT_STROKE),
                egui::StrokeKind::Middle,
            );
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                &view.label,
                label_font,
                egui::Color32::WHITE,
            );
            for (_, handle) in handles {
                painter.rect_filled(*handle, 1.0, HANDLE_FILL);
            }
        }
    }

    let control = view.delete_control;
    painter.circle_filled(control.center(), control.width() * 0.5, DELETE_FILL);
    painter.text(
        control.center(),
        egui::Align2::CENTER_CENTER,
        "×",
        egui::FontId::proportional(control.height() * 0.9),
        egui::Color32::WHITE,
    );
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for MarkerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ensure_texture(ctx);

        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::S)) {
            self.save();
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::SidePanel::left("modules")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| self.module_panel(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ui, ctx));
        self.dialogs(ctx);

        if ctx.input(|i| i.viewport().close_requested()) && self.editor.sink().dirty {
            self.save();
        }
    }
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let loaded = match project_dirs() {
        Some(dirs) => EditorConfig::try_load(&dirs.config_dir().join(CONFIG_FILE)),
        None => Ok(None),
    };
    let (config, config_error) = match loaded {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(err) => (EditorConfig::default(), Some(err)),
    };
    let _logger = init_logging(&config.log_level).or_else(|_| init_logging(default_log_level()))?;
    if let Some(err) = config_error {
        log::warn!("event=config_load module=config status=fallback error={err:#}");
    }

    let store = LocalStore::open_default()?;
    let library = store
        .load()
        .with_context(|| format!("cannot load modules from `{}`", store.dir().display()))?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_title("ECU Marker"),
        ..Default::default()
    };

    eframe::run_native(
        "ECU Marker",
        options,
        Box::new(move |cc| Ok(Box::new(MarkerApp::new(cc, config, store, library)))),
    )
    .map_err(|err| anyhow!("cannot start the window: {err}"))
}
