use egui::{Pos2, Rect, Vec2};

use crate::config::EditorConfig;
use crate::geometry::{NormPos, Stage};
use crate::interaction::Interaction;
use crate::mark::{MarkId, ResizeHandle, Tool, TEXT_FALLBACK_LABEL};
use crate::module::{Module, ModuleId, ModuleLibrary};
use crate::render::{self, HitTarget, MarkView, SearchFilter};
use crate::store::MarkStore;
use crate::viewport::Viewport;

/// Collaborators notified by the editor after it changes state.
///
/// The editor never persists or draws anything itself.
pub trait ChangeSink {
    /// Module data changed and should eventually be flushed.
    fn mark_dirty(&mut self);
    /// Marks or their visibility changed.
    fn render_marks(&mut self);
    /// Pan or zoom changed.
    fn apply_viewport_transform(&mut self, viewport: &Viewport);
}

/// Edit buffer for a mark's title and description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkEditor {
    pub mark_id: MarkId,
    pub is_text: bool,
    pub title: String,
    pub description: String,
}

/// Modal state. While one is open the stage ignores pointer input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dialog {
    EditMark(MarkEditor),
    ConfirmDeleteMark {
        mark_id: MarkId,
        /// Editor to return to when the delete is declined.
        return_to: Option<MarkEditor>,
    },
    ConfirmDeleteModule {
        module_id: ModuleId,
    },
}

/// Application context for one editing session: the module library, the
/// view state, and the interaction state machine that mutates them.
pub struct Editor<S: ChangeSink> {
    pub(crate) config: EditorConfig,
    pub(crate) library: ModuleLibrary,
    pub(crate) viewport: Viewport,
    pub(crate) stage: Option<Stage>,
    pub(crate) tool: Tool,
    pub(crate) filter: SearchFilter,
    pub(crate) interaction: Interaction,
    pub(crate) dialog: Option<Dialog>,
    pub(crate) sink: S,
}

impl<S: ChangeSink> Editor<S> {
    pub fn new(config: EditorConfig, library: ModuleLibrary, sink: S) -> Self {
        Self {
            config,
            library,
            viewport: Viewport::identity(),
            stage: None,
            tool: Tool::Point,
            filter: SearchFilter::default(),
            interaction: Interaction::Idle,
            dialog: None,
            sink,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn library(&self) -> &ModuleLibrary {
        &self.library
    }

    pub fn active_module(&self) -> Option<&Module> {
        self.library.active_module()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn stage(&self) -> Option<&Stage> {
        self.stage.as_ref()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn filter(&self) -> &SearchFilter {
        &self.filter
    }

    pub fn set_search(&mut self, query: &str) {
        let filter = SearchFilter::new(query);
        if filter != self.filter {
            self.filter = filter;
            self.sink.render_marks();
        }
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    pub fn dialog_mut(&mut self) -> Option<&mut Dialog> {
        self.dialog.as_mut()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Records where the photo ended up on screen at scale 1.
    ///
    /// Hosts call this once the image has loaded and been laid out, and with
    /// `None` while it is loading; marks are not laid out before that.
    pub fn set_stage(&mut self, rect: Option<Rect>) {
        let stage = rect.map(Stage::new);
        if stage != self.stage {
            self.stage = stage;
            self.sink.render_marks();
        }
    }

    /// True when a photo is loaded and laid out, the precondition for
    /// placing, dragging and zooming.
    pub fn stage_ready(&self) -> bool {
        self.library
            .active_module()
            .is_some_and(Module::has_photo)
            && self.stage.is_some_and(|stage| stage.is_laid_out())
    }

    pub fn screen_to_normalized(&self, screen: Pos2) -> Option<NormPos> {
        self.stage?.to_normalized(screen, &self.viewport)
    }

    pub fn mark_views(&self) -> Vec<MarkView> {
        match (self.library.active_module(), self.stage) {
            (Some(module), Some(stage)) if module.has_photo() => {
                render::layout_marks(&module.marks, &stage, &self.viewport, &self.filter)
            }
            _ => Vec::new(),
        }
    }

    pub fn hit_test(&self, screen: Pos2) -> HitTarget {
        render::hit_test(&self.mark_views(), screen)
    }

    fn marks_mut(&mut self) -> Option<&mut MarkStore> {
        self.library.active_module_mut().map(|module| &mut module.marks)
    }

    /// Runs a mark mutation; on change the module is flagged dirty and
    /// marks are re-rendered.
    fn mutate_marks(&mut self, op: impl FnOnce(&mut MarkStore, &EditorConfig) -> bool) -> bool {
        self.apply_mark_op(true, op)
    }

    /// Mutation during a gesture: re-render now, flag dirty on release.
    pub(crate) fn mutate_marks_live(
        &mut self,
        op: impl FnOnce(&mut MarkStore, &EditorConfig) -> bool,
    ) -> bool {
        self.apply_mark_op(false, op)
    }

    fn apply_mark_op(
        &mut self,
        flag_dirty: bool,
        op: impl FnOnce(&mut MarkStore, &EditorConfig) -> bool,
    ) -> bool {
        let config = &self.config;
        let Some(marks) = self.library.active_module_mut().map(|module| &mut module.marks) else {
            return false;
        };
        let changed = op(marks, config);
        if changed {
            if flag_dirty {
                self.sink.mark_dirty();
            }
            self.sink.render_marks();
        }
        changed
    }

    /// Places a mark at an already-normalized position on the active module.
    /// New text marks open the editor straight away.
    pub fn create_mark(&mut self, pos: NormPos, tool: Tool) -> Option<MarkId> {
        let id = self.marks_mut()?.create_mark(pos, tool)?;
        self.sink.mark_dirty();
        self.sink.render_marks();
        if tool == Tool::Text {
            self.open_mark_editor(&id);
        }
        Some(id)
    }

    pub fn move_mark(&mut self, id: &MarkId, pos: NormPos) -> bool {
        self.mutate_marks(|marks, _| marks.move_mark(id, pos))
    }

    pub fn resize_mark(&mut self, id: &MarkId, handle: ResizeHandle, delta: Vec2) -> bool {
        self.mutate_marks(|marks, config| {
            marks.resize_mark(id, handle, delta, config.min_text_extent)
        })
    }

    pub fn resize_point_scale(&mut self, id: &MarkId, delta: f32) -> bool {
        self.mutate_marks(|marks, _| marks.resize_point_scale(id, delta))
    }

    pub fn set_label(&mut self, id: &MarkId, text: &str) -> bool {
        self.mutate_marks(|marks, _| marks.set_label(id, text))
    }

    pub fn set_title(&mut self, id: &MarkId, text: &str) -> bool {
        self.mutate_marks(|marks, _| marks.set_title(id, text))
    }

    pub fn set_description(&mut self, id: &MarkId, text: &str) -> bool {
        self.mutate_marks(|marks, _| marks.set_description(id, text))
    }

    /// Removes a mark immediately. User-initiated deletes go through
    /// [`Editor::request_delete_mark`] instead.
    pub fn delete_mark(&mut self, id: &MarkId) -> bool {
        self.mutate_marks(|marks, _| marks.delete_mark(id))
    }

    /// Asks for confirmation before deleting; nothing changes until
    /// [`Editor::confirm`] accepts.
    pub fn request_delete_mark(&mut self, id: &MarkId) -> bool {
        let exists = self
            .library
            .active_module()
            .is_some_and(|module| module.marks.get(id).is_some());
        if !exists {
            return false;
        }
        let return_to = match self.dialog.take() {
            Some(Dialog::EditMark(editor)) if &editor.mark_id == id => Some(editor),
            _ => None,
        };
        self.dialog = Some(Dialog::ConfirmDeleteMark {
            mark_id: id.clone(),
            return_to,
        });
        true
    }

    pub fn request_delete_module(&mut self) -> bool {
        let Some(module_id) = self.library.current_id().cloned() else {
            return false;
        };
        self.dialog = Some(Dialog::ConfirmDeleteModule { module_id });
        true
    }

    /// Resolves a pending confirmation. Declining leaves all data untouched.
    pub fn confirm(&mut self, accepted: bool) {
        match self.dialog.take() {
            Some(Dialog::ConfirmDeleteMark { mark_id, return_to }) => {
                if accepted {
                    self.delete_mark(&mark_id);
                } else {
                    self.dialog = return_to.map(Dialog::EditMark);
                }
            }
            Some(Dialog::ConfirmDeleteModule { module_id }) => {
                if accepted && self.library.remove(&module_id) {
                    self.reset_view();
                    self.sink.mark_dirty();
                    self.sink.render_marks();
                }
            }
            other => self.dialog = other,
        }
    }

    pub fn open_mark_editor(&mut self, id: &MarkId) -> bool {
        let Some(mark) = self
            .library
            .active_module()
            .and_then(|module| module.marks.get(id))
        else {
            return false;
        };
        let is_text = mark.is_text();
        let title = if is_text {
            mark.title.clone()
        } else {
            mark.label.clone()
        };
        self.dialog = Some(Dialog::EditMark(MarkEditor {
            mark_id: id.clone(),
            is_text,
            title,
            description: mark.description.clone(),
        }));
        true
    }

    /// Commits the open mark editor.
    ///
    /// Point marks use the title as their label; text marks show their
    /// title, or a fixed fallback when it is empty.
    pub fn save_mark_editor(&mut self) -> bool {
        let Some(Dialog::EditMark(editor)) = self.dialog.take() else {
            return false;
        };
        let label = if editor.is_text && editor.title.is_empty() {
            TEXT_FALLBACK_LABEL
        } else {
            editor.title.as_str()
        };
        let id = &editor.mark_id;
        self.mutate_marks(|marks, _| {
            let title = marks.set_title(id, &editor.title);
            let description = marks.set_description(id, &editor.description);
            let label = marks.set_label(id, label);
            title || description || label
        })
    }

    pub fn close_dialog(&mut self) {
        self.dialog = None;
    }

    pub fn create_module(&mut self) -> ModuleId {
        let id = self.library.create_module();
        self.reset_view();
        self.sink.mark_dirty();
        self.sink.render_marks();
        id
    }

    /// Switching modules resets pan and zoom.
    pub fn select_module(&mut self, id: &ModuleId) -> bool {
        if !self.library.select(id) {
            return false;
        }
        self.reset_view();
        self.sink.render_marks();
        true
    }

    pub fn rename_active_module(&mut self, name: &str) -> bool {
        self.update_active_module(|module| replace(&mut module.name, name))
    }

    pub fn set_active_notes(&mut self, notes: &str) -> bool {
        self.update_active_module(|module| replace(&mut module.notes, notes))
    }

    /// Attaches a photo; marks wait for the host to lay the new image out.
    pub fn set_active_photo(&mut self, photo: &str) -> bool {
        let changed = self.update_active_module(|module| replace(&mut module.photo, photo));
        if changed {
            self.reset_view();
            self.sink.render_marks();
        }
        changed
    }

    /// Replaces every module, activating the first.
    pub fn replace_modules(&mut self, modules: Vec<Module>) {
        self.library.replace_all(modules);
        self.reset_view();
        self.sink.mark_dirty();
        self.sink.render_marks();
    }

    fn update_active_module(&mut self, op: impl FnOnce(&mut Module) -> bool) -> bool {
        let changed = self.library.active_module_mut().is_some_and(op);
        if changed {
            self.sink.mark_dirty();
        }
        changed
    }

    fn reset_view(&mut self) {
        self.viewport.reset();
        self.stage = None;
        self.interaction = Interaction::Idle;
        self.dialog = None;
        self.sink.apply_viewport_transform(&self.viewport);
    }
}

fn replace(slot: &mut String, value: &str) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value.to_string();
    true
}
