//! Pointer state machine.
//!
//! Inputs are plain screen positions, buttons and monotonic timestamps, so
//! any windowing layer (or a test) can drive it. Only one gesture is active
//! at a time, which makes the editor the single writer of marks and
//! viewport.
//!
//! ```text
//! Idle --primary on stage--> PendingHold --held long enough--> (create) Idle
//!                            PendingHold --drift/release/leave--> Idle
//! Idle --secondary/middle--> Panning --release--> Idle
//! Idle --primary on mark--> DraggingMark --release--> Idle
//! Idle --primary on handle--> ResizingMark --release--> Idle
//! ```

use std::time::Duration;

use egui::{Pos2, Vec2};

use crate::editor::{ChangeSink, Editor};
use crate::mark::{MarkId, ResizeHandle, TextBox};
use crate::render::HitTarget;
use crate::viewport::ZoomDirection;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Interaction {
    Idle,
    /// Press on empty stage waiting for the hold timer.
    PendingHold { origin: Pos2, pressed_at: Duration },
    Panning,
    DraggingMark {
        id: MarkId,
        /// Pointer minus mark position at press time, so the mark does not
        /// jump under the cursor.
        grab_offset: Vec2,
        moved: bool,
    },
    ResizingMark {
        id: MarkId,
        handle: ResizeHandle,
        start_pointer: Pos2,
        start_box: TextBox,
        resized: bool,
    },
}

impl<S: ChangeSink> Editor<S> {
    pub fn pointer_down(&mut self, pos: Pos2, button: PointerButton, now: Duration) {
        self.advance_clock(now);
        if self.dialog.is_some() {
            return;
        }
        match button {
            PointerButton::Secondary | PointerButton::Middle => self.begin_pan(pos),
            PointerButton::Primary => self.primary_down(pos, now),
        }
    }

    pub fn pointer_move(&mut self, pos: Pos2, now: Duration) {
        self.advance_clock(now);
        match self.interaction.clone() {
            Interaction::Idle => {}
            Interaction::PendingHold { origin, .. } => {
                if (pos - origin).length() > self.config.hold_tolerance_px {
                    log::trace!("event=hold_cancel module=interaction status=ok reason=drift");
                    self.interaction = Interaction::Idle;
                }
            }
            Interaction::Panning => {
                if self.viewport.update_pan(pos) {
                    self.sink.apply_viewport_transform(&self.viewport);
                }
            }
            Interaction::DraggingMark {
                id,
                grab_offset,
                moved,
            } => {
                let Some(pointer) = self.screen_to_normalized(pos) else {
                    return;
                };
                let target = pointer.offset(-grab_offset);
                let changed = self.mutate_marks_live(|marks, _| marks.move_mark(&id, target));
                self.interaction = Interaction::DraggingMark {
                    id,
                    grab_offset,
                    moved: moved || changed,
                };
            }
            Interaction::ResizingMark {
                id,
                handle,
                start_pointer,
                start_box,
                resized,
            } => {
                let Some(delta) = self
                    .stage
                    .and_then(|stage| stage.delta_to_normalized(pos - start_pointer, &self.viewport))
                else {
                    return;
                };
                let changed = self.mutate_marks_live(|marks, config| {
                    marks.reshape_from(&id, start_box, handle, delta, config.min_text_extent)
                });
                self.interaction = Interaction::ResizingMark {
                    id,
                    handle,
                    start_pointer,
                    start_box,
                    resized: resized || changed,
                };
            }
        }
    }

    pub fn pointer_up(&mut self, _pos: Pos2, button: PointerButton, now: Duration) {
        self.advance_clock(now);
        let releases_gesture = match self.interaction {
            Interaction::Idle => false,
            Interaction::Panning => button != PointerButton::Primary,
            _ => button == PointerButton::Primary,
        };
        if !releases_gesture {
            return;
        }
        match std::mem::replace(&mut self.interaction, Interaction::Idle) {
            Interaction::Panning => {
                if self.viewport.end_pan() {
                    self.sink.apply_viewport_transform(&self.viewport);
                }
            }
            Interaction::DraggingMark { moved: true, id, .. } => {
                log::debug!("event=mark_drag module=interaction status=ok id={}", id);
                self.sink.mark_dirty();
            }
            Interaction::ResizingMark { resized: true, id, .. } => {
                log::debug!("event=mark_resize module=interaction status=ok id={}", id);
                self.sink.mark_dirty();
            }
            _ => {}
        }
    }

    /// Pointer left the stage. Only a pending hold is affected; drags and
    /// pans continue until release.
    pub fn pointer_leave(&mut self, now: Duration) {
        self.advance_clock(now);
        if matches!(self.interaction, Interaction::PendingHold { .. }) {
            self.interaction = Interaction::Idle;
        }
    }

    /// Fires a due hold timer when no other input arrives.
    pub fn tick(&mut self, now: Duration) {
        self.advance_clock(now);
    }

    /// When the pending hold will place a mark, for scheduling a wake-up.
    pub fn hold_deadline(&self) -> Option<Duration> {
        match self.interaction {
            Interaction::PendingHold { pressed_at, .. } => {
                Some(pressed_at + self.config.hold_duration())
            }
            _ => None,
        }
    }

    /// The host should swallow its context menu while a pan is running.
    pub fn suppress_context_menu(&self) -> bool {
        matches!(self.interaction, Interaction::Panning)
    }

    /// Wheel over a point mark resizes that mark; anywhere else it zooms.
    ///
    /// `delta_y` follows the DOM convention (negative is wheel up). Returns
    /// whether the event was consumed.
    pub fn wheel(&mut self, pos: Pos2, delta_y: f32, now: Duration) -> bool {
        self.advance_clock(now);
        if self.dialog.is_some() || !self.stage_ready() {
            return false;
        }
        let Some(direction) = ZoomDirection::from_wheel(delta_y) else {
            return false;
        };

        if let HitTarget::Mark(id) = self.hit_test(pos) {
            let is_point = self
                .active_module()
                .and_then(|module| module.marks.get(&id))
                .is_some_and(|mark| !mark.is_text());
            if is_point {
                let step = match direction {
                    ZoomDirection::In => self.config.point_size_step,
                    ZoomDirection::Out => -self.config.point_size_step,
                };
                self.resize_point_scale(&id, step);
                return true;
            }
        }

        let Some(stage) = self.stage else {
            return false;
        };
        if self.viewport.zoom_at(stage.origin_relative(pos), direction) {
            self.sink.apply_viewport_transform(&self.viewport);
        }
        true
    }

    /// Single click: opens the editor of a text mark.
    pub fn click(&mut self, pos: Pos2, now: Duration) {
        self.advance_clock(now);
        if self.dialog.is_some() {
            return;
        }
        if let HitTarget::Mark(id) = self.hit_test(pos) {
            if self.mark_is_text(&id) {
                self.open_mark_editor(&id);
            }
        }
    }

    /// Double click: opens the editor of a point mark.
    pub fn double_click(&mut self, pos: Pos2, now: Duration) {
        self.advance_clock(now);
        if self.dialog.is_some() {
            return;
        }
        if let HitTarget::Mark(id) = self.hit_test(pos) {
            if !self.mark_is_text(&id) {
                self.open_mark_editor(&id);
            }
        }
    }

    fn mark_is_text(&self, id: &MarkId) -> bool {
        self.active_module()
            .and_then(|module| module.marks.get(id))
            .is_some_and(|mark| mark.is_text())
    }

    fn begin_pan(&mut self, pos: Pos2) {
        if !matches!(
            self.interaction,
            Interaction::Idle | Interaction::PendingHold { .. }
        ) {
            return;
        }
        self.viewport.start_pan(pos);
        self.interaction = Interaction::Panning;
    }

    fn primary_down(&mut self, pos: Pos2, now: Duration) {
        if self.interaction != Interaction::Idle || !self.stage_ready() {
            return;
        }
        match self.hit_test(pos) {
            HitTarget::Stage => {
                self.interaction = Interaction::PendingHold {
                    origin: pos,
                    pressed_at: now,
                };
            }
            HitTarget::Mark(id) => {
                let Some(pointer) = self.screen_to_normalized(pos) else {
                    return;
                };
                let Some(mark) = self.active_module().and_then(|module| module.marks.get(&id))
                else {
                    return;
                };
                self.interaction = Interaction::DraggingMark {
                    grab_offset: mark.position().delta_to(pointer),
                    id,
                    moved: false,
                };
            }
            HitTarget::ResizeHandle(id, handle) => {
                let Some(start_box) = self
                    .active_module()
                    .and_then(|module| module.marks.get(&id))
                    .and_then(|mark| mark.text_box())
                else {
                    return;
                };
                self.interaction = Interaction::ResizingMark {
                    id,
                    handle,
                    start_pointer: pos,
                    start_box,
                    resized: false,
                };
            }
            HitTarget::DeleteControl(id) => {
                self.request_delete_mark(&id);
            }
        }
    }

    /// Fires the hold timer if it has come due by `now`. Placement uses the
    /// press origin; drift beyond tolerance would already have cancelled.
    fn advance_clock(&mut self, now: Duration) {
        let Interaction::PendingHold { origin, pressed_at } = self.interaction else {
            return;
        };
        if now.saturating_sub(pressed_at) < self.config.hold_duration() {
            return;
        }
        self.interaction = Interaction::Idle;
        let Some(pos) = self.screen_to_normalized(origin) else {
            return;
        };
        let tool = self.tool;
        if self.create_mark(pos, tool).is_some() {
            log::debug!("event=hold_place module=interaction status=ok tool={:?}", tool);
        }
    }
}
