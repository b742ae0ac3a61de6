use egui::Vec2;
use serde::{Deserialize, Serialize};

use crate::geometry::{quantize, NormPos};
use crate::mark::{
    Mark, MarkId, MarkShape, ResizeHandle, TextBox, Tool, MAX_POINT_SIZE, MIN_POINT_SIZE,
};

/// Ordered marks of one module, in insertion order.
///
/// Every operation reports whether it changed anything so the caller can
/// decide to flag the module dirty. Unknown ids are silent no-ops.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkStore {
    marks: Vec<Mark>,
}

impl MarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Mark> {
        self.marks.iter()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn get(&self, id: &MarkId) -> Option<&Mark> {
        self.marks.iter().find(|mark| &mark.id == id)
    }

    fn get_mut(&mut self, id: &MarkId) -> Option<&mut Mark> {
        self.marks.iter_mut().find(|mark| &mark.id == id)
    }

    /// Clamps every mark onto the photo; returns how many were adjusted.
    pub fn clamp_to_photo(&mut self, min_extent: f32) -> usize {
        self.marks
            .iter_mut()
            .map(|mark| mark.clamp_to_photo(min_extent))
            .filter(|changed| *changed)
            .count()
    }

    /// Places a new mark; positions off the photo are rejected, not clamped.
    pub fn create_mark(&mut self, pos: NormPos, tool: Tool) -> Option<MarkId> {
        if !pos.is_inside_image() {
            log::debug!(
                "event=mark_create module=marks status=rejected reason=outside_image x={} y={}",
                pos.x,
                pos.y
            );
            return None;
        }
        let mark = Mark::new(tool, pos);
        let id = mark.id.clone();
        log::debug!(
            "event=mark_create module=marks status=ok id={} tool={:?} x={} y={}",
            id,
            tool,
            mark.x,
            mark.y
        );
        self.marks.push(mark);
        Some(id)
    }

    pub fn move_mark(&mut self, id: &MarkId, pos: NormPos) -> bool {
        if !pos.is_finite() {
            return false;
        }
        let Some(mark) = self.get_mut(id) else {
            return false;
        };
        let before = mark.position();
        mark.move_to(pos);
        mark.position() != before
    }

    /// Applies `delta` to the edges selected by `handle` of a text mark.
    pub fn resize_mark(
        &mut self,
        id: &MarkId,
        handle: ResizeHandle,
        delta: Vec2,
        min_extent: f32,
    ) -> bool {
        let Some(start) = self.get(id).and_then(Mark::text_box) else {
            return false;
        };
        self.reshape_from(id, start, handle, delta, min_extent)
    }

    /// Recomputes a text mark from a captured starting box, so an ongoing
    /// gesture never accumulates clamping error.
    pub fn reshape_from(
        &mut self,
        id: &MarkId,
        start: TextBox,
        handle: ResizeHandle,
        delta: Vec2,
        min_extent: f32,
    ) -> bool {
        if !delta.x.is_finite() || !delta.y.is_finite() {
            return false;
        }
        let Some(mark) = self.get_mut(id) else {
            return false;
        };
        let next = start.resized(handle, delta, min_extent);
        if mark.text_box() == Some(next) {
            return false;
        }
        mark.set_text_box(next)
    }

    /// Grows or shrinks a point mark's visual size within its limits.
    pub fn resize_point_scale(&mut self, id: &MarkId, delta: f32) -> bool {
        let Some(mark) = self.get_mut(id) else {
            return false;
        };
        let MarkShape::Point { size } = &mut mark.shape else {
            return false;
        };
        let next = quantize((*size + delta).clamp(MIN_POINT_SIZE, MAX_POINT_SIZE));
        if !next.is_finite() || next == *size {
            return false;
        }
        *size = next;
        true
    }

    pub fn set_label(&mut self, id: &MarkId, text: &str) -> bool {
        self.replace_text(id, text, |mark| &mut mark.label)
    }

    pub fn set_title(&mut self, id: &MarkId, text: &str) -> bool {
        self.replace_text(id, text, |mark| &mut mark.title)
    }

    pub fn set_description(&mut self, id: &MarkId, text: &str) -> bool {
        self.replace_text(id, text, |mark| &mut mark.description)
    }

    fn replace_text(
        &mut self,
        id: &MarkId,
        text: &str,
        field: impl FnOnce(&mut Mark) -> &mut String,
    ) -> bool {
        let Some(mark) = self.get_mut(id) else {
            return false;
        };
        let slot = field(mark);
        if *slot == text {
            return false;
        }
        *slot = text.to_string();
        true
    }

    pub fn delete_mark(&mut self, id: &MarkId) -> bool {
        let Some(index) = self.marks.iter().position(|mark| &mark.id == id) else {
            return false;
        };
        self.marks.remove(index);
        log::debug!("event=mark_delete module=marks status=ok id={}", id);
        true
    }
}
