//! Screen layout of the active module's marks.
//!
//! Views are rebuilt from the mark store and viewport whenever either
//! changes; they never own mark data. The same layout answers hit tests so
//! what the user sees is exactly what the pointer can grab.

use egui::{vec2, Pos2, Rect, Vec2};

use crate::geometry::{NormPos, Stage};
use crate::mark::{Mark, MarkId, MarkShape, ResizeHandle};
use crate::store::MarkStore;
use crate::viewport::Viewport;

pub const POINT_RADIUS_PX: f32 = 7.0;
pub const HANDLE_SIZE_PX: f32 = 10.0;
pub const DELETE_SIZE_PX: f32 = 14.0;
const POINT_HIT_SLOP_PX: f32 = 3.0;

/// Quick-search query applied to marks at render time only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchFilter {
    query: String,
}

impl SearchFilter {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.trim().to_lowercase(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.query.is_empty()
    }

    pub fn shows(&self, mark: &Mark) -> bool {
        !self.is_active() || mark.matches_query(&self.query)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MarkViewShape {
    Point { center: Pos2, radius: f32 },
    Text {
        rect: Rect,
        handles: [(ResizeHandle, Rect); 4],
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct MarkView {
    pub id: MarkId,
    pub shape: MarkViewShape,
    pub label: String,
    /// Tooltip text; the title of a text mark.
    pub hover_text: Option<String>,
    pub delete_control: Rect,
    pub visible: bool,
}

impl MarkView {
    fn body_contains(&self, pos: Pos2) -> bool {
        match &self.shape {
            MarkViewShape::Point { center, radius } => {
                (pos - *center).length() <= radius + POINT_HIT_SLOP_PX
            }
            MarkViewShape::Text { rect, .. } => rect.contains(pos),
        }
    }

    fn handle_at(&self, pos: Pos2) -> Option<ResizeHandle> {
        let MarkViewShape::Text { handles, .. } = &self.shape else {
            return None;
        };
        handles
            .iter()
            .find(|(_, rect)| rect.contains(pos))
            .map(|(handle, _)| *handle)
    }
}

/// What a pointer position lands on, topmost first.
#[derive(Clone, Debug, PartialEq)]
pub enum HitTarget {
    Stage,
    Mark(MarkId),
    ResizeHandle(MarkId, ResizeHandle),
    DeleteControl(MarkId),
}

/// Lays out every mark for drawing. Marks hidden by `filter` keep a view
/// with `visible == false` so hosts can animate or count them.
pub fn layout_marks(
    marks: &MarkStore,
    stage: &Stage,
    viewport: &Viewport,
    filter: &SearchFilter,
) -> Vec<MarkView> {
    if !stage.is_laid_out() {
        return Vec::new();
    }
    marks
        .iter()
        .map(|mark| layout_mark(mark, stage, viewport, filter.shows(mark)))
        .collect()
}

fn layout_mark(mark: &Mark, stage: &Stage, viewport: &Viewport, visible: bool) -> MarkView {
    let anchor = stage.to_screen(mark.position(), viewport);
    let (shape, delete_anchor, hover_text) = match mark.shape {
        MarkShape::Point { size } => {
            let radius = POINT_RADIUS_PX * size * viewport.scale;
            let shape = MarkViewShape::Point {
                center: anchor,
                radius,
            };
            let offset = radius + DELETE_SIZE_PX * 0.5 + POINT_HIT_SLOP_PX;
            (shape, anchor + vec2(offset, -offset), None)
        }
        MarkShape::Text { width, height } => {
            let far = stage.to_screen(
                NormPos::new(mark.x + width, mark.y + height),
                viewport,
            );
            let rect = Rect::from_min_max(anchor, far);
            let handles = ResizeHandle::ALL.map(|handle| {
                let corner = match handle {
                    ResizeHandle::Nw => rect.left_top(),
                    ResizeHandle::Ne => rect.right_top(),
                    ResizeHandle::Sw => rect.left_bottom(),
                    ResizeHandle::Se => rect.right_bottom(),
                };
                (
                    handle,
                    Rect::from_center_size(corner, Vec2::splat(HANDLE_SIZE_PX)),
                )
            });
            let hover = if mark.title.is_empty() {
                "Text mark".to_string()
            } else {
                mark.title.clone()
            };
            let delete_anchor = rect.right_top() + vec2(HANDLE_SIZE_PX, -HANDLE_SIZE_PX);
            (MarkViewShape::Text { rect, handles }, delete_anchor, Some(hover))
        }
    };

    MarkView {
        id: mark.id.clone(),
        shape,
        label: mark.display_label().to_string(),
        hover_text,
        delete_control: Rect::from_center_size(delete_anchor, Vec2::splat(DELETE_SIZE_PX)),
        visible,
    }
}

/// Finds what lies under `pos`. Later marks are drawn on top, so they win.
/// Within one mark: resize handle, then delete control, then body.
pub fn hit_test(views: &[MarkView], pos: Pos2) -> HitTarget {
    for view in views.iter().rev().filter(|view| view.visible) {
        if let Some(handle) = view.handle_at(pos) {
            return HitTarget::ResizeHandle(view.id.clone(), handle);
        }
        if view.delete_control.contains(pos) {
            return HitTarget::DeleteControl(view.id.clone());
        }
        if view.body_contains(pos) {
            return HitTarget::Mark(view.id.clone());
        }
    }
    HitTarget::Stage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mark::Tool;
    use egui::pos2;

    fn stage() -> Stage {
        Stage::new(Rect::from_min_size(Pos2::ZERO, vec2(1000.0, 500.0)))
    }

    #[test]
    fn point_view_sits_at_mark_position() {
        let mut store = MarkStore::new();
        store.create_mark(NormPos::new(0.25, 0.5), Tool::Point);
        let views = layout_marks(&store, &stage(), &Viewport::identity(), &SearchFilter::default());
        assert_eq!(
            views[0].shape,
            MarkViewShape::Point {
                center: pos2(250.0, 250.0),
                radius: POINT_RADIUS_PX
            }
        );
    }

    #[test]
    fn views_follow_the_viewport_without_touching_marks() {
        let mut store = MarkStore::new();
        store.create_mark(NormPos::new(0.5, 0.5), Tool::Point);
        let before = store.clone();
        let mut viewport = Viewport::identity();
        viewport.scale = 2.0;
        viewport.translate = vec2(30.0, -10.0);
        let views = layout_marks(&store, &stage(), &viewport, &SearchFilter::default());
        let MarkViewShape::Point { center, radius } = views[0].shape else {
            panic!("expected a point view");
        };
        assert_eq!(center, pos2(530.0, 240.0));
        assert_eq!(radius, POINT_RADIUS_PX * 2.0);
        assert_eq!(store, before);
    }

    #[test]
    fn filter_hides_without_removing() {
        let mut store = MarkStore::new();
        let a = store
            .create_mark(NormPos::new(0.2, 0.2), Tool::Point)
            .expect("inside");
        let b = store
            .create_mark(NormPos::new(0.6, 0.6), Tool::Point)
            .expect("inside");
        store.set_title(&a, "Crystal");
        store.set_description(&b, "crank sensor input");

        let views = layout_marks(&store, &stage(), &Viewport::identity(), &SearchFilter::new(" CRANK "));
        assert_eq!(views.len(), 2);
        assert!(!views[0].visible);
        assert!(views[1].visible);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn hit_test_prefers_topmost_and_skips_hidden() {
        let mut store = MarkStore::new();
        let lower = store
            .create_mark(NormPos::new(0.5, 0.5), Tool::Point)
            .expect("inside");
        let upper = store
            .create_mark(NormPos::new(0.5, 0.5), Tool::Point)
            .expect("inside");
        store.set_label(&lower, "keep");

        let all = layout_marks(&store, &stage(), &Viewport::identity(), &SearchFilter::default());
        assert_eq!(hit_test(&all, pos2(498.0, 252.0)), HitTarget::Mark(upper));

        let filtered = layout_marks(&store, &stage(), &Viewport::identity(), &SearchFilter::new("keep"));
        assert_eq!(hit_test(&filtered, pos2(498.0, 252.0)), HitTarget::Mark(lower));
        assert_eq!(hit_test(&filtered, pos2(900.0, 50.0)), HitTarget::Stage);
    }

    #[test]
    fn text_mark_exposes_handles_and_delete_control() {
        let mut store = MarkStore::new();
        let id = store
            .create_mark(NormPos::new(0.1, 0.2), Tool::Text)
            .expect("inside");
        let views = layout_marks(&store, &stage(), &Viewport::identity(), &SearchFilter::default());
        let MarkViewShape::Text { rect, .. } = &views[0].shape else {
            panic!("expected a text view");
        };
        assert_eq!(rect.min, pos2(100.0, 100.0));
        assert!((rect.max.x - 300.0).abs() < 1e-3);
        assert!((rect.max.y - 175.0).abs() < 1e-3);

        assert_eq!(
            hit_test(&views, rect.right_bottom()),
            HitTarget::ResizeHandle(id.clone(), ResizeHandle::Se)
        );
        assert_eq!(
            hit_test(&views, views[0].delete_control.center()),
            HitTarget::DeleteControl(id.clone())
        );
        assert_eq!(hit_test(&views, rect.center()), HitTarget::Mark(id));
    }

    #[test]
    fn unlaid_stage_renders_nothing() {
        let mut store = MarkStore::new();
        store.create_mark(NormPos::new(0.5, 0.5), Tool::Point);
        let flat = Stage::new(Rect::NOTHING);
        assert!(layout_marks(&store, &flat, &Viewport::identity(), &SearchFilter::default()).is_empty());
    }
}
