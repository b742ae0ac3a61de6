use std::fmt;

use egui::Vec2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{quantize, NormPos};

pub const MIN_POINT_SIZE: f32 = 0.3;
pub const MAX_POINT_SIZE: f32 = 4.0;
pub const DEFAULT_POINT_SIZE: f32 = 1.0;
pub const DEFAULT_TEXT_WIDTH: f32 = 0.20;
pub const DEFAULT_TEXT_HEIGHT: f32 = 0.15;
pub const DEFAULT_MIN_TEXT_EXTENT: f32 = 0.05;
pub const TEXT_PLACEHOLDER_LABEL: &str = "Click to name";
pub const TEXT_FALLBACK_LABEL: &str = "TEXT";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkId(String);

impl MarkId {
    pub fn generate() -> Self {
        Self(format!("mk_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MarkId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for MarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which kind of mark a hold-to-place gesture creates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Point,
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeHandle {
    Nw,
    Ne,
    Sw,
    Se,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 4] = [Self::Nw, Self::Ne, Self::Sw, Self::Se];

    fn moves_west(self) -> bool {
        matches!(self, Self::Nw | Self::Sw)
    }

    fn moves_north(self) -> bool {
        matches!(self, Self::Nw | Self::Ne)
    }
}

/// Normalized rectangle of a text mark.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl TextBox {
    /// Moves the handle's two edges by `delta`; the opposite edges stay put.
    ///
    /// Moved edges are clamped to the image and kept at least `min_extent`
    /// away from the fixed edges.
    pub fn resized(self, handle: ResizeHandle, delta: Vec2, min_extent: f32) -> Self {
        let (left, right) = resize_axis(
            self.x,
            self.x + self.width,
            delta.x,
            handle.moves_west(),
            min_extent,
        );
        let (top, bottom) = resize_axis(
            self.y,
            self.y + self.height,
            delta.y,
            handle.moves_north(),
            min_extent,
        );
        Self {
            x: quantize(left),
            y: quantize(top),
            width: quantize(right - left),
            height: quantize(bottom - top),
        }
    }

    fn fits_photo(&self, min_extent: f32) -> bool {
        self.width >= min_extent
            && self.height >= min_extent
            && self.x + self.width <= 1.0
            && self.y + self.height <= 1.0
    }

    /// Shifts the box so its origin is `pos`, keeping it fully on the image.
    pub fn moved_to(self, pos: NormPos) -> Self {
        Self {
            x: quantize(clamp_unit(pos.x, 1.0 - self.width)),
            y: quantize(clamp_unit(pos.y, 1.0 - self.height)),
            ..self
        }
    }
}

/// Returns the new `(near, far)` edges along one axis.
fn resize_axis(near: f32, far: f32, delta: f32, move_near: bool, min_extent: f32) -> (f32, f32) {
    let near = near.clamp(0.0, 1.0 - min_extent);
    let far = far.min(1.0);
    if move_near {
        let upper = (far - min_extent).max(0.0);
        let moved = (near + delta).max(0.0).min(upper);
        (moved, far.max(moved + min_extent).min(1.0))
    } else {
        let moved = (far + delta).min(1.0).max(near + min_extent);
        (near, moved)
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Clamps to `[0, upper]`, with `upper` itself kept inside `[0, 1]`.
fn clamp_unit(value: f32, upper: f32) -> f32 {
    value.max(0.0).min(upper.clamp(0.0, 1.0))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MarkShape {
    Point {
        #[serde(default = "default_point_size")]
        size: f32,
    },
    /// New text marks keep the default extent even when placed near the
    /// right or bottom edge; `x + width <= 1` is enforced by move, resize
    /// and [`Mark::clamp_to_photo`], not by creation.
    Text {
        #[serde(default = "default_text_width")]
        width: f32,
        #[serde(default = "default_text_height")]
        height: f32,
    },
}

fn default_point_size() -> f32 {
    DEFAULT_POINT_SIZE
}

fn default_text_width() -> f32 {
    DEFAULT_TEXT_WIDTH
}

fn default_text_height() -> f32 {
    DEFAULT_TEXT_HEIGHT
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub id: MarkId,
    #[serde(flatten)]
    pub shape: MarkShape,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl Mark {
    pub fn new(tool: Tool, pos: NormPos) -> Self {
        let (shape, label) = match tool {
            Tool::Point => (
                MarkShape::Point {
                    size: DEFAULT_POINT_SIZE,
                },
                String::new(),
            ),
            Tool::Text => (
                MarkShape::Text {
                    width: DEFAULT_TEXT_WIDTH,
                    height: DEFAULT_TEXT_HEIGHT,
                },
                TEXT_PLACEHOLDER_LABEL.to_string(),
            ),
        };
        Self {
            id: MarkId::generate(),
            shape,
            x: quantize(pos.x),
            y: quantize(pos.y),
            label,
            title: String::new(),
            description: String::new(),
        }
    }

    pub fn position(&self) -> NormPos {
        NormPos::new(self.x, self.y)
    }

    pub fn is_text(&self) -> bool {
        matches!(self.shape, MarkShape::Text { .. })
    }

    pub fn text_box(&self) -> Option<TextBox> {
        match self.shape {
            MarkShape::Text { width, height } => Some(TextBox {
                x: self.x,
                y: self.y,
                width,
                height,
            }),
            MarkShape::Point { .. } => None,
        }
    }

    pub fn set_text_box(&mut self, text_box: TextBox) -> bool {
        let MarkShape::Text { width, height } = &mut self.shape else {
            return false;
        };
        self.x = text_box.x;
        self.y = text_box.y;
        *width = text_box.width;
        *height = text_box.height;
        true
    }

    /// Moves the mark, keeping it (and a text mark's whole box) on the image.
    pub fn move_to(&mut self, pos: NormPos) {
        match self.text_box() {
            Some(text_box) => {
                self.set_text_box(text_box.moved_to(pos));
            }
            None => {
                self.x = quantize(clamp_unit(pos.x, 1.0));
                self.y = quantize(clamp_unit(pos.y, 1.0));
            }
        }
    }

    /// Pulls a loaded mark back inside the photo: position in [0, 1], point
    /// size within its limits, text box at least `min_extent` and ending on
    /// the photo. Non-finite values fall back to defaults. Returns whether
    /// anything changed.
    pub fn clamp_to_photo(&mut self, min_extent: f32) -> bool {
        let before = self.clone();
        self.x = quantize(finite_or(self.x, 0.0).clamp(0.0, 1.0));
        self.y = quantize(finite_or(self.y, 0.0).clamp(0.0, 1.0));
        match &mut self.shape {
            MarkShape::Point { size } => {
                *size = quantize(
                    finite_or(*size, DEFAULT_POINT_SIZE).clamp(MIN_POINT_SIZE, MAX_POINT_SIZE),
                );
            }
            MarkShape::Text { width, height } => {
                *width = finite_or(*width, DEFAULT_TEXT_WIDTH);
                *height = finite_or(*height, DEFAULT_TEXT_HEIGHT);
            }
        }
        if let Some(text_box) = self.text_box().filter(|b| !b.fits_photo(min_extent)) {
            self.set_text_box(text_box.resized(ResizeHandle::Se, Vec2::ZERO, min_extent));
        }
        *self != before
    }

    pub fn display_label(&self) -> &str {
        if !self.label.is_empty() {
            return &self.label;
        }
        match self.shape {
            MarkShape::Text { .. } if !self.title.is_empty() => self.title.as_str(),
            MarkShape::Text { .. } => TEXT_FALLBACK_LABEL,
            MarkShape::Point { .. } => "",
        }
    }

    /// Case-insensitive match on label, title or description.
    pub fn matches_query(&self, lowercase_query: &str) -> bool {
        [&self.label, &self.title, &self.description]
            .iter()
            .any(|field| field.to_lowercase().contains(lowercase_query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::vec2;

    fn text_box(x: f32, y: f32, width: f32, height: f32) -> TextBox {
        TextBox {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn se_resize_caps_at_image_edge() {
        let resized = text_box(0.9, 0.9, 0.2, 0.2).resized(
            ResizeHandle::Se,
            vec2(0.3, 0.3),
            DEFAULT_MIN_TEXT_EXTENT,
        );
        assert_eq!(resized.x, 0.9);
        assert_eq!(resized.y, 0.9);
        assert!((resized.width - 0.1).abs() < 1e-6);
        assert!((resized.height - 0.1).abs() < 1e-6);
    }

    #[test]
    fn nw_resize_moves_origin_and_keeps_far_edges() {
        let resized = text_box(0.4, 0.4, 0.2, 0.2).resized(
            ResizeHandle::Nw,
            vec2(-0.1, 0.05),
            DEFAULT_MIN_TEXT_EXTENT,
        );
        assert!((resized.x - 0.3).abs() < 1e-6);
        assert!((resized.y - 0.45).abs() < 1e-6);
        assert!((resized.x + resized.width - 0.6).abs() < 1e-6);
        assert!((resized.y + resized.height - 0.6).abs() < 1e-6);
    }

    #[test]
    fn resize_enforces_minimum_extent() {
        let resized = text_box(0.2, 0.2, 0.2, 0.2).resized(
            ResizeHandle::Ne,
            vec2(-0.5, 0.5),
            DEFAULT_MIN_TEXT_EXTENT,
        );
        assert!((resized.width - DEFAULT_MIN_TEXT_EXTENT).abs() < 1e-6);
        assert!((resized.height - DEFAULT_MIN_TEXT_EXTENT).abs() < 1e-6);
        assert!((resized.y + resized.height - 0.4).abs() < 1e-6);

        let west = text_box(0.2, 0.2, 0.2, 0.2).resized(
            ResizeHandle::Sw,
            vec2(0.9, 0.0),
            DEFAULT_MIN_TEXT_EXTENT,
        );
        assert!((west.width - DEFAULT_MIN_TEXT_EXTENT).abs() < 1e-6);
        assert!((west.x + west.width - 0.4).abs() < 1e-6);
    }

    #[test]
    fn text_box_move_keeps_box_inside() {
        let moved = text_box(0.1, 0.1, 0.2, 0.15).moved_to(NormPos::new(0.95, -0.3));
        assert!((moved.x - 0.8).abs() < 1e-6);
        assert_eq!(moved.y, 0.0);
    }

    #[test]
    fn point_move_clamps_to_unit_square() {
        let mut mark = Mark::new(Tool::Point, NormPos::new(0.5, 0.5));
        mark.move_to(NormPos::new(1.4, -2.0));
        assert_eq!(mark.position(), NormPos::new(1.0, 0.0));
    }

    #[test]
    fn new_marks_get_variant_defaults() {
        let point = Mark::new(Tool::Point, NormPos::new(0.1, 0.2));
        assert_eq!(point.shape, MarkShape::Point { size: 1.0 });
        assert!(point.id.as_str().starts_with("mk_"));

        let text = Mark::new(Tool::Text, NormPos::new(0.1, 0.2));
        assert_eq!(
            text.shape,
            MarkShape::Text {
                width: 0.20,
                height: 0.15
            }
        );
        assert_eq!(text.label, TEXT_PLACEHOLDER_LABEL);
        assert_ne!(point.id, text.id);
    }

    #[test]
    fn serializes_with_flat_type_tag() {
        let mark = Mark {
            id: MarkId::from("mk_a"),
            shape: MarkShape::Text {
                width: 0.25,
                height: 0.5,
            },
            x: 0.125,
            y: 0.75,
            label: "CAN".into(),
            title: "CAN".into(),
            description: "bus".into(),
        };
        let value = serde_json::to_value(&mark).expect("mark serializes");
        assert_eq!(value["type"], "text");
        assert_eq!(value["width"], 0.25);
        assert!(value.get("size").is_none());

        let parsed: Mark = serde_json::from_value(serde_json::json!({
            "id": "mk_b", "type": "point", "x": 0.5, "y": 0.25
        }))
        .expect("legacy point without size parses");
        assert_eq!(parsed.shape, MarkShape::Point { size: 1.0 });
        assert_eq!(parsed.label, "");
    }

    #[test]
    fn query_matches_any_text_field() {
        let mut mark = Mark::new(Tool::Point, NormPos::new(0.5, 0.5));
        mark.description = "Injector Driver".into();
        assert!(mark.matches_query("injector"));
        assert!(!mark.matches_query("ignition"));
    }

    #[test]
    fn clamp_pulls_loaded_marks_onto_the_photo() {
        let mut point = Mark::new(Tool::Point, NormPos::new(0.5, 0.5));
        point.x = 1.4;
        point.y = f32::NAN;
        point.shape = MarkShape::Point { size: 9.0 };
        assert!(point.clamp_to_photo(DEFAULT_MIN_TEXT_EXTENT));
        assert_eq!((point.x, point.y), (1.0, 0.0));
        assert_eq!(point.shape, MarkShape::Point { size: MAX_POINT_SIZE });

        let mut text = Mark::new(Tool::Text, NormPos::new(0.9, 0.2));
        assert!(text.clamp_to_photo(DEFAULT_MIN_TEXT_EXTENT));
        let text_box = text.text_box().expect("text mark");
        assert_eq!(text_box.x, 0.9);
        assert!((text_box.width - 0.1).abs() < 1e-6);
        assert_eq!(text_box.height, DEFAULT_TEXT_HEIGHT);

        let mut inside = Mark::new(Tool::Text, NormPos::new(0.3, 0.3));
        assert!(!inside.clamp_to_photo(DEFAULT_MIN_TEXT_EXTENT));
    }

    #[test]
    fn display_label_falls_back_for_text_marks() {
        let mut mark = Mark::new(Tool::Text, NormPos::new(0.5, 0.5));
        mark.label.clear();
        assert_eq!(mark.display_label(), TEXT_FALLBACK_LABEL);
        mark.title = "Fuse".into();
        assert_eq!(mark.display_label(), "Fuse");
    }
}
