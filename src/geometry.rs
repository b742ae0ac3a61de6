use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::viewport::Viewport;

const COORD_PRECISION: f32 = 1_000_000.0;

/// Rounds a normalized coordinate to six decimals, the precision marks are
/// stored with.
pub fn quantize(value: f32) -> f32 {
    (value * COORD_PRECISION).round() / COORD_PRECISION
}

/// Position as a fraction of the untransformed image's width and height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormPos {
    pub x: f32,
    pub y: f32,
}

impl NormPos {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// True when the position lies on the photo, edges included.
    pub fn is_inside_image(self) -> bool {
        self.is_finite() && (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    pub fn offset(self, delta: Vec2) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y)
    }

    pub fn delta_to(self, other: NormPos) -> Vec2 {
        Vec2::new(other.x - self.x, other.y - self.y)
    }
}

/// Screen-space extent of the photo at scale 1 with no pan.
///
/// The content layer is transformed about the centre of this rectangle, so
/// every conversion first un-transforms in pixel space and only then divides
/// by the stage size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stage {
    rect: Rect,
}

impl Stage {
    pub fn new(rect: Rect) -> Self {
        Self { rect }
    }

    /// A stage that has not been laid out cannot take placements.
    pub fn is_laid_out(&self) -> bool {
        let size = self.rect.size();
        size.x.is_finite() && size.y.is_finite() && size.x > 0.0 && size.y > 0.0
    }

    /// Screen point relative to the transform origin.
    pub fn origin_relative(&self, screen: Pos2) -> Vec2 {
        screen - self.rect.center()
    }

    pub fn to_normalized(&self, screen: Pos2, viewport: &Viewport) -> Option<NormPos> {
        if !self.is_laid_out() {
            return None;
        }
        let size = self.rect.size();
        let content = viewport.untransform(self.origin_relative(screen)) + size * 0.5;
        let pos = NormPos::new(content.x / size.x, content.y / size.y);
        pos.is_finite().then_some(pos)
    }

    pub fn to_screen(&self, pos: NormPos, viewport: &Viewport) -> Pos2 {
        let size = self.rect.size();
        let content = Vec2::new(pos.x * size.x, pos.y * size.y) - size * 0.5;
        self.rect.center() + viewport.transform(content)
    }

    /// Converts a pointer displacement in pixels into a normalized one.
    pub fn delta_to_normalized(&self, delta: Vec2, viewport: &Viewport) -> Option<Vec2> {
        if !self.is_laid_out() {
            return None;
        }
        let size = self.rect.size();
        let normalized = Vec2::new(
            delta.x / (size.x * viewport.scale),
            delta.y / (size.y * viewport.scale),
        );
        (normalized.x.is_finite() && normalized.y.is_finite()).then_some(normalized)
    }

    /// Screen rectangle covered by the whole photo under `viewport`.
    pub fn image_rect(&self, viewport: &Viewport) -> Rect {
        Rect::from_min_max(
            self.to_screen(NormPos::new(0.0, 0.0), viewport),
            self.to_screen(NormPos::new(1.0, 1.0), viewport),
        )
    }
}

/// Largest rectangle with the photo's aspect ratio centred inside `available`.
pub fn fit_image(available: Rect, image_size: Vec2) -> Option<Rect> {
    if image_size.x <= 0.0 || image_size.y <= 0.0 || available.width() <= 0.0 {
        return None;
    }
    let scale = (available.width() / image_size.x).min(available.height() / image_size.y);
    if !scale.is_finite() || scale <= 0.0 {
        return None;
    }
    Some(Rect::from_center_size(available.center(), image_size * scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{pos2, vec2};

    fn stage() -> Stage {
        Stage::new(Rect::from_min_size(Pos2::ZERO, vec2(1000.0, 500.0)))
    }

    #[test]
    fn centre_maps_to_half_at_identity() {
        let pos = stage()
            .to_normalized(pos2(500.0, 250.0), &Viewport::identity())
            .expect("stage is laid out");
        assert_eq!(pos, NormPos::new(0.5, 0.5));
    }

    #[test]
    fn conversion_inverts_under_pan_and_zoom() {
        let stage = stage();
        let mut viewport = Viewport::identity();
        viewport.scale = 2.5;
        viewport.translate = vec2(-80.0, 42.0);

        let original = NormPos::new(0.21, 0.83);
        let screen = stage.to_screen(original, &viewport);
        let back = stage
            .to_normalized(screen, &viewport)
            .expect("stage is laid out");
        assert!((back.x - original.x).abs() < 1e-5);
        assert!((back.y - original.y).abs() < 1e-5);
    }

    #[test]
    fn zero_sized_stage_rejects_conversion() {
        let flat = Stage::new(Rect::from_min_size(pos2(10.0, 10.0), vec2(0.0, 300.0)));
        assert!(!flat.is_laid_out());
        assert_eq!(flat.to_normalized(pos2(10.0, 20.0), &Viewport::identity()), None);
        assert_eq!(flat.delta_to_normalized(vec2(5.0, 5.0), &Viewport::identity()), None);
    }

    #[test]
    fn delta_accounts_for_scale() {
        let mut viewport = Viewport::identity();
        viewport.scale = 2.0;
        let delta = stage()
            .delta_to_normalized(vec2(100.0, 50.0), &viewport)
            .expect("stage is laid out");
        assert!((delta.x - 0.05).abs() < 1e-6);
        assert!((delta.y - 0.05).abs() < 1e-6);
    }

    #[test]
    fn bounds_check_includes_edges() {
        assert!(NormPos::new(0.0, 1.0).is_inside_image());
        assert!(!NormPos::new(-0.001, 0.5).is_inside_image());
        assert!(!NormPos::new(0.5, f32::NAN).is_inside_image());
    }

    #[test]
    fn fit_preserves_aspect_ratio() {
        let available = Rect::from_min_size(Pos2::ZERO, vec2(800.0, 800.0));
        let fitted = fit_image(available, vec2(400.0, 200.0)).expect("non-empty image");
        assert_eq!(fitted.size(), vec2(800.0, 400.0));
        assert_eq!(fitted.center(), available.center());
        assert_eq!(fit_image(available, Vec2::ZERO), None);
    }

    #[test]
    fn quantize_rounds_to_six_decimals() {
        assert_eq!(quantize(0.123_456_78), 0.123_457);
    }
}
