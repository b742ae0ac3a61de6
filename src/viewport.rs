use egui::{Pos2, Vec2};

pub const MIN_SCALE: f32 = 0.2;
pub const MAX_SCALE: f32 = 5.0;
const ZOOM_IN_STEP: f32 = 1.1;
const ZOOM_OUT_STEP: f32 = 0.9;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

impl ZoomDirection {
    /// Wheel deltas follow the DOM convention: negative means "wheel up".
    pub fn from_wheel(delta_y: f32) -> Option<Self> {
        if delta_y < 0.0 {
            Some(Self::In)
        } else if delta_y > 0.0 {
            Some(Self::Out)
        } else {
            None
        }
    }

    fn factor(self) -> f32 {
        match self {
            Self::In => ZOOM_IN_STEP,
            Self::Out => ZOOM_OUT_STEP,
        }
    }
}

/// Pan and zoom applied to the content layer (photo plus marks).
///
/// `translate` is in screen pixels relative to the stage centre, which is the
/// transform origin. Panning is unbounded; `scale` stays in
/// [`MIN_SCALE`, `MAX_SCALE`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub translate: Vec2,
    pan_origin: Option<Vec2>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::identity()
    }
}

impl Viewport {
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            translate: Vec2::ZERO,
            pan_origin: None,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::identity();
    }

    pub fn is_panning(&self) -> bool {
        self.pan_origin.is_some()
    }

    /// Zooms one step keeping the content point under `pointer` fixed.
    ///
    /// `pointer` is relative to the transform origin. Returns `false` when
    /// the scale is already pinned at the limit in that direction.
    pub fn zoom_at(&mut self, pointer: Vec2, direction: ZoomDirection) -> bool {
        let old_scale = self.scale;
        let new_scale = (old_scale * direction.factor()).clamp(MIN_SCALE, MAX_SCALE);
        if new_scale == old_scale || !pointer.x.is_finite() || !pointer.y.is_finite() {
            return false;
        }

        let content = (pointer - self.translate) / old_scale;
        self.translate = pointer - content * new_scale;
        self.scale = new_scale;
        log::trace!(
            "event=zoom module=viewport status=ok scale={:.3} tx={:.1} ty={:.1}",
            self.scale,
            self.translate.x,
            self.translate.y
        );
        true
    }

    pub fn start_pan(&mut self, pointer: Pos2) {
        self.pan_origin = Some(pointer.to_vec2() - self.translate);
    }

    pub fn update_pan(&mut self, pointer: Pos2) -> bool {
        let Some(origin) = self.pan_origin else {
            return false;
        };
        let next = pointer.to_vec2() - origin;
        if !next.x.is_finite() || !next.y.is_finite() || next == self.translate {
            return false;
        }
        self.translate = next;
        true
    }

    /// Returns whether a pan was actually in progress.
    pub fn end_pan(&mut self) -> bool {
        self.pan_origin.take().is_some()
    }

    /// Maps a point relative to the transform origin back to unscaled,
    /// untranslated content space (still origin-relative).
    pub fn untransform(&self, pointer: Vec2) -> Vec2 {
        (pointer - self.translate) / self.scale
    }

    pub fn transform(&self, content: Vec2) -> Vec2 {
        self.translate + content * self.scale
    }
}
