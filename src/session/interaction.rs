use eframe::egui::Vec2;

const MIN_SCALE: f32 = 0.05;
const MAX_SCALE: f32 = 6.0;

/// Zoom and pan applied to the whole scene at render time. Scene coordinates
/// are world coordinates relative to the canvas centre; node positions are
/// never touched by it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub translation: Vec2,
    pub scale: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ViewTransform {
    pub fn identity() -> Self {
        Self {
            translation: Vec2::ZERO,
            scale: 1.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn apply(&self, scene: Vec2) -> Vec2 {
        self.translation + scene * self.scale
    }

    pub fn invert(&self, screen: Vec2) -> Vec2 {
        (screen - self.translation) / self.scale
    }

    /// Scales by `factor` while keeping the scene point under `pointer` fixed.
    pub fn zoom_at(&mut self, pointer: Vec2, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }

        let scene_before = self.invert(pointer);
        self.scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        self.translation = pointer - scene_before * self.scale;
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.translation += delta;
    }
}
