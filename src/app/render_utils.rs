use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

use crate::registry::EntityKind;
use crate::session::GraphSession;

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

/// Grid that moves and scales with the view so panning is visible on an
/// empty canvas.
pub(super) fn draw_background(painter: &Painter, rect: Rect, origin: Pos2, scale: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = (80.0 * scale).max(20.0);
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn segment_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let bounds = Rect::from_two_pos(start, end).expand(padding);
    rect.intersects(bounds)
}

pub(super) fn world_to_screen(rect: Rect, session: &GraphSession, world: Vec2) -> Pos2 {
    rect.center() + session.world_to_screen(world)
}

pub(super) fn screen_to_world(rect: Rect, session: &GraphSession, screen: Pos2) -> Vec2 {
    session.screen_to_world(screen - rect.center())
}

pub(super) fn node_fill(kind: EntityKind) -> Color32 {
    match kind {
        EntityKind::Company => Color32::from_rgb(55, 110, 170),
        EntityKind::Shareholder => Color32::from_rgb(70, 140, 95),
    }
}

const LINK_COLOR: Color32 = Color32::from_rgba_premultiplied(118, 134, 149, 200);

/// Every ownership edge is drawn alike, whichever side it was discovered from.
pub(super) fn link_stroke(scale: f32) -> Stroke {
    Stroke::new((1.6 * scale.sqrt()).clamp(0.6, 3.4), LINK_COLOR)
}
