use eframe::egui::{self, PointerButton, Rect, Ui};

use crate::registry::EntityId;

use super::super::ViewModel;
use super::super::render_utils::screen_to_world;

/// Scale factor for one frame of input. `pinch` is egui's zoom delta, which
/// covers touch pinches and ctrl+scroll; when it is active the raw wheel delta
/// belongs to the same gesture and is ignored.
fn gesture_zoom_factor(scroll: f32, pinch: f32) -> Option<f32> {
    if (pinch - 1.0).abs() > f32::EPSILON {
        return Some(pinch);
    }
    if scroll.abs() > f32::EPSILON {
        return Some((1.0 + (scroll * 0.0018)).clamp(0.85, 1.15));
    }
    None
}

impl ViewModel {
    pub(in crate::app) fn handle_graph_zoom(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
    ) {
        if !response.hovered() {
            return;
        }

        let (scroll, pinch) = ui.input(|input| (input.raw_scroll_delta.y, input.zoom_delta()));
        let Some(zoom_factor) = gesture_zoom_factor(scroll, pinch) else {
            return;
        };

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        self.session.zoom_at(pointer - rect.center(), zoom_factor);
    }

    /// Primary drag on a node moves and pins it; any other drag pans.
    pub(in crate::app) fn handle_graph_drag(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
    ) {
        if response.drag_started_by(PointerButton::Primary)
            && let Some(origin) = ui.input(|input| input.pointer.press_origin())
        {
            let world = screen_to_world(rect, &self.session, origin);
            if let Some(id) = self.session.node_at(world).cloned()
                && let Some(position) = self.session.model().node(&id).map(|node| node.position)
            {
                self.node_menu = None;
                self.drag_offset = position - world;
                self.session.drag_start(&id);
            }
        }

        if self.session.dragging().is_some() {
            if let Some(pointer) = response.interact_pointer_pos() {
                let world = screen_to_world(rect, &self.session, pointer);
                self.session.drag_to(world + self.drag_offset);
            }
            let released = !ui.input(|input| input.pointer.primary_down());
            if response.drag_stopped() || released {
                self.session.drag_end();
            }
            return;
        }

        if response.dragged_by(PointerButton::Primary)
            || response.dragged_by(PointerButton::Secondary)
            || response.dragged_by(PointerButton::Middle)
        {
            self.session.pan_by(response.drag_delta());
        }
    }

    pub(in crate::app) fn hovered_node(&self, ui: &Ui, rect: Rect) -> Option<EntityId> {
        let pointer = ui.input(|input| input.pointer.hover_pos())?;
        if !rect.contains(pointer) {
            return None;
        }
        self.session
            .node_at(screen_to_world(rect, &self.session, pointer))
            .cloned()
    }
}
