use eframe::egui::{
    self, Align2, Color32, Context, CursorIcon, FontId, PointerButton, Rect, RichText, Sense,
    Stroke, StrokeKind, Ui, vec2,
};

use crate::graph::Direction;
use crate::registry::Entity;
use crate::util::{format_percent, format_stocks};

use super::super::render_utils::{
    blend_color, draw_background, link_stroke, node_fill, segment_visible, world_to_screen,
};
use super::super::{FrameRequests, NodeMenu, ViewModel};

enum MenuAction {
    Expand(Direction, usize),
    Details,
    Refocus,
}

impl ViewModel {
    pub(in crate::app) fn draw_graph(
        &mut self,
        ui: &mut Ui,
        requests: &mut FrameRequests,
        is_refocusing: bool,
    ) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        let origin = world_to_screen(rect, &self.session, self.session.layout().center());
        draw_background(&painter, rect, origin, self.session.view().scale);

        self.handle_graph_zoom(ui, rect, &response);
        self.handle_graph_drag(ui, rect, &response);

        if self.session.tick() || self.session.dragging().is_some() {
            ui.ctx().request_repaint();
        }

        if self.session.model().is_empty() {
            ui.label("No entities in the graph.");
            return;
        }

        let hovered = self.hovered_node(ui, rect);
        if hovered.is_some() {
            ui.output_mut(|output| {
                output.cursor_icon = if self.session.dragging().is_some() {
                    CursorIcon::Grabbing
                } else {
                    CursorIcon::PointingHand
                };
            });
        }

        let scale = self.session.view().scale;
        let model = self.session.model();

        let link_line = link_stroke(scale);
        let show_link_labels = scale >= 0.45;
        for link in model.links() {
            let (Some(source), Some(target)) = (model.node(&link.source), model.node(&link.target))
            else {
                continue;
            };
            let start = world_to_screen(rect, &self.session, source.position);
            let end = world_to_screen(rect, &self.session, target.position);
            if !segment_visible(rect, start, end, 2.0) {
                continue;
            }

            painter.line_segment([start, end], link_line);
            if show_link_labels {
                let label = match target.entity.share_percent(link.stake) {
                    Some(percent) => format_percent(Some(percent)),
                    None => format_stocks(link.stake),
                };
                painter.text(
                    start + (end - start) * 0.5,
                    Align2::CENTER_CENTER,
                    label,
                    FontId::proportional((13.0 * scale).clamp(9.0, 22.0)),
                    Color32::from_gray(210),
                );
            }
        }

        let focal_id = self.session.focal().map(|focal| focal.id.clone());
        let selected_id = self.session.selected().map(|entity| entity.id.clone());
        let menu_id = self.node_menu.as_ref().map(|menu| menu.id.clone());
        let node_size = self.session.layout().node_size() * scale;
        let corner = (10.0 * scale).clamp(2.0, 14.0);

        for node in model.nodes() {
            let center = world_to_screen(rect, &self.session, node.position);
            let node_rect = Rect::from_center_size(center, node_size);
            if !rect.intersects(node_rect) {
                continue;
            }

            let is_hovered = hovered.as_ref() == Some(node.id());
            let is_focal = focal_id.as_ref() == Some(node.id());
            let highlighted =
                selected_id.as_ref() == Some(node.id()) || menu_id.as_ref() == Some(node.id());

            let base = node_fill(node.entity.kind);
            let fill = if is_hovered {
                blend_color(base, Color32::from_rgb(255, 164, 101), 0.35)
            } else {
                base
            };
            let stroke = if highlighted {
                Stroke::new(2.4, Color32::from_rgb(245, 206, 93))
            } else if is_focal {
                Stroke::new(2.0, Color32::from_gray(235))
            } else {
                Stroke::new(1.0, Color32::from_rgba_unmultiplied(15, 15, 15, 190))
            };

            painter.rect_filled(node_rect, corner, fill);
            painter.rect_stroke(node_rect, corner, stroke, StrokeKind::Inside);

            if node.pin.is_some() {
                painter.circle_filled(
                    node_rect.right_top() + vec2(-8.0, 8.0) * scale.min(1.0),
                    (4.0 * scale).clamp(1.5, 5.0),
                    Color32::from_gray(235),
                );
            }

            if scale >= 0.2 {
                let mut subtitle = node.entity.kind.label().to_owned();
                if let Some(country) = &node.entity.country_code {
                    subtitle.push_str(" / ");
                    subtitle.push_str(country);
                }

                painter.text(
                    center - vec2(0.0, node_size.y * 0.12),
                    Align2::CENTER_CENTER,
                    node.entity.name.as_str(),
                    FontId::proportional((22.0 * scale).clamp(7.0, 40.0)),
                    Color32::from_gray(240),
                );
                painter.text(
                    center + vec2(0.0, node_size.y * 0.18),
                    Align2::CENTER_CENTER,
                    subtitle,
                    FontId::proportional((15.0 * scale).clamp(6.0, 28.0)),
                    Color32::from_gray(200),
                );
            }
        }

        if response.clicked_by(PointerButton::Primary) {
            self.node_menu = match (hovered, ui.input(|input| input.pointer.interact_pos())) {
                (Some(id), Some(anchor)) => Some(NodeMenu { id, anchor }),
                _ => None,
            };
        }

        self.draw_node_menu(ui.ctx(), requests, is_refocusing);
    }

    fn draw_node_menu(
        &mut self,
        ctx: &Context,
        requests: &mut FrameRequests,
        is_refocusing: bool,
    ) {
        let Some(menu) = &self.node_menu else {
            return;
        };
        let Some(entity) = self.session.model().node(&menu.id).map(|node| node.entity.clone())
        else {
            self.node_menu = None;
            return;
        };

        let is_focal = self
            .session
            .focal()
            .is_some_and(|focal| focal.id == entity.id);
        let mut action = None;

        egui::Area::new(egui::Id::new("node_menu"))
            .order(egui::Order::Foreground)
            .fixed_pos(menu.anchor)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.label(RichText::new(entity.name.as_str()).strong());
                    ui.small(entity.kind.label());
                    ui.separator();

                    for direction in [Direction::Investors, Direction::Investments] {
                        let loaded = self.session.loaded_rows(&entity.id, direction);
                        let loading = self.session.is_loading(&entity.id, direction);
                        let label = if loaded == 0 {
                            format!("Load {}", direction.label())
                        } else {
                            format!("Load more {}", direction.label())
                        };
                        if ui.add_enabled(!loading, egui::Button::new(label)).clicked() {
                            action = Some(MenuAction::Expand(direction, loaded));
                        }
                    }

                    if ui.button("Show details").clicked() {
                        action = Some(MenuAction::Details);
                    }
                    let focus = egui::Button::new("Focus here");
                    if ui.add_enabled(!is_focal && !is_refocusing, focus).clicked() {
                        action = Some(MenuAction::Refocus);
                    }
                });
            });

        if let Some(action) = action {
            self.node_menu = None;
            self.apply_menu_action(&entity, action, requests);
        }
    }

    fn apply_menu_action(
        &mut self,
        entity: &Entity,
        action: MenuAction,
        requests: &mut FrameRequests,
    ) {
        match action {
            MenuAction::Expand(direction, skip) => {
                let request = match direction {
                    Direction::Investors => self.session.load_investors(entity, skip),
                    Direction::Investments => self.session.load_investments(entity, skip),
                };
                requests.expand.extend(request);
            }
            MenuAction::Details => self.session.show_details(entity),
            MenuAction::Refocus => requests.refocus = Some(entity.id.clone()),
        }
    }
}
