use eframe::egui::{self, Align, Color32, Context, Layout, RichText, Vec2};

use crate::config::Config;
use crate::graph::TreeSeed;
use crate::session::GraphSession;

use super::super::{FrameRequests, ViewModel};

const HELP_LINES: [&str; 4] = [
    "Click a company or shareholder to open its menu.",
    "Scroll or pinch with two fingers to zoom around the pointer.",
    "Drag a company or shareholder to move it. It stays where you drop it.",
    "Drag the background to move the whole graph.",
];

impl ViewModel {
    pub(in crate::app) fn new(config: &Config, seed: TreeSeed) -> Self {
        let mut session = GraphSession::new(config);
        session.set_focal(seed);

        Self {
            session,
            node_menu: None,
            drag_offset: Vec2::ZERO,
            show_help: false,
        }
    }

    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        requests: &mut FrameRequests,
        is_refocusing: bool,
    ) {
        if self.session.rebuild_tree_if_pending() {
            self.node_menu = None;
        }

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("aksjegraf");
                    ui.separator();
                    if let Some(focal) = self.session.focal() {
                        ui.label(RichText::new(focal.name.as_str()).strong());
                    }
                    ui.label(format!("year: {}", self.session.year()));
                    ui.label(format!("nodes: {}", self.session.model().nodes().len()));
                    ui.label(format!("links: {}", self.session.model().links().len()));
                    if ui.button("Reset graph").clicked() {
                        self.node_menu = None;
                        self.session.reset_graph();
                    }
                    let view_moved = !self.session.view().is_identity();
                    if ui.add_enabled(view_moved, egui::Button::new("Reset view")).clicked() {
                        self.session.reset_view();
                    }
                    if ui.button("How to use").clicked() {
                        self.show_help = !self.show_help;
                    }
                    let simulation = self.session.simulation();
                    if simulation.is_running() {
                        ui.label(format!("settling (alpha {:.3})", simulation.alpha()));
                    }
                    if is_refocusing || self.session.has_pending_fetches() {
                        ui.spinner();
                    }

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if let Some(notice) = self.session.notice().map(str::to_owned) {
                            if ui.small_button("Dismiss").clicked() {
                                self.session.dismiss_notice();
                            }
                            ui.colored_label(Color32::from_rgb(241, 146, 94), notice);
                        }
                    });
                });
            });

        if self.session.selected().is_some() {
            egui::SidePanel::right("details")
                .resizable(true)
                .default_width(360.0)
                .show(ctx, |ui| self.draw_details(ui));
        }

        egui::Window::new("How to use")
            .open(&mut self.show_help)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::RIGHT_BOTTOM, [-12.0, -12.0])
            .show(ctx, |ui| {
                for line in HELP_LINES {
                    ui.label(line);
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_graph(ui, requests, is_refocusing);
        });
    }
}
