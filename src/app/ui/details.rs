use eframe::egui::{self, Align, Layout, RichText, Ui};

use crate::registry::EntityId;
use crate::util::{format_percent, format_stocks};

use super::super::ViewModel;

struct HoldingRow {
    id: EntityId,
    name: String,
    stake: u64,
    percent: Option<f64>,
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        let Some(entity) = self.session.selected().cloned() else {
            return;
        };

        let mut close = false;
        ui.horizontal(|ui| {
            ui.heading("Details");
            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                close = ui.small_button("Close").clicked();
            });
        });
        ui.add_space(6.0);

        ui.label(RichText::new(entity.name.as_str()).strong());
        ui.small(entity.id.as_str());
        ui.add_space(6.0);

        ui.label(format!("Type: {}", entity.kind.label()));
        if let Some(country) = &entity.country_code {
            ui.label(format!("Country: {country}"));
        }
        if let Some(registry_number) = &entity.registry_number {
            ui.label(format!("Organisation number: {registry_number}"));
        }
        if let Some(stocks) = entity.stocks {
            ui.label(format!("Outstanding stocks: {}", format_stocks(stocks)));
        }
        ui.label(format!("Register year: {}", self.session.year()));

        let model = self.session.model();
        let mut holders = model
            .investors_of(&entity.id)
            .map(|(node, link)| HoldingRow {
                id: node.id().clone(),
                name: node.entity.name.clone(),
                stake: link.stake,
                percent: entity.share_percent(link.stake),
            })
            .collect::<Vec<_>>();
        let mut holdings = model
            .investments_of(&entity.id)
            .map(|(node, link)| HoldingRow {
                id: node.id().clone(),
                name: node.entity.name.clone(),
                stake: link.stake,
                percent: node.entity.share_percent(link.stake),
            })
            .collect::<Vec<_>>();
        holders.sort_by(|a, b| b.stake.cmp(&a.stake));
        holdings.sort_by(|a, b| b.stake.cmp(&a.stake));

        let mut pick = None;
        ui.separator();
        ui.label(RichText::new("Known holders").strong());
        Self::draw_holding_rows(ui, "holders_scroll", &holders, &mut pick);

        ui.separator();
        ui.label(RichText::new("Known holdings").strong());
        Self::draw_holding_rows(ui, "holdings_scroll", &holdings, &mut pick);

        if let Some(id) = pick
            && let Some(node) = self.session.model().node(&id)
        {
            let entity = node.entity.clone();
            self.session.show_details(&entity);
        } else if close {
            self.session.close_details();
        }
    }

    fn draw_holding_rows(
        ui: &mut Ui,
        id_salt: &str,
        rows: &[HoldingRow],
        pick: &mut Option<EntityId>,
    ) {
        if rows.is_empty() {
            ui.label("None loaded yet.");
            return;
        }

        egui::ScrollArea::vertical()
            .id_salt(id_salt)
            .max_height(240.0)
            .auto_shrink([false, true])
            .show_rows(ui, 22.0, rows.len(), |ui, row_range| {
                for row in &rows[row_range] {
                    let label = format!(
                        "{}  ({} stocks, {})",
                        row.name,
                        format_stocks(row.stake),
                        format_percent(row.percent)
                    );
                    if ui.link(label).on_hover_text(row.id.as_str()).clicked() {
                        *pick = Some(row.id.clone());
                    }
                }
            });
    }
}
