use eframe::egui::vec2;

use crate::config::LayoutConfig;
use crate::registry::{EntityId, Ownership};
use crate::util::stable_pair;

use super::model::{GraphError, GraphModel, LinkKind};
use super::tree::row_positions;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Investors,
    Investments,
}

impl Direction {
    pub fn link_kind(self) -> LinkKind {
        match self {
            Self::Investors => LinkKind::Investor,
            Self::Investments => LinkKind::Investment,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Investors => "investors",
            Self::Investments => "investments",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub nodes_added: usize,
    pub links_added: usize,
    pub links_updated: usize,
}

impl MergeSummary {
    pub fn changed_topology(&self) -> bool {
        self.nodes_added > 0 || self.links_added > 0
    }
}

/// Folds one page of ownership rows for `anchor` into `model`.
///
/// Counter-parties already in the graph keep their position and pin. New ones
/// start on a row next to the anchor (above for investors, below for
/// investments) with a small per-entity jitter. The anchor itself is never
/// moved.
pub fn merge(
    model: &mut GraphModel,
    anchor: &EntityId,
    direction: Direction,
    ownerships: &[Ownership],
    layout: &LayoutConfig,
) -> Result<MergeSummary, GraphError> {
    let anchor_position = model
        .node(anchor)
        .map(|node| node.position)
        .ok_or_else(|| GraphError::MissingAnchor(anchor.clone()))?;

    let mut fresh = Vec::new();
    for ownership in ownerships {
        let id = &ownership.entity.id;
        if !model.contains(id) && !fresh.contains(&id) {
            fresh.push(id);
        }
    }

    // Later pages continue the row to the right of the neighbours already known.
    let (row_offset, known) = match direction {
        Direction::Investors => (-layout.row_height(), model.investors_of(anchor).count()),
        Direction::Investments => (layout.row_height(), model.investments_of(anchor).count()),
    };
    let slots = row_positions(
        known + fresh.len(),
        anchor_position + vec2(0.0, row_offset),
        layout,
    );

    let mut summary = MergeSummary::default();
    for ownership in ownerships {
        let entity = &ownership.entity;
        let slot = fresh
            .iter()
            .position(|id| *id == &entity.id)
            .map(|index| slots[known + index])
            .unwrap_or(anchor_position);
        let (jx, jy) = stable_pair(entity.id.as_str());
        let jitter = vec2(
            jx * layout.horizontal_margin * 0.5,
            jy * layout.vertical_margin * 0.25,
        );

        let (_, created) = model.upsert_node(entity, slot + jitter);
        if created {
            summary.nodes_added += 1;
        }

        let (source, target) = match direction {
            Direction::Investors => (&entity.id, anchor),
            Direction::Investments => (anchor, &entity.id),
        };
        let (_, created) = model.upsert_link(source, target, ownership.stake, direction.link_kind())?;
        if created {
            summary.links_added += 1;
        } else {
            summary.links_updated += 1;
        }
    }

    Ok(summary)
}
