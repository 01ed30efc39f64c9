use eframe::egui::{Vec2, vec2};

use crate::config::LayoutConfig;
use crate::registry::{Entity, Ownership};

use super::model::{GraphError, GraphModel, LinkKind};

/// Everything the initial layout is derived from. Kept around so a reset can
/// rebuild the exact same starting picture.
#[derive(Clone, Debug)]
pub struct TreeSeed {
    pub focal: Entity,
    pub investors: Vec<Ownership>,
    pub investments: Vec<Ownership>,
}

/// Centres of `count` nodes laid out on one row around `row_center`, in input
/// order, one slot apart.
pub(super) fn row_positions(count: usize, row_center: Vec2, layout: &LayoutConfig) -> Vec<Vec2> {
    let slot = layout.slot_width();
    let left = row_center.x - (count as f32 * slot) / 2.0;
    (0..count)
        .map(|index| vec2(left + slot * (index as f32 + 0.5), row_center.y))
        .collect()
}

/// Focal node at the canvas centre, investors one row above, investments one
/// row below. Rows keep the order they were ranked in upstream.
pub fn build_tree(seed: &TreeSeed, layout: &LayoutConfig) -> Result<GraphModel, GraphError> {
    let mut model = GraphModel::default();
    let center = layout.center();
    let focal_id = seed.focal.id.clone();
    model.upsert_node(&seed.focal, center);

    let investor_row = row_positions(
        seed.investors.len(),
        center - vec2(0.0, layout.row_height()),
        layout,
    );
    for (ownership, position) in seed.investors.iter().zip(investor_row) {
        model.upsert_node(&ownership.entity, position);
        model.upsert_link(
            &ownership.entity.id,
            &focal_id,
            ownership.stake,
            LinkKind::Investor,
        )?;
    }

    let investment_row = row_positions(
        seed.investments.len(),
        center + vec2(0.0, layout.row_height()),
        layout,
    );
    for (ownership, position) in seed.investments.iter().zip(investment_row) {
        model.upsert_node(&ownership.entity, position);
        model.upsert_link(
            &focal_id,
            &ownership.entity.id,
            ownership.stake,
            LinkKind::Investment,
        )?;
    }

    Ok(model)
}

#[cfg(test)]
mod tests {
    use eframe::egui::Rect;

    use super::*;
    use crate::registry::EntityId;

    fn shareholders(count: usize) -> Vec<Ownership> {
        (0..count)
            .map(|index| {
                Ownership::new(
                    Entity::shareholder(&format!("s{index}"), &format!("Owner {index}"), Some("NO")),
                    1000 - index as u64,
                )
            })
            .collect()
    }

    fn companies(count: usize) -> Vec<Ownership> {
        (0..count)
            .map(|index| {
                Ownership::new(
                    Entity::company(&format!("d{index}"), &format!("Datter {index}"), Some(100)),
                    100,
                )
            })
            .collect()
    }

    fn bounding_box(center: Vec2, layout: &LayoutConfig) -> Rect {
        Rect::from_center_size(center.to_pos2(), layout.node_size())
    }

    #[test]
    fn two_investor_scenario_is_exact() {
        let layout = LayoutConfig::default();
        let seed = TreeSeed {
            focal: Entity::company("c", "Target AS", Some(1000)),
            investors: vec![
                Ownership::new(Entity::shareholder("s1", "First", None), 600),
                Ownership::new(Entity::shareholder("s2", "Second", None), 400),
            ],
            investments: Vec::new(),
        };

        let model = build_tree(&seed, &layout).unwrap();
        assert_eq!(model.nodes().len(), 3);
        assert_eq!(model.links().len(), 2);

        let position = |id: &str| model.node(&EntityId::new(id)).unwrap().position;
        assert_eq!(position("c"), vec2(500.0, 500.0));
        assert_eq!(position("s1"), vec2(300.0, 200.0));
        assert_eq!(position("s2"), vec2(700.0, 200.0));

        let first = model.link(&EntityId::new("s1"), &EntityId::new("c")).unwrap();
        assert_eq!(first.stake, 600);
        assert_eq!(first.kind, LinkKind::Investor);
        assert!(model.link(&EntityId::new("s2"), &EntityId::new("c")).is_some());
    }

    #[test]
    fn investments_go_below_in_input_order() {
        let layout = LayoutConfig::default();
        let seed = TreeSeed {
            focal: Entity::company("c", "Target AS", Some(1000)),
            investors: Vec::new(),
            investments: companies(3),
        };

        let model = build_tree(&seed, &layout).unwrap();
        let xs = (0..3)
            .map(|index| {
                let node = model.node(&EntityId::new(format!("d{index}"))).unwrap();
                assert_eq!(node.position.y, 800.0);
                node.position.x
            })
            .collect::<Vec<_>>();
        assert_eq!(xs, vec![100.0, 500.0, 900.0]);

        let link = model.link(&EntityId::new("c"), &EntityId::new("d1")).unwrap();
        assert_eq!(link.kind, LinkKind::Investment);
    }

    #[test]
    fn no_bounding_boxes_overlap() {
        let layout = LayoutConfig {
            node_width: 360.0,
            node_height: 180.0,
            horizontal_margin: 40.0,
            vertical_margin: 120.0,
            ..LayoutConfig::default()
        };

        for (investor_count, investment_count) in [(0, 0), (1, 5), (5, 5), (7, 2), (12, 9)] {
            let seed = TreeSeed {
                focal: Entity::company("c", "Target AS", Some(1000)),
                investors: shareholders(investor_count),
                investments: companies(investment_count),
            };
            let model = build_tree(&seed, &layout).unwrap();
            assert_eq!(model.nodes().len(), 1 + investor_count + investment_count);

            let boxes = model
                .nodes()
                .iter()
                .map(|node| bounding_box(node.position, &layout))
                .collect::<Vec<_>>();
            for (i, a) in boxes.iter().enumerate() {
                for b in &boxes[i + 1..] {
                    let overlap = a.intersect(*b);
                    assert!(
                        overlap.width() <= 0.0 || overlap.height() <= 0.0,
                        "{a:?} overlaps {b:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn entity_on_both_rows_keeps_first_placement() {
        let layout = LayoutConfig::default();
        let cross = Entity::company("x", "Cross AS", Some(10));
        let seed = TreeSeed {
            focal: Entity::company("c", "Target AS", Some(1000)),
            investors: vec![Ownership::new(cross.clone(), 5)],
            investments: vec![Ownership::new(cross, 3)],
        };

        let model = build_tree(&seed, &layout).unwrap();
        assert_eq!(model.nodes().len(), 2);
        assert_eq!(model.links().len(), 2);
        assert_eq!(
            model.node(&EntityId::new("x")).unwrap().position,
            vec2(500.0, 200.0)
        );
    }
}
