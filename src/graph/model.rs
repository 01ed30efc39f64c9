use std::collections::HashMap;

use eframe::egui::Vec2;
use thiserror::Error;

use crate::registry::{Entity, EntityId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("link {source_id} -> {target_id} references a node that was never added")]
    MissingEndpoint {
        source_id: EntityId,
        target_id: EntityId,
    },
    #[error("anchor {0} is not part of the graph")]
    MissingAnchor(EntityId),
}

/// Which expansion discovered a link. Only used to tell the two apart when
/// bookkeeping; rendering treats both the same.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkKind {
    Investor,
    Investment,
}

#[derive(Clone, Debug)]
pub struct GraphNode {
    pub entity: Entity,
    pub position: Vec2,
    pub velocity: Vec2,
    pub pin: Option<Vec2>,
}

impl GraphNode {
    pub fn id(&self) -> &EntityId {
        &self.entity.id
    }
}

/// `source` owns `stake` shares of `target`.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphLink {
    pub source: EntityId,
    pub target: EntityId,
    pub stake: u64,
    pub kind: LinkKind,
}

#[derive(Clone, Debug, Default)]
pub struct GraphModel {
    nodes: Vec<GraphNode>,
    links: Vec<GraphLink>,
    index_by_id: HashMap<EntityId, usize>,
    link_by_pair: HashMap<(EntityId, EntityId), usize>,
}

impl GraphModel {
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [GraphNode] {
        &mut self.nodes
    }

    pub fn links(&self) -> &[GraphLink] {
        &self.links
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.index_by_id.contains_key(id)
    }

    pub fn index_of(&self, id: &EntityId) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn node(&self, id: &EntityId) -> Option<&GraphNode> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    pub fn node_mut(&mut self, id: &EntityId) -> Option<&mut GraphNode> {
        self.index_of(id).map(|index| &mut self.nodes[index])
    }

    pub fn link(&self, source: &EntityId, target: &EntityId) -> Option<&GraphLink> {
        self.link_by_pair
            .get(&(source.clone(), target.clone()))
            .map(|&index| &self.links[index])
    }

    /// Returns the existing node for `entity` untouched, or inserts a new one at
    /// `initial_position`. The boolean is true when a node was created.
    pub fn upsert_node(&mut self, entity: &Entity, initial_position: Vec2) -> (&GraphNode, bool) {
        if let Some(&index) = self.index_by_id.get(&entity.id) {
            return (&self.nodes[index], false);
        }

        let index = self.nodes.len();
        self.index_by_id.insert(entity.id.clone(), index);
        self.nodes.push(GraphNode {
            entity: entity.clone(),
            position: initial_position,
            velocity: Vec2::ZERO,
            pin: None,
        });
        (&self.nodes[index], true)
    }

    /// Inserts the `source -> target` link or overwrites the stake and kind of
    /// the one already present. Both endpoints must already be nodes.
    pub fn upsert_link(
        &mut self,
        source: &EntityId,
        target: &EntityId,
        stake: u64,
        kind: LinkKind,
    ) -> Result<(&GraphLink, bool), GraphError> {
        if !self.contains(source) || !self.contains(target) {
            return Err(GraphError::MissingEndpoint {
                source_id: source.clone(),
                target_id: target.clone(),
            });
        }

        let key = (source.clone(), target.clone());
        if let Some(&index) = self.link_by_pair.get(&key) {
            let link = &mut self.links[index];
            link.stake = stake;
            link.kind = kind;
            return Ok((&self.links[index], false));
        }

        let index = self.links.len();
        self.link_by_pair.insert(key, index);
        self.links.push(GraphLink {
            source: source.clone(),
            target: target.clone(),
            stake,
            kind,
        });
        Ok((&self.links[index], true))
    }

    pub fn reset(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.index_by_id.clear();
        self.link_by_pair.clear();
    }

    /// Node index pairs for every link, in link order.
    pub fn link_indices(&self) -> Vec<(usize, usize)> {
        self.links
            .iter()
            .filter_map(|link| Some((self.index_of(&link.source)?, self.index_of(&link.target)?)))
            .collect()
    }

    pub fn investors_of(&self, id: &EntityId) -> impl Iterator<Item = (&GraphNode, &GraphLink)> {
        self.links
            .iter()
            .filter(move |link| &link.target == id)
            .filter_map(|link| Some((self.node(&link.source)?, link)))
    }

    pub fn investments_of(&self, id: &EntityId) -> impl Iterator<Item = (&GraphNode, &GraphLink)> {
        self.links
            .iter()
            .filter(move |link| &link.source == id)
            .filter_map(|link| Some((self.node(&link.target)?, link)))
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;

    fn id(value: &str) -> EntityId {
        EntityId::new(value)
    }

    #[test]
    fn repeated_node_upserts_keep_first_position() {
        let mut model = GraphModel::default();
        let entity = Entity::company("c", "Target AS", Some(1000));

        let (_, created) = model.upsert_node(&entity, vec2(10.0, 20.0));
        assert!(created);
        for offset in 1..5 {
            let (node, created) = model.upsert_node(&entity, vec2(offset as f32 * 100.0, -3.0));
            assert!(!created);
            assert_eq!(node.position, vec2(10.0, 20.0));
        }

        assert_eq!(model.nodes().len(), 1);
        assert_eq!(model.index_of(&id("c")), Some(0));
    }

    #[test]
    fn repeated_link_upserts_keep_latest_stake() {
        let mut model = GraphModel::default();
        model.upsert_node(&Entity::shareholder("s", "Owner", None), Vec2::ZERO);
        model.upsert_node(&Entity::company("c", "Target AS", None), Vec2::ZERO);

        let (_, created) = model
            .upsert_link(&id("s"), &id("c"), 100, LinkKind::Investor)
            .unwrap();
        assert!(created);

        for stake in [250, 75, 900] {
            let (link, created) = model
                .upsert_link(&id("s"), &id("c"), stake, LinkKind::Investment)
                .unwrap();
            assert!(!created);
            assert_eq!(link.stake, stake);
        }

        assert_eq!(model.links().len(), 1);
        let link = model.link(&id("s"), &id("c")).unwrap();
        assert_eq!(link.stake, 900);
        assert_eq!(link.kind, LinkKind::Investment);
    }

    #[test]
    fn opposite_directions_are_distinct_links() {
        let mut model = GraphModel::default();
        model.upsert_node(&Entity::company("a", "A", None), Vec2::ZERO);
        model.upsert_node(&Entity::company("b", "B", None), Vec2::ZERO);

        model.upsert_link(&id("a"), &id("b"), 1, LinkKind::Investment).unwrap();
        model.upsert_link(&id("b"), &id("a"), 2, LinkKind::Investment).unwrap();

        assert_eq!(model.links().len(), 2);
        assert_eq!(model.link_indices(), vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn link_to_unknown_node_is_rejected() {
        let mut model = GraphModel::default();
        model.upsert_node(&Entity::company("c", "Target AS", None), Vec2::ZERO);

        let error = model
            .upsert_link(&id("ghost"), &id("c"), 1, LinkKind::Investor)
            .unwrap_err();
        assert_eq!(
            error,
            GraphError::MissingEndpoint {
                source_id: id("ghost"),
                target_id: id("c"),
            }
        );
        assert!(model.links().is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let mut model = GraphModel::default();
        model.upsert_node(&Entity::shareholder("s", "Owner", None), Vec2::ZERO);
        model.upsert_node(&Entity::company("c", "Target AS", None), Vec2::ZERO);
        model.upsert_link(&id("s"), &id("c"), 1, LinkKind::Investor).unwrap();

        model.reset();

        assert!(model.is_empty());
        assert!(model.links().is_empty());
        assert!(!model.contains(&id("s")));
        assert!(model.link(&id("s"), &id("c")).is_none());

        let (_, created) = model.upsert_node(&Entity::company("c", "Target AS", None), Vec2::ZERO);
        assert!(created);
        assert_eq!(model.index_of(&id("c")), Some(0));
    }
}
