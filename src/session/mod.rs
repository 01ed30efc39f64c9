//! The single owner of graph state. Ticks, gestures and completed fetches all
//! funnel through [`GraphSession`], so the simulation never sees a half-merged
//! node set.

mod fetch;
mod interaction;

use std::collections::{HashMap, HashSet};

use eframe::egui::{Rect, Vec2};
use tracing::{debug, error, info, warn};

use crate::config::{Config, FetchConfig, LayoutConfig, SimulationConfig};
use crate::graph::{Direction, GraphError, GraphModel, TreeSeed, build_tree, merge};
use crate::physics::Simulation;
use crate::registry::{Entity, EntityId, FetchError};

pub use fetch::{ExpandRequest, FetchOutcome, FetchWorker, FocalRef, RequestKey, load_seed};
pub use interaction::ViewTransform;

pub struct GraphSession {
    layout: LayoutConfig,
    fetch: FetchConfig,
    simulation_config: SimulationConfig,
    seed: Option<TreeSeed>,
    model: GraphModel,
    simulation: Simulation,
    view: ViewTransform,
    dragging: Option<EntityId>,
    in_flight: HashSet<RequestKey>,
    loaded_rows: HashMap<(EntityId, Direction), usize>,
    generation: u64,
    tree_pending: bool,
    selected: Option<EntityId>,
    notice: Option<String>,
}

impl GraphSession {
    pub fn new(config: &Config) -> Self {
        Self {
            layout: config.layout,
            fetch: config.fetch,
            simulation_config: config.simulation,
            seed: None,
            model: GraphModel::default(),
            simulation: Simulation::new(config.simulation, &config.layout),
            view: ViewTransform::identity(),
            dragging: None,
            in_flight: HashSet::new(),
            loaded_rows: HashMap::new(),
            generation: 0,
            tree_pending: false,
            selected: None,
            notice: None,
        }
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn year(&self) -> u16 {
        self.fetch.year
    }

    pub fn focal(&self) -> Option<&Entity> {
        self.seed.as_ref().map(|seed| &seed.focal)
    }

    pub fn selected(&self) -> Option<&Entity> {
        let id = self.selected.as_ref()?;
        self.model.node(id).map(|node| &node.entity)
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// A refocus that failed leaves the current graph in place. Missing
    /// records are only logged; other failures get a generic notice.
    pub fn refocus_failed(&mut self, target: &EntityId, error: &FetchError) {
        match error {
            FetchError::NotFound(what) => {
                debug!(focal = %target, %what, "nothing to refocus on");
            }
            FetchError::Upstream(message) => {
                warn!(focal = %target, %message, "refocus failed");
                self.notice = Some("Something went wrong while loading the graph.".to_owned());
            }
        }
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn has_pending_fetches(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn is_loading(&self, anchor: &EntityId, direction: Direction) -> bool {
        self.in_flight
            .iter()
            .any(|key| &key.anchor == anchor && key.direction == direction)
    }

    /// Replaces the whole graph with the tree for a new focal entity.
    pub fn set_focal(&mut self, seed: TreeSeed) {
        info!(focal = %seed.focal.id, name = %seed.focal.name, "building graph");
        self.clear_state();
        self.seed = Some(seed);
        self.build_from_seed();
    }

    /// Empties the graph and restores the default view. The tree for the
    /// current focal entity is rebuilt by the next [`Self::rebuild_tree_if_pending`].
    pub fn reset_graph(&mut self) {
        info!("graph reset");
        self.clear_state();
        self.tree_pending = self.seed.is_some();
    }

    pub fn rebuild_tree_if_pending(&mut self) -> bool {
        if !self.tree_pending {
            return false;
        }
        self.tree_pending = false;
        self.build_from_seed();
        true
    }

    fn clear_state(&mut self) {
        self.model.reset();
        self.simulation.stop();
        self.view = ViewTransform::identity();
        self.dragging = None;
        self.in_flight.clear();
        self.loaded_rows.clear();
        self.generation = self.generation.wrapping_add(1);
        self.tree_pending = false;
        self.selected = None;
        self.notice = None;
    }

    fn build_from_seed(&mut self) {
        let Some(seed) = &self.seed else {
            return;
        };

        match build_tree(seed, &self.layout) {
            Ok(model) => {
                self.model = model;
                let focal = seed.focal.id.clone();
                self.loaded_rows
                    .insert((focal.clone(), Direction::Investors), seed.investors.len());
                self.loaded_rows
                    .insert((focal, Direction::Investments), seed.investments.len());
                self.simulation.reseed(&self.model);
            }
            Err(error) => Self::inconsistency(&error),
        }
    }

    fn inconsistency(error: &GraphError) {
        error!(%error, "graph inconsistency");
        if cfg!(debug_assertions) {
            panic!("graph inconsistency: {error}");
        }
    }

    /// Number of rows already merged for `anchor` in `direction`; the skip for
    /// the next "load more".
    pub fn loaded_rows(&self, anchor: &EntityId, direction: Direction) -> usize {
        self.loaded_rows
            .get(&(anchor.clone(), direction))
            .copied()
            .unwrap_or(0)
    }

    pub fn load_investors(&mut self, entity: &Entity, skip: usize) -> Option<ExpandRequest> {
        self.expand(entity, Direction::Investors, skip)
    }

    pub fn load_investments(&mut self, entity: &Entity, skip: usize) -> Option<ExpandRequest> {
        self.expand(entity, Direction::Investments, skip)
    }

    /// Issues a page request for `entity`. Identical requests already in flight
    /// are coalesced into the first one and yield `None`.
    fn expand(
        &mut self,
        entity: &Entity,
        direction: Direction,
        skip: usize,
    ) -> Option<ExpandRequest> {
        if !self.model.contains(&entity.id) {
            warn!(anchor = %entity.id, "expand requested for entity outside the graph");
            return None;
        }

        let request = ExpandRequest {
            anchor: entity.clone(),
            direction,
            year: self.fetch.year,
            limit: self.fetch.limit,
            skip,
            generation: self.generation,
        };
        if !self.in_flight.insert(request.key()) {
            debug!(anchor = %entity.id, direction = direction.label(), skip, "coalesced duplicate request");
            return None;
        }

        debug!(anchor = %entity.id, direction = direction.label(), skip, "expand requested");
        Some(request)
    }

    /// Applies a completed fetch. Returns true when the graph changed.
    pub fn apply_fetch(&mut self, outcome: FetchOutcome) -> bool {
        let request = outcome.request;
        if request.generation != self.generation {
            debug!(anchor = %request.anchor.id, "discarding fetch from before reset");
            return false;
        }
        self.in_flight.remove(&request.key());

        if !self.model.contains(&request.anchor.id) {
            debug!(anchor = %request.anchor.id, "discarding fetch for anchor no longer in graph");
            return false;
        }

        let rows = match outcome.result {
            Ok(rows) => rows,
            Err(FetchError::NotFound(what)) => {
                debug!(anchor = %request.anchor.id, %what, "nothing to expand");
                return false;
            }
            Err(FetchError::Upstream(message)) => {
                warn!(anchor = %request.anchor.id, %message, "expand failed");
                self.notice = Some(format!(
                    "Something went wrong while loading {} for {}.",
                    request.direction.label(),
                    request.anchor.name
                ));
                return false;
            }
        };

        match merge(
            &mut self.model,
            &request.anchor.id,
            request.direction,
            &rows,
            &self.layout,
        ) {
            Ok(summary) => {
                let loaded = self
                    .loaded_rows
                    .entry((request.anchor.id.clone(), request.direction))
                    .or_insert(0);
                *loaded = (*loaded).max(request.skip + rows.len());

                info!(
                    anchor = %request.anchor.id,
                    direction = request.direction.label(),
                    nodes_added = summary.nodes_added,
                    links_added = summary.links_added,
                    links_updated = summary.links_updated,
                    "merged ownership page"
                );
                if summary.changed_topology() {
                    self.simulation.reseed(&self.model);
                }
                summary.changed_topology() || summary.links_updated > 0
            }
            Err(error) => {
                Self::inconsistency(&error);
                false
            }
        }
    }

    pub fn tick(&mut self) -> bool {
        self.simulation.tick(&mut self.model)
    }

    pub fn show_details(&mut self, entity: &Entity) {
        if self.model.contains(&entity.id) {
            self.selected = Some(entity.id.clone());
        }
    }

    pub fn close_details(&mut self) {
        self.selected = None;
    }

    /// Pins `id` where it currently is and keeps the simulation warm while the
    /// pointer holds it.
    pub fn drag_start(&mut self, id: &EntityId) -> bool {
        let Some(node) = self.model.node_mut(id) else {
            return false;
        };
        node.pin = Some(node.position);

        self.simulation
            .set_alpha_target(self.simulation_config.drag_alpha_target);
        if !self.simulation.is_running() {
            self.simulation.restart(&self.model);
        }
        self.dragging = Some(id.clone());
        true
    }

    pub fn drag_to(&mut self, world: Vec2) {
        let Some(id) = &self.dragging else {
            return;
        };
        if let Some(node) = self.model.node_mut(id) {
            node.pin = Some(world);
            node.position = world;
            node.velocity = Vec2::ZERO;
        }
    }

    /// Lets the simulation cool down. The node stays pinned where it was dropped.
    pub fn drag_end(&mut self) {
        if self.dragging.take().is_some() {
            self.simulation.set_alpha_target(0.0);
        }
    }

    pub fn dragging(&self) -> Option<&EntityId> {
        self.dragging.as_ref()
    }

    pub fn reset_view(&mut self) {
        self.view = ViewTransform::identity();
    }

    pub fn zoom_at(&mut self, pointer: Vec2, factor: f32) {
        self.view.zoom_at(pointer, factor);
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.view.pan_by(delta);
    }

    /// Scene offset (relative to the viewport centre) to world coordinates.
    pub fn screen_to_world(&self, offset: Vec2) -> Vec2 {
        self.view.invert(offset) + self.layout.center()
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        self.view.apply(world - self.layout.center())
    }

    /// Topmost node whose box contains `world`.
    pub fn node_at(&self, world: Vec2) -> Option<&EntityId> {
        let size = self.layout.node_size();
        self.model
            .nodes()
            .iter()
            .rev()
            .find(|node| Rect::from_center_size(node.position.to_pos2(), size).contains(world.to_pos2()))
            .map(|node| node.id())
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;
    use crate::registry::{Ownership, OwnershipSource, RegistrySnapshot};

    fn id(value: &str) -> EntityId {
        EntityId::new(value)
    }

    /// C has investors S1 (600 of 1000) and S2 (400); C owns all of D.
    fn registry() -> RegistrySnapshot {
        let mut snapshot = RegistrySnapshot::default();
        snapshot.insert_entity(Entity::company("c", "Target AS", Some(1000)));
        snapshot.insert_entity(Entity::shareholder("s1", "First", Some("NO")));
        snapshot.insert_entity(Entity::shareholder("s2", "Second", Some("SE")));
        snapshot.insert_entity(Entity::company("d", "Datter AS", Some(100)));
        snapshot.insert_ownership(2020, &id("s1"), &id("c"), 600);
        snapshot.insert_ownership(2020, &id("s2"), &id("c"), 400);
        snapshot.insert_ownership(2020, &id("c"), &id("d"), 100);
        snapshot
    }

    fn seeded(registry: &RegistrySnapshot) -> GraphSession {
        let mut session = GraphSession::new(&Config::default());
        let focal = registry.resolve_entity(&id("c")).unwrap();
        let investors = registry.list_investors(&focal, 2020, 5, 0).unwrap();
        session.set_focal(TreeSeed {
            focal,
            investors,
            investments: Vec::new(),
        });
        session
    }

    fn focal(session: &GraphSession) -> Entity {
        session.focal().cloned().unwrap()
    }

    fn snapshot_of(session: &GraphSession) -> (Vec<(String, Vec2)>, Vec<(String, String, u64)>) {
        let nodes = session
            .model()
            .nodes()
            .iter()
            .map(|node| (node.id().to_string(), node.position))
            .collect();
        let links = session
            .model()
            .links()
            .iter()
            .map(|link| (link.source.to_string(), link.target.to_string(), link.stake))
            .collect();
        (nodes, links)
    }

    #[test]
    fn investment_expansion_scenario() {
        let registry = registry();
        let mut session = seeded(&registry);
        assert_eq!(session.model().nodes().len(), 3);
        assert_eq!(session.model().links().len(), 2);
        let s1 = session.model().node(&id("s1")).unwrap().position;
        let s2 = session.model().node(&id("s2")).unwrap().position;

        let request = session.load_investments(&focal(&session), 0).unwrap();
        assert!(session.apply_fetch(request.execute(&registry)));

        let model = session.model();
        assert_eq!(model.nodes().len(), 4);
        assert_eq!(model.links().len(), 3);
        assert_eq!(model.node(&id("s1")).unwrap().position, s1);
        assert_eq!(model.node(&id("s2")).unwrap().position, s2);
        assert_eq!(model.link(&id("c"), &id("d")).unwrap().stake, 100);
        assert!(session.simulation().is_running());
        assert_eq!(session.loaded_rows(&id("c"), Direction::Investments), 1);
    }

    #[test]
    fn repeated_page_is_idempotent() {
        let registry = registry();
        let mut once = seeded(&registry);
        let request = once.load_investors(&focal(&once), 0).unwrap();
        once.apply_fetch(request.execute(&registry));

        let mut twice = seeded(&registry);
        for _ in 0..2 {
            let request = twice.load_investors(&focal(&twice), 0).unwrap();
            twice.apply_fetch(request.execute(&registry));
        }

        assert_eq!(snapshot_of(&once), snapshot_of(&twice));
        assert_eq!(twice.model().links().len(), 2);
    }

    #[test]
    fn identical_in_flight_requests_are_coalesced() {
        let registry = registry();
        let mut session = seeded(&registry);
        let c = focal(&session);

        let first = session.load_investments(&c, 0).unwrap();
        assert!(session.load_investments(&c, 0).is_none());
        assert!(session.is_loading(&c.id, Direction::Investments));
        assert!(session.load_investments(&c, 5).is_some());
        assert!(session.load_investors(&c, 0).is_some());

        session.apply_fetch(first.execute(&registry));
        assert!(session.load_investments(&c, 0).is_some());
    }

    #[test]
    fn result_after_reset_is_discarded() {
        let registry = registry();
        let mut session = seeded(&registry);
        let request = session.load_investments(&focal(&session), 0).unwrap();

        session.reset_graph();
        assert!(session.rebuild_tree_if_pending());
        let rebuilt = snapshot_of(&session);

        assert!(!session.apply_fetch(request.execute(&registry)));
        assert_eq!(snapshot_of(&session), rebuilt);
        assert_eq!(session.model().nodes().len(), 3);
    }

    #[test]
    fn reset_is_total() {
        let registry = registry();
        let mut session = seeded(&registry);
        let c = focal(&session);
        let request = session.load_investments(&c, 0).unwrap();
        session.apply_fetch(request.execute(&registry));
        session.zoom_at(vec2(50.0, 20.0), 2.0);
        session.pan_by(vec2(-30.0, 10.0));
        session.drag_start(&id("s1"));
        session.show_details(&c);

        session.reset_graph();

        assert!(session.model().nodes().is_empty());
        assert!(session.model().links().is_empty());
        assert!(session.view().is_identity());
        assert!(!session.simulation().is_running());
        assert!(session.selected().is_none());
        assert!(session.dragging().is_none());
        assert!(!session.has_pending_fetches());

        assert!(session.rebuild_tree_if_pending());
        assert!(!session.rebuild_tree_if_pending());
        assert_eq!(session.model().nodes().len(), 3);
        assert_eq!(session.model().links().len(), 2);
        assert!(session.model().nodes().iter().all(|node| node.pin.is_none()));
    }

    #[test]
    fn dragged_node_stays_pinned_after_cooling() {
        let registry = registry();
        let mut session = seeded(&registry);
        session.tick();
        let target = vec2(-420.0, 1337.5);

        assert!(session.drag_start(&id("s2")));
        assert!(session.simulation().is_running());
        assert_eq!(session.simulation().alpha_target(), 0.1);
        session.drag_to(vec2(0.0, 0.0));
        session.tick();
        session.drag_to(target);
        for _ in 0..10 {
            session.tick();
        }
        session.drag_end();
        assert_eq!(session.simulation().alpha_target(), 0.0);

        let mut ticks = 0;
        while session.tick() {
            ticks += 1;
            assert!(ticks < 10_000);
        }
        assert!(!session.simulation().is_running());
        let node = session.model().node(&id("s2")).unwrap();
        assert_eq!(node.position, target);
        assert_eq!(node.pin, Some(target));
    }

    #[test]
    fn drag_restarts_idle_simulation_without_centering() {
        let registry = registry();
        let mut session = seeded(&registry);
        while session.tick() {}
        assert!(!session.simulation().is_running());

        session.drag_start(&id("c"));
        assert!(session.simulation().is_running());
        assert!(!session.simulation().centering_enabled());
        session.drag_end();
        assert!(session.model().node(&id("c")).unwrap().pin.is_some());
    }

    #[test]
    fn upstream_error_leaves_graph_intact() {
        let registry = registry();
        let mut session = seeded(&registry);
        let before = snapshot_of(&session);

        let request = session.load_investors(&focal(&session), 0).unwrap();
        let failed = FetchOutcome {
            request,
            result: Err(FetchError::Upstream("timeout".to_owned())),
        };
        assert!(!session.apply_fetch(failed));
        assert_eq!(snapshot_of(&session), before);
        assert!(session.notice().is_some());
        assert!(!session.has_pending_fetches());

        session.dismiss_notice();
        assert!(session.notice().is_none());
    }

    #[test]
    fn not_found_renders_nothing() {
        let registry = registry();
        let mut session = seeded(&registry);
        let before = snapshot_of(&session);
        let request = session.load_investors(&focal(&session), 0).unwrap();
        let missing = FetchOutcome {
            request,
            result: Err(FetchError::NotFound("c".to_owned())),
        };
        assert!(!session.apply_fetch(missing));
        assert_eq!(snapshot_of(&session), before);
        assert!(session.notice().is_none());
    }

    #[test]
    fn failed_refocus_keeps_graph_and_hides_error_details() {
        let registry = registry();
        let mut session = seeded(&registry);
        let before = snapshot_of(&session);

        session.refocus_failed(&id("zzz"), &FetchError::NotFound("zzz".to_owned()));
        assert_eq!(snapshot_of(&session), before);
        assert!(session.notice().is_none());

        session.refocus_failed(&id("s1"), &FetchError::Upstream("connection reset".to_owned()));
        assert_eq!(snapshot_of(&session), before);
        let notice = session.notice().unwrap();
        assert!(!notice.contains("connection reset"));
        assert_eq!(session.focal().map(|focal| focal.id.clone()), Some(id("c")));
    }

    #[test]
    fn expand_outside_graph_is_ignored() {
        let registry = registry();
        let mut session = seeded(&registry);
        let stranger = Entity::company("x", "Stranger AS", None);
        assert!(session.load_investors(&stranger, 0).is_none());
        assert!(!session.has_pending_fetches());
    }

    #[test]
    fn pagination_appends_neighbours() {
        let mut registry = registry();
        for index in 0..7 {
            let owner = format!("p{index}");
            registry.insert_entity(Entity::shareholder(&owner, "Minor", None));
            registry.insert_ownership(2020, &id(&owner), &id("c"), 10 + index);
        }
        let mut session = seeded(&registry);
        let c = focal(&session);
        assert_eq!(session.model().nodes().len(), 6);
        assert_eq!(session.loaded_rows(&c.id, Direction::Investors), 5);

        let skip = session.loaded_rows(&c.id, Direction::Investors);
        let request = session.load_investors(&c, skip).unwrap();
        assert!(session.apply_fetch(request.execute(&registry)));
        assert_eq!(session.model().nodes().len(), 10);
        assert_eq!(session.loaded_rows(&c.id, Direction::Investors), 9);

        let request = session.load_investors(&c, 9).unwrap();
        assert!(!session.apply_fetch(request.execute(&registry)));
        assert_eq!(session.model().nodes().len(), 10);
        assert_eq!(session.loaded_rows(&c.id, Direction::Investors), 9);
    }

    #[test]
    fn hit_testing_follows_view_transform() {
        let registry = registry();
        let mut session = seeded(&registry);
        let s1 = session.model().node(&id("s1")).unwrap().position;

        let screen = session.world_to_screen(s1);
        assert_eq!(session.node_at(session.screen_to_world(screen)), Some(&id("s1")));

        session.zoom_at(vec2(100.0, 100.0), 0.5);
        session.pan_by(vec2(12.0, -40.0));
        let screen = session.world_to_screen(s1);
        assert_eq!(session.node_at(session.screen_to_world(screen)), Some(&id("s1")));
        assert_eq!(session.node_at(vec2(-5000.0, -5000.0)), None);
    }

    #[test]
    fn details_show_known_holders() {
        let registry = registry();
        let mut session = seeded(&registry);
        let c = focal(&session);
        session.show_details(&c);
        let selected = session.selected().unwrap();
        assert_eq!(selected.id, id("c"));

        let holders = session
            .model()
            .investors_of(&id("c"))
            .map(|(node, link)| (node.entity.name.clone(), c.share_percent(link.stake)))
            .collect::<Vec<_>>();
        assert_eq!(
            holders,
            vec![
                ("First".to_owned(), Some(60.0)),
                ("Second".to_owned(), Some(40.0)),
            ]
        );

        session.close_details();
        assert!(session.selected().is_none());
    }

    #[test]
    fn ownership_rows_round_trip_through_request() {
        let registry = registry();
        let mut session = seeded(&registry);
        let request = session.load_investors(&focal(&session), 1).unwrap();
        let outcome = request.execute(&registry);
        assert_eq!(
            outcome.result.unwrap(),
            vec![Ownership::new(
                Entity::shareholder("s2", "Second", Some("SE")),
                400
            )]
        );
    }
}
