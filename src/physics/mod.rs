mod forces;
mod quadtree;

use eframe::egui::Vec2;
use tracing::debug;

use crate::config::{LayoutConfig, SimulationConfig};
use crate::graph::GraphModel;
use forces::{
    CollisionParams, accumulate_charge, accumulate_collisions, apply_centering, apply_links,
};
use quadtree::{Quadtree, ROOT};

const BARNES_HUT_THETA: f32 = 0.9;
const COLLISION_STRENGTH: f32 = 1.0;
const SETTLE_TICKS: f32 = 300.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SimulationState {
    Idle,
    Running,
}

#[derive(Default)]
struct PhysicsScratch {
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    predicted: Vec<Vec2>,
    deltas: Vec<Vec2>,
    degrees: Vec<usize>,
}

/// Force-directed layout driver. Owns only the cooling schedule; node
/// positions, velocities and pins live in the [`GraphModel`] it is ticked with.
pub struct Simulation {
    config: SimulationConfig,
    center: Vec2,
    collision_radius: f32,
    link_distance: f32,
    alpha: f32,
    alpha_target: f32,
    alpha_decay: f32,
    centering: bool,
    state: SimulationState,
    scratch: PhysicsScratch,
}

impl Simulation {
    pub fn new(config: SimulationConfig, layout: &LayoutConfig) -> Self {
        let collision_radius = layout.collision_radius();
        Self {
            config,
            center: layout.center(),
            collision_radius,
            link_distance: collision_radius * 2.0,
            alpha: 0.0,
            alpha_target: 0.0,
            alpha_decay: 1.0 - config.alpha_min.powf(1.0 / SETTLE_TICKS),
            centering: false,
            state: SimulationState::Idle,
            scratch: PhysicsScratch::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == SimulationState::Running
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Starts settling a freshly built or merged node set.
    pub fn reseed(&mut self, model: &GraphModel) {
        if model.is_empty() {
            self.stop();
            return;
        }

        self.alpha = self.config.reseed_alpha;
        self.centering = true;
        self.state = SimulationState::Running;
        debug!(alpha = self.alpha, nodes = model.nodes().len(), "simulation reseeded");
    }

    /// Resumes ticking with the current alpha. Centering stays as it was.
    pub fn restart(&mut self, model: &GraphModel) {
        if model.is_empty() {
            return;
        }
        self.state = SimulationState::Running;
    }

    pub fn set_alpha_target(&mut self, alpha_target: f32) {
        self.alpha_target = alpha_target.clamp(0.0, 1.0);
    }

    pub fn stop(&mut self) {
        self.state = SimulationState::Idle;
        self.alpha = 0.0;
        self.alpha_target = 0.0;
        self.centering = false;
    }

    /// Advances one step. Returns whether the simulation is still running.
    pub fn tick(&mut self, model: &mut GraphModel) -> bool {
        if self.state == SimulationState::Idle {
            return false;
        }
        if model.is_empty() {
            self.stop();
            return false;
        }

        self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;
        self.apply_forces(model);

        let decay = 1.0 - self.config.velocity_decay;
        for node in model.nodes_mut() {
            if let Some(pin) = node.pin {
                node.position = pin;
                node.velocity = Vec2::ZERO;
            } else {
                node.velocity *= decay;
                node.position += node.velocity;
            }
        }

        if self.alpha < self.config.alpha_min {
            self.state = SimulationState::Idle;
            self.centering = false;
            debug!("simulation settled");
        }

        self.is_running()
    }

    fn apply_forces(&mut self, model: &mut GraphModel) {
        let node_count = model.nodes().len();
        let links = model.link_indices();
        let scratch = &mut self.scratch;

        scratch.positions.clear();
        scratch.velocities.clear();
        for node in model.nodes() {
            scratch.positions.push(node.position);
            scratch.velocities.push(node.velocity);
        }

        scratch.degrees.clear();
        scratch.degrees.resize(node_count, 0);
        for &(source, target) in &links {
            scratch.degrees[source] += 1;
            scratch.degrees[target] += 1;
        }

        apply_links(
            &links,
            &scratch.degrees,
            &scratch.positions,
            &mut scratch.velocities,
            self.link_distance,
            self.alpha,
        );

        if let Some(tree) = Quadtree::build(&scratch.positions) {
            let strength = self.config.charge_strength * self.alpha;
            for (index, velocity) in scratch.velocities.iter_mut().enumerate() {
                let mut delta = Vec2::ZERO;
                accumulate_charge(
                    &tree,
                    ROOT,
                    index,
                    &scratch.positions,
                    strength,
                    BARNES_HUT_THETA,
                    &mut delta,
                );
                *velocity += delta;
            }
        }

        scratch.predicted.clear();
        scratch.predicted.extend(
            scratch
                .positions
                .iter()
                .zip(&scratch.velocities)
                .map(|(position, velocity)| *position + *velocity),
        );
        scratch.deltas.clear();
        scratch.deltas.resize(node_count, Vec2::ZERO);
        if let Some(tree) = Quadtree::build(&scratch.predicted) {
            accumulate_collisions(
                &tree,
                ROOT,
                ROOT,
                &scratch.predicted,
                CollisionParams {
                    radius: self.collision_radius,
                    strength: COLLISION_STRENGTH,
                },
                &mut scratch.deltas,
            );
        }
        for (velocity, delta) in scratch.velocities.iter_mut().zip(&scratch.deltas) {
            *velocity += *delta;
        }

        if self.centering {
            apply_centering(&mut scratch.positions, self.center);
        }

        for ((node, position), velocity) in model
            .nodes_mut()
            .iter_mut()
            .zip(&scratch.positions)
            .zip(&scratch.velocities)
        {
            node.position = *position;
            node.velocity = *velocity;
        }
    }
}

#[cfg(test)]
impl Simulation {
    pub(crate) fn alpha_target(&self) -> f32 {
        self.alpha_target
    }

    pub(crate) fn centering_enabled(&self) -> bool {
        self.centering
    }

    /// Ticks until idle or `max_ticks` is reached. Returns the ticks taken.
    pub(crate) fn run_until_idle(&mut self, model: &mut GraphModel, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while ticks < max_ticks && self.tick(model) {
            ticks += 1;
        }
        ticks
    }
}
