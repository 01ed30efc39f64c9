use std::path::Path;

use eframe::egui::{Vec2, vec2};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub layout: LayoutConfig,
    pub simulation: SimulationConfig,
    pub fetch: FetchConfig,
}

/// Canvas and node geometry. Fixed for the lifetime of a session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutConfig {
    pub width: f32,
    pub height: f32,
    pub node_width: f32,
    pub node_height: f32,
    pub horizontal_margin: f32,
    pub vertical_margin: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationConfig {
    pub reseed_alpha: f32,
    pub drag_alpha_target: f32,
    pub alpha_min: f32,
    pub velocity_decay: f32,
    pub charge_strength: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchConfig {
    pub year: u16,
    pub limit: usize,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    layout: Option<RawLayout>,
    simulation: Option<RawSimulation>,
    fetch: Option<RawFetch>,
}

#[derive(Debug, Deserialize)]
struct RawLayout {
    width: Option<f32>,
    height: Option<f32>,
    node_width: Option<f32>,
    node_height: Option<f32>,
    horizontal_margin: Option<f32>,
    vertical_margin: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct RawSimulation {
    reseed_alpha: Option<f32>,
    drag_alpha_target: Option<f32>,
    alpha_min: Option<f32>,
    velocity_decay: Option<f32>,
    charge_strength: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct RawFetch {
    year: Option<u16>,
    limit: Option<usize>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 1000.0,
            height: 1000.0,
            node_width: 360.0,
            node_height: 180.0,
            horizontal_margin: 40.0,
            vertical_margin: 120.0,
        }
    }
}

impl LayoutConfig {
    pub fn center(&self) -> Vec2 {
        vec2(self.width / 2.0, self.height / 2.0)
    }

    pub fn node_size(&self) -> Vec2 {
        vec2(self.node_width, self.node_height)
    }

    /// Horizontal distance between neighbouring nodes on a row.
    pub fn slot_width(&self) -> f32 {
        self.node_width + self.horizontal_margin
    }

    /// Vertical distance between rows.
    pub fn row_height(&self) -> f32 {
        self.node_height + self.vertical_margin
    }

    pub fn collision_radius(&self) -> f32 {
        self.node_width.max(self.node_height) / 2.0
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            reseed_alpha: 0.4,
            drag_alpha_target: 0.1,
            alpha_min: 0.001,
            velocity_decay: 0.4,
            charge_strength: -30.0,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            year: 2020,
            limit: 5,
        }
    }
}

impl Config {
    /// Loads `path` if it exists, otherwise falls back to the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        let defaults = Self::default();

        let layout = match raw.layout {
            Some(l) => LayoutConfig {
                width: l.width.unwrap_or(defaults.layout.width),
                height: l.height.unwrap_or(defaults.layout.height),
                node_width: l.node_width.unwrap_or(defaults.layout.node_width),
                node_height: l.node_height.unwrap_or(defaults.layout.node_height),
                horizontal_margin: l
                    .horizontal_margin
                    .unwrap_or(defaults.layout.horizontal_margin)
                    .max(0.0),
                vertical_margin: l
                    .vertical_margin
                    .unwrap_or(defaults.layout.vertical_margin)
                    .max(0.0),
            },
            None => defaults.layout,
        };

        let simulation = match raw.simulation {
            Some(s) => SimulationConfig {
                reseed_alpha: s
                    .reseed_alpha
                    .unwrap_or(defaults.simulation.reseed_alpha)
                    .clamp(0.0, 1.0),
                drag_alpha_target: s
                    .drag_alpha_target
                    .unwrap_or(defaults.simulation.drag_alpha_target)
                    .clamp(0.0, 1.0),
                alpha_min: s
                    .alpha_min
                    .unwrap_or(defaults.simulation.alpha_min)
                    .clamp(0.000_01, 0.5),
                velocity_decay: s
                    .velocity_decay
                    .unwrap_or(defaults.simulation.velocity_decay)
                    .clamp(0.0, 1.0),
                charge_strength: s
                    .charge_strength
                    .unwrap_or(defaults.simulation.charge_strength),
            },
            None => defaults.simulation,
        };

        let fetch = match raw.fetch {
            Some(f) => FetchConfig {
                year: f.year.unwrap_or(defaults.fetch.year),
                limit: f.limit.unwrap_or(defaults.fetch.limit).max(1),
            },
            None => defaults.fetch,
        };

        Ok(Self {
            layout,
            simulation,
            fetch,
        })
    }
}
