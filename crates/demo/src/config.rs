use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tether::SyncConfig;

use crate::link::LinkConditions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSettings {
    /// Simulated seconds.
    pub duration: f32,
    pub tick_rate: u32,
    /// Initial velocity of the thrown ball.
    pub launch_velocity: [f32; 3],
    pub launch_height: f32,
    pub ball_damping: f32,
    /// Second at which the authority teleports the ball back to its start.
    pub teleport_at: Option<f32>,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            duration: 10.0,
            tick_rate: 60,
            launch_velocity: [4.0, 6.0, 1.5],
            launch_height: 2.0,
            ball_damping: 0.1,
            teleport_at: Some(5.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub sync: SyncConfig,
    pub link: LinkConditions,
    pub scenario: ScenarioSettings,
}

impl DemoConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        config.sync.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
