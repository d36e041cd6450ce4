use anyhow::{bail, Context, Result};
use flan_engine::{CookingConfig, EngineConfig, EventsConfig, KitchenConfig};
use flan_protocol::PacketLimits;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Full typed configuration. Every section is optional in YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FlanConfig {
    pub packet: PacketLimits,
    pub kitchen: KitchenConfig,
    pub cooking: CookingConfig,
    pub events: EventsConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interval of the background `Kitchen::tick` task.
    pub tick_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_ms: 100 }
    }
}

impl FlanConfig {
    /// Read and validate the merged config tree.
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: FlanConfig =
            serde_json::from_value(v.clone()).context("config does not match FlanConfig")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine_config()
            .validate()
            .context("CONFIG_INVALID")?;
        if self.scheduler.tick_ms == 0 {
            bail!("CONFIG_INVALID: scheduler.tick_ms must be >= 1");
        }
        Ok(())
    }

    /// The part of the config the engine sees.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            packet: self.packet.clone(),
            kitchen: self.kitchen.clone(),
            cooking: self.cooking.clone(),
            events: self.events.clone(),
        }
    }
}
