//! Engine configuration.
//!
//! All sections deserialize with defaults so a partial YAML layer only needs
//! to name the keys it overrides. [`EngineConfig::validate`] is called once by
//! `Kitchen::new`; an engine never runs on an inconsistent config.

use flan_protocol::PacketLimits;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub packet: PacketLimits,
    pub kitchen: KitchenConfig,
    pub cooking: CookingConfig,
    pub events: EventsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KitchenConfig {
    /// Ovens are named `oven-1` .. `oven-N`.
    pub oven_count: u32,
    /// Max concurrent orders per oven.
    pub oven_capacity: u32,
    pub ambient_temperature: i64,
    /// Preheat ramp: ms per degree between ambient and the requested temperature.
    pub preheat_ms_per_degree: u64,
    /// How long a Ready session may sit with nothing in the oven.
    pub handshake_timeout_ms: u64,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        Self {
            oven_count: 3,
            oven_capacity: 1,
            ambient_temperature: 20,
            preheat_ms_per_degree: 2,
            handshake_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookingConfig {
    /// Timeout bound as a percentage of the estimate. Must exceed 100.
    pub timeout_factor_percent: u64,
    /// Progress events fire as cooking crosses each of these percentages.
    pub progress_checkpoints: Vec<u8>,
    /// Cooldown imposed on an oven after a timed-out order.
    pub cooldown_ms: u64,
    /// Each portion beyond the first adds this percentage to the estimate.
    pub portion_step_percent: u64,
    pub priority_high_percent: u64,
    pub priority_normal_percent: u64,
    pub priority_low_percent: u64,
}

impl Default for CookingConfig {
    fn default() -> Self {
        Self {
            timeout_factor_percent: 200,
            progress_checkpoints: vec![25, 50, 75, 100],
            cooldown_ms: 5_000,
            portion_step_percent: 10,
            priority_high_percent: 75,
            priority_normal_percent: 100,
            priority_low_percent: 150,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Events kept for `recent_events`.
    pub history_limit: usize,
    /// Broadcast buffer per subscriber before it starts lagging.
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            channel_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let bad = |msg: String| Err(EngineError::InvalidConfig(msg));

        let p = &self.packet;
        if p.min_temperature > p.max_temperature {
            return bad(format!(
                "packet.min_temperature {} > packet.max_temperature {}",
                p.min_temperature, p.max_temperature
            ));
        }

        let k = &self.kitchen;
        if k.oven_count == 0 {
            return bad("kitchen.oven_count must be >= 1".into());
        }
        if k.oven_capacity == 0 {
            return bad("kitchen.oven_capacity must be >= 1".into());
        }

        let c = &self.cooking;
        if c.timeout_factor_percent <= 100 {
            return bad(format!(
                "cooking.timeout_factor_percent must be > 100 (got {})",
                c.timeout_factor_percent
            ));
        }
        if c.progress_checkpoints.is_empty() {
            return bad("cooking.progress_checkpoints must not be empty".into());
        }
        let increasing = c.progress_checkpoints.windows(2).all(|w| w[0] < w[1]);
        let in_range = c.progress_checkpoints.iter().all(|p| (1..=100).contains(p));
        if !increasing || !in_range {
            return bad(format!(
                "cooking.progress_checkpoints must be strictly increasing within 1..=100 (got {:?})",
                c.progress_checkpoints
            ));
        }
        if c.priority_high_percent == 0
            || c.priority_high_percent >= c.priority_normal_percent
            || c.priority_normal_percent >= c.priority_low_percent
        {
            return bad(format!(
                "cooking priority percents must satisfy 0 < high < normal < low (got {}/{}/{})",
                c.priority_high_percent, c.priority_normal_percent, c.priority_low_percent
            ));
        }

        if self.events.channel_capacity == 0 {
            return bad("events.channel_capacity must be >= 1".into());
        }

        Ok(())
    }
}
