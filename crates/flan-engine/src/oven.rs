//! Oven registry.
//!
//! # State machine
//!
//! ```text
//!            try_claim              occupy                finish (last order)
//!   Idle ───────────────► Heating ─────────► Busy ──────────────────────────► Idle
//!    ▲                      │                 │  └─ finish with cooldown ─► Busy (cooling) ─► Idle
//!    └──── release ─────────┘                 │
//!                                        mark_faulted (from any state)
//!                                             ▼
//!                                          Faulted ──── reset ────► Idle
//! ```
//!
//! The set of ovens is fixed at construction; each oven sits behind its own
//! mutex, so claims on different ovens never contend and a claim on one oven
//! is atomic. Oven locks are leaves: nothing else is acquired while one is held.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::KitchenConfig;
use crate::error::EngineError;
use crate::sync::lock;
use crate::types::{OrderId, OvenId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OvenState {
    Idle,
    Heating,
    Busy,
    Faulted,
}

impl OvenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OvenState::Idle => "idle",
            OvenState::Heating => "heating",
            OvenState::Busy => "busy",
            OvenState::Faulted => "faulted",
        }
    }
}

/// One oven. Snapshots handed out by the registry are detached copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oven {
    pub id: OvenId,
    pub state: OvenState,
    pub current_temperature: i64,
    pub target_temperature: Option<i64>,
    /// Oldest order still cooking, if any.
    pub current_order_id: Option<OrderId>,
    pub active_orders: Vec<OrderId>,
    pub capacity: u32,
    /// Set while the oven cools down after a timed-out order.
    pub cooldown_until: Option<u64>,
    /// Number of times this oven has been faulted. Orders admitted under an
    /// older count are dead.
    pub fault_count: u64,
    #[serde(skip)]
    ramp_from: i64,
    #[serde(skip)]
    heat_started_at: u64,
    #[serde(skip)]
    ready_at: u64,
}

impl Oven {
    fn new(id: OvenId, capacity: u32, ambient: i64) -> Self {
        Self {
            id,
            state: OvenState::Idle,
            current_temperature: ambient,
            target_temperature: None,
            current_order_id: None,
            active_orders: Vec::new(),
            capacity,
            cooldown_until: None,
            fault_count: 0,
            ramp_from: ambient,
            heat_started_at: 0,
            ready_at: 0,
        }
    }

    pub fn is_cooling_down(&self) -> bool {
        self.cooldown_until.is_some()
    }

    /// Apply time-driven changes: preheat ramp and cooldown expiry.
    fn refresh(&mut self, now: u64, ambient: i64) {
        match self.state {
            OvenState::Heating => {
                let target = self.target_temperature.unwrap_or(ambient);
                self.current_temperature = if now >= self.ready_at {
                    target
                } else {
                    let span = (self.ready_at - self.heat_started_at) as i64;
                    let done = now.saturating_sub(self.heat_started_at) as i64;
                    self.ramp_from + (target - self.ramp_from) * done / span.max(1)
                };
            }
            OvenState::Busy => {
                if let Some(until) = self.cooldown_until.filter(|u| now >= *u) {
                    if self.active_orders.is_empty() {
                        debug!(oven = %self.id, until, "cooldown over");
                        self.to_idle(ambient);
                    } else {
                        // Lapsed while other orders were still cooking.
                        self.cooldown_until = None;
                    }
                }
            }
            OvenState::Idle | OvenState::Faulted => {}
        }
    }

    fn to_idle(&mut self, ambient: i64) {
        self.state = OvenState::Idle;
        self.current_temperature = ambient;
        self.target_temperature = None;
        self.cooldown_until = None;
        self.active_orders.clear();
        self.current_order_id = None;
    }

    fn sync_current_order(&mut self) {
        self.current_order_id = self.active_orders.first().copied();
    }
}

/// Proof of a successful claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimToken {
    pub oven_id: OvenId,
    pub temperature: i64,
    pub claimed_at: u64,
    /// When the preheat ramp reaches `temperature`.
    pub ready_at: u64,
}

pub struct OvenRegistry {
    ovens: BTreeMap<OvenId, Mutex<Oven>>,
    clock: Arc<dyn Clock>,
    ambient: i64,
    preheat_ms_per_degree: u64,
}

impl OvenRegistry {
    pub fn new(cfg: &KitchenConfig, clock: Arc<dyn Clock>) -> Self {
        let ovens = (1..=cfg.oven_count)
            .map(|n| {
                let id = OvenId::numbered(n);
                let oven = Oven::new(id.clone(), cfg.oven_capacity, cfg.ambient_temperature);
                (id, Mutex::new(oven))
            })
            .collect();
        Self {
            ovens,
            clock,
            ambient: cfg.ambient_temperature,
            preheat_ms_per_degree: cfg.preheat_ms_per_degree,
        }
    }

    pub fn len(&self) -> usize {
        self.ovens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ovens.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &OvenId> {
        self.ovens.keys()
    }

    /// Deterministic preheat time: |temperature − from| × ms-per-degree.
    pub fn preheat_ms(&self, from: i64, temperature: i64) -> u64 {
        (temperature - from).unsigned_abs() * self.preheat_ms_per_degree
    }

    fn slot(&self, id: &OvenId) -> Result<&Mutex<Oven>, EngineError> {
        self.ovens
            .get(id)
            .ok_or_else(|| EngineError::OvenNotFound(id.clone()))
    }

    /// Claim an idle oven and start preheating it.
    ///
    /// # Errors
    /// `OvenNotFound`, `OvenFaulted`, or `OvenBusy` for any state other than
    /// `Idle` (including an oven still cooling down).
    pub fn try_claim(&self, id: &OvenId, temperature: i64) -> Result<ClaimToken, EngineError> {
        let now = self.clock.now_ms();
        let mut oven = lock(self.slot(id)?);
        oven.refresh(now, self.ambient);

        match oven.state {
            OvenState::Idle => {}
            OvenState::Faulted => return Err(EngineError::OvenFaulted(id.clone())),
            OvenState::Heating | OvenState::Busy => return Err(EngineError::OvenBusy(id.clone())),
        }

        let ready_at = now + self.preheat_ms(oven.current_temperature, temperature);
        oven.state = OvenState::Heating;
        oven.ramp_from = oven.current_temperature;
        oven.target_temperature = Some(temperature);
        oven.heat_started_at = now;
        oven.ready_at = ready_at;
        oven.refresh(now, self.ambient);

        info!(oven = %id, temperature, ready_at, "oven claimed");
        Ok(ClaimToken {
            oven_id: id.clone(),
            temperature,
            claimed_at: now,
            ready_at,
        })
    }

    /// Claim the first idle oven, in id order.
    pub fn claim_any(&self, temperature: i64) -> Result<ClaimToken, EngineError> {
        for id in self.ovens.keys() {
            match self.try_claim(id, temperature) {
                Ok(token) => return Ok(token),
                Err(EngineError::OvenBusy(_) | EngineError::OvenFaulted(_)) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(EngineError::NoOvenAvailable)
    }

    /// Drop a claim. Idempotent; never clears `Faulted`, never cuts a
    /// cooldown short and never evicts cooking orders.
    pub fn release(&self, id: &OvenId) -> Result<(), EngineError> {
        let now = self.clock.now_ms();
        let mut oven = lock(self.slot(id)?);
        oven.refresh(now, self.ambient);

        match oven.state {
            OvenState::Idle | OvenState::Faulted => {}
            OvenState::Heating | OvenState::Busy => {
                if oven.active_orders.is_empty() && !oven.is_cooling_down() {
                    oven.to_idle(self.ambient);
                    debug!(oven = %id, "oven released");
                }
            }
        }
        Ok(())
    }

    /// Admit an order into a claimed oven. Returns the oven's fault count at
    /// admission.
    pub fn occupy(&self, id: &OvenId, order_id: OrderId) -> Result<u64, EngineError> {
        let now = self.clock.now_ms();
        let mut oven = lock(self.slot(id)?);
        oven.refresh(now, self.ambient);

        match oven.state {
            OvenState::Faulted => return Err(EngineError::OvenFaulted(id.clone())),
            OvenState::Idle => {
                return Err(EngineError::Internal(format!(
                    "oven {id} has no active claim"
                )))
            }
            OvenState::Busy
                if oven.is_cooling_down() || oven.active_orders.len() as u32 >= oven.capacity =>
            {
                return Err(EngineError::OvenBusy(id.clone()));
            }
            OvenState::Heating | OvenState::Busy => {}
        }

        if let Some(target) = oven.target_temperature {
            oven.current_temperature = target;
        }
        oven.state = OvenState::Busy;
        oven.active_orders.push(order_id);
        oven.sync_current_order();
        Ok(oven.fault_count)
    }

    /// Take a finished order out of the oven. When it was the last one the
    /// oven goes back to `Idle`, or stays `Busy` until the latest pending
    /// cooldown. A cooldown requested while other orders still cook is kept
    /// for when the oven empties.
    pub fn finish(
        &self,
        id: &OvenId,
        order_id: OrderId,
        cooldown_until: Option<u64>,
    ) -> Result<(), EngineError> {
        let now = self.clock.now_ms();
        let mut oven = lock(self.slot(id)?);
        oven.active_orders.retain(|o| *o != order_id);
        oven.sync_current_order();

        if oven.state != OvenState::Busy {
            return Ok(());
        }
        if let Some(until) = cooldown_until {
            oven.cooldown_until = oven.cooldown_until.max(Some(until));
        }
        if !oven.active_orders.is_empty() {
            oven.refresh(now, self.ambient);
            return Ok(());
        }

        match oven.cooldown_until {
            Some(until) if until > now => {
                info!(oven = %id, until, "oven cooling down");
            }
            _ => oven.to_idle(self.ambient),
        }
        Ok(())
    }

    /// Simulated hardware failure. Returns the orders that were cooking.
    pub fn mark_faulted(&self, id: &OvenId) -> Result<Vec<OrderId>, EngineError> {
        let mut oven = lock(self.slot(id)?);
        let in_flight = std::mem::take(&mut oven.active_orders);
        oven.state = OvenState::Faulted;
        oven.fault_count += 1;
        oven.cooldown_until = None;
        oven.current_order_id = None;
        warn!(oven = %id, in_flight = in_flight.len(), "oven FAULTED");
        Ok(in_flight)
    }

    /// Clear a fault. Returns `true` if the oven was faulted.
    pub fn reset(&self, id: &OvenId) -> Result<bool, EngineError> {
        let mut oven = lock(self.slot(id)?);
        if oven.state != OvenState::Faulted {
            return Ok(false);
        }
        oven.to_idle(self.ambient);
        info!(oven = %id, "oven reset");
        Ok(true)
    }

    pub fn fault_count(&self, id: &OvenId) -> Result<u64, EngineError> {
        Ok(lock(self.slot(id)?).fault_count)
    }

    pub fn get(&self, id: &OvenId) -> Result<Oven, EngineError> {
        let now = self.clock.now_ms();
        let mut oven = lock(self.slot(id)?);
        oven.refresh(now, self.ambient);
        Ok(oven.clone())
    }

    /// Detached copies of every oven as of now, in id order. Each call takes
    /// a fresh snapshot.
    pub fn snapshot(&self) -> impl Iterator<Item = Oven> {
        let now = self.clock.now_ms();
        self.ovens
            .values()
            .map(|slot| {
                let mut oven = lock(slot);
                oven.refresh(now, self.ambient);
                oven.clone()
            })
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Apply time-driven transitions to every oven.
    pub fn tick(&self) {
        let now = self.clock.now_ms();
        for slot in self.ovens.values() {
            lock(slot).refresh(now, self.ambient);
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
