//! `Kitchen`: the owned context every caller goes through.
//!
//! Builds the registry, session manager, order engine and bus from one
//! validated [`EngineConfig`] around a shared [`Clock`]. No globals; two
//! kitchens in one process share nothing.

use std::sync::Arc;

use flan_protocol::{validate, PacketError, PacketLimits, StatusCode, ValidPacket};
use futures_util::Stream;
use serde_json::Value;
use tracing::info;

use crate::bus::{Event, EventBus};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::engine::OrderEngine;
use crate::error::EngineError;
use crate::order::{OrderSnapshot, Priority};
use crate::oven::{Oven, OvenRegistry};
use crate::recipe::{Recipe, RecipeCatalog};
use crate::session::{Session, SessionManager};
use crate::types::{OrderId, OvenId, SessionId};

pub struct Kitchen {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    catalog: Arc<dyn RecipeCatalog>,
    ovens: Arc<OvenRegistry>,
    sessions: Arc<SessionManager>,
    orders: OrderEngine,
    bus: Arc<EventBus>,
}

impl Kitchen {
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        catalog: Arc<dyn RecipeCatalog>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let ovens = Arc::new(OvenRegistry::new(&config.kitchen, clock.clone()));
        let sessions = Arc::new(SessionManager::new(
            &config.kitchen,
            &config.packet,
            ovens.clone(),
            clock.clone(),
        ));
        let bus = Arc::new(EventBus::new(&config.events));
        let orders = OrderEngine::new(
            &config.cooking,
            sessions.clone(),
            ovens.clone(),
            catalog.clone(),
            bus.clone(),
            clock.clone(),
        );

        info!(
            ovens = ovens.len(),
            recipes = catalog.list().len(),
            "kitchen ready"
        );
        Ok(Self {
            config,
            clock,
            catalog,
            ovens,
            sessions,
            orders,
            bus,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn packet_limits(&self) -> &PacketLimits {
        &self.config.packet
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    // --- packets ---------------------------------------------------------

    pub fn validate_packet(&self, raw: &Value, body: &str) -> Result<ValidPacket, PacketError> {
        validate(raw, body, &self.config.packet)
    }

    // --- sessions --------------------------------------------------------

    pub fn open_session(
        &self,
        oven_id: Option<&OvenId>,
        temperature: i64,
    ) -> Result<SessionId, EngineError> {
        self.sessions.open_session(oven_id, temperature)
    }

    pub fn get_session(&self, id: &SessionId) -> Result<Session, EngineError> {
        self.sessions.get_session(id)
    }

    pub fn close_session(&self, id: &SessionId) -> Result<Session, EngineError> {
        self.sessions.close_session(id)
    }

    // --- orders ----------------------------------------------------------

    pub fn submit(
        &self,
        session_id: &SessionId,
        recipe_id: &str,
        portions: i64,
        priority: Priority,
    ) -> Result<OrderId, EngineError> {
        self.orders.submit(session_id, recipe_id, portions, priority)
    }

    pub fn get_status(&self, id: &OrderId) -> Result<OrderSnapshot, EngineError> {
        self.orders.get_status(id)
    }

    pub fn orders(&self) -> Vec<OrderSnapshot> {
        self.orders.list()
    }

    /// Orders, sessions, ovens: apply everything time has made due.
    pub fn tick(&self) {
        self.orders.tick();
    }

    // --- ovens -----------------------------------------------------------

    pub fn ovens(&self) -> Vec<Oven> {
        self.ovens.snapshot().collect()
    }

    pub fn oven(&self, id: &OvenId) -> Result<Oven, EngineError> {
        self.ovens.get(id)
    }

    pub fn fault_oven(&self, id: &OvenId) -> Result<Vec<OrderId>, EngineError> {
        self.orders.fault_oven(id)
    }

    pub fn reset_oven(&self, id: &OvenId) -> Result<bool, EngineError> {
        self.orders.reset_oven(id)
    }

    // --- catalog / events --------------------------------------------------

    pub fn recipes(&self) -> Vec<Recipe> {
        self.catalog.list()
    }

    pub fn recipe(&self, id: &str) -> Option<Recipe> {
        self.catalog.lookup(id)
    }

    pub fn subscribe(&self) -> impl Stream<Item = Event> + Send + 'static {
        self.bus.subscribe()
    }

    pub fn recent_events(&self, limit: usize) -> Vec<Event> {
        self.bus.recent_events(limit)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// 418. Reads nothing, changes nothing.
    pub fn teapot(&self) -> StatusCode {
        StatusCode::teapot()
    }
}
