//! Préchauffage: the two-phase handshake binding a client to an oven.
//!
//! ```text
//!   open_session ──► Pending ──(ready_at)──► Ready ──(expires_at, nothing cooking)──► Expired
//!                       │                      │
//!                       └──── close_session ───┴──────────────────────────────────► Closed
//! ```
//!
//! A session owns its oven claim for as long as it is Pending or Ready, which
//! is what keeps sessions per oven to at most one. Expiry and close hand the
//! claim back through [`OvenRegistry::release`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use flan_protocol::PacketLimits;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::KitchenConfig;
use crate::error::EngineError;
use crate::oven::OvenRegistry;
use crate::sync::{lock, read, write};
use crate::types::{OrderId, OvenId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Pending,
    Ready,
    Expired,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Pending => "pending",
            SessionState::Ready => "ready",
            SessionState::Expired => "expired",
            SessionState::Closed => "closed",
        }
    }

    /// Pending or Ready: the session still holds its oven.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Pending | SessionState::Ready)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub oven_id: OvenId,
    pub requested_temperature: i64,
    pub state: SessionState,
    pub created_at: u64,
    pub ready_at: u64,
    pub expires_at: u64,
    /// Orders admitted and not yet terminal.
    pub in_flight: u32,
    pub order_ids: Vec<OrderId>,
}

pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
    ovens: Arc<OvenRegistry>,
    clock: Arc<dyn Clock>,
    handshake_timeout_ms: u64,
    min_temperature: i64,
    max_temperature: i64,
}

impl SessionManager {
    pub fn new(
        kitchen: &KitchenConfig,
        limits: &PacketLimits,
        ovens: Arc<OvenRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ovens,
            clock,
            handshake_timeout_ms: kitchen.handshake_timeout_ms,
            min_temperature: limits.min_temperature,
            max_temperature: limits.max_temperature,
        }
    }

    /// Claim `oven_id` (or the first idle oven) and start preheating.
    ///
    /// Claim failures are returned as-is; nothing is retried.
    pub fn open_session(
        &self,
        oven_id: Option<&OvenId>,
        temperature: i64,
    ) -> Result<SessionId, EngineError> {
        if temperature < self.min_temperature || temperature > self.max_temperature {
            return Err(EngineError::InvalidTemperature(temperature));
        }

        let token = match oven_id {
            Some(id) => self.ovens.try_claim(id, temperature)?,
            None => self.ovens.claim_any(temperature)?,
        };

        let session = Session {
            id: SessionId::new_random(),
            oven_id: token.oven_id,
            requested_temperature: temperature,
            state: SessionState::Pending,
            created_at: token.claimed_at,
            ready_at: token.ready_at,
            expires_at: token.ready_at + self.handshake_timeout_ms,
            in_flight: 0,
            order_ids: Vec::new(),
        };
        let id = session.id;

        info!(
            session = %id,
            oven = %session.oven_id,
            temperature,
            ready_at = session.ready_at,
            "session opened"
        );
        write(&self.sessions).insert(id, Arc::new(Mutex::new(session)));
        Ok(id)
    }

    pub fn get_session(&self, id: &SessionId) -> Result<Session, EngineError> {
        let handle = self.handle(id)?;
        let mut session = lock(&handle);
        self.refresh(&mut session, self.clock.now_ms());
        Ok(session.clone())
    }

    /// Close a session. The oven is released right away unless an order is
    /// still cooking; in that case the order hands it back when it finishes.
    pub fn close_session(&self, id: &SessionId) -> Result<Session, EngineError> {
        let handle = self.handle(id)?;
        let mut session = lock(&handle);
        self.refresh(&mut session, self.clock.now_ms());
        if session.state.is_active() {
            self.close_locked(&mut session);
        }
        Ok(session.clone())
    }

    /// Apply Pending → Ready and Ready → Expired for every session.
    pub fn tick(&self) {
        let now = self.clock.now_ms();
        for handle in self.handles() {
            self.refresh(&mut lock(&handle), now);
        }
    }

    // -----------------------------------------------------------------------
    // Crate-internal: used by the order engine with the session lock held.
    // -----------------------------------------------------------------------

    pub(crate) fn handle(&self, id: &SessionId) -> Result<Arc<Mutex<Session>>, EngineError> {
        read(&self.sessions)
            .get(id)
            .cloned()
            .ok_or(EngineError::SessionNotFound(*id))
    }

    fn handles(&self) -> Vec<Arc<Mutex<Session>>> {
        read(&self.sessions).values().cloned().collect()
    }

    pub(crate) fn refresh(&self, session: &mut Session, now: u64) {
        if session.state == SessionState::Pending && now >= session.ready_at {
            session.state = SessionState::Ready;
            debug!(session = %session.id, "session ready");
        }
        if session.state == SessionState::Ready
            && session.in_flight == 0
            && now >= session.expires_at
        {
            session.state = SessionState::Expired;
            self.release_oven(session);
            info!(session = %session.id, oven = %session.oven_id, "session expired");
        }
    }

    pub(crate) fn begin_order(session: &mut Session, order_id: OrderId) {
        session.in_flight += 1;
        session.order_ids.push(order_id);
    }

    /// Record that an order reached a terminal state at `at`. With `close`
    /// the session ends; otherwise the expiry window restarts once nothing
    /// is cooking.
    pub(crate) fn finish_order(&self, session: &mut Session, at: u64, close: bool) {
        session.in_flight = session.in_flight.saturating_sub(1);
        if close {
            if session.state.is_active() {
                session.state = SessionState::Closed;
                info!(session = %session.id, "session closed after order");
            }
        } else if session.in_flight == 0 && session.state == SessionState::Ready {
            session.expires_at = at + self.handshake_timeout_ms;
        }
    }

    /// Close every active session bound to `oven_id`. Returns the closed ids.
    pub(crate) fn close_for_oven(&self, oven_id: &OvenId) -> Vec<SessionId> {
        let now = self.clock.now_ms();
        let mut closed = Vec::new();
        for handle in self.handles() {
            let mut session = lock(&handle);
            if session.oven_id != *oven_id {
                continue;
            }
            self.refresh(&mut session, now);
            if session.state.is_active() {
                self.close_locked(&mut session);
                closed.push(session.id);
            }
        }
        closed
    }

    fn close_locked(&self, session: &mut Session) {
        session.state = SessionState::Closed;
        if session.in_flight == 0 {
            self.release_oven(session);
        }
        info!(session = %session.id, oven = %session.oven_id, "session closed");
    }

    fn release_oven(&self, session: &Session) {
        // Oven ids in a session always come from the registry.
        let _ = self.ovens.release(&session.oven_id);
    }
}
