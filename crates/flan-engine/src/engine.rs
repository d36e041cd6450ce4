//! Order engine: admission and the cooking simulation.
//!
//! # Advancement
//!
//! Orders do not run on their own. [`OrderEngine::advance`] looks at an order
//! at time `now` and applies whatever happened since it was last looked at:
//!
//! - progress checkpoints crossed before the order ended, one event each
//! - completion at `started + cook_duration`
//! - timeout at `started + estimate × timeout_factor`
//!
//! Whichever of completion and timeout comes first in simulated time wins,
//! no matter how late the order is observed. `tick()` and every read go
//! through the same path.
//!
//! # Locks
//!
//! order → session → oven. Table locks are only held to clone handles.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde_json::json;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, EventKind, NewEvent};
use crate::clock::Clock;
use crate::config::CookingConfig;
use crate::error::EngineError;
use crate::order::{
    cook_duration_ms, estimate_duration_ms, timeout_after_ms, CookEvent, NewOrder, Order,
    OrderSnapshot, OrderState, Priority,
};
use crate::oven::{OvenRegistry, OvenState};
use crate::recipe::RecipeCatalog;
use crate::session::{SessionManager, SessionState};
use crate::sync::{lock, read, write};
use crate::types::{OrderId, OvenId, SessionId};

pub struct OrderEngine {
    orders: RwLock<BTreeMap<OrderId, Arc<Mutex<Order>>>>,
    next_id: AtomicU64,
    sessions: Arc<SessionManager>,
    ovens: Arc<OvenRegistry>,
    catalog: Arc<dyn RecipeCatalog>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    cfg: CookingConfig,
}

impl OrderEngine {
    pub fn new(
        cfg: &CookingConfig,
        sessions: Arc<SessionManager>,
        ovens: Arc<OvenRegistry>,
        catalog: Arc<dyn RecipeCatalog>,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orders: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            sessions,
            ovens,
            catalog,
            bus,
            clock,
            cfg: cfg.clone(),
        }
    }

    /// Admit an order on a Ready session and start cooking it.
    ///
    /// Checks run in this order: recipe, portions, session exists, session
    /// Ready, oven occupancy. The first failure is returned.
    pub fn submit(
        &self,
        session_id: &SessionId,
        recipe_id: &str,
        portions: i64,
        priority: Priority,
    ) -> Result<OrderId, EngineError> {
        let recipe = self
            .catalog
            .lookup(recipe_id)
            .ok_or_else(|| EngineError::UnknownRecipe(recipe_id.to_string()))?;
        let portions = u32::try_from(portions)
            .ok()
            .filter(|p| *p > 0)
            .ok_or(EngineError::InvalidPortions(portions))?;

        let handle = self.sessions.handle(session_id)?;
        let now = self.clock.now_ms();

        let mut session = lock(&handle);
        self.sessions.refresh(&mut session, now);
        if session.state != SessionState::Ready {
            return Err(EngineError::SessionNotReady {
                id: *session_id,
                state: session.state,
            });
        }

        let id = OrderId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let fault_epoch = self.ovens.occupy(&session.oven_id, id)?;

        let estimate = estimate_duration_ms(&recipe, portions, priority, &self.cfg);
        let mut order = Order::new(NewOrder {
            id,
            recipe_id: recipe.id.clone(),
            oven_id: session.oven_id.clone(),
            session_id: *session_id,
            portions,
            priority,
            submitted_at: now,
            estimated_duration_ms: estimate,
            cook_duration_ms: cook_duration_ms(estimate, &recipe, session.requested_temperature),
            fault_epoch,
        });
        SessionManager::begin_order(&mut session, id);
        drop(session);

        self.bus.publish(NewEvent {
            order_id: id,
            kind: EventKind::Created,
            payload: json!({
                "recipe_id": recipe.id,
                "oven_id": order.oven_id,
                "portions": portions,
                "priority": priority,
                "estimated_duration_ms": estimate,
            }),
            timestamp_ms: now,
        });
        order.apply(&CookEvent::Start { at: now })?;

        info!(
            order = %id,
            recipe = %recipe.id,
            oven = %order.oven_id,
            portions,
            estimate_ms = estimate,
            "order submitted"
        );
        write(&self.orders).insert(id, Arc::new(Mutex::new(order)));
        Ok(id)
    }

    /// Current view of an order, advanced to now.
    pub fn get_status(&self, id: &OrderId) -> Result<OrderSnapshot, EngineError> {
        let handle = self.handle(id)?;
        let now = self.clock.now_ms();
        let mut order = lock(&handle);
        self.advance(&mut order, now);
        Ok(order.snapshot())
    }

    /// Every order, oldest first, advanced to now.
    pub fn list(&self) -> Vec<OrderSnapshot> {
        let now = self.clock.now_ms();
        self.handles()
            .into_iter()
            .map(|h| {
                let mut order = lock(&h);
                self.advance(&mut order, now);
                order.snapshot()
            })
            .collect()
    }

    /// Advance every live order, then sessions, then ovens.
    pub fn tick(&self) {
        let now = self.clock.now_ms();
        for handle in self.handles() {
            let mut order = lock(&handle);
            if !order.state.is_terminal() {
                self.advance(&mut order, now);
            }
        }
        self.sessions.tick();
        self.ovens.tick();
    }

    /// Fault an oven. Orders that finished before now are settled first;
    /// the ones still cooking fail. Returns the failed order ids.
    pub fn fault_oven(&self, oven_id: &OvenId) -> Result<Vec<OrderId>, EngineError> {
        let now = self.clock.now_ms();
        for handle in self.handles() {
            let mut order = lock(&handle);
            if order.oven_id == *oven_id && !order.state.is_terminal() {
                self.advance(&mut order, now);
            }
        }

        let in_flight = self.ovens.mark_faulted(oven_id)?;

        let mut failed = Vec::with_capacity(in_flight.len());
        for id in in_flight {
            let Ok(handle) = self.handle(&id) else {
                // Admitted but not yet in the table; it fails on first look.
                continue;
            };
            let mut order = lock(&handle);
            self.advance(&mut order, now);
            if order.state == OrderState::Failed {
                failed.push(id);
            }
        }
        Ok(failed)
    }

    /// Clear an oven fault. Sessions still bound to the faulted oven are
    /// closed first. Returns `true` if the oven was faulted.
    pub fn reset_oven(&self, oven_id: &OvenId) -> Result<bool, EngineError> {
        if self.ovens.get(oven_id)?.state != OvenState::Faulted {
            return Ok(false);
        }
        let closed = self.sessions.close_for_oven(oven_id);
        if !closed.is_empty() {
            debug!(oven = %oven_id, sessions = closed.len(), "closed sessions on reset");
        }
        self.ovens.reset(oven_id)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn handle(&self, id: &OrderId) -> Result<Arc<Mutex<Order>>, EngineError> {
        read(&self.orders)
            .get(id)
            .cloned()
            .ok_or(EngineError::OrderNotFound(*id))
    }

    fn handles(&self) -> Vec<Arc<Mutex<Order>>> {
        read(&self.orders).values().cloned().collect()
    }

    fn advance(&self, order: &mut Order, now: u64) {
        if order.state.is_terminal() {
            return;
        }
        let Some(started) = order.started_at else {
            return;
        };

        let deadline = timeout_after_ms(order.estimated_duration_ms, &self.cfg);
        let ends_at = match order.cook_duration_ms {
            Some(cook) if cook <= deadline => started + cook,
            _ => started + deadline,
        };
        self.emit_progress(order, started, now.min(ends_at));

        let faulted = self
            .ovens
            .fault_count(&order.oven_id)
            .map(|count| count != order.fault_epoch)
            .unwrap_or(true);
        if faulted {
            self.terminate(order, CookEvent::Fault { at: now });
            return;
        }

        if now < ends_at {
            if let Some(cook) = order.cook_duration_ms.filter(|c| *c > 0) {
                let pct = ((now - started) * 100 / cook).min(99) as u8;
                let _ = order.apply(&CookEvent::Progress { percent: pct });
            }
            return;
        }

        let completes = order
            .cook_duration_ms
            .is_some_and(|cook| cook <= deadline);
        let event = if completes {
            CookEvent::Complete { at: ends_at }
        } else {
            CookEvent::Timeout { at: ends_at }
        };
        self.terminate(order, event);
    }

    /// Publish a Progress event for every checkpoint crossed by `until`.
    fn emit_progress(&self, order: &mut Order, started: u64, until: u64) {
        let Some(cook) = order.cook_duration_ms else {
            return;
        };
        let elapsed = until.saturating_sub(started);
        while let Some(&checkpoint) = self.cfg.progress_checkpoints.get(order.checkpoints_seen) {
            let crossed_at = cook * u64::from(checkpoint) / 100;
            if crossed_at > elapsed {
                break;
            }
            order.checkpoints_seen += 1;
            let _ = order.apply(&CookEvent::Progress {
                percent: checkpoint,
            });
            self.bus.publish(NewEvent {
                order_id: order.id,
                kind: EventKind::Progress,
                payload: json!({
                    "percent": checkpoint,
                    "oven_id": order.oven_id,
                }),
                timestamp_ms: started + crossed_at,
            });
        }
    }

    fn terminate(&self, order: &mut Order, event: CookEvent) {
        if let Err(e) = order.apply(&event) {
            warn!(order = %order.id, error = %e, "order transition refused");
            return;
        }
        let at = order.completed_at.unwrap_or_else(|| self.clock.now_ms());

        let (kind, close_session, cooldown_until) = match order.state {
            OrderState::Done => (EventKind::Completed, true, None),
            OrderState::TimedOut => (EventKind::TimedOut, true, Some(at + self.cfg.cooldown_ms)),
            _ => (EventKind::Failed, false, None),
        };

        if let Ok(handle) = self.sessions.handle(&order.session_id) {
            let mut session = lock(&handle);
            self.sessions.finish_order(&mut session, at, close_session);
        }
        if order.state != OrderState::Failed {
            if let Err(e) = self.ovens.finish(&order.oven_id, order.id, cooldown_until) {
                warn!(order = %order.id, error = %e, "oven finish failed");
            }
        }

        let code = order.result_code.map(|c| c.code());
        match order.state {
            OrderState::Done => info!(order = %order.id, at, "order done"),
            OrderState::TimedOut => warn!(order = %order.id, at, "order TIMED OUT"),
            _ => warn!(order = %order.id, oven = %order.oven_id, at, "order FAILED"),
        }
        self.bus.publish(NewEvent {
            order_id: order.id,
            kind,
            payload: json!({
                "state": order.state,
                "result_code": code,
                "oven_id": order.oven_id,
            }),
            timestamp_ms: at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::EngineConfig;
    use crate::recipe::StaticCatalog;

    struct Rig {
        clock: Arc<ManualClock>,
        ovens: Arc<OvenRegistry>,
        sessions: Arc<SessionManager>,
        bus: Arc<EventBus>,
        engine: OrderEngine,
    }

    fn rig() -> Rig {
        let cfg = EngineConfig::default();
        let clock = Arc::new(ManualClock::new(0));
        let ovens = Arc::new(OvenRegistry::new(&cfg.kitchen, clock.clone()));
        let sessions = Arc::new(SessionManager::new(
            &cfg.kitchen,
            &cfg.packet,
            ovens.clone(),
            clock.clone(),
        ));
        let bus = Arc::new(EventBus::new(&cfg.events));
        let engine = OrderEngine::new(
            &cfg.cooking,
            sessions.clone(),
            ovens.clone(),
            Arc::new(StaticCatalog::standard()),
            bus.clone(),
            clock.clone(),
        );
        Rig {
            clock,
            ovens,
            sessions,
            bus,
            engine,
        }
    }

    #[test]
    fn late_fault_emits_no_progress_past_the_deadline() {
        let r = rig();
        let oven = OvenId::numbered(1);
        let session = r.sessions.open_session(Some(&oven), 60).unwrap();
        r.clock.set(r.sessions.get_session(&session).unwrap().ready_at);
        let started = r.clock.now_ms();

        // 13_333ms cook against a 10_000ms deadline
        let order = r
            .engine
            .submit(&session, "flan_chocolat", 1, Priority::Normal)
            .unwrap();

        // Fault the oven behind the engine's back, then look much later.
        r.ovens.mark_faulted(&oven).unwrap();
        r.clock.advance(60_000);
        assert_eq!(r.engine.get_status(&order).unwrap().state, OrderState::Failed);

        let events = r.bus.recent_events(50);
        let percents: Vec<u64> = events
            .iter()
            .filter(|e| e.kind == EventKind::Progress)
            .filter_map(|e| e.payload["percent"].as_u64())
            .collect();
        assert_eq!(percents, vec![25, 50, 75]);
        assert!(events
            .iter()
            .filter(|e| e.kind == EventKind::Progress)
            .all(|e| e.timestamp_ms <= started + 10_000));
        assert_eq!(events.last().map(|e| e.kind), Some(EventKind::Failed));
    }

    #[test]
    fn fault_before_any_checkpoint_emits_only_the_failure() {
        let r = rig();
        let oven = OvenId::numbered(2);
        let session = r.sessions.open_session(Some(&oven), 180).unwrap();
        r.clock.set(r.sessions.get_session(&session).unwrap().ready_at);

        let order = r
            .engine
            .submit(&session, "flan_vanille", 1, Priority::Normal)
            .unwrap();
        r.clock.advance(500);
        let failed = r.engine.fault_oven(&oven).unwrap();
        assert_eq!(failed, vec![order]);

        let kinds: Vec<EventKind> = r.bus.recent_events(50).iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Created, EventKind::Failed]);
    }
}
