//! Order lifecycle event bus.
//!
//! `publish` stamps each event with the next sequence number and fans it out
//! over a tokio broadcast channel. A bounded history backs `recent_events`.
//! Sequence assignment, history append and send happen under one lock, so
//! every subscriber sees events in sequence order.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use crate::config::EventsConfig;
use crate::sync::lock;
use crate::types::OrderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Progress,
    Completed,
    Failed,
    TimedOut,
}

/// An event before the bus has sequenced it.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub order_id: OrderId,
    pub kind: EventKind,
    pub payload: Value,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub sequence_number: u64,
    pub order_id: OrderId,
    pub kind: EventKind,
    pub payload: Value,
    pub timestamp_ms: u64,
}

struct Inner {
    next_seq: u64,
    history: VecDeque<Event>,
}

pub struct EventBus {
    tx: broadcast::Sender<Event>,
    inner: Mutex<Inner>,
    history_limit: usize,
}

impl EventBus {
    pub fn new(cfg: &EventsConfig) -> Self {
        let (tx, _rx) = broadcast::channel(cfg.channel_capacity.max(1));
        Self {
            tx,
            inner: Mutex::new(Inner {
                next_seq: 1,
                history: VecDeque::with_capacity(cfg.history_limit),
            }),
            history_limit: cfg.history_limit,
        }
    }

    /// Sequence and broadcast `event`. Never blocks on subscribers.
    pub fn publish(&self, event: NewEvent) -> Event {
        let mut inner = lock(&self.inner);
        let event = Event {
            sequence_number: inner.next_seq,
            order_id: event.order_id,
            kind: event.kind,
            payload: event.payload,
            timestamp_ms: event.timestamp_ms,
        };
        inner.next_seq += 1;

        if self.history_limit > 0 {
            if inner.history.len() == self.history_limit {
                inner.history.pop_front();
            }
            inner.history.push_back(event.clone());
        }

        // No receivers is fine.
        let _ = self.tx.send(event.clone());
        event
    }

    /// Events published from now on. Never ends; a subscriber that falls
    /// behind skips what it missed.
    pub fn subscribe(&self) -> impl Stream<Item = Event> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|msg| async move {
            match msg {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                    None
                }
            }
        })
    }

    /// Up to `limit` most recent events, oldest first.
    pub fn recent_events(&self, limit: usize) -> Vec<Event> {
        let inner = lock(&self.inner);
        let skip = inner.history.len().saturating_sub(limit);
        inner.history.iter().skip(skip).cloned().collect()
    }

    /// Events currently retained in history.
    pub fn history_len(&self) -> usize {
        lock(&self.inner).history.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
