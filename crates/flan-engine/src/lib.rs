//! flan-engine
//!
//! The FLAN protocol/session engine:
//! - `OvenRegistry`: fixed set of ovens, each an Idle/Heating/Busy/Faulted machine
//! - `SessionManager`: the préchauffage handshake (Pending → Ready → Expired)
//! - `OrderEngine`: order lifecycle (Submitted → Cooking → Done | Failed | TimedOut)
//! - `EventBus`: sequenced lifecycle events, broadcast fan-out plus bounded history
//!
//! `Kitchen` wires them together around an injectable `Clock`. Nothing here
//! sleeps or spawns. Time only moves when the clock says so, and state only
//! advances on `tick()` or on reads.

mod bus;
mod clock;
mod config;
mod engine;
mod error;
mod kitchen;
mod oven;
mod recipe;
mod session;
mod sync;
mod types;

pub mod order;

pub use bus::{Event, EventBus, EventKind, NewEvent};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CookingConfig, EngineConfig, EventsConfig, KitchenConfig};
pub use engine::OrderEngine;
pub use error::{EngineError, ErrorClass};
pub use kitchen::Kitchen;
pub use order::{OrderSnapshot, OrderState, Priority};
pub use oven::{ClaimToken, Oven, OvenRegistry, OvenState};
pub use recipe::{Recipe, RecipeCatalog, StaticCatalog};
pub use session::{Session, SessionManager, SessionState};
pub use types::{OrderId, OvenId, SessionId};
