//! Engine error taxonomy.
//!
//! Every variant maps to exactly one [`Outcome`] and therefore one
//! [`StatusCode`]. Timeouts are not errors: a timed-out order is a terminal
//! state, readable through `get_status`.

use std::fmt;

use flan_protocol::{map, Outcome, StatusCode};

use crate::order::{OrderState, TransitionError};
use crate::session::SessionState;
use crate::types::{OrderId, OvenId, SessionId};

/// Coarse error class, used for logging and caller retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Bad input. Never retried.
    Validation,
    /// Oven busy / faulted / missing. The caller may retry elsewhere.
    ResourceContention,
    /// Unknown session, order or recipe. Terminal.
    NotFound,
    /// Something inside the engine broke.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    OvenNotFound(OvenId),
    OvenBusy(OvenId),
    /// Auto-selection found no idle oven.
    NoOvenAvailable,
    OvenFaulted(OvenId),
    SessionNotFound(SessionId),
    SessionNotReady { id: SessionId, state: SessionState },
    OrderNotFound(OrderId),
    UnknownRecipe(String),
    InvalidPortions(i64),
    InvalidTemperature(i64),
    InvalidConfig(String),
    Transition(TransitionError),
    Internal(String),
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::InvalidPortions(_)
            | EngineError::InvalidTemperature(_)
            | EngineError::InvalidConfig(_) => ErrorClass::Validation,
            EngineError::OvenNotFound(_)
            | EngineError::OvenBusy(_)
            | EngineError::NoOvenAvailable
            | EngineError::OvenFaulted(_)
            | EngineError::SessionNotReady { .. } => ErrorClass::ResourceContention,
            EngineError::SessionNotFound(_)
            | EngineError::OrderNotFound(_)
            | EngineError::UnknownRecipe(_) => ErrorClass::NotFound,
            EngineError::Transition(_) | EngineError::Internal(_) => ErrorClass::Internal,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            EngineError::OvenBusy(_) | EngineError::NoOvenAvailable => Outcome::TemporarilyBusy,
            EngineError::OvenFaulted(_) => Outcome::Unavailable,
            EngineError::OvenNotFound(_)
            | EngineError::SessionNotFound(_)
            | EngineError::OrderNotFound(_)
            | EngineError::UnknownRecipe(_) => Outcome::NotFound,
            EngineError::SessionNotReady { .. } => Outcome::Unauthenticated,
            EngineError::InvalidPortions(_) | EngineError::InvalidTemperature(_) => {
                Outcome::Malformed
            }
            EngineError::InvalidConfig(_)
            | EngineError::Transition(_)
            | EngineError::Internal(_) => Outcome::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        map(self.outcome())
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::OvenNotFound(id) => write!(f, "oven {id} not found"),
            EngineError::OvenBusy(id) => write!(f, "oven {id} is busy"),
            EngineError::NoOvenAvailable => write!(f, "all ovens are busy"),
            EngineError::OvenFaulted(id) => write!(f, "oven {id} is faulted"),
            EngineError::SessionNotFound(id) => write!(f, "session {id} not found"),
            EngineError::SessionNotReady { id, state } => {
                write!(f, "session {id} is not ready (state={})", state.as_str())
            }
            EngineError::OrderNotFound(id) => write!(f, "order {id} not found"),
            EngineError::UnknownRecipe(id) => write!(f, "recipe {id:?} not in catalog"),
            EngineError::InvalidPortions(n) => write!(f, "portions must be > 0 (got {n})"),
            EngineError::InvalidTemperature(t) => write!(f, "temperature {t} out of range"),
            EngineError::InvalidConfig(msg) => write!(f, "invalid engine config: {msg}"),
            EngineError::Transition(e) => write!(f, "{e}"),
            EngineError::Internal(msg) => write!(f, "internal engine error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<TransitionError> for EngineError {
    fn from(e: TransitionError) -> Self {
        EngineError::Transition(e)
    }
}

/// Status code reported for an order in `state`.
///
/// Terminal states carry their own result code; live orders poll as 200.
pub(crate) fn status_for_state(state: OrderState) -> StatusCode {
    match state {
        OrderState::Submitted | OrderState::Cooking | OrderState::Done => {
            map(Outcome::Success)
        }
        OrderState::TimedOut => map(Outcome::ProcessingTimeout),
        OrderState::Failed => map(Outcome::Internal),
    }
}
