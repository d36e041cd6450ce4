//! Order state machine.
//!
//! # Design
//!
//! Every lifecycle change goes through [`Order::apply`], which enforces:
//!
//! 1. **Legal transitions only.** Anything else returns [`TransitionError`].
//! 2. **Terminal is final.** `Done`, `Failed` and `TimedOut` accept no event;
//!    the order is frozen once it reaches one of them.
//!
//! ```text
//!   submit     Start              Complete
//!   ─────► Submitted ──► Cooking ───────────► Done (term.)
//!              │           │ ▲
//!              │           └─┘ Progress
//!              │           │
//!              │           ├── Timeout ─────► TimedOut (term.)
//!              └───────────┴── Fault ───────► Failed (term.)
//! ```
//!
//! States are ranked so pollers can check that what they observe never goes
//! backwards.

use std::fmt;

use flan_protocol::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::CookingConfig;
use crate::error::status_for_state;
use crate::recipe::Recipe;
use crate::types::{OrderId, OvenId, SessionId};

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
        }
    }

    /// Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Some(Priority::Low),
            "NORMAL" => Some(Priority::Normal),
            "HIGH" => Some(Priority::High),
            _ => None,
        }
    }

    fn percent(&self, cfg: &CookingConfig) -> u64 {
        match self {
            Priority::Low => cfg.priority_low_percent,
            Priority::Normal => cfg.priority_normal_percent,
            Priority::High => cfg.priority_high_percent,
        }
    }
}

// ---------------------------------------------------------------------------
// OrderState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Submitted,
    Cooking,
    /// **Terminal.**
    Done,
    /// Oven faulted mid-cook. **Terminal.**
    Failed,
    /// Cooking ran past the timeout bound. **Terminal.**
    TimedOut,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::TimedOut)
    }

    /// Position in the lifecycle. All terminal states share the top rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Submitted => 0,
            Self::Cooking => 1,
            Self::Done | Self::Failed | Self::TimedOut => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Cooking => "cooking",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

// ---------------------------------------------------------------------------
// CookEvent
// ---------------------------------------------------------------------------

/// Events that drive an [`Order`]. `at` is simulated time in ms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookEvent {
    Start { at: u64 },
    Progress { percent: u8 },
    Complete { at: u64 },
    Fault { at: u64 },
    Timeout { at: u64 },
}

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

/// An event that cannot legally be applied in the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: OrderState,
    pub event: String,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal order transition: {:?} + {}", self.from, self.event)
    }
}

impl std::error::Error for TransitionError {}

// ---------------------------------------------------------------------------
// Estimates
// ---------------------------------------------------------------------------

/// `base × (100 + (portions−1) × step) / 100 × priority / 100`, integer math.
pub fn estimate_duration_ms(
    recipe: &Recipe,
    portions: u32,
    priority: Priority,
    cfg: &CookingConfig,
) -> u64 {
    let extra = u64::from(portions.saturating_sub(1)) * cfg.portion_step_percent;
    recipe.base_duration_ms * (100 + extra) / 100 * priority.percent(cfg) / 100
}

/// Simulated cook time at `temperature`. Below the recipe's required
/// temperature the estimate stretches by `required / temperature`; at or
/// below zero degrees nothing ever cooks.
pub fn cook_duration_ms(estimate_ms: u64, recipe: &Recipe, temperature: i64) -> Option<u64> {
    if temperature <= 0 {
        return None;
    }
    if temperature >= recipe.required_temperature {
        return Some(estimate_ms);
    }
    let required = recipe.required_temperature as u64;
    Some(estimate_ms * required / temperature as u64)
}

/// Deadline relative to cook start.
pub fn timeout_after_ms(estimate_ms: u64, cfg: &CookingConfig) -> u64 {
    estimate_ms * cfg.timeout_factor_percent / 100
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// Fields fixed at admission.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub recipe_id: String,
    pub oven_id: OvenId,
    pub session_id: SessionId,
    pub portions: u32,
    pub priority: Priority,
    pub submitted_at: u64,
    pub estimated_duration_ms: u64,
    pub cook_duration_ms: Option<u64>,
    pub fault_epoch: u64,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub recipe_id: String,
    pub oven_id: OvenId,
    pub session_id: SessionId,
    pub portions: u32,
    pub priority: Priority,
    pub state: OrderState,
    pub submitted_at: u64,
    pub started_at: Option<u64>,
    pub estimated_duration_ms: u64,
    /// `None` when the session temperature can never cook the recipe.
    pub cook_duration_ms: Option<u64>,
    pub progress_percent: u8,
    pub result_code: Option<StatusCode>,
    pub completed_at: Option<u64>,
    /// Oven fault count at admission.
    pub(crate) fault_epoch: u64,
    /// Progress checkpoints already published.
    pub(crate) checkpoints_seen: usize,
}

impl Order {
    pub fn new(new: NewOrder) -> Self {
        Self {
            id: new.id,
            recipe_id: new.recipe_id,
            oven_id: new.oven_id,
            session_id: new.session_id,
            portions: new.portions,
            priority: new.priority,
            state: OrderState::Submitted,
            submitted_at: new.submitted_at,
            started_at: None,
            estimated_duration_ms: new.estimated_duration_ms,
            cook_duration_ms: new.cook_duration_ms,
            progress_percent: 0,
            result_code: None,
            completed_at: None,
            fault_epoch: new.fault_epoch,
            checkpoints_seen: 0,
        }
    }

    /// # Errors
    /// [`TransitionError`] for any event not legal in the current state.
    pub fn apply(&mut self, event: &CookEvent) -> Result<(), TransitionError> {
        use CookEvent::*;
        use OrderState::*;

        match (self.state, event) {
            (Submitted, Start { at }) => {
                self.state = Cooking;
                self.started_at = Some(*at);
            }

            // Progress never moves backwards and never claims 100 before Done.
            (Cooking, Progress { percent }) => {
                self.progress_percent = self.progress_percent.max((*percent).min(99));
            }

            (Submitted | Cooking, Complete { at }) => {
                self.progress_percent = 100;
                self.finish(Done, *at);
            }
            (Submitted | Cooking, Fault { at }) => self.finish(Failed, *at),
            (Submitted | Cooking, Timeout { at }) => self.finish(TimedOut, *at),

            (from, ev) => {
                return Err(TransitionError {
                    from,
                    event: format!("{ev:?}"),
                })
            }
        }
        Ok(())
    }

    fn finish(&mut self, state: OrderState, at: u64) {
        self.state = state;
        self.completed_at = Some(at);
        self.result_code = Some(status_for_state(state));
    }

    pub fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            id: self.id,
            recipe_id: self.recipe_id.clone(),
            oven_id: self.oven_id.clone(),
            session_id: self.session_id,
            portions: self.portions,
            priority: self.priority,
            state: self.state,
            status: status_for_state(self.state),
            submitted_at: self.submitted_at,
            estimated_duration_ms: self.estimated_duration_ms,
            cook_duration_ms: self.cook_duration_ms,
            progress_percent: self.progress_percent,
            result_code: self.result_code,
            completed_at: self.completed_at,
        }
    }
}

/// Read-only copy handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub recipe_id: String,
    pub oven_id: OvenId,
    pub session_id: SessionId,
    pub portions: u32,
    pub priority: Priority,
    pub state: OrderState,
    /// Code a poll reports right now.
    pub status: StatusCode,
    pub submitted_at: u64,
    pub estimated_duration_ms: u64,
    pub cook_duration_ms: Option<u64>,
    pub progress_percent: u8,
    /// Final code, set once terminal.
    pub result_code: Option<StatusCode>,
    pub completed_at: Option<u64>,
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
