//! FLAN status-code taxonomy.
//!
//! The code table is part of the wire contract and must not change:
//!
//! | Class        | Code | Name               |
//! |--------------|------|--------------------|
//! | success      | 200  | Perfect Flan       |
//! | success      | 201  | Flan Created       |
//! | success      | 204  | Empty Mold         |
//! | redirect     | 301  | Moved Kitchen      |
//! | redirect     | 302  | Oven Busy          |
//! | client error | 400  | Bad Recipe         |
//! | client error | 401  | Kitchen Locked     |
//! | client error | 403  | Secret Recipe      |
//! | client error | 404  | Flan Not Found     |
//! | client error | 408  | Cooking Timeout    |
//! | client error | 418  | I'm a Teapot       |
//! | client error | 429  | Too Many Orders    |
//! | server error | 500  | Oven Broken        |
//! | server error | 503  | Kitchen Closed     |
//! | server error | 504  | Oven Timeout       |
//!
//! [`map`] is the single outcome → code function. It has no state; the same
//! [`Outcome`] always yields the same [`StatusCode`] and label.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::packet::{PacketError, PacketErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Success,
    Redirect,
    ClientError,
    ServerError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusCode {
    PerfectFlan,
    FlanCreated,
    EmptyMold,
    MovedKitchen,
    OvenBusy,
    BadRecipe,
    KitchenLocked,
    SecretRecipe,
    FlanNotFound,
    CookingTimeout,
    Teapot,
    TooManyOrders,
    OvenBroken,
    KitchenClosed,
    OvenTimeout,
}

impl StatusCode {
    /// Every code, in ascending numeric order.
    pub const ALL: [StatusCode; 15] = [
        StatusCode::PerfectFlan,
        StatusCode::FlanCreated,
        StatusCode::EmptyMold,
        StatusCode::MovedKitchen,
        StatusCode::OvenBusy,
        StatusCode::BadRecipe,
        StatusCode::KitchenLocked,
        StatusCode::SecretRecipe,
        StatusCode::FlanNotFound,
        StatusCode::CookingTimeout,
        StatusCode::Teapot,
        StatusCode::TooManyOrders,
        StatusCode::OvenBroken,
        StatusCode::KitchenClosed,
        StatusCode::OvenTimeout,
    ];

    pub fn code(&self) -> u16 {
        match self {
            StatusCode::PerfectFlan => 200,
            StatusCode::FlanCreated => 201,
            StatusCode::EmptyMold => 204,
            StatusCode::MovedKitchen => 301,
            StatusCode::OvenBusy => 302,
            StatusCode::BadRecipe => 400,
            StatusCode::KitchenLocked => 401,
            StatusCode::SecretRecipe => 403,
            StatusCode::FlanNotFound => 404,
            StatusCode::CookingTimeout => 408,
            StatusCode::Teapot => 418,
            StatusCode::TooManyOrders => 429,
            StatusCode::OvenBroken => 500,
            StatusCode::KitchenClosed => 503,
            StatusCode::OvenTimeout => 504,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StatusCode::PerfectFlan => "Perfect Flan",
            StatusCode::FlanCreated => "Flan Created",
            StatusCode::EmptyMold => "Empty Mold",
            StatusCode::MovedKitchen => "Moved Kitchen",
            StatusCode::OvenBusy => "Oven Busy",
            StatusCode::BadRecipe => "Bad Recipe",
            StatusCode::KitchenLocked => "Kitchen Locked",
            StatusCode::SecretRecipe => "Secret Recipe",
            StatusCode::FlanNotFound => "Flan Not Found",
            StatusCode::CookingTimeout => "Cooking Timeout",
            StatusCode::Teapot => "I'm a Teapot",
            StatusCode::TooManyOrders => "Too Many Orders",
            StatusCode::OvenBroken => "Oven Broken",
            StatusCode::KitchenClosed => "Kitchen Closed",
            StatusCode::OvenTimeout => "Oven Timeout",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StatusCode::PerfectFlan => "total success, ideal texture",
            StatusCode::FlanCreated => "resource created",
            StatusCode::EmptyMold => "success, empty body",
            StatusCode::MovedKitchen => "permanent move",
            StatusCode::OvenBusy => "resource temporarily busy",
            StatusCode::BadRecipe => "malformed request",
            StatusCode::KitchenLocked => "auth required",
            StatusCode::SecretRecipe => "access denied",
            StatusCode::FlanNotFound => "resource not found",
            StatusCode::CookingTimeout => "processing timeout",
            StatusCode::Teapot => "I'm a teapot, not a flan oven",
            StatusCode::TooManyOrders => "rate limited",
            StatusCode::OvenBroken => "internal failure",
            StatusCode::KitchenClosed => "service unavailable",
            StatusCode::OvenTimeout => "gateway timeout",
        }
    }

    pub fn class(&self) -> StatusClass {
        match self.code() {
            200..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirect,
            400..=499 => StatusClass::ClientError,
            _ => StatusClass::ServerError,
        }
    }

    pub fn is_success(&self) -> bool {
        self.class() == StatusClass::Success
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.code() == code)
    }

    /// The easter egg. Always 418, touches nothing.
    pub fn teapot() -> Self {
        StatusCode::Teapot
    }

    pub fn line(&self) -> StatusLine {
        StatusLine {
            code: self.code(),
            name: self.name(),
            description: self.description(),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.name())
    }
}

/// Serializable `{code, name, description}` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub code: u16,
    pub name: &'static str,
    pub description: &'static str,
}

impl Serialize for StatusCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u16::deserialize(deserializer)?;
        StatusCode::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown FLAN status code {code}")))
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Internal outcome kinds. Each maps to exactly one [`StatusCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Created,
    NoContent,
    Relocated,
    TemporarilyBusy,
    Malformed,
    Unauthenticated,
    Forbidden,
    NotFound,
    ProcessingTimeout,
    Teapot,
    RateLimited,
    Internal,
    Unavailable,
    UpstreamTimeout,
}

/// Outcome → status code. Total and deterministic.
pub fn map(outcome: Outcome) -> StatusCode {
    match outcome {
        Outcome::Success => StatusCode::PerfectFlan,
        Outcome::Created => StatusCode::FlanCreated,
        Outcome::NoContent => StatusCode::EmptyMold,
        Outcome::Relocated => StatusCode::MovedKitchen,
        Outcome::TemporarilyBusy => StatusCode::OvenBusy,
        Outcome::Malformed => StatusCode::BadRecipe,
        Outcome::Unauthenticated => StatusCode::KitchenLocked,
        Outcome::Forbidden => StatusCode::SecretRecipe,
        Outcome::NotFound => StatusCode::FlanNotFound,
        Outcome::ProcessingTimeout => StatusCode::CookingTimeout,
        Outcome::Teapot => StatusCode::Teapot,
        Outcome::RateLimited => StatusCode::TooManyOrders,
        Outcome::Internal => StatusCode::OvenBroken,
        Outcome::Unavailable => StatusCode::KitchenClosed,
        Outcome::UpstreamTimeout => StatusCode::OvenTimeout,
    }
}

impl From<&PacketError> for Outcome {
    fn from(err: &PacketError) -> Self {
        match err.kind {
            PacketErrorKind::ExpiredTtl => Outcome::ProcessingTimeout,
            PacketErrorKind::MalformedHeader
            | PacketErrorKind::SizeOutOfRange
            | PacketErrorKind::TemperatureOutOfRange
            | PacketErrorKind::ChecksumMismatch => Outcome::Malformed,
        }
    }
}
