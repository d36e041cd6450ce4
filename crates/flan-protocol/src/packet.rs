//! Packet header validation.
//!
//! # Check order
//!
//! 1. `ttl`: an expired packet is rejected before anything else is looked at,
//!    even when other fields are malformed.
//! 2. Field parsing: every required field must be present and of the
//!    declared type; `version` must match the configured protocol version.
//! 3. Bounds: `size_ml` against `max_size_ml`, `temperature` against the
//!    configured range.
//! 4. Checksum: recomputed over the body and compared with the declared one.
//!
//! [`validate`] is a pure function of `(raw header, body, limits)`: the same
//! bytes always produce the same result.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Current protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Number of hex digits kept from the SHA-256 digest.
const CHECKSUM_HEX_LEN: usize = 8;

// ---------------------------------------------------------------------------
// RequestType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    Handshake,
    Order,
    Poll,
    Ping,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Handshake => "HANDSHAKE",
            RequestType::Order => "ORDER",
            RequestType::Poll => "POLL",
            RequestType::Ping => "PING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HANDSHAKE" => Some(RequestType::Handshake),
            "ORDER" => Some(RequestType::Order),
            "POLL" => Some(RequestType::Poll),
            "PING" => Some(RequestType::Ping),
            _ => None,
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PacketLimits
// ---------------------------------------------------------------------------

/// Configured bounds applied by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketLimits {
    pub protocol_version: u32,
    pub max_size_ml: u64,
    pub min_temperature: i64,
    pub max_temperature: i64,
}

impl Default for PacketLimits {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            max_size_ml: 4096,
            min_temperature: 0,
            max_temperature: 300,
        }
    }
}

impl PacketLimits {
    pub fn temperature_in_range(&self, temperature: i64) -> bool {
        (self.min_temperature..=self.max_temperature).contains(&temperature)
    }
}

// ---------------------------------------------------------------------------
// PacketError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketErrorKind {
    MalformedHeader,
    SizeOutOfRange,
    TemperatureOutOfRange,
    ExpiredTtl,
    ChecksumMismatch,
}

impl PacketErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketErrorKind::MalformedHeader => "MALFORMED_HEADER",
            PacketErrorKind::SizeOutOfRange => "SIZE_OUT_OF_RANGE",
            PacketErrorKind::TemperatureOutOfRange => "TEMPERATURE_OUT_OF_RANGE",
            PacketErrorKind::ExpiredTtl => "EXPIRED_TTL",
            PacketErrorKind::ChecksumMismatch => "CHECKSUM_MISMATCH",
        }
    }
}

/// Rejection produced by [`validate`] or [`ValidPacket::hop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketError {
    pub kind: PacketErrorKind,
    pub detail: String,
}

impl PacketError {
    fn new(kind: PacketErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    fn malformed(detail: impl Into<String>) -> Self {
        Self::new(PacketErrorKind::MalformedHeader, detail)
    }
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.detail)
    }
}

impl std::error::Error for PacketError {}

// ---------------------------------------------------------------------------
// PacketHeader
// ---------------------------------------------------------------------------

/// Parsed header of a FLAN packet. Field names are the wire names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketHeader {
    pub version: u32,
    pub request_type: RequestType,
    pub size_ml: u64,
    pub temperature: i64,
    pub ttl: u32,
    pub source_id: String,
    pub dest_id: String,
    pub checksum: String,
}

/// Optional header values used when sealing an outbound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealOptions {
    pub ttl: u32,
    pub temperature: i64,
    pub source_id: String,
    pub dest_id: String,
}

impl Default for SealOptions {
    fn default() -> Self {
        Self {
            ttl: 30,
            temperature: 180,
            source_id: "127.0.0.1".to_string(),
            dest_id: "127.0.0.1".to_string(),
        }
    }
}

impl PacketHeader {
    /// Build a header for `body` with size and checksum filled in.
    pub fn seal(request_type: RequestType, body: &str, opts: SealOptions) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            request_type,
            size_ml: body.len() as u64,
            temperature: opts.temperature,
            ttl: opts.ttl,
            source_id: opts.source_id,
            dest_id: opts.dest_id,
            checksum: checksum(PROTOCOL_VERSION, request_type, body),
        }
    }

    /// Wire form of this header (a JSON object).
    pub fn to_raw(&self) -> Value {
        // Plain struct of scalars: serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Texture checksum: first 8 uppercase hex digits of
/// `SHA-256(version || request_type || body)`.
pub fn checksum(version: u32, request_type: RequestType, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(version.to_string().as_bytes());
    hasher.update(request_type.as_str().as_bytes());
    hasher.update(body.as_bytes());
    let digest = hasher.finalize();
    let mut out = hex::encode_upper(digest);
    out.truncate(CHECKSUM_HEX_LEN);
    out
}

// ---------------------------------------------------------------------------
// ValidPacket
// ---------------------------------------------------------------------------

/// A packet that passed [`validate`]. Only constructible through validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPacket {
    header: PacketHeader,
    body: String,
}

impl ValidPacket {
    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn request_type(&self) -> RequestType {
        self.header.request_type
    }

    pub fn into_parts(self) -> (PacketHeader, String) {
        (self.header, self.body)
    }

    /// Forward the packet one hop. The packet dies when its ttl reaches 0.
    pub fn hop(mut self) -> Result<ValidPacket, PacketError> {
        let remaining = self.header.ttl.saturating_sub(1);
        if remaining == 0 {
            return Err(PacketError::new(
                PacketErrorKind::ExpiredTtl,
                "ttl exhausted in transit",
            ));
        }
        self.header.ttl = remaining;
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

/// Any numeric ttl at or below zero is expired: integers, floats, values
/// beyond i64, and numeric strings. A string ttl is still malformed when it
/// is positive.
fn ttl_expired(ttl: &Value) -> bool {
    let n = match ttl {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.is_some_and(|n| n <= 0.0)
}

/// Validate a raw header (JSON object) against `body` and `limits`.
pub fn validate(raw: &Value, body: &str, limits: &PacketLimits) -> Result<ValidPacket, PacketError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| PacketError::malformed("header must be an object"))?;

    // Expired ttl wins over every other defect.
    if let Some(ttl) = obj.get("ttl").filter(|v| ttl_expired(v)) {
        return Err(PacketError::new(
            PacketErrorKind::ExpiredTtl,
            format!("ttl={ttl}"),
        ));
    }

    let version = int_field(obj, "version")?;
    if version != i64::from(limits.protocol_version) {
        return Err(PacketError::malformed(format!(
            "unsupported version {version} (expected {})",
            limits.protocol_version
        )));
    }

    let request_type_raw = str_field(obj, "request_type")?;
    let request_type = RequestType::parse(request_type_raw).ok_or_else(|| {
        PacketError::malformed(format!("unknown request_type {request_type_raw:?}"))
    })?;

    let size_ml = int_field(obj, "size_ml")?;
    if size_ml < 0 {
        return Err(PacketError::malformed("size_ml must be non-negative"));
    }
    let temperature = int_field(obj, "temperature")?;
    let ttl = int_field(obj, "ttl")?;
    let ttl = u32::try_from(ttl).map_err(|_| PacketError::malformed("ttl out of range"))?;
    let source_id = str_field(obj, "source_id")?.to_string();
    let dest_id = str_field(obj, "dest_id")?.to_string();
    let declared = str_field(obj, "checksum")?.to_string();

    let size_ml = size_ml as u64;
    if size_ml > limits.max_size_ml {
        return Err(PacketError::new(
            PacketErrorKind::SizeOutOfRange,
            format!("size_ml={size_ml} exceeds max {}", limits.max_size_ml),
        ));
    }

    if !limits.temperature_in_range(temperature) {
        return Err(PacketError::new(
            PacketErrorKind::TemperatureOutOfRange,
            format!(
                "temperature={temperature} outside {}..={}",
                limits.min_temperature, limits.max_temperature
            ),
        ));
    }

    let computed = checksum(limits.protocol_version, request_type, body);
    if !computed.eq_ignore_ascii_case(declared.trim()) {
        return Err(PacketError::new(
            PacketErrorKind::ChecksumMismatch,
            "texture verification failed",
        ));
    }

    Ok(ValidPacket {
        header: PacketHeader {
            version: limits.protocol_version,
            request_type,
            size_ml,
            temperature,
            ttl,
            source_id,
            dest_id,
            checksum: computed,
        },
        body: body.to_string(),
    })
}

fn int_field(obj: &serde_json::Map<String, Value>, name: &str) -> Result<i64, PacketError> {
    match obj.get(name) {
        None | Some(Value::Null) => Err(PacketError::malformed(format!("missing field {name}"))),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| PacketError::malformed(format!("field {name} must be an integer"))),
    }
}

fn str_field<'a>(
    obj: &'a serde_json::Map<String, Value>,
    name: &str,
) -> Result<&'a str, PacketError> {
    match obj.get(name) {
        None | Some(Value::Null) => Err(PacketError::malformed(format!("missing field {name}"))),
        Some(v) => v
            .as_str()
            .ok_or_else(|| PacketError::malformed(format!("field {name} must be a string"))),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
