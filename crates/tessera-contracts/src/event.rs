//! Audit event and event-type definitions.
//!
//! `AuditEvent` is one immutable entry in a hash chain.  It is created once
//! by the recorder and never modified afterwards; any later change to a
//! stored field is detected by the chain verifier.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{TesseraError, TesseraResult},
    metadata::Metadata,
};

/// The `previous_hash` of the first event in every chain.
///
/// 64 zero characters: the same length as a real SHA-256 hex digest but a
/// value no real digest is expected to take.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Prefix that marks an organisation-specific event type on the wire.
const CUSTOM_PREFIX: &str = "custom:";

/// The kinds of security-relevant actions an audit trail records.
///
/// Known platform types are closed variants; organisation-specific types go
/// through `Custom` and must be registered with the recorder before use.
/// On the wire every variant is a kebab-case string; custom types carry a
/// `custom:` prefix so they can never collide with a known name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EventType {
    DocumentIngested,
    DocumentAccessed,
    DocumentDeleted,
    QueryExecuted,
    AccessGranted,
    AccessDenied,
    PiiDetected,
    PiiRedacted,
    PolicyViolation,
    UserLogin,
    UserLogout,
    ConfigChanged,
    DataExported,
    IncidentReported,
    Custom(String),
}

impl EventType {
    /// Every known (non-custom) event type.
    pub const KNOWN: [EventType; 14] = [
        EventType::DocumentIngested,
        EventType::DocumentAccessed,
        EventType::DocumentDeleted,
        EventType::QueryExecuted,
        EventType::AccessGranted,
        EventType::AccessDenied,
        EventType::PiiDetected,
        EventType::PiiRedacted,
        EventType::PolicyViolation,
        EventType::UserLogin,
        EventType::UserLogout,
        EventType::ConfigChanged,
        EventType::DataExported,
        EventType::IncidentReported,
    ];

    /// Build a custom event type, checking the name is usable.
    ///
    /// Names must be non-empty and made of ASCII alphanumerics, `-`, `_`
    /// or `.`.
    pub fn custom(name: impl Into<String>) -> TesseraResult<Self> {
        let name = name.into();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(TesseraError::validation(
                "event_type",
                format!("'{}' is not a valid custom event type name", name),
            ));
        }
        Ok(Self::Custom(name))
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }

    /// The wire name of this event type.
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        use std::borrow::Cow;
        let s = match self {
            Self::DocumentIngested => "document-ingested",
            Self::DocumentAccessed => "document-accessed",
            Self::DocumentDeleted => "document-deleted",
            Self::QueryExecuted => "query-executed",
            Self::AccessGranted => "access-granted",
            Self::AccessDenied => "access-denied",
            Self::PiiDetected => "pii-detected",
            Self::PiiRedacted => "pii-redacted",
            Self::PolicyViolation => "policy-violation",
            Self::UserLogin => "user-login",
            Self::UserLogout => "user-logout",
            Self::ConfigChanged => "config-changed",
            Self::DataExported => "data-exported",
            Self::IncidentReported => "incident-reported",
            Self::Custom(name) => return Cow::Owned(format!("{}{}", CUSTOM_PREFIX, name)),
        };
        Cow::Borrowed(s)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl FromStr for EventType {
    type Err = TesseraError;

    fn from_str(s: &str) -> TesseraResult<Self> {
        if let Some(name) = s.strip_prefix(CUSTOM_PREFIX) {
            return Self::custom(name);
        }
        Self::KNOWN
            .iter()
            .find(|known| known.as_str() == s)
            .cloned()
            .ok_or_else(|| {
                TesseraError::validation("event_type", format!("unknown event type '{}'", s))
            })
    }
}

impl TryFrom<String> for EventType {
    type Error = TesseraError;

    fn try_from(s: String) -> TesseraResult<Self> {
        s.parse()
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        t.as_str().into_owned()
    }
}

/// A single entry in a hash-chained audit trail.
///
/// `previous_hash` links the event to its predecessor and `current_hash`
/// commits to every other field.  Modifying any field after the fact
/// invalidates `current_hash` (content tamper); removing or reordering
/// events breaks the `previous_hash` linkage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Globally unique identifier assigned by the recorder.
    pub event_id: String,

    /// What kind of action this event records.
    pub event_type: EventType,

    /// UTC instant the recorder accepted the event (microsecond precision).
    pub timestamp: DateTime<Utc>,

    /// Who performed the action.
    pub user_id: String,

    /// What the action was performed on.
    pub resource_id: String,

    /// The action itself, e.g. "read" or "redact".
    pub action: String,

    /// Additional primitive key/value context.
    #[serde(default)]
    pub metadata: Metadata,

    /// Groups events that belong to one logical request.
    pub correlation_id: String,

    /// `current_hash` of the preceding event, or `GENESIS_HASH`.
    pub previous_hash: String,

    /// SHA-256 (hex) over the canonical content and `previous_hash`.
    pub current_hash: String,
}

/// Generate a fresh identifier for grouping events into one request.
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a fresh event identifier.
pub fn generate_event_id() -> String {
    Uuid::new_v4().to_string()
}
