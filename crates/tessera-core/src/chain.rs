//! The hash-chain engine: canonical serialization and SHA-256 linking.
//!
//! Everything here is pure.  No I/O, no clock, no randomness; the same
//! logical event always produces the same bytes and the same digest, on any
//! machine and in any process.
//!
//! Canonical form (UTF-8, compact JSON, no whitespace), top-level fields in
//! this fixed order:
//!
//!   1. `event_id`
//!   2. `event_type`      (wire name, e.g. `"pii-detected"`)
//!   3. `timestamp`       (RFC 3339, microseconds, explicit `+00:00`)
//!   4. `user_id`
//!   5. `resource_id`
//!   6. `action`
//!   7. `metadata`        (object, keys in lexicographic byte order)
//!   8. `correlation_id`
//!
//! Digest input is the canonical bytes followed by the UTF-8 bytes of
//! `previous_hash`.  The digest is 64 lowercase hex characters.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use sha2::{Digest, Sha256};

use tessera_contracts::{
    error::{TesseraError, TesseraResult},
    event::{AuditEvent, EventType, GENESIS_HASH},
    metadata::{Metadata, MetadataValue},
    verify::{BreakReason, ChainBreak, VerificationOutcome},
};

/// The hashed fields of an event, borrowed from wherever they live.
///
/// `previous_hash` and `current_hash` are not part of this view: the former
/// is appended to the canonical bytes separately and the latter is the
/// output.
#[derive(Debug, Clone, Copy)]
pub struct HashInput<'a> {
    pub event_id: &'a str,
    pub event_type: &'a EventType,
    pub timestamp: &'a DateTime<Utc>,
    pub user_id: &'a str,
    pub resource_id: &'a str,
    pub action: &'a str,
    pub metadata: &'a Metadata,
    pub correlation_id: &'a str,
}

impl<'a> From<&'a AuditEvent> for HashInput<'a> {
    fn from(event: &'a AuditEvent) -> Self {
        Self {
            event_id: &event.event_id,
            event_type: &event.event_type,
            timestamp: &event.timestamp,
            user_id: &event.user_id,
            resource_id: &event.resource_id,
            action: &event.action,
            metadata: &event.metadata,
            correlation_id: &event.correlation_id,
        }
    }
}

/// Serialize `input` into its canonical byte form.
///
/// Fails with `TesseraError::Serialization` if a value has no canonical
/// representation: a non-finite float, or a timestamp with digits below the
/// microsecond (those would not be covered by the hash).
pub fn canonical_form(input: &HashInput<'_>) -> TesseraResult<Vec<u8>> {
    if input.timestamp.nanosecond() % 1_000 != 0 {
        return Err(TesseraError::Serialization {
            reason: format!(
                "timestamp {} is finer than microsecond precision",
                input.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
            ),
        });
    }

    let mut out = String::with_capacity(256);
    out.push('{');

    push_string_field(&mut out, "event_id", input.event_id)?;
    out.push(',');
    push_string_field(&mut out, "event_type", &input.event_type.as_str())?;
    out.push(',');
    push_string_field(&mut out, "timestamp", &canonical_timestamp(input.timestamp))?;
    out.push(',');
    push_string_field(&mut out, "user_id", input.user_id)?;
    out.push(',');
    push_string_field(&mut out, "resource_id", input.resource_id)?;
    out.push(',');
    push_string_field(&mut out, "action", input.action)?;
    out.push(',');

    push_json_string(&mut out, "metadata")?;
    out.push(':');
    out.push('{');
    // BTreeMap iteration is already in lexicographic key order.
    for (i, (key, value)) in input.metadata.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_json_string(&mut out, key)?;
        out.push(':');
        push_metadata_value(&mut out, key, value)?;
    }
    out.push('}');
    out.push(',');

    push_string_field(&mut out, "correlation_id", input.correlation_id)?;
    out.push('}');

    Ok(out.into_bytes())
}

/// Compute the chain hash for `input` linked to `previous_hash`.
///
/// Returns a lowercase 64-character hex string.
pub fn compute_hash(input: &HashInput<'_>, previous_hash: &str) -> TesseraResult<String> {
    let canonical = canonical_form(input)?;

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hasher.update(previous_hash.as_bytes());

    Ok(hex::encode(hasher.finalize()))
}

/// Recompute the hash of a stored event against `previous_hash`.
pub fn hash_event(event: &AuditEvent, previous_hash: &str) -> TesseraResult<String> {
    compute_hash(&HashInput::from(event), previous_hash)
}

/// Walk `events` in order and confirm every link.
///
/// Rules, checked per event:
///
/// 1. **Linkage**: `previous_hash` equals the preceding event's
///    `current_hash` (or `GENESIS_HASH` for position 0).
/// 2. **Content**: `current_hash` equals the hash recomputed from the
///    event's own fields and the expected previous hash.
/// 3. **Identity**: `event_id` has not appeared earlier in the chain.
///
/// Stops at the first failure and reports its position and rule.  An empty
/// slice is valid.
pub fn verify_chain(events: &[AuditEvent]) -> VerificationOutcome {
    let mut expected_prev = GENESIS_HASH.to_string();
    let mut seen_ids: HashSet<&str> = HashSet::with_capacity(events.len());

    for (index, event) in events.iter().enumerate() {
        let broken = |reason| VerificationOutcome {
            valid: false,
            detail: Some(ChainBreak {
                index: index as u64,
                event_id: event.event_id.clone(),
                reason,
            }),
            events_checked: index as u64 + 1,
            terminal_hash: expected_prev.clone(),
        };

        if event.previous_hash != expected_prev {
            return broken(BreakReason::LinkageBroken);
        }

        // A stored value that no longer serializes is tampering too.
        match hash_event(event, &expected_prev) {
            Ok(recomputed) if recomputed == event.current_hash => {}
            _ => return broken(BreakReason::ContentTampered),
        }

        if !seen_ids.insert(event.event_id.as_str()) {
            return broken(BreakReason::DuplicateEventId);
        }

        expected_prev = event.current_hash.clone();
    }

    VerificationOutcome {
        valid: true,
        detail: None,
        events_checked: events.len() as u64,
        terminal_hash: expected_prev,
    }
}

/// RFC 3339 with microsecond precision and an explicit `+00:00` offset.
pub fn canonical_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

// ── Writers ───────────────────────────────────────────────────────────────────

fn push_string_field(out: &mut String, key: &str, value: &str) -> TesseraResult<()> {
    push_json_string(out, key)?;
    out.push(':');
    push_json_string(out, value)
}

fn push_json_string(out: &mut String, s: &str) -> TesseraResult<()> {
    let escaped = serde_json::to_string(s).map_err(|e| TesseraError::Serialization {
        reason: format!("failed to escape string: {}", e),
    })?;
    out.push_str(&escaped);
    Ok(())
}

fn push_metadata_value(out: &mut String, key: &str, value: &MetadataValue) -> TesseraResult<()> {
    match value {
        MetadataValue::Null => out.push_str("null"),
        MetadataValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        MetadataValue::Integer(i) => out.push_str(&i.to_string()),
        MetadataValue::Float(f) => {
            if !f.is_finite() {
                return Err(TesseraError::Serialization {
                    reason: format!("metadata '{}' holds non-finite float {}", key, f),
                });
            }
            let rendered = serde_json::to_string(f).map_err(|e| TesseraError::Serialization {
                reason: format!("metadata '{}': {}", key, e),
            })?;
            out.push_str(&rendered);
        }
        MetadataValue::String(s) => push_json_string(out, s)?,
    }
    Ok(())
}
