//! Compliance report query and result types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    event::{AuditEvent, EventType},
    verify::VerificationOutcome,
};

/// Histogram bucket width for report time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BucketSize {
    /// Keys look like `2024-03-01`.
    #[default]
    Day,
    /// Keys look like `2024-03-01T14:00Z`.
    Hour,
}

/// Filter for a compliance report.
///
/// The time range is inclusive on both ends.  `event_types` and `user_id`
/// narrow the match further when present; an empty `event_types` list means
/// "any type".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportQuery {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub event_types: Option<Vec<EventType>>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl ReportQuery {
    /// A query over `[start_time, end_time]` with no further filters.
    pub fn between(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time,
            event_types: None,
            user_id: None,
        }
    }

    pub fn with_event_types(mut self, event_types: impl IntoIterator<Item = EventType>) -> Self {
        self.event_types = Some(event_types.into_iter().collect());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// True when `event` satisfies every filter in this query.
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if event.timestamp < self.start_time || event.timestamp > self.end_time {
            return false;
        }
        if let Some(types) = &self.event_types {
            if !types.is_empty() && !types.contains(&event.event_type) {
                return false;
            }
        }
        if let Some(user) = &self.user_id {
            if &event.user_id != user {
                return false;
            }
        }
        true
    }
}

/// Aggregate counts over the matched events.
///
/// All maps are `BTreeMap`s so that a report serializes identically every
/// time it is generated from the same log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_events: u64,
    pub by_event_type: BTreeMap<String, u64>,
    pub by_user: BTreeMap<String, u64>,
    pub bucket_size: BucketSize,
    pub histogram: BTreeMap<String, u64>,
}

/// A read-only projection of the log for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub query: ReportQuery,
    pub summary: ReportSummary,
    /// Matched events in insertion order.
    pub matched_events: Vec<AuditEvent>,
}

/// An audit-ready artifact: a report paired with the chain verification
/// that was run against the same log.
///
/// `audit_ready` is false whenever the chain failed verification; such an
/// export still carries the report so the break can be investigated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditExport {
    pub generated_at: DateTime<Utc>,
    pub audit_ready: bool,
    pub verification: VerificationOutcome,
    pub event_count: u64,
    pub report: ComplianceReport,
}
