//! Compliance report generation.
//!
//! `ReportGenerator` takes one snapshot of the store, filters it with a
//! `ReportQuery`, and aggregates the matches.  It never writes to the store,
//! and the same query over the same committed log always yields the same
//! report.
//!
//! A report says nothing about chain integrity.  Pair it with a verification
//! run (see `export`) before treating it as audit evidence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use tessera_contracts::{
    error::{TesseraError, TesseraResult},
    event::AuditEvent,
    report::{BucketSize, ComplianceReport, ReportQuery, ReportSummary},
};
use tessera_core::traits::EventStore;

/// Filters and aggregates committed events into a `ComplianceReport`.
pub struct ReportGenerator {
    store: Arc<dyn EventStore>,
    bucket: BucketSize,
}

impl ReportGenerator {
    /// Create a generator that buckets its histogram by `bucket`.
    pub fn new(store: Arc<dyn EventStore>, bucket: BucketSize) -> Self {
        Self { store, bucket }
    }

    pub fn bucket(&self) -> BucketSize {
        self.bucket
    }

    /// Produce a report for `query` over the events committed so far.
    ///
    /// Returns `TesseraError::Validation` if `start_time` is after
    /// `end_time`, or any storage read error.
    pub fn generate(&self, query: &ReportQuery) -> TesseraResult<ComplianceReport> {
        let events = self.store.snapshot()?;
        build_report(&events, query, self.bucket)
    }

    pub(crate) fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }
}

/// Build a report over an already-taken snapshot.
///
/// Matched events keep their insertion order.
pub fn build_report(
    events: &[AuditEvent],
    query: &ReportQuery,
    bucket: BucketSize,
) -> TesseraResult<ComplianceReport> {
    if query.start_time > query.end_time {
        return Err(TesseraError::validation(
            "start_time",
            format!(
                "start_time {} is after end_time {}",
                query.start_time, query.end_time
            ),
        ));
    }

    let matched_events: Vec<AuditEvent> =
        events.iter().filter(|e| query.matches(e)).cloned().collect();

    let mut summary = ReportSummary {
        total_events: matched_events.len() as u64,
        bucket_size: bucket,
        ..ReportSummary::default()
    };

    for event in &matched_events {
        *summary
            .by_event_type
            .entry(event.event_type.to_string())
            .or_insert(0) += 1;
        *summary.by_user.entry(event.user_id.clone()).or_insert(0) += 1;
        *summary
            .histogram
            .entry(bucket_key(&event.timestamp, bucket))
            .or_insert(0) += 1;
    }

    debug!(
        scanned = events.len(),
        matched = summary.total_events,
        start = %query.start_time,
        end = %query.end_time,
        "compliance report generated"
    );

    Ok(ComplianceReport {
        query: query.clone(),
        summary,
        matched_events,
    })
}

/// Histogram key for `ts`.  Keys sort chronologically as strings.
pub fn bucket_key(ts: &DateTime<Utc>, bucket: BucketSize) -> String {
    match bucket {
        BucketSize::Day => ts.format("%Y-%m-%d").to_string(),
        BucketSize::Hour => ts.format("%Y-%m-%dT%H:00Z").to_string(),
    }
}
