//! Audit-ready exports.
//!
//! An export runs the chain verification and the report over the *same*
//! snapshot, so the verdict always describes exactly the events the report
//! was built from.  A failed verification does not abort the export; it
//! marks it `audit_ready = false` and carries the break for investigation.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use tessera_contracts::{
    error::TesseraResult,
    report::{AuditExport, ReportQuery},
};
use tessera_core::chain::verify_chain;

use crate::generator::{build_report, ReportGenerator};

impl ReportGenerator {
    /// Verify the chain and build the report for `query` from one snapshot.
    pub fn export(
        &self,
        query: &ReportQuery,
        generated_at: DateTime<Utc>,
    ) -> TesseraResult<AuditExport> {
        let events = self.store().snapshot()?;

        let verification = verify_chain(&events);
        let report = build_report(&events, query, self.bucket())?;

        if let Some(detail) = &verification.detail {
            warn!(
                index = detail.index,
                event_id = %detail.event_id,
                reason = ?detail.reason,
                "exporting report over a chain that failed verification"
            );
        } else {
            info!(
                events = events.len(),
                matched = report.summary.total_events,
                terminal_hash = %verification.terminal_hash,
                "audit export verified"
            );
        }

        Ok(AuditExport {
            generated_at,
            audit_ready: verification.valid,
            verification,
            event_count: events.len() as u64,
            report,
        })
    }
}
