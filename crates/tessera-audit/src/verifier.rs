//! Store-backed chain verification.
//!
//! `ChainVerifier` takes a snapshot of the committed log and walks it with
//! `tessera_core::chain::verify_chain`.  Appends that land after the
//! snapshot is taken are simply not part of that run.  A break is logged and
//! returned as data; it never stops the trail from accepting appends.

use std::sync::Arc;

use tracing::{info, warn};

use tessera_contracts::{error::TesseraResult, verify::VerificationOutcome};
use tessera_core::{chain::verify_chain, traits::EventStore};

/// Read-only verifier over one chain's store.
pub struct ChainVerifier {
    store: Arc<dyn EventStore>,
}

impl ChainVerifier {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Verify every event committed before this call.
    ///
    /// `Err` only when the store cannot be read; integrity findings are in
    /// the returned outcome.
    pub fn verify(&self) -> TesseraResult<VerificationOutcome> {
        let events = self.store.snapshot()?;
        let outcome = verify_chain(&events);

        match &outcome.detail {
            None => info!(
                events = outcome.events_checked,
                terminal_hash = %outcome.terminal_hash,
                "audit chain verified"
            ),
            Some(detail) => warn!(
                index = detail.index,
                event_id = %detail.event_id,
                reason = ?detail.reason,
                "audit chain integrity break"
            ),
        }

        Ok(outcome)
    }
}
