//! # tessera-contracts
//!
//! Shared types, error kinds, and report contracts for the Tessera
//! hash-chained audit trail.
//!
//! Every crate in the workspace imports from here.  No chain logic lives in
//! this crate, only data definitions, validation helpers and error types.

pub mod error;
pub mod event;
pub mod metadata;
pub mod report;
pub mod verify;

pub use error::{TesseraError, TesseraResult};
pub use event::{generate_correlation_id, AuditEvent, EventType, GENESIS_HASH};
pub use metadata::{Metadata, MetadataValue};
