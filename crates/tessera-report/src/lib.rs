//! # tessera-report
//!
//! Read-only compliance reports over a Tessera hash chain.
//!
//! ## Overview
//!
//! [`ReportGenerator`] filters committed events by an inclusive time range,
//! optional event types and optional user, then aggregates counts per event
//! type, per user, and per time bucket.  [`ReportGenerator::export`] pairs a
//! report with a chain verification over the same snapshot.
//!
//! ```rust,ignore
//! use tessera_report::ReportGenerator;
//!
//! let generator = ReportGenerator::new(store, BucketSize::Day);
//! let report = generator.generate(&ReportQuery::between(start, end))?;
//! ```

pub mod export;
pub mod generator;

pub use generator::{bucket_key, build_report, ReportGenerator};

// ── Tests ─────────────────────────────────────────────────────────────────────
