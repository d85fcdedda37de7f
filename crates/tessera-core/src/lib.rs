//! # tessera-core
//!
//! The pieces every Tessera component builds on:
//! - the `EventStore` and `Clock` traits
//! - the hash-chain engine (`chain::canonical_form`, `chain::compute_hash`)
//! - the pure chain walk (`chain::verify_chain`) shared by the verifier and
//!   the export path
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tessera_core::chain::{compute_hash, HashInput};
//!
//! let hash = compute_hash(&HashInput::from(&event), &event.previous_hash)?;
//! assert_eq!(hash, event.current_hash);
//! ```

pub mod chain;
pub mod traits;

pub use chain::{canonical_form, compute_hash, hash_event, verify_chain, HashInput};
pub use traits::{Clock, EventStore, SystemClock};

// ── Tests ─────────────────────────────────────────────────────────────────────
