//! # Triage Analysis
//!
//! Deterministic report sections derived from a finalized crash/hang snapshot.
//!
//! ## Pipeline
//!
//! ```text
//! AnalysisResult
//!     │
//!     ├──> Frame Classifier
//!     │      ├─ meaningful vs synthetic frames
//!     │      └─ wait kind of a frame
//!     │
//!     ├──> Signature Builder ──> kind + sha256 over a fixed payload
//!     │
//!     ├──> Symbol Health ──> missing native/managed symbols, source links
//!     │
//!     └──> Timeline
//!            ├─ per-thread activity (running / waiting / unknown)
//!            └─ wait graph walk ──> blocked chains + deadlocks
//! ```
//!
//! ## Example
//!
//! ```
//! use triage_analysis::derive_fields;
//! use triage_protocol::AnalysisResult;
//!
//! let mut result = AnalysisResult::default();
//! derive_fields(&mut result);
//! assert!(result.signature.is_some());
//! ```

mod derive;
pub mod frames;
pub mod signature;
pub mod symbols;
pub mod timeline;

pub use derive::derive_fields;
pub use frames::{is_meaningful, normalize_frame, wait_kind};
pub use signature::{build_signature, classify_kind, hash_payload, signature_payload};
pub use symbols::summarize_symbols;
pub use timeline::{build_timeline, capture_reason, derive_deadlocks, walk_wait_graph};
