//! # Triage Evidence
//!
//! Bounded, deduplicated ledger of facts the reasoning loop cites by id while
//! forming and judging hypotheses.
//!
//! ```text
//! batch of EvidenceLedgerInput
//!     │
//!     ├──> normalize (whitespace, length caps, tags)
//!     ├──> dedupe key = lower(source \x1F finding)
//!     └──> explicit id?  ── yes ──> update / insert / reject
//!                        └─ no ───> merge into duplicate / allocate E<n>
//! ```
//!
//! ## Example
//!
//! ```
//! use triage_evidence::{EvidenceLedger, EvidenceLedgerInput, EvidenceLedgerOptions};
//!
//! let mut ledger = EvidenceLedger::new(EvidenceLedgerOptions { max_items: 10 });
//! let outcome = ledger.add_or_update(&[EvidenceLedgerInput::new("threads", "T1 waits on R1")]);
//! assert_eq!(outcome.added_ids, vec!["E1".to_string()]);
//! assert!(ledger.contains_evidence_id("e1"));
//! ```

mod ledger;
mod normalize;

pub use ledger::{
    EvidenceLedger, EvidenceLedgerAddResult, EvidenceLedgerInput, EvidenceLedgerItem,
    EvidenceLedgerOptions, DEFAULT_MAX_ITEMS, MAX_MAX_ITEMS,
};
pub use normalize::{
    normalize_evidence_id, MAX_FINDING_CHARS, MAX_SOURCE_CHARS, MAX_TAG_CHARS, MAX_WHY_CHARS,
};
