//! # Triage Report Cache
//!
//! Disk persistence for generated triage reports, keyed by user, dump and the
//! LLM configuration that produced them.
//!
//! ```text
//! write(user, dump, llm?, metadata, report)
//!     │
//!     ├──> dump gate (one per user+dump, cancellable wait)
//!     │
//!     ├──> by-llm/<provider>/<model>/<effort>-<hash12>/   (keyed)
//!     └──> ai-analysis/                                   (latest)
//!
//! read(user, dump, llm?, requirements)
//!     └──> schema / identity / provenance / feature checks, else miss
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use triage_report_cache::{
//!     CacheReadRequirements, DiskCacheConfig, DiskReportCache, LlmCacheKey, ReportCacheMetadata,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = DiskReportCache::new(DiskCacheConfig::from_env());
//!     let cancel = CancellationToken::new();
//!     let key = LlmCacheKey::new("openai", "gpt-4.1", Some("high".into()));
//!
//!     let metadata = ReportCacheMetadata::new(true, false, false);
//!     cache
//!         .write("alice", "dump-1", Some(&key), &metadata, "{}", &cancel)
//!         .await?;
//!
//!     let hit = cache
//!         .read("alice", "dump-1", Some(&key), CacheReadRequirements::default(), &cancel)
//!         .await?;
//!     assert!(hit.is_some());
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod gate;
mod llm_key;
mod metadata;
mod store;

pub use config::{DiskCacheConfig, CACHE_DIR_ENV};
pub use error::{CacheError, Result};
pub use gate::GateWaitSnapshot;
pub use llm_key::{sanitize_segment, LlmCacheKey, MAX_SEGMENT_CHARS};
pub use metadata::{ReportCacheMetadata, REPORT_CACHE_SCHEMA_VERSION};
pub use store::{CacheReadRequirements, CachedReport, DiskReportCache};
