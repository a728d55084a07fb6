use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::config::DiskCacheConfig;
use crate::gate::{DumpGates, GateWaitSnapshot};
use crate::llm_key::{path_segment, LlmCacheKey};
use crate::metadata::{ReportCacheMetadata, REPORT_CACHE_SCHEMA_VERSION};
use crate::{CacheError, Result};

const ANALYSIS_DIR_NAME: &str = "ai-analysis";
const REPORT_FILE_NAME: &str = "report.json";
const METADATA_FILE_NAME: &str = "report.meta.json";

/// Sections a cached report must include to satisfy a read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheReadRequirements {
    pub require_watches: bool,
    pub require_security: bool,
    pub require_all_frames: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedReport {
    pub metadata: ReportCacheMetadata,
    pub report: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MissReason {
    Missing,
    Unreadable,
    SchemaVersion,
    Identity,
    LlmProvenance,
    Watches,
    Security,
    AllFrames,
}

impl MissReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Unreadable => "unreadable",
            Self::SchemaVersion => "schema_version",
            Self::Identity => "identity",
            Self::LlmProvenance => "llm_provenance",
            Self::Watches => "watches",
            Self::Security => "security",
            Self::AllFrames => "all_frames",
        }
    }
}

/// Per-user, per-dump store of generated reports.
///
/// ```text
/// <root>/<user>/<dump>/ai-analysis/
///     report.json, report.meta.json            latest write, any key
///     by-llm/<provider>/<model>/<effort>-<hash12>/
///         report.json, report.meta.json        one LLM configuration
/// ```
///
/// Every operation on one `(user, dump)` pair holds that pair's gate.
pub struct DiskReportCache {
    root: PathBuf,
    gates: DumpGates,
}

impl DiskReportCache {
    pub fn new(config: DiskCacheConfig) -> Self {
        Self {
            root: config.root,
            gates: DumpGates::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn gate_wait_snapshot(&self) -> GateWaitSnapshot {
        self.gates.snapshot()
    }

    /// Returns the cached report, or `None` when nothing usable is stored.
    ///
    /// Only argument errors and cancellation surface as `Err`; every storage
    /// problem is a miss.
    pub async fn read(
        &self,
        user_id: &str,
        dump_id: &str,
        llm: Option<&LlmCacheKey>,
        requirements: CacheReadRequirements,
        cancel: &CancellationToken,
    ) -> Result<Option<CachedReport>> {
        let (user_id, dump_id) = validate_ids(user_id, dump_id)?;
        if let Some(key) = llm {
            key.validate()?;
        }

        let dir = self.entry_dir(user_id, dump_id, llm);
        let _gate = self.gates.acquire(user_id, dump_id, cancel).await?;

        let metadata = match read_metadata(&dir).await {
            Ok(metadata) => metadata,
            Err(reason) => {
                log::debug!("report cache miss ({}): {}", reason.as_str(), dir.display());
                return Ok(None);
            }
        };
        if let Err(reason) = check_metadata(&metadata, user_id, dump_id, llm, requirements) {
            log::debug!("report cache miss ({}): {}", reason.as_str(), dir.display());
            return Ok(None);
        }

        let report_path = dir.join(REPORT_FILE_NAME);
        match tokio::fs::read_to_string(&report_path).await {
            Ok(report) => Ok(Some(CachedReport { metadata, report })),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::debug!("report cache miss (missing): {}", report_path.display());
                Ok(None)
            }
            Err(err) => {
                log::warn!("report cache read failed for {}: {err}", report_path.display());
                Ok(None)
            }
        }
    }

    /// Persists `report` under the keyed location and, when keyed, also as the
    /// dump's latest report. Write failures propagate.
    pub async fn write(
        &self,
        user_id: &str,
        dump_id: &str,
        llm: Option<&LlmCacheKey>,
        metadata: &ReportCacheMetadata,
        report: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let (user_id, dump_id) = validate_ids(user_id, dump_id)?;
        if let Some(key) = llm {
            key.validate()?;
        }

        let mut stamped = metadata.clone();
        stamped.schema_version = REPORT_CACHE_SCHEMA_VERSION;
        stamped.user_id = Some(user_id.to_string());
        stamped.dump_id = Some(dump_id.to_string());
        if let Some(key) = llm {
            stamped.llm_provider = Some(key.provider.trim().to_string());
            stamped.llm_model = Some(key.model.trim().to_string());
            stamped.llm_reasoning_effort = key.effort().map(str::to_string);
        }
        let meta_bytes = stamped.to_json_bytes()?;

        let _gate = self.gates.acquire(user_id, dump_id, cancel).await?;

        let primary = self.entry_dir(user_id, dump_id, llm);
        write_pair(&primary, report.as_bytes(), &meta_bytes).await?;
        if llm.is_some() {
            let latest = self.entry_dir(user_id, dump_id, None);
            write_pair(&latest, report.as_bytes(), &meta_bytes).await?;
        }
        Ok(())
    }

    fn entry_dir(&self, user_id: &str, dump_id: &str, llm: Option<&LlmCacheKey>) -> PathBuf {
        let base = self
            .root
            .join(path_segment(user_id))
            .join(path_segment(dump_id))
            .join(ANALYSIS_DIR_NAME);
        match llm {
            Some(key) => base.join(key.relative_dir()),
            None => base,
        }
    }
}

fn validate_ids<'a>(user_id: &'a str, dump_id: &'a str) -> Result<(&'a str, &'a str)> {
    let user_id = user_id.trim();
    let dump_id = dump_id.trim();
    if user_id.is_empty() {
        return Err(CacheError::InvalidArgument("user id must not be blank".into()));
    }
    if dump_id.is_empty() {
        return Err(CacheError::InvalidArgument("dump id must not be blank".into()));
    }
    Ok((user_id, dump_id))
}

async fn read_metadata(dir: &Path) -> std::result::Result<ReportCacheMetadata, MissReason> {
    let path = dir.join(METADATA_FILE_NAME);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Err(MissReason::Missing),
        Err(err) => {
            log::warn!("report cache metadata read failed for {}: {err}", path.display());
            return Err(MissReason::Unreadable);
        }
    };
    ReportCacheMetadata::from_json_bytes(&bytes).map_err(|err| {
        log::warn!("report cache metadata corrupted at {}: {err}", path.display());
        MissReason::Unreadable
    })
}

pub(crate) fn check_metadata(
    metadata: &ReportCacheMetadata,
    user_id: &str,
    dump_id: &str,
    llm: Option<&LlmCacheKey>,
    requirements: CacheReadRequirements,
) -> std::result::Result<(), MissReason> {
    if metadata.schema_version != REPORT_CACHE_SCHEMA_VERSION {
        return Err(MissReason::SchemaVersion);
    }
    let same_id = |stored: Option<&str>, expected: &str| stored.map(str::trim) == Some(expected);
    if !same_id(metadata.user_id.as_deref(), user_id)
        || !same_id(metadata.dump_id.as_deref(), dump_id)
    {
        return Err(MissReason::Identity);
    }
    if let Some(key) = llm {
        if !key.matches(
            metadata.llm_provider.as_deref(),
            metadata.llm_model.as_deref(),
            metadata.llm_reasoning_effort.as_deref(),
        ) {
            return Err(MissReason::LlmProvenance);
        }
    }
    if requirements.require_watches && !metadata.include_watches {
        return Err(MissReason::Watches);
    }
    if requirements.require_security && !metadata.include_security {
        return Err(MissReason::Security);
    }
    if requirements.require_all_frames && !metadata.include_all_frames {
        return Err(MissReason::AllFrames);
    }
    Ok(())
}

async fn write_pair(dir: &Path, report: &[u8], metadata: &[u8]) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    write_file_atomic(&dir.join(REPORT_FILE_NAME), report).await?;
    write_file_atomic(&dir.join(METADATA_FILE_NAME), metadata).await?;
    log::debug!("report cache write: {}", dir.display());
    Ok(())
}

async fn write_file_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
