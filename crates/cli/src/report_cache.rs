use anyhow::{bail, Result};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use triage_report_cache::{
    CacheReadRequirements, DiskCacheConfig, DiskReportCache, LlmCacheKey, ReportCacheMetadata,
};

use crate::input::read_text;

pub async fn read(
    config: DiskCacheConfig,
    user_id: &str,
    dump_id: &str,
    llm: Option<LlmCacheKey>,
    requirements: CacheReadRequirements,
    cancel: &CancellationToken,
) -> Result<()> {
    let cache = DiskReportCache::new(config);
    let hit = cache
        .read(user_id, dump_id, llm.as_ref(), requirements, cancel)
        .await?;
    let Some(cached) = hit else {
        bail!("report not found for user '{user_id}', dump '{dump_id}'");
    };
    print!("{}", cached.report);
    Ok(())
}

pub async fn write(
    config: DiskCacheConfig,
    user_id: &str,
    dump_id: &str,
    llm: Option<LlmCacheKey>,
    metadata: &ReportCacheMetadata,
    report_path: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let report = read_text(report_path)?;
    let cache = DiskReportCache::new(config);
    cache
        .write(user_id, dump_id, llm.as_ref(), metadata, &report, cancel)
        .await?;
    log::info!(
        "cached report for user '{user_id}', dump '{dump_id}' under {}",
        cache.root().display()
    );
    Ok(())
}
