use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use triage_report_cache::{DiskCacheConfig, LlmCacheKey};

mod derive;
mod input;
mod ledger;
mod report_cache;

#[derive(Parser)]
#[command(name = "dump-triage")]
#[command(about = "Post-process crash/hang snapshots and manage triage reports", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for output)
    #[arg(long, global = true)]
    quiet: bool,

    /// Report cache root (overrides DUMP_TRIAGE_CACHE_DIR)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach signature, symbol health and timeline to an analysis result
    Derive {
        /// Analysis result JSON file (`-` for stdin)
        #[arg(long, default_value = "-")]
        input: PathBuf,
    },

    /// Print the JSON schema of the analysis result
    Schema,

    /// Replay evidence batches through a fresh ledger
    Ledger {
        /// JSON array of batches, each an array of evidence items
        #[arg(long)]
        batch: PathBuf,

        /// Ledger capacity (clamped to 1..=500)
        #[arg(long)]
        max_items: Option<usize>,
    },

    /// Print a cached report
    CacheRead {
        #[command(flatten)]
        target: CacheTarget,

        #[command(flatten)]
        llm: LlmKeyArgs,

        #[arg(long)]
        require_watches: bool,

        #[arg(long)]
        require_security: bool,

        #[arg(long)]
        require_all_frames: bool,
    },

    /// Store a report in the cache
    CacheWrite {
        #[command(flatten)]
        target: CacheTarget,

        #[command(flatten)]
        llm: LlmKeyArgs,

        /// Report file (`-` for stdin)
        #[arg(long)]
        report: PathBuf,

        #[arg(long)]
        include_watches: bool,

        #[arg(long)]
        include_security: bool,

        #[arg(long)]
        include_all_frames: bool,
    },
}

#[derive(Args, Clone)]
struct CacheTarget {
    /// Owner of the dump
    #[arg(long = "user")]
    user_id: String,

    /// Dump identifier
    #[arg(long = "dump")]
    dump_id: String,
}

#[derive(Args, Clone, Default)]
struct LlmKeyArgs {
    /// LLM provider that produced the report
    #[arg(long, requires = "model")]
    provider: Option<String>,

    /// LLM model name
    #[arg(long, requires = "provider")]
    model: Option<String>,

    /// Reasoning effort
    #[arg(long, requires = "model")]
    effort: Option<String>,
}

impl LlmKeyArgs {
    fn to_key(&self) -> Option<LlmCacheKey> {
        match (&self.provider, &self.model) {
            (Some(provider), Some(model)) => Some(LlmCacheKey::new(
                provider.as_str(),
                model.as_str(),
                self.effort.clone(),
            )),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let cache_config = cli
        .cache_dir
        .clone()
        .map(DiskCacheConfig::new)
        .unwrap_or_else(DiskCacheConfig::from_env);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Derive { input } => derive::run(&input),
        Commands::Schema => derive::print_schema(),
        Commands::Ledger { batch, max_items } => ledger::run(&batch, max_items),
        Commands::CacheRead {
            target,
            llm,
            require_watches,
            require_security,
            require_all_frames,
        } => {
            let requirements = triage_report_cache::CacheReadRequirements {
                require_watches,
                require_security,
                require_all_frames,
            };
            report_cache::read(
                cache_config,
                &target.user_id,
                &target.dump_id,
                llm.to_key(),
                requirements,
                &cancel,
            )
            .await
        }
        Commands::CacheWrite {
            target,
            llm,
            report,
            include_watches,
            include_security,
            include_all_frames,
        } => {
            let metadata = triage_report_cache::ReportCacheMetadata::new(
                include_watches,
                include_security,
                include_all_frames,
            );
            report_cache::write(
                cache_config,
                &target.user_id,
                &target.dump_id,
                llm.to_key(),
                &metadata,
                &report,
                &cancel,
            )
            .await
        }
    }
}
