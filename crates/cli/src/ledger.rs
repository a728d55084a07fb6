use anyhow::{Context as AnyhowContext, Result};
use serde::Serialize;
use std::path::Path;
use triage_evidence::{
    EvidenceLedger, EvidenceLedgerAddResult, EvidenceLedgerInput, EvidenceLedgerItem,
    EvidenceLedgerOptions,
};
use triage_protocol::serialize_json;

use crate::input::read_text;

#[derive(Serialize)]
struct LedgerReplayOutput {
    max_items: usize,
    outcomes: Vec<EvidenceLedgerAddResult>,
    items: Vec<EvidenceLedgerItem>,
}

pub fn run(batch_path: &Path, max_items: Option<usize>) -> Result<()> {
    let text = read_text(batch_path)?;
    let batches: Vec<Vec<EvidenceLedgerInput>> =
        serde_json::from_str(&text).context("parse evidence batches")?;

    let mut options = EvidenceLedgerOptions::default();
    if let Some(max_items) = max_items {
        options.max_items = max_items;
    }
    let mut ledger = EvidenceLedger::new(options);
    let outcomes = batches
        .iter()
        .map(|batch| ledger.add_or_update(batch))
        .collect();

    let output = LedgerReplayOutput {
        max_items: ledger.max_items(),
        outcomes,
        items: ledger.items(),
    };
    println!("{}", serialize_json(&output)?);
    Ok(())
}
