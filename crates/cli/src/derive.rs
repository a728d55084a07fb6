use anyhow::{Context as AnyhowContext, Result};
use std::path::Path;
use triage_analysis::derive_fields;
use triage_protocol::{analysis_result_schema, serialize_json, AnalysisResult};

use crate::input::read_text;

pub fn run(input: &Path) -> Result<()> {
    let text = read_text(input)?;
    let mut result: AnalysisResult =
        serde_json::from_str(&text).context("parse analysis result")?;
    derive_fields(&mut result);
    println!("{}", serialize_json(&result)?);
    Ok(())
}

pub fn print_schema() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&analysis_result_schema())?);
    Ok(())
}
