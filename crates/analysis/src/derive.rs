use triage_protocol::AnalysisResult;

use crate::signature::build_signature;
use crate::symbols::summarize_symbols;
use crate::timeline::build_timeline;

/// Attaches the signature, symbol health and timeline sections to a finalized
/// snapshot. Previously derived sections are replaced, so running this twice
/// over the same input produces identical output.
pub fn derive_fields(result: &mut AnalysisResult) {
    let signature = build_signature(result);
    let symbols = summarize_symbols(result);
    let timeline = build_timeline(result);

    log::debug!(
        "derived fields: kind={} hash={} threads={} deadlocks={}",
        signature.kind.as_str(),
        signature.hash,
        timeline.total_threads,
        timeline.deadlocks.as_ref().map_or(0, Vec::len)
    );

    result.signature = Some(signature);
    result.symbols = Some(symbols);
    result.timeline = Some(timeline);
}
