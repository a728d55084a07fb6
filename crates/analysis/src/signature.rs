use sha2::{Digest, Sha256};
use triage_protocol::{
    non_blank, AnalysisResult, AnalysisSignature, SignatureKind, SignatureParts, StackFrame,
    SIGNATURE_VERSION,
};

use crate::frames::{first_meaningful, is_meaningful, normalize_frame};

const MAX_SIGNATURE_FRAMES: usize = 3;
const HASH_PREFIX: &str = "sha256:";

pub fn classify_kind(result: &AnalysisResult) -> SignatureKind {
    if result.oom_detected() {
        return SignatureKind::Oom;
    }
    if result.signal_name().is_some() || result.exception_type().is_some() {
        return SignatureKind::Crash;
    }
    if faulting_state_is_sigstop(result) {
        return SignatureKind::Hang;
    }
    SignatureKind::Unknown
}

pub(crate) fn faulting_state_is_sigstop(result: &AnalysisResult) -> bool {
    result
        .faulting_thread()
        .and_then(|t| t.state.as_deref())
        .is_some_and(|state| state.to_ascii_uppercase().contains("SIGSTOP"))
}

/// Up to three distinct normalized frames: the best frame first, then further
/// meaningful frames in stack order.
pub fn select_signature_frames(stack: &[StackFrame]) -> Vec<String> {
    let mut frames: Vec<String> = Vec::new();
    let best = match first_meaningful(stack) {
        Some((_, frame)) => Some(frame),
        None => stack.first(),
    };
    let Some(best) = best else {
        return frames;
    };
    push_distinct(&mut frames, normalize_frame(best));

    for frame in stack {
        if frames.len() >= MAX_SIGNATURE_FRAMES {
            break;
        }
        if !is_meaningful(frame) {
            continue;
        }
        push_distinct(&mut frames, normalize_frame(frame));
    }
    frames
}

fn push_distinct(frames: &mut Vec<String>, normalized: String) {
    if normalized.is_empty() || frames.iter().any(|f| f == &normalized) {
        return;
    }
    frames.push(normalized);
}

pub fn build_signature(result: &AnalysisResult) -> AnalysisSignature {
    let kind = classify_kind(result);
    let frames = result
        .faulting_thread()
        .map(|t| select_signature_frames(&t.call_stack))
        .unwrap_or_default();
    let environment = result.environment.as_ref();
    let parts = SignatureParts {
        exception_type: result.exception_type().map(str::to_string),
        signal: result.signal_name().map(str::to_string),
        runtime: environment
            .and_then(|e| non_blank(e.runtime.as_deref()))
            .map(str::to_string),
        os: environment
            .and_then(|e| non_blank(e.os.as_deref()))
            .map(str::to_string),
        frames,
    };
    let payload = signature_payload(kind, &parts);
    AnalysisSignature {
        version: SIGNATURE_VERSION,
        kind,
        hash: hash_payload(&payload),
        parts,
    }
}

/// Fixed-order payload. Always `\n`-joined so the hash does not depend on the
/// host platform.
pub fn signature_payload(kind: SignatureKind, parts: &SignatureParts) -> String {
    let field = |value: &Option<String>| value.as_deref().unwrap_or_default().trim().to_string();
    let mut lines = vec![
        format!("v={SIGNATURE_VERSION}"),
        format!("kind={}", kind.as_str()),
        format!("exception={}", field(&parts.exception_type)),
        format!("signal={}", field(&parts.signal)),
        format!("runtime={}", field(&parts.runtime)),
        format!("os={}", field(&parts.os)),
    ];
    lines.extend(parts.frames.iter().map(|frame| format!("frame={frame}")));
    lines.join("\n")
}

pub fn hash_payload(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{HASH_PREFIX}{:x}", hasher.finalize())
}
