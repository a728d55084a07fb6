//! Report sections computed from the raw snapshot.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    Oom,
    Crash,
    Hang,
    Unknown,
}

impl SignatureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Oom => "oom",
            Self::Crash => "crash",
            Self::Hang => "hang",
            Self::Unknown => "unknown",
        }
    }
}

/// Stable fingerprint used to group snapshots sharing root characteristics.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct AnalysisSignature {
    pub version: u32,
    pub kind: SignatureKind,
    /// `sha256:` followed by 64 lowercase hex chars.
    pub hash: String,
    pub parts: SignatureParts,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct SignatureParts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default)]
    pub frames: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct MissingSymbols {
    pub missing_count: usize,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct SourceLinkHealth {
    pub resolved_count: usize,
    pub unresolved_count: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct SymbolsHealthSummary {
    pub native: MissingSymbols,
    pub managed: MissingSymbols,
    pub source_link: SourceLinkHealth,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ThreadActivity {
    Running,
    Waiting,
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct TimelineThread {
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub activity: ThreadActivity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_frame: Option<String>,
    /// Pointers of the form `threads[i].call_stack[j]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
}

/// Acyclic (or cycle-terminated) thread -> owner dependency sequence.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct BlockedChain {
    pub kind: String,
    pub confidence: f64,
    pub threads: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct Deadlock {
    pub kind: String,
    pub confidence: f64,
    pub threads: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct AnalysisTimeline {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_reason: Option<String>,
    pub total_threads: usize,
    pub threads: Vec<TimelineThread>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_chains: Option<Vec<BlockedChain>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadlocks: Option<Vec<Deadlock>>,
}
