use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod derived;

pub use derived::{
    AnalysisSignature, AnalysisTimeline, BlockedChain, Deadlock, MissingSymbols, SignatureKind,
    SignatureParts, SourceLinkHealth, SymbolsHealthSummary, ThreadActivity, TimelineThread,
};

pub const SIGNATURE_VERSION: u32 = 1;
pub const TIMELINE_VERSION: u32 = 1;

/// Finalized crash/hang snapshot as produced by the debugger engine.
///
/// The derived sections (`signature`, `symbols`, `timeline`) are empty until
/// `triage_analysis::derive_fields` runs over the aggregate.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct AnalysisResult {
    #[serde(default)]
    pub threads: Vec<ThreadInfo>,
    #[serde(default)]
    pub modules: Vec<ModuleInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synchronization: Option<SynchronizationInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<AnalysisSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols: Option<SymbolsHealthSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<AnalysisTimeline>,
}

impl AnalysisResult {
    /// The thread flagged as faulting. First flagged wins.
    pub fn faulting_thread(&self) -> Option<&ThreadInfo> {
        self.threads.iter().find(|t| t.is_faulting)
    }

    pub fn oom_detected(&self) -> bool {
        self.memory
            .as_ref()
            .and_then(|m| m.oom.as_ref())
            .is_some_and(|oom| oom.detected)
    }

    pub fn signal_name(&self) -> Option<&str> {
        self.exception
            .as_ref()
            .and_then(|e| non_blank(e.signal_name.as_deref()))
    }

    pub fn exception_type(&self) -> Option<&str> {
        self.exception
            .as_ref()
            .and_then(|e| non_blank(e.exception_type.as_deref()))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct ThreadInfo {
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_thread_id: Option<String>,
    #[serde(default)]
    pub is_faulting: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub call_stack: Vec<StackFrame>,
}

/// One frame of a call stack. Frames have no identity beyond their position.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct StackFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub is_managed: bool,
}

impl StackFrame {
    pub fn function_text(&self) -> &str {
        self.function.as_deref().unwrap_or_default()
    }

    pub fn module_text(&self) -> &str {
        self.module.as_deref().unwrap_or_default()
    }

    /// Source file known and a positive line number recorded.
    pub fn has_source_position(&self) -> bool {
        non_blank(self.source_file.as_deref()).is_some()
            && self.line_number.is_some_and(|line| line > 0)
    }

    pub fn has_source_url(&self) -> bool {
        non_blank(self.source_url.as_deref()).is_some()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct ModuleInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// `Some(false)` means the engine looked for symbols and found none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_symbols: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct EnvironmentInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct ExceptionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct MemoryInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oom: Option<OomInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct OomInfo {
    #[serde(default)]
    pub detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct SynchronizationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_graph: Option<WaitGraph>,
    /// Monitor deadlocks reported by the engine's older lock scan.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub potential_deadlocks: Vec<LegacyDeadlock>,
}

/// Directed edges `thread --waits--> resource` and `resource --owned by--> thread`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct WaitGraph {
    #[serde(default)]
    pub edges: Vec<WaitGraphEdge>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct WaitGraphEdge {
    pub from: String,
    pub to: String,
    pub label: String,
}

impl WaitGraphEdge {
    pub fn new(from: impl Into<String>, label: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: label.into(),
        }
    }

    pub fn is_owned_by(&self) -> bool {
        self.label.trim().eq_ignore_ascii_case("owned by")
    }

    pub fn is_waits(&self) -> bool {
        self.label.trim().eq_ignore_ascii_case("waits")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct LegacyDeadlock {
    #[serde(default)]
    pub thread_ids: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// JSON schema of the snapshot aggregate, derived sections included.
pub fn analysis_result_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(AnalysisResult)).unwrap_or_default()
}

pub fn serialize_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}
