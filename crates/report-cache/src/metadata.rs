use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::Result;

pub const REPORT_CACHE_SCHEMA_VERSION: u32 = 1;

/// Sidecar describing a cached report: who it belongs to, which sections it
/// includes, and which LLM configuration produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportCacheMetadata {
    pub schema_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub generated_at_unix_ms: u64,
    pub include_watches: bool,
    pub include_security: bool,
    pub include_all_frames: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_reasoning_effort: Option<String>,
}

impl ReportCacheMetadata {
    pub fn new(include_watches: bool, include_security: bool, include_all_frames: bool) -> Self {
        Self {
            schema_version: REPORT_CACHE_SCHEMA_VERSION,
            generated_at_unix_ms: unix_now_ms(),
            include_watches,
            include_security,
            include_all_frames,
            ..Self::default()
        }
    }

    pub(crate) fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parses metadata written by any producer, matching field names without
    /// regard to case (`DumpId`, `dumpid` and `dump_id` are the same field).
    pub(crate) fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: Value = serde_json::from_slice(bytes)?;
        Ok(serde_json::from_value(fold_keys(raw))?)
    }
}

fn fold_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                out.entry(canonical_field(&key)).or_insert(value);
            }
            Value::Object(out)
        }
        other => other,
    }
}

fn canonical_field(key: &str) -> String {
    const FIELDS: &[&str] = &[
        "schema_version",
        "dump_id",
        "user_id",
        "generated_at_unix_ms",
        "include_watches",
        "include_security",
        "include_all_frames",
        "llm_provider",
        "llm_model",
        "llm_reasoning_effort",
    ];
    let squashed: String = key
        .chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect();
    FIELDS
        .iter()
        .find(|field| field.replace('_', "") == squashed)
        .map(|field| (*field).to_string())
        .unwrap_or_else(|| key.to_string())
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
