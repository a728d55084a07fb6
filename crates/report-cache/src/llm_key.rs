use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::{CacheError, Result};

pub const MAX_SEGMENT_CHARS: usize = 64;
const DIGEST_FRAGMENT_CHARS: usize = 12;
const BY_LLM_DIR_NAME: &str = "by-llm";
const DEFAULT_EFFORT_SEGMENT: &str = "default";
const FALLBACK_SEGMENT: &str = "unknown";

/// Which reasoning configuration produced a cached report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmCacheKey {
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
}

impl LlmCacheKey {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        reasoning_effort: Option<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            reasoning_effort,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.provider.trim().is_empty() {
            return Err(CacheError::InvalidArgument(
                "llm provider must not be blank".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(CacheError::InvalidArgument("llm model must not be blank".into()));
        }
        Ok(())
    }

    pub fn effort(&self) -> Option<&str> {
        self.reasoning_effort
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Lowercase hex sha256 of `provider|model|effort` (trimmed, lowercased).
    pub fn digest_hex(&self) -> String {
        let payload = format!(
            "{}|{}|{}",
            self.provider.trim().to_lowercase(),
            self.model.trim().to_lowercase(),
            self.effort().unwrap_or_default().to_lowercase()
        );
        let mut hasher = Sha256::new();
        hasher.update(payload.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// `by-llm/<provider>/<model>/<effort>-<hash12>`, relative to a dump's
    /// analysis directory.
    pub fn relative_dir(&self) -> PathBuf {
        let digest = self.digest_hex();
        let fragment = &digest[..DIGEST_FRAGMENT_CHARS];
        let effort = sanitize_segment(self.effort().unwrap_or(DEFAULT_EFFORT_SEGMENT));
        PathBuf::from(BY_LLM_DIR_NAME)
            .join(sanitize_segment(&self.provider))
            .join(model_segment(&self.model, fragment))
            .join(format!("{effort}-{fragment}"))
    }

    /// Trimmed, ASCII case-insensitive comparison against persisted provenance.
    pub fn matches(
        &self,
        provider: Option<&str>,
        model: Option<&str>,
        reasoning_effort: Option<&str>,
    ) -> bool {
        same_provenance(Some(&self.provider), provider)
            && same_provenance(Some(&self.model), model)
            && same_provenance(self.effort(), reasoning_effort)
    }
}

fn same_provenance(expected: Option<&str>, actual: Option<&str>) -> bool {
    fn clean(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|v| !v.is_empty())
    }
    match (clean(expected), clean(actual)) {
        (None, None) => true,
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// Maps anything outside `[A-Za-z0-9._-]` to `_`, rejects `.`/`..`, caps length.
pub fn sanitize_segment(raw: &str) -> String {
    let mut mapped = path_segment(raw);
    mapped.truncate(MAX_SEGMENT_CHARS);
    mapped
}

/// Same character rules as [`sanitize_segment`] without the length cap, for
/// user and dump ids where truncation would merge distinct dumps.
pub(crate) fn path_segment(raw: &str) -> String {
    let mapped = map_segment_chars(raw);
    if mapped.is_empty() || mapped == "." || mapped == ".." {
        return FALLBACK_SEGMENT.to_string();
    }
    mapped
}

// Output is pure ASCII, so byte lengths equal char counts.
fn map_segment_chars(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}

// Long model names get a digest suffix so two names sharing a prefix stay apart.
fn model_segment(model: &str, fragment: &str) -> String {
    let mapped = map_segment_chars(model);
    if mapped.len() <= MAX_SEGMENT_CHARS {
        return sanitize_segment(&mapped);
    }
    let keep = MAX_SEGMENT_CHARS - fragment.len() - 1;
    format!("{}-{fragment}", &mapped[..keep])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn key(provider: &str, model: &str, effort: Option<&str>) -> LlmCacheKey {
        LlmCacheKey::new(provider, model, effort.map(str::to_string))
    }

    #[test]
    fn relative_dir_layout() {
        let k = key("openai", "gpt-4.1", Some("high"));
        let digest = k.digest_hex();
        assert_eq!(digest.len(), 64);
        let expected = Path::new("by-llm")
            .join("openai")
            .join("gpt-4.1")
            .join(format!("high-{}", &digest[..12]));
        assert_eq!(k.relative_dir(), expected);
    }

    #[test]
    fn missing_effort_uses_default_segment() {
        let dir = key("anthropic", "model-x", None).relative_dir();
        let last = dir.file_name().and_then(|s| s.to_str()).expect("segment");
        assert!(last.starts_with("default-"));
    }

    #[test]
    fn segments_are_sanitized() {
        assert_eq!(sanitize_segment("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_segment(".."), "unknown");
        assert_eq!(sanitize_segment("."), "unknown");
        assert_eq!(sanitize_segment("   "), "unknown");
        assert_eq!(sanitize_segment(&"p".repeat(100)).len(), MAX_SEGMENT_CHARS);
    }

    #[test]
    fn path_segments_keep_full_length() {
        let long = format!("{}-A", "d".repeat(64));
        assert_eq!(path_segment(&long), long);
        assert_eq!(path_segment(" a/b "), "a_b");
        assert_eq!(path_segment(".."), "unknown");
    }

    #[test]
    fn long_model_names_stay_unique() {
        let prefix = "m".repeat(80);
        let a = key("p", &format!("{prefix}-alpha"), None);
        let b = key("p", &format!("{prefix}-beta"), None);
        let seg = |k: &LlmCacheKey| {
            k.relative_dir()
                .components()
                .nth(2)
                .and_then(|c| c.as_os_str().to_str().map(str::to_string))
                .expect("model segment")
        };
        assert_eq!(seg(&a).len(), MAX_SEGMENT_CHARS);
        assert_ne!(seg(&a), seg(&b));
        assert!(seg(&a).ends_with(&a.digest_hex()[..12]));
    }

    #[test]
    fn provenance_matching_is_case_insensitive() {
        let k = key("OpenAI", "GPT-4.1", Some(" High "));
        assert!(k.matches(Some("openai"), Some("gpt-4.1"), Some("high")));
        assert!(!k.matches(Some("openai"), Some("gpt-4.1-mini"), Some("high")));
        assert!(!k.matches(Some("openai"), Some("gpt-4.1"), None));
        assert!(key("a", "b", None).matches(Some("a"), Some("b"), Some("  ")));
        assert!(!key("a", "b", None).matches(None, Some("b"), None));
    }

    #[test]
    fn blank_provider_or_model_is_rejected() {
        assert!(key(" ", "m", None).validate().is_err());
        assert!(key("p", "", None).validate().is_err());
        assert!(key("p", "m", None).validate().is_ok());
    }
}
