use std::collections::HashSet;

pub const MAX_SOURCE_CHARS: usize = 512;
pub const MAX_FINDING_CHARS: usize = 2_048;
pub const MAX_WHY_CHARS: usize = 2_048;
pub const MAX_TAG_CHARS: usize = 64;

const ELLIPSIS: char = '…';
const DEDUPE_SEPARATOR: char = '\u{1F}';

/// Collapses whitespace runs to a single space, trims, and hard-truncates to
/// `max_chars` (the last kept char becomes an ellipsis). `None` when nothing
/// is left.
pub(crate) fn normalize_text(raw: &str, max_chars: usize) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(truncate_with_ellipsis(collapsed, max_chars))
}

fn truncate_with_ellipsis(input: String, max_chars: usize) -> String {
    let max_chars = max_chars.max(1);
    if input.chars().count() <= max_chars {
        return input;
    }
    let mut out: String = input.chars().take(max_chars - 1).collect();
    out.push(ELLIPSIS);
    out
}

pub(crate) fn normalize_optional(raw: Option<&str>, max_chars: usize) -> Option<String> {
    raw.and_then(|value| normalize_text(value, max_chars))
}

/// Order-preserving, case-insensitive de-dup of normalized tags.
pub(crate) fn normalize_tags(raw: Option<&[String]>) -> Option<Vec<String>> {
    let raw = raw?;
    let mut seen: HashSet<String> = HashSet::new();
    let mut tags = Vec::new();
    for tag in raw {
        let Some(tag) = normalize_text(tag, MAX_TAG_CHARS) else {
            continue;
        };
        if seen.insert(tag.to_lowercase()) {
            tags.push(tag);
        }
    }
    (!tags.is_empty()).then_some(tags)
}

/// `existing ∪ incoming`, keeping existing order and first spelling.
pub(crate) fn union_tags(
    existing: Option<Vec<String>>,
    incoming: Option<Vec<String>>,
) -> Option<Vec<String>> {
    match (existing, incoming) {
        (None, None) => None,
        (Some(tags), None) | (None, Some(tags)) => Some(tags),
        (Some(mut tags), Some(incoming)) => {
            let mut seen: HashSet<String> = tags.iter().map(|t| t.to_lowercase()).collect();
            for tag in incoming {
                if seen.insert(tag.to_lowercase()) {
                    tags.push(tag);
                }
            }
            Some(tags)
        }
    }
}

/// Identity of a fact: normalized `(source, finding)`, compared case-insensitively.
pub(crate) fn dedupe_key(source: &str, finding: &str) -> String {
    format!("{source}{DEDUPE_SEPARATOR}{finding}").to_lowercase()
}

/// Parses `E<positive int>` (any case, surrounding whitespace ignored).
pub(crate) fn parse_evidence_number(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let digits = raw.strip_prefix('E').or_else(|| raw.strip_prefix('e'))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok().filter(|n| *n > 0)
}

/// Canonical upper-case form of a valid evidence id, e.g. `" e07 "` -> `"E7"`.
pub fn normalize_evidence_id(raw: &str) -> Option<String> {
    parse_evidence_number(raw).map(format_evidence_id)
}

pub(crate) fn format_evidence_id(number: u64) -> String {
    format!("E{number}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_collapses_and_truncates() {
        assert_eq!(normalize_text("  a \t\n b  ", 10).as_deref(), Some("a b"));
        assert_eq!(normalize_text(" \n\t ", 10), None);
        assert_eq!(normalize_text("abcdef", 4).as_deref(), Some("abc…"));
        assert_eq!(normalize_text("abcd", 4).as_deref(), Some("abcd"));
        let long = "ж".repeat(600);
        let out = normalize_text(&long, MAX_SOURCE_CHARS).expect("text");
        assert_eq!(out.chars().count(), MAX_SOURCE_CHARS);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn tags_are_deduped_case_insensitively_in_order() {
        let raw = vec![
            " Deadlock ".to_string(),
            "gc".to_string(),
            "DEADLOCK".to_string(),
            "   ".to_string(),
        ];
        assert_eq!(
            normalize_tags(Some(raw.as_slice())),
            Some(vec!["Deadlock".to_string(), "gc".to_string()])
        );
        assert_eq!(normalize_tags(Some(&["  ".to_string()][..])), None);
        assert_eq!(normalize_tags(None), None);
    }

    #[test]
    fn union_keeps_existing_spelling() {
        let merged = union_tags(
            Some(vec!["Hang".into(), "gc".into()]),
            Some(vec!["hang".into(), "threads".into()]),
        );
        assert_eq!(
            merged,
            Some(vec!["Hang".to_string(), "gc".to_string(), "threads".to_string()])
        );
    }

    #[test]
    fn evidence_ids_are_canonicalized() {
        assert_eq!(normalize_evidence_id("E1").as_deref(), Some("E1"));
        assert_eq!(normalize_evidence_id(" e42 ").as_deref(), Some("E42"));
        assert_eq!(normalize_evidence_id("E007").as_deref(), Some("E7"));
        assert_eq!(normalize_evidence_id("E0"), None);
        assert_eq!(normalize_evidence_id("E"), None);
        assert_eq!(normalize_evidence_id("E-1"), None);
        assert_eq!(normalize_evidence_id("H2"), None);
        assert_eq!(normalize_evidence_id("E1a"), None);
        assert_eq!(normalize_evidence_id("E99999999999999999999999"), None);
    }

    #[test]
    fn dedupe_key_ignores_case() {
        assert_eq!(dedupe_key("Heap", "OOM"), dedupe_key("heap", "oom"));
        assert_ne!(dedupe_key("ab", "c"), dedupe_key("a", "bc"));
    }
}
