use std::collections::HashSet;
use triage_protocol::{
    non_blank, AnalysisResult, MissingSymbols, SourceLinkHealth, SymbolsHealthSummary,
};

pub const MAX_SYMBOL_EXAMPLES: usize = 20;

pub fn summarize_symbols(result: &AnalysisResult) -> SymbolsHealthSummary {
    SymbolsHealthSummary {
        native: native_missing(result),
        managed: managed_missing(result),
        source_link: source_link_health(result),
    }
}

fn native_missing(result: &AnalysisResult) -> MissingSymbols {
    let names = result
        .modules
        .iter()
        .filter(|m| m.has_symbols == Some(false))
        .filter_map(|m| non_blank(Some(m.name.as_str())));
    let distinct = distinct_sorted(names);
    MissingSymbols {
        missing_count: distinct.len(),
        examples: distinct.into_iter().take(MAX_SYMBOL_EXAMPLES).collect(),
    }
}

// Managed frames only. Resolved source links are counted separately over
// every frame, managed or not.
fn managed_missing(result: &AnalysisResult) -> MissingSymbols {
    let mut missing_count = 0usize;
    let mut modules: Vec<&str> = Vec::new();
    for frame in result.threads.iter().flat_map(|t| t.call_stack.iter()) {
        if !frame.is_managed || !frame.has_source_position() || frame.has_source_url() {
            continue;
        }
        missing_count += 1;
        if let Some(module) = non_blank(frame.module.as_deref()) {
            modules.push(module);
        }
    }
    MissingSymbols {
        missing_count,
        examples: distinct_sorted(modules.into_iter())
            .into_iter()
            .take(MAX_SYMBOL_EXAMPLES)
            .collect(),
    }
}

fn source_link_health(result: &AnalysisResult) -> SourceLinkHealth {
    let mut health = SourceLinkHealth::default();
    for frame in result.threads.iter().flat_map(|t| t.call_stack.iter()) {
        if frame.has_source_url() {
            health.resolved_count += 1;
        } else if frame.has_source_position() {
            health.unresolved_count += 1;
        }
    }
    health
}

/// Case-insensitive distinct (first spelling wins), then ordinal ascending.
fn distinct_sorted<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<String> = Vec::new();
    for name in names {
        if seen.insert(name.to_lowercase()) {
            out.push(name.to_string());
        }
    }
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use triage_protocol::{ModuleInfo, StackFrame, ThreadInfo};

    fn module(name: &str, has_symbols: Option<bool>) -> ModuleInfo {
        ModuleInfo {
            name: name.to_string(),
            has_symbols,
            ..ModuleInfo::default()
        }
    }

    fn frame(module: &str, managed: bool, file: Option<&str>, line: u32, url: Option<&str>) -> StackFrame {
        StackFrame {
            module: Some(module.to_string()),
            function: Some("f".into()),
            source_file: file.map(str::to_string),
            line_number: Some(line),
            source_url: url.map(str::to_string),
            is_managed: managed,
        }
    }

    #[test]
    fn native_missing_is_distinct_case_insensitive_and_sorted() {
        let result = AnalysisResult {
            modules: vec![
                module("libz.so", Some(false)),
                module("LIBZ.SO", Some(false)),
                module("libcoreclr.so", Some(false)),
                module("libc.so.6", Some(true)),
                module("unknown.so", None),
                module("  ", Some(false)),
            ],
            ..AnalysisResult::default()
        };
        let summary = summarize_symbols(&result);
        assert_eq!(summary.native.missing_count, 2);
        assert_eq!(
            summary.native.examples,
            vec!["libcoreclr.so".to_string(), "libz.so".to_string()]
        );
    }

    #[test]
    fn managed_missing_and_source_link_are_independent() {
        let result = AnalysisResult {
            threads: vec![ThreadInfo {
                thread_id: "1".into(),
                call_stack: vec![
                    frame("B.dll", true, Some("b.cs"), 3, None),
                    frame("A.dll", true, Some("a.cs"), 5, None),
                    frame("A.dll", true, Some("a.cs"), 9, None),
                    frame("A.dll", true, Some("a.cs"), 0, None),
                    frame("A.dll", true, Some("a.cs"), 2, Some("https://src/a.cs")),
                    frame("libnative.so", false, Some("n.c"), 4, Some("https://src/n.c")),
                    frame("libnative.so", false, Some("n.c"), 8, None),
                ],
                ..ThreadInfo::default()
            }],
            ..AnalysisResult::default()
        };
        let summary = summarize_symbols(&result);
        assert_eq!(summary.managed.missing_count, 3);
        assert_eq!(
            summary.managed.examples,
            vec!["A.dll".to_string(), "B.dll".to_string()]
        );
        assert_eq!(summary.source_link.resolved_count, 2);
        assert_eq!(summary.source_link.unresolved_count, 4);
    }

    #[test]
    fn examples_are_capped() {
        let modules = (0..30)
            .map(|i| module(&format!("lib{i:02}.so"), Some(false)))
            .collect();
        let result = AnalysisResult {
            modules,
            ..AnalysisResult::default()
        };
        let summary = summarize_symbols(&result);
        assert_eq!(summary.native.missing_count, 30);
        assert_eq!(summary.native.examples.len(), MAX_SYMBOL_EXAMPLES);
        assert_eq!(summary.native.examples[0], "lib00.so");
    }
}
