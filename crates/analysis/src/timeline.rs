//! Per-thread activity and deadlock detection over wait relationships.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use triage_protocol::{
    AnalysisResult, AnalysisTimeline, BlockedChain, Deadlock, LegacyDeadlock, SynchronizationInfo,
    ThreadActivity, ThreadInfo, TimelineThread, WaitGraph, TIMELINE_VERSION,
};

use crate::frames::{first_meaningful, normalize_frame, wait_kind};
use crate::signature::faulting_state_is_sigstop;

pub const MAX_TIMELINE_THREADS: usize = 200;
pub const MAX_WAITING_THREADS_WALKED: usize = 50;
pub const MAX_CHAIN_HOPS: usize = 16;
pub const MAX_LEGACY_DEADLOCKS: usize = 10;

pub const BLOCKED_CHAIN_KIND: &str = "waitgraph";
pub const BLOCKED_CHAIN_CONFIDENCE: f64 = 0.7;
pub const WAITGRAPH_DEADLOCK_KIND: &str = "waitgraph-cycle";
pub const MONITOR_DEADLOCK_KIND: &str = "monitor-cycle";
pub const DEADLOCK_CONFIDENCE: f64 = 0.6;

pub fn build_timeline(result: &AnalysisResult) -> AnalysisTimeline {
    let threads = result
        .threads
        .iter()
        .enumerate()
        .take(MAX_TIMELINE_THREADS)
        .map(|(index, thread)| timeline_thread(index, thread))
        .collect();

    let (blocked_chains, deadlocks) = match result.synchronization.as_ref() {
        Some(sync) => derive_deadlocks(sync),
        None => (Vec::new(), Vec::new()),
    };

    AnalysisTimeline {
        version: TIMELINE_VERSION,
        capture_reason: capture_reason(result).map(str::to_string),
        total_threads: result.threads.len(),
        threads,
        blocked_chains: (!blocked_chains.is_empty()).then_some(blocked_chains),
        deadlocks: (!deadlocks.is_empty()).then_some(deadlocks),
    }
}

fn timeline_thread(index: usize, thread: &ThreadInfo) -> TimelineThread {
    let mut entry = TimelineThread {
        thread_id: thread.thread_id.clone(),
        os_thread_id: thread.os_thread_id.clone(),
        state: thread.state.clone(),
        activity: ThreadActivity::Unknown,
        wait_kind: None,
        top_frame: None,
        evidence: Vec::new(),
    };
    let Some((frame_index, frame)) = first_meaningful(&thread.call_stack) else {
        return entry;
    };
    entry.top_frame = Some(normalize_frame(frame));
    match wait_kind(frame) {
        Some(kind) => {
            entry.activity = ThreadActivity::Waiting;
            entry.wait_kind = Some(kind.to_string());
            entry
                .evidence
                .push(format!("threads[{index}].call_stack[{frame_index}]"));
        }
        None => entry.activity = ThreadActivity::Running,
    }
    entry
}

/// Why the snapshot was captured, strongest reason first.
pub fn capture_reason(result: &AnalysisResult) -> Option<&'static str> {
    if faulting_state_is_sigstop(result) {
        Some("SIGSTOP")
    } else if result.signal_name().is_some() {
        Some("signal")
    } else if result.exception_type().is_some() {
        Some("exception")
    } else {
        None
    }
}

/// The wait graph wins over the engine's legacy monitor list when it has edges.
pub fn derive_deadlocks(sync: &SynchronizationInfo) -> (Vec<BlockedChain>, Vec<Deadlock>) {
    match sync.wait_graph.as_ref() {
        Some(graph) if !graph.edges.is_empty() => walk_wait_graph(graph),
        _ => (Vec::new(), legacy_deadlocks(&sync.potential_deadlocks)),
    }
}

pub fn walk_wait_graph(graph: &WaitGraph) -> (Vec<BlockedChain>, Vec<Deadlock>) {
    let mut owner_of: HashMap<&str, &str> = HashMap::new();
    for edge in graph.edges.iter().filter(|e| e.is_owned_by()) {
        owner_of.insert(edge.from.as_str(), edge.to.as_str());
    }

    // BTreeMap keeps the waiting threads in ascending id order.
    let mut waits_on_owner: BTreeMap<&str, &str> = BTreeMap::new();
    for edge in graph.edges.iter().filter(|e| e.is_waits()) {
        if let Some(owner) = owner_of.get(edge.to.as_str()) {
            waits_on_owner.insert(edge.from.as_str(), *owner);
        }
    }

    let mut blocked_chains = Vec::new();
    let mut deadlocks = Vec::new();
    let mut seen_cycles: HashSet<Vec<String>> = HashSet::new();

    for start in waits_on_owner
        .keys()
        .copied()
        .take(MAX_WAITING_THREADS_WALKED)
    {
        let mut chain: Vec<&str> = vec![start];
        let mut seen: HashSet<&str> = HashSet::from([start]);
        let mut current = start;

        for _ in 0..MAX_CHAIN_HOPS {
            let Some(next) = waits_on_owner.get(current).copied() else {
                break;
            };
            chain.push(next);
            if !seen.insert(next) {
                let cycle_start = chain.iter().position(|t| *t == next).unwrap_or(0);
                let members: BTreeSet<&str> = chain[cycle_start..].iter().copied().collect();
                let members: Vec<String> = members.into_iter().map(str::to_string).collect();
                if seen_cycles.insert(members.clone()) {
                    deadlocks.push(Deadlock {
                        kind: WAITGRAPH_DEADLOCK_KIND.to_string(),
                        confidence: DEADLOCK_CONFIDENCE,
                        threads: members,
                    });
                }
                break;
            }
            current = next;
        }

        if chain.len() > 1 {
            blocked_chains.push(BlockedChain {
                kind: BLOCKED_CHAIN_KIND.to_string(),
                confidence: BLOCKED_CHAIN_CONFIDENCE,
                threads: chain.into_iter().map(str::to_string).collect(),
            });
        }
    }

    log::debug!(
        "wait graph walk: {} waiting threads, {} blocked chains, {} deadlocks",
        waits_on_owner.len(),
        blocked_chains.len(),
        deadlocks.len()
    );
    (blocked_chains, deadlocks)
}

fn legacy_deadlocks(entries: &[LegacyDeadlock]) -> Vec<Deadlock> {
    entries
        .iter()
        .take(MAX_LEGACY_DEADLOCKS)
        .map(|entry| Deadlock {
            kind: MONITOR_DEADLOCK_KIND.to_string(),
            confidence: DEADLOCK_CONFIDENCE,
            threads: entry
                .thread_ids
                .iter()
                .map(|id| format!("thread_{id}"))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use triage_protocol::{ExceptionInfo, StackFrame, WaitGraphEdge};

    fn frame(function: &str, managed: bool) -> StackFrame {
        StackFrame {
            function: Some(function.to_string()),
            is_managed: managed,
            ..StackFrame::default()
        }
    }

    fn graph(edges: &[(&str, &str, &str)]) -> WaitGraph {
        WaitGraph {
            edges: edges
                .iter()
                .map(|(from, label, to)| WaitGraphEdge::new(*from, *label, *to))
                .collect(),
        }
    }

    fn sorted(mut threads: Vec<String>) -> Vec<String> {
        threads.sort();
        threads
    }

    #[test]
    fn two_thread_cycle_yields_one_deadlock() {
        let g = graph(&[
            ("T1", "waits", "R1"),
            ("R1", "owned by", "T2"),
            ("T2", "waits", "R2"),
            ("R2", "owned by", "T1"),
        ]);
        let (chains, deadlocks) = walk_wait_graph(&g);
        assert_eq!(deadlocks.len(), 1);
        assert_eq!(deadlocks[0].kind, "waitgraph-cycle");
        assert_eq!(deadlocks[0].confidence, 0.6);
        assert_eq!(
            sorted(deadlocks[0].threads.clone()),
            vec!["T1".to_string(), "T2".to_string()]
        );
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].threads, vec!["T1", "T2", "T1"]);
        assert!(chains.iter().all(|c| c.kind == "waitgraph" && c.confidence == 0.7));
    }

    #[test]
    fn acyclic_chain_is_blocked_not_deadlocked() {
        let g = graph(&[
            ("A", "WAITS", "lock-x"),
            ("lock-x", "Owned By", "B"),
            ("B", "waits", "lock-y"),
            ("lock-y", "owned by", "C"),
            ("D", "waits", "socket"),
        ]);
        let (chains, deadlocks) = walk_wait_graph(&g);
        assert!(deadlocks.is_empty());
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].threads, vec!["A", "B", "C"]);
        assert_eq!(chains[1].threads, vec!["B", "C"]);
    }

    #[test]
    fn later_owner_edge_overwrites_earlier() {
        let g = graph(&[
            ("R1", "owned by", "T9"),
            ("R1", "owned by", "T2"),
            ("T1", "waits", "R1"),
        ]);
        let (chains, _) = walk_wait_graph(&g);
        assert_eq!(chains[0].threads, vec!["T1", "T2"]);
    }

    #[test]
    fn deadlock_members_exclude_threads_leading_into_the_cycle() {
        let g = graph(&[
            ("A", "waits", "R0"),
            ("R0", "owned by", "B"),
            ("B", "waits", "R1"),
            ("R1", "owned by", "C"),
            ("C", "waits", "R2"),
            ("R2", "owned by", "B"),
        ]);
        let (_, deadlocks) = walk_wait_graph(&g);
        assert_eq!(deadlocks.len(), 1);
        assert_eq!(deadlocks[0].threads, vec!["B".to_string(), "C".to_string()]);
    }

    #[test]
    fn long_chain_is_capped_by_hop_limit() {
        let mut edges = Vec::new();
        for i in 0..40 {
            edges.push(WaitGraphEdge::new(format!("T{i:02}"), "waits", format!("R{i:02}")));
            edges.push(WaitGraphEdge::new(
                format!("R{i:02}"),
                "owned by",
                format!("T{:02}", i + 1),
            ));
        }
        let (chains, deadlocks) = walk_wait_graph(&WaitGraph { edges });
        assert!(deadlocks.is_empty());
        assert_eq!(chains[0].threads.len(), MAX_CHAIN_HOPS + 1);
        assert_eq!(chains.len(), 40);
    }

    #[test]
    fn legacy_list_used_only_without_wait_graph() {
        let legacy: Vec<LegacyDeadlock> = (0..12)
            .map(|i| LegacyDeadlock {
                thread_ids: vec![i, i + 1],
                description: None,
            })
            .collect();
        let sync = SynchronizationInfo {
            wait_graph: None,
            potential_deadlocks: legacy.clone(),
        };
        let (chains, deadlocks) = derive_deadlocks(&sync);
        assert!(chains.is_empty());
        assert_eq!(deadlocks.len(), MAX_LEGACY_DEADLOCKS);
        assert_eq!(deadlocks[0].kind, "monitor-cycle");
        assert_eq!(deadlocks[0].threads, vec!["thread_0", "thread_1"]);

        let sync = SynchronizationInfo {
            wait_graph: Some(graph(&[("T1", "waits", "R1"), ("R1", "owned by", "T1")])),
            potential_deadlocks: legacy,
        };
        let (_, deadlocks) = derive_deadlocks(&sync);
        assert_eq!(deadlocks.len(), 1);
        assert_eq!(deadlocks[0].kind, "waitgraph-cycle");
        assert_eq!(deadlocks[0].threads, vec!["T1"]);
    }

    #[test]
    fn thread_activity_classification() {
        let result = AnalysisResult {
            threads: vec![
                ThreadInfo {
                    thread_id: "1".into(),
                    call_stack: vec![
                        frame("[Runtime]", true),
                        frame("System.Threading.Monitor.Wait", true),
                    ],
                    ..ThreadInfo::default()
                },
                ThreadInfo {
                    thread_id: "2".into(),
                    call_stack: vec![frame("App.Compute", true)],
                    ..ThreadInfo::default()
                },
                ThreadInfo {
                    thread_id: "3".into(),
                    call_stack: vec![frame("[JIT Code @ 0x10]", true)],
                    ..ThreadInfo::default()
                },
            ],
            ..AnalysisResult::default()
        };
        let timeline = build_timeline(&result);
        assert_eq!(timeline.threads[0].activity, ThreadActivity::Waiting);
        assert_eq!(timeline.threads[0].wait_kind.as_deref(), Some("monitor"));
        assert_eq!(timeline.threads[0].evidence, vec!["threads[0].call_stack[1]"]);
        assert_eq!(timeline.threads[1].activity, ThreadActivity::Running);
        assert!(timeline.threads[1].evidence.is_empty());
        assert_eq!(timeline.threads[2].activity, ThreadActivity::Unknown);
        assert!(timeline.blocked_chains.is_none());
        assert!(timeline.deadlocks.is_none());
    }

    #[test]
    fn threads_are_capped_but_counted() {
        let result = AnalysisResult {
            threads: (0..250)
                .map(|i| ThreadInfo {
                    thread_id: i.to_string(),
                    ..ThreadInfo::default()
                })
                .collect(),
            ..AnalysisResult::default()
        };
        let timeline = build_timeline(&result);
        assert_eq!(timeline.threads.len(), MAX_TIMELINE_THREADS);
        assert_eq!(timeline.total_threads, 250);
    }

    #[test]
    fn capture_reason_priority() {
        let mut result = AnalysisResult {
            threads: vec![ThreadInfo {
                thread_id: "1".into(),
                is_faulting: true,
                state: Some("Stopped by SIGSTOP".into()),
                ..ThreadInfo::default()
            }],
            exception: Some(ExceptionInfo {
                exception_type: Some("System.Exception".into()),
                signal_name: Some("SIGABRT".into()),
                ..ExceptionInfo::default()
            }),
            ..AnalysisResult::default()
        };
        assert_eq!(capture_reason(&result), Some("SIGSTOP"));
        result.threads[0].state = None;
        assert_eq!(capture_reason(&result), Some("signal"));
        if let Some(exception) = result.exception.as_mut() {
            exception.signal_name = None;
        }
        assert_eq!(capture_reason(&result), Some("exception"));
        result.exception = None;
        assert_eq!(capture_reason(&result), None);
    }
}
