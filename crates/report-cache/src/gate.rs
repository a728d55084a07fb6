use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;

use crate::llm_key::path_segment;
use crate::{CacheError, Result};

type DumpKey = (String, String);

/// One exclusive gate per on-disk `(user, dump)` directory, created on first
/// use and kept for the lifetime of the table.
#[derive(Default)]
pub(crate) struct DumpGates {
    gates: Mutex<HashMap<DumpKey, Arc<tokio::sync::Mutex<()>>>>,
    wait_ms_last: AtomicU64,
    wait_ms_max: AtomicU64,
}

/// Held for the duration of one cache operation on a dump.
pub(crate) struct DumpGuard {
    _guard: OwnedMutexGuard<()>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateWaitSnapshot {
    pub known_dumps: usize,
    pub wait_ms_last: u64,
    pub wait_ms_max: u64,
}

impl DumpGates {
    fn gate_for(&self, user_id: &str, dump_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates
            .entry((path_segment(user_id), path_segment(dump_id)))
            .or_default()
            .clone()
    }

    pub(crate) async fn acquire(
        &self,
        user_id: &str,
        dump_id: &str,
        cancel: &CancellationToken,
    ) -> Result<DumpGuard> {
        let gate = self.gate_for(user_id, dump_id);
        let start = Instant::now();
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CacheError::Cancelled),
            guard = gate.lock_owned() => guard,
        };
        self.record_wait(start.elapsed().as_millis() as u64);
        Ok(DumpGuard { _guard: guard })
    }

    fn record_wait(&self, wait_ms: u64) {
        self.wait_ms_last.store(wait_ms, Ordering::Relaxed);
        let mut current = self.wait_ms_max.load(Ordering::Relaxed);
        while wait_ms > current {
            match self.wait_ms_max.compare_exchange(
                current,
                wait_ms,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(next) => current = next,
            }
        }
    }

    pub(crate) fn snapshot(&self) -> GateWaitSnapshot {
        let known_dumps = self
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        GateWaitSnapshot {
            known_dumps,
            wait_ms_last: self.wait_ms_last.load(Ordering::Relaxed),
            wait_ms_max: self.wait_ms_max.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_dump_is_serialized() {
        let gates = Arc::new(DumpGates::default());
        let cancel = CancellationToken::new();
        let held = gates.acquire("u", "d", &cancel).await.expect("first");

        let waiter = {
            let gates = Arc::clone(&gates);
            let cancel = cancel.clone();
            tokio::spawn(async move { gates.acquire("u", "d", &cancel).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.expect("join").expect("second");
        assert_eq!(gates.snapshot().known_dumps, 1);
    }

    #[tokio::test]
    async fn different_dumps_do_not_block() {
        let gates = DumpGates::default();
        let cancel = CancellationToken::new();
        let _a = gates.acquire("u", "a", &cancel).await.expect("a");
        let _b = gates.acquire("u", "b", &cancel).await.expect("b");
        assert_eq!(gates.snapshot().known_dumps, 2);
    }

    #[tokio::test]
    async fn ids_sharing_a_directory_share_a_gate() {
        let gates = DumpGates::default();
        let cancel = CancellationToken::new();
        let _held = gates.acquire("u", "a/b", &cancel).await.expect("held");

        let other = CancellationToken::new();
        other.cancel();
        let err = gates.acquire("u", "a_b", &other).await.err();
        assert!(matches!(err, Some(CacheError::Cancelled)));
        assert_eq!(gates.snapshot().known_dumps, 1);
    }

    #[tokio::test]
    async fn cancelled_wait_returns_error() {
        let gates = DumpGates::default();
        let cancel = CancellationToken::new();
        let _held = gates.acquire("u", "d", &cancel).await.expect("held");

        let other = CancellationToken::new();
        other.cancel();
        let err = gates.acquire("u", "d", &other).await.err();
        assert!(matches!(err, Some(CacheError::Cancelled)));
    }
}
