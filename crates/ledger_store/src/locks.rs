use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use wageline_ledger_core::{LedgerError, LedgerResult, SubjectId};

/// Per-subject write serialization. Writers for different subjects never
/// contend; writers for the same subject queue in arrival order.
#[derive(Clone, Default)]
pub struct SubjectLocks {
    slots: Arc<Mutex<HashMap<SubjectId, Arc<AsyncMutex<()>>>>>,
}

/// Held for the lifetime of one write transaction.
pub struct SubjectGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl SubjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, subject_id: SubjectId) -> LedgerResult<SubjectGuard> {
        self.acquire_many(&[subject_id]).await
    }

    /// Locks every listed subject in ascending id order so two writers that
    /// touch the same pair cannot deadlock.
    pub async fn acquire_many(&self, subjects: &[SubjectId]) -> LedgerResult<SubjectGuard> {
        let mut ordered = subjects.to_vec();
        ordered.sort();
        ordered.dedup();
        let slots = {
            let mut map = self
                .slots
                .lock()
                .map_err(|_| LedgerError::internal("subject lock table poisoned"))?;
            // Slots referenced only by the map have no holder and no waiter.
            map.retain(|_, slot| Arc::strong_count(slot) > 1);
            ordered
                .iter()
                .map(|subject| map.entry(*subject).or_default().clone())
                .collect::<Vec<_>>()
        };
        let mut guards = Vec::with_capacity(slots.len());
        for slot in slots {
            guards.push(slot.lock_owned().await);
        }
        Ok(SubjectGuard { _guards: guards })
    }

    pub fn tracked_subjects(&self) -> usize {
        self.slots.lock().map(|map| map.len()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::SubjectLocks;
    use wageline_ledger_core::SubjectId;

    #[tokio::test]
    async fn same_subject_writers_are_serialized() {
        let locks = SubjectLocks::new();
        let subject = SubjectId::new();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let active = active.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(subject).await.expect("lock");
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.expect("join");
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_subjects_do_not_block() {
        let locks = SubjectLocks::new();
        let _first = locks.acquire(SubjectId::new()).await.expect("lock");
        let second = tokio::time::timeout(
            Duration::from_millis(200),
            locks.acquire(SubjectId::new()),
        )
        .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn released_slots_are_pruned() {
        let locks = SubjectLocks::new();
        {
            let _guard = locks.acquire(SubjectId::new()).await.expect("lock");
            assert_eq!(locks.tracked_subjects(), 1);
        }
        let _guard = locks.acquire(SubjectId::new()).await.expect("lock");
        assert_eq!(locks.tracked_subjects(), 1);
    }

    #[tokio::test]
    async fn acquire_many_tolerates_duplicates() {
        let locks = SubjectLocks::new();
        let subject = SubjectId::new();
        let guard = tokio::time::timeout(
            Duration::from_millis(200),
            locks.acquire_many(&[subject, subject]),
        )
        .await;
        assert!(guard.is_ok());
    }
}
