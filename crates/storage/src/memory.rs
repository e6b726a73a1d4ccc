//! In-memory `CheckStore` backend.
//!
//! Substitutes a per-check async lock for the relational row lock: the
//! lock guard is held by the snapshot from `get_and_lock_state` until
//! commit or abort, preserving "at most one concurrent
//! aggregate-and-transition per check". Writes are buffered in the
//! snapshot and applied atomically on commit; reads inside a snapshot
//! observe its own pending writes overlaid on committed data.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use time::OffsetDateTime;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use async_trait::async_trait;
use vigil_core::{Check, CheckState, StateId};

use crate::error::StorageError;
use crate::record::{ResultMemo, StateTransitionLogEntry};
use crate::traits::{CheckStore, LIVE_BASTION_WINDOW};

#[derive(Default)]
struct Inner {
    /// Keyed by (customer_id, check_id).
    checks: HashMap<(String, String), Check>,
    /// Keyed by check_id -- the state row is unique per check.
    states: HashMap<String, CheckState>,
    /// Keyed by (check_id, bastion_id).
    memos: HashMap<(String, String), ResultMemo>,
    transitions: Vec<StateTransitionLogEntry>,
    next_transition_id: i64,
}

/// An in-progress transaction against a [`MemoryStore`].
///
/// Dropping a snapshot without committing discards its writes and
/// releases its locks.
pub struct MemorySnapshot {
    memo_writes: HashMap<(String, String), ResultMemo>,
    state_writes: HashMap<String, CheckState>,
    transition_writes: Vec<StateTransitionLogEntry>,
    /// Per-check exclusive locks held by this snapshot, keyed by check_id.
    guards: HashMap<String, OwnedMutexGuard<()>>,
}

/// In-memory transactional check-state store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    state_locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn inner(&self) -> Result<MutexGuard<'_, Inner>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Backend("memory store mutex poisoned".to_string()))
    }

    /// The lock cell for a check, created on first use.
    fn state_lock(&self, check_id: &str) -> Result<Arc<AsyncMutex<()>>, StorageError> {
        let mut locks = self
            .state_locks
            .lock()
            .map_err(|_| StorageError::Backend("memory store mutex poisoned".to_string()))?;
        Ok(locks
            .entry(check_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }

    fn get_check_row(
        &self,
        customer_id: &str,
        check_id: &str,
    ) -> Result<Check, StorageError> {
        let inner = self.inner()?;
        match inner
            .checks
            .get(&(customer_id.to_string(), check_id.to_string()))
        {
            Some(check) if !check.deleted => Ok(check.clone()),
            _ => Err(StorageError::CheckNotFound {
                customer_id: customer_id.to_string(),
                check_id: check_id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl CheckStore for MemoryStore {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        Ok(MemorySnapshot {
            memo_writes: HashMap::new(),
            state_writes: HashMap::new(),
            transition_writes: Vec::new(),
            guards: HashMap::new(),
        })
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        {
            let mut inner = self.inner()?;
            for (key, memo) in snapshot.memo_writes {
                inner.memos.insert(key, memo);
            }
            for (check_id, state) in snapshot.state_writes {
                inner.states.insert(check_id, state);
            }
            inner.transitions.extend(snapshot.transition_writes);
        }
        // Guards drop here, releasing the per-check locks.
        Ok(())
    }

    async fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        drop(snapshot);
        Ok(())
    }

    async fn get_memo(
        &self,
        snapshot: &mut MemorySnapshot,
        check_id: &str,
        bastion_id: &str,
    ) -> Result<Option<ResultMemo>, StorageError> {
        let key = (check_id.to_string(), bastion_id.to_string());
        if let Some(pending) = snapshot.memo_writes.get(&key) {
            return Ok(Some(pending.clone()));
        }
        Ok(self.inner()?.memos.get(&key).cloned())
    }

    async fn put_memo(
        &self,
        snapshot: &mut MemorySnapshot,
        memo: ResultMemo,
    ) -> Result<(), StorageError> {
        let key = (memo.check_id.clone(), memo.bastion_id.clone());
        snapshot.memo_writes.insert(key, memo);
        Ok(())
    }

    async fn get_and_lock_state(
        &self,
        snapshot: &mut MemorySnapshot,
        customer_id: &str,
        check_id: &str,
    ) -> Result<CheckState, StorageError> {
        if !snapshot.guards.contains_key(check_id) {
            let lock = self.state_lock(check_id)?;
            // Blocks until any concurrent snapshot for this check commits
            // or aborts. Must not be awaited while the inner mutex is held.
            let guard = lock.lock_owned().await;
            snapshot.guards.insert(check_id.to_string(), guard);
        }

        let check = self.get_check_row(customer_id, check_id)?;

        let committed = if let Some(pending) = snapshot.state_writes.get(check_id) {
            Some(pending.clone())
        } else {
            self.inner()?.states.get(check_id).cloned()
        };

        match committed {
            Some(mut state) => {
                // Thresholds come from the check definition at read time;
                // the stored row is not authoritative for them.
                state.min_failing_count = check.min_failing_count;
                state.min_failing_time = check.min_failing_duration();
                Ok(state)
            }
            None => Ok(CheckState::default_ok(&check, OffsetDateTime::now_utc())),
        }
    }

    async fn update_state(
        &self,
        snapshot: &mut MemorySnapshot,
        state: &mut CheckState,
    ) -> Result<(), StorageError> {
        let mut failing_count = 0i32;
        let mut response_count = 0i32;

        let inner = self.inner()?;
        for ((check_id, bastion_id), memo) in &inner.memos {
            if check_id != &state.check_id {
                continue;
            }
            // Pending writes shadow the committed memo for that bastion.
            if snapshot
                .memo_writes
                .contains_key(&(check_id.clone(), bastion_id.clone()))
            {
                continue;
            }
            failing_count += memo.failing_count;
            response_count += memo.response_count;
        }
        for memo in snapshot.memo_writes.values() {
            if memo.check_id == state.check_id {
                failing_count += memo.failing_count;
                response_count += memo.response_count;
            }
        }

        state.failing_count = failing_count;
        state.response_count = response_count;
        Ok(())
    }

    async fn put_state(
        &self,
        snapshot: &mut MemorySnapshot,
        state: &CheckState,
    ) -> Result<(), StorageError> {
        snapshot
            .state_writes
            .insert(state.check_id.clone(), state.clone());
        Ok(())
    }

    async fn create_state_transition_log_entry(
        &self,
        snapshot: &mut MemorySnapshot,
        check_id: &str,
        customer_id: &str,
        from_state: StateId,
        to_state: StateId,
    ) -> Result<StateTransitionLogEntry, StorageError> {
        // Ids are assigned eagerly, sequence-style: an aborted snapshot
        // leaves a gap, never a duplicate.
        let id = {
            let mut inner = self.inner()?;
            inner.next_transition_id += 1;
            inner.next_transition_id
        };

        let entry = StateTransitionLogEntry {
            id,
            check_id: check_id.to_string(),
            customer_id: customer_id.to_string(),
            from_state,
            to_state,
            created_at: OffsetDateTime::now_utc(),
        };
        snapshot.transition_writes.push(entry.clone());
        Ok(entry)
    }

    async fn get_check(&self, customer_id: &str, check_id: &str) -> Result<Check, StorageError> {
        self.get_check_row(customer_id, check_id)
    }

    async fn get_state(
        &self,
        customer_id: &str,
        check_id: &str,
    ) -> Result<Option<CheckState>, StorageError> {
        let inner = self.inner()?;
        Ok(inner
            .states
            .get(check_id)
            .filter(|s| s.customer_id == customer_id)
            .cloned())
    }

    async fn get_live_bastions(
        &self,
        customer_id: &str,
        check_id: &str,
    ) -> Result<Vec<String>, StorageError> {
        let inner = self.inner()?;
        let mut memos: Vec<&ResultMemo> = inner
            .memos
            .values()
            .filter(|m| m.check_id == check_id && m.customer_id == customer_id)
            .collect();
        memos.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));

        let newest = match memos.first() {
            Some(memo) => memo.last_updated,
            None => return Ok(Vec::new()),
        };

        Ok(memos
            .iter()
            .filter(|m| newest - m.last_updated <= LIVE_BASTION_WINDOW)
            .map(|m| m.bastion_id.clone())
            .collect())
    }

    async fn get_transition_log_entries(
        &self,
        check_id: &str,
        customer_id: &str,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<StateTransitionLogEntry>, StorageError> {
        let inner = self.inner()?;
        let mut entries: Vec<StateTransitionLogEntry> = inner
            .transitions
            .iter()
            .filter(|e| {
                e.check_id == check_id
                    && e.customer_id == customer_id
                    && e.created_at >= from
                    && e.created_at <= to
            })
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn put_check(&self, check: Check) -> Result<(), StorageError> {
        let mut inner = self.inner()?;
        inner
            .checks
            .insert((check.customer_id.clone(), check.id.clone()), check);
        Ok(())
    }

    async fn delete_check(&self, customer_id: &str, check_id: &str) -> Result<(), StorageError> {
        let mut inner = self.inner()?;
        match inner
            .checks
            .get_mut(&(customer_id.to_string(), check_id.to_string()))
        {
            Some(check) => {
                check.deleted = true;
                Ok(())
            }
            None => Err(StorageError::CheckNotFound {
                customer_id: customer_id.to_string(),
                check_id: check_id.to_string(),
            }),
        }
    }
}
