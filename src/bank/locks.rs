//! Per-account exclusive locks and the canonical order in which they are taken.
//!
//! Every transfer locks its accounts through [`LockRegistry::acquire`], which always takes the
//! lexicographically smaller id first. Two transfers over the same pair of accounts therefore
//! contend on the same first lock whatever their direction, so no cycle of waiters can form.
use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::bank::{AccountId, TransferError};

/// Canonical lock order for a pair of ids: smaller id first. The second slot is `None` when
/// both ids are equal, since a single lock covers a self-transfer.
pub fn order<'a>(a: &'a str, b: &'a str) -> (&'a str, Option<&'a str>) {
    match a.cmp(b) {
        std::cmp::Ordering::Less => (a, Some(b)),
        std::cmp::Ordering::Greater => (b, Some(a)),
        std::cmp::Ordering::Equal => (a, None),
    }
}

/// Guards held for the duration of a transfer's critical section. Dropping it releases the
/// locks in reverse acquisition order.
pub struct PairGuard {
    _second: Option<OwnedMutexGuard<()>>,
    _first: OwnedMutexGuard<()>,
}

/// Process-wide table mapping each account id to its lock. Entries are created on first use
/// and never removed, so equal ids always resolve to the same lock.
#[derive(Default)]
pub struct LockRegistry {
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `id`, creating it if needed.
    pub fn handle(&self, id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(id) {
            return lock.clone();
        }
        self.locks.entry(id.to_owned()).or_default().clone()
    }

    /// Locks both accounts in canonical order, waiting at most `timeout` per lock if set.
    pub async fn acquire(
        &self,
        a: &str,
        b: &str,
        timeout: Option<Duration>,
    ) -> Result<PairGuard, TransferError> {
        let (first_id, second_id) = order(a, b);
        let first = self.lock_one(first_id, timeout).await?;
        let second = match second_id {
            Some(id) => Some(self.lock_one(id, timeout).await?),
            None => None,
        };
        Ok(PairGuard {
            _second: second,
            _first: first,
        })
    }

    async fn lock_one(
        &self,
        id: &str,
        timeout: Option<Duration>,
    ) -> Result<OwnedMutexGuard<()>, TransferError> {
        let lock = self.handle(id);
        let guard = match timeout {
            Some(limit) => tokio::time::timeout(limit, lock.lock_owned())
                .await
                .map_err(|_| TransferError::LockTimeout(id.to_owned()))?,
            None => lock.lock_owned().await,
        };
        debug!(account = id, "lock acquired");
        Ok(guard)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}
