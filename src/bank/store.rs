//! Account storage collaborator.
//!
//! The transfer coordinator relies on the store only for atomic single-record reads and
//! writes, plus `update_pair` to publish a debit and its matching credit together.
use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;

use crate::bank::{Account, AccountId};

/// Errors reported by an [`AccountStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Account id {0} already exists")]
    Duplicate(AccountId),
    #[error("Account(s) not found: {}", .0.join(", "))]
    NotFound(Vec<AccountId>),
}

/// Key-value storage of accounts keyed by account id.
///
/// Once a store is handed to a [`TransferCoordinator`](crate::bank::TransferCoordinator), only
/// the coordinator may call `update` or `update_pair`: it alone holds the per-account locks
/// that make those writes safe. Other holders are limited to `create` and reads.
pub trait AccountStore: Send + Sync {
    /// Inserts a new account. Fails if the id is already taken.
    fn create(&self, account: Account) -> Result<(), StoreError>;

    /// Returns a snapshot of the account, if it exists.
    fn get(&self, id: &str) -> Option<Account>;

    /// Overwrites an existing account. Coordinator only.
    fn update(&self, account: Account) -> Result<(), StoreError>;

    /// Overwrites two existing accounts as one write. Nothing is written unless both exist.
    /// Coordinator only.
    fn update_pair(&self, first: Account, second: Account) -> Result<(), StoreError>;

    /// Returns every known account id in ascending order.
    fn ids(&self) -> Vec<AccountId>;
}

/// In-process [`AccountStore`] backed by a hash map.
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<AccountId, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for InMemoryAccountStore {
    fn create(&self, account: Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write();
        if accounts.contains_key(account.id()) {
            return Err(StoreError::Duplicate(account.id().to_owned()));
        }
        accounts.insert(account.id().to_owned(), account);
        Ok(())
    }

    fn get(&self, id: &str) -> Option<Account> {
        self.accounts.read().get(id).cloned()
    }

    fn update(&self, account: Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write();
        match accounts.get_mut(account.id()) {
            Some(slot) => {
                *slot = account;
                Ok(())
            }
            None => Err(StoreError::NotFound(vec![account.id().to_owned()])),
        }
    }

    fn update_pair(&self, first: Account, second: Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write();
        let missing: Vec<AccountId> = [first.id(), second.id()]
            .into_iter()
            .filter(|id| !accounts.contains_key(*id))
            .map(str::to_owned)
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::NotFound(missing));
        }
        accounts.insert(first.id().to_owned(), first);
        accounts.insert(second.id().to_owned(), second);
        Ok(())
    }

    fn ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.accounts.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
