//! The transfer coordinator: moves money between two accounts as one atomic unit.
//!
//! A transfer validates the amount, rejects unknown ids up front, locks both accounts through
//! the [`LockRegistry`] in canonical order, re-reads both balances from the store, checks
//! existence again and funds, and writes the debit
//! and credit back with a single [`AccountStore::update_pair`] call before either lock is
//! released. Notification runs after the locks are gone and never affects the outcome.
use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bank::{Account, AccountId, AccountStore, LockRegistry, Money, StoreError};

/// Errors that can occur while creating accounts or transferring money.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Account id {0} already exists")]
    DuplicateAccount(AccountId),
    #[error("Account(s) not found: {}", .0.join(", "))]
    AccountNotFound(Vec<AccountId>),
    #[error("Transfer amount must be positive, got {0}")]
    InvalidAmount(Money),
    #[error("Initial balance of account {account} must not be negative, got {balance}")]
    NegativeBalance { account: AccountId, balance: Money },
    #[error("Insufficient balance in account {account}: has {balance}, needs {requested}")]
    InsufficientBalance {
        account: AccountId,
        balance: Money,
        requested: Money,
    },
    #[error("Timed out waiting for the lock on account {0}")]
    LockTimeout(AccountId),
}

impl TransferError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::DuplicateAccount(_) => "DUPLICATE_ACCOUNT",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::InvalidAmount(_) => "INVALID_AMOUNT",
            TransferError::NegativeBalance { .. } => "NEGATIVE_BALANCE",
            TransferError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            TransferError::LockTimeout(_) => "LOCK_TIMEOUT",
        }
    }

    /// HTTP status an API layer would answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::DuplicateAccount(_) => 409,
            TransferError::AccountNotFound(_) => 404,
            TransferError::InvalidAmount(_)
            | TransferError::NegativeBalance { .. }
            | TransferError::InsufficientBalance { .. } => 400,
            TransferError::LockTimeout(_) => 503,
        }
    }
}

impl From<StoreError> for TransferError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(id) => TransferError::DuplicateAccount(id),
            StoreError::NotFound(ids) => TransferError::AccountNotFound(ids),
        }
    }
}

/// Outcome of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Money,
    /// Source balance right after the commit.
    pub from_balance: Money,
    /// Destination balance right after the commit.
    pub to_balance: Money,
}

/// Error raised by a [`TransferNotifier`]. Logged, never propagated to the caller.
#[derive(Error, Debug)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// Hook invoked after each committed transfer.
pub trait TransferNotifier: Send + Sync + 'static {
    fn notify(&self, receipt: &TransferReceipt) -> Result<(), NotifyError>;
}

/// Notifier that does nothing.
pub struct NoopNotifier;

impl TransferNotifier for NoopNotifier {
    fn notify(&self, _receipt: &TransferReceipt) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Notifier that records each committed transfer in the log.
pub struct LogNotifier;

impl TransferNotifier for LogNotifier {
    fn notify(&self, receipt: &TransferReceipt) -> Result<(), NotifyError> {
        debug!(
            from = %receipt.from,
            to = %receipt.to,
            amount = %receipt.amount,
            from_balance = %receipt.from_balance,
            to_balance = %receipt.to_balance,
            "transfer notification"
        );
        Ok(())
    }
}

/// Tunables for the coordinator.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    /// Maximum wait for each account lock. `None` waits indefinitely.
    pub lock_timeout: Option<Duration>,
}

/// Serializes all balance mutations for the accounts it manages.
pub struct TransferCoordinator {
    store: Arc<dyn AccountStore>,
    locks: LockRegistry,
    notifier: Arc<dyn TransferNotifier>,
    config: CoordinatorConfig,
}

impl TransferCoordinator {
    /// Creates a coordinator over `store`. Notifications are off until a notifier is set.
    pub fn new(store: Arc<dyn AccountStore>, config: CoordinatorConfig) -> Self {
        TransferCoordinator {
            store,
            locks: LockRegistry::new(),
            notifier: Arc::new(NoopNotifier),
            config,
        }
    }

    /// Replaces the post-commit notification hook.
    pub fn with_notifier(mut self, notifier: Arc<dyn TransferNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Registers a new account.
    pub fn create_account(&self, account: Account) -> Result<(), TransferError> {
        if account.balance() < Money::ZERO {
            return Err(TransferError::NegativeBalance {
                account: account.id().to_owned(),
                balance: account.balance(),
            });
        }
        let id = account.id().to_owned();
        self.store.create(account)?;
        info!(account = %id, "account created");
        Ok(())
    }

    /// Returns a snapshot of the account, or `None` if it does not exist.
    pub fn get_account(&self, id: &str) -> Option<Account> {
        self.store.get(id)
    }

    /// Returns snapshots of every account, ordered by id.
    pub fn accounts(&self) -> Vec<Account> {
        self.store
            .ids()
            .iter()
            .filter_map(|id| self.store.get(id))
            .collect()
    }

    /// Ids among `from_id` and `to_id` that do not resolve to an account, in request order.
    /// Checked before locking so unknown ids never get a registry entry.
    fn missing_accounts(&self, from_id: &str, to_id: &str) -> Vec<AccountId> {
        let mut missing = Vec::new();
        if self.store.get(from_id).is_none() {
            missing.push(from_id.to_owned());
        }
        if from_id != to_id && self.store.get(to_id).is_none() {
            missing.push(to_id.to_owned());
        }
        missing
    }

    /// Moves `amount` from `from_id` to `to_id`.
    ///
    /// Either both balances change or neither does. Transfers touching a common account are
    /// serialized; transfers over disjoint accounts run in parallel.
    pub async fn transfer_money(
        &self,
        from_id: &str,
        to_id: &str,
        amount: Money,
    ) -> Result<TransferReceipt, TransferError> {
        if amount <= Money::ZERO {
            warn!(from = from_id, to = to_id, %amount, "rejected non-positive amount");
            return Err(TransferError::InvalidAmount(amount));
        }

        let missing = self.missing_accounts(from_id, to_id);
        if !missing.is_empty() {
            warn!(from = from_id, to = to_id, %amount, "rejected unknown account(s)");
            return Err(TransferError::AccountNotFound(missing));
        }

        let receipt = {
            let _guard = self
                .locks
                .acquire(from_id, to_id, self.config.lock_timeout)
                .await?;
            self.commit(from_id, to_id, amount).inspect_err(|err| {
                warn!(from = from_id, to = to_id, %amount, "transfer rejected: {err}")
            })?
        };

        info!(from = from_id, to = to_id, %amount, "transfer committed");
        self.dispatch_notification(receipt.clone());
        Ok(receipt)
    }

    /// Critical section. Must only be called with both account locks held.
    fn commit(
        &self,
        from_id: &str,
        to_id: &str,
        amount: Money,
    ) -> Result<TransferReceipt, TransferError> {
        let from = self.store.get(from_id);
        let to = if from_id == to_id {
            from.clone()
        } else {
            self.store.get(to_id)
        };

        let (mut from, mut to) = match (from, to) {
            (Some(from), Some(to)) => (from, to),
            (from, to) => {
                let mut missing = Vec::new();
                if from.is_none() {
                    missing.push(from_id.to_owned());
                }
                if to.is_none() && from_id != to_id {
                    missing.push(to_id.to_owned());
                }
                return Err(TransferError::AccountNotFound(missing));
            }
        };

        from.withdraw(amount)?;
        if from_id == to_id {
            from.deposit(amount);
            let balance = from.balance();
            self.store.update(from)?;
            return Ok(TransferReceipt {
                from: from_id.to_owned(),
                to: to_id.to_owned(),
                amount,
                from_balance: balance,
                to_balance: balance,
            });
        }
        to.deposit(amount);

        let receipt = TransferReceipt {
            from: from_id.to_owned(),
            to: to_id.to_owned(),
            amount,
            from_balance: from.balance(),
            to_balance: to.balance(),
        };
        self.store.update_pair(from, to)?;
        Ok(receipt)
    }

    fn dispatch_notification(&self, receipt: TransferReceipt) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                from = %receipt.from,
                to = %receipt.to,
                "no tokio runtime, notification skipped"
            );
            return;
        };
        let notifier = Arc::clone(&self.notifier);
        handle.spawn_blocking(move || {
            if let Err(err) = notifier.notify(&receipt) {
                warn!(from = %receipt.from, to = %receipt.to, "{err}");
            }
        });
    }
}
