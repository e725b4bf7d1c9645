//! Account balances and the debit/credit primitives used by the transfer protocol.
use serde::Serialize;

use crate::bank::{
    TransferError,
    types::{AccountId, Money},
};

/// Represents a bank account.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// The unique identifier of the account.
    #[serde(rename = "account")]
    id: AccountId,

    /// The current balance. Never negative after a committed transfer.
    balance: Money,
}

impl Account {
    /// Creates a new account with the given opening balance.
    pub fn new(id: impl Into<AccountId>, balance: Money) -> Self {
        Account {
            id: id.into(),
            balance,
        }
    }

    /// Gets the account ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gets the current balance.
    pub fn balance(&self) -> Money {
        self.balance
    }

    /// Adds the specified amount to the balance.
    pub(crate) fn deposit(&mut self, amount: Money) {
        self.balance += amount;
    }

    /// Removes the specified amount from the balance. Returns an error and leaves the
    /// balance untouched if there are insufficient funds.
    pub(crate) fn withdraw(&mut self, amount: Money) -> Result<(), TransferError> {
        if self.balance >= amount {
            self.balance -= amount;
            Ok(())
        } else {
            Err(TransferError::InsufficientBalance {
                account: self.id.clone(),
                balance: self.balance,
                requested: amount,
            })
        }
    }
}
