//! Types used throughout the banking system.
use rust_decimal::Decimal;

/// Account ID type, representing the unique identifier of an account.
pub type AccountId = String;

/// Money type, representing an arbitrary-precision decimal amount.
pub type Money = Decimal;
