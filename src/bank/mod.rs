//! Banking module for account storage and concurrency-safe money transfers.
mod account;
mod command;
mod coordinator;
mod locks;
mod store;
mod types;

pub use account::*;
pub use command::*;
pub use coordinator::*;
pub use locks::*;
pub use store::*;
pub use types::*;
