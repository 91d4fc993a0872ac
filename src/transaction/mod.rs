//! Nested transactions emulated with savepoints.

pub mod manager;
pub mod stack;

pub use manager::{ClientConnectionTransactionState, TransactionManager, TransactionState};
pub use stack::{TransactionLayer, TransactionStack};
