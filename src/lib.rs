//! # sqlx-mysql-shim
//!
//! Named placeholders and nested transactions for a blocking MySQL client built on SQLx.
//!
//! ## Features
//!
//! - **Named Placeholders**: Write `:param_name` and `?` in the same statement; both are
//!   rewritten to positional markers with the values ordered to match
//! - **Literal-Safe Scanning**: Placeholders inside string literals, quoted identifiers and
//!   comments are left alone
//! - **Nested Transactions**: Layers beyond the first become savepoints
//! - **Implicit Commit Recovery**: When MySQL silently commits (DDL inside a transaction),
//!   the transaction stack collapses to match the server instead of failing
//! - **Post-Transaction Callbacks**: Run code once the root transaction commits or rolls back
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sqlx-mysql-shim = "0.1"
//! ```
//!
//! ## Examples
//!
//! ### Converting Placeholders
//!
//! ```rust
//! use sqlx_mysql_shim::{convert, Parameters, Value};
//!
//! let params = Parameters::new().bind(":id", 5);
//! let converted = convert("SELECT ':id', id FROM t WHERE id = :id -- :id", &params)?;
//!
//! assert_eq!(converted.sql(), "SELECT ':id', id FROM t WHERE id = ? -- :id");
//! assert_eq!(converted.values(), &[Value::Int(5)]);
//! # Ok::<(), sqlx_mysql_shim::Error>(())
//! ```
//!
//! ### Basic Transaction
//!
//! ```rust,no_run
//! use sqlx_mysql_shim::{with_transaction, MySqlClient, Parameters, TransactionManager};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = MySqlClient::connect("mysql://localhost/test")?;
//! let mut manager = TransactionManager::new(client);
//!
//! with_transaction(&mut manager, |tx| {
//!     tx.client_mut().execute_named(
//!         "INSERT INTO users (name) VALUES (:name)",
//!         &Parameters::new().bind(":name", "Alice"),
//!     )?;
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Nested Transactions (Savepoints)
//!
//! ```rust,no_run
//! use sqlx_mysql_shim::{
//!     with_nested_transaction, with_transaction, MySqlClient, Parameters, TransactionManager,
//! };
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut manager = TransactionManager::new(MySqlClient::connect("mysql://localhost/test")?);
//! with_transaction(&mut manager, |tx| {
//!     tx.client_mut().execute_named(
//!         "INSERT INTO users (name) VALUES (:name)",
//!         &Parameters::new().bind(":name", "David"),
//!     )?;
//!
//!     // If this fails, only the audit log is rolled back
//!     let _ = with_nested_transaction(tx, |nested_tx| {
//!         nested_tx.client_mut().execute_named(
//!             "INSERT INTO audit_log (action) VALUES (:action)",
//!             &Parameters::new().bind(":action", "User created"),
//!         )?;
//!         Ok(())
//!     });
//!
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Manual Transaction Control
//!
//! For more control, drive the [`TransactionManager`] by name:
//!
//! ```rust,no_run
//! use sqlx_mysql_shim::{MySqlClient, TransactionManager};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut manager = TransactionManager::new(MySqlClient::connect("mysql://localhost/test")?);
//!
//! manager.push_transaction("import")?;
//! manager.add_root_transaction_end_callback(|committed| {
//!     println!("import finished, committed: {committed}");
//! })?;
//! manager.push_transaction("batch_1")?;
//! manager.rollback("batch_1")?;
//! manager.pop_transaction("import")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## How It Works
//!
//! 1. **Scanner**: Splits SQL into literals, quoted constructs, comments and placeholders
//! 2. **Converter**: Replaces each placeholder occurrence with `?` and appends its value
//! 3. **Transaction Stack**: Tracks named layers; the bottom one is the real transaction
//! 4. **Transaction Manager**: Maps layer operations onto `START TRANSACTION`, `SAVEPOINT`,
//!    `RELEASE SAVEPOINT`, `ROLLBACK TO SAVEPOINT`, `COMMIT` and `ROLLBACK`
//!
//! ## Limitations
//!
//! - Only MySQL-family servers are supported
//! - Calls block the current thread; do not use from inside an async runtime
//! - One manager per connection, used from one thread at a time
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license at your option.

#[cfg(feature = "anyhow")]
pub mod anyhow_compat;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod mysql;
pub mod parser;
pub mod statement;
pub mod transaction;
pub mod value;

#[cfg(feature = "anyhow")]
pub use anyhow_compat::{with_nested_transaction_anyhow, with_transaction_anyhow};
pub use client::{ClientError, ClientErrorKind, ClientResult, ClientTransaction, StatementExecutor};
pub use config::{load_config, ClientConfig, Config, TransactionConfig};
pub use context::TransactionContext;
pub use error::{Error, Result};
pub use executor::{with_nested_transaction, with_transaction};
pub use mysql::MySqlClient;
pub use parser::{
    convert, convert_named_placeholders_to_positional, scan, ConvertedStatement, ParsedStatement,
    Token, TokenKind,
};
pub use statement::Statement;
pub use transaction::{
    ClientConnectionTransactionState, TransactionLayer, TransactionManager, TransactionStack,
    TransactionState,
};
pub use value::{ParamKey, Parameters, Value};

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::context::TransactionContext;
    pub use crate::error::{Error, Result};
    pub use crate::executor::{with_nested_transaction, with_transaction};
    pub use crate::parser::convert;
    pub use crate::transaction::TransactionManager;
    pub use crate::value::{Parameters, Value};
}
