use super::context::TransactionContext;
use super::executor::run_layer;
use crate::client::ClientTransaction;
use crate::transaction::TransactionManager;

/// Executes a function within a transaction layer, using anyhow::Error for error handling.
///
/// This is a convenience wrapper around the main `with_transaction` function that accepts
/// closures returning `anyhow::Result<T>` instead of `crate::Result<T>`.
///
/// # Examples
///
/// ```rust,no_run
/// use anyhow::Context;
/// use sqlx_mysql_shim::{with_transaction_anyhow, MySqlClient, Parameters, TransactionManager};
///
/// # fn example() -> anyhow::Result<()> {
/// let mut manager = TransactionManager::new(MySqlClient::connect("mysql://localhost/test")?);
/// with_transaction_anyhow(&mut manager, |tx| {
///     tx.client_mut()
///         .execute_named(
///             "INSERT INTO users (name) VALUES (:name)",
///             &Parameters::new().bind(":name", "Alice"),
///         )
///         .context("inserting user")?;
///     Ok(())
/// })?;
/// # Ok(())
/// # }
/// ```
pub fn with_transaction_anyhow<C, F, T>(
    manager: &mut TransactionManager<C>,
    f: F,
) -> anyhow::Result<T>
where
    C: ClientTransaction,
    F: FnOnce(&mut TransactionContext<'_, C>) -> anyhow::Result<T>,
{
    let tx_ctx = TransactionContext::begin(manager)?;
    run_layer(tx_ctx, f)
}

/// Executes a nested transaction using a savepoint, with anyhow::Error for error handling.
///
/// This is a convenience wrapper for nested transactions that accepts closures
/// returning `anyhow::Result<T>`.
pub fn with_nested_transaction_anyhow<C, F, T>(
    tx_ctx: &mut TransactionContext<'_, C>,
    f: F,
) -> anyhow::Result<T>
where
    C: ClientTransaction,
    F: FnOnce(&mut TransactionContext<'_, C>) -> anyhow::Result<T>,
{
    let nested = tx_ctx.nested()?;
    run_layer(nested, f)
}
