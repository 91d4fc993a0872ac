use super::context::TransactionContext;
use crate::client::ClientTransaction;
use crate::transaction::TransactionManager;
use tracing::warn;

/// Executes a function within a transaction layer.
///
/// This function handles the layer lifecycle automatically:
/// - Opens a layer (the physical transaction if the manager is idle, a
///   savepoint otherwise)
/// - Executes the provided function
/// - Commits the layer on success
/// - Rolls it back on error
///
/// # Type Parameters
///
/// * `C` - The client behind the manager
/// * `F` - A function that takes a mutable `TransactionContext`
/// * `T` - The return type of the function
///
/// # Arguments
///
/// * `manager` - The transaction manager of the connection
/// * `f` - The function to execute within the transaction
///
/// # Returns
///
/// Returns the result of the function, or an error if the transaction could
/// not be opened or committed.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx_mysql_shim::{with_transaction, MySqlClient, Parameters, TransactionManager};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut manager = TransactionManager::new(MySqlClient::connect("mysql://localhost/test")?);
///
/// let user_id = with_transaction(&mut manager, |tx| {
///     let result = tx.client_mut().execute_named(
///         "INSERT INTO users (name) VALUES (:name)",
///         &Parameters::new().bind(":name", "Bob"),
///     )?;
///     let user_id = result.last_insert_id();
///
///     tx.client_mut().execute_named(
///         "INSERT INTO profiles (user_id, bio) VALUES (:user_id, :bio)",
///         &Parameters::new()
///             .bind(":user_id", user_id)
///             .bind(":bio", "Software Developer"),
///     )?;
///
///     Ok(user_id)
/// })?;
///
/// println!("Created user with ID: {}", user_id);
/// # Ok(())
/// # }
/// ```
pub fn with_transaction<C, F, T>(manager: &mut TransactionManager<C>, f: F) -> crate::Result<T>
where
    C: ClientTransaction,
    F: FnOnce(&mut TransactionContext<'_, C>) -> crate::Result<T>,
{
    let tx_ctx = TransactionContext::begin(manager)?;
    run_layer(tx_ctx, f)
}

/// Executes a nested transaction using a savepoint.
///
/// If the function fails, only the work done since the savepoint is rolled
/// back and the outer transaction can still commit.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx_mysql_shim::{
///     with_nested_transaction, with_transaction, MySqlClient, Parameters, TransactionManager,
/// };
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut manager = TransactionManager::new(MySqlClient::connect("mysql://localhost/test")?);
///
/// with_transaction(&mut manager, |tx| {
///     tx.client_mut().execute_named(
///         "INSERT INTO users (name) VALUES (:name)",
///         &Parameters::new().bind(":name", "Alice"),
///     )?;
///
///     let nested_result = with_nested_transaction(tx, |nested_tx| {
///         nested_tx.client_mut().execute_named(
///             "INSERT INTO logs (message) VALUES (:message)",
///             &Parameters::new().bind(":message", "User created"),
///         )?;
///         Ok(())
///     });
///
///     if nested_result.is_err() {
///         println!("Logging failed, but user creation will still commit");
///     }
///     Ok(())
/// })?;
/// # Ok(())
/// # }
/// ```
///
/// # Note
///
/// MySQL doesn't support true nested transactions. The savepoint name is
/// generated from the current depth, e.g. `savepoint_1`.
pub fn with_nested_transaction<C, F, T>(
    tx_ctx: &mut TransactionContext<'_, C>,
    f: F,
) -> crate::Result<T>
where
    C: ClientTransaction,
    F: FnOnce(&mut TransactionContext<'_, C>) -> crate::Result<T>,
{
    let nested = tx_ctx.nested()?;
    run_layer(nested, f)
}

pub(crate) fn run_layer<C, F, T, E>(mut tx_ctx: TransactionContext<'_, C>, f: F) -> Result<T, E>
where
    C: ClientTransaction,
    F: FnOnce(&mut TransactionContext<'_, C>) -> Result<T, E>,
    E: From<crate::Error>,
{
    match f(&mut tx_ctx) {
        Ok(result) => {
            tx_ctx.commit()?;
            Ok(result)
        }
        Err(e) => {
            let name = tx_ctx.name().unwrap_or_default().to_string();
            if let Err(rollback_err) = tx_ctx.rollback() {
                warn!(
                    transaction = %name,
                    error = %rollback_err,
                    "rollback after a failed transaction body did not complete cleanly"
                );
            }
            Err(e)
        }
    }
}
