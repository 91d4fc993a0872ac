use crate::client::ClientTransaction;
use crate::transaction::TransactionManager;
use tracing::error;

/// Scoped handle for one layer of the transaction stack.
///
/// The layer ends when the handle is committed, rolled back, or dropped.
/// Ending it without a rollback marks it committable: the savepoint is
/// released, or the physical transaction committed if this was the root.
/// Nested handles borrow their parent, so layers always end innermost first
/// unless [`rollback`](Self::rollback) is used on an outer one.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx_mysql_shim::{MySqlClient, Parameters, TransactionContext, TransactionManager};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut manager = TransactionManager::new(MySqlClient::connect("mysql://localhost/test")?);
/// let mut tx = TransactionContext::begin(&mut manager)?;
///
/// tx.client_mut().execute_named(
///     "INSERT INTO users (name) VALUES (:name)",
///     &Parameters::new().bind(":name", "Alice"),
/// )?;
///
/// {
///     let nested = tx.nested()?;
///     // A failure in here can be undone without losing the insert above.
///     nested.rollback()?;
/// }
///
/// tx.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct TransactionContext<'m, C: ClientTransaction> {
    manager: &'m mut TransactionManager<C>,
    layer: Option<(String, u64)>,
}

impl<'m, C: ClientTransaction> TransactionContext<'m, C> {
    /// Opens a layer with a generated name: the root name when the manager
    /// is idle, a depth-numbered savepoint name otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot begin the transaction or create
    /// the savepoint.
    pub fn begin(manager: &'m mut TransactionManager<C>) -> crate::Result<Self> {
        let name = manager.next_layer_name();
        Self::begin_named(manager, &name)
    }

    /// Opens a layer called `name`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::Error::DuplicateTransactionName`] if `name` is
    /// already on the stack.
    pub fn begin_named(manager: &'m mut TransactionManager<C>, name: &str) -> crate::Result<Self> {
        let id = manager.push_transaction(name)?;
        Ok(Self {
            manager,
            layer: Some((name.to_string(), id)),
        })
    }

    /// Opens a savepoint layer inside this one.
    pub fn nested(&mut self) -> crate::Result<TransactionContext<'_, C>> {
        TransactionContext::begin(&mut *self.manager)
    }

    /// Opens a savepoint layer called `name` inside this one.
    pub fn nested_named(&mut self, name: &str) -> crate::Result<TransactionContext<'_, C>> {
        TransactionContext::begin_named(&mut *self.manager, name)
    }

    /// The layer name, or `None` once the handle has been consumed.
    pub fn name(&self) -> Option<&str> {
        self.layer.as_ref().map(|(name, _)| name.as_str())
    }

    /// Ends this layer and commits whatever became committable.
    ///
    /// Succeeds without client calls if the layer was already removed, for
    /// example by a rollback of an outer layer or after the server
    /// implicitly committed.
    pub fn commit(mut self) -> crate::Result<()> {
        match self.layer.take() {
            Some((name, id)) => self.manager.unpile(&name, id),
            None => Ok(()),
        }
    }

    /// Rolls back this layer and everything opened after it.
    ///
    /// # Errors
    ///
    /// [`crate::Error::NoActiveTransaction`] if the layer is no longer on the
    /// stack, [`crate::Error::OutOfOrderRollback`] if other active layers had
    /// to be discarded.
    pub fn rollback(mut self) -> crate::Result<()> {
        let Some((name, id)) = self.layer.take() else {
            return Ok(());
        };
        if !self.manager.has_layer(&name, id) {
            return Err(crate::Error::NoActiveTransaction(Some(name)));
        }
        self.manager.rollback(&name)
    }

    /// Registers a callback for the end of the root transaction.
    pub fn add_end_callback<F>(&mut self, callback: F) -> crate::Result<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.manager.add_root_transaction_end_callback(callback)
    }

    /// Returns the client for running statements inside this layer.
    pub fn client_mut(&mut self) -> &mut C {
        self.manager.client_mut()
    }

    pub fn manager(&self) -> &TransactionManager<C> {
        &*self.manager
    }
}

impl<'m, C: ClientTransaction> Drop for TransactionContext<'m, C> {
    /// Ends the layer like [`commit`](TransactionContext::commit).
    ///
    /// Errors cannot be returned from `drop` and are logged instead.
    fn drop(&mut self) {
        if let Some((name, id)) = self.layer.take() {
            if let Err(err) = self.manager.unpile(&name, id) {
                error!(transaction = %name, error = %err, "failed to end transaction layer");
            }
        }
    }
}
