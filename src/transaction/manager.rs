use super::stack::{TransactionLayer, TransactionStack};
use crate::client::{ClientError, ClientTransaction};
use crate::config::TransactionConfig;
use crate::error::{Error, Result};
use tracing::{debug, warn};

/// Where the manager is in its life cycle, derived from the stack depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No layers and no physical transaction
    Idle,
    /// Only the root layer
    RootActive,
    /// The root layer and at least one savepoint
    NestedActive,
}

/// Outcome of the last root-level transition on the client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientConnectionTransactionState {
    Active,
    Committed,
    CommitFailed,
    RolledBack,
    RollbackFailed,
    /// The server had already ended the transaction on its own, typically by
    /// an implicit commit after DDL.
    Voided,
}

type EndCallback = Box<dyn FnOnce(bool) + Send>;

/// Nested transactions on top of a client that only knows flat transactions
/// and savepoints.
///
/// The first pushed layer begins the physical transaction; later layers are
/// savepoints. The stack is local bookkeeping only: MySQL silently commits
/// and drops every savepoint when DDL runs inside a transaction, so every
/// release or rollback to a savepoint is prepared for the server to have
/// forgotten it, and collapses the stack to match instead of failing.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx_mysql_shim::{MySqlClient, TransactionManager};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = MySqlClient::connect("mysql://localhost/test")?;
/// let mut manager = TransactionManager::new(client);
///
/// manager.push_transaction("outer")?;
/// manager.push_transaction("inner")?;
/// manager.rollback("inner")?;
/// manager.pop_transaction("outer")?;
/// # Ok(())
/// # }
/// ```
pub struct TransactionManager<C: ClientTransaction> {
    client: C,
    config: TransactionConfig,
    stack: TransactionStack,
    connection_state: Option<ClientConnectionTransactionState>,
    end_callbacks: Vec<EndCallback>,
}

impl<C: ClientTransaction> TransactionManager<C> {
    pub fn new(client: C) -> Self {
        Self::with_config(client, TransactionConfig::default())
    }

    pub fn with_config(client: C, config: TransactionConfig) -> Self {
        Self {
            client,
            config,
            stack: TransactionStack::new(),
            connection_state: None,
            end_callbacks: Vec::new(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Mutable access to the client, for running statements inside the
    /// current transaction.
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn into_client(self) -> C {
        self.client
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    pub fn state(&self) -> TransactionState {
        match self.stack.len() {
            0 => TransactionState::Idle,
            1 => TransactionState::RootActive,
            _ => TransactionState::NestedActive,
        }
    }

    pub fn in_transaction(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn layers(&self) -> &[TransactionLayer] {
        self.stack.layers()
    }

    pub fn has_transaction(&self, name: &str) -> bool {
        self.stack.contains(name)
    }

    pub(crate) fn has_layer(&self, name: &str, id: u64) -> bool {
        self.stack.contains_layer(name, id)
    }

    pub fn connection_state(&self) -> Option<ClientConnectionTransactionState> {
        self.connection_state
    }

    /// A name for the next layer: the configured root name when idle,
    /// otherwise the savepoint prefix followed by the current depth.
    pub fn next_layer_name(&self) -> String {
        if self.stack.is_empty() {
            return self.config.root_name.clone();
        }
        let mut depth = self.stack.len();
        loop {
            let name = format!("{}{}", self.config.savepoint_prefix, depth);
            if !self.stack.contains(&name) {
                return name;
            }
            depth += 1;
        }
    }

    /// Opens a layer named `name` and returns its id.
    ///
    /// Begins the physical transaction when idle, creates a savepoint
    /// otherwise.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateTransactionName`] if `name` is already on the stack,
    /// [`Error::Execution`] if the client call fails.
    pub fn push_transaction(&mut self, name: &str) -> Result<u64> {
        if self.stack.contains(name) {
            return Err(Error::DuplicateTransactionName(name.to_string()));
        }

        if self.stack.is_empty() {
            debug!(transaction = name, "beginning client transaction");
            self.client
                .begin_transaction()
                .map_err(|source| Error::execution("begin transaction", layer(name), source))?;
            self.connection_state = Some(ClientConnectionTransactionState::Active);
        } else {
            debug!(savepoint = name, depth = self.stack.len(), "creating savepoint");
            self.client
                .create_savepoint(name)
                .map_err(|source| Error::execution("create savepoint", layer(name), source))?;
        }

        self.stack.push(name)
    }

    /// Ends the scope of `name` and commits whatever became committable.
    ///
    /// # Errors
    ///
    /// [`Error::NoActiveTransaction`] if `name` is not on the stack.
    pub fn pop_transaction(&mut self, name: &str) -> Result<()> {
        if !self.stack.resolve(name) {
            return Err(Error::NoActiveTransaction(Some(name.to_string())));
        }
        self.pop_committable()
    }

    /// Ends the scope of one specific layer. A layer that is already gone,
    /// rolled back past or collapsed after divergence, is ignored.
    pub(crate) fn unpile(&mut self, name: &str, id: u64) -> Result<()> {
        if !self.stack.resolve_layer(name, id) {
            debug!(transaction = name, "transaction layer already left the stack");
            return Ok(());
        }
        self.pop_committable()
    }

    /// Removes resolved layers from the top of the stack.
    ///
    /// Each removed savepoint is released. Emptying the stack commits the
    /// physical transaction. A savepoint the server no longer knows means the
    /// server already committed: the stack is cleared and the root finalized
    /// without an error.
    pub fn pop_committable(&mut self) -> Result<()> {
        while self.stack.top().is_some_and(|top| !top.is_active()) {
            let Some(resolved) = self.stack.pop() else {
                break;
            };

            if self.stack.is_empty() {
                self.process_root_commit(resolved.name())?;
            } else if !self.release_savepoint(resolved.name())? {
                break;
            }
        }
        Ok(())
    }

    /// Rolls back to the layer `name`, discarding every layer above it.
    ///
    /// # Errors
    ///
    /// [`Error::NoActiveTransaction`] if `name` is not on the stack.
    /// [`Error::OutOfOrderRollback`] after a completed rollback that had to
    /// discard other active layers on the way to `name`.
    pub fn rollback(&mut self, name: &str) -> Result<()> {
        if self.stack.is_empty() || !self.stack.contains(name) {
            return Err(Error::NoActiveTransaction(Some(name.to_string())));
        }

        let mut skipped_active = false;
        while let Some(popped) = self.stack.pop() {
            if popped.name() != name {
                skipped_active |= popped.is_active();
                continue;
            }

            if self.stack.is_empty() {
                break;
            }

            if self.rollback_to_savepoint(name)? {
                self.pop_committable()?;
            }
            return out_of_order(name, skipped_active);
        }

        self.process_root_rollback(name)?;
        out_of_order(name, skipped_active)
    }

    /// Registers `callback` to run once when the root transaction ends, with
    /// `true` for a commit and `false` for a rollback.
    ///
    /// # Errors
    ///
    /// [`Error::NoActiveTransaction`] when idle.
    pub fn add_root_transaction_end_callback<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        if self.stack.is_empty() {
            return Err(Error::NoActiveTransaction(None));
        }
        self.end_callbacks.push(Box::new(callback));
        Ok(())
    }

    /// Forgets all layers and pending callbacks without any client call.
    ///
    /// For use when the connection is closed or replaced.
    pub fn reset(&mut self) {
        if !self.stack.is_empty() {
            warn!(depth = self.stack.len(), "resetting transaction stack with open layers");
        }
        self.stack.clear();
        self.end_callbacks.clear();
        self.connection_state = None;
    }

    /// Returns `false` if the stack was collapsed instead of releasing.
    fn release_savepoint(&mut self, name: &str) -> Result<bool> {
        if !self.server_in_transaction(name)? {
            warn!(savepoint = name, "no server transaction left, skipping savepoint release");
            self.collapse(name)?;
            return Ok(false);
        }

        debug!(savepoint = name, "releasing savepoint");
        match self.client.release_savepoint(name) {
            Ok(()) => Ok(true),
            Err(err) if self.is_savepoint_missing(&err) => {
                warn!(
                    savepoint = name,
                    error = %err,
                    "savepoint vanished on the server, assuming an implicit commit"
                );
                self.collapse(name)?;
                Ok(false)
            }
            Err(source) => Err(Error::execution("release savepoint", savepoint(name), source)),
        }
    }

    /// Returns `false` if the stack was collapsed instead of rolling back.
    fn rollback_to_savepoint(&mut self, name: &str) -> Result<bool> {
        if !self.server_in_transaction(name)? {
            warn!(savepoint = name, "no server transaction left, skipping rollback to savepoint");
            self.collapse(name)?;
            return Ok(false);
        }

        debug!(savepoint = name, "rolling back to savepoint");
        match self.client.rollback_to_savepoint(name) {
            Ok(()) => Ok(true),
            Err(err) if self.is_savepoint_missing(&err) => {
                warn!(
                    savepoint = name,
                    error = %err,
                    "savepoint vanished on the server, assuming an implicit commit"
                );
                self.collapse(name)?;
                Ok(false)
            }
            Err(source) => Err(Error::execution(
                "rollback to savepoint",
                savepoint(name),
                source,
            )),
        }
    }

    /// Brings the stack in line with a server that has no transaction left.
    fn collapse(&mut self, name: &str) -> Result<()> {
        self.stack.clear();
        self.process_root_commit(name)
    }

    fn process_root_commit(&mut self, name: &str) -> Result<()> {
        if !self.server_in_transaction(name)? {
            debug!(transaction = name, "server transaction already ended, nothing to commit");
            self.connection_state = Some(ClientConnectionTransactionState::Voided);
            self.run_end_callbacks(true);
            return Ok(());
        }

        debug!(transaction = name, "committing client transaction");
        match self.client.commit() {
            Ok(()) => {
                self.connection_state = Some(ClientConnectionTransactionState::Committed);
                self.run_end_callbacks(true);
                Ok(())
            }
            Err(source) => {
                self.connection_state = Some(ClientConnectionTransactionState::CommitFailed);
                self.run_end_callbacks(false);
                Err(Error::execution("commit", layer(name), source))
            }
        }
    }

    fn process_root_rollback(&mut self, name: &str) -> Result<()> {
        self.run_end_callbacks(false);

        if !self.server_in_transaction(name)? {
            self.connection_state = Some(ClientConnectionTransactionState::Voided);
            warn!(
                transaction = name,
                "Rollback attempted when there is no active transaction. This can cause data integrity issues."
            );
        }

        debug!(transaction = name, "rolling back client transaction");
        match self.client.rollback() {
            Ok(()) => {
                self.connection_state = Some(ClientConnectionTransactionState::RolledBack);
                Ok(())
            }
            Err(source) => {
                self.connection_state = Some(ClientConnectionTransactionState::RollbackFailed);
                Err(Error::execution("rollback", layer(name), source))
            }
        }
    }

    fn server_in_transaction(&mut self, name: &str) -> Result<bool> {
        if !self.config.verify_server_transaction {
            return Ok(true);
        }
        self.client
            .in_transaction()
            .map_err(|source| Error::execution("check transaction state", layer(name), source))
    }

    fn is_savepoint_missing(&self, err: &ClientError) -> bool {
        err.is_savepoint_missing(&self.config.savepoint_missing_codes)
    }

    fn run_end_callbacks(&mut self, success: bool) {
        for callback in std::mem::take(&mut self.end_callbacks) {
            callback(success);
        }
    }
}

fn layer(name: &str) -> String {
    format!("transaction `{name}`")
}

fn savepoint(name: &str) -> String {
    format!("savepoint `{name}`")
}

fn out_of_order(name: &str, skipped_active: bool) -> Result<()> {
    if skipped_active {
        warn!(transaction = name, "rollback discarded other active transaction layers");
        return Err(Error::OutOfOrderRollback {
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientResult, ER_SP_DOES_NOT_EXIST};

    /// Accepts everything; `release_savepoint` can be told to fail once.
    #[derive(Default)]
    struct FlakyClient {
        calls: Vec<String>,
        release_error: Option<u16>,
    }

    impl ClientTransaction for FlakyClient {
        fn begin_transaction(&mut self) -> ClientResult<()> {
            self.calls.push("begin".to_string());
            Ok(())
        }

        fn create_savepoint(&mut self, name: &str) -> ClientResult<()> {
            self.calls.push(format!("savepoint {name}"));
            Ok(())
        }

        fn release_savepoint(&mut self, name: &str) -> ClientResult<()> {
            self.calls.push(format!("release {name}"));
            match self.release_error.take() {
                Some(code) => Err(ClientError::with_code(code, "release failed")),
                None => Ok(()),
            }
        }

        fn rollback_to_savepoint(&mut self, name: &str) -> ClientResult<()> {
            self.calls.push(format!("rollback to {name}"));
            Ok(())
        }

        fn commit(&mut self) -> ClientResult<()> {
            self.calls.push("commit".to_string());
            Ok(())
        }

        fn rollback(&mut self) -> ClientResult<()> {
            self.calls.push("rollback".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_state_follows_depth() {
        let mut manager = TransactionManager::new(FlakyClient::default());
        assert_eq!(manager.state(), TransactionState::Idle);
        manager.push_transaction("root").unwrap();
        assert_eq!(manager.state(), TransactionState::RootActive);
        manager.push_transaction("s1").unwrap();
        assert_eq!(manager.state(), TransactionState::NestedActive);
        assert_eq!(manager.client().calls, ["begin", "savepoint s1"]);
    }

    #[test]
    fn test_next_layer_name() {
        let mut manager = TransactionManager::new(FlakyClient::default());
        assert_eq!(manager.next_layer_name(), "shim_transaction");
        manager.push_transaction("shim_transaction").unwrap();
        manager.push_transaction("savepoint_2").unwrap();
        assert_eq!(manager.next_layer_name(), "savepoint_3");
        manager.pop_transaction("savepoint_2").unwrap();
        manager.push_transaction("savepoint_1").unwrap();
        // Depth is 2 again, but savepoint_2 would be free, so it is reused.
        assert_eq!(manager.next_layer_name(), "savepoint_2");
    }

    #[test]
    fn test_vanished_savepoint_on_release_finalizes_root() {
        let mut manager = TransactionManager::new(FlakyClient {
            release_error: Some(ER_SP_DOES_NOT_EXIST),
            ..Default::default()
        });
        manager.push_transaction("root").unwrap();
        manager.push_transaction("s1").unwrap();

        manager.pop_transaction("s1").unwrap();

        assert_eq!(manager.state(), TransactionState::Idle);
        assert_eq!(
            manager.client().calls,
            ["begin", "savepoint s1", "release s1", "commit"]
        );
        assert_eq!(
            manager.connection_state(),
            Some(ClientConnectionTransactionState::Committed)
        );
    }

    #[test]
    fn test_other_release_errors_propagate() {
        let mut manager = TransactionManager::new(FlakyClient {
            release_error: Some(1213),
            ..Default::default()
        });
        manager.push_transaction("root").unwrap();
        manager.push_transaction("s1").unwrap();

        let err = manager.pop_transaction("s1").unwrap_err();
        assert!(matches!(
            err,
            Error::Execution { operation: "release savepoint", .. }
        ));
        assert_eq!(manager.depth(), 1);
    }

    #[test]
    fn test_callbacks_require_open_transaction() {
        let mut manager = TransactionManager::new(FlakyClient::default());
        assert!(matches!(
            manager.add_root_transaction_end_callback(|_| {}),
            Err(Error::NoActiveTransaction(None))
        ));
    }

    #[test]
    fn test_reset_returns_to_idle_without_client_calls() {
        let mut manager = TransactionManager::new(FlakyClient::default());
        manager.push_transaction("root").unwrap();
        manager.reset();
        assert_eq!(manager.state(), TransactionState::Idle);
        assert_eq!(manager.connection_state(), None);
        assert_eq!(manager.client().calls, ["begin"]);
    }
}
