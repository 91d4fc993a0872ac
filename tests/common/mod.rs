#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use sqlx_mysql_shim::client::{ClientError, ClientResult, ClientTransaction, ER_SP_DOES_NOT_EXIST};

/// A client that keeps MySQL's transaction bookkeeping in memory.
///
/// Savepoints only exist while a transaction is open, releasing or rolling
/// back to an unknown savepoint fails with error 1305, and
/// [`simulate_ddl_autocommit`](Self::simulate_ddl_autocommit) behaves like a
/// DDL statement: the transaction ends and every savepoint is gone.
#[derive(Default)]
pub struct ScriptedClient {
    pub calls: Vec<String>,
    pub in_transaction: bool,
    pub savepoints: Vec<String>,
    /// Report `true` from `in_transaction` no matter what the server state is,
    /// like a client that only tracks its own calls.
    pub blind_probe: bool,
    failures: VecDeque<(&'static str, ClientError)>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blind() -> Self {
        Self {
            blind_probe: true,
            ..Self::default()
        }
    }

    pub fn simulate_ddl_autocommit(&mut self) {
        self.calls.push("ddl".to_string());
        self.in_transaction = false;
        self.savepoints.clear();
    }

    /// Makes the next call of `operation` fail with `err`.
    pub fn fail_next(&mut self, operation: &'static str, err: ClientError) {
        self.failures.push_back((operation, err));
    }

    fn take_failure(&mut self, operation: &str) -> ClientResult<()> {
        match self.failures.iter().position(|(op, _)| *op == operation) {
            Some(index) => match self.failures.remove(index) {
                Some((_, err)) => Err(err),
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    fn forget_savepoints_from(&mut self, name: &str, keep: bool) -> ClientResult<()> {
        match self.savepoints.iter().position(|sp| sp == name) {
            Some(index) => {
                self.savepoints.truncate(if keep { index + 1 } else { index });
                Ok(())
            }
            None => Err(ClientError::with_code(
                ER_SP_DOES_NOT_EXIST,
                format!("SAVEPOINT {name} does not exist"),
            )
            .sql_state("42000")),
        }
    }
}

impl ClientTransaction for ScriptedClient {
    fn begin_transaction(&mut self) -> ClientResult<()> {
        self.calls.push("begin".to_string());
        self.take_failure("begin")?;
        self.in_transaction = true;
        Ok(())
    }

    fn create_savepoint(&mut self, name: &str) -> ClientResult<()> {
        self.calls.push(format!("savepoint {name}"));
        self.take_failure("savepoint")?;
        self.savepoints.retain(|sp| sp != name);
        self.savepoints.push(name.to_string());
        Ok(())
    }

    fn release_savepoint(&mut self, name: &str) -> ClientResult<()> {
        self.calls.push(format!("release {name}"));
        self.take_failure("release")?;
        self.forget_savepoints_from(name, false)
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> ClientResult<()> {
        self.calls.push(format!("rollback to {name}"));
        self.take_failure("rollback to")?;
        self.forget_savepoints_from(name, true)
    }

    fn commit(&mut self) -> ClientResult<()> {
        self.calls.push("commit".to_string());
        self.take_failure("commit")?;
        self.in_transaction = false;
        self.savepoints.clear();
        Ok(())
    }

    fn rollback(&mut self) -> ClientResult<()> {
        self.calls.push("rollback".to_string());
        self.take_failure("rollback")?;
        self.in_transaction = false;
        self.savepoints.clear();
        Ok(())
    }

    fn in_transaction(&mut self) -> ClientResult<bool> {
        Ok(self.blind_probe || self.in_transaction)
    }
}

/// Collects the arguments end callbacks were called with.
#[derive(Clone, Default)]
pub struct CallbackLog(Arc<Mutex<Vec<bool>>>);

impl CallbackLog {
    pub fn recorder(&self) -> impl FnOnce(bool) + Send + 'static {
        let log = Arc::clone(&self.0);
        move |committed| log.lock().unwrap().push(committed)
    }

    pub fn calls(&self) -> Vec<bool> {
        self.0.lock().unwrap().clone()
    }
}
