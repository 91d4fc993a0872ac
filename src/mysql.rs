//! Blocking MySQL client built on an SQLx connection.
//!
//! Every call drives the async SQLx connection to completion on a private
//! current-thread runtime, which gives the transaction manager the
//! synchronous client it expects.

use crate::client::{ClientError, ClientResult, ClientTransaction, StatementExecutor};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::statement::Statement;
use crate::value::{Parameters, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::mysql::{MySqlArguments, MySqlQueryResult, MySqlRow, MySqlStatement};
use sqlx::query::Query;
use sqlx::{Connection, Executor, MySql, MySqlConnection, Statement as _};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

static SAVEPOINT_NAME: Lazy<std::result::Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$"));

/// Session flag set from `START TRANSACTION` until the transaction ends,
/// implicit commits included. MariaDB only.
const IN_TRANSACTION_PROBE: &str = "SELECT CAST(@@in_transaction AS SIGNED)";

/// MySQL `ER_UNKNOWN_SYSTEM_VARIABLE`, the answer to the probe on servers
/// without `@@in_transaction`.
const ER_UNKNOWN_SYSTEM_VARIABLE: u16 = 1193;

/// A MySQL connection usable as both client boundaries.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx_mysql_shim::{MySqlClient, Parameters};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut client = MySqlClient::connect("mysql://localhost/test")?;
/// let rows = client.fetch_all_named(
///     "SELECT id, name FROM users WHERE name LIKE ':not_a_placeholder%' OR id = :id",
///     &Parameters::new().bind(":id", 42),
/// )?;
/// println!("{} rows", rows.len());
/// # Ok(())
/// # }
/// ```
pub struct MySqlClient {
    runtime: Runtime,
    conn: MySqlConnection,
    probe_server_state: bool,
    in_transaction: bool,
}

impl MySqlClient {
    /// Connects to `url` with the default client configuration.
    pub fn connect(url: &str) -> Result<Self> {
        Self::connect_with(&ClientConfig {
            url: Some(url.to_string()),
            ..ClientConfig::default()
        })
    }

    /// Connects using `config.url`.
    pub fn connect_with(config: &ClientConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| Error::Config("client.url is not set".to_string()))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let conn = runtime.block_on(MySqlConnection::connect(url))?;
        debug!("connected to MySQL");

        Ok(Self {
            runtime,
            conn,
            probe_server_state: config.probe_server_state,
            in_transaction: false,
        })
    }

    /// Closes the connection.
    pub fn close(self) -> Result<()> {
        let Self { runtime, conn, .. } = self;
        runtime.block_on(conn.close())?;
        Ok(())
    }

    /// Runs `sql` with named placeholders and returns the affected row count
    /// and last insert id.
    pub fn execute_named(&mut self, sql: &str, params: &Parameters) -> Result<MySqlQueryResult> {
        Statement::<Self>::new(sql)?.execute(self, params)
    }

    /// Runs `sql` with named placeholders and returns all rows.
    pub fn fetch_all_named(&mut self, sql: &str, params: &Parameters) -> Result<Vec<MySqlRow>> {
        let converted = crate::parser::convert(sql, params)?;
        let sql = converted.sql();
        let query = bind_values(sqlx::query(&sql), converted.values());
        self.runtime
            .block_on(query.fetch_all(&mut self.conn))
            .map_err(|err| {
                crate::statement::classify_statement_error(err.into(), &sql, converted.values())
            })
    }

    /// Direct access to the SQLx connection, for anything this client does
    /// not wrap. Must not be used to end transactions behind the manager's
    /// back.
    pub fn connection_mut(&mut self) -> &mut MySqlConnection {
        &mut self.conn
    }

    fn run(&mut self, sql: &str) -> ClientResult<()> {
        debug!(sql, "executing transaction statement");
        self.runtime
            .block_on(sqlx::raw_sql(sql).execute(&mut self.conn))
            .map(|_| ())
            .map_err(ClientError::from)
    }
}

fn quote_savepoint(name: &str) -> ClientResult<String> {
    let pattern = SAVEPOINT_NAME.as_ref().map_err(|err| {
        ClientError::new(format!("savepoint name pattern does not compile: {err}"))
    })?;
    if !pattern.is_match(name) {
        return Err(ClientError::new(format!(
            "`{name}` is not a valid savepoint name"
        )));
    }
    Ok(format!("`{name}`"))
}

/// `None` when the server does not know the probed variable.
fn read_probe(answer: ClientResult<i64>) -> ClientResult<Option<bool>> {
    match answer {
        Ok(open) => Ok(Some(open != 0)),
        Err(err) if err.code() == Some(ER_UNKNOWN_SYSTEM_VARIABLE) => Ok(None),
        Err(err) => Err(err),
    }
}

fn bind_values<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    values: &[Value],
) -> Query<'q, MySql, MySqlArguments> {
    for value in values {
        query = match value.clone() {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(v),
            Value::Int(v) => query.bind(v),
            Value::UInt(v) => query.bind(v),
            Value::Float(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
            Value::Bytes(v) => query.bind(v),
        };
    }
    query
}

impl ClientTransaction for MySqlClient {
    fn begin_transaction(&mut self) -> ClientResult<()> {
        self.run("START TRANSACTION")?;
        self.in_transaction = true;
        Ok(())
    }

    fn create_savepoint(&mut self, name: &str) -> ClientResult<()> {
        let sql = format!("SAVEPOINT {}", quote_savepoint(name)?);
        self.run(&sql)
    }

    fn release_savepoint(&mut self, name: &str) -> ClientResult<()> {
        let sql = format!("RELEASE SAVEPOINT {}", quote_savepoint(name)?);
        self.run(&sql)
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> ClientResult<()> {
        let sql = format!("ROLLBACK TO SAVEPOINT {}", quote_savepoint(name)?);
        self.run(&sql)
    }

    fn commit(&mut self) -> ClientResult<()> {
        let result = self.run("COMMIT");
        self.in_transaction = false;
        result
    }

    fn rollback(&mut self) -> ClientResult<()> {
        let result = self.run("ROLLBACK");
        self.in_transaction = false;
        result
    }

    /// Without `probe_server_state` this reports the client's own view,
    /// which cannot see implicit commits. The savepoint-missing error covers
    /// those.
    ///
    /// With it, the server's `@@in_transaction` is read. A server without
    /// that variable turns probing off for the rest of the connection.
    fn in_transaction(&mut self) -> ClientResult<bool> {
        if !self.probe_server_state {
            return Ok(self.in_transaction);
        }
        let answer = self
            .runtime
            .block_on(sqlx::query_scalar::<_, i64>(IN_TRANSACTION_PROBE).fetch_one(&mut self.conn))
            .map_err(ClientError::from);

        match read_probe(answer)? {
            Some(open) => self.in_transaction = open,
            None => {
                warn!("server has no @@in_transaction, using the client's own transaction state");
                self.probe_server_state = false;
            }
        }
        Ok(self.in_transaction)
    }
}

impl StatementExecutor for MySqlClient {
    type Handle = MySqlStatement<'static>;
    type Output = MySqlQueryResult;

    fn prepare(&mut self, sql: &str) -> ClientResult<Self::Handle> {
        let statement = self
            .runtime
            .block_on((&mut self.conn).prepare(sql))
            .map_err(ClientError::from)?;
        Ok(sqlx::Statement::to_owned(&statement))
    }

    fn execute(
        &mut self,
        handle: &mut Self::Handle,
        values: &[Value],
    ) -> ClientResult<Self::Output> {
        let query = bind_values(handle.query(), values);
        self.runtime
            .block_on(query.execute(&mut self.conn))
            .map_err(ClientError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_savepoint_names_are_quoted_identifiers() {
        assert_eq!(quote_savepoint("savepoint_1").unwrap(), "`savepoint_1`");
        assert!(quote_savepoint("").is_err());
        assert!(quote_savepoint("a`; DROP TABLE t; --").is_err());
        assert!(quote_savepoint("with space").is_err());
    }

    #[test]
    fn test_session_flag_answer() {
        assert_eq!(read_probe(Ok(1)).unwrap(), Some(true));
        assert_eq!(read_probe(Ok(0)).unwrap(), Some(false));
    }

    #[test]
    fn test_server_without_in_transaction_variable() {
        let unknown = ClientError::with_code(
            ER_UNKNOWN_SYSTEM_VARIABLE,
            "Unknown system variable 'in_transaction'",
        )
        .sql_state("HY000");
        assert_eq!(read_probe(Err(unknown)).unwrap(), None);
    }

    #[test]
    fn test_server_check_failures_propagate() {
        let lost = ClientError::with_code(2013, "Lost connection to MySQL server during query");
        let err = read_probe(Err(lost)).unwrap_err();
        assert_eq!(err.code(), Some(2013));
    }

    #[test]
    fn test_connect_requires_url() {
        let err = MySqlClient::connect_with(&ClientConfig::default()).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
