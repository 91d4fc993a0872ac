use crate::client::{ClientError, ClientErrorKind, StatementExecutor, ER_SP_DOES_NOT_EXIST};
use crate::error::{Error, Result};
use crate::parser::ParsedStatement;
use crate::value::{Parameters, Value};
use tracing::debug;

/// A statement written with named placeholders, prepared on first use.
///
/// The SQL is scanned once at construction. The first
/// [`execute`](Self::execute) prepares the converted SQL; later calls reuse
/// the prepared handle and only bind the new parameters.
pub struct Statement<E: StatementExecutor> {
    parsed: ParsedStatement,
    converted_sql: Option<String>,
    handle: Option<E::Handle>,
}

impl<E: StatementExecutor> Statement<E> {
    pub fn new(sql: &str) -> Result<Self> {
        Ok(Self {
            parsed: ParsedStatement::parse(sql)?,
            converted_sql: None,
            handle: None,
        })
    }

    /// The SQL sent to the server once prepared, the original text before.
    pub fn query_string(&self) -> &str {
        self.converted_sql
            .as_deref()
            .unwrap_or_else(|| self.parsed.sql())
    }

    pub fn is_prepared(&self) -> bool {
        self.handle.is_some()
    }

    /// Binds `params` and runs the statement.
    ///
    /// # Errors
    ///
    /// Missing parameters are reported before anything reaches the server.
    /// Server failures come back as [`Error::IntegrityConstraintViolation`]
    /// or [`Error::Execution`], with the statement and its arguments in the
    /// message.
    pub fn execute(&mut self, executor: &mut E, params: &Parameters) -> Result<E::Output> {
        let converted = self.parsed.bind(params)?;

        let handle = match &mut self.handle {
            Some(handle) => handle,
            None => {
                let sql = converted.sql();
                debug!(sql = %sql, "preparing statement");
                let handle = executor
                    .prepare(&sql)
                    .map_err(|err| classify_statement_error(err, &sql, converted.values()))?;
                self.converted_sql = Some(sql);
                self.handle.insert(handle)
            }
        };

        executor
            .execute(handle, converted.values())
            .map_err(|err| {
                let sql = self.converted_sql.as_deref().unwrap_or_default();
                classify_statement_error(err, sql, converted.values())
            })
    }
}

/// Wraps a failed statement call in the crate error, with the statement text
/// and arguments attached.
pub fn classify_statement_error(err: ClientError, sql: &str, values: &[Value]) -> Error {
    match err.kind(&[ER_SP_DOES_NOT_EXIST]) {
        ClientErrorKind::PacketTooLarge => Error::Execution {
            operation: "execute statement",
            context: err.truncated_message().to_string(),
            source: err,
        },
        ClientErrorKind::IntegrityConstraint => Error::IntegrityConstraintViolation {
            message: format!("{}: {}; {:?}", err.message(), sql, values),
            source: err,
        },
        _ => Error::Execution {
            operation: "execute statement",
            context: format!("{sql}; {values:?}"),
            source: err,
        },
    }
}
