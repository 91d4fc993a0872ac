//! Boundaries to the underlying database client.
//!
//! The transaction manager and the statement wrapper never talk to a server
//! directly. They go through [`ClientTransaction`] and [`StatementExecutor`],
//! which keeps them testable against an in-memory client and lets the MySQL
//! adapter in [`crate::mysql`] stay a thin translation layer.

use crate::value::Value;

/// MySQL `ER_SP_DOES_NOT_EXIST`: the savepoint named in the statement is gone.
pub const ER_SP_DOES_NOT_EXIST: u16 = 1305;

/// MySQL `ER_NET_PACKET_TOO_LARGE`.
pub const ER_NET_PACKET_TOO_LARGE: u16 = 1153;

/// MySQL `ER_NO_DEFAULT_FOR_FIELD`, reported for an INSERT that omits a
/// column without a default value.
pub const ER_NO_DEFAULT_FOR_FIELD: u16 = 1364;

/// Smallest `max_allowed_packet` MySQL accepts, in bytes.
pub const MIN_MAX_ALLOWED_PACKET: usize = 1024;

/// Result type returned by client boundary calls
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// A failure reported by the database client.
///
/// Carries the vendor error number and SQLSTATE when the client provides
/// them, so callers can branch on [`ClientError::kind`] instead of parsing
/// messages.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ClientError {
    code: Option<u16>,
    sql_state: Option<String>,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

/// Classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// The server no longer knows the savepoint, usually because an implicit
    /// commit discarded it.
    SavepointMissing,
    /// SQLSTATE class 23, or an INSERT without a value for a column that has
    /// no default.
    IntegrityConstraint,
    /// The statement exceeded `max_allowed_packet`.
    PacketTooLarge,
    /// Anything else.
    Other,
}

impl ClientError {
    /// Creates an error without vendor details.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            sql_state: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error carrying a vendor error number.
    pub fn with_code(code: u16, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            ..Self::new(message)
        }
    }

    /// Attaches a five character SQLSTATE.
    pub fn sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    /// Attaches the original client error as the source.
    pub fn caused_by(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> Option<u16> {
        self.code
    }

    pub fn state(&self) -> Option<&str> {
        self.sql_state.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classifies the error. `savepoint_missing_codes` lists the vendor
    /// numbers that mean "savepoint does not exist" for the target server.
    pub fn kind(&self, savepoint_missing_codes: &[u16]) -> ClientErrorKind {
        match self.code {
            Some(code) if savepoint_missing_codes.contains(&code) => {
                ClientErrorKind::SavepointMissing
            }
            Some(ER_NET_PACKET_TOO_LARGE) => ClientErrorKind::PacketTooLarge,
            Some(ER_NO_DEFAULT_FOR_FIELD) => ClientErrorKind::IntegrityConstraint,
            _ if self.state().is_some_and(|state| state.starts_with("23")) => {
                ClientErrorKind::IntegrityConstraint
            }
            _ => ClientErrorKind::Other,
        }
    }

    pub fn is_savepoint_missing(&self, savepoint_missing_codes: &[u16]) -> bool {
        self.kind(savepoint_missing_codes) == ClientErrorKind::SavepointMissing
    }

    /// The message cut to at most [`MIN_MAX_ALLOWED_PACKET`] bytes on a
    /// character boundary, so it can be written back to the database.
    pub fn truncated_message(&self) -> &str {
        let message = self.message.as_str();
        if message.len() <= MIN_MAX_ALLOWED_PACKET {
            return message;
        }
        let mut end = MIN_MAX_ALLOWED_PACKET;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        &message[..end]
    }
}

impl From<sqlx::Error> for ClientError {
    fn from(err: sqlx::Error) -> Self {
        let (code, sql_state) = match &err {
            sqlx::Error::Database(db) => (
                db.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                    .map(|mysql| mysql.number()),
                db.code().map(|state| state.into_owned()),
            ),
            _ => (None, None),
        };
        Self {
            code,
            sql_state,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// The flat begin/commit/rollback surface of a client connection, plus
/// savepoints.
///
/// Every call blocks until the server answers.
pub trait ClientTransaction {
    fn begin_transaction(&mut self) -> ClientResult<()>;

    fn create_savepoint(&mut self, name: &str) -> ClientResult<()>;

    /// May fail with a savepoint-missing error if the server implicitly
    /// committed since the savepoint was created.
    fn release_savepoint(&mut self, name: &str) -> ClientResult<()>;

    /// May fail with a savepoint-missing error, like
    /// [`release_savepoint`](Self::release_savepoint).
    fn rollback_to_savepoint(&mut self, name: &str) -> ClientResult<()>;

    fn commit(&mut self) -> ClientResult<()>;

    fn rollback(&mut self) -> ClientResult<()>;

    /// Whether the server still has a transaction open on this connection.
    ///
    /// Clients that cannot tell should keep the default, which assumes it does.
    fn in_transaction(&mut self) -> ClientResult<bool> {
        Ok(true)
    }
}

impl<T: ClientTransaction + ?Sized> ClientTransaction for &mut T {
    fn begin_transaction(&mut self) -> ClientResult<()> {
        (**self).begin_transaction()
    }

    fn create_savepoint(&mut self, name: &str) -> ClientResult<()> {
        (**self).create_savepoint(name)
    }

    fn release_savepoint(&mut self, name: &str) -> ClientResult<()> {
        (**self).release_savepoint(name)
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> ClientResult<()> {
        (**self).rollback_to_savepoint(name)
    }

    fn commit(&mut self) -> ClientResult<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> ClientResult<()> {
        (**self).rollback()
    }

    fn in_transaction(&mut self) -> ClientResult<bool> {
        (**self).in_transaction()
    }
}

/// Prepares and executes statements that use positional placeholders only.
pub trait StatementExecutor {
    /// A prepared statement owned by the caller.
    type Handle;
    /// Whatever the client returns for an executed statement.
    type Output;

    fn prepare(&mut self, sql: &str) -> ClientResult<Self::Handle>;

    /// Executes `handle` with `values` bound to its markers, in order.
    fn execute(&mut self, handle: &mut Self::Handle, values: &[Value])
        -> ClientResult<Self::Output>;
}
