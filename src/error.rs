use crate::client::ClientError;

/// Error types for placeholder conversion and transaction management
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The tokenizer could not account for every byte of the statement.
    ///
    /// This points at a defect in the scanning rules, never at the caller.
    #[error("Parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// A named placeholder had no value in the parameter map
    #[error("Missing named parameter `{name}` in statement: {sql}")]
    MissingNamedParameter { name: String, sql: String },

    /// A positional placeholder had no value at the current cursor
    #[error("Missing positional parameter {index} in statement: {sql}")]
    MissingPositionalParameter { index: usize, sql: String },

    /// A transaction layer with this name is already on the stack
    #[error("Transaction name `{0}` is already in use")]
    DuplicateTransactionName(String),

    /// The named layer is not on the stack, or no transaction is open at all
    #[error("No active transaction{}", .0.as_deref().map(|name| format!(" named `{name}`")).unwrap_or_default())]
    NoActiveTransaction(Option<String>),

    /// A rollback discarded other active layers on its way to the target.
    ///
    /// Raised after the rollback and the cleanup have both completed.
    #[error("Rollback to `{name}` discarded other active transaction layers")]
    OutOfOrderRollback { name: String },

    /// The client rejected a transaction-boundary or statement call
    #[error("{operation} failed for {context}: {source}")]
    Execution {
        operation: &'static str,
        context: String,
        #[source]
        source: ClientError,
    },

    /// The server reported an integrity constraint violation for a statement
    #[error("Integrity constraint violation: {message}")]
    IntegrityConstraintViolation {
        message: String,
        #[source]
        source: ClientError,
    },

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O failure while reading configuration or starting the client runtime
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error from SQLx outside of a classified boundary call
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub(crate) fn execution(
        operation: &'static str,
        context: impl Into<String>,
        source: ClientError,
    ) -> Self {
        Self::Execution {
            operation,
            context: context.into(),
            source,
        }
    }

    /// Returns `true` for either missing-parameter variant.
    pub fn is_missing_parameter(&self) -> bool {
        matches!(
            self,
            Self::MissingNamedParameter { .. } | Self::MissingPositionalParameter { .. }
        )
    }

    /// Returns the client error behind an execution or constraint failure.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            Self::Execution { source, .. } | Self::IntegrityConstraintViolation { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Result type alias for conversion and transaction operations
pub type Result<T> = std::result::Result<T, Error>;
