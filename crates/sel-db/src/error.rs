use thiserror::Error;

/// Boxed error produced by a session implementation.
///
/// The originating driver error is carried unchanged so callers can downcast it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(#[source] BoxError),

    #[error("Call to '{procedure}' failed: {source}")]
    Call {
        procedure: String,
        #[source]
        source: BoxError,
    },

    #[error("Invalid data type: {0}")]
    InvalidDataType(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session is busy with another request")]
    SessionBusy,

    #[error("Request queue closed before the call settled")]
    QueueClosed,

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn connection(source: impl Into<BoxError>) -> Self {
        Self::Connection(source.into())
    }

    pub fn call(procedure: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Call {
            procedure: procedure.into(),
            source: source.into(),
        }
    }

    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    #[must_use]
    pub const fn is_call(&self) -> bool {
        matches!(self, Self::Call { .. })
    }

    #[must_use]
    pub const fn is_invalid_data_type(&self) -> bool {
        matches!(self, Self::InvalidDataType(_))
    }

    #[must_use]
    pub const fn is_invalid_request(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }

    #[must_use]
    pub const fn is_session_busy(&self) -> bool {
        matches!(self, Self::SessionBusy)
    }

    #[must_use]
    pub const fn is_queue_closed(&self) -> bool {
        matches!(self, Self::QueueClosed)
    }

    /// Name of the procedure whose call failed, if this is a call error.
    #[must_use]
    pub fn procedure(&self) -> Option<&str> {
        match self {
            Self::Call { procedure, .. } => Some(procedure),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
