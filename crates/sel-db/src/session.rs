//! Interface to the external database session.
//!
//! The wire protocol lives outside this crate. A driver exposes one stateful
//! session per connection through [`Session`], and the connection manager
//! builds sessions through a [`SessionFactory`] so a terminally closed one can
//! be replaced with an identical fresh session.
//!
//! Call results are pushed, not pulled: the driver reports return values,
//! column metadata and rows through a [`CallEventSink`] and finishes with
//! exactly one of [`CallEventSink::completed`] or [`CallEventSink::failed`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::SqlConfig;
use crate::error::BoxError;
use crate::procedure::{DataType, ParameterOptions};
use crate::{Error, Result};

/// Longest identifier part accepted in a procedure name.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Lifecycle state reported by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Initialized,
    Connecting,
    /// Logged in and idle.
    Ready,
    /// A request is in flight on the wire.
    Busy,
    /// Closed for good by the driver or the peer.
    Terminal,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Initialized => "Initialized",
            Self::Connecting => "Connecting",
            Self::Ready => "Ready",
            Self::Busy => "Busy",
            Self::Terminal => "Terminal",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback receiving asynchronous transport errors.
pub type ErrorListener = Box<dyn Fn(&(dyn std::error::Error + 'static)) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestParameter {
    pub name: String,
    pub data_type: DataType,
    pub value: Value,
    pub direction: Direction,
    pub options: ParameterOptions,
}

/// A stored procedure call as handed to the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    procedure: String,
    timeout: Option<Duration>,
    parameters: Vec<RequestParameter>,
}

impl CallRequest {
    /// Create a request bound to `procedure`.
    ///
    /// Accepts plain or schema-qualified names (`dbo.GetUser`, `[dbo].[Get User]`).
    pub fn new(procedure: &str) -> Result<Self> {
        if procedure.trim().is_empty() {
            return Err(Error::InvalidRequest("procedure name is empty".into()));
        }
        if procedure.chars().any(char::is_control) {
            return Err(Error::InvalidRequest(format!(
                "procedure name contains control characters: {procedure:?}"
            )));
        }
        if let Some(part) = procedure
            .split('.')
            .find(|part| part.is_empty() || part.chars().count() > MAX_IDENTIFIER_LENGTH)
        {
            return Err(Error::InvalidRequest(format!(
                "invalid identifier part '{part}' in procedure name '{procedure}'"
            )));
        }

        Ok(Self {
            procedure: procedure.to_string(),
            timeout: None,
            parameters: Vec::new(),
        })
    }

    #[must_use]
    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub const fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    #[must_use]
    pub fn parameters(&self) -> &[RequestParameter] {
        &self.parameters
    }

    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        data_type: DataType,
        value: Value,
        options: ParameterOptions,
    ) {
        self.bind(Direction::Input, name.into(), data_type, value, options);
    }

    pub fn add_output_parameter(
        &mut self,
        name: impl Into<String>,
        data_type: DataType,
        value: Value,
        options: ParameterOptions,
    ) {
        self.bind(Direction::Output, name.into(), data_type, value, options);
    }

    fn bind(
        &mut self,
        direction: Direction,
        name: String,
        data_type: DataType,
        value: Value,
        options: ParameterOptions,
    ) {
        self.parameters.push(RequestParameter {
            name,
            data_type,
            value,
            direction,
            options,
        });
    }
}

/// Column description as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub col_name: String,
    pub type_name: String,
}

/// One cell of a row as reported by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValue {
    pub col_name: String,
    pub value: Value,
}

#[derive(Debug)]
pub enum CallEvent {
    ReturnValue { name: String, value: Value },
    ColumnMetadata(Vec<ColumnMetadata>),
    Row(Vec<ColumnValue>),
    RequestCompleted,
    Failed(BoxError),
}

/// Where a driver reports the progress of one call.
///
/// Sends after the receiving side has settled are dropped silently.
#[derive(Debug, Clone)]
pub struct CallEventSink {
    tx: mpsc::UnboundedSender<CallEvent>,
}

impl CallEventSink {
    /// A sink paired with the receiver the adapter listens on.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CallEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: CallEvent) {
        let _ = self.tx.send(event);
    }

    pub fn return_value(&self, name: impl Into<String>, value: Value) {
        self.send(CallEvent::ReturnValue {
            name: name.into(),
            value,
        });
    }

    pub fn column_metadata(&self, columns: Vec<ColumnMetadata>) {
        self.send(CallEvent::ColumnMetadata(columns));
    }

    pub fn row(&self, columns: Vec<ColumnValue>) {
        self.send(CallEvent::Row(columns));
    }

    pub fn completed(&self) {
        self.send(CallEvent::RequestCompleted);
    }

    pub fn failed(&self, error: impl Into<BoxError>) {
        self.send(CallEvent::Failed(error.into()));
    }

    /// Whether the adapter still listens for this call.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// One stateful connection to the database server.
///
/// Implementations must not accept overlapping requests; the request queue
/// guarantees it never issues one.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Current lifecycle state, read live from the driver.
    fn state(&self) -> ConnectionState;

    /// Issue a connect and wait for its outcome.
    async fn connect(&self) -> std::result::Result<(), BoxError>;

    /// Wait for a connect already in progress, without issuing a new one.
    async fn wait_connected(&self) -> std::result::Result<(), BoxError>;

    /// Close the session. No further requests succeed afterwards.
    fn close(&self);

    /// Register a listener for asynchronous transport errors.
    fn on_error(&self, listener: ErrorListener);

    /// Build a request bound to `procedure`.
    fn create_request(&self, procedure: &str) -> Result<CallRequest> {
        CallRequest::new(procedure)
    }

    /// Issue `request`, reporting progress through `events`.
    fn call_procedure(&self, request: CallRequest, events: CallEventSink);
}

/// Builds sessions from validated configuration.
pub trait SessionFactory: Send + Sync + 'static {
    type Session: Session;

    fn create(&self, config: &SqlConfig) -> std::result::Result<Self::Session, BoxError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_new_accepts_qualified_names() {
        assert!(CallRequest::new("GetUser").is_ok());
        assert!(CallRequest::new("dbo.GetUser").is_ok());
        assert!(CallRequest::new("[dbo].[Get User]").is_ok());
    }

    #[test]
    fn test_request_new_rejects_empty() {
        let err = CallRequest::new("  ").unwrap_err();
        assert!(err.is_invalid_request());
    }

    #[test]
    fn test_request_new_rejects_control_chars() {
        assert!(CallRequest::new("Get\nUser").unwrap_err().is_invalid_request());
    }

    #[test]
    fn test_request_new_rejects_bad_parts() {
        assert!(CallRequest::new("dbo..GetUser").is_err());
        assert!(CallRequest::new(&"x".repeat(129)).is_err());
        assert!(CallRequest::new(&"x".repeat(128)).is_ok());
    }

    #[test]
    fn test_request_binding() {
        let mut request = CallRequest::new("GetUser").unwrap();
        request.set_timeout(Duration::from_secs(3));
        request.add_parameter("userId", DataType::Int, json!(42), ParameterOptions::new());
        request.add_output_parameter(
            "userName",
            DataType::VarChar,
            Value::Null,
            ParameterOptions::new(),
        );

        assert_eq!(request.procedure(), "GetUser");
        assert_eq!(request.timeout(), Some(Duration::from_secs(3)));
        assert_eq!(request.parameters()[0].direction, Direction::Input);
        assert_eq!(request.parameters()[1].direction, Direction::Output);
    }

    #[tokio::test]
    async fn test_event_sink_delivers_in_order() {
        let (sink, mut rx) = CallEventSink::channel();
        sink.return_value("x", json!(1));
        sink.row(vec![]);
        sink.completed();

        assert!(matches!(rx.recv().await, Some(CallEvent::ReturnValue { .. })));
        assert!(matches!(rx.recv().await, Some(CallEvent::Row(_))));
        assert!(matches!(rx.recv().await, Some(CallEvent::RequestCompleted)));
    }

    #[test]
    fn test_event_sink_after_receiver_dropped() {
        let (sink, rx) = CallEventSink::channel();
        drop(rx);
        assert!(!sink.is_open());
        sink.completed();
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Ready.to_string(), "Ready");
        assert_eq!(ConnectionState::Terminal.to_string(), "Terminal");
    }
}
