//! Scripted in-memory session for tests.
//!
//! [`StubFactory`] hands out [`StubSession`]s that answer calls from a per
//! procedure [`Script`] and record everything that happens to them in a
//! shared [`StubEvent`] log.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::SqlConfig;
use crate::error::BoxError;
use crate::logging::{LogFormat, LogLevel, LogLine, LogSettings, Logger, RawLogger};
use crate::session::{
    CallEventSink, CallRequest, ColumnMetadata, ColumnValue, ConnectionState, ErrorListener,
    Session, SessionFactory,
};
use crate::{Error, Result};

/// Error raised by stub sessions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct StubError(pub String);

/// Data a scripted call emits before completing.
#[derive(Debug, Clone, Default)]
pub struct StubResponse {
    pub return_values: Vec<(String, Value)>,
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<ColumnValue>>,
}

impl StubResponse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn return_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.return_values.push((name.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn columns(mut self, columns: &[(&str, &str)]) -> Self {
        self.columns = columns
            .iter()
            .map(|(name, type_name)| ColumnMetadata {
                col_name: (*name).to_string(),
                type_name: (*type_name).to_string(),
            })
            .collect();
        self
    }

    #[must_use]
    pub fn row(mut self, values: Vec<(&str, Value)>) -> Self {
        self.rows.push(
            values
                .into_iter()
                .map(|(name, value)| ColumnValue {
                    col_name: name.to_string(),
                    value,
                })
                .collect(),
        );
        self
    }
}

#[derive(Debug, Clone)]
pub enum Script {
    Respond(StubResponse),
    Fail(String),
    /// Never settles; the session stays busy.
    Hang,
    /// Ends the call without a terminal notification.
    Abandon,
    /// Panics inside `call_procedure`.
    Panic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubEvent {
    Created(usize),
    Connect(usize),
    Closed(usize),
    CallStarted(String),
    CallFinished(String),
    CallFailed(String),
}

#[derive(Default)]
struct FactoryState {
    scripts: HashMap<String, Script>,
    rejected: HashSet<String>,
    initial_state: Option<ConnectionState>,
    connect_failures: usize,
    fail_create: bool,
    events: Vec<StubEvent>,
    sessions: Vec<StubSession>,
    requests: Vec<CallRequest>,
    hung: Vec<(StubSession, String, CallEventSink)>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Factory producing scripted sessions. Clones share state.
#[derive(Clone, Default)]
pub struct StubFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl std::fmt::Debug for StubFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StubFactory")
            .field("sessions", &state.sessions.len())
            .field("events", &state.events)
            .finish_non_exhaustive()
    }
}

impl StubFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_script(self, procedure: &str, script: Script) -> Self {
        self.set_script(procedure, script);
        self
    }

    pub fn set_script(&self, procedure: &str, script: Script) {
        self.state.lock().scripts.insert(procedure.to_string(), script);
    }

    /// State new sessions start in (default `Initialized`).
    #[must_use]
    pub fn with_initial_state(self, state: ConnectionState) -> Self {
        self.state.lock().initial_state = Some(state);
        self
    }

    /// Make `create_request` fail for `procedure`.
    #[must_use]
    pub fn reject_request(self, procedure: &str) -> Self {
        self.state.lock().rejected.insert(procedure.to_string());
        self
    }

    /// Fail the next `n` connect attempts.
    pub fn fail_next_connects(&self, n: usize) {
        self.state.lock().connect_failures = n;
    }

    pub fn fail_create(&self, fail: bool) {
        self.state.lock().fail_create = fail;
    }

    #[must_use]
    pub fn events(&self) -> Vec<StubEvent> {
        self.state.lock().events.clone()
    }

    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.count(|e| matches!(e, StubEvent::Connect(_)))
    }

    #[must_use]
    pub fn created_count(&self) -> usize {
        self.count(|e| matches!(e, StubEvent::Created(_)))
    }

    fn count(&self, f: impl Fn(&StubEvent) -> bool) -> usize {
        self.state.lock().events.iter().filter(|e| f(e)).count()
    }

    /// Procedures in the order their calls reached a session.
    #[must_use]
    pub fn started_calls(&self) -> Vec<String> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                StubEvent::CallStarted(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn requests(&self) -> Vec<CallRequest> {
        self.state.lock().requests.clone()
    }

    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().max_in_flight
    }

    #[must_use]
    pub fn latest_session(&self) -> Option<StubSession> {
        self.state.lock().sessions.last().cloned()
    }

    #[must_use]
    pub fn hung_count(&self) -> usize {
        self.state.lock().hung.len()
    }

    /// Settle every hung call as completed.
    pub fn release_hung(&self) {
        let hung = std::mem::take(&mut self.state.lock().hung);
        for (session, name, sink) in hung {
            session.finish_call(&name, Script::Respond(StubResponse::default()), &sink);
        }
    }

    fn record(&self, event: StubEvent) {
        self.state.lock().events.push(event);
    }
}

impl SessionFactory for StubFactory {
    type Session = StubSession;

    fn create(&self, _config: &SqlConfig) -> std::result::Result<StubSession, BoxError> {
        let mut state = self.state.lock();
        if state.fail_create {
            return Err(Box::new(StubError("cannot create session".into())));
        }

        let id = state.sessions.len();
        let initial = state.initial_state.unwrap_or(ConnectionState::Initialized);
        let session = StubSession {
            inner: Arc::new(SessionInner {
                id,
                state: watch::Sender::new(initial),
                listeners: Mutex::new(Vec::new()),
                factory: self.clone(),
            }),
        };
        state.sessions.push(session.clone());
        state.events.push(StubEvent::Created(id));
        Ok(session)
    }
}

struct SessionInner {
    id: usize,
    state: watch::Sender<ConnectionState>,
    listeners: Mutex<Vec<ErrorListener>>,
    factory: StubFactory,
}

#[derive(Clone)]
pub struct StubSession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for StubSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubSession")
            .field("id", &self.inner.id)
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl StubSession {
    #[must_use]
    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Force a state, e.g. `Terminal` to simulate the peer closing the session.
    pub fn set_state(&self, state: ConnectionState) {
        self.inner.state.send_replace(state);
    }

    /// Finish a connect started elsewhere.
    pub fn complete_connect(&self, success: bool) {
        self.set_state(if success {
            ConnectionState::Ready
        } else {
            ConnectionState::Terminal
        });
    }

    /// Report an asynchronous transport error to registered listeners.
    pub fn emit_transport_error(&self, message: &str) {
        let err = StubError(message.to_string());
        for listener in self.inner.listeners.lock().iter() {
            listener(&err);
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

#[async_trait]
impl Session for StubSession {
    fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    async fn connect(&self) -> std::result::Result<(), BoxError> {
        self.inner.factory.record(StubEvent::Connect(self.inner.id));
        self.set_state(ConnectionState::Connecting);
        tokio::task::yield_now().await;

        let fail = {
            let mut state = self.inner.factory.state.lock();
            let fail = state.connect_failures > 0;
            state.connect_failures = state.connect_failures.saturating_sub(1);
            fail
        };

        if fail {
            self.set_state(ConnectionState::Terminal);
            Err(Box::new(StubError("login failed".into())))
        } else {
            self.set_state(ConnectionState::Ready);
            Ok(())
        }
    }

    async fn wait_connected(&self) -> std::result::Result<(), BoxError> {
        let mut rx = self.inner.state.subscribe();
        let state = *rx
            .wait_for(|s| *s != ConnectionState::Connecting)
            .await
            .map_err(|e| Box::new(e) as BoxError)?;
        match state {
            ConnectionState::Ready => Ok(()),
            other => Err(Box::new(StubError(format!("connect ended in state {other}")))),
        }
    }

    fn close(&self) {
        self.set_state(ConnectionState::Terminal);
        self.inner.factory.record(StubEvent::Closed(self.inner.id));
    }

    fn on_error(&self, listener: ErrorListener) {
        self.inner.listeners.lock().push(listener);
    }

    fn create_request(&self, procedure: &str) -> Result<CallRequest> {
        if self.inner.factory.state.lock().rejected.contains(procedure) {
            return Err(Error::InvalidRequest(format!(
                "driver rejected request for '{procedure}'"
            )));
        }
        CallRequest::new(procedure)
    }

    fn call_procedure(&self, request: CallRequest, events: CallEventSink) {
        let name = request.procedure().to_string();
        let script = {
            let mut state = self.inner.factory.state.lock();
            state.requests.push(request);
            state.events.push(StubEvent::CallStarted(name.clone()));
            let script = state
                .scripts
                .get(&name)
                .cloned()
                .unwrap_or(Script::Respond(StubResponse::default()));
            if !matches!(script, Script::Panic) {
                state.in_flight += 1;
                state.max_in_flight = state.max_in_flight.max(state.in_flight);
            }
            script
        };
        assert!(
            !matches!(script, Script::Panic),
            "scripted panic in {name}"
        );
        self.set_state(ConnectionState::Busy);

        let session = self.clone();
        tokio::spawn(async move {
            // Let other tasks run while the call is "on the wire".
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            session.finish_call(&name, script, &events);
        });
    }
}

impl StubSession {
    fn finish_call(&self, name: &str, script: Script, events: &CallEventSink) {
        let settle = |event: StubEvent| {
            let mut state = self.inner.factory.state.lock();
            state.in_flight -= 1;
            state.events.push(event);
        };

        match script {
            Script::Respond(response) => {
                for (param, value) in response.return_values {
                    events.return_value(param, value);
                }
                if !response.columns.is_empty() {
                    events.column_metadata(response.columns);
                }
                for row in response.rows {
                    events.row(row);
                }
                self.set_state(ConnectionState::Ready);
                settle(StubEvent::CallFinished(name.to_string()));
                events.completed();
            }
            Script::Fail(message) => {
                self.set_state(ConnectionState::Ready);
                settle(StubEvent::CallFailed(name.to_string()));
                events.failed(StubError(message));
            }
            Script::Hang => {
                self.inner.factory.state.lock().hung.push((
                    self.clone(),
                    name.to_string(),
                    events.clone(),
                ));
            }
            Script::Abandon => {
                self.set_state(ConnectionState::Ready);
                settle(StubEvent::CallFailed(name.to_string()));
            }
            Script::Panic => {}
        }
    }
}

/// Messages recorded by [`capture_logger`], as `(level, "caller: message")`.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    lines: Arc<Mutex<Vec<(&'static str, String)>>>,
}

impl LogCapture {
    #[must_use]
    pub fn lines(&self) -> Vec<(&'static str, String)> {
        self.lines.lock().clone()
    }

    /// Whether a message at `level` contains `needle`.
    #[must_use]
    pub fn contains(&self, level: &str, needle: &str) -> bool {
        self.lines
            .lock()
            .iter()
            .any(|(l, line)| *l == level && line.contains(needle))
    }

    fn push(&self, level: &'static str, line: &LogLine) {
        let LogLine::Text(text) = line else {
            return;
        };
        let text = text
            .strip_prefix(crate::logging::MODULE_NAME)
            .and_then(|rest| rest.strip_prefix(": "))
            .unwrap_or(text);
        self.lines.lock().push((level, text.to_string()));
    }
}

/// Logger at debug verbosity whose plain-text messages land in a [`LogCapture`].
#[must_use]
pub fn capture_logger() -> (Logger, LogCapture) {
    let capture = LogCapture::default();
    let (d, i, e) = (capture.clone(), capture.clone(), capture.clone());
    let raw = RawLogger::new()
        .with_debug(move |line| d.push("debug", &line))
        .with_info(move |line| i.push("info", &line))
        .with_error(move |line| e.push("error", &line));
    let logger = Logger::construct(
        Some(raw),
        LogSettings::new(LogLevel::Debug, LogFormat::String),
    );
    (logger, capture)
}
