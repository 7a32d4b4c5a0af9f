//! Logger capability wrapping
//!
//! Callers may hand in a [`RawLogger`] exposing any subset of `debug`, `info`
//! and `error`. [`Logger::construct`] turns it into a logger where every
//! capability is callable: missing ones become no-ops, and with no raw logger
//! at all messages go to `tracing`.

mod settings;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

pub use settings::{LogFormat, LogLevel, LogSettings};

/// Module name stamped on every formatted message.
pub const MODULE_NAME: &str = "sel-db";

/// Structured message shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub module: &'static str,
    pub caller: String,
    pub message: String,
}

/// A formatted message as delivered to a caller-supplied sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    Text(String),
    Structured(LogEntry),
}

impl LogLine {
    fn render(format: LogFormat, caller: &str, message: &str) -> Self {
        match format {
            LogFormat::String => Self::Text(format!("{MODULE_NAME}: {caller}: {message}")),
            LogFormat::Json => Self::Structured(LogEntry {
                module: MODULE_NAME,
                caller: caller.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Structured(entry) => {
                let json = serde_json::to_string(entry).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

pub type LogFn = Arc<dyn Fn(LogLine) + Send + Sync>;

/// Caller-supplied logger with independently optional capabilities.
#[derive(Clone, Default)]
pub struct RawLogger {
    debug: Option<LogFn>,
    info: Option<LogFn>,
    error: Option<LogFn>,
}

impl fmt::Debug for RawLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawLogger")
            .field("debug", &self.debug.is_some())
            .field("info", &self.info.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

impl RawLogger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_debug(mut self, f: impl Fn(LogLine) + Send + Sync + 'static) -> Self {
        self.debug = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_info(mut self, f: impl Fn(LogLine) + Send + Sync + 'static) -> Self {
        self.info = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_error(mut self, f: impl Fn(LogLine) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }
}

#[derive(Clone)]
enum Sink {
    Noop,
    Forward(LogFn, LogFormat),
    Tracing(LogLevel),
}

impl Sink {
    fn emit(&self, caller: &str, message: &str) {
        match self {
            Self::Noop => {}
            Self::Forward(f, format) => f(LogLine::render(*format, caller, message)),
            Self::Tracing(LogLevel::Error) => {
                tracing::error!(target: "sel_db", caller, "{message}");
            }
            Self::Tracing(LogLevel::Info) => {
                tracing::info!(target: "sel_db", caller, "{message}");
            }
            Self::Tracing(LogLevel::Debug) => {
                tracing::debug!(target: "sel_db", caller, "{message}");
            }
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Forward(..) => "forward",
            Self::Tracing(_) => "tracing",
        }
    }
}

/// Fully populated logger used by the connection manager and request queue.
#[derive(Clone)]
pub struct Logger {
    debug: Sink,
    info: Sink,
    error: Sink,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("debug", &self.debug.name())
            .field("info", &self.info.name())
            .field("error", &self.error.name())
            .finish()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::construct(None, LogSettings::default())
    }
}

impl Logger {
    #[must_use]
    pub fn construct(raw: Option<RawLogger>, settings: LogSettings) -> Self {
        let LogSettings { level, format } = settings;
        let gate = |wanted: LogLevel, f: Option<LogFn>| match f {
            Some(f) if level.allows(wanted) => Sink::Forward(f, format),
            _ => Sink::Noop,
        };

        match raw {
            Some(raw) => Self {
                debug: gate(LogLevel::Debug, raw.debug),
                info: gate(LogLevel::Info, raw.info),
                error: gate(LogLevel::Error, raw.error),
            },
            None => {
                let fallback = |wanted: LogLevel| {
                    if level.allows(wanted) {
                        Sink::Tracing(wanted)
                    } else {
                        Sink::Noop
                    }
                };
                Self {
                    debug: fallback(LogLevel::Debug),
                    info: fallback(LogLevel::Info),
                    error: Sink::Tracing(LogLevel::Error),
                }
            }
        }
    }

    /// Construct with settings taken from `SELDB_LOGLEVEL` / `SELDB_LOGTYPE`.
    #[must_use]
    pub fn from_env(raw: Option<RawLogger>) -> Self {
        Self::construct(raw, LogSettings::from_env())
    }

    pub fn debug(&self, message: impl fmt::Display, caller: &str) {
        if !matches!(self.debug, Sink::Noop) {
            self.debug.emit(caller, &message.to_string());
        }
    }

    pub fn info(&self, message: impl fmt::Display, caller: &str) {
        if !matches!(self.info, Sink::Noop) {
            self.info.emit(caller, &message.to_string());
        }
    }

    pub fn error(&self, message: impl fmt::Display, caller: &str) {
        if !matches!(self.error, Sink::Noop) {
            self.error.emit(caller, &message.to_string());
        }
    }
}
