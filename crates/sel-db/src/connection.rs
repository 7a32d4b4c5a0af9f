//! Connection manager
//!
//! Owns the single session and brings it to a usable state before each call.
//! A session the driver has closed for good is replaced with a fresh one built
//! from the same validated configuration.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;

use crate::config::SqlConfig;
use crate::logging::Logger;
use crate::session::{ConnectionState, Session, SessionFactory};
use crate::{Error, Result};

const OPEN: &str = "open_connection";
const RESET: &str = "reset_connection";
const DROP: &str = "drop_connection";

/// A session plus the bookkeeping the manager keeps about it.
pub struct SessionHandle<S> {
    session: S,
    listening: AtomicBool,
}

impl<S> SessionHandle<S> {
    const fn new(session: S) -> Self {
        Self {
            session,
            listening: AtomicBool::new(false),
        }
    }
}

impl<S: Session> SessionHandle<S> {
    /// Forward transport errors to `logger`. Registers at most once per handle.
    fn listen(&self, logger: &Logger, caller: &'static str) {
        if self.listening.swap(true, Ordering::AcqRel) {
            return;
        }
        let logger = logger.clone();
        self.session
            .on_error(Box::new(move |err: &(dyn std::error::Error + 'static)| {
                logger.error(err, caller);
            }));
    }
}

impl<S> Deref for SessionHandle<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: fmt::Debug> fmt::Debug for SessionHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session", &self.session)
            .field("listening", &self.listening.load(Ordering::Relaxed))
            .finish()
    }
}

/// Keeps one session alive across calls.
///
/// `ensure_ready` and `reset_connection` are meant to be driven by a single
/// task at a time; the request queue is that task.
pub struct ConnectionManager<F: SessionFactory> {
    config: SqlConfig,
    factory: F,
    session: ArcSwapOption<SessionHandle<F::Session>>,
    logger: Logger,
}

impl<F: SessionFactory> ConnectionManager<F> {
    /// Build the manager and its first session. Does not connect.
    pub fn new(config: SqlConfig, factory: F, logger: Logger) -> Result<Self> {
        let session = factory.create(&config).map_err(Error::Connection)?;
        logger.debug(format!("Session created for {}.", config.server()), OPEN);
        Ok(Self {
            config,
            factory,
            session: ArcSwapOption::from_pointee(SessionHandle::new(session)),
            logger,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SqlConfig {
        &self.config
    }

    #[must_use]
    pub const fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Current session, if one is held.
    #[must_use]
    pub fn session(&self) -> Option<Arc<SessionHandle<F::Session>>> {
        self.session.load_full()
    }

    /// State of the current session, read live.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        match &*self.session.load() {
            Some(handle) => handle.state(),
            None => ConnectionState::Disconnected,
        }
    }

    /// Bring the session to `Ready`.
    ///
    /// Idempotent when already connected. Waits on a connect in progress
    /// instead of starting another, and replaces a terminal session.
    pub async fn ensure_ready(&self) -> Result<ConnectionState> {
        let Some(handle) = self.session.load_full() else {
            self.reset_connection().await?;
            return Ok(self.state());
        };
        handle.listen(&self.logger, OPEN);

        match handle.state() {
            ConnectionState::Ready => {
                self.logger.info("Already logged in.", OPEN);
            }
            ConnectionState::Connecting => {
                self.logger
                    .info("Already connecting, waiting for completion.", OPEN);
                handle.wait_connected().await.map_err(|e| {
                    self.logger.error(format!("Connection failed: {e}"), OPEN);
                    Error::Connection(e)
                })?;
            }
            ConnectionState::Terminal => {
                self.logger
                    .info("State is Terminal. Resetting connection.", OPEN);
                self.reset_connection().await?;
                self.logger.info("Connection successfully reset.", OPEN);
            }
            ConnectionState::Busy => return Err(Error::SessionBusy),
            ConnectionState::Disconnected | ConnectionState::Initialized => {
                handle.connect().await.map_err(|e| {
                    self.logger.error(format!("Connection failed: {e}"), OPEN);
                    Error::Connection(e)
                })?;
                self.logger.info("Database successfully connected.", OPEN);
            }
        }

        Ok(self.state())
    }

    /// Drop the current session and connect a fresh one.
    ///
    /// On a failed connect the fresh session is kept; the driver leaves it
    /// terminal, so the next `ensure_ready` resets again.
    pub async fn reset_connection(&self) -> Result<()> {
        self.logger.debug("Resetting connection.", RESET);
        self.drop_connection();

        let session = self.factory.create(&self.config).map_err(|e| {
            self.logger
                .error(format!("Failed to reopen connection: {e}"), RESET);
            Error::Connection(e)
        })?;
        let handle = Arc::new(SessionHandle::new(session));
        self.session.store(Some(Arc::clone(&handle)));
        handle.listen(&self.logger, RESET);

        match handle.connect().await {
            Ok(()) => {
                self.logger
                    .debug("Database connection successfully reset.", RESET);
                Ok(())
            }
            Err(e) => {
                self.logger
                    .error(format!("Failed to reopen connection: {e}"), RESET);
                Err(Error::Connection(e))
            }
        }
    }

    /// Close and forget the current session. The next `ensure_ready` builds
    /// a new one.
    pub fn drop_connection(&self) {
        if let Some(handle) = self.session.swap(None) {
            handle.close();
            self.logger.debug("Connection dropped.", DROP);
        }
    }
}

impl<F: SessionFactory> fmt::Debug for ConnectionManager<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("server", &self.config.server())
            .field("state", &self.state())
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}
