//! Client facade over configuration, connection and queue

use std::fmt;

use crate::config::{RawConfig, SqlConfig};
use crate::connection::ConnectionManager;
use crate::logging::Logger;
use crate::procedure::ProcedureDescriptor;
use crate::queue::{CallHandle, RequestQueue};
use crate::session::{ConnectionState, SessionFactory};
use crate::Result;

/// Entry point for issuing stored procedure calls.
///
/// # Example
///
/// ```ignore
/// let logger = Logger::from_env(None);
/// let client = Client::connect(raw_config, MyDriver::default(), logger).await?;
///
/// let get_user = ProcedureDescriptor::new("GetUser", Duration::from_secs(30))
///     .input("userId", "int", 42)?
///     .output("userName", "varchar(100)", Value::Null)?;
/// let result = client.call(get_user).await?;
/// ```
pub struct Client<F: SessionFactory> {
    queue: RequestQueue<F>,
}

impl<F: SessionFactory> fmt::Debug for Client<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("queue", &self.queue).finish()
    }
}

impl<F: SessionFactory> Clone for Client<F> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<F: SessionFactory> Client<F> {
    /// Validate `raw`, then connect as [`with_config`](Self::with_config) does.
    ///
    /// A configuration error is logged and returned before any session exists.
    pub async fn connect(raw: RawConfig, factory: F, logger: Logger) -> Result<Self> {
        let config = raw
            .validate()
            .inspect_err(|e| logger.error(e, "check_config"))?;
        Self::with_config(config, factory, logger).await
    }

    /// Build the session, bring it to `Ready` and start the queue.
    pub async fn with_config(config: SqlConfig, factory: F, logger: Logger) -> Result<Self> {
        let connection = ConnectionManager::new(config, factory, logger)?;
        connection.ensure_ready().await?;
        Ok(Self {
            queue: RequestQueue::new(connection),
        })
    }

    /// Queue a call. Calls run one at a time in the order submitted.
    pub fn call(&self, descriptor: ProcedureDescriptor) -> CallHandle {
        self.queue.submit(descriptor)
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.queue.connection().state()
    }

    /// Close the session. The next call reconnects with a new one.
    pub fn drop_connection(&self) {
        self.queue.connection().drop_connection();
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    #[must_use]
    pub const fn queue(&self) -> &RequestQueue<F> {
        &self.queue
    }
}
