//! FIFO request queue
//!
//! Calls are executed one at a time, in submission order, over the single
//! session. A failed call settles only its own caller; the queue moves on to
//! the next entry either way.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::adapter::SessionAdapter;
use crate::connection::ConnectionManager;
use crate::logging::Logger;
use crate::procedure::ProcedureDescriptor;
use crate::result::CallResult;
use crate::session::SessionFactory;
use crate::{Error, Result};

const PROCESS: &str = "try_process_next";
const CALL: &str = "call_procedure";

struct QueuedCall {
    descriptor: ProcedureDescriptor,
    reply: oneshot::Sender<Result<CallResult>>,
    enqueued_at: Instant,
}

#[derive(Default)]
struct Backlog {
    calls: VecDeque<QueuedCall>,
    executing: bool,
}

struct Shared<F: SessionFactory> {
    backlog: Mutex<Backlog>,
    connection: ConnectionManager<F>,
    logger: Logger,
}

/// Settles with the outcome of one submitted call.
#[derive(Debug)]
#[must_use = "the call runs regardless, but its result is lost if the handle is dropped"]
pub struct CallHandle {
    rx: oneshot::Receiver<Result<CallResult>>,
}

impl Future for CallHandle {
    type Output = Result<CallResult>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::QueueClosed)))
    }
}

/// Serializes procedure calls over one connection.
pub struct RequestQueue<F: SessionFactory> {
    shared: Arc<Shared<F>>,
}

impl<F: SessionFactory> Clone for RequestQueue<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: SessionFactory> RequestQueue<F> {
    #[must_use]
    pub fn new(connection: ConnectionManager<F>) -> Self {
        let logger = connection.logger().clone();
        Self {
            shared: Arc::new(Shared {
                backlog: Mutex::new(Backlog::default()),
                connection,
                logger,
            }),
        }
    }

    /// Append a call to the backlog and start it if nothing is executing.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, descriptor: ProcedureDescriptor) -> CallHandle {
        let (reply, rx) = oneshot::channel();
        self.shared.backlog.lock().calls.push_back(QueuedCall {
            descriptor,
            reply,
            enqueued_at: Instant::now(),
        });
        Shared::try_process_next(&self.shared);
        CallHandle { rx }
    }

    /// Calls waiting behind the one executing.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.backlog.lock().calls.len()
    }

    #[must_use]
    pub fn is_executing(&self) -> bool {
        self.shared.backlog.lock().executing
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionManager<F> {
        &self.shared.connection
    }
}

impl<F: SessionFactory> Shared<F> {
    fn try_process_next(this: &Arc<Self>) {
        let call = {
            let mut backlog = this.backlog.lock();
            if backlog.executing {
                let waiting = backlog
                    .calls
                    .back()
                    .map(|call| call.descriptor.name().to_string());
                drop(backlog);
                if let Some(name) = waiting {
                    this.logger.info(
                        format!("Retarding procedure: {name}. Queue not empty."),
                        PROCESS,
                    );
                }
                return;
            }
            let Some(call) = backlog.calls.pop_front() else {
                return;
            };
            backlog.executing = true;
            call
        };

        let shared = Arc::clone(this);
        tokio::spawn(shared.run(call));
    }

    async fn run(self: Arc<Self>, call: QueuedCall) {
        let QueuedCall {
            descriptor,
            reply,
            enqueued_at,
        } = call;
        let name = descriptor.name().to_string();
        self.logger.debug(
            format!(
                "Executing procedure: {name} after {:?} in queue.",
                enqueued_at.elapsed()
            ),
            PROCESS,
        );

        // Runs in its own task so a panic settles only this call.
        let worker = {
            let shared = Arc::clone(&self);
            tokio::spawn(async move { shared.execute(&descriptor).await })
        };
        let result = match worker.await {
            Ok(result) => result,
            Err(join) => Err(Error::call(name.as_str(), join)),
        };

        if let Err(e) = &result {
            self.logger
                .error(format!("Procedure {name} failed: {e}"), CALL);
        }

        // Settle before releasing the gate: the next call starts only after
        // this one's caller has its result.
        if reply.send(result).is_err() {
            self.logger
                .debug(format!("Caller of {name} stopped waiting."), PROCESS);
        }
        self.backlog.lock().executing = false;
        Self::try_process_next(&self);
    }

    async fn execute(&self, descriptor: &ProcedureDescriptor) -> Result<CallResult> {
        self.connection.ensure_ready().await?;
        let session = self
            .connection
            .session()
            .ok_or_else(|| Error::connection("no session after connect"))?;
        SessionAdapter::execute(&**session, descriptor).await
    }
}

impl<F: SessionFactory> fmt::Debug for RequestQueue<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestQueue")
            .field("pending", &self.pending())
            .field("executing", &self.is_executing())
            .field("connection", &self.shared.connection)
            .finish()
    }
}
