//! Serialized stored-procedure calls over a single stateful database session.
//!
//! Some database sessions accept only one request at a time and close for good
//! on certain failures. This crate sits in front of such a session and:
//!
//! - keeps it connected, replacing it with a fresh one when it turns terminal
//! - runs calls strictly one after another in submission order
//! - folds the pushed return values, column metadata and rows of a call into a
//!   single [`CallResult`]
//!
//! The wire protocol is supplied by the caller through [`Session`] and
//! [`SessionFactory`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//!
//! use sel_db::{Client, Logger, ProcedureDescriptor, config};
//!
//! let raw = config::from_json_str(r#"{
//!     "server": "db.internal",
//!     "authentication": { "options": { "userName": "app", "password": "..." } }
//! }"#)?;
//! let client = Client::connect(raw, driver, Logger::from_env(None)).await?;
//!
//! let get_user = ProcedureDescriptor::new("GetUser", Duration::from_secs(30))
//!     .input("userId", "int", 42)?
//!     .output("userName", "varchar(100)", serde_json::Value::Null)?;
//! let result = client.call(get_user).await?;
//! println!("{:?}", result.output("userName"));
//! ```

pub mod adapter;
pub mod client;
pub mod config;
pub mod connection;
mod error;
pub mod logging;
pub mod observability;
pub mod procedure;
pub mod queue;
pub mod result;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;


pub use adapter::SessionAdapter;
pub use client::Client;
pub use config::{AuthenticationType, RawConfig, SqlConfig};
pub use connection::ConnectionManager;
pub use error::{BoxError, Error, Result};
pub use logging::{LogFormat, LogLevel, LogSettings, Logger, RawLogger};
pub use procedure::{DataType, Parameter, ProcedureDescriptor};
pub use queue::{CallHandle, RequestQueue};
pub use result::{CallResult, Column, Row};
pub use session::{
    CallEvent, CallEventSink, CallRequest, ConnectionState, Session, SessionFactory,
};
