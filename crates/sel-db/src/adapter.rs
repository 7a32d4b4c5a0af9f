//! Executes one procedure call against a session and gathers its result

use crate::procedure::ProcedureDescriptor;
use crate::result::{CallResult, Column};
use crate::session::{CallEvent, CallEventSink, Session};
use crate::{Error, Result};

/// Translates a [`ProcedureDescriptor`] into a driver request and folds the
/// pushed notifications back into one [`CallResult`].
///
/// Holds no state between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionAdapter;

impl SessionAdapter {
    pub async fn execute<S: Session + ?Sized>(
        session: &S,
        descriptor: &ProcedureDescriptor,
    ) -> Result<CallResult> {
        let mut request = session.create_request(descriptor.name())?;
        request.set_timeout(descriptor.timeout());

        for param in descriptor.parameters() {
            if param.is_input {
                request.add_parameter(
                    param.name.clone(),
                    param.data_type,
                    param.value.clone(),
                    param.options.clone(),
                );
            } else {
                request.add_output_parameter(
                    param.name.clone(),
                    param.data_type,
                    param.value.clone(),
                    param.options.clone(),
                );
            }
        }

        // The receiver exists before the call is issued, so no early
        // notification can be missed.
        let (sink, mut events) = CallEventSink::channel();
        session.call_procedure(request, sink);

        let mut result = CallResult::default();
        while let Some(event) = events.recv().await {
            match event {
                CallEvent::ReturnValue { name, value } => {
                    result.output_parameters.insert(name, value);
                }
                CallEvent::ColumnMetadata(columns) => {
                    result.columns = columns.into_iter().map(Column::from).collect();
                }
                CallEvent::Row(columns) => {
                    let row = columns
                        .into_iter()
                        .map(|column| (column.col_name, column.value))
                        .collect();
                    result.rows.push(row);
                }
                CallEvent::RequestCompleted => return Ok(result),
                CallEvent::Failed(source) => return Err(Error::call(descriptor.name(), source)),
            }
        }

        Err(Error::call(
            descriptor.name(),
            "session ended the request without completing it",
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::config::SqlConfig;
    use crate::session::{ConnectionState, Direction, SessionFactory};
    use crate::testing::{Script, StubError, StubEvent, StubFactory, StubResponse, StubSession};

    fn config() -> SqlConfig {
        SqlConfig::builder()
            .server("localhost")
            .user_name("sa")
            .password("secret")
            .build()
            .unwrap()
    }

    async fn ready_session(factory: &StubFactory) -> StubSession {
        let session = factory.create(&config()).unwrap();
        session.connect().await.unwrap();
        session
    }

    fn get_user() -> ProcedureDescriptor {
        ProcedureDescriptor::new("GetUser", Duration::from_secs(5))
            .input("userId", "int", 42)
            .unwrap()
            .output("userName", "varchar(100)", Value::Null)
            .unwrap()
    }

    #[tokio::test]
    async fn test_aggregates_all_fragments() {
        let factory = StubFactory::new().with_script(
            "GetUser",
            Script::Respond(
                StubResponse::new()
                    .return_value("userName", "alice")
                    .columns(&[("id", "Int"), ("email", "NVarChar")])
                    .row(vec![("id", json!(1)), ("email", json!("a@example.com"))])
                    .row(vec![("id", json!(2)), ("email", json!("b@example.com"))]),
            ),
        );
        let session = ready_session(&factory).await;

        let result = assert_ok!(SessionAdapter::execute(&session, &get_user()).await);

        assert_eq!(result.output("userName"), Some(&json!("alice")));
        assert_eq!(result.columns.len(), 2);
        assert_eq!(result.columns[1].name, "email");
        assert_eq!(result.columns[1].type_name, "NVarChar");
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0]["id"], json!(1));
        assert_eq!(result.rows[1]["email"], json!("b@example.com"));
    }

    #[tokio::test]
    async fn test_binds_parameters_in_order() {
        let factory = StubFactory::new();
        let session = ready_session(&factory).await;

        assert_ok!(SessionAdapter::execute(&session, &get_user()).await);

        let requests = factory.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.procedure(), "GetUser");
        assert_eq!(request.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(request.parameters()[0].name, "userId");
        assert_eq!(request.parameters()[0].direction, Direction::Input);
        assert_eq!(request.parameters()[0].value, json!(42));
        assert_eq!(request.parameters()[1].name, "userName");
        assert_eq!(request.parameters()[1].direction, Direction::Output);
    }

    #[tokio::test]
    async fn test_call_failure_carries_source() {
        let factory =
            StubFactory::new().with_script("GetUser", Script::Fail("deadlock victim".into()));
        let session = ready_session(&factory).await;

        let err = assert_err!(SessionAdapter::execute(&session, &get_user()).await);
        assert!(err.is_call());
        assert_eq!(err.procedure(), Some("GetUser"));

        let Error::Call { source, .. } = err else {
            unreachable!();
        };
        let stub = source.downcast_ref::<StubError>().unwrap();
        assert_eq!(stub.0, "deadlock victim");
    }

    #[tokio::test]
    async fn test_construction_error_short_circuits() {
        let factory = StubFactory::new().reject_request("GetUser");
        let session = ready_session(&factory).await;

        let err = assert_err!(SessionAdapter::execute(&session, &get_user()).await);
        assert!(err.is_invalid_request());
        assert!(factory.requests().is_empty());
        assert!(factory.started_calls().is_empty());
        assert_eq!(session.state(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_invalid_name_never_reaches_session() {
        let factory = StubFactory::new();
        let session = ready_session(&factory).await;
        let descriptor = ProcedureDescriptor::new("", Duration::from_secs(1));

        let err = assert_err!(SessionAdapter::execute(&session, &descriptor).await);
        assert!(err.is_invalid_request());
        assert!(
            !factory
                .events()
                .iter()
                .any(|e| matches!(e, StubEvent::CallStarted(_)))
        );
    }

    #[tokio::test]
    async fn test_abandoned_call_is_an_error() {
        let factory = StubFactory::new().with_script("GetUser", Script::Abandon);
        let session = ready_session(&factory).await;

        let err = assert_err!(SessionAdapter::execute(&session, &get_user()).await);
        assert!(err.is_call());
        assert!(err.to_string().contains("without completing"));
    }

    #[tokio::test]
    async fn test_row_keeps_column_order() {
        let factory = StubFactory::new().with_script(
            "ListAccounts",
            Script::Respond(
                StubResponse::new()
                    .columns(&[("zone", "VarChar"), ("balance", "Money"), ("account", "Int")])
                    .row(vec![
                        ("zone", json!("eu")),
                        ("balance", json!(10.5)),
                        ("account", json!(7)),
                    ]),
            ),
        );
        let session = ready_session(&factory).await;
        let descriptor = ProcedureDescriptor::new("ListAccounts", Duration::from_secs(1));

        let result = assert_ok!(SessionAdapter::execute(&session, &descriptor).await);
        let keys: Vec<_> = result.rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["zone", "balance", "account"]);
    }

    #[tokio::test]
    async fn test_empty_response() {
        let factory = StubFactory::new();
        let session = ready_session(&factory).await;
        let descriptor = ProcedureDescriptor::new("Ping", Duration::from_secs(1));

        let result = assert_ok!(SessionAdapter::execute(&session, &descriptor).await);
        assert_eq!(result, CallResult::default());
    }
}
