//! Invocation pipeline: decode, marshal, run the chain, sync action data, report.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::chain::run_chain;
use crate::error::{ExecError, ExecResult};
use crate::eval::{CommandEvaluator, Scope};
use crate::marshal::{InputSource, marshal_tokens};
use crate::message::Message;
use crate::payload::{ActionDataSync, ActionStore};
use crate::protocol::StatusCode;
use crate::registry::CommandRegistry;
use crate::serialize::{error_message, serialize_value};
use crate::value::Value;

/// Outbound result of one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub payload: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode, payload: Vec<u8>) -> Self {
        Self { status, payload }
    }

    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, Vec::new())
    }
}

/// Shared, read-only services every invocation runs against.
pub struct Executor {
    registry: Arc<CommandRegistry>,
    store: Arc<dyn ActionStore>,
}

impl Executor {
    pub fn new(registry: Arc<CommandRegistry>, store: Arc<dyn ActionStore>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Execute one `Arguments` payload.
    ///
    /// Returns `None` only when the client went away while its input was pending.
    pub async fn execute<I>(&self, bytes: &[u8], input: &mut I) -> Option<Response>
    where
        I: InputSource,
    {
        let message = match Message::decode(bytes) {
            Ok(message) => message,
            Err(err) => {
                error!(error = %err, "Failed to read client arguments");
                return Some(Response::empty(StatusCode::Error));
            }
        };
        debug!("{}", message.describe());

        let response = match self.run(&message, input).await {
            Ok(value) => Some(Response::new(StatusCode::Finished, serialize_value(&value))),
            Err(err) => report_failure(err),
        };
        if let Some(response) = &response {
            debug!(status = ?response.status, bytes = response.payload.len(), "DONE");
        }
        response
    }

    async fn run<I>(&self, message: &Message, input: &mut I) -> ExecResult<Value>
    where
        I: InputSource,
    {
        if message.rest.is_empty() {
            return Err(ExecError::BadSyntax);
        }

        let (sync, payload) = ActionDataSync::fetch(self.store.as_ref(), message.action_id())
            .map_err(ExecError::Store)?;
        let (args, last_input) = marshal_tokens(&message.rest, input).await?;

        let mut scope = Scope {
            arguments: Vec::new(),
            current_path: message.current_path(),
            action_name: message.action_name(),
            payload,
            input: last_input,
        };
        let evaluator = CommandEvaluator::new(&self.registry);
        let value = run_chain(&evaluator, &args, &mut scope)?;

        let written = sync
            .commit(self.store.as_ref(), &scope.payload)
            .map_err(ExecError::Store)?;
        if written {
            debug!(action_id = ?sync.action_id(), action = %scope.action_name, "action data updated");
        }
        Ok(value)
    }
}

fn report_failure(err: ExecError) -> Option<Response> {
    match err {
        ExecError::BadSyntax => {
            info!("{}", error_message("Bad command syntax"));
            Some(Response::empty(StatusCode::BadSyntax))
        }
        ExecError::Evaluation(text) => {
            let message = error_message(&text);
            info!("{message}");
            Some(Response::new(StatusCode::Exception, message.into_bytes()))
        }
        ExecError::InputTimeout(_) => {
            let message = error_message(&err.to_string());
            info!("{message}");
            Some(Response::new(StatusCode::Exception, message.into_bytes()))
        }
        ExecError::Disconnected => {
            debug!("Client disconnected before the command finished");
            None
        }
        ExecError::Store(_) | ExecError::MalformedArguments(_) | ExecError::IncorrectMessage(_) => {
            error!(error = %err, "Command failed");
            Some(Response::new(StatusCode::Error, err.to_string().into_bytes()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::StaticInput;
    use crate::payload::{ActionPayload, DataValue, MemoryActionStore};
    use anyhow::{Result, bail};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStore {
        inner: MemoryActionStore,
        sets: AtomicUsize,
    }

    impl ActionStore for CountingStore {
        fn get(&self, action_id: i64) -> Result<ActionPayload> {
            self.inner.get(action_id)
        }

        fn set(&self, action_id: i64, payload: &ActionPayload) -> Result<()> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.inner.set(action_id, payload)
        }
    }

    struct FailingStore;

    impl ActionStore for FailingStore {
        fn get(&self, _: i64) -> Result<ActionPayload> {
            bail!("database is locked")
        }

        fn set(&self, _: i64, _: &ActionPayload) -> Result<()> {
            bail!("database is locked")
        }
    }

    fn executor_with(store: Arc<dyn ActionStore>) -> Executor {
        Executor::new(Arc::new(CommandRegistry::with_builtins()), store)
    }

    fn arguments(action_id: Option<i64>, rest: &[&str]) -> Vec<u8> {
        let rest = rest.iter().map(|s| s.as_bytes().to_vec()).collect();
        Message::new(99, "/home/user", action_id, Some("test"), rest).encode()
    }

    async fn execute(executor: &Executor, bytes: &[u8]) -> Response {
        let mut input = StaticInput::new(vec![0x41, 0x42]);
        executor
            .execute(bytes, &mut input)
            .await
            .expect("response expected")
    }

    #[tokio::test]
    async fn empty_rest_is_bad_syntax() {
        let executor = executor_with(Arc::new(MemoryActionStore::new()));
        let response = execute(&executor, &arguments(None, &[])).await;
        assert_eq!(response, Response::empty(StatusCode::BadSyntax));
    }

    #[tokio::test]
    async fn empty_rest_is_bad_syntax_even_with_broken_store() {
        let executor = executor_with(Arc::new(FailingStore));
        let response = execute(&executor, &arguments(Some(1), &[])).await;
        assert_eq!(response.status, StatusCode::BadSyntax);
    }

    #[tokio::test]
    async fn echo_finishes_with_newline() {
        let executor = executor_with(Arc::new(MemoryActionStore::new()));
        let response = execute(&executor, &arguments(None, &["echo", "hi"])).await;
        assert_eq!(response, Response::new(StatusCode::Finished, b"hi\n".to_vec()));
    }

    #[tokio::test]
    async fn unknown_command_is_exception() {
        let executor = executor_with(Arc::new(MemoryActionStore::new()));
        let response = execute(&executor, &arguments(None, &["bogusCommand"])).await;
        assert_eq!(response.status, StatusCode::Exception);
        let text = String::from_utf8(response.payload).expect("utf-8");
        assert!(text.starts_with("ScriptError: "));
        assert!(text.contains("not defined"));
    }

    #[tokio::test]
    async fn stdin_bytes_are_returned_verbatim() {
        let executor = executor_with(Arc::new(MemoryActionStore::new()));
        let response = execute(&executor, &arguments(None, &["-"])).await;
        assert_eq!(response.status, StatusCode::Finished);
        assert_eq!(response.payload, b"AB");
    }

    #[tokio::test]
    async fn malformed_arguments_report_error() {
        let executor = executor_with(Arc::new(MemoryActionStore::new()));
        let response = execute(&executor, b"\xffnot cbor").await;
        assert_eq!(response, Response::empty(StatusCode::Error));
    }

    #[tokio::test]
    async fn store_failure_degrades_to_error_status() {
        let executor = executor_with(Arc::new(FailingStore));
        let response = execute(&executor, &arguments(Some(1), &["version"])).await;
        assert_eq!(response.status, StatusCode::Error);
    }

    #[tokio::test]
    async fn changed_payload_is_written_back_once() -> Result<()> {
        let store = Arc::new(CountingStore::default());
        let mut initial = ActionPayload::new();
        initial.insert("x".into(), DataValue::Int(1));
        store.inner.set(7, &initial)?;
        let executor = executor_with(store.clone());

        let response = execute(&executor, &arguments(Some(7), &["setData", "x", "2"])).await;
        assert_eq!(response.status, StatusCode::Finished);
        assert_eq!(store.sets.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.get(7)?.get("x"),
            Some(&DataValue::Bytes(b"2".to_vec()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn unchanged_payload_is_not_written() -> Result<()> {
        let store = Arc::new(CountingStore::default());
        let executor = executor_with(store.clone());
        let response = execute(&executor, &arguments(Some(7), &["dataFormats"])).await;
        assert_eq!(response.status, StatusCode::Finished);
        assert_eq!(store.sets.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn failed_chain_does_not_write_payload() -> Result<()> {
        let store = Arc::new(CountingStore::default());
        let executor = executor_with(store.clone());
        let response =
            execute(&executor, &arguments(Some(7), &["setData", "x", "2", "bogus"])).await;
        assert_eq!(response.status, StatusCode::Exception);
        assert_eq!(store.sets.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_runs_are_identical() {
        let executor = executor_with(Arc::new(MemoryActionStore::new()));
        let bytes = arguments(Some(3), &["data", "missing", "help", "echo"]);
        let first = execute(&executor, &bytes).await;
        let second = execute(&executor, &bytes).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn disconnect_yields_no_response() {
        struct Gone;
        impl InputSource for Gone {
            async fn read_input(&mut self) -> ExecResult<Vec<u8>> {
                Err(ExecError::Disconnected)
            }
        }
        let executor = executor_with(Arc::new(MemoryActionStore::new()));
        let response = executor.execute(&arguments(None, &["-"]), &mut Gone).await;
        assert!(response.is_none());
    }
}
