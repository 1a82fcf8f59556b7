//! Error taxonomy for a single command invocation.

use std::time::Duration;

use thiserror::Error;

/// Reasons an invocation stops before producing a `Finished` response.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The `Arguments` payload could not be decoded into the reserved-slot layout.
    #[error("malformed arguments: {0}")]
    MalformedArguments(String),

    /// No command was given after the reserved slots.
    #[error("bad command syntax")]
    BadSyntax,

    /// A chain step evaluated to an error value.
    #[error("{0}")]
    Evaluation(String),

    /// The client channel closed while standard input was pending.
    #[error("client disconnected")]
    Disconnected,

    /// No standard input reply arrived in time.
    #[error("timed out after {0:?} waiting for standard input")]
    InputTimeout(Duration),

    /// Inbound message carried an unknown code.
    #[error("incorrect message code {0} from client")]
    IncorrectMessage(i32),

    /// The action payload store failed.
    #[error("action store error: {0}")]
    Store(#[source] anyhow::Error),
}

pub type ExecResult<T> = std::result::Result<T, ExecError>;
