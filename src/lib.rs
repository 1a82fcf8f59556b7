//! Local command-execution server: decodes client arguments, evaluates them as a command chain and
//! reports the result back over a Unix socket.

pub mod chain;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod eval;
pub mod exec;
pub mod logging;
pub mod marshal;
pub mod message;
pub mod payload;
pub mod protocol;
pub mod registry;
pub mod serialize;
pub mod server;
pub mod store;
pub mod value;

pub type Result<T> = anyhow::Result<T>;

pub use chain::run_chain;
pub use client::run_command;
pub use config::{ServerConfig, default_socket_path};
pub use error::{ExecError, ExecResult};
pub use eval::{CommandEvaluator, Evaluator, Scope};
pub use exec::{Executor, Response};
pub use logging::init_logging;
pub use marshal::{Arg, InputSource, marshal_tokens};
pub use message::Message;
pub use payload::{ActionDataSync, ActionPayload, ActionStore, DataValue, MemoryActionStore};
pub use protocol::{Frame, MessageCode, StatusCode};
pub use registry::{Arity, Command, CommandRegistry};
pub use server::Server;
pub use store::{
    SqliteActionStore, clear_payload, derive_db_path, list_action_ids, load_payload,
    open_or_create_store, open_store, save_payload,
};
pub use value::{Callable, Value};
