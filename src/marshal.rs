//! Turns command tokens into values, resolving `-` and `--`.

use std::future::Future;

use crate::error::ExecResult;
use crate::value::Value;

/// Token replaced by the client's standard input.
pub const STDIN_MARKER: &[u8] = b"-";
/// Token that disables stdin substitution for everything after it.
pub const RAW_MARKER: &[u8] = b"--";

/// Source of standard input for `-` tokens.
///
/// Implementations may suspend until the client replies; they return the most recent input
/// known to the invocation.
pub trait InputSource: Send {
    fn read_input(&mut self) -> impl Future<Output = ExecResult<Vec<u8>>> + Send;
}

/// A marshaled command token.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    /// Client token; evaluated as an expression when it heads the chain.
    Token(Value),
    /// Standard input; always taken as a value, never evaluated.
    Input(Value),
}

impl Arg {
    pub fn token(bytes: impl Into<Vec<u8>>) -> Self {
        Arg::Token(Value::bytes(bytes))
    }

    pub fn value(&self) -> &Value {
        match self {
            Arg::Token(value) | Arg::Input(value) => value,
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Arg::Input(_))
    }
}

/// Convert `tokens` into byte-buffer arguments.
///
/// Returns the arguments together with the last stdin value used, if any.
pub async fn marshal_tokens<I>(
    tokens: &[Vec<u8>],
    input: &mut I,
) -> ExecResult<(Vec<Arg>, Option<Vec<u8>>)>
where
    I: InputSource,
{
    let mut args = Vec::with_capacity(tokens.len());
    let mut raw = false;
    let mut last_input = None;
    for token in tokens {
        if raw {
            args.push(Arg::token(token.clone()));
        } else if token.as_slice() == RAW_MARKER {
            raw = true;
        } else if token.as_slice() == STDIN_MARKER {
            let bytes = input.read_input().await?;
            args.push(Arg::Input(Value::bytes(bytes.clone())));
            last_input = Some(bytes);
        } else {
            args.push(Arg::token(token.clone()));
        }
    }
    Ok((args, last_input))
}

/// Fixed input, for tests and for invocations that never reach a client.
#[derive(Clone, Debug, Default)]
pub struct StaticInput {
    bytes: Vec<u8>,
    reads: usize,
}

impl StaticInput {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            reads: 0,
        }
    }

    /// Number of times input was requested.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl InputSource for StaticInput {
    async fn read_input(&mut self) -> ExecResult<Vec<u8>> {
        self.reads += 1;
        Ok(self.bytes.clone())
    }
}
