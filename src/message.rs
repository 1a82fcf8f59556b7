//! Client argument messages: reserved slots followed by the command tokens.

use serde_bytes::ByteBuf;

use crate::error::{ExecError, ExecResult};

/// Fixed positions inside the encoded token array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    ProcessId = 0,
    CurrentPath = 1,
    ActionId = 2,
    ActionName = 3,
}

/// Index of the first command token.
pub const REST: usize = 4;

/// Decoded `Arguments` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub process_id: Vec<u8>,
    pub current_path: Vec<u8>,
    pub action_id: Vec<u8>,
    pub action_name: Vec<u8>,
    pub rest: Vec<Vec<u8>>,
}

impl Message {
    /// Build a message the way the client fills the reserved slots.
    pub fn new(
        process_id: u32,
        current_path: &str,
        action_id: Option<i64>,
        action_name: Option<&str>,
        rest: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            process_id: process_id.to_string().into_bytes(),
            current_path: current_path.as_bytes().to_vec(),
            action_id: action_id.map(|id| id.to_string().into_bytes()).unwrap_or_default(),
            action_name: action_name.map(|n| n.as_bytes().to_vec()).unwrap_or_default(),
            rest,
        }
    }

    /// Numeric action id, if the slot holds one.
    pub fn action_id(&self) -> Option<i64> {
        std::str::from_utf8(&self.action_id)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    pub fn current_path(&self) -> String {
        String::from_utf8_lossy(&self.current_path).into_owned()
    }

    pub fn action_name(&self) -> String {
        String::from_utf8_lossy(&self.action_name).into_owned()
    }

    pub fn process_id(&self) -> String {
        String::from_utf8_lossy(&self.process_id).into_owned()
    }

    /// Encode as a CBOR array of byte strings.
    pub fn encode(&self) -> Vec<u8> {
        let mut tokens = Vec::with_capacity(REST + self.rest.len());
        tokens.push(ByteBuf::from(self.process_id.clone()));
        tokens.push(ByteBuf::from(self.current_path.clone()));
        tokens.push(ByteBuf::from(self.action_id.clone()));
        tokens.push(ByteBuf::from(self.action_name.clone()));
        tokens.extend(self.rest.iter().cloned().map(ByteBuf::from));
        // A Vec<ByteBuf> always serializes.
        serde_cbor::to_vec(&tokens).unwrap_or_default()
    }

    /// Decode an `Arguments` payload, requiring every reserved slot.
    pub fn decode(bytes: &[u8]) -> ExecResult<Message> {
        let tokens: Vec<ByteBuf> = serde_cbor::from_slice(bytes)
            .map_err(|err| ExecError::MalformedArguments(err.to_string()))?;
        if tokens.len() < REST {
            return Err(ExecError::MalformedArguments(format!(
                "expected at least {REST} reserved slots, found {}",
                tokens.len()
            )));
        }
        let mut tokens = tokens.into_iter().map(ByteBuf::into_vec);
        let mut slot = |name: Slot| {
            tokens.next().ok_or_else(|| {
                ExecError::MalformedArguments(format!("missing {name:?} slot"))
            })
        };
        let process_id = slot(Slot::ProcessId)?;
        let current_path = slot(Slot::CurrentPath)?;
        let action_id = slot(Slot::ActionId)?;
        let action_name = slot(Slot::ActionName)?;
        Ok(Message {
            process_id,
            current_path,
            action_id,
            action_name,
            rest: tokens.collect(),
        })
    }

    /// Debug rendering of the command tokens, one numbered line each.
    ///
    /// `eval -- SCRIPT` is shown as the bare script.
    pub fn describe(&self) -> String {
        let is_eval = self.rest.len() == 3 && self.rest[0] == b"eval" && self.rest[1] == b"--";
        let mut out = format!("Client-{}:", self.process_id());
        if is_eval {
            out.push('\n');
            out.push_str(&String::from_utf8_lossy(&self.rest[2]));
            return out;
        }
        for (i, token) in self.rest.iter().enumerate() {
            out.push_str(&format!("\n{} {}", i + 1, String::from_utf8_lossy(token)));
        }
        out
    }
}
