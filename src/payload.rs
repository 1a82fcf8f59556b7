//! Action payloads and the store they are synchronized with.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Mutex;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Key-value data attached to an action id.
pub type ActionPayload = BTreeMap<String, DataValue>;

/// A single payload entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataValue {
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl DataValue {
    pub fn to_value(&self) -> Value {
        match self {
            DataValue::Bytes(bytes) => Value::Bytes(bytes.clone()),
            DataValue::Text(s) => Value::Text(s.clone()),
            DataValue::Int(n) => Value::Int(*n),
            DataValue::Float(x) => Value::Float(*x),
            DataValue::Bool(b) => Value::Bool(*b),
        }
    }

    /// Scalars keep their type; anything else is stored as its bytes.
    pub fn from_value(value: &Value) -> DataValue {
        match value {
            Value::Bytes(bytes) => DataValue::Bytes(bytes.clone()),
            Value::Text(s) => DataValue::Text(s.clone()),
            Value::Int(n) => DataValue::Int(*n),
            Value::Float(x) => DataValue::Float(*x),
            Value::Bool(b) => DataValue::Bool(*b),
            other => DataValue::Bytes(other.to_bytes()),
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Bytes(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            DataValue::Text(s) => write!(f, "{s:?}"),
            DataValue::Int(n) => write!(f, "{n}"),
            DataValue::Float(x) => write!(f, "{x}"),
            DataValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Persistent home of action payloads; implementations serialize their own access.
pub trait ActionStore: Send + Sync {
    /// Payload for `action_id`; unknown ids yield an empty payload.
    fn get(&self, action_id: i64) -> Result<ActionPayload>;

    fn set(&self, action_id: i64, payload: &ActionPayload) -> Result<()>;
}

/// Process-local store used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryActionStore {
    entries: Mutex<HashMap<i64, ActionPayload>>,
}

impl MemoryActionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActionStore for MemoryActionStore {
    fn get(&self, action_id: i64) -> Result<ActionPayload> {
        let guard = self.entries.lock().expect("action store poisoned");
        Ok(guard.get(&action_id).cloned().unwrap_or_default())
    }

    fn set(&self, action_id: i64, payload: &ActionPayload) -> Result<()> {
        let mut guard = self.entries.lock().expect("action store poisoned");
        guard.insert(action_id, payload.clone());
        Ok(())
    }
}

/// Snapshot of an action payload taken before a chain runs.
#[derive(Debug)]
pub struct ActionDataSync {
    action_id: Option<i64>,
    snapshot: ActionPayload,
}

impl ActionDataSync {
    /// Fetch the payload for `action_id` and return it as the working copy.
    pub fn fetch(store: &dyn ActionStore, action_id: Option<i64>) -> Result<(Self, ActionPayload)> {
        let snapshot = match action_id {
            Some(id) => store.get(id)?,
            None => ActionPayload::new(),
        };
        let working = snapshot.clone();
        Ok((
            Self {
                action_id,
                snapshot,
            },
            working,
        ))
    }

    pub fn action_id(&self) -> Option<i64> {
        self.action_id
    }

    /// Write `payload` back if it differs from the snapshot. Returns whether it was written.
    pub fn commit(&self, store: &dyn ActionStore, payload: &ActionPayload) -> Result<bool> {
        let Some(id) = self.action_id else {
            return Ok(false);
        };
        if *payload == self.snapshot {
            return Ok(false);
        }
        store.set(id, payload)?;
        Ok(true)
    }
}
