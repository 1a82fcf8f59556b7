//! Command registry built once at startup and shared by every invocation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::commands;
use crate::eval::CallContext;
use crate::value::{Callable, Value};

/// How many trailing values a command claims.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many (clamped to what remains).
    Fixed(usize),
    /// Everything that remains; ends the chain.
    Variadic,
}

pub type HandlerFn = fn(&mut CallContext<'_>, &[Value]) -> Value;

/// Capability description for one command name.
pub struct Command {
    pub name: &'static str,
    pub arity: Arity,
    pub handler: HandlerFn,
    /// Argument synopsis shown by `help`, e.g. `KEY VALUE`.
    pub usage: &'static str,
    pub description: &'static str,
}

impl Command {
    /// One help entry, formatted like `  setData KEY VALUE  description`.
    pub fn help_line(&self) -> String {
        let head = if self.usage.is_empty() {
            self.name.to_string()
        } else {
            format!("{} {}", self.name, self.usage)
        };
        format!("  {head:<24}{}\n", self.description)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, Arc<Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for command in commands::builtins() {
            registry.register(command);
        }
        registry
    }

    /// Add a command, replacing any previous one of the same name.
    pub fn register(&mut self, command: Command) -> Option<Arc<Command>> {
        self.commands.insert(command.name, Arc::new(command))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Command>> {
        self.commands.get(name).cloned()
    }

    pub fn callable(&self, name: &str) -> Option<Callable> {
        self.get(name).map(Callable::new)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.values().map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut CallContext<'_>, _: &[Value]) -> Value {
        Value::Undefined
    }

    #[test]
    fn builtins_are_registered() {
        let registry = CommandRegistry::with_builtins();
        for name in ["version", "help", "eval", "echo", "input", "data", "setData"] {
            assert!(registry.get(name).is_some(), "missing builtin `{name}`");
        }
        assert!(registry.get("bogusCommand").is_none());
    }

    #[test]
    fn register_replaces_by_name() {
        let mut registry = CommandRegistry::new();
        let first = Command {
            name: "x",
            arity: Arity::Fixed(0),
            handler: noop,
            usage: "",
            description: "first",
        };
        let second = Command {
            name: "x",
            arity: Arity::Variadic,
            handler: noop,
            usage: "",
            description: "second",
        };
        assert!(registry.register(first).is_none());
        assert!(registry.register(second).is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("x").map(|c| c.arity), Some(Arity::Variadic));
    }

    #[test]
    fn help_line_includes_usage() {
        let command = Command {
            name: "setData",
            arity: Arity::Fixed(2),
            handler: noop,
            usage: "KEY VALUE",
            description: "store data",
        };
        let line = command.help_line();
        assert!(line.starts_with("  setData KEY VALUE"));
        assert!(line.ends_with("store data\n"));
    }
}
