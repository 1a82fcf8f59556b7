//! Evaluator capability used by the chain, plus the built-in command-name evaluator.

use crate::payload::ActionPayload;
use crate::registry::{Arity, CommandRegistry};
use crate::value::{Callable, Value};

/// Per-invocation state visible to expressions and command handlers.
#[derive(Debug, Default)]
pub struct Scope {
    /// Values not yet consumed when the current expression was evaluated.
    pub arguments: Vec<Value>,
    pub current_path: String,
    pub action_name: String,
    /// Mutable action data; compared against the fetched snapshot after the chain.
    pub payload: ActionPayload,
    /// Most recent standard input received during this invocation.
    pub input: Option<Vec<u8>>,
}

/// What a command handler sees while it runs.
pub struct CallContext<'a> {
    pub scope: &'a mut Scope,
    pub registry: &'a CommandRegistry,
}

/// How many trailing values an invocation claimed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Consumed {
    Count(usize),
    All,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    pub consumed: Consumed,
    pub value: Value,
}

pub trait Evaluator {
    /// Evaluate an expression; failures come back as [`Value::Error`].
    fn evaluate(&self, text: &str, scope: &mut Scope) -> Value;

    /// Call `callable` with the unconsumed values.
    fn invoke(&self, callable: &Callable, args: &[Value], scope: &mut Scope) -> Invocation;
}

/// Resolves literals, the `arguments` context and registered command names.
pub struct CommandEvaluator<'r> {
    registry: &'r CommandRegistry,
}

impl<'r> CommandEvaluator<'r> {
    pub fn new(registry: &'r CommandRegistry) -> Self {
        Self { registry }
    }
}

impl Evaluator for CommandEvaluator<'_> {
    fn evaluate(&self, text: &str, scope: &mut Scope) -> Value {
        let text = text.trim();
        match text {
            "" | "undefined" => return Value::Undefined,
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            "arguments" => return Value::Array(scope.arguments.clone()),
            "arguments.length" => return Value::Int(scope.arguments.len() as i64),
            _ => {}
        }

        if let Some(index) = text
            .strip_prefix("arguments[")
            .and_then(|rest| rest.strip_suffix(']'))
        {
            return match index.trim().parse::<usize>() {
                Ok(i) => scope.arguments.get(i).cloned().unwrap_or_default(),
                Err(_) => Value::error(format!("SyntaxError: invalid index in '{text}'")),
            };
        }

        if let Some(literal) = parse_quoted(text) {
            return Value::Text(literal);
        }

        if looks_numeric(text) {
            if let Ok(n) = text.parse::<i64>() {
                return Value::Int(n);
            }
            if let Ok(x) = text.parse::<f64>() {
                return Value::Float(x);
            }
        }

        if is_identifier(text) {
            return match self.registry.callable(text) {
                Some(callable) => Value::Callable(callable),
                None => Value::error(format!("ReferenceError: {text} is not defined")),
            };
        }

        Value::error(format!("SyntaxError: unexpected token in '{text}'"))
    }

    fn invoke(&self, callable: &Callable, args: &[Value], scope: &mut Scope) -> Invocation {
        let command = callable.command();
        let (taken, consumed) = match command.arity {
            Arity::Fixed(n) => {
                let n = n.min(args.len());
                (&args[..n], Consumed::Count(n))
            }
            Arity::Variadic => (args, Consumed::All),
        };
        let mut ctx = CallContext {
            scope,
            registry: self.registry,
        };
        let value = (command.handler)(&mut ctx, taken);
        Invocation { consumed, value }
    }
}

fn looks_numeric(text: &str) -> bool {
    let digits = text.trim_start_matches(['-', '+']);
    let digits = digits.strip_prefix('.').unwrap_or(digits);
    digits.starts_with(|c: char| c.is_ascii_digit())
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn parse_quoted(text: &str) -> Option<String> {
    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = text.strip_prefix(quote)?.strip_suffix(quote)?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == quote {
            // Unescaped quote inside the literal.
            return None;
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            other => out.push(other),
        }
    }
    Some(out)
}
