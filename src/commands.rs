//! Built-in commands.

use crate::eval::{CallContext, CommandEvaluator, Evaluator};
use crate::payload::DataValue;
use crate::registry::{Arity, Command};
use crate::value::Value;

const PROGRAM_NAME: &str = "clipserve";

pub fn builtins() -> Vec<Command> {
    vec![
        Command {
            name: "version",
            arity: Arity::Fixed(0),
            handler: version,
            usage: "",
            description: "print version of program and libraries",
        },
        Command {
            name: "help",
            arity: Arity::Variadic,
            handler: help,
            usage: "[COMMAND...]",
            description: "print help for COMMAND or all commands",
        },
        Command {
            name: "eval",
            arity: Arity::Variadic,
            handler: eval,
            usage: "[SCRIPT]",
            description: "evaluate SCRIPT with the remaining arguments in `arguments`",
        },
        Command {
            name: "echo",
            arity: Arity::Fixed(1),
            handler: echo,
            usage: "VALUE",
            description: "print VALUE as text",
        },
        Command {
            name: "input",
            arity: Arity::Fixed(0),
            handler: input,
            usage: "",
            description: "last data read from standard input",
        },
        Command {
            name: "currentPath",
            arity: Arity::Fixed(0),
            handler: current_path,
            usage: "",
            description: "working directory of the client",
        },
        Command {
            name: "data",
            arity: Arity::Fixed(1),
            handler: data,
            usage: "KEY",
            description: "value stored under KEY in the action data",
        },
        Command {
            name: "setData",
            arity: Arity::Fixed(2),
            handler: set_data,
            usage: "KEY VALUE",
            description: "store VALUE under KEY in the action data",
        },
        Command {
            name: "removeData",
            arity: Arity::Fixed(1),
            handler: remove_data,
            usage: "KEY",
            description: "remove KEY from the action data",
        },
        Command {
            name: "dataFormats",
            arity: Arity::Fixed(0),
            handler: data_formats,
            usage: "",
            description: "list keys present in the action data",
        },
    ]
}

fn version(_: &mut CallContext<'_>, _: &[Value]) -> Value {
    Value::text(format!("{PROGRAM_NAME} {}", env!("CARGO_PKG_VERSION")))
}

fn help(ctx: &mut CallContext<'_>, args: &[Value]) -> Value {
    let mut out = String::new();
    if args.is_empty() {
        out.push_str(&format!("Usage: {PROGRAM_NAME} [COMMAND]\n\n  COMMANDs:\n"));
        for command in ctx.registry.iter() {
            out.push_str(&command.help_line());
        }
        out.push_str(concat!(
            "\nNOTES:\n",
            "  - Use dash argument (-) to read data from standard input.\n",
            "  - Use double-dash argument (--) to pass all following arguments verbatim.\n",
        ));
        return Value::Text(out);
    }

    for arg in args {
        let wanted = arg.to_text();
        for command in ctx.registry.iter() {
            if command.name.contains(wanted.as_str()) {
                out.push_str(&command.help_line());
            }
        }
    }
    if out.is_empty() {
        return Value::error("Command not found!");
    }
    Value::Text(out)
}

fn eval(ctx: &mut CallContext<'_>, args: &[Value]) -> Value {
    let script = args.first().map(Value::to_text).unwrap_or_default();
    CommandEvaluator::new(ctx.registry).evaluate(&script, ctx.scope)
}

fn echo(_: &mut CallContext<'_>, args: &[Value]) -> Value {
    args.first()
        .map(|value| Value::Text(value.to_text()))
        .unwrap_or_default()
}

fn input(ctx: &mut CallContext<'_>, _: &[Value]) -> Value {
    ctx.scope
        .input
        .clone()
        .map(Value::Bytes)
        .unwrap_or_default()
}

fn current_path(ctx: &mut CallContext<'_>, _: &[Value]) -> Value {
    Value::text(ctx.scope.current_path.clone())
}

fn data(ctx: &mut CallContext<'_>, args: &[Value]) -> Value {
    let Some(key) = args.first().map(Value::to_text) else {
        return Value::error("data: missing KEY");
    };
    ctx.scope
        .payload
        .get(&key)
        .map(DataValue::to_value)
        .unwrap_or_else(|| Value::Bytes(Vec::new()))
}

fn set_data(ctx: &mut CallContext<'_>, args: &[Value]) -> Value {
    let [key, value] = args else {
        return Value::error("setData: expected KEY VALUE");
    };
    ctx.scope
        .payload
        .insert(key.to_text(), DataValue::from_value(value));
    Value::Undefined
}

fn remove_data(ctx: &mut CallContext<'_>, args: &[Value]) -> Value {
    let Some(key) = args.first().map(Value::to_text) else {
        return Value::error("removeData: missing KEY");
    };
    ctx.scope.payload.remove(&key);
    Value::Undefined
}

fn data_formats(ctx: &mut CallContext<'_>, _: &[Value]) -> Value {
    Value::Array(ctx.scope.payload.keys().cloned().map(Value::Text).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::run_chain;
    use crate::error::{ExecError, ExecResult};
    use crate::eval::Scope;
    use crate::marshal::Arg;
    use crate::registry::CommandRegistry;

    fn run(items: &[&str], scope: &mut Scope) -> ExecResult<Value> {
        let registry = CommandRegistry::with_builtins();
        let evaluator = CommandEvaluator::new(&registry);
        let args: Vec<Arg> = items.iter().map(|s| Arg::token(s.as_bytes())).collect();
        run_chain(&evaluator, &args, scope)
    }

    #[test]
    fn version_names_program() -> anyhow::Result<()> {
        let value = run(&["version"], &mut Scope::default())?;
        assert!(value.to_text().starts_with("clipserve "));
        Ok(())
    }

    #[test]
    fn help_lists_commands_or_fails() -> anyhow::Result<()> {
        let all = run(&["help"], &mut Scope::default())?.to_text();
        assert!(all.contains("setData KEY VALUE"));
        assert!(all.contains("NOTES:"));

        let one = run(&["help", "Data"], &mut Scope::default())?.to_text();
        assert!(one.contains("setData"));
        assert!(!one.contains("version"));

        match run(&["help", "nothing-like-this"], &mut Scope::default()) {
            Err(ExecError::Evaluation(text)) => assert_eq!(text, "Command not found!"),
            other => panic!("expected error, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn data_commands_edit_payload() -> anyhow::Result<()> {
        let mut scope = Scope::default();
        run(&["setData", "x", "2"], &mut scope)?;
        assert_eq!(scope.payload.get("x"), Some(&DataValue::Bytes(b"2".to_vec())));
        assert_eq!(run(&["data", "x"], &mut scope)?, Value::bytes(b"2".to_vec()));
        assert_eq!(
            run(&["dataFormats"], &mut scope)?,
            Value::Array(vec![Value::text("x")])
        );
        run(&["removeData", "x"], &mut scope)?;
        assert!(scope.payload.is_empty());
        assert_eq!(run(&["data", "x"], &mut scope)?, Value::Bytes(Vec::new()));
        Ok(())
    }

    #[test]
    fn set_data_then_next_command() -> anyhow::Result<()> {
        let mut scope = Scope::default();
        let value = run(&["setData", "k", "v", "data", "k"], &mut scope)?;
        assert_eq!(value, Value::bytes(b"v".to_vec()));
        Ok(())
    }

    #[test]
    fn set_data_with_missing_value_fails() {
        let mut scope = Scope::default();
        assert!(matches!(
            run(&["setData", "k"], &mut scope),
            Err(ExecError::Evaluation(_))
        ));
        assert!(scope.payload.is_empty());
    }

    #[test]
    fn input_and_current_path_read_scope() -> anyhow::Result<()> {
        let mut scope = Scope {
            current_path: "/work".into(),
            input: Some(b"piped".to_vec()),
            ..Scope::default()
        };
        assert_eq!(run(&["currentPath"], &mut scope)?, Value::text("/work"));
        assert_eq!(run(&["input"], &mut scope)?, Value::bytes(b"piped".to_vec()));
        assert_eq!(run(&["input"], &mut Scope::default())?, Value::Undefined);
        Ok(())
    }

    #[test]
    fn eval_returns_callable_that_is_then_invoked() -> anyhow::Result<()> {
        let value = run(&["eval", "version"], &mut Scope::default())?;
        assert!(value.to_text().starts_with("clipserve "));
        Ok(())
    }
}
