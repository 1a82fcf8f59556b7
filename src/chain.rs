//! Chain evaluation over the marshaled argument list.
//!
//! Starting from an undefined value, each step either invokes the current callable with the
//! remaining values (advancing by however many it consumed) or takes the next argument. A client
//! token is evaluated as a command-name expression; standard input is taken as the value itself.
//! In `cmd1 arg cmd2 arg2`, `cmd1` claims `arg` and `cmd2 arg2` is evaluated next; a callable
//! returned by a step is invoked with whatever follows it.

use tracing::trace;

use crate::error::{ExecError, ExecResult};
use crate::eval::{Consumed, Evaluator, Scope};
use crate::marshal::Arg;
use crate::value::Value;

/// Run the chain and return its final value.
///
/// Fails with [`ExecError::BadSyntax`] for an empty list and [`ExecError::Evaluation`] when a
/// step produced an error value.
pub fn run_chain<E>(evaluator: &E, args: &[Arg], scope: &mut Scope) -> ExecResult<Value>
where
    E: Evaluator + ?Sized,
{
    if args.is_empty() {
        return Err(ExecError::BadSyntax);
    }

    let values: Vec<Value> = args.iter().map(Arg::value).cloned().collect();
    let mut offset = 0;
    let mut current = Value::Undefined;

    while offset < values.len() && !current.is_error() {
        if let Value::Callable(callable) = &current {
            let invocation = evaluator.invoke(callable, &values[offset..], scope);
            trace!(command = callable.name(), consumed = ?invocation.consumed, "invoked");
            current = invocation.value;
            match invocation.consumed {
                Consumed::All => {
                    offset = values.len();
                    break;
                }
                Consumed::Count(n) => offset += n.min(values.len() - offset),
            }
        } else {
            match &args[offset] {
                Arg::Input(value) => {
                    offset += 1;
                    current = value.clone();
                }
                Arg::Token(value) => {
                    let expression = value.to_text();
                    offset += 1;
                    scope.arguments = values[offset..].to_vec();
                    trace!(expression = %expression, "evaluating");
                    current = evaluator.evaluate(&expression, scope);
                }
            }
        }
    }

    if let Value::Callable(callable) = &current {
        current = evaluator.invoke(callable, &values[offset..], scope).value;
    }

    match current {
        Value::Error(text) => Err(ExecError::Evaluation(text)),
        value => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{CallContext, CommandEvaluator};
    use crate::registry::{Arity, Command, CommandRegistry, HandlerFn};

    fn tokens(items: &[&str]) -> Vec<Arg> {
        items.iter().map(|s| Arg::token(s.as_bytes())).collect()
    }

    fn identity(_: &mut CallContext<'_>, args: &[Value]) -> Value {
        args.first().cloned().unwrap_or_default()
    }

    fn pair(_: &mut CallContext<'_>, args: &[Value]) -> Value {
        Value::Array(args.to_vec())
    }

    fn count(_: &mut CallContext<'_>, args: &[Value]) -> Value {
        Value::Int(args.len() as i64)
    }

    fn get_echo(ctx: &mut CallContext<'_>, _: &[Value]) -> Value {
        ctx.registry
            .callable("echo")
            .map(Value::Callable)
            .unwrap_or_default()
    }

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::with_builtins();
        let extra: [(&'static str, Arity, HandlerFn); 4] = [
            ("id", Arity::Fixed(1), identity),
            ("pair", Arity::Fixed(2), pair),
            ("count", Arity::Variadic, count),
            ("getEcho", Arity::Fixed(0), get_echo),
        ];
        for (name, arity, handler) in extra {
            registry.register(Command {
                name,
                arity,
                handler,
                usage: "",
                description: "",
            });
        }
        registry
    }

    fn run(items: &[&str]) -> ExecResult<Value> {
        let registry = registry();
        let evaluator = CommandEvaluator::new(&registry);
        let mut scope = Scope::default();
        run_chain(&evaluator, &tokens(items), &mut scope)
    }

    #[test]
    fn empty_chain_is_bad_syntax() {
        assert!(matches!(run(&[]), Err(ExecError::BadSyntax)));
    }

    #[test]
    fn echo_consumes_one_argument() -> anyhow::Result<()> {
        assert_eq!(run(&["echo", "hi"])?, Value::text("hi"));
        Ok(())
    }

    #[test]
    fn callable_result_is_invoked_with_the_rest() -> anyhow::Result<()> {
        assert_eq!(run(&["getEcho", "hi"])?, Value::text("hi"));
        Ok(())
    }

    #[test]
    fn plain_result_is_replaced_by_next_expression() -> anyhow::Result<()> {
        assert_eq!(run(&["id", "version"])?, Value::bytes(b"version".to_vec()));
        assert_eq!(run(&["pair", "a", "b", "echo", "c"])?, Value::text("c"));
        Ok(())
    }

    #[test]
    fn variadic_consumes_everything() -> anyhow::Result<()> {
        assert_eq!(run(&["count", "a", "b", "c"])?, Value::Int(3));
        Ok(())
    }

    #[test]
    fn callable_with_nothing_left_is_invoked_once() -> anyhow::Result<()> {
        assert_eq!(run(&["count"])?, Value::Int(0));
        Ok(())
    }

    #[test]
    fn error_stops_the_chain() {
        match run(&["bogusCommand", "version"]) {
            Err(ExecError::Evaluation(text)) => assert!(text.contains("not defined")),
            other => panic!("expected evaluation error, got {other:?}"),
        }
    }

    #[test]
    fn input_is_data_not_an_expression() -> anyhow::Result<()> {
        let registry = registry();
        let evaluator = CommandEvaluator::new(&registry);
        let input = || Arg::Input(Value::bytes(b"AB".to_vec()));

        let value = run_chain(&evaluator, &[input()], &mut Scope::default())?;
        assert_eq!(value, Value::bytes(b"AB".to_vec()));

        let mut args = tokens(&["echo"]);
        args.push(input());
        let value = run_chain(&evaluator, &args, &mut Scope::default())?;
        assert_eq!(value, Value::text("AB"));

        // Input named like a command is still data.
        let value = run_chain(
            &evaluator,
            &[Arg::Input(Value::bytes(b"version".to_vec()))],
            &mut Scope::default(),
        )?;
        assert_eq!(value, Value::bytes(b"version".to_vec()));
        Ok(())
    }

    #[test]
    fn plain_value_is_the_result() -> anyhow::Result<()> {
        assert_eq!(run(&["42"])?, Value::Int(42));
        Ok(())
    }

    #[test]
    fn arguments_context_holds_unconsumed_values() -> anyhow::Result<()> {
        assert_eq!(run(&["arguments.length"])?, Value::Int(0));
        assert_eq!(run(&["eval", "arguments.length", "x", "y"])?, Value::Int(3));
        Ok(())
    }
}
