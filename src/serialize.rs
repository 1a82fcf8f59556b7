//! Flattening of a final value into response bytes.

use crate::value::Value;

/// Prefix of every `Exception` response.
pub const ERROR_PREFIX: &str = "ScriptError: ";

/// Serialize `value` into the response body.
///
/// Arrays concatenate their elements, byte buffers are copied verbatim, undefined contributes
/// nothing and every other value is written as text followed by a newline.
pub fn serialize_value(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    append_value(&mut out, value);
    out
}

fn append_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Array(items) => {
            for item in items {
                append_value(out, item);
            }
        }
        Value::Bytes(bytes) => out.extend_from_slice(bytes),
        Value::Undefined => {}
        other => {
            out.extend_from_slice(other.to_string().as_bytes());
            out.push(b'\n');
        }
    }
}

pub fn error_message(text: &str) -> String {
    format!("{ERROR_PREFIX}{text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_concatenates_without_separator() {
        let value = Value::Array(vec![Value::bytes(b"A\x00B".to_vec()), Value::text("text")]);
        assert_eq!(serialize_value(&value), b"A\x00Btext\n");
    }

    #[test]
    fn nested_arrays_flatten_depth_first() {
        let value = Value::Array(vec![
            Value::Int(1),
            Value::Array(vec![Value::Undefined, Value::Bool(false)]),
            Value::Float(0.25),
        ]);
        assert_eq!(serialize_value(&value), b"1\nfalse\n0.25\n");
    }

    #[test]
    fn undefined_and_empty_bytes_are_empty() {
        assert!(serialize_value(&Value::Undefined).is_empty());
        assert!(serialize_value(&Value::Bytes(Vec::new())).is_empty());
        assert!(serialize_value(&Value::Array(Vec::new())).is_empty());
    }

    #[test]
    fn error_message_has_prefix() {
        assert_eq!(error_message("boom"), "ScriptError: boom");
    }
}
