use super::table::DisplayTable;
use serde_json::{Number, Value};

/// Best-effort typing of text typed into an editable cell.
///
/// Bracketed input is parsed as JSON, `true`/`false` become booleans and
/// numeric strings become numbers. Anything else, including JSON that fails
/// to parse, stays the raw string.
pub fn parse_cell_input(input: &str) -> Value {
    let looks_structural = (input.starts_with('{') && input.ends_with('}'))
        || (input.starts_with('[') && input.ends_with(']'));
    if looks_structural {
        return match serde_json::from_str(input) {
            Ok(value) => value,
            Err(err) => {
                tracing::trace!(%err, "cell input is not JSON, keeping text");
                Value::String(input.to_string())
            }
        };
    }

    match input {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => parse_number(input)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(input.to_string())),
    }
}

/// Numeric strings in the loose sense browsers accept: surrounding
/// whitespace, `0x`/`0o`/`0b` integers, exponents, leading `.`.
fn parse_number(input: &str) -> Option<Number> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = trimmed.strip_prefix(prefix) {
            return i64::from_str_radix(digits, radix).ok().map(Number::from);
        }
    }

    // Rust accepts "inf" and "nan"; neither is a JSON number.
    if trimmed
        .chars()
        .any(|ch| ch.is_ascii_alphabetic() && ch != 'e' && ch != 'E')
    {
        return None;
    }

    let parsed: f64 = trimmed.parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    if parsed.fract() == 0.0 && parsed.abs() < 9_007_199_254_740_992.0 {
        return Some(Number::from(parsed as i64));
    }
    Number::from_f64(parsed)
}

/// Text shown for a value in a cell: nothing for null, pretty JSON for
/// containers, bare text for strings.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        Value::Bool(_) | Value::Number(_) => value.to_string(),
    }
}

/// How a value inside an editable object is offered for input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputShape {
    Cell,
    /// Uniform records, edited per cell as a nested table.
    Records(DisplayTable),
    ReadOnly,
}

pub fn input_shape(value: &Value) -> InputShape {
    if let Some(table) = DisplayTable::from_value(value) {
        return InputShape::Records(table);
    }
    match value {
        Value::Array(_) | Value::Object(_) => InputShape::ReadOnly,
        _ => InputShape::Cell,
    }
}
