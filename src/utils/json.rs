use serde_json::Value;

/// CRM identifiers arrive either as JSON numbers or as numeric strings.
pub fn id_from_value(optional_value: Option<&Value>) -> Result<i64, String> {
    match optional_value {
        None | Some(Value::Null) => Err("missing identifier".to_string()),
        Some(Value::Number(number)) => number
            .as_i64()
            .ok_or_else(|| format!("identifier {number} is not an integer")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("identifier {s:?} is not numeric")),
        Some(other) => Err(format!("expected number or numeric string, got {other}")),
    }
}

/// Non-empty string field; empty strings and nulls count as absent.
pub fn optional_string(optional_value: Option<&Value>) -> Result<Option<String>, String> {
    match optional_value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.to_owned())),
        Some(other) => Err(format!("expected string or null, got {other}")),
    }
}
