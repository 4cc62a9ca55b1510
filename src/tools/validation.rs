//! Validate tool-call arguments against a JSON Schema before any HTTP
//! request is made.

/// Validate an argument object against a tool's parameter schema.
///
/// Checks top-level shape, required field presence, property types, and
/// rejects fields the schema does not declare. Returns `Err(message)`
/// describing the first violation found.
pub fn validate_arguments(
    args: &serde_json::Value,
    schema: &serde_json::Value,
) -> Result<(), String> {
    if let Some(schema_type) = schema.get("type").and_then(|v| v.as_str()) {
        if schema_type == "object" && !args.is_object() {
            return Err(format!(
                "expected object arguments, got {}",
                json_type_name(args)
            ));
        }
    }

    let Some(obj) = args.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        for field in required.iter().filter_map(|f| f.as_str()) {
            if !obj.contains_key(field) {
                return Err(format!("missing required field '{field}'"));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) {
        for (key, value) in obj {
            let Some(prop_schema) = properties.get(key) else {
                return Err(format!("unknown field '{key}'"));
            };
            if let Some(expected) = prop_schema.get("type").and_then(|v| v.as_str()) {
                if !value_matches_type(value, expected) {
                    return Err(format!(
                        "field '{key}' expected type '{expected}', got {}",
                        json_type_name(value)
                    ));
                }
            }
        }
    }

    Ok(())
}

fn value_matches_type(value: &serde_json::Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rate_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "base": { "type": "string" },
                "target": { "type": "string" },
                "amount": { "type": "number" },
            },
            "required": ["base", "target"],
        })
    }

    #[test]
    fn accepts_valid_arguments() {
        let args = json!({"base": "USD", "target": "EUR"});
        assert!(validate_arguments(&args, &rate_schema()).is_ok());
    }

    #[test]
    fn accepts_optional_field_when_present() {
        let args = json!({"base": "USD", "target": "EUR", "amount": 100.0});
        assert!(validate_arguments(&args, &rate_schema()).is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        let args = json!({"base": "USD"});
        let err = validate_arguments(&args, &rate_schema()).unwrap_err();
        assert!(err.contains("missing required field 'target'"));
    }

    #[test]
    fn rejects_wrong_type() {
        let args = json!({"base": "USD", "target": 42});
        let err = validate_arguments(&args, &rate_schema()).unwrap_err();
        assert!(err.contains("field 'target'"));
        assert!(err.contains("expected type 'string'"));
    }

    #[test]
    fn rejects_unknown_field() {
        let args = json!({"base": "USD", "target": "EUR", "bogus": 1});
        let err = validate_arguments(&args, &rate_schema()).unwrap_err();
        assert!(err.contains("unknown field 'bogus'"));
    }

    #[test]
    fn rejects_non_object_arguments_for_object_schema() {
        let err = validate_arguments(&json!("USD to EUR"), &rate_schema()).unwrap_err();
        assert!(err.contains("expected object arguments"));
    }

    #[test]
    fn integer_schema_rejects_fractions() {
        let schema = json!({
            "type": "object",
            "properties": { "count": { "type": "integer" } },
            "required": ["count"],
        });

        assert!(validate_arguments(&json!({"count": 3}), &schema).is_ok());
        assert!(validate_arguments(&json!({"count": 3.5}), &schema).is_err());
    }

    #[test]
    fn empty_schema_accepts_anything() {
        assert!(validate_arguments(&json!({"anything": true}), &json!({})).is_ok());
        assert!(validate_arguments(&serde_json::Value::Null, &json!({})).is_ok());
    }
}
