//! Validate tool call arguments against JSON Schema before execution.

/// Validate tool arguments against a JSON Schema.
///
/// Checks the schema type, required field presence (one level of nesting
/// for object properties), property types, and `enum` membership. Returns
/// `Err(message)` describing the first violation found.
pub fn validate_arguments(
    args: &serde_json::Value,
    schema: &serde_json::Value,
) -> Result<(), String> {
    validate_object(args, schema, None)
}

fn validate_object(
    args: &serde_json::Value,
    schema: &serde_json::Value,
    path: Option<&str>,
) -> Result<(), String> {
    if let Some(schema_type) = schema.get("type").and_then(|v| v.as_str()) {
        if schema_type == "object" && !args.is_object() {
            return Err(format!(
                "expected object arguments{}, got {}",
                path.map(|p| format!(" for '{p}'")).unwrap_or_default(),
                json_type_name(args)
            ));
        }
    }

    let Some(obj) = args.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        for field in required.iter().filter_map(|f| f.as_str()) {
            let present = obj.get(field).is_some_and(|v| !v.is_null());
            if !present {
                return Err(format!("missing required field '{}'", qualified(path, field)));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) else {
        return Ok(());
    };

    for (key, value) in obj {
        let Some(prop_schema) = properties.get(key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let field = qualified(path, key);
        if let Some(expected_type) = prop_schema.get("type").and_then(|v| v.as_str()) {
            if !value_matches_type(value, expected_type) {
                return Err(format!(
                    "field '{}' expected type '{}', got {}",
                    field,
                    expected_type,
                    json_type_name(value)
                ));
            }
            if expected_type == "object" && path.is_none() {
                validate_object(value, prop_schema, Some(&field))?;
            }
        }
        if let Some(allowed) = prop_schema.get("enum").and_then(|v| v.as_array()) {
            if !allowed.contains(value) {
                let rendered = allowed
                    .iter()
                    .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(format!("field '{field}' must be one of: {rendered}"));
            }
        }
    }

    Ok(())
}

fn qualified(path: Option<&str>, field: &str) -> String {
    match path {
        Some(parent) => format!("{parent}.{field}"),
        None => field.to_string(),
    }
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
