use deckhand_core::tools::ToolSchema;

/// Validate a tool input against its declared schema. Flat, closed-world
/// validation: required fields must be present, undeclared fields are
/// rejected unless the schema opts in, and declared fields must match
/// their runtime type.
pub fn validate_input(input: &serde_json::Value, schema: &ToolSchema) -> Result<(), String> {
    let Some(map) = input.as_object() else {
        return Err("Tool input must be an object".to_string());
    };

    for field in &schema.required {
        if !map.contains_key(field) {
            return Err(format!("Missing required input field '{field}'"));
        }
    }

    for (key, value) in map {
        let Some(declared) = schema.properties.get(key) else {
            if !schema.additional_properties {
                return Err(format!("Unexpected input field '{key}'"));
            }
            continue;
        };
        if !declared.matches(value) {
            return Err(format!(
                "Input field '{key}' expected type '{}', got '{}'",
                declared.as_str(),
                json_type_name(value)
            ));
        }
    }

    Ok(())
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
