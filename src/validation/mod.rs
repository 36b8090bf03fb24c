//! Static request contracts and JSON Schema validation.
//!
//! Each resource has a create contract (required fields enforced) and an
//! update contract (same shape, nothing required). Protocol documents are
//! additionally validated against the stored schema they reference; that
//! cross-check lives with the Protocol model.

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::error::ApiError;

const UUID_PATTERN: &str = "^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$";

fn uuid_string() -> Value {
    json!({ "type": "string", "pattern": UUID_PATTERN })
}

fn contract(properties: Value, required: &[&str]) -> Value {
    json!({
        "$schema": "http://json-schema.org/schema#",
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn protocol_schema_properties() -> Value {
    json!({
        "id": uuid_string(),
        "name": { "type": "string" },
        "description": { "type": "string" },
        "schema": { "type": "object" },
    })
}

fn protocol_properties() -> Value {
    json!({
        "id": uuid_string(),
        "description": { "type": "string" },
        "protocol": { "type": "object" },
        "schema_id": uuid_string(),
        "tags": { "type": "array", "items": { "type": "string" } },
    })
}

pub static PROTOCOL_SCHEMA_CREATE: Lazy<Value> =
    Lazy::new(|| contract(protocol_schema_properties(), &["name", "description", "schema"]));

pub static PROTOCOL_SCHEMA_UPDATE: Lazy<Value> =
    Lazy::new(|| contract(protocol_schema_properties(), &[]));

pub static PROTOCOL_CREATE: Lazy<Value> =
    Lazy::new(|| contract(protocol_properties(), &["protocol", "schema_id"]));

pub static PROTOCOL_UPDATE: Lazy<Value> = Lazy::new(|| contract(protocol_properties(), &[]));

/// Validate a document against a JSON Schema, reporting the first violation.
pub fn validate(instance: &Value, schema: &Value) -> Result<(), ApiError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| ApiError::validation(format!("not a valid JSON Schema: {e}")))?;
    if let Err(error) = validator.validate(instance) {
        return Err(ApiError::validation(format!(
            "schema validation failed: {error}"
        )));
    }
    Ok(())
}
