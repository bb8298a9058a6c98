//! Payload validation against compiled model schemas.

use serde_json::Value;
use tracing::debug;

use crate::compiler::{compile_definitions, compile_model};
use crate::error::{ModelError, SchemaError, ValidateError};
use crate::model::{Model, ModelRegistry};

/// Self-contained schema document for a model: its compiled schema with the
/// registry's definitions alongside, so `#/definitions/...` references resolve.
pub fn model_document(model: &Model, registry: &ModelRegistry) -> Result<Value, ModelError> {
    let mut document = compile_model(model, registry)?;
    if let Value::Object(map) = &mut document {
        map.insert(
            "definitions".into(),
            Value::Object(compile_definitions(registry)?),
        );
    }
    Ok(document)
}

/// Validate a payload against a registered model.
///
/// # Errors
///
/// Returns `ValidateError::Model` if the model is unknown or the registry
/// does not compile, or `ValidateError::Invalid` if the payload doesn't match.
pub fn validate(
    payload: &Value,
    model: &str,
    registry: &ModelRegistry,
) -> Result<(), ValidateError> {
    let model = registry.lookup(model)?;
    let document = model_document(model, registry)?;
    debug!(model = %model.name(), "validating payload");
    validate_against_schema(&document, payload)
}

/// Validate a payload against an already-compiled schema.
///
/// Use this when validating many payloads against one model document.
pub fn validate_against_schema(schema: &Value, payload: &Value) -> Result<(), ValidateError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ValidateError::InvalidSchema {
        message: e.to_string(),
    })?;

    let errors: Vec<SchemaError> = validator
        .iter_errors(payload)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}
