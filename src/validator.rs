//! Structural validation of JSON:API documents.
//!
//! Untransform runs this check before any mapping, so a document that fails
//! it never produces partial output.

use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::{json, Value};

use crate::error::{DocumentError, Violation};

/// Validate a document against the minimal JSON:API structural rules.
///
/// The document must be an object holding at least one of `data`,
/// `errors` or `meta`, must not hold both `data` and `errors`, and may hold
/// `included` only alongside `data`. Resources need a string `type`
/// (included resources also a string `id`); relationship linkage must be
/// `null`, an identifier or a list of identifiers.
///
/// # Errors
///
/// Returns `DocumentError::Invalid` listing every violation.
pub fn validate_document(document: &Value) -> Result<(), DocumentError> {
    let validator = document_validator()?;

    let errors: Vec<Violation> = validator
        .iter_errors(document)
        .map(|e| Violation {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(DocumentError::Invalid { errors })
    }
}

/// The compiled document schema, built on first use.
fn document_validator() -> Result<&'static Validator, DocumentError> {
    static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();
    VALIDATOR
        .get_or_init(|| jsonschema::validator_for(&document_schema()).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|message| DocumentError::Validator {
            message: message.clone(),
        })
}

fn document_schema() -> Value {
    let identifier = json!({
        "type": "object",
        "required": ["type", "id"],
        "properties": {
            "type": { "type": "string" },
            "id": { "type": "string" },
            "meta": { "type": "object" }
        }
    });

    let relationship = json!({
        "type": "object",
        "anyOf": [
            { "required": ["data"] },
            { "required": ["links"] },
            { "required": ["meta"] }
        ],
        "properties": {
            "data": {
                "oneOf": [
                    { "type": "null" },
                    identifier,
                    { "type": "array", "items": identifier }
                ]
            },
            "links": { "type": "object" },
            "meta": { "type": "object" }
        }
    });

    let primary = resource_schema(&relationship, &["type"]);
    let included = resource_schema(&relationship, &["type", "id"]);

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "anyOf": [
            { "required": ["data"] },
            { "required": ["errors"] },
            { "required": ["meta"] }
        ],
        "not": { "required": ["data", "errors"] },
        "dependentRequired": { "included": ["data"] },
        "properties": {
            "jsonapi": { "type": "object" },
            "links": { "type": "object" },
            "meta": { "type": "object" },
            "errors": { "type": "array" },
            "data": {
                "oneOf": [
                    { "type": "null" },
                    primary,
                    { "type": "array", "items": primary }
                ]
            },
            "included": { "type": "array", "items": included }
        }
    })
}

fn resource_schema(relationship: &Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "required": required,
        "properties": {
            "type": { "type": "string" },
            "id": { "type": "string" },
            "attributes": { "type": "object" },
            "relationships": {
                "type": "object",
                "propertyNames": { "not": { "enum": ["id", "type"] } },
                "additionalProperties": relationship
            },
            "links": { "type": "object" },
            "meta": { "type": "object" }
        }
    })
}
