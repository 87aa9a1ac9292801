//! Schema registry and the public transform/untransform entry points.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::document::Document;
use crate::error::{RegistrationError, TransformError, UntransformError};
use crate::schema::{default_id, Context, Schema, ValueFn};
use crate::types::Options;

/// Relationship names that would collide with raw object fields.
const RESERVED_RELATIONSHIP_NAMES: &[&str] = &["id"];

/// A validated schema as stored in the registry.
///
/// `type` and `id` callbacks are always present: defaults are filled in at
/// registration.
#[derive(Clone)]
pub struct RegisteredSchema {
    name: String,
    schema: Schema,
    type_: ValueFn,
    id: ValueFn,
    options: Options,
}

impl RegisteredSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Options this schema was registered with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn type_fn(&self) -> &ValueFn {
        &self.type_
    }

    pub(crate) fn id_fn(&self) -> &ValueFn {
        &self.id
    }
}

impl fmt::Debug for RegisteredSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredSchema")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("options", &self.options)
            .finish()
    }
}

/// Named schemas plus the base options applied to every call.
///
/// Register all schemas up front, then share the registry (it is `Sync`)
/// across transform and untransform calls. Each call keeps its own state.
///
/// # Example
///
/// ```
/// use jsonapi_schema::{Options, Registry, Schema};
/// use serde_json::json;
///
/// let mut registry = Registry::new();
/// registry
///     .register("people", Schema::new().attributes(|ctx| json!({ "name": ctx.data["name"] })), Options::new())
///     .unwrap();
///
/// let document = registry
///     .transform("people", &json!({ "id": 9, "name": "N" }), &Options::new())
///     .unwrap();
/// let value = serde_json::to_value(&document).unwrap();
/// assert_eq!(value["data"]["id"], "9");
///
/// let raw = registry.untransform(&value, &Options::new()).unwrap();
/// assert_eq!(raw["people"], json!([{ "id": "9", "name": "N" }]));
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    base_options: Options,
    schemas: HashMap<String, RegisteredSchema>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry whose base options apply under every call.
    pub fn with_options(base_options: Options) -> Self {
        Self {
            base_options,
            schemas: HashMap::new(),
        }
    }

    pub fn base_options(&self) -> &Options {
        &self.base_options
    }

    /// Register a schema under `name`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError` if the name is empty or the schema's
    /// relationship declarations are invalid.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        schema: Schema,
        options: Options,
    ) -> Result<(), RegistrationError> {
        let registered = validate_schema(name.into(), schema, options)?;
        tracing::debug!(schema = %registered.name, "registered schema");
        self.schemas.insert(registered.name.clone(), registered);
        Ok(())
    }

    /// Look up a registered schema. Absence is not an error here.
    pub fn get_schema(&self, name: &str) -> Option<&RegisteredSchema> {
        self.schemas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Transform raw data into a JSON:API document using schema `name`.
    ///
    /// A JSON array `source` becomes list primary data, anything else a
    /// single resource.
    ///
    /// # Errors
    ///
    /// Returns `TransformError` if a schema is missing or a `type`/`id`
    /// callback yields a non-string. No partial document is produced.
    pub fn transform(
        &self,
        name: &str,
        source: &Value,
        options: &Options,
    ) -> Result<Document, TransformError> {
        crate::transform::transform(self, name, source, options)
    }

    /// Untransform a JSON:API document into raw objects grouped by type.
    ///
    /// # Errors
    ///
    /// Returns `UntransformError::Document` if the document fails the
    /// structural check (before any mapping happens), or a mapping error
    /// if a schema is missing or a cycle cannot be represented.
    pub fn untransform(
        &self,
        document: &Value,
        options: &Options,
    ) -> Result<Map<String, Value>, UntransformError> {
        crate::untransform::untransform(self, document, options)
    }
}

/// Validate a schema and normalize it into a registry entry.
fn validate_schema(
    name: String,
    schema: Schema,
    options: Options,
) -> Result<RegisteredSchema, RegistrationError> {
    if name.is_empty() {
        return Err(RegistrationError::EmptyName);
    }

    let mut seen = HashSet::new();
    for relationship in schema.relationship_names() {
        if relationship.is_empty() {
            return Err(RegistrationError::EmptyRelationshipName { schema: name });
        }
        if RESERVED_RELATIONSHIP_NAMES.contains(&relationship) {
            return Err(RegistrationError::ReservedRelationshipName {
                schema: name,
                relationship: relationship.to_string(),
            });
        }
        if !seen.insert(relationship) {
            return Err(RegistrationError::DuplicateRelationship {
                schema: name,
                relationship: relationship.to_string(),
            });
        }
    }

    let type_: ValueFn = match &schema.type_ {
        Some(f) => Arc::clone(f),
        None => {
            let constant = Value::String(name.clone());
            Arc::new(move |_: &Context<'_>| constant.clone())
        }
    };
    let id: ValueFn = match &schema.id {
        Some(f) => Arc::clone(f),
        None => Arc::new(default_id),
    };

    Ok(RegisteredSchema {
        name,
        schema,
        type_,
        id,
        options,
    })
}
