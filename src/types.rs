//! Core types shared by transform and untransform.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON:API version advertised in every transformed document.
pub const JSONAPI_VERSION: &str = "1.0";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Options for transform and untransform.
///
/// Options are layered: registry base options, then the options a schema
/// was registered with, then the per-call options. Each layer only
/// overrides what it sets, so the flags are tri-state.
///
/// Serialized keys are camelCase (`nestIncluded`); the snake_case spellings
/// are accepted as aliases. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Options {
    /// Also map `document.included` into the untransform output.
    #[serde(alias = "untransform_included", skip_serializing_if = "Option::is_none")]
    pub untransform_included: Option<bool>,
    /// Replace relationship stubs with the matching untransformed objects.
    #[serde(alias = "nest_included", skip_serializing_if = "Option::is_none")]
    pub nest_included: Option<bool>,
    /// Truncate back-references in the nested graph to `{id}` stubs.
    /// Only honored together with `nest_included`.
    #[serde(alias = "remove_circular_dependencies", skip_serializing_if = "Option::is_none")]
    pub remove_circular_dependencies: Option<bool>,
    /// Free-form values made available to schema callbacks.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn untransform_included(mut self, enabled: bool) -> Self {
        self.untransform_included = Some(enabled);
        self
    }

    pub fn nest_included(mut self, enabled: bool) -> Self {
        self.nest_included = Some(enabled);
        self
    }

    pub fn remove_circular_dependencies(mut self, enabled: bool) -> Self {
        self.remove_circular_dependencies = Some(enabled);
        self
    }

    /// Set a callback-visible parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Look up a callback-visible parameter.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn is_untransform_included(&self) -> bool {
        self.untransform_included.unwrap_or(false)
    }

    pub fn is_nest_included(&self) -> bool {
        self.nest_included.unwrap_or(false)
    }

    pub fn is_remove_circular_dependencies(&self) -> bool {
        self.remove_circular_dependencies.unwrap_or(false)
    }

    /// Layer `over` on top of `self`; values set in `over` win.
    pub fn merge(&self, over: &Options) -> Options {
        let mut params = self.params.clone();
        for (key, value) in &over.params {
            params.insert(key.clone(), value.clone());
        }
        Options {
            untransform_included: over.untransform_included.or(self.untransform_included),
            nest_included: over.nest_included.or(self.nest_included),
            remove_circular_dependencies: over
                .remove_circular_dependencies
                .or(self.remove_circular_dependencies),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_type_names() {
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!(1)), "number");
        assert_eq!(json_type_name(&json!("a")), "string");
        assert_eq!(json_type_name(&json!([])), "array");
        assert_eq!(json_type_name(&json!({})), "object");
    }

    #[test]
    fn flags_default_to_false() {
        let opts = Options::new();
        assert!(!opts.is_untransform_included());
        assert!(!opts.is_nest_included());
        assert!(!opts.is_remove_circular_dependencies());
    }

    #[test]
    fn merge_prefers_overriding_layer() {
        let base = Options::new()
            .nest_included(true)
            .untransform_included(true)
            .with_param("locale", json!("en"))
            .with_param("host", json!("a.example"));
        let call = Options::new()
            .nest_included(false)
            .with_param("host", json!("b.example"));

        let merged = base.merge(&call);
        assert!(!merged.is_nest_included());
        assert!(merged.is_untransform_included());
        assert_eq!(merged.get("locale"), Some(&json!("en")));
        assert_eq!(merged.get("host"), Some(&json!("b.example")));
    }

    #[test]
    fn deserialize_from_json() {
        let opts: Options = serde_json::from_value(json!({
            "nest_included": true,
            "params": { "base_url": "https://example.com" }
        }))
        .unwrap();
        assert!(opts.is_nest_included());
        assert_eq!(opts.untransform_included, None);
        assert_eq!(opts.get("base_url"), Some(&json!("https://example.com")));
    }

    #[test]
    fn deserialize_camel_case_keys() {
        let opts: Options = serde_json::from_value(json!({
            "untransformIncluded": true,
            "nestIncluded": true,
            "removeCircularDependencies": false
        }))
        .unwrap();
        assert!(opts.is_untransform_included());
        assert!(opts.is_nest_included());
        assert_eq!(opts.remove_circular_dependencies, Some(false));

        let value = serde_json::to_value(&opts).unwrap();
        assert_eq!(value["nestIncluded"], true);
        assert!(value.get("nest_included").is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = serde_json::from_value::<Options>(json!({ "nestIncludes": true })).unwrap_err();
        assert!(err.to_string().contains("nestIncludes"));

        assert!(serde_json::from_value::<Options>(json!({ "nest_included": "yes" })).is_err());
    }
}
