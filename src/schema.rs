//! Schema definitions: the callbacks that map raw data to resources and back.
//!
//! A [`Schema`] is a set of optional callback slots. Every slot receives a
//! context record describing what is known so far about the resource being
//! built. Transform callbacks run in a fixed order (type, id, attributes,
//! relationships, links, meta) and each context carries the results of the
//! earlier steps.
//!
//! # Example
//!
//! ```
//! use jsonapi_schema::{RelatedItem, RelationshipSpec, Schema};
//! use serde_json::json;
//!
//! let articles = Schema::new()
//!     .attributes(|ctx| json!({ "title": ctx.data["title"] }))
//!     .relationship("author", |ctx| {
//!         Some(RelationshipSpec::one(
//!             RelatedItem::new("people", ctx.data["author"].clone()).included(true),
//!         ))
//!     });
//! assert_eq!(articles.relationship_names().collect::<Vec<_>>(), vec!["author"]);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::document::{Document, PrimaryData, Relationship, Resource, ResourceIdentifier};
use crate::types::Options;

/// Callback producing a JSON value from a transform context.
pub type ValueFn = Arc<dyn Fn(&Context<'_>) -> Value + Send + Sync>;
/// Callback describing one relationship of a resource.
pub type RelationshipFn = Arc<dyn Fn(&Context<'_>) -> Option<RelationshipSpec> + Send + Sync>;
/// Callback selecting the schema actually used for a raw item.
pub type DataSchemaFn = Arc<dyn Fn(&Context<'_>) -> String + Send + Sync>;
/// Callback selecting the schema actually used for a document resource.
pub type UntransformDataSchemaFn = Arc<dyn Fn(&ReverseContext<'_>) -> String + Send + Sync>;
/// Callback mapping a document id or attributes back to raw form.
pub type UntransformFn = Arc<dyn Fn(&UntransformContext<'_>) -> Value + Send + Sync>;
/// Callback producing top-level document links or meta.
pub type DocumentFn = Arc<dyn Fn(&DocumentContext<'_>) -> Value + Send + Sync>;

/// Context passed to transform callbacks.
///
/// Fields computed by earlier steps are `Some` by the time later callbacks
/// run: `attributes` sees `type_` and `id`, `links` sees `relationships`,
/// and so on.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    /// The whole source passed to `transform` (single item or list).
    pub source: &'a Value,
    pub options: &'a Options,
    /// The raw item currently being transformed.
    pub data: &'a Value,
    pub type_: Option<&'a str>,
    pub id: Option<&'a str>,
    pub attributes: Option<&'a Map<String, Value>>,
    pub relationships: Option<&'a IndexMap<String, Relationship>>,
    pub links: Option<&'a Map<String, Value>>,
    /// Scratch space shared by all callbacks of one resource.
    pub state: &'a RefCell<Map<String, Value>>,
}

/// A document resource or a relationship identifier under untransform.
#[derive(Debug, Clone, Copy)]
pub enum ResourceRef<'a> {
    Resource(&'a Resource),
    Identifier(&'a ResourceIdentifier),
}

impl<'a> ResourceRef<'a> {
    pub fn type_(&self) -> &'a str {
        match self {
            ResourceRef::Resource(r) => &r.type_,
            ResourceRef::Identifier(r) => &r.type_,
        }
    }

    pub fn id(&self) -> Option<&'a str> {
        match self {
            ResourceRef::Resource(r) => r.id.as_deref(),
            ResourceRef::Identifier(r) => Some(&r.id),
        }
    }

    /// Attributes, only available on full resources.
    pub fn attributes(&self) -> Option<&'a Map<String, Value>> {
        match self {
            ResourceRef::Resource(r) => r.attributes.as_ref(),
            ResourceRef::Identifier(_) => None,
        }
    }

    pub fn meta(&self) -> Option<&'a Map<String, Value>> {
        match self {
            ResourceRef::Resource(r) => r.meta.as_ref(),
            ResourceRef::Identifier(r) => r.meta.as_ref(),
        }
    }
}

/// Context passed to `untransform_data_schema`.
#[derive(Clone, Copy)]
pub struct ReverseContext<'a> {
    pub type_: &'a str,
    pub resource: ResourceRef<'a>,
    pub document: &'a Document,
    pub options: &'a Options,
}

/// Context passed to `untransform_id` and `untransform_attributes`.
///
/// For `untransform_id`, `id` is the document id; for
/// `untransform_attributes` it is the already untransformed raw id.
#[derive(Clone, Copy)]
pub struct UntransformContext<'a> {
    pub type_: &'a str,
    pub id: &'a Value,
    pub attributes: Option<&'a Map<String, Value>>,
    pub resource: ResourceRef<'a>,
    pub options: &'a Options,
}

/// Context passed to the top-level document `links`/`meta` callbacks.
#[derive(Clone, Copy)]
pub struct DocumentContext<'a> {
    pub source: &'a Value,
    pub options: &'a Options,
    pub data: &'a PrimaryData,
    pub included: &'a [Resource],
}

/// What a relationship callback returns.
///
/// A relationship with no `data`, and neither `links` nor `meta` objects, is
/// dropped from the resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipSpec {
    pub data: Option<Related>,
    pub links: Option<Value>,
    pub meta: Option<Value>,
}

impl RelationshipSpec {
    /// A to-one relationship.
    pub fn one(item: RelatedItem) -> Self {
        Self {
            data: Some(Related::One(item)),
            ..Self::default()
        }
    }

    /// A to-many relationship.
    pub fn many(items: impl IntoIterator<Item = RelatedItem>) -> Self {
        Self {
            data: Some(Related::Many(items.into_iter().collect())),
            ..Self::default()
        }
    }

    /// An empty to-one relationship, serialized as `"data": null`.
    pub fn null() -> Self {
        Self {
            data: Some(Related::Null),
            ..Self::default()
        }
    }

    pub fn links(mut self, links: Value) -> Self {
        self.links = Some(links);
        self
    }

    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Related data of a relationship.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(RelatedItem),
    Many(Vec<RelatedItem>),
    Null,
}

/// One related raw item and the schema that describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedItem {
    /// Registered schema name of the related item.
    pub name: String,
    /// The related raw item.
    pub data: Value,
    /// Side-load the related resource into `included`.
    pub included: bool,
    /// Identifier-level meta.
    pub meta: Option<Value>,
}

impl RelatedItem {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
            included: false,
            meta: None,
        }
    }

    pub fn included(mut self, included: bool) -> Self {
        self.included = included;
        self
    }

    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// A resource schema.
///
/// Every slot is optional. At registration, a missing `type` defaults to the
/// registered name and a missing `id` to the stringified `id` field of the
/// raw item.
#[derive(Clone, Default)]
pub struct Schema {
    pub(crate) type_: Option<ValueFn>,
    pub(crate) id: Option<ValueFn>,
    pub(crate) attributes: Option<ValueFn>,
    pub(crate) relationships: Vec<(String, RelationshipFn)>,
    pub(crate) links: Option<ValueFn>,
    pub(crate) meta: Option<ValueFn>,
    pub(crate) data_schema: Option<DataSchemaFn>,
    pub(crate) untransform_data_schema: Option<UntransformDataSchemaFn>,
    pub(crate) untransform_id: Option<UntransformFn>,
    pub(crate) untransform_attributes: Option<UntransformFn>,
    pub(crate) document_links: Option<DocumentFn>,
    pub(crate) document_meta: Option<DocumentFn>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resource type. Must return a JSON string.
    pub fn resource_type<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context<'_>) -> Value + Send + Sync + 'static,
    {
        self.type_ = Some(Arc::new(f));
        self
    }

    /// Resource id. Must return a JSON string.
    pub fn id<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context<'_>) -> Value + Send + Sync + 'static,
    {
        self.id = Some(Arc::new(f));
        self
    }

    /// Resource attributes. Non-object results are omitted.
    pub fn attributes<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context<'_>) -> Value + Send + Sync + 'static,
    {
        self.attributes = Some(Arc::new(f));
        self
    }

    /// Declare a relationship. Relationships are emitted in declaration order.
    pub fn relationship<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Context<'_>) -> Option<RelationshipSpec> + Send + Sync + 'static,
    {
        self.relationships.push((name.into(), Arc::new(f)));
        self
    }

    /// Resource links. Non-object results are omitted.
    pub fn links<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context<'_>) -> Value + Send + Sync + 'static,
    {
        self.links = Some(Arc::new(f));
        self
    }

    /// Resource meta. Non-object results are omitted.
    pub fn meta<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context<'_>) -> Value + Send + Sync + 'static,
    {
        self.meta = Some(Arc::new(f));
        self
    }

    /// Polymorphic transform dispatch: name of the schema to use for an item.
    pub fn data_schema<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context<'_>) -> String + Send + Sync + 'static,
    {
        self.data_schema = Some(Arc::new(f));
        self
    }

    /// Polymorphic untransform dispatch: name of the schema to use for a
    /// document resource.
    pub fn untransform_data_schema<F>(mut self, f: F) -> Self
    where
        F: Fn(&ReverseContext<'_>) -> String + Send + Sync + 'static,
    {
        self.untransform_data_schema = Some(Arc::new(f));
        self
    }

    pub fn untransform_id<F>(mut self, f: F) -> Self
    where
        F: Fn(&UntransformContext<'_>) -> Value + Send + Sync + 'static,
    {
        self.untransform_id = Some(Arc::new(f));
        self
    }

    /// Raw attributes for a document resource. Non-object results are ignored.
    pub fn untransform_attributes<F>(mut self, f: F) -> Self
    where
        F: Fn(&UntransformContext<'_>) -> Value + Send + Sync + 'static,
    {
        self.untransform_attributes = Some(Arc::new(f));
        self
    }

    /// Top-level document links, used when this is the document schema.
    pub fn document_links<F>(mut self, f: F) -> Self
    where
        F: Fn(&DocumentContext<'_>) -> Value + Send + Sync + 'static,
    {
        self.document_links = Some(Arc::new(f));
        self
    }

    /// Top-level document meta, used when this is the document schema.
    pub fn document_meta<F>(mut self, f: F) -> Self
    where
        F: Fn(&DocumentContext<'_>) -> Value + Send + Sync + 'static,
    {
        self.document_meta = Some(Arc::new(f));
        self
    }

    /// Names of the declared relationships, in declaration order.
    pub fn relationship_names(&self) -> impl Iterator<Item = &str> {
        self.relationships.iter().map(|(name, _)| name.as_str())
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("type", &self.type_.is_some())
            .field("id", &self.id.is_some())
            .field("attributes", &self.attributes.is_some())
            .field(
                "relationships",
                &self.relationship_names().collect::<Vec<_>>(),
            )
            .field("links", &self.links.is_some())
            .field("meta", &self.meta.is_some())
            .field("data_schema", &self.data_schema.is_some())
            .field(
                "untransform_data_schema",
                &self.untransform_data_schema.is_some(),
            )
            .field("untransform_id", &self.untransform_id.is_some())
            .field(
                "untransform_attributes",
                &self.untransform_attributes.is_some(),
            )
            .finish()
    }
}

/// Default `id` callback: the raw item's `id` field, stringified.
///
/// Strings pass through, numbers and booleans are rendered. Anything else
/// is returned unchanged so the transform rejects it as a non-string id.
pub(crate) fn default_id(ctx: &Context<'_>) -> Value {
    match ctx.data.get("id") {
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(Value::Number(n)) => Value::String(n.to_string()),
        Some(Value::Bool(b)) => Value::String(b.to_string()),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}
