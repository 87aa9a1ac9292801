//! Transform: raw data into a JSON:API document.
//!
//! Resources are built depth-first. Related items marked `included` are
//! built recursively and appended to the include accumulator the first time
//! their `(type, id)` is seen.

use std::cell::RefCell;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::document::{Document, Linkage, PrimaryData, Relationship, Resource, ResourceIdentifier};
use crate::error::TransformError;
use crate::include::IncludeAccumulator;
use crate::registry::{RegisteredSchema, Registry};
use crate::schema::{Context, DocumentContext, RelatedItem, Related, RelationshipSpec};
use crate::types::{json_type_name, Options, JSONAPI_VERSION};

/// Transform `source` with the registered schema `name`.
pub(crate) fn transform(
    registry: &Registry,
    name: &str,
    source: &Value,
    options: &Options,
) -> Result<Document, TransformError> {
    let doc_schema = registry
        .get_schema(name)
        .ok_or_else(|| TransformError::MissingSchema {
            name: name.to_string(),
            data: source.clone(),
        })?;
    let options = registry
        .base_options()
        .merge(doc_schema.options())
        .merge(options);

    tracing::debug!(schema = name, "transforming source");

    let mut transformer = Transformer {
        registry,
        source,
        options: &options,
        include: IncludeAccumulator::new(),
    };

    let data = match source {
        Value::Array(items) => PrimaryData::Many(
            items
                .iter()
                .map(|item| transformer.transform_data(doc_schema, item, None))
                .collect::<Result<_, _>>()?,
        ),
        single => PrimaryData::One(Box::new(transformer.transform_data(
            doc_schema, single, None,
        )?)),
    };
    let included = transformer.include.into_resources();

    tracing::debug!(
        schema = name,
        included = included.len(),
        "transform complete"
    );

    Ok(assemble(doc_schema, source, &options, data, included))
}

/// Build the top-level document around the primary data.
fn assemble(
    doc_schema: &RegisteredSchema,
    source: &Value,
    options: &Options,
    data: PrimaryData,
    included: Vec<Resource>,
) -> Document {
    let ctx = DocumentContext {
        source,
        options,
        data: &data,
        included: &included,
    };
    let schema = doc_schema.schema();
    let links = schema
        .document_links
        .as_ref()
        .and_then(|f| object_or_warn("document links", f(&ctx)));
    let meta = schema
        .document_meta
        .as_ref()
        .and_then(|f| object_or_warn("document meta", f(&ctx)));

    let mut jsonapi = Map::new();
    jsonapi.insert("version".to_string(), Value::from(JSONAPI_VERSION));

    Document {
        jsonapi: Some(jsonapi),
        links,
        meta,
        data: Some(data),
        included,
        errors: None,
    }
}

/// Per-call transform state.
struct Transformer<'s> {
    registry: &'s Registry,
    source: &'s Value,
    options: &'s Options,
    include: IncludeAccumulator,
}

impl<'s> Transformer<'s> {
    fn lookup(&self, name: &str) -> Option<&'s RegisteredSchema> {
        self.registry.get_schema(name)
    }

    /// Build one resource from a raw item.
    ///
    /// `forced` carries a `(type, id)` computed by the caller; it is used
    /// as-is so polymorphic dispatch cannot change a related resource's
    /// identity after it was marked for inclusion.
    fn transform_data(
        &mut self,
        declared: &'s RegisteredSchema,
        data: &Value,
        forced: Option<(String, String)>,
    ) -> Result<Resource, TransformError> {
        let state = RefCell::new(Map::new());
        let base = Context {
            source: self.source,
            options: self.options,
            data,
            type_: None,
            id: None,
            attributes: None,
            relationships: None,
            links: None,
            state: &state,
        };
        let schema = self.effective_schema(declared, &base)?;

        let (type_, id) = match forced {
            Some(identity) => identity,
            None => {
                let type_ = resource_type(schema, &base)?;
                let id = resource_id(
                    schema,
                    &Context {
                        type_: Some(&type_),
                        ..base
                    },
                )?;
                (type_, id)
            }
        };

        let ctx = Context {
            type_: Some(&type_),
            id: Some(&id),
            ..base
        };
        let attributes = schema
            .schema()
            .attributes
            .as_ref()
            .and_then(|f| object_or_warn("attributes", f(&ctx)));

        let ctx = Context {
            attributes: attributes.as_ref(),
            ..ctx
        };
        let relationships = self.relationships(schema, &ctx)?;

        let ctx = Context {
            relationships: relationships.as_ref(),
            ..ctx
        };
        let links = schema
            .schema()
            .links
            .as_ref()
            .and_then(|f| object_or_warn("links", f(&ctx)));

        let ctx = Context {
            links: links.as_ref(),
            ..ctx
        };
        let meta = schema
            .schema()
            .meta
            .as_ref()
            .and_then(|f| object_or_warn("meta", f(&ctx)));

        Ok(Resource {
            type_,
            id: Some(id),
            attributes,
            relationships,
            meta,
            links,
        })
    }

    /// Resolve the schema actually used for an item via `data_schema`.
    fn effective_schema(
        &self,
        declared: &'s RegisteredSchema,
        ctx: &Context<'_>,
    ) -> Result<&'s RegisteredSchema, TransformError> {
        let Some(dispatch) = &declared.schema().data_schema else {
            return Ok(declared);
        };
        let name = dispatch(ctx);
        if name == declared.name() {
            return Ok(declared);
        }

        tracing::debug!(from = declared.name(), to = %name, "switching data schema");
        self.lookup(&name)
            .ok_or_else(|| TransformError::MissingSchema {
                name,
                data: ctx.data.clone(),
            })
    }

    fn relationships(
        &mut self,
        schema: &RegisteredSchema,
        ctx: &Context<'_>,
    ) -> Result<Option<IndexMap<String, Relationship>>, TransformError> {
        let declared = &schema.schema().relationships;
        if declared.is_empty() {
            return Ok(None);
        }

        let mut relationships = IndexMap::new();
        for (name, f) in declared {
            let Some(spec) = f(ctx) else {
                continue;
            };
            if let Some(relationship) = self.relationship(spec)? {
                relationships.insert(name.clone(), relationship);
            }
        }

        Ok((!relationships.is_empty()).then_some(relationships))
    }

    /// Convert one relationship callback result. `None` drops it.
    fn relationship(
        &mut self,
        spec: RelationshipSpec,
    ) -> Result<Option<Relationship>, TransformError> {
        let links = spec.links.and_then(|v| object_or_warn("relationship links", v));
        let meta = spec.meta.and_then(|v| object_or_warn("relationship meta", v));
        if spec.data.is_none() && links.is_none() && meta.is_none() {
            return Ok(None);
        }

        let data = match spec.data {
            None => None,
            Some(Related::Null) => Some(Linkage::Null),
            Some(Related::One(item)) => Some(Linkage::One(self.transform_relationship_data(item)?)),
            Some(Related::Many(items)) => Some(Linkage::Many(
                items
                    .into_iter()
                    .map(|item| self.transform_relationship_data(item))
                    .collect::<Result<_, _>>()?,
            )),
        };

        Ok(Some(Relationship { data, meta, links }))
    }

    /// Convert a related item into an identifier, side-loading it when asked.
    fn transform_relationship_data(
        &mut self,
        item: RelatedItem,
    ) -> Result<ResourceIdentifier, TransformError> {
        let related = self
            .lookup(&item.name)
            .ok_or_else(|| TransformError::MissingSchema {
                name: item.name.clone(),
                data: item.data.clone(),
            })?;

        let state = RefCell::new(Map::new());
        let ctx = Context {
            source: self.source,
            options: self.options,
            data: &item.data,
            type_: None,
            id: None,
            attributes: None,
            relationships: None,
            links: None,
            state: &state,
        };
        let type_ = resource_type(related, &ctx)?;
        let id = resource_id(
            related,
            &Context {
                type_: Some(&type_),
                ..ctx
            },
        )?;

        if item.included && !self.include.exists(&type_, &id) {
            // Mark first: a cycle back to this resource must see it queued.
            self.include.mark_included(&type_, &id);
            tracing::trace!(type_ = %type_, id = %id, "including related resource");
            let resource =
                self.transform_data(related, &item.data, Some((type_.clone(), id.clone())))?;
            self.include.append(resource);
        }

        Ok(ResourceIdentifier {
            type_,
            id,
            meta: item.meta.and_then(|v| object_or_warn("identifier meta", v)),
        })
    }
}

fn resource_type(schema: &RegisteredSchema, ctx: &Context<'_>) -> Result<String, TransformError> {
    match (schema.type_fn())(ctx) {
        Value::String(type_) => Ok(type_),
        other => Err(TransformError::InvalidType {
            schema: schema.name().to_string(),
            actual: json_type_name(&other),
            value: other,
            data: ctx.data.clone(),
        }),
    }
}

fn resource_id(schema: &RegisteredSchema, ctx: &Context<'_>) -> Result<String, TransformError> {
    match (schema.id_fn())(ctx) {
        Value::String(id) => Ok(id),
        other => Err(TransformError::InvalidId {
            schema: schema.name().to_string(),
            actual: json_type_name(&other),
            value: other,
            data: ctx.data.clone(),
        }),
    }
}

/// Keep object results; anything else is omitted from the output.
fn object_or_warn(slot: &str, value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::Null => None,
        other => {
            tracing::warn!(
                slot,
                actual = json_type_name(&other),
                "callback returned a non-object, omitting"
            );
            None
        }
    }
}
