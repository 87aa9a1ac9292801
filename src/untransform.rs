//! Untransform: a JSON:API document back into raw objects.
//!
//! Each resource becomes a node in an arena. Relationship fields start out
//! as `{id}` stubs; nesting rewires them to the matching nodes, and the
//! cycle-breaking pass turns back-references into stubs again. The graph is
//! finally materialized into owned JSON grouped by resource type.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::document::{Document, Linkage, Resource, ResourceIdentifier};
use crate::error::{DocumentError, UntransformError};
use crate::registry::{RegisteredSchema, Registry};
use crate::schema::{ResourceRef, ReverseContext, UntransformContext};
use crate::types::{json_type_name, Options};
use crate::validator::validate_document;

static NULL_ID: Value = Value::Null;

/// Untransform `document` into raw objects grouped by type.
pub(crate) fn untransform(
    registry: &Registry,
    document: &Value,
    options: &Options,
) -> Result<Map<String, Value>, UntransformError> {
    validate_document(document)?;
    let document: Document = serde_json::from_value(document.clone())
        .map_err(|source| DocumentError::Malformed { source })?;
    let options = registry.base_options().merge(options);

    let untransformer = Untransformer {
        registry,
        document: &document,
        options: &options,
    };
    let mut graph = Graph::default();

    let mut primary = Vec::new();
    if let Some(data) = &document.data {
        for resource in data.iter() {
            primary.push(graph.push(untransformer.untransform_resource(resource)?));
        }
    }

    if options.is_untransform_included() {
        for resource in &document.included {
            graph.push(untransformer.untransform_resource(resource)?);
        }
    }

    let nest = options.is_nest_included();
    let break_cycles = nest && options.is_remove_circular_dependencies();
    if nest {
        graph.nest_related_resources();
        if break_cycles {
            graph.remove_circular_dependencies(&primary);
        }
    }

    tracing::debug!(
        primary = primary.len(),
        objects = graph.nodes.len(),
        nest,
        break_cycles,
        "untransform complete"
    );

    graph.into_output(break_cycles)
}

/// Per-call untransform context.
struct Untransformer<'r> {
    registry: &'r Registry,
    document: &'r Document,
    options: &'r Options,
}

impl<'r> Untransformer<'r> {
    /// Map one resource to a raw object node with stubbed relationships.
    fn untransform_resource(&self, resource: &Resource) -> Result<Node, UntransformError> {
        let target = ResourceRef::Resource(resource);
        let schema = self.data_schema(target)?;

        let document_id = resource
            .id
            .as_ref()
            .map(|id| Value::String(id.clone()))
            .unwrap_or(Value::Null);
        let id = self.raw_id(schema, target, &document_id);

        let mut fields = Map::new();
        fields.insert("id".to_string(), id.clone());
        if let Some(attributes) = self.raw_attributes(schema, resource, &id) {
            fields.extend(attributes);
        }

        let mut relationships = Vec::new();
        if let Some(declared) = &resource.relationships {
            for (name, relationship) in declared {
                let edge = match &relationship.data {
                    // links/meta only: nothing to map
                    None => continue,
                    Some(Linkage::Null) => Edge::Null,
                    Some(Linkage::One(identifier)) => Edge::One(self.stub(identifier)?),
                    Some(Linkage::Many(identifiers)) => Edge::Many(
                        identifiers
                            .iter()
                            .map(|identifier| self.stub(identifier))
                            .collect::<Result<_, _>>()?,
                    ),
                };
                relationships.push((name.clone(), edge));
            }
        }

        Ok(Node {
            type_: resource.type_.clone(),
            fields,
            relationships,
        })
    }

    /// Resolve the schema for a resource, honoring `untransform_data_schema`.
    fn data_schema(&self, target: ResourceRef<'_>) -> Result<&'r RegisteredSchema, UntransformError> {
        let type_ = target.type_();
        let declared =
            self.registry
                .get_schema(type_)
                .ok_or_else(|| UntransformError::MissingSchema {
                    name: type_.to_string(),
                })?;

        let Some(dispatch) = &declared.schema().untransform_data_schema else {
            return Ok(declared);
        };
        let name = dispatch(&ReverseContext {
            type_,
            resource: target,
            document: self.document,
            options: self.options,
        });
        if name == declared.name() {
            return Ok(declared);
        }

        tracing::debug!(from = declared.name(), to = %name, "switching untransform schema");
        self.registry
            .get_schema(&name)
            .ok_or(UntransformError::MissingSchema { name })
    }

    fn raw_id(&self, schema: &RegisteredSchema, target: ResourceRef<'_>, id: &Value) -> Value {
        match &schema.schema().untransform_id {
            Some(f) => f(&UntransformContext {
                type_: target.type_(),
                id,
                attributes: target.attributes(),
                resource: target,
                options: self.options,
            }),
            None => id.clone(),
        }
    }

    fn raw_attributes(
        &self,
        schema: &RegisteredSchema,
        resource: &Resource,
        id: &Value,
    ) -> Option<Map<String, Value>> {
        let Some(f) = &schema.schema().untransform_attributes else {
            return resource.attributes.clone();
        };
        match f(&UntransformContext {
            type_: &resource.type_,
            id,
            attributes: resource.attributes.as_ref(),
            resource: ResourceRef::Resource(resource),
            options: self.options,
        }) {
            Value::Object(attributes) => Some(attributes),
            Value::Null => None,
            other => {
                tracing::warn!(
                    type_ = %resource.type_,
                    actual = json_type_name(&other),
                    "untransform_attributes returned a non-object, ignoring"
                );
                None
            }
        }
    }

    /// Reference stub for a related identifier, with its raw id.
    fn stub(&self, identifier: &ResourceIdentifier) -> Result<Link, UntransformError> {
        let target = ResourceRef::Identifier(identifier);
        let schema = self.data_schema(target)?;
        let id = self.raw_id(schema, target, &Value::String(identifier.id.clone()));
        Ok(Link::Stub {
            type_: identifier.type_.clone(),
            id,
        })
    }
}

type NodeId = usize;

/// An untransformed raw object.
#[derive(Debug)]
struct Node {
    type_: String,
    /// `id` followed by the raw attributes.
    fields: Map<String, Value>,
    relationships: Vec<(String, Edge)>,
}

impl Node {
    fn id(&self) -> &Value {
        self.fields.get("id").unwrap_or(&NULL_ID)
    }
}

#[derive(Debug)]
enum Edge {
    One(Link),
    Many(Vec<Link>),
    Null,
}

impl Edge {
    fn links_mut(&mut self) -> std::slice::IterMut<'_, Link> {
        match self {
            Edge::One(link) => std::slice::from_mut(link).iter_mut(),
            Edge::Many(links) => links.iter_mut(),
            Edge::Null => std::slice::IterMut::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Link {
    /// Unresolved reference, rendered as `{id}`.
    Stub { type_: String, id: Value },
    /// Nested reference to another node.
    Node(NodeId),
}

/// Arena of raw objects, bucketed by type in first-seen order.
#[derive(Debug, Default)]
struct Graph {
    nodes: Vec<Node>,
    buckets: IndexMap<String, Vec<NodeId>>,
}

impl Graph {
    fn push(&mut self, node: Node) -> NodeId {
        let index = self.nodes.len();
        self.buckets
            .entry(node.type_.clone())
            .or_default()
            .push(index);
        self.nodes.push(node);
        index
    }

    /// First node of `type_` whose raw id equals `id`.
    fn find(&self, type_: &str, id: &Value) -> Option<NodeId> {
        self.buckets
            .get(type_)?
            .iter()
            .copied()
            .find(|&index| self.nodes[index].id() == id)
    }

    /// Replace every resolvable stub with a link to its node. Stubs without
    /// a matching node stay as they are.
    fn nest_related_resources(&mut self) {
        for index in 0..self.nodes.len() {
            let mut relationships = std::mem::take(&mut self.nodes[index].relationships);
            for (_, edge) in &mut relationships {
                for link in edge.links_mut() {
                    if let Link::Stub { type_, id } = link {
                        if let Some(target) = self.find(type_, id) {
                            *link = Link::Node(target);
                        }
                    }
                }
            }
            self.nodes[index].relationships = relationships;
        }
    }

    /// Truncate back-references, starting from the primary objects.
    ///
    /// `visited` holds the nodes queued along the current path; a link to
    /// one of them closes a cycle and becomes a stub. `processed` holds the
    /// nodes whose links were already examined. Nodes the primary objects
    /// cannot reach are walked afterwards in push order, so the graph left
    /// behind is acyclic.
    fn remove_circular_dependencies(&mut self, primary: &[NodeId]) {
        let mut processed = HashSet::new();
        let mut visited = HashSet::new();

        let mut queue = Vec::new();
        for &index in primary {
            if !queue.contains(&index) {
                queue.push(index);
            }
        }
        self.descend(queue, &mut processed, &mut visited);

        for index in 0..self.nodes.len() {
            if !processed.contains(&index) {
                self.descend(vec![index], &mut processed, &mut visited);
            }
        }
    }

    fn descend(
        &mut self,
        queue: Vec<NodeId>,
        processed: &mut HashSet<NodeId>,
        visited: &mut HashSet<NodeId>,
    ) {
        visited.extend(queue.iter().copied());
        for &index in &queue {
            if !processed.contains(&index) {
                self.break_cycles(index, processed, visited);
            }
        }
        for index in &queue {
            visited.remove(index);
        }
    }

    fn break_cycles(
        &mut self,
        index: NodeId,
        processed: &mut HashSet<NodeId>,
        visited: &mut HashSet<NodeId>,
    ) {
        processed.insert(index);

        let mut queue = Vec::new();
        let mut relationships = std::mem::take(&mut self.nodes[index].relationships);
        for (_, edge) in &mut relationships {
            for link in edge.links_mut() {
                let Link::Node(target) = *link else {
                    continue;
                };
                if visited.contains(&target) {
                    let node = &self.nodes[target];
                    tracing::trace!(type_ = %node.type_, id = %node.id(), "truncating circular reference");
                    *link = Link::Stub {
                        type_: node.type_.clone(),
                        id: node.id().clone(),
                    };
                } else if !processed.contains(&target) && !queue.contains(&target) {
                    queue.push(target);
                }
            }
        }
        self.nodes[index].relationships = relationships;

        self.descend(queue, processed, visited);
    }

    /// Materialize every node into owned JSON, grouped by type.
    ///
    /// After cycle breaking the graph is acyclic; a link back onto the
    /// current path only occurs when the pass did not run.
    fn into_output(self, break_cycles: bool) -> Result<Map<String, Value>, UntransformError> {
        let mut output = Map::new();
        let mut path = Vec::new();
        for (type_, indices) in &self.buckets {
            let objects = indices
                .iter()
                .map(|&index| self.materialize(index, &mut path, break_cycles))
                .collect::<Result<Vec<_>, _>>()?;
            output.insert(type_.clone(), Value::Array(objects));
        }
        Ok(output)
    }

    fn materialize(
        &self,
        index: NodeId,
        path: &mut Vec<NodeId>,
        break_cycles: bool,
    ) -> Result<Value, UntransformError> {
        path.push(index);
        let node = &self.nodes[index];
        let mut object = node.fields.clone();
        for (name, edge) in &node.relationships {
            let value = match edge {
                Edge::Null => Value::Null,
                Edge::One(link) => self.materialize_link(link, path, break_cycles)?,
                Edge::Many(links) => Value::Array(
                    links
                        .iter()
                        .map(|link| self.materialize_link(link, path, break_cycles))
                        .collect::<Result<_, _>>()?,
                ),
            };
            object.insert(name.clone(), value);
        }
        path.pop();
        Ok(Value::Object(object))
    }

    fn materialize_link(
        &self,
        link: &Link,
        path: &mut Vec<NodeId>,
        break_cycles: bool,
    ) -> Result<Value, UntransformError> {
        match link {
            Link::Stub { id, .. } => Ok(stub(id)),
            Link::Node(target) if path.contains(target) => {
                let node = &self.nodes[*target];
                if break_cycles {
                    Ok(stub(node.id()))
                } else {
                    Err(UntransformError::CircularReference {
                        type_: node.type_.clone(),
                        id: node.id().clone(),
                    })
                }
            }
            Link::Node(target) => self.materialize(*target, path, break_cycles),
        }
    }
}

fn stub(id: &Value) -> Value {
    let mut object = Map::new();
    object.insert("id".to_string(), id.clone());
    Value::Object(object)
}
