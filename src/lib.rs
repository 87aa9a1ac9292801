//! JSON:API Schema Mapper
//!
//! Schema-driven mapping between raw JSON data and JSON:API documents.
//!
//! Register a [`Schema`] per resource kind describing how to derive a
//! resource's type, id, attributes, relationships, links and meta from a raw
//! object. [`Registry::transform`] then builds a compliant document, with
//! related resources side-loaded once into `included`.
//! [`Registry::untransform`] parses a document back into raw objects,
//! optionally re-nesting related objects and breaking reference cycles.
//!
//! # Example
//!
//! ```
//! use jsonapi_schema::{Options, RelatedItem, RelationshipSpec, Registry, Schema};
//! use serde_json::json;
//!
//! let mut registry = Registry::new();
//! registry
//!     .register(
//!         "articles",
//!         Schema::new()
//!             .attributes(|ctx| json!({ "title": ctx.data["title"] }))
//!             .relationship("author", |ctx| {
//!                 Some(RelationshipSpec::one(
//!                     RelatedItem::new("people", ctx.data["author"].clone()).included(true),
//!                 ))
//!             }),
//!         Options::new(),
//!     )
//!     .unwrap();
//! registry
//!     .register(
//!         "people",
//!         Schema::new().attributes(|ctx| json!({ "name": ctx.data["name"] })),
//!         Options::new(),
//!     )
//!     .unwrap();
//!
//! let source = json!({ "id": 1, "title": "T", "author": { "id": 9, "name": "N" } });
//! let document = registry.transform("articles", &source, &Options::new()).unwrap();
//! let document = serde_json::to_value(&document).unwrap();
//!
//! assert_eq!(
//!     document["data"]["relationships"]["author"]["data"],
//!     json!({ "type": "people", "id": "9" })
//! );
//! assert_eq!(
//!     document["included"],
//!     json!([{ "type": "people", "id": "9", "attributes": { "name": "N" } }])
//! );
//!
//! let options = Options::new().untransform_included(true).nest_included(true);
//! let raw = registry.untransform(&document, &options).unwrap();
//! assert_eq!(raw["articles"][0]["author"]["name"], "N");
//! ```
//!
//! # Untransform Options
//!
//! | Option | Effect |
//! |--------|--------|
//! | `untransform_included` | Also map `included` resources into the output |
//! | `nest_included` | Replace `{id}` relationship stubs with the matching objects |
//! | `remove_circular_dependencies` | With `nest_included`: cut back-references to `{id}` stubs |

mod document;
mod error;
mod include;
mod loader;
mod registry;
mod schema;
mod transform;
mod types;
mod untransform;
mod validator;

pub use document::{Document, Linkage, PrimaryData, Relationship, Resource, ResourceIdentifier};
pub use error::{
    DocumentError, LoadError, RegistrationError, TransformError, UntransformError, Violation,
};
pub use include::IncludeAccumulator;
pub use loader::{load_json, load_json_str};
pub use registry::{RegisteredSchema, Registry};
pub use schema::{
    Context, DocumentContext, RelatedItem, Related, RelationshipSpec, ResourceRef,
    ReverseContext, Schema, UntransformContext,
};
pub use types::{json_type_name, Options, JSONAPI_VERSION};
pub use validator::validate_document;
