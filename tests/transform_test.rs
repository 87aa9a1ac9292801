//! Integration tests for transform.

use serde_json::{json, Value};
use jsonapi_schema::{
    Options, RelatedItem, RelationshipSpec, Registry, Schema, TransformError,
};

fn to_value(registry: &Registry, name: &str, source: Value) -> Value {
    let document = registry.transform(name, &source, &Options::new()).unwrap();
    serde_json::to_value(&document).unwrap()
}

/// articles -> author (people), both keyed by stringified numeric ids.
fn blog_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register(
            "articles",
            Schema::new()
                .resource_type(|_| json!("articles"))
                .id(|ctx| json!(ctx.data["id"].to_string()))
                .attributes(|ctx| json!({ "title": ctx.data["title"] }))
                .relationship("author", |ctx| {
                    Some(RelationshipSpec::one(
                        RelatedItem::new("people", ctx.data["author"].clone()).included(true),
                    ))
                }),
            Options::new(),
        )
        .unwrap();
    registry
        .register(
            "people",
            Schema::new()
                .resource_type(|_| json!("people"))
                .id(|ctx| json!(ctx.data["id"].to_string()))
                .attributes(|ctx| json!({ "name": ctx.data["name"] })),
            Options::new(),
        )
        .unwrap();
    registry
}

// === Document Shape Tests ===

mod document_shape {
    use super::*;

    #[test]
    fn article_with_included_author() {
        let registry = blog_registry();
        let doc = to_value(
            &registry,
            "articles",
            json!({ "id": 1, "title": "T", "author": { "id": 9, "name": "N" } }),
        );

        assert_eq!(doc["jsonapi"], json!({ "version": "1.0" }));
        assert_eq!(
            doc["data"],
            json!({
                "type": "articles",
                "id": "1",
                "attributes": { "title": "T" },
                "relationships": {
                    "author": { "data": { "type": "people", "id": "9" } }
                }
            })
        );
        assert_eq!(
            doc["included"],
            json!([{ "type": "people", "id": "9", "attributes": { "name": "N" } }])
        );
    }

    #[test]
    fn list_source_yields_list_data() {
        let registry = blog_registry();
        let doc = to_value(
            &registry,
            "articles",
            json!([
                { "id": 1, "title": "A", "author": { "id": 9, "name": "N" } },
                { "id": 2, "title": "B", "author": { "id": 8, "name": "M" } }
            ]),
        );

        let data = doc["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["id"], "1");
        assert_eq!(data[1]["id"], "2");
        assert_eq!(doc["included"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn empty_list_source() {
        let registry = blog_registry();
        let doc = to_value(&registry, "articles", json!([]));
        assert_eq!(doc["data"], json!([]));
        assert!(doc.get("included").is_none());
    }

    #[test]
    fn bare_schema_emits_only_type_and_id() {
        let mut registry = Registry::new();
        registry
            .register("tags", Schema::new(), Options::new())
            .unwrap();

        let doc = to_value(&registry, "tags", json!({ "id": 5, "label": "x" }));
        assert_eq!(doc["data"], json!({ "type": "tags", "id": "5" }));
        assert!(doc.get("included").is_none());
        assert!(doc.get("links").is_none());
        assert!(doc.get("meta").is_none());
    }

    #[test]
    fn top_level_links_and_meta() {
        let mut registry = Registry::new();
        registry
            .register(
                "tags",
                Schema::new()
                    .document_links(|ctx| {
                        json!({ "self": format!("/tags?count={}", ctx.source.as_array().map_or(1, Vec::len)) })
                    })
                    .document_meta(|ctx| {
                        json!({ "included": ctx.included.len(), "many": matches!(ctx.data, jsonapi_schema::PrimaryData::Many(_)) })
                    }),
                Options::new(),
            )
            .unwrap();

        let doc = to_value(&registry, "tags", json!([{ "id": 1 }, { "id": 2 }]));
        assert_eq!(doc["links"], json!({ "self": "/tags?count=2" }));
        assert_eq!(doc["meta"], json!({ "included": 0, "many": true }));

        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["jsonapi", "links", "meta", "data"]);
    }

    #[test]
    fn non_object_top_level_meta_is_omitted() {
        let mut registry = Registry::new();
        registry
            .register(
                "tags",
                Schema::new().document_meta(|_| json!("nope")),
                Options::new(),
            )
            .unwrap();

        let doc = to_value(&registry, "tags", json!({ "id": 1 }));
        assert!(doc.get("meta").is_none());
    }

    #[test]
    fn resource_links_and_meta() {
        let mut registry = Registry::new();
        registry
            .register(
                "tags",
                Schema::new()
                    .links(|ctx| json!({ "self": format!("/tags/{}", ctx.id.unwrap()) }))
                    .meta(|ctx| json!({ "type": ctx.type_ })),
                Options::new(),
            )
            .unwrap();

        let doc = to_value(&registry, "tags", json!({ "id": "t1" }));
        assert_eq!(
            doc["data"],
            json!({
                "type": "tags",
                "id": "t1",
                "meta": { "type": "tags" },
                "links": { "self": "/tags/t1" }
            })
        );
    }
}

// === Relationship Tests ===

mod relationships {
    use super::*;

    fn register_people(registry: &mut Registry) {
        registry
            .register(
                "people",
                Schema::new().attributes(|ctx| json!({ "name": ctx.data["name"] })),
                Options::new(),
            )
            .unwrap();
    }

    #[test]
    fn null_data_is_kept() {
        let mut registry = Registry::new();
        registry
            .register(
                "articles",
                Schema::new().relationship("editor", |_| Some(RelationshipSpec::null())),
                Options::new(),
            )
            .unwrap();

        let doc = to_value(&registry, "articles", json!({ "id": 1 }));
        assert_eq!(
            doc["data"]["relationships"],
            json!({ "editor": { "data": null } })
        );
    }

    #[test]
    fn none_result_drops_relationship() {
        let mut registry = Registry::new();
        registry
            .register(
                "articles",
                Schema::new()
                    .relationship("editor", |_| None)
                    .relationship("reviewer", |_| Some(RelationshipSpec::default())),
                Options::new(),
            )
            .unwrap();

        let doc = to_value(&registry, "articles", json!({ "id": 1 }));
        assert!(doc["data"].get("relationships").is_none());
    }

    #[test]
    fn links_only_relationship_is_kept() {
        let mut registry = Registry::new();
        registry
            .register(
                "articles",
                Schema::new().relationship("comments", |ctx| {
                    Some(RelationshipSpec::default().links(json!({
                        "related": format!("/articles/{}/comments", ctx.id.unwrap())
                    })))
                }),
                Options::new(),
            )
            .unwrap();

        let doc = to_value(&registry, "articles", json!({ "id": 1 }));
        assert_eq!(
            doc["data"]["relationships"]["comments"],
            json!({ "links": { "related": "/articles/1/comments" } })
        );
    }

    #[test]
    fn relationship_meta_and_identifier_meta() {
        let mut registry = Registry::new();
        register_people(&mut registry);
        registry
            .register(
                "articles",
                Schema::new().relationship("author", |ctx| {
                    Some(
                        RelationshipSpec::one(
                            RelatedItem::new("people", ctx.data["author"].clone())
                                .meta(json!({ "role": "primary" })),
                        )
                        .meta(json!({ "count": 1 })),
                    )
                }),
                Options::new(),
            )
            .unwrap();

        let doc = to_value(&registry, "articles", json!({ "id": 1, "author": { "id": 9 } }));
        assert_eq!(
            doc["data"]["relationships"]["author"],
            json!({
                "data": { "type": "people", "id": "9", "meta": { "role": "primary" } },
                "meta": { "count": 1 }
            })
        );
    }

    #[test]
    fn not_included_related_resource_is_only_referenced() {
        let mut registry = Registry::new();
        register_people(&mut registry);
        registry
            .register(
                "articles",
                Schema::new().relationship("author", |ctx| {
                    Some(RelationshipSpec::one(RelatedItem::new(
                        "people",
                        ctx.data["author"].clone(),
                    )))
                }),
                Options::new(),
            )
            .unwrap();

        let doc = to_value(&registry, "articles", json!({ "id": 1, "author": { "id": 9 } }));
        assert_eq!(
            doc["data"]["relationships"]["author"]["data"],
            json!({ "type": "people", "id": "9" })
        );
        assert!(doc.get("included").is_none());
    }

    #[test]
    fn to_many_relationship() {
        let mut registry = Registry::new();
        registry
            .register("tags", Schema::new(), Options::new())
            .unwrap();
        registry
            .register(
                "articles",
                Schema::new().relationship("tags", |ctx| {
                    let tags = ctx.data["tags"].as_array()?;
                    Some(RelationshipSpec::many(
                        tags.iter()
                            .map(|tag| RelatedItem::new("tags", tag.clone()).included(true)),
                    ))
                }),
                Options::new(),
            )
            .unwrap();

        let doc = to_value(
            &registry,
            "articles",
            json!({ "id": 1, "tags": [{ "id": 1 }, { "id": 2 }] }),
        );
        assert_eq!(
            doc["data"]["relationships"]["tags"]["data"],
            json!([{ "type": "tags", "id": "1" }, { "type": "tags", "id": "2" }])
        );
        assert_eq!(
            doc["included"],
            json!([{ "type": "tags", "id": "1" }, { "type": "tags", "id": "2" }])
        );

        // Missing tags: callback returns None and the relationship is dropped.
        let doc = to_value(&registry, "articles", json!({ "id": 2 }));
        assert!(doc["data"].get("relationships").is_none());
    }

    #[test]
    fn relationships_keep_declaration_order() {
        let mut registry = Registry::new();
        registry
            .register(
                "articles",
                Schema::new()
                    .relationship("zeta", |_| Some(RelationshipSpec::null()))
                    .relationship("alpha", |_| Some(RelationshipSpec::null())),
                Options::new(),
            )
            .unwrap();

        let doc = to_value(&registry, "articles", json!({ "id": 1 }));
        let keys: Vec<_> = doc["data"]["relationships"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }
}

// === Inclusion Tests ===

mod inclusion {
    use super::*;

    /// posts -> comments -> author, with author shared across comments.
    fn thread_registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                "posts",
                Schema::new()
                    .relationship("author", |ctx| {
                        Some(RelationshipSpec::one(
                            RelatedItem::new("people", ctx.data["author"].clone()).included(true),
                        ))
                    })
                    .relationship("comments", |ctx| {
                        let comments = ctx.data["comments"].as_array()?;
                        Some(RelationshipSpec::many(comments.iter().map(|c| {
                            RelatedItem::new("comments", c.clone()).included(true)
                        })))
                    }),
                Options::new(),
            )
            .unwrap();
        registry
            .register(
                "comments",
                Schema::new().relationship("author", |ctx| {
                    Some(RelationshipSpec::one(
                        RelatedItem::new("people", ctx.data["author"].clone()).included(true),
                    ))
                }),
                Options::new(),
            )
            .unwrap();
        registry
            .register("people", Schema::new(), Options::new())
            .unwrap();
        registry
    }

    fn identities(included: &Value) -> Vec<String> {
        included
            .as_array()
            .unwrap()
            .iter()
            .map(|r| format!("{}:{}", r["type"].as_str().unwrap(), r["id"].as_str().unwrap()))
            .collect()
    }

    #[test]
    fn shared_resource_included_once() {
        let registry = thread_registry();
        let doc = to_value(
            &registry,
            "posts",
            json!({
                "id": 1,
                "author": { "id": 7 },
                "comments": [
                    { "id": 10, "author": { "id": 8 } },
                    { "id": 11, "author": { "id": 7 } }
                ]
            }),
        );

        assert_eq!(
            identities(&doc["included"]),
            vec!["people:7", "people:8", "comments:10", "comments:11"]
        );
    }

    #[test]
    fn first_discovery_order_is_depth_first() {
        let registry = thread_registry();
        let doc = to_value(
            &registry,
            "posts",
            json!({
                "id": 1,
                "author": { "id": 3 },
                "comments": [
                    { "id": 20, "author": { "id": 2 } },
                    { "id": 10, "author": { "id": 1 } }
                ]
            }),
        );

        // Nested resources are appended before the resource that discovered
        // them finishes building, so each author precedes its comment.
        assert_eq!(
            identities(&doc["included"]),
            vec!["people:3", "people:2", "comments:20", "people:1", "comments:10"]
        );
    }

    #[test]
    fn dedup_across_primary_items() {
        let registry = thread_registry();
        let doc = to_value(
            &registry,
            "posts",
            json!([
                { "id": 1, "author": { "id": 7 }, "comments": [] },
                { "id": 2, "author": { "id": 7 }, "comments": [] }
            ]),
        );
        assert_eq!(identities(&doc["included"]), vec!["people:7"]);
    }

    #[test]
    fn cyclic_relationships_terminate() {
        let mut registry = Registry::new();
        registry
            .register(
                "people",
                Schema::new().relationship("friend", |ctx| {
                    let friend_id = ctx.data["friend"].as_u64()?;
                    let own_id = ctx.data["id"].as_u64()?;
                    Some(RelationshipSpec::one(
                        RelatedItem::new(
                            "people",
                            json!({ "id": friend_id, "friend": own_id }),
                        )
                        .included(true),
                    ))
                }),
                Options::new(),
            )
            .unwrap();

        let doc = to_value(&registry, "people", json!({ "id": 1, "friend": 2 }));
        // 2 is included; its back-reference to 1 queues 1 once more as a
        // related resource (primary data is not tracked), then 1 -> 2 stops.
        assert_eq!(identities(&doc["included"]), vec!["people:1", "people:2"]);
        assert_eq!(
            doc["data"]["relationships"]["friend"]["data"],
            json!({ "type": "people", "id": "2" })
        );
    }
}

// === Polymorphic Dispatch Tests ===

mod polymorphism {
    use super::*;

    fn feed_registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                "items",
                Schema::new()
                    .data_schema(|ctx| {
                        ctx.data["kind"].as_str().unwrap_or("items").to_string()
                    })
                    .resource_type(|_| json!("items")),
                Options::new(),
            )
            .unwrap();
        registry
            .register(
                "photos",
                Schema::new().attributes(|ctx| json!({ "url": ctx.data["url"] })),
                Options::new(),
            )
            .unwrap();
        registry
            .register(
                "notes",
                Schema::new().attributes(|ctx| json!({ "body": ctx.data["body"] })),
                Options::new(),
            )
            .unwrap();
        registry
            .register(
                "feeds",
                Schema::new().relationship("items", |ctx| {
                    let items = ctx.data["items"].as_array()?;
                    Some(RelationshipSpec::many(
                        items
                            .iter()
                            .map(|item| RelatedItem::new("items", item.clone()).included(true)),
                    ))
                }),
                Options::new(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn primary_data_switches_schema_per_item() {
        let registry = feed_registry();
        let doc = to_value(
            &registry,
            "items",
            json!([
                { "id": 1, "kind": "photos", "url": "u" },
                { "id": 2, "kind": "notes", "body": "b" },
                { "id": 3 }
            ]),
        );
        assert_eq!(
            doc["data"],
            json!([
                { "type": "photos", "id": "1", "attributes": { "url": "u" } },
                { "type": "notes", "id": "2", "attributes": { "body": "b" } },
                { "type": "items", "id": "3" }
            ])
        );
    }

    #[test]
    fn related_identity_comes_from_declared_schema() {
        let registry = feed_registry();
        let doc = to_value(
            &registry,
            "feeds",
            json!({ "id": 1, "items": [{ "id": 5, "kind": "photos", "url": "u" }] }),
        );

        // Identifier and included resource share the identity computed by
        // the declared "items" schema; the body comes from "photos".
        assert_eq!(
            doc["data"]["relationships"]["items"]["data"],
            json!([{ "type": "items", "id": "5" }])
        );
        assert_eq!(
            doc["included"],
            json!([{ "type": "items", "id": "5", "attributes": { "url": "u" } }])
        );
    }

    #[test]
    fn unknown_dispatch_target_is_an_error() {
        let registry = feed_registry();
        let err = registry
            .transform("items", &json!({ "id": 1, "kind": "videos" }), &Options::new())
            .unwrap_err();
        match err {
            TransformError::MissingSchema { name, data } => {
                assert_eq!(name, "videos");
                assert_eq!(data["id"], 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

// === Error Handling Tests ===

mod error_handling {
    use super::*;

    #[test]
    fn missing_top_level_schema() {
        let registry = Registry::new();
        let err = registry
            .transform("articles", &json!({ "id": 1 }), &Options::new())
            .unwrap_err();
        assert!(matches!(err, TransformError::MissingSchema { ref name, .. } if name == "articles"));
    }

    #[test]
    fn missing_relationship_schema_even_when_not_included() {
        let mut registry = Registry::new();
        registry
            .register(
                "articles",
                Schema::new().relationship("author", |ctx| {
                    Some(RelationshipSpec::one(RelatedItem::new(
                        "people",
                        ctx.data["author"].clone(),
                    )))
                }),
                Options::new(),
            )
            .unwrap();

        let err = registry
            .transform("articles", &json!({ "id": 1, "author": { "id": 9 } }), &Options::new())
            .unwrap_err();
        match err {
            TransformError::MissingSchema { name, data } => {
                assert_eq!(name, "people");
                assert_eq!(data, json!({ "id": 9 }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn numeric_type_rejected() {
        let mut registry = Registry::new();
        registry
            .register(
                "things",
                Schema::new().resource_type(|_| json!(42)),
                Options::new(),
            )
            .unwrap();

        let err = registry
            .transform("things", &json!({ "id": 1 }), &Options::new())
            .unwrap_err();
        match err {
            TransformError::InvalidType {
                schema,
                actual,
                value,
                ..
            } => {
                assert_eq!(schema, "things");
                assert_eq!(actual, "number");
                assert_eq!(value, json!(42));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn numeric_id_rejected() {
        let mut registry = Registry::new();
        registry
            .register(
                "things",
                Schema::new().id(|ctx| ctx.data["id"].clone()),
                Options::new(),
            )
            .unwrap();

        let err = registry
            .transform("things", &json!({ "id": 1 }), &Options::new())
            .unwrap_err();
        assert!(matches!(
            err,
            TransformError::InvalidId { actual: "number", .. }
        ));
    }

    #[test]
    fn missing_default_id_rejected() {
        let mut registry = Registry::new();
        registry
            .register("things", Schema::new(), Options::new())
            .unwrap();

        let err = registry
            .transform("things", &json!({ "name": "no id" }), &Options::new())
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidId { actual: "null", .. }));
    }

    #[test]
    fn failure_in_one_item_aborts_whole_call() {
        let mut registry = Registry::new();
        registry
            .register("things", Schema::new(), Options::new())
            .unwrap();

        let result = registry.transform(
            "things",
            &json!([{ "id": 1 }, { "id": null }, { "id": 3 }]),
            &Options::new(),
        );
        assert!(result.is_err());
    }
}
