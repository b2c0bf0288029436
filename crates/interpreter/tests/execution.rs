// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod fixtures;

use async_graphql_value::{ConstValue, Name};
use graphql_interpreter::{
    ExecutionError, Executor, ExecutorError, Lazy, Request, ResolvedValue,
    schema::{EnumType, FieldDefinition, InterfaceType, ObjectType, UnionType},
};
use serde_json::json;
use test_log::test;

use fixtures::{data, resolved, run, schema, variables};

#[test(tokio::test)]
async fn null_bubbles_to_the_data_root() {
    let schema = schema(
        graphql_interpreter::Schema::build("Query")
            .register(
                ObjectType::new("Query").field(
                    FieldDefinition::new("a", "A!").resolve(|_| Ok(resolved(json!({ "b": null })))),
                ),
            )
            .register(ObjectType::new("A").field(FieldDefinition::new("b", "Int!"))),
    );

    insta::assert_snapshot!(
        run(&schema, "{ a { b } }").await,
        @r#"{"data":null,"errors":[{"message":"Cannot return null for non-nullable field A.b","locations":[{"line":1,"column":7}],"path":["a","b"]}]}"#
    );
}

#[test(tokio::test)]
async fn null_stops_at_the_nearest_nullable_field() {
    let schema = schema(
        graphql_interpreter::Schema::build("Query")
            .register(
                ObjectType::new("Query")
                    .field(FieldDefinition::new("a", "A"))
                    .field(FieldDefinition::new("other", "Int")),
            )
            .register(ObjectType::new("A").field(FieldDefinition::new("b", "B!")))
            .register(ObjectType::new("B").field(FieldDefinition::new("c", "Int!"))),
    );
    let request = Request::parse("{ a { b { c } } other }")
        .unwrap()
        .root_value(data(json!({ "a": { "b": { "c": null } }, "other": 1 })));

    let response = fixtures::execute(&schema, request).await;

    assert_eq!(response.data, Some(json!({ "a": null, "other": 1 })));
    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        response.errors[0].path,
        Some(vec!["a".into(), "b".into(), "c".into()])
    );
}

#[test(tokio::test)]
async fn keys_follow_selection_order_not_completion_order() {
    let schema = schema(
        graphql_interpreter::Schema::build("Query").register(
            ObjectType::new("Query")
                .field(FieldDefinition::new("slow", "Int").resolve(|_| {
                    Ok(ResolvedValue::Lazy(Lazy::new(async {
                        Ok(ResolvedValue::from(1))
                    })))
                }))
                .field(FieldDefinition::new("a", "Int").resolve(|_| Ok(2.into())))
                .field(FieldDefinition::new("b", "Int").resolve(|_| Ok(3.into()))),
        ),
    );

    insta::assert_snapshot!(
        run(&schema, "{ z: a slow a y: b }").await,
        @r#"{"data":{"z":2,"slow":1,"a":2,"y":3}}"#
    );
}

#[test(tokio::test)]
async fn merges_fields_selected_more_than_once() {
    let schema = schema(
        graphql_interpreter::Schema::build("Query")
            .register(ObjectType::new("Query").field(FieldDefinition::new("dog", "Dog")))
            .register(
                ObjectType::new("Dog")
                    .field(FieldDefinition::new("name", "String"))
                    .field(FieldDefinition::new("owner", "Owner")),
            )
            .register(
                ObjectType::new("Owner")
                    .field(FieldDefinition::new("a", "Int"))
                    .field(FieldDefinition::new("b", "Int")),
            ),
    );
    let request = Request::parse(
        "{ dog { owner { a } ...F } dog { owner { b } } }
         fragment F on Dog { name owner { a } }",
    )
    .unwrap()
    .root_value(data(json!({
        "dog": { "name": "Rex", "owner": { "a": 1, "b": 2 } }
    })));

    let response = fixtures::execute(&schema, request).await;

    insta::assert_snapshot!(
        serde_json::to_string(&response).unwrap(),
        @r#"{"data":{"dog":{"owner":{"a":1,"b":2},"name":"Rex"}}}"#
    );
}

fn pets_schema() -> std::sync::Arc<graphql_interpreter::Schema> {
    schema(
        graphql_interpreter::Schema::build("Query")
            .register(
                ObjectType::new("Query")
                    .field(FieldDefinition::new("pets", "[Pet!]!"))
                    .field(FieldDefinition::new("search", "[SearchResult]")),
            )
            .register(InterfaceType::new("Pet"))
            .register(
                ObjectType::new("Dog")
                    .implements("Pet")
                    .field(FieldDefinition::new("name", "String"))
                    .field(FieldDefinition::new("barks", "Boolean")),
            )
            .register(
                ObjectType::new("Cat")
                    .implements("Pet")
                    .field(FieldDefinition::new("name", "String"))
                    .field(FieldDefinition::new("meows", "Boolean")),
            )
            .register(ObjectType::new("Person").field(FieldDefinition::new("name", "String")))
            .register(UnionType::new("SearchResult", ["Dog", "Person"])),
    )
}

#[test(tokio::test)]
async fn type_conditions_filter_by_concrete_type() {
    let schema = pets_schema();
    let request = Request::parse(
        "{ pets { __typename name ... on Dog { barks } ...CatFields } }
         fragment CatFields on Cat { meows }",
    )
    .unwrap()
    .root_value(data(json!({
        "pets": [
            { "__typename": "Dog", "name": "Rex", "barks": true, "meows": true },
            { "__typename": "Cat", "name": "Tom", "barks": true, "meows": false }
        ]
    })));

    let response = fixtures::execute(&schema, request).await;

    insta::assert_snapshot!(
        serde_json::to_string(&response).unwrap(),
        @r#"{"data":{"pets":[{"__typename":"Dog","name":"Rex","barks":true},{"__typename":"Cat","name":"Tom","meows":false}]}}"#
    );
}

#[test(tokio::test)]
async fn union_members_are_resolved_by_hook() {
    let schema = schema(
        graphql_interpreter::Schema::build("Query")
            .register(ObjectType::new("Query").field(FieldDefinition::new("search", "[SearchResult]")))
            .register(ObjectType::new("Dog").field(FieldDefinition::new("name", "String")))
            .register(ObjectType::new("Person").field(FieldDefinition::new("name", "String")))
            .register(
                UnionType::new("SearchResult", ["Dog", "Person"]).resolve_type(|value, _| {
                    let is_dog = matches!(
                        value.as_data(),
                        Some(ConstValue::Object(fields))
                            if fields.get("kind") == Some(&ConstValue::String("dog".into()))
                    );
                    Name::new(if is_dog { "Dog" } else { "Person" }).into()
                }),
            ),
    );
    let request = Request::parse("{ search { ... on Dog { dog: name } ... on Person { person: name } } }")
        .unwrap()
        .root_value(data(json!({
            "search": [{ "kind": "dog", "name": "Rex" }, { "kind": "human", "name": "Ann" }]
        })));

    let response = fixtures::execute(&schema, request).await;

    assert_eq!(
        serde_json::to_string(&response.data).unwrap(),
        r#"{"search":[{"dog":"Rex"},{"person":"Ann"}]}"#
    );
}

#[test(tokio::test)]
async fn resolving_to_an_impossible_type_is_fatal() {
    let schema = pets_schema();
    let request = Request::parse("{ search { __typename } }")
        .unwrap()
        .root_value(data(json!({ "search": [{ "__typename": "Cat" }] })));

    let result = Executor::new(schema).execute(request).await;

    assert!(matches!(
        result,
        Err(ExecutorError::UnresolvedType { abstract_type, resolved })
            if abstract_type.as_str() == "SearchResult" && resolved == "Cat"
    ));
}

#[test(tokio::test)]
async fn skip_and_include_use_variables() {
    let schema = schema(
        graphql_interpreter::Schema::build("Query").register(
            ObjectType::new("Query")
                .field(FieldDefinition::new("a", "Int"))
                .field(FieldDefinition::new("b", "Int"))
                .field(FieldDefinition::new("c", "Int")),
        ),
    );
    let query = "query($flag: Boolean!) {
        a @skip(if: $flag)
        b @include(if: $flag)
        ... @skip(if: true) { c }
    }";

    let request = Request::parse(query)
        .unwrap()
        .variables(variables(json!({ "flag": true })))
        .root_value(data(json!({ "a": 1, "b": 2, "c": 3 })));
    let response = fixtures::execute(&schema, request).await;
    assert_eq!(
        serde_json::to_string(&response.data).unwrap(),
        r#"{"b":2}"#
    );

    let request = Request::parse(query)
        .unwrap()
        .variables(variables(json!({ "flag": false })))
        .root_value(data(json!({ "a": 1, "b": 2, "c": 3 })));
    let response = fixtures::execute(&schema, request).await;
    assert_eq!(
        serde_json::to_string(&response.data).unwrap(),
        r#"{"a":1}"#
    );
}

#[test(tokio::test)]
async fn list_errors_carry_item_paths() {
    let schema = schema(
        graphql_interpreter::Schema::build("Query").register(
            ObjectType::new("Query")
                .field(FieldDefinition::new("failures", "[Int]").resolve(|_| {
                    Ok(ResolvedValue::list([
                        ExecutionError::new("first"),
                        ExecutionError::new("second"),
                    ]))
                }))
                .field(FieldDefinition::new("mixed", "[Int]").resolve(|_| {
                    Ok(ResolvedValue::List(vec![
                        1.into(),
                        ExecutionError::new("broken").into(),
                        ResolvedValue::Skip,
                        4.into(),
                    ]))
                })),
        ),
    );

    insta::assert_snapshot!(
        run(&schema, "{ failures mixed }").await,
        @r#"{"data":{"failures":[null,null],"mixed":[1,null,4]},"errors":[{"message":"first","locations":[{"line":1,"column":3}],"path":["failures",0]},{"message":"second","locations":[{"line":1,"column":3}],"path":["failures",1]},{"message":"broken","locations":[{"line":1,"column":12}],"path":["mixed",1]}]}"#
    );
}

#[test(tokio::test)]
async fn all_error_list_at_a_scalar_position_reports_every_error() {
    let schema = schema(
        graphql_interpreter::Schema::build("Query").register(
            ObjectType::new("Query").field(FieldDefinition::new("value", "Int").resolve(|_| {
                Ok(ResolvedValue::list([
                    ExecutionError::new("one"),
                    ExecutionError::new("two"),
                ]))
            })),
        ),
    );

    let response = fixtures::execute(&schema, Request::parse("{ value }").unwrap()).await;

    assert_eq!(response.data, Some(json!({ "value": null })));
    let messages: Vec<_> = response.errors.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["one", "two"]);
    assert!(
        response
            .errors
            .iter()
            .all(|e| e.path == Some(vec!["value".into()]))
    );
}

#[test(tokio::test)]
async fn skipped_fields_and_raw_values() {
    let schema = schema(
        graphql_interpreter::Schema::build("Query").register(
            ObjectType::new("Query")
                .field(FieldDefinition::new("gone", "Int").resolve(|_| Ok(ResolvedValue::Skip)))
                .field(FieldDefinition::new("raw", "Int").resolve(|_| {
                    Ok(ResolvedValue::raw(json!({ "pre": ["shaped", 1] })))
                }))
                .field(FieldDefinition::new("kept", "Int").resolve(|_| Ok(1.into()))),
        ),
    );

    insta::assert_snapshot!(
        run(&schema, "{ gone raw kept }").await,
        @r#"{"data":{"raw":{"pre":["shaped",1]},"kept":1}}"#
    );
}

#[test(tokio::test)]
async fn leaves_are_coerced_by_their_type() {
    let schema = schema(
        graphql_interpreter::Schema::build("Query")
            .register(
                ObjectType::new("Query")
                    .field(FieldDefinition::new("color", "Color").resolve(|_| Ok("RED".into())))
                    .field(FieldDefinition::new("badColor", "Color").resolve(|_| Ok("PINK".into())))
                    .field(FieldDefinition::new("id", "ID").resolve(|_| Ok(42.into())))
                    .field(FieldDefinition::new("count", "Int").resolve(|_| Ok("7".into()))),
            )
            .register(EnumType::new("Color", ["RED", "GREEN"])),
    );

    let response = fixtures::execute(
        &schema,
        Request::parse("{ color badColor id count }").unwrap(),
    )
    .await;

    assert_eq!(
        serde_json::to_string(&response.data).unwrap(),
        r#"{"color":"RED","badColor":null,"id":"42","count":7}"#
    );
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "\"PINK\" is not a valid Color value");
    assert_eq!(response.errors[0].path, Some(vec!["badColor".into()]));
}

#[test(tokio::test)]
async fn non_list_value_at_a_list_position_is_fatal() {
    let schema = schema(
        graphql_interpreter::Schema::build("Query").register(
            ObjectType::new("Query")
                .field(FieldDefinition::new("items", "[Int]").resolve(|_| Ok(5.into()))),
        ),
    );

    let result = Executor::new(schema)
        .execute(Request::parse("{ items }").unwrap())
        .await;

    assert!(matches!(
        result,
        Err(ExecutorError::ListExpected { path, .. }) if path == "items"
    ));
}

#[test(tokio::test)]
async fn request_errors_produce_no_data() {
    let schema = schema(
        graphql_interpreter::Schema::build("Query")
            .register(ObjectType::new("Query").field(FieldDefinition::new("a", "Int"))),
    );
    let request = Request::parse("query A { a }").unwrap().operation_name("B");

    let response = fixtures::execute(&schema, request).await;

    assert_eq!(
        response.to_json(),
        json!({ "errors": [{ "message": "Unknown operation named \"B\"" }] })
    );
}
