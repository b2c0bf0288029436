// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use async_graphql_value::{ConstValue, Name};
use futures::{FutureExt, future::BoxFuture};
use indexmap::IndexMap;
use tracing::debug;

use crate::{
    context::QueryContext,
    error::{ExecutionError, ResolverError, UnauthorizedError},
    lazy::{Lazy, MaybeLazy},
    schema::{InputObjectType, InputValueDefinition, MetaType, Schema, TypeRef},
    value::AppValue,
};

use super::{ArgumentError, ArgumentState, ArgumentValue, Arguments, ArgumentsResult};

/// Coerce one input value against its type.
///
/// `None` is an omitted value. It stays `None` unless the type is non-null, in which case
/// omission is an error just like an explicit `null`.
pub(crate) fn coerce_input_value(
    schema: &Schema,
    ty: &TypeRef,
    value: Option<ConstValue>,
) -> Result<Option<ConstValue>, String> {
    match ty {
        TypeRef::NonNull(inner) => match value {
            None | Some(ConstValue::Null) => {
                Err(format!("Expected value of type \"{ty}\", found null"))
            }
            Some(value) => coerce_input_value(schema, inner, Some(value)),
        },
        TypeRef::List(inner) => match value {
            None => Ok(None),
            Some(ConstValue::Null) => Ok(Some(ConstValue::Null)),
            Some(ConstValue::List(items)) => items
                .into_iter()
                .map(|item| {
                    coerce_input_value(schema, inner, Some(item))
                        .map(|item| item.unwrap_or(ConstValue::Null))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|items| Some(ConstValue::List(items))),
            // A single value where a list is expected is coerced into a one-item list
            Some(single) => coerce_input_value(schema, inner, Some(single))
                .map(|item| Some(ConstValue::List(vec![item.unwrap_or(ConstValue::Null)]))),
        },
        TypeRef::Named(name) => match value {
            None => Ok(None),
            Some(ConstValue::Null) => Ok(Some(ConstValue::Null)),
            Some(value) => match schema.type_by_name(name) {
                Some(MetaType::Scalar(scalar)) => (scalar.coerce_input)(&value).map(Some),
                Some(MetaType::Enum(enum_type)) => enum_type.coerce(&value).map(Some),
                Some(MetaType::InputObject(input)) => {
                    coerce_input_object(schema, input, value).map(Some)
                }
                _ => Err(format!("{name} is not an input type")),
            },
        },
    }
}

fn coerce_input_object(
    schema: &Schema,
    input: &InputObjectType,
    value: ConstValue,
) -> Result<ConstValue, String> {
    let ConstValue::Object(mut fields) = value else {
        return Err(format!("Expected an object of type {}, found {value}", input.name));
    };

    let mut coerced = async_graphql_value::indexmap::IndexMap::new();
    for (name, definition) in &input.fields {
        let candidate = fields
            .shift_remove(name)
            .or_else(|| definition.default_value.clone());
        let value = coerce_input_value(schema, &definition.ty, candidate)
            .map_err(|e| format!("In field \"{name}\": {e}"))?;
        if let Some(value) = value {
            coerced.insert(name.clone(), value);
        }
    }

    match fields.keys().next() {
        Some(unknown) => Err(format!(
            "Field \"{unknown}\" is not defined by type {}",
            input.name
        )),
        None => Ok(ConstValue::Object(coerced)),
    }
}

pub(crate) enum CoercionOutcome {
    Ready(ArgumentsResult),
    Pending(BoxFuture<'static, ArgumentsResult>),
}

/// An object-loading argument whose load or authorization has to be awaited.
struct DeferredLoad {
    name: Name,
    type_name: Name,
    object: MaybeLazy<AppValue>,
    authorization: Option<MaybeLazy<bool>>,
}

fn from_resolver_error(error: ResolverError) -> ArgumentError {
    match error {
        ResolverError::Execution(e) => ArgumentError::Execution(e),
        ResolverError::Unexpected(e) => ArgumentError::Unexpected(e),
    }
}

fn authorize_loaded(
    schema: &Schema,
    type_name: &Name,
    object: &AppValue,
    context: &QueryContext,
) -> MaybeLazy<bool> {
    match schema
        .object_type(type_name)
        .and_then(|object_type| object_type.authorize.as_ref())
    {
        Some(authorize) => authorize(object, context),
        None => MaybeLazy::Ready(true),
    }
}

fn unauthorized(type_name: Name) -> ArgumentError {
    ArgumentError::Unauthorized(UnauthorizedError::Object { type_name })
}

/// The coercion routine of an argument owner (a field or a directive).
///
/// Runs type coercion and `prepare` synchronously. Object loading, and the authorization
/// of loaded objects, may defer; in that case the outcome is a future that finishes the
/// bag once every load is in.
pub(crate) fn coerce_arguments(
    schema: &Arc<Schema>,
    owner: &str,
    definitions: &IndexMap<Name, InputValueDefinition>,
    mut raw: IndexMap<Name, ConstValue>,
    context: &Arc<QueryContext>,
) -> CoercionOutcome {
    let mut arguments = Arguments::default();
    let mut deferred = vec![];

    for definition in definitions.values() {
        let original_value = raw.shift_remove(&definition.name);
        let (candidate, default_used) = match &original_value {
            Some(value) => (Some(value.clone()), false),
            None => (
                definition.default_value.clone(),
                definition.default_value.is_some(),
            ),
        };

        let mut detail = ArgumentValue {
            name: definition.name.clone(),
            ty: definition.ty.clone(),
            value: ConstValue::Null,
            original_value,
            default_used,
            state: ArgumentState::Initialized,
        };

        let coerced = match coerce_input_value(schema, &definition.ty, candidate) {
            Ok(Some(value)) => value,
            Ok(None) => continue,
            Err(message) => {
                detail.state = ArgumentState::Errored;
                debug!(argument = %detail.name, state = ?detail.state, "argument coercion failed");
                return CoercionOutcome::Ready(Err(ArgumentError::Execution(
                    ExecutionError::new(format!(
                        "Argument '{}' on {owner} has an invalid value: {message}",
                        definition.name
                    )),
                )));
            }
        };
        detail.value = coerced.clone();
        detail.state = ArgumentState::Coerced;

        let prepared = match &definition.prepare {
            Some(prepare) => match prepare(coerced, context) {
                Ok(value) => value,
                Err(error) => {
                    detail.state = ArgumentState::Errored;
                    debug!(argument = %detail.name, state = ?detail.state, "prepare hook failed");
                    return CoercionOutcome::Ready(Err(ArgumentError::Execution(error)));
                }
            },
            None => coerced,
        };
        detail.value = prepared.clone();
        detail.state = ArgumentState::Prepared;

        if let Some((type_name, loads)) = &definition.loads
            && prepared != ConstValue::Null
        {
            let object = match loads(prepared.clone(), context) {
                Ok(object) => object,
                Err(error) => {
                    detail.state = ArgumentState::Errored;
                    debug!(argument = %detail.name, state = ?detail.state, "loads hook failed");
                    return CoercionOutcome::Ready(Err(from_resolver_error(error)));
                }
            };

            match object {
                MaybeLazy::Ready(object) if deferred.is_empty() => {
                    match authorize_loaded(schema, type_name, &object, context) {
                        MaybeLazy::Ready(true) => {
                            arguments.loaded.insert(definition.name.clone(), object);
                        }
                        MaybeLazy::Ready(false) => {
                            return CoercionOutcome::Ready(Err(unauthorized(type_name.clone())));
                        }
                        authorization @ MaybeLazy::Lazy(_) => deferred.push(DeferredLoad {
                            name: definition.name.clone(),
                            type_name: type_name.clone(),
                            object: MaybeLazy::Ready(object),
                            authorization: Some(authorization),
                        }),
                    }
                }
                object => deferred.push(DeferredLoad {
                    name: definition.name.clone(),
                    type_name: type_name.clone(),
                    object,
                    authorization: None,
                }),
            }
        }

        detail.state = ArgumentState::Finished;
        arguments.values.insert(definition.name.clone(), prepared);
        arguments.details.insert(definition.name.clone(), detail);
    }

    if deferred.is_empty() {
        return CoercionOutcome::Ready(Ok(Arc::new(arguments)));
    }

    let schema = schema.clone();
    let context = context.clone();
    CoercionOutcome::Pending(
        async move {
            for load in deferred {
                let object = match load.object {
                    MaybeLazy::Ready(object) => object,
                    MaybeLazy::Lazy(lazy) => lazy.resolve().await.map_err(from_resolver_error)?,
                };

                let authorization = match load.authorization {
                    Some(authorization) => authorization,
                    None => authorize_loaded(&schema, &load.type_name, &object, &context),
                };
                let allowed = match authorization {
                    MaybeLazy::Ready(allowed) => allowed,
                    MaybeLazy::Lazy(lazy) => resolve_lazy(lazy).await?,
                };

                if !allowed {
                    return Err(unauthorized(load.type_name));
                }
                arguments.loaded.insert(load.name, object);
            }
            Ok(Arc::new(arguments))
        }
        .boxed(),
    )
}

async fn resolve_lazy<T: Send + 'static>(lazy: Lazy<T>) -> Result<T, ArgumentError> {
    lazy.resolve().await.map_err(from_resolver_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumType, FieldDefinition, ObjectType, SchemaBuilder};

    fn schema() -> Arc<Schema> {
        Arc::new(
            SchemaBuilder::new("Query")
                .register(ObjectType::new("Query").field(FieldDefinition::new("x", "Int")))
                .register(EnumType::new("Color", ["RED", "GREEN"]))
                .register(
                    InputObjectType::new("Filter")
                        .field(InputValueDefinition::new("color", "Color!"))
                        .field(
                            InputValueDefinition::new("limit", "Int")
                                .default_value(ConstValue::Number(10.into())),
                        ),
                )
                .finish()
                .unwrap(),
        )
    }

    fn json(value: serde_json::Value) -> ConstValue {
        ConstValue::from_json(value).unwrap()
    }

    #[test]
    fn coerces_nested_input_objects() {
        let schema = schema();
        let ty = TypeRef::parse("[Filter!]");

        let coerced = coerce_input_value(&schema, &ty, Some(json(serde_json::json!({ "color": "RED" })))).unwrap();

        assert_eq!(
            coerced.unwrap().into_json().unwrap(),
            serde_json::json!([{ "color": "RED", "limit": 10 }])
        );
    }

    #[test]
    fn rejects_invalid_input() {
        let schema = schema();

        assert!(coerce_input_value(&schema, &TypeRef::parse("Int!"), None).is_err());
        assert!(
            coerce_input_value(&schema, &TypeRef::parse("Color"), Some(json(serde_json::json!("BLUE"))))
                .is_err()
        );
        assert!(
            coerce_input_value(
                &schema,
                &TypeRef::parse("Filter"),
                Some(json(serde_json::json!({ "color": "RED", "extra": 1 })))
            )
            .is_err()
        );
        assert_eq!(
            coerce_input_value(&schema, &TypeRef::parse("Int"), None),
            Ok(None)
        );
    }

    #[test]
    fn records_argument_details() {
        let schema = schema();
        let context = Arc::new(QueryContext::for_tests());
        let definitions = IndexMap::from([
            (
                Name::new("first"),
                InputValueDefinition::new("first", "Int").default_value(ConstValue::Number(5.into())),
            ),
            (
                Name::new("name"),
                InputValueDefinition::new("name", "String").prepare(|value, _| match value {
                    ConstValue::String(s) => Ok(ConstValue::String(s.to_uppercase())),
                    other => Ok(other),
                }),
            ),
            (Name::new("absent"), InputValueDefinition::new("absent", "Int")),
        ]);
        let raw = IndexMap::from([(Name::new("name"), ConstValue::String("ada".into()))]);

        let CoercionOutcome::Ready(Ok(arguments)) =
            coerce_arguments(&schema, "Query.x", &definitions, raw, &context)
        else {
            panic!("expected synchronous success");
        };

        assert_eq!(arguments.get("first"), Some(&ConstValue::Number(5.into())));
        assert_eq!(arguments.get("name"), Some(&ConstValue::String("ADA".into())));
        assert!(arguments.get("absent").is_none());

        let first = &arguments.details()["first"];
        assert!(first.default_used());
        assert_eq!(first.original_value(), None);
        assert_eq!(first.state(), ArgumentState::Finished);

        let name = &arguments.details()["name"];
        assert!(!name.default_used());
        assert_eq!(name.original_value(), Some(&ConstValue::String("ada".into())));
    }

    #[test]
    fn invalid_argument_is_an_execution_error() {
        let schema = schema();
        let context = Arc::new(QueryContext::for_tests());
        let definitions = IndexMap::from([(
            Name::new("n"),
            InputValueDefinition::new("n", "Int!"),
        )]);

        let CoercionOutcome::Ready(Err(ArgumentError::Execution(error))) =
            coerce_arguments(&schema, "Query.x", &definitions, IndexMap::new(), &context)
        else {
            panic!("expected an execution error");
        };

        assert_eq!(
            error.message,
            "Argument 'n' on Query.x has an invalid value: Expected value of type \"Int!\", found null"
        );
    }
}
