// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Writing a resolved value into the result tree.
//!
//! [`continue_value`] deals with the values that end resolution at this position (nulls,
//! errors, authorization failures, skips, raw output). Whatever is left goes through
//! [`continue_field`], which dispatches on the declared type.

use async_graphql_value::ConstValue;
use tracing::trace;

use crate::{
    error::{ExecutionError, ExecutorError, PathSegment, format_path},
    lazy::Lazy,
    result::ResultId,
    schema::{MetaType, TypeRef},
    value::{AppValue, ResolvedValue},
};

use super::{ListItemStep, ObjectStep, Position, Runtime};

pub(crate) enum Continuation {
    Continue(ResolvedValue),
    Halt,
}

/// Write `value` at `position`, or hand back the lazy it is waiting on.
pub(crate) fn complete<'a>(
    rt: &mut Runtime<'a>,
    value: ResolvedValue,
    position: &Position<'a>,
) -> Result<Option<Lazy>, ExecutorError> {
    if let ResolvedValue::Lazy(lazy) = value {
        return Ok(Some(lazy));
    }
    match continue_value(rt, value, position)? {
        Continuation::Halt => Ok(None),
        Continuation::Continue(ResolvedValue::Lazy(lazy)) => Ok(Some(lazy)),
        Continuation::Continue(value) => continue_field(rt, value, position).map(|_| None),
    }
}

pub(crate) fn continue_value<'a>(
    rt: &mut Runtime<'a>,
    value: ResolvedValue,
    position: &Position<'a>,
) -> Result<Continuation, ExecutorError> {
    let Position { parent, key, .. } = position;
    let is_non_null = position.is_non_null();

    if rt.tree.is_dead(*parent) {
        trace!(%key, "position is under a dead subtree");
        return Ok(Continuation::Halt);
    }

    match value {
        ResolvedValue::Value(ConstValue::Null) => {
            if is_non_null {
                let error = invalid_null(rt, position);
                rt.errors.push(error);
            }
            rt.tree.set_leaf(*parent, key, ConstValue::Null, is_non_null);
            Ok(Continuation::Halt)
        }
        ResolvedValue::Error(error) => {
            push_error(rt, error, position, None);
            rt.tree.set_leaf(*parent, key, ConstValue::Null, is_non_null);
            Ok(Continuation::Halt)
        }
        ResolvedValue::Unauthorized(error) => {
            let replacement = rt
                .schema
                .unauthorized(&error, &rt.context)
                .unwrap_or_else(ResolvedValue::Error);
            continue_value(rt, replacement, position)
        }
        ResolvedValue::Skip => {
            rt.tree.skip(*parent, key);
            Ok(Continuation::Halt)
        }
        ResolvedValue::List(items)
            if !items.is_empty()
                && items
                    .iter()
                    .all(|item| matches!(item, ResolvedValue::Error(_))) =>
        {
            let errors = items.into_iter().filter_map(|item| match item {
                ResolvedValue::Error(error) => Some(error),
                _ => None,
            });

            match position.ty.nullable() {
                TypeRef::List(item_ty) => {
                    let errors: Vec<_> = errors.collect();
                    let list = rt.tree.new_list(*parent, key.clone(), errors.len(), is_non_null);
                    for (index, error) in errors.into_iter().enumerate() {
                        let key = PathSegment::Index(index);
                        push_error(rt, error, position, Some((list, &key)));
                        rt.tree
                            .set_leaf(list, &key, ConstValue::Null, item_ty.is_non_null());
                    }
                }
                _ => {
                    for error in errors {
                        push_error(rt, error, position, None);
                    }
                    rt.tree.set_leaf(*parent, key, ConstValue::Null, is_non_null);
                }
            }
            Ok(Continuation::Halt)
        }
        ResolvedValue::Raw(value) => {
            rt.tree.set_leaf(*parent, key, value, false);
            Ok(Continuation::Halt)
        }
        value => Ok(Continuation::Continue(value)),
    }
}

/// Dispatch a non-null, non-error value on the declared type of its position.
pub(crate) fn continue_field<'a>(
    rt: &mut Runtime<'a>,
    value: ResolvedValue,
    position: &Position<'a>,
) -> Result<(), ExecutorError> {
    let is_non_null = position.is_non_null();

    match position.ty.nullable() {
        TypeRef::List(item_ty) => {
            let items = match value {
                ResolvedValue::List(items) => items,
                ResolvedValue::Value(ConstValue::List(items)) => {
                    items.into_iter().map(ResolvedValue::Value).collect()
                }
                other => {
                    return Err(ExecutorError::ListExpected {
                        path: format_path(&position.path(&rt.tree)),
                        found: other.describe().to_string(),
                    });
                }
            };

            let list = rt
                .tree
                .new_list(position.parent, position.key.clone(), items.len(), is_non_null);
            for (index, item) in items.into_iter().enumerate() {
                let item_position = Position {
                    parent: list,
                    key: PathSegment::Index(index),
                    ty: item_ty,
                    frame: position.frame.clone(),
                };
                rt.enqueue(ListItemStep::new(item_position, item));
            }
            Ok(())
        }
        TypeRef::Named(name) => {
            let schema = rt.schema;
            match schema.type_by_name(name) {
                Some(MetaType::Scalar(scalar)) => {
                    let coerced = leaf_value(value, name.as_str())
                        .and_then(|value| (scalar.coerce_result)(&value));
                    write_leaf(rt, coerced, position)
                }
                Some(MetaType::Enum(enum_type)) => {
                    let coerced = leaf_value(value, name.as_str())
                        .and_then(|value| enum_type.coerce(&value));
                    write_leaf(rt, coerced, position)
                }
                Some(meta @ (MetaType::Object(_) | MetaType::Interface(_) | MetaType::Union(_))) => {
                    let value = match value {
                        ResolvedValue::Object(object) => AppValue::Object(object),
                        ResolvedValue::Value(data) => AppValue::Data(data),
                        other => {
                            return Err(ExecutorError::Invariant(format!(
                                "cannot build {name} from {}",
                                other.describe()
                            )));
                        }
                    };
                    rt.enqueue(ObjectStep::child(position.clone(), meta, value));
                    Ok(())
                }
                Some(MetaType::InputObject(_)) => Err(ExecutorError::Invariant(format!(
                    "input type {name} used as an output type"
                ))),
                None => Err(ExecutorError::UnknownType(name.clone())),
            }
        }
        TypeRef::NonNull(_) => Err(ExecutorError::Invariant(format!(
            "doubly non-null type {}",
            position.ty
        ))),
    }
}

fn leaf_value(value: ResolvedValue, type_name: &str) -> Result<ConstValue, String> {
    match value {
        ResolvedValue::Value(value) => Ok(value),
        other => Err(format!("{type_name} cannot represent {}", other.describe())),
    }
}

fn write_leaf<'a>(
    rt: &mut Runtime<'a>,
    coerced: Result<ConstValue, String>,
    position: &Position<'a>,
) -> Result<(), ExecutorError> {
    match coerced {
        Ok(ConstValue::Null) => {
            continue_value(rt, ResolvedValue::null(), position).map(|_| ())
        }
        Ok(value) => {
            rt.tree
                .set_leaf(position.parent, &position.key, value, position.is_non_null());
            Ok(())
        }
        Err(message) => continue_value(
            rt,
            ResolvedValue::Error(ExecutionError::new(message)),
            position,
        )
        .map(|_| ()),
    }
}

/// Record an error raised at `position`, or at `item` of a list allocated there.
fn push_error(
    rt: &mut Runtime<'_>,
    mut error: ExecutionError,
    position: &Position<'_>,
    item: Option<(ResultId, &PathSegment)>,
) {
    let tree = &rt.tree;
    error.attach(
        || match item {
            Some((list, key)) => tree.path_to(list, key),
            None => position.path(tree),
        },
        position.frame.ast_node.pos,
    );
    rt.errors.push(error);
}

fn invalid_null(rt: &Runtime<'_>, position: &Position<'_>) -> ExecutionError {
    let frame = &position.frame;
    let message = match position.key {
        PathSegment::Index(_) => format!(
            "Cannot return null for non-nullable element of type '{}' for {}.{}",
            position.ty,
            frame.owner_type.name(),
            frame.field.name()
        ),
        PathSegment::Field(_) => format!(
            "Cannot return null for non-nullable field {}.{}",
            frame.owner_type.name(),
            frame.field.name()
        ),
    };
    let mut error = ExecutionError::new(message);
    error.attach(|| position.path(&rt.tree), frame.ast_node.pos);
    error
}
