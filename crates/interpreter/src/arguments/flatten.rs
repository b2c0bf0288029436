// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use async_graphql_parser::Positioned;
use async_graphql_value::{ConstValue, Name, Value};
use indexmap::IndexMap;

/// Substitute variables into an AST value.
///
/// Returns `None` when the value is a variable the caller never bound, which the caller
/// must treat exactly like an omitted argument. Unbound variables nested in objects drop
/// the field; in lists they become `null`.
pub(crate) fn flatten_value(
    value: &Value,
    variables: &IndexMap<Name, ConstValue>,
) -> Option<ConstValue> {
    let flattened = match value {
        Value::Variable(name) => return variables.get(name).cloned(),
        Value::Null => ConstValue::Null,
        Value::Number(n) => ConstValue::Number(n.clone()),
        Value::String(s) => ConstValue::String(s.clone()),
        Value::Boolean(b) => ConstValue::Boolean(*b),
        Value::Binary(bytes) => ConstValue::Binary(bytes.clone()),
        Value::Enum(name) => ConstValue::Enum(name.clone()),
        Value::List(items) => ConstValue::List(
            items
                .iter()
                .map(|item| flatten_value(item, variables).unwrap_or(ConstValue::Null))
                .collect(),
        ),
        Value::Object(fields) => ConstValue::Object(
            fields
                .iter()
                .filter_map(|(name, value)| {
                    flatten_value(value, variables).map(|value| (name.clone(), value))
                })
                .collect::<async_graphql_value::indexmap::IndexMap<_, _>>(),
        ),
    };
    Some(flattened)
}

/// Flatten an AST argument list. Arguments whose value is an unbound variable are absent
/// from the result.
pub(crate) fn flatten_arguments(
    arguments: &[(Positioned<Name>, Positioned<Value>)],
    variables: &IndexMap<Name, ConstValue>,
) -> IndexMap<Name, ConstValue> {
    arguments
        .iter()
        .filter_map(|(name, value)| {
            flatten_value(&value.node, variables).map(|value| (name.node.clone(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variables() -> IndexMap<Name, ConstValue> {
        IndexMap::from([(Name::new("bound"), ConstValue::Number(3.into()))])
    }

    #[test]
    fn substitutes_nested_variables() {
        let value = ConstValue::from_json(serde_json::json!({
            "list": [1, 2],
            "nested": { "x": "y" }
        }))
        .unwrap()
        .into_value();
        let Value::Object(mut fields) = value else {
            panic!("expected object")
        };
        fields.insert(Name::new("bound"), Value::Variable(Name::new("bound")));
        fields.insert(Name::new("unbound"), Value::Variable(Name::new("unbound")));
        let value = Value::Object(fields);

        let flattened = flatten_value(&value, &variables()).unwrap();

        assert_eq!(
            flattened.into_json().unwrap(),
            serde_json::json!({
                "list": [1, 2],
                "nested": { "x": "y" },
                "bound": 3
            })
        );
    }

    #[test]
    fn unbound_variables_are_no_value() {
        let unbound = Value::Variable(Name::new("unbound"));
        assert_eq!(flatten_value(&unbound, &variables()), None);

        let list = Value::List(vec![Value::Variable(Name::new("unbound"))]);
        assert_eq!(
            flatten_value(&list, &variables()),
            Some(ConstValue::List(vec![ConstValue::Null]))
        );
    }
}
