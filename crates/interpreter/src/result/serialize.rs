// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use async_graphql_value::ConstValue;
use serde_json::{Map, Value};

use super::{ResultData, ResultEntry, ResultId, ResultTree};

impl ResultTree {
    /// The `data` member of the response.
    pub(crate) fn to_json(&self) -> Value {
        if self.data_is_null {
            return Value::Null;
        }
        self.node_to_json(self.root)
    }

    fn node_to_json(&self, id: ResultId) -> Value {
        match &self.nodes[id].data {
            ResultData::Object {
                entries,
                ordered_keys,
            } => {
                let mut map = Map::new();
                if ordered_keys.is_empty() {
                    for (key, entry) in entries {
                        map.insert(key.to_string(), self.entry_to_json(entry));
                    }
                } else {
                    for key in ordered_keys {
                        if let Some(entry) = entries.get(key) {
                            map.insert(key.to_string(), self.entry_to_json(entry));
                        }
                    }
                }
                Value::Object(map)
            }
            ResultData::List { items, skipped } => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| !skipped.contains(index))
                    .map(|(_, item)| match item {
                        Some(entry) => self.entry_to_json(entry),
                        None => Value::Null,
                    })
                    .collect(),
            ),
        }
    }

    fn entry_to_json(&self, entry: &ResultEntry) -> Value {
        match entry {
            ResultEntry::Leaf(value) => const_to_json(value),
            ResultEntry::Node(id) => self.node_to_json(*id),
        }
    }
}

pub(crate) fn const_to_json(value: &ConstValue) -> Value {
    match value {
        ConstValue::Null => Value::Null,
        ConstValue::Number(n) => Value::Number(n.clone()),
        ConstValue::String(s) => Value::String(s.clone()),
        ConstValue::Boolean(b) => Value::Bool(*b),
        ConstValue::Enum(e) => Value::String(e.to_string()),
        ConstValue::Binary(bytes) => {
            Value::Array(bytes.iter().map(|b| Value::Number((*b).into())).collect())
        }
        ConstValue::List(items) => Value::Array(items.iter().map(const_to_json).collect()),
        ConstValue::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.to_string(), const_to_json(value)))
                .collect(),
        ),
    }
}
