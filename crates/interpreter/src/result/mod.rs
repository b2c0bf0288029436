// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The in-progress response.
//!
//! Nodes live in an arena and refer to their parent by handle. Writes may arrive in any
//! order; object nodes remember the order their keys were gathered in and serialize in that
//! order. Once a null has bubbled through a node it is dead and ignores further writes, as
//! does everything below it.

mod serialize;

use std::{collections::BTreeSet, sync::Arc};

use async_graphql_value::{ConstValue, Name};
use indexmap::IndexMap;
use tracing::trace;
use typed_generational_arena::{Arena, IgnoreGeneration, Index};

use crate::{error::PathSegment, value::AppValue};

pub(crate) type ResultArena = Arena<ResultNode, usize, IgnoreGeneration>;
pub(crate) type ResultId = Index<ResultNode, usize, IgnoreGeneration>;

#[derive(Debug, Clone)]
pub(crate) enum ResultEntry {
    Leaf(ConstValue),
    Node(ResultId),
}

#[derive(Debug)]
pub(crate) enum ResultData {
    Object {
        entries: IndexMap<Name, ResultEntry>,
        ordered_keys: Vec<Name>,
    },
    List {
        items: Vec<Option<ResultEntry>>,
        skipped: BTreeSet<usize>,
    },
}

#[derive(Debug)]
pub(crate) struct ResultNode {
    pub(crate) data: ResultData,
    pub(crate) value: Option<Arc<AppValue>>,
    pub(crate) parent: Option<(ResultId, PathSegment)>,
    pub(crate) is_non_null_in_parent: bool,
    pub(crate) dead: bool,
    pub(crate) depth: usize,
    pub(crate) children: Vec<ResultId>,
}

pub(crate) struct ResultTree {
    nodes: ResultArena,
    root: ResultId,
    data_is_null: bool,
}

impl ResultTree {
    pub(crate) fn new(root_value: Arc<AppValue>) -> Self {
        let mut nodes = ResultArena::new();
        let root = nodes.insert(ResultNode {
            data: ResultData::Object {
                entries: IndexMap::new(),
                ordered_keys: vec![],
            },
            value: Some(root_value),
            parent: None,
            is_non_null_in_parent: true,
            dead: false,
            depth: 0,
            children: vec![],
        });

        Self {
            nodes,
            root,
            data_is_null: false,
        }
    }

    pub(crate) fn root(&self) -> ResultId {
        self.root
    }

    #[cfg(test)]
    pub(crate) fn node(&self, id: ResultId) -> &ResultNode {
        &self.nodes[id]
    }

    pub(crate) fn is_dead(&self, id: ResultId) -> bool {
        self.nodes[id].dead
    }

    pub(crate) fn depth(&self, id: ResultId) -> usize {
        self.nodes[id].depth
    }

    #[cfg(test)]
    pub(crate) fn data_is_null(&self) -> bool {
        self.data_is_null
    }

    /// Allocate an object node at `key` under `parent` and link it in.
    pub(crate) fn new_object(
        &mut self,
        parent: ResultId,
        key: PathSegment,
        value: Arc<AppValue>,
        is_non_null_in_parent: bool,
    ) -> ResultId {
        let data = ResultData::Object {
            entries: IndexMap::new(),
            ordered_keys: vec![],
        };
        self.new_child(parent, key, data, Some(value), is_non_null_in_parent)
    }

    /// Allocate a list node with room for `len` items at `key` under `parent`.
    pub(crate) fn new_list(
        &mut self,
        parent: ResultId,
        key: PathSegment,
        len: usize,
        is_non_null_in_parent: bool,
    ) -> ResultId {
        let data = ResultData::List {
            items: vec![None; len],
            skipped: BTreeSet::new(),
        };
        self.new_child(parent, key, data, None, is_non_null_in_parent)
    }

    fn new_child(
        &mut self,
        parent: ResultId,
        key: PathSegment,
        data: ResultData,
        value: Option<Arc<AppValue>>,
        is_non_null_in_parent: bool,
    ) -> ResultId {
        let parent_node = &self.nodes[parent];
        let dead = parent_node.dead;
        let depth = parent_node.depth + 1;

        let id = self.nodes.insert(ResultNode {
            data,
            value,
            parent: Some((parent, key.clone())),
            is_non_null_in_parent,
            dead,
            depth,
            children: vec![],
        });
        self.nodes[parent].children.push(id);
        self.write(parent, &key, ResultEntry::Node(id));
        id
    }

    /// Record the keys gathered for an object node, in response order.
    pub(crate) fn set_ordered_keys(&mut self, id: ResultId, keys: Vec<Name>) {
        if let ResultData::Object { ordered_keys, .. } = &mut self.nodes[id].data {
            *ordered_keys = keys;
        }
    }

    pub(crate) fn set_leaf(
        &mut self,
        id: ResultId,
        key: &PathSegment,
        value: ConstValue,
        is_non_null: bool,
    ) {
        self.set_result(id, key, ResultEntry::Leaf(value), is_non_null);
    }

    /// Write `entry` at `key` of node `id`.
    ///
    /// A null at a non-null position is not written; it replaces the whole node in its own
    /// parent instead, recursively, and the node dies. A null reaching the root nulls the
    /// entire `data`.
    pub(crate) fn set_result(
        &mut self,
        id: ResultId,
        key: &PathSegment,
        entry: ResultEntry,
        is_non_null: bool,
    ) {
        if self.nodes[id].dead {
            return;
        }

        let is_null = matches!(entry, ResultEntry::Leaf(ConstValue::Null));
        if !(is_null && is_non_null) {
            self.write(id, key, entry);
            return;
        }

        match self.nodes[id].parent.clone() {
            Some((parent, key_in_parent)) => {
                trace!(%key, parent_key = %key_in_parent, "null bubbles up");
                let non_null_in_parent = self.nodes[id].is_non_null_in_parent;
                self.set_result(
                    parent,
                    &key_in_parent,
                    ResultEntry::Leaf(ConstValue::Null),
                    non_null_in_parent,
                );
                self.kill(id);
            }
            None => {
                trace!(%key, "null reached the root");
                self.data_is_null = true;
                self.kill(id);
            }
        }
    }

    /// Null the entire `data` member.
    pub(crate) fn null_data(&mut self) {
        self.data_is_null = true;
        self.kill(self.root);
    }

    /// Omit `key` from node `id`.
    pub(crate) fn skip(&mut self, id: ResultId, key: &PathSegment) {
        let node = &mut self.nodes[id];
        if node.dead {
            return;
        }
        match (&mut node.data, key) {
            (ResultData::Object { entries, .. }, PathSegment::Field(name)) => {
                entries.shift_remove(name);
            }
            (ResultData::List { skipped, .. }, PathSegment::Index(index)) => {
                skipped.insert(*index);
            }
            _ => {}
        }
    }

    fn write(&mut self, id: ResultId, key: &PathSegment, entry: ResultEntry) {
        match (&mut self.nodes[id].data, key) {
            (ResultData::Object { entries, .. }, PathSegment::Field(name)) => {
                entries.insert(name.clone(), entry);
            }
            (ResultData::List { items, .. }, PathSegment::Index(index)) => {
                if let Some(slot) = items.get_mut(*index) {
                    *slot = Some(entry);
                }
            }
            _ => {}
        }
    }

    /// Mark `id` and everything registered below it dead.
    fn kill(&mut self, id: ResultId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current];
            if node.dead && current != id {
                continue;
            }
            node.dead = true;
            stack.extend(node.children.iter().copied());
        }
    }

    pub(crate) fn path(&self, id: ResultId) -> Vec<PathSegment> {
        let mut path = vec![];
        let mut current = id;
        while let Some((parent, key)) = &self.nodes[current].parent {
            path.push(key.clone());
            current = *parent;
        }
        path.reverse();
        path
    }

    pub(crate) fn path_to(&self, id: ResultId, key: &PathSegment) -> Vec<PathSegment> {
        let mut path = self.path(id);
        path.push(key.clone());
        path
    }

    /// The application value of the nearest object node strictly above `id`.
    pub(crate) fn parent_value(&self, id: ResultId) -> Option<&Arc<AppValue>> {
        let mut current = self.nodes[id].parent.as_ref().map(|(parent, _)| *parent);
        while let Some(candidate) = current {
            let node = &self.nodes[candidate];
            if let Some(value) = &node.value {
                return Some(value);
            }
            current = node.parent.as_ref().map(|(parent, _)| *parent);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> ResultTree {
        ResultTree::new(Arc::new(AppValue::null()))
    }

    fn int(i: i32) -> ConstValue {
        ConstValue::Number(i.into())
    }

    #[test]
    fn null_bubbles_to_nearest_nullable_ancestor() {
        let mut tree = tree();
        let root = tree.root();
        tree.set_ordered_keys(root, vec![Name::new("a"), Name::new("other")]);
        // a: A (nullable) { b: B! { c: Int! } }
        let a = tree.new_object(root, "a".into(), Arc::new(AppValue::null()), false);
        let b = tree.new_object(a, "b".into(), Arc::new(AppValue::null()), true);
        tree.set_leaf(root, &"other".into(), int(1), false);

        tree.set_leaf(b, &"c".into(), ConstValue::Null, true);

        assert!(tree.is_dead(a));
        assert!(tree.is_dead(b));
        assert!(!tree.is_dead(root));
        assert!(!tree.data_is_null());
        assert_eq!(
            tree.to_json(),
            serde_json::json!({ "a": null, "other": 1 })
        );

        // Writes into the dead subtree are dropped
        tree.set_leaf(b, &"late".into(), int(2), false);
        assert!(matches!(
            &tree.node(b).data,
            ResultData::Object { entries, .. } if entries.is_empty()
        ));
    }

    #[test]
    fn null_reaching_the_root_nulls_data() {
        let mut tree = tree();
        let root = tree.root();
        let a = tree.new_object(root, "a".into(), Arc::new(AppValue::null()), true);

        tree.set_leaf(a, &"b".into(), ConstValue::Null, true);

        assert!(tree.data_is_null());
        assert_eq!(tree.to_json(), serde_json::Value::Null);
    }

    #[test]
    fn children_of_dead_nodes_are_born_dead() {
        let mut tree = tree();
        let root = tree.root();
        let a = tree.new_object(root, "a".into(), Arc::new(AppValue::null()), false);
        tree.set_leaf(a, &"b".into(), ConstValue::Null, true);

        let late = tree.new_list(a, "items".into(), 2, false);

        assert!(tree.is_dead(late));
        assert_eq!(tree.depth(late), 2);
        assert_eq!(tree.path_to(late, &1.into()), vec!["a".into(), "items".into(), 1.into()]);
    }

    #[test]
    fn output_follows_gathered_order_and_skips() {
        let mut tree = tree();
        let root = tree.root();
        tree.set_ordered_keys(
            root,
            vec![Name::new("first"), Name::new("second"), Name::new("gone")],
        );
        let list = tree.new_list(root, "second".into(), 3, false);
        tree.set_leaf(list, &2.into(), int(3), false);
        tree.set_leaf(list, &0.into(), int(1), false);
        tree.skip(list, &1.into());
        tree.set_leaf(root, &"gone".into(), int(0), false);
        tree.skip(root, &"gone".into());
        tree.set_leaf(root, &"first".into(), ConstValue::String("x".into()), false);

        assert_eq!(
            serde_json::to_string(&tree.to_json()).unwrap(),
            r#"{"first":"x","second":[1,3]}"#
        );
    }
}
