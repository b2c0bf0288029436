// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use tracing::trace;

use super::{ArgumentsResult, coercion::CoercionOutcome};

/// Identity of an argument bag: the AST node carrying the arguments, the owner defining
/// them (a field or directive definition) and, unless the owner's arguments can be coerced
/// without looking at it, the parent object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ArgumentsKey {
    node: usize,
    owner: usize,
    parent: Option<usize>,
}

impl ArgumentsKey {
    pub(crate) fn new<N, O>(node: &N, owner: &O, parent: Option<usize>) -> Self {
        Self {
            node: node as *const N as usize,
            owner: owner as *const O as usize,
            parent,
        }
    }
}

enum Slot {
    Ready(ArgumentsResult),
    Pending(Shared<BoxFuture<'static, ArgumentsResult>>),
}

pub(crate) enum ArgumentsLookup {
    Ready(ArgumentsResult),
    Pending(BoxFuture<'static, ArgumentsResult>),
}

/// Per-query cache of coerced arguments.
///
/// Every requester of a pending slot waits on the same shared future, so the coercion
/// routine runs at most once per key no matter how many steps ask for it.
#[derive(Default)]
pub(crate) struct ArgumentsCache {
    slots: HashMap<ArgumentsKey, Slot>,
    coercions: usize,
}

impl ArgumentsCache {
    pub(crate) fn dataload_for(
        &mut self,
        key: ArgumentsKey,
        coerce: impl FnOnce() -> CoercionOutcome,
    ) -> ArgumentsLookup {
        match self.slots.get(&key) {
            Some(Slot::Ready(result)) => return ArgumentsLookup::Ready(result.clone()),
            Some(Slot::Pending(shared)) => return ArgumentsLookup::Pending(shared.clone().boxed()),
            None => {}
        }

        self.coercions += 1;
        trace!(?key, coercions = self.coercions, "coercing arguments");

        match coerce() {
            CoercionOutcome::Ready(result) => {
                self.slots.insert(key, Slot::Ready(result.clone()));
                ArgumentsLookup::Ready(result)
            }
            CoercionOutcome::Pending(future) => {
                let shared = future.shared();
                self.slots.insert(key, Slot::Pending(shared.clone()));
                ArgumentsLookup::Pending(shared.boxed())
            }
        }
    }

    /// Replace a pending slot with its outcome.
    pub(crate) fn store(&mut self, key: ArgumentsKey, result: &ArgumentsResult) {
        if let Some(slot @ Slot::Pending(_)) = self.slots.get_mut(&key) {
            *slot = Slot::Ready(result.clone());
        }
    }

    /// How many times a coercion routine was started.
    #[cfg(test)]
    pub(crate) fn coercions(&self) -> usize {
        self.coercions
    }
}
