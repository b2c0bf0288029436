// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use futures::{FutureExt, future::BoxFuture};

use crate::{
    error::ExecutorError,
    value::{FieldResult, ResolvedValue},
};

use super::{
    Parked, Position, Resumption, Runtime, StepOutcome, argument_failure,
    continuation::complete,
    directives::{CursorOutcome, DirectiveCursor, DirectiveHook},
    unexpected_resumption,
};

enum ItemState<'a> {
    CheckDirectives(Option<DirectiveCursor<'a>>),
    CheckLazyItem(FieldResult),
    AwaitingItem,
    HandleItem(ResolvedValue),
    Done,
}

/// Resolves one item of a list. Arguments come from the list field; only the
/// `resolve_each` hooks of its directives run here.
pub(crate) struct ListItemStep<'a> {
    position: Position<'a>,
    item: Option<ResolvedValue>,
    state: ItemState<'a>,
}

impl<'a> ListItemStep<'a> {
    pub(crate) fn new(position: Position<'a>, item: ResolvedValue) -> Self {
        Self {
            position,
            item: Some(item),
            state: ItemState::CheckDirectives(None),
        }
    }

    fn park(
        mut self,
        rt: &Runtime<'a>,
        state: ItemState<'a>,
        future: BoxFuture<'static, Resumption>,
    ) -> StepOutcome<'a> {
        self.state = state;
        let depth = rt.tree.depth(self.position.parent) + 1;
        Parked::new(self, depth, future)
    }

    pub(crate) fn run(mut self, rt: &mut Runtime<'a>) -> Result<StepOutcome<'a>, ExecutorError> {
        loop {
            if rt.tree.is_dead(self.position.parent) {
                return Ok(StepOutcome::Finished);
            }

            match std::mem::replace(&mut self.state, ItemState::Done) {
                ItemState::CheckDirectives(cursor) => {
                    let mut cursor = cursor.unwrap_or_else(|| {
                        DirectiveCursor::new(
                            rt,
                            &self.position.frame.directives,
                            DirectiveHook::ResolveEach,
                        )
                    });
                    let path = self.position.path(&rt.tree);
                    let object = self.position.frame.object.clone();
                    match cursor.advance(rt, &object, &path)? {
                        CursorOutcome::Continue => {
                            let item = self.item.take().unwrap_or_else(ResolvedValue::null);
                            self.state = ItemState::CheckLazyItem(Ok(item));
                        }
                        CursorOutcome::Skip => {
                            rt.tree.skip(self.position.parent, &self.position.key);
                            return Ok(StepOutcome::Finished);
                        }
                        CursorOutcome::Failed(error) => {
                            self.state = ItemState::CheckLazyItem(Err(error));
                        }
                        CursorOutcome::ArgumentsFailed(error) => {
                            self.state = ItemState::CheckLazyItem(argument_failure(error));
                        }
                        CursorOutcome::Park(future) => {
                            return Ok(self.park(rt, ItemState::CheckDirectives(Some(cursor)), future));
                        }
                    }
                }
                ItemState::CheckLazyItem(result) => {
                    let value = rt.settle(result, || self.position.path(&rt.tree))?;
                    self.state = match value {
                        ResolvedValue::Lazy(lazy) => {
                            let future = lazy.into_future().map(Resumption::Value).boxed();
                            return Ok(self.park(rt, ItemState::AwaitingItem, future));
                        }
                        value => ItemState::HandleItem(value),
                    };
                }
                ItemState::HandleItem(value) => match complete(rt, value, &self.position)? {
                    None => return Ok(StepOutcome::Finished),
                    Some(lazy) => {
                        let future = lazy.into_future().map(Resumption::Value).boxed();
                        return Ok(self.park(rt, ItemState::AwaitingItem, future));
                    }
                },
                ItemState::AwaitingItem | ItemState::Done => {
                    return Err(ExecutorError::Invariant(
                        "list item step ran while parked".to_string(),
                    ));
                }
            }
        }
    }

    pub(crate) fn resume(mut self, resumption: Resumption) -> Result<Self, ExecutorError> {
        let state = std::mem::replace(&mut self.state, ItemState::Done);
        self.state = match (state, resumption) {
            (ItemState::CheckDirectives(Some(mut cursor)), resumption) => {
                cursor.resume(resumption)?;
                ItemState::CheckDirectives(Some(cursor))
            }
            (ItemState::AwaitingItem, Resumption::Value(result)) => ItemState::CheckLazyItem(result),
            (_, other) => return Err(unexpected_resumption("list item step", &other)),
        };
        Ok(self)
    }
}
