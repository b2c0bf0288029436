// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Deferred values.
//!
//! A [`Lazy`] is a pending computation the runtime parks until the scheduler gets around to
//! the depth it belongs to. Resolving a `Lazy<ResolvedValue>` may produce another lazy; the
//! runtime keeps parking until a concrete value comes out.

use std::{fmt, future::Future};

use futures::{FutureExt, future::BoxFuture};

use crate::{error::ResolverError, value::ResolvedValue};

pub struct Lazy<T = ResolvedValue> {
    future: BoxFuture<'static, Result<T, ResolverError>>,
}

impl<T: Send + 'static> Lazy<T> {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, ResolverError>> + Send + 'static,
    {
        Lazy {
            future: future.boxed(),
        }
    }

    pub fn ready(value: Result<T, ResolverError>) -> Self {
        Lazy::new(futures::future::ready(value))
    }

    pub fn map<U, F>(self, f: F) -> Lazy<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Lazy::new(self.future.map(|result| result.map(f)))
    }

    pub fn and_then<U, F>(self, f: F) -> Lazy<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, ResolverError> + Send + 'static,
    {
        Lazy::new(self.future.map(|result| result.and_then(f)))
    }

    /// Resolve one level. For `Lazy<ResolvedValue>` the result may itself be lazy.
    pub async fn resolve(self) -> Result<T, ResolverError> {
        self.future.await
    }

    pub(crate) fn into_future(self) -> BoxFuture<'static, Result<T, ResolverError>> {
        self.future
    }
}

impl<T> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Lazy(..)")
    }
}

/// The outcome of a hook that may answer immediately or later.
#[derive(Debug)]
pub enum MaybeLazy<T> {
    Ready(T),
    Lazy(Lazy<T>),
}

impl<T> From<T> for MaybeLazy<T> {
    fn from(value: T) -> Self {
        MaybeLazy::Ready(value)
    }
}
