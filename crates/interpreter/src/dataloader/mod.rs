// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Batched loading.
//!
//! Resolvers ask a [`SourceHandle`] for keys and get lazies back. Keys requested before the
//! scheduler gets to the lazies' depth are fetched together with one
//! [`BatchSource::fetch`] call; results are cached for the rest of the query (or multiplex).

mod source;

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::future::join_all;
use tracing::trace;

pub use source::BatchSource;
use source::{PendingSource, SourceState};

use crate::{lazy::Lazy, trace::Tracer};

struct RegisteredSource {
    typed: Arc<dyn Any + Send + Sync>,
    pending: Arc<dyn PendingSource>,
}

pub struct Dataloader {
    sources: Mutex<HashMap<(TypeId, String), RegisteredSource>>,
    tracer: Arc<dyn Tracer>,
}

impl Dataloader {
    pub(crate) fn new(tracer: Arc<dyn Tracer>) -> Self {
        Self {
            sources: Mutex::new(HashMap::new()),
            tracer,
        }
    }

    fn sources(&self) -> MutexGuard<'_, HashMap<(TypeId, String), RegisteredSource>> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The handle for source type `S` under `batch_key`, created with `make` on first use.
    /// Sources of the same type with different batch keys batch separately.
    pub fn source<S: BatchSource>(
        &self,
        batch_key: &str,
        make: impl FnOnce() -> S,
    ) -> SourceHandle<S> {
        let key = (TypeId::of::<S>(), batch_key.to_string());
        let mut sources = self.sources();

        if let Some(state) = sources
            .get(&key)
            .and_then(|source| source.typed.clone().downcast::<SourceState<S>>().ok())
        {
            return SourceHandle { state };
        }

        let state = Arc::new(SourceState::new(make(), self.tracer.clone()));
        sources.insert(
            key,
            RegisteredSource {
                typed: state.clone(),
                pending: state.clone(),
            },
        );
        SourceHandle { state }
    }

    /// Fetch every source that has keys waiting.
    pub(crate) async fn run_pending(&self) {
        let pending: Vec<_> = self
            .sources()
            .values()
            .filter(|source| source.pending.has_pending())
            .map(|source| source.pending.clone())
            .collect();
        if pending.is_empty() {
            return;
        }
        trace!(sources = pending.len(), "flushing pending batch sources");
        join_all(pending.iter().map(|source| source.flush())).await;
    }

    /// Forget every cached result.
    pub(crate) fn clear_cache(&self) {
        for source in self.sources().values() {
            source.pending.clear();
        }
    }
}

pub struct SourceHandle<S: BatchSource> {
    state: Arc<SourceState<S>>,
}

impl<S: BatchSource> SourceHandle<S> {
    pub fn load(&self, key: S::Key) -> Lazy<S::Value> {
        self.state.request(&key);
        Lazy::new(self.state.clone().result_for(key))
    }

    pub fn load_many(&self, keys: Vec<S::Key>) -> Lazy<Vec<S::Value>> {
        for key in &keys {
            self.state.request(key);
        }
        let state = self.state.clone();
        Lazy::new(async move {
            let mut values = Vec::with_capacity(keys.len());
            for key in keys {
                values.push(state.clone().result_for(key).await?);
            }
            Ok(values)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{error::ExecutionError, trace::NoopTracer};

    #[derive(Default)]
    struct Squares {
        batches: Arc<Mutex<Vec<Vec<i64>>>>,
    }

    #[async_trait]
    impl BatchSource for Squares {
        type Key = i64;
        type Value = i64;

        async fn fetch(&self, keys: &[i64]) -> Result<Vec<i64>, ExecutionError> {
            self.batches.lock().unwrap().push(keys.to_vec());
            if keys.contains(&13) {
                return Err(ExecutionError::new("unlucky"));
            }
            Ok(keys.iter().map(|key| key * key).collect())
        }
    }

    #[tokio::test]
    async fn coalesces_and_caches_keys() {
        let dataloader = Dataloader::new(Arc::new(NoopTracer));
        let batches = Arc::new(Mutex::new(vec![]));
        let make = || Squares {
            batches: batches.clone(),
        };

        let lazies = vec![
            dataloader.source("", make).load(2),
            dataloader.source("", make).load(3),
            dataloader.source("", make).load(2),
        ];
        dataloader.run_pending().await;
        let values = join_all(lazies.into_iter().map(Lazy::resolve)).await;
        let values: Vec<_> = values.into_iter().map(Result::unwrap).collect();

        assert_eq!(values, vec![4, 9, 4]);
        assert_eq!(*batches.lock().unwrap(), vec![vec![2, 3]]);

        // Cached: no new fetch
        let again = dataloader.source("", make).load_many(vec![3, 2]);
        assert_eq!(again.resolve().await.unwrap(), vec![9, 4]);
        assert_eq!(batches.lock().unwrap().len(), 1);

        dataloader.clear_cache();
        assert_eq!(dataloader.source("", make).load(3).resolve().await.unwrap(), 9);
        assert_eq!(batches.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn batch_keys_and_failures_are_separate() {
        let dataloader = Dataloader::new(Arc::new(NoopTracer));
        let batches = Arc::new(Mutex::new(vec![]));
        let make = || Squares {
            batches: batches.clone(),
        };

        let failing = dataloader.source("a", make).load(13);
        let other = dataloader.source("b", make).load(4);
        dataloader.run_pending().await;

        assert!(matches!(
            failing.resolve().await,
            Err(crate::error::ResolverError::Execution(error)) if error.message == "unlucky"
        ));
        assert_eq!(other.resolve().await.unwrap(), 16);
        assert_eq!(batches.lock().unwrap().len(), 2);
    }
}
