// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use futures::{FutureExt, future::BoxFuture};
use indexmap::IndexSet;
use tracing::debug;

use crate::{
    error::{ExecutionError, ResolverError},
    trace::Tracer,
};

/// A backend that can look up many keys in one round trip.
#[async_trait]
pub trait BatchSource: Send + Sync + 'static {
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;
    type Value: Clone + Send + Sync + 'static;

    /// Shown to tracers.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Return exactly one value per key, in key order.
    async fn fetch(&self, keys: &[Self::Key]) -> Result<Vec<Self::Value>, ExecutionError>;
}

struct Batch<K, V> {
    pending: IndexSet<K>,
    results: HashMap<K, Result<V, ExecutionError>>,
}

pub(crate) struct SourceState<S: BatchSource> {
    source: S,
    batch: Mutex<Batch<S::Key, S::Value>>,
    /// Held while a fetch is in flight, so that one fetch serves every waiter.
    fetch_lock: tokio::sync::Mutex<()>,
    tracer: Arc<dyn Tracer>,
}

impl<S: BatchSource> SourceState<S> {
    pub(crate) fn new(source: S, tracer: Arc<dyn Tracer>) -> Self {
        Self {
            source,
            batch: Mutex::new(Batch {
                pending: IndexSet::new(),
                results: HashMap::new(),
            }),
            fetch_lock: tokio::sync::Mutex::new(()),
            tracer,
        }
    }

    fn batch(&self) -> MutexGuard<'_, Batch<S::Key, S::Value>> {
        self.batch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `key` for the next fetch unless its result is already known.
    pub(crate) fn request(&self, key: &S::Key) {
        let mut batch = self.batch();
        if !batch.results.contains_key(key) {
            batch.pending.insert(key.clone());
        }
    }

    fn cached(&self, key: &S::Key) -> Option<Result<S::Value, ExecutionError>> {
        self.batch().results.get(key).cloned()
    }

    pub(crate) async fn result_for(self: Arc<Self>, key: S::Key) -> Result<S::Value, ResolverError> {
        loop {
            if let Some(result) = self.cached(&key) {
                return result.map_err(ResolverError::Execution);
            }
            // The cache may have been cleared since the key was requested
            self.request(&key);
            self.fetch_pending().await;
        }
    }

    pub(crate) async fn fetch_pending(&self) {
        let _in_flight = self.fetch_lock.lock().await;

        let keys: Vec<_> = self.batch().pending.drain(..).collect();
        if keys.is_empty() {
            return;
        }

        let name = self.source.name();
        debug!(source = name, keys = keys.len(), "fetching batch");
        self.tracer.begin_dataloader_source(name, keys.len());
        let outcome = self.source.fetch(&keys).await;
        self.tracer.end_dataloader_source(name, keys.len());

        let mut batch = self.batch();
        match outcome {
            Ok(values) if values.len() == keys.len() => {
                for (key, value) in keys.into_iter().zip(values) {
                    batch.results.insert(key, Ok(value));
                }
            }
            Ok(values) => {
                let error = ExecutionError::new(format!(
                    "{name} returned {} values for {} keys",
                    values.len(),
                    keys.len()
                ));
                for key in keys {
                    batch.results.insert(key, Err(error.clone()));
                }
            }
            Err(error) => {
                for key in keys {
                    batch.results.insert(key, Err(error.clone()));
                }
            }
        }
    }
}

/// What the registry needs from a source regardless of its key and value types.
pub(crate) trait PendingSource: Send + Sync {
    fn has_pending(&self) -> bool;
    fn flush(&self) -> BoxFuture<'_, ()>;
    fn clear(&self);
}

impl<S: BatchSource> PendingSource for SourceState<S> {
    fn has_pending(&self) -> bool {
        !self.batch().pending.is_empty()
    }

    fn flush(&self) -> BoxFuture<'_, ()> {
        self.fetch_pending().boxed()
    }

    fn clear(&self) {
        self.batch().results.clear();
    }
}
