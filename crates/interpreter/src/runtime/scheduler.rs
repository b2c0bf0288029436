// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{collections::BTreeMap, sync::Arc};

use futures::future::join_all;
use tracing::{debug, instrument, trace};

use crate::{dataloader::Dataloader, error::ExecutorError};

use super::{Parked, Resumption, Runtime, StepOutcome};

/// Drives one or more runtimes (a multiplex) to completion.
///
/// Ready steps always run first. Once every queue is empty, the parked steps of the
/// shallowest depth are resumed together: pending batch loads are flushed, the futures
/// are awaited and the steps go back on their queues.
pub(crate) struct Scheduler<'a> {
    runtimes: Vec<Runtime<'a>>,
    dataloader: Arc<Dataloader>,
    nonblocking: bool,
}

impl<'a> Scheduler<'a> {
    pub(crate) fn new(
        runtimes: Vec<Runtime<'a>>,
        dataloader: Arc<Dataloader>,
        nonblocking: bool,
    ) -> Self {
        Self {
            runtimes,
            dataloader,
            nonblocking,
        }
    }

    #[instrument(name = "Scheduler::run", skip_all, fields(runtimes = self.runtimes.len()))]
    pub(crate) async fn run(&mut self) -> Result<(), ExecutorError> {
        let mut parked: BTreeMap<usize, Vec<(usize, Parked<'a>)>> = BTreeMap::new();

        loop {
            for (index, rt) in self.runtimes.iter_mut().enumerate() {
                loop {
                    while let Some(step) = rt.queue.pop_front() {
                        if let StepOutcome::Parked(step) = step.run(rt)? {
                            rt.parked += 1;
                            parked.entry(step.depth).or_default().push((index, step));
                        }
                    }

                    if rt.parked == 0
                        && let Some(field) = rt.eager_fields.pop_front()
                    {
                        trace!(runtime = index, "releasing the next eager field");
                        self.dataloader.clear_cache();
                        rt.queue.push_back(field);
                        continue;
                    }
                    break;
                }
            }

            let Some((depth, bucket)) = parked.pop_first() else {
                break;
            };
            debug!(depth, steps = bucket.len(), "resuming parked steps");

            self.dataloader.run_pending().await;

            let (owners, futures): (Vec<_>, Vec<_>) = bucket
                .into_iter()
                .map(|(index, parked)| ((index, parked.step), parked.future))
                .unzip();
            let resumptions = if self.nonblocking {
                join_all(futures).await
            } else {
                let mut resumptions = Vec::with_capacity(futures.len());
                for future in futures {
                    resumptions.push(future.await);
                }
                resumptions
            };

            for ((index, step), resumption) in owners.into_iter().zip(resumptions) {
                let rt = &mut self.runtimes[index];
                rt.parked -= 1;
                if let Resumption::Arguments(key, result) = &resumption {
                    rt.arguments.store(*key, result);
                }
                rt.queue.push_back(step.resume(resumption)?);
            }
        }

        Ok(())
    }

    pub(crate) fn into_runtimes(self) -> Vec<Runtime<'a>> {
        self.runtimes
    }
}
