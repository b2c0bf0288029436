// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use common::{
    env::{EnvError, Environment},
    env_const::{is_field_tracing_enabled, is_nonblocking},
};
use tracing::{debug, instrument};

use crate::{
    dataloader::Dataloader,
    error::ExecutorError,
    request::{PreparedRequest, Request},
    response::Response,
    runtime::{Runtime, Scheduler},
    schema::Schema,
    trace::{NoopTracer, Tracer, TracingTracer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Await parked steps of the same depth concurrently rather than one after another.
    pub nonblocking: bool,
    /// Emit a tracing event around every resolver call.
    pub trace_fields: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            nonblocking: true,
            trace_fields: false,
        }
    }
}

impl ExecutorConfig {
    pub fn from_env(env: &dyn Environment) -> Result<Self, EnvError> {
        Ok(Self {
            nonblocking: is_nonblocking(env)?,
            trace_fields: is_field_tracing_enabled(env)?,
        })
    }
}

pub struct Executor {
    schema: Arc<Schema>,
    config: ExecutorConfig,
    tracer: Arc<dyn Tracer>,
}

impl Executor {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_config(schema, ExecutorConfig::default())
    }

    pub fn with_config(schema: Arc<Schema>, config: ExecutorConfig) -> Self {
        let tracer: Arc<dyn Tracer> = if config.trace_fields {
            Arc::new(TracingTracer)
        } else {
            Arc::new(NoopTracer)
        };

        Self {
            schema,
            config,
            tracer,
        }
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn config(&self) -> ExecutorConfig {
        self.config
    }

    /// Execute a single request.
    ///
    /// Field-level failures end up in the response. The `Err` side is reserved for failures
    /// that leave no meaningful response to return, such as an unhandled resolver error.
    #[instrument(name = "Executor::execute", skip_all)]
    pub async fn execute(&self, request: Request) -> Result<Response, ExecutorError> {
        let mut responses = self.execute_multiplex(vec![request]).await?;
        responses
            .pop()
            .ok_or_else(|| ExecutorError::Invariant("no response for the request".to_string()))
    }

    /// Execute several requests together, sharing batch loads between them.
    ///
    /// Responses come back in request order. Requests that fail to prepare get an error
    /// response and take no part in the run.
    #[instrument(name = "Executor::execute_multiplex", skip_all, fields(requests = requests.len()))]
    pub async fn execute_multiplex(
        &self,
        requests: Vec<Request>,
    ) -> Result<Vec<Response>, ExecutorError> {
        let dataloader = Arc::new(Dataloader::new(self.tracer.clone()));

        let prepared: Vec<_> = requests
            .into_iter()
            .map(|request| PreparedRequest::prepare(request, &self.schema, dataloader.clone()))
            .collect();

        let mut runtimes = vec![];
        for request in prepared.iter().flatten() {
            runtimes.push(Runtime::new(&self.schema, request, self.tracer.clone())?);
        }
        debug!(runtimes = runtimes.len(), "prepared requests");

        let mut scheduler = Scheduler::new(runtimes, dataloader, self.config.nonblocking);
        scheduler.run().await?;
        let mut executed = scheduler
            .into_runtimes()
            .into_iter()
            .map(|mut runtime| Response {
                data: Some(runtime.tree.to_json()),
                errors: runtime.response_errors(),
            })
            .collect::<Vec<_>>()
            .into_iter();

        let mut responses = Vec::with_capacity(prepared.len());
        for request in prepared {
            let response = match request {
                Ok(_) => executed.next().ok_or_else(|| {
                    ExecutorError::Invariant("no runtime for a prepared request".to_string())
                })?,
                Err(error) => Response::from_request_error(error),
            };
            responses.push(response);
        }

        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use common::env::MapEnvironment;

    use super::*;

    #[test]
    fn config_reads_the_environment() {
        assert_eq!(
            ExecutorConfig::from_env(&MapEnvironment::default()).unwrap(),
            ExecutorConfig::default()
        );

        let env = MapEnvironment::from([("GQL_NONBLOCKING", "false"), ("GQL_TRACE_FIELDS", "true")]);
        assert_eq!(
            ExecutorConfig::from_env(&env).unwrap(),
            ExecutorConfig {
                nonblocking: false,
                trace_fields: true,
            }
        );

        let env = MapEnvironment::from([("GQL_NONBLOCKING", "sometimes")]);
        assert!(ExecutorConfig::from_env(&env).is_err());
    }
}
