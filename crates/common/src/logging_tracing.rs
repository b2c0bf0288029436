// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! # Tracing configuration setup.
//!
//! The interpreter is instrumented with Rust's `tracing` framework.
//!
//! Calling the `init` function will initialize a global tracing subscriber based on the value
//! of the `GQL_LOG` environment variable which follows the same conventions as `RUST_LOG`.
//! Use `GQL_LOG=graphql_interpreter=trace` to see every parked and resumed step.

use thiserror::Error;
use tracing_subscriber::{EnvFilter, filter::LevelFilter, prelude::*};

use crate::env_const::GQL_LOG;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("A global tracing subscriber has already been installed")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// Initialize the tracing subscriber.
///
/// Creates a compact `tracing_subscriber::fmt` layer filtered by `GQL_LOG` (default: `warn`).
pub fn init() -> Result<(), LoggingError> {
    let fmt_layer = tracing_subscriber::fmt::layer().compact();
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(GQL_LOG)
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_reported() {
        // Other tests in this binary don't install a subscriber, so the first call wins.
        let first = init();
        let second = init();

        assert!(first.is_ok());
        assert!(matches!(second, Err(LoggingError::AlreadyInitialized(_))));
    }
}
