// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::env::{EnvError, Environment};

pub const GQL_LOG: &str = "GQL_LOG";

pub const GQL_NONBLOCKING: &str = "GQL_NONBLOCKING";
pub const GQL_TRACE_FIELDS: &str = "GQL_TRACE_FIELDS";

/// Whether lazies parked at the same depth are awaited concurrently (the default) or one
/// after another in the order they were parked.
pub fn is_nonblocking(env: &dyn Environment) -> Result<bool, EnvError> {
    env.enabled(GQL_NONBLOCKING, true)
}

pub fn is_field_tracing_enabled(env: &dyn Environment) -> Result<bool, EnvError> {
    env.enabled(GQL_TRACE_FIELDS, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnvironment;

    #[test]
    fn defaults() {
        let env = MapEnvironment::new();

        assert_eq!(is_nonblocking(&env), Ok(true));
        assert_eq!(is_field_tracing_enabled(&env), Ok(false));
    }

    #[test]
    fn overrides() {
        let env = MapEnvironment::from([(GQL_NONBLOCKING, "false"), (GQL_TRACE_FIELDS, "true")]);

        assert_eq!(is_nonblocking(&env), Ok(false));
        assert_eq!(is_field_tracing_enabled(&env), Ok(true));
    }
}
