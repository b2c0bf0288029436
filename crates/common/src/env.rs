// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Access to configuration values supplied through the process environment.
//!
//! Code that reads configuration takes a `&dyn Environment` so that tests can supply a
//! [`MapEnvironment`] instead of mutating the real process environment.

use std::collections::HashMap;

use thiserror::Error;

pub trait Environment: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn enabled(&self, key: &str, default_value: bool) -> Result<bool, EnvError> {
        match self.get(key) {
            Some(value) => match value.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(EnvError::InvalidBoolean {
                    key: key.to_string(),
                    value,
                }),
            },
            None => Ok(default_value),
        }
    }

    fn get_or_else(&self, key: &str, default_value: &str) -> String {
        self.get(key).unwrap_or_else(|| default_value.to_string())
    }

    fn get_usize(&self, key: &str, default_value: usize) -> Result<usize, EnvError> {
        match self.get(key) {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map_err(|_| EnvError::InvalidNumber {
                    key: key.to_string(),
                    value,
                }),
            None => Ok(default_value),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("Invalid value for {key}: {value}. Expected one of true, 1, yes, on OR false, 0, no, off")]
    InvalidBoolean { key: String, value: String },

    #[error("Invalid value for {key}: {value}. Expected a non-negative integer")]
    InvalidNumber { key: String, value: String },
}

pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnvironment {
    values: HashMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

impl Environment for MapEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for MapEnvironment {
    fn from(values: [(&str, &str); N]) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}
