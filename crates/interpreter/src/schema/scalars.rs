// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Built-in scalars.

use async_graphql_value::ConstValue;
use serde_json::Number;

use super::types::ScalarType;

pub(super) fn built_in_scalars() -> Vec<ScalarType> {
    vec![
        ScalarType::new("Int")
            .coerce_input(coerce_int_input)
            .coerce_result(coerce_int_result),
        ScalarType::new("Float")
            .coerce_input(coerce_float)
            .coerce_result(coerce_float),
        ScalarType::new("String")
            .coerce_input(coerce_string_input)
            .coerce_result(coerce_string_result),
        ScalarType::new("Boolean")
            .coerce_input(coerce_boolean)
            .coerce_result(coerce_boolean),
        ScalarType::new("ID")
            .coerce_input(coerce_id)
            .coerce_result(coerce_id),
    ]
}

fn to_i32(value: &ConstValue) -> Option<i32> {
    match value {
        ConstValue::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).ok(),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i32::MIN as f64 && *f <= i32::MAX as f64)
                .map(|f| f as i32),
        },
        _ => None,
    }
}

fn coerce_int_input(value: &ConstValue) -> Result<ConstValue, String> {
    to_i32(value)
        .map(|i| ConstValue::Number(i.into()))
        .ok_or_else(|| format!("Int cannot represent non 32-bit signed integer value: {value}"))
}

fn coerce_int_result(value: &ConstValue) -> Result<ConstValue, String> {
    let parsed = match value {
        ConstValue::String(s) => s.trim().parse::<i32>().ok(),
        other => to_i32(other),
    };

    parsed
        .map(|i| ConstValue::Number(i.into()))
        .ok_or_else(|| format!("Int cannot represent non 32-bit signed integer value: {value}"))
}

fn coerce_float(value: &ConstValue) -> Result<ConstValue, String> {
    match value {
        ConstValue::Number(n) => n
            .as_f64()
            .and_then(Number::from_f64)
            .map(ConstValue::Number)
            .ok_or_else(|| format!("Float cannot represent value: {value}")),
        other => Err(format!("Float cannot represent non numeric value: {other}")),
    }
}

fn coerce_string_input(value: &ConstValue) -> Result<ConstValue, String> {
    match value {
        ConstValue::String(_) => Ok(value.clone()),
        other => Err(format!("String cannot represent a non string value: {other}")),
    }
}

fn coerce_string_result(value: &ConstValue) -> Result<ConstValue, String> {
    match value {
        ConstValue::String(_) => Ok(value.clone()),
        ConstValue::Number(n) => Ok(ConstValue::String(n.to_string())),
        ConstValue::Boolean(b) => Ok(ConstValue::String(b.to_string())),
        ConstValue::Enum(name) => Ok(ConstValue::String(name.to_string())),
        other => Err(format!("String cannot represent value: {other}")),
    }
}

fn coerce_boolean(value: &ConstValue) -> Result<ConstValue, String> {
    match value {
        ConstValue::Boolean(_) => Ok(value.clone()),
        other => Err(format!("Boolean cannot represent a non boolean value: {other}")),
    }
}

fn coerce_id(value: &ConstValue) -> Result<ConstValue, String> {
    match value {
        ConstValue::String(_) => Ok(value.clone()),
        ConstValue::Number(n) if n.is_i64() || n.is_u64() => Ok(ConstValue::String(n.to_string())),
        other => Err(format!("ID cannot represent value: {other}")),
    }
}
