// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{any::Any, fmt, sync::Arc};

use async_graphql_value::ConstValue;

use crate::{
    error::{ExecutionError, ResolverError, UnauthorizedError},
    lazy::Lazy,
};

/// An opaque application object. Resolvers downcast it back to their own type.
#[derive(Clone)]
pub struct AppObject(Arc<dyn Any + Send + Sync>);

impl AppObject {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        AppObject(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Identity of the underlying allocation. Clones share an identity.
    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for AppObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppObject({:#x})", self.identity())
    }
}

/// The application value a composite result position was produced from.
#[derive(Clone, Debug)]
pub enum AppValue {
    /// Plain data; fields without a resolver read same-named keys out of an object.
    Data(ConstValue),
    Object(AppObject),
}

impl AppValue {
    pub fn null() -> Self {
        AppValue::Data(ConstValue::Null)
    }

    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        AppValue::Object(AppObject::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AppValue::Data(ConstValue::Null))
    }

    pub fn as_data(&self) -> Option<&ConstValue> {
        match self {
            AppValue::Data(value) => Some(value),
            AppValue::Object(_) => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            AppValue::Object(object) => object.downcast_ref::<T>(),
            AppValue::Data(_) => None,
        }
    }
}

impl From<ConstValue> for AppValue {
    fn from(value: ConstValue) -> Self {
        AppValue::Data(value)
    }
}

impl From<AppObject> for AppValue {
    fn from(object: AppObject) -> Self {
        AppValue::Object(object)
    }
}

/// What a resolver hands back to the runtime.
#[derive(Debug)]
pub enum ResolvedValue {
    Value(ConstValue),
    Object(AppObject),
    List(Vec<ResolvedValue>),
    Lazy(Lazy),
    Error(ExecutionError),
    Unauthorized(UnauthorizedError),
    /// Omit this position from the response altogether.
    Skip,
    /// Pre-shaped output written as-is, with no further type-based resolution.
    Raw(ConstValue),
}

pub type FieldResult = Result<ResolvedValue, ResolverError>;

impl ResolvedValue {
    pub fn null() -> Self {
        ResolvedValue::Value(ConstValue::Null)
    }

    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        ResolvedValue::Object(AppObject::new(value))
    }

    pub fn list<T: Into<ResolvedValue>>(items: impl IntoIterator<Item = T>) -> Self {
        ResolvedValue::List(items.into_iter().map(Into::into).collect())
    }

    /// Wrap pre-shaped JSON. Values serde can't represent become `null`.
    pub fn raw(value: serde_json::Value) -> Self {
        ResolvedValue::Raw(ConstValue::from_json(value).unwrap_or(ConstValue::Null))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ResolvedValue::Value(ConstValue::Null))
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            ResolvedValue::Value(ConstValue::List(_)) | ResolvedValue::List(_) => "a list",
            ResolvedValue::Value(ConstValue::Object(_)) => "an object",
            ResolvedValue::Value(ConstValue::Null) => "null",
            ResolvedValue::Value(_) => "a scalar",
            ResolvedValue::Object(_) => "an application object",
            ResolvedValue::Lazy(_) => "a lazy value",
            ResolvedValue::Error(_) => "an error",
            ResolvedValue::Unauthorized(_) => "an authorization failure",
            ResolvedValue::Skip => "a skip marker",
            ResolvedValue::Raw(_) => "a raw value",
        }
    }
}

impl From<ConstValue> for ResolvedValue {
    fn from(value: ConstValue) -> Self {
        ResolvedValue::Value(value)
    }
}

impl From<AppObject> for ResolvedValue {
    fn from(object: AppObject) -> Self {
        ResolvedValue::Object(object)
    }
}

impl From<AppValue> for ResolvedValue {
    fn from(value: AppValue) -> Self {
        match value {
            AppValue::Data(value) => ResolvedValue::Value(value),
            AppValue::Object(object) => ResolvedValue::Object(object),
        }
    }
}

impl From<ExecutionError> for ResolvedValue {
    fn from(error: ExecutionError) -> Self {
        ResolvedValue::Error(error)
    }
}

impl From<Lazy> for ResolvedValue {
    fn from(lazy: Lazy) -> Self {
        ResolvedValue::Lazy(lazy)
    }
}

impl<T: Into<ResolvedValue>> From<Vec<T>> for ResolvedValue {
    fn from(items: Vec<T>) -> Self {
        ResolvedValue::list(items)
    }
}

impl<T: Into<ResolvedValue>> From<Option<T>> for ResolvedValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_else(ResolvedValue::null)
    }
}

impl From<i32> for ResolvedValue {
    fn from(value: i32) -> Self {
        ResolvedValue::Value(ConstValue::Number(value.into()))
    }
}

impl From<i64> for ResolvedValue {
    fn from(value: i64) -> Self {
        ResolvedValue::Value(ConstValue::Number(value.into()))
    }
}

impl From<f64> for ResolvedValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(|number| ResolvedValue::Value(ConstValue::Number(number)))
            .unwrap_or_else(ResolvedValue::null)
    }
}

impl From<bool> for ResolvedValue {
    fn from(value: bool) -> Self {
        ResolvedValue::Value(ConstValue::Boolean(value))
    }
}

impl From<String> for ResolvedValue {
    fn from(value: String) -> Self {
        ResolvedValue::Value(ConstValue::String(value))
    }
}

impl From<&str> for ResolvedValue {
    fn from(value: &str) -> Self {
        ResolvedValue::Value(ConstValue::String(value.to_string()))
    }
}
