// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A GraphQL query interpreter.
//!
//! Executes parsed GraphQL operations against a [`Schema`] whose fields are backed by
//! application resolvers. Resolvers may return values directly or defer them with a
//! [`Lazy`]; deferred values from the same query depth (and from every request of a
//! multiplex) are awaited together, which lets [`dataloader`] sources batch their loads.

pub mod dataloader;
pub mod schema;
pub mod trace;

mod arguments;
mod context;
mod error;
mod executor;
mod gather;
mod lazy;
mod lookahead;
mod request;
mod response;
mod result;
mod runtime;
mod value;

pub use arguments::{ArgumentError, ArgumentState, ArgumentValue, Arguments};
pub use context::{ErrorCollector, QueryContext, ResolverContext};
pub use error::{
    ErrorLocation, ExecutionError, ExecutorError, PathSegment, ResolverError, SharedError,
    UnauthorizedError, format_path,
};
pub use executor::{Executor, ExecutorConfig};
pub use lazy::{Lazy, MaybeLazy};
pub use lookahead::Lookahead;
pub use request::{Request, RequestError};
pub use response::Response;
pub use schema::Schema;
pub use value::{AppObject, AppValue, FieldResult, ResolvedValue};
