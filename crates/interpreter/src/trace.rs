// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tracing::{debug, trace};

use crate::error::{PathSegment, format_path};

/// Observes execution. Hooks cannot influence control flow; all of them default to no-ops.
pub trait Tracer: Send + Sync {
    fn begin_execute_field(&self, _type_name: &str, _field_name: &str, _path: &[PathSegment]) {}
    fn end_execute_field(&self, _type_name: &str, _field_name: &str, _path: &[PathSegment]) {}

    fn begin_resolve_type(&self, _abstract_type: &str) {}
    /// `resolved` is `None` when resolution failed.
    fn end_resolve_type(&self, _abstract_type: &str, _resolved: Option<&str>) {}

    fn begin_authorized(&self, _type_name: &str) {}
    fn end_authorized(&self, _type_name: &str, _authorized: Option<bool>) {}

    fn begin_dataloader_source(&self, _source: &str, _keys: usize) {}
    fn end_dataloader_source(&self, _source: &str, _keys: usize) {}
}

pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Forwards every hook to `tracing` events.
pub struct TracingTracer;

impl Tracer for TracingTracer {
    fn begin_execute_field(&self, type_name: &str, field_name: &str, path: &[PathSegment]) {
        trace!(type_name, field_name, path = %format_path(path), "begin execute field");
    }

    fn end_execute_field(&self, type_name: &str, field_name: &str, path: &[PathSegment]) {
        trace!(type_name, field_name, path = %format_path(path), "end execute field");
    }

    fn begin_resolve_type(&self, abstract_type: &str) {
        trace!(abstract_type, "begin resolve type");
    }

    fn end_resolve_type(&self, abstract_type: &str, resolved: Option<&str>) {
        trace!(abstract_type, ?resolved, "end resolve type");
    }

    fn begin_authorized(&self, type_name: &str) {
        trace!(type_name, "begin authorized");
    }

    fn end_authorized(&self, type_name: &str, authorized: Option<bool>) {
        trace!(type_name, ?authorized, "end authorized");
    }

    fn begin_dataloader_source(&self, source: &str, keys: usize) {
        debug!(source, keys, "begin dataloader source");
    }

    fn end_dataloader_source(&self, source: &str, keys: usize) {
        debug!(source, keys, "end dataloader source");
    }
}
