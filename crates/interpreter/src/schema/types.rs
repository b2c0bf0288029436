// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use async_graphql_value::{ConstValue, Name};
use indexmap::{IndexMap, IndexSet};

use crate::{
    context::{QueryContext, ResolverContext},
    error::{ExecutionError, ResolverError},
    lazy::MaybeLazy,
    value::{AppValue, FieldResult},
};

use super::type_ref::TypeRef;

pub type ResolverFn = Arc<dyn for<'r> Fn(&ResolverContext<'r>) -> FieldResult + Send + Sync>;
pub type FieldAuthorizeFn = Arc<dyn for<'r> Fn(&ResolverContext<'r>) -> bool + Send + Sync>;
pub type ObjectAuthorizeFn =
    Arc<dyn Fn(&AppValue, &QueryContext) -> MaybeLazy<bool> + Send + Sync>;
pub type ResolveTypeFn = Arc<dyn Fn(&AppValue, &QueryContext) -> MaybeLazy<Name> + Send + Sync>;
pub type ScalarCoerceFn = Arc<dyn Fn(&ConstValue) -> Result<ConstValue, String> + Send + Sync>;
pub type PrepareFn =
    Arc<dyn Fn(ConstValue, &QueryContext) -> Result<ConstValue, ExecutionError> + Send + Sync>;
pub type LoadsFn = Arc<
    dyn Fn(ConstValue, &QueryContext) -> Result<MaybeLazy<AppValue>, ResolverError> + Send + Sync,
>;
pub type ExtraFn = Arc<dyn Fn(&Name, &QueryContext) -> ConstValue + Send + Sync>;

/// The closed set of named type kinds.
pub enum MetaType {
    Scalar(ScalarType),
    Enum(EnumType),
    Object(ObjectType),
    Interface(InterfaceType),
    Union(UnionType),
    InputObject(InputObjectType),
}

impl MetaType {
    pub fn name(&self) -> &Name {
        match self {
            MetaType::Scalar(t) => &t.name,
            MetaType::Enum(t) => &t.name,
            MetaType::Object(t) => &t.name,
            MetaType::Interface(t) => &t.name,
            MetaType::Union(t) => &t.name,
            MetaType::InputObject(t) => &t.name,
        }
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, MetaType::Interface(_) | MetaType::Union(_))
    }

    pub(crate) fn type_resolver(&self) -> Option<&ResolveTypeFn> {
        match self {
            MetaType::Interface(t) => t.resolve_type.as_ref(),
            MetaType::Union(t) => t.resolve_type.as_ref(),
            _ => None,
        }
    }
}

impl From<ScalarType> for MetaType {
    fn from(t: ScalarType) -> Self {
        MetaType::Scalar(t)
    }
}

impl From<EnumType> for MetaType {
    fn from(t: EnumType) -> Self {
        MetaType::Enum(t)
    }
}

impl From<ObjectType> for MetaType {
    fn from(t: ObjectType) -> Self {
        MetaType::Object(t)
    }
}

impl From<InterfaceType> for MetaType {
    fn from(t: InterfaceType) -> Self {
        MetaType::Interface(t)
    }
}

impl From<UnionType> for MetaType {
    fn from(t: UnionType) -> Self {
        MetaType::Union(t)
    }
}

impl From<InputObjectType> for MetaType {
    fn from(t: InputObjectType) -> Self {
        MetaType::InputObject(t)
    }
}

pub struct ScalarType {
    pub(crate) name: Name,
    pub(crate) coerce_input: ScalarCoerceFn,
    pub(crate) coerce_result: ScalarCoerceFn,
}

impl ScalarType {
    /// A scalar that passes values through unchanged until coercions are supplied.
    pub fn new(name: &str) -> Self {
        Self {
            name: Name::new(name),
            coerce_input: Arc::new(|value| Ok(value.clone())),
            coerce_result: Arc::new(|value| Ok(value.clone())),
        }
    }

    pub fn coerce_input(
        mut self,
        f: impl Fn(&ConstValue) -> Result<ConstValue, String> + Send + Sync + 'static,
    ) -> Self {
        self.coerce_input = Arc::new(f);
        self
    }

    pub fn coerce_result(
        mut self,
        f: impl Fn(&ConstValue) -> Result<ConstValue, String> + Send + Sync + 'static,
    ) -> Self {
        self.coerce_result = Arc::new(f);
        self
    }
}

pub struct EnumType {
    pub(crate) name: Name,
    pub(crate) values: IndexSet<Name>,
}

impl EnumType {
    pub fn new<'a>(name: &str, values: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            name: Name::new(name),
            values: values.into_iter().map(Name::new).collect(),
        }
    }

    pub(crate) fn coerce(&self, value: &ConstValue) -> Result<ConstValue, String> {
        let candidate = match value {
            ConstValue::Enum(name) => name.as_str(),
            ConstValue::String(s) => s.as_str(),
            other => return Err(format!("{other} is not a valid {} value", self.name)),
        };

        self.values
            .get(candidate)
            .map(|name| ConstValue::Enum(name.clone()))
            .ok_or_else(|| format!("\"{candidate}\" is not a valid {} value", self.name))
    }
}

pub struct ObjectType {
    pub(crate) name: Name,
    pub(crate) fields: IndexMap<Name, FieldDefinition>,
    pub(crate) interfaces: Vec<Name>,
    pub(crate) authorize: Option<ObjectAuthorizeFn>,
}

impl ObjectType {
    pub fn new(name: &str) -> Self {
        Self {
            name: Name::new(name),
            fields: IndexMap::new(),
            interfaces: vec![],
            authorize: None,
        }
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(Name::new(interface));
        self
    }

    /// Type-level authorization, checked for every object of this type before its fields
    /// are resolved.
    pub fn authorize(
        mut self,
        f: impl Fn(&AppValue, &QueryContext) -> MaybeLazy<bool> + Send + Sync + 'static,
    ) -> Self {
        self.authorize = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub(crate) fn field_definition(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }
}

pub struct InterfaceType {
    pub(crate) name: Name,
    pub(crate) resolve_type: Option<ResolveTypeFn>,
}

impl InterfaceType {
    pub fn new(name: &str) -> Self {
        Self {
            name: Name::new(name),
            resolve_type: None,
        }
    }

    pub fn resolve_type(
        mut self,
        f: impl Fn(&AppValue, &QueryContext) -> MaybeLazy<Name> + Send + Sync + 'static,
    ) -> Self {
        self.resolve_type = Some(Arc::new(f));
        self
    }
}

pub struct UnionType {
    pub(crate) name: Name,
    pub(crate) members: Vec<Name>,
    pub(crate) resolve_type: Option<ResolveTypeFn>,
}

impl UnionType {
    pub fn new<'a>(name: &str, members: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            name: Name::new(name),
            members: members.into_iter().map(Name::new).collect(),
            resolve_type: None,
        }
    }

    pub fn resolve_type(
        mut self,
        f: impl Fn(&AppValue, &QueryContext) -> MaybeLazy<Name> + Send + Sync + 'static,
    ) -> Self {
        self.resolve_type = Some(Arc::new(f));
        self
    }
}

pub struct InputObjectType {
    pub(crate) name: Name,
    pub(crate) fields: IndexMap<Name, InputValueDefinition>,
}

impl InputObjectType {
    pub fn new(name: &str) -> Self {
        Self {
            name: Name::new(name),
            fields: IndexMap::new(),
        }
    }

    pub fn field(mut self, field: InputValueDefinition) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}

/// Context a field asks to have injected into its [`ResolverContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extra {
    AstNode,
    Path,
    Lookahead,
    ExecutionErrors,
    Parent,
    Custom(Name),
}

pub struct FieldDefinition {
    pub(crate) name: Name,
    pub(crate) ty: TypeRef,
    pub(crate) arguments: IndexMap<Name, InputValueDefinition>,
    pub(crate) resolver: Option<ResolverFn>,
    pub(crate) extras: Vec<Extra>,
    pub(crate) authorize: Option<FieldAuthorizeFn>,
    pub(crate) extra_provider: Option<ExtraFn>,
}

impl FieldDefinition {
    pub fn new(name: &str, ty: &str) -> Self {
        Self {
            name: Name::new(name),
            ty: TypeRef::parse(ty),
            arguments: IndexMap::new(),
            resolver: None,
            extras: vec![],
            authorize: None,
            extra_provider: None,
        }
    }

    pub fn argument(mut self, argument: InputValueDefinition) -> Self {
        self.arguments.insert(argument.name.clone(), argument);
        self
    }

    pub fn resolve<F>(mut self, f: F) -> Self
    where
        F: for<'r> Fn(&ResolverContext<'r>) -> FieldResult + Send + Sync + 'static,
    {
        self.resolver = Some(Arc::new(f));
        self
    }

    pub fn extras(mut self, extras: impl IntoIterator<Item = Extra>) -> Self {
        self.extras.extend(extras);
        self
    }

    pub fn authorize<F>(mut self, f: F) -> Self
    where
        F: for<'r> Fn(&ResolverContext<'r>) -> bool + Send + Sync + 'static,
    {
        self.authorize = Some(Arc::new(f));
        self
    }

    /// Supplies the values of [`Extra::Custom`] extras.
    pub fn extra_provider(
        mut self,
        f: impl Fn(&Name, &QueryContext) -> ConstValue + Send + Sync + 'static,
    ) -> Self {
        self.extra_provider = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub(crate) fn wants(&self, extra: &Extra) -> bool {
        self.extras.contains(extra)
    }
}

pub struct InputValueDefinition {
    pub(crate) name: Name,
    pub(crate) ty: TypeRef,
    pub(crate) default_value: Option<ConstValue>,
    pub(crate) prepare: Option<PrepareFn>,
    pub(crate) loads: Option<(Name, LoadsFn)>,
}

impl InputValueDefinition {
    pub fn new(name: &str, ty: &str) -> Self {
        Self {
            name: Name::new(name),
            ty: TypeRef::parse(ty),
            default_value: None,
            prepare: None,
            loads: None,
        }
    }

    pub fn default_value(mut self, value: ConstValue) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Application-level transformation applied after type coercion.
    pub fn prepare(
        mut self,
        f: impl Fn(ConstValue, &QueryContext) -> Result<ConstValue, ExecutionError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.prepare = Some(Arc::new(f));
        self
    }

    /// Turn the coerced value into an application object of `object_type`, which is then
    /// subject to that type's authorization.
    pub fn loads(
        mut self,
        object_type: &str,
        f: impl Fn(ConstValue, &QueryContext) -> Result<MaybeLazy<AppValue>, ResolverError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.loads = Some((Name::new(object_type), Arc::new(f)));
        self
    }

    pub fn name(&self) -> &Name {
        &self.name
    }
}
