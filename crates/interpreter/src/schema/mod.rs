// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The type system the runtime executes against.
//!
//! Schemas are assembled in code with [`SchemaBuilder`]; [`SchemaBuilder::finish`] checks
//! that every referenced type exists and precomputes the possible types of each abstract
//! type, which selection gathering consults for every type condition.

mod directive;
mod scalars;
mod type_ref;
mod types;

use std::{collections::HashMap, sync::Arc};

use async_graphql_parser::types::OperationType;
use async_graphql_value::{ConstValue, Name};
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

pub use directive::{
    DirectiveContext, DirectiveDefinition, DirectiveFlow, DirectiveResolveFn, IncludeFn,
};
pub use type_ref::TypeRef;
pub use types::{
    EnumType, Extra, FieldDefinition, InputObjectType, InputValueDefinition, InterfaceType,
    MetaType, ObjectType, ResolveTypeFn, ScalarType, UnionType,
};

use crate::{
    context::QueryContext,
    error::{ExecutionError, PathSegment, SharedError, UnauthorizedError},
    lazy::MaybeLazy,
    value::{AppValue, ResolvedValue},
};

pub type SchemaResolveTypeFn =
    Arc<dyn Fn(&Name, &AppValue, &QueryContext) -> Option<MaybeLazy<Name>> + Send + Sync>;
pub type UnauthorizedFn = Arc<
    dyn Fn(&UnauthorizedError, &QueryContext) -> Result<ResolvedValue, ExecutionError>
        + Send
        + Sync,
>;
pub type RescueFn =
    Arc<dyn for<'r> Fn(&SharedError, &ErrorContext<'r>) -> Option<ExecutionError> + Send + Sync>;

/// Where an unexpected error was raised, for the rescue hook.
pub struct ErrorContext<'r> {
    pub path: &'r [PathSegment],
    pub query: &'r QueryContext,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Type {0} is defined more than once")]
    DuplicateType(Name),

    #[error("Root type {0} is not defined")]
    UnknownRootType(Name),

    #[error("Root type {0} must be an object type")]
    RootTypeNotObject(Name),

    #[error("Unknown type {name} referenced by {referenced_by}")]
    UnknownType { referenced_by: String, name: Name },

    #[error("{object} implements {interface}, which is not an interface")]
    InvalidInterface { object: Name, interface: Name },

    #[error("Union {union} member {member} is not an object type")]
    InvalidUnionMember { union: Name, member: Name },
}

pub struct Schema {
    types: IndexMap<Name, MetaType>,
    query_type: Name,
    mutation_type: Option<Name>,
    subscription_type: Option<Name>,
    directives: IndexMap<Name, DirectiveDefinition>,
    possible_types: HashMap<Name, IndexSet<Name>>,
    resolve_type: Option<SchemaResolveTypeFn>,
    unauthorized_object: Option<UnauthorizedFn>,
    unauthorized_field: Option<UnauthorizedFn>,
    rescue: Option<RescueFn>,
}

impl Schema {
    pub fn build(query_type: &str) -> SchemaBuilder {
        SchemaBuilder::new(query_type)
    }

    pub fn type_by_name(&self, name: &str) -> Option<&MetaType> {
        self.types.get(name)
    }

    pub fn object_type(&self, name: &str) -> Option<&ObjectType> {
        match self.types.get(name) {
            Some(MetaType::Object(object)) => Some(object),
            _ => None,
        }
    }

    pub fn directive(&self, name: &str) -> Option<&DirectiveDefinition> {
        self.directives.get(name)
    }

    pub fn query_type(&self) -> &Name {
        &self.query_type
    }

    pub fn mutation_type(&self) -> Option<&Name> {
        self.mutation_type.as_ref()
    }

    pub fn subscription_type(&self) -> Option<&Name> {
        self.subscription_type.as_ref()
    }

    /// Object types a value of type `name` may have at runtime.
    pub fn possible_types(&self, name: &str) -> Option<&IndexSet<Name>> {
        self.possible_types.get(name)
    }

    /// Whether an object of `object_type` satisfies a type condition on `condition`.
    pub fn is_possible_type(&self, condition: &str, object_type: &str) -> bool {
        self.possible_types
            .get(condition)
            .is_some_and(|possible| possible.contains(object_type))
    }

    pub(crate) fn root_type(&self, operation: OperationType) -> Option<&ObjectType> {
        let name = match operation {
            OperationType::Query => Some(&self.query_type),
            OperationType::Mutation => self.mutation_type.as_ref(),
            OperationType::Subscription => self.subscription_type.as_ref(),
        }?;
        self.object_type(name)
    }

    /// Find the concrete type of `value` at a position typed as `abstract_type`: the abstract
    /// type's own hook first, then the schema-wide hook, then a `__typename` key on data.
    pub(crate) fn resolve_type(
        &self,
        abstract_type: &MetaType,
        value: &AppValue,
        context: &QueryContext,
    ) -> Option<MaybeLazy<Name>> {
        if let Some(resolver) = abstract_type.type_resolver() {
            return Some(resolver(value, context));
        }

        if let Some(resolved) = self
            .resolve_type
            .as_ref()
            .and_then(|resolver| resolver(abstract_type.name(), value, context))
        {
            return Some(resolved);
        }

        match value {
            AppValue::Data(ConstValue::Object(fields)) => match fields.get("__typename") {
                Some(ConstValue::String(name)) => Some(MaybeLazy::Ready(Name::new(name))),
                Some(ConstValue::Enum(name)) => Some(MaybeLazy::Ready(name.clone())),
                _ => None,
            },
            _ => None,
        }
    }

    /// The replacement for a value that failed authorization. Without a hook, `null`.
    pub(crate) fn unauthorized(
        &self,
        error: &UnauthorizedError,
        context: &QueryContext,
    ) -> Result<ResolvedValue, ExecutionError> {
        let hook = match error {
            UnauthorizedError::Object { .. } => self.unauthorized_object.as_ref(),
            UnauthorizedError::Field { .. } => self
                .unauthorized_field
                .as_ref()
                .or(self.unauthorized_object.as_ref()),
        };

        match hook {
            Some(hook) => hook(error, context),
            None => Ok(ResolvedValue::null()),
        }
    }

    /// Give the rescue hook a chance to turn an unexpected error into an expected one.
    pub(crate) fn rescue(
        &self,
        error: &SharedError,
        context: &ErrorContext<'_>,
    ) -> Option<ExecutionError> {
        self.rescue.as_ref().and_then(|rescue| rescue(error, context))
    }
}

pub struct SchemaBuilder {
    types: IndexMap<Name, MetaType>,
    duplicates: Vec<Name>,
    query_type: Name,
    mutation_type: Option<Name>,
    subscription_type: Option<Name>,
    directives: IndexMap<Name, DirectiveDefinition>,
    resolve_type: Option<SchemaResolveTypeFn>,
    unauthorized_object: Option<UnauthorizedFn>,
    unauthorized_field: Option<UnauthorizedFn>,
    rescue: Option<RescueFn>,
}

impl SchemaBuilder {
    pub fn new(query_type: &str) -> Self {
        let mut builder = Self {
            types: IndexMap::new(),
            duplicates: vec![],
            query_type: Name::new(query_type),
            mutation_type: None,
            subscription_type: None,
            directives: IndexMap::new(),
            resolve_type: None,
            unauthorized_object: None,
            unauthorized_field: None,
            rescue: None,
        };

        for scalar in scalars::built_in_scalars() {
            builder = builder.register(scalar);
        }
        for directive in directive::built_in_directives() {
            builder = builder.directive(directive);
        }
        builder
    }

    pub fn mutation(mut self, name: &str) -> Self {
        self.mutation_type = Some(Name::new(name));
        self
    }

    pub fn subscription(mut self, name: &str) -> Self {
        self.subscription_type = Some(Name::new(name));
        self
    }

    pub fn register(mut self, ty: impl Into<MetaType>) -> Self {
        let ty = ty.into();
        let name = ty.name().clone();
        if self.types.insert(name.clone(), ty).is_some() {
            self.duplicates.push(name);
        }
        self
    }

    /// Registering a directive with a built-in name replaces the built-in.
    pub fn directive(mut self, directive: DirectiveDefinition) -> Self {
        self.directives.insert(directive.name.clone(), directive);
        self
    }

    pub fn resolve_type(
        mut self,
        f: impl Fn(&Name, &AppValue, &QueryContext) -> Option<MaybeLazy<Name>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.resolve_type = Some(Arc::new(f));
        self
    }

    pub fn unauthorized_object(
        mut self,
        f: impl Fn(&UnauthorizedError, &QueryContext) -> Result<ResolvedValue, ExecutionError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.unauthorized_object = Some(Arc::new(f));
        self
    }

    pub fn unauthorized_field(
        mut self,
        f: impl Fn(&UnauthorizedError, &QueryContext) -> Result<ResolvedValue, ExecutionError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.unauthorized_field = Some(Arc::new(f));
        self
    }

    /// Handle unexpected resolver errors. Returning `None` re-raises, aborting the query.
    pub fn rescue<F>(mut self, f: F) -> Self
    where
        F: for<'r> Fn(&SharedError, &ErrorContext<'r>) -> Option<ExecutionError>
            + Send
            + Sync
            + 'static,
    {
        self.rescue = Some(Arc::new(f));
        self
    }

    pub fn finish(self) -> Result<Schema, SchemaError> {
        if let Some(duplicate) = self.duplicates.into_iter().next() {
            return Err(SchemaError::DuplicateType(duplicate));
        }

        let roots = std::iter::once(&self.query_type)
            .chain(self.mutation_type.as_ref())
            .chain(self.subscription_type.as_ref());
        for root in roots {
            match self.types.get(root) {
                Some(MetaType::Object(_)) => {}
                Some(_) => return Err(SchemaError::RootTypeNotObject(root.clone())),
                None => return Err(SchemaError::UnknownRootType(root.clone())),
            }
        }

        let check = |referenced_by: String, ty: &TypeRef| {
            let name = ty.named_type();
            if self.types.contains_key(name) {
                Ok(())
            } else {
                Err(SchemaError::UnknownType {
                    referenced_by,
                    name: name.clone(),
                })
            }
        };
        let check_arguments = |owner: &str, arguments: &IndexMap<Name, InputValueDefinition>| {
            arguments.values().try_for_each(|argument| {
                check(format!("{owner}({}:)", argument.name), &argument.ty)
            })
        };

        let mut possible_types: HashMap<Name, IndexSet<Name>> = HashMap::new();

        for ty in self.types.values() {
            match ty {
                MetaType::Object(object) => {
                    possible_types
                        .entry(object.name.clone())
                        .or_default()
                        .insert(object.name.clone());

                    for field in object.fields.values() {
                        let owner = format!("{}.{}", object.name, field.name);
                        check(owner.clone(), &field.ty)?;
                        check_arguments(&owner, &field.arguments)?;
                    }

                    for interface in &object.interfaces {
                        match self.types.get(interface) {
                            Some(MetaType::Interface(_)) => {
                                possible_types
                                    .entry(interface.clone())
                                    .or_default()
                                    .insert(object.name.clone());
                            }
                            _ => {
                                return Err(SchemaError::InvalidInterface {
                                    object: object.name.clone(),
                                    interface: interface.clone(),
                                });
                            }
                        }
                    }
                }
                MetaType::Union(union) => {
                    let members = possible_types.entry(union.name.clone()).or_default();
                    for member in &union.members {
                        match self.types.get(member) {
                            Some(MetaType::Object(_)) => {
                                members.insert(member.clone());
                            }
                            _ => {
                                return Err(SchemaError::InvalidUnionMember {
                                    union: union.name.clone(),
                                    member: member.clone(),
                                });
                            }
                        }
                    }
                }
                MetaType::Interface(interface) => {
                    possible_types.entry(interface.name.clone()).or_default();
                }
                MetaType::InputObject(input) => {
                    check_arguments(input.name.as_str(), &input.fields)?;
                }
                MetaType::Scalar(_) | MetaType::Enum(_) => {}
            }
        }

        for directive in self.directives.values() {
            check_arguments(&format!("@{}", directive.name), &directive.arguments)?;
        }

        Ok(Schema {
            types: self.types,
            query_type: self.query_type,
            mutation_type: self.mutation_type,
            subscription_type: self.subscription_type,
            directives: self.directives,
            possible_types,
            resolve_type: self.resolve_type,
            unauthorized_object: self.unauthorized_object,
            unauthorized_field: self.unauthorized_field,
            rescue: self.rescue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pets() -> SchemaBuilder {
        SchemaBuilder::new("Query")
            .register(
                ObjectType::new("Query")
                    .field(FieldDefinition::new("pets", "[Pet!]!"))
                    .field(FieldDefinition::new("search", "[SearchResult]")),
            )
            .register(InterfaceType::new("Pet"))
            .register(
                ObjectType::new("Dog")
                    .implements("Pet")
                    .field(FieldDefinition::new("name", "String")),
            )
            .register(
                ObjectType::new("Cat")
                    .implements("Pet")
                    .field(FieldDefinition::new("name", "String")),
            )
            .register(ObjectType::new("Person").field(FieldDefinition::new("name", "String")))
            .register(UnionType::new("SearchResult", ["Dog", "Person"]))
    }

    #[test]
    fn computes_possible_types() {
        let schema = pets().finish().unwrap();

        assert!(schema.is_possible_type("Pet", "Dog"));
        assert!(schema.is_possible_type("Pet", "Cat"));
        assert!(!schema.is_possible_type("Pet", "Person"));
        assert!(schema.is_possible_type("SearchResult", "Person"));
        assert!(!schema.is_possible_type("SearchResult", "Cat"));
        assert!(schema.is_possible_type("Dog", "Dog"));
        assert!(!schema.is_possible_type("Dog", "Cat"));
    }

    #[test]
    fn reports_unknown_types() {
        let err = pets()
            .register(ObjectType::new("Broken").field(FieldDefinition::new("x", "[Missing]")))
            .finish()
            .err();

        assert_eq!(
            err,
            Some(SchemaError::UnknownType {
                referenced_by: "Broken.x".to_string(),
                name: Name::new("Missing")
            })
        );
    }

    #[test]
    fn reports_bad_roots_and_members() {
        assert_eq!(
            SchemaBuilder::new("Nope").finish().err(),
            Some(SchemaError::UnknownRootType(Name::new("Nope")))
        );
        assert_eq!(
            SchemaBuilder::new("Int").finish().err(),
            Some(SchemaError::RootTypeNotObject(Name::new("Int")))
        );
        assert_eq!(
            pets()
                .register(UnionType::new("Bad", ["Pet"]))
                .finish()
                .err(),
            Some(SchemaError::InvalidUnionMember {
                union: Name::new("Bad"),
                member: Name::new("Pet")
            })
        );
    }

    #[test]
    fn typename_fallback_for_data() {
        let schema = pets().finish().unwrap();
        let context = QueryContext::for_tests();
        let pet = schema.type_by_name("Pet").unwrap();
        let value = AppValue::Data(ConstValue::from_json(serde_json::json!({"__typename": "Cat"})).unwrap());

        match schema.resolve_type(pet, &value, &context) {
            Some(MaybeLazy::Ready(name)) => assert_eq!(name.as_str(), "Cat"),
            other => panic!("unexpected resolution {other:?}"),
        }
        assert!(schema.resolve_type(pet, &AppValue::null(), &context).is_none());
    }
}
