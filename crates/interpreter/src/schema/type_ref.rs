// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;

use async_graphql_parser::types::{BaseType, Type};
use async_graphql_value::Name;

/// A reference to a type at a field or argument position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(Name),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: &str) -> Self {
        TypeRef::Named(Name::new(name))
    }

    /// Parse GraphQL type syntax such as `[Int!]!`.
    ///
    /// Unparseable input is kept as a named reference so that schema validation reports it
    /// as an unknown type.
    pub fn parse(source: &str) -> Self {
        match Type::new(source) {
            Some(ty) => TypeRef::from(&ty),
            None => TypeRef::named(source),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }

    pub fn nullable(&self) -> &TypeRef {
        match self {
            TypeRef::NonNull(inner) => inner,
            other => other,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.nullable(), TypeRef::List(_))
    }

    /// The innermost named type.
    pub fn named_type(&self) -> &Name {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.named_type(),
        }
    }
}

impl From<&Type> for TypeRef {
    fn from(ty: &Type) -> Self {
        let base = match &ty.base {
            BaseType::Named(name) => TypeRef::Named(name.clone()),
            BaseType::List(inner) => TypeRef::List(Box::new(TypeRef::from(inner.as_ref()))),
        };

        if ty.nullable {
            base
        } else {
            TypeRef::NonNull(Box::new(base))
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{name}"),
            TypeRef::List(inner) => write!(f, "[{inner}]"),
            TypeRef::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapped_types() {
        let ty = TypeRef::parse("[Int!]!");

        assert_eq!(
            ty,
            TypeRef::NonNull(Box::new(TypeRef::List(Box::new(TypeRef::NonNull(
                Box::new(TypeRef::named("Int"))
            )))))
        );
        assert!(ty.is_non_null());
        assert!(ty.is_list());
        assert_eq!(ty.named_type().as_str(), "Int");
        assert_eq!(ty.to_string(), "[Int!]!");
    }

    #[test]
    fn garbage_becomes_unknown_name() {
        assert_eq!(TypeRef::parse("[Int"), TypeRef::named("[Int"));
    }
}
