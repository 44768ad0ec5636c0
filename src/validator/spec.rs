//! Compiled validator specifications
//!
//! Specifications are immutable data produced by the compiler. They live in the arena of a
//! [`CompiledSchema`](crate::schema::CompiledSchema) and refer to each other by [`SpecId`],
//! which allows cyclic schemas without reference counting.

use std::{fmt::Debug, sync::OnceLock};

use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::{
    format::FormatCheck, json_number::JsonNumber, schema::document::JsonType,
    schema::document::Pattern, schema::CompiledSchema, value::JsonValue,
};

/// Index of a specification in the arena of a compiled schema
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub(crate) struct SpecId(pub(crate) usize);

#[derive(Debug)]
pub(crate) enum Validator {
    /// `true` and `false` schemas; the empty schema compiles to `Always(true)`
    Always(bool),
    Ref(RefSpec),
    /// Keywords which must all be satisfied
    Keywords(Vec<Keyword>),
}

/// Target of a `$ref`, resolved when first instantiated
#[derive(Debug)]
pub(crate) struct RefSpec {
    /// Resolved target URI, in registry key form
    pub(crate) target: String,
    resolved: OnceLock<Option<SpecId>>,
}

impl RefSpec {
    pub(crate) fn new(target: String) -> Self {
        RefSpec {
            target,
            resolved: OnceLock::new(),
        }
    }

    pub(crate) fn resolve(&self, schema: &CompiledSchema) -> Option<SpecId> {
        *self.resolved.get_or_init(|| {
            let resolved = schema.lookup(&self.target);
            match resolved {
                Some(id) => trace!("resolved reference '{}' to {id:?}", self.target),
                None => warn!("unresolved reference '{}'", self.target),
            }
            resolved
        })
    }
}

#[derive(Debug)]
pub(crate) enum Keyword {
    Type(Vec<JsonType>),
    Numeric(NumericSpec),
    String(StringSpec),
    Format(FormatSpec),
    Content(ContentSpec),
    Const(JsonValue),
    Enum(Vec<JsonValue>),
    Array(ArraySpec),
    Object(ObjectSpec),
    Combinator(Combinator, Vec<SpecId>),
    Not(SpecId),
    Conditional {
        condition: SpecId,
        then: Option<SpecId>,
        otherwise: Option<SpecId>,
    },
}

#[derive(Debug, Default)]
pub(crate) struct NumericSpec {
    pub(crate) minimum: Option<JsonNumber>,
    pub(crate) exclusive_minimum: Option<JsonNumber>,
    pub(crate) maximum: Option<JsonNumber>,
    pub(crate) exclusive_maximum: Option<JsonNumber>,
    pub(crate) multiple_of: Option<JsonNumber>,
}

#[derive(Debug, Default)]
pub(crate) struct StringSpec {
    pub(crate) min_length: Option<u64>,
    pub(crate) max_length: Option<u64>,
    pub(crate) pattern: Option<Pattern>,
}

pub(crate) struct FormatSpec {
    pub(crate) name: String,
    pub(crate) check: FormatCheck,
}

impl Debug for FormatSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatSpec")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub(crate) struct ContentSpec {
    /// Whether the string is base64 encoded
    pub(crate) base64: bool,
    /// Whether the (decoded) string must be JSON
    pub(crate) json: bool,
}

#[derive(Debug)]
pub(crate) enum ItemsSpec {
    Any,
    All(SpecId),
    Tuple {
        items: Vec<SpecId>,
        additional: Option<SpecId>,
    },
}

#[derive(Debug)]
pub(crate) struct ArraySpec {
    pub(crate) items: ItemsSpec,
    pub(crate) contains: Option<SpecId>,
    pub(crate) min_items: Option<u64>,
    pub(crate) max_items: Option<u64>,
    pub(crate) unique_items: bool,
}

#[derive(Debug)]
pub(crate) enum DependencySpec {
    Schema(SpecId),
    Properties(Vec<String>),
}

#[derive(Debug, Default)]
pub(crate) struct ObjectSpec {
    pub(crate) properties: IndexMap<String, SpecId>,
    pub(crate) pattern_properties: Vec<(Pattern, SpecId)>,
    pub(crate) additional_properties: Option<SpecId>,
    pub(crate) required: Vec<String>,
    pub(crate) min_properties: Option<u64>,
    pub(crate) max_properties: Option<u64>,
    pub(crate) property_names: Option<SpecId>,
    pub(crate) dependencies: Vec<(String, DependencySpec)>,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub(crate) enum Combinator {
    AllOf,
    AnyOf,
    OneOf,
}
