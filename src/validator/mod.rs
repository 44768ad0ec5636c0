//! Module for the streaming validation engine
//!
//! A [`Validation`] is one validation run of one JSON document against a compiled schema.
//! Tokens are fed to it one at a time with [`Validation::feed`]; it never buffers tokens and
//! it never materializes the document. Internally every keyword of the schema becomes a
//! state machine (an *instance*) which is created when the value it applies to starts and
//! which is discarded once it has reached its verdict for that value.
//!
//! Most users will not use [`Validation`] directly but one of the bindings:
//! [`ValidatingReader`](crate::reader::ValidatingReader),
//! [`ValidatingWriter`](crate::writer::ValidatingWriter) or
//! [`SchemaValidator::validate_str`](crate::schema::SchemaValidator::validate_str).

mod array;
mod combinator;
mod literal;
mod object;
mod reference;
mod scalar;
pub(crate) mod spec;
mod unique;

use std::{
    borrow::Cow,
    fmt::{Display, Formatter},
    sync::Arc,
};

use struson::reader::LinePosition;
use thiserror::Error;
use tracing::trace;

use crate::{
    location::{Location, StructureError, Tracker},
    schema::CompiledSchema,
    token::Token,
};
use spec::{Keyword, SpecId, Validator};

/// Name of the schema rule which a value violated
///
/// The string form (`Display`) is the name of the JSON Schema keyword, for example
/// `maxLength`, or one of the names `duplicateProperty` and `false` for violations which
/// are not caused by a keyword.
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, strum::IntoStaticStr, Debug)]
#[strum(serialize_all = "camelCase")]
#[non_exhaustive]
pub enum Rule {
    /// `type`
    Type,
    /// `enum`
    Enum,
    /// `const`
    Const,
    /// `multipleOf`
    MultipleOf,
    /// `maximum`
    Maximum,
    /// `exclusiveMaximum`
    ExclusiveMaximum,
    /// `minimum`
    Minimum,
    /// `exclusiveMinimum`
    ExclusiveMinimum,
    /// `maxLength`
    MaxLength,
    /// `minLength`
    MinLength,
    /// `pattern`
    Pattern,
    /// `format`
    Format,
    /// `contentEncoding`
    ContentEncoding,
    /// `contentMediaType`
    ContentMediaType,
    /// `items`
    Items,
    /// `additionalItems`
    AdditionalItems,
    /// `maxItems`
    MaxItems,
    /// `minItems`
    MinItems,
    /// `uniqueItems`
    UniqueItems,
    /// `contains`
    Contains,
    /// `maxProperties`
    MaxProperties,
    /// `minProperties`
    MinProperties,
    /// `required`
    Required,
    /// `properties`
    Properties,
    /// `patternProperties`
    PatternProperties,
    /// `additionalProperties`
    AdditionalProperties,
    /// `dependencies`
    Dependencies,
    /// `propertyNames`
    PropertyNames,
    /// An object contains the same member name multiple times
    DuplicateProperty,
    /// `allOf`
    AllOf,
    /// `anyOf`
    AnyOf,
    /// `oneOf`
    OneOf,
    /// `not`
    Not,
    /// `then` of `if`
    Then,
    /// `else` of `if`
    Else,
    /// `$ref`, reported when a reference cannot be resolved
    #[strum(serialize = "$ref")]
    Ref,
    /// The `false` schema, which no value satisfies
    False,
}

impl Rule {
    /// Gets the name of the rule, the same as its `Display` form
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Rule {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Description of why a value is invalid
///
/// Failures of keywords which apply subschemas (such as `allOf` or `properties`) contain
/// the failures of those subschemas as [`causes`](Self::causes), so the complete tree of
/// failures is available and not only the first leaf.
#[derive(PartialEq, Eq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ValidationFailure {
    /// The violated rule
    pub rule: Rule,
    /// Name of the object member the failure is about, if any
    pub property: Option<String>,
    /// Human-readable description
    pub message: String,
    /// Rendered location of the value in the document
    pub location: String,
    /// Failures of subschemas which caused this failure
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Vec::is_empty"))]
    pub causes: Vec<ValidationFailure>,
}

impl ValidationFailure {
    pub(crate) fn new(rule: Rule, location: &Location<'_>, message: impl Into<String>) -> Self {
        ValidationFailure {
            rule,
            property: None,
            message: message.into(),
            location: location.to_string(),
            causes: Vec::new(),
        }
    }

    pub(crate) fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub(crate) fn with_causes(mut self, causes: Vec<ValidationFailure>) -> Self {
        self.causes = causes;
        self
    }

    /// Gets the failures without any causes below this failure, in depth-first order
    ///
    /// For a failure without causes this is the failure itself.
    pub fn leaves(&self) -> Vec<&ValidationFailure> {
        if self.causes.is_empty() {
            return vec![self];
        }
        self.causes.iter().flat_map(|c| c.leaves()).collect()
    }

    fn fmt_indented(&self, f: &mut Formatter<'_>, indentation: usize) -> std::fmt::Result {
        write!(f, "{:indentation$}{}: {} at {}", "", self.rule, self.message, self.location)?;
        for cause in &self.causes {
            writeln!(f)?;
            cause.fmt_indented(f, indentation + 2)?;
        }
        Ok(())
    }
}

impl Display for ValidationFailure {
    /// Writes the failure and, indented on the following lines, all of its causes
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// Result of validating a complete value
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Verdict {
    /// The value satisfies the schema
    Valid,
    /// The value violates the schema
    Invalid(ValidationFailure),
}

impl Verdict {
    /// Whether this is [`Verdict::Valid`]
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }

    /// Gets the failure, `None` if valid
    pub fn failure(&self) -> Option<&ValidationFailure> {
        match self {
            Verdict::Valid => None,
            Verdict::Invalid(failure) => Some(failure),
        }
    }

    /// Converts the verdict to a `Result`
    pub fn into_result(self) -> Result<(), ValidationFailure> {
        match self {
            Verdict::Valid => Ok(()),
            Verdict::Invalid(failure) => Err(failure),
        }
    }
}

/// Error for a token sequence which does not form a JSON document
///
/// Token sources which read well-formed JSON never cause these errors; they indicate that
/// the host driving the validation fed tokens in an invalid order.
#[derive(Error, PartialEq, Eq, Clone, Debug)]
pub enum EngineError {
    /// A token is not allowed at its position in the token sequence
    #[error("malformed token sequence at {location}: {error}")]
    MalformedTokens {
        /// Description of the malformed sequence
        error: StructureError,
        /// Rendered location of the last valid token
        location: String,
    },
    /// The document was finished before its top-level value was complete
    #[error("incomplete document at {location}")]
    IncompleteDocument {
        /// Rendered location of the last token
        location: String,
    },
}

/// Progress of an instance after a token
pub(crate) enum Step {
    /// No verdict yet, more tokens are needed
    Pending,
    Valid,
    Invalid(ValidationFailure),
}

/// State machine validating a single value against one schema or keyword
///
/// An instance is created at the level of the value it validates, and is fed that value's
/// tokens, starting with its first token, until it returns something other than
/// [`Step::Pending`]. At the latest the last token of the value must resolve it. An
/// instance must return [`Step::Valid`] for the first token of a value whose type its
/// keyword does not apply to.
pub(crate) trait Instance {
    fn validate(&mut self, token: &Token, location: &Location<'_>) -> Step;
}

pub(crate) type BoxedInstance<'s> = Box<dyn Instance + 's>;

/// Instance with a fixed result, for boolean schemas and broken references
pub(crate) enum Constant {
    Valid,
    Invalid {
        rule: Rule,
        message: Cow<'static, str>,
    },
}

impl Instance for Constant {
    fn validate(&mut self, _token: &Token, location: &Location<'_>) -> Step {
        match self {
            Constant::Valid => Step::Valid,
            Constant::Invalid { rule, message } => {
                Step::Invalid(ValidationFailure::new(*rule, location, message.to_string()))
            }
        }
    }
}

/// Combines the keywords of one schema with AND semantics
struct KeywordSet<'s> {
    parts: Vec<BoxedInstance<'s>>,
}

impl Instance for KeywordSet<'_> {
    fn validate(&mut self, token: &Token, location: &Location<'_>) -> Step {
        let mut i = 0;
        while i < self.parts.len() {
            match self.parts[i].validate(token, location) {
                Step::Pending => i += 1,
                Step::Valid => {
                    self.parts.remove(i);
                }
                invalid @ Step::Invalid(_) => return invalid,
            }
        }
        if self.parts.is_empty() {
            Step::Valid
        } else {
            Step::Pending
        }
    }
}

/// Upper bound for nested instantiation without consuming tokens, independent of cycles
const MAX_EAGER_DEPTH: usize = 256;

/// Creates the instance for the value at `level`
///
/// `eager_path` contains the specs whose instantiation is in progress for the same token.
/// Finding `id` in it means the schema refers to itself without consuming anything, which
/// would otherwise recurse without end.
pub(crate) fn instantiate<'s>(
    schema: &'s CompiledSchema,
    id: SpecId,
    level: usize,
    eager_path: &mut Vec<SpecId>,
) -> BoxedInstance<'s> {
    if eager_path.contains(&id) || eager_path.len() >= MAX_EAGER_DEPTH {
        return Box::new(Constant::Invalid {
            rule: Rule::Ref,
            message: Cow::Borrowed("schema refers to itself without applying to a nested value"),
        });
    }

    eager_path.push(id);
    let instance: BoxedInstance<'s> = match schema.spec(id) {
        Validator::Always(true) => Box::new(Constant::Valid),
        Validator::Always(false) => Box::new(Constant::Invalid {
            rule: Rule::False,
            message: Cow::Borrowed("no value is allowed"),
        }),
        Validator::Ref(reference) => {
            reference::instantiate_ref(schema, reference, level, eager_path)
        }
        Validator::Keywords(keywords) => {
            let mut parts = keywords
                .iter()
                .map(|keyword| instantiate_keyword(schema, keyword, level, eager_path))
                .collect::<Vec<_>>();
            match parts.len() {
                0 => Box::new(Constant::Valid),
                1 => parts.remove(0),
                _ => Box::new(KeywordSet { parts }),
            }
        }
    };
    eager_path.pop();
    instance
}

/// Creates the instance for a value nested inside of the value of the calling instance
pub(crate) fn instantiate_nested<'s>(
    schema: &'s CompiledSchema,
    id: SpecId,
    level: usize,
) -> BoxedInstance<'s> {
    instantiate(schema, id, level, &mut Vec::new())
}

fn instantiate_keyword<'s>(
    schema: &'s CompiledSchema,
    keyword: &'s Keyword,
    level: usize,
    eager_path: &mut Vec<SpecId>,
) -> BoxedInstance<'s> {
    match keyword {
        Keyword::Type(_)
        | Keyword::Numeric(_)
        | Keyword::String(_)
        | Keyword::Format(_)
        | Keyword::Content(_) => Box::new(scalar::ScalarInstance::new(keyword)),
        Keyword::Const(value) => literal::const_instance(value),
        Keyword::Enum(values) => literal::enum_instance(values),
        Keyword::Array(spec) => Box::new(array::ArrayInstance::new(schema, spec, level)),
        Keyword::Object(spec) => {
            Box::new(object::ObjectInstance::new(schema, spec, level, eager_path))
        }
        Keyword::Combinator(kind, branches) => Box::new(combinator::CombinatorInstance::new(
            schema,
            *kind,
            branches,
            level,
            eager_path,
        )),
        Keyword::Not(id) => Box::new(combinator::NotInstance::new(
            instantiate(schema, *id, level, eager_path),
        )),
        Keyword::Conditional {
            condition,
            then,
            otherwise,
        } => Box::new(combinator::ConditionalInstance::new(
            schema,
            *condition,
            *then,
            *otherwise,
            level,
            eager_path,
        )),
    }
}

/// One validation run of a single JSON document
///
/// Created with [`SchemaValidator::validation`](crate::schema::SchemaValidator::validation).
/// Feed all tokens of the document, including a final [`Token::EndOfStream`], and then
/// call [`finish`](Self::finish). The verdict is known as soon as [`feed`](Self::feed)
/// returns `Some`; in particular for an invalid document this is normally the case
/// before the end of the document. The remaining tokens only have to be fed if the caller
/// wants the token sequence checked to be complete and well-formed.
///
/// # Examples
/// ```
/// # use struson_schema::{schema::CompiledSchema, Token};
/// let schema = CompiledSchema::from_json(r#"{"items": {"type": "string"}}"#)?;
/// let mut validation = schema.root().validation();
/// assert!(validation.feed(&Token::StartArray)?.is_none());
/// let verdict = validation.feed(&Token::number(1))?;
/// assert!(matches!(verdict, Some(v) if !v.is_valid()));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Validation<'s> {
    root: Option<BoxedInstance<'s>>,
    tracker: Tracker,
    verdict: Option<Verdict>,
}

impl<'s> Validation<'s> {
    pub(crate) fn new(schema: &'s CompiledSchema, id: SpecId) -> Self {
        Validation {
            root: Some(instantiate(schema, id, 0, &mut Vec::new())),
            tracker: Tracker::new(),
            verdict: None,
        }
    }

    /// Sets the name of the document source, which is included in failure locations
    pub fn set_source_name(&mut self, source_name: impl Into<Arc<str>>) {
        self.tracker.set_source_name(Some(source_name.into()));
    }

    /// Sets the line position of the next token, which is included in failure locations
    pub fn set_line_position(&mut self, line_pos: Option<LinePosition>) {
        self.tracker.set_line_position(line_pos);
    }

    /// Validates the next token
    ///
    /// Returns the verdict once it is known. Afterwards further tokens are only checked
    /// for structural correctness. A document is only known to be valid once its top-level
    /// value is complete, because any later object could still repeat a member name.
    pub fn feed(&mut self, token: &Token) -> Result<Option<&Verdict>, EngineError> {
        if let Err(error) = self.tracker.consume(token) {
            return Err(EngineError::MalformedTokens {
                error,
                location: self.tracker.location().to_string(),
            });
        }

        if self.verdict.is_some() || *token == Token::EndOfStream {
            return Ok(self.verdict.as_ref());
        }
        let location = self.tracker.location();

        // Applies to every object, regardless of the schema
        if let Token::FieldName(name) = token {
            if location.is_duplicate_name() {
                let failure = ValidationFailure::new(
                    Rule::DuplicateProperty,
                    &location,
                    format!("property '{name}' occurs multiple times"),
                )
                .with_property(name);
                trace!("verdict at {location}: duplicate property '{name}'");
                self.verdict = Some(Verdict::Invalid(failure));
                self.root = None;
                return Ok(self.verdict.as_ref());
            }
        }

        if let Some(root) = self.root.as_mut() {
            match root.validate(token, &location) {
                Step::Pending => {}
                // Remaining member names still have to be checked for duplicates
                Step::Valid => self.root = None,
                Step::Invalid(failure) => {
                    trace!("verdict at {location}: {failure:?}");
                    self.verdict = Some(Verdict::Invalid(failure));
                    self.root = None;
                }
            }
        }
        if self.root.is_none() && self.verdict.is_none() && self.tracker.is_complete() {
            trace!("verdict at {location}: valid");
            self.verdict = Some(Verdict::Valid);
        }
        Ok(self.verdict.as_ref())
    }

    /// Gets the verdict, `None` if not known yet
    pub fn verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    /// Whether the top-level value of the document has been completely fed
    pub fn is_complete(&self) -> bool {
        self.tracker.is_complete()
    }

    /// Finishes the validation and returns the verdict
    ///
    /// Fails if the top-level value of the document is not complete.
    pub fn finish(self) -> Result<Verdict, EngineError> {
        match self.verdict {
            Some(verdict) if self.tracker.is_complete() => Ok(verdict),
            _ => Err(EngineError::IncompleteDocument {
                location: self.tracker.location().to_string(),
            }),
        }
    }
}
