//! Module for loading and compiling schemas
//!
//! Schemas are provided as [`SchemaSource`]s and compiled by a [`SchemaCompiler`] into a
//! [`CompiledSchema`]. Compilation parses the schema documents, registers every schema
//! under each URI it can be referred to by, and turns the keywords into immutable
//! validator specifications. A compiled schema can then be used for any number of
//! validations, also concurrently from multiple threads.
//!
//! # Examples
//! ```
//! # use struson_schema::schema::*;
//! let mut compiler = SchemaCompiler::new();
//! compiler.add_source(
//!     SchemaSource::from_json(r#"{"type": "array", "items": {"$ref": "item.json"}}"#)
//!         .with_base_uri("http://example.com/list.json"),
//! );
//! compiler.add_source(
//!     SchemaSource::from_json(r#"{"type": "integer", "minimum": 0}"#)
//!         .with_base_uri("http://example.com/item.json"),
//! );
//! let schema = compiler.compile()?;
//!
//! assert!(schema.root().validate_str("[1, 2, 3]")?.is_valid());
//! assert!(!schema.root().validate_str("[1, -2]")?.is_valid());
//!
//! let item = schema.get("http://example.com/item.json").unwrap();
//! assert!(item.validate_str("5")?.is_valid());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod compiler;
pub(crate) mod document;
mod uri;

use std::{collections::HashMap, io::Read, sync::Arc};

use struson::{
    reader::{JsonReader, JsonStreamReader, ReaderError, ReaderSettings},
    writer::JsonWriter,
};
use thiserror::Error;

pub use document::JsonType;

use crate::{
    reader::{TokenReader, ValidatingReader, ValidatingReaderError},
    settings::ValidatorSettings,
    token::Token,
    validator::{
        spec::{SpecId, Validator},
        EngineError, Validation, Verdict,
    },
    value::JsonValue,
    writer::ValidatingWriter,
};

/// JSON Schema draft version
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, strum::Display, Debug)]
pub enum Draft {
    /// Draft 4, `http://json-schema.org/draft-04/schema#`
    #[strum(serialize = "draft-04")]
    Draft4,
    /// Draft 6, `http://json-schema.org/draft-06/schema#`
    #[strum(serialize = "draft-06")]
    Draft6,
    /// Draft 7, `http://json-schema.org/draft-07/schema#`
    #[strum(serialize = "draft-07")]
    Draft7,
}

impl Draft {
    /// Detects the draft from the value of `$schema`, `None` if it is not a known draft
    ///
    /// ```
    /// # use struson_schema::schema::Draft;
    /// assert_eq!(
    ///     Some(Draft::Draft6),
    ///     Draft::from_schema_uri("http://json-schema.org/draft-06/schema#")
    /// );
    /// ```
    pub fn from_schema_uri(uri: &str) -> Option<Self> {
        [Draft::Draft4, Draft::Draft6, Draft::Draft7]
            .into_iter()
            .find(|draft| uri.contains(&draft.to_string()))
    }
}

/// Error which occurred while compiling a schema
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SchemaError {
    /// The schema source is not valid JSON, or reading it failed
    #[error("failed reading schema '{name}': {error}")]
    ReaderError {
        /// Name of the schema source
        name: String,
        /// The error reported by the JSON reader
        error: ReaderError,
    },
    /// A keyword has a value which is not allowed for it
    #[error("malformed schema at '{pointer}': {message}")]
    MalformedSchema {
        /// JSON Pointer of the keyword value within the schema document
        pointer: String,
        /// Description of the problem
        message: String,
    },
    /// A regular expression of `pattern` or `patternProperties` is invalid
    #[error("invalid regular expression '{pattern}' at '{pointer}': {error}")]
    InvalidPattern {
        /// JSON Pointer of the regular expression within the schema document
        pointer: String,
        /// The regular expression
        pattern: String,
        /// The error reported by the regex compiler
        error: regex::Error,
    },
    /// Multiple schemas have the same URI
    #[error("multiple schemas have the URI '{uri}'")]
    DuplicateId {
        /// The URI
        uri: String,
    },
    /// The base URI of a schema source is not a valid URI
    #[error("invalid base URI '{uri}': {error}")]
    InvalidBaseUri {
        /// The base URI
        uri: String,
        /// The error reported by the URI parser
        error: url::ParseError,
    },
    /// No schema sources were added to the compiler
    #[error("no schema sources were provided")]
    NoSources,
}

/// JSON text of a schema document, together with information about how to compile it
#[derive(Clone, Debug)]
pub struct SchemaSource {
    json: Vec<u8>,
    base_uri: Option<String>,
    draft: Option<Draft>,
    name: Option<String>,
}

impl SchemaSource {
    /// Creates a source from JSON text
    pub fn from_json(json: impl Into<String>) -> Self {
        SchemaSource::from_bytes(json.into().into_bytes())
    }

    /// Creates a source from UTF-8 encoded JSON bytes
    pub fn from_bytes(json: impl Into<Vec<u8>>) -> Self {
        SchemaSource {
            json: json.into(),
            base_uri: None,
            draft: None,
            name: None,
        }
    }

    /// Creates a source from the complete content of a reader
    pub fn from_reader(mut reader: impl Read) -> std::io::Result<Self> {
        let mut json = Vec::new();
        reader.read_to_end(&mut json)?;
        Ok(SchemaSource::from_bytes(json))
    }

    /// Sets the URI the schema is retrieved from
    ///
    /// Relative `$id` and `$ref` values are resolved against it, and the schema can be
    /// referred to by it. An `$id` of the root schema takes precedence.
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    /// Sets the draft, overriding detection by `$schema`
    pub fn with_draft(mut self, draft: Draft) -> Self {
        self.draft = Some(draft);
        self
    }

    /// Sets the name used for the source in error messages
    ///
    /// Defaults to the base URI.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn display_name(&self, index: usize) -> String {
        match (&self.name, &self.base_uri) {
            (Some(name), _) => name.clone(),
            (None, Some(base_uri)) => base_uri.clone(),
            (None, None) => format!("<schema source {index}>"),
        }
    }

    /// Parses the JSON text
    fn parse(&self, index: usize) -> Result<JsonValue, SchemaError> {
        let json_reader = JsonStreamReader::new_custom(
            self.json.as_slice(),
            ReaderSettings {
                restrict_number_values: false,
                ..Default::default()
            },
        );
        JsonValue::read(json_reader).map_err(|error| SchemaError::ReaderError {
            name: self.display_name(index),
            error,
        })
    }
}

/// Compiles schema sources into a [`CompiledSchema`]
///
/// All sources share one registry of URIs, so `$ref`s can refer to schemas of other sources.
/// The root schema of the first source is the [root](CompiledSchema::root) of the compiled schema.
#[derive(Debug)]
pub struct SchemaCompiler {
    settings: ValidatorSettings,
    sources: Vec<SchemaSource>,
}

impl SchemaCompiler {
    /// Creates a compiler with default settings
    pub fn new() -> Self {
        SchemaCompiler::new_custom(ValidatorSettings::default())
    }

    /// Creates a compiler with custom settings
    pub fn new_custom(settings: ValidatorSettings) -> Self {
        SchemaCompiler {
            settings,
            sources: Vec::new(),
        }
    }

    /// Adds a source to compile
    pub fn add_source(&mut self, source: SchemaSource) -> &mut Self {
        self.sources.push(source);
        self
    }

    /// Compiles all sources
    pub fn compile(self) -> Result<CompiledSchema, SchemaError> {
        if self.sources.is_empty() {
            return Err(SchemaError::NoSources);
        }

        let mut compiler = compiler::Compiler::new(&self.settings);
        let mut roots = Vec::new();
        for (index, source) in self.sources.iter().enumerate() {
            let value = source.parse(index)?;
            let base_uri = source.base_uri.as_deref().unwrap_or_default();
            if !base_uri.is_empty() {
                if let Err(error) = url::Url::parse(base_uri) {
                    // Relative base URIs are allowed, but must at least be usable as relative URL
                    if error != url::ParseError::RelativeUrlWithoutBase {
                        return Err(SchemaError::InvalidBaseUri {
                            uri: base_uri.to_owned(),
                            error,
                        });
                    }
                }
            }
            let draft = source
                .draft
                .or_else(|| match &value {
                    JsonValue::Object(members) => members
                        .get("$schema")
                        .and_then(JsonValue::as_str)
                        .and_then(Draft::from_schema_uri),
                    _ => None,
                })
                .unwrap_or(self.settings.default_draft);
            roots.push(compiler.compile_document(&value, base_uri, draft)?);
        }

        let (specs, registry) = compiler.finish();
        Ok(CompiledSchema {
            specs,
            registry,
            roots,
            settings: Arc::new(self.settings),
        })
    }
}

impl Default for SchemaCompiler {
    fn default() -> Self {
        SchemaCompiler::new()
    }
}

/// Schemas compiled by a [`SchemaCompiler`]
///
/// A compiled schema is immutable and can be shared between threads; each validation
/// creates its own state.
#[derive(Debug)]
pub struct CompiledSchema {
    specs: Vec<Validator>,
    registry: HashMap<String, SpecId>,
    /// Root schema and its base URI, for each source
    roots: Vec<(SpecId, String)>,
    settings: Arc<ValidatorSettings>,
}

impl CompiledSchema {
    /// Compiles a single schema from JSON text, with default settings
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let mut compiler = SchemaCompiler::new();
        compiler.add_source(SchemaSource::from_json(json));
        compiler.compile()
    }

    /// Gets a validator for the root schema of the first source
    pub fn root(&self) -> SchemaValidator<'_> {
        SchemaValidator {
            schema: self,
            id: self.roots[0].0,
        }
    }

    /// Gets a validator for the schema with the given URI
    ///
    /// The URI is resolved against the base URI of the first source, so for a schema
    /// without base URI a JSON Pointer fragment such as `#/definitions/a` can be used.
    pub fn get(&self, uri: &str) -> Option<SchemaValidator<'_>> {
        let id = self.lookup(&uri::registry_key(uri)).or_else(|| {
            let resolved = uri::resolve(&self.roots[0].1, uri);
            self.lookup(&uri::registry_key(&resolved))
        })?;
        Some(SchemaValidator { schema: self, id })
    }

    /// Gets all URIs schemas are registered under, in no particular order
    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.registry.keys().map(String::as_str)
    }

    /// Gets the settings the schema was compiled with
    pub fn settings(&self) -> &ValidatorSettings {
        &self.settings
    }

    pub(crate) fn spec(&self, id: SpecId) -> &Validator {
        &self.specs[id.0]
    }

    pub(crate) fn lookup(&self, key: &str) -> Option<SpecId> {
        self.registry.get(key).copied()
    }
}

/// Validator for one schema of a [`CompiledSchema`]
#[derive(Clone, Copy, Debug)]
pub struct SchemaValidator<'s> {
    schema: &'s CompiledSchema,
    id: SpecId,
}

impl<'s> SchemaValidator<'s> {
    /// Starts a validation run, which is fed tokens manually
    pub fn validation(&self) -> Validation<'s> {
        Validation::new(self.schema, self.id)
    }

    /// Validates a complete token sequence
    ///
    /// A trailing [`Token::EndOfStream`] is optional.
    pub fn validate_tokens(
        &self,
        tokens: impl IntoIterator<Item = Token>,
    ) -> Result<Verdict, EngineError> {
        let mut validation = self.validation();
        for token in tokens {
            validation.feed(&token)?;
        }
        validation.finish()
    }

    /// Reads a JSON document from a struson [`JsonReader`] and validates it
    ///
    /// The document is read completely, even if it is known to be invalid early.
    pub fn validate_reader<J: JsonReader>(
        &self,
        json_reader: J,
    ) -> Result<Verdict, ValidatingReaderError> {
        let mut tokens = TokenReader::new(json_reader);
        let mut validation = self.validation();
        loop {
            let token = tokens.next_token()?;
            validation.set_line_position(tokens.line_position());
            validation.feed(&token)?;
            if token == Token::EndOfStream {
                tokens.finish()?;
                return Ok(validation.finish()?);
            }
        }
    }

    /// Validates JSON text
    ///
    /// # Examples
    /// ```
    /// # use struson_schema::schema::CompiledSchema;
    /// let schema = CompiledSchema::from_json(r#"{"required": ["a"]}"#)?;
    /// let verdict = schema.root().validate_str(r#"{"b": 1}"#)?;
    /// assert_eq!("required", verdict.failure().unwrap().rule.to_string());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn validate_str(&self, json: &str) -> Result<Verdict, ValidatingReaderError> {
        self.validate_reader(JsonStreamReader::new(json.as_bytes()))
    }

    /// Wraps a struson [`JsonReader`] so that everything read from it is validated
    pub fn reader<J: JsonReader>(&self, json_reader: J) -> ValidatingReader<'s, J> {
        ValidatingReader::new(self.validation(), json_reader)
    }

    /// Wraps a struson [`JsonWriter`] so that everything written to it is validated
    pub fn writer<W: JsonWriter>(&self, json_writer: W) -> ValidatingWriter<'s, W> {
        ValidatingWriter::new(self.validation(), json_writer)
    }

    /// Validates a `serde_json` value
    ///
    /// Fails only if a number of the value cannot be represented, which is not the case for
    /// values created by `serde_json` itself.
    #[cfg(feature = "serde")]
    pub fn validate_value(
        &self,
        value: &serde_json::Value,
    ) -> Result<Verdict, crate::serde::ValueValidationError> {
        crate::serde::validate_value(self.validation(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn draft_detection() {
        assert_eq!(
            Some(Draft::Draft4),
            Draft::from_schema_uri("http://json-schema.org/draft-04/schema#")
        );
        assert_eq!(
            Some(Draft::Draft7),
            Draft::from_schema_uri("https://json-schema.org/draft-07/schema")
        );
        assert_eq!(
            None,
            Draft::from_schema_uri("https://json-schema.org/draft/2020-12/schema")
        );
        assert_eq!("draft-06", Draft::Draft6.to_string());
    }

    #[test]
    fn draft_from_schema_member() -> TestResult {
        // In draft 4 `exclusiveMaximum` is a flag modifying `maximum`
        let schema = CompiledSchema::from_json(
            r#"{
                "$schema": "http://json-schema.org/draft-04/schema#",
                "maximum": 5,
                "exclusiveMaximum": true
            }"#,
        )?;
        assert!(schema.root().validate_str("4")?.is_valid());
        assert!(!schema.root().validate_str("5")?.is_valid());

        // An explicitly specified draft wins
        let mut compiler = SchemaCompiler::new();
        compiler.add_source(
            SchemaSource::from_json(
                r#"{"$schema": "http://json-schema.org/draft-04/schema#", "const": 1}"#,
            )
            .with_draft(Draft::Draft6),
        );
        let schema = compiler.compile()?;
        assert!(!schema.root().validate_str("2")?.is_valid());
        Ok(())
    }

    #[test]
    fn compile_errors() {
        assert!(matches!(
            SchemaCompiler::new().compile(),
            Err(SchemaError::NoSources)
        ));
        assert!(matches!(
            CompiledSchema::from_json("{"),
            Err(SchemaError::ReaderError { .. })
        ));
        assert!(matches!(
            CompiledSchema::from_json("{} []"),
            Err(SchemaError::ReaderError { .. })
        ));

        let mut compiler = SchemaCompiler::new();
        compiler.add_source(SchemaSource::from_json("{}").with_base_uri("http://[invalid"));
        assert!(matches!(
            compiler.compile(),
            Err(SchemaError::InvalidBaseUri { .. })
        ));
    }

    #[test]
    fn reader_error_names_source() {
        let mut compiler = SchemaCompiler::new();
        compiler.add_source(SchemaSource::from_json("[1,").with_name("broken.json"));
        match compiler.compile() {
            Err(e @ SchemaError::ReaderError { .. }) => {
                assert!(e.to_string().starts_with("failed reading schema 'broken.json': "));
            }
            r => panic!("unexpected result: {r:?}"),
        }
    }

    #[test]
    fn get_by_pointer() -> TestResult {
        let schema = CompiledSchema::from_json(
            r#"{"definitions": {"positive": {"minimum": 1}}, "type": "integer"}"#,
        )?;
        let positive = schema
            .get("#/definitions/positive")
            .ok_or("missing definition")?;
        assert!(positive.validate_str("1.5")?.is_valid());
        assert!(!positive.validate_str("0")?.is_valid());
        assert!(schema.get("#/definitions/missing").is_none());
        assert!(schema.uris().any(|uri| uri == "#/definitions/positive"));
        Ok(())
    }

    #[test]
    fn shared_between_threads() -> TestResult {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CompiledSchema>();

        let schema = CompiledSchema::from_json(
            r##"{"type": "array", "items": {"$ref": "#/definitions/item"}, "definitions": {"item": {"type": "integer"}}}"##,
        )?;
        std::thread::scope(|scope| {
            let handles = (0..4)
                .map(|i| {
                    let schema = &schema;
                    scope.spawn(move || {
                        let json = if i % 2 == 0 { "[1, 2]" } else { "[1, \"2\"]" };
                        schema.root().validate_str(json).map(|v| v.is_valid())
                    })
                })
                .collect::<Vec<_>>();
            for (i, handle) in handles.into_iter().enumerate() {
                let valid = handle.join().expect("thread panicked");
                assert_eq!(Ok(i % 2 == 0), valid.map_err(|e| e.to_string()));
            }
        });
        Ok(())
    }
}
