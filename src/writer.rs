//! Module for validating JSON data while it is written
//!
//! [`write_token`] renders [`Token`]s through any struson [`JsonWriter`].
//! [`ValidatingWriter`] wraps a [`JsonWriter`] and validates every value before it is
//! written, so that generating JSON and validating it happen in a single pass.

use std::{io::Error as IoError, str::FromStr};

use struson::writer::{JsonNumberError, JsonWriter};
use thiserror::Error;

use crate::{
    json_number::JsonNumber,
    token::Token,
    validator::{EngineError, Validation, ValidationFailure, Verdict},
};

/// Writes a token to a struson [`JsonWriter`]
///
/// [`Token::EndOfStream`] writes nothing; use [`JsonWriter::finish_document`] to finish
/// the document.
pub fn write_token<W: JsonWriter>(token: &Token, json_writer: &mut W) -> Result<(), JsonNumberError> {
    match token {
        Token::StartObject => json_writer.begin_object()?,
        Token::EndObject => json_writer.end_object()?,
        Token::StartArray => json_writer.begin_array()?,
        Token::EndArray => json_writer.end_array()?,
        Token::FieldName(name) => json_writer.name(name)?,
        Token::Text(value) => json_writer.string_value(value)?,
        Token::Number(value) => json_writer.number_value_from_string(&value.to_string())?,
        Token::Bool(value) => json_writer.bool_value(*value)?,
        Token::Null => json_writer.null_value()?,
        Token::EndOfStream => {}
    }
    Ok(())
}

/// Error which occurred while writing with a [`ValidatingWriter`]
#[derive(Error, Debug)]
pub enum ValidatingWriterError {
    /// The underlying JSON writer failed
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
    /// A number value is not a valid JSON number
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    /// The sequence of written values is not a valid JSON document
    #[error(transparent)]
    EngineError(#[from] EngineError),
    /// The JSON data does not satisfy the schema
    #[error("invalid JSON data: {0}")]
    Invalid(Box<ValidationFailure>),
}

impl From<JsonNumberError> for ValidatingWriterError {
    fn from(error: JsonNumberError) -> Self {
        match error {
            JsonNumberError::InvalidNumber(message) => ValidatingWriterError::InvalidNumber(message),
            JsonNumberError::IoError(e) => ValidatingWriterError::IoError(e),
        }
    }
}

/// JSON writer wrapper which validates all written values against a schema
///
/// The methods mirror those of struson's [`JsonWriter`]. Each value is validated before
/// it is passed to the wrapped writer; once it is known that the JSON data violates the
/// schema, the writing method returns [`ValidatingWriterError::Invalid`] without writing
/// the value, and so does every subsequent call.
///
/// Created with [`SchemaValidator::writer`](crate::schema::SchemaValidator::writer).
///
/// # Examples
/// ```
/// # use struson::writer::JsonStreamWriter;
/// # use struson_schema::{schema::CompiledSchema, writer::ValidatingWriterError};
/// let schema = CompiledSchema::from_json(r#"{"additionalProperties": false}"#)?;
/// let mut writer = Vec::<u8>::new();
/// let mut json_writer = schema.root().writer(JsonStreamWriter::new(&mut writer));
///
/// json_writer.begin_object()?;
/// match json_writer.name("a") {
///     Err(ValidatingWriterError::Invalid(failure)) => {
///         assert_eq!(Some("a".to_owned()), failure.property)
///     }
///     r => panic!("unexpected result: {r:?}"),
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ValidatingWriter<'s, W: JsonWriter> {
    json_writer: W,
    validation: Validation<'s>,
}

impl<'s, W: JsonWriter> ValidatingWriter<'s, W> {
    pub(crate) fn new(validation: Validation<'s>, json_writer: W) -> Self {
        ValidatingWriter {
            json_writer,
            validation,
        }
    }

    fn validate(&mut self, token: &Token) -> Result<(), ValidatingWriterError> {
        match self.validation.feed(token)? {
            Some(Verdict::Invalid(failure)) => {
                Err(ValidatingWriterError::Invalid(Box::new(failure.clone())))
            }
            _ => Ok(()),
        }
    }

    /// Writes a token
    pub fn write_token(&mut self, token: &Token) -> Result<(), ValidatingWriterError> {
        self.validate(token)?;
        Ok(write_token(token, &mut self.json_writer)?)
    }

    /// Begins writing a JSON object
    pub fn begin_object(&mut self) -> Result<(), ValidatingWriterError> {
        self.validate(&Token::StartObject)?;
        Ok(self.json_writer.begin_object()?)
    }

    /// Writes the closing bracket of the current JSON object
    pub fn end_object(&mut self) -> Result<(), ValidatingWriterError> {
        self.validate(&Token::EndObject)?;
        Ok(self.json_writer.end_object()?)
    }

    /// Begins writing a JSON array
    pub fn begin_array(&mut self) -> Result<(), ValidatingWriterError> {
        self.validate(&Token::StartArray)?;
        Ok(self.json_writer.begin_array()?)
    }

    /// Writes the closing bracket of the current JSON array
    pub fn end_array(&mut self) -> Result<(), ValidatingWriterError> {
        self.validate(&Token::EndArray)?;
        Ok(self.json_writer.end_array()?)
    }

    /// Writes the name of the next object member
    pub fn name(&mut self, name: &str) -> Result<(), ValidatingWriterError> {
        self.validate(&Token::field_name(name))?;
        Ok(self.json_writer.name(name)?)
    }

    /// Writes a string value
    pub fn string_value(&mut self, value: &str) -> Result<(), ValidatingWriterError> {
        self.validate(&Token::text(value))?;
        Ok(self.json_writer.string_value(value)?)
    }

    /// Writes a number value given as JSON number string
    pub fn number_value_from_string(&mut self, value: &str) -> Result<(), ValidatingWriterError> {
        let number = JsonNumber::from_str(value)
            .map_err(|e| ValidatingWriterError::InvalidNumber(e.to_string()))?;
        self.validate(&Token::Number(number))?;
        Ok(self.json_writer.number_value_from_string(value)?)
    }

    /// Writes an integer or an arbitrary precision number
    pub fn number_value(&mut self, value: impl Into<JsonNumber>) -> Result<(), ValidatingWriterError> {
        let number = value.into();
        let json = number.to_string();
        self.validate(&Token::Number(number))?;
        Ok(self.json_writer.number_value_from_string(&json)?)
    }

    /// Writes a boolean value
    pub fn bool_value(&mut self, value: bool) -> Result<(), ValidatingWriterError> {
        self.validate(&Token::Bool(value))?;
        Ok(self.json_writer.bool_value(value)?)
    }

    /// Writes a JSON `null` value
    pub fn null_value(&mut self) -> Result<(), ValidatingWriterError> {
        self.validate(&Token::Null)?;
        Ok(self.json_writer.null_value()?)
    }

    /// Gets the verdict, `None` if not known yet
    pub fn verdict(&self) -> Option<&Verdict> {
        self.validation.verdict()
    }

    /// Finishes the document and returns the verdict
    ///
    /// Fails if the top-level value is incomplete.
    pub fn finish_document(self) -> Result<Verdict, ValidatingWriterError> {
        let verdict = self.validation.finish()?;
        self.json_writer.finish_document()?;
        Ok(verdict)
    }
}
