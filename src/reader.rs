//! Module for validating JSON data while it is read
//!
//! [`TokenReader`] turns any struson [`JsonReader`] into a source of [`Token`]s.
//! [`ValidatingReader`] wraps a [`JsonReader`] and validates every value the user reads
//! from it, so that reading and validation happen in a single pass.

use std::str::FromStr;

use struson::reader::{JsonReader, LinePosition, ReaderError, ValueType};
use thiserror::Error;

use crate::{
    json_number::JsonNumber,
    token::Token,
    validator::{EngineError, Validation, ValidationFailure, Verdict},
};

fn parse_number<J: JsonReader>(json_reader: &J, number: String) -> Result<Token, ReaderError> {
    match JsonNumber::from_str(&number) {
        Ok(n) => Ok(Token::Number(n)),
        Err(_) => Err(ReaderError::UnsupportedNumberValue {
            number,
            location: json_reader.current_position(true),
        }),
    }
}

/// Reads [`Token`]s from a struson [`JsonReader`]
///
/// After the top-level value, [`Token::EndOfStream`] is returned for all subsequent calls.
/// Use [`finish`](Self::finish) to verify that the JSON document has no trailing data.
///
/// # Examples
/// ```
/// # use struson::reader::JsonStreamReader;
/// # use struson_schema::{reader::TokenReader, Token};
/// let mut tokens = TokenReader::new(JsonStreamReader::new(r#"{"a": true}"#.as_bytes()));
/// assert_eq!(Token::StartObject, tokens.next_token()?);
/// assert_eq!(Token::field_name("a"), tokens.next_token()?);
/// assert_eq!(Token::Bool(true), tokens.next_token()?);
/// assert_eq!(Token::EndObject, tokens.next_token()?);
/// assert_eq!(Token::EndOfStream, tokens.next_token()?);
/// tokens.finish()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct TokenReader<J: JsonReader> {
    json_reader: J,
    /// For each enclosing array or object, whether it is an object
    stack: Vec<bool>,
    /// Whether a member name has been read whose value has not been read yet
    expects_value: bool,
    complete: bool,
    /// Position of the last read token
    line_pos: Option<LinePosition>,
}

impl<J: JsonReader> TokenReader<J> {
    /// Creates a token reader for a JSON reader positioned at the start of the document
    pub fn new(json_reader: J) -> Self {
        TokenReader {
            json_reader,
            stack: Vec::new(),
            expects_value: false,
            complete: false,
            line_pos: None,
        }
    }

    /// Reads the next token
    pub fn next_token(&mut self) -> Result<Token, ReaderError> {
        match self.stack.last().copied() {
            None if self.complete => Ok(Token::EndOfStream),
            None => self.read_value(),
            Some(true) if self.expects_value => self.read_value(),
            Some(true) => {
                let has_next = self.json_reader.has_next()?;
                self.update_position();
                if has_next {
                    self.expects_value = true;
                    Ok(Token::FieldName(self.json_reader.next_name_owned()?))
                } else {
                    self.json_reader.end_object()?;
                    self.on_container_end();
                    Ok(Token::EndObject)
                }
            }
            Some(false) => {
                let has_next = self.json_reader.has_next()?;
                self.update_position();
                if has_next {
                    self.read_value()
                } else {
                    self.json_reader.end_array()?;
                    self.on_container_end();
                    Ok(Token::EndArray)
                }
            }
        }
    }

    fn read_value(&mut self) -> Result<Token, ReaderError> {
        self.expects_value = false;
        let value_type = self.json_reader.peek()?;
        self.update_position();
        let token = match value_type {
            ValueType::Object => {
                self.json_reader.begin_object()?;
                self.stack.push(true);
                return Ok(Token::StartObject);
            }
            ValueType::Array => {
                self.json_reader.begin_array()?;
                self.stack.push(false);
                return Ok(Token::StartArray);
            }
            ValueType::String => Token::Text(self.json_reader.next_string()?),
            ValueType::Number => {
                let number = self.json_reader.next_number_as_string()?;
                parse_number(&self.json_reader, number)?
            }
            ValueType::Boolean => Token::Bool(self.json_reader.next_bool()?),
            ValueType::Null => {
                self.json_reader.next_null()?;
                Token::Null
            }
        };
        self.complete = self.stack.is_empty();
        Ok(token)
    }

    fn on_container_end(&mut self) {
        self.stack.pop();
        self.complete = self.stack.is_empty();
    }

    fn update_position(&mut self) {
        self.line_pos = self.json_reader.current_position(false).line_pos;
    }

    /// Gets the line position of the last read token, if the underlying reader provides one
    pub fn line_position(&self) -> Option<LinePosition> {
        self.line_pos
    }

    /// Verifies that the JSON document has no trailing data after the top-level value
    pub fn finish(self) -> Result<(), ReaderError> {
        self.json_reader.consume_trailing_whitespace()
    }
}

/// Error which occurred while reading with a [`ValidatingReader`]
#[derive(Error, Debug)]
pub enum ValidatingReaderError {
    /// The underlying JSON reader failed, for example because of malformed JSON
    #[error(transparent)]
    ReaderError(#[from] ReaderError),
    /// The sequence of read values is not a valid JSON document
    #[error(transparent)]
    EngineError(#[from] EngineError),
    /// The JSON data does not satisfy the schema
    #[error("invalid JSON data: {0}")]
    Invalid(Box<ValidationFailure>),
}

/// JSON reader wrapper which validates all read values against a schema
///
/// The methods mirror those of struson's [`JsonReader`] and delegate to the wrapped reader.
/// Every value read is fed to a [`Validation`]; as soon as it is known that the JSON
/// data violates the schema, the reading method returns [`ValidatingReaderError::Invalid`]
/// and so does every subsequent call. Methods which only inspect the reader, such as
/// [`peek`](Self::peek) and [`has_next`](Self::has_next), do not validate anything.
///
/// Created with [`SchemaValidator::reader`](crate::schema::SchemaValidator::reader).
///
/// # Examples
/// ```
/// # use struson::reader::JsonStreamReader;
/// # use struson_schema::{reader::ValidatingReaderError, schema::CompiledSchema, validator::Rule};
/// let schema = CompiledSchema::from_json(r#"{"items": {"maximum": 10}}"#)?;
/// let mut json_reader = schema
///     .root()
///     .reader(JsonStreamReader::new("[1, 20, 3]".as_bytes()));
///
/// json_reader.begin_array()?;
/// assert_eq!("1", json_reader.next_number_as_string()?);
/// match json_reader.next_number_as_string() {
///     Err(ValidatingReaderError::Invalid(failure)) => assert_eq!(Rule::Items, failure.rule),
///     r => panic!("unexpected result: {r:?}"),
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ValidatingReader<'s, J: JsonReader> {
    json_reader: J,
    validation: Validation<'s>,
}

impl<'s, J: JsonReader> ValidatingReader<'s, J> {
    pub(crate) fn new(validation: Validation<'s>, json_reader: J) -> Self {
        ValidatingReader {
            json_reader,
            validation,
        }
    }

    fn update_position(&mut self) {
        let line_pos = self.json_reader.current_position(false).line_pos;
        self.validation.set_line_position(line_pos);
    }

    fn validate(&mut self, token: &Token) -> Result<(), ValidatingReaderError> {
        match self.validation.feed(token)? {
            Some(Verdict::Invalid(failure)) => {
                Err(ValidatingReaderError::Invalid(Box::new(failure.clone())))
            }
            _ => Ok(()),
        }
    }

    /// Gets the type of the next value, without consuming it
    pub fn peek(&mut self) -> Result<ValueType, ValidatingReaderError> {
        Ok(self.json_reader.peek()?)
    }

    /// Checks if there is a next array item or object member
    pub fn has_next(&mut self) -> Result<bool, ValidatingReaderError> {
        Ok(self.json_reader.has_next()?)
    }

    /// Begins consuming a JSON object
    pub fn begin_object(&mut self) -> Result<(), ValidatingReaderError> {
        self.update_position();
        self.json_reader.begin_object()?;
        self.validate(&Token::StartObject)
    }

    /// Consumes the closing bracket of the current JSON object
    pub fn end_object(&mut self) -> Result<(), ValidatingReaderError> {
        self.update_position();
        self.json_reader.end_object()?;
        self.validate(&Token::EndObject)
    }

    /// Begins consuming a JSON array
    pub fn begin_array(&mut self) -> Result<(), ValidatingReaderError> {
        self.update_position();
        self.json_reader.begin_array()?;
        self.validate(&Token::StartArray)
    }

    /// Consumes the closing bracket of the current JSON array
    pub fn end_array(&mut self) -> Result<(), ValidatingReaderError> {
        self.update_position();
        self.json_reader.end_array()?;
        self.validate(&Token::EndArray)
    }

    /// Consumes the name of the next object member
    pub fn next_name(&mut self) -> Result<String, ValidatingReaderError> {
        self.update_position();
        let name = self.json_reader.next_name_owned()?;
        self.validate(&Token::FieldName(name.clone()))?;
        Ok(name)
    }

    /// Consumes a string value
    pub fn next_string(&mut self) -> Result<String, ValidatingReaderError> {
        self.update_position();
        let value = self.json_reader.next_string()?;
        self.validate(&Token::Text(value.clone()))?;
        Ok(value)
    }

    /// Consumes a number value and returns its string representation
    pub fn next_number_as_string(&mut self) -> Result<String, ValidatingReaderError> {
        self.update_position();
        let number = self.json_reader.next_number_as_string()?;
        let token = parse_number(&self.json_reader, number.clone())?;
        self.validate(&token)?;
        Ok(number)
    }

    /// Consumes a number value and parses it
    pub fn next_number<T: FromStr>(
        &mut self,
    ) -> Result<Result<T, T::Err>, ValidatingReaderError> {
        Ok(T::from_str(&self.next_number_as_string()?))
    }

    /// Consumes a boolean value
    pub fn next_bool(&mut self) -> Result<bool, ValidatingReaderError> {
        self.update_position();
        let value = self.json_reader.next_bool()?;
        self.validate(&Token::Bool(value))?;
        Ok(value)
    }

    /// Consumes a JSON `null` value
    pub fn next_null(&mut self) -> Result<(), ValidatingReaderError> {
        self.update_position();
        self.json_reader.next_null()?;
        self.validate(&Token::Null)
    }

    /// Skips the next value
    ///
    /// Skipped values are validated nonetheless, so this reads the complete value.
    pub fn skip_value(&mut self) -> Result<(), ValidatingReaderError> {
        let mut stack = Vec::<bool>::new();
        loop {
            if let Some(&is_object) = stack.last() {
                if !self.has_next()? {
                    if is_object {
                        self.end_object()?;
                    } else {
                        self.end_array()?;
                    }
                    stack.pop();
                    if stack.is_empty() {
                        return Ok(());
                    }
                    continue;
                }
                if is_object {
                    self.next_name()?;
                }
            }

            match self.peek()? {
                ValueType::Object => {
                    self.begin_object()?;
                    stack.push(true);
                }
                ValueType::Array => {
                    self.begin_array()?;
                    stack.push(false);
                }
                ValueType::String => {
                    self.next_string()?;
                }
                ValueType::Number => {
                    self.next_number_as_string()?;
                }
                ValueType::Boolean => {
                    self.next_bool()?;
                }
                ValueType::Null => self.next_null()?,
            }
            if stack.is_empty() {
                return Ok(());
            }
        }
    }

    /// Gets the verdict, `None` if not known yet
    pub fn verdict(&self) -> Option<&Verdict> {
        self.validation.verdict()
    }

    /// Verifies that the document is complete and has no trailing data, and returns the verdict
    pub fn finish(self) -> Result<Verdict, ValidatingReaderError> {
        self.json_reader.consume_trailing_whitespace()?;
        Ok(self.validation.finish()?)
    }
}
