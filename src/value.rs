//! Module for materialized JSON values
//!
//! [`JsonValue`] is a small tree representation built from tokens by [`ValueBuilder`]. It is
//! used for schema documents, for the literal values of `const` and `enum`, and for
//! exact duplicate detection of array items. Objects are keyed by member name, so two
//! objects are equal regardless of member order.

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    str::FromStr,
};

use struson::{
    reader::{JsonReader, JsonStreamReader, ReaderError, ReaderSettings, ValueType},
    writer::{JsonStreamWriter, JsonWriter},
};

use crate::{json_number::JsonNumber, reader::TokenReader, token::Token, writer::write_token};

/// A materialized JSON value
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub enum JsonValue {
    /// JSON `null`
    Null,
    /// JSON boolean
    Bool(bool),
    /// JSON number
    Number(JsonNumber),
    /// JSON string
    String(String),
    /// JSON array
    Array(Vec<JsonValue>),
    /// JSON object; for duplicate member names the last value wins
    Object(BTreeMap<String, JsonValue>),
}

impl JsonValue {
    /// Reads the next value from a struson [`JsonReader`]
    ///
    /// The reader must be positioned at the start of the top-level value, and it is
    /// afterwards checked that the document has no trailing data.
    pub fn read<J: JsonReader>(json_reader: J) -> Result<JsonValue, ReaderError> {
        let mut tokens = TokenReader::new(json_reader);
        let mut builder = ValueBuilder::new();
        loop {
            // The token reader only ends the stream after a complete value
            if let Some(value) = builder.push(tokens.next_token()?) {
                tokens.finish()?;
                return Ok(value);
            }
        }
    }

    /// Gets the type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            JsonValue::Null => ValueType::Null,
            JsonValue::Bool(_) => ValueType::Boolean,
            JsonValue::Number(_) => ValueType::Number,
            JsonValue::String(_) => ValueType::String,
            JsonValue::Array(_) => ValueType::Array,
            JsonValue::Object(_) => ValueType::Object,
        }
    }

    /// Gets the string value, `None` if this is not a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Gets the number value, `None` if this is not a number
    pub fn as_number(&self) -> Option<&JsonNumber> {
        match self {
            JsonValue::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Gets the boolean value, `None` if this is not a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsonValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Gets the array items, `None` if this is not an array
    pub fn as_array(&self) -> Option<&[JsonValue]> {
        match self {
            JsonValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Gets the object members, `None` if this is not an object
    pub fn as_object(&self) -> Option<&BTreeMap<String, JsonValue>> {
        match self {
            JsonValue::Object(members) => Some(members),
            _ => None,
        }
    }

    /// Whether this value consists of a single token
    pub fn is_scalar(&self) -> bool {
        !matches!(self, JsonValue::Array(_) | JsonValue::Object(_))
    }

    /// Calls `f` with the tokens of this value, in document order
    pub fn for_each_token<E>(&self, f: &mut impl FnMut(Token) -> Result<(), E>) -> Result<(), E> {
        match self {
            JsonValue::Null => f(Token::Null),
            JsonValue::Bool(b) => f(Token::Bool(*b)),
            JsonValue::Number(n) => f(Token::Number(n.clone())),
            JsonValue::String(s) => f(Token::Text(s.clone())),
            JsonValue::Array(items) => {
                f(Token::StartArray)?;
                for item in items {
                    item.for_each_token(f)?;
                }
                f(Token::EndArray)
            }
            JsonValue::Object(members) => {
                f(Token::StartObject)?;
                for (name, value) in members {
                    f(Token::FieldName(name.clone()))?;
                    value.for_each_token(f)?;
                }
                f(Token::EndObject)
            }
        }
    }
}

impl Display for JsonValue {
    /// Writes the value as compact JSON
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut bytes = Vec::<u8>::new();
        let mut json_writer = JsonStreamWriter::new(&mut bytes);
        self.for_each_token(&mut |token| write_token(&token, &mut json_writer))
            .map_err(|_| std::fmt::Error)?;
        json_writer.finish_document().map_err(|_| std::fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&bytes))
    }
}

impl FromStr for JsonValue {
    type Err = ReaderError;

    /// Parses JSON text; numbers of any size and precision are supported
    fn from_str(json: &str) -> Result<Self, Self::Err> {
        let json_reader = JsonStreamReader::new_custom(
            json.as_bytes(),
            ReaderSettings {
                restrict_number_values: false,
                ..Default::default()
            },
        );
        JsonValue::read(json_reader)
    }
}

enum Partial {
    Array(Vec<JsonValue>),
    Object {
        members: BTreeMap<String, JsonValue>,
        pending_name: Option<String>,
    },
}

/// Builds a [`JsonValue`] from the tokens of a single value
///
/// # Examples
/// ```
/// # use struson_schema::{value::*, Token};
/// let mut builder = ValueBuilder::new();
/// assert_eq!(None, builder.push(Token::StartArray));
/// assert_eq!(None, builder.push(Token::number(1)));
/// let value = builder.push(Token::EndArray);
/// assert_eq!("[1]", value.unwrap().to_string());
/// ```
#[derive(Default)]
pub struct ValueBuilder {
    stack: Vec<Partial>,
}

impl ValueBuilder {
    /// Creates a builder for a new value
    pub fn new() -> Self {
        ValueBuilder::default()
    }

    /// Whether the builder is currently inside of an array or object
    pub fn is_nested(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Adds the next token; returns the complete value once its last token was added
    ///
    /// Tokens are expected to form a well-formed sequence, which the [`Tracker`](crate::location::Tracker)
    /// of a validation run verifies before they reach the builder. Unbalanced end tokens
    /// are ignored.
    pub fn push(&mut self, token: Token) -> Option<JsonValue> {
        let completed = match token {
            Token::StartArray => {
                self.stack.push(Partial::Array(Vec::new()));
                return None;
            }
            Token::StartObject => {
                self.stack.push(Partial::Object {
                    members: BTreeMap::new(),
                    pending_name: None,
                });
                return None;
            }
            Token::FieldName(name) => {
                if let Some(Partial::Object { pending_name, .. }) = self.stack.last_mut() {
                    *pending_name = Some(name);
                }
                return None;
            }
            Token::EndArray | Token::EndObject => match self.stack.pop()? {
                Partial::Array(items) => JsonValue::Array(items),
                Partial::Object { members, .. } => JsonValue::Object(members),
            },
            Token::Text(s) => JsonValue::String(s),
            Token::Number(n) => JsonValue::Number(n),
            Token::Bool(b) => JsonValue::Bool(b),
            Token::Null => JsonValue::Null,
            Token::EndOfStream => return None,
        };

        match self.stack.last_mut() {
            None => Some(completed),
            Some(Partial::Array(items)) => {
                items.push(completed);
                None
            }
            Some(Partial::Object {
                members,
                pending_name,
            }) => {
                if let Some(name) = pending_name.take() {
                    members.insert(name, completed);
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(tokens: Vec<Token>) -> Option<JsonValue> {
        let mut builder = ValueBuilder::new();
        let mut result = None;
        for token in tokens {
            result = builder.push(token);
        }
        result
    }

    #[test]
    fn build_nested() {
        let value = build(vec![
            Token::StartObject,
            Token::field_name("b"),
            Token::StartArray,
            Token::Null,
            Token::Bool(false),
            Token::EndArray,
            Token::field_name("a"),
            Token::text("x"),
            Token::EndObject,
        ]);
        let value = value.expect("value should be complete");
        assert_eq!(r#"{"a":"x","b":[null,false]}"#, value.to_string());
        assert_eq!(ValueType::Object, value.value_type());
    }

    #[test]
    fn object_equality_ignores_member_order() {
        let a = build(vec![
            Token::StartObject,
            Token::field_name("x"),
            Token::number(1),
            Token::field_name("y"),
            Token::number(2),
            Token::EndObject,
        ]);
        let b = build(vec![
            Token::StartObject,
            Token::field_name("y"),
            Token::number(2),
            Token::field_name("x"),
            Token::number(1),
            Token::EndObject,
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn parse() -> Result<(), Box<dyn std::error::Error>> {
        let value: JsonValue = r#" {"b": [1e2000, -0.50], "a": "\u00e4"} "#.parse()?;
        assert_eq!(r#"{"a":"ä","b":[1e2000,-0.5]}"#, value.to_string());
        assert!("[1] 2".parse::<JsonValue>().is_err());
        assert!("[1".parse::<JsonValue>().is_err());
        Ok(())
    }

    #[test]
    fn tokens_round_trip() {
        let tokens = vec![
            Token::StartArray,
            Token::StartObject,
            Token::field_name("a"),
            Token::number(1),
            Token::EndObject,
            Token::text("s"),
            Token::EndArray,
        ];
        let value = build(tokens.clone()).expect("value should be complete");
        let mut emitted = Vec::new();
        value
            .for_each_token(&mut |t| {
                emitted.push(t);
                Ok::<(), ()>(())
            })
            .unwrap();
        assert_eq!(tokens, emitted);
    }
}
