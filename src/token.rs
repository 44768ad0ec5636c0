//! Module for the token model
//!
//! A [`Token`] represents exactly one JSON parse event. A complete JSON document is a
//! sequence of tokens, for example `{"a": [1, true]}` consists of:
//! ```text
//! StartObject, FieldName("a"), StartArray, Number(1), Bool(true), EndArray, EndObject
//! ```

use std::fmt::{Display, Formatter};

use struson::reader::ValueType;

use crate::json_number::JsonNumber;

/// One JSON parse event
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Token {
    /// Start of a JSON object: `{`
    StartObject,
    /// End of a JSON object: `}`
    EndObject,
    /// Start of a JSON array: `[`
    StartArray,
    /// End of a JSON array: `]`
    EndArray,
    /// Name of a JSON object member
    FieldName(String),
    /// JSON string value
    Text(String),
    /// JSON number value
    Number(JsonNumber),
    /// JSON boolean value
    Bool(bool),
    /// JSON `null`
    Null,
    /// Synthetic marker signaling that no further tokens follow
    EndOfStream,
}

impl Token {
    /// Creates a number token
    pub fn number(value: impl Into<JsonNumber>) -> Self {
        Token::Number(value.into())
    }

    /// Creates a string value token
    pub fn text(value: impl Into<String>) -> Self {
        Token::Text(value.into())
    }

    /// Creates a member name token
    pub fn field_name(name: impl Into<String>) -> Self {
        Token::FieldName(name.into())
    }

    /// Whether this token is a complete value on its own (string, number, boolean or `null`)
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Token::Text(_) | Token::Number(_) | Token::Bool(_) | Token::Null
        )
    }

    /// Whether this token is the first token of a value
    ///
    /// This is the case for scalar values and for the start of arrays and objects.
    pub fn opens_value(&self) -> bool {
        self.is_scalar() || matches!(self, Token::StartObject | Token::StartArray)
    }

    /// Whether this token is the last token of a value
    ///
    /// This is the case for scalar values and for the end of arrays and objects.
    pub fn closes_value(&self) -> bool {
        self.is_scalar() || matches!(self, Token::EndObject | Token::EndArray)
    }

    /// Gets the type of the value this token starts, `None` if it does not start a value
    pub fn value_type(&self) -> Option<ValueType> {
        Some(match self {
            Token::StartObject => ValueType::Object,
            Token::StartArray => ValueType::Array,
            Token::Text(_) => ValueType::String,
            Token::Number(_) => ValueType::Number,
            Token::Bool(_) => ValueType::Boolean,
            Token::Null => ValueType::Null,
            _ => return None,
        })
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::StartObject => write!(f, "start of object"),
            Token::EndObject => write!(f, "end of object"),
            Token::StartArray => write!(f, "start of array"),
            Token::EndArray => write!(f, "end of array"),
            Token::FieldName(name) => write!(f, "member name \"{name}\""),
            Token::Text(value) => write!(f, "string \"{value}\""),
            Token::Number(value) => write!(f, "number {value}"),
            Token::Bool(value) => write!(f, "boolean {value}"),
            Token::Null => write!(f, "null"),
            Token::EndOfStream => write!(f, "end of stream"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_flags() {
        assert!(Token::StartObject.opens_value());
        assert!(!Token::StartObject.closes_value());
        assert!(Token::EndArray.closes_value());
        assert!(!Token::EndArray.opens_value());
        assert!(!Token::field_name("a").opens_value());
        assert!(!Token::field_name("a").closes_value());

        let scalar = Token::number(1);
        assert!(scalar.opens_value() && scalar.closes_value());
        assert!(!Token::EndOfStream.opens_value());
    }

    #[test]
    fn value_types() {
        assert_eq!(Some(ValueType::Object), Token::StartObject.value_type());
        assert_eq!(Some(ValueType::String), Token::text("").value_type());
        assert_eq!(None, Token::EndObject.value_type());
        assert_eq!(None, Token::field_name("a").value_type());
    }
}
