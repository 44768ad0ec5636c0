//! `const` and `enum`
//!
//! Every allowed value is walked in lock-step with the tokens of the validated value. A
//! cursor keeps one frame per open array or object of the allowed value, and an allowed
//! value is dropped as soon as a token does not match it. Nothing of the validated value
//! is retained.

use std::collections::BTreeMap;

use super::{BoxedInstance, Instance, Rule, Step, ValidationFailure};
use crate::{location::Location, token::Token, value::JsonValue};

pub(crate) fn const_instance<'s>(value: &'s JsonValue) -> BoxedInstance<'s> {
    Box::new(LiteralInstance {
        rule: Rule::Const,
        cursors: vec![Cursor::new(value)],
    })
}

pub(crate) fn enum_instance<'s>(values: &'s [JsonValue]) -> BoxedInstance<'s> {
    Box::new(LiteralInstance {
        rule: Rule::Enum,
        cursors: values.iter().map(Cursor::new).collect(),
    })
}

#[derive(Debug)]
enum Frame<'s> {
    Array {
        items: &'s [JsonValue],
        next_index: usize,
    },
    Object {
        members: &'s BTreeMap<String, JsonValue>,
        /// Value expected for the member whose name was just seen
        member_value: Option<&'s JsonValue>,
        member_count: usize,
    },
}

/// Position inside one allowed value
#[derive(Debug)]
struct Cursor<'s> {
    /// Allowed value, until its first token was matched
    root: Option<&'s JsonValue>,
    frames: Vec<Frame<'s>>,
}

impl<'s> Cursor<'s> {
    fn new(value: &'s JsonValue) -> Self {
        Cursor {
            root: Some(value),
            frames: Vec::new(),
        }
    }

    fn is_complete(&self) -> bool {
        self.root.is_none() && self.frames.is_empty()
    }

    /// Gets the allowed value at the position of the next value token
    fn expected_value(&mut self) -> Option<&'s JsonValue> {
        match self.frames.last_mut() {
            None => self.root.take(),
            Some(Frame::Array { items, next_index }) => {
                let item = items.get(*next_index);
                *next_index += 1;
                item
            }
            Some(Frame::Object { member_value, .. }) => member_value.take(),
        }
    }

    /// Advances the cursor, returning `false` if the token does not match
    fn advance(&mut self, token: &Token) -> bool {
        match token {
            Token::FieldName(name) => match self.frames.last_mut() {
                Some(Frame::Object {
                    members,
                    member_value,
                    member_count,
                }) => match members.get(name) {
                    Some(value) => {
                        *member_value = Some(value);
                        *member_count += 1;
                        true
                    }
                    None => false,
                },
                _ => false,
            },
            Token::EndArray => match self.frames.pop() {
                Some(Frame::Array { items, next_index }) => next_index == items.len(),
                _ => false,
            },
            Token::EndObject => match self.frames.pop() {
                Some(Frame::Object {
                    members,
                    member_count,
                    ..
                }) => member_count == members.len(),
                _ => false,
            },
            Token::EndOfStream => false,
            _ => {
                let Some(expected) = self.expected_value() else {
                    return false;
                };
                match (token, expected) {
                    (Token::StartArray, JsonValue::Array(items)) => {
                        self.frames.push(Frame::Array {
                            items,
                            next_index: 0,
                        });
                        true
                    }
                    (Token::StartObject, JsonValue::Object(members)) => {
                        self.frames.push(Frame::Object {
                            members,
                            member_value: None,
                            member_count: 0,
                        });
                        true
                    }
                    (Token::Text(actual), JsonValue::String(expected)) => actual == expected,
                    (Token::Number(actual), JsonValue::Number(expected)) => actual == expected,
                    (Token::Bool(actual), JsonValue::Bool(expected)) => actual == expected,
                    (Token::Null, JsonValue::Null) => true,
                    _ => false,
                }
            }
        }
    }
}

struct LiteralInstance<'s> {
    rule: Rule,
    /// Allowed values which the value can still be equal to
    cursors: Vec<Cursor<'s>>,
}

impl LiteralInstance<'_> {
    fn failure(&self, location: &Location<'_>) -> ValidationFailure {
        let message = match self.rule {
            Rule::Const => "value is not equal to the constant".to_owned(),
            _ => "value is not one of the allowed values".to_owned(),
        };
        ValidationFailure::new(self.rule, location, message)
    }
}

impl Instance for LiteralInstance<'_> {
    fn validate(&mut self, token: &Token, location: &Location<'_>) -> Step {
        self.cursors.retain_mut(|cursor| cursor.advance(token));
        if self.cursors.is_empty() {
            return Step::Invalid(self.failure(location));
        }
        // All cursors have consumed the same tokens, so they complete together
        if self.cursors.iter().any(Cursor::is_complete) {
            Step::Valid
        } else {
            Step::Pending
        }
    }
}
