use std::collections::HashSet;

use sha2::Digest;

use super::DuplicateDetector;
use crate::{token::Token, value::JsonValue};

#[derive(PartialEq, Eq, Hash)]
enum ItemKey {
    /// Items consisting of a single token are kept as they are
    Scalar(JsonValue),
    Digest(Vec<u8>),
}

enum Frame<D> {
    Array(D),
    Object {
        members: Vec<(String, Vec<u8>)>,
        pending_name: Option<String>,
    },
}

/// Keeps a digest of every distinct array or object item
///
/// The digest of a nested value is computed bottom-up: scalars are hashed with a type
/// tag, arrays hash the digests of their items in order, and objects hash their
/// `(name, digest)` pairs sorted by name.
pub(super) struct DigestDetector<D> {
    seen: HashSet<ItemKey>,
    stack: Vec<Frame<D>>,
}

impl<D: Digest> DigestDetector<D> {
    pub(super) fn new() -> Self {
        DigestDetector {
            seen: HashSet::new(),
            stack: Vec::new(),
        }
    }

    fn scalar_digest(token: &Token) -> Vec<u8> {
        let mut hasher = D::new();
        match token {
            Token::Text(s) => {
                hasher.update(b"s");
                hasher.update(s.as_bytes());
            }
            Token::Number(n) => {
                hasher.update(b"n");
                hasher.update(n.canonical_string().as_bytes());
            }
            Token::Bool(true) => hasher.update(b"t"),
            Token::Bool(false) => hasher.update(b"f"),
            _ => hasher.update(b"z"),
        }
        hasher.finalize().to_vec()
    }

    /// Adds the digest of a completed value to the enclosing frame; returns the key of the
    /// item if the value is a complete item
    fn complete(&mut self, digest: Vec<u8>) -> Option<ItemKey> {
        match self.stack.last_mut() {
            None => Some(ItemKey::Digest(digest)),
            Some(Frame::Array(hasher)) => {
                hasher.update(&digest);
                None
            }
            Some(Frame::Object {
                members,
                pending_name,
            }) => {
                if let Some(name) = pending_name.take() {
                    members.push((name, digest));
                }
                None
            }
        }
    }
}

impl<D: Digest> DuplicateDetector for DigestDetector<D> {
    fn consume(&mut self, token: &Token) -> bool {
        let key = match token {
            Token::StartArray => {
                let mut hasher = D::new();
                hasher.update(b"[");
                self.stack.push(Frame::Array(hasher));
                None
            }
            Token::StartObject => {
                self.stack.push(Frame::Object {
                    members: Vec::new(),
                    pending_name: None,
                });
                None
            }
            Token::FieldName(name) => {
                if let Some(Frame::Object { pending_name, .. }) = self.stack.last_mut() {
                    *pending_name = Some(name.clone());
                }
                None
            }
            Token::EndArray | Token::EndObject => {
                let digest = match self.stack.pop() {
                    Some(Frame::Array(mut hasher)) => {
                        hasher.update(b"]");
                        hasher.finalize().to_vec()
                    }
                    Some(Frame::Object { mut members, .. }) => {
                        // Duplicate member names keep the last value, as for exact comparison
                        members.reverse();
                        members.sort_by(|a, b| a.0.cmp(&b.0));
                        members.dedup_by(|a, b| a.0 == b.0);

                        let mut hasher = D::new();
                        hasher.update(b"{");
                        for (name, digest) in &members {
                            hasher.update((name.len() as u64).to_be_bytes());
                            hasher.update(name.as_bytes());
                            hasher.update(digest);
                        }
                        hasher.update(b"}");
                        hasher.finalize().to_vec()
                    }
                    None => return false,
                };
                self.complete(digest)
            }
            Token::EndOfStream => None,
            _ if self.stack.is_empty() => Some(ItemKey::Scalar(match token {
                Token::Text(s) => JsonValue::String(s.clone()),
                Token::Number(n) => JsonValue::Number(n.clone()),
                Token::Bool(b) => JsonValue::Bool(*b),
                _ => JsonValue::Null,
            })),
            _ => {
                let digest = Self::scalar_digest(token);
                self.complete(digest)
            }
        };
        match key {
            Some(key) => !self.seen.insert(key),
            None => false,
        }
    }
}
