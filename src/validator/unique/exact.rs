use std::collections::HashSet;

use super::DuplicateDetector;
use crate::{token::Token, value::JsonValue, value::ValueBuilder};

/// Keeps every distinct item
pub(super) struct ExactDetector {
    seen: HashSet<JsonValue>,
    builder: ValueBuilder,
}

impl ExactDetector {
    pub(super) fn new() -> Self {
        ExactDetector {
            seen: HashSet::new(),
            builder: ValueBuilder::new(),
        }
    }
}

impl DuplicateDetector for ExactDetector {
    fn consume(&mut self, token: &Token) -> bool {
        match self.builder.push(token.clone()) {
            Some(item) => !self.seen.insert(item),
            None => false,
        }
    }
}
