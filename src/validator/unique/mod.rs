//! Duplicate detection for `uniqueItems`
//!
//! A detector is fed the tokens of all items of one array, in order, and reports when an
//! item is complete and equal to an earlier item. Equality is the JSON Schema one: numbers
//! are compared by value and object member order does not matter.

mod digest;
mod exact;

use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::{
    settings::{DigestAlgorithm, UniqueItemsStrategy},
    token::Token,
};

pub(crate) trait DuplicateDetector {
    /// Consumes the next token of the array items; returns `true` if the token completes
    /// an item which equals a previous item
    fn consume(&mut self, token: &Token) -> bool;
}

pub(crate) fn detector(strategy: UniqueItemsStrategy) -> Box<dyn DuplicateDetector> {
    match strategy {
        UniqueItemsStrategy::Exact => Box::new(exact::ExactDetector::new()),
        UniqueItemsStrategy::Digest(algorithm) => match algorithm {
            DigestAlgorithm::Sha224 => Box::new(digest::DigestDetector::<Sha224>::new()),
            DigestAlgorithm::Sha256 => Box::new(digest::DigestDetector::<Sha256>::new()),
            DigestAlgorithm::Sha384 => Box::new(digest::DigestDetector::<Sha384>::new()),
            DigestAlgorithm::Sha512 => Box::new(digest::DigestDetector::<Sha512>::new()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::JsonValue;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    const STRATEGIES: [UniqueItemsStrategy; 3] = [
        UniqueItemsStrategy::Exact,
        UniqueItemsStrategy::Digest(DigestAlgorithm::Sha256),
        UniqueItemsStrategy::Digest(DigestAlgorithm::Sha224),
    ];

    /// Feeds the items of the JSON array and returns the index of the first duplicate
    fn first_duplicate(strategy: UniqueItemsStrategy, array: &str) -> Result<Option<usize>, Box<dyn std::error::Error>> {
        let value = array.parse::<JsonValue>()?;
        let items = value.as_array().ok_or("not an array")?;
        let mut detector = detector(strategy);
        for (index, item) in items.iter().enumerate() {
            let mut duplicate = false;
            item.for_each_token(&mut |token| {
                duplicate |= detector.consume(&token);
                Ok::<(), ()>(())
            })
            .map_err(|_| "unexpected error")?;
            if duplicate {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    #[test]
    fn duplicates() -> TestResult {
        for strategy in STRATEGIES {
            assert_eq!(Some(1), first_duplicate(strategy, "[1, 1]")?, "{strategy:?}");
            assert_eq!(Some(1), first_duplicate(strategy, "[1.0, 1]")?, "{strategy:?}");
            assert_eq!(Some(2), first_duplicate(strategy, r#"[{"a": 1, "b": [2]}, {"a": 2}, {"b": [2.0], "a": 1}]"#)?, "{strategy:?}");
            assert_eq!(Some(1), first_duplicate(strategy, "[[], []]")?, "{strategy:?}");
            assert_eq!(Some(1), first_duplicate(strategy, r#"[{}, {}]"#)?, "{strategy:?}");
        }
        Ok(())
    }

    #[test]
    fn distinct_items() -> TestResult {
        for strategy in STRATEGIES {
            assert_eq!(None, first_duplicate(strategy, r#"[1, "1", true, null, [1], {"1": 1}]"#)?, "{strategy:?}");
            assert_eq!(None, first_duplicate(strategy, r#"[[1, 2], [2, 1], [[1], 2], [1, [2]]]"#)?, "{strategy:?}");
            assert_eq!(None, first_duplicate(strategy, r#"[{"a": "b"}, {"ab": ""}, {"a": {}}, {"a": []}]"#)?, "{strategy:?}");
            assert_eq!(None, first_duplicate(strategy, r#"[0, false, "", [], {}, null]"#)?, "{strategy:?}");
            assert_eq!(None, first_duplicate(strategy, r#"[["a", "b"], ["ab"], ["a\u0000b"]]"#)?, "{strategy:?}");
        }
        Ok(())
    }
}
