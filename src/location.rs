//! Module for tracking the structural location of tokens
//!
//! [`Tracker`] consumes tokens one at a time and maintains the nesting depth, the
//! [JSON Pointer](https://www.rfc-editor.org/rfc/rfc6901) of the current value and the
//! member names seen in the enclosing objects. [`Location`] is the read-only view of that
//! state which accompanies every token given to validators.

use std::{
    borrow::Cow,
    fmt::{Display, Formatter},
    sync::Arc,
};

use indexmap::IndexSet;
use struson::reader::LinePosition;
use thiserror::Error;

use crate::token::Token;

/// A piece of a JSON Pointer
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum PointerPiece {
    /// Index (starting at 0) of a JSON array item
    ArrayItem(u64),
    /// Name of a JSON object member
    ObjectMember(String),
}

/// Creates a [`PointerPiece::ArrayItem`] with the number as index
impl From<u64> for PointerPiece {
    fn from(v: u64) -> Self {
        PointerPiece::ArrayItem(v)
    }
}

/// Creates a [`PointerPiece::ObjectMember`] with the string as member name
impl From<String> for PointerPiece {
    fn from(v: String) -> Self {
        PointerPiece::ObjectMember(v)
    }
}

/// Creates a [`PointerPiece::ObjectMember`] with the string as member name
impl From<&str> for PointerPiece {
    fn from(v: &str) -> Self {
        PointerPiece::ObjectMember(v.to_owned())
    }
}

/// Escapes a reference token of a JSON Pointer: `~` becomes `~0` and `/` becomes `~1`
pub fn escape_pointer_token(token: &str) -> Cow<'_, str> {
    if token.contains(['~', '/']) {
        Cow::Owned(token.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(token)
    }
}

/// Reverses [`escape_pointer_token`]
pub fn unescape_pointer_token(token: &str) -> Cow<'_, str> {
    if token.contains('~') {
        Cow::Owned(token.replace("~1", "/").replace("~0", "~"))
    } else {
        Cow::Borrowed(token)
    }
}

/// A JSON Pointer, consisting of zero or more [`PointerPiece`] elements
///
/// The string form is the one defined by RFC 6901, for example `/a/0/b~1c` for the
/// pieces `["a", 0, "b/c"]`. The pointer to the document root has the empty string
/// as string form.
#[derive(PartialEq, Eq, Clone, Default, Debug)]
pub struct JsonPointer(Vec<PointerPiece>);

impl JsonPointer {
    /// Creates the pointer to the document root
    pub fn root() -> Self {
        JsonPointer(Vec::new())
    }

    /// Gets the pieces of this pointer
    pub fn pieces(&self) -> &[PointerPiece] {
        &self.0
    }

    /// Creates a pointer which has the given piece appended to the pieces of this pointer
    pub fn join(&self, piece: impl Into<PointerPiece>) -> Self {
        let mut pieces = self.0.clone();
        pieces.push(piece.into());
        JsonPointer(pieces)
    }

    /// Gets the remainder of this pointer after `ancestor`, `None` if `ancestor` is not a prefix
    pub fn relative_to(&self, ancestor: &JsonPointer) -> Option<JsonPointer> {
        self.0
            .strip_prefix(ancestor.0.as_slice())
            .map(|rest| JsonPointer(rest.to_vec()))
    }
}

impl From<Vec<PointerPiece>> for JsonPointer {
    fn from(pieces: Vec<PointerPiece>) -> Self {
        JsonPointer(pieces)
    }
}

impl Display for JsonPointer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for piece in &self.0 {
            match piece {
                PointerPiece::ArrayItem(index) => write!(f, "/{index}")?,
                PointerPiece::ObjectMember(name) => write!(f, "/{}", escape_pointer_token(name))?,
            }
        }
        Ok(())
    }
}

/// Creates a JSON Pointer from pointer pieces
///
/// Numbers of type `u64` are converted to [`PointerPiece::ArrayItem`], strings to
/// [`PointerPiece::ObjectMember`].
///
/// # Examples
/// ```
/// # use struson_schema::json_pointer;
/// let pointer = json_pointer!["outer", 3, "a/b"];
/// assert_eq!("/outer/3/a~1b", pointer.to_string());
/// ```
#[macro_export]
macro_rules! json_pointer {
    () => {
        $crate::location::JsonPointer::root()
    };
    ( $( $piece:expr ),+ ) => {
        $crate::location::JsonPointer::from(vec![
            $(
                $crate::location::PointerPiece::from($piece),
            )*
        ])
    };
}

/// Error for a token which is not allowed at the current position of a token sequence
#[derive(Error, PartialEq, Eq, Clone, Debug)]
#[error("unexpected {token}, expected {expected}")]
pub struct StructureError {
    /// The token which was not allowed
    pub token: Token,
    /// Description of what was expected instead
    pub expected: &'static str,
}

#[derive(Debug)]
enum Frame {
    Array {
        next_index: u64,
        /// Index of the item currently being processed; `None` before the first item
        current: Option<u64>,
    },
    Object {
        names: IndexSet<String>,
        current: Option<String>,
        /// Whether `current` had already been seen before in this object
        duplicate: bool,
        expects_value: bool,
    },
}

/// Incrementally tracks the location of a token sequence
///
/// For every token [`consume`](Self::consume) performs a constant amount of work (besides
/// cloning member names), and no token is ever buffered. The structural depth
/// reported as [level](Location::level) is defined as follows:
/// - the top-level value has level 0
/// - the start and end tokens of an array or object have the level of that array or object
/// - member names and the values inside an array or object at level `n` have level `n + 1`
#[derive(Debug, Default)]
pub struct Tracker {
    frames: Vec<Frame>,
    level: usize,
    /// Frame of the array or object closed by the last token
    closed: Option<Frame>,
    top_level_complete: bool,
    line_pos: Option<LinePosition>,
    source_name: Option<Arc<str>>,
}

impl Tracker {
    /// Creates a tracker for a new document
    pub fn new() -> Self {
        Tracker::default()
    }

    /// Sets the name of the document source, included in rendered locations
    pub fn set_source_name(&mut self, source_name: Option<Arc<str>>) {
        self.source_name = source_name;
    }

    /// Sets the line position of the next token
    ///
    /// Token sources which know the position of tokens in the underlying JSON text should
    /// call this before [`consume`](Self::consume).
    pub fn set_line_position(&mut self, line_pos: Option<LinePosition>) {
        self.line_pos = line_pos;
    }

    /// Whether the top-level value has been completely consumed
    pub fn is_complete(&self) -> bool {
        self.top_level_complete
    }

    /// Updates the location for the next token
    pub fn consume(&mut self, token: &Token) -> Result<(), StructureError> {
        let unexpected = |expected| StructureError {
            token: token.clone(),
            expected,
        };
        self.closed = None;

        match token {
            Token::FieldName(name) => match self.frames.last_mut() {
                Some(Frame::Object {
                    names,
                    current,
                    duplicate,
                    expects_value,
                }) if !*expects_value => {
                    *duplicate = !names.insert(name.clone());
                    *current = Some(name.clone());
                    *expects_value = true;
                    self.level = self.frames.len();
                }
                Some(Frame::Object { .. }) => return Err(unexpected("member value")),
                _ => return Err(unexpected("value outside of object")),
            },
            Token::EndObject => {
                match self.frames.last() {
                    Some(Frame::Object {
                        expects_value: false,
                        ..
                    }) => {}
                    Some(Frame::Object { .. }) => return Err(unexpected("member value")),
                    _ => return Err(unexpected("end of array or value")),
                }
                self.closed = self.frames.pop();
                self.level = self.frames.len();
                self.on_value_end();
            }
            Token::EndArray => {
                if !matches!(self.frames.last(), Some(Frame::Array { .. })) {
                    return Err(unexpected("end of object or member"));
                }
                self.closed = self.frames.pop();
                self.level = self.frames.len();
                self.on_value_end();
            }
            Token::EndOfStream => {
                if !self.top_level_complete {
                    return Err(unexpected("remainder of the document"));
                }
            }
            Token::StartObject
            | Token::StartArray
            | Token::Text(_)
            | Token::Number(_)
            | Token::Bool(_)
            | Token::Null => {
                match self.frames.last_mut() {
                    Some(Frame::Array {
                        next_index,
                        current,
                    }) => {
                        *current = Some(*next_index);
                        *next_index += 1;
                    }
                    Some(Frame::Object {
                        expects_value: false,
                        ..
                    }) => return Err(unexpected("member name or end of object")),
                    Some(Frame::Object { .. }) => {}
                    None => {
                        if self.top_level_complete {
                            return Err(unexpected("end of document"));
                        }
                    }
                }
                self.level = self.frames.len();

                match token {
                    Token::StartObject => self.frames.push(Frame::Object {
                        names: IndexSet::new(),
                        current: None,
                        duplicate: false,
                        expects_value: false,
                    }),
                    Token::StartArray => self.frames.push(Frame::Array {
                        next_index: 0,
                        current: None,
                    }),
                    _ => self.on_value_end(),
                }
            }
        }
        Ok(())
    }

    fn on_value_end(&mut self) {
        match self.frames.last_mut() {
            Some(Frame::Object { expects_value, .. }) => *expects_value = false,
            Some(Frame::Array { .. }) => {}
            None => self.top_level_complete = true,
        }
    }

    /// Gets the location of the last consumed token
    pub fn location(&self) -> Location<'_> {
        Location { tracker: self }
    }
}

/// Structural context of a token
///
/// A location is only valid for the token it was created for; it must not be retained.
#[derive(Clone, Copy, Debug)]
pub struct Location<'a> {
    tracker: &'a Tracker,
}

impl Location<'_> {
    /// Structural depth of the token, see [`Tracker`]
    pub fn level(&self) -> usize {
        self.tracker.level
    }

    /// Renders the JSON Pointer of the current value
    ///
    /// For a member name this is the pointer to the value of the member.
    pub fn pointer(&self) -> JsonPointer {
        let pieces = self
            .tracker
            .frames
            .iter()
            .filter_map(|frame| match frame {
                Frame::Array { current, .. } => current.map(PointerPiece::ArrayItem),
                Frame::Object { current, .. } => {
                    current.as_ref().map(|n| PointerPiece::ObjectMember(n.clone()))
                }
            })
            .collect::<Vec<_>>();
        JsonPointer(pieces)
    }

    /// Member names seen so far in the current object
    ///
    /// For an [`EndObject`](Token::EndObject) token these are all the member names of the object
    /// which has just been closed. `None` if the token is not inside an object.
    pub fn property_names(&self) -> Option<&IndexSet<String>> {
        let frame = match &self.tracker.closed {
            Some(closed) => Some(closed),
            None => self.tracker.frames.last(),
        };
        match frame {
            Some(Frame::Object { names, .. }) => Some(names),
            _ => None,
        }
    }

    /// Whether the member name token at this location repeats a name of the same object
    pub fn is_duplicate_name(&self) -> bool {
        matches!(
            self.tracker.frames.last(),
            Some(Frame::Object {
                duplicate: true,
                expects_value: true,
                ..
            })
        ) && self.tracker.closed.is_none()
    }

    /// Line and column of the token, if provided by the token source
    pub fn line_position(&self) -> Option<LinePosition> {
        self.tracker.line_pos
    }

    /// Name of the document source, if any
    pub fn source_name(&self) -> Option<&str> {
        self.tracker.source_name.as_deref()
    }
}

impl Display for Location<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "pointer '{}'", self.pointer())?;
        if let Some(line_pos) = self.line_position() {
            write!(f, ", {line_pos}")?;
        }
        if let Some(source_name) = self.source_name() {
            write!(f, " in '{source_name}'")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn format_pointer() {
        assert_eq!("", JsonPointer::root().to_string());
        assert_eq!("/2", json_pointer![2].to_string());
        assert_eq!("/2/a", json_pointer![2, "a"].to_string());
        assert_eq!("/a~1b/c~0d/~01", json_pointer!["a/b", "c~d", "~1"].to_string());
        assert_eq!("/", json_pointer![""].to_string());
        assert_eq!("/5000000000", json_pointer![5_000_000_000].to_string());
    }

    #[test]
    fn index_beyond_u32() -> TestResult {
        let mut tracker = Tracker::new();
        tracker.consume(&Token::StartArray)?;
        if let Some(Frame::Array { next_index, .. }) = tracker.frames.last_mut() {
            *next_index = u64::from(u32::MAX);
        }
        tracker.consume(&Token::Null)?;
        assert_eq!("/4294967295", tracker.location().pointer().to_string());
        tracker.consume(&Token::Null)?;
        assert_eq!("/4294967296", tracker.location().pointer().to_string());
        Ok(())
    }

    #[test]
    fn escaping() {
        assert_eq!("a~1b~0", escape_pointer_token("a/b~"));
        assert_eq!("a/b~", unescape_pointer_token("a~1b~0"));
        // `~01` must become `~1` and not `/`
        assert_eq!("~1", unescape_pointer_token("~01"));
    }

    #[test]
    fn relative_pointer() {
        let pointer = json_pointer!["definitions", "a", "items"];
        assert_eq!(
            Some(json_pointer!["a", "items"]),
            pointer.relative_to(&json_pointer!["definitions"])
        );
        assert_eq!(Some(pointer.clone()), pointer.relative_to(&JsonPointer::root()));
        assert_eq!(None, pointer.relative_to(&json_pointer!["properties"]));
    }

    /// Consumes the tokens and returns (level, pointer) for each of them
    fn track(tokens: &[Token]) -> Result<Vec<(usize, String)>, StructureError> {
        let mut tracker = Tracker::new();
        let mut result = Vec::new();
        for token in tokens {
            tracker.consume(token)?;
            let location = tracker.location();
            result.push((location.level(), location.pointer().to_string()));
        }
        Ok(result)
    }

    #[test]
    fn levels_and_pointers() -> TestResult {
        // {"a": [1, {"b": null}], "c": true}
        let tokens = [
            Token::StartObject,
            Token::field_name("a"),
            Token::StartArray,
            Token::number(1),
            Token::StartObject,
            Token::field_name("b"),
            Token::Null,
            Token::EndObject,
            Token::EndArray,
            Token::field_name("c"),
            Token::Bool(true),
            Token::EndObject,
        ];
        let expected = [
            (0, ""),
            (1, "/a"),
            (1, "/a"),
            (2, "/a/0"),
            (2, "/a/1"),
            (3, "/a/1/b"),
            (3, "/a/1/b"),
            (2, "/a/1"),
            (1, "/a"),
            (1, "/c"),
            (1, "/c"),
            (0, ""),
        ];
        let actual = track(&tokens)?;
        assert_eq!(
            expected
                .iter()
                .map(|(l, p)| (*l, p.to_string()))
                .collect::<Vec<_>>(),
            actual
        );
        Ok(())
    }

    #[test]
    fn property_names() -> TestResult {
        let mut tracker = Tracker::new();
        tracker.consume(&Token::StartObject)?;
        tracker.consume(&Token::field_name("a"))?;
        assert!(!tracker.location().is_duplicate_name());
        tracker.consume(&Token::number(1))?;
        tracker.consume(&Token::field_name("a"))?;
        assert!(tracker.location().is_duplicate_name());
        tracker.consume(&Token::number(2))?;
        tracker.consume(&Token::field_name("b"))?;
        assert!(!tracker.location().is_duplicate_name());
        tracker.consume(&Token::Null)?;
        tracker.consume(&Token::EndObject)?;

        let location = tracker.location();
        let names = location
            .property_names()
            .ok_or("missing names")?
            .iter()
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(vec!["a".to_owned(), "b".to_owned()], names);
        assert!(tracker.is_complete());
        Ok(())
    }

    #[test]
    fn malformed_sequences() {
        fn assert_error(tokens: &[Token], expected: StructureError) {
            match track(tokens) {
                Err(e) => assert_eq!(expected, e),
                Ok(_) => panic!("Should have failed for: {tokens:?}"),
            }
        }

        assert_error(
            &[Token::StartArray, Token::EndObject],
            StructureError {
                token: Token::EndObject,
                expected: "end of array or value",
            },
        );
        assert_error(
            &[Token::StartObject, Token::Null],
            StructureError {
                token: Token::Null,
                expected: "member name or end of object",
            },
        );
        assert_error(
            &[Token::StartObject, Token::field_name("a"), Token::EndObject],
            StructureError {
                token: Token::EndObject,
                expected: "member value",
            },
        );
        assert_error(
            &[Token::Null, Token::Null],
            StructureError {
                token: Token::Null,
                expected: "end of document",
            },
        );
        assert_error(
            &[Token::field_name("a")],
            StructureError {
                token: Token::field_name("a"),
                expected: "value outside of object",
            },
        );
        assert_error(
            &[Token::StartArray, Token::EndOfStream],
            StructureError {
                token: Token::EndOfStream,
                expected: "remainder of the document",
            },
        );
    }

    #[test]
    fn location_display() -> TestResult {
        let mut tracker = Tracker::new();
        tracker.set_source_name(Some(Arc::from("doc.json")));
        tracker.set_line_position(Some(LinePosition { line: 0, column: 1 }));
        tracker.consume(&Token::StartArray)?;
        tracker.consume(&Token::text("x"))?;
        assert_eq!(
            "pointer '/0', line 0, column 1 in 'doc.json'",
            tracker.location().to_string()
        );
        Ok(())
    }
}
