#![warn(missing_docs)]
#![forbid(unsafe_code)]
// Allow needless `return` because that makes it sometimes more obvious that
// an expression is the result of the function
#![allow(clippy::needless_return)]
// Allow `assert_eq!(true, ...)` because in some cases it is used to check a bool
// value and not a 'flag' / 'state', and `assert_eq!` makes that more explicit
#![allow(clippy::bool_assert_comparison)]
// Enable 'unused' warnings for doc tests (are disabled by default)
#![doc(test(no_crate_inject))]
#![doc(test(attr(warn(unused))))]
// Fail on warnings in doc tests
#![doc(test(attr(deny(warnings))))]
// When `docsrs` configuration flag is set enable banner for features in documentation
// See https://stackoverflow.com/q/61417452
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Struson Schema is a streaming [JSON Schema](https://json-schema.org/) validator for the
//! drafts 4, 6 and 7, built on top of the [Struson](https://docs.rs/struson) JSON reader and writer.
//!
//! Validation happens token by token while JSON data is read or written; the validated
//! document is never stored in memory. A verdict is available as soon as it is certain,
//! which for invalid documents is normally long before the end of the document. Numbers
//! are compared with arbitrary precision, so `1e400` or `0.1` are handled exactly.
//!
//! # Terminology
//!
//! - *token*: one JSON parse event, see [`Token`]
//! - *level*: nesting depth of a token; the top-level value has level 0, the member names
//!   and values inside an array or object of level `n` have level `n + 1`
//! - *verdict*: whether a complete value is valid, see [`Verdict`]
//!
//! # Usage examples
//!
//! ## Validating JSON text
//!
//! ```
//! # use struson_schema::schema::CompiledSchema;
//! let schema = CompiledSchema::from_json(
//!     r#"{"type": "object", "properties": {"a": {"type": "array", "maxItems": 1}}}"#,
//! )?;
//!
//! let verdict = schema.root().validate_str(r#"{"a": [1, true]}"#)?;
//! let failure = verdict.failure().unwrap();
//! assert_eq!("properties", failure.rule.to_string());
//! assert_eq!("maxItems", failure.leaves()[0].rule.to_string());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Reading
//!
//! A [`ValidatingReader`](reader::ValidatingReader) validates everything which is read
//! through it, and fails as soon as the data violates the schema.
//! ```
//! # use struson::reader::JsonStreamReader;
//! # use struson_schema::schema::CompiledSchema;
//! let schema = CompiledSchema::from_json(r#"{"items": {"type": "integer"}}"#)?;
//! let json = "[1, 2.5]";
//! let mut json_reader = schema.root().reader(JsonStreamReader::new(json.as_bytes()));
//!
//! json_reader.begin_array()?;
//! assert_eq!("1", json_reader.next_number_as_string()?);
//! assert!(json_reader.next_number_as_string().is_err());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Writing
//!
//! ```
//! # use struson::writer::JsonStreamWriter;
//! # use struson_schema::schema::CompiledSchema;
//! let schema = CompiledSchema::from_json(r#"{"required": ["a"]}"#)?;
//! let mut writer = Vec::<u8>::new();
//! let mut json_writer = schema.root().writer(JsonStreamWriter::new(&mut writer));
//!
//! json_writer.begin_object()?;
//! json_writer.name("a")?;
//! json_writer.bool_value(true)?;
//! json_writer.end_object()?;
//! assert!(json_writer.finish_document()?.is_valid());
//!
//! assert_eq!(r#"{"a":true}"#, String::from_utf8(writer)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Serde integration
//! With the optional `serde` feature, already materialized `serde_json` values can be
//! validated with [`SchemaValidator::validate_value`](schema::SchemaValidator::validate_value),
//! and [`ValidationFailure`] implements `Serialize`.

pub mod json_number;
pub mod location;
pub mod reader;
pub mod schema;
pub mod settings;
pub mod token;
pub mod validator;
pub mod value;
pub mod writer;

#[cfg(feature = "serde")]
pub mod serde;

mod format;

pub use json_number::JsonNumber;
pub use token::Token;
pub use validator::{Rule, ValidationFailure, Verdict};
