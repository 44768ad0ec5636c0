//! Module for validator configuration

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use crate::schema::Draft;

/// Validation function for a custom `format`; returns whether the string is valid
pub type FormatFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Hash algorithm used by [`UniqueItemsStrategy::Digest`]
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
pub enum DigestAlgorithm {
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

/// How `uniqueItems` detects duplicate array items
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum UniqueItemsStrategy {
    /// Keeps a tree of every distinct item seen so far and compares items structurally
    ///
    /// This never reports wrong results, but memory usage grows with the size of the array.
    Exact,
    /// Keeps only a digest of every item seen so far
    ///
    /// Items consisting of a single string, number, boolean or `null` are compared by value.
    /// Arrays and objects are compared by a cryptographic hash of their content, where the
    /// member order of objects does not affect the hash. Duplicates are never missed, but a
    /// hash collision could cause distinct items to be reported as duplicate. The probability
    /// for this is negligible for accidental collisions; this strategy should however not be
    /// used when an attacker controlling the JSON data can gain anything from deliberately
    /// causing a collision.
    Digest(DigestAlgorithm),
}

/// Registry of custom `format` validation functions, by format name
#[derive(Clone, Default)]
pub struct FormatRegistry {
    formats: HashMap<String, FormatFn>,
}

impl FormatRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        FormatRegistry::default()
    }

    /// Registers a format, replacing a previously registered or built-in format of the same name
    pub fn register(
        &mut self,
        name: impl Into<String>,
        validate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.formats.insert(name.into(), Arc::new(validate));
        self
    }

    /// Gets the format with the given name
    pub fn get(&self, name: &str) -> Option<&FormatFn> {
        self.formats.get(name)
    }
}

impl Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.formats.keys()).finish()
    }
}

/// Settings to customize the validator behavior
///
/// These settings are used when [compiling a schema](crate::schema::SchemaCompiler) and apply to all
/// validations performed with the compiled schema. Use the [`Default`] implementation to
/// obtain the default settings and then adjust individual fields:
/// ```
/// # use struson_schema::settings::*;
/// let settings = ValidatorSettings {
///     unique_items: UniqueItemsStrategy::Exact,
///     ..Default::default()
/// };
/// # assert!(settings.validate_formats);
/// ```
#[derive(Clone, Debug)]
pub struct ValidatorSettings {
    /// Strategy for detecting duplicate items for `uniqueItems`
    pub unique_items: UniqueItemsStrategy,

    /// Whether the subschemas of `allOf`, `anyOf` and `oneOf` are dropped as soon as they
    /// have reached their verdict
    ///
    /// This only reduces the number of validators kept alive, verdicts and failure details
    /// are the same either way.
    pub optimized_combinators: bool,

    /// Whether `format` is validated
    ///
    /// JSON Schema considers `format` an annotation whose validation is optional. When
    /// enabled the built-in formats are checked on a best-effort basis; unknown formats
    /// are always considered valid.
    pub validate_formats: bool,

    /// Whether `contentEncoding` and `contentMediaType` are validated
    ///
    /// Only the encoding `base64` and the media type `application/json` are supported.
    pub validate_content: bool,

    /// Whether `$ref` may point to any subschema with a JSON Pointer fragment
    ///
    /// When disabled a JSON Pointer fragment may only point to the document root or to an
    /// entry of `definitions`; schemas with their own `$id` remain reachable by that id.
    pub allow_ref_anywhere: bool,

    /// Custom `format` validation functions
    ///
    /// These take precedence over the built-in formats of the same name.
    pub custom_formats: FormatRegistry,

    /// Draft used for schemas which neither specify a draft in their source nor with `$schema`
    pub default_draft: Draft,
}

impl Default for ValidatorSettings {
    /// Creates the default validator settings
    ///
    /// - unique items: digest, SHA-256
    /// - optimized combinators: enabled
    /// - validate formats: enabled
    /// - validate content: enabled
    /// - allow `$ref` anywhere: enabled
    /// - custom formats: none
    /// - default draft: draft 7
    fn default() -> Self {
        ValidatorSettings {
            unique_items: UniqueItemsStrategy::Digest(DigestAlgorithm::Sha256),
            optimized_combinators: true,
            validate_formats: true,
            validate_content: true,
            allow_ref_anywhere: true,
            custom_formats: FormatRegistry::new(),
            default_draft: Draft::Draft7,
        }
    }
}
