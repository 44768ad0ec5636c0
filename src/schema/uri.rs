//! URI handling for `$id` and `$ref`
//!
//! Absolute URIs are resolved with the `url` crate. Schemas without an absolute base URI
//! are common (for example a single schema given as string), so relative bases are
//! supported as well, with simplified path merging.

use std::borrow::Cow;

use url::Url;

/// Splits `uri` into the part before `#` and the fragment, if any
pub(crate) fn split_fragment(uri: &str) -> (&str, Option<&str>) {
    match uri.split_once('#') {
        Some((document, fragment)) => (document, Some(fragment)),
        None => (uri, None),
    }
}

/// Resolves `reference` against `base`
pub(crate) fn resolve(base: &str, reference: &str) -> String {
    if let Ok(absolute) = Url::parse(reference) {
        return absolute.to_string();
    }
    if let Ok(base_url) = Url::parse(base) {
        if let Ok(joined) = base_url.join(reference) {
            return joined.to_string();
        }
    }

    let (base_document, _) = split_fragment(base);
    if reference.is_empty() {
        return base_document.to_owned();
    }
    if reference.starts_with('#') {
        return format!("{base_document}{reference}");
    }
    if reference.starts_with('/') {
        return reference.to_owned();
    }
    match base_document.rfind('/') {
        Some(index) => format!("{}{reference}", &base_document[..=index]),
        None => reference.to_owned(),
    }
}

/// Converts a resolved URI to the form used as registry key
///
/// The fragment is percent-decoded, so that `#/definitions/a%20b` and `#/definitions/a b`
/// address the same schema.
pub(crate) fn registry_key(uri: &str) -> String {
    match split_fragment(uri) {
        (document, Some(fragment)) => {
            let decoded = urlencoding::decode(fragment).unwrap_or(Cow::Borrowed(fragment));
            format!("{document}#{decoded}")
        }
        (document, None) => document.to_owned(),
    }
}
