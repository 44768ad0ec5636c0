//! Built-in `format` checks
//!
//! The checks are best effort: they reject values which are clearly malformed, but they do
//! not implement every detail of the referenced RFCs.

use std::{
    net::{Ipv4Addr, Ipv6Addr},
    str::FromStr,
};

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use url::Url;

use crate::settings::FormatFn;

pub(crate) enum FormatCheck {
    Builtin(fn(&str) -> bool),
    Custom(FormatFn),
}

impl FormatCheck {
    pub(crate) fn check(&self, value: &str) -> bool {
        match self {
            FormatCheck::Builtin(f) => f(value),
            FormatCheck::Custom(f) => f(value),
        }
    }
}

/// Gets the built-in check for a format, `None` if the format is unknown
pub(crate) fn builtin(name: &str) -> Option<fn(&str) -> bool> {
    let check: fn(&str) -> bool = match name {
        "date-time" => is_date_time,
        "date" => is_date,
        "time" => is_time,
        "email" => |v| is_email(v, false),
        "idn-email" => |v| is_email(v, true),
        "hostname" => |v| is_hostname(v, false),
        "idn-hostname" => |v| is_hostname(v, true),
        "ipv4" => |v| Ipv4Addr::from_str(v).is_ok(),
        "ipv6" => |v| Ipv6Addr::from_str(v).is_ok(),
        "uri" => |v| is_uri(v, false),
        "uri-reference" => |v| is_uri_reference(v, false),
        "iri" => |v| is_uri(v, true),
        "iri-reference" => |v| is_uri_reference(v, true),
        "uri-template" => is_uri_template,
        "json-pointer" => is_json_pointer,
        "relative-json-pointer" => is_relative_json_pointer,
        "regex" => |v| Regex::new(v).is_ok(),
        _ => return None,
    };
    Some(check)
}

/// Whether `value` has the shape `YYYY-MM-DD`, which chrono alone does not enforce
fn has_date_shape(value: &str) -> bool {
    value.len() == 10
        && value.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// `full-date` of RFC 3339
fn is_date(value: &str) -> bool {
    has_date_shape(value) && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

/// `full-time` of RFC 3339, including the time zone offset
fn is_time(value: &str) -> bool {
    // Only complete timestamps can be parsed with an offset, so use an arbitrary date
    value.bytes().next().is_some_and(|b| b.is_ascii_digit())
        && DateTime::parse_from_rfc3339(&format!("1970-01-01T{value}")).is_ok()
}

/// `date-time` of RFC 3339
fn is_date_time(value: &str) -> bool {
    // chrono also accepts a space as separator
    value.get(..10).is_some_and(has_date_shape)
        && matches!(value.as_bytes().get(10), Some(b'T' | b't'))
        && DateTime::parse_from_rfc3339(value).is_ok()
}

fn is_hostname(value: &str, international: bool) -> bool {
    let value = value.strip_suffix('.').unwrap_or(value);
    if value.is_empty() || value.len() > 253 {
        return false;
    }
    value.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| {
                c.is_ascii_alphanumeric() || c == '-' || (international && c.is_alphanumeric())
            })
    })
}

fn is_email(value: &str, international: bool) -> bool {
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || local.starts_with('.') || local.ends_with('.') {
        return false;
    }
    if local.contains("..") {
        return false;
    }
    let local_valid = local.chars().all(|c| {
        c.is_ascii_alphanumeric()
            || "!#$%&'*+-/=?^_`{|}~.".contains(c)
            || (international && !c.is_ascii() && !c.is_whitespace())
    });
    if !local_valid {
        return false;
    }
    if let Some(literal) = domain.strip_prefix('[').and_then(|d| d.strip_suffix(']')) {
        return match literal.strip_prefix("IPv6:") {
            Some(ipv6) => Ipv6Addr::from_str(ipv6).is_ok(),
            None => Ipv4Addr::from_str(literal).is_ok(),
        };
    }
    is_hostname(domain, international)
}

/// Whether the URI contains only characters which may appear in it, possibly percent-encoded
fn has_valid_uri_chars(value: &str, international: bool) -> bool {
    let chars_valid = value.chars().all(|c| {
        if c.is_ascii() {
            c.is_ascii_graphic() && !"\"<>\\^`{|}".contains(c)
        } else {
            international && !c.is_whitespace() && !c.is_control()
        }
    });
    if !chars_valid {
        return false;
    }

    let mut rest = value;
    while let Some(index) = rest.find('%') {
        let encoded = &rest[index + 1..];
        match encoded.get(..2) {
            Some(hex) if hex.bytes().all(|b| b.is_ascii_hexdigit()) => rest = &encoded[2..],
            _ => return false,
        }
    }
    true
}

fn is_uri(value: &str, international: bool) -> bool {
    has_valid_uri_chars(value, international) && Url::parse(value).is_ok()
}

fn is_uri_reference(value: &str, international: bool) -> bool {
    if !has_valid_uri_chars(value, international) {
        return false;
    }
    // Any relative reference can be resolved against an absolute base
    match Url::parse("http://base.invalid/") {
        Ok(base) => base.join(value).is_ok(),
        Err(_) => false,
    }
}

fn is_uri_template(value: &str) -> bool {
    let mut in_expression = false;
    for c in value.chars() {
        match c {
            '{' if in_expression => return false,
            '{' => in_expression = true,
            '}' if !in_expression => return false,
            '}' => in_expression = false,
            _ => {}
        }
    }
    !in_expression
}

fn is_json_pointer(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    if !value.starts_with('/') {
        return false;
    }
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '~' && !matches!(chars.next(), Some('0' | '1')) {
            return false;
        }
    }
    true
}

fn is_relative_json_pointer(value: &str) -> bool {
    let length = value.bytes().take_while(u8::is_ascii_digit).count();
    if length == 0 || (length > 1 && value.starts_with('0')) {
        return false;
    }
    let rest = &value[length..];
    rest == "#" || is_json_pointer(rest)
}
