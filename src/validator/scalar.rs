//! Keywords which are decided by the first token of a value

use base64::{engine::general_purpose::STANDARD, Engine as _};
use struson::reader::{JsonReader, JsonStreamReader, ReaderSettings};

use super::{
    spec::{ContentSpec, Keyword, NumericSpec, StringSpec},
    Instance, Rule, Step, ValidationFailure,
};
use crate::{json_number::JsonNumber, location::Location, schema::JsonType, token::Token};

pub(crate) struct ScalarInstance<'s> {
    keyword: &'s Keyword,
}

impl<'s> ScalarInstance<'s> {
    pub(crate) fn new(keyword: &'s Keyword) -> Self {
        ScalarInstance { keyword }
    }
}

impl Instance for ScalarInstance<'_> {
    fn validate(&mut self, token: &Token, location: &Location<'_>) -> Step {
        let result = match (self.keyword, token) {
            (Keyword::Type(types), _) => check_type(types, token),
            (Keyword::Numeric(spec), Token::Number(value)) => check_numeric(spec, value),
            (Keyword::String(spec), Token::Text(value)) => check_string(spec, value),
            (Keyword::Format(format), Token::Text(value)) => {
                if format.check.check(value) {
                    Ok(())
                } else {
                    Err((Rule::Format, format!("value is not a valid '{}'", format.name)))
                }
            }
            (Keyword::Content(spec), Token::Text(value)) => check_content(spec, value),
            _ => Ok(()),
        };
        match result {
            Ok(()) => Step::Valid,
            Err((rule, message)) => Step::Invalid(ValidationFailure::new(rule, location, message)),
        }
    }
}

type CheckResult = Result<(), (Rule, String)>;

fn matches_type(json_type: JsonType, token: &Token) -> bool {
    match (json_type, token) {
        (JsonType::Array, Token::StartArray)
        | (JsonType::Object, Token::StartObject)
        | (JsonType::Boolean, Token::Bool(_))
        | (JsonType::Null, Token::Null)
        | (JsonType::Number, Token::Number(_))
        | (JsonType::String, Token::Text(_)) => true,
        (JsonType::Integer, Token::Number(n)) => n.is_integer(),
        _ => false,
    }
}

fn check_type(types: &[JsonType], token: &Token) -> CheckResult {
    if types.iter().any(|t| matches_type(*t, token)) {
        return Ok(());
    }
    let expected = types
        .iter()
        .map(JsonType::to_string)
        .collect::<Vec<_>>()
        .join(" or ");
    let actual = match token {
        Token::StartArray => "array",
        Token::StartObject => "object",
        Token::Bool(_) => "boolean",
        Token::Null => "null",
        Token::Number(n) if n.is_integer() => "integer",
        Token::Number(_) => "number",
        _ => "string",
    };
    Err((Rule::Type, format!("expected {expected}, but got {actual}")))
}

fn check_numeric(spec: &NumericSpec, value: &JsonNumber) -> CheckResult {
    if let Some(minimum) = &spec.minimum {
        if value < minimum {
            return Err((Rule::Minimum, format!("{value} is less than {minimum}")));
        }
    }
    if let Some(minimum) = &spec.exclusive_minimum {
        if value <= minimum {
            return Err((
                Rule::ExclusiveMinimum,
                format!("{value} is less than or equal to {minimum}"),
            ));
        }
    }
    if let Some(maximum) = &spec.maximum {
        if value > maximum {
            return Err((Rule::Maximum, format!("{value} is greater than {maximum}")));
        }
    }
    if let Some(maximum) = &spec.exclusive_maximum {
        if value >= maximum {
            return Err((
                Rule::ExclusiveMaximum,
                format!("{value} is greater than or equal to {maximum}"),
            ));
        }
    }
    if let Some(divisor) = &spec.multiple_of {
        if !value.is_multiple_of(divisor) {
            return Err((
                Rule::MultipleOf,
                format!("{value} is not a multiple of {divisor}"),
            ));
        }
    }
    Ok(())
}

fn check_string(spec: &StringSpec, value: &str) -> CheckResult {
    if spec.min_length.is_some() || spec.max_length.is_some() {
        // Length in Unicode code points
        let length = value.chars().count() as u64;
        if let Some(min_length) = spec.min_length {
            if length < min_length {
                return Err((
                    Rule::MinLength,
                    format!("length {length} is less than {min_length}"),
                ));
            }
        }
        if let Some(max_length) = spec.max_length {
            if length > max_length {
                return Err((
                    Rule::MaxLength,
                    format!("length {length} is greater than {max_length}"),
                ));
            }
        }
    }
    if let Some(pattern) = &spec.pattern {
        if !pattern.is_match(value) {
            return Err((
                Rule::Pattern,
                format!("value does not match '{}'", pattern.as_str()),
            ));
        }
    }
    Ok(())
}

fn is_json(bytes: &[u8]) -> bool {
    let mut json_reader = JsonStreamReader::new_custom(
        bytes,
        ReaderSettings {
            restrict_number_values: false,
            ..Default::default()
        },
    );
    json_reader.skip_value().is_ok() && json_reader.consume_trailing_whitespace().is_ok()
}

fn check_content(spec: &ContentSpec, value: &str) -> CheckResult {
    let decoded = if spec.base64 {
        match STANDARD.decode(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                return Err((
                    Rule::ContentEncoding,
                    format!("value is not valid base64: {e}"),
                ))
            }
        }
    } else {
        None
    };
    if spec.json {
        let bytes = decoded.as_deref().unwrap_or(value.as_bytes());
        if !is_json(bytes) {
            return Err((
                Rule::ContentMediaType,
                "value is not valid 'application/json'".to_owned(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{schema::CompiledSchema, validator::Verdict};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn failed_rule(schema: &CompiledSchema, json: &str) -> Result<Option<Rule>, Box<dyn std::error::Error>> {
        Ok(match schema.root().validate_str(json)? {
            Verdict::Valid => None,
            Verdict::Invalid(failure) => Some(failure.rule),
        })
    }

    #[test]
    fn integer_type() -> TestResult {
        let schema = CompiledSchema::from_json(r#"{"type": "integer"}"#)?;
        assert_eq!(None, failed_rule(&schema, "4")?);
        assert_eq!(None, failed_rule(&schema, "4.0")?);
        assert_eq!(None, failed_rule(&schema, "4e2")?);
        assert_eq!(Some(Rule::Type), failed_rule(&schema, "4.1")?);
        assert_eq!(Some(Rule::Type), failed_rule(&schema, "\"4\"")?);

        let verdict = schema.root().validate_str("[1]")?;
        assert_eq!(
            "expected integer, but got array",
            verdict.failure().ok_or("should be invalid")?.message
        );
        Ok(())
    }

    #[test]
    fn numeric_bounds() -> TestResult {
        let schema = CompiledSchema::from_json(
            r#"{"minimum": 1.5, "exclusiveMaximum": 10, "multipleOf": 0.5}"#,
        )?;
        assert_eq!(None, failed_rule(&schema, "1.5")?);
        assert_eq!(None, failed_rule(&schema, "9.5")?);
        assert_eq!(Some(Rule::Minimum), failed_rule(&schema, "1")?);
        assert_eq!(Some(Rule::ExclusiveMaximum), failed_rule(&schema, "10")?);
        assert_eq!(Some(Rule::MultipleOf), failed_rule(&schema, "2.25")?);
        // Other types are not affected
        assert_eq!(None, failed_rule(&schema, "\"a\"")?);

        // Numbers beyond the precision of floating point numbers are compared exactly
        let schema = CompiledSchema::from_json(r#"{"maximum": 12345678901234567890123}"#)?;
        assert_eq!(None, failed_rule(&schema, "12345678901234567890123.0")?);
        assert_eq!(Some(Rule::Maximum), failed_rule(&schema, "12345678901234567890124")?);
        Ok(())
    }

    #[test]
    fn string_keywords() -> TestResult {
        let schema =
            CompiledSchema::from_json(r#"{"minLength": 2, "maxLength": 3, "pattern": "^a"}"#)?;
        assert_eq!(None, failed_rule(&schema, "\"a\u{1F600}\"")?);
        assert_eq!(Some(Rule::MinLength), failed_rule(&schema, "\"a\"")?);
        assert_eq!(Some(Rule::MaxLength), failed_rule(&schema, "\"abcd\"")?);
        assert_eq!(Some(Rule::Pattern), failed_rule(&schema, "\"ba\"")?);
        assert_eq!(None, failed_rule(&schema, "1")?);
        Ok(())
    }

    #[test]
    fn format() -> TestResult {
        let schema = CompiledSchema::from_json(r#"{"format": "ipv4"}"#)?;
        assert_eq!(None, failed_rule(&schema, "\"127.0.0.1\"")?);
        assert_eq!(Some(Rule::Format), failed_rule(&schema, "\"localhost\"")?);

        let schema = CompiledSchema::from_json(r#"{"format": "unknown"}"#)?;
        assert_eq!(None, failed_rule(&schema, "\"anything\"")?);
        Ok(())
    }

    #[test]
    fn content() -> TestResult {
        let schema = CompiledSchema::from_json(
            r#"{"contentEncoding": "base64", "contentMediaType": "application/json"}"#,
        )?;
        // `{"a": 1}`
        assert_eq!(None, failed_rule(&schema, "\"eyJhIjogMX0=\"")?);
        assert_eq!(Some(Rule::ContentEncoding), failed_rule(&schema, "\"not base64!\"")?);
        // `{"a":`
        assert_eq!(Some(Rule::ContentMediaType), failed_rule(&schema, "\"eyJhIjo=\"")?);

        let schema = CompiledSchema::from_json(r#"{"contentMediaType": "application/json"}"#)?;
        assert_eq!(None, failed_rule(&schema, r#""[1, 2]""#)?);
        assert_eq!(Some(Rule::ContentMediaType), failed_rule(&schema, r#""[1, 2] 3""#)?);
        Ok(())
    }
}
