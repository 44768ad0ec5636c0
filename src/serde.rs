//! Module for validating already materialized [`serde_json::Value`]s
//!
//! The value is converted to the [`Token`] sequence a JSON reader would produce for
//! its JSON text, and fed to a [`Validation`]. Conversion stops as soon as the verdict is
//! known. Object members are emitted in the iteration order of the `serde_json` map,
//! which does not affect any validation result.
//!
//! Usually this module is not used directly, see
//! [`SchemaValidator::validate_value`](crate::schema::SchemaValidator::validate_value).

use thiserror::Error;

use crate::{
    json_number::{JsonNumber, MalformedNumberError},
    token::Token,
    validator::{EngineError, Validation, Verdict},
};

/// Error which occurs when validating a `serde_json` value
#[derive(Error, Debug)]
pub enum ValueValidationError {
    /// A number of the value could not be converted
    #[error("unsupported number: {0}")]
    Number(#[from] MalformedNumberError),
    /// The validation engine rejected the emitted tokens
    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn number_token(number: &serde_json::Number) -> Result<Token, MalformedNumberError> {
    if let Some(i) = number.as_i64() {
        return Ok(Token::number(i));
    }
    if let Some(u) = number.as_u64() {
        return Ok(Token::number(u));
    }
    Ok(Token::Number(number.to_string().parse::<JsonNumber>()?))
}

/// Feeds the tokens of `value`, returns the verdict as soon as it is known
fn emit(
    validation: &mut Validation<'_>,
    value: &serde_json::Value,
) -> Result<Option<Verdict>, ValueValidationError> {
    let feed = |validation: &mut Validation<'_>, token: Token| {
        validation
            .feed(&token)
            .map(|verdict| verdict.cloned())
            .map_err(ValueValidationError::from)
    };

    match value {
        serde_json::Value::Null => feed(validation, Token::Null),
        serde_json::Value::Bool(b) => feed(validation, Token::Bool(*b)),
        serde_json::Value::Number(n) => feed(validation, number_token(n)?),
        serde_json::Value::String(s) => feed(validation, Token::text(s.as_str())),
        serde_json::Value::Array(items) => {
            if let Some(verdict) = feed(validation, Token::StartArray)? {
                return Ok(Some(verdict));
            }
            for item in items {
                if let Some(verdict) = emit(validation, item)? {
                    return Ok(Some(verdict));
                }
            }
            feed(validation, Token::EndArray)
        }
        serde_json::Value::Object(members) => {
            if let Some(verdict) = feed(validation, Token::StartObject)? {
                return Ok(Some(verdict));
            }
            for (name, member_value) in members {
                if let Some(verdict) = feed(validation, Token::field_name(name.as_str()))? {
                    return Ok(Some(verdict));
                }
                if let Some(verdict) = emit(validation, member_value)? {
                    return Ok(Some(verdict));
                }
            }
            feed(validation, Token::EndObject)
        }
    }
}

pub(crate) fn validate_value(
    mut validation: Validation<'_>,
    value: &serde_json::Value,
) -> Result<Verdict, ValueValidationError> {
    if let Some(verdict) = emit(&mut validation, value)? {
        return Ok(verdict);
    }
    validation.feed(&Token::EndOfStream)?;
    Ok(validation.finish()?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{schema::CompiledSchema, validator::Rule};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn validate_values() -> TestResult {
        let schema = CompiledSchema::from_json(
            r#"{
                "type": "object",
                "properties": {"a": {"type": "array", "items": {"type": "integer"}}},
                "required": ["a"]
            }"#,
        )?;
        let root = schema.root();
        assert!(root.validate_value(&json!({"a": [1, 2, 3]}))?.is_valid());
        assert!(root.validate_value(&json!({"a": [], "b": {"c": null}}))?.is_valid());

        let verdict = root.validate_value(&json!({"a": [1, 2.5]}))?;
        assert_eq!(Rule::Properties, verdict.failure().ok_or("should be invalid")?.rule);
        let verdict = root.validate_value(&json!({"b": true}))?;
        assert_eq!(Rule::Required, verdict.failure().ok_or("should be invalid")?.rule);
        Ok(())
    }

    #[test]
    fn numbers() -> TestResult {
        let schema = CompiledSchema::from_json(r#"{"maximum": 18446744073709551615}"#)?;
        let root = schema.root();
        assert!(root.validate_value(&json!(u64::MAX))?.is_valid());
        assert!(root.validate_value(&json!(-1.5e300))?.is_valid());
        assert!(!root.validate_value(&json!(1.9e19))?.is_valid());

        let schema = CompiledSchema::from_json(r#"{"multipleOf": 0.1}"#)?;
        assert!(schema.root().validate_value(&json!(0.3))?.is_valid());
        Ok(())
    }

    #[test]
    fn failure_serialization() -> TestResult {
        let schema = CompiledSchema::from_json(r#"{"items": {"maxLength": 1}}"#)?;
        let verdict = schema.root().validate_value(&json!(["a", "bc"]))?;
        let failure = verdict.failure().ok_or("should be invalid")?;

        let serialized = serde_json::to_value(failure)?;
        assert_eq!(json!("items"), serialized["rule"]);
        assert_eq!(json!("maxLength"), serialized["causes"][0]["rule"]);
        assert_eq!(None, serialized["causes"][0].get("causes"));
        Ok(())
    }
}
