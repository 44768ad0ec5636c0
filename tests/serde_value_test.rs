#![cfg(feature = "serde")]

use serde_json::json;
use struson_schema::{schema::CompiledSchema, Rule};

use crate::test_lib::{get_test_data_file_path, get_test_schema_file_path, TestResult};

mod test_lib;

#[test]
fn same_verdict_as_json_text() -> TestResult {
    let schema = CompiledSchema::from_json(&std::fs::read_to_string(get_test_schema_file_path())?)?;
    let json = std::fs::read_to_string(get_test_data_file_path())?;
    let value: serde_json::Value = serde_json::from_str(&json)?;

    assert!(schema.root().validate_str(&json)?.is_valid());
    assert!(schema.root().validate_value(&value)?.is_valid());

    let mut invalid = value.clone();
    invalid["products"][1]["price"] = json!(-1);
    let verdict = schema.root().validate_value(&invalid)?;
    let failure = verdict.failure().ok_or("should be invalid")?;
    assert_eq!(Rule::Properties, failure.rule);
    assert_eq!(Some("products".to_owned()), failure.property);
    assert_eq!(Rule::ExclusiveMinimum, failure.leaves()[0].rule);
    assert!(
        failure.leaves()[0].location.starts_with("pointer '/products/1/price'"),
        "{}",
        failure.leaves()[0].location
    );
    Ok(())
}

#[test]
fn serialized_failure() -> TestResult {
    let schema = CompiledSchema::from_json(r#"{"required": ["a"], "properties": {"b": {"type": "string"}}}"#)?;
    let verdict = schema.root().validate_value(&json!({"a": 1, "b": false}))?;
    let failure = verdict.failure().ok_or("should be invalid")?;

    assert_eq!(
        json!({
            "rule": "properties",
            "property": "b",
            "message": "property 'b' is invalid",
            "location": "pointer '/b'",
            "causes": [{
                "rule": "type",
                "property": null,
                "message": "expected string, but got boolean",
                "location": "pointer '/b'"
            }]
        }),
        serde_json::to_value(failure)?
    );
    Ok(())
}
