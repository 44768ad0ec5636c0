use std::fs::File;

use struson::{
    reader::{JsonReader, JsonStreamReader, ValueType},
    writer::{JsonStreamWriter, JsonWriter},
};
use struson_schema::{
    reader::{TokenReader, ValidatingReader, ValidatingReaderError},
    schema::CompiledSchema,
    writer::ValidatingWriterError,
    Rule, Token, ValidationFailure, Verdict,
};

use crate::test_lib::{get_test_data_file_path, get_test_schema_file_path, TestResult};

mod test_lib;

const SCHEMA: &str = r#"{
    "type": "object",
    "properties": {
        "id": {"type": "integer", "minimum": 0},
        "tags": {"type": "array", "items": {"type": "string"}, "uniqueItems": true},
        "meta": {"additionalProperties": {"type": ["number", "null"]}}
    },
    "required": ["id"],
    "dependencies": {"meta": ["tags"]}
}"#;

const DOCUMENTS: [&str; 9] = [
    r#"{"id": 1}"#,
    r#"{"id": 1, "tags": ["a", "b"], "meta": {"x": 1.5, "y": null}}"#,
    r#"{"id": -1}"#,
    r#"{"id": 1.5}"#,
    r#"{"tags": []}"#,
    r#"{"id": 1, "tags": ["a", "a"]}"#,
    r#"{"id": 1, "tags": [], "meta": {"x": "1"}}"#,
    r#"{"id": 1, "meta": {}}"#,
    "[1, 2]",
];

/// Compares the parts of failures which do not depend on the token source
fn assert_same_failure(expected: &ValidationFailure, actual: &ValidationFailure) {
    assert_eq!(expected.rule, actual.rule);
    assert_eq!(expected.property, actual.property);
    assert_eq!(expected.message, actual.message);
    assert_eq!(expected.causes.len(), actual.causes.len());
    for (expected_cause, actual_cause) in expected.causes.iter().zip(&actual.causes) {
        assert_same_failure(expected_cause, actual_cause);
    }
}

fn tokens(json: &str) -> Result<Vec<Token>, Box<dyn std::error::Error>> {
    let mut reader = TokenReader::new(JsonStreamReader::new(json.as_bytes()));
    let mut tokens = Vec::new();
    loop {
        let token = reader.next_token()?;
        if token == Token::EndOfStream {
            reader.finish()?;
            return Ok(tokens);
        }
        tokens.push(token);
    }
}

fn write_verdict(schema: &CompiledSchema, json: &str) -> Result<Verdict, Box<dyn std::error::Error>> {
    let mut writer = Vec::<u8>::new();
    let mut json_writer = schema.root().writer(JsonStreamWriter::new(&mut writer));
    for token in tokens(json)? {
        match json_writer.write_token(&token) {
            Ok(()) => {}
            Err(ValidatingWriterError::Invalid(failure)) => return Ok(Verdict::Invalid(*failure)),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(json_writer.finish_document()?)
}

/// Reads the value with the validating reader, writing it to the JSON writer
fn transfer<J: JsonReader>(
    json_reader: &mut ValidatingReader<'_, J>,
    json_writer: &mut JsonStreamWriter<&mut Vec<u8>>,
) -> Result<(), Box<dyn std::error::Error>> {
    match json_reader.peek()? {
        ValueType::Array => {
            json_reader.begin_array()?;
            json_writer.begin_array()?;
            while json_reader.has_next()? {
                transfer(json_reader, json_writer)?;
            }
            json_reader.end_array()?;
            json_writer.end_array()?;
        }
        ValueType::Object => {
            json_reader.begin_object()?;
            json_writer.begin_object()?;
            while json_reader.has_next()? {
                json_writer.name(&json_reader.next_name()?)?;
                transfer(json_reader, json_writer)?;
            }
            json_reader.end_object()?;
            json_writer.end_object()?;
        }
        ValueType::String => json_writer.string_value(&json_reader.next_string()?)?,
        ValueType::Number => {
            json_writer.number_value_from_string(&json_reader.next_number_as_string()?)?
        }
        ValueType::Boolean => json_writer.bool_value(json_reader.next_bool()?)?,
        ValueType::Null => {
            json_reader.next_null()?;
            json_writer.null_value()?;
        }
    }
    Ok(())
}

#[test]
fn same_verdict_for_reading_and_writing() -> TestResult {
    let schema = CompiledSchema::from_json(SCHEMA)?;
    for json in DOCUMENTS {
        let read = schema.root().validate_str(json)?;
        let written = write_verdict(&schema, json)?;
        let fed = schema.root().validate_tokens(tokens(json)?)?;

        assert_eq!(read.is_valid(), written.is_valid(), "for {json}");
        assert_eq!(fed, written, "for {json}");
        if let (Some(expected), Some(actual)) = (read.failure(), written.failure()) {
            assert_same_failure(expected, actual);
        }
    }
    Ok(())
}

#[test]
fn validating_transfer() -> TestResult {
    let schema = CompiledSchema::from_json(&std::fs::read_to_string(get_test_schema_file_path())?)?;
    let mut json_reader = schema
        .root()
        .reader(JsonStreamReader::new(File::open(get_test_data_file_path())?));
    let mut writer = Vec::<u8>::new();
    let mut json_writer = JsonStreamWriter::new(&mut writer);

    transfer(&mut json_reader, &mut json_writer)?;
    assert_eq!(Verdict::Valid, json_reader.finish()?);
    json_writer.finish_document()?;

    // The transferred document is valid as well
    let json = String::from_utf8(writer)?;
    assert!(schema.root().validate_str(&json)?.is_valid());
    assert!(json.starts_with(r#"{"name":"Example shop""#), "{json}");
    Ok(())
}

#[test]
fn reader_fails_at_invalid_value() -> TestResult {
    let schema = CompiledSchema::from_json(SCHEMA)?;
    let json = r#"{"id": 1, "tags": ["a", 2, "b"]}"#;
    let mut json_reader = schema.root().reader(JsonStreamReader::new(json.as_bytes()));

    json_reader.begin_object()?;
    assert_eq!("id", json_reader.next_name()?);
    assert_eq!("1", json_reader.next_number_as_string()?);
    assert_eq!("tags", json_reader.next_name()?);
    json_reader.begin_array()?;
    assert_eq!("a", json_reader.next_string()?);
    match json_reader.next_number_as_string() {
        Err(ValidatingReaderError::Invalid(failure)) => {
            assert_eq!(Rule::Properties, failure.rule);
            assert_eq!(Some("tags".to_owned()), failure.property);
            assert_eq!(Rule::Type, failure.leaves()[0].rule);
        }
        r => panic!("unexpected result: {r:?}"),
    }
    // Remains failed
    assert!(matches!(
        json_reader.next_string(),
        Err(ValidatingReaderError::Invalid(_))
    ));
    Ok(())
}

#[test]
fn writer_rejects_value_before_writing() -> TestResult {
    let schema = CompiledSchema::from_json(SCHEMA)?;
    let mut writer = Vec::<u8>::new();
    let mut json_writer = schema.root().writer(JsonStreamWriter::new(&mut writer));

    json_writer.begin_object()?;
    json_writer.name("id")?;
    match json_writer.number_value(-3) {
        Err(ValidatingWriterError::Invalid(failure)) => {
            assert_eq!(Rule::Minimum, failure.leaves()[0].rule);
        }
        r => panic!("unexpected result: {r:?}"),
    }
    assert!(matches!(json_writer.verdict(), Some(Verdict::Invalid(_))));
    assert!(json_writer.end_object().is_err());
    Ok(())
}

#[test]
fn skipped_values_are_validated() -> TestResult {
    let schema = CompiledSchema::from_json(SCHEMA)?;
    let json = r#"{"id": 1, "meta": {"a": {"nested": true}}}"#;
    let mut json_reader = schema.root().reader(JsonStreamReader::new(json.as_bytes()));

    json_reader.begin_object()?;
    assert_eq!("id", json_reader.next_name()?);
    json_reader.skip_value()?;
    assert!(json_reader.verdict().is_none());
    assert_eq!("meta", json_reader.next_name()?);
    assert!(matches!(
        json_reader.skip_value(),
        Err(ValidatingReaderError::Invalid(_))
    ));
    Ok(())
}
