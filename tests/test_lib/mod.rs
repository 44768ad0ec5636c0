//! Common library module for integration tests
// See https://doc.rust-lang.org/book/ch11-03-test-organization.html#submodules-in-integration-tests
// Not every test file uses every function
#![allow(dead_code)]

use std::{error::Error, path::PathBuf};

use struson_schema::{
    schema::{CompiledSchema, SchemaCompiler, SchemaSource},
    settings::ValidatorSettings,
    validator::Verdict,
    Rule,
};

pub type TestResult = Result<(), Box<dyn Error>>;

pub fn get_test_data_file_path() -> PathBuf {
    // Get path of test file, see https://stackoverflow.com/a/30004252
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/test_data.json");
    path
}

pub fn get_test_schema_file_path() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/test_schema.json");
    path
}

pub fn compile_with(settings: ValidatorSettings, schema: &str) -> Result<CompiledSchema, Box<dyn Error>> {
    let mut compiler = SchemaCompiler::new_custom(settings);
    compiler.add_source(SchemaSource::from_json(schema));
    Ok(compiler.compile()?)
}

pub fn validate(schema: &CompiledSchema, json: &str) -> Result<Verdict, Box<dyn Error>> {
    Ok(schema.root().validate_str(json)?)
}

/// Validates the JSON data and returns the rule of the top-level failure, if any
pub fn failed_rule(schema: &CompiledSchema, json: &str) -> Result<Option<Rule>, Box<dyn Error>> {
    Ok(validate(schema, json)?.failure().map(|f| f.rule))
}

#[track_caller]
pub fn assert_valid(schema: &CompiledSchema, json: &str) {
    match validate(schema, json) {
        Ok(Verdict::Valid) => {}
        r => panic!("expected {json} to be valid, but got {r:?}"),
    }
}

#[track_caller]
pub fn assert_invalid(schema: &CompiledSchema, json: &str, rule: Rule) {
    match validate(schema, json) {
        Ok(Verdict::Invalid(failure)) => assert_eq!(rule, failure.rule, "for {json}: {failure}"),
        r => panic!("expected {json} to be invalid, but got {r:?}"),
    }
}
