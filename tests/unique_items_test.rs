use struson_schema::{
    schema::CompiledSchema,
    settings::{DigestAlgorithm, UniqueItemsStrategy, ValidatorSettings},
    Rule,
};

use crate::test_lib::{compile_with, failed_rule, TestResult};

mod test_lib;

const STRATEGIES: [UniqueItemsStrategy; 5] = [
    UniqueItemsStrategy::Exact,
    UniqueItemsStrategy::Digest(DigestAlgorithm::Sha224),
    UniqueItemsStrategy::Digest(DigestAlgorithm::Sha256),
    UniqueItemsStrategy::Digest(DigestAlgorithm::Sha384),
    UniqueItemsStrategy::Digest(DigestAlgorithm::Sha512),
];

fn unique_items_schema(
    unique_items: UniqueItemsStrategy,
) -> Result<CompiledSchema, Box<dyn std::error::Error>> {
    compile_with(
        ValidatorSettings {
            unique_items,
            ..Default::default()
        },
        r#"{"uniqueItems": true}"#,
    )
}

#[test]
fn duplicates() -> TestResult {
    let documents = [
        "[1, 1]",
        "[1.0, 1]",
        "[1e2, 100]",
        "[-0, 0]",
        r#"["a", "b", "a"]"#,
        "[null, true, null]",
        "[[1, [2]], [1, [2.0]]]",
        r#"[{"a": 1, "b": 2}, {"b": 2, "a": 1}]"#,
        r#"[{"a": {"x": [], "y": {}}}, 1, {"a": {"y": {}, "x": []}}]"#,
        "[[], {}, []]",
    ];
    for strategy in STRATEGIES {
        let schema = unique_items_schema(strategy)?;
        for json in documents {
            assert_eq!(
                Some(Rule::UniqueItems),
                failed_rule(&schema, json)?,
                "{strategy:?}: {json}"
            );
        }
    }
    Ok(())
}

#[test]
fn distinct_items() -> TestResult {
    let documents = [
        "[]",
        "[1]",
        r#"[1, "1", true, null, [1], {"1": 1}]"#,
        "[0.1, 0.10000000000000001]",
        "[[1, 2], [2, 1]]",
        r#"[{"a": 1}, {"a": 1, "b": 1}, {"b": 1}]"#,
        r#"[{"a": [1]}, {"a": 1}, {"a": [[1]]}]"#,
        r#"["a", ["a"], {"a": "a"}]"#,
        "[[], {}, [[]], [{}]]",
    ];
    for strategy in STRATEGIES {
        let schema = unique_items_schema(strategy)?;
        for json in documents {
            assert_eq!(None, failed_rule(&schema, json)?, "{strategy:?}: {json}");
        }
    }
    Ok(())
}

#[test]
fn duplicate_reported_at_completing_item() -> TestResult {
    for strategy in STRATEGIES {
        let schema = unique_items_schema(strategy)?;
        let verdict = schema.root().validate_str(r#"[{"a": 1}, 2, {"a": 1}, 3]"#)?;
        let failure = verdict.failure().ok_or("should be invalid")?;
        assert_eq!("item 2 equals an earlier item", failure.message);
        assert!(failure.location.starts_with("pointer '/2'"), "{}", failure.location);
    }
    Ok(())
}

#[test]
fn nested_arrays() -> TestResult {
    // Uniqueness only applies to the array with the keyword, not to nested arrays
    let schema = compile_with(
        ValidatorSettings::default(),
        r#"{"uniqueItems": true, "items": {"uniqueItems": false}}"#,
    )?;
    assert_eq!(None, failed_rule(&schema, "[[1, 1], [1]]")?);
    assert_eq!(Some(Rule::UniqueItems), failed_rule(&schema, "[[1, 1], [1, 1]]")?);

    let schema = CompiledSchema::from_json(r#"{"items": {"uniqueItems": true}}"#)?;
    assert_eq!(None, failed_rule(&schema, "[[1, 2], [1, 2]]")?);
    assert_eq!(Some(Rule::Items), failed_rule(&schema, "[[1, 2], [2, 2]]")?);
    Ok(())
}
