//! Schema document model
//!
//! A schema document is first materialized as [`JsonValue`] and then converted to a tree
//! of [`SchemaNode`]s. The conversion is driven by the table [`KEYWORDS`], which maps each
//! recognized keyword to the drafts it exists in and to the function parsing its value.
//! Members which are not keywords of the draft are either annotations and skipped, or
//! parsed leniently as schemas so that `$id`s nested inside of them can be registered.

use std::str::FromStr;

use indexmap::IndexMap;
use regex::Regex;
use tracing::warn;

use super::{Draft, SchemaError};
use crate::{json_number::JsonNumber, location::JsonPointer, value::JsonValue};

/// Type name as used by the `type` keyword
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, strum::EnumString, Debug)]
#[strum(serialize_all = "lowercase")]
pub enum JsonType {
    /// JSON array
    Array,
    /// JSON boolean
    Boolean,
    /// JSON number without fractional part
    Integer,
    /// JSON `null`
    Null,
    /// Any JSON number
    Number,
    /// JSON object
    Object,
    /// JSON string
    String,
}

/// Regular expression of `pattern` or `patternProperties`
#[derive(Clone, Debug)]
pub(crate) struct Pattern {
    regex: Regex,
}

impl Pattern {
    fn compile(source: &str, pointer: &JsonPointer) -> Result<Self, SchemaError> {
        match Regex::new(source) {
            Ok(regex) => Ok(Pattern { regex }),
            Err(error) => Err(SchemaError::InvalidPattern {
                pointer: pointer.to_string(),
                pattern: source.to_owned(),
                error,
            }),
        }
    }

    /// Whether the pattern matches somewhere in `value`; patterns are not implicitly anchored
    pub(crate) fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    pub(crate) fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// A schema, or a boolean standing in for a schema
#[derive(Debug)]
pub(crate) struct SchemaNode {
    /// Pointer of the schema within its document
    pub(crate) path: JsonPointer,
    pub(crate) body: SchemaBody,
}

#[derive(Debug)]
pub(crate) enum SchemaBody {
    Bool(bool),
    Object(Box<Keywords>),
}

/// Value of `exclusiveMinimum` or `exclusiveMaximum`
#[derive(Debug)]
pub(crate) enum Exclusive {
    /// Draft 4: modifies `minimum` or `maximum`
    Flag(bool),
    /// Draft 6 and newer: a bound of its own
    Bound(JsonNumber),
}

#[derive(Debug)]
pub(crate) enum Items {
    Single(SchemaNode),
    Tuple(Vec<SchemaNode>),
}

#[derive(Debug)]
pub(crate) enum Dependency {
    Schema(SchemaNode),
    Properties(Vec<String>),
}

/// Recognized keywords of a schema object
#[derive(Debug, Default)]
pub(crate) struct Keywords {
    pub(crate) id: Option<String>,
    pub(crate) reference: Option<String>,

    pub(crate) types: Option<Vec<JsonType>>,
    pub(crate) enum_values: Option<Vec<JsonValue>>,
    pub(crate) const_value: Option<JsonValue>,

    pub(crate) multiple_of: Option<JsonNumber>,
    pub(crate) maximum: Option<JsonNumber>,
    pub(crate) exclusive_maximum: Option<Exclusive>,
    pub(crate) minimum: Option<JsonNumber>,
    pub(crate) exclusive_minimum: Option<Exclusive>,

    pub(crate) max_length: Option<u64>,
    pub(crate) min_length: Option<u64>,
    pub(crate) pattern: Option<Pattern>,
    pub(crate) format: Option<String>,
    pub(crate) content_encoding: Option<String>,
    pub(crate) content_media_type: Option<String>,

    pub(crate) items: Option<Items>,
    pub(crate) additional_items: Option<SchemaNode>,
    pub(crate) max_items: Option<u64>,
    pub(crate) min_items: Option<u64>,
    pub(crate) unique_items: bool,
    pub(crate) contains: Option<SchemaNode>,

    pub(crate) max_properties: Option<u64>,
    pub(crate) min_properties: Option<u64>,
    pub(crate) required: Vec<String>,
    pub(crate) properties: IndexMap<String, SchemaNode>,
    pub(crate) pattern_properties: Vec<(Pattern, SchemaNode)>,
    pub(crate) additional_properties: Option<SchemaNode>,
    pub(crate) dependencies: IndexMap<String, Dependency>,
    pub(crate) property_names: Option<SchemaNode>,

    pub(crate) all_of: Vec<SchemaNode>,
    pub(crate) any_of: Option<Vec<SchemaNode>>,
    pub(crate) one_of: Option<Vec<SchemaNode>>,
    pub(crate) not: Option<SchemaNode>,
    pub(crate) if_schema: Option<SchemaNode>,
    pub(crate) then_schema: Option<SchemaNode>,
    pub(crate) else_schema: Option<SchemaNode>,

    pub(crate) definitions: IndexMap<String, SchemaNode>,
    /// Object-valued members which are not keywords, parsed leniently as schemas
    pub(crate) extensions: Vec<SchemaNode>,
}

impl Keywords {
    /// All direct subschemas, in no particular order
    pub(crate) fn subschemas(&self) -> Vec<&SchemaNode> {
        let mut result = Vec::new();
        match &self.items {
            Some(Items::Single(node)) => result.push(node),
            Some(Items::Tuple(nodes)) => result.extend(nodes),
            None => {}
        }
        result.extend(
            [
                &self.additional_items,
                &self.contains,
                &self.additional_properties,
                &self.property_names,
                &self.not,
                &self.if_schema,
                &self.then_schema,
                &self.else_schema,
            ]
            .into_iter()
            .flatten(),
        );
        result.extend(self.properties.values());
        result.extend(self.pattern_properties.iter().map(|(_, node)| node));
        result.extend(self.dependencies.values().filter_map(|d| match d {
            Dependency::Schema(node) => Some(node),
            Dependency::Properties(_) => None,
        }));
        result.extend(&self.all_of);
        result.extend(self.any_of.iter().flatten());
        result.extend(self.one_of.iter().flatten());
        result.extend(self.definitions.values());
        result.extend(&self.extensions);
        result
    }
}

struct KeywordContext {
    draft: Draft,
    /// Pointer of the keyword value
    pointer: JsonPointer,
}

impl KeywordContext {
    fn malformed(&self, message: impl Into<String>) -> SchemaError {
        SchemaError::MalformedSchema {
            pointer: self.pointer.to_string(),
            message: message.into(),
        }
    }

    fn schema(&self, value: &JsonValue) -> Result<SchemaNode, SchemaError> {
        parse_schema(value, self.pointer.clone(), self.draft)
    }

    fn schema_array(&self, value: &JsonValue) -> Result<Vec<SchemaNode>, SchemaError> {
        let items = value
            .as_array()
            .ok_or_else(|| self.malformed("expected an array of schemas"))?;
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                parse_schema(item, self.pointer.join(index as u64), self.draft)
            })
            .collect()
    }

    fn schema_map(&self, value: &JsonValue) -> Result<IndexMap<String, SchemaNode>, SchemaError> {
        let members = value
            .as_object()
            .ok_or_else(|| self.malformed("expected an object of schemas"))?;
        members
            .iter()
            .map(|(name, member)| {
                let node = parse_schema(member, self.pointer.join(name.as_str()), self.draft)?;
                Ok((name.clone(), node))
            })
            .collect()
    }

    fn string(&self, value: &JsonValue) -> Result<String, SchemaError> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| self.malformed("expected a string"))
    }

    fn string_array(&self, value: &JsonValue) -> Result<Vec<String>, SchemaError> {
        let items = value
            .as_array()
            .ok_or_else(|| self.malformed("expected an array of strings"))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| self.malformed("expected an array of strings"))
            })
            .collect()
    }

    fn number(&self, value: &JsonValue) -> Result<JsonNumber, SchemaError> {
        value
            .as_number()
            .cloned()
            .ok_or_else(|| self.malformed("expected a number"))
    }

    fn non_negative(&self, value: &JsonValue) -> Result<u64, SchemaError> {
        value
            .as_number()
            .and_then(JsonNumber::as_u64)
            .ok_or_else(|| self.malformed("expected a non-negative integer"))
    }

    fn boolean(&self, value: &JsonValue) -> Result<bool, SchemaError> {
        value
            .as_bool()
            .ok_or_else(|| self.malformed("expected a boolean"))
    }

    fn exclusive(&self, value: &JsonValue) -> Result<Exclusive, SchemaError> {
        match value {
            JsonValue::Bool(b) => Ok(Exclusive::Flag(*b)),
            JsonValue::Number(n) => Ok(Exclusive::Bound(n.clone())),
            _ => Err(self.malformed("expected a number or a boolean")),
        }
    }
}

type ParseFn = fn(&mut Keywords, &JsonValue, &KeywordContext) -> Result<(), SchemaError>;

struct KeywordDef {
    name: &'static str,
    since: Draft,
    until: Draft,
    parse: ParseFn,
}

impl KeywordDef {
    const fn new(name: &'static str, parse: ParseFn) -> Self {
        KeywordDef {
            name,
            since: Draft::Draft4,
            until: Draft::Draft7,
            parse,
        }
    }

    const fn since(mut self, draft: Draft) -> Self {
        self.since = draft;
        self
    }

    const fn until(mut self, draft: Draft) -> Self {
        self.until = draft;
        self
    }

    fn applies_to(&self, draft: Draft) -> bool {
        self.since <= draft && draft <= self.until
    }
}

fn parse_items(k: &mut Keywords, v: &JsonValue, c: &KeywordContext) -> Result<(), SchemaError> {
    k.items = Some(match v {
        JsonValue::Array(_) => Items::Tuple(c.schema_array(v)?),
        _ => Items::Single(c.schema(v)?),
    });
    Ok(())
}

fn parse_types(k: &mut Keywords, v: &JsonValue, c: &KeywordContext) -> Result<(), SchemaError> {
    let names = match v {
        JsonValue::String(name) => vec![name.clone()],
        _ => c.string_array(v)?,
    };
    let types = names
        .iter()
        .map(|name| {
            JsonType::from_str(name).map_err(|_| c.malformed(format!("unknown type '{name}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    k.types = Some(types);
    Ok(())
}

fn parse_multiple_of(
    k: &mut Keywords,
    v: &JsonValue,
    c: &KeywordContext,
) -> Result<(), SchemaError> {
    let divisor = c.number(v)?;
    if divisor.is_negative() || divisor == JsonNumber::Int(0) {
        return Err(c.malformed("expected a number greater than 0"));
    }
    k.multiple_of = Some(divisor);
    Ok(())
}

fn parse_dependencies(
    k: &mut Keywords,
    v: &JsonValue,
    c: &KeywordContext,
) -> Result<(), SchemaError> {
    let members = v
        .as_object()
        .ok_or_else(|| c.malformed("expected an object"))?;
    for (name, member) in members {
        let member_context = KeywordContext {
            draft: c.draft,
            pointer: c.pointer.join(name.as_str()),
        };
        let dependency = match member {
            JsonValue::Array(_) => Dependency::Properties(member_context.string_array(member)?),
            _ => Dependency::Schema(member_context.schema(member)?),
        };
        k.dependencies.insert(name.clone(), dependency);
    }
    Ok(())
}

fn parse_pattern_properties(
    k: &mut Keywords,
    v: &JsonValue,
    c: &KeywordContext,
) -> Result<(), SchemaError> {
    for (source, node) in c.schema_map(v)? {
        let pattern = Pattern::compile(&source, &node.path)?;
        k.pattern_properties.push((pattern, node));
    }
    Ok(())
}

/// Keywords, in the order of the JSON Schema validation vocabulary
#[rustfmt::skip]
const KEYWORDS: &[KeywordDef] = &[
    KeywordDef::new("id", |k, v, c| { k.id = Some(c.string(v)?); Ok(()) }).until(Draft::Draft4),
    KeywordDef::new("$id", |k, v, c| { k.id = Some(c.string(v)?); Ok(()) }).since(Draft::Draft6),
    KeywordDef::new("$ref", |k, v, c| { k.reference = Some(c.string(v)?); Ok(()) }),

    KeywordDef::new("type", parse_types),
    KeywordDef::new("enum", |k, v, c| {
        let values = v.as_array().ok_or_else(|| c.malformed("expected an array"))?;
        k.enum_values = Some(values.to_vec());
        Ok(())
    }),
    KeywordDef::new("const", |k, v, _| { k.const_value = Some(v.clone()); Ok(()) }).since(Draft::Draft6),

    KeywordDef::new("multipleOf", parse_multiple_of),
    KeywordDef::new("maximum", |k, v, c| { k.maximum = Some(c.number(v)?); Ok(()) }),
    KeywordDef::new("exclusiveMaximum", |k, v, c| { k.exclusive_maximum = Some(c.exclusive(v)?); Ok(()) }),
    KeywordDef::new("minimum", |k, v, c| { k.minimum = Some(c.number(v)?); Ok(()) }),
    KeywordDef::new("exclusiveMinimum", |k, v, c| { k.exclusive_minimum = Some(c.exclusive(v)?); Ok(()) }),

    KeywordDef::new("maxLength", |k, v, c| { k.max_length = Some(c.non_negative(v)?); Ok(()) }),
    KeywordDef::new("minLength", |k, v, c| { k.min_length = Some(c.non_negative(v)?); Ok(()) }),
    KeywordDef::new("pattern", |k, v, c| { k.pattern = Some(Pattern::compile(&c.string(v)?, &c.pointer)?); Ok(()) }),
    KeywordDef::new("format", |k, v, c| { k.format = Some(c.string(v)?); Ok(()) }),
    KeywordDef::new("contentEncoding", |k, v, c| { k.content_encoding = Some(c.string(v)?); Ok(()) }).since(Draft::Draft7),
    KeywordDef::new("contentMediaType", |k, v, c| { k.content_media_type = Some(c.string(v)?); Ok(()) }).since(Draft::Draft7),

    KeywordDef::new("items", parse_items),
    KeywordDef::new("additionalItems", |k, v, c| { k.additional_items = Some(c.schema(v)?); Ok(()) }),
    KeywordDef::new("maxItems", |k, v, c| { k.max_items = Some(c.non_negative(v)?); Ok(()) }),
    KeywordDef::new("minItems", |k, v, c| { k.min_items = Some(c.non_negative(v)?); Ok(()) }),
    KeywordDef::new("uniqueItems", |k, v, c| { k.unique_items = c.boolean(v)?; Ok(()) }),
    KeywordDef::new("contains", |k, v, c| { k.contains = Some(c.schema(v)?); Ok(()) }).since(Draft::Draft6),

    KeywordDef::new("maxProperties", |k, v, c| { k.max_properties = Some(c.non_negative(v)?); Ok(()) }),
    KeywordDef::new("minProperties", |k, v, c| { k.min_properties = Some(c.non_negative(v)?); Ok(()) }),
    KeywordDef::new("required", |k, v, c| { k.required = c.string_array(v)?; Ok(()) }),
    KeywordDef::new("properties", |k, v, c| { k.properties = c.schema_map(v)?; Ok(()) }),
    KeywordDef::new("patternProperties", parse_pattern_properties),
    KeywordDef::new("additionalProperties", |k, v, c| { k.additional_properties = Some(c.schema(v)?); Ok(()) }),
    KeywordDef::new("dependencies", parse_dependencies),
    KeywordDef::new("propertyNames", |k, v, c| { k.property_names = Some(c.schema(v)?); Ok(()) }).since(Draft::Draft6),

    KeywordDef::new("allOf", |k, v, c| { k.all_of = c.schema_array(v)?; Ok(()) }),
    KeywordDef::new("anyOf", |k, v, c| { k.any_of = Some(c.schema_array(v)?); Ok(()) }),
    KeywordDef::new("oneOf", |k, v, c| { k.one_of = Some(c.schema_array(v)?); Ok(()) }),
    KeywordDef::new("not", |k, v, c| { k.not = Some(c.schema(v)?); Ok(()) }),
    KeywordDef::new("if", |k, v, c| { k.if_schema = Some(c.schema(v)?); Ok(()) }).since(Draft::Draft7),
    KeywordDef::new("then", |k, v, c| { k.then_schema = Some(c.schema(v)?); Ok(()) }).since(Draft::Draft7),
    KeywordDef::new("else", |k, v, c| { k.else_schema = Some(c.schema(v)?); Ok(()) }).since(Draft::Draft7),

    KeywordDef::new("definitions", |k, v, c| { k.definitions = c.schema_map(v)?; Ok(()) }),
];

/// Members without effect on validation
const ANNOTATIONS: &[&str] = &[
    "$schema",
    "$comment",
    "title",
    "description",
    "default",
    "examples",
    "readOnly",
    "writeOnly",
];

/// Converts a schema value to a [`SchemaNode`]
///
/// `path` is the pointer of `value` within its document.
pub(crate) fn parse_schema(
    value: &JsonValue,
    path: JsonPointer,
    draft: Draft,
) -> Result<SchemaNode, SchemaError> {
    let members = match value {
        JsonValue::Bool(b) => {
            return Ok(SchemaNode {
                path,
                body: SchemaBody::Bool(*b),
            })
        }
        JsonValue::Object(members) => members,
        _ => {
            return Err(SchemaError::MalformedSchema {
                pointer: path.to_string(),
                message: format!("expected a schema, but got {}", value.value_type()),
            })
        }
    };

    let mut keywords = Keywords::default();
    for (name, member) in members {
        let context = KeywordContext {
            draft,
            pointer: path.join(name.as_str()),
        };
        if let Some(def) = KEYWORDS
            .iter()
            .find(|def| def.name == name && def.applies_to(draft))
        {
            (def.parse)(&mut keywords, member, &context)?;
        } else if !ANNOTATIONS.contains(&name.as_str()) && matches!(member, JsonValue::Object(_)) {
            // Unknown members can contain schemas with an `$id` which other schemas refer to
            match context.schema(member) {
                Ok(node) => keywords.extensions.push(node),
                Err(e) => warn!("ignoring member '{}' which is not a valid schema: {e}", context.pointer),
            }
        }
    }

    Ok(SchemaNode {
        path,
        body: SchemaBody::Object(Box::new(keywords)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_pointer;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn value(json: &str) -> Result<JsonValue, Box<dyn std::error::Error>> {
        Ok(json.parse()?)
    }

    fn keywords(node: &SchemaNode) -> &Keywords {
        match &node.body {
            SchemaBody::Object(keywords) => keywords,
            SchemaBody::Bool(_) => panic!("unexpected boolean schema"),
        }
    }

    #[test]
    fn parse_keywords() -> TestResult {
        let node = parse_schema(
            &value(
                r#"{
                    "type": ["integer", "null"],
                    "minimum": 1,
                    "exclusiveMaximum": 10,
                    "items": [{"type": "string"}, true],
                    "dependencies": {"a": ["b"], "c": {"required": ["d"]}},
                    "title": "ignored"
                }"#,
            )?,
            JsonPointer::root(),
            Draft::Draft7,
        )?;
        let keywords = keywords(&node);
        assert_eq!(
            Some(vec![JsonType::Integer, JsonType::Null]),
            keywords.types
        );
        assert_eq!(Some(JsonNumber::Int(1)), keywords.minimum);
        assert!(matches!(
            keywords.exclusive_maximum,
            Some(Exclusive::Bound(JsonNumber::Int(10)))
        ));
        match &keywords.items {
            Some(Items::Tuple(items)) => {
                assert_eq!(2, items.len());
                assert_eq!(json_pointer!["items", 1], items[1].path);
            }
            _ => panic!("unexpected items: {:?}", keywords.items),
        }
        assert!(matches!(
            keywords.dependencies.get("a"),
            Some(Dependency::Properties(names)) if names == &["b".to_owned()]
        ));
        assert!(matches!(
            keywords.dependencies.get("c"),
            Some(Dependency::Schema(_))
        ));
        Ok(())
    }

    #[test]
    fn draft_specific_keywords() -> TestResult {
        let schema = value(r#"{"id": "a.json", "$id": "b.json", "const": 1}"#)?;

        let draft4 = parse_schema(&schema, JsonPointer::root(), Draft::Draft4)?;
        assert_eq!(Some("a.json"), keywords(&draft4).id.as_deref());
        assert_eq!(None, keywords(&draft4).const_value);

        let draft7 = parse_schema(&schema, JsonPointer::root(), Draft::Draft7)?;
        assert_eq!(Some("b.json"), keywords(&draft7).id.as_deref());
        assert_eq!(
            Some(JsonValue::Number(JsonNumber::Int(1))),
            keywords(&draft7).const_value
        );
        Ok(())
    }

    #[test]
    fn extension_members() -> TestResult {
        let node = parse_schema(
            &value(r##"{"x-ext": {"$id": "#inner"}, "x-broken": {"type": 1}, "x-text": "t"}"##)?,
            JsonPointer::root(),
            Draft::Draft7,
        )?;
        let extensions = &keywords(&node).extensions;
        assert_eq!(1, extensions.len());
        assert_eq!(json_pointer!["x-ext"], extensions[0].path);
        Ok(())
    }

    #[test]
    fn malformed() -> TestResult {
        fn assert_malformed(json: &str, expected_pointer: &str) -> TestResult {
            match parse_schema(&value(json)?, JsonPointer::root(), Draft::Draft7) {
                Err(SchemaError::MalformedSchema { pointer, .. }) => {
                    assert_eq!(expected_pointer, pointer);
                    Ok(())
                }
                r => panic!("unexpected result for {json}: {r:?}"),
            }
        }

        assert_malformed("1", "")?;
        assert_malformed(r#"{"type": "text"}"#, "/type")?;
        assert_malformed(r#"{"minLength": -1}"#, "/minLength")?;
        assert_malformed(r#"{"multipleOf": 0}"#, "/multipleOf")?;
        assert_malformed(r#"{"properties": {"a": 1}}"#, "/properties/a")?;
        assert_malformed(r#"{"allOf": [{}, "x"]}"#, "/allOf/1")?;

        match parse_schema(&value(r#"{"pattern": "("}"#)?, JsonPointer::root(), Draft::Draft7) {
            Err(SchemaError::InvalidPattern { pointer, pattern, .. }) => {
                assert_eq!("/pattern", pointer);
                assert_eq!("(", pattern);
            }
            r => panic!("unexpected result: {r:?}"),
        }
        Ok(())
    }
}
