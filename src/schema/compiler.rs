//! Lowering of schema documents to validator specifications
//!
//! Every [`SchemaNode`] becomes one slot of the specification arena, and is registered
//! in the URI registry under:
//! - its resolved `$id`, if any (and the same URI with an empty fragment)
//! - a JSON Pointer fragment relative to each enclosing resolution scope
//!
//! A resolution scope is started by the document root and by every `$id` which changes
//! the document part of the base URI. `$ref` targets are only resolved when first used
//! during validation, so references to schemas of later sources work as well.

use std::collections::HashMap;

use tracing::debug;

use super::{
    document::{Dependency, Exclusive, Items, Keywords, SchemaBody, SchemaNode},
    uri, Draft, SchemaError,
};
use crate::{
    format::{self, FormatCheck},
    location::{JsonPointer, PointerPiece},
    settings::ValidatorSettings,
    validator::spec::{
        ArraySpec, Combinator, ContentSpec, DependencySpec, FormatSpec, ItemsSpec, Keyword,
        NumericSpec, ObjectSpec, RefSpec, SpecId, StringSpec, Validator,
    },
    value::JsonValue,
};

struct Scope {
    /// Document part of the scope URI
    uri: String,
    path: JsonPointer,
}

pub(crate) struct Compiler<'a> {
    settings: &'a ValidatorSettings,
    specs: Vec<Validator>,
    registry: HashMap<String, SpecId>,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(settings: &'a ValidatorSettings) -> Self {
        Compiler {
            settings,
            specs: Vec::new(),
            registry: HashMap::new(),
        }
    }

    /// Compiles one schema document; returns its root and the base URI of the root
    pub(crate) fn compile_document(
        &mut self,
        value: &JsonValue,
        base_uri: &str,
        draft: Draft,
    ) -> Result<(SpecId, String), SchemaError> {
        debug!("compiling schema '{base_uri}' as {draft}");
        let root = super::document::parse_schema(value, JsonPointer::root(), draft)?;

        let resolved_base = uri::resolve(base_uri, "");
        let document_uri = uri::split_fragment(&resolved_base).0.to_owned();
        let mut scopes = vec![Scope {
            uri: document_uri.clone(),
            path: JsonPointer::root(),
        }];
        let registered_before = self.registry.len();
        let id = self.compile_node(&root, &document_uri, &mut scopes)?;
        self.register(document_uri.clone(), id)?;

        let root_base = match &root.body {
            SchemaBody::Object(keywords) if keywords.reference.is_none() => keywords
                .id
                .as_ref()
                .map(|id| uri::resolve(&document_uri, id))
                .unwrap_or(document_uri),
            _ => document_uri,
        };
        debug!(
            "registered {} URIs for schema '{root_base}'",
            self.registry.len() - registered_before
        );
        Ok((id, root_base))
    }

    pub(crate) fn finish(self) -> (Vec<Validator>, HashMap<String, SpecId>) {
        (self.specs, self.registry)
    }

    fn register(&mut self, key: String, id: SpecId) -> Result<(), SchemaError> {
        match self.registry.get(&key) {
            None => {
                self.registry.insert(key, id);
                Ok(())
            }
            Some(existing) if *existing == id => Ok(()),
            // Documents without base URI all share the empty document part
            Some(_) if uri::split_fragment(&key).0.is_empty() => {
                debug!("ignoring repeated registration of '{key}'");
                Ok(())
            }
            Some(_) => Err(SchemaError::DuplicateId { uri: key }),
        }
    }

    /// Whether a `$ref` JSON Pointer may point to the schema at `pointer` (relative to its scope)
    fn is_pointer_target(&self, pointer: &JsonPointer) -> bool {
        if self.settings.allow_ref_anywhere {
            return true;
        }
        match pointer.pieces() {
            [] => true,
            [PointerPiece::ObjectMember(keyword), PointerPiece::ObjectMember(_)] => {
                keyword == "definitions"
            }
            _ => false,
        }
    }

    fn compile_node(
        &mut self,
        node: &SchemaNode,
        base: &str,
        scopes: &mut Vec<Scope>,
    ) -> Result<SpecId, SchemaError> {
        let id = SpecId(self.specs.len());
        self.specs.push(Validator::Always(true));

        let keywords = match &node.body {
            SchemaBody::Bool(value) => {
                self.register_pointers(node, scopes, id)?;
                self.specs[id.0] = Validator::Always(*value);
                return Ok(id);
            }
            SchemaBody::Object(keywords) => keywords,
        };

        if let Some(reference) = &keywords.reference {
            self.register_pointers(node, scopes, id)?;
            let target = uri::registry_key(&uri::resolve(base, reference));
            self.specs[id.0] = Validator::Ref(RefSpec::new(target));
            // Siblings of `$ref` have no effect, but can contain `$id`s others refer to
            self.compile_children(keywords, base, scopes)?;
            return Ok(id);
        }

        let mut node_base = base.to_owned();
        let mut new_scope = None;
        if let Some(own_id) = &keywords.id {
            let resolved = uri::resolve(base, own_id);
            let (document, fragment) = uri::split_fragment(&resolved);
            if fragment.is_none() {
                self.register(format!("{}#", uri::registry_key(&resolved)), id)?;
            }
            self.register(uri::registry_key(&resolved), id)?;
            if document != uri::split_fragment(base).0 {
                new_scope = Some(Scope {
                    uri: document.to_owned(),
                    path: node.path.clone(),
                });
            }
            node_base = resolved;
        }
        // Registered before the scope of the node's own `$id` is entered
        self.register_pointers(node, scopes, id)?;

        let has_scope = new_scope.is_some();
        scopes.extend(new_scope);
        let result = self.compile_keywords(keywords, &node_base, scopes);
        if has_scope {
            scopes.pop();
        }
        self.specs[id.0] = result?;
        Ok(id)
    }

    fn register_pointers(
        &mut self,
        node: &SchemaNode,
        scopes: &[Scope],
        id: SpecId,
    ) -> Result<(), SchemaError> {
        for scope in scopes {
            let Some(relative) = node.path.relative_to(&scope.path) else {
                continue;
            };
            if self.is_pointer_target(&relative) {
                self.register(format!("{}#{relative}", scope.uri), id)?;
            }
        }
        Ok(())
    }

    fn children<'n>(
        &mut self,
        nodes: impl IntoIterator<Item = &'n SchemaNode>,
        base: &str,
        scopes: &mut Vec<Scope>,
    ) -> Result<Vec<SpecId>, SchemaError> {
        nodes
            .into_iter()
            .map(|node| self.compile_node(node, base, scopes))
            .collect()
    }

    /// Compiles all subschemas only to register their URIs
    fn compile_children(
        &mut self,
        keywords: &Keywords,
        base: &str,
        scopes: &mut Vec<Scope>,
    ) -> Result<(), SchemaError> {
        for node in keywords.subschemas() {
            self.compile_node(node, base, scopes)?;
        }
        Ok(())
    }

    fn compile_keywords(
        &mut self,
        k: &Keywords,
        base: &str,
        scopes: &mut Vec<Scope>,
    ) -> Result<Validator, SchemaError> {
        let mut result = Vec::new();

        if let Some(types) = &k.types {
            result.push(Keyword::Type(types.clone()));
        }
        if let Some(numeric) = numeric_spec(k) {
            result.push(Keyword::Numeric(numeric));
        }
        if k.min_length.is_some() || k.max_length.is_some() || k.pattern.is_some() {
            result.push(Keyword::String(StringSpec {
                min_length: k.min_length,
                max_length: k.max_length,
                pattern: k.pattern.clone(),
            }));
        }
        if let Some(name) = &k.format {
            if let Some(format) = self.format_spec(name) {
                result.push(Keyword::Format(format));
            }
        }
        if let Some(content) = self.content_spec(k) {
            result.push(Keyword::Content(content));
        }
        if let Some(value) = &k.const_value {
            result.push(Keyword::Const(value.clone()));
        }
        if let Some(values) = &k.enum_values {
            result.push(Keyword::Enum(values.clone()));
        }

        let items = match &k.items {
            None => ItemsSpec::Any,
            Some(Items::Single(node)) => ItemsSpec::All(self.compile_node(node, base, scopes)?),
            Some(Items::Tuple(nodes)) => ItemsSpec::Tuple {
                items: self.children(nodes, base, scopes)?,
                additional: None,
            },
        };
        let items = match (items, &k.additional_items) {
            (ItemsSpec::Tuple { items, .. }, Some(node)) => ItemsSpec::Tuple {
                items,
                additional: Some(self.compile_node(node, base, scopes)?),
            },
            (items, additional) => {
                // Without tuple `items` there are no additional items
                if let Some(node) = additional {
                    self.compile_node(node, base, scopes)?;
                }
                items
            }
        };
        let contains = k
            .contains
            .as_ref()
            .map(|node| self.compile_node(node, base, scopes))
            .transpose()?;
        if !matches!(items, ItemsSpec::Any)
            || contains.is_some()
            || k.min_items.is_some()
            || k.max_items.is_some()
            || k.unique_items
        {
            result.push(Keyword::Array(ArraySpec {
                items,
                contains,
                min_items: k.min_items,
                max_items: k.max_items,
                unique_items: k.unique_items,
            }));
        }

        let object = self.object_spec(k, base, scopes)?;
        if let Some(object) = object {
            result.push(Keyword::Object(object));
        }

        if !k.all_of.is_empty() {
            let branches = self.children(&k.all_of, base, scopes)?;
            result.push(Keyword::Combinator(Combinator::AllOf, branches));
        }
        if let Some(nodes) = &k.any_of {
            let branches = self.children(nodes, base, scopes)?;
            result.push(Keyword::Combinator(Combinator::AnyOf, branches));
        }
        if let Some(nodes) = &k.one_of {
            let branches = self.children(nodes, base, scopes)?;
            result.push(Keyword::Combinator(Combinator::OneOf, branches));
        }
        if let Some(node) = &k.not {
            result.push(Keyword::Not(self.compile_node(node, base, scopes)?));
        }

        let condition = k
            .if_schema
            .as_ref()
            .map(|node| self.compile_node(node, base, scopes))
            .transpose()?;
        let then = k
            .then_schema
            .as_ref()
            .map(|node| self.compile_node(node, base, scopes))
            .transpose()?;
        let otherwise = k
            .else_schema
            .as_ref()
            .map(|node| self.compile_node(node, base, scopes))
            .transpose()?;
        if let Some(condition) = condition {
            if then.is_some() || otherwise.is_some() {
                result.push(Keyword::Conditional {
                    condition,
                    then,
                    otherwise,
                });
            }
        }

        for node in k.definitions.values().chain(&k.extensions) {
            self.compile_node(node, base, scopes)?;
        }

        Ok(if result.is_empty() {
            Validator::Always(true)
        } else {
            Validator::Keywords(result)
        })
    }

    fn format_spec(&self, name: &str) -> Option<FormatSpec> {
        if !self.settings.validate_formats {
            return None;
        }
        let check = match self.settings.custom_formats.get(name) {
            Some(custom) => FormatCheck::Custom(custom.clone()),
            None => match format::builtin(name) {
                Some(builtin) => FormatCheck::Builtin(builtin),
                None => {
                    debug!("ignoring unknown format '{name}'");
                    return None;
                }
            },
        };
        Some(FormatSpec {
            name: name.to_owned(),
            check,
        })
    }

    fn content_spec(&self, k: &Keywords) -> Option<ContentSpec> {
        if !self.settings.validate_content {
            return None;
        }
        let base64 = match k.content_encoding.as_deref() {
            None => false,
            Some(encoding) if encoding.eq_ignore_ascii_case("base64") => true,
            Some(encoding) => {
                debug!("ignoring unsupported content encoding '{encoding}'");
                return None;
            }
        };
        let json = k
            .content_media_type
            .as_deref()
            .is_some_and(|media_type| media_type.eq_ignore_ascii_case("application/json"));
        (base64 || json).then_some(ContentSpec { base64, json })
    }

    fn object_spec(
        &mut self,
        k: &Keywords,
        base: &str,
        scopes: &mut Vec<Scope>,
    ) -> Result<Option<ObjectSpec>, SchemaError> {
        let mut spec = ObjectSpec {
            required: k.required.clone(),
            min_properties: k.min_properties,
            max_properties: k.max_properties,
            ..Default::default()
        };
        for (name, node) in &k.properties {
            let id = self.compile_node(node, base, scopes)?;
            spec.properties.insert(name.clone(), id);
        }
        for (pattern, node) in &k.pattern_properties {
            let id = self.compile_node(node, base, scopes)?;
            spec.pattern_properties.push((pattern.clone(), id));
        }
        spec.additional_properties = k
            .additional_properties
            .as_ref()
            .map(|node| self.compile_node(node, base, scopes))
            .transpose()?;
        spec.property_names = k
            .property_names
            .as_ref()
            .map(|node| self.compile_node(node, base, scopes))
            .transpose()?;
        for (name, dependency) in &k.dependencies {
            let dependency = match dependency {
                Dependency::Schema(node) => DependencySpec::Schema(self.compile_node(node, base, scopes)?),
                Dependency::Properties(names) => DependencySpec::Properties(names.clone()),
            };
            spec.dependencies.push((name.clone(), dependency));
        }

        let is_empty = spec.properties.is_empty()
            && spec.pattern_properties.is_empty()
            && spec.additional_properties.is_none()
            && spec.property_names.is_none()
            && spec.dependencies.is_empty()
            && spec.required.is_empty()
            && spec.min_properties.is_none()
            && spec.max_properties.is_none();
        Ok((!is_empty).then_some(spec))
    }
}

/// Combines the numeric keywords; draft 4 `exclusiveMaximum: true` turns `maximum`
/// into an exclusive bound
fn numeric_spec(k: &Keywords) -> Option<NumericSpec> {
    let mut spec = NumericSpec {
        multiple_of: k.multiple_of.clone(),
        ..Default::default()
    };
    match &k.exclusive_maximum {
        Some(Exclusive::Flag(true)) => spec.exclusive_maximum = k.maximum.clone(),
        Some(Exclusive::Bound(bound)) => {
            spec.exclusive_maximum = Some(bound.clone());
            spec.maximum = k.maximum.clone();
        }
        Some(Exclusive::Flag(false)) | None => spec.maximum = k.maximum.clone(),
    }
    match &k.exclusive_minimum {
        Some(Exclusive::Flag(true)) => spec.exclusive_minimum = k.minimum.clone(),
        Some(Exclusive::Bound(bound)) => {
            spec.exclusive_minimum = Some(bound.clone());
            spec.minimum = k.minimum.clone();
        }
        Some(Exclusive::Flag(false)) | None => spec.minimum = k.minimum.clone(),
    }

    let is_empty = spec.multiple_of.is_none()
        && spec.minimum.is_none()
        && spec.exclusive_minimum.is_none()
        && spec.maximum.is_none()
        && spec.exclusive_maximum.is_none();
    (!is_empty).then_some(spec)
}
