//! Object keywords
//!
//! Member values are validated against `properties`, matching `patternProperties` and
//! otherwise `additionalProperties` while they are streamed. Keywords which depend on the
//! complete set of member names are checked when the object ends.

use super::{
    combinator::Branch,
    instantiate, instantiate_nested,
    spec::{DependencySpec, ObjectSpec, SpecId, Validator},
    BoxedInstance, Instance, Rule, Step, ValidationFailure,
};
use crate::{
    location::{Location, Tracker},
    schema::CompiledSchema,
    token::Token,
};

pub(crate) struct ObjectInstance<'s> {
    schema: &'s CompiledSchema,
    spec: &'s ObjectSpec,
    level: usize,
    started: bool,
    count: u64,
    /// Name of the current member
    property: String,
    /// Instances validating the value of the current member
    children: Vec<(BoxedInstance<'s>, Rule)>,
    /// Schema dependencies; they apply to the whole object and are validated in case
    /// the object turns out to have the member they depend on
    dependencies: Vec<(&'s str, Branch<'s>)>,
}

impl<'s> ObjectInstance<'s> {
    pub(crate) fn new(
        schema: &'s CompiledSchema,
        spec: &'s ObjectSpec,
        level: usize,
        eager_path: &mut Vec<SpecId>,
    ) -> Self {
        let dependencies = spec
            .dependencies
            .iter()
            .filter_map(|(name, dependency)| match dependency {
                DependencySpec::Schema(id) => Some((
                    name.as_str(),
                    Branch::Running(instantiate(schema, *id, level, eager_path)),
                )),
                DependencySpec::Properties(_) => None,
            })
            .collect();
        ObjectInstance {
            schema,
            spec,
            level,
            started: false,
            count: 0,
            property: String::new(),
            children: Vec::new(),
            dependencies,
        }
    }

    fn start_member(&mut self, name: &str, location: &Location<'_>) -> Step {
        self.children.clear();
        self.property = name.to_owned();
        let failure = |rule, message: String| {
            Step::Invalid(ValidationFailure::new(rule, location, message).with_property(name))
        };

        self.count += 1;
        if let Some(max_properties) = self.spec.max_properties {
            if self.count > max_properties {
                return failure(
                    Rule::MaxProperties,
                    format!("object has more than {max_properties} properties"),
                );
            }
        }
        if let Some(id) = self.spec.property_names {
            if let Some(cause) = self.check_name(id, name) {
                return Step::Invalid(
                    ValidationFailure::new(
                        Rule::PropertyNames,
                        location,
                        format!("property name '{name}' is invalid"),
                    )
                    .with_property(name)
                    .with_causes(vec![cause]),
                );
            }
        }

        let mut applicable = Vec::new();
        if let Some(id) = self.spec.properties.get(name) {
            applicable.push((*id, Rule::Properties));
        }
        for (pattern, id) in &self.spec.pattern_properties {
            if pattern.is_match(name) {
                applicable.push((*id, Rule::PatternProperties));
            }
        }
        if applicable.is_empty() {
            if let Some(id) = self.spec.additional_properties {
                applicable.push((id, Rule::AdditionalProperties));
            }
        }

        let member_level = self.level + 1;
        for (id, rule) in applicable {
            // Report disallowed members already at their name
            if matches!(self.schema.spec(id), Validator::Always(false)) {
                return failure(rule, format!("property '{name}' is not allowed"));
            }
            self.children
                .push((instantiate_nested(self.schema, id, member_level), rule));
        }
        Step::Pending
    }

    /// Validates a member name against `propertyNames`, as standalone string value
    fn check_name(&self, id: SpecId, name: &str) -> Option<ValidationFailure> {
        let token = Token::text(name);
        let mut tracker = Tracker::new();
        tracker.consume(&token).ok()?;
        let mut instance = instantiate_nested(self.schema, id, 0);
        match instance.validate(&token, &tracker.location()) {
            Step::Invalid(failure) => Some(failure),
            Step::Valid | Step::Pending => None,
        }
    }

    fn end_object(&mut self, location: &Location<'_>) -> Step {
        let Some(names) = location.property_names() else {
            return Step::Valid;
        };
        let failure = |rule, message: String| ValidationFailure::new(rule, location, message);

        if let Some(min_properties) = self.spec.min_properties {
            if (names.len() as u64) < min_properties {
                return Step::Invalid(failure(
                    Rule::MinProperties,
                    format!("object has fewer than {min_properties} properties"),
                ));
            }
        }

        let missing = self
            .spec
            .required
            .iter()
            .filter(|name| !names.contains(name.as_str()))
            .collect::<Vec<_>>();
        if let Some(first) = missing.first() {
            let list = missing
                .iter()
                .map(|name| format!("'{name}'"))
                .collect::<Vec<_>>()
                .join(", ");
            return Step::Invalid(
                failure(Rule::Required, format!("missing required properties {list}"))
                    .with_property(first.as_str()),
            );
        }

        for (name, dependency) in &self.spec.dependencies {
            if !names.contains(name.as_str()) {
                continue;
            }
            match dependency {
                DependencySpec::Properties(required) => {
                    if let Some(missing) = required.iter().find(|r| !names.contains(r.as_str())) {
                        return Step::Invalid(
                            failure(
                                Rule::Dependencies,
                                format!("property '{name}' requires property '{missing}'"),
                            )
                            .with_property(name.as_str()),
                        );
                    }
                }
                DependencySpec::Schema(_) => {
                    let state = self
                        .dependencies
                        .iter_mut()
                        .find(|(dependent_name, _)| *dependent_name == name.as_str())
                        .map(|(_, state)| std::mem::replace(state, Branch::Valid));
                    if let Some(Branch::Invalid(cause)) = state {
                        return Step::Invalid(
                            failure(
                                Rule::Dependencies,
                                format!("object does not satisfy the dependency of property '{name}'"),
                            )
                            .with_property(name.as_str())
                            .with_causes(vec![cause]),
                        );
                    }
                }
            }
        }
        Step::Valid
    }
}

impl Instance for ObjectInstance<'_> {
    fn validate(&mut self, token: &Token, location: &Location<'_>) -> Step {
        let is_first = !self.started;
        if is_first {
            if *token != Token::StartObject {
                return Step::Valid;
            }
            self.started = true;
        }

        for (_, dependent) in &mut self.dependencies {
            dependent.feed(token, location);
        }
        if is_first {
            return Step::Pending;
        }

        if location.level() == self.level {
            return self.end_object(location);
        }
        if location.level() == self.level + 1 {
            if let Token::FieldName(name) = token {
                return self.start_member(name, location);
            }
        }

        let mut i = 0;
        while i < self.children.len() {
            match self.children[i].0.validate(token, location) {
                Step::Pending => i += 1,
                Step::Valid => {
                    self.children.remove(i);
                }
                Step::Invalid(cause) => {
                    let rule = self.children[i].1;
                    return Step::Invalid(
                        ValidationFailure::new(
                            rule,
                            location,
                            format!("property '{}' is invalid", self.property),
                        )
                        .with_property(self.property.as_str())
                        .with_causes(vec![cause]),
                    );
                }
            }
        }
        Step::Pending
    }
}
