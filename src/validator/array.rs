//! Array keywords: `items`, `additionalItems`, `contains`, `minItems`, `maxItems` and `uniqueItems`

use super::{
    instantiate_nested,
    spec::{ArraySpec, ItemsSpec, SpecId},
    unique::{self, DuplicateDetector},
    BoxedInstance, Instance, Rule, Step, ValidationFailure,
};
use crate::{location::Location, schema::CompiledSchema, token::Token};

pub(crate) struct ArrayInstance<'s> {
    schema: &'s CompiledSchema,
    spec: &'s ArraySpec,
    level: usize,
    started: bool,
    count: u64,
    /// Instance validating the current item, and the rule to report on failure
    item: Option<(BoxedInstance<'s>, Rule)>,
    /// Instance checking the current item against `contains`
    contains: Option<BoxedInstance<'s>>,
    contains_satisfied: bool,
    unique: Option<Box<dyn DuplicateDetector>>,
}

impl<'s> ArrayInstance<'s> {
    pub(crate) fn new(schema: &'s CompiledSchema, spec: &'s ArraySpec, level: usize) -> Self {
        ArrayInstance {
            schema,
            spec,
            level,
            started: false,
            count: 0,
            item: None,
            contains: None,
            contains_satisfied: false,
            unique: None,
        }
    }

    fn item_spec(&self, index: u64) -> Option<(SpecId, Rule)> {
        match &self.spec.items {
            ItemsSpec::Any => None,
            ItemsSpec::All(id) => Some((*id, Rule::Items)),
            ItemsSpec::Tuple { items, additional } => match usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
            {
                Some(id) => Some((*id, Rule::Items)),
                None => additional.map(|id| (id, Rule::AdditionalItems)),
            },
        }
    }

    fn start_item(&mut self, location: &Location<'_>) -> Option<ValidationFailure> {
        let index = self.count;
        self.count += 1;
        if let Some(max_items) = self.spec.max_items {
            if self.count > max_items {
                return Some(ValidationFailure::new(
                    Rule::MaxItems,
                    location,
                    format!("array has more than {max_items} items"),
                ));
            }
        }

        let item_level = self.level + 1;
        self.item = self
            .item_spec(index)
            .map(|(id, rule)| (instantiate_nested(self.schema, id, item_level), rule));
        if !self.contains_satisfied {
            self.contains = self
                .spec
                .contains
                .map(|id| instantiate_nested(self.schema, id, item_level));
        }
        None
    }

    fn end_array(&self, location: &Location<'_>) -> Step {
        if let Some(min_items) = self.spec.min_items {
            if self.count < min_items {
                return Step::Invalid(ValidationFailure::new(
                    Rule::MinItems,
                    location,
                    format!("array has fewer than {min_items} items"),
                ));
            }
        }
        if self.spec.contains.is_some() && !self.contains_satisfied {
            return Step::Invalid(ValidationFailure::new(
                Rule::Contains,
                location,
                "no item matches the 'contains' schema",
            ));
        }
        Step::Valid
    }
}

impl Instance for ArrayInstance<'_> {
    fn validate(&mut self, token: &Token, location: &Location<'_>) -> Step {
        if !self.started {
            if *token != Token::StartArray {
                return Step::Valid;
            }
            self.started = true;
            if self.spec.unique_items {
                self.unique = Some(unique::detector(self.schema.settings().unique_items));
            }
            return Step::Pending;
        }

        if location.level() == self.level {
            return self.end_array(location);
        }
        if location.level() == self.level + 1 && token.opens_value() {
            if let Some(failure) = self.start_item(location) {
                return Step::Invalid(failure);
            }
        }

        if let Some((instance, rule)) = &mut self.item {
            match instance.validate(token, location) {
                Step::Pending => {}
                Step::Valid => self.item = None,
                Step::Invalid(failure) => {
                    return Step::Invalid(
                        ValidationFailure::new(
                            *rule,
                            location,
                            format!("item {} is invalid", self.count - 1),
                        )
                        .with_causes(vec![failure]),
                    );
                }
            }
        }

        if let Some(instance) = &mut self.contains {
            match instance.validate(token, location) {
                Step::Pending => {}
                Step::Valid => {
                    self.contains = None;
                    self.contains_satisfied = true;
                }
                Step::Invalid(_) => self.contains = None,
            }
        }

        if let Some(detector) = &mut self.unique {
            if detector.consume(token) {
                return Step::Invalid(ValidationFailure::new(
                    Rule::UniqueItems,
                    location,
                    format!("item {} equals an earlier item", self.count - 1),
                ));
            }
        }
        Step::Pending
    }
}
