//! `allOf`, `anyOf`, `oneOf`, `not` and `if`/`then`/`else`
//!
//! All subschemas of a combinator validate the same value, so they are instantiated
//! together with the combinator and fed the same tokens concurrently.

use super::{
    instantiate,
    spec::{Combinator, SpecId},
    BoxedInstance, Instance, Rule, Step, ValidationFailure,
};
use crate::{location::Location, schema::CompiledSchema, token::Token};

/// Progress of a subschema instance
pub(super) enum Branch<'s> {
    Running(BoxedInstance<'s>),
    Valid,
    Invalid(ValidationFailure),
}

impl Branch<'_> {
    pub(super) fn feed(&mut self, token: &Token, location: &Location<'_>) {
        if let Branch::Running(instance) = self {
            match instance.validate(token, location) {
                Step::Pending => {}
                Step::Valid => *self = Branch::Valid,
                Step::Invalid(failure) => *self = Branch::Invalid(failure),
            }
        }
    }
}

pub(crate) struct CombinatorInstance<'s> {
    kind: Combinator,
    /// Branches together with the position of their subschema
    branches: Vec<(usize, Branch<'s>)>,
    /// Number of valid branches which have been removed from `branches`
    removed_valid: usize,
    /// Failures of branches which have been removed from `branches`
    removed_failures: Vec<(usize, ValidationFailure)>,
    /// Whether resolved branches are removed right away instead of at the end
    optimized: bool,
}

impl<'s> CombinatorInstance<'s> {
    pub(crate) fn new(
        schema: &'s CompiledSchema,
        kind: Combinator,
        branches: &'s [SpecId],
        level: usize,
        eager_path: &mut Vec<SpecId>,
    ) -> Self {
        CombinatorInstance {
            kind,
            branches: branches
                .iter()
                .enumerate()
                .map(|(index, id)| {
                    (index, Branch::Running(instantiate(schema, *id, level, eager_path)))
                })
                .collect(),
            removed_valid: 0,
            removed_failures: Vec::new(),
            optimized: schema.settings().optimized_combinators,
        }
    }

    fn remove_resolved(&mut self) {
        let mut i = 0;
        while i < self.branches.len() {
            if matches!(self.branches[i].1, Branch::Running(_)) {
                i += 1;
                continue;
            }
            match self.branches.remove(i) {
                (_, Branch::Valid) => self.removed_valid += 1,
                (index, Branch::Invalid(failure)) => self.removed_failures.push((index, failure)),
                (_, Branch::Running(_)) => {}
            }
        }
    }

    /// Takes the failures of all branches, in the order of the subschemas
    fn failures(&mut self) -> Vec<ValidationFailure> {
        let mut failures = std::mem::take(&mut self.removed_failures);
        failures.extend(self.branches.drain(..).filter_map(|(index, branch)| match branch {
            Branch::Invalid(failure) => Some((index, failure)),
            _ => None,
        }));
        failures.sort_by_key(|(index, _)| *index);
        failures.into_iter().map(|(_, failure)| failure).collect()
    }
}

impl Instance for CombinatorInstance<'_> {
    fn validate(&mut self, token: &Token, location: &Location<'_>) -> Step {
        for (_, branch) in &mut self.branches {
            branch.feed(token, location);
        }
        if self.optimized {
            self.remove_resolved();
        }

        let mut valid_count = self.removed_valid;
        let mut running = false;
        for (_, branch) in &self.branches {
            match branch {
                Branch::Running(_) => running = true,
                Branch::Valid => valid_count += 1,
                Branch::Invalid(_) => {}
            }
        }

        let failure = |rule, message: &str, causes| {
            Step::Invalid(ValidationFailure::new(rule, location, message).with_causes(causes))
        };
        match self.kind {
            Combinator::AllOf => {
                if !running {
                    let causes = self.failures();
                    if causes.is_empty() {
                        return Step::Valid;
                    }
                    return failure(Rule::AllOf, "value does not match all schemas", causes);
                }
            }
            Combinator::AnyOf => {
                if valid_count > 0 {
                    return Step::Valid;
                }
                if !running {
                    let causes = self.failures();
                    return failure(Rule::AnyOf, "value does not match any schema", causes);
                }
            }
            Combinator::OneOf => {
                if valid_count > 1 {
                    return failure(Rule::OneOf, "value matches more than one schema", Vec::new());
                }
                if !running {
                    if valid_count == 1 {
                        return Step::Valid;
                    }
                    let causes = self.failures();
                    return failure(Rule::OneOf, "value does not match any schema", causes);
                }
            }
        }
        Step::Pending
    }
}

pub(crate) struct NotInstance<'s> {
    inner: BoxedInstance<'s>,
}

impl<'s> NotInstance<'s> {
    pub(crate) fn new(inner: BoxedInstance<'s>) -> Self {
        NotInstance { inner }
    }
}

impl Instance for NotInstance<'_> {
    fn validate(&mut self, token: &Token, location: &Location<'_>) -> Step {
        match self.inner.validate(token, location) {
            Step::Pending => Step::Pending,
            Step::Valid => Step::Invalid(ValidationFailure::new(
                Rule::Not,
                location,
                "value must not match the schema",
            )),
            Step::Invalid(_) => Step::Valid,
        }
    }
}

/// `if` with `then` and/or `else`; the branches run concurrently with the condition
pub(crate) struct ConditionalInstance<'s> {
    condition: Branch<'s>,
    then: Branch<'s>,
    otherwise: Branch<'s>,
}

impl<'s> ConditionalInstance<'s> {
    pub(crate) fn new(
        schema: &'s CompiledSchema,
        condition: SpecId,
        then: Option<SpecId>,
        otherwise: Option<SpecId>,
        level: usize,
        eager_path: &mut Vec<SpecId>,
    ) -> Self {
        let mut branch = |id: Option<SpecId>| match id {
            Some(id) => Branch::Running(instantiate(schema, id, level, eager_path)),
            None => Branch::Valid,
        };
        ConditionalInstance {
            condition: branch(Some(condition)),
            then: branch(then),
            otherwise: branch(otherwise),
        }
    }
}

impl Instance for ConditionalInstance<'_> {
    fn validate(&mut self, token: &Token, location: &Location<'_>) -> Step {
        self.condition.feed(token, location);
        let (branch, rule, message) = match &self.condition {
            Branch::Running(_) => {
                self.then.feed(token, location);
                self.otherwise.feed(token, location);
                if matches!((&self.then, &self.otherwise), (Branch::Valid, Branch::Valid)) {
                    return Step::Valid;
                }
                return Step::Pending;
            }
            Branch::Valid => (&mut self.then, Rule::Then, "value matches 'if' but not 'then'"),
            Branch::Invalid(_) => (
                &mut self.otherwise,
                Rule::Else,
                "value does not match 'if' and not 'else'",
            ),
        };
        branch.feed(token, location);
        match std::mem::replace(branch, Branch::Valid) {
            Branch::Running(instance) => {
                *branch = Branch::Running(instance);
                Step::Pending
            }
            Branch::Valid => Step::Valid,
            Branch::Invalid(cause) => Step::Invalid(
                ValidationFailure::new(rule, location, message).with_causes(vec![cause]),
            ),
        }
    }
}
