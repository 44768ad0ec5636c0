//! `$ref`

use std::borrow::Cow;

use super::{instantiate, spec::RefSpec, spec::SpecId, BoxedInstance, Constant, Rule};
use crate::schema::CompiledSchema;

/// Creates the instance of the schema a reference points to
///
/// The target is instantiated for the same value, so it shares the eager path of the
/// reference.
pub(crate) fn instantiate_ref<'s>(
    schema: &'s CompiledSchema,
    reference: &'s RefSpec,
    level: usize,
    eager_path: &mut Vec<SpecId>,
) -> BoxedInstance<'s> {
    match reference.resolve(schema) {
        Some(target) => instantiate(schema, target, level, eager_path),
        None => Box::new(Constant::Invalid {
            rule: Rule::Ref,
            message: Cow::Owned(format!("unresolved reference '{}'", reference.target)),
        }),
    }
}
