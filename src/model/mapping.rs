/*!
The mapping model: an append-only ordered list of constraints read in
reverse at postsolve time to reconstruct values for every removed variable.

Writers never gain direct `Vec` access — only [`MappingModel::push`] — so
every rule that removes a variable is forced through the one place that can
log and count entries, matching spec.md §9's guidance to keep the mapping
stream behind a narrow, append-only interface.
*/

use crate::model::constraint::Constraint;

/// One entry of the mapping stream, tagged with the rule that produced it
/// for diagnostics.
#[derive(Clone, Debug)]
pub struct MappingEntry {
    pub constraint: Constraint,
    pub reason: &'static str,
}

#[derive(Clone, Debug, Default)]
pub struct MappingModel {
    entries: Vec<MappingEntry>,
}

impl MappingModel {
    pub fn push(&mut self, constraint: Constraint, reason: &'static str) {
        log::trace!(target: crate::misc::log::targets::POSTSOLVE, "mapping += {reason}: {:?}", constraint.kind.as_ref().map(|k| k.name()));
        self.entries.push(MappingEntry { constraint, reason });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in postsolve order: last-pushed first.
    pub fn iter_reverse(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.iter().rev()
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }
}
