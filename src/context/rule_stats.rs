/*!
The rule-application counter: an ordered `rule name -> count` map behind a
narrow, append-only-feeling interface, kept separate from the rest of the
context so accounting can't be accidentally skipped or corrupted by a rule
that forgets to report (spec.md §9: "isolate the mapping stream and the
rule-count map behind narrow append-only interfaces").
*/

use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
pub struct RuleStats {
    counts: BTreeMap<&'static str, i64>,
    total: u64,
}

impl RuleStats {
    pub fn increment(&mut self, rule: &'static str) {
        *self.counts.entry(rule).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn add(&mut self, rule: &'static str, n: i64) {
        *self.counts.entry(rule).or_insert(0) += n;
        self.total += n.unsigned_abs();
    }

    /// Total number of rule applications recorded, used against
    /// `debug_max_num_presolve_operations`.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn report(&self) -> &BTreeMap<&'static str, i64> {
        &self.counts
    }

    pub fn count_of(&self, rule: &str) -> i64 {
        self.counts.get(rule).copied().unwrap_or(0)
    }
}
