/*!
Cooperative cancellation: the driver and every analyzer poll a `TimeLimit`
hook between rewrites/iterations rather than being preempted, matching
spec.md §5's "single-threaded cooperative" scheduling model.
*/

use std::time::{Duration, Instant};

pub trait TimeLimit {
    fn reached(&self) -> bool;
}

/// No time limit: `reached()` never returns true.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unbounded;

impl TimeLimit for Unbounded {
    fn reached(&self) -> bool {
        false
    }
}

/// A wall-clock deadline, grounded on the teacher's
/// `Config::time_limit: ConfigOption<std::time::Duration>`.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(duration: Duration) -> Self {
        Deadline {
            at: Instant::now() + duration,
        }
    }
}

impl TimeLimit for Deadline {
    fn reached(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// A work-unit budget: an opaque counter consumed by analyzers and checked
/// against a limit, per spec.md §6's "opaque knob" guidance for inclusion
/// and probing work limits.
#[derive(Clone, Copy, Debug)]
pub struct WorkBudget {
    limit: u64,
    spent: u64,
}

impl WorkBudget {
    pub fn new(limit: u64) -> Self {
        WorkBudget { limit, spent: 0 }
    }

    pub fn spend(&mut self, units: u64) {
        self.spent = self.spent.saturating_add(units);
    }

    pub fn exhausted(&self) -> bool {
        self.spent >= self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.spent)
    }
}
