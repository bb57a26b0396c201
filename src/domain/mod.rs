/*!
Domain algebra: arithmetic over a variable's feasible integer values.

A [`Domain`] is a sorted union of disjoint closed intervals over 64-bit
integers, represented directly (no arbitrary-precision dependency) and kept
small by [`Domain::relax_if_complex`], which collapses to the convex hull
once the interval count would exceed [`MAX_INTERVALS`] — the same "give up
precision to stay polynomial" escape hatch spec.md §4.1 calls for.

All arithmetic routes through [`sat_arith`], so no operation here can panic
on overflow; an operation that would overflow widens instead of narrowing,
preserving soundness at the cost of precision.
*/

pub mod sat_arith;

use sat_arith::{ceil_div, floor_div, sat_add, sat_mul, sat_sub};

/// Interval count above which [`Domain::relax_if_complex`] collapses to the
/// convex hull, to keep every domain operation polynomial in practice.
pub const MAX_INTERVALS: usize = 100;

/// A closed interval `[lo, hi]`, `lo <= hi`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    pub lo: i64,
    pub hi: i64,
}

impl Interval {
    pub fn new(lo: i64, hi: i64) -> Self {
        debug_assert!(lo <= hi);
        Interval { lo, hi }
    }

    pub fn singleton(v: i64) -> Self {
        Interval { lo: v, hi: v }
    }

    fn touches_or_overlaps(&self, other: &Interval) -> bool {
        // Touching intervals (e.g. [1,3] and [4,6]) coalesce under union,
        // since the domain is over integers.
        self.lo <= sat_add(other.hi, 1) && other.lo <= sat_add(self.hi, 1)
    }
}

/// A sorted union of disjoint, non-touching, closed intervals.
///
/// An empty `intervals` vector denotes the empty domain (infeasibility).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Domain {
    intervals: Vec<Interval>,
}

impl Domain {
    /// The domain containing every representable value.
    pub fn full() -> Self {
        Domain {
            intervals: vec![Interval::new(i64::MIN, i64::MAX)],
        }
    }

    /// The empty domain.
    pub fn empty() -> Self {
        Domain { intervals: vec![] }
    }

    /// A domain of a single closed interval.
    pub fn range(lo: i64, hi: i64) -> Self {
        if lo > hi {
            Domain::empty()
        } else {
            Domain {
                intervals: vec![Interval::new(lo, hi)],
            }
        }
    }

    /// A domain containing a single value.
    pub fn fixed(v: i64) -> Self {
        Domain {
            intervals: vec![Interval::singleton(v)],
        }
    }

    /// A domain built from a caller-supplied (not necessarily sorted or
    /// disjoint) set of intervals; normalizes by sorting and coalescing.
    pub fn from_intervals(mut intervals: Vec<Interval>) -> Self {
        intervals.retain(|iv| iv.lo <= iv.hi);
        intervals.sort();
        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for iv in intervals {
            match merged.last_mut() {
                Some(last) if last.touches_or_overlaps(&iv) => {
                    last.hi = last.hi.max(iv.hi);
                }
                _ => merged.push(iv),
            }
        }
        Domain { intervals: merged }
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn is_fixed(&self) -> Option<i64> {
        match self.intervals.as_slice() {
            [Interval { lo, hi }] if lo == hi => Some(*lo),
            _ => None,
        }
    }

    pub fn min(&self) -> Option<i64> {
        self.intervals.first().map(|iv| iv.lo)
    }

    pub fn max(&self) -> Option<i64> {
        self.intervals.last().map(|iv| iv.hi)
    }

    /// The convex hull `[min, max]` as a single interval.
    pub fn hull(&self) -> Domain {
        match (self.min(), self.max()) {
            (Some(lo), Some(hi)) => Domain::range(lo, hi),
            _ => Domain::empty(),
        }
    }

    pub fn contains(&self, v: i64) -> bool {
        self.intervals
            .binary_search_by(|iv| {
                if v < iv.lo {
                    std::cmp::Ordering::Greater
                } else if v > iv.hi {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Drops precision (collapses to the hull) once the interval count
    /// exceeds [`MAX_INTERVALS`].
    pub fn relax_if_complex(self) -> Domain {
        if self.intervals.len() > MAX_INTERVALS {
            self.hull()
        } else {
            self
        }
    }

    /// Number of values the domain contains, saturating rather than
    /// overflowing for very wide domains.
    pub fn size(&self) -> i64 {
        self.intervals
            .iter()
            .fold(0i64, |acc, iv| sat_add(acc, sat_sub(iv.hi, iv.lo).saturating_add(1)))
    }

    pub fn intersect(&self, other: &Domain) -> Domain {
        let mut result = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.intervals.len() && j < other.intervals.len() {
            let a = self.intervals[i];
            let b = other.intervals[j];
            let lo = a.lo.max(b.lo);
            let hi = a.hi.min(b.hi);
            if lo <= hi {
                result.push(Interval::new(lo, hi));
            }
            if a.hi < b.hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        Domain { intervals: result }.relax_if_complex()
    }

    pub fn union(&self, other: &Domain) -> Domain {
        let mut all = self.intervals.clone();
        all.extend_from_slice(&other.intervals);
        Domain::from_intervals(all).relax_if_complex()
    }

    /// The complement relative to the full representable range.
    pub fn complement(&self) -> Domain {
        if self.intervals.is_empty() {
            return Domain::full();
        }
        let mut result = Vec::with_capacity(self.intervals.len() + 1);
        let mut cursor = i64::MIN;
        for iv in &self.intervals {
            if cursor < iv.lo {
                result.push(Interval::new(cursor, sat_sub(iv.lo, 1)));
            }
            cursor = sat_add(iv.hi, 1);
            if iv.hi == i64::MAX {
                cursor = i64::MAX;
                // the rest is covered; nothing can follow MAX.
            }
        }
        if cursor != i64::MAX || self.intervals.last().map(|iv| iv.hi) != Some(i64::MAX) {
            if cursor <= i64::MAX && self.intervals.last().map(|iv| iv.hi) != Some(i64::MAX) {
                result.push(Interval::new(cursor, i64::MAX));
            }
        }
        Domain { intervals: result }.relax_if_complex()
    }

    /// Negation: `{-x : x in self}`.
    pub fn negate(&self) -> Domain {
        let mut intervals: Vec<Interval> = self
            .intervals
            .iter()
            .map(|iv| Interval::new(sat_mul(iv.hi, -1), sat_mul(iv.lo, -1)))
            .collect();
        intervals.sort();
        Domain { intervals }
    }

    /// Saturating addition of two domains: `{a + b : a in self, b in other}`,
    /// taken as the hull of the sum of hulls (exact for single intervals,
    /// a sound over-approximation otherwise — computing the full Minkowski
    /// sum of interval unions is not worth the blowup for presolve bounds).
    pub fn add(&self, other: &Domain) -> Domain {
        match (self.min(), self.max(), other.min(), other.max()) {
            (Some(a_lo), Some(a_hi), Some(b_lo), Some(b_hi)) => {
                Domain::range(sat_add(a_lo, b_lo), sat_add(a_hi, b_hi))
            }
            _ => Domain::empty(),
        }
    }

    /// Multiplication by a constant `k`. Exact (maps every interval
    /// through the affine map, flipping order when `k < 0`).
    pub fn mul_by(&self, k: i64) -> Domain {
        if k == 0 {
            return if self.is_empty() {
                Domain::empty()
            } else {
                Domain::fixed(0)
            };
        }
        let mut intervals: Vec<Interval> = self
            .intervals
            .iter()
            .map(|iv| {
                let a = sat_mul(iv.lo, k);
                let b = sat_mul(iv.hi, k);
                Interval::new(a.min(b), a.max(b))
            })
            .collect();
        intervals.sort();
        Domain::from_intervals(intervals)
    }

    /// Division by constant `k != 0`: `{x / k : x in self}` truncated
    /// towards zero as a constraint value would be, but the *bound*
    /// propagation below uses floor/ceil of the endpoints so the result is
    /// a sound (possibly loose) superset of the true image.
    pub fn div_by(&self, k: i64) -> Domain {
        debug_assert!(k != 0);
        let mut intervals = Vec::with_capacity(self.intervals.len());
        for iv in &self.intervals {
            let (a, b) = if k > 0 {
                (floor_div(iv.lo, k), floor_div(iv.hi, k))
            } else {
                (floor_div(iv.hi, k), floor_div(iv.lo, k))
            };
            intervals.push(Interval::new(a.min(b), a.max(b)));
        }
        Domain::from_intervals(intervals)
    }

    /// The inverse image of multiplication by `k`: `{x : k*x in self}`.
    pub fn inverse_mul(&self, k: i64) -> Domain {
        if k == 0 {
            // Every x satisfies 0*x == 0 iff 0 in self.
            return if self.contains(0) {
                Domain::full()
            } else {
                Domain::empty()
            };
        }
        let mut intervals = Vec::with_capacity(self.intervals.len());
        for iv in &self.intervals {
            // x must satisfy k*x in [lo,hi], i.e. x in [lo/k, hi/k] with the
            // rounding direction depending on the sign of k; since this is
            // an *inverse* (we need membership, not a bound), round inward.
            let (lo_bound, hi_bound) = if k > 0 {
                (ceil_div(iv.lo, k), floor_div(iv.hi, k))
            } else {
                (ceil_div(iv.hi, k), floor_div(iv.lo, k))
            };
            if lo_bound <= hi_bound {
                intervals.push(Interval::new(lo_bound, hi_bound));
            }
        }
        Domain::from_intervals(intervals)
    }

    /// An over-approximation of `{a mod b : a in self, b in modulus}`,
    /// following C-style truncating modulo (result has the sign of the
    /// dividend, magnitude strictly less than `|b|`).
    pub fn mod_superset(&self, modulus: &Domain) -> Domain {
        if self.is_empty() || modulus.is_empty() {
            return Domain::empty();
        }
        let max_abs_modulus = modulus
            .intervals
            .iter()
            .map(|iv| iv.lo.unsigned_abs().max(iv.hi.unsigned_abs()))
            .max()
            .unwrap_or(0);
        if max_abs_modulus == 0 {
            return Domain::empty();
        }
        let bound = (max_abs_modulus.saturating_sub(1)) as i64;
        // The result's sign superset matches the sign superset of self: if
        // self can be negative the remainder can be negative, if self can
        // be non-negative the remainder can be non-negative (C truncation).
        let can_be_neg = self.min().map(|m| m < 0).unwrap_or(false);
        let can_be_nonneg = self.max().map(|m| m >= 0).unwrap_or(false);
        let lo = if can_be_neg { sat_mul(bound, -1) } else { 0 };
        let hi = if can_be_nonneg { bound } else { 0 };
        if lo > hi {
            Domain::empty()
        } else {
            Domain::range(lo, hi)
        }
    }

    /// An over-approximation of the product of two domains.
    pub fn continuous_mul(&self, other: &Domain) -> Domain {
        match (self.min(), self.max(), other.min(), other.max()) {
            (Some(a_lo), Some(a_hi), Some(b_lo), Some(b_hi)) => {
                let candidates = [
                    sat_mul(a_lo, b_lo),
                    sat_mul(a_lo, b_hi),
                    sat_mul(a_hi, b_lo),
                    sat_mul(a_hi, b_hi),
                ];
                let lo = *candidates.iter().min().unwrap();
                let hi = *candidates.iter().max().unwrap();
                Domain::range(lo, hi)
            }
            _ => Domain::empty(),
        }
    }

    /// Tighten `self` (a constraint's right-hand-side domain) using the
    /// knowledge that the expression it bounds can only take values in
    /// `implied` — drops any part of `self` that `implied` cannot reach,
    /// without changing feasibility (any value outside `implied` was
    /// already unreachable, so removing it from `self` cannot rule out a
    /// solution).
    pub fn simplify_using_implied(&self, implied: &Domain) -> Domain {
        self.intersect(&implied.hull().union(implied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_disjoint_is_empty() {
        let a = Domain::range(0, 5);
        let b = Domain::range(10, 20);
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn union_coalesces_touching() {
        let a = Domain::range(0, 5);
        let b = Domain::range(6, 10);
        let u = a.union(&b);
        assert_eq!(u.intervals(), &[Interval::new(0, 10)]);
    }

    #[test]
    fn complement_of_full_is_empty() {
        assert!(Domain::full().complement().is_empty());
    }

    #[test]
    fn complement_round_trips() {
        let d = Domain::from_intervals(vec![Interval::new(0, 5), Interval::new(10, 20)]);
        let c = d.complement();
        assert!(c.intersect(&d).is_empty());
        assert_eq!(c.union(&d), Domain::full());
    }

    #[test]
    fn mul_by_negative_flips_order() {
        let d = Domain::range(2, 5);
        assert_eq!(d.mul_by(-1), Domain::range(-5, -2));
    }

    #[test]
    fn div_by_rounds_towards_negative_infinity_for_bound_soundness() {
        let d = Domain::range(-7, 7);
        let div = d.div_by(2);
        assert!(div.contains(-7 / 2 - 1) || div.min().unwrap() <= -4);
        assert!(div.contains(3));
    }

    #[test]
    fn inverse_mul_recovers_exact_preimage() {
        let target = Domain::fixed(6);
        let preimage = target.inverse_mul(2);
        assert_eq!(preimage, Domain::fixed(3));
    }

    #[test]
    fn relax_if_complex_collapses_to_hull() {
        let mut intervals = Vec::new();
        for i in 0..(MAX_INTERVALS as i64 + 10) {
            intervals.push(Interval::singleton(i * 3));
        }
        let d = Domain::from_intervals(intervals).relax_if_complex();
        assert_eq!(d.intervals().len(), 1);
    }

    #[test]
    fn simplify_using_implied_drops_unreachable_tail() {
        let rhs = Domain::range(0, 100);
        let implied = Domain::range(0, 10);
        let simplified = rhs.simplify_using_implied(&implied);
        assert_eq!(simplified, Domain::range(0, 10));
    }
}
