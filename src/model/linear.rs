/*!
Linear expressions: `offset + sum(coeffs[i] * vars[i])`.

A [`LinearExpr`] is *canonical* when it has positive refs only, no zero
coefficients, variables sorted, and (when used as a constraint body) the gcd
of the coefficients is 1 with a positive leading coefficient — see
[`LinearExpr::canonicalize`].
*/

use crate::domain::{sat_arith::sat_add, sat_arith::sat_mul, Domain};
use crate::model::VarIndex;

/// `offset + sum(coeffs[i] * vars[i])`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinearExpr {
    pub vars: Vec<VarIndex>,
    pub coeffs: Vec<i64>,
    pub offset: i64,
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a as i64
}

impl LinearExpr {
    pub fn constant(offset: i64) -> Self {
        LinearExpr {
            vars: Vec::new(),
            coeffs: Vec::new(),
            offset,
        }
    }

    pub fn single(var: VarIndex, coeff: i64, offset: i64) -> Self {
        if coeff == 0 {
            LinearExpr::constant(offset)
        } else {
            LinearExpr {
                vars: vec![var],
                coeffs: vec![coeff],
                offset,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Folds duplicate variable occurrences, drops zero coefficients, and
    /// sorts by variable index. Does *not* gcd-reduce or fix the sign of the
    /// leading coefficient — that normalization is only meaningful for a
    /// constraint body with a fixed relational operator, so it lives on
    /// `LinearConstraint` instead.
    pub fn canonicalize(mut self) -> Self {
        let mut pairs: Vec<(VarIndex, i64)> = self
            .vars
            .drain(..)
            .zip(self.coeffs.drain(..))
            .collect();
        pairs.sort_by_key(|(v, _)| *v);
        let mut folded: Vec<(VarIndex, i64)> = Vec::with_capacity(pairs.len());
        for (v, c) in pairs {
            if let Some(last) = folded.last_mut() {
                if last.0 == v {
                    last.1 = sat_add(last.1, c);
                    continue;
                }
            }
            folded.push((v, c));
        }
        folded.retain(|(_, c)| *c != 0);
        self.vars = folded.iter().map(|(v, _)| *v).collect();
        self.coeffs = folded.iter().map(|(_, c)| *c).collect();
        self
    }

    /// The gcd of all (non-zero) coefficients, or 0 if there are none.
    pub fn coeff_gcd(&self) -> i64 {
        self.coeffs.iter().fold(0, |acc, &c| gcd(acc, c))
    }

    /// Divides every coefficient and the offset by `d`. Callers must ensure
    /// `d` divides the offset too when used on a constraint body, or adjust
    /// the right-hand side accordingly; dividing a free-standing expression
    /// (e.g. the objective) simply scales it.
    pub fn divide_by(&self, d: i64) -> LinearExpr {
        debug_assert!(d != 0);
        LinearExpr {
            vars: self.vars.clone(),
            coeffs: self.coeffs.iter().map(|c| c / d).collect(),
            offset: self.offset / d,
        }
    }

    pub fn negate(&self) -> LinearExpr {
        LinearExpr {
            vars: self.vars.clone(),
            coeffs: self.coeffs.iter().map(|c| -c).collect(),
            offset: -self.offset,
        }
    }

    /// `[min_activity, max_activity]` given each variable's current domain,
    /// using saturating arithmetic throughout.
    pub fn activity_bounds(&self, domain_of: impl Fn(VarIndex) -> Domain) -> Domain {
        let mut lo = self.offset;
        let mut hi = self.offset;
        for (v, &c) in self.vars.iter().zip(self.coeffs.iter()) {
            let d = domain_of(*v);
            let (Some(d_lo), Some(d_hi)) = (d.min(), d.max()) else {
                return Domain::empty();
            };
            let (term_lo, term_hi) = if c >= 0 {
                (sat_mul(c, d_lo), sat_mul(c, d_hi))
            } else {
                (sat_mul(c, d_hi), sat_mul(c, d_lo))
            };
            lo = sat_add(lo, term_lo);
            hi = sat_add(hi, term_hi);
        }
        Domain::range(lo, hi)
    }

    /// The activity with the term for `skip` removed — used by
    /// per-variable bound tightening (spec.md §4.3.1 step 5) and by
    /// singleton elimination.
    pub fn activity_without(&self, skip: VarIndex, domain_of: impl Fn(VarIndex) -> Domain) -> Domain {
        let mut lo = self.offset;
        let mut hi = self.offset;
        for (v, &c) in self.vars.iter().zip(self.coeffs.iter()) {
            if *v == skip {
                continue;
            }
            let d = domain_of(*v);
            let (Some(d_lo), Some(d_hi)) = (d.min(), d.max()) else {
                return Domain::empty();
            };
            let (term_lo, term_hi) = if c >= 0 {
                (sat_mul(c, d_lo), sat_mul(c, d_hi))
            } else {
                (sat_mul(c, d_hi), sat_mul(c, d_lo))
            };
            lo = sat_add(lo, term_lo);
            hi = sat_add(hi, term_hi);
        }
        Domain::range(lo, hi)
    }

    pub fn coeff_of(&self, var: VarIndex) -> Option<i64> {
        self.vars
            .iter()
            .position(|v| *v == var)
            .map(|i| self.coeffs[i])
    }

    /// Replaces every occurrence of `var` with `a*rep + b`, folding the
    /// result back into canonical form. Used when the affine-substitution
    /// analyzer eliminates `var` in favor of its representative.
    pub fn substitute(&self, var: VarIndex, a: i64, b: i64, rep: VarIndex) -> LinearExpr {
        self.substitute_linear(var, &LinearExpr::single(rep, a, b))
    }

    /// Replaces every occurrence of `var` with an arbitrary linear
    /// expression `definition`. Used by singleton elimination, where the
    /// eliminated variable's value is an affine function of several other
    /// variables rather than just one representative.
    pub fn substitute_linear(&self, var: VarIndex, definition: &LinearExpr) -> LinearExpr {
        let Some(coeff) = self.coeff_of(var) else {
            return self.clone();
        };
        let mut vars = self.vars.clone();
        let mut coeffs = self.coeffs.clone();
        let pos = vars.iter().position(|v| *v == var).unwrap();
        vars.remove(pos);
        coeffs.remove(pos);
        vars.extend(definition.vars.iter().copied());
        coeffs.extend(definition.coeffs.iter().map(|c| sat_mul(coeff, *c)));
        let offset = sat_add(self.offset, sat_mul(coeff, definition.offset));
        LinearExpr { vars, coeffs, offset }.canonicalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_folds_duplicates_and_drops_zero() {
        let e = LinearExpr {
            vars: vec![VarIndex(1), VarIndex(0), VarIndex(1)],
            coeffs: vec![3, 5, -3],
            offset: 2,
        }
        .canonicalize();
        assert_eq!(e.vars, vec![VarIndex(0)]);
        assert_eq!(e.coeffs, vec![5]);
        assert_eq!(e.offset, 2);
    }

    #[test]
    fn activity_bounds_handles_negative_coeffs() {
        let e = LinearExpr::single(VarIndex(0), -2, 10);
        let bounds = e.activity_bounds(|_| Domain::range(0, 5));
        assert_eq!(bounds, Domain::range(0, 10));
    }

    #[test]
    fn gcd_of_coeffs() {
        let e = LinearExpr {
            vars: vec![VarIndex(0), VarIndex(1)],
            coeffs: vec![6, 9],
            offset: 0,
        };
        assert_eq!(e.coeff_gcd(), 3);
    }
}
