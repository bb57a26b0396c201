/*!
Literal references: a signed integer naming either a Boolean variable or its
negation, per spec.md §3. `r >= 0` denotes variable `r`; `r < 0` denotes the
negation of variable `-r-1`.

Booleans are exactly variables whose domain is `{0, 1}`; a literal is a
reference to such a variable under one of the two polarities.
*/

use crate::model::VarIndex;

/// A literal reference, `r >= 0` for variable `r`, `r < 0` for `not(-r-1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal(pub i64);

impl Literal {
    pub fn positive(var: VarIndex) -> Self {
        Literal(var.0 as i64)
    }

    pub fn negative(var: VarIndex) -> Self {
        Literal(-(var.0 as i64) - 1)
    }

    pub fn of(var: VarIndex, polarity: bool) -> Self {
        if polarity {
            Literal::positive(var)
        } else {
            Literal::negative(var)
        }
    }

    pub fn atom(self) -> VarIndex {
        if self.0 >= 0 {
            VarIndex(self.0 as u32)
        } else {
            VarIndex((-self.0 - 1) as u32)
        }
    }

    pub fn polarity(self) -> bool {
        self.0 >= 0
    }

    pub fn negate(self) -> Literal {
        Literal(-self.0 - 1)
    }
}

impl std::ops::Neg for Literal {
    type Output = Literal;
    fn neg(self) -> Literal {
        self.negate()
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.polarity() {
            write!(f, "{}", self.atom())
        } else {
            write!(f, "¬{}", self.atom())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation_round_trips() {
        let v = VarIndex(7);
        let p = Literal::positive(v);
        let n = p.negate();
        assert_eq!(n.atom(), v);
        assert!(!n.polarity());
        assert_eq!(n.negate(), p);
    }

    #[test]
    fn of_matches_polarity() {
        let v = VarIndex(3);
        assert_eq!(Literal::of(v, true), Literal::positive(v));
        assert_eq!(Literal::of(v, false), Literal::negative(v));
    }
}
