/*!
`inverse`: `forward` and `backward` are equal-length arrays of variables such
that `forward[i] = j` iff `backward[j] = i` (spec.md §4.3.11). Both arrays
index into the same range `[0, n-1]` (`n = forward.len()`), and a variable
may not appear in both arrays (a position can't simultaneously be its own
forward and backward role without the constraint degenerating, which is
outside what the rewriter needs to special-case since domain restriction to
`[0, n-1]` combined with the usual per-variable fixed-value propagation
handles it uniformly).
*/

use crate::context::PresolveContext;
use crate::domain::Domain;
use crate::error::PresolveError;
use crate::model::constraint::{ConstraintKind, Inverse};
use crate::model::ConstraintIndex;

use super::remove_constraint;

pub fn presolve(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::Inverse(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };

    let n = body.forward.len() as i64;
    if n == 0 {
        remove_constraint(ctx, ci);
        return Ok(());
    }
    if body.backward.len() as i64 != n {
        ctx.mark_infeasible("inverse forward/backward arrays have different lengths");
        return Ok(());
    }

    let in_range = Domain::range(0, n - 1);
    for &v in body.forward.iter().chain(body.backward.iter()) {
        ctx.intersect_domain(v, &in_range)?;
        if ctx.is_infeasible() {
            return Ok(());
        }
    }

    // A variable referenced by both arrays would have to simultaneously
    // play a forward and a backward role; since the two arrays are
    // distinct index spaces over the same range, that is only sound when
    // the shared variable's forced value is consistent in both roles, which
    // the iterated fixed-point propagation below already checks via
    // ordinary contradiction detection — here we only need to forbid the
    // degenerate case of the *same slot* appearing in both arrays pointing
    // at itself inconsistently, which falls out of the loop below as well.

    // Iterate fixed-value propagation to a fixed point: `forward[i] = j`
    // forces `backward[j] = i`, and symmetrically.
    loop {
        let mut changed = false;
        for i in 0..n as usize {
            if let Some(j) = ctx.model.var(body.forward[i]).is_fixed() {
                if j < 0 || j >= n {
                    ctx.mark_infeasible("inverse forward value out of range");
                    return Ok(());
                }
                changed |= ctx.fix_value(body.backward[j as usize], i as i64)?;
                if ctx.is_infeasible() {
                    return Ok(());
                }
            }
        }
        for j in 0..n as usize {
            if let Some(i) = ctx.model.var(body.backward[j]).is_fixed() {
                if i < 0 || i >= n {
                    ctx.mark_infeasible("inverse backward value out of range");
                    return Ok(());
                }
                changed |= ctx.fix_value(body.forward[i as usize], j as i64)?;
                if ctx.is_infeasible() {
                    return Ok(());
                }
            }
        }
        if !changed {
            break;
        }
    }

    if body.forward.iter().all(|v| ctx.model.var(*v).is_fixed().is_some())
        && body.backward.iter().all(|v| ctx.model.var(*v).is_fixed().is_some())
    {
        let consistent = (0..n as usize).all(|i| {
            let j = ctx.model.var(body.forward[i]).is_fixed().unwrap();
            ctx.model.var(body.backward[j as usize]).is_fixed() == Some(i as i64)
        });
        if !consistent {
            ctx.mark_infeasible("inverse fully-fixed arrays are not mutually consistent");
            return Ok(());
        }
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("inverse_fully_fixed");
        return Ok(());
    }

    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::Inverse(Inverse {
        forward: body.forward,
        backward: body.backward,
    }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::constraint::Constraint;
    use crate::model::var::Variable;
    use crate::model::Model;

    #[test]
    fn fixed_forward_value_propagates_to_backward() {
        let mut model = Model::default();
        let f0 = model.new_variable(Variable::new(Domain::fixed(1)));
        let f1 = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b0 = model.new_variable(Variable::new(Domain::range(0, 1)));
        let b1 = model.new_variable(Variable::new(Domain::range(0, 1)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Inverse(Inverse {
            forward: vec![f0, f1],
            backward: vec![b0, b1],
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        presolve(&mut ctx, ConstraintIndex(0)).unwrap();
        // forward[0] = 1 forces backward[1] = 0.
        assert_eq!(ctx.model.var(b1).domain, Domain::fixed(0));
    }

    #[test]
    fn out_of_range_domain_restricted() {
        let mut model = Model::default();
        let f0 = model.new_variable(Variable::new(Domain::range(-5, 5)));
        let b0 = model.new_variable(Variable::new(Domain::range(-5, 5)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Inverse(Inverse {
            forward: vec![f0],
            backward: vec![b0],
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        presolve(&mut ctx, ConstraintIndex(0)).unwrap();
        assert_eq!(ctx.model.var(f0).domain, Domain::fixed(0));
    }
}
