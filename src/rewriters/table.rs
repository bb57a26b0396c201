/*!
`table`: a conjunction of variables restricted to (or, if `negated`,
forbidden from) a fixed set of tuples (spec.md §4.3.5). Canonicalization
intersects each column's domain with the set of values appearing in that
column across surviving tuples, drops tuples that reference an out-of-domain
value in any column, and detects the trivially-true/trivially-false cases.
*/

use crate::context::PresolveContext;
use crate::domain::Domain;
use crate::error::PresolveError;
use crate::model::constraint::{ConstraintKind, Table};
use crate::model::ConstraintIndex;

use super::{mark_false, remove_constraint};

/// Drops tuples with an out-of-domain value, then intersects each column's
/// variable domain with the set of values the surviving tuples actually
/// use in that column. Iterates to a fixed point since tightening one
/// column's domain can invalidate tuples that were fine before, which in
/// turn can tighten another column.
fn canonicalize_table(ctx: &mut PresolveContext, vars: &[crate::model::VarIndex], tuples: Vec<Vec<i64>>) -> Result<Vec<Vec<i64>>, PresolveError> {
    let mut tuples = tuples;
    loop {
        let domains: Vec<Domain> = vars.iter().map(|v| ctx.model.var(*v).domain.clone()).collect();
        let before = tuples.len();
        tuples.retain(|t| t.iter().zip(domains.iter()).all(|(v, d)| d.contains(*v)));
        if tuples.len() == before {
            break;
        }
    }

    for (col, &var) in vars.iter().enumerate() {
        if tuples.is_empty() {
            break;
        }
        let mut values: Vec<i64> = tuples.iter().map(|t| t[col]).collect();
        values.sort();
        values.dedup();
        let column_domain = Domain::from_intervals(values.iter().map(|&v| crate::domain::Interval::singleton(v)).collect());
        ctx.intersect_domain(var, &column_domain)?;
        if ctx.is_infeasible() {
            return Ok(tuples);
        }
    }

    Ok(tuples)
}

pub fn presolve(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::Table(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };

    if body.vars.is_empty() {
        remove_constraint(ctx, ci);
        return Ok(());
    }

    if body.negated {
        // A negative table forbids the listed tuples rather than requiring
        // membership; column-domain tightening doesn't apply (removing a
        // value from a column could make a *different* tuple newly
        // reachable, which is fine for a forbidding constraint) — only drop
        // tuples that can no longer occur.
        let domains: Vec<Domain> = body.vars.iter().map(|v| ctx.model.var(*v).domain.clone()).collect();
        let tuples: Vec<Vec<i64>> = body
            .tuples
            .into_iter()
            .filter(|t| t.iter().zip(domains.iter()).all(|(v, d)| d.contains(*v)))
            .collect();
        if tuples.is_empty() {
            remove_constraint(ctx, ci);
            ctx.rule_stats.increment("table_negated_trivially_true");
            return Ok(());
        }
        ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::Table(Table {
            vars: body.vars,
            tuples,
            negated: true,
        }));
        return Ok(());
    }

    let tuples = canonicalize_table(ctx, &body.vars, body.tuples)?;
    if ctx.is_infeasible() {
        return Ok(());
    }

    if tuples.is_empty() {
        mark_false(ctx, ci, "table has no surviving tuple");
        return Ok(());
    }

    if tuples.len() == 1 {
        for (&var, &val) in body.vars.iter().zip(tuples[0].iter()) {
            ctx.fix_value(var, val)?;
            if ctx.is_infeasible() {
                return Ok(());
            }
        }
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("table_single_tuple");
        return Ok(());
    }

    // Every variable already fixed to a value consistent with all
    // remaining tuples projected onto it: the table is now vacuously true
    // (every representable assignment of the remaining free variables
    // already appears, since the column-domain pass above only ever
    // narrowed to values tuples actually carry).
    if body.vars.iter().all(|v| ctx.model.var(*v).is_fixed().is_some()) {
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("table_all_columns_fixed");
        return Ok(());
    }

    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::Table(Table {
        vars: body.vars,
        tuples,
        negated: false,
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
    fn drops_out_of_domain_tuples_and_tightens_columns() {
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 2)));
        let y = model.new_variable(Variable::new(Domain::range(0, 2)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Table(Table {
            vars: vec![x, y],
            tuples: vec![vec![0, 0], vec![1, 5], vec![2, 1]],
            negated: false,
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        presolve(&mut ctx, ConstraintIndex(0)).unwrap();
        // tuple [1,5] is dropped (5 not in y's domain); remaining tuples
        // use x in {0,2}, y in {0,1}.
        assert_eq!(ctx.model.var(x).domain, Domain::from_intervals(vec![crate::domain::Interval::singleton(0), crate::domain::Interval::singleton(2)]));
    }

    #[test]
    fn single_tuple_fixes_all_columns() {
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::range(0, 5)));
        let y = model.new_variable(Variable::new(Domain::range(0, 5)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Table(Table {
            vars: vec![x, y],
            tuples: vec![vec![3, 4]],
            negated: false,
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        presolve(&mut ctx, ConstraintIndex(0)).unwrap();
        assert_eq!(ctx.model.var(x).domain, Domain::fixed(3));
        assert_eq!(ctx.model.var(y).domain, Domain::fixed(4));
        assert!(ctx.model.constraint(ConstraintIndex(0)).is_removed());
    }

    #[test]
    fn empty_after_filtering_is_infeasible() {
        let mut model = Model::default();
        let x = model.new_variable(Variable::new(Domain::fixed(9)));
        model.add_constraint(Constraint::unconditional(ConstraintKind::Table(Table {
            vars: vec![x],
            tuples: vec![vec![1], vec![2]],
            negated: false,
        })));
        let mut ctx = PresolveContext::new(model, Config::default(), 1);
        presolve(&mut ctx, ConstraintIndex(0)).unwrap();
        assert!(ctx.is_infeasible());
    }
}
