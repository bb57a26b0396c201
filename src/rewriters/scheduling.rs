/*!
The scheduling family: `interval`, `no_overlap`, `no_overlap_2d`,
`cumulative` (spec.md §4.3.7). `interval` constraints are referenced by
index from the other three; their own rewriter keeps `start + size = end`
and non-negative size in sync, while the others reason about the
combinatorics of many intervals at once (disjointness, overlap-graph
components, demand vs. capacity).
*/

use std::collections::BTreeMap;

use crate::context::PresolveContext;
use crate::domain::sat_arith::{sat_add, sat_mul};
use crate::domain::Domain;
use crate::error::PresolveError;
use crate::model::constraint::{
    AffineExpr, ConstraintKind, Cumulative, Interval, IntervalRef, NoOverlap, NoOverlap2D,
};
use crate::model::linear::LinearExpr;
use crate::model::ConstraintIndex;

use super::remove_constraint;

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a as i64
}

fn domain_of(ctx: &PresolveContext, e: &AffineExpr) -> Domain {
    ctx.model.var(e.var).domain.mul_by(e.coeff).add(&Domain::fixed(e.offset))
}

/// Whether the interval constraint at `ci` is "present": true if its
/// enforcement literals are all already forced true, i.e. it is
/// unconditionally active, used by the scheduling constraints that
/// reference intervals by index to decide whether to keep considering one.
fn interval_is_absent(ctx: &PresolveContext, iv: IntervalRef) -> bool {
    ctx.model.constraint(iv.0).is_removed()
        || ctx
            .model
            .constraint(iv.0)
            .enforcement
            .iter()
            .any(|lit| ctx.model.var(lit.atom()).domain.is_fixed() == Some(if lit.polarity() { 0 } else { 1 }))
}

fn interval_body(ctx: &PresolveContext, iv: IntervalRef) -> Option<Interval> {
    match &ctx.model.constraint(iv.0).kind {
        Some(ConstraintKind::Interval(body)) => Some(body.clone()),
        _ => None,
    }
}

pub fn presolve_interval(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::Interval(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };

    // size >= 0 unless the interval is conditionally enforced (then an
    // absent interval's size is unconstrained).
    if ctx.model.constraint(ci).enforcement.is_empty() {
        ctx.intersect_domain(body.size.var, &inverse_domain(&body.size, &Domain::range(0, i64::MAX)))?;
        if ctx.is_infeasible() {
            return Ok(());
        }
    }

    // start + size = end, emitted once as a standalone linear constraint
    // (kept in the model rather than dropped, since the scheduling
    // constraints that reference this interval need `start`/`size`/`end`
    // kept consistent as their own domains shrink); synthesized only the
    // first time this interval is visited.
    if ctx.mark_interval_synced(ci) {
        let expr = LinearExpr {
            vars: vec![body.start.var, body.size.var, body.end.var],
            coeffs: vec![body.start.coeff, body.size.coeff, -body.end.coeff],
            offset: body.start.offset + body.size.offset - body.end.offset,
        }
        .canonicalize();
        if expr.is_empty() {
            if expr.offset != 0 {
                ctx.mark_infeasible("interval start+size != end identically");
                return Ok(());
            }
        } else {
            let new_ci = ctx.model.add_constraint(crate::model::constraint::Constraint::unconditional(
                ConstraintKind::Linear(crate::model::constraint::LinearConstraint {
                    expr,
                    rhs: Domain::fixed(0),
                }),
            ));
            ctx.track_new_constraint(new_ci);
        }
    }

    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::Interval(body));
    Ok(())
}

fn inverse_domain(e: &AffineExpr, required: &Domain) -> Domain {
    if e.coeff == 0 {
        return if required.contains(e.offset) { Domain::full() } else { Domain::empty() };
    }
    required.add(&Domain::fixed(-e.offset)).inverse_mul(e.coeff)
}

fn interval_span(ctx: &PresolveContext, iv: IntervalRef) -> Option<(i64, i64)> {
    let body = interval_body(ctx, iv)?;
    let start = domain_of(ctx, &body.start);
    let end = domain_of(ctx, &body.end);
    Some((start.min()?, end.max()?))
}

fn must_overlap(ctx: &PresolveContext, a: IntervalRef, b: IntervalRef) -> bool {
    // Two intervals *might* overlap unless their latest-possible-end for
    // one is before the earliest-possible-start of the other in both
    // directions; here we want the opposite (whether they provably overlap
    // is not generally decidable from bounds alone without a must-overlap
    // oracle, so "might overlap" drives component construction and
    // disjointness is what the caller checks separately).
    let (Some(a_body), Some(b_body)) = (interval_body(ctx, a), interval_body(ctx, b)) else {
        return false;
    };
    let a_start = domain_of(ctx, &a_body.start);
    let a_end = domain_of(ctx, &a_body.end);
    let b_start = domain_of(ctx, &b_body.start);
    let b_end = domain_of(ctx, &b_body.end);
    let (Some(a_s), Some(a_e), Some(b_s), Some(b_e)) = (a_start.min(), a_end.max(), b_start.min(), b_end.max()) else {
        return true;
    };
    // Might-overlap test: a's possible range intersects b's possible range.
    a_s < b_e && b_s < a_e
}

/// Partitions `intervals` into connected components of the "might overlap"
/// graph, used to split `no_overlap`/`no_overlap_2d`/`cumulative` into
/// independent sub-constraints when the ranges can be proven disjoint
/// between components.
fn overlap_components(ctx: &PresolveContext, intervals: &[IntervalRef]) -> Vec<Vec<IntervalRef>> {
    let n = intervals.len();
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }
    for i in 0..n {
        for j in (i + 1)..n {
            if must_overlap(ctx, intervals[i], intervals[j]) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }
    let mut groups: BTreeMap<usize, Vec<IntervalRef>> = BTreeMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(intervals[i]);
    }
    groups.into_values().collect()
}

pub fn presolve_no_overlap(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::NoOverlap(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };

    let mut intervals: Vec<IntervalRef> = body
        .intervals
        .into_iter()
        .filter(|iv| !interval_is_absent(ctx, *iv))
        .collect();
    intervals.sort_by_key(|iv| iv.0 .0);
    intervals.dedup();

    if intervals.len() <= 1 {
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("no_overlap_trivial");
        return Ok(());
    }

    let components = overlap_components(ctx, &intervals);
    if components.len() > 1 {
        for group in &components {
            if group.len() > 1 {
                let new_ci = ctx.model.add_constraint(crate::model::constraint::Constraint::unconditional(
                    ConstraintKind::NoOverlap(NoOverlap { intervals: group.clone() }),
                ));
                ctx.track_new_constraint(new_ci);
            }
        }
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("no_overlap_split_components");
        return Ok(());
    }

    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::NoOverlap(NoOverlap { intervals }));
    Ok(())
}

pub fn presolve_no_overlap_2d(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::NoOverlap2D(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };

    let n = body.x_intervals.len();
    let mut keep: Vec<usize> = (0..n)
        .filter(|&i| !interval_is_absent(ctx, body.x_intervals[i]) && !interval_is_absent(ctx, body.y_intervals[i]))
        .collect();
    keep.sort();

    if keep.len() <= 1 {
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("no_overlap_2d_trivial");
        return Ok(());
    }

    // If every box's y-interval is fixed to the same span (constant along
    // y), the 2D constraint degenerates to a 1D no_overlap along x.
    let y_spans: Vec<Option<(i64, i64)>> = keep.iter().map(|&i| interval_span(ctx, body.y_intervals[i])).collect();
    if let Some(first) = y_spans[0] {
        if y_spans.iter().all(|s| *s == Some(first)) {
            let x_intervals: Vec<IntervalRef> = keep.iter().map(|&i| body.x_intervals[i]).collect();
            let new_ci = ctx.model.add_constraint(crate::model::constraint::Constraint::unconditional(
                ConstraintKind::NoOverlap(NoOverlap { intervals: x_intervals }),
            ));
            ctx.track_new_constraint(new_ci);
            remove_constraint(ctx, ci);
            ctx.rule_stats.increment("no_overlap_2d_degenerate_to_1d");
            return Ok(());
        }
    }

    let x_intervals: Vec<IntervalRef> = keep.iter().map(|&i| body.x_intervals[i]).collect();
    let y_intervals: Vec<IntervalRef> = keep.iter().map(|&i| body.y_intervals[i]).collect();
    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::NoOverlap2D(NoOverlap2D { x_intervals, y_intervals }));
    Ok(())
}

pub fn presolve_cumulative(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::Cumulative(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };

    let capacity_domain = domain_of(ctx, &body.capacity);
    let Some(capacity_max) = capacity_domain.max() else {
        return Ok(());
    };

    let mut intervals = Vec::new();
    let mut demands = Vec::new();
    for (iv, d) in body.intervals.into_iter().zip(body.demands.into_iter()) {
        if interval_is_absent(ctx, iv) {
            continue;
        }
        let demand_domain = domain_of(ctx, &d);
        if demand_domain.max() == Some(0) {
            continue;
        }
        if demand_domain.min().unwrap_or(0) > capacity_max {
            ctx.mark_infeasible("cumulative demand exceeds capacity");
            return Ok(());
        }
        if let Some(iv_body) = interval_body(ctx, iv) {
            if domain_of(ctx, &iv_body.size).max() == Some(0) {
                continue;
            }
        }
        intervals.push(iv);
        demands.push(d);
    }

    if intervals.is_empty() {
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("cumulative_trivial");
        return Ok(());
    }

    // Merge demands of identical intervals: when the same interval appears
    // twice (demand1, demand2), the two are only ever active together, so
    // replace them with one entry summing the demands. Only done when the
    // sum stays representable as a single affine expression (same
    // underlying variable); mixed-variable duplicates are additively
    // unsafe to fold without synthesizing a fresh variable, so they are
    // left as separate entries instead (still correct, just not minimal).
    let mut merged_intervals: Vec<IntervalRef> = Vec::with_capacity(intervals.len());
    let mut merged_demands: Vec<AffineExpr> = Vec::with_capacity(demands.len());
    'dedup: for (iv, d) in intervals.into_iter().zip(demands.into_iter()) {
        for (mi, md) in merged_intervals.iter().zip(merged_demands.iter_mut()) {
            if *mi == iv && md.var == d.var {
                md.coeff = sat_add(md.coeff, d.coeff);
                md.offset = sat_add(md.offset, d.offset);
                ctx.rule_stats.increment("cumulative_merged_identical_interval_demands");
                continue 'dedup;
            }
        }
        merged_intervals.push(iv);
        merged_demands.push(d);
    }
    let intervals = merged_intervals;
    let demands = merged_demands;

    // Divide demand and capacity by their shared gcd. Sound without
    // synthesizing an auxiliary variable: every demand and the capacity are
    // themselves affine expressions, so if `g` divides every one of their
    // coefficients and offsets exactly, dividing those fields reproduces
    // the original value scaled down by `g` for every value the underlying
    // variable can take.
    let mut g = gcd(body.capacity.coeff, body.capacity.offset);
    for d in &demands {
        g = gcd(g, gcd(d.coeff, d.offset));
    }
    let (capacity, demands, capacity_max) = if g > 1 {
        ctx.rule_stats.increment("cumulative_gcd_reduction");
        let capacity = AffineExpr {
            var: body.capacity.var,
            coeff: body.capacity.coeff / g,
            offset: body.capacity.offset / g,
        };
        let demands: Vec<AffineExpr> = demands
            .into_iter()
            .map(|d| AffineExpr { var: d.var, coeff: d.coeff / g, offset: d.offset / g })
            .collect();
        (capacity, demands, capacity_max / g)
    } else {
        (body.capacity, demands, capacity_max)
    };

    // Split into disjoint time components: intervals that can never overlap
    // any other interval in the constraint are independent of it, so each
    // connected component of the "might overlap" graph can be presolved as
    // its own, smaller cumulative constraint.
    let components = overlap_components(ctx, &intervals);
    if components.len() > 1 {
        for group in &components {
            let group_demands: Vec<AffineExpr> = group
                .iter()
                .map(|iv| demands[intervals.iter().position(|x| x == iv).unwrap()])
                .collect();
            let new_ci = ctx.model.add_constraint(crate::model::constraint::Constraint::unconditional(
                ConstraintKind::Cumulative(Cumulative {
                    capacity,
                    intervals: group.clone(),
                    demands: group_demands,
                }),
            ));
            ctx.track_new_constraint(new_ci);
        }
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("cumulative_split_components");
        return Ok(());
    }

    // all_different conversion: every demand strictly exceeds capacity/2
    // and every interval has unit size => at most one interval can occupy
    // any given time point, matching all_different on start times.
    let all_unit_size = intervals.iter().all(|iv| {
        interval_body(ctx, *iv)
            .map(|b| domain_of(ctx, &b.size) == Domain::fixed(1))
            .unwrap_or(false)
    });
    let all_heavy = demands.iter().all(|d| sat_mul(domain_of(ctx, d).min().unwrap_or(0), 2) > capacity_max);
    if all_unit_size && all_heavy && capacity_max > 0 {
        let exprs: Vec<AffineExpr> = intervals
            .iter()
            .filter_map(|iv| interval_body(ctx, *iv).map(|b| b.start))
            .collect();
        let new_ci = ctx.model.add_constraint(crate::model::constraint::Constraint::unconditional(
            ConstraintKind::AllDifferent(crate::model::constraint::AllDifferent { exprs }),
        ));
        ctx.track_new_constraint(new_ci);
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("cumulative_to_all_different");
        return Ok(());
    }

    // no_overlap conversion: every demand exceeds capacity/2 (without the
    // unit-size restriction) => no two intervals can be concurrently
    // active, which is exactly no_overlap.
    if all_heavy && capacity_max > 0 {
        let new_ci = ctx.model.add_constraint(crate::model::constraint::Constraint::unconditional(
            ConstraintKind::NoOverlap(NoOverlap { intervals: intervals.clone() }),
        ));
        ctx.track_new_constraint(new_ci);
        remove_constraint(ctx, ci);
        ctx.rule_stats.increment("cumulative_to_no_overlap");
        return Ok(());
    }

    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::Cumulative(Cumulative {
        capacity,
        intervals,
        demands,
    }));
    Ok(())
}
