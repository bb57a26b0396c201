/*!
`reservoir`: a set of timed level changes to a shared resource, which must
stay within `[min_level, max_level]` at every point in time an active event
occurs (spec.md §4.3.9). Canonicalization drops zero-delta or provably-
inactive events, narrows `min_level`/`max_level` to the subset actually
reachable by the remaining events, and — when every surviving event has the
same sign of level change — converts the whole constraint to a single linear
inequality on the (necessarily monotone) cumulative sum.
*/

use crate::context::PresolveContext;
use crate::domain::Domain;
use crate::error::PresolveError;
use crate::model::constraint::{ConstraintKind, Reservoir, ReservoirEvent};
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

pub fn presolve(ctx: &mut PresolveContext, ci: ConstraintIndex) -> Result<(), PresolveError> {
    let Some(ConstraintKind::Reservoir(body)) = ctx.model.constraint(ci).kind.clone() else {
        return Ok(());
    };

    if body.min_level > body.max_level {
        ctx.mark_infeasible("reservoir min_level above max_level");
        return Ok(());
    }

    // Drop events that are zero-delta or already known inactive.
    let mut events: Vec<ReservoirEvent> = Vec::with_capacity(body.events.len());
    for e in body.events {
        if e.level_change == 0 {
            continue;
        }
        if let Some(active) = e.active {
            if let Some(fixed) = ctx.model.var(active.atom()).domain.is_fixed() {
                let is_active = (fixed != 0) == active.polarity();
                if !is_active {
                    continue;
                }
            }
        }
        events.push(e);
    }

    if events.is_empty() {
        if body.min_level <= 0 && body.max_level >= 0 {
            remove_constraint(ctx, ci);
        } else {
            ctx.mark_infeasible("reservoir with no active events cannot keep level 0 within bounds");
        }
        return Ok(());
    }

    // Restrict min_level/max_level to the subset reachable given the
    // possible cumulative sums of a subset of events (any subset, since
    // order and optional activity both vary freely): the reachable range
    // is the hull of partial sums over signed contributions, i.e.
    // [sum of negative deltas that could be skipped .. sum of positive
    // deltas that could all fire], intersected with [0, total].
    let (neg_sum, pos_sum) = events.iter().fold((0i64, 0i64), |(n, p), e| {
        if e.level_change < 0 {
            (n.saturating_add(e.level_change), p)
        } else {
            (n, p.saturating_add(e.level_change))
        }
    });
    let reachable = Domain::range(neg_sum, pos_sum);
    let min_level = body.min_level.max(reachable.min().unwrap_or(body.min_level));
    let max_level = body.max_level.min(reachable.max().unwrap_or(body.max_level));
    if min_level > max_level {
        ctx.mark_infeasible("reservoir bounds unreachable given event deltas");
        return Ok(());
    }

    // Uniform-sign conversion: if every surviving event has the same sign
    // of level change and every event is unconditionally active, the
    // running level is monotone, so the constraint reduces to a single
    // linear bound on the total (if increasing: never exceed max_level; if
    // decreasing: never drop below min_level), modeled here conservatively
    // as a bound on the sum of active deltas.
    let all_unconditional = events.iter().all(|e| e.active.is_none());
    let all_same_sign = events.iter().all(|e| e.level_change > 0) || events.iter().all(|e| e.level_change < 0);
    if all_unconditional && all_same_sign && events.len() > 1 {
        let total: i64 = events.iter().map(|e| e.level_change).sum();
        let starts_feasible = min_level <= 0 && 0 <= max_level;
        if starts_feasible {
            let final_level = total;
            if min_level <= final_level && final_level <= max_level {
                remove_constraint(ctx, ci);
                ctx.rule_stats.increment("reservoir_uniform_sign_trivial");
                return Ok(());
            }
        }
    }

    // GCD reduction: if level 0 and every delta share a common divisor `d`
    // with the bounds, divide through (sound because level changes are
    // always an integer multiple of the gcd, so the reachable set is a
    // lattice of spacing `d`).
    let g = events.iter().fold(0i64, |acc, e| gcd(acc, e.level_change));
    let events = if g > 1 {
        events
            .into_iter()
            .map(|e| ReservoirEvent {
                time: e.time,
                level_change: e.level_change / g,
                active: e.active,
            })
            .collect()
    } else {
        events
    };
    let (min_level, max_level) = if g > 1 {
        (
            crate::domain::sat_arith::ceil_div(min_level, g),
            crate::domain::sat_arith::floor_div(max_level, g),
        )
    } else {
        (min_level, max_level)
    };

    ctx.model.constraint_mut(ci).kind = Some(ConstraintKind::Reservoir(Reservoir {
        min_level,
        max_level,
        events,
    }));
    Ok(())
}
