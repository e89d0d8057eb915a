//! Law-based equivalence of causes.
//!
//! Two causes are equivalent when they are related by the failure semiring
//! laws: `Empty` as identity, associativity of both operators, commutativity
//! of `Both`, and distributivity of `Then` over `Both`. `Marked` wrappers are
//! stripped before every comparison.
//!
//! The check is a fixed list of pattern rules, tried in order after both
//! sides are unmarked:
//!
//! 1. Structural: same variant, equivalent children, equal leaf payloads.
//! 2. Zero: a `Then`/`Both` with an `Empty` operand is compared by its other
//!    operand.
//! 3. `Then` associativity.
//! 4. `Then` distributivity, with the `Both` under either side of the `Then`.
//! 5. `Both` associativity.
//! 6. `Both` commutativity.
//!
//! Rules 2 through 5 are tried with the operands in both orders. A rule only
//! fires when the literal tree shapes match; there is no search, so the check
//! always terminates. Every recursive comparison is a [`Trampoline`] step.
//!
//! Both sides are pruned of empty subtrees first, so the zero rule only ever
//! meets a literal `Empty` and the remaining rules see `Empty`-free trees.
//! Distributivity therefore only relates non-empty operands:
//! `Then(a, Both(Empty, c))` is `Then(a, c)`, not `Both(a, Then(a, c))`.
//!
//! Traces never participate in equivalence.

use super::{Cause, CauseView};
use crate::tracing_compat::trace;
use crate::util::Trampoline;

type Rule<'a, E> = fn(&'a Cause<E>, &'a Cause<E>) -> Option<Trampoline<'a, bool>>;

impl<E: PartialEq> Cause<E> {
    /// Returns true if the two causes are equal up to the algebra's laws.
    ///
    /// Stack-safe for trees of any depth.
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        let (left, right) = (self.prune_empty(), other.prune_empty());
        let result = equivalent_step(&left, &right).run();
        trace!(result, "cause equivalence checked");
        result
    }
}

/// `==` is [`Cause::equivalent`].
impl<E: PartialEq> PartialEq for Cause<E> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.equivalent(other)
    }
}

impl<E: Eq> Eq for Cause<E> {}

fn equivalent_step<'a, E: PartialEq>(
    left: &'a Cause<E>,
    right: &'a Cause<E>,
) -> Trampoline<'a, bool> {
    Trampoline::suspend(move || {
        let left = left.unmarked();
        let right = right.unmarked();
        if left.ptr_eq(right) {
            return Trampoline::done(true);
        }
        let rules: [Rule<'a, E>; 6] = [
            |l, r| structural(l, r),
            |l, r| zero(l, r),
            |l, r| then_associativity(l, r),
            |l, r| then_distributivity(l, r),
            |l, r| both_associativity(l, r),
            |l, r| both_commutativity(l, r),
        ];
        Trampoline::any(rules.into_iter().filter_map(move |rule| rule(left, right)))
    })
}

fn either<'a>(
    first: Option<Trampoline<'a, bool>>,
    second: Option<Trampoline<'a, bool>>,
) -> Option<Trampoline<'a, bool>> {
    match (first, second) {
        (Some(a), Some(b)) => Some(Trampoline::any([a, b])),
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

fn in_both_orders<'a, E: PartialEq>(
    rule: Rule<'a, E>,
    left: &'a Cause<E>,
    right: &'a Cause<E>,
) -> Option<Trampoline<'a, bool>> {
    either(rule(left, right), rule(right, left))
}

fn structural<'a, E: PartialEq>(
    left: &'a Cause<E>,
    right: &'a Cause<E>,
) -> Option<Trampoline<'a, bool>> {
    match (left.view(), right.view()) {
        (CauseView::Empty, CauseView::Empty) => Some(Trampoline::done(true)),
        (CauseView::Fail(a, _), CauseView::Fail(b, _)) => Some(Trampoline::done(a == b)),
        (CauseView::Die(a, _), CauseView::Die(b, _)) => Some(Trampoline::done(a == b)),
        (CauseView::Interrupt(a, _), CauseView::Interrupt(b, _)) => {
            Some(Trampoline::done(a == b))
        }
        (CauseView::Then(a1, b1), CauseView::Then(a2, b2))
        | (CauseView::Both(a1, b1), CauseView::Both(a2, b2)) => Some(Trampoline::all([
            equivalent_step(a1, a2),
            equivalent_step(b1, b2),
        ])),
        _ => None,
    }
}

fn zero<'a, E: PartialEq>(
    left: &'a Cause<E>,
    right: &'a Cause<E>,
) -> Option<Trampoline<'a, bool>> {
    in_both_orders(zero_left, left, right)
}

fn zero_left<'a, E: PartialEq>(
    left: &'a Cause<E>,
    right: &'a Cause<E>,
) -> Option<Trampoline<'a, bool>> {
    let (CauseView::Then(a, b) | CauseView::Both(a, b)) = left.view() else {
        return None;
    };
    if a.unmarked().is_empty_type() {
        Some(equivalent_step(b, right))
    } else if b.unmarked().is_empty_type() {
        Some(equivalent_step(a, right))
    } else {
        None
    }
}

fn then_associativity<'a, E: PartialEq>(
    left: &'a Cause<E>,
    right: &'a Cause<E>,
) -> Option<Trampoline<'a, bool>> {
    in_both_orders(then_associativity_left, left, right)
}

// Then(Then(a, b), c) against Then(a', Then(b', c')).
fn then_associativity_left<'a, E: PartialEq>(
    left: &'a Cause<E>,
    right: &'a Cause<E>,
) -> Option<Trampoline<'a, bool>> {
    let CauseView::Then(ab, c) = left.view() else {
        return None;
    };
    let CauseView::Then(a, b) = ab.unmarked().view() else {
        return None;
    };
    let CauseView::Then(a2, bc) = right.view() else {
        return None;
    };
    let CauseView::Then(b2, c2) = bc.unmarked().view() else {
        return None;
    };
    Some(Trampoline::all([
        equivalent_step(a, a2),
        equivalent_step(b, b2),
        equivalent_step(c, c2),
    ]))
}

fn then_distributivity<'a, E: PartialEq>(
    left: &'a Cause<E>,
    right: &'a Cause<E>,
) -> Option<Trampoline<'a, bool>> {
    in_both_orders(then_distributivity_left, left, right)
}

// Then(a, Both(b, c)) against Both(Then(a, b), Then(a, c)), and
// Then(Both(a, b), c) against Both(Then(a, c), Then(b, c)).
fn then_distributivity_left<'a, E: PartialEq>(
    left: &'a Cause<E>,
    right: &'a Cause<E>,
) -> Option<Trampoline<'a, bool>> {
    let CauseView::Then(head, tail) = left.view() else {
        return None;
    };
    let CauseView::Both(x, y) = right.view() else {
        return None;
    };
    let CauseView::Then(x_head, x_tail) = x.unmarked().view() else {
        return None;
    };
    let CauseView::Then(y_head, y_tail) = y.unmarked().view() else {
        return None;
    };

    let over_tail = match tail.unmarked().view() {
        CauseView::Both(b, c) => Some(Trampoline::all([
            equivalent_step(head, x_head),
            equivalent_step(head, y_head),
            equivalent_step(b, x_tail),
            equivalent_step(c, y_tail),
        ])),
        _ => None,
    };
    let over_head = match head.unmarked().view() {
        CauseView::Both(a, b) => Some(Trampoline::all([
            equivalent_step(a, x_head),
            equivalent_step(b, y_head),
            equivalent_step(tail, x_tail),
            equivalent_step(tail, y_tail),
        ])),
        _ => None,
    };
    either(over_tail, over_head)
}

fn both_associativity<'a, E: PartialEq>(
    left: &'a Cause<E>,
    right: &'a Cause<E>,
) -> Option<Trampoline<'a, bool>> {
    in_both_orders(both_associativity_left, left, right)
}

// Both(Both(a, b), c) against Both(a', Both(b', c')).
fn both_associativity_left<'a, E: PartialEq>(
    left: &'a Cause<E>,
    right: &'a Cause<E>,
) -> Option<Trampoline<'a, bool>> {
    let CauseView::Both(ab, c) = left.view() else {
        return None;
    };
    let CauseView::Both(a, b) = ab.unmarked().view() else {
        return None;
    };
    let CauseView::Both(a2, bc) = right.view() else {
        return None;
    };
    let CauseView::Both(b2, c2) = bc.unmarked().view() else {
        return None;
    };
    Some(Trampoline::all([
        equivalent_step(a, a2),
        equivalent_step(b, b2),
        equivalent_step(c, c2),
    ]))
}

// Symmetric in its operands, so a single order suffices.
fn both_commutativity<'a, E: PartialEq>(
    left: &'a Cause<E>,
    right: &'a Cause<E>,
) -> Option<Trampoline<'a, bool>> {
    let (CauseView::Both(a, b), CauseView::Both(c, d)) = (left.view(), right.view()) else {
        return None;
    };
    Some(Trampoline::all([
        equivalent_step(a, d),
        equivalent_step(b, c),
    ]))
}
