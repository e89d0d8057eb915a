//! Folds and the combinators built on them.
//!
//! [`Cause::fold`] is the generic catamorphism over the seven variants. It
//! runs post-order on an explicit frame stack, so reducers see children
//! before parents without native recursion.

use super::{Cause, CauseView};
use crate::error::{bug, CauseError};
use crate::types::{Defect, FiberId, Trace};
use std::collections::HashSet;
use std::hash::Hash;

/// A reducer over the seven cause variants.
///
/// Composite callbacks receive the already-reduced children.
pub trait CauseFold<E> {
    /// The reduced value.
    type Output;

    /// Reduces `Empty`.
    fn on_empty(&mut self) -> Self::Output;

    /// Reduces `Fail`.
    fn on_fail(&mut self, error: &E, trace: &Trace) -> Self::Output;

    /// Reduces `Die`.
    fn on_die(&mut self, defect: &Defect, trace: &Trace) -> Self::Output;

    /// Reduces `Interrupt`.
    fn on_interrupt(&mut self, fiber_id: &FiberId, trace: &Trace) -> Self::Output;

    /// Combines the reduced children of `Then`.
    fn on_then(&mut self, left: Self::Output, right: Self::Output) -> Self::Output;

    /// Combines the reduced children of `Both`.
    fn on_both(&mut self, left: Self::Output, right: Self::Output) -> Self::Output;

    /// Reduces `Marked`. Transparent unless overridden.
    fn on_marked(&mut self, inner: Self::Output, _stackless: bool) -> Self::Output {
        inner
    }
}

enum Frame<'a, E> {
    Visit(&'a Cause<E>),
    Then,
    Both,
    Marked(bool),
}

impl<E> Cause<E> {
    /// Reduces the cause bottom-up with `folder`.
    pub fn fold<F: CauseFold<E>>(&self, folder: &mut F) -> F::Output {
        let mut frames = vec![Frame::Visit(self)];
        let mut results: Vec<F::Output> = Vec::new();

        while let Some(frame) = frames.pop() {
            match frame {
                Frame::Visit(cause) => match cause.view() {
                    CauseView::Empty => results.push(folder.on_empty()),
                    CauseView::Fail(error, trace) => results.push(folder.on_fail(error, trace)),
                    CauseView::Die(defect, trace) => results.push(folder.on_die(defect, trace)),
                    CauseView::Interrupt(fiber_id, trace) => {
                        results.push(folder.on_interrupt(fiber_id, trace));
                    }
                    CauseView::Then(left, right) => {
                        frames.push(Frame::Then);
                        frames.push(Frame::Visit(right));
                        frames.push(Frame::Visit(left));
                    }
                    CauseView::Both(left, right) => {
                        frames.push(Frame::Both);
                        frames.push(Frame::Visit(right));
                        frames.push(Frame::Visit(left));
                    }
                    CauseView::Marked(inner, stackless) => {
                        frames.push(Frame::Marked(stackless));
                        frames.push(Frame::Visit(inner));
                    }
                },
                Frame::Then => {
                    let (left, right) = pop_pair(&mut results);
                    results.push(folder.on_then(left, right));
                }
                Frame::Both => {
                    let (left, right) = pop_pair(&mut results);
                    results.push(folder.on_both(left, right));
                }
                Frame::Marked(stackless) => {
                    let Some(inner) = results.pop() else {
                        bug("fold result stack underflow");
                    };
                    results.push(folder.on_marked(inner, stackless));
                }
            }
        }

        match (results.pop(), results.is_empty()) {
            (Some(output), true) => output,
            _ => bug("fold finished with unbalanced result stack"),
        }
    }

    /// Returns the first `Some` produced by `f`, visiting nodes pre-order,
    /// left before right.
    pub fn find<'a, Z, F>(&'a self, mut f: F) -> Option<Z>
    where
        F: FnMut(&'a Self) -> Option<Z>,
    {
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            if let Some(found) = f(current) {
                return Some(found);
            }
            match current.view() {
                CauseView::Then(left, right) | CauseView::Both(left, right) => {
                    stack.push(right);
                    stack.push(left);
                }
                CauseView::Marked(inner, _) => stack.push(inner),
                CauseView::Empty
                | CauseView::Fail(..)
                | CauseView::Die(..)
                | CauseView::Interrupt(..) => {}
            }
        }
        None
    }

    /// Replaces every `Fail(e)` leaf with `Fail(f(e))`, keeping traces and
    /// the surrounding structure unchanged.
    pub fn map<E2, F>(&self, f: F) -> Cause<E2>
    where
        F: FnMut(&E) -> E2,
    {
        self.fold(&mut MapFold { f })
    }

    /// Replaces every `Fail(e)` leaf with the cause `f(e)`.
    pub fn flat_map<E2, F>(&self, f: F) -> Cause<E2>
    where
        F: FnMut(&E) -> Cause<E2>,
    {
        self.fold(&mut FlatMapFold { f })
    }

    /// Returns every distinct typed error, in discovery order.
    #[must_use]
    pub fn failures(&self) -> Vec<&E>
    where
        E: PartialEq,
    {
        let mut out: Vec<&E> = Vec::new();
        for leaf in self.leaves() {
            if let CauseView::Fail(error, _) = leaf.view() {
                if !out.contains(&error) {
                    out.push(error);
                }
            }
        }
        out
    }

    /// Returns every distinct defect, in discovery order.
    #[must_use]
    pub fn defects(&self) -> Vec<&Defect> {
        let mut out: Vec<&Defect> = Vec::new();
        for leaf in self.leaves() {
            if let CauseView::Die(defect, _) = leaf.view() {
                if !out.contains(&defect) {
                    out.push(defect);
                }
            }
        }
        out
    }

    /// Returns every distinct interrupting fiber, in discovery order.
    #[must_use]
    pub fn interruptors(&self) -> Vec<&FiberId> {
        let mut out: Vec<&FiberId> = Vec::new();
        for leaf in self.leaves() {
            if let CauseView::Interrupt(fiber_id, _) = leaf.view() {
                if !out.contains(&fiber_id) {
                    out.push(fiber_id);
                }
            }
        }
        out
    }

    /// Removes every `Fail` leaf, rebuilding with the absorbing constructors.
    #[must_use]
    pub fn strip_failures(&self) -> Self {
        self.fold(&mut StripFailuresFold {
            _error: std::marker::PhantomData,
        })
    }

    /// Keeps only the `Die` leaves, or `None` if there are none.
    #[must_use]
    pub fn keep_defects(&self) -> Option<Self> {
        let kept: Self = self.fold(&mut KeepDefectsFold {
            _error: std::marker::PhantomData,
        });
        if kept.is_empty() {
            None
        } else {
            Some(kept)
        }
    }

    /// Squashes the cause into its most significant failure.
    ///
    /// The first typed error wins; otherwise the first defect; otherwise
    /// interruption by every interrupting fiber combined.
    #[must_use]
    pub fn squash(&self) -> CauseError<E>
    where
        E: Clone,
    {
        if let Some(error) = self.failure_option() {
            return CauseError::Failure(error.clone());
        }
        if let Some(defect) = self.die_option() {
            return CauseError::Defect(defect.clone());
        }
        let interruptors = self.interruptors();
        if interruptors.is_empty() {
            CauseError::Empty
        } else {
            CauseError::Interrupted(FiberId::combine_all(interruptors))
        }
    }

    /// Returns every linear (fully sequential) path through the cause.
    ///
    /// `Both` contributes the union of its children's paths and `Then` the
    /// sequential product of them. A side without any path is the identity
    /// of the product, so `Empty` operands never erase the other side.
    #[must_use]
    pub fn linearize(&self) -> HashSet<Self>
    where
        E: Clone + Hash + Eq,
    {
        self.fold(&mut LinearizeFold)
    }

    fn leaves(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            match current.view() {
                CauseView::Then(left, right) | CauseView::Both(left, right) => {
                    stack.push(right);
                    stack.push(left);
                }
                CauseView::Marked(inner, _) => stack.push(inner),
                CauseView::Fail(..) | CauseView::Die(..) | CauseView::Interrupt(..) => {
                    out.push(current);
                }
                CauseView::Empty => {}
            }
        }
        out
    }
}

impl<E: Clone> Cause<Option<E>> {
    /// Moves the optional error outward.
    ///
    /// `Fail(None)` means "no failure here" and folds away; `Fail(Some(e))`
    /// becomes `Fail(e)`. A composite node is present if either side is.
    /// Returns `None` when no failure survives.
    #[must_use]
    pub fn flip_cause_option(&self) -> Option<Cause<E>> {
        self.fold(&mut FlipOptionFold)
    }
}

fn pop_pair<T>(results: &mut Vec<T>) -> (T, T) {
    match (results.pop(), results.pop()) {
        (Some(right), Some(left)) => (left, right),
        _ => bug("fold result stack underflow"),
    }
}

struct MapFold<F> {
    f: F,
}

impl<E, E2, F: FnMut(&E) -> E2> CauseFold<E> for MapFold<F> {
    type Output = Cause<E2>;

    fn on_empty(&mut self) -> Cause<E2> {
        Cause::empty()
    }

    fn on_fail(&mut self, error: &E, trace: &Trace) -> Cause<E2> {
        Cause::fail_with_trace((self.f)(error), trace.clone())
    }

    fn on_die(&mut self, defect: &Defect, trace: &Trace) -> Cause<E2> {
        Cause::die_with_trace(defect.clone(), trace.clone())
    }

    fn on_interrupt(&mut self, fiber_id: &FiberId, trace: &Trace) -> Cause<E2> {
        Cause::interrupt_with_trace(fiber_id.clone(), trace.clone())
    }

    fn on_then(&mut self, left: Cause<E2>, right: Cause<E2>) -> Cause<E2> {
        Cause::sequential(left, right)
    }

    fn on_both(&mut self, left: Cause<E2>, right: Cause<E2>) -> Cause<E2> {
        Cause::parallel(left, right)
    }

    fn on_marked(&mut self, inner: Cause<E2>, stackless: bool) -> Cause<E2> {
        if stackless {
            Cause::mark_stackless(inner)
        } else {
            Cause::mark(inner)
        }
    }
}

struct FlatMapFold<F> {
    f: F,
}

impl<E, E2, F: FnMut(&E) -> Cause<E2>> CauseFold<E> for FlatMapFold<F> {
    type Output = Cause<E2>;

    fn on_empty(&mut self) -> Cause<E2> {
        Cause::empty()
    }

    fn on_fail(&mut self, error: &E, _trace: &Trace) -> Cause<E2> {
        (self.f)(error)
    }

    fn on_die(&mut self, defect: &Defect, trace: &Trace) -> Cause<E2> {
        Cause::die_with_trace(defect.clone(), trace.clone())
    }

    fn on_interrupt(&mut self, fiber_id: &FiberId, trace: &Trace) -> Cause<E2> {
        Cause::interrupt_with_trace(fiber_id.clone(), trace.clone())
    }

    fn on_then(&mut self, left: Cause<E2>, right: Cause<E2>) -> Cause<E2> {
        Cause::then(left, right)
    }

    fn on_both(&mut self, left: Cause<E2>, right: Cause<E2>) -> Cause<E2> {
        Cause::both(left, right)
    }

    fn on_marked(&mut self, inner: Cause<E2>, stackless: bool) -> Cause<E2> {
        if inner.is_empty_type() {
            inner
        } else if stackless {
            Cause::mark_stackless(inner)
        } else {
            Cause::mark(inner)
        }
    }
}

struct StripFailuresFold<E> {
    _error: std::marker::PhantomData<fn() -> E>,
}

impl<E> CauseFold<E> for StripFailuresFold<E> {
    type Output = Cause<E>;

    fn on_empty(&mut self) -> Cause<E> {
        Cause::empty()
    }

    fn on_fail(&mut self, _error: &E, _trace: &Trace) -> Cause<E> {
        Cause::empty()
    }

    fn on_die(&mut self, defect: &Defect, trace: &Trace) -> Cause<E> {
        Cause::die_with_trace(defect.clone(), trace.clone())
    }

    fn on_interrupt(&mut self, fiber_id: &FiberId, trace: &Trace) -> Cause<E> {
        Cause::interrupt_with_trace(fiber_id.clone(), trace.clone())
    }

    fn on_then(&mut self, left: Cause<E>, right: Cause<E>) -> Cause<E> {
        Cause::then(left, right)
    }

    fn on_both(&mut self, left: Cause<E>, right: Cause<E>) -> Cause<E> {
        Cause::both(left, right)
    }
}

struct KeepDefectsFold<E> {
    _error: std::marker::PhantomData<fn() -> E>,
}

impl<E> CauseFold<E> for KeepDefectsFold<E> {
    type Output = Cause<E>;

    fn on_empty(&mut self) -> Cause<E> {
        Cause::empty()
    }

    fn on_fail(&mut self, _error: &E, _trace: &Trace) -> Cause<E> {
        Cause::empty()
    }

    fn on_die(&mut self, defect: &Defect, trace: &Trace) -> Cause<E> {
        Cause::die_with_trace(defect.clone(), trace.clone())
    }

    fn on_interrupt(&mut self, _fiber_id: &FiberId, _trace: &Trace) -> Cause<E> {
        Cause::empty()
    }

    fn on_then(&mut self, left: Cause<E>, right: Cause<E>) -> Cause<E> {
        Cause::then(left, right)
    }

    fn on_both(&mut self, left: Cause<E>, right: Cause<E>) -> Cause<E> {
        Cause::both(left, right)
    }
}

struct LinearizeFold;

impl<E: Clone + Hash + Eq> CauseFold<E> for LinearizeFold {
    type Output = HashSet<Cause<E>>;

    fn on_empty(&mut self) -> Self::Output {
        HashSet::new()
    }

    fn on_fail(&mut self, error: &E, trace: &Trace) -> Self::Output {
        HashSet::from([Cause::fail_with_trace(error.clone(), trace.clone())])
    }

    fn on_die(&mut self, defect: &Defect, trace: &Trace) -> Self::Output {
        HashSet::from([Cause::die_with_trace(defect.clone(), trace.clone())])
    }

    fn on_interrupt(&mut self, fiber_id: &FiberId, trace: &Trace) -> Self::Output {
        HashSet::from([Cause::interrupt_with_trace(fiber_id.clone(), trace.clone())])
    }

    fn on_then(&mut self, left: Self::Output, right: Self::Output) -> Self::Output {
        if left.is_empty() {
            return right;
        }
        if right.is_empty() {
            return left;
        }
        let mut out = HashSet::with_capacity(left.len() * right.len());
        for l in &left {
            for r in &right {
                out.insert(Cause::then(l.clone(), r.clone()));
            }
        }
        out
    }

    fn on_both(&mut self, mut left: Self::Output, right: Self::Output) -> Self::Output {
        left.extend(right);
        left
    }
}

struct FlipOptionFold;

impl<E: Clone> CauseFold<Option<E>> for FlipOptionFold {
    type Output = Option<Cause<E>>;

    fn on_empty(&mut self) -> Self::Output {
        Some(Cause::empty())
    }

    fn on_fail(&mut self, error: &Option<E>, trace: &Trace) -> Self::Output {
        error
            .as_ref()
            .map(|e| Cause::fail_with_trace(e.clone(), trace.clone()))
    }

    fn on_die(&mut self, defect: &Defect, trace: &Trace) -> Self::Output {
        Some(Cause::die_with_trace(defect.clone(), trace.clone()))
    }

    fn on_interrupt(&mut self, fiber_id: &FiberId, trace: &Trace) -> Self::Output {
        Some(Cause::interrupt_with_trace(fiber_id.clone(), trace.clone()))
    }

    fn on_then(&mut self, left: Self::Output, right: Self::Output) -> Self::Output {
        match (left, right) {
            (Some(l), Some(r)) => Some(Cause::sequential(l, r)),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        }
    }

    fn on_both(&mut self, left: Self::Output, right: Self::Output) -> Self::Output {
        match (left, right) {
            (Some(l), Some(r)) => Some(Cause::parallel(l, r)),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        }
    }

    fn on_marked(&mut self, inner: Self::Output, stackless: bool) -> Self::Output {
        inner.map(|cause| {
            if stackless {
                Cause::mark_stackless(cause)
            } else {
                Cause::mark(cause)
            }
        })
    }
}
