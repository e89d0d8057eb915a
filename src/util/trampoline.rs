//! Stack-safe evaluation of chained computations.
//!
//! A [`Trampoline`] describes a computation as data: either a finished value,
//! a suspended thunk, or a computation followed by a continuation. [`run`]
//! reduces it in a loop that keeps pending continuations on a heap-allocated
//! list, so evaluation depth never grows the native call stack.
//!
//! The equivalence engine uses this to express its mutual recursion over
//! cause trees of arbitrary depth.
//!
//! [`run`]: Trampoline::run

use crate::tracing_compat::trace;
use core::fmt;

type Thunk<'a, A> = Box<dyn FnOnce() -> Trampoline<'a, A> + 'a>;
type Continuation<'a, A> = Box<dyn FnOnce(A) -> Trampoline<'a, A> + 'a>;

/// A suspended, stack-safe computation producing an `A`.
#[must_use = "a trampoline does nothing until `run` is called"]
pub enum Trampoline<'a, A> {
    /// A finished computation.
    Done(A),
    /// A computation deferred behind a thunk.
    Suspend(Thunk<'a, A>),
    /// A computation whose result feeds a continuation.
    AndThen(Box<Trampoline<'a, A>>, Continuation<'a, A>),
}

impl<'a, A: 'a> Trampoline<'a, A> {
    /// Wraps an already-computed value.
    pub const fn done(value: A) -> Self {
        Self::Done(value)
    }

    /// Defers a computation until the trampoline is run.
    pub fn suspend<F>(thunk: F) -> Self
    where
        F: FnOnce() -> Self + 'a,
    {
        Self::Suspend(Box::new(thunk))
    }

    /// Sequences `continuation` after this computation.
    pub fn and_then<F>(self, continuation: F) -> Self
    where
        F: FnOnce(A) -> Self + 'a,
    {
        Self::AndThen(Box::new(self), Box::new(continuation))
    }

    /// Transforms the result of this computation.
    pub fn map<F>(self, f: F) -> Self
    where
        F: FnOnce(A) -> A + 'a,
    {
        self.and_then(move |value| Self::Done(f(value)))
    }

    /// Returns true if this computation has already finished.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Evaluates the computation to completion.
    ///
    /// Continuations are applied innermost-first from an explicit list; no
    /// native recursion happens regardless of how deeply computations chain.
    pub fn run(self) -> A {
        let mut current = self;
        let mut continuations: Vec<Continuation<'a, A>> = Vec::new();
        let mut steps: u64 = 0;

        loop {
            steps += 1;
            current = match current {
                Self::Done(value) => match continuations.pop() {
                    Some(continuation) => continuation(value),
                    None => {
                        trace!(steps, "trampoline finished");
                        return value;
                    }
                },
                Self::Suspend(thunk) => thunk(),
                Self::AndThen(inner, continuation) => {
                    continuations.push(continuation);
                    *inner
                }
            };
        }
    }
}

impl<'a> Trampoline<'a, bool> {
    /// Conjunction of boolean computations, evaluated left to right.
    ///
    /// Stops at the first `false`; later computations are never forced.
    pub fn all<I>(computations: I) -> Self
    where
        I: IntoIterator<Item = Self>,
        I::IntoIter: 'a,
    {
        Self::short_circuit(computations.into_iter(), false)
    }

    /// Disjunction of boolean computations, evaluated left to right.
    ///
    /// Stops at the first `true`; later computations are never forced.
    pub fn any<I>(computations: I) -> Self
    where
        I: IntoIterator<Item = Self>,
        I::IntoIter: 'a,
    {
        Self::short_circuit(computations.into_iter(), true)
    }

    fn short_circuit<I>(mut computations: I, stop_on: bool) -> Self
    where
        I: Iterator<Item = Self> + 'a,
    {
        match computations.next() {
            None => Self::Done(!stop_on),
            Some(first) => first.and_then(move |value| {
                if value == stop_on {
                    Self::Done(stop_on)
                } else {
                    Self::short_circuit(computations, stop_on)
                }
            }),
        }
    }
}

impl<A: fmt::Debug> fmt::Debug for Trampoline<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done(value) => f.debug_tuple("Done").field(value).finish(),
            Self::Suspend(_) => f.write_str("Suspend(..)"),
            Self::AndThen(inner, _) => f.debug_tuple("AndThen").field(inner).finish(),
        }
    }
}
