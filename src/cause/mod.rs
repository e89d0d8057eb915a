//! The failure-composition algebra.
//!
//! A [`Cause`] is a persistent tree describing why a computation failed.
//! Leaves carry the failure itself (`Fail`, `Die`, `Interrupt`); inner nodes
//! say whether failures happened one after another (`Then`) or concurrently
//! (`Both`). `Marked` is a rendering hint and never changes meaning.
//!
//! Equality is law-based: two causes are equal when the algebra's laws
//! (identity, associativity, commutativity of `Both`, distributivity of
//! `Then` over `Both`) relate them. Hashing goes through a canonical form so
//! that equal causes always hash identically.
//!
//! # Stack safety
//!
//! Retry loops and wide fan-outs produce deep, skewed trees. Every traversal
//! in this module uses an explicit work stack or the [`Trampoline`], and
//! dropping a cause tears uniquely-owned nodes down iteratively.
//!
//! [`Trampoline`]: crate::util::Trampoline

mod canonical;
mod equivalence;
mod fold;

pub use canonical::{Batch, FlattenedCause};
pub use fold::CauseFold;

use crate::error::bug;
use crate::types::{Defect, FiberId, Trace};
use core::fmt;
use std::ops::{Add, BitAnd};
use std::sync::Arc;

/// A failure-composition tree over application errors of type `E`.
///
/// Cloning is cheap: subtrees are reference-counted and shared.
pub struct Cause<E> {
    // `None` is `Empty`, which keeps the identity element allocation-free.
    node: Option<Arc<Node<E>>>,
}

enum Node<E> {
    Fail { error: E, trace: Trace },
    Die { defect: Defect, trace: Trace },
    Interrupt { fiber_id: FiberId, trace: Trace },
    Then { left: Cause<E>, right: Cause<E> },
    Both { left: Cause<E>, right: Cause<E> },
    Marked { cause: Cause<E>, stackless: bool },
}

impl<E> Node<E> {
    fn detach_children(&mut self, pending: &mut Vec<Arc<Self>>) {
        match self {
            Self::Then { left, right } | Self::Both { left, right } => {
                pending.extend(left.node.take());
                pending.extend(right.node.take());
            }
            Self::Marked { cause, .. } => pending.extend(cause.node.take()),
            Self::Fail { .. } | Self::Die { .. } | Self::Interrupt { .. } => {}
        }
    }
}

impl<E> Drop for Node<E> {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach_children(&mut pending);
        while let Some(node) = pending.pop() {
            // Shared subtrees stay alive; only uniquely-owned ones are torn down here.
            if let Some(mut owned) = Arc::into_inner(node) {
                owned.detach_children(&mut pending);
            }
        }
    }
}

/// A borrowed view of the root of a cause.
#[derive(Debug)]
pub enum CauseView<'a, E> {
    /// No failure occurred.
    Empty,
    /// An expected, typed error.
    Fail(&'a E, &'a Trace),
    /// An unexpected, untyped defect.
    Die(&'a Defect, &'a Trace),
    /// Cooperative cancellation by the named fiber.
    Interrupt(&'a FiberId, &'a Trace),
    /// `left` happened, then `right` happened.
    Then(&'a Cause<E>, &'a Cause<E>),
    /// `left` and `right` happened concurrently.
    Both(&'a Cause<E>, &'a Cause<E>),
    /// A rendering hint around a cause.
    Marked(&'a Cause<E>, bool),
}

/// The variant tag of a cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CauseTag {
    /// `Empty`.
    Empty,
    /// `Fail`.
    Fail,
    /// `Die`.
    Die,
    /// `Interrupt`.
    Interrupt,
    /// `Then`.
    Then,
    /// `Both`.
    Both,
    /// `Marked`.
    Marked,
}

impl CauseTag {
    /// Returns true for the leaf tags `Fail`, `Die` and `Interrupt`.
    #[must_use]
    pub const fn is_leaf(self) -> bool {
        matches!(self, Self::Fail | Self::Die | Self::Interrupt)
    }
}

impl fmt::Display for CauseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Fail => write!(f, "fail"),
            Self::Die => write!(f, "die"),
            Self::Interrupt => write!(f, "interrupt"),
            Self::Then => write!(f, "then"),
            Self::Both => write!(f, "both"),
            Self::Marked => write!(f, "marked"),
        }
    }
}

// =============================================================================
// Constructors
// =============================================================================

impl<E> Cause<E> {
    fn from_node(node: Node<E>) -> Self {
        Self {
            node: Some(Arc::new(node)),
        }
    }

    /// The cause of a computation that did not fail.
    #[must_use]
    pub const fn empty() -> Self {
        Self { node: None }
    }

    /// An expected, typed error with no trace.
    #[must_use]
    pub fn fail(error: E) -> Self {
        Self::fail_with_trace(error, Trace::none())
    }

    /// An expected, typed error.
    #[must_use]
    pub fn fail_with_trace(error: E, trace: Trace) -> Self {
        Self::from_node(Node::Fail { error, trace })
    }

    /// An unexpected defect with no trace.
    #[must_use]
    pub fn die(defect: impl Into<Defect>) -> Self {
        Self::die_with_trace(defect, Trace::none())
    }

    /// An unexpected defect.
    #[must_use]
    pub fn die_with_trace(defect: impl Into<Defect>, trace: Trace) -> Self {
        Self::from_node(Node::Die {
            defect: defect.into(),
            trace,
        })
    }

    /// Interruption by `fiber_id` with no trace.
    #[must_use]
    pub fn interrupt(fiber_id: FiberId) -> Self {
        Self::interrupt_with_trace(fiber_id, Trace::none())
    }

    /// Interruption by `fiber_id`.
    #[must_use]
    pub fn interrupt_with_trace(fiber_id: FiberId, trace: Trace) -> Self {
        Self::from_node(Node::Interrupt { fiber_id, trace })
    }

    /// Wraps `cause` in a rendering hint that keeps stack traces.
    #[must_use]
    pub fn mark(cause: Self) -> Self {
        Self::from_node(Node::Marked {
            cause,
            stackless: false,
        })
    }

    /// Wraps `cause` in a rendering hint that suppresses stack traces.
    #[must_use]
    pub fn mark_stackless(cause: Self) -> Self {
        Self::from_node(Node::Marked {
            cause,
            stackless: true,
        })
    }

    /// Sequential composition: `left` happened, then `right`.
    ///
    /// `Empty` on either side is absorbed and the other operand returned.
    #[must_use]
    pub fn then(left: Self, right: Self) -> Self {
        if left.is_empty_type() {
            right
        } else if right.is_empty_type() {
            left
        } else {
            Self::sequential(left, right)
        }
    }

    /// Parallel composition: `left` and `right` happened concurrently.
    ///
    /// `Empty` on either side is absorbed and the other operand returned.
    #[must_use]
    pub fn both(left: Self, right: Self) -> Self {
        if left.is_empty_type() {
            right
        } else if right.is_empty_type() {
            left
        } else {
            Self::parallel(left, right)
        }
    }

    /// Builds a `Then` node as-is, without absorbing `Empty`.
    #[must_use]
    pub fn sequential(left: Self, right: Self) -> Self {
        Self::from_node(Node::Then { left, right })
    }

    /// Builds a `Both` node as-is, without absorbing `Empty`.
    #[must_use]
    pub fn parallel(left: Self, right: Self) -> Self {
        Self::from_node(Node::Both { left, right })
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Returns a borrowed view of the root node.
    #[must_use]
    pub fn view(&self) -> CauseView<'_, E> {
        let Some(node) = self.node.as_deref() else {
            return CauseView::Empty;
        };
        match node {
            Node::Fail { error, trace } => CauseView::Fail(error, trace),
            Node::Die { defect, trace } => CauseView::Die(defect, trace),
            Node::Interrupt { fiber_id, trace } => CauseView::Interrupt(fiber_id, trace),
            Node::Then { left, right } => CauseView::Then(left, right),
            Node::Both { left, right } => CauseView::Both(left, right),
            Node::Marked { cause, stackless } => CauseView::Marked(cause, *stackless),
        }
    }

    /// Returns the variant tag of the root node.
    #[must_use]
    pub fn tag(&self) -> CauseTag {
        match self.view() {
            CauseView::Empty => CauseTag::Empty,
            CauseView::Fail(..) => CauseTag::Fail,
            CauseView::Die(..) => CauseTag::Die,
            CauseView::Interrupt(..) => CauseTag::Interrupt,
            CauseView::Then(..) => CauseTag::Then,
            CauseView::Both(..) => CauseTag::Both,
            CauseView::Marked(..) => CauseTag::Marked,
        }
    }

    /// Strips every `Marked` wrapper at the root.
    #[must_use]
    pub fn unmarked(&self) -> &Self {
        let mut current = self;
        while let CauseView::Marked(inner, _) = current.view() {
            current = inner;
        }
        current
    }

    /// Returns true if the root is a stackless `Marked` node.
    #[must_use]
    pub fn is_stackless(&self) -> bool {
        matches!(self.view(), CauseView::Marked(_, true))
    }

    /// Returns true if both handles share the same root node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.node, &other.node) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    // Identity of the root allocation; null for `Empty`.
    fn node_ptr(&self) -> *const () {
        self.node
            .as_ref()
            .map_or(std::ptr::null(), |node| Arc::as_ptr(node).cast())
    }

    /// Returns true if the root is `Empty`.
    #[must_use]
    pub const fn is_empty_type(&self) -> bool {
        self.node.is_none()
    }

    /// Returns true if the root is `Fail`.
    #[must_use]
    pub fn is_fail_type(&self) -> bool {
        self.tag() == CauseTag::Fail
    }

    /// Returns true if the root is `Die`.
    #[must_use]
    pub fn is_die_type(&self) -> bool {
        self.tag() == CauseTag::Die
    }

    /// Returns true if the root is `Interrupt`.
    #[must_use]
    pub fn is_interrupt_type(&self) -> bool {
        self.tag() == CauseTag::Interrupt
    }

    /// Returns true if the root is `Then`.
    #[must_use]
    pub fn is_then_type(&self) -> bool {
        self.tag() == CauseTag::Then
    }

    /// Returns true if the root is `Both`.
    #[must_use]
    pub fn is_both_type(&self) -> bool {
        self.tag() == CauseTag::Both
    }

    /// Returns true if the root is `Marked`.
    #[must_use]
    pub fn is_marked_type(&self) -> bool {
        self.tag() == CauseTag::Marked
    }

    // =========================================================================
    // Structural queries
    // =========================================================================

    /// Returns true if the cause denotes no failure at all.
    ///
    /// `Both(Empty, Empty)` and `Marked(Empty)` are empty; any tree holding a
    /// `Fail`, `Die` or `Interrupt` leaf is not.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let mut stack: Vec<&Self> = Vec::new();
        let mut current = self;
        loop {
            match current.view() {
                CauseView::Fail(..) | CauseView::Die(..) | CauseView::Interrupt(..) => {
                    return false;
                }
                CauseView::Then(left, right) | CauseView::Both(left, right) => {
                    stack.push(right);
                    current = left;
                }
                CauseView::Marked(inner, _) => current = inner,
                CauseView::Empty => match stack.pop() {
                    Some(next) => current = next,
                    None => return true,
                },
            }
        }
    }

    /// Returns true if the cause holds at least one `Fail` leaf.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.failure_option().is_some()
    }

    /// Returns true if the cause holds at least one `Die` leaf.
    #[must_use]
    pub fn is_die(&self) -> bool {
        self.die_option().is_some()
    }

    /// Returns true if the cause holds at least one `Interrupt` leaf.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.find(|cause| match cause.view() {
            CauseView::Interrupt(..) => Some(()),
            _ => None,
        })
        .is_some()
    }

    /// Returns true if every leaf is an `Interrupt` and there is at least one.
    #[must_use]
    pub fn is_interrupted_only(&self) -> bool {
        let other_leaf = self.find(|cause| match cause.view() {
            CauseView::Fail(..) | CauseView::Die(..) => Some(()),
            _ => None,
        });
        other_leaf.is_none() && self.is_interrupted()
    }

    /// Returns true if some leaf carries a trace other than [`Trace::none`].
    #[must_use]
    pub fn is_traced(&self) -> bool {
        self.find(|cause| match cause.view() {
            CauseView::Fail(_, trace)
            | CauseView::Die(_, trace)
            | CauseView::Interrupt(_, trace)
                if !trace.is_none() =>
            {
                Some(())
            }
            _ => None,
        })
        .is_some()
    }

    /// Returns the first typed error, left to right.
    #[must_use]
    pub fn failure_option(&self) -> Option<&E> {
        self.find(|cause| match cause.view() {
            CauseView::Fail(error, _) => Some(error),
            _ => None,
        })
    }

    /// Returns the first defect, left to right.
    #[must_use]
    pub fn die_option(&self) -> Option<&Defect> {
        self.find(|cause| match cause.view() {
            CauseView::Die(defect, _) => Some(defect),
            _ => None,
        })
    }

    /// Returns the number of nodes in the tree, `Empty` nodes included.
    #[must_use]
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            count += 1;
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
        count
    }

    // =========================================================================
    // Normalisation
    // =========================================================================

    /// Removes every semantically empty subtree.
    ///
    /// Composites are rebuilt through the absorbing constructors and
    /// `Marked(Empty)` collapses to `Empty`. Subtrees without anything to
    /// remove are shared with `self` rather than copied.
    pub(crate) fn prune_empty(&self) -> Self {
        enum Frame<'a, E> {
            Visit(&'a Cause<E>),
            Rebuild(&'a Cause<E>),
        }

        let mut frames = vec![Frame::Visit(self)];
        let mut results: Vec<Self> = Vec::new();

        while let Some(frame) = frames.pop() {
            match frame {
                Frame::Visit(cause) => match cause.view() {
                    CauseView::Then(left, right) | CauseView::Both(left, right) => {
                        frames.push(Frame::Rebuild(cause));
                        frames.push(Frame::Visit(right));
                        frames.push(Frame::Visit(left));
                    }
                    CauseView::Marked(inner, _) => {
                        frames.push(Frame::Rebuild(cause));
                        frames.push(Frame::Visit(inner));
                    }
                    CauseView::Empty
                    | CauseView::Fail(..)
                    | CauseView::Die(..)
                    | CauseView::Interrupt(..) => results.push(cause.clone()),
                },
                Frame::Rebuild(cause) => {
                    let rebuilt = match cause.view() {
                        CauseView::Then(left, right) => {
                            let (l, r) = pop_pruned_pair(&mut results);
                            if shares_operands(&l, &r, left, right) {
                                cause.clone()
                            } else {
                                Self::then(l, r)
                            }
                        }
                        CauseView::Both(left, right) => {
                            let (l, r) = pop_pruned_pair(&mut results);
                            if shares_operands(&l, &r, left, right) {
                                cause.clone()
                            } else {
                                Self::both(l, r)
                            }
                        }
                        CauseView::Marked(inner, stackless) => {
                            let pruned = results
                                .pop()
                                .unwrap_or_else(|| bug("prune result stack underflow"));
                            if pruned.is_empty_type() {
                                pruned
                            } else if pruned.ptr_eq(inner) {
                                cause.clone()
                            } else if stackless {
                                Self::mark_stackless(pruned)
                            } else {
                                Self::mark(pruned)
                            }
                        }
                        CauseView::Empty
                        | CauseView::Fail(..)
                        | CauseView::Die(..)
                        | CauseView::Interrupt(..) => bug("leaf scheduled for rebuild"),
                    };
                    results.push(rebuilt);
                }
            }
        }

        results
            .pop()
            .unwrap_or_else(|| bug("prune result stack underflow"))
    }
}

fn pop_pruned_pair<E>(results: &mut Vec<Cause<E>>) -> (Cause<E>, Cause<E>) {
    match (results.pop(), results.pop()) {
        (Some(right), Some(left)) => (left, right),
        _ => bug("prune result stack underflow"),
    }
}

// A composite can be kept as is when pruning left both operands untouched
// and neither of them is `Empty`.
fn shares_operands<E>(l: &Cause<E>, r: &Cause<E>, left: &Cause<E>, right: &Cause<E>) -> bool {
    !l.is_empty_type() && !r.is_empty_type() && l.ptr_eq(left) && r.ptr_eq(right)
}

impl<E> Clone for Cause<E> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<E> Default for Cause<E> {
    fn default() -> Self {
        Self::empty()
    }
}

/// `a + b` is [`Cause::then`].
impl<E> Add for Cause<E> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::then(self, rhs)
    }
}

/// `a & b` is [`Cause::both`].
impl<E> BitAnd for Cause<E> {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::both(self, rhs)
    }
}

impl<E: fmt::Debug> fmt::Debug for Cause<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.view() {
            CauseView::Empty => f.write_str("Empty"),
            CauseView::Fail(error, _) => f.debug_tuple("Fail").field(error).finish(),
            CauseView::Die(defect, _) => f.debug_tuple("Die").field(defect).finish(),
            CauseView::Interrupt(fiber_id, _) => {
                f.debug_tuple("Interrupt").field(fiber_id).finish()
            }
            CauseView::Then(left, right) => f.debug_tuple("Then").field(left).field(right).finish(),
            CauseView::Both(left, right) => f.debug_tuple("Both").field(left).field(right).finish(),
            CauseView::Marked(inner, stackless) => f
                .debug_struct("Marked")
                .field("cause", inner)
                .field("stackless", &stackless)
                .finish(),
        }
    }
}
