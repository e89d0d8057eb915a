//! Fiber identity.
//!
//! A [`FiberId`] names the fiber responsible for an interruption. The fiber
//! scheduler owns identity allocation; the Cause algebra only combines ids
//! and compares them by value.

use core::fmt;
use std::collections::BTreeSet;
use std::ops::Add;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

static EPHEMERAL_FIBER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of a fiber, or of a group of fibers acting together.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub enum FiberId {
    /// No fiber; the identity element of [`FiberId::combine`].
    #[default]
    None,
    /// A single runtime fiber.
    Runtime {
        /// Runtime-unique fiber number.
        id: u64,
        /// Wall-clock start time in milliseconds since the Unix epoch.
        started_at_millis: u64,
    },
    /// Two ids combined, e.g. when a parent interrupts on behalf of a child.
    Composite(Arc<FiberId>, Arc<FiberId>),
}

impl FiberId {
    /// Creates a runtime fiber id.
    #[must_use]
    pub const fn runtime(id: u64, started_at_millis: u64) -> Self {
        Self::Runtime {
            id,
            started_at_millis,
        }
    }

    /// Allocates a fresh id for fibers created outside the scheduler.
    #[must_use]
    pub fn new_ephemeral() -> Self {
        let id = EPHEMERAL_FIBER_COUNTER.fetch_add(1, Ordering::Relaxed);
        let started_at_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        Self::runtime(id, started_at_millis)
    }

    /// Creates an id for testing purposes with a zero start time.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(id: u64) -> Self {
        Self::runtime(id, 0)
    }

    /// Combines two ids. `None` is the identity on either side.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::None, _) => other.clone(),
            (_, Self::None) => self.clone(),
            _ => Self::Composite(Arc::new(self.clone()), Arc::new(other.clone())),
        }
    }

    /// Combines every id in `ids`, left to right.
    #[must_use]
    pub fn combine_all<'a, I>(ids: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        ids.into_iter()
            .fold(Self::None, |acc, id| acc.combine(id))
    }

    /// Returns true for [`FiberId::None`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the runtime fiber numbers contained in this id.
    #[must_use]
    pub fn ids(&self) -> BTreeSet<u64> {
        let mut out = BTreeSet::new();
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            match current {
                Self::None => {}
                Self::Runtime { id, .. } => {
                    out.insert(*id);
                }
                Self::Composite(left, right) => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        out
    }
}

impl Add for FiberId {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.combine(&rhs)
    }
}

impl fmt::Debug for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "FiberId(None)"),
            Self::Runtime {
                id,
                started_at_millis,
            } => write!(f, "FiberId({id}@{started_at_millis})"),
            Self::Composite(left, right) => write!(f, "FiberId({left:?} + {right:?})"),
        }
    }
}

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids = self.ids();
        if ids.is_empty() {
            return write!(f, "#none");
        }
        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                write!(f, "+")?;
            }
            write!(f, "#{id}")?;
        }
        Ok(())
    }
}
