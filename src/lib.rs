//! Asupersync Cause: the failure-composition algebra of the Asupersync fiber runtime.
//!
//! # Overview
//!
//! A [`Cause`] records *why* a concurrent computation did not produce a
//! value. Leaves say what went wrong:
//!
//! - `Fail(E)`: an expected, typed application error
//! - `Die(Defect)`: an unexpected, untyped defect
//! - `Interrupt(FiberId)`: cooperative cancellation by the named fiber
//!
//! Inner nodes say how failures relate in time:
//!
//! - `Then(a, b)`: `a` happened, then `b` happened (finalizer after failure)
//! - `Both(a, b)`: `a` and `b` happened concurrently (joined fibers)
//! - `Marked(c, stackless)`: a rendering hint that never changes meaning
//!
//! # Core Guarantees
//!
//! - **Law-based equality**: `==` is equivalence under identity, associativity,
//!   commutativity of `Both` and distributivity of `Then` over `Both`
//! - **Consistent hashing**: equivalent causes hash identically, via a
//!   canonical sequence of parallel batches
//! - **Stack safety**: every traversal, including drop, is iterative or
//!   trampolined and works on arbitrarily deep trees
//! - **Persistence**: causes are immutable and structurally shared; cloning is
//!   a reference-count bump
//!
//! # Module Structure
//!
//! - [`cause`]: the `Cause` type, constructors, queries, equivalence, canonical form, folds
//! - [`types`]: collaborator values (`FiberId`, `Trace`, `Defect`)
//! - [`util`]: trampoline and deterministic hashing
//! - [`config`]: trace capture configuration
//! - [`error`]: error types
//! - [`tracing_compat`]: structured logging shim

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod cause;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;
pub mod tracing_compat;
pub mod types;
pub mod util;

pub use cause::{Batch, Cause, CauseFold, CauseTag, CauseView, FlattenedCause};
pub use config::TraceConfig;
pub use error::{CauseError, ConfigError};
pub use types::{Defect, FiberId, Trace, TraceFrame};
pub use util::Trampoline;
