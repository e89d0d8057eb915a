//! Collaborator value types carried by cause leaves.
//!
//! - [`id`]: fiber identity (`FiberId`)
//! - [`trace`]: captured source locations (`Trace`, `TraceFrame`)
//! - [`defect`]: untyped defect payloads (`Defect`)

pub mod defect;
pub mod id;
pub mod trace;

pub use defect::Defect;
pub use id::FiberId;
pub use trace::{Trace, TraceFrame};
