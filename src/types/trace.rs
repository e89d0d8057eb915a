//! Captured trace metadata carried by cause leaves.
//!
//! A [`Trace`] is an ordered list of source locations. It exists for
//! rendering and diagnostics only: the Cause algebra never compares or
//! hashes traces, and only asks whether a trace is [`Trace::none`].

use crate::config::TraceConfig;
use core::fmt;
use std::ops::Add;
use std::panic::Location;
use std::sync::Arc;

/// A single captured source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceFrame {
    /// Source file.
    pub file: &'static str,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

impl TraceFrame {
    /// Creates a frame from a caller location.
    #[must_use]
    pub fn from_location(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Trace metadata: an immutable, shared list of frames, oldest first.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Trace {
    frames: Option<Arc<[TraceFrame]>>,
}

impl Trace {
    /// The distinguished empty trace.
    #[must_use]
    pub const fn none() -> Self {
        Self { frames: None }
    }

    /// Captures the caller's location, honouring the global [`TraceConfig`].
    #[track_caller]
    #[must_use]
    pub fn capture() -> Self {
        Self::capture_with(&TraceConfig::global())
    }

    /// Captures the caller's location under an explicit configuration.
    #[track_caller]
    #[must_use]
    pub fn capture_with(config: &TraceConfig) -> Self {
        if !config.enabled {
            return Self::none();
        }
        Self::from_frames(vec![TraceFrame::from_location(Location::caller())])
    }

    /// Builds a trace from frames, oldest first.
    #[must_use]
    pub fn from_frames(frames: Vec<TraceFrame>) -> Self {
        if frames.is_empty() {
            Self::none()
        } else {
            Self {
                frames: Some(frames.into()),
            }
        }
    }

    /// Returns true for [`Trace::none`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.frames.is_none()
    }

    /// Returns the captured frames, oldest first.
    #[must_use]
    pub fn frames(&self) -> &[TraceFrame] {
        self.frames.as_deref().unwrap_or(&[])
    }

    /// Returns the number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames().len()
    }

    /// Returns true if the trace holds no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_none()
    }

    /// Appends `other` after `self`, bounded by the global frame limit.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        self.combine_with(other, &TraceConfig::global())
    }

    /// Appends `other` after `self`, keeping the most recent
    /// `config.max_frames` frames.
    #[must_use]
    pub fn combine_with(&self, other: &Self, config: &TraceConfig) -> Self {
        match (&self.frames, &other.frames) {
            (None, _) => other.truncated(config.max_frames),
            (_, None) => self.truncated(config.max_frames),
            (Some(left), Some(right)) => {
                let total = left.len() + right.len();
                let skip = total.saturating_sub(config.max_frames);
                let frames: Vec<TraceFrame> = left
                    .iter()
                    .chain(right.iter())
                    .skip(skip)
                    .copied()
                    .collect();
                Self::from_frames(frames)
            }
        }
    }

    fn truncated(&self, max_frames: usize) -> Self {
        let frames = self.frames();
        if frames.len() <= max_frames {
            return self.clone();
        }
        Self::from_frames(frames[frames.len() - max_frames..].to_vec())
    }
}

impl Add for Trace {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.combine(&rhs)
    }
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.frames {
            None => write!(f, "Trace(none)"),
            Some(frames) => f.debug_list().entries(frames.iter()).finish(),
        }
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in self.frames() {
            writeln!(f, "    at {frame}")?;
        }
        Ok(())
    }
}
