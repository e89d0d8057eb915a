#![allow(dead_code)]
#![allow(unused_imports)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

use asupersync_cause::{Cause, CauseFold, CauseView, Defect, FiberId, Trace};
use proptest::prelude::*;
use proptest::test_runner::RngSeed;

#[cfg(feature = "test-internals")]
pub use asupersync_cause::test_utils::{init_test_logging, init_test_logging_with_level};
#[cfg(not(feature = "test-internals"))]
pub use logging::{init_test_logging, init_test_logging_with_level};

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED_5EED;

const PROPTEST_SEED_ENV: &str = "ASUPERSYNC_PROPTEST_SEED";
const PROPTEST_MAX_SHRINK_ITERS_ENV: &str = "ASUPERSYNC_PROPTEST_MAX_SHRINK_ITERS";

/// Configuration for property tests with optional deterministic seed support.
#[derive(Debug, Clone)]
pub struct PropertyTestConfig {
    /// Fixed seed for reproducibility (overrides CI default when set).
    pub seed: Option<u64>,
    /// Number of successful cases required.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl PropertyTestConfig {
    /// Build a config with defaults for property tests.
    #[must_use]
    pub fn new(cases: u32) -> Self {
        Self {
            seed: read_proptest_seed(),
            cases,
            max_shrink_iters: read_max_shrink_iters()
                .unwrap_or(ProptestConfig::default().max_shrink_iters),
        }
    }

    /// Convert into a ProptestConfig, applying deterministic seed rules.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        let mut config = ProptestConfig::with_cases(self.cases);

        // Honor existing PROPTEST_RNG_SEED, otherwise apply our own.
        if matches!(config.rng_seed, RngSeed::Random) {
            if let Some(seed) = self.seed {
                config.rng_seed = RngSeed::Fixed(seed);
            }
        }

        config.max_shrink_iters = self.max_shrink_iters;
        config
    }
}

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    PropertyTestConfig::new(cases).to_proptest_config()
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }

    // If CI is set and no explicit seed is provided, use a fixed seed.
    if std::env::var("CI").is_ok() {
        return Some(DEFAULT_PROPTEST_SEED);
    }

    None
}

fn read_max_shrink_iters() -> Option<u32> {
    std::env::var(PROPTEST_MAX_SHRINK_ITERS_ENV)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
}

// Stand-in for `asupersync_cause::test_utils` when the crate is built
// without `test-internals`.
#[cfg(not(feature = "test-internals"))]
mod logging {
    use std::sync::Once;
    use tracing_subscriber::fmt::format::FmtSpan;

    static INIT_LOGGING: Once = Once::new();

    pub fn init_test_logging() {
        init_test_logging_with_level(tracing::Level::TRACE);
    }

    pub fn init_test_logging_with_level(level: tracing::Level) {
        INIT_LOGGING.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_test_writer()
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_ansi(false)
                .try_init();
        });
    }
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log test completion.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
}

// ============================================================================
// Cause strategies
// ============================================================================

/// Generate a leaf: a small typed error, a defect, or an interruption.
///
/// Payload ranges are small so generated trees share leaves often.
pub fn arb_leaf() -> impl Strategy<Value = Cause<u8>> {
    prop_oneof![
        4 => (0u8..6).prop_map(Cause::fail),
        1 => "[a-c]".prop_map(|message| Cause::die(message)),
        1 => (1u64..4).prop_map(|id| Cause::interrupt(FiberId::new_for_test(id))),
        1 => Just(Cause::empty()),
    ]
}

/// Generate a cause tree of bounded size.
///
/// Mixes the absorbing constructors with the raw builders so that `Empty`
/// also shows up as an operand.
pub fn arb_cause() -> impl Strategy<Value = Cause<u8>> {
    arb_leaf().prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Cause::then(a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Cause::both(a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Cause::sequential(a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Cause::parallel(a, b)),
            (inner, any::<bool>()).prop_map(|(c, stackless)| if stackless {
                Cause::mark_stackless(c)
            } else {
                Cause::mark(c)
            }),
        ]
    })
}

/// Generate a cause with no `Both` node and at least one leaf.
pub fn arb_sequential_cause() -> impl Strategy<Value = Cause<u8>> {
    prop::collection::vec(0u8..6, 1..8).prop_map(|errors| {
        errors
            .into_iter()
            .map(Cause::fail)
            .reduce(Cause::then)
            .unwrap_or_default()
    })
}

/// A law of the algebra, applied as a rewrite at one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Law {
    /// Leave the node as is.
    Keep,
    /// `c` to `Marked(c)`.
    Mark,
    /// `c` to `Then(Empty, c)`.
    ThenEmpty,
    /// `c` to `Both(c, Empty)`.
    BothEmpty,
    /// `Both(a, b)` to `Both(b, a)`.
    BothCommute,
    /// `Both(Both(a, b), c)` to `Both(a, Both(b, c))`.
    BothAssoc,
    /// `Then(Then(a, b), c)` to `Then(a, Then(b, c))`.
    ThenAssoc,
    /// `Then` over `Both`, on whichever side holds the `Both`.
    Distribute,
}

/// Generate a law.
pub fn arb_law() -> impl Strategy<Value = Law> {
    prop_oneof![
        Just(Law::Keep),
        Just(Law::Mark),
        Just(Law::ThenEmpty),
        Just(Law::BothEmpty),
        Just(Law::BothCommute),
        Just(Law::BothAssoc),
        Just(Law::ThenAssoc),
        Just(Law::Distribute),
    ]
}

/// Generate a cause together with a law-preserving rewrite of it.
pub fn arb_rewritten_pair() -> impl Strategy<Value = (Cause<u8>, Cause<u8>)> {
    (arb_cause(), prop::collection::vec(arb_law(), 1..16)).prop_map(|(cause, laws)| {
        let rewritten = rewrite(&cause, &laws);
        (cause, rewritten)
    })
}

/// Rewrites every node of `cause` with a law, cycling through `laws`.
///
/// The result is equivalent to `cause` by construction.
pub fn rewrite(cause: &Cause<u8>, laws: &[Law]) -> Cause<u8> {
    let mut cursor = 0;
    rewrite_with(cause, laws, &mut cursor)
}

fn next_law(laws: &[Law], cursor: &mut usize) -> Law {
    if laws.is_empty() {
        return Law::Keep;
    }
    let law = laws[*cursor % laws.len()];
    *cursor += 1;
    law
}

fn rewrite_with(cause: &Cause<u8>, laws: &[Law], cursor: &mut usize) -> Cause<u8> {
    let law = next_law(laws, cursor);
    match (law, cause.view()) {
        (Law::Mark, _) => Cause::mark(descend(cause, laws, cursor)),
        (Law::ThenEmpty, _) => Cause::sequential(Cause::empty(), descend(cause, laws, cursor)),
        (Law::BothEmpty, _) => Cause::parallel(descend(cause, laws, cursor), Cause::empty()),
        (Law::BothCommute, CauseView::Both(a, b)) => {
            let b = rewrite_with(b, laws, cursor);
            let a = rewrite_with(a, laws, cursor);
            Cause::parallel(b, a)
        }
        (Law::BothAssoc, CauseView::Both(ab, c)) => match ab.view() {
            CauseView::Both(a, b) => {
                let a = rewrite_with(a, laws, cursor);
                let b = rewrite_with(b, laws, cursor);
                let c = rewrite_with(c, laws, cursor);
                Cause::parallel(a, Cause::parallel(b, c))
            }
            _ => descend(cause, laws, cursor),
        },
        (Law::ThenAssoc, CauseView::Then(ab, c)) => match ab.view() {
            CauseView::Then(a, b) => {
                let a = rewrite_with(a, laws, cursor);
                let b = rewrite_with(b, laws, cursor);
                let c = rewrite_with(c, laws, cursor);
                Cause::sequential(a, Cause::sequential(b, c))
            }
            _ => descend(cause, laws, cursor),
        },
        // Only non-empty operands distribute: `Then(a, Both(Empty, c))` is
        // `Then(a, c)`, which has no path ending at `a`.
        (Law::Distribute, CauseView::Then(head, tail)) => match (head.view(), tail.view()) {
            (_, CauseView::Both(b, c)) if !b.is_empty() && !c.is_empty() => {
                let left = Cause::sequential(
                    rewrite_with(head, laws, cursor),
                    rewrite_with(b, laws, cursor),
                );
                let right = Cause::sequential(
                    rewrite_with(head, laws, cursor),
                    rewrite_with(c, laws, cursor),
                );
                Cause::parallel(left, right)
            }
            (CauseView::Both(a, b), _) if !a.is_empty() && !b.is_empty() => {
                let left = Cause::sequential(
                    rewrite_with(a, laws, cursor),
                    rewrite_with(tail, laws, cursor),
                );
                let right = Cause::sequential(
                    rewrite_with(b, laws, cursor),
                    rewrite_with(tail, laws, cursor),
                );
                Cause::parallel(left, right)
            }
            _ => descend(cause, laws, cursor),
        },
        _ => descend(cause, laws, cursor),
    }
}

fn descend(cause: &Cause<u8>, laws: &[Law], cursor: &mut usize) -> Cause<u8> {
    match cause.view() {
        CauseView::Then(a, b) => {
            let a = rewrite_with(a, laws, cursor);
            let b = rewrite_with(b, laws, cursor);
            Cause::sequential(a, b)
        }
        CauseView::Both(a, b) => {
            let a = rewrite_with(a, laws, cursor);
            let b = rewrite_with(b, laws, cursor);
            Cause::parallel(a, b)
        }
        CauseView::Marked(inner, stackless) => {
            let inner = rewrite_with(inner, laws, cursor);
            if stackless {
                Cause::mark_stackless(inner)
            } else {
                Cause::mark(inner)
            }
        }
        CauseView::Empty | CauseView::Fail(..) | CauseView::Die(..) | CauseView::Interrupt(..) => {
            cause.clone()
        }
    }
}

/// Counts `Fail`, `Die` and `Interrupt` leaves, duplicates included.
pub struct LeafCount;

impl<E> CauseFold<E> for LeafCount {
    type Output = usize;

    fn on_empty(&mut self) -> usize {
        0
    }

    fn on_fail(&mut self, _: &E, _: &Trace) -> usize {
        1
    }

    fn on_die(&mut self, _: &Defect, _: &Trace) -> usize {
        1
    }

    fn on_interrupt(&mut self, _: &FiberId, _: &Trace) -> usize {
        1
    }

    fn on_then(&mut self, left: usize, right: usize) -> usize {
        left + right
    }

    fn on_both(&mut self, left: usize, right: usize) -> usize {
        left + right
    }
}

// ============================================================================
// Deep tree builders
// ============================================================================

/// `Then(Then(Then(f0, f1), f2), ...)`.
pub fn left_then_chain(depth: u32) -> Cause<u32> {
    (0..depth).fold(Cause::empty(), |acc, i| Cause::then(acc, Cause::fail(i)))
}

/// `Then(f0, Then(f1, Then(f2, ...)))`.
pub fn right_then_chain(depth: u32) -> Cause<u32> {
    (0..depth)
        .rev()
        .fold(Cause::empty(), |acc, i| Cause::then(Cause::fail(i), acc))
}

/// `Both(Both(Both(f0, f1), f2), ...)`.
pub fn left_both_chain(depth: u32) -> Cause<u32> {
    (0..depth).fold(Cause::empty(), |acc, i| Cause::both(acc, Cause::fail(i)))
}

/// A chain alternating `Then`, `Both` and `Marked`, skewed to the left.
pub fn mixed_chain(depth: u32) -> Cause<u32> {
    (0..depth).fold(Cause::empty(), |acc, i| match i % 3 {
        0 => Cause::then(acc, Cause::fail(i)),
        1 => Cause::both(acc, Cause::die(format!("d{}", i % 7))),
        _ => Cause::mark(acc),
    })
}
