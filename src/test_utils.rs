//! Test utilities for the Cause algebra.
//!
//! Shared helpers for unit tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - A lock for tests that touch the global [`TraceConfig`]
//! - Equivalence and hash assertion macros
//!
//! # Example
//! ```rust,ignore
//! use asupersync_cause::test_utils::init_test_logging;
//! use asupersync_cause::Cause;
//!
//! init_test_logging();
//! let a: Cause<&str> = Cause::fail("a") & Cause::fail("b");
//! let b: Cause<&str> = Cause::fail("b") & Cause::fail("a");
//! asupersync_cause::assert_equivalent!(a, b);
//! ```
//!
//! [`TraceConfig`]: crate::TraceConfig

use std::sync::Once;
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();
static GLOBAL_CONFIG_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Serializes tests that read or replace the global trace configuration.
pub fn global_config_lock() -> parking_lot::MutexGuard<'static, ()> {
    GLOBAL_CONFIG_LOCK.lock()
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

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// Assert that two causes are equivalent and hash identically.
#[macro_export]
macro_rules! assert_equivalent {
    ($left:expr, $right:expr) => {{
        let (left, right) = (&$left, &$right);
        tracing::debug!(left = ?left, right = ?right, "Asserting equivalence");
        assert!(
            left.equivalent(right),
            "expected equivalent causes:\n  left: {:?}\n right: {:?}",
            left,
            right
        );
        assert_eq!(
            left.canonical_hash(),
            right.canonical_hash(),
            "equivalent causes must hash equal:\n  left: {:?}\n right: {:?}",
            left,
            right
        );
    }};
}

/// Assert that two causes are not equivalent.
#[macro_export]
macro_rules! assert_not_equivalent {
    ($left:expr, $right:expr) => {{
        let (left, right) = (&$left, &$right);
        tracing::debug!(left = ?left, right = ?right, "Asserting non-equivalence");
        assert!(
            !left.equivalent(right),
            "expected distinct causes:\n  left: {:?}\n right: {:?}",
            left,
            right
        );
    }};
}
