//! Wait Mechanisms
//!
//! Bounded polling of a predicate until it holds or a timeout elapses.
//!
//! The waiter never treats a timeout as an error: it reports the outcome in
//! a [`WaitResult`] and lets the caller decide. Only errors raised by the
//! predicate itself propagate.
//!
//! A process-wide default timeout (initially zero: one immediate check, no
//! polling) is read at call time by every waiter that is not given an
//! explicit timeout.

use crate::result::PrismResult;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for displayed checks (0: a single check)
pub const DEFAULT_WAIT_TIME_MS: u64 = 0;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

static DEFAULT_WAIT_TIME: AtomicU64 = AtomicU64::new(DEFAULT_WAIT_TIME_MS);
static DEFAULT_POLL_INTERVAL: AtomicU64 = AtomicU64::new(DEFAULT_POLL_INTERVAL_MS);

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    #[serde(default)]
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: Waiter::default_wait_time().as_millis() as u64,
            poll_interval_ms: Waiter::default_poll_interval().as_millis() as u64,
        }
    }
}

impl WaitOptions {
    /// Create wait options from the current process-wide defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Result of a wait operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitResult {
    /// Whether the predicate held before the timeout
    pub success: bool,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of predicate evaluations
    pub attempts: u32,
}

impl WaitResult {
    /// Create a successful wait result
    #[must_use]
    pub const fn success(elapsed: Duration, attempts: u32) -> Self {
        Self {
            success: true,
            elapsed,
            attempts,
        }
    }

    /// Create a timeout wait result
    #[must_use]
    pub const fn timeout(elapsed: Duration, attempts: u32) -> Self {
        Self {
            success: false,
            elapsed,
            attempts,
        }
    }
}

// =============================================================================
// WAITER IMPLEMENTATION
// =============================================================================

/// Polls a predicate on a fixed interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waiter {
    options: WaitOptions,
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Waiter {
    /// Waiter using the process-wide default timeout and poll interval
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: WaitOptions::default(),
        }
    }

    /// Waiter with explicit options
    #[must_use]
    pub const fn with_options(options: WaitOptions) -> Self {
        Self { options }
    }

    /// Waiter with an explicit timeout and the default poll interval
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_options(WaitOptions::new().with_timeout(timeout.as_millis() as u64))
    }

    /// Options in effect
    #[must_use]
    pub const fn options(&self) -> &WaitOptions {
        &self.options
    }

    /// Process-wide default timeout
    #[must_use]
    pub fn default_wait_time() -> Duration {
        Duration::from_millis(DEFAULT_WAIT_TIME.load(Ordering::Relaxed))
    }

    /// Replace the process-wide default timeout
    pub fn set_default_wait_time(wait_time: Duration) {
        DEFAULT_WAIT_TIME.store(wait_time.as_millis() as u64, Ordering::Relaxed);
    }

    /// Process-wide default poll interval
    #[must_use]
    pub fn default_poll_interval() -> Duration {
        Duration::from_millis(DEFAULT_POLL_INTERVAL.load(Ordering::Relaxed))
    }

    /// Replace the process-wide default poll interval
    pub fn set_default_poll_interval(interval: Duration) {
        DEFAULT_POLL_INTERVAL.store(interval.as_millis() as u64, Ordering::Relaxed);
    }

    /// Evaluate `predicate` until it returns true or the timeout elapses.
    ///
    /// The predicate is always evaluated at least once, so a zero timeout is
    /// a single check. Timing out is reported through
    /// [`WaitResult::success`], not as an error.
    ///
    /// # Errors
    /// Propagates the first error returned by `predicate`.
    pub fn wait_until_true<F>(&self, mut predicate: F) -> PrismResult<WaitResult>
    where
        F: FnMut() -> PrismResult<bool>,
    {
        let start = Instant::now();
        let timeout = self.options.timeout();
        let poll_interval = self.options.poll_interval();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if predicate()? {
                return Ok(WaitResult::success(start.elapsed(), attempts));
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                tracing::trace!(attempts, ?timeout, "wait timed out");
                return Ok(WaitResult::timeout(elapsed, attempts));
            }
            std::thread::sleep(poll_interval.min(timeout - elapsed));
        }
    }
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// Poll `predicate` for up to `timeout` with the default poll interval
///
/// # Errors
/// Propagates the first error returned by `predicate`.
pub fn wait_until_true<F>(timeout: Duration, predicate: F) -> PrismResult<WaitResult>
where
    F: FnMut() -> PrismResult<bool>,
{
    Waiter::with_timeout(timeout).wait_until_true(predicate)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::result::PrismError;
    use std::cell::Cell;

    mod wait_options_tests {
        use super::*;

        #[test]
        fn test_wait_options_builders() {
            let options = WaitOptions::new().with_timeout(5000).with_poll_interval(100);
            assert_eq!(options.timeout(), Duration::from_secs(5));
            assert_eq!(options.poll_interval(), Duration::from_millis(100));
        }

        #[test]
        fn test_wait_options_from_yaml_defaults_poll_interval() {
            let options: WaitOptions = serde_yaml_ng::from_str("timeout_ms: 250").unwrap();
            assert_eq!(options.timeout_ms, 250);
            assert_eq!(options.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        }
    }

    mod wait_result_tests {
        use super::*;

        #[test]
        fn test_wait_result_success() {
            let result = WaitResult::success(Duration::from_millis(100), 3);
            assert!(result.success);
            assert_eq!(result.attempts, 3);
        }

        #[test]
        fn test_wait_result_timeout() {
            let result = WaitResult::timeout(Duration::from_secs(1), 20);
            assert!(!result.success);
            assert_eq!(result.elapsed, Duration::from_secs(1));
        }
    }

    mod waiter_tests {
        use super::*;

        #[test]
        fn test_immediate_success() {
            let waiter = Waiter::with_options(WaitOptions::new().with_timeout(100));
            let result = waiter.wait_until_true(|| Ok(true)).unwrap();
            assert!(result.success);
            assert_eq!(result.attempts, 1);
        }

        #[test]
        fn test_zero_timeout_checks_once() {
            let waiter = Waiter::with_options(WaitOptions::new().with_timeout(0));
            let calls = Cell::new(0);
            let result = waiter
                .wait_until_true(|| {
                    calls.set(calls.get() + 1);
                    Ok(false)
                })
                .unwrap();
            assert!(!result.success);
            assert_eq!(calls.get(), 1);
        }

        #[test]
        fn test_timeout_is_not_an_error() {
            let waiter =
                Waiter::with_options(WaitOptions::new().with_timeout(100).with_poll_interval(10));
            let result = waiter.wait_until_true(|| Ok(false)).unwrap();
            assert!(!result.success);
            assert!(result.elapsed >= Duration::from_millis(100));
            assert!(result.attempts > 1);
        }

        #[test]
        fn test_eventually_true() {
            let waiter =
                Waiter::with_options(WaitOptions::new().with_timeout(2000).with_poll_interval(5));
            let calls = Cell::new(0);
            let result = waiter
                .wait_until_true(|| {
                    calls.set(calls.get() + 1);
                    Ok(calls.get() >= 3)
                })
                .unwrap();
            assert!(result.success);
            assert_eq!(result.attempts, 3);
        }

        #[test]
        fn test_predicate_errors_propagate() {
            let waiter =
                Waiter::with_options(WaitOptions::new().with_timeout(1000).with_poll_interval(5));
            let result = waiter.wait_until_true(|| Err(PrismError::driver("gone")));
            assert!(matches!(result, Err(PrismError::Driver { .. })));
        }

        #[test]
        fn test_convenience_function() {
            let result = wait_until_true(Duration::from_millis(50), || Ok(true)).unwrap();
            assert!(result.success);
        }
    }
}
