/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Delays between retry attempts.
//!
//! Every strategy derives an exponential ceiling `min(2^retries * base_delay, max_backoff)` and
//! then picks a delay relative to it. `retries` is clamped to [`MAX_BACKOFF_RETRIES`] first so the
//! shift cannot overflow.

use std::time::Duration;

/// Retries beyond this count produce the same ceiling.
pub const MAX_BACKOFF_RETRIES: u32 = 30;

/// Base delay for errors that are not throttling errors.
pub const SDK_DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
/// Base delay for throttling errors.
pub const SDK_DEFAULT_THROTTLED_BASE_DELAY: Duration = Duration::from_millis(500);
/// Upper bound for every computed delay.
pub const SDK_DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(20);

/// How long to wait before the next retry.
///
/// Strategies hold immutable configuration only and are safe to share between threads.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// A uniformly random delay in `[1ms, ceiling]`.
    FullJitter {
        /// Delay before the first retry, before doubling
        base_delay: Duration,
        /// Cap on the exponential ceiling
        max_backoff: Duration,
    },
    /// Half of the ceiling, plus a uniformly random delay in `[0, ceiling / 2]`.
    EqualJitter {
        /// Delay before the first retry, before doubling
        base_delay: Duration,
        /// Cap on the exponential ceiling
        max_backoff: Duration,
    },
    /// Exactly the ceiling, with no jitter.
    Exponential {
        /// Delay before the first retry, before doubling
        base_delay: Duration,
        /// Cap on the exponential ceiling
        max_backoff: Duration,
    },
    /// Equal jitter with `throttled_base_delay` for throttling errors, full jitter with
    /// `base_delay` for everything else.
    SdkDefault {
        /// Base delay for errors that are not throttling errors
        base_delay: Duration,
        /// Base delay for throttling errors
        throttled_base_delay: Duration,
        /// Cap on the exponential ceiling
        max_backoff: Duration,
    },
    /// Retry immediately.
    NoDelay,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::sdk_default()
    }
}

impl BackoffStrategy {
    /// The default strategy: 100ms base, 500ms base for throttling errors, capped at 20s.
    pub fn sdk_default() -> Self {
        BackoffStrategy::SdkDefault {
            base_delay: SDK_DEFAULT_BASE_DELAY,
            throttled_base_delay: SDK_DEFAULT_THROTTLED_BASE_DELAY,
            max_backoff: SDK_DEFAULT_MAX_BACKOFF,
        }
    }

    /// Full jitter with the given base delay and cap.
    pub fn full_jitter(base_delay: Duration, max_backoff: Duration) -> Self {
        BackoffStrategy::FullJitter {
            base_delay,
            max_backoff,
        }
    }

    /// Equal jitter with the given base delay and cap.
    pub fn equal_jitter(base_delay: Duration, max_backoff: Duration) -> Self {
        BackoffStrategy::EqualJitter {
            base_delay,
            max_backoff,
        }
    }

    /// Plain exponential backoff with the given base delay and cap.
    pub fn exponential(base_delay: Duration, max_backoff: Duration) -> Self {
        BackoffStrategy::Exponential {
            base_delay,
            max_backoff,
        }
    }

    /// Delay before the next attempt, given how many retries were already made.
    pub fn compute_delay(&self, retries_attempted: u32, is_throttling_error: bool) -> Duration {
        let millis = match *self {
            BackoffStrategy::FullJitter {
                base_delay,
                max_backoff,
            } => full_jitter(exponential_ceiling(retries_attempted, base_delay, max_backoff)),
            BackoffStrategy::EqualJitter {
                base_delay,
                max_backoff,
            } => equal_jitter(exponential_ceiling(retries_attempted, base_delay, max_backoff)),
            BackoffStrategy::Exponential {
                base_delay,
                max_backoff,
            } => exponential_ceiling(retries_attempted, base_delay, max_backoff),
            BackoffStrategy::SdkDefault {
                base_delay,
                throttled_base_delay,
                max_backoff,
            } => {
                if is_throttling_error {
                    equal_jitter(exponential_ceiling(
                        retries_attempted,
                        throttled_base_delay,
                        max_backoff,
                    ))
                } else {
                    full_jitter(exponential_ceiling(retries_attempted, base_delay, max_backoff))
                }
            }
            BackoffStrategy::NoDelay => 0,
        };
        Duration::from_millis(millis)
    }
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// `min(2^retries * base_delay, max_backoff)` in milliseconds.
pub(crate) fn exponential_ceiling(
    retries_attempted: u32,
    base_delay: Duration,
    max_backoff: Duration,
) -> u64 {
    let retries = retries_attempted.min(MAX_BACKOFF_RETRIES);
    as_millis(base_delay)
        .saturating_mul(1 << retries)
        .min(as_millis(max_backoff))
}

fn full_jitter(ceiling: u64) -> u64 {
    let jitter = if ceiling == 0 {
        0
    } else {
        fastrand::u64(0..ceiling)
    };
    jitter + 1
}

fn equal_jitter(ceiling: u64) -> u64 {
    let half = ceiling / 2;
    half + fastrand::u64(0..=half)
}
