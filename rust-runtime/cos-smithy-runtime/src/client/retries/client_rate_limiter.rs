/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! A rate limiter for controlling the rate at which requests are sent to the service.
//!
//! The limiter is a token bucket whose refill rate follows the CUBIC congestion control curve:
//!
//! - It starts disabled and lets every request through until the first throttling error.
//! - A throttling error remembers the rate we were sending at, cuts the refill rate by
//!   [`BETA`] and enables the bucket.
//! - Every successful response grows the refill rate along a cubic curve anchored at the time
//!   of the last throttle, passing back through the remembered rate and then probing above it.
//! - Refill is lazy: capacity is recomputed from elapsed time whenever the bucket is touched.
//!
//! One limiter is shared by every request a client sends; it is cheap to clone.

use cos_smithy_async::rt::sleep::{AsyncSleep, SharedAsyncSleep, TokioSleep};
use cos_smithy_async::time::SharedTimeSource;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Tokens consumed by a single request attempt.
pub const DEFAULT_REQUEST_COST: f64 = 1.0;

const MIN_FILL_RATE: f64 = 0.5;
const MIN_CAPACITY: f64 = 1.0;
const SMOOTH: f64 = 0.8;
/// How much to scale back after receiving a throttling response
const BETA: f64 = 0.7;
/// Controls how aggressively we scale up after being throttled
const SCALE_CONSTANT: f64 = 0.4;

/// Adaptive token bucket shared by every request of a client.
#[derive(Clone, Debug)]
pub struct ClientRateLimiter {
    pub(crate) inner: Arc<Mutex<Inner>>,
    time_source: SharedTimeSource,
    sleep_impl: SharedAsyncSleep,
}

#[derive(Debug)]
pub(crate) struct Inner {
    /// The rate at which token are replenished.
    pub(crate) fill_rate: f64,
    /// The maximum capacity allowed in the token bucket.
    pub(crate) max_capacity: f64,
    /// The current capacity of the token bucket. Negative while requests are waiting on a deficit.
    pub(crate) current_capacity: f64,
    /// The last time the token bucket was refilled.
    pub(crate) last_timestamp: Option<f64>,
    /// Boolean indicating if the token bucket is enabled.
    /// The token bucket is initially disabled.
    /// When a throttling error is encountered it is enabled.
    pub(crate) enabled: bool,
    /// The smoothed rate which tokens are being retrieved.
    pub(crate) measured_tx_rate: f64,
    /// The last half second time bucket used.
    pub(crate) last_tx_rate_bucket: f64,
    /// The number of requests seen within the current time bucket.
    pub(crate) request_count: u64,
    /// The maximum rate when the client was last throttled.
    pub(crate) last_max_rate: f64,
    /// The last time when the client was throttled.
    pub(crate) time_of_last_throttle: f64,
    /// Seconds the cubic curve takes to climb back to `last_max_rate`.
    pub(crate) time_window: f64,
}

/// Outcome of asking the bucket for tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Permission {
    /// Tokens were deducted; the caller must wait this long before sending.
    Granted(Duration),
    /// Fast-fail was requested and the bucket could not cover the cost.
    Denied,
}

impl Inner {
    fn refill(&mut self, seconds_since_unix_epoch: f64) {
        if let Some(last_timestamp) = self.last_timestamp {
            let fill_amount = (seconds_since_unix_epoch - last_timestamp) * self.fill_rate;
            self.current_capacity = f64::min(self.max_capacity, self.current_capacity + fill_amount);
            debug!(
                fill_amount,
                current_capacity = self.current_capacity,
                max_capacity = self.max_capacity,
                "refilling client rate limiter tokens"
            );
        }
        self.last_timestamp = Some(seconds_since_unix_epoch);
    }

    pub(crate) fn acquire_permission(
        &mut self,
        seconds_since_unix_epoch: f64,
        amount: f64,
        fast_fail: bool,
    ) -> Permission {
        // Until the first throttling error there is nothing to limit.
        if !self.enabled {
            return Permission::Granted(Duration::ZERO);
        }

        self.refill(seconds_since_unix_epoch);

        if amount > self.current_capacity && fast_fail {
            debug!(
                amount,
                current_capacity = self.current_capacity,
                "client rate limiter rejected a request"
            );
            return Permission::Denied;
        }

        self.current_capacity -= amount;
        let deficit = f64::max(0.0, -self.current_capacity);
        if deficit == 0.0 {
            return Permission::Granted(Duration::ZERO);
        }

        let sleep_time = deficit / self.fill_rate;
        debug!(
            amount,
            current_capacity = self.current_capacity,
            fill_rate = self.fill_rate,
            sleep_time,
            "client rate limiter delayed a request"
        );
        Permission::Granted(Duration::try_from_secs_f64(sleep_time).unwrap_or(Duration::MAX))
    }

    fn update_bucket_refill_rate(&mut self, seconds_since_unix_epoch: f64, new_fill_rate: f64) {
        // Refill based on our current rate before we update to the new fill rate.
        self.refill(seconds_since_unix_epoch);

        self.fill_rate = f64::max(new_fill_rate, MIN_FILL_RATE);
        self.max_capacity = f64::max(new_fill_rate, MIN_CAPACITY);
        // Scaling down must not leave more tokens than the new ceiling; debt is kept as is.
        self.current_capacity = f64::min(self.current_capacity, self.max_capacity);

        debug!(
            fill_rate = self.fill_rate,
            max_capacity = self.max_capacity,
            current_capacity = self.current_capacity,
            measured_tx_rate = self.measured_tx_rate,
            "client rate limiter state has been updated"
        );
    }

    fn enable_token_bucket(&mut self) {
        if !self.enabled {
            debug!("client rate limiting has been enabled");
        }
        self.enabled = true;
    }

    fn update_measured_rate(&mut self, seconds_since_unix_epoch: f64) {
        let next_time_bucket = (seconds_since_unix_epoch * 2.0).floor() / 2.0;
        self.request_count += 1;

        if next_time_bucket > self.last_tx_rate_bucket {
            let current_rate =
                self.request_count as f64 / (next_time_bucket - self.last_tx_rate_bucket);
            self.measured_tx_rate = current_rate * SMOOTH + self.measured_tx_rate * (1.0 - SMOOTH);
            self.request_count = 0;
            self.last_tx_rate_bucket = next_time_bucket;
        }
    }

    pub(crate) fn calculate_time_window(&mut self) {
        let base = (self.last_max_rate * (1.0 - BETA)) / SCALE_CONSTANT;
        self.time_window = base.cbrt();
    }

    pub(crate) fn cubic_success(&self, seconds_since_unix_epoch: f64) -> f64 {
        let dt = seconds_since_unix_epoch - self.time_of_last_throttle - self.time_window;
        f64::max(0.0, (SCALE_CONSTANT * dt.powi(3)) + self.last_max_rate)
    }

    pub(crate) fn update_sending_rate(
        &mut self,
        seconds_since_unix_epoch: f64,
        is_throttling_error: bool,
    ) {
        self.update_measured_rate(seconds_since_unix_epoch);

        let calculated_rate = if is_throttling_error {
            // A disabled bucket has no fill rate of its own; the observed send rate stands in.
            let rate_to_use = if self.enabled {
                f64::min(self.measured_tx_rate, self.fill_rate)
            } else {
                self.measured_tx_rate
            };

            self.last_max_rate = rate_to_use;
            self.time_of_last_throttle = seconds_since_unix_epoch;
            self.enable_token_bucket();
            cubic_throttle(rate_to_use)
        } else {
            self.cubic_success(seconds_since_unix_epoch)
        };
        self.calculate_time_window();

        let new_rate = f64::min(calculated_rate, 2.0 * self.measured_tx_rate);
        self.update_bucket_refill_rate(seconds_since_unix_epoch, new_rate);
    }
}

pub(crate) fn cubic_throttle(rate_to_use: f64) -> f64 {
    rate_to_use * BETA
}

impl ClientRateLimiter {
    /// Creates a limiter using the system clock and tokio's timer.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder.
    pub fn builder() -> ClientRateLimiterBuilder {
        ClientRateLimiterBuilder::new()
    }

    /// Acquires `amount` tokens, waiting for the bucket to refill if needed.
    ///
    /// Returns `true` once the request may be sent. When the bucket is enabled and cannot cover
    /// `amount`, a `fast_fail` caller gets `false` right away and no tokens are taken; any other
    /// caller has the tokens deducted (the bucket may go into debt) and is suspended for
    /// `debt / fill_rate` seconds before `true` is returned. A disabled bucket always returns
    /// `true` without waiting, regardless of `fast_fail`.
    pub async fn acquire(&self, amount: f64, fast_fail: bool) -> bool {
        let now = self.time_source.seconds_since_unix_epoch();
        // The lock is released before sleeping.
        let permission = self
            .inner
            .lock()
            .unwrap()
            .acquire_permission(now, amount, fast_fail);
        match permission {
            Permission::Denied => false,
            Permission::Granted(delay) if delay.is_zero() => true,
            Permission::Granted(delay) => {
                self.sleep_impl.sleep(delay).await;
                true
            }
        }
    }

    /// Feeds the outcome of a completed request back into the limiter.
    pub fn update_sending_rate(&self, is_throttling_error: bool) {
        let now = self.time_source.seconds_since_unix_epoch();
        self.inner
            .lock()
            .unwrap()
            .update_sending_rate(now, is_throttling_error);
    }

    /// True once a throttling error has switched client-side limiting on.
    pub fn is_enabled(&self) -> bool {
        self.inner.lock().unwrap().enabled
    }

    /// The current refill rate, in tokens per second.
    pub fn fill_rate(&self) -> f64 {
        self.inner.lock().unwrap().fill_rate
    }

    /// Tokens currently in the bucket. Negative while callers are waiting on a deficit.
    pub fn current_capacity(&self) -> f64 {
        self.inner.lock().unwrap().current_capacity
    }
}

impl Default for ClientRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`ClientRateLimiter`].
///
/// Everything except the clock and sleep implementation is there so tests can start the limiter
/// in a known state.
#[derive(Clone, Debug, Default)]
pub struct ClientRateLimiterBuilder {
    token_refill_rate: Option<f64>,
    maximum_bucket_capacity: Option<f64>,
    current_bucket_capacity: Option<f64>,
    time_of_last_refill: Option<f64>,
    tokens_retrieved_per_second: Option<f64>,
    previous_time_bucket: Option<f64>,
    request_count: Option<u64>,
    enable_throttling: Option<bool>,
    tokens_retrieved_per_second_at_time_of_last_throttle: Option<f64>,
    time_of_last_throttle: Option<f64>,
    time_source: Option<SharedTimeSource>,
    sleep_impl: Option<SharedAsyncSleep>,
}

impl ClientRateLimiterBuilder {
    /// Create a new `ClientRateLimiterBuilder`.
    pub fn new() -> Self {
        ClientRateLimiterBuilder::default()
    }

    /// The rate at which token are replenished.
    pub fn token_refill_rate(mut self, token_refill_rate: f64) -> Self {
        self.set_token_refill_rate(Some(token_refill_rate));
        self
    }

    /// The rate at which token are replenished.
    pub fn set_token_refill_rate(&mut self, token_refill_rate: Option<f64>) -> &mut Self {
        self.token_refill_rate = token_refill_rate;
        self
    }

    /// The maximum capacity allowed in the token bucket.
    pub fn maximum_bucket_capacity(mut self, maximum_bucket_capacity: f64) -> Self {
        self.set_maximum_bucket_capacity(Some(maximum_bucket_capacity));
        self
    }

    /// The maximum capacity allowed in the token bucket.
    pub fn set_maximum_bucket_capacity(
        &mut self,
        maximum_bucket_capacity: Option<f64>,
    ) -> &mut Self {
        self.maximum_bucket_capacity = maximum_bucket_capacity;
        self
    }

    /// The current capacity of the token bucket.
    pub fn current_bucket_capacity(mut self, current_bucket_capacity: f64) -> Self {
        self.set_current_bucket_capacity(Some(current_bucket_capacity));
        self
    }

    /// The current capacity of the token bucket.
    pub fn set_current_bucket_capacity(
        &mut self,
        current_bucket_capacity: Option<f64>,
    ) -> &mut Self {
        self.current_bucket_capacity = current_bucket_capacity;
        self
    }

    /// The last time the token bucket was refilled, in seconds since the UNIX epoch.
    pub fn time_of_last_refill(mut self, time_of_last_refill: f64) -> Self {
        self.time_of_last_refill = Some(time_of_last_refill);
        self
    }

    /// The smoothed rate which tokens are being retrieved.
    pub fn tokens_retrieved_per_second(mut self, tokens_retrieved_per_second: f64) -> Self {
        self.tokens_retrieved_per_second = Some(tokens_retrieved_per_second);
        self
    }

    /// The last half second time bucket used.
    pub fn previous_time_bucket(mut self, previous_time_bucket: f64) -> Self {
        self.previous_time_bucket = Some(previous_time_bucket);
        self
    }

    /// The number of requests seen within the current time bucket.
    pub fn request_count(mut self, request_count: u64) -> Self {
        self.request_count = Some(request_count);
        self
    }

    /// Whether the bucket starts enabled. It is normally enabled by the first throttling error.
    pub fn enable_throttling(mut self, enable_throttling: bool) -> Self {
        self.enable_throttling = Some(enable_throttling);
        self
    }

    /// The maximum rate when the client was last throttled.
    pub fn tokens_retrieved_per_second_at_time_of_last_throttle(
        mut self,
        tokens_retrieved_per_second_at_time_of_last_throttle: f64,
    ) -> Self {
        self.tokens_retrieved_per_second_at_time_of_last_throttle =
            Some(tokens_retrieved_per_second_at_time_of_last_throttle);
        self
    }

    /// The last time when the client was throttled, in seconds since the UNIX epoch.
    pub fn time_of_last_throttle(mut self, time_of_last_throttle: f64) -> Self {
        self.time_of_last_throttle = Some(time_of_last_throttle);
        self
    }

    /// The clock the limiter reads. Defaults to the system clock.
    pub fn time_source(mut self, time_source: SharedTimeSource) -> Self {
        self.time_source = Some(time_source);
        self
    }

    /// The sleep used to wait out a token deficit. Defaults to tokio's timer.
    pub fn sleep_impl(mut self, sleep_impl: SharedAsyncSleep) -> Self {
        self.sleep_impl = Some(sleep_impl);
        self
    }

    /// Build the `ClientRateLimiter`.
    pub fn build(self) -> ClientRateLimiter {
        let time_source = self.time_source.unwrap_or_default();
        let now = time_source.seconds_since_unix_epoch();
        let mut inner = Inner {
            fill_rate: self
                .token_refill_rate
                .map_or(MIN_FILL_RATE, |rate| f64::max(rate, MIN_FILL_RATE)),
            max_capacity: self.maximum_bucket_capacity.unwrap_or(f64::MAX),
            current_capacity: self.current_bucket_capacity.unwrap_or_default(),
            last_timestamp: self.time_of_last_refill,
            enabled: self.enable_throttling.unwrap_or_default(),
            measured_tx_rate: self.tokens_retrieved_per_second.unwrap_or_default(),
            last_tx_rate_bucket: self.previous_time_bucket.unwrap_or(now.floor()),
            request_count: self.request_count.unwrap_or_default(),
            last_max_rate: self
                .tokens_retrieved_per_second_at_time_of_last_throttle
                .unwrap_or_default(),
            time_of_last_throttle: self.time_of_last_throttle.unwrap_or(now),
            time_window: 0.0,
        };
        inner.calculate_time_window();

        ClientRateLimiter {
            inner: Arc::new(Mutex::new(inner)),
            time_source,
            sleep_impl: self
                .sleep_impl
                .unwrap_or_else(|| SharedAsyncSleep::new(TokioSleep::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{cubic_throttle, ClientRateLimiter, Permission, DEFAULT_REQUEST_COST};
    use approx::assert_relative_eq;
    use cos_smithy_async::rt::sleep::{AsyncSleep, SharedAsyncSleep};
    use cos_smithy_async::test_util::instant_time_and_sleep;
    use cos_smithy_async::time::SharedTimeSource;
    use std::time::{Duration, SystemTime};

    const TWO_HUNDRED_MILLISECONDS: Duration = Duration::from_millis(200);

    #[test]
    fn should_match_beta_decrease() {
        let new_rate = cubic_throttle(10.0);
        assert_relative_eq!(new_rate, 7.0);

        let rate_limiter = ClientRateLimiter::builder()
            .tokens_retrieved_per_second_at_time_of_last_throttle(10.0)
            .time_of_last_throttle(1.0)
            .build();

        let new_rate = rate_limiter.inner.lock().unwrap().cubic_success(1.0);
        assert_relative_eq!(new_rate, 7.0);
    }

    #[test]
    fn cubic_success_never_goes_negative() {
        let rate_limiter = ClientRateLimiter::builder()
            .tokens_retrieved_per_second_at_time_of_last_throttle(1.0)
            .time_of_last_throttle(100.0)
            .build();
        assert_eq!(0.0, rate_limiter.inner.lock().unwrap().cubic_success(0.0));
    }

    #[test]
    fn throttling_is_enabled_once_throttling_error_is_received() {
        let rate_limiter = ClientRateLimiter::builder()
            .previous_time_bucket(0.0)
            .time_of_last_throttle(0.0)
            .build();

        assert!(
            !rate_limiter.is_enabled(),
            "rate_limiter should be disabled by default"
        );
        rate_limiter.inner.lock().unwrap().update_sending_rate(0.0, true);
        assert!(
            rate_limiter.is_enabled(),
            "rate_limiter should be enabled after throttling error"
        );
    }

    #[test]
    fn test_calculated_rate_with_successes() {
        let rate_limiter = ClientRateLimiter::builder()
            .time_of_last_throttle(5.0)
            .tokens_retrieved_per_second_at_time_of_last_throttle(10.0)
            .build();

        struct Attempt {
            seconds_since_unix_epoch: f64,
            expected_calculated_rate: f64,
        }

        let attempts = [
            Attempt {
                seconds_since_unix_epoch: 5.0,
                expected_calculated_rate: 7.0,
            },
            Attempt {
                seconds_since_unix_epoch: 6.0,
                expected_calculated_rate: 9.64893600966,
            },
            Attempt {
                seconds_since_unix_epoch: 7.0,
                expected_calculated_rate: 10.000030849917364,
            },
            Attempt {
                seconds_since_unix_epoch: 8.0,
                expected_calculated_rate: 10.453284520772092,
            },
            Attempt {
                seconds_since_unix_epoch: 9.0,
                expected_calculated_rate: 13.408697022224185,
            },
            Attempt {
                seconds_since_unix_epoch: 10.0,
                expected_calculated_rate: 21.26626835427364,
            },
            Attempt {
                seconds_since_unix_epoch: 11.0,
                expected_calculated_rate: 36.425998516920465,
            },
        ];

        for attempt in attempts {
            let mut inner = rate_limiter.inner.lock().unwrap();
            inner.calculate_time_window();
            let calculated_rate = inner.cubic_success(attempt.seconds_since_unix_epoch);
            assert_relative_eq!(
                attempt.expected_calculated_rate,
                calculated_rate,
                epsilon = 1e-6
            );
        }
    }

    // Reference values shared with the other SDKs. Throttles move the anchor of the curve to the
    // throttled rate and time, then growth resumes from there.
    #[test]
    fn test_calculated_rate_with_throttles() {
        let rate_limiter = ClientRateLimiter::builder()
            .tokens_retrieved_per_second_at_time_of_last_throttle(10.0)
            .time_of_last_throttle(5.0)
            .build();

        struct Attempt {
            throttled: bool,
            seconds_since_unix_epoch: f64,
            expected_calculated_rate: f64,
        }

        let attempts = [
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 5.0,
                expected_calculated_rate: 7.0,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 6.0,
                expected_calculated_rate: 9.64893600966,
            },
            Attempt {
                throttled: true,
                seconds_since_unix_epoch: 7.0,
                expected_calculated_rate: 6.754255206761999,
            },
            Attempt {
                throttled: true,
                seconds_since_unix_epoch: 8.0,
                expected_calculated_rate: 4.727978644733399,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 9.0,
                expected_calculated_rate: 4.670125557970046,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 10.0,
                expected_calculated_rate: 4.770870456867401,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 11.0,
                expected_calculated_rate: 6.011819748005445,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 12.0,
                expected_calculated_rate: 10.792973431384178,
            },
        ];

        let mut calculated_rate = 0.0;
        for attempt in attempts {
            let mut inner = rate_limiter.inner.lock().unwrap();
            inner.calculate_time_window();
            if attempt.throttled {
                calculated_rate = cubic_throttle(calculated_rate);
                inner.time_of_last_throttle = attempt.seconds_since_unix_epoch;
                inner.last_max_rate = calculated_rate;
            } else {
                calculated_rate = inner.cubic_success(attempt.seconds_since_unix_epoch);
            }

            assert_relative_eq!(
                attempt.expected_calculated_rate,
                calculated_rate,
                epsilon = 1e-6
            );
        }
    }

    #[tokio::test]
    async fn test_client_sending_rates() {
        let (_, sleep_impl) = instant_time_and_sleep(SystemTime::UNIX_EPOCH);
        let rate_limiter = ClientRateLimiter::builder()
            .time_of_last_throttle(0.0)
            .previous_time_bucket(0.0)
            .build();

        struct Attempt {
            throttled: bool,
            seconds_since_unix_epoch: f64,
            expected_tokens_retrieved_per_second: f64,
            expected_token_refill_rate: f64,
        }

        let attempts = [
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 0.2,
                expected_tokens_retrieved_per_second: 0.000000,
                expected_token_refill_rate: 0.500000,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 0.4,
                expected_tokens_retrieved_per_second: 0.000000,
                expected_token_refill_rate: 0.500000,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 0.6,
                expected_tokens_retrieved_per_second: 4.800000000000001,
                expected_token_refill_rate: 0.500000,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 0.8,
                expected_tokens_retrieved_per_second: 4.800000000000001,
                expected_token_refill_rate: 0.500000,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 1.0,
                expected_tokens_retrieved_per_second: 4.160000,
                expected_token_refill_rate: 0.500000,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 1.2,
                expected_tokens_retrieved_per_second: 4.160000,
                expected_token_refill_rate: 0.691200,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 1.4,
                expected_tokens_retrieved_per_second: 4.160000,
                expected_token_refill_rate: 1.0975999999999997,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 1.6,
                expected_tokens_retrieved_per_second: 5.632000000000001,
                expected_token_refill_rate: 1.6384000000000005,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 1.8,
                expected_tokens_retrieved_per_second: 5.632000000000001,
                expected_token_refill_rate: 2.332800,
            },
            Attempt {
                throttled: true,
                seconds_since_unix_epoch: 2.0,
                expected_tokens_retrieved_per_second: 4.326400,
                expected_token_refill_rate: 3.0284799999999996,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 2.2,
                expected_tokens_retrieved_per_second: 4.326400,
                expected_token_refill_rate: 3.48663917347026,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 2.4,
                expected_tokens_retrieved_per_second: 4.326400,
                expected_token_refill_rate: 3.821874416040255,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 2.6,
                expected_tokens_retrieved_per_second: 5.665280,
                expected_token_refill_rate: 4.053385727709987,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 2.8,
                expected_tokens_retrieved_per_second: 5.665280,
                expected_token_refill_rate: 4.200373108479454,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 3.0,
                expected_tokens_retrieved_per_second: 4.333056,
                expected_token_refill_rate: 4.282036558348658,
            },
            Attempt {
                throttled: true,
                seconds_since_unix_epoch: 3.2,
                expected_tokens_retrieved_per_second: 4.333056,
                expected_token_refill_rate: 2.99742559084406,
            },
            Attempt {
                throttled: false,
                seconds_since_unix_epoch: 3.4,
                expected_tokens_retrieved_per_second: 4.333056,
                expected_token_refill_rate: 3.4522263943863463,
            },
        ];

        for attempt in attempts {
            sleep_impl.sleep(TWO_HUNDRED_MILLISECONDS).await;
            assert_relative_eq!(
                attempt.seconds_since_unix_epoch,
                sleep_impl.total_duration().as_secs_f64()
            );

            let mut inner = rate_limiter.inner.lock().unwrap();
            inner.update_sending_rate(attempt.seconds_since_unix_epoch, attempt.throttled);
            assert_relative_eq!(
                attempt.expected_tokens_retrieved_per_second,
                inner.measured_tx_rate
            );
            assert_relative_eq!(attempt.expected_token_refill_rate, inner.fill_rate);
        }
    }

    fn enabled_limiter(
        fill_rate: f64,
        capacity: f64,
    ) -> (
        ClientRateLimiter,
        cos_smithy_async::test_util::InstantSleep,
    ) {
        let (time_source, sleep_impl) = instant_time_and_sleep(SystemTime::UNIX_EPOCH);
        let limiter = ClientRateLimiter::builder()
            .enable_throttling(true)
            .token_refill_rate(fill_rate)
            .maximum_bucket_capacity(10.0)
            .current_bucket_capacity(capacity)
            .time_of_last_refill(0.0)
            .time_source(SharedTimeSource::new(time_source))
            .sleep_impl(SharedAsyncSleep::new(sleep_impl.clone()))
            .build();
        (limiter, sleep_impl)
    }

    #[tokio::test]
    async fn acquire_with_enough_capacity_does_not_sleep() {
        let (limiter, sleep_impl) = enabled_limiter(1.0, 5.0);

        assert!(limiter.acquire(DEFAULT_REQUEST_COST, false).await);
        assert!(sleep_impl.logs().is_empty());
        assert_relative_eq!(4.0, limiter.current_capacity());
    }

    #[tokio::test]
    async fn acquire_sleeps_off_the_deficit_at_the_fill_rate() {
        let (limiter, sleep_impl) = enabled_limiter(1.0, 0.0);

        assert!(limiter.acquire(1.0, false).await);
        assert_eq!(vec![Duration::from_secs(1)], sleep_impl.logs());
        assert_relative_eq!(-1.0, limiter.current_capacity());
    }

    #[tokio::test]
    async fn configured_fill_rate_is_floored() {
        for fill_rate in [0.0, -3.0] {
            let (limiter, sleep_impl) = enabled_limiter(fill_rate, 0.0);

            assert!(limiter.acquire(1.0, false).await);
            assert_eq!(vec![Duration::from_secs(2)], sleep_impl.logs());
        }
    }

    #[tokio::test]
    async fn acquire_sleep_is_inversely_proportional_to_the_fill_rate() {
        let (limiter, sleep_impl) = enabled_limiter(4.0, 0.0);

        assert!(limiter.acquire(2.0, false).await);
        assert_eq!(vec![Duration::from_millis(500)], sleep_impl.logs());
    }

    #[tokio::test]
    async fn fast_fail_rejects_without_sleeping_or_taking_tokens() {
        let (limiter, sleep_impl) = enabled_limiter(1.0, 0.5);

        assert!(!limiter.acquire(1.0, true).await);
        assert!(sleep_impl.logs().is_empty());
        assert_relative_eq!(0.5, limiter.current_capacity());
    }

    #[tokio::test]
    async fn disabled_limiter_ignores_fast_fail() {
        let (time_source, sleep_impl) = instant_time_and_sleep(SystemTime::UNIX_EPOCH);
        let limiter = ClientRateLimiter::builder()
            .current_bucket_capacity(0.0)
            .time_source(SharedTimeSource::new(time_source))
            .sleep_impl(SharedAsyncSleep::new(sleep_impl.clone()))
            .build();

        assert!(limiter.acquire(100.0, true).await);
        assert!(sleep_impl.logs().is_empty());
        assert_eq!(0.0, limiter.current_capacity());
    }

    #[test]
    fn refill_is_capped_at_max_capacity() {
        let limiter = ClientRateLimiter::builder()
            .enable_throttling(true)
            .token_refill_rate(10.0)
            .maximum_bucket_capacity(3.0)
            .current_bucket_capacity(0.0)
            .time_of_last_refill(0.0)
            .build();

        let permission = limiter
            .inner
            .lock()
            .unwrap()
            .acquire_permission(100.0, 1.0, false);
        assert_eq!(Permission::Granted(Duration::ZERO), permission);
        assert_relative_eq!(2.0, limiter.current_capacity());
    }

    #[test]
    fn throttling_keeps_debt_but_clamps_surplus() {
        let limiter = ClientRateLimiter::builder()
            .enable_throttling(true)
            .token_refill_rate(10.0)
            .tokens_retrieved_per_second(1.0)
            .maximum_bucket_capacity(10.0)
            .current_bucket_capacity(8.0)
            .time_of_last_refill(0.0)
            .previous_time_bucket(0.0)
            .build();

        limiter.inner.lock().unwrap().update_sending_rate(0.0, true);
        assert!(limiter.current_capacity() <= 1.0);

        let limiter = ClientRateLimiter::builder()
            .enable_throttling(true)
            .token_refill_rate(10.0)
            .tokens_retrieved_per_second(1.0)
            .current_bucket_capacity(-3.0)
            .time_of_last_refill(0.0)
            .previous_time_bucket(0.0)
            .build();
        limiter.inner.lock().unwrap().update_sending_rate(0.0, true);
        assert_relative_eq!(-3.0, limiter.current_capacity());
    }

    // Only checks that the math never panics and that the bucket follows the passage of time.
    // Each request costs 1.0 and the minimum capacity is also 1.0, so we never run dry for long.
    #[tokio::test]
    async fn test_when_throttling_is_enabled_requests_can_still_be_sent() {
        let (time_source, sleep_impl) = instant_time_and_sleep(SystemTime::UNIX_EPOCH);
        let crl = ClientRateLimiter::builder()
            .time_of_last_throttle(0.0)
            .previous_time_bucket(0.0)
            .time_source(SharedTimeSource::new(time_source))
            .sleep_impl(SharedAsyncSleep::new(sleep_impl.clone()))
            .build();

        // Start by recording a throttling error
        crl.update_sending_rate(true);

        for _i in 0..100 {
            // advance time by a random amount (up to 1s) each iteration
            let duration = Duration::from_secs_f64(fastrand::f64());
            sleep_impl.sleep(duration).await;
            assert!(crl.acquire(DEFAULT_REQUEST_COST, false).await);

            // Assume all further requests succeed on the first try
            crl.update_sending_rate(false);
        }

        let inner = crl.inner.lock().unwrap();
        assert!(inner.enabled, "the rate limiter should still be enabled");
        assert_relative_eq!(
            inner.last_timestamp.unwrap(),
            sleep_impl.total_duration().as_secs_f64(),
            max_relative = 0.0001
        );
    }
}
