/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Retry decisions made from a [`RetryPolicy`] and the client's [`RetryConfig`].

use crate::client::retries::condition::RetryPolicyContext;
use crate::client::retries::policy::RetryPolicy;
use cos_smithy_types::retry::{RetryConfig, RetryMode};
use std::time::Duration;
use tracing::debug;

/// Combines a retry policy with the client's retry configuration.
#[derive(Clone, Debug)]
pub struct RetryPolicyAdapter {
    policy: RetryPolicy,
    config: RetryConfig,
}

impl RetryPolicyAdapter {
    /// Creates an adapter for `policy` under the client configuration `config`.
    pub fn new(policy: RetryPolicy, config: RetryConfig) -> Self {
        Self { policy, config }
    }

    /// The wrapped policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The client configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// The retry mode of the policy, falling back to the client's.
    pub fn retry_mode(&self) -> RetryMode {
        self.policy.retry_mode().unwrap_or_else(|| self.config.mode())
    }

    /// True if either the policy or the client asks the rate limiter to fail fast.
    pub fn fast_fail_rate_limiting(&self) -> bool {
        self.policy.fast_fail_rate_limiting() || self.config.fast_fail_rate_limiting()
    }

    /// How many retries a request may make.
    ///
    /// The first of these that is set wins:
    /// 1. `override_value`, set per request
    /// 2. the client's `max_error_retry`, unless the policy ignores it
    /// 3. the policy's `max_error_retry`
    /// 4. the client's `max_attempts` minus the first attempt
    /// 5. the default of the retry mode
    pub fn max_error_retry(&self, override_value: Option<u32>) -> u32 {
        override_value
            .or_else(|| {
                self.config
                    .max_error_retry()
                    .filter(|_| self.policy.honor_max_error_retry_in_client_config())
            })
            .or_else(|| self.policy.max_error_retry())
            .or_else(|| {
                self.config
                    .max_attempts()
                    .map(|attempts| attempts.saturating_sub(1))
            })
            .unwrap_or_else(|| self.retry_mode().default_max_error_retry())
    }

    /// True if the failed attempt in `ctx` should be retried.
    pub fn should_retry(&self, ctx: &RetryPolicyContext<'_>) -> bool {
        let max_error_retry = self.max_error_retry(ctx.max_error_retry_override());
        if ctx.retries_attempted() >= max_error_retry {
            debug!(
                retries_attempted = ctx.retries_attempted(),
                max_error_retry, "not retrying because the retry budget is spent"
            );
            return false;
        }
        self.policy.retry_condition().should_retry(ctx)
    }

    /// Delay before retrying the failed attempt in `ctx`.
    pub fn compute_delay_before_next_retry(&self, ctx: &RetryPolicyContext<'_>) -> Duration {
        self.policy
            .backoff_strategy()
            .compute_delay(ctx.retries_attempted(), ctx.is_throttling_error())
    }
}

#[cfg(test)]
mod tests {
    use super::RetryPolicyAdapter;
    use crate::client::result::AttemptError;
    use crate::client::retries::backoff::BackoffStrategy;
    use crate::client::retries::condition::{RetryCondition, RetryPolicyContext};
    use crate::client::retries::policy::RetryPolicy;
    use cos_smithy_types::retry::{ErrorKind, RetryConfig, RetryKind, RetryMode};
    use std::time::Duration;

    #[test]
    fn per_request_override_wins() {
        let adapter = RetryPolicyAdapter::new(
            RetryPolicy::builder().max_error_retry(7).build(),
            RetryConfig::standard().with_max_error_retry(5).with_max_attempts(2),
        );
        assert_eq!(1, adapter.max_error_retry(Some(1)));
        assert_eq!(0, adapter.max_error_retry(Some(0)));
    }

    #[test]
    fn client_budget_only_counts_when_honored() {
        let config = RetryConfig::standard().with_max_error_retry(5);
        let honoring = RetryPolicyAdapter::new(
            RetryPolicy::builder().max_error_retry(7).build(),
            config.clone(),
        );
        assert_eq!(5, honoring.max_error_retry(None));

        let ignoring = RetryPolicyAdapter::new(
            RetryPolicy::builder()
                .max_error_retry(7)
                .honor_max_error_retry_in_client_config(false)
                .build(),
            config,
        );
        assert_eq!(7, ignoring.max_error_retry(None));
    }

    #[test]
    fn max_attempts_counts_the_first_attempt() {
        let adapter = RetryPolicyAdapter::new(
            RetryPolicy::sdk_default(),
            RetryConfig::standard().with_max_attempts(2),
        );
        assert_eq!(1, adapter.max_error_retry(None));

        let single_attempt = RetryPolicyAdapter::new(
            RetryPolicy::sdk_default(),
            RetryConfig::standard().with_max_attempts(1),
        );
        assert_eq!(0, single_attempt.max_error_retry(None));
    }

    #[test]
    fn mode_defaults_are_the_last_resort() {
        let legacy = RetryPolicyAdapter::new(RetryPolicy::sdk_default(), RetryConfig::legacy());
        assert_eq!(3, legacy.max_error_retry(None));
        let adaptive = RetryPolicyAdapter::new(RetryPolicy::sdk_default(), RetryConfig::adaptive());
        assert_eq!(4, adaptive.max_error_retry(None));

        let policy_mode = RetryPolicyAdapter::new(
            RetryPolicy::builder().retry_mode(RetryMode::Standard).build(),
            RetryConfig::legacy(),
        );
        assert_eq!(RetryMode::Standard, policy_mode.retry_mode());
        assert_eq!(4, policy_mode.max_error_retry(None));
    }

    #[test]
    fn fast_fail_if_either_side_asks() {
        let neither = RetryPolicyAdapter::new(RetryPolicy::sdk_default(), RetryConfig::adaptive());
        assert!(!neither.fast_fail_rate_limiting());
        let config = RetryPolicyAdapter::new(
            RetryPolicy::sdk_default(),
            RetryConfig::adaptive().with_fast_fail_rate_limiting(true),
        );
        assert!(config.fast_fail_rate_limiting());
        let policy = RetryPolicyAdapter::new(
            RetryPolicy::builder().fast_fail_rate_limiting(true).build(),
            RetryConfig::adaptive(),
        );
        assert!(policy.fast_fail_rate_limiting());
    }

    #[test]
    fn should_retry_checks_budget_then_condition() {
        let adapter = RetryPolicyAdapter::new(
            RetryPolicy::sdk_default(),
            RetryConfig::standard().with_max_error_retry(2),
        );
        let error = AttemptError::io("reset");
        let transient = RetryKind::Error(ErrorKind::TransientError);
        let unretryable = RetryKind::UnretryableFailure;

        assert!(adapter.should_retry(&RetryPolicyContext::new(&error, &transient, 0)));
        assert!(adapter.should_retry(&RetryPolicyContext::new(&error, &transient, 1)));
        assert!(!adapter.should_retry(&RetryPolicyContext::new(&error, &transient, 2)));
        assert!(!adapter.should_retry(&RetryPolicyContext::new(&error, &unretryable, 0)));
        assert!(adapter.should_retry(
            &RetryPolicyContext::new(&error, &transient, 2).with_max_error_retry_override(Some(3))
        ));
    }

    #[test]
    fn custom_condition_still_respects_the_budget() {
        let adapter = RetryPolicyAdapter::new(
            RetryPolicy::builder()
                .retry_condition(RetryCondition::custom(|_| true))
                .max_error_retry(1)
                .build(),
            RetryConfig::legacy(),
        );
        let error = AttemptError::other("boom");
        let kind = RetryKind::UnretryableFailure;
        assert!(adapter.should_retry(&RetryPolicyContext::new(&error, &kind, 0)));
        assert!(!adapter.should_retry(&RetryPolicyContext::new(&error, &kind, 1)));
    }

    #[test]
    fn delay_comes_from_the_backoff_strategy() {
        let adapter = RetryPolicyAdapter::new(
            RetryPolicy::builder()
                .backoff_strategy(BackoffStrategy::exponential(
                    Duration::from_millis(10),
                    Duration::from_secs(1),
                ))
                .build(),
            RetryConfig::standard(),
        );
        let error = AttemptError::io("reset");
        let kind = RetryKind::Error(ErrorKind::TransientError);
        assert_eq!(
            Duration::from_millis(40),
            adapter.compute_delay_before_next_retry(&RetryPolicyContext::new(&error, &kind, 2))
        );
    }
}
