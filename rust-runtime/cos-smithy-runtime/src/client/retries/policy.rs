/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::client::retries::backoff::BackoffStrategy;
use crate::client::retries::condition::RetryCondition;
use cos_smithy_types::retry::RetryMode;

/// How a client retries failed requests.
///
/// A policy holds configuration only. Combine it with the client's
/// [`RetryConfig`](cos_smithy_types::retry::RetryConfig) through
/// [`RetryPolicyAdapter`](crate::client::retries::adapter::RetryPolicyAdapter) to make decisions.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    retry_condition: RetryCondition,
    backoff_strategy: BackoffStrategy,
    max_error_retry: Option<u32>,
    honor_max_error_retry_in_client_config: bool,
    retry_mode: Option<RetryMode>,
    fast_fail_rate_limiting: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::sdk_default()
    }
}

impl RetryPolicy {
    /// Creates a new builder.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Retries retryable errors with the default backoff, honoring the client's retry budget.
    pub fn sdk_default() -> Self {
        Self::builder().build()
    }

    /// Never retries.
    pub fn none() -> Self {
        Self::builder()
            .retry_condition(RetryCondition::Never)
            .backoff_strategy(BackoffStrategy::NoDelay)
            .max_error_retry(0)
            .honor_max_error_retry_in_client_config(false)
            .build()
    }

    /// Decides whether an error may be retried at all.
    pub fn retry_condition(&self) -> &RetryCondition {
        &self.retry_condition
    }

    /// Computes the delay before each retry.
    pub fn backoff_strategy(&self) -> &BackoffStrategy {
        &self.backoff_strategy
    }

    /// The retry budget of this policy, if it sets one.
    pub fn max_error_retry(&self) -> Option<u32> {
        self.max_error_retry
    }

    /// True if the client's `max_error_retry` overrides this policy's budget.
    pub fn honor_max_error_retry_in_client_config(&self) -> bool {
        self.honor_max_error_retry_in_client_config
    }

    /// The retry mode of this policy, if it sets one.
    pub fn retry_mode(&self) -> Option<RetryMode> {
        self.retry_mode
    }

    /// True if the adaptive rate limiter should fail instead of waiting for send tokens.
    pub fn fast_fail_rate_limiting(&self) -> bool {
        self.fast_fail_rate_limiting
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Clone, Debug, Default)]
pub struct RetryPolicyBuilder {
    retry_condition: Option<RetryCondition>,
    backoff_strategy: Option<BackoffStrategy>,
    max_error_retry: Option<u32>,
    honor_max_error_retry_in_client_config: Option<bool>,
    retry_mode: Option<RetryMode>,
    fast_fail_rate_limiting: Option<bool>,
}

impl RetryPolicyBuilder {
    /// Sets the retry condition. Defaults to [`RetryCondition::SdkDefault`].
    pub fn retry_condition(mut self, retry_condition: RetryCondition) -> Self {
        self.set_retry_condition(Some(retry_condition));
        self
    }

    /// Sets the retry condition. Defaults to [`RetryCondition::SdkDefault`].
    pub fn set_retry_condition(&mut self, retry_condition: Option<RetryCondition>) -> &mut Self {
        self.retry_condition = retry_condition;
        self
    }

    /// Sets the backoff strategy. Defaults to [`BackoffStrategy::sdk_default`].
    pub fn backoff_strategy(mut self, backoff_strategy: BackoffStrategy) -> Self {
        self.set_backoff_strategy(Some(backoff_strategy));
        self
    }

    /// Sets the backoff strategy. Defaults to [`BackoffStrategy::sdk_default`].
    pub fn set_backoff_strategy(&mut self, backoff_strategy: Option<BackoffStrategy>) -> &mut Self {
        self.backoff_strategy = backoff_strategy;
        self
    }

    /// Sets the retry budget of this policy.
    pub fn max_error_retry(mut self, max_error_retry: u32) -> Self {
        self.set_max_error_retry(Some(max_error_retry));
        self
    }

    /// Sets the retry budget of this policy.
    pub fn set_max_error_retry(&mut self, max_error_retry: Option<u32>) -> &mut Self {
        self.max_error_retry = max_error_retry;
        self
    }

    /// Whether the client's `max_error_retry` overrides this policy's budget. Defaults to `true`.
    pub fn honor_max_error_retry_in_client_config(mut self, honor: bool) -> Self {
        self.set_honor_max_error_retry_in_client_config(Some(honor));
        self
    }

    /// Whether the client's `max_error_retry` overrides this policy's budget. Defaults to `true`.
    pub fn set_honor_max_error_retry_in_client_config(&mut self, honor: Option<bool>) -> &mut Self {
        self.honor_max_error_retry_in_client_config = honor;
        self
    }

    /// Sets the retry mode, overriding the client's.
    pub fn retry_mode(mut self, retry_mode: RetryMode) -> Self {
        self.set_retry_mode(Some(retry_mode));
        self
    }

    /// Sets the retry mode, overriding the client's.
    pub fn set_retry_mode(&mut self, retry_mode: Option<RetryMode>) -> &mut Self {
        self.retry_mode = retry_mode;
        self
    }

    /// Fail instead of waiting when the adaptive rate limiter is out of send tokens.
    pub fn fast_fail_rate_limiting(mut self, fast_fail: bool) -> Self {
        self.set_fast_fail_rate_limiting(Some(fast_fail));
        self
    }

    /// Fail instead of waiting when the adaptive rate limiter is out of send tokens.
    pub fn set_fast_fail_rate_limiting(&mut self, fast_fail: Option<bool>) -> &mut Self {
        self.fast_fail_rate_limiting = fast_fail;
        self
    }

    /// Builds the `RetryPolicy`.
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            retry_condition: self.retry_condition.unwrap_or_default(),
            backoff_strategy: self.backoff_strategy.unwrap_or_default(),
            max_error_retry: self.max_error_retry,
            honor_max_error_retry_in_client_config: self
                .honor_max_error_retry_in_client_config
                .unwrap_or(true),
            retry_mode: self.retry_mode,
            fast_fail_rate_limiting: self.fast_fail_rate_limiting.unwrap_or(false),
        }
    }
}
