/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The retry loop every request goes through.
//!
//! For each request the orchestrator:
//! 1. resolves credentials once,
//! 2. in adaptive mode, waits for send tokens from the [`ClientRateLimiter`],
//! 3. makes an attempt, bounded by the attempt timeout,
//! 4. feeds the outcome back to the rate limiter,
//! 5. classifies a failure and asks the [`RetryPolicyAdapter`] whether to retry,
//! 6. takes tokens from the [`RetryQuota`] and sleeps for the backoff delay.
//!
//! The whole loop is bounded by the operation timeout.

use crate::client::result::{AttemptError, FailedRequest, SdkError};
use crate::client::retries::adapter::RetryPolicyAdapter;
use crate::client::retries::classifiers::classify_error;
use crate::client::retries::client_rate_limiter::{ClientRateLimiter, DEFAULT_REQUEST_COST};
use crate::client::retries::condition::RetryPolicyContext;
use crate::client::retries::policy::RetryPolicy;
use crate::client::retries::retry_quota::{RetryPermit, RetryQuota};
use cos_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use cos_credential_types::Credentials;
use cos_smithy_async::future::timeout::Timeout;
use cos_smithy_async::rt::sleep::{AsyncSleep, SharedAsyncSleep, TokioSleep};
use cos_smithy_async::time::{SharedTimeSource, TimeSource};
use cos_smithy_types::retry::{ErrorKind, RetryConfig, RetryKind};
use cos_smithy_types::timeout::TimeoutConfig;
use std::future::Future;
use std::time::{Duration, SystemTime};
use tracing::{debug, debug_span, Instrument};

/// What an attempt gets to work with.
#[derive(Clone, Debug)]
pub struct AttemptContext {
    attempt: u32,
    credentials: Option<Credentials>,
}

impl AttemptContext {
    /// The attempt number, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The credentials resolved for this request, if a credentials provider is configured.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }
}

/// Settings that apply to a single request.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct RequestOverrides {
    max_error_retry: Option<u32>,
}

impl RequestOverrides {
    /// Creates overrides that change nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry budget of this request, ignoring every configured one.
    pub fn max_error_retry(mut self, max_error_retry: u32) -> Self {
        self.max_error_retry = Some(max_error_retry);
        self
    }
}

#[derive(Debug, Default)]
struct RequestState {
    attempts: u32,
    retry_permit: Option<RetryPermit>,
    last_error: Option<AttemptError>,
}

impl RequestState {
    // Tokens of a retry that did not lead to success are not refunded.
    fn forget_retry_permit(&mut self) {
        if let Some(permit) = self.retry_permit.take() {
            permit.forget();
        }
    }
}

/// Runs requests with retries, rate limiting and timeouts.
///
/// Clones share the rate limiter and the retry quota, so create one orchestrator per client and
/// clone it rather than building a new one per request.
#[derive(Clone, Debug)]
pub struct Orchestrator {
    retry: RetryPolicyAdapter,
    timeout_config: TimeoutConfig,
    rate_limiter: ClientRateLimiter,
    retry_quota: RetryQuota,
    credentials_provider: Option<SharedCredentialsProvider>,
    time_source: SharedTimeSource,
    sleep_impl: SharedAsyncSleep,
}

impl Orchestrator {
    /// Creates a builder.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// The rate limiter used in adaptive mode.
    pub fn rate_limiter(&self) -> &ClientRateLimiter {
        &self.rate_limiter
    }

    /// The retry quota used when the client throttles retries.
    pub fn retry_quota(&self) -> &RetryQuota {
        &self.retry_quota
    }

    /// The retry policy and configuration.
    pub fn retry(&self) -> &RetryPolicyAdapter {
        &self.retry
    }

    /// Sends a request, calling `make_attempt` once per attempt.
    pub async fn invoke<O, F, Fut>(&self, make_attempt: F) -> Result<O, SdkError>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Result<O, AttemptError>>,
    {
        self.invoke_with_overrides(RequestOverrides::default(), make_attempt)
            .await
    }

    /// Sends a request with per-request settings, calling `make_attempt` once per attempt.
    pub async fn invoke_with_overrides<O, F, Fut>(
        &self,
        overrides: RequestOverrides,
        mut make_attempt: F,
    ) -> Result<O, SdkError>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Result<O, AttemptError>>,
    {
        let start = self.time_source.now();
        let mut state = RequestState::default();
        let request = self
            .retry_loop(&overrides, &mut make_attempt, &mut state, start)
            .instrument(debug_span!("invoke"));

        let Some(operation_timeout) = self.timeout_config.operation_timeout() else {
            return request.await;
        };
        let outcome = Timeout::new(request, self.sleep_impl.sleep(operation_timeout)).await;
        match outcome {
            Ok(result) => result,
            Err(_timed_out) => {
                state.forget_retry_permit();
                debug!(
                    attempts = state.attempts,
                    ?operation_timeout,
                    "operation timed out"
                );
                Err(SdkError::OperationTimedOut {
                    attempts: state.attempts,
                    elapsed: self.elapsed_since(start),
                    last_error: state.last_error.take(),
                })
            }
        }
    }

    async fn retry_loop<O, F, Fut>(
        &self,
        overrides: &RequestOverrides,
        make_attempt: &mut F,
        state: &mut RequestState,
        start: SystemTime,
    ) -> Result<O, SdkError>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Result<O, AttemptError>>,
    {
        let credentials = match &self.credentials_provider {
            Some(provider) => Some(
                provider
                    .provide_credentials()
                    .await
                    .map_err(SdkError::CredentialsUnavailable)?,
            ),
            None => None,
        };

        let adaptive = self.retry.retry_mode().is_adaptive();
        let fast_fail = self.retry.fast_fail_rate_limiting();
        let throttle_retries = self.retry.config().throttle_retries();
        let mut retries_attempted = 0;

        loop {
            if adaptive && !self.rate_limiter.acquire(DEFAULT_REQUEST_COST, fast_fail).await {
                state.forget_retry_permit();
                debug!(attempts = state.attempts, "unable to acquire send tokens");
                return Err(SdkError::SendTokensUnavailable {
                    attempts: state.attempts,
                    elapsed: self.elapsed_since(start),
                });
            }

            state.attempts += 1;
            let ctx = AttemptContext {
                attempt: state.attempts,
                credentials: credentials.clone(),
            };
            let result = match self.timeout_config.operation_attempt_timeout() {
                Some(attempt_timeout) => Timeout::new(
                    make_attempt(ctx),
                    self.sleep_impl.sleep(attempt_timeout),
                )
                .await
                .unwrap_or(Err(AttemptError::Timeout(attempt_timeout))),
                None => make_attempt(ctx).await,
            };

            let error = match result {
                Ok(output) => {
                    if adaptive {
                        self.rate_limiter.update_sending_rate(false);
                    }
                    match state.retry_permit.take() {
                        Some(permit) => permit.release(),
                        None if throttle_retries => self.retry_quota.regenerate_a_token(),
                        None => {}
                    }
                    debug!(attempts = state.attempts, "request succeeded");
                    return Ok(output);
                }
                Err(error) => error,
            };

            let retry_kind = classify_error(&error);
            let retry_ctx = RetryPolicyContext::new(&error, &retry_kind, retries_attempted)
                .with_max_error_retry_override(overrides.max_error_retry);
            if adaptive {
                self.rate_limiter
                    .update_sending_rate(retry_ctx.is_throttling_error());
            }

            if !self.retry.should_retry(&retry_ctx) {
                let max_error_retry = self.retry.max_error_retry(overrides.max_error_retry);
                let budget_spent = retries_attempted >= max_error_retry
                    && retry_kind != RetryKind::UnretryableFailure;
                state.forget_retry_permit();
                debug!(
                    attempts = state.attempts,
                    ?retry_kind,
                    budget_spent,
                    "not retrying: {error}"
                );
                let failed = FailedRequest::new(error, state.attempts, self.elapsed_since(start));
                return Err(if budget_spent {
                    SdkError::RetriesExhausted(failed)
                } else {
                    SdkError::NotRetryable(failed)
                });
            }

            if throttle_retries {
                let cost_kind = match retry_kind {
                    RetryKind::Error(kind) => kind,
                    _ => ErrorKind::ClientError,
                };
                match self.retry_quota.acquire(cost_kind) {
                    Some(permit) => {
                        if let Some(previous) = state.retry_permit.replace(permit) {
                            previous.forget();
                        }
                    }
                    None => {
                        state.forget_retry_permit();
                        debug!(
                            attempts = state.attempts,
                            "not retrying because the retry quota is exhausted"
                        );
                        let failed =
                            FailedRequest::new(error, state.attempts, self.elapsed_since(start));
                        return Err(SdkError::QuotaExhausted(failed));
                    }
                }
            }

            let delay = self.retry.compute_delay_before_next_retry(&retry_ctx);
            let elapsed = self.elapsed_since(start);
            if let Some(operation_timeout) = self.timeout_config.operation_timeout() {
                if elapsed + delay > operation_timeout {
                    state.forget_retry_permit();
                    debug!(
                        attempts = state.attempts,
                        ?delay,
                        ?operation_timeout,
                        "not retrying because the backoff would exceed the operation timeout"
                    );
                    return Err(SdkError::OperationTimedOut {
                        attempts: state.attempts,
                        elapsed,
                        last_error: Some(error),
                    });
                }
            }

            debug!(
                attempts = state.attempts,
                ?retry_kind,
                ?delay,
                "attempt failed; retrying after delay: {error}"
            );
            state.last_error = Some(error);
            self.sleep_impl.sleep(delay).await;
            retries_attempted += 1;
        }
    }

    fn elapsed_since(&self, start: SystemTime) -> Duration {
        self.time_source
            .now()
            .duration_since(start)
            .unwrap_or_default()
    }
}

/// Builder for [`Orchestrator`].
#[derive(Clone, Debug, Default)]
pub struct OrchestratorBuilder {
    retry_policy: Option<RetryPolicy>,
    retry_config: Option<RetryConfig>,
    timeout_config: Option<TimeoutConfig>,
    rate_limiter: Option<ClientRateLimiter>,
    retry_quota: Option<RetryQuota>,
    credentials_provider: Option<SharedCredentialsProvider>,
    time_source: Option<SharedTimeSource>,
    sleep_impl: Option<SharedAsyncSleep>,
}

impl OrchestratorBuilder {
    /// Sets the retry policy. Defaults to [`RetryPolicy::sdk_default`].
    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.set_retry_policy(Some(retry_policy));
        self
    }

    /// Sets the retry policy. Defaults to [`RetryPolicy::sdk_default`].
    pub fn set_retry_policy(&mut self, retry_policy: Option<RetryPolicy>) -> &mut Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Sets the client's retry configuration. Defaults to legacy mode.
    pub fn retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.set_retry_config(Some(retry_config));
        self
    }

    /// Sets the client's retry configuration. Defaults to legacy mode.
    pub fn set_retry_config(&mut self, retry_config: Option<RetryConfig>) -> &mut Self {
        self.retry_config = retry_config;
        self
    }

    /// Sets the operation and attempt timeouts. Defaults to no timeouts.
    pub fn timeout_config(mut self, timeout_config: TimeoutConfig) -> Self {
        self.set_timeout_config(Some(timeout_config));
        self
    }

    /// Sets the operation and attempt timeouts. Defaults to no timeouts.
    pub fn set_timeout_config(&mut self, timeout_config: Option<TimeoutConfig>) -> &mut Self {
        self.timeout_config = timeout_config;
        self
    }

    /// Shares an existing rate limiter, for example between clients talking to the same service.
    pub fn rate_limiter(mut self, rate_limiter: ClientRateLimiter) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    /// Shares an existing retry quota.
    pub fn retry_quota(mut self, retry_quota: RetryQuota) -> Self {
        self.retry_quota = Some(retry_quota);
        self
    }

    /// Sets the provider credentials are resolved from before the first attempt.
    pub fn credentials_provider(mut self, provider: impl ProvideCredentials + 'static) -> Self {
        self.set_credentials_provider(Some(SharedCredentialsProvider::new(provider)));
        self
    }

    /// Sets the provider credentials are resolved from before the first attempt.
    pub fn set_credentials_provider(
        &mut self,
        provider: Option<SharedCredentialsProvider>,
    ) -> &mut Self {
        self.credentials_provider = provider;
        self
    }

    /// Sets the clock. Defaults to the system clock.
    pub fn time_source(mut self, time_source: impl TimeSource + 'static) -> Self {
        self.time_source = Some(SharedTimeSource::new(time_source));
        self
    }

    /// Sets the sleep implementation. Defaults to [`TokioSleep`].
    pub fn sleep_impl(mut self, sleep_impl: impl AsyncSleep + 'static) -> Self {
        self.sleep_impl = Some(SharedAsyncSleep::new(sleep_impl));
        self
    }

    /// Builds the `Orchestrator`.
    ///
    /// Unless one was given, the rate limiter is created with the orchestrator's clock and
    /// sleep implementation.
    pub fn build(self) -> Orchestrator {
        let time_source = self.time_source.unwrap_or_default();
        let sleep_impl = self
            .sleep_impl
            .unwrap_or_else(|| SharedAsyncSleep::new(TokioSleep::new()));
        let rate_limiter = self.rate_limiter.unwrap_or_else(|| {
            ClientRateLimiter::builder()
                .time_source(time_source.clone())
                .sleep_impl(sleep_impl.clone())
                .build()
        });
        Orchestrator {
            retry: RetryPolicyAdapter::new(
                self.retry_policy.unwrap_or_default(),
                self.retry_config.unwrap_or_default(),
            ),
            timeout_config: self.timeout_config.unwrap_or_else(TimeoutConfig::disabled),
            rate_limiter,
            retry_quota: self.retry_quota.unwrap_or_default(),
            credentials_provider: self.credentials_provider,
            time_source,
            sleep_impl,
        }
    }
}
