/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::client::result::AttemptError;
use cos_smithy_types::retry::{ErrorKind, RetryKind};
use std::fmt;
use std::sync::Arc;

/// What a retry decision is made from: the failed attempt and how many retries came before it.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicyContext<'a> {
    error: &'a AttemptError,
    retry_kind: &'a RetryKind,
    retries_attempted: u32,
    max_error_retry_override: Option<u32>,
}

impl<'a> RetryPolicyContext<'a> {
    /// Creates a context for the given failed attempt.
    pub fn new(error: &'a AttemptError, retry_kind: &'a RetryKind, retries_attempted: u32) -> Self {
        Self {
            error,
            retry_kind,
            retries_attempted,
            max_error_retry_override: None,
        }
    }

    /// Sets a per-request retry budget that takes precedence over every configured one.
    pub fn with_max_error_retry_override(mut self, max_error_retry: Option<u32>) -> Self {
        self.max_error_retry_override = max_error_retry;
        self
    }

    /// The error of the attempt that just failed.
    pub fn error(&self) -> &'a AttemptError {
        self.error
    }

    /// How the error was classified.
    pub fn retry_kind(&self) -> &'a RetryKind {
        self.retry_kind
    }

    /// Retries already made for this request; `0` after the first attempt fails.
    pub fn retries_attempted(&self) -> u32 {
        self.retries_attempted
    }

    /// The per-request retry budget, if one was set.
    pub fn max_error_retry_override(&self) -> Option<u32> {
        self.max_error_retry_override
    }

    /// True if the error was classified as throttling.
    pub fn is_throttling_error(&self) -> bool {
        matches!(self.retry_kind, RetryKind::Error(ErrorKind::ThrottlingError))
    }
}

/// A retry condition implemented by a closure.
#[derive(Clone)]
pub struct SharedRetryCondition(Arc<dyn Fn(&RetryPolicyContext<'_>) -> bool + Send + Sync>);

impl SharedRetryCondition {
    /// Wraps `condition` so it can be shared between policies.
    pub fn new(condition: impl Fn(&RetryPolicyContext<'_>) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(condition))
    }
}

impl fmt::Debug for SharedRetryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedRetryCondition")
    }
}

/// Decides whether a failed attempt may be retried, before the retry budget is consulted.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub enum RetryCondition {
    /// Retry every error the classifier considers retryable.
    #[default]
    SdkDefault,
    /// Never retry.
    Never,
    /// Retry when the closure returns `true`.
    Custom(SharedRetryCondition),
}

impl RetryCondition {
    /// A condition backed by `condition`.
    pub fn custom(
        condition: impl Fn(&RetryPolicyContext<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        RetryCondition::Custom(SharedRetryCondition::new(condition))
    }

    /// True if the failed attempt described by `ctx` may be retried.
    pub fn should_retry(&self, ctx: &RetryPolicyContext<'_>) -> bool {
        match self {
            RetryCondition::SdkDefault => {
                matches!(ctx.retry_kind(), RetryKind::Error(kind) if kind.is_retryable())
            }
            RetryCondition::Never => false,
            RetryCondition::Custom(condition) => (condition.0)(ctx),
        }
    }
}
