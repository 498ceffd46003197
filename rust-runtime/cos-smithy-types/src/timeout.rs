/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! This module defines types that describe timeouts for a request and its attempts.

use std::time::Duration;

/// Builder for [`TimeoutConfig`].
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeoutConfigBuilder {
    operation_timeout: Option<Duration>,
    operation_attempt_timeout: Option<Duration>,
}

impl TimeoutConfigBuilder {
    /// Creates a new builder with no timeouts set.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the operation timeout.
    ///
    /// The operation timeout bounds the whole request: every attempt, every backoff sleep and
    /// every wait on the client-side rate limiter.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Sets the operation timeout. Passing `None` removes it.
    pub fn set_operation_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.operation_timeout = timeout;
        self
    }

    /// Sets the operation attempt timeout.
    ///
    /// An attempt that exceeds it is reported as a timeout and may be retried.
    pub fn operation_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.operation_attempt_timeout = Some(timeout);
        self
    }

    /// Sets the operation attempt timeout. Passing `None` removes it.
    pub fn set_operation_attempt_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.operation_attempt_timeout = timeout;
        self
    }

    /// Merges two builders. Values set on `self` win.
    pub fn take_unset_from(self, other: Self) -> Self {
        Self {
            operation_timeout: self.operation_timeout.or(other.operation_timeout),
            operation_attempt_timeout: self
                .operation_attempt_timeout
                .or(other.operation_attempt_timeout),
        }
    }

    /// Builds a `TimeoutConfig`.
    pub fn build(self) -> TimeoutConfig {
        TimeoutConfig {
            operation_timeout: self.operation_timeout,
            operation_attempt_timeout: self.operation_attempt_timeout,
        }
    }
}

/// Top-level configuration for timeouts.
///
/// No timeouts are set by default, matching a retry loop that is bounded only by its attempt
/// count.
#[non_exhaustive]
#[derive(Clone, PartialEq, Debug, Default)]
pub struct TimeoutConfig {
    operation_timeout: Option<Duration>,
    operation_attempt_timeout: Option<Duration>,
}

impl TimeoutConfig {
    /// Creates a builder.
    pub fn builder() -> TimeoutConfigBuilder {
        TimeoutConfigBuilder::new()
    }

    /// Creates a `TimeoutConfig` with no timeouts set.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Returns the operation timeout, if set.
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout
    }

    /// Returns the operation attempt timeout, if set.
    pub fn operation_attempt_timeout(&self) -> Option<Duration> {
        self.operation_attempt_timeout
    }

    /// Returns true if any of the timeouts are set.
    pub fn has_timeouts(&self) -> bool {
        self.operation_timeout.is_some() || self.operation_attempt_timeout.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::{TimeoutConfig, TimeoutConfigBuilder};
    use std::time::Duration;

    #[test]
    fn nothing_is_set_by_default() {
        let config = TimeoutConfig::default();
        assert!(!config.has_timeouts());
        assert_eq!(None, config.operation_timeout());
    }

    #[test]
    fn builder_values_take_precedence() {
        let config = TimeoutConfigBuilder::new()
            .operation_timeout(Duration::from_secs(5))
            .take_unset_from(
                TimeoutConfigBuilder::new()
                    .operation_timeout(Duration::from_secs(60))
                    .operation_attempt_timeout(Duration::from_secs(2)),
            )
            .build();
        assert_eq!(Some(Duration::from_secs(5)), config.operation_timeout());
        assert_eq!(
            Some(Duration::from_secs(2)),
            config.operation_attempt_timeout()
        );
    }
}
