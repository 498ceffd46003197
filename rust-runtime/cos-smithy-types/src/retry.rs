/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! This module defines types that describe when to retry given a response.

use std::fmt;
use std::str::FromStr;

/// Type of error that occurred when making a request.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// This is a connection level error such as a socket timeout, socket connect error,
    /// tls negotiation timeout etc...
    ///
    /// Typically these should never be applied for non-idempotent request types
    /// since in this scenario, it's impossible to know whether the operation had
    /// a side effect on the server.
    TransientError,

    /// An error where the server explicitly told the client to back off, such as a 429 or 503 HTTP error.
    ThrottlingError,

    /// Server error that isn't explicitly throttling but is considered by the client
    /// to be something that should be retried.
    ServerError,

    /// The request was rejected because the client clock disagrees with the server clock.
    ///
    /// Retrying after the clock offset has been corrected is expected to succeed.
    ClockSkewError,

    /// Doesn't count against any budgets. This could be something like a 401 challenge in Http.
    ClientError,
}

impl ErrorKind {
    /// True for the kinds that the default retry condition will retry.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::ClientError)
    }

    /// True when the error should push the adaptive rate limiter into its throttled state.
    pub fn is_throttling(self) -> bool {
        matches!(self, ErrorKind::ThrottlingError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransientError => write!(f, "transient error"),
            Self::ThrottlingError => write!(f, "throttling error"),
            Self::ServerError => write!(f, "server error"),
            Self::ClockSkewError => write!(f, "clock skew error"),
            Self::ClientError => write!(f, "client error"),
        }
    }
}

/// Trait that provides an `ErrorKind` and an error code.
pub trait ProvideErrorKind {
    /// Returns the `ErrorKind`.
    ///
    /// If the error kind cannot be determined (eg. the error is unmodeled at the error kind depends
    /// on an HTTP status code, return `None`.
    fn retryable_error_kind(&self) -> Option<ErrorKind>;

    /// Returns the `code` for this error if one exists
    fn code(&self) -> Option<&str>;
}

/// `RetryKind` describes how a request MAY be retried for a given response
///
/// A `RetryKind` describes how a response MAY be retried; it does not mandate retry behavior.
/// The actual retry behavior is at the sole discretion of the retry policy in place.
#[non_exhaustive]
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum RetryKind {
    /// The response was a failure that should be retried, classified as the given `ErrorKind`.
    Error(ErrorKind),

    /// The response was a failure that should _not_ be retried.
    UnretryableFailure,

    /// The response was successful, so no retry is necessary.
    Unnecessary,
}

/// Retry mode of a client.
///
/// The mode decides the default retry budget and whether the adaptive client-side rate limiter
/// and the retry quota are in play.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RetryMode {
    /// The behavior of older SDKs: three retries, no retry quota, no client-side rate limiting.
    #[default]
    Legacy,

    /// Standard retry mode: a larger retry budget guarded by a client-wide retry quota.
    Standard,

    /// Standard mode plus a client-side rate limiter that slows the send rate down once the
    /// service starts throttling.
    Adaptive,
}

impl RetryMode {
    /// Retries allowed when neither the policy nor the client configuration picks a number.
    pub fn default_max_error_retry(self) -> u32 {
        match self {
            RetryMode::Legacy => 3,
            RetryMode::Standard | RetryMode::Adaptive => 4,
        }
    }

    /// True when this mode consults the client-side rate limiter before each attempt.
    pub fn is_adaptive(self) -> bool {
        matches!(self, RetryMode::Adaptive)
    }
}

const VALID_RETRY_MODES: &[RetryMode] = &[
    RetryMode::Legacy,
    RetryMode::Standard,
    RetryMode::Adaptive,
];

impl FromStr for RetryMode {
    type Err = RetryModeParseErr;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let string = string.trim();
        if string.eq_ignore_ascii_case("legacy") {
            Ok(Self::Legacy)
        } else if string.eq_ignore_ascii_case("standard") {
            Ok(Self::Standard)
        } else if string.eq_ignore_ascii_case("adaptive") {
            Ok(Self::Adaptive)
        } else {
            Err(RetryModeParseErr(string.to_owned()))
        }
    }
}

impl fmt::Display for RetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryMode::Legacy => write!(f, "legacy"),
            RetryMode::Standard => write!(f, "standard"),
            RetryMode::Adaptive => write!(f, "adaptive"),
        }
    }
}

/// Failure to parse a `RetryMode` from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryModeParseErr(String);

impl fmt::Display for RetryModeParseErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error parsing string '{}' as RetryMode, valid options are: ",
            self.0
        )?;
        let mut first = true;
        for mode in VALID_RETRY_MODES {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{mode}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for RetryModeParseErr {}

/// Builder for [`RetryConfig`].
#[non_exhaustive]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RetryConfigBuilder {
    mode: Option<RetryMode>,
    max_attempts: Option<u32>,
    max_error_retry: Option<u32>,
    fast_fail_rate_limiting: Option<bool>,
    throttle_retries: Option<bool>,
}

impl RetryConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the retry mode.
    pub fn set_mode(&mut self, retry_mode: Option<RetryMode>) -> &mut Self {
        self.mode = retry_mode;
        self
    }

    /// Sets the retry mode.
    pub fn mode(mut self, mode: RetryMode) -> Self {
        self.set_mode(Some(mode));
        self
    }

    /// Sets the max attempts, counting the initial request. This is the `AWS_MAX_ATTEMPTS`
    /// setting, so `1` means "never retry".
    pub fn set_max_attempts(&mut self, max_attempts: Option<u32>) -> &mut Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the max attempts, counting the initial request.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.set_max_attempts(Some(max_attempts));
        self
    }

    /// Sets the client-wide number of retries. Only honored by retry policies that opt in.
    pub fn set_max_error_retry(&mut self, max_error_retry: Option<u32>) -> &mut Self {
        self.max_error_retry = max_error_retry;
        self
    }

    /// Sets the client-wide number of retries. Only honored by retry policies that opt in.
    pub fn max_error_retry(mut self, max_error_retry: u32) -> Self {
        self.set_max_error_retry(Some(max_error_retry));
        self
    }

    /// When set, an adaptive-mode request fails immediately instead of waiting for send capacity.
    pub fn set_fast_fail_rate_limiting(&mut self, fast_fail: Option<bool>) -> &mut Self {
        self.fast_fail_rate_limiting = fast_fail;
        self
    }

    /// When set, an adaptive-mode request fails immediately instead of waiting for send capacity.
    pub fn fast_fail_rate_limiting(mut self, fast_fail: bool) -> Self {
        self.set_fast_fail_rate_limiting(Some(fast_fail));
        self
    }

    /// Enables or disables the client-wide retry quota.
    pub fn set_throttle_retries(&mut self, throttle_retries: Option<bool>) -> &mut Self {
        self.throttle_retries = throttle_retries;
        self
    }

    /// Enables or disables the client-wide retry quota.
    pub fn throttle_retries(mut self, throttle_retries: bool) -> Self {
        self.set_throttle_retries(Some(throttle_retries));
        self
    }

    /// Merge two builders together. Values from `other` will only be used as a fallback for
    /// values from `self`. Useful for merging configs from different sources together when you
    /// want to handle "precedence" per value instead of at the config level.
    pub fn take_unset_from(self, other: Self) -> Self {
        Self {
            mode: self.mode.or(other.mode),
            max_attempts: self.max_attempts.or(other.max_attempts),
            max_error_retry: self.max_error_retry.or(other.max_error_retry),
            fast_fail_rate_limiting: self
                .fast_fail_rate_limiting
                .or(other.fast_fail_rate_limiting),
            throttle_retries: self.throttle_retries.or(other.throttle_retries),
        }
    }

    /// Builds a `RetryConfig`.
    pub fn build(self) -> RetryConfig {
        let mode = self.mode.unwrap_or_default();
        RetryConfig {
            mode,
            max_attempts: self.max_attempts,
            max_error_retry: self.max_error_retry,
            fast_fail_rate_limiting: self.fast_fail_rate_limiting.unwrap_or(false),
            throttle_retries: self
                .throttle_retries
                .unwrap_or(mode != RetryMode::Legacy),
        }
    }
}

/// Client-wide retry configuration.
///
/// The retry policy of a request decides how the fields are combined, see
/// `RetryPolicyAdapter` in `cos-smithy-runtime`.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    mode: RetryMode,
    max_attempts: Option<u32>,
    max_error_retry: Option<u32>,
    fast_fail_rate_limiting: bool,
    throttle_retries: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfigBuilder::new().build()
    }
}

impl RetryConfig {
    /// Creates a builder.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Default legacy-mode configuration.
    pub fn legacy() -> Self {
        Self::builder().mode(RetryMode::Legacy).build()
    }

    /// Default standard-mode configuration.
    pub fn standard() -> Self {
        Self::builder().mode(RetryMode::Standard).build()
    }

    /// Default adaptive-mode configuration.
    pub fn adaptive() -> Self {
        Self::builder().mode(RetryMode::Adaptive).build()
    }

    /// Returns the retry mode.
    pub fn mode(&self) -> RetryMode {
        self.mode
    }

    /// Returns the configured max attempts, counting the initial request.
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Returns the client-wide number of retries.
    pub fn max_error_retry(&self) -> Option<u32> {
        self.max_error_retry
    }

    /// Returns true if adaptive-mode requests fail instead of waiting for send capacity.
    pub fn fast_fail_rate_limiting(&self) -> bool {
        self.fast_fail_rate_limiting
    }

    /// Returns true if retries draw from the client-wide retry quota.
    pub fn throttle_retries(&self) -> bool {
        self.throttle_retries
    }

    /// Sets the max attempts, counting the initial request.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Sets the client-wide number of retries.
    pub fn with_max_error_retry(mut self, max_error_retry: u32) -> Self {
        self.max_error_retry = Some(max_error_retry);
        self
    }

    /// Enables or disables fast-fail rate limiting.
    pub fn with_fast_fail_rate_limiting(mut self, fast_fail: bool) -> Self {
        self.fast_fail_rate_limiting = fast_fail;
        self
    }

    /// Enables or disables the client-wide retry quota.
    pub fn with_throttle_retries(mut self, throttle_retries: bool) -> Self {
        self.throttle_retries = throttle_retries;
        self
    }
}
