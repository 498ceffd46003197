/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Types for the outcome of a single attempt and of a whole request.

use crate::client::retries::classifiers::head_response_error_code;
use cos_credential_types::provider::CredentialsError;
use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Boxed error type used for opaque causes.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// An error response returned by the service.
///
/// The transport fills this in from the HTTP response; nothing here parses bodies.
#[derive(Debug, Clone)]
pub struct ServiceError {
    status: http::StatusCode,
    method: http::Method,
    code: Option<String>,
    message: Option<String>,
    reason_phrase: Option<String>,
    throttling: bool,
    clock_skew: bool,
}

impl ServiceError {
    /// Creates a builder for a service error with the given status code.
    pub fn builder(status: http::StatusCode) -> ServiceErrorBuilder {
        ServiceErrorBuilder {
            status,
            method: http::Method::GET,
            code: None,
            message: None,
            reason_phrase: None,
            throttling: false,
            clock_skew: false,
        }
    }

    /// HTTP status code of the error response.
    pub fn status(&self) -> http::StatusCode {
        self.status
    }

    /// HTTP method of the request that failed.
    pub fn method(&self) -> &http::Method {
        &self.method
    }

    /// The error code from the response body.
    ///
    /// For a HEAD response without a code this is derived from the status line instead.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// The error message parsed from the response body, if there was one.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Reason phrase of the status line, falling back to the canonical phrase for the status.
    pub fn reason_phrase(&self) -> Option<&str> {
        self.reason_phrase
            .as_deref()
            .or_else(|| self.status.canonical_reason())
    }

    /// True when the transport already knows this to be a throttling response.
    pub fn is_throttling(&self) -> bool {
        self.throttling
    }

    /// True when the transport already knows this to be a clock skew response.
    pub fn is_clock_skew(&self) -> bool {
        self.clock_skew
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service error (status {})", self.status.as_u16())?;
        if let Some(code) = &self.code {
            write!(f, ": {code}")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl Error for ServiceError {}

/// Builder for [`ServiceError`].
#[derive(Debug, Clone)]
pub struct ServiceErrorBuilder {
    status: http::StatusCode,
    method: http::Method,
    code: Option<String>,
    message: Option<String>,
    reason_phrase: Option<String>,
    throttling: bool,
    clock_skew: bool,
}

impl ServiceErrorBuilder {
    /// HTTP method of the request that failed. Defaults to `GET`.
    pub fn method(mut self, method: http::Method) -> Self {
        self.method = method;
        self
    }

    /// Error code from the response body.
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Error message from the response body.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Reason phrase of the status line, when it differs from the canonical one.
    pub fn reason_phrase(mut self, reason_phrase: impl Into<String>) -> Self {
        self.reason_phrase = Some(reason_phrase.into());
        self
    }

    /// Marks the response as throttling regardless of its code.
    pub fn throttling(mut self, throttling: bool) -> Self {
        self.throttling = throttling;
        self
    }

    /// Marks the response as clock skew regardless of its code.
    pub fn clock_skew(mut self, clock_skew: bool) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    /// Builds the `ServiceError`.
    ///
    /// A HEAD response without a code gets one derived from its status line.
    pub fn build(self) -> ServiceError {
        let code = match self.code {
            None if self.method == http::Method::HEAD => {
                head_response_error_code(self.status, self.reason_phrase.as_deref())
            }
            code => code,
        };
        ServiceError {
            status: self.status,
            method: self.method,
            code,
            message: self.message,
            reason_phrase: self.reason_phrase,
            throttling: self.throttling,
            clock_skew: self.clock_skew,
        }
    }
}

/// Why a single attempt failed, as reported by the transport.
#[derive(Debug)]
#[non_exhaustive]
pub enum AttemptError {
    /// The request could not be written or the response could not be read.
    Io(BoxError),
    /// The attempt did not complete in time.
    Timeout(Duration),
    /// The service returned an error response.
    Service(ServiceError),
    /// Any other failure. Never retried.
    Other(BoxError),
}

impl AttemptError {
    /// Creates an I/O error.
    pub fn io(source: impl Into<BoxError>) -> Self {
        AttemptError::Io(source.into())
    }

    /// Creates an error that is never retried.
    pub fn other(source: impl Into<BoxError>) -> Self {
        AttemptError::Other(source.into())
    }

    /// Returns the service error, if this was one.
    pub fn as_service_error(&self) -> Option<&ServiceError> {
        match self {
            AttemptError::Service(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ServiceError> for AttemptError {
    fn from(err: ServiceError) -> Self {
        AttemptError::Service(err)
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Io(_) => write!(f, "io error"),
            AttemptError::Timeout(after) => {
                write!(f, "attempt timed out after {}ms", after.as_millis())
            }
            AttemptError::Service(err) => write!(f, "{err}"),
            AttemptError::Other(_) => write!(f, "unexpected error"),
        }
    }
}

impl Error for AttemptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AttemptError::Io(err) | AttemptError::Other(err) => Some(err.as_ref() as _),
            AttemptError::Service(err) => Some(err),
            AttemptError::Timeout(_) => None,
        }
    }
}

/// The last attempt error of a failed request, with how long the request took.
#[derive(Debug)]
pub struct FailedRequest {
    last_error: AttemptError,
    attempts: u32,
    elapsed: Duration,
}

impl FailedRequest {
    pub(crate) fn new(last_error: AttemptError, attempts: u32, elapsed: Duration) -> Self {
        Self {
            last_error,
            attempts,
            elapsed,
        }
    }

    /// The error of the final attempt.
    pub fn last_error(&self) -> &AttemptError {
        &self.last_error
    }

    /// Consumes this, returning the error of the final attempt.
    pub fn into_last_error(self) -> AttemptError {
        self.last_error
    }

    /// How many attempts were made, including the first one.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wall-clock time from the start of the request until it failed.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Failed request outcome
#[derive(Debug)]
#[non_exhaustive]
pub enum SdkError {
    /// Credentials could not be resolved, so nothing was sent.
    CredentialsUnavailable(CredentialsError),

    /// The client-side rate limiter had no send tokens and fast-fail was requested.
    SendTokensUnavailable {
        /// Attempts sent before the limiter refused to send another
        attempts: u32,
        /// Time since the request started
        elapsed: Duration,
    },

    /// The last attempt failed with an error that is not retried.
    NotRetryable(FailedRequest),

    /// Every attempt failed and the retry budget is spent.
    RetriesExhausted(FailedRequest),

    /// The last attempt failed with a retryable error, but the client-wide retry quota is empty.
    QuotaExhausted(FailedRequest),

    /// The request did not finish within the operation timeout.
    OperationTimedOut {
        /// Attempts started before the deadline
        attempts: u32,
        /// Time since the request started
        elapsed: Duration,
        /// The most recent attempt error, when the deadline was hit between attempts
        last_error: Option<AttemptError>,
    },
}

impl SdkError {
    /// Number of attempts made before the request failed.
    pub fn attempts(&self) -> u32 {
        match self {
            SdkError::CredentialsUnavailable(_) => 0,
            SdkError::SendTokensUnavailable { attempts, .. }
            | SdkError::OperationTimedOut { attempts, .. } => *attempts,
            SdkError::NotRetryable(failed)
            | SdkError::RetriesExhausted(failed)
            | SdkError::QuotaExhausted(failed) => failed.attempts(),
        }
    }

    /// Time from the start of the request until it failed.
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            SdkError::CredentialsUnavailable(_) => None,
            SdkError::SendTokensUnavailable { elapsed, .. }
            | SdkError::OperationTimedOut { elapsed, .. } => Some(*elapsed),
            SdkError::NotRetryable(failed)
            | SdkError::RetriesExhausted(failed)
            | SdkError::QuotaExhausted(failed) => Some(failed.elapsed()),
        }
    }

    /// The error of the final attempt, if one was made.
    pub fn last_error(&self) -> Option<&AttemptError> {
        match self {
            SdkError::NotRetryable(failed)
            | SdkError::RetriesExhausted(failed)
            | SdkError::QuotaExhausted(failed) => Some(failed.last_error()),
            SdkError::OperationTimedOut { last_error, .. } => last_error.as_ref(),
            SdkError::CredentialsUnavailable(_) | SdkError::SendTokensUnavailable { .. } => None,
        }
    }
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdkError::CredentialsUnavailable(_) => write!(f, "failed to load credentials"),
            SdkError::SendTokensUnavailable { attempts, elapsed } => write!(
                f,
                "unable to acquire send tokens (attempts: {attempts}, elapsed: {}ms)",
                elapsed.as_millis()
            ),
            SdkError::NotRetryable(failed) => write!(
                f,
                "request failed with a non-retryable error (attempts: {}, elapsed: {}ms)",
                failed.attempts,
                failed.elapsed.as_millis()
            ),
            SdkError::RetriesExhausted(failed) => write!(
                f,
                "request failed after exhausting retries (attempts: {}, elapsed: {}ms)",
                failed.attempts,
                failed.elapsed.as_millis()
            ),
            SdkError::QuotaExhausted(failed) => write!(
                f,
                "request failed and the retry quota is exhausted (attempts: {}, elapsed: {}ms)",
                failed.attempts,
                failed.elapsed.as_millis()
            ),
            SdkError::OperationTimedOut {
                attempts, elapsed, ..
            } => write!(
                f,
                "operation timed out (attempts: {attempts}, elapsed: {}ms)",
                elapsed.as_millis()
            ),
        }
    }
}

impl Error for SdkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SdkError::CredentialsUnavailable(err) => Some(err),
            SdkError::NotRetryable(failed)
            | SdkError::RetriesExhausted(failed)
            | SdkError::QuotaExhausted(failed) => Some(&failed.last_error),
            SdkError::OperationTimedOut { last_error, .. } => {
                last_error.as_ref().map(|err| err as _)
            }
            SdkError::SendTokensUnavailable { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AttemptError, FailedRequest, SdkError, ServiceError};
    use std::error::Error;
    use std::time::Duration;

    #[test]
    fn reason_phrase_falls_back_to_the_canonical_phrase() {
        let err = ServiceError::builder(http::StatusCode::SERVICE_UNAVAILABLE).build();
        assert_eq!(Some("Service Unavailable"), err.reason_phrase());

        let err = ServiceError::builder(http::StatusCode::SERVICE_UNAVAILABLE)
            .reason_phrase("Slow Down")
            .build();
        assert_eq!(Some("Slow Down"), err.reason_phrase());
    }

    #[test]
    fn failures_report_attempts_and_elapsed_time() {
        let err = SdkError::RetriesExhausted(FailedRequest::new(
            ServiceError::builder(http::StatusCode::INTERNAL_SERVER_ERROR)
                .code("InternalError")
                .build()
                .into(),
            4,
            Duration::from_millis(1500),
        ));
        assert_eq!(4, err.attempts());
        assert_eq!(Some(Duration::from_millis(1500)), err.elapsed());
        assert_eq!(
            "request failed after exhausting retries (attempts: 4, elapsed: 1500ms)",
            err.to_string()
        );
        assert_eq!(
            "service error (status 500): InternalError",
            err.source().expect("has a source").to_string()
        );
    }

    #[test]
    fn io_errors_keep_their_cause() {
        let err = AttemptError::io("connection reset");
        assert_eq!("io error", err.to_string());
        assert_eq!("connection reset", err.source().unwrap().to_string());
    }
}
