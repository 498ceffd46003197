/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Classification of failed attempts into retryable and non-retryable errors.
//!
//! In order of priority:
//! 1. I/O errors and attempt timeouts are transient.
//! 2. Errors the transport flagged as throttling, HTTP 429 and known throttling codes are
//!    throttling errors.
//! 3. Errors flagged as clock skew and known clock skew codes are clock skew errors.
//! 4. Known transient codes are transient errors.
//! 5. 500, 502, 503 and 504 responses are server errors.
//! 6. Everything else is not retried.

use crate::client::result::{AttemptError, ServiceError};
use cos_smithy_types::retry::{ErrorKind, ProvideErrorKind, RetryKind};

const THROTTLING_ERRORS: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestThrottledException",
    "TooManyRequestsException",
    "ProvisionedThroughputExceededException",
    "TransactionInProgressException",
    "RequestLimitExceeded",
    "BandwidthLimitExceeded",
    "LimitExceededException",
    "RequestThrottled",
    "SlowDown",
    "PriorRequestNotComplete",
    "EC2ThrottledException",
];
const CLOCK_SKEW_ERRORS: &[&str] = &[
    "RequestTimeTooSkewed",
    "RequestExpired",
    "InvalidSignatureException",
    "SignatureDoesNotMatch",
    "AuthFailure",
    "RequestInTheFuture",
];
const TRANSIENT_ERRORS: &[&str] = &["RequestTimeout", "RequestTimeoutException", "InternalError"];
const TRANSIENT_ERROR_STATUS_CODES: &[u16] = &[500, 502, 503, 504];
const THROTTLING_STATUS_CODE: u16 = 429;

/// Error code for a HEAD response, which has no body to carry one.
///
/// The status line is used instead: `503 Slow Down` becomes `SlowDown`.
pub(crate) fn head_response_error_code(
    status: http::StatusCode,
    reason_phrase: Option<&str>,
) -> Option<String> {
    let reason_phrase = reason_phrase.or_else(|| status.canonical_reason())?;
    let status_line = format!("{} {}", status.as_u16(), reason_phrase);
    let code: String = status_line
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

/// True if `code` is one of the known throttling error codes.
pub fn is_throttling_code(code: &str) -> bool {
    THROTTLING_ERRORS.contains(&code)
}

/// True if `code` is one of the known clock skew error codes.
pub fn is_clock_skew_code(code: &str) -> bool {
    CLOCK_SKEW_ERRORS.contains(&code)
}

impl ProvideErrorKind for ServiceError {
    fn retryable_error_kind(&self) -> Option<ErrorKind> {
        let status = self.status().as_u16();
        let code = ServiceError::code(self);
        if self.is_throttling()
            || status == THROTTLING_STATUS_CODE
            || code.is_some_and(is_throttling_code)
        {
            return Some(ErrorKind::ThrottlingError);
        }
        if self.is_clock_skew() || code.is_some_and(is_clock_skew_code) {
            return Some(ErrorKind::ClockSkewError);
        }
        if code.is_some_and(|code| TRANSIENT_ERRORS.contains(&code)) {
            return Some(ErrorKind::TransientError);
        }
        if TRANSIENT_ERROR_STATUS_CODES.contains(&status) {
            return Some(ErrorKind::ServerError);
        }
        None
    }

    fn code(&self) -> Option<&str> {
        ServiceError::code(self)
    }
}

impl ProvideErrorKind for AttemptError {
    fn retryable_error_kind(&self) -> Option<ErrorKind> {
        match self {
            AttemptError::Io(_) | AttemptError::Timeout(_) => Some(ErrorKind::TransientError),
            AttemptError::Service(err) => err.retryable_error_kind(),
            AttemptError::Other(_) => None,
        }
    }

    fn code(&self) -> Option<&str> {
        self.as_service_error().and_then(ServiceError::code)
    }
}

/// Classifies a failed attempt.
pub fn classify_error(error: &AttemptError) -> RetryKind {
    match error.retryable_error_kind() {
        Some(kind) => RetryKind::Error(kind),
        None => RetryKind::UnretryableFailure,
    }
}

#[cfg(test)]
mod test {
    use super::{classify_error, head_response_error_code};
    use crate::client::result::{AttemptError, ServiceError};
    use cos_smithy_types::retry::{ErrorKind, ProvideErrorKind, RetryKind};
    use http::{Method, StatusCode};
    use std::time::Duration;

    fn service_error(status: u16, code: Option<&str>) -> AttemptError {
        let mut builder = ServiceError::builder(StatusCode::from_u16(status).unwrap());
        if let Some(code) = code {
            builder = builder.code(code);
        }
        builder.build().into()
    }

    #[test]
    fn io_and_timeouts_are_transient() {
        assert_eq!(
            RetryKind::Error(ErrorKind::TransientError),
            classify_error(&AttemptError::io("connection reset"))
        );
        assert_eq!(
            RetryKind::Error(ErrorKind::TransientError),
            classify_error(&AttemptError::Timeout(Duration::from_secs(3)))
        );
    }

    #[test]
    fn other_errors_are_never_retried() {
        assert_eq!(
            RetryKind::UnretryableFailure,
            classify_error(&AttemptError::other("request could not be signed"))
        );
    }

    #[test]
    fn classify_by_error_code() {
        assert_eq!(
            RetryKind::Error(ErrorKind::ThrottlingError),
            classify_error(&service_error(400, Some("Throttling")))
        );
        assert_eq!(
            RetryKind::Error(ErrorKind::ThrottlingError),
            classify_error(&service_error(503, Some("SlowDown")))
        );
        assert_eq!(
            RetryKind::Error(ErrorKind::ClockSkewError),
            classify_error(&service_error(403, Some("RequestTimeTooSkewed")))
        );
        assert_eq!(
            RetryKind::Error(ErrorKind::TransientError),
            classify_error(&service_error(400, Some("RequestTimeout")))
        );
    }

    #[test]
    fn classify_by_response_status() {
        assert_eq!(
            RetryKind::Error(ErrorKind::ThrottlingError),
            classify_error(&service_error(429, None))
        );
        for status in [500, 502, 503, 504] {
            assert_eq!(
                RetryKind::Error(ErrorKind::ServerError),
                classify_error(&service_error(status, None))
            );
        }
        assert_eq!(
            RetryKind::UnretryableFailure,
            classify_error(&service_error(501, None))
        );
        assert_eq!(
            RetryKind::UnretryableFailure,
            classify_error(&service_error(404, Some("NoSuchKey")))
        );
    }

    #[test]
    fn transport_flags_take_priority_over_status() {
        let throttled = ServiceError::builder(StatusCode::BAD_REQUEST)
            .throttling(true)
            .build();
        assert_eq!(
            Some(ErrorKind::ThrottlingError),
            throttled.retryable_error_kind()
        );

        let skewed = ServiceError::builder(StatusCode::INTERNAL_SERVER_ERROR)
            .clock_skew(true)
            .build();
        assert_eq!(Some(ErrorKind::ClockSkewError), skewed.retryable_error_kind());
    }

    #[test]
    fn head_responses_use_the_status_line_as_code() {
        assert_eq!(
            Some("SlowDown".to_owned()),
            head_response_error_code(StatusCode::SERVICE_UNAVAILABLE, Some("Slow Down"))
        );
        assert_eq!(
            Some("ServiceUnavailable".to_owned()),
            head_response_error_code(StatusCode::SERVICE_UNAVAILABLE, None)
        );

        let err = ServiceError::builder(StatusCode::SERVICE_UNAVAILABLE)
            .method(Method::HEAD)
            .reason_phrase("Slow Down")
            .build();
        assert_eq!(Some("SlowDown"), err.code());
        assert_eq!(Some(ErrorKind::ThrottlingError), err.retryable_error_kind());
    }

    #[test]
    fn head_responses_keep_a_body_code() {
        let err = ServiceError::builder(StatusCode::FORBIDDEN)
            .method(Method::HEAD)
            .code("RequestTimeTooSkewed")
            .build();
        assert_eq!(Some("RequestTimeTooSkewed"), err.code());
    }

    #[test]
    fn other_methods_do_not_synthesize_a_code() {
        let err = ServiceError::builder(StatusCode::SERVICE_UNAVAILABLE)
            .reason_phrase("Slow Down")
            .build();
        assert_eq!(None, err.code());
        assert_eq!(Some(ErrorKind::ServerError), err.retryable_error_kind());
    }
}
