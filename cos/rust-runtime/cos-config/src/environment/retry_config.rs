/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::os_shim_internal::Env;
use cos_smithy_types::retry::{RetryConfig, RetryConfigBuilder, RetryMode, RetryModeParseErr};
use std::error::Error;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

const ENV_VAR_MAX_ATTEMPTS: &str = "AWS_MAX_ATTEMPTS";
const ENV_VAR_RETRY_MODE: &str = "AWS_RETRY_MODE";

/// Load a retry config from environment variables
///
/// This provider checks `AWS_RETRY_MODE` and `AWS_MAX_ATTEMPTS`. Values that are set but
/// invalid are reported as a [`RetryConfigError`].
#[derive(Debug, Default)]
pub struct EnvironmentVariableRetryConfigProvider {
    env: Env,
}

impl EnvironmentVariableRetryConfigProvider {
    /// Create a new `EnvironmentVariableRetryConfigProvider`
    pub fn new() -> Self {
        EnvironmentVariableRetryConfigProvider { env: Env::real() }
    }

    #[doc(hidden)]
    /// Create a retry config provider from a given `Env`
    ///
    /// This method is used for tests that need to override environment variables.
    pub fn new_with_env(env: Env) -> Self {
        EnvironmentVariableRetryConfigProvider { env }
    }

    /// Reads the environment into a builder.
    ///
    /// Variables that are not set stay unset in the builder, so values configured in code can
    /// take precedence with [`RetryConfigBuilder::take_unset_from`]:
    ///
    /// ```rust
    /// use cos_config::environment::EnvironmentVariableRetryConfigProvider;
    /// use cos_config::os_shim_internal::Env;
    /// use cos_smithy_types::retry::{RetryConfig, RetryMode};
    ///
    /// let env = Env::from_slice(&[("AWS_RETRY_MODE", "adaptive"), ("AWS_MAX_ATTEMPTS", "2")]);
    /// let from_env = EnvironmentVariableRetryConfigProvider::new_with_env(env)
    ///     .retry_config_builder()
    ///     .unwrap();
    /// let config = RetryConfig::builder()
    ///     .max_attempts(5)
    ///     .take_unset_from(from_env)
    ///     .build();
    /// assert_eq!(config.mode(), RetryMode::Adaptive);
    /// assert_eq!(config.max_attempts(), Some(5));
    /// ```
    pub fn retry_config_builder(&self) -> Result<RetryConfigBuilder, RetryConfigError> {
        let mut builder = RetryConfig::builder();

        if let Ok(max_attempts) = self.env.get(ENV_VAR_MAX_ATTEMPTS) {
            let max_attempts = max_attempts
                .trim()
                .parse::<u32>()
                .map_err(|source| RetryConfigError::FailedToParseMaxAttempts { source })?;
            if max_attempts == 0 {
                return Err(RetryConfigError::MaxAttemptsMustNotBeZero);
            }
            builder.set_max_attempts(Some(max_attempts));
        }

        if let Ok(retry_mode) = self.env.get(ENV_VAR_RETRY_MODE) {
            let retry_mode = RetryMode::from_str(&retry_mode)
                .map_err(|source| RetryConfigError::InvalidRetryMode { source })?;
            builder.set_mode(Some(retry_mode));
        }

        Ok(builder)
    }

    /// Builds a `RetryConfig` from the environment, or `None` if neither variable is set.
    pub fn retry_config(&self) -> Result<Option<RetryConfig>, RetryConfigError> {
        let builder = self.retry_config_builder()?;
        if builder == RetryConfigBuilder::new() {
            return Ok(None);
        }
        Ok(Some(builder.build()))
    }
}

/// An invalid retry setting in the environment.
#[derive(Debug)]
#[non_exhaustive]
pub enum RetryConfigError {
    /// `AWS_RETRY_MODE` is not one of the supported modes.
    InvalidRetryMode {
        /// Cause of the error.
        source: RetryModeParseErr,
    },
    /// `AWS_MAX_ATTEMPTS` is zero.
    MaxAttemptsMustNotBeZero,
    /// `AWS_MAX_ATTEMPTS` is not a number.
    FailedToParseMaxAttempts {
        /// Cause of the error.
        source: ParseIntError,
    },
}

impl fmt::Display for RetryConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryConfigError::InvalidRetryMode { .. } => {
                write!(f, "invalid {ENV_VAR_RETRY_MODE}")
            }
            RetryConfigError::MaxAttemptsMustNotBeZero => write!(
                f,
                "{ENV_VAR_MAX_ATTEMPTS} must be an integer greater than or equal to one"
            ),
            RetryConfigError::FailedToParseMaxAttempts { .. } => {
                write!(f, "failed to parse {ENV_VAR_MAX_ATTEMPTS} as an integer")
            }
        }
    }
}

impl Error for RetryConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryConfigError::InvalidRetryMode { source } => Some(source),
            RetryConfigError::FailedToParseMaxAttempts { source } => Some(source),
            RetryConfigError::MaxAttemptsMustNotBeZero => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{
        EnvironmentVariableRetryConfigProvider, RetryConfigError, ENV_VAR_MAX_ATTEMPTS,
        ENV_VAR_RETRY_MODE,
    };
    use crate::os_shim_internal::Env;
    use cos_smithy_types::retry::{RetryConfig, RetryMode};

    fn test_provider(vars: &[(&str, &str)]) -> EnvironmentVariableRetryConfigProvider {
        EnvironmentVariableRetryConfigProvider::new_with_env(Env::from_slice(vars))
    }

    #[test]
    fn no_retry_config() {
        assert_eq!(test_provider(&[]).retry_config().unwrap(), None);
    }

    #[test]
    fn max_attempts_is_read_correctly() {
        assert_eq!(
            test_provider(&[(ENV_VAR_MAX_ATTEMPTS, "88")])
                .retry_config()
                .unwrap(),
            Some(RetryConfig::builder().max_attempts(88).build())
        );
    }

    #[test]
    fn retry_mode_is_read_case_insensitively() {
        assert_eq!(
            test_provider(&[(ENV_VAR_RETRY_MODE, "Standard")])
                .retry_config()
                .unwrap(),
            Some(RetryConfig::standard())
        );
    }

    #[test]
    fn both_fields_can_be_set_at_once() {
        let config = test_provider(&[(ENV_VAR_RETRY_MODE, "adaptive"), (ENV_VAR_MAX_ATTEMPTS, "13")])
            .retry_config()
            .unwrap()
            .expect("config is set");
        assert_eq!(config.mode(), RetryMode::Adaptive);
        assert_eq!(config.max_attempts(), Some(13));
        assert!(config.throttle_retries());
    }

    #[test]
    fn zero_max_attempts_is_rejected() {
        let err = test_provider(&[(ENV_VAR_MAX_ATTEMPTS, "0")])
            .retry_config()
            .expect_err("zero is invalid");
        assert!(matches!(err, RetryConfigError::MaxAttemptsMustNotBeZero));
    }

    #[test]
    fn invalid_max_attempts_is_rejected() {
        let err = test_provider(&[(ENV_VAR_MAX_ATTEMPTS, "three")])
            .retry_config()
            .expect_err("not a number");
        assert!(matches!(err, RetryConfigError::FailedToParseMaxAttempts { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn invalid_retry_mode_is_rejected() {
        let err = test_provider(&[(ENV_VAR_RETRY_MODE, "aggressive")])
            .retry_config()
            .expect_err("unknown mode");
        assert!(matches!(err, RetryConfigError::InvalidRetryMode { .. }));
        assert_eq!(err.to_string(), "invalid AWS_RETRY_MODE");
    }
}
