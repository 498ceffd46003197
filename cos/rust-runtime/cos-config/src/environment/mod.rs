/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Providers that load configuration from environment variables

/// Load retry behavior configuration from the environment
pub mod retry_config;
pub use retry_config::{EnvironmentVariableRetryConfigProvider, RetryConfigError};
