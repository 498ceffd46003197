/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Utilities for testing code that uses the retry runtime.

/// Capture the log output of a test.
pub mod capture_test_logs;

pub use cos_smithy_async::test_util::{instant_time_and_sleep, InstantSleep, ManualTimeSource};
