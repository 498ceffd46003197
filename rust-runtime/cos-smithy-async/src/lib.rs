/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

#![allow(clippy::derive_partial_eq_without_eq)]
#![warn(
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

//! Future utilities and runtime-agnostic abstractions for the COS SDK runtime.
//!
//! The rate limiter, the retry loop and the credentials cache never read the system clock or
//! call `tokio::time::sleep` directly. Instead they take a [`SharedTimeSource`](time::SharedTimeSource)
//! and a [`SharedAsyncSleep`](rt::sleep::SharedAsyncSleep) so tests can drive time by hand.

pub mod future;
pub mod rt;
#[cfg(any(test, feature = "test-util"))]
pub mod test_util;
pub mod time;
