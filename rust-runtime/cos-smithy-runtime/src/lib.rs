/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Request execution runtime for the COS SDK.
//!
//! This crate holds the parts of a client that decide *when* a request is sent:
//! - the adaptive [client rate limiter](client::retries::client_rate_limiter), a CUBIC token
//!   bucket that slows the send rate down once the service starts throttling
//! - [backoff strategies](client::retries::backoff) and [retry policies](client::retries::policy)
//! - the client-wide [retry quota](client::retries::retry_quota)
//! - the [orchestrator](client::orchestrator) that runs the retry loop
//!
//! Sending bytes is left to the caller: the orchestrator calls a closure once per attempt and
//! classifies the [`AttemptError`](client::result::AttemptError) it returns.

#![warn(
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

/// Client-side request execution.
pub mod client;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;
