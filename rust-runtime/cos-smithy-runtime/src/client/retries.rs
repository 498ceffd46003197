/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

pub mod adapter;
pub mod backoff;
pub mod classifiers;
pub mod client_rate_limiter;
/// Conditions deciding whether a failed attempt may be retried.
pub mod condition;
/// Retry policies.
pub mod policy;
pub mod retry_quota;
