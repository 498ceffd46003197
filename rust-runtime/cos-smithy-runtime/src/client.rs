/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

pub mod orchestrator;
pub mod result;
/// Retry classification, policies, backoff and rate limiting.
pub mod retries;
