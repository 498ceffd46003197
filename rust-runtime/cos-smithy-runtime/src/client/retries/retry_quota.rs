/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Client-wide retry quota used by standard and adaptive retry.
//!
//! Every retry takes tokens out of the quota. When a retried request eventually succeeds its
//! tokens are refunded; when it fails they are gone. A request that succeeds on the first try
//! adds a single token back. An outage therefore drains the quota and stops retries client-wide
//! until requests start succeeding again.

use cos_smithy_types::retry::ErrorKind;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

const DEFAULT_CAPACITY: usize = 500;
const DEFAULT_RETRY_COST: u32 = 5;
const DEFAULT_RETRY_TIMEOUT_COST: u32 = DEFAULT_RETRY_COST * 2;
const PERMIT_REGENERATION_AMOUNT: usize = 1;

/// Retry quota shared by every request of a client.
#[derive(Clone, Debug)]
pub struct RetryQuota {
    semaphore: Arc<Semaphore>,
    max_permits: usize,
    timeout_retry_cost: u32,
    retry_cost: u32,
}

impl Default for RetryQuota {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryQuota {
    /// Creates a quota holding `capacity` tokens with the default retry costs.
    pub fn new(capacity: usize) -> Self {
        Self::builder().capacity(capacity).build()
    }

    /// A quota that never runs out.
    pub fn unlimited() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(Semaphore::MAX_PERMITS)),
            max_permits: Semaphore::MAX_PERMITS,
            timeout_retry_cost: 0,
            retry_cost: 0,
        }
    }

    /// Creates a builder.
    pub fn builder() -> RetryQuotaBuilder {
        RetryQuotaBuilder::default()
    }

    /// Takes the cost of retrying an error of kind `kind`, or `None` if the quota cannot cover it.
    pub fn acquire(&self, kind: ErrorKind) -> Option<RetryPermit> {
        let retry_cost = if kind == ErrorKind::TransientError {
            self.timeout_retry_cost
        } else {
            self.retry_cost
        };
        let permit = self
            .semaphore
            .clone()
            .try_acquire_many_owned(retry_cost)
            .ok()?;
        trace!(retry_cost, available = self.available(), "took tokens from the retry quota");
        Some(RetryPermit { permit })
    }

    /// Adds a token back after a request succeeds on its first attempt.
    pub fn regenerate_a_token(&self) {
        let available = self.semaphore.available_permits();
        if available >= self.max_permits {
            return;
        }
        let tokens_to_add = PERMIT_REGENERATION_AMOUNT.min(self.max_permits - available);
        trace!("adding {tokens_to_add} back into the retry quota");
        self.semaphore.add_permits(tokens_to_add);
    }

    /// Tokens currently available.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Tokens taken out of a [`RetryQuota`] for one retry.
///
/// Dropping the permit returns its tokens, as does [`RetryPermit::release`].
/// Use [`RetryPermit::forget`] when the retry did not pay off.
#[derive(Debug)]
pub struct RetryPermit {
    permit: OwnedSemaphorePermit,
}

impl RetryPermit {
    /// Returns the tokens to the quota.
    pub fn release(self) {
        drop(self.permit);
    }

    /// Keeps the tokens out of the quota.
    pub fn forget(self) {
        self.permit.forget();
    }
}

/// Builder for [`RetryQuota`].
#[derive(Clone, Debug, Default)]
pub struct RetryQuotaBuilder {
    capacity: Option<usize>,
    retry_cost: Option<u32>,
    timeout_retry_cost: Option<u32>,
}

impl RetryQuotaBuilder {
    /// Sets the number of tokens in the quota. Defaults to 500.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Sets the cost of retrying anything but a transient error. Defaults to 5.
    pub fn retry_cost(mut self, retry_cost: u32) -> Self {
        self.retry_cost = Some(retry_cost);
        self
    }

    /// Sets the cost of retrying a transient error such as a timeout. Defaults to 10.
    pub fn timeout_retry_cost(mut self, timeout_retry_cost: u32) -> Self {
        self.timeout_retry_cost = Some(timeout_retry_cost);
        self
    }

    /// Builds the `RetryQuota`.
    pub fn build(self) -> RetryQuota {
        let capacity = self
            .capacity
            .unwrap_or(DEFAULT_CAPACITY)
            .min(Semaphore::MAX_PERMITS);
        RetryQuota {
            semaphore: Arc::new(Semaphore::new(capacity)),
            max_permits: capacity,
            retry_cost: self.retry_cost.unwrap_or(DEFAULT_RETRY_COST),
            timeout_retry_cost: self
                .timeout_retry_cost
                .unwrap_or(DEFAULT_RETRY_TIMEOUT_COST),
        }
    }
}
