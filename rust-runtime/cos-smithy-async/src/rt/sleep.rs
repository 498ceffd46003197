/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Sleeping without naming an async runtime.
//!
//! Code that waits (the rate limiter, retry backoff, timeouts) takes a [`SharedAsyncSleep`].
//! Production code passes [`TokioSleep`]; tests pass a sleep that returns immediately and
//! records how long it was asked to wait.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

/// Something that can produce a future completing after a duration.
pub trait AsyncSleep: fmt::Debug + Send + Sync {
    /// Returns a future that completes once `duration` has passed.
    fn sleep(&self, duration: Duration) -> Sleep;
}

/// Cloneable handle to an [`AsyncSleep`].
#[derive(Clone, Debug)]
pub struct SharedAsyncSleep(Arc<dyn AsyncSleep>);

impl SharedAsyncSleep {
    /// Wraps `sleep` in an `Arc`.
    pub fn new(sleep: impl AsyncSleep + 'static) -> Self {
        Self(Arc::new(sleep))
    }
}

impl AsyncSleep for SharedAsyncSleep {
    fn sleep(&self, duration: Duration) -> Sleep {
        self.0.sleep(duration)
    }
}

/// Future returned by [`AsyncSleep::sleep`].
#[must_use]
pub struct Sleep(Pin<Box<dyn Future<Output = ()> + Send + 'static>>);

impl Sleep {
    /// Boxes `future` as a `Sleep`.
    pub fn new(future: impl Future<Output = ()> + Send + 'static) -> Sleep {
        Sleep(Box::pin(future))
    }
}

impl fmt::Debug for Sleep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sleep")
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.0.as_mut().poll(cx)
    }
}

/// [`AsyncSleep`] backed by `tokio::time::sleep`.
///
/// Must be used from inside a Tokio runtime with the time driver enabled.
#[cfg(feature = "rt-tokio")]
#[non_exhaustive]
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleep;

#[cfg(feature = "rt-tokio")]
impl TokioSleep {
    /// Creates a `TokioSleep`.
    pub fn new() -> TokioSleep {
        TokioSleep
    }
}

#[cfg(feature = "rt-tokio")]
impl AsyncSleep for TokioSleep {
    fn sleep(&self, duration: Duration) -> Sleep {
        Sleep::new(tokio::time::sleep(duration))
    }
}
