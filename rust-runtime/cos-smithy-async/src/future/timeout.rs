/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

// This code was copied and then modified from Tokio.

//! Provides the [`Timeout`] future for adding a timeout to another future.

use pin_project_lite::pin_project;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Error returned when [`Timeout`] times out
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TimedOutError;

impl Error for TimedOutError {}

impl fmt::Display for TimedOutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timed out")
    }
}

pin_project! {
    /// Timeout Future
    ///
    /// The inner future is polled before the timer, so a future that completes on the same poll
    /// that the timer fires still wins.
    #[non_exhaustive]
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    #[derive(Debug)]
    pub struct Timeout<T, S> {
        #[pin]
        value: T,
        #[pin]
        sleep: S,
    }
}

impl<T, S> Timeout<T, S> {
    /// Create a new future that will race `value` and `sleep`.
    ///
    /// If `sleep` resolves first, a timeout error is returned. Otherwise, the value is returned.
    pub fn new(value: T, sleep: S) -> Timeout<T, S> {
        Timeout { value, sleep }
    }
}

impl<T, S> Future for Timeout<T, S>
where
    T: Future,
    S: Future,
{
    type Output = Result<T::Output, TimedOutError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let me = self.project();

        if let Poll::Ready(v) = me.value.poll(cx) {
            return Poll::Ready(Ok(v));
        }

        match me.sleep.poll(cx) {
            Poll::Ready(_) => Poll::Ready(Err(TimedOutError)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{TimedOutError, Timeout};
    use std::future::{pending, ready};

    #[tokio::test]
    async fn value_wins_when_sleep_never_finishes() {
        assert_eq!(Ok(5), Timeout::new(ready(5), pending::<()>()).await);
    }

    #[tokio::test]
    async fn sleep_wins_when_value_never_finishes() {
        assert_eq!(
            Err(TimedOutError),
            Timeout::new(pending::<i32>(), ready(())).await
        );
    }

    #[tokio::test]
    async fn value_wins_a_tie() {
        assert_eq!(Ok("done"), Timeout::new(ready("done"), ready(())).await);
    }
}
