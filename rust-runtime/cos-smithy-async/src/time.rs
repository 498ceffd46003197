/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Time source abstraction to support testing
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Trait with a `now()` function returning the current time
pub trait TimeSource: Debug + Send + Sync {
    /// Returns the current time
    fn now(&self) -> SystemTime;
}

/// Time source delegating to `SystemTime::now()`
#[non_exhaustive]
#[derive(Debug, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    /// Creates a new SystemTimeSource
    pub fn new() -> Self {
        SystemTimeSource
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<T> TimeSource for Arc<T>
where
    T: TimeSource + ?Sized,
{
    fn now(&self) -> SystemTime {
        T::now(self)
    }
}

/// Time source that always returns the same time
#[derive(Debug, Clone)]
pub struct StaticTimeSource {
    time: SystemTime,
}

impl StaticTimeSource {
    /// Creates a new static time source that always returns the same time
    pub fn new(time: SystemTime) -> Self {
        Self { time }
    }

    /// Creates a new static time source from the provided number of seconds since the UNIX epoch
    pub fn from_secs(epoch_secs: u64) -> Self {
        Self::new(UNIX_EPOCH + Duration::from_secs(epoch_secs))
    }
}

impl TimeSource for StaticTimeSource {
    fn now(&self) -> SystemTime {
        self.time
    }
}

/// Wrapper type for a clonable, shareable [`TimeSource`].
///
/// The default is the system clock.
#[derive(Debug, Clone)]
pub struct SharedTimeSource(Arc<dyn TimeSource>);

impl SharedTimeSource {
    /// Create a new `SharedTimeSource` from a [`TimeSource`]
    pub fn new(source: impl TimeSource + 'static) -> Self {
        Self(Arc::new(source))
    }

    /// Seconds since the UNIX epoch as a float, the unit the client rate limiter works in.
    ///
    /// Times before the epoch are reported as `0.0`.
    pub fn seconds_since_unix_epoch(&self) -> f64 {
        self.now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or_default()
    }
}

impl Default for SharedTimeSource {
    fn default() -> Self {
        Self::new(SystemTimeSource::new())
    }
}

impl TimeSource for SharedTimeSource {
    fn now(&self) -> SystemTime {
        self.0.now()
    }
}

#[cfg(test)]
mod tests {
    use super::{SharedTimeSource, StaticTimeSource};

    #[test]
    fn seconds_since_epoch_follows_the_wrapped_source() {
        let time = SharedTimeSource::new(StaticTimeSource::from_secs(42));
        assert_eq!(42.0, time.seconds_since_unix_epoch());
    }
}
