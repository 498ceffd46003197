/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Test time and sleep implementations.
//!
//! [`ManualTimeSource`] only moves when told to. [`InstantSleep`] never actually waits: when a
//! sleep future is first polled it pushes the paired [`ManualTimeSource`] forward by the requested
//! duration and records that duration, so a test can check both the backoff schedule and the
//! time that "passed" while the code under test believed it was sleeping.
//!
//! ```rust,ignore
//! use std::time::{Duration, UNIX_EPOCH};
//! use cos_smithy_async::rt::sleep::AsyncSleep;
//! use cos_smithy_async::test_util::instant_time_and_sleep;
//! use cos_smithy_async::time::TimeSource;
//!
//! # async fn example() {
//! let (time, sleep) = instant_time_and_sleep(UNIX_EPOCH);
//! sleep.sleep(Duration::from_secs(3)).await;
//! assert_eq!(UNIX_EPOCH + Duration::from_secs(3), time.now());
//! assert_eq!(vec![Duration::from_secs(3)], sleep.logs());
//! # }
//! ```

use crate::rt::sleep::{AsyncSleep, Sleep};
use crate::time::TimeSource;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Time source that only advances when [`advance`](ManualTimeSource::advance) or
/// [`set_time`](ManualTimeSource::set_time) is called.
#[derive(Debug, Clone)]
pub struct ManualTimeSource {
    start_time: SystemTime,
    now: Arc<Mutex<SystemTime>>,
}

impl ManualTimeSource {
    /// Creates a new time source that starts at `start_time`
    pub fn new(start_time: SystemTime) -> Self {
        Self {
            start_time,
            now: Arc::new(Mutex::new(start_time)),
        }
    }

    /// Moves the clock forward by `duration`
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += duration;
    }

    /// Jumps the clock to `time`, which may be earlier than the current time
    pub fn set_time(&self, time: SystemTime) {
        *self.now.lock().unwrap() = time;
    }

    /// How far the clock has moved since it was created
    pub fn elapsed(&self) -> Duration {
        self.now()
            .duration_since(self.start_time)
            .unwrap_or_default()
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }
}

/// Sleep implementation that completes immediately and advances a [`ManualTimeSource`]
#[derive(Debug, Clone)]
pub struct InstantSleep {
    time: ManualTimeSource,
    log: Arc<Mutex<Vec<Duration>>>,
}

impl InstantSleep {
    /// Creates a sleep implementation that advances `time` whenever a sleep is polled
    pub fn new(time: ManualTimeSource) -> Self {
        Self {
            time,
            log: Default::default(),
        }
    }

    /// Every duration slept so far, in order
    pub fn logs(&self) -> Vec<Duration> {
        self.log.lock().unwrap().clone()
    }

    /// Sum of every duration slept so far
    pub fn total_duration(&self) -> Duration {
        self.log.lock().unwrap().iter().sum()
    }
}

impl AsyncSleep for InstantSleep {
    fn sleep(&self, duration: Duration) -> Sleep {
        let time = self.time.clone();
        let log = self.log.clone();
        Sleep::new(async move {
            time.advance(duration);
            log.lock().unwrap().push(duration);
        })
    }
}

/// Returns a paired [`ManualTimeSource`] and [`InstantSleep`] starting at `start_time`
pub fn instant_time_and_sleep(start_time: SystemTime) -> (ManualTimeSource, InstantSleep) {
    let time = ManualTimeSource::new(start_time);
    let sleep = InstantSleep::new(time.clone());
    (time, sleep)
}
