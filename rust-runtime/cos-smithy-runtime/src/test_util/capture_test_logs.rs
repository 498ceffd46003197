/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::env;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::TestWriter;
use tracing_subscriber::EnvFilter;

const ECHO_ENV_VAR: &str = "COS_TEST_LOGS";

/// Stops capturing when dropped.
#[derive(Debug)]
pub struct LogCaptureGuard(#[allow(dead_code)] DefaultGuard);

/// Captures every log line at or above `filter` until the guard is dropped.
///
/// `filter` is an env filter expression such as `"debug"` or `"cos_smithy_runtime=trace"`.
/// Unlike `#[traced_test]` this also captures logs emitted by other crates. Set `COS_TEST_LOGS`
/// to echo the captured lines to the test output.
#[must_use]
pub fn capture_test_logs(filter: &str) -> (LogCaptureGuard, CapturedLogs) {
    let buf: Arc<Mutex<Vec<u8>>> = Default::default();
    let writer = Tee {
        buf: buf.clone(),
        echo: env::var_os(ECHO_ENV_VAR).is_some(),
        inner: TestWriter::new(),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_ansi(false)
        .with_writer(Mutex::new(writer))
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (LogCaptureGuard(guard), CapturedLogs(buf))
}

/// Log output captured by [`capture_test_logs`].
#[derive(Clone, Debug)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Everything captured so far.
    ///
    /// # Panics
    /// If a log line is not valid UTF-8.
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    /// True if any captured line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }
}

struct Tee<W> {
    buf: Arc<Mutex<Vec<u8>>>,
    echo: bool,
    inner: W,
}

impl<W: Write> Write for Tee<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(buf);
        if self.echo {
            self.inner.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::capture_test_logs;

    #[test]
    fn filter_decides_what_is_captured() {
        let (_guard, logs) = capture_test_logs("info");
        tracing::info!("kept");
        tracing::debug!("dropped");
        assert!(logs.contains("kept"));
        assert!(!logs.contains("dropped"));
    }
}
