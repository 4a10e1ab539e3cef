//! Log-based readiness detection
//!
//! The emulator announces readiness on its log streams. [`LogWatch`] scans
//! stdout and stderr together for the first line matching a regex and gives
//! up after a fixed timeout, so a broken emulator fails fast instead of
//! hanging the suite.

use crate::error::{HarnessError, Result};
use regex_lite::Regex;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Readiness of an emulator instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    NotReady,
    Ready,
    TimedOut,
}

/// Watches a log stream for a readiness line
#[derive(Debug)]
pub struct LogWatch {
    pattern: Regex,
    timeout: Duration,
    state: ReadinessState,
}

impl LogWatch {
    /// Create a watch for `pattern`; fails if the regex does not compile
    pub fn new(pattern: &str, timeout: Duration) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            HarnessError::Configuration(format!("invalid readiness pattern '{}': {}", pattern, e))
        })?;

        Ok(Self {
            pattern,
            timeout,
            state: ReadinessState::NotReady,
        })
    }

    pub fn state(&self) -> ReadinessState {
        self.state
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Read lines until one matches, returning the matching line.
    ///
    /// Fails with [`HarnessError::StartupTimeout`] when the timeout elapses
    /// first and with [`HarnessError::EmulatorExited`] when the stream ends.
    pub async fn wait<R>(&mut self, reader: R) -> Result<String>
    where
        R: AsyncBufRead + Unpin,
    {
        self.wait_any(reader, tokio::io::empty()).await
    }

    /// Like [`LogWatch::wait`], matching lines from either stream.
    ///
    /// The watch only reports [`HarnessError::EmulatorExited`] once both
    /// streams have ended.
    pub async fn wait_any<A, B>(&mut self, stdout: A, stderr: B) -> Result<String>
    where
        A: AsyncBufRead + Unpin,
        B: AsyncBufRead + Unpin,
    {
        let pattern = &self.pattern;
        let mut stdout = stdout.lines();
        let mut stderr = stderr.lines();
        let scan = async {
            let (mut stdout_open, mut stderr_open) = (true, true);
            while stdout_open || stderr_open {
                // `next_line` is cancel safe, so losing a select race drops no data.
                let (line, from_stdout) = tokio::select! {
                    line = stdout.next_line(), if stdout_open => (line?, true),
                    line = stderr.next_line(), if stderr_open => (line?, false),
                };

                match line {
                    Some(line) => {
                        tracing::trace!(line = %line, stdout = from_stdout, "emulator log");
                        if pattern.is_match(&line) {
                            return Ok(Some(line));
                        }
                    }
                    None if from_stdout => stdout_open = false,
                    None => stderr_open = false,
                }
            }
            Ok::<_, std::io::Error>(None)
        };

        let outcome = tokio::time::timeout(self.timeout, scan).await;
        match outcome {
            Ok(Ok(Some(line))) => {
                self.state = ReadinessState::Ready;
                Ok(line)
            }
            Ok(Ok(None)) => Err(HarnessError::EmulatorExited {
                pattern: self.pattern.as_str().to_string(),
            }),
            Ok(Err(e)) => Err(HarnessError::Io(e)),
            Err(_) => {
                self.state = ReadinessState::TimedOut;
                Err(HarnessError::StartupTimeout {
                    pattern: self.pattern.as_str().to_string(),
                    timeout: self.timeout,
                })
            }
        }
    }
}

/// Wait for the first line of `reader` matching `pattern`
pub async fn wait_for_log_line<R>(reader: R, pattern: &str, timeout: Duration) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    LogWatch::new(pattern, timeout)?.wait(reader).await
}
