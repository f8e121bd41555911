//! One-shot child -> parent result channel.
//!
//! A pipe carrying exactly one newline-terminated JSON message. The parent
//! side reads on a helper thread so the wait can be bounded.

use crate::config::types::{GradeError, Result};
use crate::core::check::Outcome;
use crossbeam_channel::RecvTimeoutError;
use nix::fcntl::OFlag;
use nix::unistd::pipe2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::os::fd::FromRawFd;
use std::thread;
use std::time::Duration;

/// Message written by the child before it terminates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChildMessage {
    /// The body returned normally.
    Outcome { outcome: Outcome },
    /// The body returned `Err` or panicked.
    Failure { trace: String },
}

/// What the bounded wait observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Message(ChildMessage),
    /// Every writer closed the pipe without sending a message.
    Closed,
    /// Bytes arrived but did not decode, or exceeded the size bound.
    Malformed(String),
    /// The deadline passed first.
    Expired,
}

pub struct ResultChannel;

impl ResultChannel {
    /// Create a fresh channel. Both ends are close-on-exec so helper
    /// programs spawned by a check never hold the write end.
    pub fn open() -> Result<(ResultSender, ResultReceiver)> {
        let (read_fd, write_fd) = pipe2(OFlag::O_CLOEXEC)
            .map_err(|e| GradeError::Channel(format!("pipe2: {e}")))?;
        // SAFETY: both descriptors were just returned by pipe2 and are owned here.
        let (reader, writer) = unsafe { (File::from_raw_fd(read_fd), File::from_raw_fd(write_fd)) };
        Ok((ResultSender { file: writer }, ResultReceiver { file: reader }))
    }
}

/// Child end. `send` consumes it, so at most one message is ever written.
pub struct ResultSender {
    file: File,
}

impl ResultSender {
    pub fn send(mut self, message: &ChildMessage) -> Result<()> {
        let mut payload = serde_json::to_vec(message)
            .map_err(|e| GradeError::Channel(format!("encode result: {e}")))?;
        payload.push(b'\n');
        self.file.write_all(&payload)?;
        self.file.flush()?;
        Ok(())
    }
}

/// Parent end.
pub struct ResultReceiver {
    file: File,
}

impl ResultReceiver {
    /// Start reading in the background. At most `limit` bytes are accepted.
    pub fn listen(self, limit: usize) -> PendingResult {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let file = self.file;
        thread::spawn(move || {
            let _ = tx.send(read_one_message(file, limit));
        });
        PendingResult { rx }
    }
}

fn read_one_message(file: File, limit: usize) -> Delivery {
    let mut reader = BufReader::new(file.take(limit as u64 + 1));
    let mut line = Vec::new();
    match reader.read_until(b'\n', &mut line) {
        Ok(0) => Delivery::Closed,
        Ok(n) if n > limit => Delivery::Malformed(format!("result message exceeds {limit} bytes")),
        Ok(_) if line.last() != Some(&b'\n') => {
            Delivery::Malformed("result message truncated before newline".to_string())
        }
        Ok(_) => match serde_json::from_slice(&line) {
            Ok(message) => Delivery::Message(message),
            Err(e) => Delivery::Malformed(format!("undecodable result message: {e}")),
        },
        Err(e) => Delivery::Malformed(format!("result channel read failed: {e}")),
    }
}

pub struct PendingResult {
    rx: crossbeam_channel::Receiver<Delivery>,
}

impl PendingResult {
    /// Block until the reader finishes or `timeout` elapses. `None` waits forever.
    pub fn wait(&self, timeout: Option<Duration>) -> Delivery {
        match timeout {
            Some(limit) => match self.rx.recv_timeout(limit) {
                Ok(delivery) => delivery,
                Err(RecvTimeoutError::Timeout) => Delivery::Expired,
                Err(RecvTimeoutError::Disconnected) => {
                    Delivery::Malformed("result reader exited without a verdict".to_string())
                }
            },
            None => self.rx.recv().unwrap_or_else(|_| {
                Delivery::Malformed("result reader exited without a verdict".to_string())
            }),
        }
    }
}
