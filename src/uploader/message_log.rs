//! User-visible message log.
//!
//! Rejections, reports and backend log lines end up here for the human,
//! newest first. Each entry is also traced.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl LogMessage {
    /// Local time formatted for display.
    pub fn display_time(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[derive(Debug, Clone)]
pub struct MessageLog {
    messages: VecDeque<LogMessage>,
    capacity: usize,
}

impl MessageLog {
    /// Create a log that keeps at most `capacity` messages (0 = unbounded).
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            capacity,
        }
    }

    pub fn push(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!(target: "uploader_log", "{}", text);
        self.messages.push_front(LogMessage {
            text,
            timestamp: Local::now(),
        });
        if self.capacity > 0 {
            self.messages.truncate(self.capacity);
        }
    }

    /// Messages, newest first.
    pub fn messages(&self) -> impl Iterator<Item = &LogMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
