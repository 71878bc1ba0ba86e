use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::transcoder::TranscodeError;

/// Severity of a logging event, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => Level::Trace,
            log::Level::Debug => Level::Debug,
            log::Level::Info => Level::Info,
            log::Level::Warn => Level::Warn,
            log::Level::Error => Level::Error,
        }
    }
}

/// Source location of the call site that produced an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub module_path: Option<String>,
}

/// One logging event; never mutated once buffered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingEvent {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub logger: String,
    pub message: String,
    pub location: Option<LocationInfo>,
}

impl LoggingEvent {
    pub fn new(level: Level, logger: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            logger: logger.into(),
            message: message.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: LocationInfo) -> Self {
        self.location = Some(location);
        self
    }
}

/// Lifecycle of an appender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppenderState {
    Inactive,
    Active,
    Closed,
}

impl fmt::Display for AppenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppenderState::Inactive => "inactive",
            AppenderState::Active => "active",
            AppenderState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Failures reported by a notifier; never surfaced to log producers
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Message build error: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("Notifier is closed")]
    Closed,
    #[error("Delivery queue is full ({capacity} batches pending)")]
    QueueFull { capacity: usize },
}

/// Errors returned by the appender entrypoints
#[derive(Error, Debug)]
pub enum AppenderError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Cannot {operation} while appender is {state}")]
    InvalidState {
        operation: &'static str,
        state: AppenderState,
    },
    #[error("Invalid address: {0}")]
    Address(String),
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),
    #[error("Encoding error: {0}")]
    Encoding(#[from] TranscodeError),
}
