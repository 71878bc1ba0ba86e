use crate::notify::appender::SmtpAppender;
use crate::notify::types::{LocationInfo, LoggingEvent};
use log::{LevelFilter, Log, Metadata, Record};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Records the forwarding channel holds before new ones are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Diagnostics from this crate never reach the appender, or a failed send
/// could log its way into another send.
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");
const OWN_TARGET_PREFIX: &str = concat!(env!("CARGO_CRATE_NAME"), "::");

fn is_own_target(target: &str) -> bool {
    target == OWN_TARGET || target.starts_with(OWN_TARGET_PREFIX)
}

/// A `log::Log` implementation that feeds records into an [`SmtpAppender`].
///
/// Records are handed to a background task over a bounded channel, so logging
/// call sites never wait for the appender; when the channel is full the record
/// is dropped and counted. Every record is also passed to the optional
/// fallback logger, which is where this crate's own diagnostics end up.
pub struct MailLogger {
    level: LevelFilter,
    location_info: bool,
    tx: mpsc::Sender<LoggingEvent>,
    dropped: Arc<AtomicU64>,
    fallback: Option<Box<dyn Log>>,
}

/// Owns the forwarding task of a [`MailLogger`]
pub struct MailLoggerWorker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
    dropped: Arc<AtomicU64>,
}

impl MailLoggerWorker {
    /// Records dropped so far because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting records, hand everything already queued to the
    /// appender, then return.
    pub async fn shutdown(self) {
        // the worker may already be gone if every sender was dropped
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            log::error!("mail logger worker terminated abnormally: {}", e);
        }
    }
}

async fn forward(appender: &SmtpAppender, event: LoggingEvent) {
    if let Err(e) = appender.append(event).await {
        log::warn!("mail appender rejected event: {}", e);
    }
}

impl MailLogger {
    /// Spawn the forwarding task on the current tokio runtime.
    pub fn spawn(appender: Arc<SmtpAppender>, level: LevelFilter) -> (Self, MailLoggerWorker) {
        Self::spawn_with_capacity(appender, level, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn spawn_with_capacity(
        appender: Arc<SmtpAppender>,
        level: LevelFilter,
        capacity: usize,
    ) -> (Self, MailLoggerWorker) {
        let location_info = appender.location_info();
        let (tx, mut rx) = mpsc::channel::<LoggingEvent>(capacity.max(1));
        let (stop, mut stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Some(event) => forward(&appender, event).await,
                        None => break,
                    },
                    _ = &mut stopped => {
                        rx.close();
                        while let Some(event) = rx.recv().await {
                            forward(&appender, event).await;
                        }
                        break;
                    }
                }
            }
        });
        let dropped = Arc::new(AtomicU64::new(0));
        let logger = Self {
            level,
            location_info,
            tx,
            dropped: Arc::clone(&dropped),
            fallback: None,
        };
        let worker = MailLoggerWorker {
            stop,
            handle,
            dropped,
        };
        (logger, worker)
    }

    pub fn with_fallback(mut self, fallback: Box<dyn Log>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Install as the global logger.
    pub fn init(self) -> Result<(), log::SetLoggerError> {
        let max = match &self.fallback {
            Some(_) => LevelFilter::Trace,
            None => self.level,
        };
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(max);
        Ok(())
    }

    fn forwards(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && !is_own_target(metadata.target())
    }

    fn event(&self, record: &Record) -> LoggingEvent {
        let event = LoggingEvent::new(
            record.level().into(),
            record.target(),
            record.args().to_string(),
        );
        if !self.location_info {
            return event;
        }
        event.with_location(LocationInfo {
            file: record.file().map(str::to_string),
            line: record.line(),
            module_path: record.module_path().map(str::to_string),
        })
    }
}

impl Log for MailLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.forwards(metadata)
            || self
                .fallback
                .as_ref()
                .is_some_and(|fallback| fallback.enabled(metadata))
    }

    fn log(&self, record: &Record) {
        if let Some(fallback) = &self.fallback {
            fallback.log(record);
        }
        if !self.forwards(record.metadata()) {
            return;
        }
        match self.tx.try_send(self.event(record)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // worker shut down; nothing left to forward to
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    fn flush(&self) {
        if let Some(fallback) = &self.fallback {
            fallback.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_target_matches_whole_path_segments() {
        assert!(is_own_target("log_mail_appender"));
        assert!(is_own_target("log_mail_appender::notify::appender"));
        assert!(!is_own_target("log_mail_appender_ext"));
        assert!(!is_own_target("log_mail_appender_ext::sink"));
        assert!(!is_own_target("app::db"));
    }
}
