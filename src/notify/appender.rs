use crate::notify::address::parse_address;
use crate::notify::buffer::CyclicBuffer;
use crate::notify::evaluator::{DefaultEvaluator, TriggeringEventEvaluator};
use crate::notify::layout::{Layout, render_body};
use crate::notify::notifier::{Envelope, Notification, Notifier};
use crate::notify::options::{AppenderConfig, AppenderOptions};
use crate::notify::smtp::SmtpNotifier;
use crate::notify::types::{AppenderError, AppenderState, LoggingEvent};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct Inner {
    state: AppenderState,
    options: AppenderOptions,
    config: Option<Arc<AppenderConfig>>,
    buffer: CyclicBuffer<LoggingEvent>,
    evaluator: Box<dyn TriggeringEventEvaluator>,
    layout: Option<Arc<dyn Layout>>,
    notifier: Option<Arc<dyn Notifier>>,
    /// false when the notifier was built from the SMTP options at activation
    notifier_injected: bool,
}

impl Inner {
    fn has_recipients(&self) -> bool {
        match &self.config {
            Some(config) => !config.to.is_empty(),
            None => self
                .options
                .to
                .as_deref()
                .and_then(|to| parse_address(to).ok())
                .is_some_and(|to| !to.is_empty()),
        }
    }

    /// Configuration is only writable while not active; a closed appender
    /// becomes inactive again on its first reconfiguration.
    fn configurable(&mut self, operation: &'static str) -> Result<(), AppenderError> {
        match self.state {
            AppenderState::Active => Err(AppenderError::InvalidState {
                operation,
                state: self.state,
            }),
            AppenderState::Closed => {
                self.state = AppenderState::Inactive;
                self.config = None;
                Ok(())
            }
            AppenderState::Inactive => Ok(()),
        }
    }

    /// Everything `deliver` needs once the lock is released.
    fn batch(&mut self) -> Option<Batch> {
        let (Some(config), Some(layout), Some(notifier)) = (
            self.config.clone(),
            self.layout.clone(),
            self.notifier.clone(),
        ) else {
            log::error!("cannot send buffered events without a layout and a notifier");
            return None;
        };
        let events = self.buffer.drain();
        if events.is_empty() {
            log::debug!("nothing buffered; skipping delivery");
            return None;
        }
        Some(Batch {
            events,
            config,
            layout,
            notifier,
        })
    }
}

struct Batch {
    events: Vec<LoggingEvent>,
    config: Arc<AppenderConfig>,
    layout: Arc<dyn Layout>,
    notifier: Arc<dyn Notifier>,
}

/// Buffers the most recent events and emails them when a triggering event arrives.
///
/// The appender starts inactive. Configure it with `set_option` (or the typed
/// setters), then call [`SmtpAppender::activate_options`]. Only an active
/// appender accepts events; [`SmtpAppender::append`] on an inactive or closed
/// appender returns [`AppenderError::InvalidState`] and leaves the buffer alone.
///
/// Delivery failures never reach the caller of `append`. They are reported
/// through the `log` facade and the buffer is cleared either way.
pub struct SmtpAppender {
    inner: Mutex<Inner>,
}

impl Default for SmtpAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtpAppender {
    /// An appender that triggers on ERROR and above.
    pub fn new() -> Self {
        Self::with_evaluator(Box::new(DefaultEvaluator))
    }

    pub fn with_evaluator(evaluator: Box<dyn TriggeringEventEvaluator>) -> Self {
        let options = AppenderOptions::default();
        Self {
            inner: Mutex::new(Inner {
                state: AppenderState::Inactive,
                buffer: CyclicBuffer::new(options.buffer_size),
                options,
                config: None,
                evaluator,
                layout: None,
                notifier: None,
                notifier_injected: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // buffer and settings stay consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn configure(
        &self,
        operation: &'static str,
        apply: impl FnOnce(&mut Inner) -> Result<(), AppenderError>,
    ) -> Result<(), AppenderError> {
        let mut inner = self.lock();
        inner.configurable(operation)?;
        apply(&mut *inner)
    }

    pub fn state(&self) -> AppenderState {
        self.lock().state
    }

    pub fn set_option(&self, option: &str, value: &str) -> Result<(), AppenderError> {
        self.configure("set option", |inner| inner.options.set_option(option, value))
    }

    pub fn set_options(&self, options: AppenderOptions) -> Result<(), AppenderError> {
        self.configure("set options", |inner| {
            inner.options = options;
            Ok(())
        })
    }

    pub fn set_evaluator(
        &self,
        evaluator: Box<dyn TriggeringEventEvaluator>,
    ) -> Result<(), AppenderError> {
        self.configure("replace evaluator", |inner| {
            inner.evaluator = evaluator;
            Ok(())
        })
    }

    pub fn set_layout(&self, layout: Arc<dyn Layout>) -> Result<(), AppenderError> {
        self.configure("set layout", |inner| {
            inner.layout = Some(layout);
            Ok(())
        })
    }

    /// Use `notifier` instead of building an SMTP transport from the options.
    pub fn set_notifier(&self, notifier: Arc<dyn Notifier>) -> Result<(), AppenderError> {
        self.configure("set notifier", |inner| {
            inner.notifier = Some(notifier);
            inner.notifier_injected = true;
            Ok(())
        })
    }

    pub fn set_to(&self, to: &str) -> Result<(), AppenderError> {
        self.set_option("to", to)
    }

    pub fn set_from(&self, from: &str) -> Result<(), AppenderError> {
        self.set_option("from", from)
    }

    pub fn set_subject(&self, subject: &str) -> Result<(), AppenderError> {
        self.set_option("subject", subject)
    }

    pub fn set_smtp_host(&self, host: &str) -> Result<(), AppenderError> {
        self.set_option("smtphost", host)
    }

    pub fn set_charset(&self, charset: &str) -> Result<(), AppenderError> {
        self.set_option("charset", charset)
    }

    pub fn set_encoding(&self, encoding: &str) -> Result<(), AppenderError> {
        self.set_option("encoding", encoding)
    }

    /// Takes effect at the next activation; zero disables buffering so only
    /// the triggering event itself is inspected and nothing is ever sent.
    pub fn set_buffer_size(&self, size: usize) -> Result<(), AppenderError> {
        self.configure("set buffer size", |inner| {
            inner.options.buffer_size = size;
            Ok(())
        })
    }

    pub fn set_location_info(&self, location_info: bool) -> Result<(), AppenderError> {
        self.configure("set location info", |inner| {
            inner.options.location_info = location_info;
            Ok(())
        })
    }

    pub fn to(&self) -> Option<String> {
        self.lock().options.to.clone()
    }

    pub fn from(&self) -> Option<String> {
        self.lock().options.from.clone()
    }

    pub fn subject(&self) -> Option<String> {
        self.lock().options.subject.clone()
    }

    pub fn smtp_host(&self) -> Option<String> {
        self.lock().options.smtp_host.clone()
    }

    pub fn buffer_size(&self) -> usize {
        self.lock().options.buffer_size
    }

    pub fn location_info(&self) -> bool {
        self.lock().options.location_info
    }

    pub fn charset(&self) -> String {
        self.lock().options.charset.clone()
    }

    pub fn encoding(&self) -> String {
        self.lock().options.encoding.clone()
    }

    /// Validate the options and start accepting events.
    ///
    /// On failure nothing changes and the appender stays inactive.
    pub fn activate_options(&self) -> Result<(), AppenderError> {
        let mut inner = self.lock();
        if inner.state == AppenderState::Active {
            return Err(AppenderError::InvalidState {
                operation: "activate",
                state: inner.state,
            });
        }

        let config = inner.options.validate(!inner.notifier_injected)?;
        let notifier: Arc<dyn Notifier> = match (&inner.notifier, inner.notifier_injected) {
            (Some(notifier), true) => Arc::clone(notifier),
            _ => match &config.smtp {
                Some(smtp) => Arc::new(SmtpNotifier::new(smtp)),
                None => {
                    return Err(AppenderError::Configuration(
                        "no notifier and no SMTP host configured".into(),
                    ));
                }
            },
        };
        if inner.layout.is_none() {
            log::warn!("appender activated without a layout; events will be dropped");
        }

        inner.buffer.resize(config.buffer_size);
        inner.notifier = Some(notifier);
        inner.config = Some(Arc::new(config));
        inner.state = AppenderState::Active;
        log::debug!(
            "mail appender active, buffer size {}",
            inner.buffer.capacity()
        );
        Ok(())
    }

    /// True when there is somewhere to send events and a layout to render them.
    pub fn check_entry_conditions(&self) -> bool {
        let inner = self.lock();
        inner.has_recipients() && inner.layout.is_some()
    }

    /// Buffer `event`, then send the buffer if the evaluator says `event` is
    /// a triggering event. The triggering event is always part of what is sent.
    pub async fn append(&self, mut event: LoggingEvent) -> Result<(), AppenderError> {
        let batch = {
            let mut inner = self.lock();
            if inner.state != AppenderState::Active {
                return Err(AppenderError::InvalidState {
                    operation: "append",
                    state: inner.state,
                });
            }
            if !(inner.has_recipients() && inner.layout.is_some()) {
                log::error!("no recipients or no layout set; dropping event");
                return Ok(());
            }
            let location_info = inner
                .config
                .as_ref()
                .is_some_and(|config| config.location_info);
            if !location_info {
                event.location = None;
            }

            inner.buffer.add(event.clone());
            if inner.evaluator.is_triggering_event(&event) {
                inner.batch()
            } else {
                None
            }
        };

        if let Some(batch) = batch {
            Self::deliver(batch).await;
        }
        Ok(())
    }

    /// Send whatever is currently buffered, regardless of the evaluator.
    pub async fn send_buffer(&self) -> Result<(), AppenderError> {
        let batch = {
            let mut inner = self.lock();
            if inner.state != AppenderState::Active {
                return Err(AppenderError::InvalidState {
                    operation: "send buffer",
                    state: inner.state,
                });
            }
            inner.batch()
        };
        if let Some(batch) = batch {
            Self::deliver(batch).await;
        }
        Ok(())
    }

    async fn deliver(batch: Batch) {
        let Batch {
            events,
            config,
            layout,
            notifier,
        } = batch;
        let body = config
            .transcoder
            .normalize(&render_body(layout.as_ref(), &events));
        let notification = Notification {
            envelope: Envelope {
                to: config.to.clone(),
                from: config.from.clone(),
                subject: config.subject.clone(),
            },
            events,
            body,
            content_type: layout.content_type().to_string(),
            charset: config.transcoder.name().to_string(),
            encoding: config.encoding.clone(),
        };
        if let Err(e) = notifier.send(&notification).await {
            log::error!(
                "failed to send {} buffered events: {}",
                notification.events.len(),
                e
            );
        }
    }

    /// Stop accepting events, send anything still buffered and release the
    /// transport. Does nothing unless the appender is active.
    pub async fn close(&self) {
        let (batch, notifier) = {
            let mut inner = self.lock();
            if inner.state != AppenderState::Active {
                return;
            }
            inner.state = AppenderState::Closed;
            (inner.batch(), inner.notifier.clone())
        };
        if let Some(batch) = batch {
            Self::deliver(batch).await;
        }
        if let Some(notifier) = notifier {
            notifier.shutdown().await;
        }
    }

    /// Events currently buffered, oldest first.
    pub fn buffered(&self) -> Vec<LoggingEvent> {
        self.lock().buffer.snapshot()
    }
}
