use async_trait::async_trait;
use log::LevelFilter;
use log_mail_appender::notify::{
    AppenderOptions, MailLogger, Notification, NotificationError, Notifier, QueuedNotifier,
    SimpleLayout, SmtpAppender,
};
use std::sync::Arc;

/// Prints notifications instead of mailing them when no SMTP host is configured
struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        println!(
            "To: {}\nSubject: {}\n\n{}",
            notification
                .envelope
                .to
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            notification.envelope.subject,
            notification.body
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut options = AppenderOptions::from_env()?;
    if options.to.is_none() {
        options.to = Some("ops@example.com".into());
    }
    if options.from.is_none() {
        options.from = Some("log-mail-demo@example.com".into());
    }
    if options.subject.is_none() {
        options.subject = Some("log_mail_demo: error report".into());
    }
    options.buffer_size = options.buffer_size.min(16);

    let appender = Arc::new(SmtpAppender::new());
    if options.smtp_host.is_none() {
        appender.set_notifier(Arc::new(QueuedNotifier::spawn(Arc::new(StdoutNotifier))))?;
    }
    appender.set_options(options)?;
    appender.set_layout(Arc::new(SimpleLayout))?;
    appender.activate_options()?;

    let console = env_logger::Builder::from_default_env().build();
    let (logger, worker) = MailLogger::spawn(Arc::clone(&appender), LevelFilter::Info);
    logger.with_fallback(Box::new(console)).init()?;

    log::info!("demo starting");
    log::warn!("cache miss rate above 40%");
    log::info!("retrying upstream request");
    log::error!("upstream request failed after 3 attempts");
    log::info!("demo finished");

    // hand every queued record to the appender before it flushes and closes
    worker.shutdown().await;
    appender.close().await;
    Ok(())
}
