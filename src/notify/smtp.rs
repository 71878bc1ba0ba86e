use crate::notify::notifier::{Notification, Notifier};
use crate::notify::types::NotificationError;
use crate::transcoder::Transcoder;
use async_trait::async_trait;
use lettre::message::header::{ContentTransferEncoding, ContentType};
use lettre::message::{Body, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

pub const DEFAULT_SMTP_PORT: u16 = 25;
pub const DEFAULT_SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to reach the SMTP server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

/// Map a transfer encoding option value to its header; unknown values yield `None`.
pub fn parse_transfer_encoding(value: &str) -> Option<ContentTransferEncoding> {
    match value.trim().to_ascii_lowercase().as_str() {
        "7bit" => Some(ContentTransferEncoding::SevenBit),
        "8bit" => Some(ContentTransferEncoding::EightBit),
        "base64" => Some(ContentTransferEncoding::Base64),
        "binary" => Some(ContentTransferEncoding::Binary),
        "quoted" | "quoted-printable" => Some(ContentTransferEncoding::QuotedPrintable),
        _ => None,
    }
}

/// Sends each notification as a single-part email over plain SMTP
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings) -> Self {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
            .port(settings.port)
            .timeout(Some(settings.timeout));
        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Self {
            mailer: builder.build(),
        }
    }

    /// Build the email for a notification without sending it.
    pub fn build_message(notification: &Notification) -> Result<Message, NotificationError> {
        let envelope = &notification.envelope;
        let mut builder = Message::builder()
            .from(envelope.from.clone())
            .subject(envelope.subject.clone());
        for to in &envelope.to {
            builder = builder.to(to.clone());
        }

        let transcoder = Transcoder::for_label(&notification.charset).unwrap_or_else(|e| {
            log::warn!("{}; falling back to UTF-8", e);
            Transcoder::utf8()
        });
        let content_type = ContentType::parse(&format!(
            "{}; charset={}",
            notification.content_type,
            transcoder.name()
        ))
        .unwrap_or(ContentType::TEXT_PLAIN);

        let bytes = transcoder.encode(&notification.body);
        let body = match parse_transfer_encoding(&notification.encoding) {
            Some(encoding) => Body::new_with_encoding(bytes, encoding).unwrap_or_else(|bytes| {
                log::debug!(
                    "body not representable as {}; choosing encoding automatically",
                    notification.encoding
                );
                Body::new(bytes)
            }),
            None => Body::new(bytes),
        };

        let part = SinglePart::builder().header(content_type).body(body);
        Ok(builder.singlepart(part)?)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let email = Self::build_message(notification)?;
        let response = self.mailer.send(email).await?;
        log::debug!(
            "sent {} events to {} recipients: {:?}",
            notification.events.len(),
            notification.envelope.to.len(),
            response.code()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::notifier::Envelope;
    use crate::notify::types::{Level, LoggingEvent};

    fn notification(charset: &str, encoding: &str) -> Notification {
        Notification {
            envelope: Envelope {
                to: vec!["ops@example.com".parse().unwrap(), "dev@example.com".parse().unwrap()],
                from: "app@example.com".parse().unwrap(),
                subject: "Errors in app".into(),
            },
            events: vec![LoggingEvent::new(Level::Error, "app", "boom")],
            body: "ERROR - boom\n".into(),
            content_type: "text/plain".into(),
            charset: charset.into(),
            encoding: encoding.into(),
        }
    }

    #[test]
    fn parses_transfer_encodings() {
        assert_eq!(
            parse_transfer_encoding("Quoted"),
            Some(ContentTransferEncoding::QuotedPrintable)
        );
        assert_eq!(
            parse_transfer_encoding("base64"),
            Some(ContentTransferEncoding::Base64)
        );
        assert_eq!(parse_transfer_encoding("uuencode"), None);
    }

    #[test]
    fn builds_message_with_all_recipients() {
        let email = SmtpNotifier::build_message(&notification("iso-8859-1", "base64")).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("Subject: Errors in app"));
        assert!(raw.contains("ops@example.com"));
        assert!(raw.contains("dev@example.com"));
        assert!(raw.to_ascii_lowercase().contains("charset=windows-1252"));
        assert!(raw.contains("Content-Transfer-Encoding: base64"));
    }

    #[test]
    fn unknown_charset_falls_back_to_utf8() {
        let email = SmtpNotifier::build_message(&notification("klingon", "7bit")).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.to_ascii_lowercase().contains("charset=utf-8"));
        assert!(raw.contains("ERROR - boom"));
    }
}
