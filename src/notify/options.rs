use crate::notify::address::{parse_address, parse_mailbox};
use crate::notify::smtp::{
    DEFAULT_SMTP_PORT, DEFAULT_SMTP_TIMEOUT, SmtpSettings, parse_transfer_encoding,
};
use crate::notify::types::AppenderError;
use crate::transcoder::Transcoder;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_BUFFER_SIZE: usize = 512;
pub const DEFAULT_CHARSET: &str = "UTF-8";
pub const DEFAULT_ENCODING: &str = "quoted-printable";

/// Raw, unvalidated appender options as set by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppenderOptions {
    pub to: Option<String>,
    pub from: Option<String>,
    pub subject: Option<String>,
    /// `host` or `host:port`
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub buffer_size: usize,
    /// Capturing call-site locations is comparatively slow; off by default
    pub location_info: bool,
    pub charset: String,
    pub encoding: String,
}

impl Default for AppenderOptions {
    fn default() -> Self {
        Self {
            to: None,
            from: None,
            subject: None,
            smtp_host: None,
            smtp_port: None,
            smtp_username: None,
            smtp_password: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            location_info: false,
            charset: DEFAULT_CHARSET.to_string(),
            encoding: DEFAULT_ENCODING.to_string(),
        }
    }
}

fn parse_bool(option: &str, value: &str) -> Result<bool, AppenderError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(AppenderError::Configuration(format!(
            "{option}: expected a boolean, got {other:?}"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(option: &str, value: &str) -> Result<T, AppenderError> {
    value.trim().parse().map_err(|_| {
        AppenderError::Configuration(format!("{option}: expected a non-negative integer, got {value:?}"))
    })
}

impl AppenderOptions {
    /// Apply one named option. Names are case-insensitive; unknown names are
    /// ignored with a warning.
    pub fn set_option(&mut self, option: &str, value: &str) -> Result<(), AppenderError> {
        match option.trim().to_ascii_lowercase().as_str() {
            "to" => self.to = Some(value.to_string()),
            "from" => self.from = Some(value.to_string()),
            "subject" => self.subject = Some(value.to_string()),
            "smtphost" => self.smtp_host = Some(value.to_string()),
            "smtpport" => self.smtp_port = Some(parse_number(option, value)?),
            "smtpusername" => self.smtp_username = Some(value.to_string()),
            "smtppassword" => self.smtp_password = Some(value.to_string()),
            "buffersize" => self.buffer_size = parse_number(option, value)?,
            "locationinfo" => self.location_info = parse_bool(option, value)?,
            "charset" => self.charset = value.to_string(),
            "encoding" => self.encoding = value.to_string(),
            _ => log::warn!("ignoring unknown appender option {:?}", option),
        }
        Ok(())
    }

    /// Read options from `LOG_MAIL_*` environment variables, keeping defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self, AppenderError> {
        const VARS: [(&str, &str); 11] = [
            ("LOG_MAIL_TO", "to"),
            ("LOG_MAIL_FROM", "from"),
            ("LOG_MAIL_SUBJECT", "subject"),
            ("LOG_MAIL_SMTP_HOST", "smtphost"),
            ("LOG_MAIL_SMTP_PORT", "smtpport"),
            ("LOG_MAIL_SMTP_USERNAME", "smtpusername"),
            ("LOG_MAIL_SMTP_PASSWORD", "smtppassword"),
            ("LOG_MAIL_BUFFER_SIZE", "buffersize"),
            ("LOG_MAIL_LOCATION_INFO", "locationinfo"),
            ("LOG_MAIL_CHARSET", "charset"),
            ("LOG_MAIL_ENCODING", "encoding"),
        ];
        let mut options = Self::default();
        for (var, option) in VARS {
            if let Ok(value) = env::var(var) {
                options.set_option(option, &value)?;
            }
        }
        Ok(options)
    }

    /// Split `smtp_host` into host and port; an explicit `smtp_port` wins.
    fn smtp_endpoint(&self) -> Result<Option<(String, u16)>, AppenderError> {
        let Some(raw) = self.smtp_host.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }
        let (host, port) = if let Some(rest) = raw.strip_prefix('[') {
            // bracketed IPv6 literal, optionally followed by :port
            let (host, after) = rest.split_once(']').ok_or_else(|| {
                AppenderError::Configuration(format!("SMTPHost: unclosed '[' in {raw:?}"))
            })?;
            let port = match after {
                "" => None,
                _ => match after.strip_prefix(':') {
                    Some(port) => Some(parse_number::<u16>("SMTPHost", port)?),
                    None => {
                        return Err(AppenderError::Configuration(format!(
                            "SMTPHost: unexpected {after:?} after ']' in {raw:?}"
                        )));
                    }
                },
            };
            (host, port)
        } else if raw.matches(':').count() > 1 {
            return Err(AppenderError::Configuration(format!(
                "SMTPHost: IPv6 addresses must be bracketed, as in [::1]:25, got {raw:?}"
            )));
        } else {
            match raw.rsplit_once(':') {
                Some((host, port)) => (host, Some(parse_number::<u16>("SMTPHost", port)?)),
                None => (raw, None),
            }
        };
        if host.is_empty() {
            return Err(AppenderError::Configuration(format!(
                "SMTPHost: missing host in {raw:?}"
            )));
        }
        let port = self.smtp_port.or(port).unwrap_or(DEFAULT_SMTP_PORT);
        Ok(Some((host.to_string(), port)))
    }

    /// Validate everything and freeze it into an [`AppenderConfig`].
    ///
    /// `require_smtp` is false when a notifier has been injected and no
    /// transport needs to be built.
    pub fn validate(&self, require_smtp: bool) -> Result<AppenderConfig, AppenderError> {
        let to = parse_address(self.to.as_deref().unwrap_or_default())?;
        if to.is_empty() {
            return Err(AppenderError::Configuration(
                "no recipients configured (To)".into(),
            ));
        }
        let from = match self.from.as_deref().map(str::trim) {
            Some(from) if !from.is_empty() => parse_mailbox(from)?,
            _ => {
                return Err(AppenderError::Configuration(
                    "no sender configured (From)".into(),
                ));
            }
        };

        let smtp = match self.smtp_endpoint()? {
            Some((host, port)) => Some(SmtpSettings {
                host,
                port,
                username: self.smtp_username.clone(),
                password: self.smtp_password.clone(),
                timeout: DEFAULT_SMTP_TIMEOUT,
            }),
            None if require_smtp => {
                return Err(AppenderError::Configuration(
                    "no SMTP host configured (SMTPHost)".into(),
                ));
            }
            None => None,
        };

        let transcoder = Transcoder::for_label(&self.charset)
            .map_err(|e| AppenderError::Configuration(e.to_string()))?;
        if parse_transfer_encoding(&self.encoding).is_none() {
            return Err(AppenderError::Configuration(format!(
                "unsupported transfer encoding {:?}",
                self.encoding
            )));
        }

        Ok(AppenderConfig {
            to,
            from,
            subject: self.subject.clone().unwrap_or_default(),
            smtp,
            buffer_size: self.buffer_size,
            location_info: self.location_info,
            transcoder,
            encoding: self.encoding.trim().to_ascii_lowercase(),
        })
    }
}

/// Validated configuration, fixed for as long as the appender is active
#[derive(Debug, Clone)]
pub struct AppenderConfig {
    pub to: Vec<Mailbox>,
    pub from: Mailbox,
    pub subject: String,
    pub smtp: Option<SmtpSettings>,
    pub buffer_size: usize,
    pub location_info: bool,
    pub transcoder: Transcoder,
    pub encoding: String,
}
