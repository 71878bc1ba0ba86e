use crate::notify::types::LoggingEvent;

/// Renders events into the notification body
pub trait Layout: Send + Sync {
    fn format(&self, event: &LoggingEvent) -> String;

    fn content_type(&self) -> &str {
        "text/plain"
    }

    fn header(&self) -> Option<String> {
        None
    }

    fn footer(&self) -> Option<String> {
        None
    }
}

/// `LEVEL - message`, one event per line, with the call site appended when known
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleLayout;

impl Layout for SimpleLayout {
    fn format(&self, event: &LoggingEvent) -> String {
        match &event.location {
            Some(loc) => format!(
                "{} - {} ({}:{})\n",
                event.level,
                event.message,
                loc.file.as_deref().unwrap_or("?"),
                loc.line.map(|l| l.to_string()).unwrap_or_else(|| "?".into()),
            ),
            None => format!("{} - {}\n", event.level, event.message),
        }
    }
}

/// One JSON object per line
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLayout;

impl Layout for JsonLayout {
    fn format(&self, event: &LoggingEvent) -> String {
        match serde_json::to_string(event) {
            Ok(mut line) => {
                line.push('\n');
                line
            }
            Err(e) => {
                log::warn!("failed to serialize event {}: {}", event.event_id, e);
                format!("{} - {}\n", event.level, event.message)
            }
        }
    }

    fn content_type(&self) -> &str {
        "application/x-ndjson"
    }
}

/// Header, every event in order, then footer
pub fn render_body(layout: &dyn Layout, events: &[LoggingEvent]) -> String {
    let mut body = layout.header().unwrap_or_default();
    for event in events {
        body.push_str(&layout.format(event));
    }
    if let Some(footer) = layout.footer() {
        body.push_str(&footer);
    }
    body
}
