pub mod address;
pub mod appender;
pub mod bridge;
pub mod buffer;
pub mod evaluator;
pub mod layout;
pub mod notifier;
pub mod options;
pub mod smtp;
pub mod types;

pub use address::{parse_address, parse_mailbox};
pub use appender::SmtpAppender;
pub use bridge::{DEFAULT_CHANNEL_CAPACITY, MailLogger, MailLoggerWorker};
pub use buffer::CyclicBuffer;
pub use evaluator::*;
pub use layout::*;
pub use notifier::*;
pub use options::{AppenderConfig, AppenderOptions};
pub use smtp::{SmtpNotifier, SmtpSettings};
pub use types::*;
