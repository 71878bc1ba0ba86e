//! Email notification appender: keeps the most recent logging events in a
//! cyclic buffer and mails them out when a triggering event arrives.

pub mod notify;
pub mod transcoder;
