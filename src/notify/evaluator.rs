use crate::notify::types::{Level, LoggingEvent};
use regex::Regex;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Decides whether an event should cause the buffered events to be sent
pub trait TriggeringEventEvaluator: Send + Sync {
    fn is_triggering_event(&self, event: &LoggingEvent) -> bool;
}

/// Triggers on ERROR and above
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEvaluator;

impl TriggeringEventEvaluator for DefaultEvaluator {
    fn is_triggering_event(&self, event: &LoggingEvent) -> bool {
        event.level >= Level::Error
    }
}

/// Triggers on `threshold` and above
#[derive(Debug, Clone, Copy)]
pub struct LevelThresholdEvaluator {
    threshold: Level,
}

impl LevelThresholdEvaluator {
    pub fn new(threshold: Level) -> Self {
        Self { threshold }
    }
}

impl TriggeringEventEvaluator for LevelThresholdEvaluator {
    fn is_triggering_event(&self, event: &LoggingEvent) -> bool {
        event.level >= self.threshold
    }
}

/// Triggers when the message matches a regular expression, regardless of level
#[derive(Debug, Clone)]
pub struct MessagePatternEvaluator {
    pattern: Regex,
}

impl MessagePatternEvaluator {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl TriggeringEventEvaluator for MessagePatternEvaluator {
    fn is_triggering_event(&self, event: &LoggingEvent) -> bool {
        self.pattern.is_match(&event.message)
    }
}

/// Wraps another evaluator and lets at most `max_triggers` through per `interval`
pub struct RateLimitedEvaluator<E: TriggeringEventEvaluator> {
    inner: E,
    max_triggers: usize,
    interval: Duration,
    fired: AtomicUsize,
    last_reset: Mutex<Instant>,
}

impl<E: TriggeringEventEvaluator> RateLimitedEvaluator<E> {
    pub fn new(inner: E, max_triggers: usize, interval: Duration) -> Self {
        Self {
            inner,
            max_triggers,
            interval,
            fired: AtomicUsize::new(0),
            last_reset: Mutex::new(Instant::now()),
        }
    }

    fn allow(&self) -> bool {
        let mut last = self
            .last_reset
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if last.elapsed() > self.interval {
            self.fired.store(0, Ordering::Relaxed);
            *last = Instant::now();
        }
        let count = self.fired.fetch_add(1, Ordering::Relaxed);
        count < self.max_triggers
    }
}

impl<E: TriggeringEventEvaluator> TriggeringEventEvaluator for RateLimitedEvaluator<E> {
    fn is_triggering_event(&self, event: &LoggingEvent) -> bool {
        self.inner.is_triggering_event(event) && self.allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(level: Level, message: &str) -> LoggingEvent {
        LoggingEvent::new(level, "test", message)
    }

    #[test]
    fn default_triggers_on_error_and_fatal() {
        let eval = DefaultEvaluator;
        assert!(!eval.is_triggering_event(&event(Level::Debug, "x")));
        assert!(!eval.is_triggering_event(&event(Level::Warn, "x")));
        assert!(eval.is_triggering_event(&event(Level::Error, "x")));
        assert!(eval.is_triggering_event(&event(Level::Fatal, "x")));
    }

    #[test]
    fn threshold_is_inclusive() {
        let eval = LevelThresholdEvaluator::new(Level::Warn);
        assert!(!eval.is_triggering_event(&event(Level::Info, "x")));
        assert!(eval.is_triggering_event(&event(Level::Warn, "x")));
    }

    #[test]
    fn pattern_matches_message() {
        let eval = MessagePatternEvaluator::new(r"disk (full|failure)").unwrap();
        assert!(eval.is_triggering_event(&event(Level::Info, "disk full on /var")));
        assert!(!eval.is_triggering_event(&event(Level::Fatal, "all good")));
        assert!(MessagePatternEvaluator::new("(").is_err());
    }

    #[test]
    fn rate_limit_caps_triggers_per_window() {
        let eval = RateLimitedEvaluator::new(DefaultEvaluator, 2, Duration::from_secs(3600));
        let err = event(Level::Error, "boom");
        assert!(eval.is_triggering_event(&err));
        assert!(eval.is_triggering_event(&err));
        assert!(!eval.is_triggering_event(&err));
        // non-triggering events do not consume the budget
        assert!(!eval.is_triggering_event(&event(Level::Info, "ok")));
    }

    #[test]
    fn rate_limit_window_resets() {
        let eval = RateLimitedEvaluator::new(DefaultEvaluator, 1, Duration::from_millis(1));
        let err = event(Level::Error, "boom");
        assert!(eval.is_triggering_event(&err));
        std::thread::sleep(Duration::from_millis(5));
        assert!(eval.is_triggering_event(&err));
    }
}
