use async_trait::async_trait;
use log_mail_appender::notify::{
    Envelope, Level, LoggingEvent, Notification, NotificationError, Notifier, QueuedNotifier,
    SimpleLayout, SmtpAppender,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Slow notifier that records the order batches arrive in
#[derive(Default)]
struct SlowRecorder {
    bodies: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for SlowRecorder {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.bodies.lock().unwrap().push(notification.body.clone());
        Ok(())
    }
}

fn notification(body: &str) -> Notification {
    Notification {
        envelope: Envelope {
            to: vec!["ops@example.com".parse().unwrap()],
            from: "app@example.com".parse().unwrap(),
            subject: "test".into(),
        },
        events: vec![LoggingEvent::new(Level::Error, "app", body)],
        body: body.into(),
        content_type: "text/plain".into(),
        charset: "UTF-8".into(),
        encoding: "7bit".into(),
    }
}

#[tokio::test]
async fn queued_delivery_preserves_order() {
    let recorder = Arc::new(SlowRecorder::default());
    let queued = QueuedNotifier::spawn(recorder.clone());

    for i in 0..5 {
        queued.send(&notification(&i.to_string())).await.unwrap();
    }
    queued.shutdown().await;

    assert_eq!(*recorder.bodies.lock().unwrap(), vec!["0", "1", "2", "3", "4"]);
}

#[tokio::test]
async fn send_after_shutdown_fails() {
    let queued = QueuedNotifier::spawn(Arc::new(SlowRecorder::default()));
    queued.shutdown().await;
    assert!(matches!(
        queued.send(&notification("late")).await,
        Err(NotificationError::Closed)
    ));
    // second shutdown is harmless
    queued.shutdown().await;
}

// Appending returns before the slow notifier has finished
#[tokio::test]
async fn appender_with_queued_notifier_delivers_on_close() {
    let recorder = Arc::new(SlowRecorder::default());
    let appender = SmtpAppender::new();
    appender.set_to("ops@example.com").unwrap();
    appender.set_from("app@example.com").unwrap();
    appender.set_layout(Arc::new(SimpleLayout)).unwrap();
    appender
        .set_notifier(Arc::new(QueuedNotifier::spawn(recorder.clone())))
        .unwrap();
    appender.activate_options().unwrap();

    appender
        .append(LoggingEvent::new(Level::Error, "app", "first"))
        .await
        .unwrap();
    appender
        .append(LoggingEvent::new(Level::Info, "app", "second"))
        .await
        .unwrap();
    appender.close().await;

    assert_eq!(
        *recorder.bodies.lock().unwrap(),
        vec!["ERROR - first\n", "INFO - second\n"]
    );
}

/// Never finishes a delivery, so the queue behind it can only fill up
struct Hung;

#[async_trait]
impl Notifier for Hung {
    async fn send(&self, _notification: &Notification) -> Result<(), NotificationError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test]
async fn stuck_notifier_fills_bounded_queue() {
    let queued = QueuedNotifier::with_capacity(Arc::new(Hung), 2);
    assert_eq!(queued.capacity(), 2);

    let mut accepted = 0;
    let mut rejected = 0;
    for i in 0..100 {
        match queued.send(&notification(&i.to_string())).await {
            Ok(()) => accepted += 1,
            Err(NotificationError::QueueFull { capacity }) => {
                assert_eq!(capacity, 2);
                rejected += 1;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
        tokio::task::yield_now().await;
    }

    // two queued plus at most one held by the worker
    assert!(accepted <= 3, "accepted {accepted} batches");
    assert_eq!(accepted + rejected, 100);
    assert!(rejected > 0);
}
