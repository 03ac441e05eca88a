//! Mock implementations for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use trailgram::{MessageSender, SendError, SendResult};

/// A message captured by [`MockSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Destination chat.
    pub chat_id: i64,
    /// Message text.
    pub text: String,
}

/// Mock implementation of [`MessageSender`].
///
/// Records every call, including failed ones. Failures can be queued one at
/// a time or made permanent.
#[derive(Debug, Clone, Default)]
pub struct MockSender {
    /// Every call made, in order.
    sent: Arc<Mutex<Vec<SentMessage>>>,
    /// Errors returned by the next calls, front first.
    queued_failures: Arc<Mutex<VecDeque<String>>>,
    /// Error returned by every call once the queue is empty.
    always_fail: Option<String>,
}

impl MockSender {
    /// Create a sender whose calls all succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sender whose calls all fail with `reason`.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            always_fail: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Make the next call fail with `reason`.
    #[must_use]
    pub fn with_failure(self, reason: impl Into<String>) -> Self {
        if let Ok(mut guard) = self.queued_failures.lock() {
            guard.push_back(reason.into());
        }
        self
    }

    /// Every call made so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Number of calls made so far.
    #[must_use]
    pub fn send_count(&self) -> usize {
        self.sent.lock().map(|g| g.len()).unwrap_or_default()
    }

    /// Text of the most recent call.
    #[must_use]
    pub fn last_text(&self) -> Option<String> {
        self.sent
            .lock()
            .ok()
            .and_then(|g| g.last().map(|m| m.text.clone()))
    }

    fn next_failure(&self) -> Option<String> {
        self.queued_failures
            .lock()
            .ok()
            .and_then(|mut g| g.pop_front())
            .or_else(|| self.always_fail.clone())
    }
}

#[async_trait]
impl MessageSender for MockSender {
    async fn send_text(&self, chat_id: i64, text: &str) -> SendResult<()> {
        if let Ok(mut guard) = self.sent.lock() {
            guard.push(SentMessage {
                chat_id,
                text: text.to_string(),
            });
        }
        match self.next_failure() {
            Some(reason) => Err(SendError::Telegram(reason)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_successful_sends() {
        let sender = MockSender::new();
        assert!(sender.send_text(7, "hello").await.is_ok());
        assert_eq!(
            sender.sent(),
            vec![SentMessage {
                chat_id: 7,
                text: "hello".to_string()
            }]
        );
        assert_eq!(sender.last_text().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn queued_failure_applies_once() {
        let sender = MockSender::new().with_failure("chat not found");
        let first = sender.send_text(1, "a").await;
        let second = sender.send_text(1, "b").await;
        assert_eq!(first, Err(SendError::Telegram("chat not found".to_string())));
        assert_eq!(second, Ok(()));
        assert_eq!(sender.send_count(), 2);
    }

    #[tokio::test]
    async fn failing_sender_still_records() {
        let sender = MockSender::failing("network down");
        assert!(sender.send_text(1, "a").await.is_err());
        assert!(sender.send_text(1, "b").await.is_err());
        assert_eq!(sender.send_count(), 2);
    }
}
