//! Notifier that records messages instead of sending them.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::domain::foundation::ExternalUserId;
use crate::ports::{NotificationError, Notifier};

/// A message captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    Text {
        to: ExternalUserId,
        text: String,
    },
    Document {
        to: ExternalUserId,
        filename: String,
        size: usize,
        caption: Option<String>,
    },
}

impl SentMessage {
    pub fn recipient(&self) -> ExternalUserId {
        match self {
            SentMessage::Text { to, .. } | SentMessage::Document { to, .. } => *to,
        }
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    sent: Vec<SentMessage>,
    fail: bool,
}

/// Test notifier: keeps every message, optionally failing every send.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every subsequent send with a network error.
    pub fn fail_all(&self, fail: bool) {
        self.lock().fail = fail;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.lock().sent.clone()
    }

    /// Texts delivered to one recipient, in order.
    pub fn texts_to(&self, to: ExternalUserId) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .filter_map(|message| match message {
                SentMessage::Text { to: recipient, text } if *recipient == to => {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, to: ExternalUserId, text: &str) -> Result<(), NotificationError> {
        let mut state = self.lock();
        if state.fail {
            return Err(NotificationError::Network("recording notifier failure".to_string()));
        }
        state.sent.push(SentMessage::Text {
            to,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_document(
        &self,
        to: ExternalUserId,
        filename: &str,
        content: Vec<u8>,
        caption: Option<&str>,
    ) -> Result<(), NotificationError> {
        let mut state = self.lock();
        if state.fail {
            return Err(NotificationError::Network("recording notifier failure".to_string()));
        }
        state.sent.push(SentMessage::Document {
            to,
            filename: filename.to_string(),
            size: content.len(),
            caption: caption.map(str::to_string),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_texts_per_recipient() {
        let notifier = RecordingNotifier::new();
        notifier.send_text(ExternalUserId::new(1), "a").await.unwrap();
        notifier.send_text(ExternalUserId::new(2), "b").await.unwrap();

        assert_eq!(notifier.texts_to(ExternalUserId::new(1)), vec!["a".to_string()]);
        assert_eq!(notifier.sent().len(), 2);
    }

    #[tokio::test]
    async fn failing_notifier_records_nothing() {
        let notifier = RecordingNotifier::new();
        notifier.fail_all(true);

        assert!(notifier.send_text(ExternalUserId::new(1), "a").await.is_err());
        assert!(notifier.sent().is_empty());
    }
}
