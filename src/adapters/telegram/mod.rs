//! Chat notification adapters.
//!
//! - `TelegramNotifier` - Telegram Bot API client
//! - `RecordingNotifier` - Captures messages for tests

mod notifier;
mod recording_notifier;

pub use notifier::{TelegramConfig, TelegramNotifier};
pub use recording_notifier::{RecordingNotifier, SentMessage};
