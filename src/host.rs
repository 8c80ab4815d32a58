//! Narrow view of the host chat framework.
//! The host owns dispatch, routing and message-chain construction; the plugin
//! only sees these capabilities.

use std::path::PathBuf;

/// Content the plugin asks the host to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingMessage {
    Plain(String),
    /// Voice attachment. The file is only guaranteed to exist while `reply` runs.
    Voice(PathBuf),
    ImageWithText { image: PathBuf, text: String },
}

impl OutgoingMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        OutgoingMessage::Plain(text.into())
    }
}

/// Delivery failure reported by the host.
#[derive(Debug, Clone)]
pub struct HostError(pub String);

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "host delivery error: {}", self.0)
    }
}

impl std::error::Error for HostError {}

/// One incoming chat message, as exposed by the host.
pub trait ChatEvent: Send + Sync {
    /// Group the message was posted in, if any.
    fn group_id(&self) -> Option<String>;

    /// Unique conversation origin (group or private chat).
    fn origin_id(&self) -> String;

    fn sender_id(&self) -> String;

    fn text(&self) -> String;

    /// Reply into the conversation this event came from.
    fn reply(&self, message: OutgoingMessage) -> Result<(), HostError>;

    /// Key that scopes a game session: the group, else the origin.
    fn session_key(&self) -> String {
        self.group_id()
            .filter(|g| !g.is_empty())
            .unwrap_or_else(|| self.origin_id())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Reply log shared by every event of one conversation.
    #[derive(Default)]
    pub struct Outbox {
        pub sent: Mutex<Vec<OutgoingMessage>>,
        /// For voice replies: whether the attachment existed at send time.
        pub voice_existed: Mutex<Vec<bool>>,
        pub fail_on: Mutex<Option<String>>,
    }

    impl Outbox {
        pub fn texts(&self) -> Vec<String> {
            self.sent
                .lock()
                .iter()
                .filter_map(|m| match m {
                    OutgoingMessage::Plain(t) => Some(t.clone()),
                    OutgoingMessage::ImageWithText { text, .. } => Some(text.clone()),
                    OutgoingMessage::Voice(_) => None,
                })
                .collect()
        }
    }

    pub struct MockEvent {
        pub group: Option<String>,
        pub origin: String,
        pub sender: String,
        pub text: String,
        pub outbox: Arc<Outbox>,
    }

    impl MockEvent {
        pub fn group(outbox: &Arc<Outbox>, group: &str, sender: &str, text: &str) -> Arc<Self> {
            Arc::new(Self {
                group: Some(group.to_string()),
                origin: format!("group:{group}"),
                sender: sender.to_string(),
                text: text.to_string(),
                outbox: Arc::clone(outbox),
            })
        }

        pub fn private(outbox: &Arc<Outbox>, sender: &str, text: &str) -> Arc<Self> {
            Arc::new(Self {
                group: None,
                origin: format!("private:{sender}"),
                sender: sender.to_string(),
                text: text.to_string(),
                outbox: Arc::clone(outbox),
            })
        }
    }

    impl ChatEvent for MockEvent {
        fn group_id(&self) -> Option<String> {
            self.group.clone()
        }

        fn origin_id(&self) -> String {
            self.origin.clone()
        }

        fn sender_id(&self) -> String {
            self.sender.clone()
        }

        fn text(&self) -> String {
            self.text.clone()
        }

        fn reply(&self, message: OutgoingMessage) -> Result<(), HostError> {
            if let OutgoingMessage::Plain(text) = &message {
                if self.outbox.fail_on.lock().as_deref() == Some(text.as_str()) {
                    return Err(HostError(format!("refused: {text}")));
                }
            }
            if let OutgoingMessage::Voice(path) = &message {
                self.outbox.voice_existed.lock().push(path.exists());
            }
            self.outbox.sent.lock().push(message);
            Ok(())
        }
    }
}
