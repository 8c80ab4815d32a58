//! Keyword tally game state: per-group sessions, keyword classification and
//! leaderboard rendering. The registry is the single owner of group → session.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::PluginError;
use crate::listener::{IncomingMessage, ListenerHandle};
use crate::state_machine::GameState;

pub const PROMPT_IMAGE_FILE: &str = "luguanluguanshijiandao.jpg";
pub const STOP_PHRASE: &str = "不鹿了";
pub const DEFAULT_KEYWORDS: [&str; 3] = ["鹿", "撸管", "🦌"];

/// How one message affects a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Stop,
    Keyword,
    Other,
}

/// Stop phrase + trigger substrings, matched case-insensitively.
#[derive(Debug, Clone)]
pub struct KeywordRules {
    stop_phrase: String,
    keywords: Vec<String>,
}

impl Default for KeywordRules {
    fn default() -> Self {
        Self::new(STOP_PHRASE, DEFAULT_KEYWORDS)
    }
}

impl KeywordRules {
    pub fn new<I, S>(stop_phrase: &str, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            stop_phrase: stop_phrase.to_lowercase(),
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Stop phrase wins over keywords; a message counts at most once.
    pub fn classify(&self, text: &str) -> MessageKind {
        let text = text.to_lowercase();
        if text.contains(&self.stop_phrase) {
            MessageKind::Stop
        } else if self.keywords.iter().any(|k| text.contains(k.as_str())) {
            MessageKind::Keyword
        } else {
            MessageKind::Other
        }
    }
}

/// One group's round.
#[derive(Debug, Clone, Default)]
pub struct GameSession {
    pub is_running: bool,
    pub records: HashMap<String, u32>,
}

impl GameSession {
    fn started() -> Self {
        Self {
            is_running: true,
            records: HashMap::new(),
        }
    }

    /// Increment `sender`'s tally and return the new count.
    pub fn increment(&mut self, sender: &str) -> u32 {
        let count = self.records.entry(sender.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Entries sorted by count descending, then user id ascending.
    pub fn leaderboard(&self) -> Vec<(String, u32)> {
        let mut entries: Vec<(String, u32)> =
            self.records.iter().map(|(u, c)| (u.clone(), *c)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}

pub const EMPTY_LEADERBOARD: &str = "导管室空无一人,十年前的仇难道不报了吗!";

/// Final message for a finished session.
pub fn render_leaderboard(entries: &[(String, u32)]) -> String {
    if entries.is_empty() {
        return EMPTY_LEADERBOARD.to_string();
    }
    let mut text = String::from("本次航班已结束:\n");
    for (user, count) in entries {
        text.push_str(&format!("几把 {user}:鹿了 {count} 次\n"));
    }
    text
}

struct SessionEntry {
    session: GameSession,
    listener: ListenerHandle,
}

/// Group → running session. At most one session per key.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, key: &str) -> GameState {
        match self.sessions.lock().get(key) {
            Some(entry) if entry.session.is_running => GameState::Running,
            _ => GameState::Idle,
        }
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.state(key) == GameState::Running
    }

    /// Idle → Running. Rejected without touching the existing session if one is running.
    pub fn try_start(&self, key: &str, listener: ListenerHandle) -> Result<(), PluginError> {
        let mut sessions = self.sessions.lock();
        let current = match sessions.get(key) {
            Some(entry) if entry.session.is_running => GameState::Running,
            _ => GameState::Idle,
        };
        if current.transition(GameState::Running, key).is_err() {
            warn!(group = key, "session start rejected, already running");
            return Err(PluginError::SessionConflict);
        }
        sessions.insert(
            key.to_string(),
            SessionEntry {
                session: GameSession::started(),
                listener,
            },
        );
        Ok(())
    }

    /// Forward a message to the session listening on `key`.
    pub fn route(&self, key: &str, message: IncomingMessage) -> bool {
        match self.sessions.lock().get(key) {
            Some(entry) => entry.listener.deliver(message),
            None => false,
        }
    }

    /// Running → Running: bump the sender's tally.
    pub fn tally(&self, key: &str, sender: &str) -> Option<u32> {
        let mut sessions = self.sessions.lock();
        let entry = sessions.get_mut(key)?;
        Some(entry.session.increment(sender))
    }

    pub fn records(&self, key: &str) -> Option<HashMap<String, u32>> {
        self.sessions
            .lock()
            .get(key)
            .map(|e| e.session.records.clone())
    }

    /// Running → Idle: remove and return the session.
    pub fn finish(&self, key: &str) -> Option<GameSession> {
        let entry = self.sessions.lock().remove(key)?;
        entry.listener.cancel();
        let mut session = entry.session;
        let current = if session.is_running {
            GameState::Running
        } else {
            GameState::Idle
        };
        // entry is gone either way
        let _ = current.transition(GameState::Idle, key);
        session.is_running = false;
        Some(session)
    }

    /// Cancel every listener. Each session task then finishes itself.
    pub fn cancel_all(&self) -> usize {
        let sessions = self.sessions.lock();
        for entry in sessions.values() {
            entry.listener.cancel();
        }
        sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Guard that removes `key` when dropped, whatever the exit path.
    pub fn guard<'a>(&'a self, key: &str) -> SessionGuard<'a> {
        SessionGuard {
            registry: self,
            key: key.to_string(),
        }
    }
}

pub struct SessionGuard<'a> {
    registry: &'a SessionRegistry,
    key: String,
}

impl SessionGuard<'_> {
    /// Remove the session now and hand back its records.
    pub fn finish(&self) -> Option<GameSession> {
        self.registry.finish(&self.key)
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if self.registry.finish(&self.key).is_some() {
            warn!(group = %self.key, "session removed by guard without leaderboard");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener;
    use std::time::Duration;

    #[test]
    fn test_classify() {
        let rules = KeywordRules::default();
        assert_eq!(rules.classify("今天鹿了吗"), MessageKind::Keyword);
        assert_eq!(rules.classify("撸管"), MessageKind::Keyword);
        assert_eq!(rules.classify("🦌🦌"), MessageKind::Keyword);
        assert_eq!(rules.classify("不鹿了"), MessageKind::Stop);
        assert_eq!(rules.classify("hello"), MessageKind::Other);
    }

    #[test]
    fn test_classify_case_insensitive() {
        let rules = KeywordRules::new("STOP", ["Deer"]);
        assert_eq!(rules.classify("a DEER appears"), MessageKind::Keyword);
        assert_eq!(rules.classify("please stop"), MessageKind::Stop);
    }

    #[test]
    fn test_leaderboard_order() {
        let mut session = GameSession::started();
        session.increment("bob");
        session.increment("alice");
        session.increment("alice");
        session.increment("carol");
        assert_eq!(
            session.leaderboard(),
            vec![
                ("alice".to_string(), 2),
                ("bob".to_string(), 1),
                ("carol".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_render_leaderboard() {
        assert_eq!(render_leaderboard(&[]), EMPTY_LEADERBOARD);
        let text = render_leaderboard(&[("alice".to_string(), 2), ("bob".to_string(), 1)]);
        assert_eq!(text, "本次航班已结束:\n几把 alice:鹿了 2 次\n几把 bob:鹿了 1 次\n");
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_and_keeps_records() {
        let registry = SessionRegistry::new();
        let (h1, _l1) = listener::scoped(Duration::from_secs(60));
        registry.try_start("g1", h1).unwrap();
        registry.tally("g1", "alice");

        let (h2, _l2) = listener::scoped(Duration::from_secs(60));
        assert!(matches!(
            registry.try_start("g1", h2),
            Err(PluginError::SessionConflict)
        ));
        assert_eq!(registry.records("g1").unwrap().get("alice"), Some(&1));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_guard_removes_entry() {
        let registry = SessionRegistry::new();
        let (handle, _listener) = listener::scoped(Duration::from_secs(60));
        registry.try_start("g1", handle.clone()).unwrap();
        {
            let _guard = registry.guard("g1");
            assert!(registry.is_running("g1"));
        }
        assert_eq!(registry.state("g1"), GameState::Idle);
        assert!(handle.is_cancelled());
        assert!(registry.finish("g1").is_none());
    }

    #[tokio::test]
    async fn test_route_only_to_matching_key() {
        let registry = SessionRegistry::new();
        let (handle, _listener) = listener::scoped(Duration::from_secs(60));
        registry.try_start("g1", handle).unwrap();
        let msg = IncomingMessage {
            sender_id: "a".to_string(),
            text: "鹿".to_string(),
        };
        assert!(registry.route("g1", msg.clone()));
        assert!(!registry.route("g2", msg));
    }
}
