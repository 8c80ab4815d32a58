//! Milestone table: tally count → celebratory message.
//! Loaded once at startup from `luguan.json`; a missing or broken file
//! disables milestones instead of failing the plugin.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{error, info, warn};

pub const MILESTONE_FILE: &str = "luguan.json";

#[derive(Debug, Clone, Deserialize)]
struct MilestoneEntry {
    count: u32,
    text: String,
}

/// On-disk format: `{"messages": [...]}` or a bare list of entries.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MilestoneFile {
    Wrapped {
        #[serde(default)]
        messages: Vec<MilestoneEntry>,
    },
    Bare(Vec<MilestoneEntry>),
}

#[derive(Debug)]
pub enum MilestoneError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for MilestoneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MilestoneError::Io(e) => write!(f, "milestone IO error: {e}"),
            MilestoneError::Parse(e) => write!(f, "milestone parse error: {e}"),
        }
    }
}

impl std::error::Error for MilestoneError {}

impl From<std::io::Error> for MilestoneError {
    fn from(e: std::io::Error) -> Self {
        MilestoneError::Io(e)
    }
}

impl From<serde_json::Error> for MilestoneError {
    fn from(e: serde_json::Error) -> Self {
        MilestoneError::Parse(e)
    }
}

/// Immutable count → text mapping.
#[derive(Debug, Clone, Default)]
pub struct MilestoneTable {
    messages: HashMap<u32, String>,
}

impl MilestoneTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        Self {
            messages: entries.into_iter().map(|(c, t)| (c, t.into())).collect(),
        }
    }

    /// Strict load; callers that want degradation use [`MilestoneTable::load`].
    pub fn load_from_file(path: &Path) -> Result<Self, MilestoneError> {
        let content = std::fs::read_to_string(path)?;
        let file: MilestoneFile = serde_json::from_str(&content)?;
        let entries = match file {
            MilestoneFile::Wrapped { messages } => messages,
            MilestoneFile::Bare(entries) => entries,
        };
        Ok(Self::from_entries(entries.into_iter().map(|e| (e.count, e.text))))
    }

    /// Load, degrading to an empty table on any failure.
    pub fn load(path: &Path) -> Self {
        match Self::load_from_file(path) {
            Ok(table) => {
                info!(path = %path.display(), count = table.len(), "milestone table loaded");
                table
            }
            Err(MilestoneError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "milestone file not found, milestones disabled");
                Self::empty()
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "milestone table load failed, milestones disabled");
                Self::empty()
            }
        }
    }

    pub fn get(&self, count: u32) -> Option<&str> {
        self.messages.get(&count).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_wrapped_messages() {
        let file = write_temp(r#"{"messages":[{"count":3,"text":"congrats!"},{"count":10,"text":"ten"}]}"#);
        let table = MilestoneTable::load(file.path());
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(3), Some("congrats!"));
        assert_eq!(table.get(4), None);
    }

    #[test]
    fn test_load_bare_list() {
        let file = write_temp(r#"[{"count":1,"text":"first"}]"#);
        let table = MilestoneTable::load(file.path());
        assert_eq!(table.get(1), Some("first"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = MilestoneTable::load(&dir.path().join(MILESTONE_FILE));
        assert!(table.is_empty());
    }

    #[test]
    fn test_malformed_file_is_empty() {
        let file = write_temp(r#"{"messages":[{"count":"three"}]"#);
        assert!(matches!(
            MilestoneTable::load_from_file(file.path()),
            Err(MilestoneError::Parse(_))
        ));
        assert!(MilestoneTable::load(file.path()).is_empty());
    }
}
