//! Conversation stores: a JSON file for the CLI and an in-memory one.

use std::{fs, io::Write, path::PathBuf};

use loco_core::conversation::{upsert, Conversation, ConversationStore, StoreError};
use tracing::{debug, warn};

/// All conversations in one JSON array, rewritten on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// `conversations.json` under the user data directory.
    pub fn default_location() -> Option<Self> {
        loco_core::config::data_dir().map(|d| Self::new(d.join("conversations.json")))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn write_all(&self, all: &[Conversation]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(all)?;
        let mut tmp = self.path.clone();
        tmp.set_extension("json.tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&data)?;
            f.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(target:"chat::store","wrote {} conversations to {}", all.len(), self.path.display());
        Ok(())
    }
}

impl ConversationStore for JsonFileStore {
    fn list(&self) -> Result<Vec<Conversation>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read(&self.path)?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&data)?)
    }

    // An unreadable collection is moved aside so saving keeps working.
    fn save(&mut self, conversation: &mut Conversation) -> Result<(), StoreError> {
        let mut all = match self.list() {
            Ok(all) => all,
            Err(StoreError::Json(e)) => {
                let backup = self.path.with_extension("json.bak");
                warn!(target:"chat::store","{} is unreadable ({}), moving it to {}", self.path.display(), e, backup.display());
                fs::rename(&self.path, &backup)?;
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        upsert(&mut all, conversation);
        self.write_all(&all)
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let mut all = self.list()?;
        let before = all.len();
        all.retain(|c| c.id != id);
        if all.len() == before {
            return Ok(());
        }
        self.write_all(&all)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.write_all(&[])
    }
}

/// Store kept in memory; used for `--ephemeral` sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    conversations: Vec<Conversation>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversations(conversations: Vec<Conversation>) -> Self {
        Self {
            conversations,
            saves: 0,
        }
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl ConversationStore for MemoryStore {
    fn list(&self) -> Result<Vec<Conversation>, StoreError> {
        Ok(self.conversations.clone())
    }

    fn save(&mut self, conversation: &mut Conversation) -> Result<(), StoreError> {
        self.saves += 1;
        upsert(&mut self.conversations, conversation);
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        self.conversations.retain(|c| c.id != id);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.conversations.clear();
        Ok(())
    }
}
