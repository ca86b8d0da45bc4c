//! # raft-storage
//!
//! why: provide durable persistence for raft state using standard rust fs apis
//! relations: driven by raft-driver's host adapter from the core's persistence and log hooks
//! what: Storage trait, FileStorage implementation, InMemoryStorage for testing

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use raft_core::{HostError, LogEntry, LogIndex, NodeId, Term};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("persisted state is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// the log only grows at its tail
    #[error("entry {actual} appended out of order, expected {expected}")]
    OutOfOrder { expected: LogIndex, actual: LogIndex },
}

pub type Result<T, E = StorageError> = std::result::Result<T, E>;

impl From<StorageError> for HostError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(io) => HostError::Io(io),
            other => HostError::rejected(other.to_string()),
        }
    }
}

/// the persisted log: entries after `base`, the first one sitting at `base + 1`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedLog {
    pub base: LogIndex,
    pub entries: Vec<LogEntry>,
}

impl PersistedLog {
    /// index of the newest entry, or `base` when nothing is kept
    pub fn last_index(&self) -> LogIndex {
        self.base + self.entries.len() as LogIndex
    }

    fn append(&mut self, index: LogIndex, entry: &LogEntry) -> Result<()> {
        let expected = self.last_index() + 1;
        if index != expected {
            return Err(StorageError::OutOfOrder {
                expected,
                actual: index,
            });
        }
        self.entries.push(entry.clone());
        Ok(())
    }

    fn truncate_from(&mut self, index: LogIndex) {
        let keep = index.saturating_sub(self.base + 1) as usize;
        self.entries.truncate(keep);
    }

    fn compact_through(&mut self, index: LogIndex) {
        if index <= self.base {
            return;
        }
        let drop = ((index - self.base) as usize).min(self.entries.len());
        self.entries.drain(..drop);
        self.base = index;
    }
}

/// everything a node needs to rejoin the cluster after a restart
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
    pub term: Term,
    pub voted_for: Option<NodeId>,
    pub log: PersistedLog,
}

/// trait for durable storage of raft state
///
/// every write must be durable before it returns; the consensus core exposes
/// new state only after its hooks succeed
pub trait Storage {
    /// persist the current term and voted_for
    fn save_term_and_vote(&mut self, term: Term, voted_for: Option<NodeId>) -> Result<()>;

    /// load the persisted term and voted_for
    fn load_term_and_vote(&self) -> Result<(Term, Option<NodeId>)>;

    /// append one entry at absolute `index`, which must follow the current tail
    fn append_entry(&mut self, index: LogIndex, entry: &LogEntry) -> Result<()>;

    /// drop the entry at `index` and everything after it (conflict resolution)
    fn truncate_log_from(&mut self, index: LogIndex) -> Result<()>;

    /// forget every entry up to and including `index` (compaction)
    fn compact_log_through(&mut self, index: LogIndex) -> Result<()>;

    /// load the log (for crash recovery)
    fn load_log(&self) -> Result<PersistedLog>;

    /// clear all persisted state
    fn clear(&mut self) -> Result<()>;

    fn load(&self) -> Result<PersistedState> {
        let (term, voted_for) = self.load_term_and_vote()?;
        let log = self.load_log()?;
        Ok(PersistedState {
            term,
            voted_for,
            log,
        })
    }
}

// -- file storage implementation --

/// file-based storage implementation using std::fs
///
/// stores raft state in a directory with:
/// - meta.json: term and voted_for
/// - log.json: compaction base and the entries after it
#[derive(Debug)]
pub struct FileStorage {
    /// directory path for storing state files
    dir: PathBuf,
}

impl FileStorage {
    /// create a new filestorage at the given directory
    /// creates the directory if it doesn't exist
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn meta_path(&self) -> PathBuf {
        self.dir.join("meta.json")
    }

    fn log_path(&self) -> PathBuf {
        self.dir.join("log.json")
    }

    /// atomic write: write to temp file, sync, then rename over the target
    fn write_json<T: Serialize>(&self, target: &Path, temp_name: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;

        let temp_path = self.dir.join(temp_name);
        let mut file = File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, target)?;
        Ok(())
    }

    /// missing files read as the default value (a brand new node)
    fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
        if !path.exists() {
            return Ok(T::default());
        }

        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn rewrite_log(&mut self, edit: impl FnOnce(&mut PersistedLog) -> Result<()>) -> Result<()> {
        let mut log = self.load_log()?;
        edit(&mut log)?;
        self.write_json(&self.log_path(), "log.tmp", &log)
    }
}

/// metadata structure for term and vote
#[derive(Serialize, Deserialize, Default)]
struct MetaData {
    term: Term,
    voted_for: Option<NodeId>,
}

impl Storage for FileStorage {
    fn save_term_and_vote(&mut self, term: Term, voted_for: Option<NodeId>) -> Result<()> {
        self.write_json(&self.meta_path(), "meta.tmp", &MetaData { term, voted_for })?;
        debug!(term, ?voted_for, dir = %self.dir.display(), "persisted term and vote");
        Ok(())
    }

    fn load_term_and_vote(&self) -> Result<(Term, Option<NodeId>)> {
        let meta: MetaData = Self::read_json(&self.meta_path())?;
        Ok((meta.term, meta.voted_for))
    }

    // whole-file rewrite per entry; fine for control-plane sized logs
    fn append_entry(&mut self, index: LogIndex, entry: &LogEntry) -> Result<()> {
        self.rewrite_log(|log| log.append(index, entry))?;
        debug!(index, term = entry.term, id = entry.id, "persisted entry");
        Ok(())
    }

    fn truncate_log_from(&mut self, index: LogIndex) -> Result<()> {
        self.rewrite_log(|log| {
            log.truncate_from(index);
            Ok(())
        })?;
        debug!(index, "truncated persisted log");
        Ok(())
    }

    fn compact_log_through(&mut self, index: LogIndex) -> Result<()> {
        self.rewrite_log(|log| {
            log.compact_through(index);
            Ok(())
        })?;
        debug!(base = index, "compacted persisted log");
        Ok(())
    }

    fn load_log(&self) -> Result<PersistedLog> {
        Self::read_json(&self.log_path())
    }

    fn clear(&mut self) -> Result<()> {
        for path in [self.meta_path(), self.log_path()] {
            match fs::remove_file(&path) {
                Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err.into()),
                _ => {}
            }
        }
        debug!(dir = %self.dir.display(), "cleared storage");
        Ok(())
    }
}

// -- in-memory storage implementation --

/// in-memory storage for testing
///
/// stores all state in memory, no persistence across restarts
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    term: Term,
    voted_for: Option<NodeId>,
    log: PersistedLog,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for InMemoryStorage {
    fn save_term_and_vote(&mut self, term: Term, voted_for: Option<NodeId>) -> Result<()> {
        self.term = term;
        self.voted_for = voted_for;
        Ok(())
    }

    fn load_term_and_vote(&self) -> Result<(Term, Option<NodeId>)> {
        Ok((self.term, self.voted_for))
    }

    fn append_entry(&mut self, index: LogIndex, entry: &LogEntry) -> Result<()> {
        self.log.append(index, entry)
    }

    fn truncate_log_from(&mut self, index: LogIndex) -> Result<()> {
        self.log.truncate_from(index);
        Ok(())
    }

    fn compact_log_through(&mut self, index: LogIndex) -> Result<()> {
        self.log.compact_through(index);
        Ok(())
    }

    fn load_log(&self) -> Result<PersistedLog> {
        Ok(self.log.clone())
    }

    fn clear(&mut self) -> Result<()> {
        *self = Self::default();
        Ok(())
    }
}
