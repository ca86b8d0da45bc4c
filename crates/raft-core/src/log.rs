//! # log
//!
//! why: manage the append-only log of entries that raft replicates
//! relations: owned by node.rs, durability mirrored through the LogHooks host callbacks
//! what: LogEntry, EntryKind, EntryLog (deque with a compaction base), LogHooks

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{HostResult, RaftError, Result};
use crate::{LogIndex, Term};

/// what a log entry means to the cluster configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntryKind {
    /// opaque application command
    #[default]
    Normal,
    AddVotingPeer,
    AddNonVotingPeer,
    RemovePeer,
}

impl EntryKind {
    /// changes who counts towards quorum; only one may be in flight at a time
    pub fn is_voting_config_change(self) -> bool {
        matches!(self, Self::AddVotingPeer | Self::RemovePeer)
    }

    pub fn is_config_change(self) -> bool {
        self != Self::Normal
    }
}

/// A single entry in the replicated log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The term when this entry was created
    pub term: Term,
    /// Caller-assigned identifier, never 0
    pub id: u32,
    pub kind: EntryKind,
    /// The command to be applied to the state machine
    pub payload: Vec<u8>,
}

impl LogEntry {
    /// Create a new normal entry
    pub fn new(term: Term, id: u32, payload: Vec<u8>) -> Self {
        Self {
            term,
            id,
            kind: EntryKind::Normal,
            payload,
        }
    }

    pub fn with_kind(mut self, kind: EntryKind) -> Self {
        self.kind = kind;
        self
    }
}

/// durability hooks invoked while the log mutates
///
/// each hook runs before the in-memory log changes; an error leaves the log untouched
pub trait LogHooks {
    /// an entry is about to be appended at `index`
    fn log_offer(&mut self, entry: &LogEntry, index: LogIndex) -> HostResult {
        let _ = (entry, index);
        Ok(())
    }

    /// the oldest entry (at `index`) is about to be compacted away
    fn log_poll(&mut self, entry: &LogEntry, index: LogIndex) -> HostResult {
        let _ = (entry, index);
        Ok(())
    }

    /// the newest entry (at `index`) is about to be removed by a truncation
    fn log_pop(&mut self, entry: &LogEntry, index: LogIndex) -> HostResult {
        let _ = (entry, index);
        Ok(())
    }
}

/// 1-indexed entry log
///
/// `base` counts entries already compacted off the front, so the entry at
/// absolute index `i` lives at deque position `i - base - 1`.
#[derive(Debug, Default, Clone)]
pub struct EntryLog {
    entries: VecDeque<LogEntry>,
    base: LogIndex,
}

impl EntryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// rebuild a log from persisted state without touching any hooks
    pub fn from_entries(base: LogIndex, entries: impl IntoIterator<Item = LogEntry>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            base,
        }
    }

    /// append `entry` at the next index and return that index
    pub fn append(&mut self, entry: LogEntry, hooks: &mut impl LogHooks) -> Result<LogIndex> {
        if entry.id == 0 {
            return Err(RaftError::InvalidEntryId);
        }

        let index = self.current_index() + 1;
        hooks.log_offer(&entry, index)?;
        self.entries.push_back(entry);
        Ok(index)
    }

    /// remove every entry from `index` through the tail, newest first
    pub fn truncate_from(&mut self, index: LogIndex, hooks: &mut impl LogHooks) -> Result<()> {
        assert!(
            index > self.base,
            "cannot truncate compacted entry {index} (base {})",
            self.base
        );

        while self.current_index() >= index {
            let tail = self.current_index();
            if let Some(entry) = self.entries.back() {
                hooks.log_pop(entry, tail)?;
            }
            self.entries.pop_back();
        }
        Ok(())
    }

    /// compact the oldest entry away, advancing the base
    pub fn poll_oldest(&mut self, hooks: &mut impl LogHooks) -> Result<Option<LogEntry>> {
        let Some(front) = self.entries.front() else {
            return Ok(None);
        };

        hooks.log_poll(front, self.base + 1)?;
        let polled = self.entries.pop_front();
        self.base += 1;
        Ok(polled)
    }

    /// longest contiguous run of stored entries starting at `from`
    ///
    /// this can be shorter than the remaining log when the ring wraps; callers
    /// replicating a large backlog go round again from the next index
    pub fn range_from(&self, from: LogIndex) -> &[LogEntry] {
        let Some(offset) = self.offset_of(from) else {
            return &[];
        };

        let (head, tail) = self.entries.as_slices();
        if offset < head.len() {
            &head[offset..]
        } else {
            &tail[offset - head.len()..]
        }
    }

    pub fn entry_at(&self, index: LogIndex) -> Option<&LogEntry> {
        self.offset_of(index).and_then(|offset| self.entries.get(offset))
    }

    /// term of the entry at `index`, or None if not stored
    pub fn term_at(&self, index: LogIndex) -> Option<Term> {
        self.entry_at(index).map(|e| e.term)
    }

    pub fn last_entry(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// term of the newest entry, 0 when empty
    pub fn last_term(&self) -> Term {
        self.last_entry().map_or(0, |e| e.term)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn base(&self) -> LogIndex {
        self.base
    }

    /// absolute index of the newest entry (0 for a fresh log)
    pub fn current_index(&self) -> LogIndex {
        self.base + self.entries.len() as LogIndex
    }

    /// stored entries paired with their absolute index, oldest first
    pub fn iter(&self) -> impl Iterator<Item = (LogIndex, &LogEntry)> + '_ {
        (self.base + 1..).zip(self.entries.iter())
    }

    fn offset_of(&self, index: LogIndex) -> Option<usize> {
        if index <= self.base || index > self.current_index() {
            return None;
        }
        Some((index - self.base - 1) as usize)
    }
}
