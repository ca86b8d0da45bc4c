//! # message
//!
//! why: define all raft rpc message types for node communication
//! relations: produced and consumed by node.rs, framed by transports in raft-driver
//! what: RequestVote, AppendEntries and their responses, RaftMessage envelope

use serde::{Deserialize, Serialize};

use crate::{LogEntry, LogIndex, NodeId, Term};

/// Request a vote during leader election
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestVote {
    pub term: Term,
    pub candidate_id: NodeId,
    pub last_log_idx: LogIndex,
    pub last_log_term: Term,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestVoteResponse {
    pub term: Term,
    pub vote_granted: bool,
}

/// Replicate log entries (also serves as heartbeat when entries is empty)
///
/// the sender is identified by the connection it arrives on
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppendEntries {
    pub term: Term,
    pub prev_log_idx: LogIndex,
    pub prev_log_term: Term,
    pub leader_commit: LogIndex,
    pub entries: Vec<LogEntry>,
}

impl AppendEntries {
    pub fn is_heartbeat(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppendEntriesResponse {
    pub term: Term,
    pub success: bool,
    /// on success the index of the last entry processed, on failure the
    /// follower's hint for where the leader should resume
    pub current_idx: LogIndex,
    /// index of the first entry carried by the request, 0 on failure
    pub first_idx: LogIndex,
}

/// what a leader hands back for an accepted proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryResponse {
    pub id: u32,
    pub term: Term,
    pub index: LogIndex,
}

/// All possible Raft messages between nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaftMessage {
    RequestVote(RequestVote),
    RequestVoteResponse(RequestVoteResponse),
    AppendEntries(AppendEntries),
    AppendEntriesResponse(AppendEntriesResponse),
}

impl RaftMessage {
    pub fn term(&self) -> Term {
        match self {
            Self::RequestVote(m) => m.term,
            Self::RequestVoteResponse(m) => m.term,
            Self::AppendEntries(m) => m.term,
            Self::AppendEntriesResponse(m) => m.term,
        }
    }

    /// encode for a byte-oriented transport
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

impl From<RequestVote> for RaftMessage {
    fn from(m: RequestVote) -> Self {
        Self::RequestVote(m)
    }
}

impl From<RequestVoteResponse> for RaftMessage {
    fn from(m: RequestVoteResponse) -> Self {
        Self::RequestVoteResponse(m)
    }
}

impl From<AppendEntries> for RaftMessage {
    fn from(m: AppendEntries) -> Self {
        Self::AppendEntries(m)
    }
}

impl From<AppendEntriesResponse> for RaftMessage {
    fn from(m: AppendEntriesResponse) -> Self {
        Self::AppendEntriesResponse(m)
    }
}
