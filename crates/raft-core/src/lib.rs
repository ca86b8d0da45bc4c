//! # raft-core
//!
//! why: implement the replicated consensus engine of the session border controller
//! relations: driven by raft-driver, persisted through raft-storage via ConsensusHost hooks
//! what: entry log, peer registry, raft state machine, wire messages, host capability trait

pub mod error;
pub mod host;
pub mod log;
pub mod message;
pub mod node;
pub mod peer;

/// election epoch, never decreases
pub type Term = u64;
/// 1-based log position; 0 means "no entry"
pub type LogIndex = u64;
pub type NodeId = u64;

pub use error::{HostError, HostResult, RaftError};
pub use host::ConsensusHost;
pub use log::{EntryKind, EntryLog, LogEntry, LogHooks};
pub use message::{
    AppendEntries, AppendEntriesResponse, EntryResponse, RaftMessage, RequestVote,
    RequestVoteResponse,
};
pub use node::{is_majority, CommitStatus, NodeState, RaftConfig, RaftNode};
pub use peer::{Peer, PeerRegistry};
