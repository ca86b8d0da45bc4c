//! # error
//!
//! why: give callers of the consensus core typed failures instead of status codes
//! relations: returned by log.rs, node.rs; wrapped by raft-storage and raft-driver errors
//! what: RaftError for engine-level outcomes, HostError for failing host hooks

use thiserror::Error;

use crate::{LogIndex, NodeId};

/// failure reported by a host hook (persistence, apply, transport)
#[derive(Debug, Error)]
pub enum HostError {
    #[error("host i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("host rejected the operation: {0}")]
    Rejected(String),
}

impl HostError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}

/// result type of every `ConsensusHost` hook
pub type HostResult = Result<(), HostError>;

/// errors surfaced by the consensus core
#[derive(Debug, Error)]
pub enum RaftError {
    /// entries carrying id 0 are the invalid/sentinel marker
    #[error("log entry id 0 is reserved")]
    InvalidEntryId,

    #[error("not the leader (known leader: {leader:?})")]
    NotLeader { leader: Option<NodeId> },

    /// at most one voting configuration change may be in flight
    #[error("voting configuration change already in flight at index {index}")]
    VotingChangeInProgress { index: LogIndex },

    #[error("node {0} is not part of the configuration")]
    NodeNotFound(NodeId),

    #[error("node {0} is not a voting member")]
    NotVoting(NodeId),

    #[error(transparent)]
    Host(#[from] HostError),
}

pub type Result<T, E = RaftError> = std::result::Result<T, E>;
