//! # host
//!
//! why: bind storage, the application state machine and the send queue into one ConsensusHost
//! relations: owned by the RaftNode inside driver.rs; writes through raft-storage
//! what: StateMachine trait, DriverHost (ConsensusHost + LogHooks implementation)

use flume::Sender;
use raft_core::{
    AppendEntries, ConsensusHost, HostError, HostResult, LogEntry, LogHooks, LogIndex, NodeId,
    Peer, RaftMessage, RequestVote, Term,
};
use raft_storage::Storage;
use tracing::{info, trace};

use crate::connection::Outbound;

/// the replicated application, e.g. the b2bua's dialog table
pub trait StateMachine: Send {
    /// apply a committed entry; an error stalls application at `index` until retried
    fn apply(&mut self, index: LogIndex, entry: &LogEntry) -> HostResult;

    /// a learner caught up and may now be promoted with a voting membership entry
    fn on_sufficient_logs(&mut self, peer: NodeId) {
        let _ = peer;
    }
}

/// ConsensusHost used by the driver
///
/// persistence goes straight to storage before the hook returns; wire sends are
/// only queued, so the engine lock is never held across network i/o
pub struct DriverHost<S, M> {
    storage: S,
    machine: M,
    outbound: Sender<Outbound>,
    /// term last written to storage; a vote is always saved alongside it
    term: Term,
}

impl<S: Storage, M: StateMachine> DriverHost<S, M> {
    pub fn new(storage: S, machine: M, outbound: Sender<Outbound>, term: Term) -> Self {
        Self {
            storage,
            machine,
            outbound,
            term,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    fn enqueue(&self, peer: NodeId, message: RaftMessage) -> HostResult {
        self.outbound
            .send(Outbound { peer, message })
            .map_err(|_| HostError::rejected("outbound queue closed"))
    }
}

impl<S: Storage, M: StateMachine> LogHooks for DriverHost<S, M> {
    fn log_offer(&mut self, entry: &LogEntry, index: LogIndex) -> HostResult {
        Ok(self.storage.append_entry(index, entry)?)
    }

    fn log_poll(&mut self, _: &LogEntry, index: LogIndex) -> HostResult {
        Ok(self.storage.compact_log_through(index)?)
    }

    fn log_pop(&mut self, _: &LogEntry, index: LogIndex) -> HostResult {
        Ok(self.storage.truncate_log_from(index)?)
    }
}

impl<S: Storage, M: StateMachine> ConsensusHost for DriverHost<S, M> {
    type PeerData = ();

    fn send_request_vote(&mut self, peer: &Peer, msg: &RequestVote) -> HostResult {
        self.enqueue(peer.id(), msg.clone().into())
    }

    fn send_append_entries(&mut self, peer: &Peer, msg: &AppendEntries) -> HostResult {
        self.enqueue(peer.id(), msg.clone().into())
    }

    fn apply_entry(&mut self, entry: &LogEntry, index: LogIndex) -> HostResult {
        self.machine.apply(index, entry)
    }

    fn persist_vote(&mut self, node_id: NodeId) -> HostResult {
        Ok(self.storage.save_term_and_vote(self.term, Some(node_id))?)
    }

    fn persist_term(&mut self, term: Term) -> HostResult {
        self.storage.save_term_and_vote(term, None)?;
        self.term = term;
        Ok(())
    }

    fn on_sufficient_logs(&mut self, peer: &Peer) {
        info!(peer = peer.id(), "learner ready for promotion");
        self.machine.on_sufficient_logs(peer.id());
    }

    fn log(&mut self, peer: Option<NodeId>, message: &str) {
        trace!(peer = ?peer, "{message}");
    }
}
