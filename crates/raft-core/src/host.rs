//! # host
//!
//! why: let the embedding process supply transport, durability and the state machine
//! relations: implemented by raft-driver's DriverHost and by test doubles; called by node.rs
//! what: ConsensusHost capability trait, one method per engine hook

use crate::error::HostResult;
use crate::log::LogHooks;
use crate::message::{AppendEntries, RequestVote};
use crate::peer::Peer;
use crate::{LogEntry, LogIndex, NodeId, Term};

/// everything the consensus core needs from the outside world
///
/// hooks run synchronously inside the core; persistence hooks must be durable
/// by the time they return, since the core only exposes the new state afterwards
pub trait ConsensusHost: LogHooks {
    /// opaque per-peer data stored in the registry
    type PeerData: Default;

    /// fire-and-forget transport send; failures are logged, not retried
    fn send_request_vote(&mut self, peer: &Peer<Self::PeerData>, msg: &RequestVote) -> HostResult;

    fn send_append_entries(
        &mut self,
        peer: &Peer<Self::PeerData>,
        msg: &AppendEntries,
    ) -> HostResult;

    /// apply a committed entry; an error stalls application at this index
    fn apply_entry(&mut self, entry: &LogEntry, index: LogIndex) -> HostResult;

    fn persist_vote(&mut self, node_id: NodeId) -> HostResult;

    /// a new term implicitly clears the persisted vote
    fn persist_term(&mut self, term: Term) -> HostResult;

    /// a learner has caught up and can be promoted
    fn on_sufficient_logs(&mut self, peer: &Peer<Self::PeerData>) {
        let _ = peer;
    }

    /// diagnostic text sink
    fn log(&mut self, peer: Option<NodeId>, message: &str) {
        let _ = (peer, message);
    }
}
