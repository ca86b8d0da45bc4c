//! # peer
//!
//! why: track every cluster member the consensus core talks to
//! relations: owned by node.rs; peers are handed to ConsensusHost hooks
//! what: Peer (replication cursor + voting flags), PeerRegistry in registration order

use crate::{LogIndex, NodeId};

/// one cluster member as seen by this node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer<D = ()> {
    id: NodeId,
    next_index: LogIndex,
    match_index: LogIndex,
    voting: bool,
    voted_for_me: bool,
    sufficient_logs: bool,
    /// opaque host data attached at registration
    pub data: D,
}

impl<D> Peer<D> {
    fn new(id: NodeId, data: D, voting: bool) -> Self {
        Self {
            id,
            next_index: 1,
            match_index: 0,
            voting,
            voted_for_me: false,
            sufficient_logs: false,
            data,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// next entry the leader will send to this peer
    pub fn next_index(&self) -> LogIndex {
        self.next_index
    }

    /// the log starts at 1, so the cursor never drops below it
    pub fn set_next_index(&mut self, index: LogIndex) {
        self.next_index = index.max(1);
    }

    /// highest index known to be replicated on this peer
    pub fn match_index(&self) -> LogIndex {
        self.match_index
    }

    pub fn set_match_index(&mut self, index: LogIndex) {
        self.match_index = index;
    }

    pub fn is_voting(&self) -> bool {
        self.voting
    }

    pub fn set_voting(&mut self, voting: bool) {
        self.voting = voting;
    }

    pub fn has_voted_for_me(&self) -> bool {
        self.voted_for_me
    }

    pub fn set_voted_for_me(&mut self, voted: bool) {
        self.voted_for_me = voted;
    }

    pub fn has_sufficient_logs(&self) -> bool {
        self.sufficient_logs
    }

    pub fn mark_sufficient_logs(&mut self) {
        self.sufficient_logs = true;
    }
}

/// cluster membership in registration order
///
/// iteration order is what makes vote counting and fan-out deterministic
#[derive(Debug, Clone)]
pub struct PeerRegistry<D = ()> {
    peers: Vec<Peer<D>>,
    self_id: Option<NodeId>,
}

impl<D> Default for PeerRegistry<D> {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            self_id: None,
        }
    }
}

impl<D> PeerRegistry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// register a voting peer; re-adding an existing id promotes it to voting
    pub fn add(&mut self, id: NodeId, data: D, is_self: bool) -> &mut Peer<D> {
        self.insert(id, data, is_self, true)
    }

    /// register a non-voting peer (learner)
    ///
    /// re-adding an existing id demotes it to non-voting
    pub fn add_non_voting(&mut self, id: NodeId, data: D, is_self: bool) -> &mut Peer<D> {
        self.insert(id, data, is_self, false)
    }

    fn insert(&mut self, id: NodeId, data: D, is_self: bool, voting: bool) -> &mut Peer<D> {
        if is_self {
            self.self_id = Some(id);
        }

        let pos = match self.position(id) {
            Some(pos) => {
                self.peers[pos].set_voting(voting);
                pos
            }
            None => {
                self.peers.push(Peer::new(id, data, voting));
                self.peers.len() - 1
            }
        };
        &mut self.peers[pos]
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Peer<D>> {
        let pos = self.position(id)?;
        if self.self_id == Some(id) {
            self.self_id = None;
        }
        Some(self.peers.remove(pos))
    }

    pub fn find(&self, id: NodeId) -> Option<&Peer<D>> {
        self.peers.iter().find(|p| p.id == id)
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Peer<D>> {
        self.peers.iter_mut().find(|p| p.id == id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.position(id).is_some()
    }

    pub fn self_id(&self) -> Option<NodeId> {
        self.self_id
    }

    pub fn is_self(&self, id: NodeId) -> bool {
        self.self_id == Some(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer<D>> {
        self.peers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Peer<D>> {
        self.peers.iter_mut()
    }

    /// voting members other than this node
    pub fn voting_others(&self) -> impl Iterator<Item = &Peer<D>> {
        let self_id = self.self_id;
        self.peers
            .iter()
            .filter(move |p| p.voting && Some(p.id) != self_id)
    }

    /// ids of every member other than this node, in registration order
    pub fn other_ids(&self) -> Vec<NodeId> {
        self.peers
            .iter()
            .filter(|p| !self.is_self(p.id))
            .map(|p| p.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// number of members that count towards quorum, this node included
    pub fn voting_count(&self) -> usize {
        self.peers.iter().filter(|p| p.voting).count()
    }

    fn position(&self, id: NodeId) -> Option<usize> {
        self.peers.iter().position(|p| p.id == id)
    }
}
