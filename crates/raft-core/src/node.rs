//! # node
//!
//! why: define the raft node state machine and state transitions
//! relations: uses log.rs for entries, peer.rs for membership, host.rs for side effects
//! what: NodeState, RaftConfig, RaftNode (elections, replication, commit, apply)

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{RaftError, Result};
use crate::host::ConsensusHost;
use crate::log::{EntryLog, LogEntry};
use crate::message::{
    AppendEntries, AppendEntriesResponse, EntryResponse, RequestVote, RequestVoteResponse,
};
use crate::peer::{Peer, PeerRegistry};
use crate::{LogIndex, NodeId, Term};

/// The three possible states a Raft node can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeState {
    /// Passive state - listens for heartbeats, votes when asked
    #[default]
    Follower,
    /// Transitional state - requesting votes to become leader
    Candidate,
    /// Active state - manages log replication, sends heartbeats
    Leader,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Follower => write!(f, "follower"),
            Self::Candidate => write!(f, "candidate"),
            Self::Leader => write!(f, "leader"),
        }
    }
}

/// timing knobs of the core, all in milliseconds of `tick` time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaftConfig {
    /// silence from a leader for this long starts an election
    pub election_timeout_ms: u64,
    /// a leader sends AppendEntries to every peer at least this often
    pub request_timeout_ms: u64,
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            election_timeout_ms: 1000,
            request_timeout_ms: 200,
        }
    }
}

/// where a proposed entry stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    Pending,
    Committed,
    /// a later leader overwrote the index with a different entry
    Invalidated,
}

/// true when `votes` is a strict majority of `voting_nodes`
pub fn is_majority(voting_nodes: usize, votes: usize) -> bool {
    if voting_nodes < votes {
        return false;
    }
    voting_nodes / 2 + 1 <= votes
}

/// A single Raft node in the cluster
///
/// not internally synchronized: every call must be serialized by the owner.
pub struct RaftNode<H: ConsensusHost> {
    id: NodeId,
    config: RaftConfig,
    state: NodeState,
    current_term: Term,
    voted_for: Option<NodeId>,
    commit_index: LogIndex,
    last_applied: LogIndex,
    timeout_elapsed: u64,
    current_leader: Option<NodeId>,
    voting_change_index: Option<LogIndex>,
    log: EntryLog,
    peers: PeerRegistry<H::PeerData>,
    host: H,
}

impl<H: ConsensusHost> RaftNode<H> {
    /// Create a new Raft node in Follower state, registered as a voting member
    pub fn new(id: NodeId, config: RaftConfig, host: H) -> Self {
        let mut peers = PeerRegistry::new();
        peers.add(id, H::PeerData::default(), true);

        Self {
            id,
            config,
            state: NodeState::Follower,
            current_term: 0,
            voted_for: None,
            commit_index: 0,
            last_applied: 0,
            timeout_elapsed: 0,
            current_leader: None,
            voting_change_index: None,
            log: EntryLog::new(),
            peers,
            host,
        }
    }

    /// reload persisted state after a restart
    ///
    /// durability hooks are not invoked. everything up to `base` was applied
    /// before compaction; everything after it is replayed once committed again.
    pub fn restore(
        &mut self,
        term: Term,
        voted_for: Option<NodeId>,
        base: LogIndex,
        entries: Vec<LogEntry>,
    ) {
        self.log = EntryLog::from_entries(base, entries);
        self.current_term = term;
        self.voted_for = voted_for;
        self.commit_index = base;
        self.last_applied = base;
        self.voting_change_index = self
            .log
            .iter()
            .filter(|(_, e)| e.kind.is_voting_config_change())
            .map(|(index, _)| index)
            .last();

        info!(
            node_id = self.id,
            term,
            base,
            current_index = self.log.current_index(),
            "restored persisted state"
        );
    }

    // -- membership --

    pub fn add_node(&mut self, id: NodeId, data: H::PeerData) -> &Peer<H::PeerData> {
        let is_self = id == self.id;
        self.peers.add(id, data, is_self)
    }

    pub fn add_non_voting_node(&mut self, id: NodeId, data: H::PeerData) -> &Peer<H::PeerData> {
        let is_self = id == self.id;
        self.peers.add_non_voting(id, data, is_self)
    }

    pub fn remove_node(&mut self, id: NodeId) -> Result<Peer<H::PeerData>> {
        let peer = self.peers.remove(id).ok_or(RaftError::NodeNotFound(id))?;
        if self.current_leader == Some(id) {
            self.current_leader = None;
        }
        info!(node_id = self.id, removed = id, "removed node");
        Ok(peer)
    }

    // -- timers --

    /// advance the clock by `elapsed_ms`, firing whichever timeout is due and
    /// applying at most one committed entry
    pub fn tick(&mut self, elapsed_ms: u64) -> Result<()> {
        self.timeout_elapsed += elapsed_ms;

        if self.is_leader() {
            if self.config.request_timeout_ms <= self.timeout_elapsed {
                self.send_append_entries_all();
            }
        } else if self.config.election_timeout_ms <= self.timeout_elapsed
            && self.peers.len() > 1
            && self.is_self_voting()
        {
            self.start_election()?;
        }

        if self.last_applied < self.commit_index {
            self.apply_entry()?;
        }
        Ok(())
    }

    /// learners never stand for election
    pub fn start_election(&mut self) -> Result<()> {
        if !self.is_self_voting() {
            return Err(RaftError::NotVoting(self.id));
        }
        let message = format!(
            "election starting: {} {}, term: {} ci: {}",
            self.config.election_timeout_ms,
            self.timeout_elapsed,
            self.current_term,
            self.current_index()
        );
        self.diag(None, message);
        self.become_candidate()
    }

    // -- role transitions --

    pub fn become_candidate(&mut self) -> Result<()> {
        self.set_current_term(self.current_term + 1)?;
        for peer in self.peers.iter_mut() {
            peer.set_voted_for_me(false);
        }
        self.vote_for(self.id)?;
        self.current_leader = None;
        self.state = NodeState::Candidate;

        // randomized so that split votes resolve
        self.timeout_elapsed = rand::rng().random_range(0..self.config.election_timeout_ms.max(1));

        info!(node_id = self.id, term = self.current_term, "became candidate");

        if is_majority(self.peers.voting_count(), self.votes_for_me()) {
            self.become_leader();
            return Ok(());
        }

        let targets: Vec<NodeId> = self.peers.voting_others().map(|p| p.id()).collect();
        for peer_id in targets {
            self.send_request_vote(peer_id);
        }
        Ok(())
    }

    /// take leadership for the current term and announce it with heartbeats
    pub fn become_leader(&mut self) {
        info!(node_id = self.id, term = self.current_term, "became leader");
        self.state = NodeState::Leader;
        self.current_leader = Some(self.id);

        let next_index = self.current_index() + 1;
        let targets: Vec<NodeId> = self.peers.voting_others().map(|p| p.id()).collect();
        for peer_id in targets {
            if let Some(peer) = self.peers.find_mut(peer_id) {
                peer.set_next_index(next_index);
                peer.set_match_index(0);
            }
            self.send_append_entries(peer_id);
        }
    }

    pub fn become_follower(&mut self) {
        if self.state != NodeState::Follower {
            info!(node_id = self.id, term = self.current_term, from = %self.state, "became follower");
        }
        self.state = NodeState::Follower;
    }

    // -- vote rpc --

    pub fn handle_request_vote(
        &mut self,
        from: NodeId,
        req: &RequestVote,
    ) -> Result<RequestVoteResponse> {
        if self.current_term < req.term {
            self.set_current_term(req.term)?;
            self.become_follower();
        }

        let granted = self.should_grant_vote(req);
        if granted {
            self.vote_for(req.candidate_id)?;
            self.current_leader = None;
            self.timeout_elapsed = 0;
        }

        let message = format!(
            "node requested vote: {} replying: {}",
            req.candidate_id,
            if granted { "granted" } else { "not granted" }
        );
        self.diag(Some(from), message);

        Ok(RequestVoteResponse {
            term: self.current_term,
            vote_granted: granted,
        })
    }

    fn should_grant_vote(&self, req: &RequestVote) -> bool {
        // a bootstrapped leader holds its term without a recorded vote
        if self.state != NodeState::Follower || req.term < self.current_term {
            return false;
        }

        // a retransmission from the candidate we already voted for is refused too
        if self.voted_for.is_some() {
            return false;
        }

        // an empty log is never more up-to-date than the candidate's
        let current_index = self.current_index();
        if current_index == 0 {
            return true;
        }

        let last_term = self.log.last_term();
        if last_term < req.last_log_term {
            return true;
        }
        last_term == req.last_log_term && current_index <= req.last_log_idx
    }

    pub fn handle_request_vote_response(
        &mut self,
        from: NodeId,
        resp: &RequestVoteResponse,
    ) -> Result<()> {
        let message = format!(
            "node responded to requestvote status: {}",
            if resp.vote_granted { "granted" } else { "not granted" }
        );
        self.diag(Some(from), message);

        if !self.is_candidate() {
            return Ok(());
        }
        if self.current_term < resp.term {
            self.set_current_term(resp.term)?;
            self.become_follower();
            return Ok(());
        }
        if self.current_term != resp.term {
            // the voter would have adopted our term, so this answers an older election
            return Ok(());
        }

        if resp.vote_granted {
            if let Some(peer) = self.peers.find_mut(from) {
                peer.set_voted_for_me(true);
            }
            if is_majority(self.peers.voting_count(), self.votes_for_me()) {
                self.become_leader();
            }
        }
        Ok(())
    }

    /// voting peers that granted us their vote this term, ourselves included
    pub fn votes_for_me(&self) -> usize {
        let others = self
            .peers
            .voting_others()
            .filter(|p| p.has_voted_for_me())
            .count();
        others + usize::from(self.is_self_voting() && self.voted_for == Some(self.id))
    }

    // -- append entries rpc --

    pub fn handle_append_entries(
        &mut self,
        from: NodeId,
        req: &AppendEntries,
    ) -> Result<AppendEntriesResponse> {
        self.timeout_elapsed = 0;

        if !req.entries.is_empty() {
            let message = format!(
                "recvd appendentries t:{} ci:{} lc:{} pli:{} plt:{} #{}",
                req.term,
                self.current_index(),
                req.leader_commit,
                req.prev_log_idx,
                req.prev_log_term,
                req.entries.len()
            );
            self.diag(Some(from), message);
        }

        if self.is_candidate() && self.current_term == req.term {
            self.voted_for = None;
            self.become_follower();
        } else if self.current_term < req.term {
            self.set_current_term(req.term)?;
            self.become_follower();
        } else if req.term < self.current_term {
            let message = format!(
                "AE term {} is less than current term {}",
                req.term, self.current_term
            );
            self.diag(Some(from), message);
            return Ok(self.reject(self.current_index()));
        }

        if req.prev_log_idx > 0 {
            match self.log.term_at(req.prev_log_idx) {
                None => {
                    self.diag(Some(from), format!("AE no log at prev_idx {}", req.prev_log_idx));
                    return Ok(self.reject(self.current_index().min(req.prev_log_idx)));
                }
                Some(term) if term != req.prev_log_term => {
                    let message = format!(
                        "AE term doesn't match prev_term (ie. {} vs {}) ci:{} pli:{}",
                        term,
                        req.prev_log_term,
                        self.current_index(),
                        req.prev_log_idx
                    );
                    self.diag(Some(from), message);
                    self.truncate_log_from(req.prev_log_idx)?;
                    return Ok(self.reject(req.prev_log_idx - 1));
                }
                Some(_) => {}
            }
        }

        let mut current_idx = req.prev_log_idx;
        let mut first_new = req.entries.len();
        for (offset, entry) in req.entries.iter().enumerate() {
            let index = req.prev_log_idx + 1 + offset as LogIndex;
            // compacted entries are committed, hence identical to the leader's
            if index <= self.log.base() {
                current_idx = index;
                continue;
            }
            match self.log.term_at(index) {
                Some(term) if term == entry.term => current_idx = index,
                Some(_) => {
                    self.truncate_log_from(index)?;
                    first_new = offset;
                    break;
                }
                None => {
                    first_new = offset;
                    break;
                }
            }
        }

        for entry in &req.entries[first_new..] {
            match self.append_entry(entry.clone()) {
                Ok(index) => current_idx = index,
                Err(RaftError::InvalidEntryId) => return Ok(self.reject(self.current_index())),
                Err(err) => return Err(err),
            }
        }

        // only entries this request proved identical to the leader's may be committed
        if self.commit_index < req.leader_commit {
            let commit = req.leader_commit.min(current_idx);
            if self.commit_index < commit {
                self.set_commit_index(commit);
            }
        }

        self.current_leader = Some(from);

        Ok(AppendEntriesResponse {
            term: self.current_term,
            success: true,
            current_idx,
            first_idx: req.prev_log_idx + 1,
        })
    }

    fn reject(&self, current_idx: LogIndex) -> AppendEntriesResponse {
        AppendEntriesResponse {
            term: self.current_term,
            success: false,
            current_idx,
            first_idx: 0,
        }
    }

    pub fn handle_append_entries_response(
        &mut self,
        from: NodeId,
        resp: &AppendEntriesResponse,
    ) -> Result<()> {
        let message = format!(
            "received appendentries response {} ci:{} rci:{} 1stidx:{}",
            if resp.success { "SUCCESS" } else { "fail" },
            self.current_index(),
            resp.current_idx,
            resp.first_idx
        );
        self.diag(Some(from), message);

        let match_index = self.peers.find(from).map_or(0, |p| p.match_index());
        if resp.current_idx != 0 && resp.current_idx <= match_index {
            return Ok(());
        }

        if !self.is_leader() {
            return Ok(());
        }
        if self.current_term < resp.term {
            self.set_current_term(resp.term)?;
            self.become_follower();
            return Ok(());
        }
        if self.current_term != resp.term {
            return Ok(());
        }

        let current_index = self.current_index();
        let Some(peer) = self.peers.find_mut(from) else {
            return Ok(());
        };

        if !resp.success {
            let next_index = peer.next_index();
            if resp.current_idx < next_index.saturating_sub(1) {
                peer.set_next_index((resp.current_idx + 1).min(current_index));
            } else {
                peer.set_next_index(next_index.saturating_sub(1));
            }
            self.send_append_entries(from);
            return Ok(());
        }

        assert!(
            resp.current_idx <= current_index,
            "peer {from} acknowledged index {} beyond our log tail {current_index}",
            resp.current_idx
        );

        peer.set_next_index(resp.current_idx + 1);
        peer.set_match_index(resp.current_idx);

        if !peer.is_voting()
            && self.voting_change_index.is_none()
            && current_index <= resp.current_idx + 1
            && !peer.has_sufficient_logs()
        {
            peer.mark_sufficient_logs();
            info!(node_id = self.id, peer = from, "learner has sufficient logs");
            self.host.on_sufficient_logs(peer);
        }
        let next_index = peer.next_index();

        self.advance_commit_index(resp.current_idx);

        // keep streaming a lagging peer instead of waiting for the next heartbeat
        if self.log.entry_at(next_index).is_some() {
            self.send_append_entries(from);
        }
        Ok(())
    }

    /// commit `point` once a majority of voters hold it and it belongs to our term
    fn advance_commit_index(&mut self, point: LogIndex) {
        if point <= self.commit_index || self.log.term_at(point) != Some(self.current_term) {
            return;
        }

        let replicated = self
            .peers
            .voting_others()
            .filter(|p| p.match_index() >= point)
            .count();
        let votes = replicated + usize::from(self.is_self_voting());

        if is_majority(self.peers.voting_count(), votes) {
            debug!(node_id = self.id, commit_index = point, "advanced commit index");
            self.set_commit_index(point);
        }
    }

    // -- client entries --

    /// append a client entry as leader and start replicating it
    pub fn propose_entry(&mut self, mut entry: LogEntry) -> Result<EntryResponse> {
        if entry.kind.is_voting_config_change() {
            if let Some(index) = self.voting_change_index {
                return Err(RaftError::VotingChangeInProgress { index });
            }
        }

        if !self.is_leader() {
            return Err(RaftError::NotLeader {
                leader: self.current_leader,
            });
        }

        let message = format!(
            "received entry t:{} id: {} idx: {}",
            self.current_term,
            entry.id,
            self.current_index() + 1
        );
        self.diag(None, message);

        entry.term = self.current_term;
        let id = entry.id;
        let index = self.append_entry(entry)?;

        // only peers already at the tail get the entry now; laggards catch up on resend
        let targets: Vec<NodeId> = self
            .peers
            .voting_others()
            .filter(|p| p.next_index() == index)
            .map(|p| p.id())
            .collect();
        for peer_id in targets {
            self.send_append_entries(peer_id);
        }

        if self.peers.voting_count() == 1 && self.is_self_voting() {
            self.set_commit_index(index);
        }

        Ok(EntryResponse {
            id,
            term: self.current_term,
            index,
        })
    }

    pub fn entry_committed(&self, resp: &EntryResponse) -> CommitStatus {
        match self.log.term_at(resp.index) {
            Some(term) if term != resp.term => CommitStatus::Invalidated,
            None if resp.index > self.log.base() => CommitStatus::Pending,
            _ if resp.index <= self.commit_index => CommitStatus::Committed,
            _ => CommitStatus::Pending,
        }
    }

    fn append_entry(&mut self, entry: LogEntry) -> Result<LogIndex> {
        let kind = entry.kind;
        let index = self.log.append(entry, &mut self.host)?;
        if kind.is_voting_config_change() {
            self.voting_change_index = Some(index);
        }
        Ok(index)
    }

    fn truncate_log_from(&mut self, index: LogIndex) -> Result<()> {
        assert!(
            self.commit_index < index,
            "truncating committed entry {index} (commit index {})",
            self.commit_index
        );
        self.log.truncate_from(index, &mut self.host)?;
        if self.voting_change_index.is_some_and(|i| i >= index) {
            self.voting_change_index = None;
        }
        Ok(())
    }

    // -- application --

    /// apply the next committed entry; false when nothing is pending
    pub fn apply_entry(&mut self) -> Result<bool> {
        if self.commit_index <= self.last_applied {
            return Ok(false);
        }

        let index = self.last_applied + 1;
        let Some((id, size)) = self.log.entry_at(index).map(|e| (e.id, e.payload.len())) else {
            return Ok(false);
        };
        let message = format!(
            "applying log: {}, id: {} size: {}",
            self.last_applied, id, size
        );
        self.diag(None, message);

        if let Some(entry) = self.log.entry_at(index) {
            self.host.apply_entry(entry, index)?;
        }
        self.last_applied = index;

        if self.voting_change_index == Some(index) {
            self.voting_change_index = None;
        }
        Ok(true)
    }

    /// apply every committed entry, returning how many were applied
    pub fn apply_all(&mut self) -> Result<usize> {
        let mut applied = 0;
        while self.apply_entry()? {
            applied += 1;
        }
        Ok(applied)
    }

    /// compact the oldest entry away, provided it has been applied
    ///
    /// there is no snapshot transfer: a peer whose next index falls at or
    /// below the new base can no longer be repaired by this leader
    pub fn compact_oldest(&mut self) -> Result<Option<LogEntry>> {
        if self.last_applied <= self.log.base() {
            return Ok(None);
        }
        self.log.poll_oldest(&mut self.host)
    }

    // -- outbound --

    pub fn send_request_vote(&mut self, peer_id: NodeId) {
        debug_assert_ne!(peer_id, self.id, "requesting a vote from ourselves");

        let msg = RequestVote {
            term: self.current_term,
            candidate_id: self.id,
            last_log_idx: self.current_index(),
            last_log_term: self.log.last_term(),
        };
        self.diag(Some(peer_id), format!("sending requestvote to: {peer_id}"));

        let Some(peer) = self.peers.find(peer_id) else {
            return;
        };
        if let Err(err) = self.host.send_request_vote(peer, &msg) {
            warn!(node_id = self.id, peer = peer_id, error = %err, "requestvote send failed");
        }
    }

    pub fn send_append_entries(&mut self, peer_id: NodeId) {
        debug_assert_ne!(peer_id, self.id, "replicating to ourselves");

        let Some(next_index) = self.peers.find(peer_id).map(|p| p.next_index()) else {
            return;
        };

        let mut msg = AppendEntries {
            term: self.current_term,
            leader_commit: self.commit_index,
            entries: self.log.range_from(next_index).to_vec(),
            ..Default::default()
        };
        if next_index > 1 {
            msg.prev_log_idx = next_index - 1;
            msg.prev_log_term = match self.log.term_at(next_index - 1) {
                Some(term) => term,
                None => {
                    let message = format!(
                        "peer needs compacted entry {} (base {}), it cannot catch up",
                        next_index - 1,
                        self.log.base()
                    );
                    warn!(node_id = self.id, peer = peer_id, "{message}");
                    self.host.log(Some(peer_id), &message);
                    0
                }
            };
        }

        let message = format!(
            "sending appendentries node: ci:{} t:{} lc:{} pli:{} plt:{}",
            self.current_index(),
            msg.term,
            msg.leader_commit,
            msg.prev_log_idx,
            msg.prev_log_term
        );
        self.diag(Some(peer_id), message);

        let Some(peer) = self.peers.find(peer_id) else {
            return;
        };
        if let Err(err) = self.host.send_append_entries(peer, &msg) {
            warn!(node_id = self.id, peer = peer_id, error = %err, "appendentries send failed");
        }
    }

    /// heartbeat (or catch-up) round to every other member
    pub fn send_append_entries_all(&mut self) {
        self.timeout_elapsed = 0;
        for peer_id in self.peers.other_ids() {
            self.send_append_entries(peer_id);
        }
    }

    // -- persistent state --

    /// adopt a newer term, persisting it first; older or equal terms are ignored
    fn set_current_term(&mut self, term: Term) -> Result<()> {
        if self.current_term < term {
            self.host.persist_term(term)?;
            self.current_term = term;
            self.voted_for = None;
        }
        Ok(())
    }

    fn vote_for(&mut self, node_id: NodeId) -> Result<()> {
        self.host.persist_vote(node_id)?;
        self.voted_for = Some(node_id);
        Ok(())
    }

    fn set_commit_index(&mut self, index: LogIndex) {
        assert!(
            self.commit_index <= index,
            "commit index moving backwards from {} to {index}",
            self.commit_index
        );
        assert!(
            index <= self.current_index(),
            "commit index {index} beyond log tail {}",
            self.current_index()
        );
        self.commit_index = index;
    }

    fn diag(&mut self, peer: Option<NodeId>, message: String) {
        debug!(node_id = self.id, peer = ?peer, "{message}");
        self.host.log(peer, &message);
    }

    // -- accessors --

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_leader(&self) -> bool {
        self.state == NodeState::Leader
    }

    pub fn is_candidate(&self) -> bool {
        self.state == NodeState::Candidate
    }

    pub fn is_follower(&self) -> bool {
        self.state == NodeState::Follower
    }

    pub fn current_term(&self) -> Term {
        self.current_term
    }

    pub fn voted_for(&self) -> Option<NodeId> {
        self.voted_for
    }

    pub fn commit_index(&self) -> LogIndex {
        self.commit_index
    }

    pub fn last_applied(&self) -> LogIndex {
        self.last_applied
    }

    pub fn current_index(&self) -> LogIndex {
        self.log.current_index()
    }

    pub fn last_log_term(&self) -> Term {
        self.log.last_term()
    }

    pub fn current_leader(&self) -> Option<NodeId> {
        self.current_leader
    }

    pub fn timeout_elapsed(&self) -> u64 {
        self.timeout_elapsed
    }

    pub fn voting_change_index(&self) -> Option<LogIndex> {
        self.voting_change_index
    }

    pub fn config(&self) -> &RaftConfig {
        &self.config
    }

    pub fn set_election_timeout(&mut self, ms: u64) {
        self.config.election_timeout_ms = ms;
    }

    pub fn set_request_timeout(&mut self, ms: u64) {
        self.config.request_timeout_ms = ms;
    }

    pub fn log(&self) -> &EntryLog {
        &self.log
    }

    pub fn entry_at(&self, index: LogIndex) -> Option<&LogEntry> {
        self.log.entry_at(index)
    }

    pub fn peers(&self) -> &PeerRegistry<H::PeerData> {
        &self.peers
    }

    pub fn peer(&self, id: NodeId) -> Option<&Peer<H::PeerData>> {
        self.peers.find(id)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    fn is_self_voting(&self) -> bool {
        self.peers.find(self.id).is_some_and(|p| p.is_voting())
    }
}

impl<H: ConsensusHost> fmt::Debug for RaftNode<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RaftNode")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("current_term", &self.current_term)
            .field("voted_for", &self.voted_for)
            .field("commit_index", &self.commit_index)
            .field("last_applied", &self.last_applied)
            .field("current_index", &self.current_index())
            .field("current_leader", &self.current_leader)
            .field("peers", &self.peers.len())
            .finish()
    }
}
