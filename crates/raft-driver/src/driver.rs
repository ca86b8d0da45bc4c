//! # driver
//!
//! why: run a consensus node inside a multi-threaded process
//! relations: owns the raft-core RaftNode behind a lock, feeds it ticks and inbound rpcs,
//!            drains its outbound queue into per-peer connections
//! what: RaftDriver (lifecycle, node management, rpc entry points), DriverStatus

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use flume::{Receiver, RecvTimeoutError, Selector, Sender};
use parking_lot::Mutex;
use raft_core::{
    AppendEntries, AppendEntriesResponse, CommitStatus, EntryResponse, LogEntry, LogIndex,
    NodeId, NodeState, Peer, RaftMessage, RaftNode, RequestVote, RequestVoteResponse, Term,
};
use raft_storage::Storage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::connection::{Connection, Connector, Outbound};
use crate::error::{DriverError, Result};
use crate::host::{DriverHost, StateMachine};

type Engine<S, M> = RaftNode<DriverHost<S, M>>;

/// point-in-time view of the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStatus {
    pub node_id: NodeId,
    pub state: NodeState,
    pub term: Term,
    pub voted_for: Option<NodeId>,
    pub leader: Option<NodeId>,
    pub commit_index: LogIndex,
    pub last_applied: LogIndex,
    pub current_index: LogIndex,
}

/// state shared between the driver handle and its worker threads
struct Shared<S: Storage, M: StateMachine> {
    config: DriverConfig,
    raft: Mutex<Engine<S, M>>,
    connections: Mutex<HashMap<NodeId, Arc<dyn Connection>>>,
    connector: Mutex<Option<Arc<dyn Connector>>>,
    outbound: Receiver<Outbound>,
}

/// running timer and sender threads
struct Workers {
    /// never sent on; dropping it wakes both threads
    shutdown: Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl Workers {
    fn stop(self) {
        drop(self.shutdown);
        for handle in self.handles {
            if handle.join().is_err() {
                warn!("driver worker thread panicked");
            }
        }
    }
}

/// a consensus node plus the threads and connections that keep it running
///
/// every entry point takes the same engine lock, so the core only ever sees
/// one caller at a time
pub struct RaftDriver<S: Storage, M: StateMachine> {
    shared: Arc<Shared<S, M>>,
    workers: Mutex<Option<Workers>>,
}

impl<S, M> RaftDriver<S, M>
where
    S: Storage + Send + 'static,
    M: StateMachine + 'static,
{
    /// build a node from persisted state; threads are not started yet
    pub fn new(config: DriverConfig, storage: S, machine: M) -> Result<Self> {
        config.validate()?;
        let state = storage.load()?;
        let fresh = state.term == 0
            && state.voted_for.is_none()
            && state.log.base == 0
            && state.log.entries.is_empty();

        let (tx, rx) = flume::unbounded();
        let host = DriverHost::new(storage, machine, tx, state.term);
        let mut raft = RaftNode::new(config.node_id, config.raft_config(), host);

        if !fresh {
            raft.restore(state.term, state.voted_for, state.log.base, state.log.entries);
        }
        if config.is_initial_master {
            if fresh {
                raft.become_leader();
            } else {
                info!(node_id = config.node_id, "persisted state found, skipping initial master bootstrap");
            }
        }

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                raft: Mutex::new(raft),
                connections: Mutex::new(HashMap::new()),
                connector: Mutex::new(None),
                outbound: rx,
            }),
            workers: Mutex::new(None),
        })
    }

    /// spawn the timer and sender threads
    pub fn start(&self) -> Result<()> {
        let mut workers = self.workers.lock();
        if workers.is_some() {
            return Err(DriverError::AlreadyRunning);
        }

        let node_id = self.shared.config.node_id;
        let (shutdown, shutdown_rx) = flume::bounded::<()>(0);

        let timer = {
            let shared = Arc::clone(&self.shared);
            let shutdown_rx = shutdown_rx.clone();
            thread::Builder::new()
                .name(format!("raft-timer-{node_id}"))
                .spawn(move || shared.run_timer(&shutdown_rx))?
        };
        let sender = {
            let shared = Arc::clone(&self.shared);
            thread::Builder::new()
                .name(format!("raft-sender-{node_id}"))
                .spawn(move || shared.run_sender(&shutdown_rx))?
        };

        *workers = Some(Workers {
            shutdown,
            handles: vec![timer, sender],
        });
        info!(node_id, "raft driver started");
        Ok(())
    }

    /// signal both threads and wait for them to exit
    pub fn stop(&self) -> Result<()> {
        let workers = self.workers.lock().take().ok_or(DriverError::NotRunning)?;
        workers.stop();
        info!(node_id = self.shared.config.node_id, "raft driver stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.workers.lock().is_some()
    }

    pub fn node_id(&self) -> NodeId {
        self.shared.config.node_id
    }

    pub fn config(&self) -> &DriverConfig {
        &self.shared.config
    }

    // -- node management --

    pub fn add_node(&self, id: NodeId) {
        self.shared.raft.lock().add_node(id, ());
        info!(node_id = self.node_id(), peer = id, "added voting node");
    }

    pub fn add_non_voting_node(&self, id: NodeId) {
        self.shared.raft.lock().add_non_voting_node(id, ());
        info!(node_id = self.node_id(), peer = id, "added non-voting node");
    }

    /// forget a peer and drop its connection
    pub fn remove_node(&self, id: NodeId) -> Result<()> {
        self.shared.raft.lock().remove_node(id)?;
        self.remove_connection(id);
        Ok(())
    }

    /// snapshot of the peer record
    pub fn find_node(&self, id: NodeId) -> Option<Peer> {
        self.shared.raft.lock().peer(id).cloned()
    }

    // -- timers and roles --

    /// one tick of the core, as the timer thread does
    pub fn call_periodic_timer(&self) -> Result<()> {
        self.shared.tick()
    }

    /// force this node into leadership for its current term
    pub fn become_master(&self) {
        self.shared.raft.lock().become_leader();
    }

    pub fn trigger_election(&self) -> Result<()> {
        Ok(self.shared.raft.lock().start_election()?)
    }

    // -- client entries --

    pub fn propose(&self, entry: LogEntry) -> Result<EntryResponse> {
        Ok(self.shared.raft.lock().propose_entry(entry)?)
    }

    pub fn entry_committed(&self, response: &EntryResponse) -> CommitStatus {
        self.shared.raft.lock().entry_committed(response)
    }

    // -- inbound rpc --

    pub fn on_received_request_vote(
        &self,
        from: NodeId,
        req: &RequestVote,
    ) -> Result<RequestVoteResponse> {
        Ok(self.shared.raft.lock().handle_request_vote(from, req)?)
    }

    pub fn on_received_request_vote_response(
        &self,
        from: NodeId,
        resp: &RequestVoteResponse,
    ) -> Result<()> {
        Ok(self.shared.raft.lock().handle_request_vote_response(from, resp)?)
    }

    pub fn on_received_append_entries(
        &self,
        from: NodeId,
        req: &AppendEntries,
    ) -> Result<AppendEntriesResponse> {
        Ok(self.shared.raft.lock().handle_append_entries(from, req)?)
    }

    pub fn on_received_append_entries_response(
        &self,
        from: NodeId,
        resp: &AppendEntriesResponse,
    ) -> Result<()> {
        Ok(self
            .shared
            .raft
            .lock()
            .handle_append_entries_response(from, resp)?)
    }

    /// route any wire message; requests yield the reply to send back
    pub fn handle_message(&self, from: NodeId, message: RaftMessage) -> Result<Option<RaftMessage>> {
        let reply: Option<RaftMessage> = match message {
            RaftMessage::RequestVote(req) => Some(self.on_received_request_vote(from, &req)?.into()),
            RaftMessage::AppendEntries(req) => {
                Some(self.on_received_append_entries(from, &req)?.into())
            }
            RaftMessage::RequestVoteResponse(resp) => {
                self.on_received_request_vote_response(from, &resp)?;
                None
            }
            RaftMessage::AppendEntriesResponse(resp) => {
                self.on_received_append_entries_response(from, &resp)?;
                None
            }
        };
        Ok(reply)
    }

    // -- inspection --

    pub fn status(&self) -> DriverStatus {
        let raft = self.shared.raft.lock();
        DriverStatus {
            node_id: raft.id(),
            state: raft.state(),
            term: raft.current_term(),
            voted_for: raft.voted_for(),
            leader: raft.current_leader(),
            commit_index: raft.commit_index(),
            last_applied: raft.last_applied(),
            current_index: raft.current_index(),
        }
    }

    pub fn with_state_machine<R>(&self, f: impl FnOnce(&M) -> R) -> R {
        f(self.shared.raft.lock().host().machine())
    }

    // -- connections --

    /// used to open connections on first send to a peer
    pub fn set_connector(&self, connector: Arc<dyn Connector>) {
        *self.shared.connector.lock() = Some(connector);
    }

    pub fn find_connection(&self, id: NodeId) -> Option<Arc<dyn Connection>> {
        self.shared.find_connection(id)
    }

    pub fn find_or_create_connection(&self, id: NodeId) -> Result<Arc<dyn Connection>> {
        self.shared.find_or_create_connection(id)
    }

    pub fn store_connection(&self, id: NodeId, connection: Arc<dyn Connection>) {
        self.shared.store_connection(id, connection);
    }

    /// drop and shut down the connection to `id`, if any
    pub fn remove_connection(&self, id: NodeId) -> Option<Arc<dyn Connection>> {
        let connection = self.shared.connections.lock().remove(&id)?;
        connection.shutdown();
        debug!(node_id = self.node_id(), peer = id, "removed connection");
        Some(connection)
    }
}

impl<S: Storage, M: StateMachine> Drop for RaftDriver<S, M> {
    fn drop(&mut self) {
        if let Some(workers) = self.workers.get_mut().take() {
            workers.stop();
        }
    }
}

impl<S, M> Shared<S, M>
where
    S: Storage + Send + 'static,
    M: StateMachine + 'static,
{
    fn tick(&self) -> Result<()> {
        self.raft.lock().tick(self.config.heartbeat_timeout_ms)?;
        Ok(())
    }

    fn run_timer(&self, shutdown: &Receiver<()>) {
        let interval = self.config.tick_interval();
        loop {
            match shutdown.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(err) = self.tick() {
                        warn!(node_id = self.config.node_id, error = %err, "periodic tick failed");
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!(node_id = self.config.node_id, "timer thread exiting");
    }

    fn run_sender(&self, shutdown: &Receiver<()>) {
        loop {
            let next = Selector::new()
                .recv(&self.outbound, |msg| msg.ok())
                .recv(shutdown, |_| None)
                .wait();
            let Some(outbound) = next else {
                break;
            };
            self.dispatch(outbound);
        }
        debug!(node_id = self.config.node_id, "sender thread exiting");
    }

    fn dispatch(&self, Outbound { peer, message }: Outbound) {
        let connection = match self.find_or_create_connection(peer) {
            Ok(connection) => connection,
            Err(err) => {
                warn!(node_id = self.config.node_id, peer, error = %err, "dropping outbound message");
                return;
            }
        };
        if let Err(err) = connection.send(message) {
            warn!(node_id = self.config.node_id, peer, error = %err, "send failed");
        }
    }

    fn find_connection(&self, id: NodeId) -> Option<Arc<dyn Connection>> {
        self.connections.lock().get(&id).cloned()
    }

    fn find_or_create_connection(&self, id: NodeId) -> Result<Arc<dyn Connection>> {
        if let Some(connection) = self.find_connection(id) {
            return Ok(connection);
        }

        let connector = self
            .connector
            .lock()
            .clone()
            .ok_or(DriverError::NoConnection(id))?;
        // connect outside the map lock; a racing creator keeps the first one stored
        let created = connector.connect(id).map_err(|err| {
            warn!(node_id = self.config.node_id, peer = id, error = %err, "connect failed");
            DriverError::NoConnection(id)
        })?;

        let stored = Arc::clone(
            self.connections
                .lock()
                .entry(id)
                .or_insert_with(|| Arc::clone(&created)),
        );
        if !Arc::ptr_eq(&stored, &created) {
            created.shutdown();
        }
        Ok(stored)
    }

    fn store_connection(&self, id: NodeId, connection: Arc<dyn Connection>) {
        let replaced = self.connections.lock().insert(id, connection);
        if let Some(old) = replaced {
            old.shutdown();
        }
    }
}
