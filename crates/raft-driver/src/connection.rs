//! # connection
//!
//! why: abstract the wire so the driver never knows how bytes reach a peer
//! relations: implemented by the embedding transport; owned per peer by driver.rs
//! what: Connection (per-peer handle), Connector (lazy creation), Outbound queue item

use std::sync::Arc;

use raft_core::{HostError, HostResult, NodeId, RaftMessage};

/// transport handle to one peer
///
/// `send` runs on the driver's sender thread, never under the engine lock,
/// so a slow peer only delays its own traffic
pub trait Connection: Send + Sync {
    /// the peer this connection reaches
    fn peer_id(&self) -> NodeId;

    fn send(&self, message: RaftMessage) -> HostResult;

    /// called once when the driver drops the connection
    fn shutdown(&self) {}
}

/// creates connections on first use
pub trait Connector: Send + Sync {
    fn connect(&self, peer: NodeId) -> Result<Arc<dyn Connection>, HostError>;
}

/// a message the core produced, waiting for the sender thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub peer: NodeId,
    pub message: RaftMessage,
}
