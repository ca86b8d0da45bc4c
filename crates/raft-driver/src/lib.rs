//! # raft-driver
//!
//! why: drive the consensus core from real threads, storage and transport
//! relations: wraps raft-core's RaftNode, persists through raft-storage, sends via host connections
//! what: RaftDriver (timer + sender threads, locked rpc entry points), DriverConfig, Connection seam

// a panic inside the engine lock takes the whole node down
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod host;

pub use config::DriverConfig;
pub use connection::{Connection, Connector, Outbound};
pub use driver::{DriverStatus, RaftDriver};
pub use error::{DriverError, Result};
pub use host::{DriverHost, StateMachine};
