//! # error
//!
//! why: one error type for every fallible driver operation
//! relations: wraps raft-core and raft-storage errors; returned by driver.rs and config.rs
//! what: DriverError, Result alias

use std::io;

use raft_core::{NodeId, RaftError};
use raft_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Raft(#[from] RaftError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("malformed configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("no connection to node {0}")]
    NoConnection(NodeId),

    #[error("driver is already running")]
    AlreadyRunning,

    #[error("driver is not running")]
    NotRunning,
}

pub type Result<T, E = DriverError> = std::result::Result<T, E>;
