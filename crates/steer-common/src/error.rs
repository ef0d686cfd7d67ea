//! Error types for OpenSteer

use thiserror::Error;

use crate::packet::{InterfaceId, MatchField};
use crate::ClassId;

/// OpenSteer error type
#[derive(Error, Debug)]
pub enum SteerError {
    /// A class of service with this name already exists
    #[error("class name already registered: {0}")]
    DuplicateName(String),

    /// Named entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Class id does not refer to a live class
    #[error("invalid class id: {0}")]
    InvalidClass(ClassId),

    /// Destroy refused while rules or bindings still reference the class
    #[error("class {name} still referenced ({refs} references)")]
    InUse {
        /// Name of the referenced class
        name: String,
        /// Outstanding reference count
        refs: usize,
    },

    /// Match value or mask wider than the selected field
    #[error("value or mask exceeds {bits}-bit width of field {field}")]
    InvalidMask {
        /// Field the rule selects on
        field: MatchField,
        /// Fixed bit width of that field
        bits: u32,
    },

    /// Packet arrived on an interface with no class bindings
    #[error("no class binding for interface {0}")]
    UnboundInterface(InterfaceId),

    /// Bounded dispatch queue refused an enqueue
    #[error("dispatch queue full (capacity {0})")]
    QueueFull(usize),

    /// Dispatch queue closed and drained
    #[error("dispatch queue closed")]
    QueueClosed,

    /// Packet source disconnected
    #[error("packet source disconnected")]
    SourceClosed,

    /// Engine already running
    #[error("engine already running")]
    AlreadyRunning,

    /// Worker thread spawn failure
    #[error("failed to spawn worker: {0}")]
    SpawnFailed(String),

    /// Configuration error
    #[error("config error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for OpenSteer
pub type SteerResult<T> = Result<T, SteerError>;
