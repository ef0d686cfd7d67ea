//! OpenSteer Data Plane
//!
//! Multi-threaded front end for the classification engine: worker
//! threads pull raw frames from packet sources, classify each one, and
//! dispatch it to its class-of-service queue, where blocking receivers
//! consume them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         DATA PLANE                           │
//! │                                                              │
//! │  ┌────────────┐      ┌────────────┐      ┌────────────┐      │
//! │  │  Worker 0  │      │  Worker 1  │      │  Worker N  │      │
//! │  │            │      │            │      │            │      │
//! │  │ ┌────────┐ │      │ ┌────────┐ │      │ ┌────────┐ │      │
//! │  │ │ Source │ │      │ │ Source │ │      │ │ Source │ │      │
//! │  │ │  poll  │ │      │ │  poll  │ │      │ │  poll  │ │      │
//! │  │ └───┬────┘ │      │ └───┬────┘ │      │ └───┬────┘ │      │
//! │  │     ▼      │      │     ▼      │      │     ▼      │      │
//! │  │ classify   │      │ classify   │      │ classify   │      │
//! │  │     ▼      │      │     ▼      │      │     ▼      │      │
//! │  │ dispatch   │      │ dispatch   │      │ dispatch   │      │
//! │  └─────┬──────┘      └─────┬──────┘      └─────┬──────┘      │
//! │        └──────────┬────────┴──────────┬────────┘             │
//! │                   ▼                   ▼                      │
//! │           ┌──────────────┐    ┌──────────────┐               │
//! │           │ cos queue A  │    │ cos queue B  │  ...          │
//! │           └──────┬───────┘    └──────┬───────┘               │
//! │                  ▼                   ▼                       │
//! │             CosReceiver         CosReceiver                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Workers never block on receive; only consumers block, on their
//! class's dispatch queue. `stop` drains the workers and closes every
//! queue so blocked consumers wake.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod receiver;
pub mod source;
pub mod stats;

pub use crate::core::{DataPlane, EngineConfig};
pub use receiver::CosReceiver;
pub use source::{ChannelSource, PacketInjector, PacketSource};
pub use stats::{DataPlaneStats, WorkerStats, WorkerStatsSnapshot};

/// Cap on worker threads
pub const MAX_WORKERS: usize = 32;

/// Packets drained from one source per worker loop pass
pub const DEFAULT_POLL_BUDGET: usize = 64;
