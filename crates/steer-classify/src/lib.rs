//! OpenSteer Classify - packet classification engine
//!
//! Steers raw frames into per-class dispatch queues: parse the headers,
//! walk the ingress interface's match rules, hand the packet to the
//! winning class of service.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                       CLASSIFIER ENGINE                        │
//! │                                                                │
//! │   RawPacket (iface, frame)                                     │
//! │        │                                                       │
//! │        ▼                                                       │
//! │  ┌───────────────┐  unbound   ┌────────────────────────┐      │
//! │  │ IfaceBindings ├───────────▶│ UnboundInterface error │      │
//! │  └──────┬────────┘            └────────────────────────┘      │
//! │         │ default/error classes                               │
//! │         ▼                                                     │
//! │  ┌───────────────┐  parse failure                             │
//! │  │ parse_headers ├───────────────────────┐                    │
//! │  └──────┬────────┘                       │                    │
//! │         │ headers                        ▼                    │
//! │         ▼                         error class                 │
//! │  ┌───────────────┐                       │                    │
//! │  │   RuleTable   │ first match wins      │                    │
//! │  │ (insertion    ├───────────────┐       │                    │
//! │  │  order scan)  │               ▼       ▼                    │
//! │  └──────┬────────┘            ┌─────────────────┐             │
//! │         │ no match            │   CosRegistry   │             │
//! │         └───────────────────▶ │ DispatchQueues  │             │
//! │           default class       └─────────────────┘             │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - Rules match on `(field & mask) == (value & mask)`, first match in
//!   insertion order, scoped to the packet's current class
//! - Classification never mutates engine state or the packet
//! - Dispatch queues are multi-producer FIFO with blocking consume and
//!   close-and-drain shutdown

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod iface;
pub mod queue;
pub mod registry;
pub mod rules;

pub use config::{BindingSpec, ClassSpec, ClassifierSpec, RuleSpec};
pub use engine::{Classifier, ClassifierStats};
pub use iface::{Binding, IfaceBindings};
pub use queue::DispatchQueue;
pub use registry::{CosParams, CosRegistry};
pub use rules::{MatchRule, RuleTable};
