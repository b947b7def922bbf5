//! Remote attribute writes for Matter nodes.
//!
//! Writes are validated against the cluster schema, encoded as interaction
//! model `WriteRequest`s and sent over one session per node. Every write
//! completes exactly once through its callback: with the node's answer, with
//! a timeout, or with the reason its session went down.
//!
//! Writes can be addressed by name through the [`registry::WriteRegistry`],
//! the way generated client bindings name them.

#[macro_use]
extern crate num_derive;

pub mod builder;
pub mod callback;
/// Clusters of remote nodes as seen by a client
pub mod cluster;
pub mod config;
pub mod constants;
pub mod controller;
pub mod data_model;
pub mod dispatcher;
pub mod error;
mod exchange;
pub mod interaction_model;
pub mod message;
pub mod pending;
pub mod registry;
pub mod schema;
pub mod session;
pub mod tlv;
pub mod transport;

pub use builder::{build, EncodedWrite, WriteRequestBuilder};
pub use callback::{CallbackFactory, WriteCallback};
pub use cluster::{ClusterClient, ClusterHandle};
pub use config::SessionConfig;
pub use controller::Controller;
pub use data_model::{AttributePath, TypedValue};
pub use error::{SessionError, ValidationError, WriteError};
pub use pending::CorrelationId;
pub use registry::{WriteInteraction, WriteRegistry};
pub use session::{Session, SessionState};
