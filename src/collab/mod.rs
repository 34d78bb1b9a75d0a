//! Multi-agent collaboration.
//!
//! # Components
//! - **CollaborationCoordinator**: delegates a task to a list of agents
//!   (sequential, parallel or hierarchical) and aggregates their results
//! - **AgentMessage**: JSON wire protocol between devices
//! - **Connector / Connection**: transport boundary; `LocalConnector` serves
//!   in-process engines
//! - **ResponseRouter**: correlates inbound responses with pending requests

mod coordinator;
mod local;
mod message;
mod router;
mod transport;
mod types;

pub use coordinator::{CollaborationCoordinator, DelegationError};
pub use local::LocalConnector;
pub use message::AgentMessage;
pub use router::ResponseRouter;
pub use transport::{Connection, Connector, TransportError};
pub use types::{AgentReference, CollaborationStrategy, EndpointKey};
