//! LMS CLI adapter: transport, protocol helpers, session and runner

pub mod cli_transport;
pub mod follower;
pub mod handle;
pub mod lms;
pub mod lms_params;
pub mod lms_players;
pub mod lms_query;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock_transport;

pub use handle::{AdapterHandle, RetryConfig};
pub use traits::{AdapterContext, AdapterLogic, LineTransport};
