//! Network I/O layer
//!
//! The transport session and the primitives it is built from: the request
//! queue, the pending-request table, the shared worker pool, and the
//! activation configuration.

pub mod config;
pub mod pending;
pub mod pool;
pub mod request_queue;
pub mod transport;

pub use config::ActivationConfig;
pub use pending::PendingTable;
pub use pool::{Deferred, WorkerPool};
pub use request_queue::{QueueStats, RequestQueue};
pub use transport::{ResponseHandler, TransportSession, TransportStats};
