//! Eye-tracking server protocol
//!
//! This module contains the wire framing, the request type, and the payload
//! types exchanged with the server.

pub mod message;
pub mod request;
pub mod types;

// Re-export commonly used types
pub use message::{keys, op, status, Category, RequestFrame, Response};
pub use request::{Reply, ReplyReceiver, Request};
