//! Connection Handling
//!
//! The connection layer feeds the core: it owns the socket, accumulates
//! bytes, hands complete frames to the command handler and writes the
//! replies back. Each client runs as its own Tokio task.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ accept() + spawn
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ Decode RESP │───>│ Execute cmd │     │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘     │
//! │         ▲                                     │             │
//! │         │           ┌─────────────┐           │             │
//! │         └───────────│ Send reply  │<──────────┘             │
//! │                     └─────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionLimits, ConnectionStats,
};
