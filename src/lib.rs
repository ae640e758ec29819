//! # ioservice
//!
//! A minimal client/server command protocol over persistent TCP connections:
//! - Binary framing with an opcode-tagged command/reply catalog
//! - Blocking call engine with exactly one request in flight
//! - Per-connection dispatch loop with its own session
//! - Thread-per-connection server
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────┐    Command frame     ┌─────────────────────────────┐
//! │   Client    │ ───────────────────▶ │         TCP Server          │
//! │ (call loop) │ ◀─────────────────── │  (one thread per client)    │
//! └─────────────┘     Reply frame      └──────────────┬──────────────┘
//!                                                     │
//!                                      ┌──────────────▼──────────────┐
//!                                      │        Dispatch Loop        │
//!                                      │  decode → handle → reply    │
//!                                      └──────────────┬──────────────┘
//!                                                     │
//!                                      ┌──────────────▼──────────────┐
//!                                      │  Handler Table + Session    │
//!                                      └─────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod session;
pub mod handler;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, ServiceError};
pub use config::Config;
pub use network::{Client, Server};
pub use protocol::{Command, Opcode, Reply};
pub use session::Session;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ioservice
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
