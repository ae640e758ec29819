//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread, polling a non-blocking listener
//! - One worker thread per accepted connection, each running its own dispatch loop
//! - Blocking client that keeps one request in flight at a time

mod server;
mod connection;
mod client;

pub use server::{Server, ShutdownHandle};
pub use connection::{Connection, ConnectionState};
pub use client::Client;
