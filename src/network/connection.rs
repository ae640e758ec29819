//! Connection Handler
//!
//! Runs the dispatch loop for a single client connection.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::{is_timeout_kind, Result, ServiceError};
use crate::handler;
use crate::protocol::{read_command, write_reply, Opcode, Reply};
use crate::session::Session;
use super::ShutdownHandle;

/// Dispatch loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingCommand,
    Decoding,
    Dispatching,
    Replying,
    /// Terminal: reached on STOP, a malformed frame, transport loss,
    /// or server shutdown while idle
    Closed,
}

/// Handles a single client connection
///
/// Owns its session exclusively, so connections never share mutable state.
pub struct Connection<R: Read = TcpStream, W: Write = TcpStream> {
    /// Inbound stream (buffered for efficiency)
    reader: BufReader<R>,

    /// Outbound stream (buffered for efficiency)
    writer: BufWriter<W>,

    /// Session config set by START
    session: Session,

    state: ConnectionState,

    /// Delay replies by the session lag
    simulate_lag: bool,

    /// Commands fully answered on this connection
    commands_served: u64,

    /// Observed while idle between commands
    shutdown: Option<ShutdownHandle>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection<TcpStream, TcpStream> {
    /// Create a new connection handler for an accepted socket
    ///
    /// Sets up buffered I/O and configures timeouts
    pub fn new(stream: TcpStream, config: &Config) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm; every frame is a small request or reply
        stream.set_nodelay(true)?;
        stream.set_read_timeout(config.read_timeout())?;
        stream.set_write_timeout(config.write_timeout())?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self::from_parts(read_stream, write_stream, peer_addr)
            .with_simulated_lag(config.simulate_lag))
    }
}

impl<R: Read, W: Write> Connection<R, W> {
    /// Build a connection over arbitrary read/write halves
    pub fn from_parts(reader: R, writer: W, peer_addr: impl Into<String>) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            session: Session::new(),
            state: ConnectionState::AwaitingCommand,
            simulate_lag: false,
            commands_served: 0,
            shutdown: None,
            peer_addr: peer_addr.into(),
        }
    }

    /// Sleep for the session lag before each reply
    pub fn with_simulated_lag(mut self, enabled: bool) -> Self {
        self.simulate_lag = enabled;
        self
    }

    /// Close the connection at the next idle read timeout once `shutdown` fires
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads commands in a loop and sends replies.
    /// Returns `Ok` when the client stops or disconnects, `Err` when the
    /// connection was poisoned by a malformed frame or a failed write.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        while self.state != ConnectionState::Closed {
            self.serve_one()?;
        }

        tracing::debug!(
            "Connection from {} closed after {} commands",
            self.peer_addr,
            self.commands_served
        );
        Ok(())
    }

    /// Run one full pass of the state machine: read, dispatch, reply
    ///
    /// Returns early in `AwaitingCommand` when the read timed out before any
    /// byte of a new frame arrived.
    pub fn serve_one(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Err(ServiceError::Connection(format!(
                "connection from {} is closed",
                self.peer_addr
            )));
        }

        // Wait for the first byte of the next frame. A read timeout here
        // only means the client is idle; the session stays open.
        match self.reader.fill_buf().map(|buf| buf.is_empty()) {
            Ok(false) => {}
            Ok(true) => {
                tracing::debug!("Client {} disconnected", self.peer_addr);
                self.state = ConnectionState::Closed;
                return Ok(());
            }
            Err(e) if is_timeout_kind(e.kind()) || e.kind() == io::ErrorKind::Interrupted => {
                if self.shutdown.as_ref().is_some_and(|s| s.is_shutdown()) {
                    tracing::debug!("Closing idle connection from {} for shutdown", self.peer_addr);
                    self.state = ConnectionState::Closed;
                } else {
                    self.state = ConnectionState::AwaitingCommand;
                }
                return Ok(());
            }
            Err(e) => {
                tracing::debug!("Client {} disconnected: {}", self.peer_addr, e);
                self.state = ConnectionState::Closed;
                return Ok(());
            }
        }

        // From here a timeout is a stalled frame and closes the connection
        self.state = ConnectionState::Decoding;
        let command = match read_command(&mut self.reader) {
            Ok(cmd) => cmd,
            Err(e) if e.is_disconnect() => {
                tracing::debug!("Client {} disconnected: {}", self.peer_addr, e);
                self.state = ConnectionState::Closed;
                return Ok(());
            }
            Err(e) => {
                // No resynchronization marker: a bad frame poisons the stream
                tracing::warn!("Malformed frame from {}: {}", self.peer_addr, e);
                self.state = ConnectionState::Closed;
                return Err(e);
            }
        };

        tracing::trace!("Received command from {}: {:?}", self.peer_addr, command);

        self.state = ConnectionState::Dispatching;
        let reply = match handler::execute(&command, &mut self.session) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(
                    "{} from {} failed: {}",
                    command.opcode(),
                    self.peer_addr,
                    e
                );
                self.state = ConnectionState::Closed;
                return Err(e);
            }
        };

        self.state = ConnectionState::Replying;
        if let Err(e) = self.send_reply(&reply) {
            self.state = ConnectionState::Closed;
            if e.is_disconnect() {
                tracing::debug!(
                    "Client {} disconnected before reply could be sent: {}",
                    self.peer_addr,
                    e
                );
                return Ok(());
            }
            tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
            return Err(e);
        }
        self.commands_served += 1;

        self.state = if command.opcode() == Opcode::Stop {
            tracing::debug!("Client {} stopped the session", self.peer_addr);
            ConnectionState::Closed
        } else {
            ConnectionState::AwaitingCommand
        };

        Ok(())
    }

    /// Send a reply to the client
    fn send_reply(&mut self, reply: &Reply) -> Result<()> {
        if self.simulate_lag {
            if let Some(lag) = self.session.lag().filter(|&lag| lag > 0) {
                thread::sleep(Duration::from_millis(lag as u64));
            }
        }
        write_reply(&mut self.writer, reply)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn commands_served(&self) -> u64 {
        self.commands_served
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Get the outbound stream (e.g. to inspect a loopback buffer)
    pub fn writer(&self) -> &W {
        self.writer.get_ref()
    }
}

