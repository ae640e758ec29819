//! TCP Client
//!
//! The call engine: one command out, exactly one reply back.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

use crate::config::Config;
use crate::error::{Result, ServiceError};
use crate::protocol::{check_payload_len, read_reply, write_command, Command, Reply};

/// Buffered halves of an open connection
struct Channel {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

/// Blocking client for an ioservice server
///
/// `call` takes `&mut self`, so one client can never have two calls in
/// flight. Share a client across threads behind a mutex if needed.
pub struct Client {
    config: Config,
    addr: String,
    channel: Option<Channel>,
}

impl Client {
    /// Create a client for `addr` with default timeouts
    pub fn new(addr: impl Into<String>) -> Self {
        Self::with_config(addr, Config::default())
    }

    /// Create a client for `addr` using the timeouts in `config`
    pub fn with_config(addr: impl Into<String>, config: Config) -> Self {
        Self {
            config,
            addr: addr.into(),
            channel: None,
        }
    }

    /// Establish the transport
    ///
    /// Calling it while already connected is a no-op.
    pub fn connect(&mut self) -> Result<()> {
        if self.channel.is_some() {
            return Ok(());
        }

        let stream = self.open_stream()?;
        stream.set_nodelay(true)?;
        // A read timeout turns a silent peer into an error instead of a hang
        stream.set_read_timeout(self.config.read_timeout())?;
        stream.set_write_timeout(self.config.write_timeout())?;

        let read_stream = stream.try_clone()?;
        self.channel = Some(Channel {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        });

        tracing::debug!("Connected to {}", self.addr);
        Ok(())
    }

    fn open_stream(&self) -> Result<TcpStream> {
        let unreachable_err = |e: std::io::Error| {
            ServiceError::Connection(format!("cannot reach {}: {}", self.addr, e))
        };

        let Some(timeout) = self.config.connect_timeout() else {
            return TcpStream::connect(&self.addr).map_err(unreachable_err);
        };

        let mut last_err = None;
        for addr in self.addr.to_socket_addrs().map_err(unreachable_err)? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }

        Err(match last_err {
            Some(e) => unreachable_err(e),
            None => ServiceError::Connection(format!("{} resolved to no addresses", self.addr)),
        })
    }

    /// Release the transport; later calls fail until `connect` again
    pub fn disconnect(&mut self) {
        if self.channel.take().is_some() {
            tracing::debug!("Disconnected from {}", self.addr);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Send one command and block for its reply
    ///
    /// Exactly one attempt; no retry. On any failure the transport is
    /// dropped, since its position in the byte stream is unknown.
    ///
    /// A command too large to frame is refused as `Protocol` before any
    /// byte is written; the transport stays usable.
    pub fn call(&mut self, command: &Command) -> Result<Reply> {
        check_payload_len("command", command.payload().len()).map_err(|e| match e {
            ServiceError::MalformedFrame(msg) => ServiceError::Protocol(msg),
            other => other,
        })?;

        let result = self.exchange(command);
        if result.is_err() {
            self.channel = None;
        }
        result
    }

    fn exchange(&mut self, command: &Command) -> Result<Reply> {
        let channel = self.channel.as_mut().ok_or_else(|| {
            ServiceError::Connection("not connected".to_string())
        })?;

        tracing::trace!("Calling {}: {:?}", command.opcode(), command);
        write_command(&mut channel.writer, command).map_err(into_connection_error)?;

        let reply = read_reply(&mut channel.reader).map_err(|e| match e {
            ServiceError::MalformedFrame(msg) => ServiceError::Protocol(msg),
            other => into_connection_error(other),
        })?;

        if reply.opcode() != command.opcode() {
            return Err(ServiceError::Protocol(format!(
                "sent {} but received {} reply",
                command.opcode(),
                reply.opcode()
            )));
        }

        Ok(reply)
    }

    // =========================================================================
    // Typed helpers
    // =========================================================================

    /// Open the session with the given lag
    pub fn start(&mut self, lag: u32) -> Result<()> {
        self.call(&Command::start(lag)).map(|_| ())
    }

    /// Close the session; the server closes the connection afterwards
    pub fn stop(&mut self) -> Result<()> {
        self.call(&Command::stop())?;
        self.disconnect();
        Ok(())
    }

    pub fn echo(&mut self, times: u32, content: &str) -> Result<String> {
        let reply = self.call(&Command::echo(times, content))?;
        text_of(&reply)
    }

    pub fn reverse(&mut self, content: &str) -> Result<String> {
        let reply = self.call(&Command::reverse(content))?;
        text_of(&reply)
    }

    pub fn count(&mut self, content: &str) -> Result<u32> {
        let reply = self.call(&Command::count(content))?;
        reply.count_value().ok_or_else(|| {
            ServiceError::Protocol(format!("{} reply carries no count", reply.opcode()))
        })
    }

    pub fn upper_cast(&mut self, content: &str) -> Result<String> {
        let reply = self.call(&Command::upper_cast(content))?;
        text_of(&reply)
    }

    pub fn lower_cast(&mut self, content: &str) -> Result<String> {
        let reply = self.call(&Command::lower_cast(content))?;
        text_of(&reply)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn text_of(reply: &Reply) -> Result<String> {
    reply.content().map(str::to_owned).ok_or_else(|| {
        ServiceError::Protocol(format!("{} reply carries no content", reply.opcode()))
    })
}

fn into_connection_error(e: ServiceError) -> ServiceError {
    match e {
        ServiceError::Io(io_err) => ServiceError::Connection(io_err.to_string()),
        other => other,
    }
}

