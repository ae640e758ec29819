//! TCP Server
//!
//! Accepts connections and hands each one to its own worker thread.

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::sync::WaitGroup;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{Result, ServiceError};
use super::Connection;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Cloneable handle that asks a running server to stop
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Streams of live connections, keyed by connection id
type LiveStreams = Arc<Mutex<HashMap<u64, TcpStream>>>;

/// TCP server for ioservice
pub struct Server {
    config: Config,
    listener: Option<TcpListener>,
    shutdown: ShutdownHandle,
    /// Handles used to unblock workers at shutdown
    live: LiveStreams,
    next_id: AtomicU64,
}

impl Server {
    /// Create a new server with the given config
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            listener: None,
            shutdown: ShutdownHandle::new(),
            live: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        })
    }

    /// Bind the listener without serving yet
    ///
    /// Returns the bound address, which differs from the configured one
    /// when port 0 was requested.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        if let Some(listener) = &self.listener {
            return Ok(listener.local_addr()?);
        }

        let listener = TcpListener::bind(&self.config.listen_addr).map_err(|e| {
            ServiceError::Connection(format!(
                "failed to bind {}: {}",
                self.config.listen_addr, e
            ))
        })?;
        // Polled so the shutdown flag is observed promptly
        listener.set_nonblocking(true)?;

        let addr = listener.local_addr()?;
        tracing::info!("Listening on {}", addr);
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Address the server is bound to, if bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.live.lock().len()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Start the server (blocking)
    ///
    /// Returns after shutdown is requested and every connection worker
    /// has finished.
    pub fn run(&mut self) -> Result<()> {
        self.bind()?;
        let workers = WaitGroup::new();

        while !self.shutdown.is_shutdown() {
            let Some(listener) = self.listener.as_ref() else {
                break;
            };
            match listener.accept() {
                Ok((stream, addr)) => self.admit(stream, addr, &workers),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!(
            "Shutting down, waiting for {} connections",
            self.active_connections()
        );
        self.listener = None;

        // Workers blocked in a read (possibly with no timeout) see EOF
        for stream in self.live.lock().values() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        workers.wait();
        Ok(())
    }

    /// Hand an accepted stream to a fresh worker, or refuse it at capacity
    fn admit(&self, stream: TcpStream, addr: SocketAddr, workers: &WaitGroup) {
        let handle = match stream.try_clone() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("Refusing {}: cannot clone stream: {}", addr, e);
                return;
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut live = self.live.lock();
            if live.len() >= self.config.max_connections {
                tracing::warn!(
                    "Refusing {}: {} connections already active",
                    addr,
                    live.len()
                );
                return;
            }
            live.insert(id, handle);
        }

        let config = self.config.clone();
        let shutdown = self.shutdown.clone();
        let guard = LiveGuard {
            live: Arc::clone(&self.live),
            id,
        };
        let worker = workers.clone();

        let spawned = thread::Builder::new()
            .name(format!("conn-{}", addr))
            .spawn(move || {
                let _guard = guard;
                let _worker = worker;
                if let Err(e) = serve(stream, &config, shutdown) {
                    tracing::warn!("Connection {} ended with error: {}", addr, e);
                }
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn worker for {}: {}", addr, e);
        }
    }
}

fn serve(stream: TcpStream, config: &Config, shutdown: ShutdownHandle) -> Result<()> {
    // Accepted sockets may inherit the listener's non-blocking mode
    stream.set_nonblocking(false)?;
    let mut connection = Connection::new(stream, config)?.with_shutdown(shutdown);
    connection.handle()
}

/// Removes a connection from the live set when its worker exits
struct LiveGuard {
    live: LiveStreams,
    id: u64,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.live.lock().remove(&self.id);
    }
}
