//! Per-connection session state
//!
//! Owned by exactly one dispatch loop; never shared between connections.

/// Session configuration set by START
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Lag requested by the client, `None` until START arrives
    lag: Option<u32>,

    /// Set once STOP has been acknowledged
    stopped: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking session config (START)
    ///
    /// A second START replaces the lag and reopens a stopped session.
    pub fn begin(&mut self, lag: u32) {
        self.lag = Some(lag);
        self.stopped = false;
    }

    /// Tear down the session (STOP)
    pub fn end(&mut self) {
        self.lag = None;
        self.stopped = true;
    }

    /// Lag value passed through from START, if any
    pub fn lag(&self) -> Option<u32> {
        self.lag
    }

    pub fn is_started(&self) -> bool {
        self.lag.is_some()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}
