//! Handler Module
//!
//! The handler table that turns a decoded command into a reply.
//!
//! ## Responsibilities
//! - Map every opcode to exactly one handler (exhaustive match, no runtime registry)
//! - Compute each reply purely from the command payload and the session
//! - Apply START/STOP to the session
//!
//! Adding a command means adding an `Opcode` variant; the compiler then
//! points at every match that needs a new arm, including [`handler_for`].

use crate::error::{Result, ServiceError};
use crate::protocol::{Command, Opcode, Reply, MAX_PAYLOAD_SIZE};
use crate::session::Session;

/// A handler computes one reply; it must not block on anything else
pub type Handler = fn(&Command, &mut Session) -> Result<Reply>;

/// Look up the handler for an opcode
pub fn handler_for(opcode: Opcode) -> Handler {
    match opcode {
        Opcode::Start => handle_start,
        Opcode::Stop => handle_stop,
        Opcode::Echo => handle_echo,
        Opcode::Reverse => handle_reverse,
        Opcode::Count => handle_count,
        Opcode::UpperCast => handle_upper_cast,
        Opcode::LowerCast => handle_lower_cast,
    }
}

/// Execute a command against a session
pub fn execute(command: &Command, session: &mut Session) -> Result<Reply> {
    handler_for(command.opcode())(command, session)
}

// =============================================================================
// Session Handlers
// =============================================================================

fn handle_start(command: &Command, session: &mut Session) -> Result<Reply> {
    let lag = command
        .lag()
        .ok_or_else(|| missing_field(command.opcode(), "lag"))?;
    session.begin(lag);
    Ok(Reply::ack(Opcode::Start))
}

fn handle_stop(_command: &Command, session: &mut Session) -> Result<Reply> {
    session.end();
    Ok(Reply::ack(Opcode::Stop))
}

// =============================================================================
// Content Handlers
// =============================================================================

fn handle_echo(command: &Command, _session: &mut Session) -> Result<Reply> {
    let times = command
        .times()
        .ok_or_else(|| missing_field(command.opcode(), "times"))?;
    let content = content_of(command)?;

    // Checked before allocating the repeated text
    let reply_len = (content.len() as u64).saturating_mul(times as u64);
    check_reply_len(Opcode::Echo, reply_len)?;

    Ok(Reply::text(Opcode::Echo, content.repeat(times as usize)))
}

fn handle_reverse(command: &Command, _session: &mut Session) -> Result<Reply> {
    let reversed: String = content_of(command)?.chars().rev().collect();
    Ok(Reply::text(Opcode::Reverse, reversed))
}

fn handle_count(command: &Command, _session: &mut Session) -> Result<Reply> {
    let count = content_of(command)?.chars().count();
    Ok(Reply::count(count as u32))
}

// Case mapping can lengthen text ('ΐ' upper-cases to three code points)

fn handle_upper_cast(command: &Command, _session: &mut Session) -> Result<Reply> {
    let upper = content_of(command)?.to_uppercase();
    check_reply_len(Opcode::UpperCast, upper.len() as u64)?;
    Ok(Reply::text(Opcode::UpperCast, upper))
}

fn handle_lower_cast(command: &Command, _session: &mut Session) -> Result<Reply> {
    let lower = content_of(command)?.to_lowercase();
    check_reply_len(Opcode::LowerCast, lower.len() as u64)?;
    Ok(Reply::text(Opcode::LowerCast, lower))
}

fn content_of(command: &Command) -> Result<&str> {
    command
        .content()
        .ok_or_else(|| missing_field(command.opcode(), "content"))
}

fn check_reply_len(opcode: Opcode, len: u64) -> Result<()> {
    if len > MAX_PAYLOAD_SIZE as u64 {
        return Err(ServiceError::Protocol(format!(
            "{} reply of {} bytes exceeds max payload {}",
            opcode, len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

fn missing_field(opcode: Opcode, field: &str) -> ServiceError {
    ServiceError::MalformedFrame(format!("{} command has no {}", opcode, field))
}
