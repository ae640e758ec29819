//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! Commands and replies share one frame layout:
//! ```text
//! ┌────────────┬──────────┬─────────────────────────────┐
//! │ Opcode (1) │ Len (4)  │         Payload             │
//! └────────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Command Type
//! - START:      lag (4 bytes)
//! - STOP:       empty
//! - ECHO:       times (4 bytes) + content
//! - REVERSE, COUNT, UPPER_CAST, LOWER_CAST: content
//!
//! ### Payload by Reply Type
//! - START, STOP: empty
//! - COUNT:       count (4 bytes)
//! - others:      content
//!
//! Integers are big-endian, text is UTF-8.

use std::io::{Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, ServiceError};
use super::{Command, Opcode, Reply};

/// Header size: 1 byte opcode + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Frame Helpers
// =============================================================================

fn encode_frame(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u8(opcode as u8);
    message.put_u32(payload.len() as u32);
    message.put_slice(payload);
    message.to_vec()
}

/// Parse a frame header into its opcode and payload length
fn parse_header(header: &[u8; HEADER_SIZE], what: &str) -> Result<(Opcode, usize)> {
    let opcode = Opcode::from_u8(header[0]).ok_or_else(|| {
        ServiceError::MalformedFrame(format!("Unknown {} opcode: 0x{:02x}", what, header[0]))
    })?;

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(ServiceError::MalformedFrame(format!(
            "{} payload too large: {} bytes (max {})",
            what, payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    Ok((opcode, payload_len as usize))
}

/// Split one frame off the front of `bytes`; trailing bytes are ignored
fn split_frame<'a>(bytes: &'a [u8], what: &str) -> Result<(Opcode, &'a [u8])> {
    let header: &[u8; HEADER_SIZE] = bytes
        .get(..HEADER_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| {
            ServiceError::MalformedFrame(format!(
                "Incomplete {} header: expected {} bytes, got {}",
                what,
                HEADER_SIZE,
                bytes.len()
            ))
        })?;

    let (opcode, payload_len) = parse_header(header, what)?;

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(ServiceError::MalformedFrame(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((opcode, &bytes[HEADER_SIZE..total_len]))
}

/// Read one frame off a stream, blocking until it is complete
fn read_frame<R: Read>(reader: &mut R, what: &str) -> Result<(Opcode, Bytes)> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let (opcode, payload_len) = parse_header(&header, what)?;

    let mut payload = vec![0u8; payload_len];
    if payload_len > 0 {
        reader.read_exact(&mut payload)?;
    }

    Ok((opcode, Bytes::from(payload)))
}

/// Reject a payload the header's length field cannot describe
pub fn check_payload_len(what: &str, len: usize) -> Result<()> {
    if len > MAX_PAYLOAD_SIZE as usize {
        return Err(ServiceError::MalformedFrame(format!(
            "{} payload too large: {} bytes (max {})",
            what, len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

fn write_frame<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: opcode (1) + payload_len (4) + payload.
/// Callers sending on a stream go through [`write_command`], which refuses
/// payloads above [`MAX_PAYLOAD_SIZE`].
pub fn encode_command(command: &Command) -> Vec<u8> {
    encode_frame(command.opcode(), command.payload())
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (opcode, payload) = split_frame(bytes, "command")?;
    Command::from_parts(opcode, Bytes::copy_from_slice(payload))
}

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs.
/// A stream that ends mid-frame surfaces as an `UnexpectedEof` I/O error.
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let (opcode, payload) = read_frame(reader, "command")?;
    Command::from_parts(opcode, payload)
}

/// Write a command to a stream
///
/// An oversized command fails before any byte is written.
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    check_payload_len("command", command.payload().len())?;
    write_frame(writer, &encode_command(command))
}

// =============================================================================
// Reply Encoding/Decoding
// =============================================================================

/// Encode a reply to bytes
///
/// Format: opcode (1) + payload_len (4) + payload
pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    encode_frame(reply.opcode(), reply.payload())
}

/// Decode a reply from bytes
pub fn decode_reply(bytes: &[u8]) -> Result<Reply> {
    let (opcode, payload) = split_frame(bytes, "reply")?;
    Reply::from_parts(opcode, Bytes::copy_from_slice(payload))
}

/// Read a complete reply from a stream
pub fn read_reply<R: Read>(reader: &mut R) -> Result<Reply> {
    let (opcode, payload) = read_frame(reader, "reply")?;
    Reply::from_parts(opcode, payload)
}

/// Write a reply to a stream
///
/// An oversized reply fails before any byte is written.
pub fn write_reply<W: Write>(writer: &mut W, reply: &Reply) -> Result<()> {
    check_payload_len("reply", reply.payload().len())?;
    write_frame(writer, &encode_reply(reply))
}
