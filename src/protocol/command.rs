//! Command definitions
//!
//! Represents commands from clients. A command is an opcode plus its raw
//! payload; `times`, `lag` and `content` are views decoded from the payload.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, ServiceError};

/// Width of the integer prefix carried by START and ECHO payloads
pub const INT_FIELD_SIZE: usize = 4;

/// Command kinds, shared by the reply that answers each one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Start = 0x01,
    Stop = 0x02,
    Echo = 0x03,
    Reverse = 0x04,
    Count = 0x05,
    UpperCast = 0x06,
    LowerCast = 0x07,
}

impl Opcode {
    /// Every opcode in wire order
    pub const ALL: [Opcode; 7] = [
        Opcode::Start,
        Opcode::Stop,
        Opcode::Echo,
        Opcode::Reverse,
        Opcode::Count,
        Opcode::UpperCast,
        Opcode::LowerCast,
    ];

    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Opcode::Start),
            0x02 => Some(Opcode::Stop),
            0x03 => Some(Opcode::Echo),
            0x04 => Some(Opcode::Reverse),
            0x05 => Some(Opcode::Count),
            0x06 => Some(Opcode::UpperCast),
            0x07 => Some(Opcode::LowerCast),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Start => "START",
            Opcode::Stop => "STOP",
            Opcode::Echo => "ECHO",
            Opcode::Reverse => "REVERSE",
            Opcode::Count => "COUNT",
            Opcode::UpperCast => "UPPER_CAST",
            Opcode::LowerCast => "LOWER_CAST",
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed command
///
/// Immutable once built. Construction (typed constructors or
/// [`Command::from_parts`]) guarantees the payload matches the opcode's
/// layout, so the accessors never see a short or non-UTF-8 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    opcode: Opcode,
    payload: Bytes,
}

impl Command {
    /// Open a session; `lag` is stored on the session untouched
    pub fn start(lag: u32) -> Self {
        Self {
            opcode: Opcode::Start,
            payload: Bytes::copy_from_slice(&lag.to_be_bytes()),
        }
    }

    /// Close the session
    pub fn stop() -> Self {
        Self {
            opcode: Opcode::Stop,
            payload: Bytes::new(),
        }
    }

    /// Repeat `content` exactly `times` times
    pub fn echo(times: u32, content: &str) -> Self {
        let mut payload = BytesMut::with_capacity(INT_FIELD_SIZE + content.len());
        payload.put_u32(times);
        payload.put_slice(content.as_bytes());
        Self {
            opcode: Opcode::Echo,
            payload: payload.freeze(),
        }
    }

    pub fn reverse(content: &str) -> Self {
        Self::text(Opcode::Reverse, content)
    }

    pub fn count(content: &str) -> Self {
        Self::text(Opcode::Count, content)
    }

    pub fn upper_cast(content: &str) -> Self {
        Self::text(Opcode::UpperCast, content)
    }

    pub fn lower_cast(content: &str) -> Self {
        Self::text(Opcode::LowerCast, content)
    }

    fn text(opcode: Opcode, content: &str) -> Self {
        Self {
            opcode,
            payload: Bytes::copy_from_slice(content.as_bytes()),
        }
    }

    /// Rebuild a command from an opcode and raw payload, checking the layout
    pub fn from_parts(opcode: Opcode, payload: Bytes) -> Result<Self> {
        match opcode {
            Opcode::Start => {
                if payload.len() != INT_FIELD_SIZE {
                    return Err(ServiceError::MalformedFrame(format!(
                        "START command: expected {} byte lag, got {} bytes",
                        INT_FIELD_SIZE,
                        payload.len()
                    )));
                }
            }
            Opcode::Stop => {
                if !payload.is_empty() {
                    return Err(ServiceError::MalformedFrame(format!(
                        "STOP command: unexpected payload of {} bytes",
                        payload.len()
                    )));
                }
            }
            Opcode::Echo => {
                if payload.len() < INT_FIELD_SIZE {
                    return Err(ServiceError::MalformedFrame(format!(
                        "ECHO command: missing times (got {} bytes)",
                        payload.len()
                    )));
                }
                check_utf8(opcode, &payload[INT_FIELD_SIZE..])?;
            }
            Opcode::Reverse | Opcode::Count | Opcode::UpperCast | Opcode::LowerCast => {
                check_utf8(opcode, &payload)?;
            }
        }

        Ok(Self { opcode, payload })
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Raw payload as it travels on the wire
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Session lag carried by START
    pub fn lag(&self) -> Option<u32> {
        match self.opcode {
            Opcode::Start => read_u32(&self.payload),
            _ => None,
        }
    }

    /// Repeat count carried by ECHO
    pub fn times(&self) -> Option<u32> {
        match self.opcode {
            Opcode::Echo => read_u32(&self.payload),
            _ => None,
        }
    }

    /// Text content of ECHO, REVERSE, COUNT, UPPER_CAST and LOWER_CAST
    pub fn content(&self) -> Option<&str> {
        let text = match self.opcode {
            Opcode::Start | Opcode::Stop => return None,
            Opcode::Echo => self.payload.get(INT_FIELD_SIZE..)?,
            _ => &self.payload[..],
        };
        std::str::from_utf8(text).ok()
    }
}

pub(crate) fn read_u32(bytes: &[u8]) -> Option<u32> {
    let field: [u8; INT_FIELD_SIZE] = bytes.get(..INT_FIELD_SIZE)?.try_into().ok()?;
    Some(u32::from_be_bytes(field))
}

pub(crate) fn check_utf8(opcode: Opcode, bytes: &[u8]) -> Result<()> {
    std::str::from_utf8(bytes).map(|_| ()).map_err(|e| {
        ServiceError::MalformedFrame(format!("{} content is not valid UTF-8: {}", opcode, e))
    })
}
