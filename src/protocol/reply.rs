//! Reply definitions
//!
//! Represents replies to clients. Every reply carries the opcode of the
//! command it answers.

use bytes::Bytes;

use crate::error::{Result, ServiceError};
use super::command::{check_utf8, read_u32, INT_FIELD_SIZE};
use super::Opcode;

/// A reply to send to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    opcode: Opcode,
    payload: Bytes,
}

impl Reply {
    /// Empty acknowledgement (START and STOP)
    pub fn ack(opcode: Opcode) -> Self {
        Self {
            opcode,
            payload: Bytes::new(),
        }
    }

    /// Text result (ECHO, REVERSE, UPPER_CAST, LOWER_CAST)
    pub fn text(opcode: Opcode, content: impl Into<String>) -> Self {
        Self {
            opcode,
            payload: Bytes::from(content.into()),
        }
    }

    /// Character count result (COUNT)
    pub fn count(count: u32) -> Self {
        Self {
            opcode: Opcode::Count,
            payload: Bytes::copy_from_slice(&count.to_be_bytes()),
        }
    }

    /// Rebuild a reply from an opcode and raw payload, checking the layout
    pub fn from_parts(opcode: Opcode, payload: Bytes) -> Result<Self> {
        match opcode {
            Opcode::Start | Opcode::Stop => {
                if !payload.is_empty() {
                    return Err(ServiceError::MalformedFrame(format!(
                        "{} reply: unexpected payload of {} bytes",
                        opcode,
                        payload.len()
                    )));
                }
            }
            Opcode::Count => {
                if payload.len() != INT_FIELD_SIZE {
                    return Err(ServiceError::MalformedFrame(format!(
                        "COUNT reply: expected {} byte count, got {} bytes",
                        INT_FIELD_SIZE,
                        payload.len()
                    )));
                }
            }
            Opcode::Echo | Opcode::Reverse | Opcode::UpperCast | Opcode::LowerCast => {
                check_utf8(opcode, &payload)?;
            }
        }

        Ok(Self { opcode, payload })
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Text of a text-bearing reply
    pub fn content(&self) -> Option<&str> {
        match self.opcode {
            Opcode::Echo | Opcode::Reverse | Opcode::UpperCast | Opcode::LowerCast => {
                std::str::from_utf8(&self.payload).ok()
            }
            _ => None,
        }
    }

    /// Count carried by a COUNT reply
    pub fn count_value(&self) -> Option<u32> {
        match self.opcode {
            Opcode::Count => read_u32(&self.payload),
            _ => None,
        }
    }
}
