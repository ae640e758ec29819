//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (Simple Binary)
//!
//! ### Frame Format
//! ```text
//! ┌────────────┬──────────┬─────────────────────────────┐
//! │ Opcode (1) │ Len (4)  │         Payload             │
//! └────────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Opcodes
//! - 0x01: START      - Payload: lag (4)
//! - 0x02: STOP       - Payload: empty
//! - 0x03: ECHO       - Payload: times (4) + content
//! - 0x04: REVERSE    - Payload: content
//! - 0x05: COUNT      - Payload: content
//! - 0x06: UPPER_CAST - Payload: content
//! - 0x07: LOWER_CAST - Payload: content
//!
//! A reply uses the same frame, tagged with the opcode it answers.

mod command;
mod reply;
mod codec;

pub use command::{Command, Opcode, INT_FIELD_SIZE};
pub use reply::Reply;
pub use codec::{
    encode_command, decode_command, read_command, write_command,
    encode_reply, decode_reply, read_reply, write_reply,
    check_payload_len, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
