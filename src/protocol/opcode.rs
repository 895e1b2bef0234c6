//! Frame opcodes (RFC 6455 §5.2).

use crate::error::{Error, Result};

/// Interpretation of a frame's payload.
///
/// Only the six opcodes assigned by RFC 6455 are representable; every other
/// nibble is rejected at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Follow-on fragment of the message opened by a Text or Binary frame.
    Continuation = 0x0,
    /// UTF-8 text payload.
    Text = 0x1,
    /// Arbitrary binary payload.
    Binary = 0x2,
    /// Close handshake frame, optionally carrying a status code and reason.
    Close = 0x8,
    /// Keepalive probe; answered with a Pong echoing the payload.
    Ping = 0x9,
    /// Answer to a Ping, or an unsolicited heartbeat.
    Pong = 0xA,
}

impl OpCode {
    /// Decode an opcode nibble.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownOpcode`] for any value RFC 6455 leaves unassigned,
    /// including the reserved ranges 0x3..=0x7 and 0xB..=0xF.
    pub const fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(Error::UnknownOpcode(other)),
        }
    }

    /// The wire nibble.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Close, Ping, and Pong frames; never fragmented, payload capped at 125.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }

    /// Continuation, Text, and Binary frames.
    #[inline]
    #[must_use]
    pub const fn is_data(self) -> bool {
        !self.is_control()
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OpCode::Continuation => "Continuation",
            OpCode::Text => "Text",
            OpCode::Binary => "Binary",
            OpCode::Close => "Close",
            OpCode::Ping => "Ping",
            OpCode::Pong => "Pong",
        };
        f.write_str(name)
    }
}
