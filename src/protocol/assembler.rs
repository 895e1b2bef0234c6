//! Receive-side message assembly (RFC 6455 §5.4).

use bytes::BytesMut;

use crate::error::{Error, Result};
use crate::protocol::OpCode;

/// Kind of data message, tracked across fragments in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Binary,
}

/// A data message stitched back together from one or more frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembledMessage {
    /// Validated text.
    Text(String),
    /// Binary payload.
    Binary(Vec<u8>),
}

/// Reassembles fragmented messages from decoded data frames.
///
/// Control frames may interleave with fragments and are ignored here; the
/// engine handles them before the assembler sees anything.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    receiving: Option<MessageKind>,
    buffer: BytesMut,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one decoded frame.
    ///
    /// Returns `Ok(Some(message))` when a message completes, `Ok(None)` while
    /// fragments are still outstanding or for control opcodes.
    ///
    /// # Errors
    ///
    /// - [`Error::MessageIncomplete`] if a Text or Binary frame arrives while
    ///   a fragmented message is still open
    /// - [`Error::UnexpectedContinuation`] if a Continuation frame arrives
    ///   with no message in progress
    /// - [`Error::InvalidTextUtf8`] when a completed text message fails
    ///   UTF-8 validation
    pub fn push(
        &mut self,
        opcode: OpCode,
        fin: bool,
        payload: &[u8],
    ) -> Result<Option<AssembledMessage>> {
        match opcode {
            OpCode::Text | OpCode::Binary => {
                if self.receiving.is_some() {
                    return Err(Error::MessageIncomplete);
                }
                let kind = if opcode == OpCode::Text {
                    MessageKind::Text
                } else {
                    MessageKind::Binary
                };
                if fin {
                    return complete(kind, payload.to_vec()).map(Some);
                }
                self.receiving = Some(kind);
                self.buffer.extend_from_slice(payload);
                Ok(None)
            }
            OpCode::Continuation => {
                let Some(kind) = self.receiving else {
                    return Err(Error::UnexpectedContinuation);
                };
                self.buffer.extend_from_slice(payload);
                if !fin {
                    return Ok(None);
                }
                self.receiving = None;
                let message = self.buffer.split().to_vec();
                complete(kind, message).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Whether a fragmented message is currently open.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.receiving.is_some()
    }
}

/// Text messages are validated over the full assembled payload, once.
fn complete(kind: MessageKind, payload: Vec<u8>) -> Result<AssembledMessage> {
    match kind {
        MessageKind::Text => String::from_utf8(payload)
            .map(AssembledMessage::Text)
            .map_err(|_| Error::InvalidTextUtf8),
        MessageKind::Binary => Ok(AssembledMessage::Binary(payload)),
    }
}
