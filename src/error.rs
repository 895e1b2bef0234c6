//! Error types for the WebSocket protocol engine.
//!
//! Protocol failures never abort; the engine converts each [`Error`] into a
//! close frame carrying [`Error::close_code`] and the variant's display string
//! as the diagnostic reason.

use thiserror::Error;

use crate::protocol::close;

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A protocol violation detected on the receive path.
///
/// The display string of each variant is the reason text that accompanies the
/// resulting close frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// One of RSV1..3 was set; no extension is ever negotiated.
    #[error("reserved bits set")]
    ReservedBitsSet,

    /// A client received a masked frame.
    #[error("masked frame")]
    MaskedFrame,

    /// A server received an unmasked frame.
    #[error("unmasked frame")]
    UnmaskedFrame,

    /// The opcode nibble is not one this engine handles.
    #[error("unknown opcode")]
    UnknownOpcode(u8),

    /// A continuation frame arrived with no message in progress.
    #[error("unexpected continuation frame")]
    UnexpectedContinuation,

    /// A new data message started while a fragmented one was still open.
    #[error("last message incomplete")]
    MessageIncomplete,

    /// An assembled text message was not valid UTF-8.
    #[error("invalid UTF-8 encoding in text message")]
    InvalidTextUtf8,

    /// The reason text of a received close frame was not valid UTF-8.
    #[error("invalid UTF-8 encoding in close reason")]
    InvalidCloseReasonUtf8,

    /// Buffered inbound bytes exceeded the configured frame size cap.
    #[error("frame too large")]
    FrameTooLarge,
}

impl Error {
    /// The close code sent on the wire when this failure tears the
    /// connection down.
    #[must_use]
    pub const fn close_code(&self) -> u16 {
        match self {
            Error::ReservedBitsSet
            | Error::MaskedFrame
            | Error::UnmaskedFrame
            | Error::UnknownOpcode(_)
            | Error::UnexpectedContinuation
            | Error::MessageIncomplete => close::PROTOCOL_ERROR,
            Error::InvalidTextUtf8 | Error::InvalidCloseReasonUtf8 => close::INVALID_PAYLOAD,
            Error::FrameTooLarge => close::TOO_LARGE,
        }
    }
}

/// A rejected opening handshake.
///
/// Surfaced to callers only as a `false` return from the open operations; the
/// variant is reported through the diagnostics hub.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HandshakeError {
    /// The response status was not 101 Switching Protocols.
    #[error("unexpected status code {0}")]
    UnexpectedStatus(u16),

    /// The request method was not GET.
    #[error("method is not GET")]
    InvalidMethod,

    /// The Connection header carries no `upgrade` token.
    #[error("Connection header missing the upgrade token")]
    MissingUpgradeToken,

    /// The Upgrade header is absent or not `websocket`.
    #[error("Upgrade header is not websocket")]
    InvalidUpgradeHeader,

    /// The Sec-WebSocket-Accept value does not match the key sent.
    #[error("Sec-WebSocket-Accept does not match the key")]
    AcceptMismatch,

    /// The server advertised an extension; no negotiation is supported.
    #[error("peer advertised an extension")]
    ExtensionAdvertised,

    /// The server advertised a subprotocol; no negotiation is supported.
    #[error("peer advertised a subprotocol")]
    ProtocolAdvertised,

    /// The Sec-WebSocket-Version header is not 13.
    #[error("unsupported Sec-WebSocket-Version")]
    UnsupportedVersion,

    /// Payload bytes followed the request headers.
    #[error("request carries data after the headers")]
    TrailingData,

    /// The Sec-WebSocket-Key did not Base64-decode to 16 bytes.
    #[error("Sec-WebSocket-Key does not decode to 16 bytes")]
    InvalidKey,
}

impl HandshakeError {
    /// Whether a server should answer this rejection with 400 Bad Request.
    ///
    /// Requests that are not upgrade attempts at all (wrong method, missing
    /// upgrade headers) are left for other handlers and get no response edit.
    #[must_use]
    pub const fn wants_bad_request(&self) -> bool {
        matches!(
            self,
            HandshakeError::UnsupportedVersion
                | HandshakeError::TrailingData
                | HandshakeError::InvalidKey
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_codes() {
        assert_eq!(Error::ReservedBitsSet.close_code(), 1002);
        assert_eq!(Error::MaskedFrame.close_code(), 1002);
        assert_eq!(Error::UnmaskedFrame.close_code(), 1002);
        assert_eq!(Error::UnknownOpcode(0x3).close_code(), 1002);
        assert_eq!(Error::UnexpectedContinuation.close_code(), 1002);
        assert_eq!(Error::MessageIncomplete.close_code(), 1002);
        assert_eq!(Error::InvalidTextUtf8.close_code(), 1007);
        assert_eq!(Error::InvalidCloseReasonUtf8.close_code(), 1007);
        assert_eq!(Error::FrameTooLarge.close_code(), 1009);
    }

    #[test]
    fn test_reason_strings_match_wire_diagnostics() {
        assert_eq!(Error::ReservedBitsSet.to_string(), "reserved bits set");
        assert_eq!(Error::UnmaskedFrame.to_string(), "unmasked frame");
        assert_eq!(Error::UnknownOpcode(0xB).to_string(), "unknown opcode");
        assert_eq!(
            Error::UnexpectedContinuation.to_string(),
            "unexpected continuation frame"
        );
        assert_eq!(Error::MessageIncomplete.to_string(), "last message incomplete");
        assert_eq!(
            Error::InvalidTextUtf8.to_string(),
            "invalid UTF-8 encoding in text message"
        );
        assert_eq!(Error::FrameTooLarge.to_string(), "frame too large");
    }

    #[test]
    fn test_handshake_bad_request_split() {
        assert!(HandshakeError::UnsupportedVersion.wants_bad_request());
        assert!(HandshakeError::TrailingData.wants_bad_request());
        assert!(HandshakeError::InvalidKey.wants_bad_request());
        assert!(!HandshakeError::InvalidMethod.wants_bad_request());
        assert!(!HandshakeError::MissingUpgradeToken.wants_bad_request());
        assert!(!HandshakeError::AcceptMismatch.wants_bad_request());
    }
}
