//! WebSocket protocol core (RFC 6455): framing, masking, message assembly,
//! and the opening-handshake policy.

pub mod assembler;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use assembler::{AssembledMessage, MessageAssembler, MessageKind};
pub use frame::{encode, probe, Frame, MAX_CONTROL_PAYLOAD};
pub use handshake::compute_accept_key;
pub use mask::{apply_mask, apply_mask_fast};
pub use opcode::OpCode;

/// Close status codes the engine handles specially (RFC 6455 §7.4.1).
pub mod close {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// A protocol error was detected.
    pub const PROTOCOL_ERROR: u16 = 1002;
    /// No status code was present; represented on the wire as a zero-length
    /// close payload, never as these two bytes.
    pub const NO_STATUS: u16 = 1005;
    /// The connection was lost without a close handshake. Never sent on the
    /// wire; only surfaced locally.
    pub const ABNORMAL: u16 = 1006;
    /// A payload violated its declared type, e.g. malformed UTF-8 in text.
    pub const INVALID_PAYLOAD: u16 = 1007;
    /// An inbound frame exceeded the configured size cap.
    pub const TOO_LARGE: u16 = 1009;
}
