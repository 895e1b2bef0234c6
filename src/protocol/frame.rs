//! Frame encoding and decoding (RFC 6455 §5).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                Masking key (if MASK set)                      |
//! +---------------------------------------------------------------+
//! |                         Payload data                          |
//! +---------------------------------------------------------------+
//! ```

use crate::engine::Role;
use crate::error::{Error, Result};
use crate::protocol::mask::apply_mask_fast;
use crate::protocol::OpCode;

/// Most payload octets a control frame may carry (RFC 6455 §5.5).
pub const MAX_CONTROL_PAYLOAD: usize = 125;

const FIN_BIT: u8 = 0x80;
const MASK_BIT: u8 = 0x80;
const RSV_BITS: u8 = 0x70;

/// Sizes the frame at the head of `buf` from its length fields alone.
///
/// Returns `(header_len, payload_len)` once enough bytes have arrived to read
/// the length encoding, `None` while the header itself is still incomplete.
/// No validation happens here; a frame is sized before it is judged so that
/// the reassembly buffer knows how many bytes to wait for.
#[must_use]
pub fn probe(buf: &[u8]) -> Option<(usize, usize)> {
    if buf.len() < 2 {
        return None;
    }
    let len7 = buf[1] & !MASK_BIT;
    let (base_len, payload_len) = match len7 {
        126 => {
            if buf.len() < 4 {
                return None;
            }
            (4, u16::from_be_bytes([buf[2], buf[3]]) as u64)
        }
        127 => {
            if buf.len() < 10 {
                return None;
            }
            let raw = u64::from_be_bytes([
                buf[2], buf[3], buf[4], buf[5], buf[6], buf[7], buf[8], buf[9],
            ]);
            (10, raw)
        }
        short => (2, short as u64),
    };
    let payload_len = usize::try_from(payload_len).ok()?;
    let header_len = if buf[1] & MASK_BIT != 0 {
        base_len + 4
    } else {
        base_len
    };
    Some((header_len, payload_len))
}

/// A decoded inbound frame with its payload unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Whether this frame ends its message.
    pub fin: bool,
    /// Payload interpretation.
    pub opcode: OpCode,
    /// Unmasked payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Decodes the complete frame at the head of `buf`.
    ///
    /// `header_len` must come from [`probe`] and `buf` must hold the whole
    /// frame. Validation order: reserved bits, masking direction for `role`,
    /// then opcode.
    ///
    /// # Errors
    ///
    /// - [`Error::ReservedBitsSet`] if any of RSV1..3 is set
    /// - [`Error::MaskedFrame`] / [`Error::UnmaskedFrame`] when the MASK bit
    ///   contradicts `role`
    /// - [`Error::UnknownOpcode`] for unassigned opcode values
    pub fn decode(buf: &[u8], header_len: usize, role: Role) -> Result<Self> {
        if buf[0] & RSV_BITS != 0 {
            return Err(Error::ReservedBitsSet);
        }
        let masked = buf[1] & MASK_BIT != 0;
        if masked && !role.expects_masked() {
            return Err(Error::MaskedFrame);
        }
        if !masked && role.expects_masked() {
            return Err(Error::UnmaskedFrame);
        }
        let opcode = OpCode::from_u8(buf[0] & 0x0F)?;
        let mut payload = buf[header_len..].to_vec();
        if masked {
            let key = [
                buf[header_len - 4],
                buf[header_len - 3],
                buf[header_len - 2],
                buf[header_len - 1],
            ];
            apply_mask_fast(&mut payload, key);
        }
        Ok(Frame {
            fin: buf[0] & FIN_BIT != 0,
            opcode,
            payload,
        })
    }
}

/// Encodes one outbound frame.
///
/// The length field uses the shortest representation RFC 6455 allows. When
/// `mask` is `Some` (client role) the MASK bit is set, the key written after
/// the length, and the payload XORed in place.
#[must_use]
pub fn encode(fin: bool, opcode: OpCode, payload: &[u8], mask: Option<[u8; 4]>) -> Vec<u8> {
    let mask_bit = if mask.is_some() { MASK_BIT } else { 0 };
    let mut frame = Vec::with_capacity(payload.len() + 14);
    let mut first = opcode.as_u8();
    if fin {
        first |= FIN_BIT;
    }
    frame.push(first);
    if payload.len() < 126 {
        frame.push(payload.len() as u8 | mask_bit);
    } else if payload.len() < 65536 {
        frame.push(126 | mask_bit);
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    } else {
        frame.push(127 | mask_bit);
        frame.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    }
    match mask {
        Some(key) => {
            frame.extend_from_slice(&key);
            let payload_start = frame.len();
            frame.extend_from_slice(payload);
            apply_mask_fast(&mut frame[payload_start..], key);
        }
        None => frame.extend_from_slice(payload),
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_whole(buf: &[u8], role: Role) -> Result<(Frame, usize)> {
        let (header_len, payload_len) = probe(buf).expect("sizable");
        let total = header_len + payload_len;
        Frame::decode(&buf[..total], header_len, role).map(|frame| (frame, total))
    }

    #[test]
    fn test_decode_unmasked_text() {
        let buf = [0x81, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F];
        let (frame, consumed) = decode_whole(&buf, Role::Client).unwrap();
        assert_eq!(consumed, 7);
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.payload, b"Hello");
    }

    #[test]
    fn test_decode_masked_text() {
        // RFC 6455 §5.7: masked "Hello" under key 37 fa 21 3d.
        let buf = [
            0x81, 0x85, 0x37, 0xFA, 0x21, 0x3D, 0x7F, 0x9F, 0x4D, 0x51, 0x58,
        ];
        let (frame, consumed) = decode_whole(&buf, Role::Server).unwrap();
        assert_eq!(consumed, 11);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.payload, b"Hello");
    }

    #[test]
    fn test_decode_fragment_pair() {
        let first = [0x01, 0x03, 0x48, 0x65, 0x6C];
        let second = [0x80, 0x02, 0x6C, 0x6F];
        let (head, _) = decode_whole(&first, Role::Client).unwrap();
        assert!(!head.fin);
        assert_eq!(head.opcode, OpCode::Text);
        let (tail, _) = decode_whole(&second, Role::Client).unwrap();
        assert!(tail.fin);
        assert_eq!(tail.opcode, OpCode::Continuation);
    }

    #[test]
    fn test_probe_waits_for_header() {
        assert_eq!(probe(&[0x81]), None);
        assert_eq!(probe(&[0x82, 0x7E, 0x01]), None);
        assert_eq!(probe(&[0x82, 0x7F, 0, 0, 0, 0]), None);
    }

    #[test]
    fn test_probe_extended_lengths() {
        assert_eq!(probe(&[0x82, 0x7E, 0x01, 0x00]), Some((4, 256)));
        let mut long = vec![0x82, 0x7F];
        long.extend_from_slice(&65536u64.to_be_bytes());
        assert_eq!(probe(&long), Some((10, 65536)));
    }

    #[test]
    fn test_probe_counts_mask_key() {
        assert_eq!(probe(&[0x81, 0x85, 0, 0, 0, 0]), Some((6, 5)));
        assert_eq!(probe(&[0x81, 0xFE, 0x01, 0x00, 0, 0, 0, 0]), Some((8, 256)));
    }

    #[test]
    fn test_decode_rejects_reserved_bits() {
        let buf = [0xC1, 0x00];
        let (header_len, _) = probe(&buf).unwrap();
        assert_eq!(
            Frame::decode(&buf, header_len, Role::Client),
            Err(Error::ReservedBitsSet)
        );
    }

    #[test]
    fn test_decode_rejects_wrong_direction_masking() {
        let unmasked = [0x81, 0x00];
        let (header_len, _) = probe(&unmasked).unwrap();
        assert_eq!(
            Frame::decode(&unmasked, header_len, Role::Server),
            Err(Error::UnmaskedFrame)
        );

        let masked = [0x81, 0x80, 1, 2, 3, 4];
        let (header_len, _) = probe(&masked).unwrap();
        assert_eq!(
            Frame::decode(&masked, header_len, Role::Client),
            Err(Error::MaskedFrame)
        );
    }

    #[test]
    fn test_decode_rejects_unknown_opcode() {
        let buf = [0x83, 0x00];
        let (header_len, _) = probe(&buf).unwrap();
        assert_eq!(
            Frame::decode(&buf, header_len, Role::Client),
            Err(Error::UnknownOpcode(0x3))
        );
    }

    #[test]
    fn test_encode_short_length() {
        let frame = encode(true, OpCode::Text, b"Hello", None);
        assert_eq!(frame, [0x81, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F]);
    }

    #[test]
    fn test_encode_sixteen_bit_length() {
        let payload = vec![0xAB; 256];
        let frame = encode(true, OpCode::Binary, &payload, None);
        assert_eq!(&frame[..4], [0x82, 0x7E, 0x01, 0x00]);
        assert_eq!(frame.len(), 4 + 256);
    }

    #[test]
    fn test_encode_sixty_four_bit_length() {
        let payload = vec![0xCD; 65536];
        let frame = encode(true, OpCode::Binary, &payload, None);
        assert_eq!(frame[0], 0x82);
        assert_eq!(frame[1], 0x7F);
        assert_eq!(&frame[2..10], 65536u64.to_be_bytes());
        assert_eq!(frame.len(), 10 + 65536);
    }

    #[test]
    fn test_encode_length_boundaries() {
        assert_eq!(encode(true, OpCode::Binary, &[0; 125], None).len(), 2 + 125);
        assert_eq!(encode(true, OpCode::Binary, &[0; 126], None).len(), 4 + 126);
        assert_eq!(
            encode(true, OpCode::Binary, &[0; 65535], None).len(),
            4 + 65535
        );
    }

    #[test]
    fn test_encode_masked_matches_rfc_example() {
        let key = [0x37, 0xFA, 0x21, 0x3D];
        let frame = encode(true, OpCode::Text, b"Hello", Some(key));
        assert_eq!(
            frame,
            [0x81, 0x85, 0x37, 0xFA, 0x21, 0x3D, 0x7F, 0x9F, 0x4D, 0x51, 0x58]
        );
    }

    #[test]
    fn test_encode_fin_and_continuation_bits() {
        let frame = encode(false, OpCode::Continuation, b"x", None);
        assert_eq!(frame[0], 0x00);
        let frame = encode(true, OpCode::Continuation, b"x", None);
        assert_eq!(frame[0], 0x80);
    }

    #[test]
    fn test_masked_round_trip() {
        let key = [9, 8, 7, 6];
        let wire = encode(false, OpCode::Binary, &[0, 1, 2, 3, 4, 5, 6], Some(key));
        let (frame, consumed) = decode_whole(&wire, Role::Server).unwrap();
        assert_eq!(consumed, wire.len());
        assert!(!frame.fin);
        assert_eq!(frame.payload, [0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_empty_payload_round_trip() {
        let wire = encode(true, OpCode::Ping, &[], None);
        assert_eq!(wire, [0x89, 0x00]);
        let (frame, _) = decode_whole(&wire, Role::Client).unwrap();
        assert!(frame.payload.is_empty());
    }
}
