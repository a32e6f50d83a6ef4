//! Wire format encoding and decoding.
//!
//! Every message on the stream is framed as:
//! ```text
//! ┌──────────────┬───────────────┐
//! │ Length       │ Payload       │
//! │ 4 bytes      │ L bytes       │
//! │ uint32 BE    │               │
//! └──────────────┴───────────────┘
//! ```
//!
//! There is no handshake, version byte, or checksum; frames repeat
//! back-to-back for the life of the connection. The length prefix is
//! Big Endian.

/// Length prefix size in bytes (fixed, exactly 4).
pub const PREFIX_SIZE: usize = 4;

/// Default maximum accepted inbound payload size (1 GiB).
///
/// The 32-bit prefix allows up to ~4 GiB; inbound declared lengths are bounded
/// defensively so a corrupt or hostile peer cannot force an arbitrary
/// allocation.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 1_073_741_824;

/// Encode a payload length as a Big Endian prefix.
///
/// # Example
///
/// ```
/// use framewire::protocol::encode_prefix;
///
/// assert_eq!(encode_prefix(5), [0, 0, 0, 5]);
/// ```
#[inline]
pub fn encode_prefix(len: u32) -> [u8; PREFIX_SIZE] {
    len.to_be_bytes()
}

/// Decode a Big Endian length prefix.
///
/// Returns `None` if the buffer is too short.
///
/// # Example
///
/// ```
/// use framewire::protocol::decode_prefix;
///
/// assert_eq!(decode_prefix(&[0, 0, 1, 0]), Some(256));
/// assert_eq!(decode_prefix(&[0, 0, 1]), None);
/// ```
#[inline]
pub fn decode_prefix(buf: &[u8]) -> Option<u32> {
    if buf.len() < PREFIX_SIZE {
        return None;
    }
    Some(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

/// Build a complete frame as a single byte vector.
///
/// Encodes the length prefix and appends the payload into one contiguous
/// buffer so it can be sent with a single write.
///
/// The payload length must fit in 32 bits; callers validate before framing.
///
/// # Example
///
/// ```
/// use framewire::protocol::{build_frame, PREFIX_SIZE};
///
/// let bytes = build_frame(b"hello");
/// assert_eq!(bytes.len(), PREFIX_SIZE + 5);
/// ```
pub fn build_frame(payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= u32::MAX as usize);
    let mut buf = Vec::with_capacity(PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&encode_prefix(payload.len() as u32));
    buf.extend_from_slice(payload);
    buf
}
