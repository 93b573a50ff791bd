//! Payload frame codec: encoding frames onto a byte stream and peeling
//! whole frames back off it.
//!
//! See the crate docs for the wire layout. This module deals only in raw
//! frame boundaries; header-line parsing lives in [`crate::headers`] and
//! body composition in [`crate::message`].

use core::fmt;

/// Size of the fixed payload header.
pub const PAYLOAD_HEADER_SIZE: usize = 9;
/// Size of the data/tag sub-header (one pad byte).
pub const DATA_SUBHEADER_SIZE: usize = 1;
/// Size of the command sub-header (pad + dependency + weight).
pub const COMMAND_SUBHEADER_SIZE: usize = 6;

/// Largest body the 24-bit length field can describe.
pub const MAX_BODY_LEN: usize = 0x00FF_FFFF;

/// The three payload kinds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PayloadKind {
    Data,
    Command,
    Tag,
}

impl PayloadKind {
    #[inline(always)]
    pub const fn to_byte(self) -> u8 {
        match self {
            PayloadKind::Data => 0,
            PayloadKind::Command => 1,
            PayloadKind::Tag => 2,
        }
    }

    #[inline(always)]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => PayloadKind::Data,
            1 => PayloadKind::Command,
            2 => PayloadKind::Tag,
            _ => return None,
        })
    }

    /// Size of the sub-header that follows the payload header.
    #[inline(always)]
    pub const fn subheader_size(self) -> usize {
        match self {
            PayloadKind::Data | PayloadKind::Tag => DATA_SUBHEADER_SIZE,
            PayloadKind::Command => COMMAND_SUBHEADER_SIZE,
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PayloadKind::Data => "data",
            PayloadKind::Command => "command",
            PayloadKind::Tag => "tag",
        })
    }
}

/// Protocol violations. All of these are fatal: the connection carrying
/// the offending bytes must be closed, since frame boundaries can no
/// longer be trusted.
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum FrameError {
    #[error("unknown payload kind {0:#04x}")]
    UnknownKind(u8),
    #[error("frame length {0} is shorter than its sub-header")]
    Truncated(u32),
    #[error("frame body of {0} bytes exceeds the 24-bit length field")]
    Oversize(usize),
}

/// The fixed 9-byte header prefixing every frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PayloadHeader {
    /// Bytes after the header (sub-header + body). Only 24 bits are
    /// representable.
    pub length: u32,
    pub kind: PayloadKind,
    pub flags: u8,
    pub identifier: u32,
}

impl PayloadHeader {
    /// Header for a frame of `kind` with everything else zeroed, which is
    /// what this client always sends.
    #[inline(always)]
    pub const fn new(kind: PayloadKind, length: u32) -> Self {
        Self {
            length,
            kind,
            flags: 0,
            identifier: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; PAYLOAD_HEADER_SIZE] {
        let len = self.length.to_be_bytes();
        let id = self.identifier.to_be_bytes();
        [
            len[1],
            len[2],
            len[3],
            self.kind.to_byte(),
            self.flags,
            id[0],
            id[1],
            id[2],
            id[3],
        ]
    }

    pub fn parse(bytes: &[u8; PAYLOAD_HEADER_SIZE]) -> Result<Self, FrameError> {
        let kind = PayloadKind::from_byte(bytes[3]).ok_or(FrameError::UnknownKind(bytes[3]))?;
        Ok(Self {
            length: u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]),
            kind,
            flags: bytes[4],
            identifier: u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]),
        })
    }
}

/// Prepends the payload header to `body` (sub-header included in `body`).
///
/// Fails only when `body` overflows the 24-bit length field.
pub fn encode(kind: PayloadKind, body: &[u8]) -> Result<Vec<u8>, FrameError> {
    if body.len() > MAX_BODY_LEN {
        return Err(FrameError::Oversize(body.len()));
    }

    let header = PayloadHeader::new(kind, body.len() as u32);
    let mut out = Vec::with_capacity(PAYLOAD_HEADER_SIZE + body.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(body);
    Ok(out)
}

/// One frame peeled off the front of a receive buffer.
#[derive(Clone, Copy, Debug)]
pub struct Peeled<'a> {
    pub kind: PayloadKind,
    /// Frame body with the sub-header already stripped.
    pub body: &'a [u8],
    /// Total bytes to drop from the front of the buffer.
    pub advance: usize,
}

/// Attempts to peel one whole frame off the front of `buf`.
///
/// Returns `Ok(None)` while the buffer holds less than a complete frame;
/// the buffer is never modified. A frame whose kind byte is unknown, or
/// whose declared length cannot even hold its own sub-header, is a fatal
/// protocol error.
pub fn try_peel(buf: &[u8]) -> Result<Option<Peeled<'_>>, FrameError> {
    let Some((header, rest)) = buf.split_first_chunk::<PAYLOAD_HEADER_SIZE>() else {
        return Ok(None);
    };

    let header = PayloadHeader::parse(header)?;
    let length = header.length as usize;
    if rest.len() < length {
        return Ok(None);
    }

    let sub = header.kind.subheader_size();
    if length < sub {
        return Err(FrameError::Truncated(header.length));
    }

    Ok(Some(Peeled {
        kind: header.kind,
        body: &rest[sub..length],
        advance: PAYLOAD_HEADER_SIZE + length,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_command() {
        // 6-byte zero sub-header followed by one header line.
        let mut body = vec![0u8; COMMAND_SUBHEADER_SIZE];
        body.extend_from_slice(b"Play=\r\n");

        let bytes = encode(PayloadKind::Command, &body).unwrap();
        assert_eq!(bytes.len(), 9 + 6 + 7);

        let peeled = try_peel(&bytes).unwrap().unwrap();
        assert_eq!(peeled.kind, PayloadKind::Command);
        assert_eq!(peeled.body, *b"Play=\r\n");
        assert_eq!(peeled.advance, bytes.len());
    }

    #[test]
    fn round_trip_data() {
        let mut body = vec![0u8; DATA_SUBHEADER_SIZE];
        body.extend_from_slice(&[0xAA, 0xBB, 0xCC]);

        let bytes = encode(PayloadKind::Data, &body).unwrap();
        let peeled = try_peel(&bytes).unwrap().unwrap();
        assert_eq!(peeled.kind, PayloadKind::Data);
        assert_eq!(peeled.body, [0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn header_layout_is_big_endian() {
        let header = PayloadHeader {
            length: 0x01_02_03,
            kind: PayloadKind::Tag,
            flags: 0x7F,
            identifier: 0xDEAD_BEEF,
        };
        assert_eq!(
            header.to_bytes(),
            [0x01, 0x02, 0x03, 2, 0x7F, 0xDE, 0xAD, 0xBE, 0xEF]
        );
        assert_eq!(PayloadHeader::parse(&header.to_bytes()).unwrap(), header);
    }

    #[test]
    fn incomplete_frames_leave_buffer_alone() {
        let bytes = encode(PayloadKind::Tag, &[0, b'a']).unwrap();

        // Every strict prefix is incomplete.
        for n in 0..bytes.len() {
            assert!(try_peel(&bytes[..n]).unwrap().is_none());
        }
        assert!(try_peel(&bytes).unwrap().is_some());
    }

    #[test]
    fn unknown_kind_is_fatal() {
        let mut bytes = encode(PayloadKind::Data, &[0]).unwrap();
        bytes[3] = 7;
        assert_eq!(try_peel(&bytes).unwrap_err(), FrameError::UnknownKind(7));
    }

    #[test]
    fn undersized_command_length_is_fatal() {
        // A command frame must carry at least its 6-byte sub-header.
        let bytes = encode(PayloadKind::Command, &[0; 2]).unwrap();
        assert_eq!(try_peel(&bytes).unwrap_err(), FrameError::Truncated(2));
    }
}
