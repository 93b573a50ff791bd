//! Composition of complete wire frames.
//!
//! Keys and values in command frames are opaque ASCII; the protocol has
//! no escaping, so `=`, `\r` and `\n` must not appear in either (callers
//! only ever send fixed protocol vocabulary).

use crate::format::FormatId;
use crate::frame::{self, FrameError, PayloadKind, COMMAND_SUBHEADER_SIZE, DATA_SUBHEADER_SIZE};

/// Builds a data frame: pad byte, the 4-byte format token, then the audio
/// bytes. An empty `audio` slice produces the stream-announce frame, which
/// the host accepts without acknowledging.
pub fn data_frame(format: FormatId, audio: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut body = Vec::with_capacity(DATA_SUBHEADER_SIZE + FormatId::WIRE_SIZE + audio.len());
    body.push(0);
    body.extend_from_slice(&format.to_wire());
    body.extend_from_slice(audio);
    frame::encode(PayloadKind::Data, &body)
}

/// Builds a tag frame carrying a UTF-8 string.
pub fn tag_frame(text: &str) -> Result<Vec<u8>, FrameError> {
    let mut body = Vec::with_capacity(DATA_SUBHEADER_SIZE + text.len());
    body.push(0);
    body.extend_from_slice(text.as_bytes());
    frame::encode(PayloadKind::Tag, &body)
}

/// Builds a command frame from `key=value` header lines, in order.
pub fn command_frame<'a, I>(headers: I) -> Result<Vec<u8>, FrameError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    // Pad, dependency and weight are always zero on the client side.
    let mut body = vec![0u8; COMMAND_SUBHEADER_SIZE];
    for (key, value) in headers {
        body.extend_from_slice(key.as_bytes());
        body.push(b'=');
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    frame::encode(PayloadKind::Command, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{SampleKind, StreamFormat};
    use crate::frame::try_peel;

    #[test]
    fn data_frame_layout() {
        let format = StreamFormat::new(SampleKind::Signed16, 2, 44_100).unwrap();
        let bytes = data_frame(format.id(), &[1, 2, 3, 4]).unwrap();

        // length = pad + token + audio
        assert_eq!(bytes[..3], [0, 0, 9]);
        assert_eq!(bytes[3], 0);
        assert_eq!(bytes[9], 0);
        assert_eq!(bytes[10..14], format.id().to_wire());
        assert_eq!(bytes[14..], [1, 2, 3, 4]);
    }

    #[test]
    fn announce_frame_is_token_only() {
        let format = StreamFormat::new(SampleKind::Signed16, 2, 44_100).unwrap();
        let bytes = data_frame(format.id(), &[]).unwrap();
        assert_eq!(bytes.len(), 9 + 1 + 4);
    }

    #[test]
    fn tag_frame_layout() {
        let bytes = tag_frame("03 Nocturne").unwrap();
        let peeled = try_peel(&bytes).unwrap().unwrap();
        assert_eq!(peeled.kind, PayloadKind::Tag);
        assert_eq!(peeled.body, *b"03 Nocturne");
    }

    #[test]
    fn command_frame_layout() {
        let bytes = command_frame([("Seek", "+60")]).unwrap();
        let peeled = try_peel(&bytes).unwrap().unwrap();
        assert_eq!(peeled.kind, PayloadKind::Command);
        assert_eq!(peeled.body, *b"Seek=+60\r\n");

        // The sub-header rides inside the declared length.
        assert_eq!(bytes[..3], [0, 0, 16]);
        assert_eq!(bytes[9..15], [0; 6]);
    }

    #[test]
    fn command_frame_preserves_order() {
        let bytes = command_frame([("A", "1"), ("B", ""), ("A", "2")]).unwrap();
        let peeled = try_peel(&bytes).unwrap().unwrap();
        assert_eq!(peeled.body, *b"A=1\r\nB=\r\nA=2\r\n");
    }
}
