//! Receive-side reassembly and command header parsing.

use crate::frame::{self, FrameError, PayloadKind};

/// An ordered list of `(key, value)` header pairs from a command frame.
///
/// Hosts may repeat a key (the tag list is delivered as one `Tag` header
/// per track), so this is deliberately a sequence and not a map:
/// duplicates are kept and insertion order is preserved.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct HeaderList {
    pairs: Vec<(String, String)>,
}

impl HeaderList {
    /// Parses the body of a command frame (sub-header already stripped).
    ///
    /// Lines end at `\r` or `\n`; either terminator is consumed on its
    /// own, so `\r\n` simply produces one empty line in between, which is
    /// dropped along with every other pair whose key is empty. Within a
    /// line, the first `=` separates key from value. A trailing line
    /// without a terminator still yields its pair.
    pub fn parse(body: &[u8]) -> Self {
        // Keys are protocol vocabulary (ASCII); values may carry UTF-8
        // track titles, so both sides accumulate as raw bytes.
        let mut pairs = Vec::new();
        let mut key = Vec::new();
        let mut value = Vec::new();
        let mut in_value = false;

        let mut flush = |key: &mut Vec<u8>, value: &mut Vec<u8>| {
            if !key.is_empty() {
                pairs.push((
                    String::from_utf8_lossy(key).into_owned(),
                    String::from_utf8_lossy(value).into_owned(),
                ));
            }
            key.clear();
            value.clear();
        };

        for &byte in body {
            match byte {
                b'\r' | b'\n' => {
                    flush(&mut key, &mut value);
                    in_value = false;
                }
                b'=' if !in_value => in_value = true,
                _ if in_value => value.push(byte),
                _ => key.push(byte),
            }
        }
        flush(&mut key, &mut value);

        Self { pairs }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The value of the first header named `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Assembles frames from a growing receive buffer.
///
/// Bytes go in with [`extend_from_slice`](Self::extend_from_slice) as
/// they arrive from the transport; [`poll`](Self::poll) then drains as
/// many whole frames as are present, peeling consumed bytes off the
/// front. Partial frames stay buffered until more bytes arrive.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: Vec<u8>,
}

impl FrameAssembler {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes buffered, including any incomplete trailing frame.
    #[inline(always)]
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Drains every complete frame, invoking `handle` with the kind and
    /// the body (sub-header stripped) of each.
    ///
    /// On a protocol error the buffer contents are poisoned and the
    /// connection must be dropped; the assembler keeps the offending
    /// bytes so repeated polls keep failing rather than resynchronize on
    /// garbage.
    pub fn poll<F>(&mut self, mut handle: F) -> Result<(), FrameError>
    where
        F: FnMut(PayloadKind, &[u8]),
    {
        let mut consumed = 0;
        while let Some(peeled) = frame::try_peel(&self.buf[consumed..])? {
            handle(peeled.kind, peeled.body);
            consumed += peeled.advance;
        }
        self.buf.drain(..consumed);
        Ok(())
    }
}
