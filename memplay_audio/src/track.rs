//! The per-file decoder handle.

use std::fs;
use std::io::{self, Read, Seek};
use std::path::Path;

use memplay_proto::format::{ChannelCount, SampleKind, StreamFormat};

use crate::dff::DffWalk;
use crate::dsd::{BitPacker, MAX_CHANNELS};
use crate::dsf::DsfState;
use crate::{aiff, dsf, id3, m4a, normalize, riff, TrackError};

/// Harvested metadata, before fallbacks.
#[derive(Debug, Default)]
pub(crate) struct Meta {
    pub title: String,
    /// 1-based track index; 0 means unknown.
    pub index: u32,
}

/// Container-specific read state.
#[derive(Debug)]
enum Container {
    Pcm { data_remaining: u32 },
    Aiff { data_remaining: u32 },
    Dsf(DsfState),
    Dff(DffWalk),
    M4a,
}

/// One opened audio file.
///
/// `Track` identifies the container from its magic at open time, parses
/// format and metadata up front, and then streams audio bytes on demand
/// through [`read`](Self::read). DSD containers need a [`BitPacker`] to
/// carry partial 32-bit words across reads (and across tracks — hand the
/// same packer to every track of an upload).
#[derive(Debug)]
pub struct Track<R> {
    src: R,
    container: Container,
    /// Declared stream format; `None` for metadata-only containers (M4A).
    format: Option<StreamFormat>,
    /// Set when open-time normalization widens the output to stereo
    /// signed-32.
    widened: Option<StreamFormat>,
    title: String,
    index: u32,
    end_of_stream: bool,
}

impl Track<io::BufReader<fs::File>> {
    /// Opens a file, dispatching on its magic.
    ///
    /// With `normalize` set, signed PCM under 32 bits with at most two
    /// channels is widened to stereo signed-32 on every read; all other
    /// inputs stream in their declared format.
    pub fn open(path: impl AsRef<Path>, normalize: bool) -> Result<Self, TrackError> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = fs::File::open(path)?;
        Self::from_reader(io::BufReader::new(file), &stem, normalize)
    }
}

impl<R: Read + Seek> Track<R> {
    /// As [`open`](Track::open), over any seekable byte source. `name`
    /// stands in for the filename stem in the metadata fallbacks.
    pub fn from_reader(mut src: R, name: &str, normalize: bool) -> Result<Self, TrackError> {
        let mut meta = Meta::default();

        let mut magic = crate::bytes::read_4cc(&mut src)?;
        if magic[..3] == *b"ID3" {
            // A tag precedes the container; consume it, then re-read the
            // audio magic.
            let version = magic[3];
            if version != 3 && version != 4 {
                return Err(TrackError::Unsupported("ID3 tag version"));
            }
            id3::read_tag(&mut src, version, &mut meta)?;
            magic = crate::bytes::read_4cc(&mut src)?;
        }

        let (container, format) = match &magic {
            b"RIFF" => {
                let format = riff::open(&mut src, &mut meta)?;
                (Container::Pcm { data_remaining: 0 }, Some(format))
            }
            b"DSD " => {
                let (state, format) = dsf::open(&mut src, &mut meta)?;
                (Container::Dsf(state), Some(format))
            }
            b"FRM8" => {
                let (walk, format) = crate::dff::open(&mut src, &mut meta)?;
                (Container::Dff(walk), Some(format))
            }
            b"FORM" => {
                let format = aiff::open(&mut src, &mut meta)?;
                (Container::Aiff { data_remaining: 0 }, Some(format))
            }
            _ => {
                m4a::open(&mut src, magic, &mut meta)?;
                (Container::M4a, None)
            }
        };

        let widened = match format {
            Some(f)
                if normalize
                    && f.kind.is_signed()
                    && f.kind.width().get() < 4
                    && f.channels.get() <= 2 =>
            {
                Some(StreamFormat {
                    kind: SampleKind::Signed32,
                    channels: ChannelCount::STEREO,
                    ..f
                })
            }
            _ => None,
        };

        let mut index = meta.index;
        if index == 0 {
            index = front_index(&meta.title);
        }
        if index == 0 {
            index = front_index(name);
        }
        let title = if meta.title.is_empty() {
            name.to_owned()
        } else {
            meta.title
        };

        Ok(Self {
            src,
            container,
            format,
            widened,
            title,
            index,
            end_of_stream: false,
        })
    }

    /// The format audio leaves [`read`](Self::read) in: the normalized
    /// layout when widening is active, otherwise the declared one.
    /// `None` for metadata-only containers.
    #[inline(always)]
    pub fn format(&self) -> Option<StreamFormat> {
        self.widened.or(self.format)
    }

    /// The format declared by the container, before normalization.
    #[inline(always)]
    pub fn source_format(&self) -> Option<StreamFormat> {
        self.format
    }

    #[inline(always)]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// 1-based track index; 0 when unknown.
    #[inline(always)]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Whether the audio stream has been exhausted.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.end_of_stream
    }

    /// Reads up to `target_bytes` of audio in the output format.
    ///
    /// `target_bytes` counts *output* bytes: normalized units when
    /// widening is active, assembled 32-bit words for DSD. A short or
    /// empty buffer is not an error; once the stream is exhausted,
    /// [`is_empty`](Self::is_empty) reports true and further reads yield
    /// empty buffers.
    pub fn read(
        &mut self,
        target_bytes: usize,
        packer: &mut BitPacker,
    ) -> Result<Vec<u8>, TrackError> {
        if self.end_of_stream || target_bytes == 0 {
            return Ok(Vec::new());
        }
        match self.container {
            Container::Pcm { .. } => self.read_pcm(target_bytes),
            Container::Aiff { .. } => self.read_aiff(target_bytes),
            Container::Dsf(_) => self.read_dsf(target_bytes, packer),
            Container::Dff(_) => self.read_dff(target_bytes, packer),
            Container::M4a => {
                self.end_of_stream = true;
                Ok(Vec::new())
            }
        }
    }

    /// Converts an output-unit byte budget back to source units.
    fn source_target(&self, target: usize) -> usize {
        match (self.format, self.widened) {
            (Some(source), Some(widened)) => {
                target * source.frame_size() / widened.frame_size()
            }
            _ => target,
        }
    }

    fn read_pcm(&mut self, target: usize) -> Result<Vec<u8>, TrackError> {
        let target = self.source_target(target);
        let Container::Pcm { data_remaining } = &mut self.container else {
            return Ok(Vec::new());
        };

        if *data_remaining == 0 {
            match riff::next_data_chunk(&mut self.src)? {
                Some(size) => *data_remaining = size,
                None => {
                    self.end_of_stream = true;
                    return Ok(Vec::new());
                }
            }
        }

        let take = target.min(*data_remaining as usize);
        let mut buf = vec![0u8; take];
        self.src.read_exact(&mut buf)?;
        *data_remaining -= take as u32;

        Ok(self.widen(buf))
    }

    fn read_aiff(&mut self, target: usize) -> Result<Vec<u8>, TrackError> {
        let target = self.source_target(target);
        let width = match self.format {
            Some(f) => f.kind.width().get() as usize,
            None => return Ok(Vec::new()),
        };
        let Container::Aiff { data_remaining } = &mut self.container else {
            return Ok(Vec::new());
        };

        if *data_remaining == 0 {
            match aiff::next_sound_chunk(&mut self.src)? {
                Some(size) => *data_remaining = size,
                None => {
                    self.end_of_stream = true;
                    return Ok(Vec::new());
                }
            }
        }

        let take = target.min(*data_remaining as usize);
        let mut buf = vec![0u8; take];
        self.src.read_exact(&mut buf)?;
        *data_remaining -= take as u32;

        // Sample bytes are big-endian on disk.
        normalize::swap_to_le(&mut buf, width);
        Ok(self.widen(buf))
    }

    fn widen(&self, buf: Vec<u8>) -> Vec<u8> {
        match (self.format, self.widened) {
            (Some(source), Some(_)) => normalize::widen_to_stereo32(
                &buf,
                source.kind.width().get() as usize,
                source.channels.get(),
            ),
            _ => buf,
        }
    }

    fn read_dsf(
        &mut self,
        mut target: usize,
        packer: &mut BitPacker,
    ) -> Result<Vec<u8>, TrackError> {
        let Container::Dsf(state) = &mut self.container else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(target);

        while target > 0 {
            if state.data_remaining == 0 {
                match dsf::next_data_chunk(&mut self.src)? {
                    Some(size) => state.data_remaining = size,
                    None => {
                        self.end_of_stream = true;
                        return Ok(out);
                    }
                }
            }

            if state.block_remaining == 0 {
                let need = state.block.len();
                if state.data_remaining < need as u64 {
                    self.end_of_stream = true;
                    return Err(TrackError::Malformed("truncated DSF audio data"));
                }
                self.src.read_exact(&mut state.block)?;
                state.data_remaining -= need as u64;
                state.block_remaining = need;
            }

            let span = target.min(state.block_remaining);
            let columns = span / state.channels;
            if columns == 0 {
                break;
            }

            let mut column = [0u8; MAX_CHANNELS];
            for _ in 0..columns {
                let offset = (state.block.len() - state.block_remaining) / state.channels;
                for (c, byte) in column[..state.channels].iter_mut().enumerate() {
                    *byte = state.block[state.block_size * c + offset];
                }

                if state.samples_remaining < 8 {
                    // Fewer than a byte's worth of samples left: hand the
                    // residue to the packer and stop reading audio bytes.
                    if state.samples_remaining != 0 {
                        packer.push_lsb(&column[..state.channels], state.samples_remaining as u32);
                        state.samples_remaining = 0;
                    }
                    state.block_remaining = 0;
                    state.data_remaining = 0;
                    self.end_of_stream = true;
                    return Ok(out);
                }

                packer.push_lsb(&column[..state.channels], 8);
                if packer.take_words(&mut out) {
                    target = target.saturating_sub(4 * state.channels);
                }
                state.block_remaining -= state.channels;
                state.samples_remaining -= 8;
            }
        }
        Ok(out)
    }

    fn read_dff(&mut self, target: usize, packer: &mut BitPacker) -> Result<Vec<u8>, TrackError> {
        let channels = match self.format {
            Some(f) => f.channels.get(),
            None => return Ok(Vec::new()),
        };
        if target % (channels * 4) != 0 {
            return Err(TrackError::Malformed("DSD read size not word-aligned"));
        }
        let Container::Dff(walk) = &mut self.container else {
            return Ok(Vec::new());
        };

        let available = match walk.next_audio(&mut self.src)? {
            Some(n) => n,
            None => {
                self.end_of_stream = true;
                return Ok(Vec::new());
            }
        };
        if available % channels as u64 != 0 {
            return Err(TrackError::Malformed("DSD body not channel-aligned"));
        }

        let len = usize::try_from(available)
            .unwrap_or(usize::MAX)
            .min(target);
        let mut raw = vec![0u8; len];
        self.src.read_exact(&mut raw)?;

        let mut out = Vec::with_capacity(len + 4 * channels);
        for column in raw.chunks_exact(channels) {
            packer.push_msb(column, 8);
            packer.take_words(&mut out);
        }
        walk.consume(len as u64);
        Ok(out)
    }
}

/// Track-index fallback: one or two leading decimal digits of a title
/// or filename stem.
fn front_index(s: &str) -> u32 {
    let mut chars = s.chars();
    let Some(first) = chars.next().and_then(|c| c.to_digit(10)) else {
        return 0;
    };
    match chars.next().and_then(|c| c.to_digit(10)) {
        Some(second) => first * 10 + second,
        None => first,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memplay_proto::format::{DsdBitOrder, DsdWordOrder};
    use std::io::Cursor;

    fn track(bytes: &[u8], name: &str, normalize: bool) -> Track<Cursor<Vec<u8>>> {
        Track::from_reader(Cursor::new(bytes.to_vec()), name, normalize).unwrap()
    }

    fn read_all(track: &mut Track<Cursor<Vec<u8>>>, packer: &mut BitPacker) -> Vec<u8> {
        let mut out = Vec::new();
        while !track.is_empty() {
            let chunk = track.read(1 << 16, packer).unwrap();
            if chunk.is_empty() && track.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }
        out
    }

    fn pcm_packer() -> BitPacker {
        let f = StreamFormat::new(SampleKind::Signed16, 2, 44_100).unwrap();
        BitPacker::new(&f).unwrap()
    }

    // --- synthetic containers ---------------------------------------

    fn wav(channels: u16, width: u16, fmt_type: u16, extra: &[u8], data: &[u8]) -> Vec<u8> {
        let mut f = b"RIFF".to_vec();
        f.extend_from_slice(&0u32.to_le_bytes());
        f.extend_from_slice(b"WAVEfmt ");
        f.extend_from_slice(&16u32.to_le_bytes());
        f.extend_from_slice(&fmt_type.to_le_bytes());
        f.extend_from_slice(&channels.to_le_bytes());
        f.extend_from_slice(&44_100u32.to_le_bytes());
        f.extend_from_slice(&(44_100 * u32::from(width * channels)).to_le_bytes());
        f.extend_from_slice(&(width * channels).to_le_bytes());
        f.extend_from_slice(&(width * 8).to_le_bytes());
        f.extend_from_slice(extra);
        f.extend_from_slice(b"data");
        f.extend_from_slice(&(data.len() as u32).to_le_bytes());
        f.extend_from_slice(data);
        f
    }

    fn list_info(title: &[u8], index: u16) -> Vec<u8> {
        let mut body = b"INFO".to_vec();
        body.extend_from_slice(b"INAM");
        body.extend_from_slice(&(title.len() as u32).to_le_bytes());
        body.extend_from_slice(title);
        if title.len() % 2 == 1 {
            body.push(0);
        }
        body.extend_from_slice(b"ITRK");
        body.extend_from_slice(&2u32.to_le_bytes());
        body.extend_from_slice(&index.to_le_bytes());

        let mut out = b"LIST".to_vec();
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    fn id3_title_tag(title: &str) -> Vec<u8> {
        let mut frame = b"TIT2".to_vec();
        frame.extend_from_slice(&(title.len() as u32 + 1).to_be_bytes());
        frame.extend_from_slice(&[0, 0, 3]);
        frame.extend_from_slice(title.as_bytes());

        let mut tag = vec![b'I', b'D', b'3', 3, 0, 0];
        let len = frame.len() as u32;
        tag.extend_from_slice(&[
            (len >> 21) as u8,
            (len >> 14) as u8 & 0x7F,
            (len >> 7) as u8 & 0x7F,
            len as u8 & 0x7F,
        ]);
        tag.extend_from_slice(&frame);
        tag
    }

    fn dsf(channels: u32, block_size: u32, samples: u64, audio: &[u8]) -> Vec<u8> {
        let mut f = b"DSD ".to_vec();
        f.extend_from_slice(&28u64.to_le_bytes());
        f.extend_from_slice(&0u64.to_le_bytes());
        f.extend_from_slice(&0u64.to_le_bytes());
        f.extend_from_slice(b"fmt ");
        f.extend_from_slice(&52u64.to_le_bytes());
        f.extend_from_slice(&1u32.to_le_bytes());
        f.extend_from_slice(&0u32.to_le_bytes());
        f.extend_from_slice(&2u32.to_le_bytes());
        f.extend_from_slice(&channels.to_le_bytes());
        f.extend_from_slice(&2_822_400u32.to_le_bytes());
        f.extend_from_slice(&1u32.to_le_bytes());
        f.extend_from_slice(&samples.to_le_bytes());
        f.extend_from_slice(&block_size.to_le_bytes());
        f.extend_from_slice(&0u32.to_le_bytes());
        f.extend_from_slice(b"data");
        f.extend_from_slice(&(12 + audio.len() as u64).to_le_bytes());
        f.extend_from_slice(audio);
        f
    }

    fn dff(rate: u32, channels: u16, body: &[u8]) -> Vec<u8> {
        let mut prop = b"SND ".to_vec();
        prop.extend_from_slice(b"FS  ");
        prop.extend_from_slice(&4u64.to_be_bytes());
        prop.extend_from_slice(&rate.to_be_bytes());
        prop.extend_from_slice(b"CHNL");
        prop.extend_from_slice(&(2 + 4 * u64::from(channels)).to_be_bytes());
        prop.extend_from_slice(&channels.to_be_bytes());
        for _ in 0..channels {
            prop.extend_from_slice(b"SLFT");
        }

        let mut chunks = b"FVER".to_vec();
        chunks.extend_from_slice(&4u64.to_be_bytes());
        chunks.extend_from_slice(&0x0105_0000u32.to_be_bytes());
        chunks.extend_from_slice(b"PROP");
        chunks.extend_from_slice(&(prop.len() as u64).to_be_bytes());
        chunks.extend_from_slice(&prop);
        chunks.extend_from_slice(b"DSD ");
        chunks.extend_from_slice(&(body.len() as u64).to_be_bytes());
        chunks.extend_from_slice(body);

        let mut f = b"FRM8".to_vec();
        f.extend_from_slice(&(4 + chunks.len() as u64).to_be_bytes());
        f.extend_from_slice(b"DSD ");
        f.extend_from_slice(&chunks);
        f
    }

    fn aiff(channels: u16, bits: u16, samples_be: &[u8]) -> Vec<u8> {
        let mut f = b"FORM".to_vec();
        f.extend_from_slice(&0u32.to_be_bytes());
        f.extend_from_slice(b"AIFF");
        f.extend_from_slice(b"COMM");
        f.extend_from_slice(&18u32.to_be_bytes());
        f.extend_from_slice(&channels.to_be_bytes());
        f.extend_from_slice(&0u32.to_be_bytes());
        f.extend_from_slice(&bits.to_be_bytes());
        f.extend_from_slice(&0x400Eu16.to_be_bytes());
        f.extend_from_slice(&0xAC44_0000_0000_0000u64.to_be_bytes());
        f.extend_from_slice(b"SSND");
        f.extend_from_slice(&(samples_be.len() as u32).to_be_bytes());
        f.extend_from_slice(samples_be);
        f
    }

    fn atom(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(id);
        out.extend_from_slice(body);
        out
    }

    // --- RIFF/WAV ----------------------------------------------------

    #[test]
    fn wav_format_and_info_metadata() {
        let bytes = wav(2, 2, 1, &list_info(b"Blue in Green", 3), &[0; 8]);
        let t = track(&bytes, "file", false);

        let f = t.format().unwrap();
        assert_eq!(f.kind, SampleKind::Signed16);
        assert_eq!(f.channels.get(), 2);
        assert_eq!(f.rate.get(), 44_100);
        assert_eq!(t.title(), "Blue in Green");
        assert_eq!(t.index(), 3);
    }

    #[test]
    fn wav_float32_detected_by_format_tag() {
        let bytes = wav(2, 4, 3, &[], &[0; 8]);
        assert_eq!(
            track(&bytes, "f", false).format().unwrap().kind,
            SampleKind::Float32
        );
        let bytes = wav(2, 4, 1, &[], &[0; 8]);
        assert_eq!(
            track(&bytes, "f", false).format().unwrap().kind,
            SampleKind::Signed32
        );
    }

    #[test]
    fn wav_reads_exactly_the_data_chunk() {
        let mut bytes = wav(2, 2, 1, &[], &[0x11; 12]);
        // Trailing sibling chunk that must never be streamed.
        bytes.extend_from_slice(b"pad ");
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&[0xEE; 4]);

        let mut t = track(&bytes, "f", false);
        let audio = read_all(&mut t, &mut pcm_packer());
        assert_eq!(audio, [0x11; 12]);
    }

    #[test]
    fn wav_data_chunk_found_lazily_behind_junk() {
        let mut extra = b"junk".to_vec();
        extra.extend_from_slice(&6u32.to_le_bytes());
        extra.extend_from_slice(&[0xEE; 6]);

        let bytes = wav(1, 2, 1, &extra, &[0x22; 4]);
        let mut t = track(&bytes, "f", false);
        assert_eq!(read_all(&mut t, &mut pcm_packer()), [0x22; 4]);
    }

    #[test]
    fn zero_length_data_chunk_is_clean_end_of_stream() {
        let bytes = wav(2, 2, 1, &[], &[]);
        let mut t = track(&bytes, "f", false);

        let buf = t.read(4096, &mut pcm_packer()).unwrap();
        assert!(buf.is_empty());
        assert!(t.is_empty());
    }

    #[test]
    fn mono16_normalizes_to_stereo32() {
        // One sample, 0x1234 little-endian.
        let bytes = wav(1, 2, 1, &[], &[0x34, 0x12]);
        let mut t = track(&bytes, "f", true);

        let f = t.format().unwrap();
        assert_eq!((f.kind, f.channels.get()), (SampleKind::Signed32, 2));
        assert_eq!(t.source_format().unwrap().channels.get(), 1);

        // 8 normalized bytes convert to 2 source bytes before I/O.
        let buf = t.read(8, &mut pcm_packer()).unwrap();
        assert_eq!(buf, [0x00, 0x00, 0x34, 0x12, 0x00, 0x00, 0x34, 0x12]);
    }

    #[test]
    fn stereo32_is_left_untouched_by_normalization() {
        let bytes = wav(2, 4, 1, &[], &[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut t = track(&bytes, "f", true);

        // Already in the host layout: the flag must not activate.
        assert_eq!(t.format(), t.source_format());
        let buf = t.read(8, &mut pcm_packer()).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn float_input_is_never_widened() {
        let bytes = wav(1, 4, 3, &[], &[0; 4]);
        let t = track(&bytes, "f", true);
        assert_eq!(t.format().unwrap().kind, SampleKind::Float32);
        assert_eq!(t.format().unwrap().channels.get(), 1);
    }

    #[test]
    fn leading_id3_tag_is_consumed_before_the_magic() {
        let mut bytes = id3_title_tag("Prelude");
        bytes.extend_from_slice(&wav(2, 2, 1, &[], &[0x55; 4]));

        let mut t = track(&bytes, "f", false);
        assert_eq!(t.title(), "Prelude");
        assert_eq!(read_all(&mut t, &mut pcm_packer()), [0x55; 4]);
    }

    // --- metadata fallbacks ------------------------------------------

    #[test]
    fn title_falls_back_to_the_stem() {
        let bytes = wav(2, 2, 1, &[], &[]);
        let t = track(&bytes, "07 Koln Concert", false);
        assert_eq!(t.title(), "07 Koln Concert");
        assert_eq!(t.index(), 7);
    }

    #[test]
    fn index_falls_back_to_title_digits() {
        let bytes = wav(2, 2, 1, &list_info(b"12 Impressions", 0), &[]);
        let t = track(&bytes, "file", false);
        assert_eq!(t.index(), 12);
    }

    // --- AIFF ---------------------------------------------------------

    #[test]
    fn aiff_byte_swaps_and_normalizes() {
        // One stereo frame of 16-bit big-endian samples.
        let bytes = aiff(2, 16, &[0x12, 0x34, 0x56, 0x78]);
        let mut t = track(&bytes, "f", true);

        let f = t.format().unwrap();
        assert_eq!(f.rate.get(), 44_100);
        assert_eq!((f.kind, f.channels.get()), (SampleKind::Signed32, 2));

        let buf = read_all(&mut t, &mut pcm_packer());
        assert_eq!(buf, [0x00, 0x00, 0x34, 0x12, 0x00, 0x00, 0x78, 0x56]);
    }

    #[test]
    fn aiff_without_normalization_stays_native_width() {
        let bytes = aiff(2, 16, &[0x12, 0x34, 0x56, 0x78]);
        let mut t = track(&bytes, "f", false);
        assert_eq!(read_all(&mut t, &mut pcm_packer()), [0x34, 0x12, 0x78, 0x56]);
    }

    // --- DSF ------------------------------------------------------------

    #[test]
    fn dsf_packs_blocks_into_words() {
        // Two channels, one 4-byte block each, exactly 32 samples.
        let mut audio = vec![0x01u8; 4]; // channel 0 block
        audio.extend_from_slice(&[0xFF; 4]); // channel 1 block
        let bytes = dsf(2, 4, 32, &audio);

        let mut t = track(&bytes, "f", false);
        let f = t.format().unwrap();
        assert_eq!(f.kind, SampleKind::Dsd1);
        assert_eq!(f.dsd.bit_order, DsdBitOrder::MsbFirst);
        assert_eq!(f.dsd.word_order, DsdWordOrder::LittleEndian);

        let mut packer = BitPacker::new(&f).unwrap();
        let out = read_all(&mut t, &mut packer);
        // 0x01 bit-reversed is 0x80.
        let mut expected = 0x8080_8080u32.to_le_bytes().to_vec();
        expected.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        assert_eq!(out, expected);
        assert_eq!(packer.bit_count(), 0);
    }

    #[test]
    fn dsf_partial_tail_stops_reads_and_feeds_the_packer() {
        // 35 samples per channel: one full word plus 3 residual bits.
        let mut audio = vec![0x01u8; 4];
        audio.push(0xFF);
        audio.extend_from_slice(&[0; 3]); // channel 0 block padding
        audio.extend_from_slice(&[0xFF; 5]);
        audio.extend_from_slice(&[0; 3]); // channel 1 block padding
        let bytes = dsf(2, 8, 35, &audio);

        let mut t = track(&bytes, "f", false);
        let f = t.format().unwrap();
        let mut packer = BitPacker::new(&f).unwrap();

        let out = read_all(&mut t, &mut packer);
        assert_eq!(out.len(), 8);
        assert!(t.is_empty());
        assert_eq!(packer.bit_count(), 3);

        // The residue lands in one mute-padded trailing word per channel.
        let tail = packer.finish();
        assert_eq!(tail.len(), 8);
        let word = u32::from_le_bytes(tail[..4].try_into().unwrap());
        assert_eq!(word & 0x1FFF_FFFF, 0x0969_6969);
        assert_eq!(packer.bit_count(), 0);
    }

    // --- DSDIFF -----------------------------------------------------------

    #[test]
    fn dff_streams_interleaved_columns() {
        // Eight columns of [0xA5, 0x5A]: two words per channel.
        let body: Vec<u8> = [0xA5, 0x5A].repeat(8);
        let bytes = dff(2_822_400, 2, &body);

        let mut t = track(&bytes, "f", false);
        let f = t.format().unwrap();
        assert_eq!(f.kind, SampleKind::Dsd1);
        assert_eq!(f.rate.get(), 2_822_400);
        assert_eq!(f.channels.get(), 2);

        let mut packer = BitPacker::new(&f).unwrap();
        let out = read_all(&mut t, &mut packer);

        let mut expected = Vec::new();
        for _ in 0..2 {
            expected.extend_from_slice(&0xA5A5_A5A5u32.to_le_bytes());
            expected.extend_from_slice(&0x5A5A_5A5Au32.to_le_bytes());
        }
        assert_eq!(out, expected);
        assert!(t.is_empty());
    }

    #[test]
    fn dff_rejects_unaligned_read_sizes() {
        let bytes = dff(2_822_400, 2, &[0x69; 16]);
        let mut t = track(&bytes, "f", false);
        let mut packer = BitPacker::new(&t.format().unwrap()).unwrap();
        assert!(matches!(
            t.read(13, &mut packer),
            Err(TrackError::Malformed(_))
        ));
    }

    // --- M4A ------------------------------------------------------------

    #[test]
    fn m4a_yields_metadata_but_no_audio() {
        let nam_payload: Vec<u8> = [&1u32.to_be_bytes()[..], &[0; 4], b"So What"].concat();
        let trkn_payload: Vec<u8> = [&0u32.to_be_bytes()[..], &[0; 4], &[0, 0, 0, 9, 0, 0]].concat();

        let ilst = atom(
            b"ilst",
            &[
                atom(b"\xa9nam", &atom(b"data", &nam_payload)),
                atom(b"trkn", &atom(b"data", &trkn_payload)),
            ]
            .concat(),
        );
        let meta = atom(b"meta", &[&0u32.to_be_bytes()[..], &ilst].concat());
        let moov = atom(b"moov", &atom(b"udta", &meta));
        let bytes = [atom(b"ftyp", b"M4A \x00\x00\x02\x00"), moov].concat();

        let mut t = track(&bytes, "f", false);
        assert_eq!(t.title(), "So What");
        assert_eq!(t.index(), 9);
        assert!(t.format().is_none());

        let buf = t.read(4096, &mut pcm_packer()).unwrap();
        assert!(buf.is_empty() && t.is_empty());
    }

    #[test]
    fn garbage_is_rejected() {
        let err = Track::from_reader(Cursor::new(b"\x00\x00\x00\x20zzzz".to_vec()), "f", false)
            .unwrap_err();
        assert!(matches!(err, TrackError::UnrecognizedFormat));
    }
}
