//! The ack-gated upload engine.
//!
//! Upload discipline, in order:
//!
//! 1. open a transient connection and announce the stream format (a data
//!    frame carrying only the 4-byte token — the host does not ack it);
//! 2. per source: accumulate one second of audio, send it as a data
//!    frame (token + bytes), bump the transfer count and wait for the
//!    matching ack; flush any partial second the same way; then send the
//!    source's title as a tag frame and wait for an ack *at the
//!    unchanged count* — tags share the counter but do not advance it;
//! 3. flush the DSD reassembler tail, if any, as one more acked chunk;
//! 4. in loop mode send the loop sentinel tag (acked), and always finish
//!    with the quit sentinel tag (acked).
//!
//! An ack is any command frame carrying a `DataStack` or `DataTag`
//! header whose value equals the current transfer count. Chunk N+1 is
//! never written before ack N arrives; a 2-second quiet period fails the
//! upload with `Timeout`.

use std::io::{Read, Seek};
use std::time::Duration;

use memplay_audio::{BitPacker, Track};
use memplay_proto::format::StreamFormat;
use memplay_proto::{message, PayloadKind, ACK_DATA_KEY, ACK_TAG_KEY, TAG_LOOP, TAG_QUIT};
use tracing::{debug, info};

use crate::transport::{HostAddr, Transport, Wait};
use crate::Error;

/// Quiet period after which an awaited ack counts as lost.
const ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Uploads `tracks` (all sharing `format`) to the host at `addr`.
///
/// The sources play in slice order; with `loop_mode` the host repeats
/// the whole set. On any failure the upload aborts as a whole — nothing
/// is retried.
pub fn upload<R: Read + Seek>(
    addr: &HostAddr,
    tracks: &mut [Track<R>],
    format: &StreamFormat,
    loop_mode: bool,
) -> Result<(), Error> {
    if tracks.is_empty() {
        return Err(Error::InvalidParam);
    }

    let format_id = format.id();
    let one_second = format.one_second_bytes();
    let mut packer = BitPacker::new(format)?;

    let mut transport = Transport::connect(addr)?;
    let mut transfer_count: u64 = 0;

    // Format announcement; the host accepts this without acking.
    transport.send(&message::data_frame(format_id, &[])?)?;
    info!(%format, tracks = tracks.len(), "upload started");

    for track in tracks.iter_mut() {
        let mut buffer: Vec<u8> = Vec::with_capacity(one_second);

        while !track.is_empty() {
            let chunk = track.read(one_second - buffer.len(), &mut packer)?;
            if chunk.is_empty() {
                break;
            }
            buffer.extend_from_slice(&chunk);

            if buffer.len() >= one_second {
                send_chunk(&mut transport, format_id, &buffer, &mut transfer_count)?;
                buffer.clear();
            }
        }

        if !buffer.is_empty() {
            send_chunk(&mut transport, format_id, &buffer, &mut transfer_count)?;
        }

        transport.send(&message::tag_frame(track.title())?)?;
        wait_for_ack(&mut transport, transfer_count)?;
        debug!(title = track.title(), "source uploaded");
    }

    // Whatever the reassembler still holds becomes one final word set.
    let tail = packer.finish();
    if !tail.is_empty() {
        send_chunk(&mut transport, format_id, &tail, &mut transfer_count)?;
    }

    if loop_mode {
        transport.send(&message::tag_frame(TAG_LOOP)?)?;
        wait_for_ack(&mut transport, transfer_count)?;
    }

    transport.send(&message::tag_frame(TAG_QUIT)?)?;
    wait_for_ack(&mut transport, transfer_count)?;

    info!(chunks = transfer_count, "upload finished");
    Ok(())
}

fn send_chunk(
    transport: &mut Transport,
    format_id: memplay_proto::FormatId,
    audio: &[u8],
    transfer_count: &mut u64,
) -> Result<(), Error> {
    transport.send(&message::data_frame(format_id, audio)?)?;
    *transfer_count += 1;
    wait_for_ack(transport, *transfer_count)
}

/// Blocks until a `DataStack`/`DataTag` header matching `expected`
/// arrives. Everything else on the wire is ignored.
fn wait_for_ack(transport: &mut Transport, expected: u64) -> Result<(), Error> {
    loop {
        match transport.poll(ACK_TIMEOUT)? {
            Wait::Timeout => return Err(Error::Timeout),
            Wait::Wakeup => {
                let mut acked = false;
                transport.drain_frames(|kind, body| {
                    if kind != PayloadKind::Command {
                        return;
                    }
                    for (key, value) in memplay_proto::HeaderList::parse(body).iter() {
                        if (key == ACK_DATA_KEY || key == ACK_TAG_KEY)
                            && value.parse() == Ok(expected)
                        {
                            acked = true;
                        }
                    }
                })?;
                if acked {
                    return Ok(());
                }
            }
        }
    }
}
