//! RTP transport: base demuxing/muxing plus per-codec depacketizers and
//! packetizers.
//!
//! Everything here operates on RTSP-interleaved framing: each RTP packet
//! travels inside the RTSP TCP connection prefixed with `$`, a channel
//! byte and a 16-bit big-endian length.

mod aac;
mod audio;
mod demux;
mod h264;
mod h264_mux;
mod h265;
mod h265_mux;
mod mjpeg;
mod mux;

pub use aac::AacDepacketizer;
pub use audio::{OpusDepacketizer, PcmDepacketizer};
pub use demux::{validate_frame_length, RtpPacket};
pub use h264::H264Depacketizer;
pub use h264_mux::H264Packetizer;
pub use h265::H265Depacketizer;
pub use h265_mux::H265Packetizer;
pub use mjpeg::MjpegDepacketizer;
pub use mux::RtpMuxer;

use crate::av::Packet;
use crate::error::Result;

/// Leading magic byte of an interleaved binary frame.
pub const INTERLEAVED_MAGIC: u8 = 0x24;
/// Interleaved frame header: magic, channel, 16-bit length.
pub const INTERLEAVED_HEADER_SIZE: usize = 4;
/// Fixed RTP header length.
pub const RTP_HEADER_SIZE: usize = 12;
/// RTCP sender report packet type.
pub const RTCP_SENDER_REPORT: u8 = 200;
/// RTCP receiver report packet type.
pub const RTCP_RECEIVER_REPORT: u8 = 201;
/// Default RTP clock rate for video streams.
pub const DEFAULT_VIDEO_CLOCK_RATE: u32 = 90000;

/// Consumes parsed RTP packets for one track and reassembles codec
/// packets from them.
///
/// `push` may queue zero or more packets (fragments accumulate across
/// calls); `pop` drains the queue. Recoverable per-unit errors inside
/// `push` drop the unit and return `Ok`.
pub trait Depacketizer: Send {
    fn push(&mut self, rtp: &RtpPacket<'_>) -> Result<()>;
    fn pop(&mut self) -> Option<Packet>;
}

/// Writes `val` as the 4-byte big-endian AVCC length prefix.
pub(crate) fn bin_size(val: usize) -> [u8; 4] {
    (val as u32).to_be_bytes()
}

/// Converts an RTP timestamp to a stream-relative duration.
pub(crate) fn rtp_time(timestamp: u32, clock_rate: u32) -> std::time::Duration {
    let clock_rate = if clock_rate == 0 {
        DEFAULT_VIDEO_CLOCK_RATE
    } else {
        clock_rate
    };
    std::time::Duration::from_nanos(timestamp as u64 * 1_000_000_000 / clock_rate as u64)
}
