//! Base RTP muxing: building RTP packets inside RTSP-interleaved framing.

use super::{DEFAULT_VIDEO_CLOCK_RATE, INTERLEAVED_MAGIC, RTP_HEADER_SIZE};
use crate::format::sdp;
use bytes::{BufMut, BytesMut};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Builds RTP packets for one outgoing track, keeping sequence/SSRC
/// bookkeeping, and frames each packet for the RTSP-interleaved channel.
/// The session layer writes the produced bytes to the socket.
pub struct RtpMuxer {
    payload_type: u8,
    clock_rate: u32,
    ssrc: u32,
    sequence: u16,
    channel: u8,
}

impl RtpMuxer {
    pub fn new(media: &sdp::Media, channel: u8) -> Self {
        let clock_rate = if media.time_scale == 0 {
            DEFAULT_VIDEO_CLOCK_RATE
        } else {
            media.time_scale
        };

        // Seed SSRC and sequence so concurrent sessions don't collide.
        let mut hasher = DefaultHasher::new();
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos()
            .hash(&mut hasher);
        std::process::id().hash(&mut hasher);
        let seed = hasher.finish();

        Self {
            payload_type: media.payload_type,
            clock_rate,
            ssrc: seed as u32,
            sequence: (seed >> 32) as u16,
            channel,
        }
    }

    pub fn clock_rate(&self) -> u32 {
        self.clock_rate
    }

    /// Appends one interleaved RTP packet carrying `payload` to `out`.
    ///
    /// The presentation time is converted to the RTP timestamp space
    /// using the track clock rate.
    pub fn write_rtp(&mut self, payload: &[u8], time: Duration, marker: bool, out: &mut BytesMut) {
        let rtp_timestamp =
            (time.as_nanos() * self.clock_rate as u128 / 1_000_000_000) as u32;

        let rtp_len = RTP_HEADER_SIZE + payload.len();
        out.reserve(4 + rtp_len);

        // Interleaved header.
        out.put_u8(INTERLEAVED_MAGIC);
        out.put_u8(self.channel);
        out.put_u16(rtp_len as u16);

        // RTP fixed header: version 2, no padding/extension/CSRC.
        out.put_u8(0x80);
        out.put_u8(if marker {
            0x80 | self.payload_type
        } else {
            self.payload_type
        });
        out.put_u16(self.sequence);
        out.put_u32(rtp_timestamp);
        out.put_u32(self.ssrc);
        out.put_slice(payload);

        self.sequence = self.sequence.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::CodecType;
    use crate::format::rtp::RtpPacket;
    use pretty_assertions::assert_eq;

    fn video_media() -> sdp::Media {
        sdp::Media {
            kind: "video".into(),
            codec: Some(CodecType::H264),
            payload_type: 96,
            time_scale: 90000,
            ..Default::default()
        }
    }

    #[test]
    fn test_write_rtp_framing_and_header() {
        let mut muxer = RtpMuxer::new(&video_media(), 2);
        let mut out = BytesMut::new();
        muxer.write_rtp(&[0xAA; 8], Duration::from_secs(1), true, &mut out);

        assert_eq!(out[0], INTERLEAVED_MAGIC);
        assert_eq!(out[1], 2);
        let declared = u16::from_be_bytes([out[2], out[3]]) as usize;
        assert_eq!(declared, out.len() - 4);

        let pkt = RtpPacket::parse(&out[4..]).unwrap().unwrap();
        assert_eq!(pkt.payload, &[0xAA; 8]);
        assert_eq!(pkt.payload_type, 96);
        assert!(pkt.marker);
        assert_eq!(pkt.timestamp, 90000);
    }

    #[test]
    fn test_sequence_increments_per_packet() {
        let mut muxer = RtpMuxer::new(&video_media(), 0);
        let mut out = BytesMut::new();
        muxer.write_rtp(&[1], Duration::ZERO, false, &mut out);
        muxer.write_rtp(&[2], Duration::ZERO, false, &mut out);

        let first = RtpPacket::parse(&out[4..17]).unwrap().unwrap();
        let second = RtpPacket::parse(&out[21..]).unwrap().unwrap();
        assert_eq!(second.sequence, first.sequence.wrapping_add(1));
    }

    #[test]
    fn test_zero_time_scale_falls_back_to_video_clock() {
        let mut media = video_media();
        media.time_scale = 0;
        let muxer = RtpMuxer::new(&media, 0);
        assert_eq!(muxer.clock_rate(), DEFAULT_VIDEO_CLOCK_RATE);
    }
}
