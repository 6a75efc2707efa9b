//! Pass-through depacketizers for Opus and PCM/G.711: each RTP payload
//! becomes exactly one packet.

use super::demux::RtpPacket;
use super::Depacketizer;
use crate::av::{AudioPacket, ChannelLayout, CodecParameters, CodecType, Packet};
use crate::buffer::BufferPool;
use crate::codec::opus::OpusParameters;
use crate::codec::pcm::PcmParameters;
use crate::error::Result;
use crate::format::sdp;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Nominal Opus frame duration. The TOC byte would give the true value;
/// the fixed 20 ms matches what downstream timestamp accounting expects.
const OPUS_NOMINAL_DURATION: Duration = Duration::from_millis(20);

fn payload_time(timestamp: u32, time_scale: u32) -> Duration {
    let time_scale = if time_scale == 0 { 8000 } else { time_scale };
    Duration::from_nanos(timestamp as u64 * 1_000_000_000 / time_scale as u64)
}

pub struct OpusDepacketizer {
    pool: BufferPool,
    stream_index: u8,
    time_scale: u32,
    params: Arc<CodecParameters>,
    packets: VecDeque<Packet>,
}

impl OpusDepacketizer {
    pub fn new(media: &sdp::Media, stream_index: u8, pool: BufferPool) -> Self {
        let layout = match media.channel_count {
            2 => ChannelLayout::STEREO,
            _ => ChannelLayout::MONO,
        };
        let time_scale = if media.time_scale == 0 {
            48000
        } else {
            media.time_scale
        };
        let params = OpusParameters::new(stream_index, layout, time_scale);

        Self {
            pool,
            stream_index,
            time_scale,
            params: Arc::new(CodecParameters::Opus(params)),
            packets: VecDeque::new(),
        }
    }

    pub fn parameters(&self) -> Arc<CodecParameters> {
        Arc::clone(&self.params)
    }
}

impl Depacketizer for OpusDepacketizer {
    fn push(&mut self, rtp: &RtpPacket<'_>) -> Result<()> {
        let mut buf = self.pool.get(0);
        buf.extend_from_slice(rtp.payload);

        self.packets.push_back(Packet::Audio(AudioPacket {
            stream_index: self.stream_index,
            time: payload_time(rtp.timestamp, self.time_scale),
            duration: OPUS_NOMINAL_DURATION,
            captured_at: Utc::now(),
            url: String::new(),
            data: buf.freeze(),
            params: Arc::clone(&self.params),
        }));
        Ok(())
    }

    fn pop(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }
}

pub struct PcmDepacketizer {
    pool: BufferPool,
    stream_index: u8,
    time_scale: u32,
    bytes_per_second: u64,
    params: Arc<CodecParameters>,
    packets: VecDeque<Packet>,
}

impl PcmDepacketizer {
    /// `codec_type` distinguishes L16 from the G.711 companded variants.
    pub fn new(
        media: &sdp::Media,
        stream_index: u8,
        codec_type: CodecType,
        pool: BufferPool,
    ) -> Self {
        let time_scale = if media.time_scale == 0 {
            8000
        } else {
            media.time_scale
        };
        let channels = media.channel_count.max(1);
        let params = PcmParameters::new(stream_index, codec_type, channels, time_scale);
        let bytes_per_second = params.bytes_per_second();

        Self {
            pool,
            stream_index,
            time_scale,
            bytes_per_second,
            params: Arc::new(CodecParameters::Pcm(params)),
            packets: VecDeque::new(),
        }
    }

    pub fn parameters(&self) -> Arc<CodecParameters> {
        Arc::clone(&self.params)
    }
}

impl Depacketizer for PcmDepacketizer {
    fn push(&mut self, rtp: &RtpPacket<'_>) -> Result<()> {
        let mut buf = self.pool.get(0);
        buf.extend_from_slice(rtp.payload);

        let duration =
            Duration::from_nanos(rtp.payload.len() as u64 * 1_000_000_000 / self.bytes_per_second);

        self.packets.push_back(Packet::Audio(AudioPacket {
            stream_index: self.stream_index,
            time: payload_time(rtp.timestamp, self.time_scale),
            duration,
            captured_at: Utc::now(),
            url: String::new(),
            data: buf.freeze(),
            params: Arc::clone(&self.params),
        }));
        Ok(())
    }

    fn pop(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }
}
