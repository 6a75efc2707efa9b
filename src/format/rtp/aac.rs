//! AAC RTP depacketization: bare ADTS frames and RFC 3640 AU-header
//! payloads.

use super::demux::RtpPacket;
use super::Depacketizer;
use crate::av::{AudioPacket, CodecParameters, Packet};
use crate::buffer::BufferPool;
use crate::codec::aac::{parse_adts_header, AacParameters};
use crate::error::Result;
use crate::format::sdp;
use chrono::Utc;
use log::warn;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Samples per AAC frame.
const SAMPLES_PER_FRAME: u64 = 1024;

/// Extracts AAC frames from RTP payloads.
///
/// Two payload shapes are supported: a bare ADTS frame (detected by its
/// sync word; the header is stripped and, when its config differs from
/// the cached one, `CodecParameters` are re-derived), and RFC 3640
/// AU-header payloads, where each AU header yields one frame with a
/// monotonically advancing timestamp.
pub struct AacDepacketizer {
    pool: BufferPool,
    stream_index: u8,
    time_scale: u32,
    params: Option<Arc<CodecParameters>>,
    packets: VecDeque<Packet>,
}

impl AacDepacketizer {
    /// Builds a depacketizer from the track's SDP media section. A
    /// malformed `config=` attribute is fatal (single-shot parse); a
    /// missing one defers parameters to the first ADTS frame.
    pub fn new(media: &sdp::Media, stream_index: u8, pool: BufferPool) -> Result<Self> {
        let params = if media.config.is_empty() {
            None
        } else {
            let p = AacParameters::from_config_bytes(&media.config)?
                .with_stream_index(stream_index);
            Some(Arc::new(CodecParameters::Aac(p)))
        };

        Ok(Self {
            pool,
            stream_index,
            time_scale: if media.time_scale == 0 {
                48000
            } else {
                media.time_scale
            },
            params,
            packets: VecDeque::new(),
        })
    }

    pub fn parameters(&self) -> Option<Arc<CodecParameters>> {
        self.params.clone()
    }

    fn frame_duration(&self) -> Duration {
        Duration::from_nanos(SAMPLES_PER_FRAME * 1_000_000_000 / self.time_scale as u64)
    }

    fn add_packet(&mut self, frame: &[u8], time: Duration) {
        let Some(params) = &self.params else {
            warn!("aac: dropping frame, no codec parameters yet");
            return;
        };

        let mut buf = self.pool.get(0);
        buf.extend_from_slice(frame);

        self.packets.push_back(Packet::Audio(AudioPacket {
            stream_index: self.stream_index,
            time,
            duration: self.frame_duration(),
            captured_at: Utc::now(),
            url: String::new(),
            data: buf.freeze(),
            params: Arc::clone(params),
        }));
    }

    fn push_adts(&mut self, payload: &[u8], header_len: usize, time: Duration) {
        self.add_packet(&payload[header_len..], time);
    }

    /// RFC 3640: a 16-bit AU-headers-length (in bits), one 16-bit AU
    /// header per frame carrying a 13-bit size, then the concatenated
    /// frame payloads.
    fn push_au_headers(&mut self, payload: &[u8], mut time: Duration) {
        if payload.len() < 2 {
            warn!("aac: payload too short for AU headers");
            return;
        }

        let au_headers_length = u16::from_be_bytes([payload[0], payload[1]]);
        let au_headers_count = (au_headers_length >> 4) as usize;
        let frames_offset = 2 + au_headers_count * 2;
        if payload.len() < frames_offset {
            warn!("aac: truncated AU header list");
            return;
        }

        let mut headers = &payload[2..frames_offset];
        let mut frames = &payload[frames_offset..];
        let duration = self.frame_duration();

        for _ in 0..au_headers_count {
            let au_header = u16::from_be_bytes([headers[0], headers[1]]);
            let frame_size = (au_header >> 3) as usize;
            if frame_size > frames.len() {
                warn!("aac: AU header size {frame_size} exceeds remaining payload");
                return;
            }

            self.add_packet(&frames[..frame_size], time);
            headers = &headers[2..];
            frames = &frames[frame_size..];
            time += duration;
        }
    }
}

impl Depacketizer for AacDepacketizer {
    fn push(&mut self, rtp: &RtpPacket<'_>) -> Result<()> {
        let time = Duration::from_nanos(
            rtp.timestamp as u64 * 1_000_000_000 / self.time_scale as u64,
        );

        match parse_adts_header(rtp.payload) {
            Ok(header) => {
                if self
                    .params
                    .as_ref()
                    .map(|p| match p.as_ref() {
                        CodecParameters::Aac(a) => *a.config() != header.config,
                        _ => true,
                    })
                    .unwrap_or(true)
                {
                    match AacParameters::from_config(&header.config) {
                        Ok(p) => {
                            self.params = Some(Arc::new(CodecParameters::Aac(
                                p.with_stream_index(self.stream_index),
                            )));
                        }
                        Err(e) => warn!("aac: config update failed: {e}"),
                    }
                }
                self.push_adts(rtp.payload, header.header_length, time);
            }
            Err(_) => self.push_au_headers(rtp.payload, time),
        }

        Ok(())
    }

    fn pop(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }
}
