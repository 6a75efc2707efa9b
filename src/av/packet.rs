use super::CodecParameters;
use crate::buffer::SharedBuffer;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// One reassembled access unit (video) or frame (audio).
///
/// Cloning a packet is cheap: the payload handle and the codec-parameter
/// `Arc` are reference counted, so no payload bytes are copied and the
/// buffer cannot be returned to its pool while any clone is alive.
#[derive(Debug, Clone)]
pub enum Packet {
    Video(VideoPacket),
    Audio(AudioPacket),
}

#[derive(Debug, Clone)]
pub struct VideoPacket {
    pub stream_index: u8,
    /// Presentation time as a duration since stream start.
    pub time: Duration,
    pub duration: Duration,
    /// Wall-clock time the packet was captured.
    pub captured_at: DateTime<Utc>,
    /// Source URL tag, set by the session that produced the packet.
    pub url: String,
    pub data: SharedBuffer,
    pub params: Arc<CodecParameters>,
    pub is_key_frame: bool,
}

#[derive(Debug, Clone)]
pub struct AudioPacket {
    pub stream_index: u8,
    pub time: Duration,
    pub duration: Duration,
    pub captured_at: DateTime<Utc>,
    pub url: String,
    pub data: SharedBuffer,
    pub params: Arc<CodecParameters>,
}

impl Packet {
    pub fn data(&self) -> &[u8] {
        match self {
            Packet::Video(p) => p.data.data(),
            Packet::Audio(p) => p.data.data(),
        }
    }

    pub fn stream_index(&self) -> u8 {
        match self {
            Packet::Video(p) => p.stream_index,
            Packet::Audio(p) => p.stream_index,
        }
    }

    pub fn time(&self) -> Duration {
        match self {
            Packet::Video(p) => p.time,
            Packet::Audio(p) => p.time,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Packet::Video(p) => p.duration,
            Packet::Audio(p) => p.duration,
        }
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        match self {
            Packet::Video(p) => p.captured_at,
            Packet::Audio(p) => p.captured_at,
        }
    }

    pub fn params(&self) -> &Arc<CodecParameters> {
        match self {
            Packet::Video(p) => &p.params,
            Packet::Audio(p) => &p.params,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Packet::Video(p) => &p.url,
            Packet::Audio(p) => &p.url,
        }
    }

    pub fn set_url(&mut self, url: &str) {
        match self {
            Packet::Video(p) => p.url = url.to_string(),
            Packet::Audio(p) => p.url = url.to_string(),
        }
    }

    /// True for video packets carrying a random access point; always
    /// false for audio.
    pub fn is_key_frame(&self) -> bool {
        match self {
            Packet::Video(p) => p.is_key_frame,
            Packet::Audio(_) => false,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Packet::Video(_))
    }
}
