//! Opus stream parameters.

use crate::av::{ChannelLayout, SampleFormat};

const BITS_PER_SAMPLE: u64 = 16;

#[derive(Debug, Clone)]
pub struct OpusParameters {
    stream_index: u8,
    bitrate: u64,
    channel_layout: ChannelLayout,
    sample_rate: u32,
}

impl OpusParameters {
    pub fn new(stream_index: u8, channel_layout: ChannelLayout, sample_rate: u32) -> Self {
        let bitrate = BITS_PER_SAMPLE * channel_layout.count() as u64 * sample_rate as u64 / 8;
        Self {
            stream_index,
            bitrate,
            channel_layout,
            sample_rate,
        }
    }

    pub fn stream_index(&self) -> u8 {
        self.stream_index
    }

    pub fn bitrate(&self) -> u64 {
        self.bitrate
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_layout(&self) -> ChannelLayout {
        self.channel_layout
    }

    pub fn channels(&self) -> u8 {
        self.channel_layout.count() as u8
    }

    pub fn sample_format(&self) -> SampleFormat {
        SampleFormat::S16
    }

    pub fn tag(&self) -> String {
        "opus".to_string()
    }
}
