mod parser;
mod types;

pub use parser::{
    fill_adts_header, parse_adts_header, parse_mpeg4_audio_config, write_mpeg4_audio_config,
    AdtsHeader, ADTS_HEADER_LENGTH,
};
pub use types::{Mpeg4AudioConfig, AOT_AAC_LC, AOT_AAC_MAIN, CHANNEL_CONFIG_TABLE, SAMPLE_RATE_TABLE};

use crate::av::{ChannelLayout, SampleFormat};
use crate::error::{Result, RtspError};

/// Stream parameters derived from an MPEG-4 `AudioSpecificConfig`.
#[derive(Debug, Clone)]
pub struct AacParameters {
    stream_index: u8,
    bitrate: u64,
    config_bytes: Vec<u8>,
    config: Mpeg4AudioConfig,
}

impl AacParameters {
    /// Builds parameters from raw `AudioSpecificConfig` bytes (SDP
    /// `config=` field or in-band).
    pub fn from_config_bytes(config_bytes: &[u8]) -> Result<Self> {
        let config = parse_mpeg4_audio_config(config_bytes)
            .map_err(|e| RtspError::Parse(format!("aac: parse audio config failed ({e})")))?;

        let bitrate = config.sample_rate as u64
            * config.channel_layout.count() as u64
            * (SampleFormat::Fltp.bytes_per_sample() * 8) as u64;

        Ok(Self {
            stream_index: 0,
            bitrate,
            config_bytes: config_bytes.to_vec(),
            config,
        })
    }

    /// Builds parameters from decoded config fields, serializing them to
    /// bytes first so `config_bytes` always matches `config`.
    pub fn from_config(config: &Mpeg4AudioConfig) -> Result<Self> {
        let bytes = write_mpeg4_audio_config(config)?;
        Self::from_config_bytes(&bytes)
    }

    pub fn with_stream_index(mut self, index: u8) -> Self {
        self.stream_index = index;
        self
    }

    pub fn stream_index(&self) -> u8 {
        self.stream_index
    }

    pub fn bitrate(&self) -> u64 {
        self.bitrate
    }

    pub fn config(&self) -> &Mpeg4AudioConfig {
        &self.config
    }

    pub fn config_bytes(&self) -> &[u8] {
        &self.config_bytes
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn channel_layout(&self) -> ChannelLayout {
        self.config.channel_layout
    }

    pub fn channels(&self) -> u8 {
        self.config.channel_layout.count() as u8
    }

    pub fn tag(&self) -> String {
        format!("mp4a.40.{}", self.config.object_type)
    }
}
