//! Linear PCM and G.711 stream parameters.

use crate::av::{CodecType, SampleFormat};

const BITS_PER_SAMPLE: u64 = 16;

#[derive(Debug, Clone)]
pub struct PcmParameters {
    stream_index: u8,
    bitrate: u64,
    codec_type: CodecType,
    channels: u8,
    sample_rate: u32,
}

impl PcmParameters {
    /// `codec_type` must be one of `Pcm`, `PcmAlaw`, `PcmUlaw`.
    pub fn new(stream_index: u8, codec_type: CodecType, channels: u8, sample_rate: u32) -> Self {
        Self {
            stream_index,
            bitrate: sample_rate as u64 * BITS_PER_SAMPLE * channels as u64,
            codec_type,
            channels,
            sample_rate,
        }
    }

    pub fn stream_index(&self) -> u8 {
        self.stream_index
    }

    pub fn bitrate(&self) -> u64 {
        self.bitrate
    }

    pub fn codec_type(&self) -> CodecType {
        self.codec_type
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn sample_format(&self) -> SampleFormat {
        SampleFormat::S16
    }

    /// Payload bytes per second of audio, used to derive packet durations.
    /// G.711 codecs carry one byte per sample; L16 carries two.
    pub fn bytes_per_second(&self) -> u64 {
        let bytes_per_sample = match self.codec_type {
            CodecType::PcmAlaw | CodecType::PcmUlaw => 1,
            _ => 2,
        };
        self.sample_rate as u64 * bytes_per_sample * self.channels.max(1) as u64
    }

    pub fn tag(&self) -> String {
        "pcm".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_second() {
        let alaw = PcmParameters::new(1, CodecType::PcmAlaw, 1, 8000);
        assert_eq!(alaw.bytes_per_second(), 8000);

        let l16 = PcmParameters::new(1, CodecType::Pcm, 2, 44100);
        assert_eq!(l16.bytes_per_second(), 176400);
    }
}
