use super::{ChannelLayout, CodecType, SampleFormat};
use crate::codec::aac::AacParameters;
use crate::codec::h264::H264Parameters;
use crate::codec::h265::H265Parameters;
use crate::codec::mjpeg::MjpegParameters;
use crate::codec::opus::OpusParameters;
use crate::codec::pcm::PcmParameters;

/// Immutable description of one elementary stream.
///
/// Constructed once when SDP or in-band parameter sets are parsed, and
/// replaced wholesale (a fresh `Arc<CodecParameters>`) whenever the source
/// bitstream's parameter sets change; never mutated after publication.
/// Every packet references the parameters it was produced under.
#[derive(Debug, Clone)]
pub enum CodecParameters {
    H264(H264Parameters),
    H265(H265Parameters),
    Aac(AacParameters),
    Mjpeg(MjpegParameters),
    Opus(OpusParameters),
    Pcm(PcmParameters),
}

impl CodecParameters {
    pub fn codec_type(&self) -> CodecType {
        match self {
            CodecParameters::H264(_) => CodecType::H264,
            CodecParameters::H265(_) => CodecType::H265,
            CodecParameters::Aac(_) => CodecType::Aac,
            CodecParameters::Mjpeg(_) => CodecType::Mjpeg,
            CodecParameters::Opus(_) => CodecType::Opus,
            CodecParameters::Pcm(p) => p.codec_type(),
        }
    }

    pub fn stream_index(&self) -> u8 {
        match self {
            CodecParameters::H264(p) => p.stream_index(),
            CodecParameters::H265(p) => p.stream_index(),
            CodecParameters::Aac(p) => p.stream_index(),
            CodecParameters::Mjpeg(p) => p.stream_index(),
            CodecParameters::Opus(p) => p.stream_index(),
            CodecParameters::Pcm(p) => p.stream_index(),
        }
    }

    /// Estimated stream bitrate in bits per second.
    pub fn bitrate(&self) -> u64 {
        match self {
            CodecParameters::H264(p) => p.bitrate(),
            CodecParameters::H265(p) => p.bitrate(),
            CodecParameters::Aac(p) => p.bitrate(),
            CodecParameters::Mjpeg(p) => p.bitrate(),
            CodecParameters::Opus(p) => p.bitrate(),
            CodecParameters::Pcm(p) => p.bitrate(),
        }
    }

    /// Codec tag in the form used by container/manifest metadata.
    pub fn tag(&self) -> String {
        match self {
            CodecParameters::H264(p) => p.tag(),
            CodecParameters::H265(p) => p.tag(),
            CodecParameters::Aac(p) => p.tag(),
            CodecParameters::Mjpeg(p) => p.tag(),
            CodecParameters::Opus(p) => p.tag(),
            CodecParameters::Pcm(p) => p.tag(),
        }
    }

    pub fn is_video(&self) -> bool {
        self.codec_type().is_video()
    }

    pub fn is_audio(&self) -> bool {
        self.codec_type().is_audio()
    }

    /// Frame width for video variants.
    pub fn width(&self) -> Option<u32> {
        match self {
            CodecParameters::H264(p) => Some(p.width()),
            CodecParameters::H265(p) => Some(p.width()),
            CodecParameters::Mjpeg(p) => Some(p.width()),
            _ => None,
        }
    }

    /// Frame height for video variants.
    pub fn height(&self) -> Option<u32> {
        match self {
            CodecParameters::H264(p) => Some(p.height()),
            CodecParameters::H265(p) => Some(p.height()),
            CodecParameters::Mjpeg(p) => Some(p.height()),
            _ => None,
        }
    }

    /// Nominal frame rate for video variants.
    pub fn fps(&self) -> Option<u32> {
        match self {
            CodecParameters::H264(p) => Some(p.fps()),
            CodecParameters::H265(p) => Some(p.fps()),
            CodecParameters::Mjpeg(p) => Some(p.fps()),
            _ => None,
        }
    }

    /// Sample rate for audio variants.
    pub fn sample_rate(&self) -> Option<u32> {
        match self {
            CodecParameters::Aac(p) => Some(p.sample_rate()),
            CodecParameters::Opus(p) => Some(p.sample_rate()),
            CodecParameters::Pcm(p) => Some(p.sample_rate()),
            _ => None,
        }
    }

    /// Channel count for audio variants.
    pub fn channels(&self) -> Option<u8> {
        match self {
            CodecParameters::Aac(p) => Some(p.channels()),
            CodecParameters::Opus(p) => Some(p.channels()),
            CodecParameters::Pcm(p) => Some(p.channels()),
            _ => None,
        }
    }

    pub fn channel_layout(&self) -> Option<ChannelLayout> {
        match self {
            CodecParameters::Aac(p) => Some(p.channel_layout()),
            CodecParameters::Opus(p) => Some(p.channel_layout()),
            _ => None,
        }
    }

    pub fn sample_format(&self) -> Option<SampleFormat> {
        match self {
            CodecParameters::Aac(_) => Some(SampleFormat::Fltp),
            CodecParameters::Opus(_) | CodecParameters::Pcm(_) => Some(SampleFormat::S16),
            _ => None,
        }
    }
}
