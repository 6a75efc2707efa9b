use super::types::{Mpeg4AudioConfig, CHANNEL_CONFIG_TABLE, SAMPLE_RATE_TABLE};
use crate::error::{Result, RtspError};
use crate::utils::{BitReader, BitWriter};

/// Length of an ADTS header without CRC.
pub const ADTS_HEADER_LENGTH: usize = 7;

/// Object type value signalling the 6-bit extension follows.
const OBJECT_TYPE_ESCAPE: u32 = 31;
/// Sample-rate index value signalling a 24-bit explicit rate follows.
const SAMPLE_RATE_ESCAPE: u32 = 0xf;

/// A parsed ADTS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    pub config: Mpeg4AudioConfig,
    /// 7 or 9 bytes depending on the protection-absent bit.
    pub header_length: usize,
    /// Total frame length including the header.
    pub frame_length: usize,
    /// Sample count carried by the frame (multiple of 1024).
    pub samples: usize,
}

/// Parses an ADTS header from the start of `frame`.
///
/// Validates the 0xFFF sync pattern, extracts object type, sample-rate
/// index and channel configuration (which straddles two bytes), the
/// 13-bit frame length spanning three bytes, and the sample count.
/// Rejects frame lengths smaller than the header itself.
pub fn parse_adts_header(frame: &[u8]) -> Result<AdtsHeader> {
    if frame.len() < ADTS_HEADER_LENGTH {
        return Err(RtspError::Parse(format!(
            "adts: need at least {} bytes, got {}",
            ADTS_HEADER_LENGTH,
            frame.len()
        )));
    }

    if frame[0] != 0xff || frame[1] & 0xf6 != 0xf0 {
        return Err(RtspError::Parse(format!(
            "adts: invalid sync word: {:02x} {:02x}",
            frame[0], frame[1]
        )));
    }

    let mut config = Mpeg4AudioConfig {
        object_type: (frame[2] >> 6) as u32 + 1,
        sample_rate_index: (frame[2] >> 2 & 0xf) as u32,
        channel_config: ((frame[2] << 2 & 0x4) | (frame[3] >> 6 & 0x3)) as u32,
        ..Default::default()
    };

    if config.sample_rate_index as usize >= SAMPLE_RATE_TABLE.len() {
        return Err(RtspError::Parse(format!(
            "adts: invalid sample rate index: {}",
            config.sample_rate_index
        )));
    }

    if config.channel_config == 0 || config.channel_config as usize >= CHANNEL_CONFIG_TABLE.len() {
        return Err(RtspError::Parse(format!(
            "adts: invalid channel configuration: {}",
            config.channel_config
        )));
    }

    config.complete();

    let frame_length =
        ((frame[3] & 0x3) as usize) << 11 | (frame[4] as usize) << 3 | (frame[5] >> 5) as usize;
    let samples = ((frame[6] & 0x3) as usize + 1) * 1024;

    let mut header_length = 7;
    if frame[1] & 0x1 == 0 {
        header_length = 9;
        if frame.len() < 9 {
            return Err(RtspError::Parse(format!(
                "adts: need 9 bytes for protected header, got {}",
                frame.len()
            )));
        }
    }

    if frame_length < header_length {
        return Err(RtspError::Parse(format!(
            "adts: frame length {} smaller than header {}",
            frame_length, header_length
        )));
    }

    Ok(AdtsHeader {
        config,
        header_length,
        frame_length,
        samples,
    })
}

/// Fills a 7-byte ADTS header, the exact inverse of [`parse_adts_header`]
/// for any valid input.
pub fn fill_adts_header(
    header: &mut [u8],
    config: &Mpeg4AudioConfig,
    samples: usize,
    payload_length: usize,
) -> Result<()> {
    if header.len() < ADTS_HEADER_LENGTH {
        return Err(RtspError::Parse(format!(
            "adts: header buffer needs {} bytes, got {}",
            ADTS_HEADER_LENGTH,
            header.len()
        )));
    }

    if !config.is_valid() {
        return Err(RtspError::Parse("adts: invalid audio configuration".into()));
    }
    if config.sample_rate_index as usize >= SAMPLE_RATE_TABLE.len() {
        return Err(RtspError::Parse(format!(
            "adts: invalid sample rate index: {}",
            config.sample_rate_index
        )));
    }
    if config.channel_config as usize >= CHANNEL_CONFIG_TABLE.len() {
        return Err(RtspError::Parse(format!(
            "adts: invalid channel configuration: {}",
            config.channel_config
        )));
    }
    if samples == 0 || samples % 1024 != 0 {
        return Err(RtspError::Parse(format!(
            "adts: sample count {} not a multiple of 1024",
            samples
        )));
    }

    let frame_length = payload_length + ADTS_HEADER_LENGTH;
    if frame_length >= 1 << 13 {
        return Err(RtspError::Parse(format!(
            "adts: frame length {} exceeds 13-bit field",
            frame_length
        )));
    }

    // AAAAAAAA AAAABCCD EEFFFFGH HHIJKLMM MMMMMMMM MMMOOOOO OOOOOOPP
    header[0] = 0xff;
    header[1] = 0xf1;
    header[2] = ((config.object_type as u8 - 1) & 0x3) << 6
        | (config.sample_rate_index as u8 & 0xf) << 2
        | (config.channel_config >> 2) as u8 & 0x1;
    header[3] = (config.channel_config as u8 & 0x3) << 6 | (frame_length >> 11) as u8 & 0x3;
    header[4] = (frame_length >> 3) as u8;
    header[5] = ((frame_length & 0x7) as u8) << 5 | 0x1f;
    header[6] = 0xcc | (samples / 1024 - 1) as u8;

    Ok(())
}

fn read_object_type(r: &mut BitReader<'_>) -> Result<u32> {
    let object_type = r.read_bits(5)?;
    if object_type == OBJECT_TYPE_ESCAPE {
        // Extended object type: 32 plus a 6-bit suffix.
        return Ok(32 + r.read_bits(6)?);
    }
    Ok(object_type)
}

fn write_object_type(w: &mut BitWriter, object_type: u32) -> Result<()> {
    if object_type >= 32 {
        w.write_bits(OBJECT_TYPE_ESCAPE, 5)?;
        w.write_bits(object_type - 32, 6)?;
    } else {
        w.write_bits(object_type, 5)?;
    }
    Ok(())
}

fn read_sample_rate_index(r: &mut BitReader<'_>) -> Result<u32> {
    let index = r.read_bits(4)?;
    if index == SAMPLE_RATE_ESCAPE {
        return r.read_bits(24);
    }
    Ok(index)
}

fn write_sample_rate_index(w: &mut BitWriter, index: u32) -> Result<()> {
    if index >= SAMPLE_RATE_ESCAPE {
        w.write_bits(SAMPLE_RATE_ESCAPE, 4)?;
        w.write_bits(index, 24)?;
    } else {
        w.write_bits(index, 4)?;
    }
    Ok(())
}

/// Parses the MPEG-4 `AudioSpecificConfig` carried in SDP `config=` or
/// in-band over RTP.
pub fn parse_mpeg4_audio_config(data: &[u8]) -> Result<Mpeg4AudioConfig> {
    if data.is_empty() {
        return Err(RtspError::Parse("aac: empty audio config".into()));
    }

    let mut r = BitReader::new(data);
    let mut config = Mpeg4AudioConfig {
        object_type: read_object_type(&mut r)?,
        sample_rate_index: read_sample_rate_index(&mut r)?,
        channel_config: r.read_bits(4)?,
        ..Default::default()
    };
    config.complete();
    Ok(config)
}

/// Serializes an MPEG-4 `AudioSpecificConfig`, the inverse of
/// [`parse_mpeg4_audio_config`] for object type, sample-rate index and
/// channel configuration.
pub fn write_mpeg4_audio_config(config: &Mpeg4AudioConfig) -> Result<Vec<u8>> {
    let mut w = BitWriter::new();
    write_object_type(&mut w, config.object_type)?;

    let mut sample_rate_index = config.sample_rate_index;
    if sample_rate_index == 0 {
        if let Some(i) = SAMPLE_RATE_TABLE
            .iter()
            .position(|&rate| rate == config.sample_rate)
        {
            sample_rate_index = i as u32;
        }
    }
    write_sample_rate_index(&mut w, sample_rate_index)?;

    let mut channel_config = config.channel_config;
    if channel_config == 0 {
        if let Some(i) = CHANNEL_CONFIG_TABLE
            .iter()
            .position(|&layout| layout == config.channel_layout)
        {
            channel_config = i as u32;
        }
    }
    w.write_bits(channel_config, 4)?;

    let mut out = w.finish();
    // GASpecificConfig suffix expected by downstream ESDS consumers.
    out.extend_from_slice(&[
        0x06, 0x80, 0x80, 0x80, 0x01, 0x02, 0x06, 0x80, 0x80, 0x80, 0x01,
    ]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_adts_round_trip_exhaustive() {
        // Every legal sample-rate index and channel configuration.
        for sr_index in 0..13u32 {
            for channel_config in 1..8u32 {
                for object_type in 1..=4u32 {
                    let mut config = Mpeg4AudioConfig {
                        object_type,
                        sample_rate_index: sr_index,
                        channel_config,
                        ..Default::default()
                    };
                    config.complete();

                    let payload_len = 321;
                    let mut header = [0u8; ADTS_HEADER_LENGTH];
                    fill_adts_header(&mut header, &config, 1024, payload_len).unwrap();

                    let parsed = parse_adts_header(&header).unwrap();
                    assert_eq!(parsed.config.object_type, object_type);
                    assert_eq!(parsed.config.sample_rate_index, sr_index);
                    assert_eq!(parsed.config.channel_config, channel_config);
                    assert_eq!(parsed.samples, 1024);
                    assert_eq!(parsed.header_length, ADTS_HEADER_LENGTH);
                    assert_eq!(parsed.frame_length, payload_len + ADTS_HEADER_LENGTH);
                }
            }
        }
    }

    #[test]
    fn test_adts_rejects_bad_sync() {
        let frame = [0xfe, 0xf1, 0x50, 0x80, 0x43, 0xff, 0xcd];
        assert!(parse_adts_header(&frame).is_err());
        let frame = [0xff, 0x00, 0x50, 0x80, 0x43, 0xff, 0xcd];
        assert!(parse_adts_header(&frame).is_err());
    }

    #[test]
    fn test_adts_rejects_frame_shorter_than_header() {
        let mut config = Mpeg4AudioConfig {
            object_type: 2,
            sample_rate_index: 4,
            channel_config: 2,
            ..Default::default()
        };
        config.complete();

        let mut header = [0u8; ADTS_HEADER_LENGTH];
        fill_adts_header(&mut header, &config, 1024, 0).unwrap();
        // Zero the 13-bit frame-length field: frame length 0 < header length.
        header[3] &= 0xfc;
        header[4] = 0;
        header[5] &= 0x1f;
        assert!(parse_adts_header(&header).is_err());
    }

    #[test]
    fn test_adts_rejects_short_input() {
        assert!(parse_adts_header(&[0xff, 0xf1, 0x50]).is_err());
    }

    #[test]
    fn test_adts_protected_header_length() {
        let mut config = Mpeg4AudioConfig {
            object_type: 2,
            sample_rate_index: 3,
            channel_config: 2,
            ..Default::default()
        };
        config.complete();

        let mut frame = [0u8; 9];
        fill_adts_header(&mut frame, &config, 1024, 100).unwrap();
        frame[1] &= 0xfe; // clear protection_absent: CRC present
        let parsed = parse_adts_header(&frame).unwrap();
        assert_eq!(parsed.header_length, 9);
    }

    #[test]
    fn test_mpeg4_config_round_trip() {
        for object_type in [1u32, 2, 4, 33, 40] {
            for sr_index in [0u32, 3, 4, 11, 12] {
                for channel_config in 1..8u32 {
                    let mut config = Mpeg4AudioConfig {
                        object_type,
                        sample_rate_index: sr_index,
                        channel_config,
                        ..Default::default()
                    };
                    config.complete();

                    let bytes = write_mpeg4_audio_config(&config).unwrap();
                    let parsed = parse_mpeg4_audio_config(&bytes).unwrap();
                    assert_eq!(parsed.object_type, object_type);
                    assert_eq!(parsed.sample_rate_index, sr_index);
                    assert_eq!(parsed.channel_config, channel_config);
                }
            }
        }
    }

    #[test]
    fn test_mpeg4_config_escaped_sample_rate() {
        let config = Mpeg4AudioConfig {
            object_type: 2,
            sample_rate_index: 0x10,
            channel_config: 2,
            ..Default::default()
        };

        let bytes = write_mpeg4_audio_config(&config).unwrap();
        let parsed = parse_mpeg4_audio_config(&bytes).unwrap();
        assert_eq!(parsed.sample_rate_index, 0x10);
    }

    #[test]
    fn test_mpeg4_config_known_bytes() {
        // AAC-LC, 44.1 kHz, stereo: 0x12 0x10.
        let parsed = parse_mpeg4_audio_config(&[0x12, 0x10]).unwrap();
        assert_eq!(parsed.object_type, 2);
        assert_eq!(parsed.sample_rate_index, 4);
        assert_eq!(parsed.sample_rate, 44100);
        assert_eq!(parsed.channel_config, 2);
        assert_eq!(parsed.channel_layout.count(), 2);
    }

    #[test]
    fn test_empty_config_is_error() {
        assert!(parse_mpeg4_audio_config(&[]).is_err());
    }
}
