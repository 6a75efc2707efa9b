mod parser;
mod types;

pub use parser::{parse_sps, remove_emulation_bytes};
pub use types::*;

use crate::error::{Result, RtspError};

const BITRATE_ESTIMATION_FACTOR: f64 = 2.0;
const REFERENCE_FRAME_RATE: f64 = 30.0;
const KBPS_TO_BPS: f64 = 1000.0;

/// Stream parameters derived from an SPS/PPS pair.
#[derive(Debug, Clone)]
pub struct H264Parameters {
    stream_index: u8,
    bitrate: u64,
    sps: Vec<u8>,
    pps: Vec<u8>,
    sps_info: SpsInfo,
}

impl H264Parameters {
    pub fn from_sps_pps(sps: &[u8], pps: &[u8]) -> Result<Self> {
        if sps.len() < 4 || pps.is_empty() {
            return Err(RtspError::Parse("h264: SPS/PPS too short".into()));
        }

        let sps_info = parse_sps(sps)?;
        let bitrate = estimate_bitrate(&sps_info);

        Ok(Self {
            stream_index: 0,
            bitrate,
            sps: sps.to_vec(),
            pps: pps.to_vec(),
            sps_info,
        })
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

    pub fn sps(&self) -> &[u8] {
        &self.sps
    }

    pub fn pps(&self) -> &[u8] {
        &self.pps
    }

    pub fn sps_info(&self) -> &SpsInfo {
        &self.sps_info
    }

    pub fn width(&self) -> u32 {
        self.sps_info.width
    }

    pub fn height(&self) -> u32 {
        self.sps_info.height
    }

    pub fn fps(&self) -> u32 {
        self.sps_info.fps
    }

    pub fn tag(&self) -> String {
        format!(
            "avc1.{:02X}{:02X}{:02X}",
            self.sps[1], self.sps[2], self.sps[3]
        )
    }
}

fn estimate_bitrate(info: &SpsInfo) -> u64 {
    let fps = if info.fps == 0 {
        REFERENCE_FRAME_RATE
    } else {
        info.fps as f64
    };
    (info.width as f64 * BITRATE_ESTIMATION_FACTOR * (REFERENCE_FRAME_RATE / fps) * KBPS_TO_BPS)
        as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::BitWriter;
    use pretty_assertions::assert_eq;

    fn ue(w: &mut BitWriter, v: u32) {
        let len = 32 - (v + 1).leading_zeros();
        w.write_bits(v + 1, 2 * len - 1).unwrap();
    }

    fn minimal_sps() -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bits(0x67, 8).unwrap();
        w.write_bits(66, 8).unwrap();
        w.write_bits(0, 8).unwrap();
        w.write_bits(30, 8).unwrap();
        ue(&mut w, 0);
        ue(&mut w, 0);
        ue(&mut w, 0);
        ue(&mut w, 0);
        ue(&mut w, 1);
        w.write_bits(0, 1).unwrap();
        ue(&mut w, 19); // 320 wide
        ue(&mut w, 14); // 240 tall
        w.write_bits(1, 1).unwrap();
        w.write_bits(1, 1).unwrap();
        w.write_bits(0, 1).unwrap();
        w.write_bits(0, 1).unwrap();
        w.finish()
    }

    #[test]
    fn test_parameters_from_sps_pps() {
        let sps = minimal_sps();
        let pps = vec![0x68, 0xCE, 0x38, 0x80];
        let params = H264Parameters::from_sps_pps(&sps, &pps)
            .unwrap()
            .with_stream_index(3);

        assert_eq!(params.stream_index(), 3);
        assert_eq!(params.width(), 320);
        assert_eq!(params.height(), 240);
        assert_eq!(params.sps(), &sps[..]);
        assert_eq!(params.pps(), &pps[..]);
        assert_eq!(params.tag(), "avc1.42001E");
        assert!(params.bitrate() > 0);
    }

    #[test]
    fn test_short_parameter_sets_rejected() {
        assert!(H264Parameters::from_sps_pps(&[0x67, 0x42], &[0x68]).is_err());
        assert!(H264Parameters::from_sps_pps(&minimal_sps(), &[]).is_err());
    }
}
