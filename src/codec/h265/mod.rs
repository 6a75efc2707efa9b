mod parser;
mod types;

pub use parser::{nal_to_rbsp, parse_sps};
pub use types::*;

use crate::error::{Result, RtspError};

const BITRATE_ESTIMATION_FACTOR: f64 = 1.71;
const REFERENCE_FRAME_RATE: f64 = 30.0;
const KBPS_TO_BPS: f64 = 1000.0;

/// Stream parameters derived from a VPS/SPS/PPS triple.
#[derive(Debug, Clone)]
pub struct H265Parameters {
    stream_index: u8,
    bitrate: u64,
    vps: Vec<u8>,
    sps: Vec<u8>,
    pps: Vec<u8>,
    sps_info: SpsInfo,
    /// Frame rate comes from SDP (`a=x-framerate`), not the SPS.
    fps: u32,
}

impl H265Parameters {
    pub fn from_vps_sps_pps(vps: &[u8], sps: &[u8], pps: &[u8]) -> Result<Self> {
        if vps.is_empty() || sps.len() < 6 || pps.is_empty() {
            return Err(RtspError::Parse("h265: VPS/SPS/PPS too short".into()));
        }

        let sps_info = parse_sps(sps)?;
        let bitrate = estimate_bitrate(&sps_info);

        Ok(Self {
            stream_index: 0,
            bitrate,
            vps: vps.to_vec(),
            sps: sps.to_vec(),
            pps: pps.to_vec(),
            sps_info,
            fps: 0,
        })
    }

    pub fn with_stream_index(mut self, index: u8) -> Self {
        self.stream_index = index;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn stream_index(&self) -> u8 {
        self.stream_index
    }

    pub fn bitrate(&self) -> u64 {
        self.bitrate
    }

    pub fn vps(&self) -> &[u8] {
        &self.vps
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
        self.fps
    }

    pub fn tag(&self) -> String {
        format!(
            "hev1.{:01X}.{:01X}.L{:02X}.90",
            self.sps[3], self.sps[4], self.sps[5]
        )
    }
}

fn estimate_bitrate(info: &SpsInfo) -> u64 {
    (info.width as f64 * BITRATE_ESTIMATION_FACTOR * KBPS_TO_BPS * (REFERENCE_FRAME_RATE / 30.0))
        as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parameters_from_vps_sps_pps() {
        let sps = build_test_sps(1280, 720);
        let vps = vec![0x40, 0x01, 0x0C, 0x01, 0xFF, 0xFF];
        let pps = vec![0x44, 0x01, 0xC1, 0x72, 0xB4, 0x62, 0x40];

        let params = H265Parameters::from_vps_sps_pps(&vps, &sps, &pps)
            .unwrap()
            .with_stream_index(2)
            .with_fps(25);

        assert_eq!(params.stream_index(), 2);
        assert_eq!(params.width(), 1280);
        assert_eq!(params.height(), 720);
        assert_eq!(params.fps(), 25);
        assert_eq!(params.vps(), &vps[..]);
        assert!(params.bitrate() > 0);
        assert!(params.tag().starts_with("hev1."));
    }

    #[test]
    fn test_missing_parameter_sets_rejected() {
        let sps = build_test_sps(640, 480);
        assert!(H265Parameters::from_vps_sps_pps(&[], &sps, &[0x44]).is_err());
        assert!(H265Parameters::from_vps_sps_pps(&[0x40], &sps, &[]).is_err());
    }

    #[test]
    fn test_key_frame_type_range() {
        assert!(!is_key_frame_type(1));
        assert!(is_key_frame_type(16));
        assert!(is_key_frame_type(19));
        assert!(is_key_frame_type(21));
        assert!(!is_key_frame_type(22));
        assert!(!is_key_frame_type(NAL_SPS));
    }

    fn build_test_sps(width: u32, height: u32) -> Vec<u8> {
        use crate::utils::BitWriter;

        fn ue(w: &mut BitWriter, v: u32) {
            let len = 32 - (v + 1).leading_zeros();
            w.write_bits(v + 1, 2 * len - 1).unwrap();
        }

        let mut w = BitWriter::new();
        w.write_bits(33 << 1, 8).unwrap();
        w.write_bits(1, 8).unwrap();
        w.write_bits(0, 4).unwrap();
        w.write_bits(0, 3).unwrap();
        w.write_bits(1, 1).unwrap();
        w.write_bits(0, 2).unwrap();
        w.write_bits(0, 1).unwrap();
        w.write_bits(1, 5).unwrap();
        w.write_bits(0x6000_0000, 32).unwrap();
        w.write_bits(0, 32).unwrap();
        w.write_bits(0, 16).unwrap();
        w.write_bits(120, 8).unwrap();
        ue(&mut w, 0);
        ue(&mut w, 1);
        ue(&mut w, width);
        ue(&mut w, height);
        w.write_bits(0, 1).unwrap();
        ue(&mut w, 0);
        ue(&mut w, 0);
        ue(&mut w, 0);
        w.write_bits(1, 1).unwrap();
        ue(&mut w, 0);
        ue(&mut w, 0);
        ue(&mut w, 0);
        for _ in 0..6 {
            ue(&mut w, 0);
        }
        w.finish()
    }
}
