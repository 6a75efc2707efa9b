//! H.265 RTP depacketization (RFC 7798).

use super::demux::RtpPacket;
use super::{bin_size, rtp_time, Depacketizer};
use crate::av::{CodecParameters, Packet, VideoPacket};
use crate::buffer::{BufferPool, PooledBuffer};
use crate::codec::h265::{
    is_key_frame_type, nal_type, H265Parameters, NAL_FU, NAL_PPS, NAL_PREFIX_SEI, NAL_SPS,
    NAL_UNSPECIFIED_48, NAL_VPS,
};
use crate::error::Result;
use crate::format::sdp;
use crate::utils::split_nal_units;
use chrono::Utc;
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// FU reassembly state for one fragmented NAL unit.
enum FuState {
    Idle,
    /// Buffer opens with the 2-byte reconstructed NAL header.
    Accumulating(PooledBuffer),
}

/// An access unit being accreted slice by slice. H.265 pictures may be
/// split into several slice-segment NALs that share a timestamp; the
/// first-slice-in-picture flag (bit 7 of the third payload byte) decides
/// whether a NAL starts a new unit or continues this one.
struct AccessUnit {
    buf: PooledBuffer,
    is_key: bool,
    timestamp: u32,
}

/// Reassembles H.265 access units from RTP payloads.
///
/// VPS/SPS/PPS units (types 32/33/34) update the cached parameter sets
/// and re-derive `CodecParameters`; FU fragments (type 49) accumulate
/// under their own 1-byte FU header; completed slices accrete into the
/// in-flight access unit, which is flushed whenever a new one starts.
/// Emitted payloads are AVCC length-prefixed.
pub struct H265Depacketizer {
    pool: BufferPool,
    stream_index: u8,
    clock_rate: u32,
    vps: Vec<u8>,
    sps: Vec<u8>,
    pps: Vec<u8>,
    params: Option<Arc<CodecParameters>>,
    packets: VecDeque<Packet>,
    fu: FuState,
    fu_has_key: bool,
    current: Option<AccessUnit>,
}

impl H265Depacketizer {
    /// Builds a depacketizer from the track's SDP media section. When
    /// `sprop-vps/sps/pps` are all present they must parse (single-shot,
    /// fatal on failure); when absent, parameters are derived from the
    /// first in-band parameter sets.
    pub fn new(media: &sdp::Media, stream_index: u8, pool: BufferPool) -> Result<Self> {
        let mut d = Self {
            pool,
            stream_index,
            clock_rate: media.time_scale,
            vps: media.sprop_vps.clone(),
            sps: media.sprop_sps.clone(),
            pps: media.sprop_pps.clone(),
            params: None,
            packets: VecDeque::new(),
            fu: FuState::Idle,
            fu_has_key: false,
            current: None,
        };

        if !d.vps.is_empty() && !d.sps.is_empty() && !d.pps.is_empty() {
            let params = H265Parameters::from_vps_sps_pps(&d.vps, &d.sps, &d.pps)?
                .with_stream_index(stream_index)
                .with_fps(media.fps);
            d.params = Some(Arc::new(CodecParameters::H265(params)));
        } else {
            debug!("h265: no sprop parameter sets in SDP, waiting for in-band sets");
        }

        Ok(d)
    }

    pub fn parameters(&self) -> Option<Arc<CodecParameters>> {
        self.params.clone()
    }

    fn process_nal(&mut self, nal: &[u8], timestamp: u32) -> Result<()> {
        if nal.len() < 2 {
            warn!("h265: truncated nal unit");
            return Ok(());
        }

        match nal_type(nal[0]) {
            NAL_VPS => self.update_vps(nal),
            NAL_SPS => self.update_sps(nal),
            NAL_PPS => self.update_pps(nal),
            NAL_PREFIX_SEI | NAL_UNSPECIFIED_48 => {}
            NAL_FU => self.process_fu(nal, timestamp),
            t => {
                if nal.len() < 3 {
                    warn!("h265: slice nal too short");
                    return Ok(());
                }
                let first_slice = nal[2] >> 7 & 1 == 1;
                if first_slice {
                    self.start_access_unit(nal, is_key_frame_type(t), timestamp);
                } else {
                    self.append_to_access_unit(nal, false);
                }
            }
        }
        Ok(())
    }

    fn process_fu(&mut self, nal: &[u8], timestamp: u32) {
        if nal.len() < 3 {
            warn!("h265: truncated FU unit");
            return;
        }

        let fu_header = nal[2];
        let is_start = fu_header & 0x80 != 0;
        let is_end = fu_header & 0x40 != 0;
        let fu_type = fu_header & 0x3f;
        let fragment = &nal[3..];

        self.fu_has_key = self.fu_has_key || is_key_frame_type(fu_type);

        if is_start {
            let mut buf = self.pool.get(0);
            // Reconstructed 2-byte NAL header: F bit and layer id bits
            // from the FU indicator pair, type from the FU header.
            buf.extend_from_slice(&[(nal[0] & 0x81) | (fu_type << 1), nal[1]]);
            buf.extend_from_slice(fragment);
            self.fu = FuState::Accumulating(buf);
            return;
        }

        let mut complete = false;
        if let FuState::Accumulating(buf) = &mut self.fu {
            buf.extend_from_slice(fragment);
            complete = is_end;
        }
        // Missing start fragment: no accumulator, the gap discards the
        // unit.

        if complete {
            if let FuState::Accumulating(buf) = std::mem::replace(&mut self.fu, FuState::Idle) {
                let has_key = self.fu_has_key;
                let data = buf.data().to_vec();
                if data.len() >= 3 && data[2] >> 7 & 1 == 1 {
                    self.start_access_unit(&data, has_key, timestamp);
                } else {
                    self.append_to_access_unit(&data, has_key);
                }
            }
            self.fu_has_key = false;
        }
    }

    /// Flushes the in-flight access unit (if any) and opens a new one.
    fn start_access_unit(&mut self, nal: &[u8], is_key: bool, timestamp: u32) {
        if let Some(finished) = self.current.take() {
            self.emit(finished);
        }

        let mut buf = self.pool.get(0);
        buf.extend_from_slice(&bin_size(nal.len()));
        buf.extend_from_slice(nal);
        self.current = Some(AccessUnit {
            buf,
            is_key,
            timestamp,
        });
    }

    fn append_to_access_unit(&mut self, nal: &[u8], is_key: bool) {
        if let Some(current) = &mut self.current {
            current.buf.extend_from_slice(&bin_size(nal.len()));
            current.buf.extend_from_slice(nal);
            current.is_key = current.is_key || is_key;
        }
        // A continuation with no unit in flight means we joined
        // mid-picture; drop it.
    }

    fn emit(&mut self, unit: AccessUnit) {
        let Some(params) = &self.params else {
            warn!("h265: dropping access unit, no codec parameters yet");
            return;
        };

        self.packets.push_back(Packet::Video(VideoPacket {
            stream_index: self.stream_index,
            time: rtp_time(unit.timestamp, self.clock_rate),
            duration: Duration::ZERO,
            captured_at: Utc::now(),
            url: String::new(),
            data: unit.buf.freeze(),
            params: Arc::clone(params),
            is_key_frame: unit.is_key,
        }));
    }

    fn update_vps(&mut self, vps: &[u8]) {
        if vps == self.vps.as_slice() {
            return;
        }
        self.vps = vps.to_vec();
        self.rederive_params();
    }

    fn update_sps(&mut self, sps: &[u8]) {
        if sps == self.sps.as_slice() {
            return;
        }
        self.sps = sps.to_vec();
        self.rederive_params();
    }

    fn update_pps(&mut self, pps: &[u8]) {
        if pps == self.pps.as_slice() {
            return;
        }
        self.pps = pps.to_vec();
        self.rederive_params();
    }

    fn rederive_params(&mut self) {
        if self.vps.is_empty() || self.sps.is_empty() || self.pps.is_empty() {
            return;
        }
        match H265Parameters::from_vps_sps_pps(&self.vps, &self.sps, &self.pps) {
            Ok(params) => {
                self.params = Some(Arc::new(CodecParameters::H265(
                    params.with_stream_index(self.stream_index),
                )));
            }
            Err(e) => {
                warn!("h265: parameter set update failed: {e}");
            }
        }
    }
}

impl Depacketizer for H265Depacketizer {
    fn push(&mut self, rtp: &RtpPacket<'_>) -> Result<()> {
        let (units, _) = split_nal_units(rtp.payload);
        for unit in units {
            self.process_nal(unit, rtp.timestamp)?;
        }
        Ok(())
    }

    fn pop(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::CodecType;
    use crate::utils::BitWriter;
    use pretty_assertions::assert_eq;

    fn ue(w: &mut BitWriter, v: u32) {
        let len = 32 - (v + 1).leading_zeros();
        w.write_bits(v + 1, 2 * len - 1).unwrap();
    }

    fn test_sps(width: u32, height: u32) -> Vec<u8> {
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

    fn test_vps() -> Vec<u8> {
        vec![32 << 1, 0x01, 0x0C, 0x01, 0xFF, 0xFF]
    }

    fn test_pps() -> Vec<u8> {
        vec![34 << 1, 0x01, 0xC1, 0x72, 0xB4]
    }

    fn test_media() -> sdp::Media {
        sdp::Media {
            kind: "video".into(),
            codec: Some(CodecType::H265),
            payload_type: 98,
            time_scale: 90000,
            sprop_vps: test_vps(),
            sprop_sps: test_sps(1280, 720),
            sprop_pps: test_pps(),
            ..Default::default()
        }
    }

    fn depacketizer() -> H265Depacketizer {
        H265Depacketizer::new(&test_media(), 0, BufferPool::new()).unwrap()
    }

    fn rtp<'a>(payload: &'a [u8], timestamp: u32, marker: bool) -> RtpPacket<'a> {
        RtpPacket {
            payload,
            timestamp,
            sequence: 0,
            payload_type: 98,
            marker,
        }
    }

    /// A slice NAL: 2-byte header, then the first-slice flag in bit 7 of
    /// the third byte.
    fn slice_nal(nal_unit_type: u8, first_slice: bool, body: &[u8]) -> Vec<u8> {
        let mut nal = vec![nal_unit_type << 1, 0x01];
        nal.push(if first_slice { 0x80 } else { 0x00 });
        nal.extend_from_slice(body);
        nal
    }

    #[test]
    fn test_sdp_parameters() {
        let d = depacketizer();
        let params = d.parameters().unwrap();
        assert_eq!(params.codec_type(), CodecType::H265);
        assert_eq!(params.width(), Some(1280));
        assert_eq!(params.height(), Some(720));
    }

    #[test]
    fn test_access_unit_flush_on_next_start() {
        let mut d = depacketizer();

        let idr = slice_nal(19, true, &[1, 2, 3]);
        d.push(&rtp(&idr, 9000, false)).unwrap();
        // Still accreting: nothing emitted until the next unit starts.
        assert!(d.pop().is_none());

        let next = slice_nal(1, true, &[4, 5]);
        d.push(&rtp(&next, 18000, false)).unwrap();

        let pkt = d.pop().unwrap();
        assert!(pkt.is_key_frame());
        assert_eq!(pkt.time(), Duration::from_millis(100));
        let mut expected = bin_size(idr.len()).to_vec();
        expected.extend_from_slice(&idr);
        assert_eq!(pkt.data(), &expected[..]);
    }

    #[test]
    fn test_sliced_picture_accretes() {
        let mut d = depacketizer();

        let first = slice_nal(1, true, &[1]);
        let second = slice_nal(1, false, &[2]);
        d.push(&rtp(&first, 0, false)).unwrap();
        d.push(&rtp(&second, 0, false)).unwrap();
        d.push(&rtp(&slice_nal(1, true, &[9]), 3000, false)).unwrap();

        let pkt = d.pop().unwrap();
        let mut expected = bin_size(first.len()).to_vec();
        expected.extend_from_slice(&first);
        expected.extend_from_slice(&bin_size(second.len()));
        expected.extend_from_slice(&second);
        assert_eq!(pkt.data(), &expected[..]);
        assert!(!pkt.is_key_frame());
    }

    #[test]
    fn test_fu_reassembly_key_frame() {
        let mut d = depacketizer();

        // Original NAL: IDR_W_RADL (19) fragmented into three FUs.
        let original = slice_nal(19, true, &[0xA1, 0xA2, 0xA3, 0xA4]);
        let payload = &original[2..];
        let fu_indicator = [NAL_FU << 1, 0x01];

        let mut start = fu_indicator.to_vec();
        start.push(0x80 | 19);
        start.extend_from_slice(&payload[..2]);
        let mut middle = fu_indicator.to_vec();
        middle.push(19);
        middle.extend_from_slice(&payload[2..4]);
        let mut end = fu_indicator.to_vec();
        end.push(0x40 | 19);
        end.extend_from_slice(&payload[4..]);

        d.push(&rtp(&start, 0, false)).unwrap();
        d.push(&rtp(&middle, 0, false)).unwrap();
        d.push(&rtp(&end, 0, true)).unwrap();
        assert!(d.pop().is_none());

        // Next access unit flushes the reassembled IDR.
        d.push(&rtp(&slice_nal(1, true, &[0]), 3000, false)).unwrap();
        let pkt = d.pop().unwrap();
        assert!(pkt.is_key_frame());
        let mut expected = bin_size(original.len()).to_vec();
        expected.extend_from_slice(&original);
        assert_eq!(pkt.data(), &expected[..]);
    }

    #[test]
    fn test_fu_without_start_is_dropped() {
        let mut d = depacketizer();
        let mut end = vec![NAL_FU << 1, 0x01, 0x40 | 19];
        end.extend_from_slice(&[1, 2, 3]);
        d.push(&rtp(&end, 0, true)).unwrap();
        d.push(&rtp(&slice_nal(1, true, &[0]), 3000, false)).unwrap();
        // Only the fresh slice opens a unit; the orphan FU never emitted.
        assert!(d.pop().is_none());
    }

    #[test]
    fn test_in_band_parameter_sets() {
        let media = sdp::Media {
            kind: "video".into(),
            codec: Some(CodecType::H265),
            payload_type: 98,
            time_scale: 90000,
            ..Default::default()
        };
        let mut d = H265Depacketizer::new(&media, 0, BufferPool::new()).unwrap();
        assert!(d.parameters().is_none());

        d.push(&rtp(&test_vps(), 0, false)).unwrap();
        d.push(&rtp(&test_sps(640, 360), 0, false)).unwrap();
        d.push(&rtp(&test_pps(), 0, false)).unwrap();

        let params = d.parameters().unwrap();
        assert_eq!(params.width(), Some(640));
        assert_eq!(params.height(), Some(360));
    }

    #[test]
    fn test_pps_change_rederives_parameters() {
        let mut d = depacketizer();
        let before = d.parameters().unwrap();

        let mut other_pps = test_pps();
        other_pps.push(0x55);
        d.push(&rtp(&other_pps, 0, false)).unwrap();

        let after = d.parameters().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }
}
