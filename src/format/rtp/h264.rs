//! H.264 RTP depacketization (RFC 6184).

use super::demux::RtpPacket;
use super::{bin_size, rtp_time, Depacketizer};
use crate::av::{CodecParameters, Packet, VideoPacket};
use crate::buffer::{BufferPool, PooledBuffer};
use crate::codec::h264::{
    H264Parameters, NAL_AUD, NAL_FU_A, NAL_IDR, NAL_NON_IDR, NAL_PPS, NAL_RESERVED_MAX, NAL_SPS,
    NAL_STAP_A, NAL_TYPE_MASK,
};
use crate::error::{Result, RtspError};
use crate::format::sdp;
use crate::utils::split_nal_units;
use chrono::Utc;
use log::{debug, trace, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// FU-A reassembly state.
enum FuState {
    Idle,
    /// Accumulating fragments; the buffer opens with the reconstructed
    /// NAL header byte.
    Accumulating(PooledBuffer),
}

/// Reassembles H.264 access units from RTP payloads.
///
/// Single NAL units (types 1-5) are emitted directly, STAP-A aggregates
/// are unpacked, and FU-A fragments accumulate until the end bit. SPS and
/// PPS units update the cached parameter sets; a change re-derives the
/// stream's `CodecParameters` wholesale. Emitted payloads carry 4-byte
/// big-endian length prefixes (the AVCC convention used downstream).
pub struct H264Depacketizer {
    pool: BufferPool,
    stream_index: u8,
    clock_rate: u32,
    sps: Vec<u8>,
    pps: Vec<u8>,
    params: Arc<CodecParameters>,
    packets: VecDeque<Packet>,
    fu: FuState,
}

impl H264Depacketizer {
    /// Builds a depacketizer from the track's SDP media section. The
    /// `sprop-parameter-sets` attribute must carry a valid SPS/PPS pair;
    /// this is a single-shot parse, so failure is fatal to stream setup.
    pub fn new(media: &sdp::Media, stream_index: u8, pool: BufferPool) -> Result<Self> {
        if media.sprop_parameter_sets.len() < 2 {
            return Err(RtspError::Parse("no valid h264 params found".into()));
        }

        let sps = media.sprop_parameter_sets[0].clone();
        let pps = media.sprop_parameter_sets[1].clone();
        let params = H264Parameters::from_sps_pps(&sps, &pps)?.with_stream_index(stream_index);

        Ok(Self {
            pool,
            stream_index,
            clock_rate: media.time_scale,
            sps,
            pps,
            params: Arc::new(CodecParameters::H264(params)),
            packets: VecDeque::new(),
            fu: FuState::Idle,
        })
    }

    /// Current codec parameters (replaced wholesale on SPS/PPS change).
    pub fn parameters(&self) -> Arc<CodecParameters> {
        Arc::clone(&self.params)
    }

    fn process_nal(&mut self, nal: &[u8], timestamp: u32) {
        if nal.is_empty() {
            warn!("h264: empty nal unit");
            return;
        }

        let nal_type = nal[0] & NAL_TYPE_MASK;
        match nal_type {
            NAL_NON_IDR..=NAL_IDR => self.add_packet(nal, nal_type == NAL_IDR, timestamp),
            NAL_SPS => self.update_sps(nal),
            NAL_PPS => self.update_pps(nal),
            NAL_AUD => {}
            NAL_STAP_A => self.process_stap_a(nal, timestamp),
            NAL_FU_A => self.process_fu_a(nal, timestamp),
            t if t <= NAL_RESERVED_MAX => {
                trace!("h264: ignoring non-VCL nal type {t}");
            }
            t => {
                debug!("h264: unsupported nal type {t}");
            }
        }
    }

    /// STAP-A: 2-byte-length-prefixed sub-NALs after the indicator byte.
    fn process_stap_a(&mut self, nal: &[u8], timestamp: u32) {
        let mut rest = &nal[1..];
        while rest.len() >= 2 {
            let size = u16::from_be_bytes([rest[0], rest[1]]) as usize;
            if size + 2 > rest.len() {
                break;
            }
            let sub = &rest[2..size + 2];
            if !sub.is_empty() {
                let sub_type = sub[0] & NAL_TYPE_MASK;
                match sub_type {
                    NAL_NON_IDR..=NAL_IDR => {
                        self.add_packet(sub, sub_type == NAL_IDR, timestamp)
                    }
                    NAL_SPS => self.update_sps(sub),
                    NAL_PPS => self.update_pps(sub),
                    _ => {}
                }
            }
            rest = &rest[size + 2..];
        }
    }

    fn process_fu_a(&mut self, nal: &[u8], timestamp: u32) {
        if nal.len() < 2 {
            warn!("h264: truncated FU-A unit");
            return;
        }

        let fu_indicator = nal[0];
        let fu_header = nal[1];
        let is_start = fu_header & 0x80 != 0;
        let is_end = fu_header & 0x40 != 0;

        if is_start {
            let mut buf = self.pool.get(0);
            // Reconstructed NAL header: F/NRI from the indicator, type
            // from the FU header.
            buf.extend_from_slice(&[fu_indicator & 0xe0 | fu_header & 0x1f]);
            self.fu = FuState::Accumulating(buf);
        }

        let mut complete = false;
        if let FuState::Accumulating(buf) = &mut self.fu {
            buf.extend_from_slice(&nal[2..]);
            complete = is_end;
        }
        // Fragments arriving without a preceding start bit find no
        // accumulator: the gap discards the unit.

        if complete {
            if let FuState::Accumulating(buf) = std::mem::replace(&mut self.fu, FuState::Idle) {
                self.finalize_fu_a(buf, timestamp);
            }
        }
    }

    fn finalize_fu_a(&mut self, buf: PooledBuffer, timestamp: u32) {
        let mut nal_type = buf.data()[0] & NAL_TYPE_MASK;

        if nal_type == NAL_SPS || nal_type == NAL_AUD {
            // Some encoders pack SPS/PPS/IDR behind one FU-A sequence as
            // an Annex-B run; split and reroute each embedded unit.
            let mut prefixed = Vec::with_capacity(4 + buf.len());
            prefixed.extend_from_slice(&[0, 0, 0, 1]);
            prefixed.extend_from_slice(buf.data());

            let mut idr: Option<Vec<u8>> = None;
            {
                let (units, _) = split_nal_units(&prefixed);
                for unit in units {
                    if unit.is_empty() {
                        continue;
                    }
                    match unit[0] & NAL_TYPE_MASK {
                        NAL_IDR => idr = Some(unit.to_vec()),
                        NAL_SPS => self.update_sps(unit),
                        NAL_PPS => self.update_pps(unit),
                        _ => {}
                    }
                }
            }

            if let Some(idr) = idr {
                self.add_packet(&idr, true, timestamp);
                return;
            }
            nal_type = buf.data()[0] & NAL_TYPE_MASK;
        }

        self.add_packet(buf.data(), nal_type == NAL_IDR, timestamp);
    }

    /// Queues one AVCC-framed packet for `pop`.
    fn add_packet(&mut self, nal: &[u8], is_key_frame: bool, timestamp: u32) {
        let mut buf = self.pool.get(0);
        buf.extend_from_slice(&bin_size(nal.len()));
        buf.extend_from_slice(nal);

        self.packets.push_back(Packet::Video(VideoPacket {
            stream_index: self.stream_index,
            time: rtp_time(timestamp, self.clock_rate),
            duration: Duration::ZERO,
            captured_at: Utc::now(),
            url: String::new(),
            data: buf.freeze(),
            params: Arc::clone(&self.params),
            is_key_frame,
        }));
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
        match H264Parameters::from_sps_pps(&self.sps, &self.pps) {
            Ok(params) => {
                self.params = Arc::new(CodecParameters::H264(
                    params.with_stream_index(self.stream_index),
                ));
            }
            Err(e) => {
                // Keep serving the previous parameters; the malformed
                // set is dropped per-unit.
                warn!("h264: parameter set update failed: {e}");
            }
        }
    }
}

impl Depacketizer for H264Depacketizer {
    fn push(&mut self, rtp: &RtpPacket<'_>) -> Result<()> {
        let (units, _) = split_nal_units(rtp.payload);
        for unit in units {
            self.process_nal(unit, rtp.timestamp);
        }
        Ok(())
    }

    fn pop(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::av::CodecType;
    use crate::utils::BitWriter;
    use pretty_assertions::assert_eq;

    fn ue(w: &mut BitWriter, v: u32) {
        let len = 32 - (v + 1).leading_zeros();
        w.write_bits(v + 1, 2 * len - 1).unwrap();
    }

    pub(crate) fn test_sps(width_mbs: u32) -> Vec<u8> {
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
        ue(&mut w, width_mbs - 1);
        ue(&mut w, 14);
        w.write_bits(1, 1).unwrap();
        w.write_bits(1, 1).unwrap();
        w.write_bits(0, 1).unwrap();
        w.write_bits(0, 1).unwrap();
        w.finish()
    }

    fn test_media() -> sdp::Media {
        sdp::Media {
            kind: "video".into(),
            codec: Some(CodecType::H264),
            payload_type: 96,
            time_scale: 90000,
            sprop_parameter_sets: vec![test_sps(20), vec![0x68, 0xCE, 0x38, 0x80]],
            ..Default::default()
        }
    }

    fn depacketizer() -> H264Depacketizer {
        H264Depacketizer::new(&test_media(), 0, BufferPool::new()).unwrap()
    }

    fn rtp<'a>(payload: &'a [u8], timestamp: u32, marker: bool) -> RtpPacket<'a> {
        RtpPacket {
            payload,
            timestamp,
            sequence: 0,
            payload_type: 96,
            marker,
        }
    }

    #[test]
    fn test_missing_sprops_is_fatal() {
        let media = sdp::Media {
            kind: "video".into(),
            codec: Some(CodecType::H264),
            ..Default::default()
        };
        assert!(H264Depacketizer::new(&media, 0, BufferPool::new()).is_err());
    }

    #[test]
    fn test_single_nal_slice() {
        let mut d = depacketizer();
        let slice = [0x41, 0x9A, 0x01, 0x02, 0x03];
        d.push(&rtp(&slice, 90000, true)).unwrap();

        let pkt = d.pop().unwrap();
        assert!(!pkt.is_key_frame());
        assert_eq!(pkt.time(), Duration::from_secs(1));
        // AVCC framing: 4-byte length prefix then the NAL.
        assert_eq!(&pkt.data()[..4], &[0, 0, 0, 5]);
        assert_eq!(&pkt.data()[4..], &slice);
        assert!(d.pop().is_none());
    }

    #[test]
    fn test_idr_is_key_frame() {
        let mut d = depacketizer();
        d.push(&rtp(&[0x65, 0x88, 0x80, 0x10], 0, true)).unwrap();
        assert!(d.pop().unwrap().is_key_frame());
    }

    #[test]
    fn test_stap_a_unpacks_sub_nals() {
        let mut d = depacketizer();
        let slice_a = [0x41, 0x9A, 0x01];
        let slice_b = [0x65, 0x88, 0x02, 0x03];
        let mut stap = vec![0x78]; // STAP-A indicator (type 24)
        stap.extend_from_slice(&(slice_a.len() as u16).to_be_bytes());
        stap.extend_from_slice(&slice_a);
        stap.extend_from_slice(&(slice_b.len() as u16).to_be_bytes());
        stap.extend_from_slice(&slice_b);

        d.push(&rtp(&stap, 0, true)).unwrap();

        let first = d.pop().unwrap();
        assert_eq!(&first.data()[4..], &slice_a);
        assert!(!first.is_key_frame());
        let second = d.pop().unwrap();
        assert_eq!(&second.data()[4..], &slice_b);
        assert!(second.is_key_frame());
    }

    #[test]
    fn test_fu_a_reassembly() {
        let mut d = depacketizer();

        // Original NAL: IDR with payload bytes 1..=6.
        let header = 0x65u8;
        let body = [1u8, 2, 3, 4, 5, 6];
        let indicator = (header & 0xe0) | 28;

        let mut start = vec![indicator, 0x80 | (header & 0x1f)];
        start.extend_from_slice(&body[..2]);
        let mut middle = vec![indicator, header & 0x1f];
        middle.extend_from_slice(&body[2..4]);
        let mut end = vec![indicator, 0x40 | (header & 0x1f)];
        end.extend_from_slice(&body[4..]);

        d.push(&rtp(&start, 3000, false)).unwrap();
        assert!(d.pop().is_none());
        d.push(&rtp(&middle, 3000, false)).unwrap();
        assert!(d.pop().is_none());
        d.push(&rtp(&end, 3000, true)).unwrap();

        let pkt = d.pop().unwrap();
        assert!(pkt.is_key_frame());
        let mut expected = vec![0, 0, 0, 7, header];
        expected.extend_from_slice(&body);
        assert_eq!(pkt.data(), &expected[..]);
    }

    #[test]
    fn test_fu_a_without_start_is_dropped() {
        let mut d = depacketizer();
        let indicator = 0x60 | 28;
        // Continuation and end fragments with no preceding start bit.
        d.push(&rtp(&[indicator, 0x05, 0xAA], 0, false)).unwrap();
        d.push(&rtp(&[indicator, 0x45, 0xBB], 0, true)).unwrap();
        assert!(d.pop().is_none());
    }

    #[test]
    fn test_sps_change_rederives_parameters() {
        let mut d = depacketizer();
        let initial = d.parameters();
        assert_eq!(initial.width(), Some(320));

        let wider = test_sps(40); // 640 pixels wide
        d.push(&rtp(&wider, 0, false)).unwrap();

        let updated = d.parameters();
        assert_eq!(updated.width(), Some(640));
        // Wholesale replacement, not mutation.
        assert_eq!(initial.width(), Some(320));
        assert!(d.pop().is_none());
    }

    #[test]
    fn test_aud_ignored() {
        let mut d = depacketizer();
        d.push(&rtp(&[0x09, 0xF0], 0, false)).unwrap();
        assert!(d.pop().is_none());
    }

    #[test]
    fn test_packet_params_track_current_sps() {
        let mut d = depacketizer();
        d.push(&rtp(&test_sps(40), 0, false)).unwrap();
        d.push(&rtp(&[0x65, 0x88, 0x01], 0, true)).unwrap();
        let pkt = d.pop().unwrap();
        assert_eq!(pkt.params().width(), Some(640));
    }
}
