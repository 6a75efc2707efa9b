//! H.265 RTP packetization (RFC 7798 single NAL unit and FU modes).

use super::mux::RtpMuxer;
use crate::av::VideoPacket;
use crate::codec::h265::NAL_FU;
use crate::format::sdp;
use crate::utils::split_nal_units;
use bytes::BytesMut;
use std::time::Duration;

/// Fragments outgoing H.265 access units into interleaved RTP packets.
///
/// Mirrors the H.264 packetizer with the 2-byte NAL header: key frames
/// are preceded by VPS/SPS/PPS, oversized NAL units become FU packets
/// (type 49) with a 1-byte FU header, and the RTP marker goes only on
/// the final packet of the access unit.
pub struct H265Packetizer {
    muxer: RtpMuxer,
    mtu: usize,
    vps: Vec<u8>,
    sps: Vec<u8>,
    pps: Vec<u8>,
}

/// FU overhead: 2-byte payload header plus the FU header byte.
const FU_HEADER_SIZE: usize = 3;

impl H265Packetizer {
    pub fn new(media: &sdp::Media, channel: u8, mtu: usize) -> Self {
        Self {
            muxer: RtpMuxer::new(media, channel),
            mtu,
            vps: media.sprop_vps.clone(),
            sps: media.sprop_sps.clone(),
            pps: media.sprop_pps.clone(),
        }
    }

    pub fn set_parameter_sets(&mut self, vps: &[u8], sps: &[u8], pps: &[u8]) {
        self.vps = vps.to_vec();
        self.sps = sps.to_vec();
        self.pps = pps.to_vec();
    }

    /// Packetizes one access unit (AVCC-framed payload) into `out`.
    pub fn packetize(&mut self, packet: &VideoPacket, out: &mut BytesMut) {
        let data = packet.data.data();
        if data.is_empty() {
            return;
        }

        let (units, _) = split_nal_units(data);
        if units.is_empty() {
            return;
        }

        let vps_buf;
        let sps_buf;
        let pps_buf;
        let mut nals: Vec<&[u8]> = Vec::with_capacity(units.len() + 3);
        if packet.is_key_frame
            && !self.vps.is_empty()
            && !self.sps.is_empty()
            && !self.pps.is_empty()
        {
            vps_buf = self.vps.clone();
            sps_buf = self.sps.clone();
            pps_buf = self.pps.clone();
            nals.push(&vps_buf);
            nals.push(&sps_buf);
            nals.push(&pps_buf);
        }
        nals.extend(units);

        let last = nals.len() - 1;
        for (i, nal) in nals.iter().enumerate() {
            self.write_nal(nal, packet.time, i == last, out);
        }
    }

    fn write_nal(&mut self, nal: &[u8], time: Duration, is_last_nal: bool, out: &mut BytesMut) {
        if nal.len() <= self.mtu {
            self.muxer.write_rtp(nal, time, is_last_nal, out);
            return;
        }

        if nal.len() < 3 {
            // Malformed, skip quietly.
            return;
        }

        let original_type = (nal[0] >> 1) & 0x3f;
        let payload = &nal[2..];

        // FU payload header: F and layer bits preserved, type 49.
        let fu_indicator = [(nal[0] & 0x81) | (NAL_FU << 1), nal[1]];

        let max_fragment = self.mtu.saturating_sub(FU_HEADER_SIZE);
        if max_fragment == 0 {
            self.muxer.write_rtp(nal, time, is_last_nal, out);
            return;
        }

        let mut offset = 0;
        let mut fu_payload = Vec::with_capacity(FU_HEADER_SIZE + max_fragment);
        while offset < payload.len() {
            let remaining = payload.len() - offset;
            let fragment_size = remaining.min(max_fragment);
            let start = offset == 0;
            let end = remaining <= max_fragment;

            let mut fu_header = original_type;
            if start {
                fu_header |= 0x80;
            }
            if end {
                fu_header |= 0x40;
            }

            fu_payload.clear();
            fu_payload.extend_from_slice(&fu_indicator);
            fu_payload.push(fu_header);
            fu_payload.extend_from_slice(&payload[offset..offset + fragment_size]);

            self.muxer.write_rtp(&fu_payload, time, is_last_nal && end, out);
            offset += fragment_size;
        }
    }
}
