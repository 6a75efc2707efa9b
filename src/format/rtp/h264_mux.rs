//! H.264 RTP packetization (RFC 6184 single NAL unit and FU-A modes).

use super::mux::RtpMuxer;
use crate::av::VideoPacket;
use crate::codec::h264::NAL_FU_A;
use crate::format::sdp;
use crate::utils::split_nal_units;
use bytes::BytesMut;
use std::time::Duration;

/// Fragments outgoing H.264 access units into interleaved RTP packets.
///
/// Key frames are preceded by the SPS and PPS so a receiver joining
/// mid-stream can initialize. NAL units that fit the MTU go out as
/// single-NAL packets; larger ones are split into FU-A fragments with
/// S/E bits. The RTP marker is set only on the last packet of the last
/// NAL unit of the access unit.
pub struct H264Packetizer {
    muxer: RtpMuxer,
    mtu: usize,
    sps: Vec<u8>,
    pps: Vec<u8>,
}

/// FU-A overhead: indicator plus header byte.
const FU_A_HEADER_SIZE: usize = 2;

impl H264Packetizer {
    /// Parameter sets come from the SDP when present, otherwise from the
    /// codec parameters carried by the outgoing packets.
    pub fn new(media: &sdp::Media, channel: u8, mtu: usize) -> Self {
        let (sps, pps) = if media.sprop_parameter_sets.len() >= 2 {
            (
                media.sprop_parameter_sets[0].clone(),
                media.sprop_parameter_sets[1].clone(),
            )
        } else {
            (Vec::new(), Vec::new())
        };

        Self {
            muxer: RtpMuxer::new(media, channel),
            mtu,
            sps,
            pps,
        }
    }

    pub fn set_parameter_sets(&mut self, sps: &[u8], pps: &[u8]) {
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

        let sps_buf;
        let pps_buf;
        let mut nals: Vec<&[u8]> = Vec::with_capacity(units.len() + 2);
        if packet.is_key_frame && !self.sps.is_empty() && !self.pps.is_empty() {
            sps_buf = self.sps.clone();
            pps_buf = self.pps.clone();
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
        // Small enough for single NAL unit packet mode.
        if nal.len() <= self.mtu {
            self.muxer.write_rtp(nal, time, is_last_nal, out);
            return;
        }

        if nal.len() < 2 {
            // Malformed, skip quietly.
            return;
        }

        let header = nal[0];
        let payload = &nal[1..];

        // FU indicator: F and NRI from the original header, type 28.
        let fu_indicator = (header & 0xE0) | NAL_FU_A;
        let base_fu_header = header & 0x1F;

        let max_fragment = self.mtu.saturating_sub(FU_A_HEADER_SIZE);
        if max_fragment == 0 {
            // Pathological MTU; send as-is rather than looping forever.
            self.muxer.write_rtp(nal, time, is_last_nal, out);
            return;
        }

        let mut offset = 0;
        let mut fu_payload = Vec::with_capacity(FU_A_HEADER_SIZE + max_fragment);
        while offset < payload.len() {
            let remaining = payload.len() - offset;
            let fragment_size = remaining.min(max_fragment);
            let start = offset == 0;
            let end = remaining <= max_fragment;

            let mut fu_header = base_fu_header;
            if start {
                fu_header |= 0x80;
            }
            if end {
                fu_header |= 0x40;
            }

            fu_payload.clear();
            fu_payload.push(fu_indicator);
            fu_payload.push(fu_header);
            fu_payload.extend_from_slice(&payload[offset..offset + fragment_size]);

            // Marker only on the E fragment of the access unit's last NAL.
            self.muxer.write_rtp(&fu_payload, time, is_last_nal && end, out);
            offset += fragment_size;
        }
    }
}

/// Splits a byte stream of interleaved frames into RTP datagrams.
/// Shared by the packetizer round-trip tests.
#[cfg(test)]
pub(crate) fn split_interleaved(mut data: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut frames = Vec::new();
    while data.len() >= 4 {
        assert_eq!(data[0], super::INTERLEAVED_MAGIC);
        let channel = data[1];
        let len = u16::from_be_bytes([data[2], data[3]]) as usize;
        frames.push((channel, data[4..4 + len].to_vec()));
        data = &data[4 + len..];
    }
    assert!(data.is_empty());
    frames
}
