//! MJPEG RTP depacketization (RFC 2435).
//!
//! RTP/JPEG strips the JPEG headers from the wire; the depacketizer
//! rebuilds them (quantization tables, Huffman tables, SOF/SOS) from the
//! 8-byte main header and optional restart/quantization extensions, and
//! reassembles fragments keyed by their declared byte offsets.

use super::demux::RtpPacket;
use super::{rtp_time, Depacketizer};
use crate::av::{CodecParameters, Packet, VideoPacket};
use crate::buffer::BufferPool;
use crate::codec::mjpeg::MjpegParameters;
use crate::error::Result;
use crate::format::sdp;
use chrono::Utc;
use log::warn;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Main JPEG header size.
const MAIN_HEADER_SIZE: usize = 8;
/// Restart marker header size (types 64-127).
const RESTART_HEADER_SIZE: usize = 4;
/// Quantization table header size (Q values 128-255).
const QTABLE_HEADER_SIZE: usize = 4;
/// MJPEG always rides the 90 kHz video clock.
const MJPEG_CLOCK_RATE: u32 = 90000;

struct Fragment {
    offset: u32,
    data: Vec<u8>,
}

/// Reassembles JPEG frames from RTP/JPEG fragments.
///
/// Fragment offset 0 resets the accumulator and snapshots the frame
/// geometry; the RTP marker bit triggers offset-sorted, gap-checked
/// assembly (a missing offset aborts the frame silently). A fragment
/// with a different RTP timestamp than the frame in progress is a
/// desync and discards the frame. Every emitted frame is a key frame.
pub struct MjpegDepacketizer {
    pool: BufferPool,
    stream_index: u8,
    params: Arc<CodecParameters>,
    packets: VecDeque<Packet>,
    fragments: Vec<Fragment>,
    frame_timestamp: u32,
    last_timestamp: u32,
    frame_headers: Vec<u8>,
    restart_interval: u16,
}

impl MjpegDepacketizer {
    pub fn new(media: &sdp::Media, stream_index: u8, pool: BufferPool) -> Self {
        let fps = if media.fps == 0 { 30 } else { media.fps };
        // Placeholder dimensions until the first frame header arrives.
        let params = MjpegParameters::new(320, 240, fps).with_stream_index(stream_index);

        Self {
            pool,
            stream_index,
            params: Arc::new(CodecParameters::Mjpeg(params)),
            packets: VecDeque::new(),
            fragments: Vec::new(),
            frame_timestamp: 0,
            last_timestamp: 0,
            frame_headers: Vec::new(),
            restart_interval: 0,
        }
    }

    pub fn parameters(&self) -> Arc<CodecParameters> {
        Arc::clone(&self.params)
    }

    fn parse_payload(&mut self, rtp: &RtpPacket<'_>) {
        let payload = rtp.payload;
        if payload.len() < MAIN_HEADER_SIZE {
            warn!("mjpeg: incomplete main header");
            return;
        }

        let frag_offset =
            u32::from_be_bytes([0, payload[1], payload[2], payload[3]]);
        let jpeg_type = payload[4];
        let quality = payload[5];
        let width = payload[6];
        let height = payload[7];
        let mut offset = MAIN_HEADER_SIZE;

        if (64..=127).contains(&jpeg_type) {
            if payload.len() < offset + RESTART_HEADER_SIZE {
                warn!("mjpeg: incomplete restart marker header");
                return;
            }
            let restart_interval =
                u16::from_be_bytes([payload[offset], payload[offset + 1]]);
            let f_bit = payload[offset + 2] & 0x80 != 0;
            if !f_bit {
                self.restart_interval = restart_interval;
            }
            offset += RESTART_HEADER_SIZE;
        }

        let mut qtable_data: &[u8] = &[];
        if quality >= 128 {
            if payload.len() < offset + QTABLE_HEADER_SIZE {
                warn!("mjpeg: incomplete quantization table header");
                return;
            }
            let qtable_length =
                u16::from_be_bytes([payload[offset + 2], payload[offset + 3]]) as usize;
            offset += QTABLE_HEADER_SIZE;
            if qtable_length > 0 {
                if payload.len() < offset + qtable_length {
                    warn!("mjpeg: incomplete quantization table data");
                    return;
                }
                qtable_data = &payload[offset..offset + qtable_length];
                offset += qtable_length;
            }
        }

        if frag_offset == 0 {
            self.fragments.clear();
            self.frame_timestamp = rtp.timestamp;
            self.last_timestamp = rtp.timestamp;

            let actual_width = width as u32 * 8;
            let actual_height = height as u32 * 8;
            if Some(actual_width) != self.params.width()
                || Some(actual_height) != self.params.height()
            {
                let fps = self.params.fps().unwrap_or(30);
                self.params = Arc::new(CodecParameters::Mjpeg(
                    MjpegParameters::new(actual_width, actual_height, fps)
                        .with_stream_index(self.stream_index),
                ));
            }

            self.frame_headers =
                reconstruct_jpeg_headers(jpeg_type, width, height, quality, qtable_data, self.restart_interval);
        } else if self.last_timestamp != rtp.timestamp {
            // A continuation for a frame we never saw the start of.
            self.fragments.clear();
            return;
        }

        self.fragments.push(Fragment {
            offset: frag_offset,
            data: payload[offset..].to_vec(),
        });

        if rtp.marker {
            self.assemble_frame();
        }
    }

    fn assemble_frame(&mut self) {
        if self.fragments.is_empty() {
            return;
        }

        self.fragments.sort_by_key(|f| f.offset);

        if self.fragments[0].offset != 0 {
            // Missing start of frame.
            self.fragments.clear();
            return;
        }

        let mut expected_offset = 0u32;
        let mut gap = false;
        for frag in &self.fragments {
            if frag.offset != expected_offset {
                gap = true;
                break;
            }
            expected_offset += frag.data.len() as u32;
        }
        if gap {
            // A missing offset aborts the frame silently.
            self.fragments.clear();
            return;
        }

        let mut buf = self.pool.get(0);
        buf.extend_from_slice(&self.frame_headers);
        for frag in &self.fragments {
            buf.extend_from_slice(&frag.data);
        }

        // Terminate the stream if the camera did not.
        let data = buf.data();
        if data.len() < 2 || data[data.len() - 2] != 0xFF || data[data.len() - 1] != 0xD9 {
            buf.extend_from_slice(&[0xFF, 0xD9]);
        }

        self.packets.push_back(Packet::Video(VideoPacket {
            stream_index: self.stream_index,
            time: rtp_time(self.frame_timestamp, MJPEG_CLOCK_RATE),
            duration: Duration::ZERO,
            captured_at: Utc::now(),
            url: String::new(),
            data: buf.freeze(),
            params: Arc::clone(&self.params),
            is_key_frame: true,
        }));

        self.fragments.clear();
        self.restart_interval = 0;
    }
}

impl Depacketizer for MjpegDepacketizer {
    fn push(&mut self, rtp: &RtpPacket<'_>) -> Result<()> {
        self.parse_payload(rtp);
        Ok(())
    }

    fn pop(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }
}

fn reconstruct_jpeg_headers(
    jpeg_type: u8,
    width: u8,
    height: u8,
    quality: u8,
    qtable_data: &[u8],
    restart_interval: u16,
) -> Vec<u8> {
    let mut headers = Vec::with_capacity(1024);

    // SOI
    headers.extend_from_slice(&[0xFF, 0xD8]);
    headers.extend_from_slice(&app0_segment());

    if quality >= 128 && qtable_data.len() >= 64 {
        // In-band tables: first 64 bytes luma, next 64 chroma (reused
        // for chroma when only one table is sent).
        let lqt = &qtable_data[..64];
        let cqt = if qtable_data.len() >= 128 {
            &qtable_data[64..128]
        } else {
            lqt
        };
        headers.extend_from_slice(&dqt_segment(lqt, 0));
        headers.extend_from_slice(&dqt_segment(cqt, 1));
    } else {
        let (lqt, cqt) = scaled_quantization_tables(quality);
        headers.extend_from_slice(&dqt_segment(&lqt, 0));
        headers.extend_from_slice(&dqt_segment(&cqt, 1));
    }

    if restart_interval > 0 {
        headers.extend_from_slice(&dri_segment(restart_interval));
    }

    headers.extend_from_slice(&sof_segment(jpeg_type, width, height));
    append_huffman_tables(&mut headers);
    headers.extend_from_slice(&sos_segment());

    headers
}

fn app0_segment() -> [u8; 18] {
    let mut segment = [0u8; 18];
    segment[0] = 0xFF;
    segment[1] = 0xE0;
    segment[2] = 0x00;
    segment[3] = 0x10;
    segment[4..9].copy_from_slice(b"JFIF\0");
    segment[9] = 0x01; // version 1.1
    segment[10] = 0x01;
    segment[11] = 0x01; // density in dpi
    segment[13] = 0x48; // 72 dpi
    segment[15] = 0x48;
    segment
}

/// Standard luma/chroma tables from RFC 2435 appendix A, scaled by the
/// quality factor.
fn scaled_quantization_tables(quality: u8) -> ([u8; 64], [u8; 64]) {
    const LUMA: [i32; 64] = [
        16, 11, 10, 16, 24, 40, 51, 61, //
        12, 12, 14, 19, 26, 58, 60, 55, //
        14, 13, 16, 24, 40, 57, 69, 56, //
        14, 17, 22, 29, 51, 87, 80, 62, //
        18, 22, 37, 56, 68, 109, 103, 77, //
        24, 35, 55, 64, 81, 104, 113, 92, //
        49, 64, 78, 87, 103, 121, 120, 101, //
        72, 92, 95, 98, 112, 100, 103, 99,
    ];
    const CHROMA: [i32; 64] = [
        17, 18, 24, 47, 99, 99, 99, 99, //
        18, 21, 26, 66, 99, 99, 99, 99, //
        24, 26, 56, 99, 99, 99, 99, 99, //
        47, 66, 99, 99, 99, 99, 99, 99, //
        99, 99, 99, 99, 99, 99, 99, 99, //
        99, 99, 99, 99, 99, 99, 99, 99, //
        99, 99, 99, 99, 99, 99, 99, 99, //
        99, 99, 99, 99, 99, 99, 99, 99,
    ];

    let scale_factor: i32 = if quality == 0 {
        5000
    } else if quality > 99 {
        1
    } else if quality < 50 {
        5000 / quality as i32
    } else {
        200 - 2 * quality as i32
    };

    let mut lqt = [0u8; 64];
    let mut cqt = [0u8; 64];
    for i in 0..64 {
        lqt[i] = ((LUMA[i] * scale_factor + 50) / 100).clamp(1, 255) as u8;
        cqt[i] = ((CHROMA[i] * scale_factor + 50) / 100).clamp(1, 255) as u8;
    }
    (lqt, cqt)
}

fn dqt_segment(table: &[u8], table_id: u8) -> Vec<u8> {
    let mut segment = Vec::with_capacity(69);
    segment.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x43, table_id]);
    segment.extend_from_slice(table);
    segment
}

fn dri_segment(restart_interval: u16) -> [u8; 6] {
    let ri = restart_interval.to_be_bytes();
    [0xFF, 0xDD, 0x00, 0x04, ri[0], ri[1]]
}

fn sof_segment(jpeg_type: u8, width: u8, height: u8) -> [u8; 19] {
    let mut segment = [0u8; 19];
    segment[0] = 0xFF;
    segment[1] = 0xC0; // SOF0, baseline
    segment[2] = 0x00;
    segment[3] = 0x11;
    segment[4] = 0x08; // 8-bit precision

    let actual_height = (height as u16) * 8;
    let actual_width = (width as u16) * 8;
    segment[5..7].copy_from_slice(&actual_height.to_be_bytes());
    segment[7..9].copy_from_slice(&actual_width.to_be_bytes());

    segment[9] = 0x03; // components

    // Y component: sampling factors per the RFC 2435 type mapping.
    segment[10] = 0x01;
    segment[11] = match jpeg_type & 0x3F {
        0 => 0x21, // 4:2:2
        1 => 0x22, // 4:2:0
        2 => 0x11, // 4:4:4
        _ => 0x22,
    };
    segment[12] = 0x00; // quant table 0

    // U and V components.
    segment[13] = 0x02;
    segment[14] = 0x11;
    segment[15] = 0x01;
    segment[16] = 0x03;
    segment[17] = 0x11;
    segment[18] = 0x01;

    segment
}

/// Appends the four standard Huffman tables (ITU-T T.81 Annex K).
fn append_huffman_tables(out: &mut Vec<u8>) {
    const LUMA_DC_LENS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
    const LUMA_DC_SYMBOLS: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

    const LUMA_AC_LENS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7d];
    const LUMA_AC_SYMBOLS: [u8; 162] = [
        0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61,
        0x07, 0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08, 0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52,
        0xd1, 0xf0, 0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x25,
        0x26, 0x27, 0x28, 0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45,
        0x46, 0x47, 0x48, 0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64,
        0x65, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x83,
        0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99,
        0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6,
        0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3,
        0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8,
        0xe9, 0xea, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa,
    ];

    const CHROMA_DC_LENS: [u8; 16] = [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];
    const CHROMA_DC_SYMBOLS: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

    const CHROMA_AC_LENS: [u8; 16] = [0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77];
    const CHROMA_AC_SYMBOLS: [u8; 162] = [
        0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, 0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61,
        0x71, 0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, 0xa1, 0xb1, 0xc1, 0x09, 0x23, 0x33,
        0x52, 0xf0, 0x15, 0x62, 0x72, 0xd1, 0x0a, 0x16, 0x24, 0x34, 0xe1, 0x25, 0xf1, 0x17, 0x18,
        0x19, 0x1a, 0x26, 0x27, 0x28, 0x29, 0x2a, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44,
        0x45, 0x46, 0x47, 0x48, 0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63,
        0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a,
        0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97,
        0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4,
        0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca,
        0xd2, 0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7,
        0xe8, 0xe9, 0xea, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa,
    ];

    append_dht_segment(out, &LUMA_DC_LENS, &LUMA_DC_SYMBOLS, 0, 0);
    append_dht_segment(out, &LUMA_AC_LENS, &LUMA_AC_SYMBOLS, 0, 1);
    append_dht_segment(out, &CHROMA_DC_LENS, &CHROMA_DC_SYMBOLS, 1, 0);
    append_dht_segment(out, &CHROMA_AC_LENS, &CHROMA_AC_SYMBOLS, 1, 1);
}

fn append_dht_segment(
    out: &mut Vec<u8>,
    code_lens: &[u8],
    symbols: &[u8],
    table_id: u8,
    table_class: u8,
) {
    let length = (3 + code_lens.len() + symbols.len()) as u16;
    out.extend_from_slice(&[0xFF, 0xC4]);
    out.extend_from_slice(&length.to_be_bytes());
    out.push((table_class << 4) | table_id);
    out.extend_from_slice(code_lens);
    out.extend_from_slice(symbols);
}

fn sos_segment() -> [u8; 14] {
    [
        0xFF, 0xDA, // SOS
        0x00, 0x0C, // length
        0x03, // components
        0x01, 0x00, // Y: DC 0 / AC 0
        0x02, 0x11, // U: DC 1 / AC 1
        0x03, 0x11, // V: DC 1 / AC 1
        0x00, 0x3F, 0x00, // spectral selection
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::CodecType;
    use pretty_assertions::assert_eq;

    fn test_media() -> sdp::Media {
        sdp::Media {
            kind: "video".into(),
            codec: Some(CodecType::Mjpeg),
            payload_type: 26,
            time_scale: 90000,
            fps: 15,
            ..Default::default()
        }
    }

    fn depacketizer() -> MjpegDepacketizer {
        MjpegDepacketizer::new(&test_media(), 0, BufferPool::new())
    }

    /// Builds an RTP/JPEG payload: 8-byte main header plus scan data.
    fn jpeg_payload(frag_offset: u32, quality: u8, data: &[u8]) -> Vec<u8> {
        let off = frag_offset.to_be_bytes();
        let mut payload = vec![0, off[1], off[2], off[3]];
        payload.push(1); // type: 4:2:0
        payload.push(quality);
        payload.push(80); // width / 8 -> 640
        payload.push(60); // height / 8 -> 480
        payload.extend_from_slice(data);
        payload
    }

    fn rtp<'a>(payload: &'a [u8], timestamp: u32, marker: bool) -> RtpPacket<'a> {
        RtpPacket {
            payload,
            timestamp,
            sequence: 0,
            payload_type: 26,
            marker,
        }
    }

    #[test]
    fn test_fragmented_frame_assembles_to_jpeg() {
        let mut d = depacketizer();

        let part_a = [0x11u8; 100];
        let part_b = [0x22u8; 60];
        let part_c = [0x33u8; 7];

        let p0 = jpeg_payload(0, 50, &part_a);
        let p1 = jpeg_payload(100, 50, &part_b);
        let p2 = jpeg_payload(160, 50, &part_c);

        d.push(&rtp(&p0, 1000, false)).unwrap();
        d.push(&rtp(&p1, 1000, false)).unwrap();
        assert!(d.pop().is_none());
        d.push(&rtp(&p2, 1000, true)).unwrap();

        let pkt = d.pop().unwrap();
        assert!(pkt.is_key_frame());
        let data = pkt.data();
        assert_eq!(&data[..2], &[0xFF, 0xD8]); // SOI
        assert_eq!(&data[data.len() - 2..], &[0xFF, 0xD9]); // EOI
        // The scan data follows the synthesized headers intact.
        let headers_len = data.len() - 167 - 2;
        assert_eq!(&data[headers_len..headers_len + 100], &part_a[..]);

        // Dimensions from the frame header replaced the SDP placeholder.
        assert_eq!(pkt.params().width(), Some(640));
        assert_eq!(pkt.params().height(), Some(480));
    }

    #[test]
    fn test_missing_first_fragment_emits_nothing() {
        let mut d = depacketizer();
        let p1 = jpeg_payload(100, 50, &[0x22; 60]);
        d.push(&rtp(&p1, 1000, true)).unwrap();
        assert!(d.pop().is_none());
        assert!(d.fragments.is_empty());
    }

    #[test]
    fn test_gap_in_offsets_discards_frame() {
        let mut d = depacketizer();
        let p0 = jpeg_payload(0, 50, &[0x11; 100]);
        let p2 = jpeg_payload(160, 50, &[0x33; 7]); // missing bytes 100..160
        d.push(&rtp(&p0, 1000, false)).unwrap();
        d.push(&rtp(&p2, 1000, true)).unwrap();
        assert!(d.pop().is_none());
        assert!(d.fragments.is_empty());
    }

    #[test]
    fn test_timestamp_desync_discards_in_progress_frame() {
        let mut d = depacketizer();
        let p0 = jpeg_payload(0, 50, &[0x11; 100]);
        let other = jpeg_payload(100, 50, &[0x22; 60]);
        d.push(&rtp(&p0, 1000, false)).unwrap();
        // Continuation with a different timestamp and no offset 0.
        d.push(&rtp(&other, 2000, true)).unwrap();
        assert!(d.pop().is_none());
    }

    #[test]
    fn test_single_fragment_frame() {
        let mut d = depacketizer();
        let p0 = jpeg_payload(0, 50, &[0x44; 32]);
        d.push(&rtp(&p0, 5000, true)).unwrap();

        let pkt = d.pop().unwrap();
        assert_eq!(&pkt.data()[..2], &[0xFF, 0xD8]);
        // 5000 / 90000 s
        assert_eq!(pkt.time(), Duration::from_nanos(5000 * 1_000_000_000 / 90000));
    }

    #[test]
    fn test_quality_tables_scale() {
        let (lqt_q50, _) = scaled_quantization_tables(50);
        assert_eq!(lqt_q50[0], 16); // scale factor 100 keeps the base table

        let (lqt_low, _) = scaled_quantization_tables(10);
        assert!(lqt_low[0] > lqt_q50[0]); // lower quality, coarser steps

        let (lqt_high, _) = scaled_quantization_tables(99);
        assert!(lqt_high[0] <= lqt_q50[0]);
    }

    #[test]
    fn test_in_band_quantization_tables() {
        let mut d = depacketizer();

        let mut table = vec![0u8; 64];
        for (i, v) in table.iter_mut().enumerate() {
            *v = (i + 1) as u8;
        }

        // Quality >= 128 carries a table header and table bytes.
        let off = 0u32.to_be_bytes();
        let mut payload = vec![0, off[1], off[2], off[3], 1, 200, 80, 60];
        payload.extend_from_slice(&[0, 0]); // MBZ, precision
        payload.extend_from_slice(&(table.len() as u16).to_be_bytes());
        payload.extend_from_slice(&table);
        payload.extend_from_slice(&[0xAB; 16]);

        d.push(&rtp(&payload, 0, true)).unwrap();
        let pkt = d.pop().unwrap();

        // The in-band luma table appears verbatim inside a DQT segment.
        let data = pkt.data().to_vec();
        let pos = data
            .windows(table.len())
            .position(|w| w == table.as_slice())
            .expect("in-band table present");
        assert_eq!(&data[pos - 5..pos - 3], &[0xFF, 0xDB]);
    }
}
