//! Publish facade: ANNOUNCE the outgoing tracks, SETUP interleaved
//! channels in record mode, then RECORD and drive the RTP packetizers
//! over the session socket.

use super::{control_track, RtspClient};
use crate::av::{CodecParameters, Packet};
use crate::config::Config;
use crate::error::{Result, RtspError};
use crate::format::rtp::{H264Packetizer, H265Packetizer};
use crate::format::sdp;
use bytes::BytesMut;
use log::debug;
use std::sync::Arc;

enum VideoPacketizer {
    H264(H264Packetizer),
    H265(H265Packetizer),
}

/// RTSP publish muxer for one outgoing stream.
///
/// `connect` performs OPTIONS -> ANNOUNCE -> per-track SETUP(record) ->
/// RECORD; `write_packet` then packetizes video access units onto the
/// session socket. Audio tracks are announced but not yet packetized.
pub struct RtspMuxer {
    url: String,
    client: RtspClient,
    video: Option<VideoPacketizer>,
    scratch: BytesMut,
}

impl RtspMuxer {
    pub fn new(url: &str, config: Config) -> Result<Self> {
        Ok(Self {
            url: url.to_string(),
            client: RtspClient::new(url, config)?,
            video: None,
            scratch: BytesMut::new(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connects and runs the publish workflow for the given streams.
    pub async fn connect(&mut self, streams: &[Arc<CodecParameters>]) -> Result<()> {
        self.client.connect().await?;

        if !self.client.supports_publish() {
            return Err(RtspError::Protocol(
                "server does not support ANNOUNCE and RECORD".into(),
            ));
        }

        let medias = streams_to_sdp(streams)?;
        if medias.is_empty() {
            return Err(RtspError::Protocol("no streams to publish".into()));
        }

        let session = sdp::Session {
            uri: self.client.control().to_string(),
        };
        let body = sdp::generate(&session, &medias);
        debug!("rtsp: announcing:\n{body}");
        self.client.announce(&body).await?;

        let mtu = self.client.config().mtu;
        let mut next_channel = 0u8;
        for media in &medias {
            let uri = control_track(self.client.control(), &media.control);
            let channel = self.client.setup(next_channel, uri, true).await?;
            next_channel += 2;

            if media.kind == "video" {
                self.video = Some(match media.codec {
                    Some(crate::av::CodecType::H264) => {
                        VideoPacketizer::H264(H264Packetizer::new(media, channel, mtu))
                    }
                    Some(crate::av::CodecType::H265) => {
                        VideoPacketizer::H265(H265Packetizer::new(media, channel, mtu))
                    }
                    other => {
                        debug!("rtsp: no RTP packetizer for video codec {other:?}");
                        continue;
                    }
                });
            }
        }

        self.client.record().await?;
        Ok(())
    }

    /// Writes one packet to the server. Only video packets are
    /// packetized; others are accepted and dropped.
    pub async fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        let Packet::Video(video) = packet else {
            return Ok(());
        };

        let Some(packetizer) = &mut self.video else {
            return Err(RtspError::Protocol(
                "rtp packetizer not initialized".into(),
            ));
        };

        self.scratch.clear();
        match packetizer {
            VideoPacketizer::H264(p) => p.packetize(video, &mut self.scratch),
            VideoPacketizer::H265(p) => p.packetize(video, &mut self.scratch),
        }

        if self.scratch.is_empty() {
            return Ok(());
        }

        self.client.write_all(&self.scratch).await
    }

    /// Tears down the session and closes the socket.
    pub async fn close(&mut self) {
        self.client.close().await;
    }
}

/// Converts outgoing stream parameters into SDP media sections, video
/// first, with `trackID=<n>` controls matching channel assignment order.
fn streams_to_sdp(streams: &[Arc<CodecParameters>]) -> Result<Vec<sdp::Media>> {
    let mut medias = Vec::new();

    for params in streams {
        let media = match params.as_ref() {
            CodecParameters::H264(p) => {
                if p.sps().is_empty() || p.pps().is_empty() {
                    return Err(RtspError::Protocol(
                        "h264 stream parameters missing SPS/PPS".into(),
                    ));
                }
                sdp::Media {
                    kind: "video".into(),
                    codec: Some(crate::av::CodecType::H264),
                    payload_type: 96,
                    time_scale: 90000,
                    width: p.width(),
                    height: p.height(),
                    fps: p.fps(),
                    sprop_parameter_sets: vec![p.sps().to_vec(), p.pps().to_vec()],
                    ..Default::default()
                }
            }
            CodecParameters::H265(p) => {
                if p.vps().is_empty() || p.sps().is_empty() || p.pps().is_empty() {
                    return Err(RtspError::Protocol(
                        "h265 stream parameters missing VPS/SPS/PPS".into(),
                    ));
                }
                sdp::Media {
                    kind: "video".into(),
                    codec: Some(crate::av::CodecType::H265),
                    payload_type: 98,
                    time_scale: 90000,
                    width: p.width(),
                    height: p.height(),
                    fps: p.fps(),
                    sprop_vps: p.vps().to_vec(),
                    sprop_sps: p.sps().to_vec(),
                    sprop_pps: p.pps().to_vec(),
                    ..Default::default()
                }
            }
            CodecParameters::Mjpeg(p) => sdp::Media {
                kind: "video".into(),
                codec: Some(crate::av::CodecType::Mjpeg),
                payload_type: 26,
                time_scale: 90000,
                width: p.width(),
                height: p.height(),
                fps: p.fps(),
                ..Default::default()
            },
            CodecParameters::Aac(p) => {
                if p.config_bytes().is_empty() {
                    return Err(RtspError::Protocol(
                        "aac stream parameters missing audio config".into(),
                    ));
                }
                sdp::Media {
                    kind: "audio".into(),
                    codec: Some(crate::av::CodecType::Aac),
                    payload_type: 96,
                    time_scale: p.sample_rate(),
                    channel_count: p.channels(),
                    config: p.config_bytes().to_vec(),
                    size_length: 13,
                    index_length: 3,
                    ..Default::default()
                }
            }
            CodecParameters::Opus(p) => sdp::Media {
                kind: "audio".into(),
                codec: Some(crate::av::CodecType::Opus),
                payload_type: 96,
                time_scale: 48000,
                channel_count: p.channels(),
                ..Default::default()
            },
            CodecParameters::Pcm(p) => sdp::Media {
                kind: "audio".into(),
                codec: Some(p.codec_type()),
                payload_type: match p.codec_type() {
                    crate::av::CodecType::PcmUlaw => 0,
                    crate::av::CodecType::PcmAlaw => 8,
                    _ => 96,
                },
                time_scale: p.sample_rate(),
                channel_count: p.channels(),
                ..Default::default()
            },
        };
        medias.push(media);
    }

    // Video first, then assign trackID controls in final order.
    medias.sort_by_key(|m| match m.kind.as_str() {
        "video" => 0u8,
        "audio" => 1,
        _ => 2,
    });
    for (i, media) in medias.iter_mut().enumerate() {
        media.control = format!("trackID={i}");
    }

    Ok(medias)
}
