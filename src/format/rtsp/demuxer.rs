//! Playback facade: drives the RTSP session, splits the interleaved
//! byte stream into RTSP text messages and RTP frames, and routes RTP
//! frames by channel number into the per-codec depacketizers.

use super::{control_track, RtspClient};
use crate::av::{CodecParameters, CodecType, Packet};
use crate::buffer::BufferPool;
use crate::config::Config;
use crate::error::{Result, RtspError};
use crate::format::rtp::{
    validate_frame_length, AacDepacketizer, Depacketizer, H264Depacketizer, H265Depacketizer,
    MjpegDepacketizer, OpusDepacketizer, PcmDepacketizer, RtpPacket, INTERLEAVED_MAGIC,
};
use crate::format::sdp;
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;

/// Leading byte of an RTSP text message ('R' of "RTSP/1.0 ...").
const RTSP_MAGIC: u8 = 0x52;
/// Upper bound on an interleaved RTSP text message.
const MAX_RTSP_MESSAGE_SIZE: usize = 2 << 9;

struct Track {
    channel: u8,
    depacketizer: Box<dyn Depacketizer>,
}

/// RTSP playback demuxer.
///
/// `connect` walks OPTIONS -> DESCRIBE -> per-track SETUP -> PLAY and
/// returns the negotiated stream parameters. `read_packet` then yields
/// reassembled codec packets until the session dies (socket error,
/// protocol error, or RTP inactivity timeout). Dropping the demuxer
/// mid-read simply discards in-flight fragment accumulators.
pub struct RtspDemuxer {
    url: String,
    client: RtspClient,
    pool: BufferPool,
    video: Option<Track>,
    audio: Option<Track>,
    pending: VecDeque<Packet>,
    last_packet_at: Instant,
    last_ping_at: Instant,
    keepalive_interval: Duration,
    inactivity_window: Duration,
}

impl RtspDemuxer {
    pub fn new(url: &str, config: Config) -> Result<Self> {
        Self::with_pool(url, config, BufferPool::global().clone())
    }

    pub fn with_pool(url: &str, config: Config, pool: BufferPool) -> Result<Self> {
        let keepalive_interval = config.keepalive_interval;
        let inactivity_window = config.inactivity_window;
        Ok(Self {
            url: url.to_string(),
            client: RtspClient::new(url, config)?,
            pool,
            video: None,
            audio: None,
            pending: VecDeque::new(),
            last_packet_at: Instant::now(),
            last_ping_at: Instant::now(),
            keepalive_interval,
            inactivity_window,
        })
    }

    /// Connects and negotiates every supported track, returning the
    /// stream parameters in track order (video first).
    pub async fn connect(&mut self) -> Result<Vec<Arc<CodecParameters>>> {
        self.client.connect().await?;

        let mut medias = self.client.describe().await?;
        medias.sort_by_key(|m| match m.kind.as_str() {
            "video" => 0,
            "audio" => 1,
            _ => 2,
        });

        let mut params = Vec::new();
        let mut next_channel = 0u8;

        for (index, media) in medias.iter().enumerate() {
            let uri = control_track(self.client.control(), &media.control);
            let stream_index = index as u8;

            let track = match self.build_depacketizer(media, stream_index)? {
                Some((depacketizer, parameters)) => {
                    let channel = self.client.setup(next_channel, uri, false).await?;
                    next_channel += 2;
                    if let Some(p) = parameters {
                        params.push(p);
                    }
                    Track {
                        channel,
                        depacketizer,
                    }
                }
                None => continue,
            };

            match media.kind.as_str() {
                "video" => self.video = Some(track),
                _ => self.audio = Some(track),
            }
        }

        if self.video.is_none() && self.audio.is_none() {
            return Err(RtspError::Protocol(
                "no supported media tracks in SDP".into(),
            ));
        }

        self.client.play().await?;
        self.last_packet_at = Instant::now();
        self.last_ping_at = Instant::now();
        Ok(params)
    }

    #[allow(clippy::type_complexity)]
    fn build_depacketizer(
        &self,
        media: &sdp::Media,
        stream_index: u8,
    ) -> Result<Option<(Box<dyn Depacketizer>, Option<Arc<CodecParameters>>)>> {
        let pool = self.pool.clone();
        Ok(match media.codec {
            Some(CodecType::H264) => {
                let d = H264Depacketizer::new(media, stream_index, pool)?;
                let p = d.parameters();
                Some((Box::new(d), Some(p)))
            }
            Some(CodecType::H265) => {
                let d = H265Depacketizer::new(media, stream_index, pool)?;
                let p = d.parameters();
                Some((Box::new(d), p))
            }
            Some(CodecType::Mjpeg) => {
                let d = MjpegDepacketizer::new(media, stream_index, pool);
                let p = d.parameters();
                Some((Box::new(d), Some(p)))
            }
            Some(CodecType::Aac) => {
                let d = AacDepacketizer::new(media, stream_index, pool)?;
                let p = d.parameters();
                Some((Box::new(d), p))
            }
            Some(CodecType::Opus) => {
                let d = OpusDepacketizer::new(media, stream_index, pool);
                let p = d.parameters();
                Some((Box::new(d), Some(p)))
            }
            Some(ct @ (CodecType::Pcm | CodecType::PcmAlaw | CodecType::PcmUlaw)) => {
                let d = PcmDepacketizer::new(media, stream_index, ct, pool);
                let p = d.parameters();
                Some((Box::new(d), Some(p)))
            }
            None => {
                debug!("rtsp: SDP {} codec not supported, skipping track", media.kind);
                None
            }
        })
    }

    /// Reads until one reassembled packet is available.
    ///
    /// Recoverable conditions (desync bytes, unknown channels, RTCP
    /// reports, malformed units) are skipped; session-fatal conditions
    /// (socket errors, RTP silence past the inactivity window) surface
    /// as errors.
    pub async fn read_packet(&mut self) -> Result<Packet> {
        loop {
            if let Some(mut packet) = self.pending.pop_front() {
                packet.set_url(&self.url);
                return Ok(packet);
            }

            if self.last_packet_at.elapsed() >= self.inactivity_window {
                return Err(RtspError::Timeout("packet timeout expired".into()));
            }

            if self.last_ping_at.elapsed() >= self.keepalive_interval {
                self.client.ping().await?;
                self.last_ping_at = Instant::now();
            }

            // Resynchronize on a frame boundary.
            let leading = self.client.read_u8().await?;
            if leading != INTERLEAVED_MAGIC && leading != RTSP_MAGIC {
                self.client.warn_desync(leading);
                continue;
            }

            let mut header = [0u8; 3];
            self.client.read_exact(&mut header).await?;

            if leading == RTSP_MAGIC {
                self.consume_rtsp_message(&header).await?;
                continue;
            }

            let channel = header[0];
            let length = u16::from_be_bytes([header[1], header[2]]) as usize;
            if let Err(e) = validate_frame_length(length) {
                warn!("rtsp: {e}, possible desync");
                continue;
            }

            let mut frame = self.pool.get(length);
            self.client.read_exact(frame.data_mut()).await?;

            let track = match (&mut self.video, &mut self.audio) {
                (Some(v), _) if channel == v.channel || channel == v.channel + 1 => v,
                (_, Some(a)) if channel == a.channel || channel == a.channel + 1 => a,
                _ => {
                    warn!("rtsp: unknown interleaved channel {channel}, possible desync");
                    continue;
                }
            };

            let Some(rtp) = RtpPacket::parse(frame.data())? else {
                continue; // RTCP report
            };

            track.depacketizer.push(&rtp)?;
            while let Some(packet) = track.depacketizer.pop() {
                self.last_packet_at = Instant::now();
                self.pending.push_back(packet);
            }
        }
    }

    /// Consumes an interleaved RTSP text message (e.g. the response to a
    /// keep-alive OPTIONS): headers through the blank line, then a
    /// `Content-Length` body when present.
    async fn consume_rtsp_message(&mut self, rest_of_magic: &[u8; 3]) -> Result<()> {
        if rest_of_magic != b"TSP" {
            warn!("rtsp: text message desync, recovering");
            return Ok(());
        }

        let mut message = Vec::with_capacity(256);
        message.extend_from_slice(b"RTSP");

        loop {
            if message.len() >= MAX_RTSP_MESSAGE_SIZE {
                return Err(RtspError::Protocol(format!(
                    "failed to parse RTSP message after {MAX_RTSP_MESSAGE_SIZE} bytes"
                )));
            }

            message.push(self.client.read_u8().await?);

            if message.ends_with(b"\r\n\r\n") {
                break;
            }
        }

        debug!("rtsp: consumed interleaved text message");

        let text = String::from_utf8_lossy(&message);
        if let Some(rest) = text.split_once("Content-Length:").map(|(_, r)| r) {
            let length: usize = rest
                .split("\r\n")
                .next()
                .unwrap_or("")
                .trim()
                .parse()
                .unwrap_or(0);
            if length > 0 {
                let mut body = vec![0u8; length];
                self.client.read_exact(&mut body).await?;
            }
        }

        Ok(())
    }

    /// Tears down the session and closes the socket.
    pub async fn close(&mut self) {
        self.client.close().await;
    }
}
