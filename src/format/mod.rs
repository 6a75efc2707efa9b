/// RTP base demuxing/muxing and per-codec depacketizers/packetizers
pub mod rtp;

/// RTSP session, playback demuxer and publish muxer
pub mod rtsp;

/// SDP parsing and generation
pub mod sdp;
