#![doc(html_root_url = "https://docs.rs/rtspio/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # rtspio - RTSP/RTP media transport core
//!
//! `rtspio` speaks RTSP as a control protocol and RTP as a media
//! transport, converting between interleaved-TCP wire framing and
//! codec-specific access units (H.264, H.265, AAC, MJPEG, Opus, PCM).
//!
//! ## Playback
//!
//! ```rust,no_run
//! use rtspio::format::rtsp::RtspDemuxer;
//! use rtspio::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut demuxer = RtspDemuxer::new("rtsp://camera.local/stream", Config::default())?;
//!
//!     let streams = demuxer.connect().await?;
//!     for params in &streams {
//!         println!("track {}: {}", params.stream_index(), params.tag());
//!     }
//!
//!     loop {
//!         let packet = demuxer.read_packet().await?;
//!         println!("packet: {} bytes at {:?}", packet.data().len(), packet.time());
//!     }
//! }
//! ```
//!
//! ## Publish
//!
//! ```rust,no_run
//! use rtspio::format::rtsp::{RtspDemuxer, RtspMuxer};
//! use rtspio::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut source = RtspDemuxer::new("rtsp://camera.local/stream", Config::default())?;
//!     let streams = source.connect().await?;
//!
//!     let mut sink = RtspMuxer::new("rtsp://relay.local/out", Config::default())?;
//!     sink.connect(&streams).await?;
//!
//!     loop {
//!         let packet = source.read_packet().await?;
//!         sink.write_packet(&packet).await?;
//!     }
//! }
//! ```
//!
//! ## Module overview
//!
//! - `av`: packets, codec parameters and the shared media types
//! - `buffer`: size-tiered buffer pools backing packet payloads
//! - `codec`: per-codec bitstream parsers and stream parameters
//! - `format::sdp`: SDP parsing and generation
//! - `format::rtp`: RTP base demux/mux plus per-codec depacketizers
//!   and packetizers
//! - `format::rtsp`: the RTSP session, playback demuxer and publish
//!   muxer
//! - `utils`: bit readers and NAL unit splitting

/// Audio/video base types: packets and codec parameters
pub mod av;

/// Pooled, reference-counted payload buffers
pub mod buffer;

/// Per-codec bitstream parsers and stream parameters
pub mod codec;

/// Runtime tunables
pub mod config;

/// Error types
pub mod error;

/// Wire format implementations (SDP, RTP, RTSP)
pub mod format;

/// Bit-level readers and NAL helpers
pub mod utils;

pub use av::{AudioPacket, CodecParameters, CodecType, Packet, VideoPacket};
pub use buffer::{BufferPool, PooledBuffer, SharedBuffer};
pub use config::Config;
pub use error::{Result, RtspError};
