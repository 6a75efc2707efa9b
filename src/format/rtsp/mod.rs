//! RTSP session handling: the client state machine, the interleaved
//! demultiplexer for playback, and the publish muxer.

mod client;
mod demuxer;
mod muxer;

pub use client::RtspClient;
pub use demuxer::RtspDemuxer;
pub use muxer::RtspMuxer;

/// RTSP request methods.
pub(crate) mod method {
    pub const OPTIONS: &str = "OPTIONS";
    pub const DESCRIBE: &str = "DESCRIBE";
    pub const ANNOUNCE: &str = "ANNOUNCE";
    pub const SETUP: &str = "SETUP";
    pub const PLAY: &str = "PLAY";
    pub const RECORD: &str = "RECORD";
    pub const TEARDOWN: &str = "TEARDOWN";
}

/// Default RTSP port.
pub(crate) const DEFAULT_PORT: u16 = 554;

/// Resolves a track control attribute against the session control URL.
pub(crate) fn control_track(base: &str, track: &str) -> String {
    if track.contains("rtsp://") {
        return track.to_string();
    }
    if base.ends_with('/') {
        format!("{base}{track}")
    } else {
        format!("{base}/{track}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_control_track_resolution() {
        assert_eq!(
            control_track("rtsp://h/s", "trackID=1"),
            "rtsp://h/s/trackID=1"
        );
        assert_eq!(
            control_track("rtsp://h/s/", "trackID=1"),
            "rtsp://h/s/trackID=1"
        );
        assert_eq!(
            control_track("rtsp://h/s", "rtsp://h/s/track1"),
            "rtsp://h/s/track1"
        );
    }
}
