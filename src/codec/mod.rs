/// AAC parameter-set and ADTS/AudioSpecificConfig handling
pub mod aac;

/// H.264/AVC SPS parsing and stream parameters
pub mod h264;

/// H.265/HEVC SPS parsing and stream parameters
pub mod h265;

/// MJPEG stream parameters
pub mod mjpeg;

/// Opus stream parameters
pub mod opus;

/// Linear PCM / G.711 stream parameters
pub mod pcm;
