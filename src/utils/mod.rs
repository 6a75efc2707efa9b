/// Bit-level readers and writer for codec bitstream parsing
pub mod bits;

/// NAL unit splitting for AVCC and Annex-B framed streams
pub mod nal;

pub use bits::{BitReader, BitWriter};
pub use nal::{split_nal_units, NalFormat};
