//! H.265 NAL unit types and parsed SPS fields.

/// First IRAP slice class (BLA_W_LP). Types 16..=21 are random access points.
pub const NAL_BLA_W_LP: u8 = 16;
/// Last IRAP slice class (CRA_NUT).
pub const NAL_CRA: u8 = 21;
/// Video parameter set.
pub const NAL_VPS: u8 = 32;
/// Sequence parameter set.
pub const NAL_SPS: u8 = 33;
/// Picture parameter set.
pub const NAL_PPS: u8 = 34;
/// Prefix SEI.
pub const NAL_PREFIX_SEI: u8 = 39;
/// Unspecified type some encoders emit around access units.
pub const NAL_UNSPECIFIED_48: u8 = 48;
/// Fragmentation unit (RFC 7798).
pub const NAL_FU: u8 = 49;

/// Extracts the 6-bit NAL type from the first header byte.
pub fn nal_type(first_byte: u8) -> u8 {
    (first_byte >> 1) & 0x3f
}

/// True for the BLA/IDR/CRA random-access NAL types.
pub fn is_key_frame_type(nal_type: u8) -> bool {
    (NAL_BLA_W_LP..=NAL_CRA).contains(&nal_type)
}

/// Fields extracted from a sequence parameter set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpsInfo {
    pub num_temporal_layers: u32,
    pub temporal_id_nested: bool,
    pub chroma_format: u32,
    pub pic_width_in_luma_samples: u32,
    pub pic_height_in_luma_samples: u32,
    pub width: u32,
    pub height: u32,
    pub general_profile_space: u32,
    pub general_tier_flag: u32,
    pub general_profile_idc: u32,
    pub general_profile_compatibility_flags: u32,
    pub general_constraint_indicator_flags: u64,
    pub general_level_idc: u32,
}
