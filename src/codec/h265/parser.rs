use super::types::SpsInfo;
use crate::error::{Result, RtspError};
use crate::utils::BitReader;

/// Converts a NAL payload to its raw byte sequence payload by dropping
/// emulation-prevention bytes (the 0x000003 token becomes 0x0000).
pub fn nal_to_rbsp(nal: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(nal.len());
    let mut i = 0;
    while i < nal.len() {
        if i + 2 < nal.len() && nal[i] == 0 && nal[i + 1] == 0 && nal[i + 2] == 3 {
            out.push(0);
            out.push(0);
            i += 3;
        } else {
            out.push(nal[i]);
            i += 1;
        }
    }
    out
}

/// Parses an H.265 sequence parameter set NAL unit (2-byte header
/// included): profile-tier-level block, chroma format, and the picture
/// dimensions in luma samples.
pub fn parse_sps(sps: &[u8]) -> Result<SpsInfo> {
    if sps.len() < 2 {
        return Err(RtspError::Parse("h265: SPS shorter than NAL header".into()));
    }

    let rbsp = nal_to_rbsp(&sps[2..]);
    let mut r = BitReader::new(&rbsp);
    let mut ctx = SpsInfo::default();

    // sps_video_parameter_set_id
    r.read_bits(4)?;
    let max_sub_layers_minus1 = r.read_bits(3)?;
    if max_sub_layers_minus1 + 1 > ctx.num_temporal_layers {
        ctx.num_temporal_layers = max_sub_layers_minus1 + 1;
    }
    ctx.temporal_id_nested = r.read_bit()?;

    parse_profile_tier_level(&mut r, &mut ctx, max_sub_layers_minus1)?;

    // sps_seq_parameter_set_id
    r.read_golomb()?;

    ctx.chroma_format = r.read_golomb()?;
    if ctx.chroma_format == 3 {
        // separate_colour_plane_flag
        r.read_bit()?;
    }

    ctx.pic_width_in_luma_samples = r.read_golomb()?;
    ctx.width = ctx.pic_width_in_luma_samples;
    ctx.pic_height_in_luma_samples = r.read_golomb()?;
    ctx.height = ctx.pic_height_in_luma_samples;

    if r.read_bit()? {
        // conformance_window_flag: four window offsets
        r.read_golomb()?;
        r.read_golomb()?;
        r.read_golomb()?;
        r.read_golomb()?;
    }

    // bit_depth_luma_minus8, bit_depth_chroma_minus8
    r.read_golomb()?;
    r.read_golomb()?;

    // log2_max_pic_order_cnt_lsb_minus4
    r.read_golomb()?;

    let sub_layer_ordering_info_present = r.read_bit()?;
    let start = if sub_layer_ordering_info_present {
        0
    } else {
        max_sub_layers_minus1
    };
    for _ in start..=max_sub_layers_minus1 {
        // sps_max_dec_pic_buffering_minus1, sps_max_num_reorder_pics,
        // sps_max_latency_increase_plus1
        r.read_golomb()?;
        r.read_golomb()?;
        r.read_golomb()?;
    }

    // log2_min_luma_coding_block_size_minus3 and the five following
    // block/transform size fields.
    for _ in 0..6 {
        r.read_golomb()?;
    }

    Ok(ctx)
}

fn parse_profile_tier_level(
    r: &mut BitReader<'_>,
    ctx: &mut SpsInfo,
    max_sub_layers_minus1: u32,
) -> Result<()> {
    let mut ptl = SpsInfo::default();
    ptl.general_profile_space = r.read_bits(2)?;
    ptl.general_tier_flag = r.read_bits(1)?;
    ptl.general_profile_idc = r.read_bits(5)?;
    ptl.general_profile_compatibility_flags = r.read_bits(32)?;
    ptl.general_constraint_indicator_flags = r.read_bits_64(48)?;
    ptl.general_level_idc = r.read_bits(8)?;
    merge_profile_tier_level(ctx, &ptl);

    if max_sub_layers_minus1 == 0 {
        return Ok(());
    }

    let n = max_sub_layers_minus1 as usize;
    let mut profile_present = vec![false; n];
    let mut level_present = vec![false; n];
    for i in 0..n {
        profile_present[i] = r.read_bit()?;
        level_present[i] = r.read_bit()?;
    }

    for _ in max_sub_layers_minus1..8 {
        // reserved_zero_2bits
        r.read_bits(2)?;
    }

    for i in 0..n {
        if profile_present[i] {
            // sub-layer profile space/tier/idc/compatibility and
            // constraint flags: 88 bits in total.
            r.read_bits(32)?;
            r.read_bits(32)?;
            r.read_bits(24)?;
        }
        if level_present[i] {
            // sub_layer_level_idc
            r.read_bits(8)?;
        }
    }

    Ok(())
}

fn merge_profile_tier_level(ctx: &mut SpsInfo, ptl: &SpsInfo) {
    ctx.general_profile_space = ptl.general_profile_space;

    if ptl.general_tier_flag > ctx.general_tier_flag {
        ctx.general_level_idc = ptl.general_level_idc;
        ctx.general_tier_flag = ptl.general_tier_flag;
    } else if ptl.general_level_idc > ctx.general_level_idc {
        ctx.general_level_idc = ptl.general_level_idc;
    }

    if ptl.general_profile_idc > ctx.general_profile_idc {
        ctx.general_profile_idc = ptl.general_profile_idc;
    }

    ctx.general_profile_compatibility_flags &= ptl.general_profile_compatibility_flags;
    ctx.general_constraint_indicator_flags &= ptl.general_constraint_indicator_flags;
}
