use super::types::SpsInfo;
use crate::error::Result;
use crate::utils::BitReader;

const MB_SIZE: u32 = 16;
const CROP_MULTIPLIER: u32 = 2;
const CHROMA_FORMAT_444: u32 = 3;
const SCALING_LIST_THRESHOLD: usize = 6;
const SCALING_LIST_SMALL: u32 = 16;
const SCALING_LIST_LARGE: u32 = 64;
const DEFAULT_SCALE: i64 = 8;
const MAX_SCALE: i64 = 256;
const ASPECT_RATIO_EXTENDED: u32 = 255;

/// Removes emulation-prevention bytes (0x000003 becomes 0x0000) from an
/// H.264 NAL unit, yielding the raw byte sequence payload.
pub fn remove_emulation_bytes(b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(b.len());
    let mut i = 0;
    while i < b.len() {
        if i + 2 < b.len() && b[i] == 0 && b[i + 1] == 0 && b[i + 2] == 3 {
            out.push(0);
            out.push(0);
            i += 3;
        } else {
            out.push(b[i]);
            i += 1;
        }
    }
    out
}

/// Parses a sequence parameter set NAL unit (header byte included).
///
/// Walks profile/level, the high-profile chroma and scaling-list blocks,
/// frame dimensions with cropping, and VUI timing, producing pixel
/// width/height and a frame-rate estimate. A truncated SPS surfaces the
/// bit reader's end-of-data as a parse failure.
pub fn parse_sps(data: &[u8]) -> Result<SpsInfo> {
    let rbsp = remove_emulation_bytes(data);
    let mut r = BitReader::new(&rbsp);
    let mut s = SpsInfo::default();

    // NAL header byte.
    r.read_bits(8)?;

    s.profile_idc = r.read_bits(8)?;

    // constraint_set0..6_flag plus reserved_zero_2bits.
    s.constraint_set_flags = r.read_bits(8)? >> 2;

    s.level_idc = r.read_bits(8)?;

    s.id = r.read_golomb()?;

    if matches!(s.profile_idc, 100 | 110 | 122 | 244 | 44 | 83 | 86 | 118) {
        let chroma_format_idc = r.read_golomb()?;
        if chroma_format_idc == CHROMA_FORMAT_444 {
            // separate_colour_plane_flag
            r.read_bit()?;
        }

        // bit_depth_luma_minus8, bit_depth_chroma_minus8
        r.read_golomb()?;
        r.read_golomb()?;
        // qpprime_y_zero_transform_bypass_flag
        r.read_bit()?;

        if r.read_bit()? {
            // seq_scaling_matrix_present_flag
            for i in 0..8 {
                if r.read_bit()? {
                    let size = if i < SCALING_LIST_THRESHOLD {
                        SCALING_LIST_SMALL
                    } else {
                        SCALING_LIST_LARGE
                    };
                    let mut last_scale = DEFAULT_SCALE;
                    let mut next_scale = DEFAULT_SCALE;
                    for _ in 0..size {
                        if next_scale != 0 {
                            let delta = r.read_signed_golomb()? as i64;
                            next_scale = (last_scale + delta + MAX_SCALE) % MAX_SCALE;
                        }
                        if next_scale != 0 {
                            last_scale = next_scale;
                        }
                    }
                }
            }
        }
    }

    // log2_max_frame_num_minus4
    r.read_golomb()?;

    let pic_order_cnt_type = r.read_golomb()?;
    if pic_order_cnt_type == 0 {
        // log2_max_pic_order_cnt_lsb_minus4
        r.read_golomb()?;
    } else if pic_order_cnt_type == 1 {
        // delta_pic_order_always_zero_flag
        r.read_bit()?;
        // offset_for_non_ref_pic, offset_for_top_to_bottom_field
        r.read_signed_golomb()?;
        r.read_signed_golomb()?;
        let num_ref_frames_in_cycle = r.read_golomb()?;
        for _ in 0..num_ref_frames_in_cycle {
            r.read_signed_golomb()?;
        }
    }

    // max_num_ref_frames
    r.read_golomb()?;
    // gaps_in_frame_num_value_allowed_flag
    r.read_bit()?;

    s.mb_width = r.read_golomb()? + 1;
    s.mb_height = r.read_golomb()? + 1;

    let frame_mbs_only = r.read_bit()?;
    if !frame_mbs_only {
        // mb_adaptive_frame_field_flag
        r.read_bit()?;
    }

    // direct_8x8_inference_flag
    r.read_bit()?;

    if r.read_bit()? {
        // frame_cropping_flag
        s.crop_left = r.read_golomb()?;
        s.crop_right = r.read_golomb()?;
        s.crop_top = r.read_golomb()?;
        s.crop_bottom = r.read_golomb()?;
    }

    s.width = s.mb_width * MB_SIZE - (s.crop_left + s.crop_right) * CROP_MULTIPLIER;
    let frame_height_factor = if frame_mbs_only { 1 } else { 2 };
    s.height =
        frame_height_factor * s.mb_height * MB_SIZE - (s.crop_top + s.crop_bottom) * CROP_MULTIPLIER;

    if r.read_bit()? {
        // vui_parameters_present_flag
        parse_vui(&mut r, &mut s)?;
    }

    Ok(s)
}

fn parse_vui(r: &mut BitReader<'_>, s: &mut SpsInfo) -> Result<()> {
    if r.read_bit()? {
        // aspect_ratio_info_present_flag
        let aspect_ratio_idc = r.read_bits(8)?;
        if aspect_ratio_idc == ASPECT_RATIO_EXTENDED {
            r.read_bits(16)?;
            r.read_bits(16)?;
        }
    }

    if r.read_bit()? {
        // overscan_info_present_flag
        r.read_bit()?;
    }

    if r.read_bit()? {
        // video_signal_type_present_flag
        r.read_bits(3)?;
        r.read_bit()?;
        if r.read_bit()? {
            // colour_description_present_flag
            r.read_bits(8)?;
            r.read_bits(8)?;
            r.read_bits(8)?;
        }
    }

    if r.read_bit()? {
        // chroma_loc_info_present_flag
        r.read_golomb()?;
        r.read_golomb()?;
    }

    if r.read_bit()? {
        // timing_info_present_flag
        let num_units_in_tick = r.read_bits(32)?;
        let time_scale = r.read_bits(32)?;
        if num_units_in_tick > 0 {
            s.fps = time_scale / num_units_in_tick / 2;
        }
        if r.read_bit()? {
            // fixed_frame_rate_flag
            s.fps /= 2;
        }
    }

    Ok(())
}
