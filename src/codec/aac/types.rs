//! MPEG-4 audio configuration shared by the ADTS and AudioSpecificConfig
//! parsers.

use crate::av::ChannelLayout;

/// Sample rates addressable by the 4-bit sample-rate index.
pub const SAMPLE_RATE_TABLE: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Channel layouts addressable by the 4-bit channel configuration.
/// Index 0 means "defined in AOT specific config".
pub const CHANNEL_CONFIG_TABLE: [ChannelLayout; 8] = [
    ChannelLayout(0),
    ChannelLayout::FRONT_CENTER,
    ChannelLayout(ChannelLayout::FRONT_LEFT.0 | ChannelLayout::FRONT_RIGHT.0),
    ChannelLayout(
        ChannelLayout::FRONT_CENTER.0 | ChannelLayout::FRONT_LEFT.0 | ChannelLayout::FRONT_RIGHT.0,
    ),
    ChannelLayout(
        ChannelLayout::FRONT_CENTER.0
            | ChannelLayout::FRONT_LEFT.0
            | ChannelLayout::FRONT_RIGHT.0
            | ChannelLayout::BACK_CENTER.0,
    ),
    ChannelLayout(
        ChannelLayout::FRONT_CENTER.0
            | ChannelLayout::FRONT_LEFT.0
            | ChannelLayout::FRONT_RIGHT.0
            | ChannelLayout::BACK_LEFT.0
            | ChannelLayout::BACK_RIGHT.0,
    ),
    ChannelLayout(
        ChannelLayout::FRONT_CENTER.0
            | ChannelLayout::FRONT_LEFT.0
            | ChannelLayout::FRONT_RIGHT.0
            | ChannelLayout::BACK_LEFT.0
            | ChannelLayout::BACK_RIGHT.0
            | ChannelLayout::LOW_FREQ.0,
    ),
    ChannelLayout(
        ChannelLayout::FRONT_CENTER.0
            | ChannelLayout::FRONT_LEFT.0
            | ChannelLayout::FRONT_RIGHT.0
            | ChannelLayout::SIDE_LEFT.0
            | ChannelLayout::SIDE_RIGHT.0
            | ChannelLayout::BACK_LEFT.0
            | ChannelLayout::BACK_RIGHT.0
            | ChannelLayout::LOW_FREQ.0,
    ),
];

/// AAC Main audio object type.
pub const AOT_AAC_MAIN: u32 = 1;
/// AAC Low Complexity audio object type.
pub const AOT_AAC_LC: u32 = 2;

/// The decoded fields of an MPEG-4 `AudioSpecificConfig` or ADTS header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mpeg4AudioConfig {
    pub object_type: u32,
    pub sample_rate_index: u32,
    pub channel_config: u32,
    /// Resolved from `sample_rate_index` by [`Mpeg4AudioConfig::complete`].
    pub sample_rate: u32,
    /// Resolved from `channel_config` by [`Mpeg4AudioConfig::complete`].
    pub channel_layout: ChannelLayout,
}

impl Mpeg4AudioConfig {
    pub fn is_valid(&self) -> bool {
        self.object_type > 0
    }

    /// Fills the derived `sample_rate` and `channel_layout` fields from
    /// their table indices.
    pub fn complete(&mut self) {
        if (self.sample_rate_index as usize) < SAMPLE_RATE_TABLE.len() {
            self.sample_rate = SAMPLE_RATE_TABLE[self.sample_rate_index as usize];
        }
        if (self.channel_config as usize) < CHANNEL_CONFIG_TABLE.len() {
            self.channel_layout = CHANNEL_CONFIG_TABLE[self.channel_config as usize];
        }
    }
}
