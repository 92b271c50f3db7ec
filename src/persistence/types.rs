// Types for state persistence

use serde::{Deserialize, Serialize};

/// Identifies the blob layout; anything else is rejected on load
pub const FORMAT_TAG: u32 = 0x5153_0001;

/// Complete persisted state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveBlob {
    /// Layout identifier, must equal FORMAT_TAG
    pub format: u32,
    pub bpm: u16,
    /// Index into the note length table
    pub default_length: u8,
    pub channels: Vec<ChannelBlob>,
}

/// Serializable channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBlob {
    pub base_pitch: u8,
    pub muted: bool,
    pub euclid_enabled: bool,
    pub euclid_pulses: u8,
    pub euclid_rotation: u8,
    /// 0 = melody off, 1..=3 = scale tables
    pub scale_mode: u8,
    pub steps: Vec<StepBlob>,
}

/// Serializable step slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepBlob {
    pub on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<u8>,
    /// Length table index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u8>,
    #[serde(default)]
    pub fill: bool,
    #[serde(default)]
    pub ratchet: u8,
}
