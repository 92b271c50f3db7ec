// Serialization utilities for state persistence
// Conversion is all-or-nothing: a blob either yields a complete store or
// an error, never a partially applied one.

use crate::config::{BPM_MAX, BPM_MIN, CHANNELS, STEPS};
use crate::persistence::PersistenceError;
use crate::persistence::types::*;
use crate::sequencer::euclid::ScaleMode;
use crate::sequencer::note::{NoteLength, RatchetLevel};
use crate::sequencer::pattern::{Channel, EuclidSettings, PatternStore, StepSlot};
use ron::ser::PrettyConfig;

/// Pattern state plus tempo, as captured by a save
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub store: PatternStore,
    pub bpm: u16,
}

/// Serialize a blob to RON text
pub fn serialize_to_ron(blob: &SaveBlob) -> Result<String, PersistenceError> {
    Ok(ron::ser::to_string_pretty(blob, PrettyConfig::default())?)
}

/// Deserialize a blob from RON text
pub fn deserialize_from_ron(ron_data: &str) -> Result<SaveBlob, PersistenceError> {
    Ok(ron::from_str(ron_data)?)
}

/// Capture the store and tempo
pub fn blob_from_store(store: &PatternStore, bpm: u16) -> SaveBlob {
    SaveBlob {
        format: FORMAT_TAG,
        bpm,
        default_length: store.default_length.index(),
        channels: store
            .channels
            .iter()
            .map(|channel| ChannelBlob {
                base_pitch: channel.base_pitch,
                muted: channel.muted,
                euclid_enabled: channel.euclid.enabled,
                euclid_pulses: channel.euclid.pulses,
                euclid_rotation: channel.euclid.rotation,
                scale_mode: channel.euclid.scale.index(),
                steps: channel
                    .steps
                    .iter()
                    .map(|slot| StepBlob {
                        on: slot.on,
                        pitch: slot.pitch,
                        length: slot.length.map(NoteLength::index),
                        fill: slot.fill,
                        ratchet: slot.ratchet.level(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn invalid(message: String) -> PersistenceError {
    PersistenceError::InvalidStructure(message)
}

fn check_range(what: &str, value: u8, max: u8) -> Result<u8, PersistenceError> {
    if value > max {
        return Err(invalid(format!("{} {} exceeds {}", what, value, max)));
    }
    Ok(value)
}

fn step_from_blob(blob: &StepBlob) -> Result<StepSlot, PersistenceError> {
    let pitch = blob
        .pitch
        .map(|p| check_range("step pitch", p, 127))
        .transpose()?;
    let length = blob
        .length
        .map(|l| check_range("length index", l, NoteLength::ALL.len() as u8 - 1).map(NoteLength::from_index))
        .transpose()?;
    let ratchet = RatchetLevel::new(check_range("ratchet level", blob.ratchet, RatchetLevel::MAX)?);

    Ok(StepSlot {
        on: blob.on,
        pitch,
        length,
        ratchet,
        fill: blob.fill,
    })
}

fn channel_from_blob(index: usize, blob: &ChannelBlob) -> Result<Channel, PersistenceError> {
    if blob.steps.len() != STEPS {
        return Err(invalid(format!(
            "channel {} has {} steps, expected {}",
            index,
            blob.steps.len(),
            STEPS
        )));
    }

    let mut steps = [StepSlot::default(); STEPS];
    for (slot, step) in steps.iter_mut().zip(&blob.steps) {
        *slot = step_from_blob(step)?;
    }

    let mut channel = Channel {
        muted: blob.muted,
        base_pitch: check_range("base pitch", blob.base_pitch, 127)?,
        euclid: EuclidSettings {
            enabled: blob.euclid_enabled,
            pulses: check_range("euclid pulses", blob.euclid_pulses, STEPS as u8)?,
            rotation: check_range("euclid rotation", blob.euclid_rotation, STEPS as u8 - 1)?,
            scale: ScaleMode::from_index(check_range("scale mode", blob.scale_mode, ScaleMode::COUNT - 1)?),
        },
        euclid_pattern: [false; STEPS],
        steps,
    };
    // The onset pattern is derived state and never stored
    channel.refresh_euclid();
    Ok(channel)
}

/// Rebuild a complete store from a blob, validating every field
pub fn store_from_blob(blob: &SaveBlob) -> Result<Snapshot, PersistenceError> {
    if blob.format != FORMAT_TAG {
        return Err(PersistenceError::FormatMismatch {
            expected: FORMAT_TAG,
            found: blob.format,
        });
    }
    if blob.channels.len() != CHANNELS {
        return Err(invalid(format!(
            "{} channels, expected {}",
            blob.channels.len(),
            CHANNELS
        )));
    }
    if !(BPM_MIN..=BPM_MAX).contains(&blob.bpm) {
        return Err(invalid(format!("BPM {} out of range", blob.bpm)));
    }

    let default_length = NoteLength::from_index(check_range(
        "default length index",
        blob.default_length,
        NoteLength::ALL.len() as u8 - 1,
    )?);

    let mut channels = Vec::with_capacity(CHANNELS);
    for (index, channel) in blob.channels.iter().enumerate() {
        channels.push(channel_from_blob(index, channel)?);
    }
    let channels: [Channel; CHANNELS] = channels
        .try_into()
        .map_err(|_| invalid("channel count changed during conversion".to_string()))?;

    Ok(Snapshot {
        store: PatternStore {
            channels,
            default_length,
        },
        bpm: blob.bpm,
    })
}
