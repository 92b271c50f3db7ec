// Pattern - Per-channel / per-step state of the sequencer
// Everything a performer edits lives here: step on/off, per-step overrides
// (parameter locks), mutes, base pitches and euclid settings.

use crate::config::{CHANNELS, STEPS};
use crate::sequencer::euclid::{self, ScaleMode};
use crate::sequencer::note::{NoteLength, RatchetLevel};
use rand::Rng;

/// Validated channel index (0..CHANNELS)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ChannelId(u8);

impl ChannelId {
    pub fn new(index: usize) -> Option<Self> {
        (index < CHANNELS).then_some(Self(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// MIDI channel nibble used on the wire
    pub fn midi_channel(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = ChannelId> {
        (0..CHANNELS as u8).map(ChannelId)
    }
}

/// Validated step index (0..STEPS)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StepIndex(u8);

impl StepIndex {
    pub const FIRST: StepIndex = StepIndex(0);

    pub fn new(index: usize) -> Option<Self> {
        (index < STEPS).then_some(Self(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Following step, wrapping at the pattern end
    pub fn next(self) -> Self {
        Self(((self.0 as usize + 1) % STEPS) as u8)
    }

    pub fn all() -> impl Iterator<Item = StepIndex> {
        (0..STEPS as u8).map(StepIndex)
    }
}

/// One step of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepSlot {
    pub(crate) on: bool,
    /// Pitch override; `None` inherits the channel base pitch
    pub(crate) pitch: Option<u8>,
    /// Length override; `None` inherits the global default
    pub(crate) length: Option<NoteLength>,
    pub(crate) ratchet: RatchetLevel,
    /// Only sounds while the fill modifier is held
    pub(crate) fill: bool,
}

impl StepSlot {
    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn pitch(&self) -> Option<u8> {
        self.pitch
    }

    pub fn length(&self) -> Option<NoteLength> {
        self.length
    }

    pub fn ratchet(&self) -> RatchetLevel {
        self.ratchet
    }

    pub fn is_fill(&self) -> bool {
        self.fill
    }

    /// True when any parameter lock deviates from the defaults
    pub fn has_overrides(&self) -> bool {
        self.pitch.is_some() || self.length.is_some() || !self.ratchet.is_off() || self.fill
    }

    /// Turn the step off and drop every override with it
    fn switch_off(&mut self) {
        *self = StepSlot::default();
    }
}

/// Euclid configuration of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EuclidSettings {
    pub enabled: bool,
    /// Onsets per pattern (0..=STEPS)
    pub pulses: u8,
    /// Right rotation (0..STEPS)
    pub rotation: u8,
    pub scale: ScaleMode,
}

impl Default for EuclidSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            pulses: 4,
            rotation: 0,
            scale: ScaleMode::Off,
        }
    }
}

/// Factory base pitch (C2)
pub const DEFAULT_BASE_PITCH: u8 = 36;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub(crate) muted: bool,
    pub(crate) base_pitch: u8,
    pub(crate) euclid: EuclidSettings,
    /// Derived from `euclid.pulses`/`euclid.rotation`, never edited directly
    pub(crate) euclid_pattern: [bool; STEPS],
    pub(crate) steps: [StepSlot; STEPS],
}

impl Default for Channel {
    fn default() -> Self {
        let euclid = EuclidSettings::default();
        Self {
            muted: false,
            base_pitch: DEFAULT_BASE_PITCH,
            euclid_pattern: euclid::euclid_pattern(euclid.pulses, euclid.rotation),
            euclid,
            steps: [StepSlot::default(); STEPS],
        }
    }
}

impl Channel {
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn base_pitch(&self) -> u8 {
        self.base_pitch
    }

    pub fn euclid(&self) -> &EuclidSettings {
        &self.euclid
    }

    pub fn euclid_pattern(&self) -> &[bool; STEPS] {
        &self.euclid_pattern
    }

    pub fn step(&self, step: StepIndex) -> &StepSlot {
        &self.steps[step.index()]
    }

    pub fn steps(&self) -> &[StepSlot; STEPS] {
        &self.steps
    }

    /// Whether the step sounds, read from whichever pattern governs the channel
    pub fn is_active(&self, step: StepIndex) -> bool {
        if self.euclid.enabled {
            self.euclid_pattern[step.index()]
        } else {
            self.steps[step.index()].on
        }
    }

    pub(crate) fn refresh_euclid(&mut self) {
        self.euclid_pattern = euclid::euclid_pattern(self.euclid.pulses, self.euclid.rotation);
    }
}

/// The pattern & parameter store
///
/// Starts silent, may be replaced wholesale by a persisted load, and is
/// otherwise changed one edit at a time by the input mapper. All setters
/// clamp out-of-range values instead of rejecting them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternStore {
    pub(crate) channels: [Channel; CHANNELS],
    pub(crate) default_length: NoteLength,
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternStore {
    /// Factory state: every step off, every override inheriting
    pub fn new() -> Self {
        Self {
            channels: std::array::from_fn(|_| Channel::default()),
            default_length: NoteLength::default(),
        }
    }

    pub fn channel(&self, channel: ChannelId) -> &Channel {
        &self.channels[channel.index()]
    }

    fn channel_mut(&mut self, channel: ChannelId) -> &mut Channel {
        &mut self.channels[channel.index()]
    }

    fn slot_mut(&mut self, channel: ChannelId, step: StepIndex) -> &mut StepSlot {
        &mut self.channels[channel.index()].steps[step.index()]
    }

    pub fn step(&self, channel: ChannelId, step: StepIndex) -> &StepSlot {
        self.channel(channel).step(step)
    }

    pub fn is_active(&self, channel: ChannelId, step: StepIndex) -> bool {
        self.channel(channel).is_active(step)
    }

    pub fn default_length(&self) -> NoteLength {
        self.default_length
    }

    pub fn set_default_length(&mut self, length: NoteLength) {
        self.default_length = length;
    }

    pub fn adjust_default_length(&mut self, delta: i32) {
        self.default_length = self.default_length.offset(delta);
    }

    // --- Step on/off ---

    /// Flip a step; turning it off clears all of its overrides at once.
    /// Returns the new state.
    pub fn toggle_step(&mut self, channel: ChannelId, step: StepIndex) -> bool {
        let slot = self.slot_mut(channel, step);
        if slot.on {
            slot.switch_off();
        } else {
            slot.on = true;
        }
        slot.on
    }

    pub fn set_step_on(&mut self, channel: ChannelId, step: StepIndex, on: bool) {
        let slot = self.slot_mut(channel, step);
        if on {
            slot.on = true;
        } else {
            slot.switch_off();
        }
    }

    // --- Parameter locks ---
    //
    // Each lock edit turns the step on before writing the value, so the
    // real-time reader never sees an override on a step that is off.

    /// Shift the step pitch, seeding an inheriting step from the base pitch
    pub fn adjust_step_pitch(&mut self, channel: ChannelId, step: StepIndex, delta: i32) {
        let base = self.channel(channel).base_pitch;
        let slot = self.slot_mut(channel, step);
        slot.on = true;
        let current = slot.pitch.unwrap_or(base) as i32;
        slot.pitch = Some((current + delta).clamp(0, 127) as u8);
    }

    /// Replace the pitch override (clamped); `None` inherits again
    pub fn set_step_pitch(&mut self, channel: ChannelId, step: StepIndex, pitch: Option<u8>) {
        let slot = self.slot_mut(channel, step);
        slot.on = true;
        slot.pitch = pitch.map(|p| p.min(127));
    }

    /// Shift the step length, seeding an inheriting step from the global default
    pub fn adjust_step_length(&mut self, channel: ChannelId, step: StepIndex, delta: i32) {
        let default_length = self.default_length;
        let slot = self.slot_mut(channel, step);
        slot.on = true;
        slot.length = Some(slot.length.unwrap_or(default_length).offset(delta));
    }

    pub fn adjust_step_ratchet(&mut self, channel: ChannelId, step: StepIndex, delta: i32) {
        let slot = self.slot_mut(channel, step);
        slot.on = true;
        slot.ratchet = slot.ratchet.offset(delta);
    }

    pub fn set_step_ratchet(&mut self, channel: ChannelId, step: StepIndex, level: u8) {
        let slot = self.slot_mut(channel, step);
        slot.on = true;
        slot.ratchet = RatchetLevel::new(level);
    }

    /// Flip the fill flag; the step is forced on. Returns the new flag.
    pub fn toggle_step_fill(&mut self, channel: ChannelId, step: StepIndex) -> bool {
        let slot = self.slot_mut(channel, step);
        slot.on = true;
        slot.fill = !slot.fill;
        slot.fill
    }

    // --- Channel globals ---

    pub fn toggle_mute(&mut self, channel: ChannelId) -> bool {
        let ch = self.channel_mut(channel);
        ch.muted = !ch.muted;
        ch.muted
    }

    pub fn set_muted(&mut self, channel: ChannelId, muted: bool) {
        self.channel_mut(channel).muted = muted;
    }

    pub fn set_base_pitch(&mut self, channel: ChannelId, pitch: u8) {
        self.channel_mut(channel).base_pitch = pitch.min(127);
    }

    pub fn adjust_base_pitch(&mut self, channel: ChannelId, delta: i32) {
        let ch = self.channel_mut(channel);
        ch.base_pitch = (ch.base_pitch as i32 + delta).clamp(0, 127) as u8;
    }

    // --- Euclid ---

    pub fn set_euclid_enabled(&mut self, channel: ChannelId, enabled: bool) {
        let ch = self.channel_mut(channel);
        ch.euclid.enabled = enabled;
        ch.refresh_euclid();
    }

    pub fn toggle_euclid(&mut self, channel: ChannelId) -> bool {
        let enabled = !self.channel(channel).euclid.enabled;
        self.set_euclid_enabled(channel, enabled);
        enabled
    }

    /// Set pulses (clamped to 0..=STEPS) and rotation (wrapped) together
    pub fn set_euclid(&mut self, channel: ChannelId, pulses: u8, rotation: u8) {
        let ch = self.channel_mut(channel);
        let pulses = pulses.min(STEPS as u8);
        let rotation = rotation % STEPS as u8;
        if ch.euclid.pulses != pulses || ch.euclid.rotation != rotation {
            ch.euclid.pulses = pulses;
            ch.euclid.rotation = rotation;
            ch.refresh_euclid();
        }
    }

    pub fn adjust_euclid_pulses(&mut self, channel: ChannelId, delta: i32) {
        let euclid = self.channel(channel).euclid;
        let pulses = (euclid.pulses as i32 + delta).clamp(0, STEPS as i32) as u8;
        self.set_euclid(channel, pulses, euclid.rotation);
    }

    pub fn adjust_euclid_rotation(&mut self, channel: ChannelId, delta: i32) {
        let euclid = self.channel(channel).euclid;
        let rotation = (euclid.rotation as i32 + delta).rem_euclid(STEPS as i32) as u8;
        self.set_euclid(channel, euclid.pulses, rotation);
    }

    /// Switch the melody scale. A non-off scale writes a fresh random
    /// pitch row into the step overrides; off clears every pitch override.
    /// The onset pattern is left alone.
    pub fn set_scale_mode<R: Rng + ?Sized>(
        &mut self,
        channel: ChannelId,
        scale: ScaleMode,
        rng: &mut R,
    ) {
        let ch = self.channel_mut(channel);
        ch.euclid.scale = scale;
        let melody = euclid::generate_melody(ch.base_pitch, scale, rng);
        for (slot, pitch) in ch.steps.iter_mut().zip(melody) {
            slot.pitch = pitch;
        }
    }

    /// Advance to the next scale mode, returning it
    pub fn cycle_scale_mode<R: Rng + ?Sized>(&mut self, channel: ChannelId, rng: &mut R) -> ScaleMode {
        let next = self.channel(channel).euclid.scale.next();
        self.set_scale_mode(channel, next, rng);
        next
    }

    /// Move every assigned pitch by `degrees` steps of the active scale
    pub fn transpose_melody(&mut self, channel: ChannelId, degrees: i32) {
        let ch = self.channel_mut(channel);
        let scale = ch.euclid.scale;
        if scale == ScaleMode::Off {
            return;
        }
        let base = ch.base_pitch;
        for slot in ch.steps.iter_mut() {
            if let Some(pitch) = slot.pitch {
                slot.pitch = Some(euclid::transpose_degrees(pitch, base, scale, degrees));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ch(i: usize) -> ChannelId {
        ChannelId::new(i).unwrap()
    }

    fn st(i: usize) -> StepIndex {
        StepIndex::new(i).unwrap()
    }

    #[test]
    fn test_indices_validated() {
        assert!(ChannelId::new(CHANNELS).is_none());
        assert!(StepIndex::new(STEPS).is_none());
        assert_eq!(ChannelId::all().count(), CHANNELS);
        assert_eq!(StepIndex::new(STEPS - 1).unwrap().next(), StepIndex::FIRST);
    }

    #[test]
    fn test_factory_state_is_silent() {
        let store = PatternStore::new();
        for c in ChannelId::all() {
            assert_eq!(store.channel(c).base_pitch(), DEFAULT_BASE_PITCH);
            assert!(!store.channel(c).is_muted());
            for s in StepIndex::all() {
                assert!(!store.is_active(c, s));
                assert!(!store.step(c, s).has_overrides());
            }
        }
        assert_eq!(store.default_length(), NoteLength::Sixteenth);
    }

    #[test]
    fn test_toggle_off_resets_overrides() {
        let mut store = PatternStore::new();
        store.adjust_step_pitch(ch(1), st(3), 5);
        store.adjust_step_length(ch(1), st(3), -2);
        store.adjust_step_ratchet(ch(1), st(3), 2);
        store.toggle_step_fill(ch(1), st(3));
        assert!(store.step(ch(1), st(3)).has_overrides());

        assert!(!store.toggle_step(ch(1), st(3)));
        assert_eq!(*store.step(ch(1), st(3)), StepSlot::default());
    }

    #[test]
    fn test_set_step_off_resets_overrides() {
        let mut store = PatternStore::new();
        store.set_step_ratchet(ch(0), st(0), 4);
        store.set_step_on(ch(0), st(0), false);
        assert_eq!(store.step(ch(0), st(0)).ratchet(), RatchetLevel::OFF);
    }

    #[test]
    fn test_lock_forces_step_on() {
        let mut store = PatternStore::new();
        store.adjust_step_length(ch(2), st(7), 0);
        assert!(store.step(ch(2), st(7)).is_on());
        assert_eq!(store.step(ch(2), st(7)).length(), Some(NoteLength::Sixteenth));
    }

    #[test]
    fn test_pitch_lock_seeds_from_base() {
        let mut store = PatternStore::new();
        store.set_base_pitch(ch(0), 48);
        store.adjust_step_pitch(ch(0), st(0), 2);
        assert_eq!(store.step(ch(0), st(0)).pitch(), Some(50));

        store.adjust_step_pitch(ch(0), st(0), 200);
        assert_eq!(store.step(ch(0), st(0)).pitch(), Some(127));
    }

    #[test]
    fn test_base_pitch_clamped() {
        let mut store = PatternStore::new();
        store.adjust_base_pitch(ch(3), -100);
        assert_eq!(store.channel(ch(3)).base_pitch(), 0);
        store.set_base_pitch(ch(3), 250);
        assert_eq!(store.channel(ch(3)).base_pitch(), 127);
    }

    #[test]
    fn test_euclid_governs_activity() {
        let mut store = PatternStore::new();
        store.set_step_on(ch(0), st(1), true);
        assert!(store.is_active(ch(0), st(1)));
        assert!(!store.is_active(ch(0), st(0)));

        store.set_euclid_enabled(ch(0), true);
        // default 4 pulses: 0, 4, 8, 12
        assert!(store.is_active(ch(0), st(0)));
        assert!(!store.is_active(ch(0), st(1)));
    }

    #[test]
    fn test_euclid_pulses_and_rotation_clamped() {
        let mut store = PatternStore::new();
        store.adjust_euclid_pulses(ch(0), 40);
        assert_eq!(store.channel(ch(0)).euclid().pulses, STEPS as u8);
        store.adjust_euclid_pulses(ch(0), -99);
        assert_eq!(store.channel(ch(0)).euclid().pulses, 0);

        store.adjust_euclid_rotation(ch(0), -1);
        assert_eq!(store.channel(ch(0)).euclid().rotation, STEPS as u8 - 1);
        store.adjust_euclid_rotation(ch(0), 2);
        assert_eq!(store.channel(ch(0)).euclid().rotation, 1);
    }

    #[test]
    fn test_rotation_recomputes_pattern() {
        let mut store = PatternStore::new();
        store.set_euclid(ch(1), 4, 2);
        let onsets: Vec<usize> = store
            .channel(ch(1))
            .euclid_pattern()
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(onsets, vec![2, 6, 10, 14]);
    }

    #[test]
    fn test_scale_change_keeps_rhythm() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut store = PatternStore::new();
        store.set_euclid(ch(0), 5, 3);
        let before = *store.channel(ch(0)).euclid_pattern();

        store.set_scale_mode(ch(0), ScaleMode::Minor, &mut rng);
        assert_eq!(*store.channel(ch(0)).euclid_pattern(), before);
        assert!(StepIndex::all().all(|s| store.step(ch(0), s).pitch().is_some()));
    }

    #[test]
    fn test_scale_off_clears_pitches() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut store = PatternStore::new();
        store.set_scale_mode(ch(2), ScaleMode::Major, &mut rng);
        store.set_scale_mode(ch(2), ScaleMode::Off, &mut rng);
        assert!(StepIndex::all().all(|s| store.step(ch(2), s).pitch().is_none()));
    }

    #[test]
    fn test_cycle_scale_mode() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut store = PatternStore::new();
        assert_eq!(store.cycle_scale_mode(ch(0), &mut rng), ScaleMode::Major);
        assert_eq!(store.cycle_scale_mode(ch(0), &mut rng), ScaleMode::Minor);
        assert_eq!(store.cycle_scale_mode(ch(0), &mut rng), ScaleMode::Chromatic);
        assert_eq!(store.cycle_scale_mode(ch(0), &mut rng), ScaleMode::Off);
    }

    #[test]
    fn test_transpose_melody() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut store = PatternStore::new();
        store.set_base_pitch(ch(0), 48);
        store.set_scale_mode(ch(0), ScaleMode::Major, &mut rng);
        store.set_step_pitch(ch(0), st(0), Some(52));

        store.transpose_melody(ch(0), 2);
        assert_eq!(store.step(ch(0), st(0)).pitch(), Some(55));
    }

    #[test]
    fn test_mute_toggle() {
        let mut store = PatternStore::new();
        assert!(store.toggle_mute(ch(1)));
        assert!(store.channel(ch(1)).is_muted());
        assert!(!store.toggle_mute(ch(1)));
    }
}
