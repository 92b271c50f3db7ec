// Input mapper - Panel events to pattern edits and transport requests
// Runs in the polling context. Pattern edits are applied directly to the
// store; anything touching the transport comes back as an Action for the
// real-time handler.

use crate::config::{ROTARY_CONTROLS, STEPS};
use crate::messaging::command::Command;
use crate::sequencer::euclid::ScaleMode;
use crate::sequencer::pattern::{ChannelId, PatternStore, StepIndex};
use crate::sequencer::transport::SharedTransportState;
use crate::input::rotary::{Gearbox, QuadratureDecoder};
use rand::Rng;

/// Rotary controls, named after what they edit when no step is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotary {
    Tempo,
    Pitch,
    Length,
    Euclid,
}

impl Rotary {
    pub const ALL: [Rotary; ROTARY_CONTROLS] =
        [Rotary::Tempo, Rotary::Pitch, Rotary::Length, Rotary::Euclid];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Transitions per click
    fn divisor(self, step_held: bool) -> i32 {
        match (self, step_held) {
            (Rotary::Tempo, _) => 2,
            (Rotary::Euclid, _) => 4,
            (_, true) => 4,
            (_, false) => 20,
        }
    }
}

/// Gearbox applied to tempo clicks when they edit the ratchet level
const RATCHET_DIVISOR: i32 = 2;

/// Everything the panel can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    StepPressed(StepIndex),
    StepReleased(StepIndex),
    /// Channel select / live fill modifier
    ChannelModifier { held: bool },
    StartStopPressed,
    StartStopReleased,
    /// Pre-decoded signed transitions
    RotaryTurned { rotary: Rotary, delta: i32 },
    /// Raw pin levels, decoded here
    RotaryPins { rotary: Rotary, a: bool, b: bool },
    RotaryPressed(Rotary),
}

/// Follow-up the polling context has to carry out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Forward to the real-time handler
    Transport(Command),
    /// Persist the current state
    Save,
}

#[derive(Debug, Clone)]
pub struct InputMapper {
    selected: ChannelId,
    held_step: Option<StepIndex>,
    pending_toggle: [bool; STEPS],
    channel_modifier: bool,
    start_stop_held: bool,
    /// Start/stop was used as a mute modifier during the current hold
    start_stop_consumed: bool,
    decoders: [QuadratureDecoder; ROTARY_CONTROLS],
    gearboxes: [Gearbox; ROTARY_CONTROLS],
    ratchet_gearbox: Gearbox,
}

impl Default for InputMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl InputMapper {
    pub fn new() -> Self {
        Self {
            selected: ChannelId::default(),
            held_step: None,
            pending_toggle: [false; STEPS],
            channel_modifier: false,
            start_stop_held: false,
            start_stop_consumed: false,
            decoders: [QuadratureDecoder::new(); ROTARY_CONTROLS],
            gearboxes: [Gearbox::new(); ROTARY_CONTROLS],
            ratchet_gearbox: Gearbox::new(),
        }
    }

    pub fn selected_channel(&self) -> ChannelId {
        self.selected
    }

    pub fn held_step(&self) -> Option<StepIndex> {
        self.held_step
    }

    pub fn select_channel(&mut self, channel: ChannelId) {
        self.selected = channel;
    }

    /// Apply one panel event
    pub fn handle<R: Rng + ?Sized>(
        &mut self,
        event: InputEvent,
        store: &mut PatternStore,
        transport: &SharedTransportState,
        rng: &mut R,
    ) -> Option<Action> {
        match event {
            InputEvent::StepPressed(step) => {
                self.step_pressed(step, store);
                None
            }
            InputEvent::StepReleased(step) => {
                self.step_released(step, store);
                None
            }
            InputEvent::ChannelModifier { held } => {
                self.channel_modifier = held;
                transport.set_fill_held(held);
                None
            }
            InputEvent::StartStopPressed => {
                self.start_stop_held = true;
                self.start_stop_consumed = false;
                None
            }
            InputEvent::StartStopReleased => {
                let toggle = self.start_stop_held && !self.start_stop_consumed;
                self.start_stop_held = false;
                self.start_stop_consumed = false;
                toggle.then(|| {
                    if transport.is_running() {
                        Action::Transport(Command::Stop)
                    } else {
                        Action::Transport(Command::Start)
                    }
                })
            }
            InputEvent::RotaryPins { rotary, a, b } => {
                let delta = self.decoders[rotary.index()].update(a, b) as i32;
                if delta == 0 {
                    return None;
                }
                self.rotary_turned(rotary, delta, store)
            }
            InputEvent::RotaryTurned { rotary, delta } => self.rotary_turned(rotary, delta, store),
            InputEvent::RotaryPressed(rotary) => self.rotary_pressed(rotary, store, rng),
        }
    }

    fn step_pressed(&mut self, step: StepIndex, store: &mut PatternStore) {
        let as_channel = ChannelId::new(step.index());

        if let (true, Some(channel)) = (self.channel_modifier, as_channel) {
            self.selected = channel;
            log::debug!("Selected channel {}", channel.index());
        } else if let (true, Some(channel)) = (self.start_stop_held, as_channel) {
            let muted = store.toggle_mute(channel);
            self.start_stop_consumed = true;
            log::debug!("Channel {} muted: {}", channel.index(), muted);
        } else {
            self.pending_toggle[step.index()] = true;
            self.held_step = Some(step);
        }
    }

    fn step_released(&mut self, step: StepIndex, store: &mut PatternStore) {
        if std::mem::take(&mut self.pending_toggle[step.index()]) {
            store.toggle_step(self.selected, step);
        }
        if self.held_step == Some(step) {
            self.held_step = None;
            self.ratchet_gearbox.reset();
        }
    }

    /// A parameter lock edit on the held step supersedes its plain toggle
    fn lock_edit(&mut self, step: StepIndex) {
        self.pending_toggle[step.index()] = false;
    }

    fn rotary_turned(&mut self, rotary: Rotary, delta: i32, store: &mut PatternStore) -> Option<Action> {
        let held = self.held_step;
        // Base pitch turns the other way round on the panel
        let delta = if rotary == Rotary::Pitch && held.is_none() { -delta } else { delta };
        let clicks = self.gearboxes[rotary.index()].feed(delta, rotary.divisor(held.is_some()));
        if clicks == 0 {
            return None;
        }

        let channel = self.selected;
        match (rotary, held) {
            (Rotary::Tempo, Some(step)) => {
                let levels = self.ratchet_gearbox.feed(clicks, RATCHET_DIVISOR);
                if levels != 0 {
                    self.lock_edit(step);
                    store.adjust_step_ratchet(channel, step, levels);
                }
                None
            }
            (Rotary::Tempo, None) => {
                let clicks = clicks.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
                Some(Action::Transport(Command::NudgeBpm(clicks)))
            }
            (Rotary::Pitch, Some(step)) => {
                self.lock_edit(step);
                store.adjust_step_pitch(channel, step, clicks);
                None
            }
            (Rotary::Pitch, None) => {
                let euclid = store.channel(channel).euclid();
                if self.channel_modifier && euclid.enabled && euclid.scale != ScaleMode::Off {
                    store.transpose_melody(channel, clicks);
                } else {
                    store.adjust_base_pitch(channel, clicks);
                }
                None
            }
            (Rotary::Length, Some(step)) => {
                self.lock_edit(step);
                store.adjust_step_length(channel, step, clicks);
                None
            }
            (Rotary::Length, None) => {
                store.adjust_default_length(clicks);
                None
            }
            (Rotary::Euclid, Some(_)) => None,
            (Rotary::Euclid, None) => {
                if store.channel(channel).euclid().enabled {
                    if self.channel_modifier {
                        store.adjust_euclid_rotation(channel, clicks);
                    } else {
                        store.adjust_euclid_pulses(channel, clicks);
                    }
                }
                None
            }
        }
    }

    fn rotary_pressed<R: Rng + ?Sized>(
        &mut self,
        rotary: Rotary,
        store: &mut PatternStore,
        rng: &mut R,
    ) -> Option<Action> {
        let channel = self.selected;
        match rotary {
            Rotary::Tempo => return Some(Action::Save),
            Rotary::Pitch => {
                if let Some(step) = self.held_step {
                    self.lock_edit(step);
                    store.toggle_step_fill(channel, step);
                }
            }
            Rotary::Length => {
                if self.held_step.is_none() {
                    let scale = store.cycle_scale_mode(channel, rng);
                    log::debug!("Channel {} scale {:?}", channel.index(), scale);
                }
            }
            Rotary::Euclid => {
                let enabled = store.toggle_euclid(channel);
                log::debug!("Channel {} euclid: {}", channel.index(), enabled);
            }
        }
        None
    }
}
