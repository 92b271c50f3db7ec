// Debounce - Settle-window filtering for panel switches

use super::mapper::{InputEvent, Rotary};
use crate::config::{DEBOUNCE_US, ROTARY_CONTROLS, STEPS};
use crate::sequencer::pattern::StepIndex;

/// Debounced level of one button or switch
///
/// A new raw level is only reported once it has held steady for the
/// settle window. Timestamps are microseconds from the same clock the
/// real-time handler uses.
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    stable: bool,
    candidate: bool,
    since: u64,
    window: u64,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

impl Debouncer {
    /// Released switch with the standard 10 ms window
    pub fn new() -> Self {
        Self::with_window(DEBOUNCE_US)
    }

    pub fn with_window(window: u64) -> Self {
        Self {
            stable: false,
            candidate: false,
            since: 0,
            window,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.stable
    }

    /// Sample the raw level at `now`; returns `Some(level)` on a settled edge
    pub fn sample(&mut self, level: bool, now: u64) -> Option<bool> {
        if level != self.candidate {
            self.candidate = level;
            self.since = now;
            return None;
        }
        if level != self.stable && now.saturating_sub(self.since) >= self.window {
            self.stable = level;
            return Some(level);
        }
        None
    }
}

/// A physical switch on the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelSwitch {
    Step(StepIndex),
    ChannelModifier,
    StartStop,
    Rotary(Rotary),
}

/// One debouncer per panel switch, producing settled input events
#[derive(Debug, Clone)]
pub struct PanelScanner {
    steps: [Debouncer; STEPS],
    channel_modifier: Debouncer,
    start_stop: Debouncer,
    rotaries: [Debouncer; ROTARY_CONTROLS],
}

impl Default for PanelScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelScanner {
    pub fn new() -> Self {
        Self {
            steps: [Debouncer::new(); STEPS],
            channel_modifier: Debouncer::new(),
            start_stop: Debouncer::new(),
            rotaries: [Debouncer::new(); ROTARY_CONTROLS],
        }
    }

    /// Sample a raw switch level; returns the event for a settled edge
    ///
    /// Rotary switches only report presses.
    pub fn sample(&mut self, switch: PanelSwitch, level: bool, now: u64) -> Option<InputEvent> {
        match switch {
            PanelSwitch::Step(step) => {
                let pressed = self.steps[step.index()].sample(level, now)?;
                Some(if pressed {
                    InputEvent::StepPressed(step)
                } else {
                    InputEvent::StepReleased(step)
                })
            }
            PanelSwitch::ChannelModifier => {
                let held = self.channel_modifier.sample(level, now)?;
                Some(InputEvent::ChannelModifier { held })
            }
            PanelSwitch::StartStop => {
                let pressed = self.start_stop.sample(level, now)?;
                Some(if pressed {
                    InputEvent::StartStopPressed
                } else {
                    InputEvent::StartStopReleased
                })
            }
            PanelSwitch::Rotary(rotary) => self.rotaries[rotary.index()]
                .sample(level, now)
                .filter(|pressed| *pressed)
                .map(|_| InputEvent::RotaryPressed(rotary)),
        }
    }
}
