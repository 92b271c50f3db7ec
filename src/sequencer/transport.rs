// Transport - Run state and clock source, mirrored for the control thread
// The engine owns the authoritative values; the shared state is a
// published copy the polling context reads without locking.

use crate::sequencer::Tick;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicU64, Ordering};

/// Transport state (running/stopped)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Running,
}

impl TransportState {
    pub fn is_running(&self) -> bool {
        matches!(self, TransportState::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped)
    }
}

/// Where clock pulses come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockSource {
    #[default]
    Internal,
    /// Pulses arrive as 0xF8 on MIDI input
    External,
}

/// Shared transport state
/// Written by the real-time handler, read by the control thread (and the
/// other way round for the fill modifier)
#[derive(Debug)]
pub struct SharedTransportState {
    running: AtomicBool,
    external: AtomicBool,
    tick: AtomicU64,
    step: AtomicU8,
    bpm: AtomicU16,
    fill_held: AtomicBool,
}

impl SharedTransportState {
    /// Create new shared transport state
    pub fn new(bpm: u16) -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(false),
            external: AtomicBool::new(false),
            tick: AtomicU64::new(0),
            step: AtomicU8::new(0),
            bpm: AtomicU16::new(bpm),
            fill_held: AtomicBool::new(false),
        })
    }

    /// Get current transport state
    pub fn state(&self) -> TransportState {
        if self.running.load(Ordering::Acquire) {
            TransportState::Running
        } else {
            TransportState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub fn clock_source(&self) -> ClockSource {
        if self.external.load(Ordering::Acquire) {
            ClockSource::External
        } else {
            ClockSource::Internal
        }
    }

    pub fn tick(&self) -> Tick {
        self.tick.load(Ordering::Acquire)
    }

    /// Current step (0..STEPS), for display
    pub fn step(&self) -> usize {
        self.step.load(Ordering::Acquire) as usize
    }

    pub fn bpm(&self) -> u16 {
        self.bpm.load(Ordering::Acquire)
    }

    /// Fill modifier, set by the control thread
    pub fn fill_held(&self) -> bool {
        self.fill_held.load(Ordering::Acquire)
    }

    pub fn set_fill_held(&self, held: bool) {
        self.fill_held.store(held, Ordering::Release);
    }

    /// Publish the engine's view (real-time side only)
    pub(crate) fn publish(
        &self,
        state: TransportState,
        source: ClockSource,
        tick: Tick,
        step: usize,
        bpm: u16,
    ) {
        self.tick.store(tick, Ordering::Release);
        self.step.store(step as u8, Ordering::Release);
        self.bpm.store(bpm, Ordering::Release);
        self.external
            .store(source == ClockSource::External, Ordering::Release);
        self.running.store(state.is_running(), Ordering::Release);
    }
}

impl Default for SharedTransportState {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(false),
            external: AtomicBool::new(false),
            tick: AtomicU64::new(0),
            step: AtomicU8::new(0),
            bpm: AtomicU16::new(crate::config::DEFAULT_BPM),
            fill_held: AtomicBool::new(false),
        }
    }
}
