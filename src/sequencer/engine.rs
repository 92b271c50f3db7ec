// Engine - Clock and transport state machine driving the note scheduler
// Runs entirely in the real-time context. Every entry point takes the
// current time, a read view of the pattern store and the output sink.

use crate::config::{EngineConfig, TICKS_PER_STEP};
use crate::messaging::command::Command;
use crate::midi::event::{self, MidiMessage};
use crate::midi::sink::MidiSink;
use crate::sequencer::Tick;
use crate::sequencer::clock::{BpmEstimator, ClockWatchdog, InternalClock};
use crate::sequencer::pattern::{ChannelId, PatternStore, StepIndex};
use crate::sequencer::scheduler::NoteScheduler;
use crate::sequencer::transport::{ClockSource, SharedTransportState, TransportState};
use std::sync::Arc;

pub struct Engine {
    state: TransportState,
    source: ClockSource,
    tick: Tick,
    step: StepIndex,
    /// Ticks since the current step began (0..TICKS_PER_STEP)
    step_phase: u32,
    /// Timebase for notes triggered while stopped; never published
    stopped_tick: Tick,
    bpm: u16,
    bpm_min: u16,
    bpm_max: u16,
    internal: InternalClock,
    estimator: BpmEstimator,
    watchdog: ClockWatchdog,
    scheduler: NoteScheduler,
    shared_state: Arc<SharedTransportState>,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_shared_state(config, SharedTransportState::new(config.default_bpm))
    }

    /// Create with existing shared state (handed to the control thread)
    pub fn with_shared_state(config: &EngineConfig, shared_state: Arc<SharedTransportState>) -> Self {
        let bpm = config.clamp_bpm(config.default_bpm as i32);
        let engine = Self {
            state: TransportState::Stopped,
            source: ClockSource::Internal,
            tick: 0,
            step: StepIndex::FIRST,
            step_phase: 0,
            stopped_tick: 0,
            bpm,
            bpm_min: config.bpm_min,
            bpm_max: config.bpm_max,
            internal: InternalClock::new(bpm),
            estimator: BpmEstimator::new(bpm),
            watchdog: ClockWatchdog::new(config.clock_timeout_ms),
            scheduler: NoteScheduler::new(config.velocity, config.note_off_framing),
            shared_state,
        };
        engine.publish();
        engine
    }

    pub fn shared_state(&self) -> Arc<SharedTransportState> {
        Arc::clone(&self.shared_state)
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn clock_source(&self) -> ClockSource {
        self.source
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn step(&self) -> StepIndex {
        self.step
    }

    pub fn bpm(&self) -> u16 {
        self.bpm
    }

    pub fn scheduler(&self) -> &NoteScheduler {
        &self.scheduler
    }

    fn publish(&self) {
        self.shared_state
            .publish(self.state, self.source, self.tick, self.step.index(), self.bpm);
    }

    fn emit<S: MidiSink + ?Sized>(&self, sink: &mut S, message: MidiMessage) {
        sink.send_bytes(message.encode(self.scheduler.framing()).as_slice());
    }

    fn reset_position(&mut self) {
        self.tick = 0;
        self.step = StepIndex::FIRST;
        self.step_phase = 0;
    }

    /// Set the internal clock tempo (clamped)
    pub fn set_bpm(&mut self, bpm: i32) {
        let bpm = bpm.clamp(self.bpm_min as i32, self.bpm_max as i32) as u16;
        if bpm != self.bpm {
            log::debug!("BPM {} -> {}", self.bpm, bpm);
        }
        self.bpm = bpm;
        self.internal.set_bpm(bpm);
        self.publish();
    }

    /// Local start: Start + first clock out, position reset, step 0 fired
    pub fn start<S: MidiSink + ?Sized>(&mut self, now_us: u64, store: &PatternStore, sink: &mut S) {
        self.scheduler.silence_all(sink);
        self.emit(sink, MidiMessage::Start);
        self.emit(sink, MidiMessage::Clock);
        self.reset_position();
        self.state = TransportState::Running;
        self.trigger_step(store, sink);
        if self.source == ClockSource::Internal {
            self.internal.start(now_us);
        }
        log::info!("Transport started ({:?} clock, {} BPM)", self.source, self.bpm);
        self.publish();
    }

    /// Local stop: silence every channel, Stop out, timer disarmed
    pub fn stop<S: MidiSink + ?Sized>(&mut self, sink: &mut S) {
        self.scheduler.silence_all(sink);
        self.emit(sink, MidiMessage::Stop);
        self.internal.stop();
        self.state = TransportState::Stopped;
        self.reset_position();
        log::info!("Transport stopped");
        self.publish();
    }

    /// Apply a request from the polling context
    pub fn handle_command<S: MidiSink + ?Sized>(
        &mut self,
        command: Command,
        now_us: u64,
        store: &PatternStore,
        sink: &mut S,
    ) {
        match command {
            Command::Start => self.start(now_us, store, sink),
            Command::Stop => self.stop(sink),
            Command::SetBpm(bpm) => self.set_bpm(bpm as i32),
            Command::NudgeBpm(delta) => self.set_bpm(self.bpm as i32 + delta as i32),
            Command::TriggerChannel(channel) => self.trigger_channel(channel, now_us, store, sink),
        }
    }

    /// Handle one byte from MIDI input; only realtime bytes are acted on
    pub fn receive_byte<S: MidiSink + ?Sized>(
        &mut self,
        byte: u8,
        now_us: u64,
        store: &PatternStore,
        sink: &mut S,
    ) {
        if !matches!(byte, event::CLOCK | event::START | event::CONTINUE | event::STOP) {
            return;
        }

        self.watchdog.feed(now_us);
        if self.source == ClockSource::Internal {
            log::info!("External clock detected");
            self.source = ClockSource::External;
            // A stopped transport may still be timing a triggered note
            if self.state.is_running() {
                self.internal.stop();
            }
        }

        match byte {
            event::START => {
                self.scheduler.silence_all(sink);
                self.estimator.reset(self.bpm);
                self.reset_position();
                self.state = TransportState::Running;
                self.trigger_step(store, sink);
                log::info!("External start");
            }
            event::CONTINUE => {
                self.state = TransportState::Running;
                log::info!("External continue at tick {}", self.tick);
            }
            event::STOP => {
                self.scheduler.silence_all(sink);
                self.state = TransportState::Stopped;
                self.reset_position();
                log::info!("External stop");
            }
            _ => {
                if let Some(estimate) = self.estimator.record(now_us) {
                    let bpm = estimate.round() as i32;
                    if bpm.clamp(self.bpm_min as i32, self.bpm_max as i32) as u16 != self.bpm {
                        self.set_bpm(bpm);
                    }
                }
                if self.state.is_running() {
                    self.pulse(store, sink);
                }
            }
        }
        self.publish();
    }

    /// Service the internal clock and the external clock watchdog
    pub fn poll<S: MidiSink + ?Sized>(&mut self, now_us: u64, store: &PatternStore, sink: &mut S) {
        if self.source == ClockSource::External && self.watchdog.expired(now_us) {
            log::warn!("External clock lost, falling back to internal at {} BPM", self.bpm);
            self.source = ClockSource::Internal;
            self.watchdog.clear();
            self.estimator.reset(self.bpm);
            if self.state.is_running() {
                self.internal.start(now_us);
            }
        }

        if self.state.is_running() {
            if self.source == ClockSource::Internal {
                for _ in 0..self.internal.poll(now_us) {
                    self.emit(sink, MidiMessage::Clock);
                    self.pulse(store, sink);
                }
            }
        } else if self.internal.is_running() {
            self.release_stopped_notes(now_us, sink);
        }
        self.publish();
    }

    /// Run note-offs and ratchet hits of notes triggered while stopped
    ///
    /// No clock goes out and the transport position stays put. The timer
    /// disarms once every voice is idle.
    fn release_stopped_notes<S: MidiSink + ?Sized>(&mut self, now_us: u64, sink: &mut S) {
        for _ in 0..self.internal.poll(now_us) {
            self.stopped_tick += 1;
            self.scheduler.resolve_note_offs(self.stopped_tick, sink);
            self.scheduler.resolve_ratchets(self.stopped_tick, sink);
        }
        if self.scheduler.is_idle() {
            self.internal.stop();
        }
    }

    /// One clock pulse: note-offs, then ratchet hits, then the step boundary
    fn pulse<S: MidiSink + ?Sized>(&mut self, store: &PatternStore, sink: &mut S) {
        self.tick += 1;
        self.scheduler.resolve_note_offs(self.tick, sink);
        self.scheduler.resolve_ratchets(self.tick, sink);

        self.step_phase += 1;
        if self.step_phase >= TICKS_PER_STEP {
            self.step_phase = 0;
            self.step = self.step.next();
            self.trigger_step(store, sink);
        }
    }

    /// Fire every channel that is active at the current step
    fn trigger_step<S: MidiSink + ?Sized>(&mut self, store: &PatternStore, sink: &mut S) {
        let fill_held = self.shared_state.fill_held();
        for channel in ChannelId::all() {
            if store.is_active(channel, self.step) {
                self.scheduler
                    .trigger(channel, self.step, self.tick, store, fill_held, sink);
            }
        }
    }

    /// Immediate trigger from the panel, running or not
    fn trigger_channel<S: MidiSink + ?Sized>(
        &mut self,
        channel: ChannelId,
        now_us: u64,
        store: &PatternStore,
        sink: &mut S,
    ) {
        let fill_held = self.shared_state.fill_held();
        if self.state.is_running() {
            self.scheduler
                .trigger(channel, self.step, self.tick, store, fill_held, sink);
            return;
        }

        self.scheduler
            .trigger(channel, self.step, self.stopped_tick, store, fill_held, sink);
        if !self.scheduler.is_idle() && !self.internal.is_running() {
            self.internal.start(now_us);
        }
    }
}
