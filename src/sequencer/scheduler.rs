// Note scheduler - Turns step triggers and ticks into note-on/off bytes
// One voice per channel: a new note always ends the previous one first,
// and every note-off is scheduled in absolute ticks.

use crate::config::{CHANNELS, TICKS_PER_STEP};
use crate::midi::event::{MidiMessage, NoteOffFraming};
use crate::midi::sink::MidiSink;
use crate::sequencer::Tick;
use crate::sequencer::pattern::{ChannelId, PatternStore, StepIndex};

/// Note currently held on a channel, with the tick its note-off is due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundingNote {
    pub pitch: u8,
    pub on_tick: Tick,
    pub off_tick: Tick,
}

/// Remaining hits of a ratchet burst
///
/// `next_hit < end` holds for as long as the burst exists and `end` is
/// always the tick of the step boundary that follows the triggering step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatchetBurst {
    pub interval: Tick,
    pub next_hit: Tick,
    pub end: Tick,
    pub pitch: u8,
}

/// Per-channel playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Voice {
    sounding: Option<SoundingNote>,
    burst: Option<RatchetBurst>,
}

impl Voice {
    pub fn sounding(&self) -> Option<SoundingNote> {
        self.sounding
    }

    pub fn burst(&self) -> Option<RatchetBurst> {
        self.burst
    }
}

/// What happened when a channel was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Played { pitch: u8 },
    Muted,
    /// Fill step while the fill modifier is up
    FillSkipped,
}

pub struct NoteScheduler {
    voices: [Voice; CHANNELS],
    velocity: u8,
    framing: NoteOffFraming,
}

impl NoteScheduler {
    pub fn new(velocity: u8, framing: NoteOffFraming) -> Self {
        Self {
            voices: [Voice::default(); CHANNELS],
            velocity: velocity.clamp(1, 127),
            framing,
        }
    }

    pub fn voice(&self, channel: ChannelId) -> &Voice {
        &self.voices[channel.index()]
    }

    pub fn framing(&self) -> NoteOffFraming {
        self.framing
    }

    fn send<S: MidiSink + ?Sized>(&self, sink: &mut S, message: MidiMessage) {
        sink.send_bytes(message.encode(self.framing).as_slice());
    }

    fn note_on<S: MidiSink + ?Sized>(&mut self, channel: ChannelId, pitch: u8, tick: Tick, off_tick: Tick, sink: &mut S) {
        self.send(
            sink,
            MidiMessage::NoteOn {
                channel: channel.midi_channel(),
                note: pitch,
                velocity: self.velocity,
            },
        );
        self.voices[channel.index()].sounding = Some(SoundingNote {
            pitch,
            on_tick: tick,
            off_tick,
        });
    }

    fn note_off<S: MidiSink + ?Sized>(&mut self, channel: ChannelId, sink: &mut S) {
        if let Some(note) = self.voices[channel.index()].sounding.take() {
            self.send(
                sink,
                MidiMessage::NoteOff {
                    channel: channel.midi_channel(),
                    note: note.pitch,
                },
            );
        }
    }

    /// Fire a channel at `step`
    ///
    /// Any note still sounding is cut first, even when the channel turns
    /// out to be muted or the step is a skipped fill.
    pub fn trigger<S: MidiSink + ?Sized>(
        &mut self,
        channel: ChannelId,
        step: StepIndex,
        tick: Tick,
        store: &PatternStore,
        fill_held: bool,
        sink: &mut S,
    ) -> TriggerOutcome {
        let voice = &mut self.voices[channel.index()];
        voice.burst = None;
        if voice.sounding.is_some_and(|note| tick < note.off_tick) {
            self.note_off(channel, sink);
        }

        let ch = store.channel(channel);
        if ch.is_muted() {
            return TriggerOutcome::Muted;
        }
        let slot = ch.step(step);
        if slot.is_fill() && !fill_held {
            return TriggerOutcome::FillSkipped;
        }

        let pitch = slot.pitch().unwrap_or(ch.base_pitch()).min(127);

        match slot.ratchet().ticks_per_hit().map(Tick::from) {
            Some(ticks_per_hit) => {
                let off_tick = tick + (ticks_per_hit / 2).max(1);
                self.note_on(channel, pitch, tick, off_tick, sink);

                let next_hit = tick + ticks_per_hit;
                let end = tick + Tick::from(TICKS_PER_STEP);
                if next_hit < end {
                    self.voices[channel.index()].burst = Some(RatchetBurst {
                        interval: ticks_per_hit,
                        next_hit,
                        end,
                        pitch,
                    });
                }
            }
            None => {
                let length = slot.length().unwrap_or(store.default_length());
                // One tick short so the next trigger starts from a released gate
                let off_tick = tick + Tick::from(length.ticks().saturating_sub(1).max(1));
                self.note_on(channel, pitch, tick, off_tick, sink);
            }
        }

        TriggerOutcome::Played { pitch }
    }

    /// Send every note-off that is due at `tick`, channel order 0..N-1
    pub fn resolve_note_offs<S: MidiSink + ?Sized>(&mut self, tick: Tick, sink: &mut S) {
        for channel in ChannelId::all() {
            if self.voices[channel.index()]
                .sounding
                .is_some_and(|note| tick >= note.off_tick)
            {
                self.note_off(channel, sink);
            }
        }
    }

    /// Fire every ratchet hit that is due at `tick`
    pub fn resolve_ratchets<S: MidiSink + ?Sized>(&mut self, tick: Tick, sink: &mut S) {
        for channel in ChannelId::all() {
            let Some(mut burst) = self.voices[channel.index()].burst else {
                continue;
            };
            if tick < burst.next_hit {
                continue;
            }
            if tick >= burst.end {
                self.voices[channel.index()].burst = None;
                continue;
            }

            self.note_off(channel, sink);
            let off_tick = tick + (burst.interval / 2).max(1);
            self.note_on(channel, burst.pitch, tick, off_tick, sink);

            burst.next_hit += burst.interval;
            self.voices[channel.index()].burst = (burst.next_hit < burst.end).then_some(burst);
        }
    }

    /// Cut every sounding note and cancel every burst (transport stop)
    pub fn silence_all<S: MidiSink + ?Sized>(&mut self, sink: &mut S) {
        for channel in ChannelId::all() {
            self.voices[channel.index()].burst = None;
            self.note_off(channel, sink);
        }
    }

    /// True when no channel has a note or burst pending
    pub fn is_idle(&self) -> bool {
        self.voices
            .iter()
            .all(|v| v.sounding.is_none() && v.burst.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::event::decode_stream;
    use crate::sequencer::note::{NoteLength, RatchetLevel};

    fn ch(i: usize) -> ChannelId {
        ChannelId::new(i).unwrap()
    }

    fn st(i: usize) -> StepIndex {
        StepIndex::new(i).unwrap()
    }

    fn scheduler() -> NoteScheduler {
        NoteScheduler::new(100, NoteOffFraming::NoteOnZeroVelocity)
    }

    fn note_on(channel: u8, note: u8) -> MidiMessage {
        MidiMessage::NoteOn {
            channel,
            note,
            velocity: 100,
        }
    }

    fn note_off(channel: u8, note: u8) -> MidiMessage {
        MidiMessage::NoteOff { channel, note }
    }

    /// Run ticks `from..=to` through the resolution passes
    fn run_ticks(scheduler: &mut NoteScheduler, from: Tick, to: Tick, sink: &mut Vec<u8>) {
        for tick in from..=to {
            scheduler.resolve_note_offs(tick, sink);
            scheduler.resolve_ratchets(tick, sink);
        }
    }

    #[test]
    fn test_plain_note_uses_default_length() {
        let mut store = PatternStore::new();
        store.set_step_on(ch(0), st(0), true);
        let mut sched = scheduler();
        let mut sink = Vec::new();

        let outcome = sched.trigger(ch(0), st(0), 10, &store, false, &mut sink);
        assert_eq!(outcome, TriggerOutcome::Played { pitch: 36 });

        // sixteenth = 6 ticks, gate ends one tick early
        let note = sched.voice(ch(0)).sounding().unwrap();
        assert_eq!(note.off_tick, 15);
        assert!(note.off_tick >= note.on_tick);
    }

    #[test]
    fn test_length_override() {
        let mut store = PatternStore::new();
        store.set_default_length(NoteLength::Whole);
        store.adjust_step_length(ch(1), st(2), 2); // whole -> quarter
        let mut sched = scheduler();
        let mut sink = Vec::new();

        sched.trigger(ch(1), st(2), 0, &store, false, &mut sink);
        assert_eq!(sched.voice(ch(1)).sounding().unwrap().off_tick, 23);
    }

    #[test]
    fn test_pitch_override_and_midi_channel() {
        let mut store = PatternStore::new();
        store.set_step_pitch(ch(2), st(0), Some(72));
        let mut sched = scheduler();
        let mut sink = Vec::new();

        sched.trigger(ch(2), st(0), 0, &store, false, &mut sink);
        assert_eq!(sink, vec![0x92, 72, 100]);
    }

    #[test]
    fn test_note_off_resolved_once() {
        let mut store = PatternStore::new();
        store.set_step_on(ch(0), st(0), true);
        let mut sched = scheduler();
        let mut sink = Vec::new();

        sched.trigger(ch(0), st(0), 0, &store, false, &mut sink);
        run_ticks(&mut sched, 1, 20, &mut sink);

        assert_eq!(decode_stream(&sink), vec![note_on(0, 36), note_off(0, 36)]);
        assert!(sched.is_idle());
    }

    #[test]
    fn test_retrigger_cuts_previous_note() {
        let mut store = PatternStore::new();
        store.set_default_length(NoteLength::Whole);
        store.set_step_on(ch(0), st(0), true);
        let mut sched = scheduler();
        let mut sink = Vec::new();

        sched.trigger(ch(0), st(0), 0, &store, false, &mut sink);
        sched.trigger(ch(0), st(0), 6, &store, false, &mut sink);

        assert_eq!(
            decode_stream(&sink),
            vec![note_on(0, 36), note_off(0, 36), note_on(0, 36)]
        );
        assert_eq!(sched.voice(ch(0)).sounding().unwrap().on_tick, 6);
    }

    #[test]
    fn test_muted_channel_silences_then_returns() {
        let mut store = PatternStore::new();
        store.set_default_length(NoteLength::Whole);
        store.set_step_on(ch(3), st(0), true);
        let mut sched = scheduler();
        let mut sink = Vec::new();

        sched.trigger(ch(3), st(0), 0, &store, false, &mut sink);
        store.set_muted(ch(3), true);
        sink.clear();

        let outcome = sched.trigger(ch(3), st(0), 6, &store, false, &mut sink);
        assert_eq!(outcome, TriggerOutcome::Muted);
        assert_eq!(decode_stream(&sink), vec![note_off(3, 36)]);
        assert!(sched.voice(ch(3)).sounding().is_none());
    }

    #[test]
    fn test_fill_step_needs_modifier() {
        let mut store = PatternStore::new();
        store.toggle_step_fill(ch(0), st(4));
        let mut sched = scheduler();
        let mut sink = Vec::new();

        let outcome = sched.trigger(ch(0), st(4), 24, &store, false, &mut sink);
        assert_eq!(outcome, TriggerOutcome::FillSkipped);
        assert!(sink.is_empty());

        let outcome = sched.trigger(ch(0), st(4), 24, &store, true, &mut sink);
        assert_eq!(outcome, TriggerOutcome::Played { pitch: 36 });
    }

    #[test]
    fn test_ratchet_level_three() {
        let mut store = PatternStore::new();
        store.set_step_ratchet(ch(0), st(0), 3);
        let mut sched = scheduler();
        let mut sink = Vec::new();
        let t = 60;

        sched.trigger(ch(0), st(0), t, &store, false, &mut sink);
        let burst = sched.voice(ch(0)).burst().unwrap();
        assert_eq!(burst.next_hit, t + 3);
        assert_eq!(burst.end, t + 6);
        assert_eq!(sched.voice(ch(0)).sounding().unwrap().off_tick, t + 1);

        let mut hits = vec![t];
        for tick in t + 1..t + 12 {
            let before = sink.len();
            sched.resolve_note_offs(tick, &mut sink);
            sched.resolve_ratchets(tick, &mut sink);
            if decode_stream(&sink[before..])
                .iter()
                .any(|m| matches!(m, MidiMessage::NoteOn { .. }))
            {
                hits.push(tick);
            }
        }
        assert_eq!(hits, vec![t, t + 3]);
        assert!(sched.is_idle());
    }

    #[test]
    fn test_ratchet_level_one_is_single_hit() {
        let mut store = PatternStore::new();
        store.set_step_ratchet(ch(0), st(0), 1);
        let mut sched = scheduler();
        let mut sink = Vec::new();

        sched.trigger(ch(0), st(0), 0, &store, false, &mut sink);
        assert!(sched.voice(ch(0)).burst().is_none());
        assert_eq!(sched.voice(ch(0)).sounding().unwrap().off_tick, 3);
    }

    #[test]
    fn test_ratchet_never_reaches_step_end() {
        for level in 1..=5u8 {
            let mut store = PatternStore::new();
            store.set_step_ratchet(ch(1), st(0), level);
            let mut sched = scheduler();
            let mut sink = Vec::new();
            let start = 42;

            sched.trigger(ch(1), st(0), start, &store, false, &mut sink);
            for tick in start + 1..start + 24 {
                if let Some(burst) = sched.voice(ch(1)).burst() {
                    assert!(burst.next_hit < burst.end);
                    assert_eq!(burst.end, start + Tick::from(TICKS_PER_STEP));
                }
                sched.resolve_note_offs(tick, &mut sink);
                sched.resolve_ratchets(tick, &mut sink);
                if let Some(note) = sched.voice(ch(1)).sounding() {
                    assert!(note.on_tick < start + Tick::from(TICKS_PER_STEP), "level {}", level);
                }
            }

            let hits = decode_stream(&sink)
                .iter()
                .filter(|m| matches!(m, MidiMessage::NoteOn { .. }))
                .count() as u32;
            assert_eq!(hits, RatchetLevel::new(level).hits_per_step(), "level {}", level);
        }
    }

    #[test]
    fn test_ratchet_level_five_alternates() {
        let mut store = PatternStore::new();
        store.set_step_ratchet(ch(0), st(0), 5);
        let mut sched = scheduler();
        let mut sink = Vec::new();

        sched.trigger(ch(0), st(0), 0, &store, false, &mut sink);
        run_ticks(&mut sched, 1, 6, &mut sink);

        let messages = decode_stream(&sink);
        // six on/off pairs, strictly alternating
        assert_eq!(messages.len(), 12);
        for pair in messages.chunks(2) {
            assert_eq!(pair, &[note_on(0, 36), note_off(0, 36)]);
        }
    }

    #[test]
    fn test_notes_past_32_bit_tick_range() {
        let mut store = PatternStore::new();
        store.set_step_on(ch(0), st(0), true);
        store.set_step_ratchet(ch(1), st(0), 4);
        let mut sched = scheduler();
        let mut sink = Vec::new();
        let t = u32::MAX as Tick - 2;

        sched.trigger(ch(0), st(0), t, &store, false, &mut sink);
        sched.trigger(ch(1), st(0), t, &store, false, &mut sink);
        assert_eq!(sched.voice(ch(0)).sounding().unwrap().off_tick, t + 5);
        assert_eq!(sched.voice(ch(1)).burst().unwrap().end, t + 6);

        run_ticks(&mut sched, t + 1, t + 12, &mut sink);
        let messages = decode_stream(&sink);
        let ons = messages.iter().filter(|m| matches!(m, MidiMessage::NoteOn { .. })).count();
        let offs = messages.iter().filter(|m| matches!(m, MidiMessage::NoteOff { .. })).count();
        // one plain note plus three ratchet hits
        assert_eq!((ons, offs), (4, 4));
        assert!(sched.is_idle());
    }

    #[test]
    fn test_silence_all() {
        let mut store = PatternStore::new();
        store.set_default_length(NoteLength::Whole);
        store.set_step_on(ch(0), st(0), true);
        store.set_step_ratchet(ch(2), st(0), 4);
        let mut sched = scheduler();
        let mut sink = Vec::new();

        sched.trigger(ch(0), st(0), 0, &store, false, &mut sink);
        sched.trigger(ch(2), st(0), 0, &store, false, &mut sink);
        sink.clear();

        sched.silence_all(&mut sink);
        assert_eq!(decode_stream(&sink), vec![note_off(0, 36), note_off(2, 36)]);
        assert!(sched.is_idle());
    }

    #[test]
    fn test_true_note_off_framing() {
        let mut store = PatternStore::new();
        store.set_step_on(ch(1), st(0), true);
        let mut sched = NoteScheduler::new(90, NoteOffFraming::NoteOff);
        let mut sink = Vec::new();

        sched.trigger(ch(1), st(0), 0, &store, false, &mut sink);
        sched.resolve_note_offs(5, &mut sink);
        assert_eq!(sink, vec![0x91, 36, 90, 0x81, 36, 0]);
    }
}
