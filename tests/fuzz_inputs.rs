//! Fuzzing tests for panel input and MIDI input
//!
//! Random event streams are pushed through a running sequencer. Nothing may
//! panic, the store must stay in range, and a stop must leave no note sounding.

use quadseq::config::{BPM_MAX, BPM_MIN, STEPS};
use quadseq::midi::event::decode_stream;
use quadseq::sequencer::note::RatchetLevel;
use quadseq::{
    ChannelId, Control, EngineConfig, InputEvent, MemoryStorage, MidiMessage, PatternStore,
    Realtime, Rotary, StepIndex, create_runtime,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn runtime(seed: u64) -> (Realtime<Vec<u8>>, Control) {
    let (realtime, control) =
        create_runtime(&EngineConfig::default(), Vec::new(), Box::new(MemoryStorage::new()));
    (realtime, control.with_seed(seed))
}

fn random_event(rng: &mut StdRng) -> InputEvent {
    let step = StepIndex::new(rng.gen_range(0..STEPS)).unwrap();
    let rotary = Rotary::from_index(rng.gen_range(0..4)).unwrap();
    match rng.gen_range(0..9) {
        0 => InputEvent::StepPressed(step),
        1 => InputEvent::StepReleased(step),
        2 => InputEvent::ChannelModifier { held: rng.gen_bool(0.5) },
        3 => InputEvent::StartStopPressed,
        4 => InputEvent::StartStopReleased,
        5 | 6 => InputEvent::RotaryTurned { rotary, delta: rng.gen_range(-40..=40) },
        7 => InputEvent::RotaryPins { rotary, a: rng.gen_bool(0.5), b: rng.gen_bool(0.5) },
        // Tempo switch saves; keep it rare
        _ if rotary == Rotary::Tempo => InputEvent::RotaryPressed(Rotary::Euclid),
        _ => InputEvent::RotaryPressed(rotary),
    }
}

fn assert_store_in_range(store: &PatternStore) {
    for channel in ChannelId::all() {
        let ch = store.channel(channel);
        assert!(ch.base_pitch() <= 127);
        assert!(ch.euclid().pulses as usize <= STEPS);
        assert!((ch.euclid().rotation as usize) < STEPS);
        let onsets = ch.euclid_pattern().iter().filter(|on| **on).count();
        assert_eq!(onsets, ch.euclid().pulses as usize);

        for slot in ch.steps() {
            assert!(slot.ratchet().level() <= RatchetLevel::MAX);
            assert!(slot.pitch().is_none_or(|p| p <= 127));
            if !slot.is_on() {
                assert!(slot.length().is_none());
                assert!(slot.ratchet().is_off());
                assert!(!slot.is_fill());
            }
        }
    }
}

/// Every note-on is closed by a note-off on the same channel before the next one
fn assert_balanced(bytes: &[u8]) {
    let mut sounding: [Option<u8>; 16] = [None; 16];
    for message in decode_stream(bytes) {
        match message {
            MidiMessage::NoteOn { channel, note, .. } => {
                assert!(sounding[channel as usize].is_none(), "overlap on channel {}", channel);
                sounding[channel as usize] = Some(note);
            }
            MidiMessage::NoteOff { channel, note } => {
                assert_eq!(sounding[channel as usize], Some(note));
                sounding[channel as usize] = None;
            }
            _ => {}
        }
    }
    assert!(sounding.iter().all(Option::is_none), "stuck notes: {:?}", sounding);
}

/// Random panel activity against a running transport
#[test]
fn fuzz_panel_events_while_running() {
    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let (mut realtime, mut control) = runtime(seed);
        control.start();

        let mut now = 0u64;
        for _ in 0..2_000 {
            control.handle(random_event(&mut rng));
            now += rng.gen_range(0..=5_000);
            realtime.service(now);

            let bpm = control.transport().bpm();
            assert!((BPM_MIN..=BPM_MAX).contains(&bpm));
        }

        control.with_store(assert_store_in_range);

        if control.transport().is_running() {
            control.stop();
        }
        realtime.service(now + 1);
        assert!(realtime.engine().scheduler().is_idle());
        assert_balanced(realtime.sink());
    }
}

/// Random bytes on the MIDI input interleaved with internal clock service
#[test]
fn fuzz_midi_input_bytes() {
    let realtime_bytes = [0xF8, 0xF8, 0xF8, 0xFA, 0xFB, 0xFC];

    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let (mut realtime, mut control) = runtime(seed);
        control.edit_store(|store| {
            for channel in ChannelId::all() {
                for step in StepIndex::all() {
                    if rng.gen_bool(0.4) {
                        store.set_step_ratchet(channel, step, rng.gen_range(0..=5));
                    }
                }
            }
        });

        let mut now = 0u64;
        for _ in 0..3_000 {
            now += rng.gen_range(0..=30_000);
            let byte = if rng.gen_bool(0.7) {
                realtime_bytes[rng.gen_range(0..realtime_bytes.len())]
            } else {
                rng.r#gen::<u8>()
            };
            realtime.receive_byte(byte, now);
            if rng.gen_bool(0.1) {
                // occasional long gap to trip the watchdog
                now += rng.gen_range(0..=3_000_000);
            }
            realtime.service(now);

            let bpm = control.transport().bpm();
            assert!((BPM_MIN..=BPM_MAX).contains(&bpm));
        }

        control.stop();
        realtime.service(now + 1);
        assert_balanced(realtime.sink());
    }
}

/// The output stream must always decode cleanly, whatever came in
#[test]
fn fuzz_output_stream_is_well_formed() {
    let mut rng = StdRng::seed_from_u64(7);
    let (mut realtime, mut control) = runtime(7);
    control.start();

    let mut now = 0u64;
    for _ in 0..5_000 {
        control.handle(random_event(&mut rng));
        realtime.receive_byte(rng.r#gen::<u8>(), now);
        now += rng.gen_range(1..=2_000);
        realtime.service(now);
    }

    let bytes = realtime.sink();
    let mut reencoded = Vec::with_capacity(bytes.len());
    for message in decode_stream(bytes) {
        reencoded.extend_from_slice(
            message
                .encode(EngineConfig::default().note_off_framing)
                .as_slice(),
        );
    }
    assert_eq!(reencoded.as_slice(), bytes.as_slice());
}
