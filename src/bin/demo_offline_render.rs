// Offline demonstration: render two bars of a pattern and persist it
// Run with: cargo run --bin demo_offline_render

use quadseq::input::console::render_grid;
use quadseq::midi::event::decode_stream;
use quadseq::sequencer::clock::pulse_period_us;
use quadseq::{
    ChannelId, EngineConfig, FileStorage, InputEvent, LoadOutcome, MidiMessage, Rotary, StepIndex,
    create_runtime,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("quadseq - Offline Render Demo");
    println!("=============================");

    let state_path = std::env::temp_dir().join("quadseq_demo_state.ron");
    let config = EngineConfig::default();
    let (mut realtime, control) =
        create_runtime(&config, Vec::new(), Box::new(FileStorage::new(&state_path)));
    let mut control = control.with_seed(2024);

    let step = |i: usize| StepIndex::new(i).ok_or("step out of range");

    // Kick on the quarters, a ratcheted hat on the last step
    for i in [0, 4, 8, 12] {
        control.handle(InputEvent::StepPressed(step(i)?));
        control.handle(InputEvent::StepReleased(step(i)?));
    }
    control.handle(InputEvent::StepPressed(step(15)?));
    control.handle(InputEvent::RotaryTurned { rotary: Rotary::Tempo, delta: 12 });
    control.handle(InputEvent::StepReleased(step(15)?));

    // Channel 1: euclid 5 over 16 with a minor melody
    control.handle(InputEvent::ChannelModifier { held: true });
    control.handle(InputEvent::StepPressed(step(1)?));
    control.handle(InputEvent::StepReleased(step(1)?));
    control.handle(InputEvent::ChannelModifier { held: false });
    control.handle(InputEvent::RotaryPressed(Rotary::Euclid));
    control.handle(InputEvent::RotaryTurned { rotary: Rotary::Euclid, delta: 4 });
    control.handle(InputEvent::RotaryPressed(Rotary::Length));
    control.handle(InputEvent::RotaryPressed(Rotary::Length));

    print!("{}", control.with_store(|store| render_grid(store, 0)));

    // Two bars at 120 BPM on a simulated clock
    control.start();
    let period = pulse_period_us(config.default_bpm);
    let pulses = 2 * 16 * quadseq::config::TICKS_PER_STEP as u64;
    for pulse in 0..=pulses {
        realtime.service(pulse * period);
    }
    control.stop();
    realtime.service((pulses + 1) * period);

    let messages = decode_stream(realtime.sink());
    let notes = messages
        .iter()
        .filter(|m| matches!(m, MidiMessage::NoteOn { .. }))
        .count();
    let clocks = messages
        .iter()
        .filter(|m| matches!(m, MidiMessage::Clock))
        .count();
    println!("\nRendered {} bytes: {} note-ons, {} clocks", realtime.sink().len(), notes, clocks);
    for message in messages.iter().filter(|m| !matches!(m, MidiMessage::Clock)).take(12) {
        println!("   {:?}", message);
    }

    // Persist, wipe and restore
    control.save()?;
    println!("\nSaved state to: {}", state_path.display());
    control.edit_store(|store| store.toggle_mute(ChannelId::default()));
    match control.load() {
        LoadOutcome::Restored => {
            let muted = control.with_store(|s| s.channel(ChannelId::default()).is_muted());
            println!("Restored state, channel 0 muted: {}", muted);
        }
        other => println!("Load outcome: {:?}", other),
    }

    std::fs::remove_file(&state_path)?;
    Ok(())
}
