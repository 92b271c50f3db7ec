use quadseq::input::console::{self, ConsoleCommand};
use quadseq::messaging::create_midi_byte_channel;
use quadseq::midi::sink::{create_output_queue, drain_output};
use quadseq::midi::device::{list_input_ports, list_output_ports};
use quadseq::midi::{ClockInput, OutputPort};
use quadseq::{EngineConfig, FileStorage, create_runtime};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

// Real-time handler period; a 24 PPQN pulse at 300 BPM is ~8.3 ms
const SERVICE_PERIOD: Duration = Duration::from_micros(250);
const WRITER_IDLE: Duration = Duration::from_micros(500);
const MIDI_INPUT_CAPACITY: usize = 512;

fn micros_since(origin: Instant) -> u64 {
    origin.elapsed().as_micros() as u64
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&PathBuf::from(path))?,
        None => EngineConfig::default(),
    };
    log::info!("quadseq {} starting", env!("CARGO_PKG_VERSION"));

    let origin = Instant::now();
    let (sink, mut output) = create_output_queue(config.output_queue_capacity);
    let storage = FileStorage::new(config.state_path());
    let (mut realtime, mut control) = create_runtime(&config, sink, Box::new(storage));

    match list_output_ports() {
        Ok(ports) => {
            for p in ports {
                log::debug!("MIDI output {}: {}", p.index, p.name);
            }
        }
        Err(e) => log::warn!("Cannot enumerate MIDI outputs: {}", e),
    }
    let mut port = OutputPort::open(config.midi_output_port.as_deref())?;

    // Optional external clock
    let _clock_input = match config.midi_input_port.as_deref() {
        Some(filter) => {
            if let Ok(ports) = list_input_ports() {
                for p in ports {
                    log::debug!("MIDI input {}: {}", p.index, p.name);
                }
            }
            let (byte_tx, byte_rx) = create_midi_byte_channel(MIDI_INPUT_CAPACITY);
            match ClockInput::open(filter, byte_tx, origin) {
                Ok(input) => {
                    realtime.attach_midi_input(byte_rx);
                    Some(input)
                }
                Err(e) => {
                    log::warn!("External clock unavailable: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    control.load();

    let running = Arc::new(AtomicBool::new(true));

    let rt_running = Arc::clone(&running);
    let realtime_thread = thread::Builder::new()
        .name("quadseq-realtime".to_string())
        .spawn(move || {
            while rt_running.load(Ordering::Acquire) {
                realtime.service(micros_since(origin));
                thread::sleep(SERVICE_PERIOD);
            }
            // One last pass so a queued Stop still goes out
            realtime.service(micros_since(origin));
            if realtime.sink().dropped() > 0 {
                log::warn!("{} output bytes dropped", realtime.sink().dropped());
            }
        })?;

    let writer_running = Arc::new(AtomicBool::new(true));
    let writer_flag = Arc::clone(&writer_running);
    let writer_thread = thread::Builder::new()
        .name("quadseq-writer".to_string())
        .spawn(move || {
            let mut buffer = Vec::with_capacity(256);
            loop {
                buffer.clear();
                if drain_output(&mut output, &mut buffer) > 0 {
                    if let Err(e) = port.send_stream(&buffer) {
                        log::error!("MIDI output error on {}: {}", port.name(), e);
                    }
                } else if !writer_flag.load(Ordering::Acquire) {
                    break;
                } else {
                    thread::sleep(WRITER_IDLE);
                }
            }
        })?;

    println!("{}", console::HELP);
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        match console::parse_line(&line) {
            Ok(ConsoleCommand::Events(events)) => {
                for event in events {
                    control.handle(event);
                }
            }
            Ok(ConsoleCommand::Show) => {
                let step = control.transport().step();
                print!("{}", control.with_store(|store| console::render_grid(store, step)));
                println!(
                    "{} BPM, {:?} clock, {}",
                    control.transport().bpm(),
                    control.transport().clock_source(),
                    if control.transport().is_running() { "running" } else { "stopped" }
                );
            }
            Ok(ConsoleCommand::Help) => println!("{}", console::HELP),
            Ok(ConsoleCommand::Quit) => break,
            Err(e) => println!("{}", e),
        }
    }

    if control.transport().is_running() {
        control.stop();
    }
    running.store(false, Ordering::Release);

    if realtime_thread.join().is_err() {
        log::error!("Real-time thread panicked");
    }
    // The writer drains whatever the final service queued before exiting
    writer_running.store(false, Ordering::Release);
    if writer_thread.join().is_err() {
        log::error!("Writer thread panicked");
    }

    if let Err(e) = control.save() {
        log::error!("Failed to save state on exit: {}", e);
    }
    log::info!("quadseq stopped");
    Ok(())
}
