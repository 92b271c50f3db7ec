// Runtime - The two execution contexts and the state they share
// `Realtime` is serviced from a high-priority periodic thread and owns
// tick advancement and byte emission. `Control` is the polling context:
// panel input, parameter edits and persistence.

use crate::config::EngineConfig;
use crate::input::debounce::{PanelScanner, PanelSwitch};
use crate::input::mapper::{Action, InputEvent, InputMapper};
use crate::messaging::channels::{
    CommandConsumer, CommandProducer, MidiByteConsumer, create_command_channel,
};
use crate::messaging::command::Command;
use crate::midi::sink::MidiSink;
use crate::persistence::{self, PersistenceError, StateStorage};
use crate::sequencer::engine::Engine;
use crate::sequencer::pattern::{ChannelId, PatternStore};
use crate::sequencer::transport::SharedTransportState;
use rand::SeedableRng;
use rand::rngs::StdRng;
use ringbuf::traits::{Consumer, Producer};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

/// Pattern store shared by both contexts; holds are kept short
pub type SharedStore = Arc<Mutex<PatternStore>>;

fn lock_store(store: &SharedStore) -> MutexGuard<'_, PatternStore> {
    // Edits are plain field writes, so a poisoned store is still consistent
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Non-blocking variant for the real-time side; `None` while the store is held
fn try_lock_store(store: &SharedStore) -> Option<MutexGuard<'_, PatternStore>> {
    match store.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

/// Build both contexts around one engine and one store
pub fn create_runtime<S: MidiSink>(
    config: &EngineConfig,
    sink: S,
    storage: Box<dyn StateStorage>,
) -> (Realtime<S>, Control) {
    let (command_tx, command_rx) = create_command_channel(config.command_queue_capacity);
    let store: SharedStore = Arc::new(Mutex::new(PatternStore::new()));
    let engine = Engine::new(config);
    let transport = engine.shared_state();

    let realtime = Realtime {
        engine,
        commands: command_rx,
        midi_input: None,
        store: Arc::clone(&store),
        sink,
        skipped_services: 0,
    };
    let control = Control {
        mapper: InputMapper::new(),
        scanner: PanelScanner::new(),
        commands: command_tx,
        store,
        transport,
        storage,
        rng: StdRng::from_entropy(),
        default_bpm: config.clamp_bpm(config.default_bpm as i32),
    };
    (realtime, control)
}

/// High-priority side
pub struct Realtime<S: MidiSink> {
    engine: Engine,
    commands: CommandConsumer,
    midi_input: Option<MidiByteConsumer>,
    store: SharedStore,
    sink: S,
    skipped_services: u64,
}

impl<S: MidiSink> Realtime<S> {
    /// Feed bytes from a MIDI input queue into every `service` call
    pub fn attach_midi_input(&mut self, input: MidiByteConsumer) {
        self.midi_input = Some(input);
    }

    /// Periodic entry point: pending commands, queued input bytes, then clocks
    ///
    /// Never waits on the polling context. While it holds the store the
    /// pass is skipped; queued work and due pulses carry over to the next one.
    pub fn service(&mut self, now_us: u64) {
        let Some(store) = try_lock_store(&self.store) else {
            self.skipped_services += 1;
            return;
        };

        while let Some(command) = self.commands.try_pop() {
            self.engine
                .handle_command(command, now_us, &store, &mut self.sink);
        }
        if let Some(input) = self.midi_input.as_mut() {
            while let Some(timed) = input.try_pop() {
                self.engine
                    .receive_byte(timed.byte, timed.at_us, &store, &mut self.sink);
            }
        }
        self.engine.poll(now_us, &store, &mut self.sink);
    }

    /// Direct entry for a byte arriving on MIDI input
    ///
    /// Blocks on the store; threaded hosts queue bytes through
    /// `attach_midi_input` instead.
    pub fn receive_byte(&mut self, byte: u8, now_us: u64) {
        let store = lock_store(&self.store);
        self.engine.receive_byte(byte, now_us, &store, &mut self.sink);
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Passes skipped because the polling context held the store
    pub fn skipped_services(&self) -> u64 {
        self.skipped_services
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

/// What a boot-time load did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Restored,
    NoSavedState,
    /// Stored state was unusable; factory defaults are in place
    Rejected,
}

/// Polling side
pub struct Control {
    mapper: InputMapper,
    scanner: PanelScanner,
    commands: CommandProducer,
    store: SharedStore,
    transport: Arc<SharedTransportState>,
    storage: Box<dyn StateStorage>,
    rng: StdRng,
    default_bpm: u16,
}

impl Control {
    /// Replace the melody generator with a seeded one
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn transport(&self) -> &SharedTransportState {
        &self.transport
    }

    pub fn mapper(&self) -> &InputMapper {
        &self.mapper
    }

    /// Run `f` against the current pattern state
    pub fn with_store<T>(&self, f: impl FnOnce(&PatternStore) -> T) -> T {
        f(&lock_store(&self.store))
    }

    /// Edit the pattern state outside the panel mapping
    pub fn edit_store<T>(&mut self, f: impl FnOnce(&mut PatternStore) -> T) -> T {
        f(&mut lock_store(&self.store))
    }

    /// Queue a request for the real-time handler; false when the queue is full
    pub fn send(&mut self, command: Command) -> bool {
        if self.commands.try_push(command).is_err() {
            log::warn!("Command queue full, dropping {:?}", command);
            return false;
        }
        true
    }

    pub fn start(&mut self) -> bool {
        self.send(Command::Start)
    }

    pub fn stop(&mut self) -> bool {
        self.send(Command::Stop)
    }

    pub fn trigger_channel(&mut self, channel: ChannelId) -> bool {
        self.send(Command::TriggerChannel(channel))
    }

    /// Apply one panel event
    pub fn handle(&mut self, event: InputEvent) {
        let action = {
            let mut store = lock_store(&self.store);
            self.mapper
                .handle(event, &mut store, &self.transport, &mut self.rng)
        };

        match action {
            Some(Action::Transport(command)) => {
                self.send(command);
            }
            Some(Action::Save) => {
                if let Err(e) = self.save() {
                    log::error!("Failed to save state: {}", e);
                }
            }
            None => {}
        }
    }

    /// Feed a raw switch level from a panel scan; settled edges are handled
    pub fn sample_switch(&mut self, switch: PanelSwitch, level: bool, now: u64) {
        if let Some(event) = self.scanner.sample(switch, level, now) {
            self.handle(event);
        }
    }

    /// Persist the pattern state and the current tempo
    pub fn save(&mut self) -> Result<(), PersistenceError> {
        let store = lock_store(&self.store).clone();
        persistence::save_state(self.storage.as_mut(), &store, self.transport.bpm())
    }

    /// Load persisted state, falling back to factory defaults when it is unusable
    pub fn load(&mut self) -> LoadOutcome {
        match persistence::load_state(self.storage.as_mut()) {
            Ok(Some(snapshot)) => {
                *lock_store(&self.store) = snapshot.store;
                self.send(Command::SetBpm(snapshot.bpm));
                log::info!("Restored saved state ({} BPM)", snapshot.bpm);
                LoadOutcome::Restored
            }
            Ok(None) => {
                log::info!("No saved state, starting from factory defaults");
                LoadOutcome::NoSavedState
            }
            Err(e) => {
                log::warn!("Saved state rejected ({}), starting from factory defaults", e);
                *lock_store(&self.store) = PatternStore::new();
                self.send(Command::SetBpm(self.default_bpm));
                LoadOutcome::Rejected
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::mapper::Rotary;
    use crate::midi::event::{MidiMessage, decode_stream};
    use crate::persistence::MemoryStorage;
    use crate::sequencer::pattern::StepIndex;

    fn st(i: usize) -> StepIndex {
        StepIndex::new(i).unwrap()
    }

    fn runtime() -> (Realtime<Vec<u8>>, Control) {
        let (realtime, control) =
            create_runtime(&EngineConfig::default(), Vec::new(), Box::new(MemoryStorage::new()));
        (realtime, control.with_seed(1))
    }

    #[test]
    fn test_panel_start_reaches_engine() {
        let (mut realtime, mut control) = runtime();
        control.handle(InputEvent::StepPressed(st(0)));
        control.handle(InputEvent::StepReleased(st(0)));
        control.handle(InputEvent::StartStopPressed);
        control.handle(InputEvent::StartStopReleased);

        realtime.service(0);
        assert!(control.transport().is_running());
        assert_eq!(
            decode_stream(realtime.sink()),
            vec![
                MidiMessage::Start,
                MidiMessage::Clock,
                MidiMessage::NoteOn { channel: 0, note: 36, velocity: 100 },
            ]
        );
    }

    #[test]
    fn test_bouncing_step_button_toggles_once() {
        let (_realtime, mut control) = runtime();
        let button = PanelSwitch::Step(st(5));
        // Contact chatter on press, then a clean hold and release
        for (level, now) in [(true, 0), (false, 800), (true, 1_500), (true, 12_000)] {
            control.sample_switch(button, level, now);
        }
        for (level, now) in [(false, 40_000), (true, 40_500), (false, 41_000), (false, 52_000)] {
            control.sample_switch(button, level, now);
        }
        let channel = control.mapper().selected_channel();
        assert!(control.with_store(|s| s.step(channel, st(5)).is_on()));
    }

    #[test]
    fn test_tempo_rotary_reaches_engine() {
        let (mut realtime, mut control) = runtime();
        control.handle(InputEvent::RotaryTurned { rotary: Rotary::Tempo, delta: 10 });
        realtime.service(0);
        assert_eq!(realtime.engine().bpm(), 125);
        assert_eq!(control.transport().bpm(), 125);
    }

    #[test]
    fn test_save_switch_then_load() {
        let (mut realtime, mut control) = runtime();
        control.edit_store(|store| store.toggle_step(ChannelId::new(2).unwrap(), st(6)));
        control.send(Command::SetBpm(90));
        realtime.service(0);

        control.handle(InputEvent::RotaryPressed(Rotary::Tempo));
        control.edit_store(|store| *store = PatternStore::new());

        assert_eq!(control.load(), LoadOutcome::Restored);
        realtime.service(1);
        assert!(control.with_store(|s| s.step(ChannelId::new(2).unwrap(), st(6)).is_on()));
        assert_eq!(realtime.engine().bpm(), 90);
    }

    #[test]
    fn test_rejected_state_boots_factory_defaults() {
        let blob = "(format: 1, bpm: 120, default_length: 4, channels: [])";
        let (mut realtime, control) = create_runtime(
            &EngineConfig::default(),
            Vec::new(),
            Box::new(MemoryStorage::with_blob(blob)),
        );
        let mut control = control.with_seed(3);
        control.edit_store(|store| store.set_muted(ChannelId::new(0).unwrap(), true));

        assert_eq!(control.load(), LoadOutcome::Rejected);
        assert_eq!(control.with_store(|s| s.clone()), PatternStore::new());
        realtime.service(0);
        assert_eq!(realtime.engine().bpm(), 120);
    }

    #[test]
    fn test_empty_storage() {
        let (_realtime, mut control) = runtime();
        assert_eq!(control.load(), LoadOutcome::NoSavedState);
    }

    #[test]
    fn test_queued_midi_input() {
        use crate::messaging::channels::create_midi_byte_channel;
        use crate::messaging::command::TimedByte;

        let (mut realtime, control) = runtime();
        let (mut tx, rx) = create_midi_byte_channel(16);
        realtime.attach_midi_input(rx);

        tx.try_push(TimedByte { byte: 0xFA, at_us: 100 }).unwrap();
        tx.try_push(TimedByte { byte: 0xF8, at_us: 200 }).unwrap();
        realtime.service(300);

        assert!(control.transport().is_running());
        assert_eq!(realtime.engine().tick(), 1);
    }

    #[test]
    fn test_service_skips_while_store_is_held() {
        let (mut realtime, mut control) = runtime();
        control.start();

        control.with_store(|_| realtime.service(0));
        assert!(realtime.sink().is_empty());
        assert_eq!(realtime.skipped_services(), 1);
        assert!(!control.transport().is_running());

        // the queued start goes through on the next pass
        realtime.service(250);
        assert!(control.transport().is_running());
        assert_eq!(&realtime.sink()[..2], &[0xFA, 0xF8]);
    }

    #[test]
    fn test_full_command_queue() {
        let config = EngineConfig {
            command_queue_capacity: 8,
            ..Default::default()
        };
        let (_realtime, mut control) =
            create_runtime(&config, Vec::new(), Box::new(MemoryStorage::new()));
        for _ in 0..8 {
            assert!(control.trigger_channel(ChannelId::default()));
        }
        assert!(!control.start());
    }
}
