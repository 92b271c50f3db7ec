// quadseq - Library exports for the host binary, tests and benchmarks

pub mod config;
pub mod input;
pub mod messaging;
pub mod midi;
pub mod persistence;
pub mod runtime;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use config::{ConfigError, EngineConfig};
pub use input::{InputEvent, InputMapper, PanelSwitch, Rotary};
pub use messaging::{Command, create_command_channel};
pub use midi::{MidiMessage, MidiSink, NoteOffFraming, RingSink};
pub use persistence::{FileStorage, MemoryStorage, PersistenceError, StateStorage};
pub use runtime::{Control, LoadOutcome, Realtime, create_runtime};
pub use sequencer::{
    ChannelId, ClockSource, Engine, NoteLength, PatternStore, RatchetLevel, ScaleMode,
    SharedTransportState, StepIndex, TransportState,
};
