// Sequencer module
// Pattern storage, euclidean generation, clock/transport and note scheduling

pub mod clock;
pub mod engine;
pub mod euclid;
pub mod note;
pub mod pattern;
pub mod scheduler;
pub mod transport;

/// Absolute clock pulse count since the last transport start
pub type Tick = u64;

pub use engine::Engine;
pub use euclid::ScaleMode;
pub use note::{NoteLength, RatchetLevel};
pub use pattern::{ChannelId, PatternStore, StepIndex};
pub use transport::{ClockSource, SharedTransportState, TransportState};
