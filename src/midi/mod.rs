// MIDI - wire codec, output sinks and host ports

pub mod device;
pub mod event;
pub mod input;
pub mod sink;

pub use device::{MidiPortError, OutputPort};
pub use event::{MidiMessage, NoteOffFraming};
pub use input::ClockInput;
pub use sink::{MidiSink, RingSink};
