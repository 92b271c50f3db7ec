// Messaging - SPSC queues between the polling context and the real-time handler

pub mod channels;
pub mod command;

pub use channels::{
    CommandConsumer, CommandProducer, MidiByteConsumer, MidiByteProducer, create_command_channel,
    create_midi_byte_channel,
};
pub use command::{Command, TimedByte};
