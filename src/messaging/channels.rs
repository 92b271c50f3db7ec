// Communication channels lock-free

use crate::messaging::command::{Command, TimedByte};
use ringbuf::{HeapRb, traits::Split};

pub type CommandProducer = ringbuf::HeapProd<Command>;
pub type CommandConsumer = ringbuf::HeapCons<Command>;

pub type MidiByteProducer = ringbuf::HeapProd<TimedByte>;
pub type MidiByteConsumer = ringbuf::HeapCons<TimedByte>;

pub fn create_command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let rb = HeapRb::<Command>::new(capacity);
    rb.split()
}

/// Queue from the MIDI input callback to the real-time handler
pub fn create_midi_byte_channel(capacity: usize) -> (MidiByteProducer, MidiByteConsumer) {
    let rb = HeapRb::<TimedByte>::new(capacity);
    rb.split()
}
