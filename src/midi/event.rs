// MIDI message types and wire framing

use serde::{Deserialize, Serialize};

/// Timing clock (24 per quarter note)
pub const CLOCK: u8 = 0xF8;
/// Start from the top
pub const START: u8 = 0xFA;
/// Resume from the current position
pub const CONTINUE: u8 = 0xFB;
/// Stop
pub const STOP: u8 = 0xFC;

const NOTE_OFF_STATUS: u8 = 0x80;
const NOTE_ON_STATUS: u8 = 0x90;

/// How a note-off is put on the wire
///
/// Many devices only understand note-on with velocity 0, others expect
/// a true note-off status. Pick one per installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoteOffFraming {
    /// `0x9n note 0`
    #[default]
    NoteOnZeroVelocity,
    /// `0x8n note 0`
    NoteOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    Clock,
    Start,
    Continue,
    Stop,
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
}

/// Encoded message, at most three bytes, no allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedMessage {
    bytes: [u8; 3],
    len: usize,
}

impl EncodedMessage {
    fn one(byte: u8) -> Self {
        Self {
            bytes: [byte, 0, 0],
            len: 1,
        }
    }

    fn three(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            bytes: [status, data1 & 0x7F, data2 & 0x7F],
            len: 3,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl MidiMessage {
    /// Encode for the wire using the given note-off framing
    pub fn encode(&self, framing: NoteOffFraming) -> EncodedMessage {
        match *self {
            MidiMessage::Clock => EncodedMessage::one(CLOCK),
            MidiMessage::Start => EncodedMessage::one(START),
            MidiMessage::Continue => EncodedMessage::one(CONTINUE),
            MidiMessage::Stop => EncodedMessage::one(STOP),
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => EncodedMessage::three(NOTE_ON_STATUS | (channel & 0x0F), note, velocity),
            MidiMessage::NoteOff { channel, note } => match framing {
                NoteOffFraming::NoteOnZeroVelocity => {
                    EncodedMessage::three(NOTE_ON_STATUS | (channel & 0x0F), note, 0)
                }
                NoteOffFraming::NoteOff => {
                    EncodedMessage::three(NOTE_OFF_STATUS | (channel & 0x0F), note, 0)
                }
            },
        }
    }

    /// Parse a single realtime byte (clock, start, continue, stop)
    pub fn from_realtime_byte(byte: u8) -> Option<Self> {
        match byte {
            CLOCK => Some(MidiMessage::Clock),
            START => Some(MidiMessage::Start),
            CONTINUE => Some(MidiMessage::Continue),
            STOP => Some(MidiMessage::Stop),
            _ => None,
        }
    }

    /// Parse one message from the front of a byte slice
    ///
    /// Returns the message and the number of bytes consumed. A note-on
    /// with velocity 0 is reported as a note-off.
    pub fn from_bytes(bytes: &[u8]) -> Option<(Self, usize)> {
        let status = *bytes.first()?;

        if let Some(message) = Self::from_realtime_byte(status) {
            return Some((message, 1));
        }

        if bytes.len() < 3 {
            return None;
        }
        let channel = status & 0x0F;
        let note = bytes[1];
        let velocity = bytes[2];

        match status & 0xF0 {
            NOTE_ON_STATUS if velocity == 0 => Some((MidiMessage::NoteOff { channel, note }, 3)),
            NOTE_ON_STATUS => Some((
                MidiMessage::NoteOn {
                    channel,
                    note,
                    velocity,
                },
                3,
            )),
            NOTE_OFF_STATUS => Some((MidiMessage::NoteOff { channel, note }, 3)),
            _ => None,
        }
    }
}

/// Split a captured byte stream back into messages, skipping unknown bytes
pub fn decode_stream(mut bytes: &[u8]) -> Vec<MidiMessage> {
    let mut messages = Vec::new();
    while !bytes.is_empty() {
        match MidiMessage::from_bytes(bytes) {
            Some((message, used)) => {
                messages.push(message);
                bytes = &bytes[used..];
            }
            None => bytes = &bytes[1..],
        }
    }
    messages
}
