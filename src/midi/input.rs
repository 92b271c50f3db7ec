// MIDI Input - External clock reception
// The midir callback only stamps bytes and queues them; the real-time
// handler consumes them on its next service.

use crate::messaging::channels::MidiByteProducer;
use crate::messaging::command::TimedByte;
use crate::midi::device::{MidiPortError, describe, select_port};
use midir::{Ignore, MidiInput as MidirInput, MidiInputConnection};
use ringbuf::traits::Producer;
use std::time::Instant;

pub struct ClockInput {
    _connection: MidiInputConnection<()>,
    name: String,
}

impl ClockInput {
    /// Listen on the port matching `filter`, stamping bytes relative to `origin`
    pub fn open(
        filter: &str,
        mut byte_tx: MidiByteProducer,
        origin: Instant,
    ) -> Result<Self, MidiPortError> {
        let mut midi_in = MidirInput::new("quadseq")?;
        // Timing messages are exactly what we want
        midi_in.ignore(Ignore::None);

        let ports = midi_in.ports();
        let devices = describe(&ports, |p| midi_in.port_name(p).ok());
        if devices.is_empty() {
            return Err(MidiPortError::NoPorts("input"));
        }
        let device = select_port(&devices, Some(filter))
            .ok_or_else(|| MidiPortError::NotFound(filter.to_string()))?;

        let connection = midi_in
            .connect(
                &ports[device.index],
                "quadseq-clock-in",
                move |_timestamp, message, _| {
                    let at_us = origin.elapsed().as_micros() as u64;
                    for &byte in message {
                        if byte_tx.try_push(TimedByte { byte, at_us }).is_err() {
                            log::warn!("MIDI input queue full, byte dropped");
                        }
                    }
                },
                (),
            )
            .map_err(|e| MidiPortError::Connect(e.to_string()))?;

        log::info!("Listening for clock on MIDI input: {}", device.name);
        Ok(Self {
            _connection: connection,
            name: device.name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
