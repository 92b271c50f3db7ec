// MIDI devices - Port discovery and the output connection

use crate::midi::event::MidiMessage;
use midir::{MidiInput as MidirInput, MidiOutput as MidirOutput, MidiOutputConnection};

const CLIENT_NAME: &str = "quadseq";

/// MIDI port errors
#[derive(Debug, thiserror::Error)]
pub enum MidiPortError {
    #[error("MIDI init error: {0}")]
    Init(#[from] midir::InitError),

    #[error("No MIDI {0} ports available")]
    NoPorts(&'static str),

    #[error("No MIDI port matching '{0}'")]
    NotFound(String),

    #[error("MIDI connection failed: {0}")]
    Connect(String),

    #[error("MIDI send failed: {0}")]
    Send(#[from] midir::SendError),
}

#[derive(Clone, Debug)]
pub struct MidiDeviceInfo {
    pub index: usize,
    pub name: String,
}

pub(crate) fn describe<P>(ports: &[P], name_of: impl Fn(&P) -> Option<String>) -> Vec<MidiDeviceInfo> {
    ports
        .iter()
        .enumerate()
        .filter_map(|(index, port)| name_of(port).map(|name| MidiDeviceInfo { index, name }))
        .collect()
}

/// Lists every MIDI output port
pub fn list_output_ports() -> Result<Vec<MidiDeviceInfo>, MidiPortError> {
    let midi_out = MidirOutput::new(CLIENT_NAME)?;
    Ok(describe(&midi_out.ports(), |p| midi_out.port_name(p).ok()))
}

/// Lists every MIDI input port
pub fn list_input_ports() -> Result<Vec<MidiDeviceInfo>, MidiPortError> {
    let midi_in = MidirInput::new(CLIENT_NAME)?;
    Ok(describe(&midi_in.ports(), |p| midi_in.port_name(p).ok()))
}

/// Pick the first port whose name contains `filter`, or the first port at all
pub(crate) fn select_port(
    devices: &[MidiDeviceInfo],
    filter: Option<&str>,
) -> Option<MidiDeviceInfo> {
    match filter {
        Some(filter) => devices.iter().find(|d| d.name.contains(filter)).cloned(),
        None => devices.first().cloned(),
    }
}

/// Open output connection
pub struct OutputPort {
    connection: MidiOutputConnection,
    name: String,
}

impl OutputPort {
    /// Connect to the port matching `filter` (first port when `None`)
    pub fn open(filter: Option<&str>) -> Result<Self, MidiPortError> {
        let midi_out = MidirOutput::new(CLIENT_NAME)?;
        let ports = midi_out.ports();
        let devices = describe(&ports, |p| midi_out.port_name(p).ok());
        if devices.is_empty() {
            return Err(MidiPortError::NoPorts("output"));
        }

        let device = select_port(&devices, filter)
            .ok_or_else(|| MidiPortError::NotFound(filter.unwrap_or_default().to_string()))?;
        let port = &ports[device.index];
        let connection = midi_out
            .connect(port, "quadseq-out")
            .map_err(|e| MidiPortError::Connect(e.to_string()))?;

        log::info!("Connected to MIDI output: {}", device.name);
        Ok(Self {
            connection,
            name: device.name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a queued byte stream one message at a time; returns messages sent
    pub fn send_stream(&mut self, mut bytes: &[u8]) -> Result<usize, MidiPortError> {
        let mut sent = 0;
        while !bytes.is_empty() {
            match MidiMessage::from_bytes(bytes) {
                Some((_, used)) => {
                    self.connection.send(&bytes[..used])?;
                    bytes = &bytes[used..];
                    sent += 1;
                }
                None => bytes = &bytes[1..],
            }
        }
        Ok(sent)
    }
}
