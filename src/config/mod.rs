// Configuration - Compile-time sizing and runtime engine settings
// Sizing constants bound every fixed-size array in the engine; EngineConfig
// carries the tunables a host may override from a RON file.

use crate::midi::event::NoteOffFraming;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Number of sequencer channels
pub const CHANNELS: usize = 4;

/// Number of steps per pattern
pub const STEPS: usize = 16;

/// Clock resolution (pulses per quarter note)
pub const PPQN: u32 = 24;

/// Ticks in one sixteenth-note step
pub const TICKS_PER_STEP: u32 = PPQN / 4;

/// Number of rotary controls on the panel
pub const ROTARY_CONTROLS: usize = 4;

/// Lowest accepted BPM
pub const BPM_MIN: u16 = 20;

/// Highest accepted BPM
pub const BPM_MAX: u16 = 300;

/// Factory tempo
pub const DEFAULT_BPM: u16 = 120;

/// Settle window for panel buttons and switches, in microseconds
pub const DEBOUNCE_US: u64 = 10_000;

const _: () = assert!(CHANNELS > 0 && CHANNELS <= 16, "MIDI has 16 channels");
const _: () = assert!(STEPS > 0 && STEPS <= u8::MAX as usize);
const _: () = assert!(TICKS_PER_STEP * 4 == PPQN);

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Runtime engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Byte framing used for note-off messages
    pub note_off_framing: NoteOffFraming,
    /// Fixed note-on velocity
    pub velocity: u8,
    /// Factory BPM used when no saved state exists
    pub default_bpm: u16,
    /// Lower BPM clamp
    pub bpm_min: u16,
    /// Upper BPM clamp
    pub bpm_max: u16,
    /// Silence window after which external clock is considered lost
    pub clock_timeout_ms: u64,
    /// Capacity of the polling -> real-time command queue
    pub command_queue_capacity: usize,
    /// Capacity of the real-time -> port output byte queue
    pub output_queue_capacity: usize,
    /// Substring of the MIDI output port name to open (host only)
    pub midi_output_port: Option<String>,
    /// Substring of the MIDI input port name used for external clock (host only)
    pub midi_input_port: Option<String>,
    /// Where the state blob is stored
    pub state_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            note_off_framing: NoteOffFraming::default(),
            velocity: 100,
            default_bpm: DEFAULT_BPM,
            bpm_min: BPM_MIN,
            bpm_max: BPM_MAX,
            clock_timeout_ms: 2000,
            command_queue_capacity: 64,
            output_queue_capacity: 1024,
            midi_output_port: None,
            midi_input_port: None,
            state_path: None,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from RON text
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = ron::from_str(text)?;
        Ok(config.sanitized())
    }

    /// Read a configuration file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_ron(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {:?}, using defaults", path);
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Clamp every field into its legal range
    pub fn sanitized(mut self) -> Self {
        self.bpm_min = self.bpm_min.clamp(BPM_MIN, BPM_MAX);
        self.bpm_max = self.bpm_max.clamp(self.bpm_min, BPM_MAX);
        self.default_bpm = self.default_bpm.clamp(self.bpm_min, self.bpm_max);
        self.velocity = self.velocity.clamp(1, 127);
        self.clock_timeout_ms = self.clock_timeout_ms.max(1);
        self.command_queue_capacity = self.command_queue_capacity.max(8);
        self.output_queue_capacity = self.output_queue_capacity.max(64);
        self
    }

    /// Clamp a BPM value into the configured range
    pub fn clamp_bpm(&self, bpm: i32) -> u16 {
        bpm.clamp(self.bpm_min as i32, self.bpm_max as i32) as u16
    }

    /// Resolved state file location
    pub fn state_path(&self) -> PathBuf {
        self.state_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("quadseq")
                .join("state.ron")
        })
    }
}
