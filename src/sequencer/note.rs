// Note parameters for the step sequencer
// Lengths and ratchet densities are small closed sets; both are expressed
// in clock ticks (24 per quarter note).

use crate::config::TICKS_PER_STEP;

/// Gate length of a step, as a musical division
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum NoteLength {
    Whole,
    Half,
    Quarter,
    Eighth,
    /// Default length (avoids envelope collisions at high tempos)
    #[default]
    Sixteenth,
}

/// Ticks per length index (whole .. sixteenth)
pub const NOTE_LENGTH_TICKS: [u32; 5] = [96, 48, 24, 12, 6];

impl NoteLength {
    pub const ALL: [NoteLength; 5] = [
        NoteLength::Whole,
        NoteLength::Half,
        NoteLength::Quarter,
        NoteLength::Eighth,
        NoteLength::Sixteenth,
    ];

    /// Index into the length table, clamped to the last entry
    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index as usize).min(Self::ALL.len() - 1)]
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Duration in ticks
    pub fn ticks(self) -> u32 {
        NOTE_LENGTH_TICKS[self.index() as usize]
    }

    /// Move through the table by `delta` entries, clamping at both ends
    pub fn offset(self, delta: i32) -> Self {
        let index = (self.index() as i32 + delta).clamp(0, Self::ALL.len() as i32 - 1);
        Self::ALL[index as usize]
    }

    /// Short label for displays ("1", "1/2", ...)
    pub fn label(self) -> &'static str {
        match self {
            NoteLength::Whole => "1",
            NoteLength::Half => "1/2",
            NoteLength::Quarter => "1/4",
            NoteLength::Eighth => "1/8",
            NoteLength::Sixteenth => "1/16",
        }
    }
}

/// Retrigger density of a step; 0 is off, 1..=5 are presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct RatchetLevel(u8);

/// Ticks between hits for each level (index 0 unused)
const RATCHET_TICKS: [u32; 6] = [0, 6, 4, 3, 2, 1];

impl RatchetLevel {
    pub const OFF: RatchetLevel = RatchetLevel(0);
    pub const MAX: u8 = 5;

    /// Clamping constructor
    pub fn new(level: u8) -> Self {
        Self(level.min(Self::MAX))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn is_off(self) -> bool {
        self.0 == 0
    }

    pub fn offset(self, delta: i32) -> Self {
        Self((self.0 as i32 + delta).clamp(0, Self::MAX as i32) as u8)
    }

    /// Ticks between consecutive hits, `None` when off
    pub fn ticks_per_hit(self) -> Option<u32> {
        if self.is_off() {
            None
        } else {
            Some(RATCHET_TICKS[self.0 as usize])
        }
    }

    /// Hits that fit inside one step
    pub fn hits_per_step(self) -> u32 {
        self.ticks_per_hit()
            .map(|ticks| TICKS_PER_STEP.div_ceil(ticks))
            .unwrap_or(1)
    }
}

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Human readable MIDI note name, e.g. 36 -> "C2"
pub fn note_name(note: u8) -> String {
    let octave = (note / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], octave)
}
