// Euclidean rhythms and scale-based melody assignment
// Rhythm and pitch are independent: changing the scale never touches the
// onset pattern, and changing pulses/rotation never touches pitches.

use crate::config::STEPS;
use rand::Rng;

/// Evenly distribute `pulses` onsets over `STEPS` slots, rotated right by `rotation`
///
/// Slot `j` is an onset when `floor(jk/n) > floor((j-1)k/n)`, i.e. when
/// `jk mod n < k`, which anchors the first onset on slot 0. The result is
/// then written to index `(j + rotation) mod n`.
pub fn euclid_pattern(pulses: u8, rotation: u8) -> [bool; STEPS] {
    let n = STEPS;
    let k = pulses as usize;

    if k == 0 {
        return [false; STEPS];
    }
    if k >= n {
        return [true; STEPS];
    }

    let mut pattern = [false; STEPS];
    let offset = rotation as usize % n;
    for j in 0..n {
        let onset = (j * k) % n < k;
        pattern[(j + offset) % n] = onset;
    }
    pattern
}

/// Melody scale selected per channel in euclid mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleMode {
    /// No melody: steps inherit the channel base pitch
    #[default]
    Off,
    Major,
    Minor,
    Chromatic,
}

const MAJOR: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR: [u8; 7] = [0, 2, 3, 5, 7, 8, 10];
const CHROMATIC: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

impl ScaleMode {
    pub const COUNT: u8 = 4;

    pub fn from_index(index: u8) -> Self {
        match index {
            1 => ScaleMode::Major,
            2 => ScaleMode::Minor,
            3 => ScaleMode::Chromatic,
            _ => ScaleMode::Off,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            ScaleMode::Off => 0,
            ScaleMode::Major => 1,
            ScaleMode::Minor => 2,
            ScaleMode::Chromatic => 3,
        }
    }

    /// 0 -> 1 -> 2 -> 3 -> 0
    pub fn next(self) -> Self {
        Self::from_index((self.index() + 1) % Self::COUNT)
    }

    /// Semitone offsets within one octave, empty when melody is off
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ScaleMode::Off => &[],
            ScaleMode::Major => &MAJOR,
            ScaleMode::Minor => &MINOR,
            ScaleMode::Chromatic => &CHROMATIC,
        }
    }
}

fn clamp_note(value: i32) -> u8 {
    value.clamp(0, 127) as u8
}

/// Generate one pitch per step: random scale interval above `base`,
/// dropped an octave half of the time. Returns `None` for every step
/// when the scale is off.
pub fn generate_melody<R: Rng + ?Sized>(
    base: u8,
    scale: ScaleMode,
    rng: &mut R,
) -> [Option<u8>; STEPS] {
    let intervals = scale.intervals();
    if intervals.is_empty() {
        return [None; STEPS];
    }

    let mut melody = [None; STEPS];
    for slot in melody.iter_mut() {
        let interval = intervals[rng.gen_range(0..intervals.len())] as i32;
        let mut note = base as i32 + interval;
        if rng.gen_bool(0.5) {
            note -= 12;
        }
        *slot = Some(clamp_note(note));
    }
    melody
}

/// Move `note` by `degrees` steps of `scale`, measured from `base`
///
/// The note is first snapped to the nearest scale degree (ties go down),
/// so an off-scale note lands in key after transposition.
pub fn transpose_degrees(note: u8, base: u8, scale: ScaleMode, degrees: i32) -> u8 {
    let intervals = scale.intervals();
    if intervals.is_empty() || degrees == 0 {
        return note;
    }
    let len = intervals.len() as i32;

    let relative = note as i32 - base as i32;
    let octave = relative.div_euclid(12);
    let semitone = relative.rem_euclid(12);

    // Nearest degree, also considering the root of the next octave
    let mut best_index = 0i32;
    let mut best_distance = i32::MAX;
    for (i, &interval) in intervals.iter().enumerate() {
        let distance = (semitone - interval as i32).abs();
        if distance < best_distance {
            best_distance = distance;
            best_index = i as i32;
        }
    }
    let mut degree = octave * len + best_index;
    if 12 - semitone < best_distance {
        degree = (octave + 1) * len;
    }

    let target = degree + degrees;
    let pitch = base as i32 + target.div_euclid(len) * 12 + intervals[target.rem_euclid(len) as usize] as i32;
    clamp_note(pitch)
}
