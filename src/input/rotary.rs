// Rotary encoders - Quadrature decoding and detent gearing

/// Direction for each (previous << 2 | current) state pair; 0 for no move
/// or an invalid double transition
const QUADRATURE_TABLE: [i8; 16] = [0, -1, 1, 0, 1, 0, 0, -1, -1, 0, 0, 1, 0, 1, -1, 0];

/// Turns raw A/B pin levels into signed transitions
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadratureDecoder {
    last: u8,
}

impl QuadratureDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample both pins; returns -1, 0 or +1
    pub fn update(&mut self, a: bool, b: bool) -> i8 {
        let state = ((a as u8) << 1) | b as u8;
        let delta = QUADRATURE_TABLE[((self.last << 2) | state) as usize];
        self.last = state;
        delta
    }
}

/// Accumulates raw transitions and releases whole clicks
///
/// The divisor is chosen per call because the same encoder gears
/// differently depending on what it currently edits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gearbox {
    accumulator: i32,
}

impl Gearbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` transitions; returns whole clicks (signed), keeping the remainder
    pub fn feed(&mut self, delta: i32, divisor: i32) -> i32 {
        let divisor = divisor.max(1);
        self.accumulator += delta;
        let clicks = self.accumulator / divisor;
        self.accumulator -= clicks * divisor;
        clicks
    }

    pub fn reset(&mut self) {
        self.accumulator = 0;
    }
}
