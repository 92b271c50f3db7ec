// Clock - Internal pulse timer, external tempo estimation, loss detection
// All times are microseconds from an arbitrary monotonic origin supplied
// by the caller, so the engine can be driven by a test clock.

use crate::config::PPQN;

/// Microseconds between two clock pulses at `bpm`
pub fn pulse_period_us(bpm: u16) -> u64 {
    60_000_000 / (bpm.max(1) as u64 * PPQN as u64)
}

/// Pulses fired in one `poll` at most; the rest stay due on the same grid
const MAX_CATCH_UP: u32 = 24;

/// Periodic pulse generator driven by polling
#[derive(Debug, Clone)]
pub struct InternalClock {
    period_us: u64,
    next_pulse_us: Option<u64>,
}

impl InternalClock {
    pub fn new(bpm: u16) -> Self {
        Self {
            period_us: pulse_period_us(bpm),
            next_pulse_us: None,
        }
    }

    pub fn period_us(&self) -> u64 {
        self.period_us
    }

    pub fn is_running(&self) -> bool {
        self.next_pulse_us.is_some()
    }

    /// Arm the timer; the first pulse is one period after `now_us`
    pub fn start(&mut self, now_us: u64) {
        self.next_pulse_us = Some(now_us + self.period_us);
    }

    pub fn stop(&mut self) {
        self.next_pulse_us = None;
    }

    /// Change the period; an already scheduled pulse keeps its deadline
    pub fn set_bpm(&mut self, bpm: u16) {
        self.period_us = pulse_period_us(bpm);
    }

    /// Number of pulses due at `now_us`
    ///
    /// Never drops a pulse. After a stall, pulses beyond `MAX_CATCH_UP`
    /// are handed out by the following polls.
    pub fn poll(&mut self, now_us: u64) -> u32 {
        let Some(mut next) = self.next_pulse_us else {
            return 0;
        };

        let mut due = 0;
        while next <= now_us && due < MAX_CATCH_UP {
            due += 1;
            next += self.period_us;
        }
        if next <= now_us {
            log::warn!("Internal clock {} us behind, catching up", now_us - next);
        }
        self.next_pulse_us = Some(next);
        due
    }
}

/// Number of timestamps kept for the tempo estimate (two beats plus one)
pub const BPM_WINDOW: usize = 49;

/// Weight given to the previous estimate when smoothing
const SMOOTHING: f32 = 0.4;

/// Estimates tempo from external clock pulse arrival times
#[derive(Debug, Clone)]
pub struct BpmEstimator {
    timestamps: [u64; BPM_WINDOW],
    index: usize,
    filled: usize,
    smoothed: f32,
}

impl BpmEstimator {
    pub fn new(initial_bpm: u16) -> Self {
        Self {
            timestamps: [0; BPM_WINDOW],
            index: 0,
            filled: 0,
            smoothed: initial_bpm as f32,
        }
    }

    /// Forget every timestamp; the smoothed value carries on from `bpm`
    pub fn reset(&mut self, bpm: u16) {
        self.index = 0;
        self.filled = 0;
        self.smoothed = bpm as f32;
    }

    /// Record one pulse; returns the new estimate once the window is full
    pub fn record(&mut self, now_us: u64) -> Option<f32> {
        self.timestamps[self.index] = now_us;
        self.index = (self.index + 1) % BPM_WINDOW;
        self.filled = (self.filled + 1).min(BPM_WINDOW);

        if self.filled < BPM_WINDOW {
            return None;
        }

        // `index` now points at the oldest entry
        let oldest = self.timestamps[self.index];
        let newest = self.timestamps[(self.index + BPM_WINDOW - 1) % BPM_WINDOW];
        let elapsed = newest.saturating_sub(oldest);
        if elapsed == 0 {
            return None;
        }

        // 48 pulses span two beats
        let raw = 120_000_000.0 / elapsed as f32;
        self.smoothed = SMOOTHING * self.smoothed + (1.0 - SMOOTHING) * raw;
        Some(self.smoothed)
    }

    pub fn smoothed(&self) -> f32 {
        self.smoothed
    }
}

/// Detects loss of external clock
#[derive(Debug, Clone)]
pub struct ClockWatchdog {
    timeout_us: u64,
    last_seen_us: Option<u64>,
}

impl ClockWatchdog {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_us: timeout_ms * 1000,
            last_seen_us: None,
        }
    }

    pub fn feed(&mut self, now_us: u64) {
        self.last_seen_us = Some(now_us);
    }

    pub fn clear(&mut self) {
        self.last_seen_us = None;
    }

    /// True once more than the timeout has passed since the last byte
    pub fn expired(&self, now_us: u64) -> bool {
        self.last_seen_us
            .is_some_and(|last| now_us.saturating_sub(last) > self.timeout_us)
    }
}
