// Commands - Polling context -> real-time handler

use crate::sequencer::pattern::ChannelId;

/// Requests the polling context makes of the real-time handler.
/// Transport state is only ever changed on the real-time side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Local start (emits Start, resets position, triggers step 0)
    Start,
    /// Local stop (silences channels, emits Stop)
    Stop,
    /// Set the BPM of the internal clock
    SetBpm(u16),
    /// Move the BPM by a signed number of clicks
    NudgeBpm(i16),
    /// Fire a channel at the current step right now
    TriggerChannel(ChannelId),
}

/// One byte from MIDI input, stamped on arrival
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedByte {
    pub byte: u8,
    /// Microseconds since the host's clock origin
    pub at_us: u64,
}
