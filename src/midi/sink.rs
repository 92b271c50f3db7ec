// Transport byte sink - where the real-time handler writes MIDI bytes
// The real-time side never touches a port directly: it pushes into a
// lock-free ring and a writer thread drains it to the device.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Destination for raw MIDI bytes
///
/// Implementations called from the real-time handler must not block.
pub trait MidiSink {
    fn send_bytes(&mut self, bytes: &[u8]);
}

/// Captures everything in memory (tests, offline rendering)
impl MidiSink for Vec<u8> {
    fn send_bytes(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Real-time side of the output queue
pub struct RingSink {
    producer: HeapProd<u8>,
    dropped: u64,
}

/// Writer side of the output queue
pub type OutputConsumer = HeapCons<u8>;

/// Create the output queue pair
pub fn create_output_queue(capacity: usize) -> (RingSink, OutputConsumer) {
    let rb = HeapRb::<u8>::new(capacity);
    let (producer, consumer) = rb.split();
    (
        RingSink {
            producer,
            dropped: 0,
        },
        consumer,
    )
}

impl RingSink {
    /// Bytes discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl MidiSink for RingSink {
    fn send_bytes(&mut self, bytes: &[u8]) {
        // A message is all-or-nothing: never leave half a note-on in the queue
        if self.producer.vacant_len() < bytes.len() {
            self.dropped += bytes.len() as u64;
            return;
        }
        self.producer.push_slice(bytes);
    }
}

/// Pop everything currently queued into `out`, returning the byte count
pub fn drain_output(consumer: &mut OutputConsumer, out: &mut Vec<u8>) -> usize {
    let before = out.len();
    out.extend(consumer.pop_iter());
    out.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sink_records() {
        let mut sink: Vec<u8> = Vec::new();
        sink.send_bytes(&[0xF8]);
        sink.send_bytes(&[0x90, 60, 100]);
        assert_eq!(sink, vec![0xF8, 0x90, 60, 100]);
    }

    #[test]
    fn test_ring_sink_roundtrip() {
        let (mut sink, mut consumer) = create_output_queue(16);
        sink.send_bytes(&[0xFA, 0xF8]);
        sink.send_bytes(&[0x91, 40, 100]);

        let mut out = Vec::new();
        assert_eq!(drain_output(&mut consumer, &mut out), 5);
        assert_eq!(out, vec![0xFA, 0xF8, 0x91, 40, 100]);
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn test_ring_sink_drops_whole_message_when_full() {
        let (mut sink, mut consumer) = create_output_queue(4);
        sink.send_bytes(&[0x90, 60, 100]);
        sink.send_bytes(&[0x90, 62, 100]);

        assert_eq!(sink.dropped(), 3);

        let mut out = Vec::new();
        drain_output(&mut consumer, &mut out);
        assert_eq!(out, vec![0x90, 60, 100]);
    }
}
