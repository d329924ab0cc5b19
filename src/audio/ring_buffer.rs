//! Lock-free SPSC buffer between the capture callback and the framing task.
//!
//! The cpal callback thread pushes resampled 16 kHz mono samples; the
//! sender task drains them in fixed-size frames for encoding.

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};

/// ~10 seconds of 16 kHz mono audio.
const DEFAULT_CAPACITY: usize = 160_000;

/// Producer half, owned by the cpal input callback.
pub struct SampleProducer {
    inner: ringbuf::HeapProd<f32>,
}

/// Consumer half, owned by the outbound framing task.
pub struct SampleConsumer {
    inner: ringbuf::HeapCons<f32>,
}

/// Create a matched producer/consumer pair.
pub fn sample_ring(capacity: Option<usize>) -> (SampleProducer, SampleConsumer) {
    let rb = HeapRb::<f32>::new(capacity.unwrap_or(DEFAULT_CAPACITY));
    let (prod, cons) = rb.split();
    (
        SampleProducer { inner: prod },
        SampleConsumer { inner: cons },
    )
}

impl SampleProducer {
    /// Push samples, returning how many fit. A full buffer drops the
    /// oldest unconsumed audio, which the consumer absorbs as a glitch
    /// rather than an error.
    pub fn push_slice(&mut self, samples: &[f32]) -> usize {
        self.inner.push_slice(samples)
    }
}

impl SampleConsumer {
    /// Fill `frame` completely, or consume nothing and return false.
    pub fn pop_frame(&mut self, frame: &mut [f32]) -> bool {
        if self.inner.occupied_len() < frame.len() {
            return false;
        }
        let read = self.inner.pop_slice(frame);
        debug_assert_eq!(read, frame.len());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_frame_is_all_or_nothing() {
        let (mut prod, mut cons) = sample_ring(Some(64));
        let mut frame = [0.0f32; 16];

        prod.push_slice(&[1.0; 10]);
        assert!(!cons.pop_frame(&mut frame));

        // The short pop consumed nothing: the first 10 samples of the
        // eventual frame are still the original ones.
        prod.push_slice(&[2.0; 10]);
        assert!(cons.pop_frame(&mut frame));
        assert_eq!(frame[0], 1.0);
        assert_eq!(frame[9], 1.0);
        assert_eq!(frame[10], 2.0);
        assert_eq!(frame[15], 2.0);

        // 4 samples remain, not enough for another frame.
        assert!(!cons.pop_frame(&mut frame));
    }

    #[test]
    fn overflow_reports_partial_write() {
        let (mut prod, _cons) = sample_ring(Some(8));
        assert_eq!(prod.push_slice(&[0.0; 12]), 8);
    }
}
