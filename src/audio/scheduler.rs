//! Gapless playback scheduling for inbound model audio.
//!
//! Chunks arrive from the network at arbitrary times; the scheduler keeps
//! a single cursor (`next_start_time`) on the output timeline and queues
//! each chunk at `max(cursor, now)`, so bursts play back-to-back while
//! delivery gaps surface as silence instead of accumulating latency.
//! A barge-in discards everything queued and rewinds the cursor.

use super::pcm::PLAYBACK_SAMPLE_RATE;

/// Monotonic reading of the audio output timeline, in seconds.
pub trait OutputClock {
    fn now(&self) -> f64;
}

/// Wall clock anchored at creation. Production clock for the scheduler.
pub struct MonotonicClock {
    origin: std::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl OutputClock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Destination for decoded chunks. Implementations must queue appended
/// buffers gaplessly and be able to cut everything off at once.
pub trait ChunkSink {
    fn append(&mut self, samples: Vec<f32>, sample_rate: u32);
    fn stop_all(&mut self);
}

/// One chunk currently queued or playing.
struct ActiveChunk {
    start_at: f64,
    end_at: f64,
}

/// Scheduler state: the timeline cursor plus the set of live chunks.
///
/// Not thread-safe on purpose: all mutation happens from the session's
/// message-handling sequence, where inbound audio and interruption
/// signals arrive strictly in order.
pub struct PlaybackScheduler<C: OutputClock, S: ChunkSink> {
    clock: C,
    sink: S,
    next_start_time: f64,
    active: Vec<ActiveChunk>,
}

impl<C: OutputClock, S: ChunkSink> PlaybackScheduler<C, S> {
    pub fn new(clock: C, sink: S) -> Self {
        Self {
            clock,
            sink,
            next_start_time: 0.0,
            active: Vec::new(),
        }
    }

    /// Queue one decoded 24 kHz mono chunk for playback.
    ///
    /// Returns the output-timeline instant the chunk will start playing:
    /// the cursor when audio is already queued, or "now" after an idle
    /// gap (a stale cursor never delays fresh audio).
    pub fn schedule_chunk(&mut self, samples: Vec<f32>) -> f64 {
        let now = self.clock.now();
        self.active.retain(|c| c.end_at > now);

        let start_at = self.next_start_time.max(now);
        let duration = samples.len() as f64 / PLAYBACK_SAMPLE_RATE as f64;

        self.sink.append(samples, PLAYBACK_SAMPLE_RATE);
        self.active.push(ActiveChunk {
            start_at,
            end_at: start_at + duration,
        });
        self.next_start_time = start_at + duration;
        start_at
    }

    /// Barge-in: cut off every queued and playing chunk and rewind the
    /// cursor so the next chunk re-anchors to the current clock.
    pub fn interrupt(&mut self) {
        self.sink.stop_all();
        self.active.clear();
        self.next_start_time = 0.0;
    }

    /// Number of chunks still queued or playing.
    pub fn active_chunks(&mut self) -> usize {
        let now = self.clock.now();
        self.active.retain(|c| c.end_at > now);
        self.active.len()
    }

    #[cfg(test)]
    fn earliest_active_start(&self) -> Option<f64> {
        self.active.iter().map(|c| c.start_at).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct ManualClock(Arc<Mutex<f64>>);

    impl ManualClock {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(0.0)))
        }

        fn advance(&self, secs: f64) {
            *self.0.lock().unwrap() += secs;
        }
    }

    impl OutputClock for ManualClock {
        fn now(&self) -> f64 {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        appended: Arc<Mutex<Vec<usize>>>,
        stops: Arc<Mutex<usize>>,
    }

    impl ChunkSink for RecordingSink {
        fn append(&mut self, samples: Vec<f32>, _sample_rate: u32) {
            self.appended.lock().unwrap().push(samples.len());
        }

        fn stop_all(&mut self) {
            *self.stops.lock().unwrap() += 1;
        }
    }

    fn half_second_chunk() -> Vec<f32> {
        vec![0.0; PLAYBACK_SAMPLE_RATE as usize / 2]
    }

    #[test]
    fn burst_queues_back_to_back() {
        let clock = ManualClock::new();
        let mut sched = PlaybackScheduler::new(clock, RecordingSink::default());

        // Three 0.5s chunks all arriving at t=0.
        assert_eq!(sched.schedule_chunk(half_second_chunk()), 0.0);
        assert_eq!(sched.schedule_chunk(half_second_chunk()), 0.5);
        assert_eq!(sched.schedule_chunk(half_second_chunk()), 1.0);
        assert_eq!(sched.next_start_time, 1.5);
        assert_eq!(sched.active_chunks(), 3);
    }

    #[test]
    fn start_times_never_precede_clock_or_predecessor() {
        let clock = ManualClock::new();
        let mut sched = PlaybackScheduler::new(clock.clone(), RecordingSink::default());

        let mut prev_end = 0.0;
        // Arbitrary inter-arrival delays, including long gaps.
        for gap in [0.0, 0.1, 2.0, 0.0, 0.7, 0.0] {
            clock.advance(gap);
            let start = sched.schedule_chunk(half_second_chunk());
            assert!(start >= clock.now());
            assert!(start >= prev_end);
            prev_end = start + 0.5;
        }
    }

    #[test]
    fn gap_re_anchors_to_now_instead_of_stale_cursor() {
        let clock = ManualClock::new();
        let mut sched = PlaybackScheduler::new(clock.clone(), RecordingSink::default());

        sched.schedule_chunk(half_second_chunk());
        assert_eq!(sched.next_start_time, 0.5);

        // Network stall: clock runs well past the cursor.
        clock.advance(3.0);
        let start = sched.schedule_chunk(half_second_chunk());
        assert_eq!(start, 3.0);
        assert_eq!(sched.next_start_time, 3.5);
    }

    #[test]
    fn completed_chunks_leave_the_active_set() {
        let clock = ManualClock::new();
        let mut sched = PlaybackScheduler::new(clock.clone(), RecordingSink::default());

        sched.schedule_chunk(half_second_chunk());
        sched.schedule_chunk(half_second_chunk());
        assert_eq!(sched.active_chunks(), 2);

        clock.advance(0.6); // first chunk finished
        assert_eq!(sched.active_chunks(), 1);
        clock.advance(0.5); // both finished
        assert_eq!(sched.active_chunks(), 0);
    }

    #[test]
    fn interrupt_discards_queue_and_reanchors() {
        let clock = ManualClock::new();
        let sink = RecordingSink::default();
        let mut sched = PlaybackScheduler::new(clock.clone(), sink.clone());

        for _ in 0..4 {
            sched.schedule_chunk(half_second_chunk());
        }
        clock.advance(0.25);
        sched.interrupt();

        assert_eq!(*sink.stops.lock().unwrap(), 1);
        assert_eq!(sched.active_chunks(), 0);
        assert_eq!(sched.next_start_time, 0.0);
        assert!(sched.earliest_active_start().is_none());

        // Next chunk starts at the present, not at the old 2.0s cursor.
        let start = sched.schedule_chunk(half_second_chunk());
        assert_eq!(start, 0.25);
    }

    #[test]
    fn chunks_reach_the_sink_in_order() {
        let clock = ManualClock::new();
        let sink = RecordingSink::default();
        let mut sched = PlaybackScheduler::new(clock, sink.clone());

        sched.schedule_chunk(vec![0.0; 100]);
        sched.schedule_chunk(vec![0.0; 200]);
        sched.schedule_chunk(vec![0.0; 300]);
        assert_eq!(*sink.appended.lock().unwrap(), vec![100, 200, 300]);
    }
}
