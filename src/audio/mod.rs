//! Microphone capture, PCM transport encoding, and playback scheduling.

pub mod capture;
pub mod pcm;
pub mod playback;
pub mod ring_buffer;
pub mod scheduler;

pub use capture::{list_input_devices, list_output_devices, start_capture, CaptureHandle, FRAME_SAMPLES};
pub use playback::SpeakerSink;
pub use ring_buffer::{sample_ring, SampleConsumer};
pub use scheduler::{MonotonicClock, PlaybackScheduler};
