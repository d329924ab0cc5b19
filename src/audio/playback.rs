//! Rodio realization of the playback sink.
//!
//! A single `Sink` gives the gapless queueing the scheduler expects:
//! appended buffers play back-to-back, an empty queue plays the next
//! append immediately, and `stop()` cuts off everything at once.

use cpal::traits::{DeviceTrait, HostTrait};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tracing::{info, warn};

use super::scheduler::ChunkSink;

/// Speaker output for decoded model audio.
pub struct SpeakerSink {
    // Dropping the stream kills audio; hold it for the sink's lifetime.
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Sink,
    volume: f32,
}

impl SpeakerSink {
    /// Open the named output device, falling back to the system default.
    pub fn open(device_name: Option<&str>, volume: f32) -> anyhow::Result<Self> {
        let (stream, handle) = open_output_stream(device_name)?;
        let sink = Sink::try_new(&handle)
            .map_err(|e| anyhow::anyhow!("failed to create audio sink: {e}"))?;
        let volume = volume.clamp(0.0, 2.0);
        sink.set_volume(volume);
        Ok(Self {
            _stream: stream,
            handle,
            sink,
            volume,
        })
    }
}

impl ChunkSink for SpeakerSink {
    fn append(&mut self, samples: Vec<f32>, sample_rate: u32) {
        self.sink.append(SamplesBuffer::new(1, sample_rate, samples));
    }

    fn stop_all(&mut self) {
        self.sink.stop();
        // A stopped sink stays usable, but a fresh one avoids rodio
        // edge cases around appending after stop.
        match Sink::try_new(&self.handle) {
            Ok(sink) => {
                sink.set_volume(self.volume);
                self.sink = sink;
            }
            Err(e) => warn!("failed to recreate audio sink after barge-in: {e}"),
        }
    }
}

/// Open the audio output stream for a named or default device.
fn open_output_stream(
    device_name: Option<&str>,
) -> anyhow::Result<(OutputStream, OutputStreamHandle)> {
    if let Some(name) = device_name {
        let host = cpal::default_host();
        let device = host
            .output_devices()
            .map_err(|e| anyhow::anyhow!("failed to enumerate output devices: {e}"))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false));

        match device {
            Some(dev) => {
                info!(device = %name, "Using configured output device");
                OutputStream::try_from_device(&dev)
                    .map_err(|e| anyhow::anyhow!("failed to open output device '{name}': {e}"))
            }
            None => {
                warn!(device = %name, "Configured output device not found, using default");
                OutputStream::try_default()
                    .map_err(|e| anyhow::anyhow!("no audio output device available: {e}"))
            }
        }
    } else {
        OutputStream::try_default()
            .map_err(|e| anyhow::anyhow!("no audio output device available: {e}"))
    }
}
