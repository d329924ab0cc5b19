//! Microphone capture via cpal.
//!
//! The input stream runs at the device's native rate, is downmixed to
//! mono and resampled to 16 kHz, and feeds the sample ring buffer. The
//! stream itself lives on a dedicated thread so its (non-Send) handle
//! can be dropped deterministically when the session ends — a live
//! microphone must never linger until some later garbage collection.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use tracing::{debug, error, info};

use super::pcm::CAPTURE_SAMPLE_RATE;
use super::ring_buffer::SampleProducer;

/// Samples per outbound frame (256 ms at 16 kHz).
pub const FRAME_SAMPLES: usize = 4096;

/// List available input device names.
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(devices) = host.input_devices() {
        for dev in devices {
            if let Ok(name) = dev.name() {
                names.push(name);
            }
        }
    }
    names
}

/// List available output device names.
pub fn list_output_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(devices) = host.output_devices() {
        for dev in devices {
            if let Ok(name) = dev.name() {
                names.push(name);
            }
        }
    }
    names
}

/// Handle to a running capture thread. Stopping is idempotent; the
/// first signal (or dropping every handle) releases the microphone.
#[derive(Clone)]
pub struct CaptureHandle {
    stop_tx: std::sync::mpsc::Sender<()>,
}

impl CaptureHandle {
    pub fn stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

/// Acquire the microphone and start streaming samples into `producer`.
///
/// Resolves once the input stream is live (or failed to open): the voice
/// session must not report itself as starting when the microphone was
/// never acquired.
pub async fn start_capture(
    device_name: Option<String>,
    producer: SampleProducer,
) -> anyhow::Result<CaptureHandle> {
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<anyhow::Result<()>>();
    let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

    std::thread::Builder::new()
        .name("mic-capture".into())
        .spawn(move || {
            let stream = match build_input_stream(device_name.as_deref(), producer) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            // Parked until stop() is called or every handle is dropped.
            let _ = stop_rx.recv();
            drop(stream);
            info!("Microphone released");
        })?;

    tokio::task::spawn_blocking(move || ready_rx.recv())
        .await?
        .map_err(|_| anyhow::anyhow!("capture thread exited before reporting readiness"))??;

    Ok(CaptureHandle { stop_tx })
}

/// Open the input device and start the cpal stream. Runs on the capture
/// thread; the returned stream must be kept alive there.
fn build_input_stream(
    device_name: Option<&str>,
    mut producer: SampleProducer,
) -> anyhow::Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = if let Some(name) = device_name {
        host.input_devices()
            .map_err(|e| anyhow::anyhow!("failed to enumerate input devices: {e}"))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| anyhow::anyhow!("input device not found: {name}"))?
    } else {
        host.default_input_device()
            .ok_or_else(|| anyhow::anyhow!("no default input device available"))?
    };

    let dev_name = device.name().unwrap_or_else(|_| "unknown".into());
    info!(device = %dev_name, "Selected input device");

    let default_config = device
        .default_input_config()
        .map_err(|e| anyhow::anyhow!("failed to get default input config: {e}"))?;

    let native_rate = default_config.sample_rate().0;
    let channels = default_config.channels();

    let stream_config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(native_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let needs_resample = native_rate != CAPTURE_SAMPLE_RATE;
    let needs_downmix = channels > 1;
    debug!(native_rate, channels, needs_resample, needs_downmix, "Input config");

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = if needs_downmix {
                    to_mono(data, channels)
                } else {
                    data.to_vec()
                };
                let resampled = if needs_resample {
                    resample_linear(&mono, native_rate, CAPTURE_SAMPLE_RATE)
                } else {
                    mono
                };
                producer.push_slice(&resampled);
            },
            move |err| {
                error!("Audio input stream error: {err}");
            },
            None,
        )
        .map_err(|e| anyhow::anyhow!("failed to build input stream: {e}"))?;

    stream
        .play()
        .map_err(|e| anyhow::anyhow!("failed to start input stream: {e}"))?;

    info!("Audio capture started");
    Ok(stream)
}

/// Down-mix interleaved multi-channel audio to mono by averaging.
fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Linear resampler between arbitrary rates, mono f32.
fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((input.len() as f64) / ratio).floor() as usize;
    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_idx = i as f64 * ratio;
        let idx0 = src_idx.floor() as usize;
        let frac = (src_idx - idx0 as f64) as f32;
        let s0 = input.get(idx0).copied().unwrap_or(0.0);
        let s1 = input.get(idx0 + 1).copied().unwrap_or(s0);
        output.push(s0 + frac * (s1 - s0));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_same_rate_is_identity() {
        let input = vec![1.0, 2.0, 3.0];
        assert_eq!(resample_linear(&input, 16000, 16000), input);
    }

    #[test]
    fn resample_48k_to_16k_thirds_the_length() {
        let input: Vec<f32> = (0..48).map(|i| i as f32).collect();
        assert_eq!(resample_linear(&input, 48000, 16000).len(), 16);
    }

    #[test]
    fn stereo_downmix_averages_channels() {
        let interleaved = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(to_mono(&interleaved, 2), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn device_listing_does_not_panic() {
        // On CI without audio hardware this may be empty.
        let _ = list_input_devices();
        let _ = list_output_devices();
    }
}
