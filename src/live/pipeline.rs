//! Voice tutoring pipeline: microphone -> live session -> speaker.
//!
//! Two independent flows share only the session socket: microphone
//! frames stream up from the capture ring buffer, and model speech
//! streams down into the playback scheduler. The scheduler is touched
//! exclusively by the playback thread, which sees inbound audio and
//! interruption signals in wire order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::session::LiveSession;
use super::{LiveEvent, SessionState, SessionStateMachine};
use crate::audio::pcm;
use crate::audio::ring_buffer::{sample_ring, SampleConsumer};
use crate::audio::scheduler::PlaybackScheduler;
use crate::audio::{start_capture, CaptureHandle, MonotonicClock, SpeakerSink, FRAME_SAMPLES};
use crate::ipc::bridge::{emit_error, emit_event};
use crate::ipc::StudyEvent;

/// How often the outbound pump drains the capture buffer. A frame is
/// 256 ms of audio, so this polls several times per frame.
const PUMP_INTERVAL: Duration = Duration::from_millis(40);

/// How often the playback thread re-checks the stop flag while idle.
const EVENT_POLL: Duration = Duration::from_millis(50);

/// Everything a session needs, resolved from config + study session.
#[derive(Debug, Clone)]
pub struct VoiceSessionConfig {
    pub api_key: String,
    pub model: String,
    pub system_instruction: Option<String>,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub volume: f32,
}

/// Handle to one running voice session.
///
/// Stopping is idempotent and safe at any point of the lifecycle,
/// including before the remote session ever opened. Every exit path —
/// user stop, server close, transport error — releases the microphone
/// and stops playback.
pub struct VoicePipeline {
    state: Arc<SessionStateMachine>,
    stopping: Arc<AtomicBool>,
    capture: Arc<Mutex<Option<CaptureHandle>>>,
}

impl VoicePipeline {
    /// Begin a session: report `connecting` and spawn the driver task.
    /// Progress (and failure) is reported through events.
    pub fn start(cfg: VoiceSessionConfig) -> Self {
        let state = Arc::new(SessionStateMachine::new());
        state.start_connecting();
        emit_event(&StudyEvent::VoiceState {
            state: SessionState::Connecting.to_string(),
        });

        let pipeline = Self {
            state: Arc::clone(&state),
            stopping: Arc::new(AtomicBool::new(false)),
            capture: Arc::new(Mutex::new(None)),
        };

        let stopping = Arc::clone(&pipeline.stopping);
        let capture = Arc::clone(&pipeline.capture);
        tokio::spawn(async move {
            run_session(cfg, state, stopping, capture).await;
        });

        pipeline
    }

    /// Tear the session down. Safe to call repeatedly.
    pub fn stop(&self) {
        if !self.stopping.swap(true, Ordering::SeqCst) {
            info!("Stopping voice session");
        }
        if let Ok(mut slot) = self.capture.lock() {
            if let Some(handle) = slot.take() {
                handle.stop();
            }
        }
        if self.state.reset() {
            emit_event(&StudyEvent::VoiceState {
                state: SessionState::Idle.to_string(),
            });
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }
}

impl Drop for VoicePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drive the session to completion, then clean up whatever is left.
async fn run_session(
    cfg: VoiceSessionConfig,
    state: Arc<SessionStateMachine>,
    stopping: Arc<AtomicBool>,
    capture: Arc<Mutex<Option<CaptureHandle>>>,
) {
    if let Err(e) = drive_session(&cfg, &state, &stopping, &capture).await {
        error!("Voice session failed: {e:#}");
        emit_error(&format!("voice session failed: {e}"));
    }

    stopping.store(true, Ordering::SeqCst);
    if let Ok(mut slot) = capture.lock() {
        if let Some(handle) = slot.take() {
            handle.stop();
        }
    }
    if state.reset() {
        emit_event(&StudyEvent::VoiceState {
            state: SessionState::Idle.to_string(),
        });
    }
    info!("Voice session finished");
}

async fn drive_session(
    cfg: &VoiceSessionConfig,
    state: &Arc<SessionStateMachine>,
    stopping: &Arc<AtomicBool>,
    capture: &Arc<Mutex<Option<CaptureHandle>>>,
) -> anyhow::Result<()> {
    // Microphone first: a denied device must fail the whole start, and
    // the session must never look active without it.
    let (producer, consumer) = sample_ring(None);
    let handle = start_capture(cfg.input_device.clone(), producer).await?;
    if let Ok(mut slot) = capture.lock() {
        *slot = Some(handle);
    }
    if stopping.load(Ordering::SeqCst) {
        return Ok(()); // stopped while the microphone was opening
    }

    let (session, events) = LiveSession::connect(
        &cfg.api_key,
        &cfg.model,
        cfg.system_instruction.clone(),
    )
    .await?;

    if stopping.load(Ordering::SeqCst) {
        session.close().await;
        return Ok(());
    }

    let playback = spawn_playback_thread(
        events,
        cfg.output_device.clone(),
        cfg.volume,
        Arc::clone(state),
        Arc::clone(stopping),
    );

    pump_outbound(session, consumer, Arc::clone(stopping)).await;

    // The stop flag is set by now, so the playback thread is winding
    // down; don't block the runtime while it drains.
    let _ = tokio::task::spawn_blocking(move || playback.join()).await;
    Ok(())
}

/// Outbound half: drain capture frames, report volume, upload.
///
/// Ends when the stop flag is raised (by the user or by the playback
/// thread observing the session end) or when a send fails.
async fn pump_outbound(
    mut session: LiveSession,
    mut consumer: SampleConsumer,
    stopping: Arc<AtomicBool>,
) {
    let mut frame = vec![0.0f32; FRAME_SAMPLES];
    loop {
        if stopping.load(Ordering::SeqCst) {
            session.close().await;
            return;
        }
        tokio::time::sleep(PUMP_INTERVAL).await;

        while consumer.pop_frame(&mut frame) {
            emit_event(&StudyEvent::Volume {
                level: pcm::rms(&frame),
            });
            if let Err(e) = session.send_audio(pcm::encode_chunk(&frame)).await {
                error!("Audio upload failed: {e}");
                emit_error(&format!("audio upload failed: {e}"));
                stopping.store(true, Ordering::SeqCst);
                session.close().await;
                return;
            }
        }
    }
}

/// Inbound half: own the scheduler and speaker, consume session events.
///
/// Runs on a plain thread because the audio output handle is not Send;
/// it polls the stop flag between events so a user stop cuts playback
/// promptly.
fn spawn_playback_thread(
    events: std::sync::mpsc::Receiver<LiveEvent>,
    output_device: Option<String>,
    volume: f32,
    state: Arc<SessionStateMachine>,
    stopping: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let sink = match SpeakerSink::open(output_device.as_deref(), volume) {
            Ok(sink) => sink,
            Err(e) => {
                error!("Failed to open audio output: {e}");
                emit_error(&format!("audio output unavailable: {e}"));
                stopping.store(true, Ordering::SeqCst);
                return;
            }
        };
        let mut scheduler = PlaybackScheduler::new(MonotonicClock::new(), sink);

        loop {
            if stopping.load(Ordering::SeqCst) {
                scheduler.interrupt();
                break;
            }
            match events.recv_timeout(EVENT_POLL) {
                Ok(LiveEvent::SetupComplete) => {
                    if state.activate() {
                        info!("Live session active");
                        emit_event(&StudyEvent::VoiceState {
                            state: SessionState::Active.to_string(),
                        });
                    }
                }
                Ok(LiveEvent::Audio { data }) => match pcm::decode_chunk(&data) {
                    Ok(samples) => {
                        let start_at = scheduler.schedule_chunk(samples);
                        debug!(
                            start_at,
                            queued = scheduler.active_chunks(),
                            "Scheduled model audio chunk"
                        );
                    }
                    Err(e) => warn!("Dropping undecodable audio chunk: {e}"),
                },
                Ok(LiveEvent::Interrupted) => {
                    info!("Barge-in: discarding queued model speech");
                    scheduler.interrupt();
                }
                Ok(LiveEvent::TurnComplete) => debug!("Model turn complete"),
                Ok(LiveEvent::Error { message }) => {
                    error!("Live session error: {message}");
                    emit_error(&message);
                    break;
                }
                Ok(LiveEvent::Closed) => {
                    info!("Live session closed by server");
                    break;
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        stopping.store(true, Ordering::SeqCst);
    })
}
