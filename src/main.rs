//! EduMind Core — study-assistant processing core.
//!
//! Communicates with the UI shell via JSON-line IPC on stdin/stdout.
//! This is the entry point that loads configuration, wires up the IPC
//! bridge, and runs the command loop. Generation work runs on spawned
//! tasks so a long exam build never blocks a voice-session stop.

mod audio;
mod config;
mod gemini;
mod ipc;
mod live;
mod study;

use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use config::{paths, read_config, StudyConfig};
use gemini::GeminiClient;
use ipc::bridge::{emit_error, emit_event, spawn_stdin_reader};
use ipc::{AudioDeviceInfo, StudyCommand, StudyEvent};
use live::{SessionState, VoicePipeline, VoiceSessionConfig};
use study::store::SessionStore;
use study::{FileData, StudyService, StudySession};

/// Shared state across command handlers.
struct Core {
    config: StudyConfig,
    api_key: Option<String>,
    /// Present only when an API key is configured.
    service: Option<StudyService>,
    store: Mutex<SessionStore>,
    voice: Mutex<Option<VoicePipeline>>,
}

#[tokio::main]
async fn main() {
    let _log_guard = init_tracing();

    // Emit starting immediately so the UI knows we're alive.
    emit_event(&StudyEvent::Starting {});

    let config = read_config();
    let api_key = config.resolve_api_key();
    if api_key.is_none() {
        warn!("No API key configured (config.json apiKey or GEMINI_API_KEY); generation disabled");
    }
    info!("Configuration loaded");

    let service = api_key.as_ref().map(|key| {
        StudyService::new(
            GeminiClient::new(key.clone()),
            config.text_model.clone(),
            config.exam_model.clone(),
        )
    });
    let store = SessionStore::load(&paths::get_data_dir());

    let core = Arc::new(Core {
        config,
        api_key,
        service,
        store: Mutex::new(store),
        voice: Mutex::new(None),
    });

    let mut cmd_rx = spawn_stdin_reader();

    emit_event(&StudyEvent::Ready {});
    info!("EduMind core ready");

    loop {
        match cmd_rx.recv().await {
            Some(cmd) => {
                if !handle_command(&core, cmd) {
                    break; // stop command received
                }
            }
            None => {
                info!("stdin closed, shutting down");
                break;
            }
        }
    }

    // Dropping a live pipeline stops it: microphone released, playback cut.
    if let Ok(mut slot) = core.voice.lock() {
        slot.take();
    }
    info!("EduMind core shutting down");
}

/// Log to stderr (stdout carries IPC) and a daily-rotated file.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = paths::get_log_dir();
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(log_dir, "core.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();
    guard
}

/// Dispatch a single command. Returns `false` when the loop should exit.
fn handle_command(core: &Arc<Core>, cmd: StudyCommand) -> bool {
    match cmd {
        StudyCommand::Ping {} => emit_event(&StudyEvent::Pong {}),

        StudyCommand::Stop {} => {
            emit_event(&StudyEvent::Stopping {});
            return false;
        }

        StudyCommand::ListAudioDevices {} => {
            emit_event(&StudyEvent::AudioDevices {
                input: device_infos(audio::list_input_devices()),
                output: device_infos(audio::list_output_devices()),
            });
        }

        StudyCommand::ListSessions {} => {
            let sessions = core
                .store
                .lock()
                .map(|s| s.summaries())
                .unwrap_or_default();
            emit_event(&StudyEvent::Sessions { sessions });
        }

        StudyCommand::OpenSession { id } => open_session(core, &id),

        StudyCommand::StartStudy { content, file } => {
            let core = Arc::clone(core);
            tokio::spawn(async move {
                start_study(core, content.unwrap_or_default(), file).await;
            });
        }

        StudyCommand::GenerateMindMap { session_id } => {
            spawn_artifact(core, session_id, ArtifactKind::MindMap)
        }
        StudyCommand::GenerateFlashcards { session_id } => {
            spawn_artifact(core, session_id, ArtifactKind::Flashcards)
        }
        StudyCommand::GenerateExam { session_id } => {
            spawn_artifact(core, session_id, ArtifactKind::Exam)
        }
        StudyCommand::ExtractExam { session_id } => {
            spawn_artifact(core, session_id, ArtifactKind::ExtractedExam)
        }

        StudyCommand::Chat { session_id, text } => {
            let core = Arc::clone(core);
            tokio::spawn(async move {
                chat(core, session_id, text).await;
            });
        }

        StudyCommand::StartVoice { session_id } => start_voice(core, session_id),
        StudyCommand::StopVoice {} => stop_voice(core),
    }

    true
}

fn device_infos(names: Vec<String>) -> Vec<AudioDeviceInfo> {
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| AudioDeviceInfo { id: i as i32, name })
        .collect()
}

// ---------------------------------------------------------------------------
// Study commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum ArtifactKind {
    MindMap,
    Flashcards,
    Exam,
    ExtractedExam,
}

fn spawn_artifact(core: &Arc<Core>, session_id: String, kind: ArtifactKind) {
    let core = Arc::clone(core);
    tokio::spawn(async move {
        generate_artifact(&core, &session_id, kind).await;
    });
}

/// Create a session and generate the full artifact set, emitting each
/// artifact as soon as it lands.
async fn start_study(core: Arc<Core>, content: String, file: Option<FileData>) {
    if content.trim().is_empty() && file.is_none() {
        emit_error("nothing to study: provide text content or a file");
        return;
    }

    let session = StudySession::new(content, file);
    let id = session.id.clone();
    info!(id = %id, title = %session.title, "Study session created");
    emit_event(&StudyEvent::SessionCreated {
        id: id.clone(),
        title: session.title.clone(),
        date: session.date.clone(),
    });

    match core.store.lock() {
        Ok(mut store) => {
            if let Err(e) = store.insert(session) {
                warn!("Failed to persist session: {e}");
            }
        }
        Err(e) => warn!("Session store lock poisoned: {e}"),
    }

    for kind in [
        ArtifactKind::MindMap,
        ArtifactKind::Flashcards,
        ArtifactKind::Exam,
    ] {
        generate_artifact(&core, &id, kind).await;
    }
}

/// Generate one artifact for an existing session, store it, emit it.
async fn generate_artifact(core: &Arc<Core>, session_id: &str, kind: ArtifactKind) {
    let Some(service) = core.service.as_ref() else {
        emit_error("no API key configured");
        return;
    };
    let session = core
        .store
        .lock()
        .ok()
        .and_then(|s| s.get(session_id).cloned());
    let Some(session) = session else {
        emit_error(&format!("unknown session: {session_id}"));
        return;
    };

    let content = session.content.as_str();
    let file = session.file.as_ref();
    let sid = session_id.to_string();

    match kind {
        ArtifactKind::MindMap => match service.summarize_to_mind_map(content, file).await {
            Ok(root) => {
                store_update(core, &sid, |s| s.mind_map = Some(root.clone()));
                emit_event(&StudyEvent::MindMap { session_id: sid, root });
            }
            Err(e) => emit_error(&format!("mind map generation failed: {e}")),
        },
        ArtifactKind::Flashcards => match service.generate_flashcards(content, file).await {
            Ok(cards) => {
                store_update(core, &sid, |s| s.flashcards = Some(cards.clone()));
                emit_event(&StudyEvent::Flashcards {
                    session_id: sid,
                    cards,
                });
            }
            Err(e) => emit_error(&format!("flashcard generation failed: {e}")),
        },
        ArtifactKind::Exam => match service.generate_exam(content, file).await {
            Ok(questions) => {
                store_update(core, &sid, |s| s.exam = Some(questions.clone()));
                emit_event(&StudyEvent::Exam {
                    session_id: sid,
                    questions,
                });
            }
            Err(e) => emit_error(&format!("exam generation failed: {e}")),
        },
        ArtifactKind::ExtractedExam => match service.extract_exam(content, file).await {
            Ok(questions) => {
                store_update(core, &sid, |s| s.extracted_exam = Some(questions.clone()));
                emit_event(&StudyEvent::ExamExtracted {
                    session_id: sid,
                    questions,
                });
            }
            Err(e) => emit_error(&format!("exam extraction failed: {e}")),
        },
    }
}

fn store_update<F: FnOnce(&mut StudySession)>(core: &Arc<Core>, id: &str, f: F) {
    match core.store.lock() {
        Ok(mut store) => {
            if let Err(e) = store.update(id, f) {
                warn!("Failed to persist artifact: {e}");
            }
        }
        Err(e) => warn!("Session store lock poisoned: {e}"),
    }
}

/// Tutor chat, grounded in the named session (or the latest one).
async fn chat(core: Arc<Core>, session_id: Option<String>, text: String) {
    let Some(service) = core.service.as_ref() else {
        emit_error("no API key configured");
        return;
    };
    let session = core.store.lock().ok().and_then(|s| match &session_id {
        Some(id) => s.get(id).cloned(),
        None => s.latest().cloned(),
    });
    let (sid, content, file) = match session {
        Some(s) => (s.id, s.content, s.file),
        None => (String::new(), String::new(), None),
    };

    match service.tutor_reply(&content, file.as_ref(), &text).await {
        Ok(reply) => emit_event(&StudyEvent::ChatResponse {
            session_id: sid,
            text: reply,
        }),
        Err(e) => emit_error(&format!("chat failed: {e}")),
    }
}

/// Re-emit a stored session and whatever artifacts it already has.
fn open_session(core: &Arc<Core>, id: &str) {
    let session = core.store.lock().ok().and_then(|s| s.get(id).cloned());
    let Some(session) = session else {
        emit_error(&format!("unknown session: {id}"));
        return;
    };

    emit_event(&StudyEvent::SessionOpened {
        id: session.id.clone(),
        title: session.title.clone(),
        date: session.date.clone(),
    });
    if let Some(root) = session.mind_map {
        emit_event(&StudyEvent::MindMap {
            session_id: session.id.clone(),
            root,
        });
    }
    if let Some(cards) = session.flashcards {
        emit_event(&StudyEvent::Flashcards {
            session_id: session.id.clone(),
            cards,
        });
    }
    if let Some(questions) = session.exam {
        emit_event(&StudyEvent::Exam {
            session_id: session.id.clone(),
            questions,
        });
    }
    if let Some(questions) = session.extracted_exam {
        emit_event(&StudyEvent::ExamExtracted {
            session_id: session.id,
            questions,
        });
    }
}

// ---------------------------------------------------------------------------
// Voice commands
// ---------------------------------------------------------------------------

fn start_voice(core: &Arc<Core>, session_id: Option<String>) {
    let Some(api_key) = core.api_key.clone() else {
        emit_error("no API key configured");
        return;
    };

    let Ok(mut slot) = core.voice.lock() else {
        emit_error("voice state unavailable");
        return;
    };
    if let Some(pipeline) = slot.as_ref() {
        if pipeline.state() != SessionState::Idle {
            emit_error("a voice session is already running");
            return;
        }
    }

    // Ground the tutor in the session's material when one is named.
    let system_instruction = session_id
        .and_then(|id| core.store.lock().ok().and_then(|s| s.get(&id).cloned()))
        .filter(|s| !s.content.trim().is_empty())
        .map(|s| {
            format!(
                "You are a friendly voice tutor. The student is studying the \
                 following material; ground your answers in it: {}",
                s.content
            )
        });

    let cfg = VoiceSessionConfig {
        api_key,
        model: core.config.live_model.clone(),
        system_instruction,
        input_device: core.config.input_device.clone(),
        output_device: core.config.output_device.clone(),
        volume: core.config.playback_volume,
    };
    *slot = Some(VoicePipeline::start(cfg));
}

fn stop_voice(core: &Arc<Core>) {
    if let Ok(mut slot) = core.voice.lock() {
        if let Some(pipeline) = slot.take() {
            pipeline.stop();
        }
    }
}
