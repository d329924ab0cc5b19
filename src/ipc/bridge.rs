//! IPC bridge: stdin reader and stdout event emitter.
//!
//! A blocking thread reads JSON lines from stdin and forwards
//! deserialized commands through an mpsc channel; events are written to
//! stdout as JSON lines. stderr stays free for logging.

use std::io::{self, BufRead, Write};

use tokio::sync::mpsc;
use tracing::{debug, error};

use super::{StudyCommand, StudyEvent};

/// Emit a `StudyEvent` as a JSON line on stdout and flush.
pub fn emit_event(event: &StudyEvent) {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            error!("Failed to serialize event: {e}");
            return;
        }
    };
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    // Ignore write/flush errors — the pipe may already be closed.
    let _ = writeln!(handle, "{json}");
    let _ = handle.flush();
}

/// Convenience helper for error events.
pub fn emit_error(message: &str) {
    emit_event(&StudyEvent::Error {
        message: message.to_string(),
    });
}

/// Spawn a blocking thread that reads JSON lines from stdin and forwards
/// them as `StudyCommand`s. The thread exits when stdin closes (the UI
/// process is gone) or on an unrecoverable read error.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<StudyCommand> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let stdin = io::stdin();
        let reader = stdin.lock();
        for line in reader.lines() {
            match line {
                Ok(text) => {
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<StudyCommand>(trimmed) {
                        Ok(cmd) => {
                            debug!(?cmd, "Received command");
                            if tx.send(cmd).is_err() {
                                break; // main task is gone
                            }
                        }
                        Err(e) => {
                            error!("Invalid JSON command: {e} — input: {trimmed}");
                            emit_error(&format!("invalid JSON command: {e}"));
                        }
                    }
                }
                Err(e) => {
                    error!("stdin read error: {e}");
                    break;
                }
            }
        }
        debug!("stdin reader thread exiting");
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_deserialize_from_tagged_json() {
        let cmd: StudyCommand =
            serde_json::from_str(r#"{"command": "chat", "text": "What is osmosis?"}"#).unwrap();
        assert!(matches!(cmd, StudyCommand::Chat { session_id: None, text } if text == "What is osmosis?"));

        let cmd: StudyCommand = serde_json::from_str(
            r#"{"command": "start_study", "content": "notes", "file": {"data": "QUJD", "mimeType": "image/png", "name": "p.png"}}"#,
        )
        .unwrap();
        match cmd {
            StudyCommand::StartStudy { content, file } => {
                assert_eq!(content.as_deref(), Some("notes"));
                assert_eq!(file.unwrap().mime_type, "image/png");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn events_serialize_with_tag_and_data() {
        let json = serde_json::to_value(&StudyEvent::Volume { level: 0.25 }).unwrap();
        assert_eq!(json["event"], "volume");
        assert_eq!(json["data"]["level"], 0.25);

        let json = serde_json::to_value(&StudyEvent::VoiceState {
            state: "connecting".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "voice_state");
        assert_eq!(json["data"]["state"], "connecting");
    }
}
