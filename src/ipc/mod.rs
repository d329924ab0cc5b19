//! IPC protocol types for the UI front-end.
//!
//! Commands arrive on stdin as `{"command": "<name>", ...}` JSON lines;
//! events leave on stdout as `{"event": "<name>", "data": {...}}`.

pub mod bridge;

use serde::{Deserialize, Serialize};

use crate::study::{ExamQuestion, FileData, Flashcard, MindMapNode, SessionSummary};

// ---------------------------------------------------------------------------
// Events: core -> UI (stdout)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum StudyEvent {
    Starting {},
    Ready {},
    /// A new study session exists; artifacts follow as they generate.
    SessionCreated {
        id: String,
        title: String,
        date: String,
    },
    /// A stored session was reopened; its artifacts are re-emitted.
    SessionOpened {
        id: String,
        title: String,
        date: String,
    },
    MindMap {
        session_id: String,
        root: MindMapNode,
    },
    Flashcards {
        session_id: String,
        cards: Vec<Flashcard>,
    },
    Exam {
        session_id: String,
        questions: Vec<ExamQuestion>,
    },
    ExamExtracted {
        session_id: String,
        questions: Vec<ExamQuestion>,
    },
    ChatResponse {
        session_id: String,
        text: String,
    },
    Sessions {
        sessions: Vec<SessionSummary>,
    },
    /// Voice session lifecycle: "idle", "connecting", "active".
    VoiceState {
        state: String,
    },
    /// Microphone level for the UI meter, one reading per frame.
    Volume {
        level: f32,
    },
    AudioDevices {
        input: Vec<AudioDeviceInfo>,
        output: Vec<AudioDeviceInfo>,
    },
    Pong {},
    Error {
        message: String,
    },
    Stopping {},
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioDeviceInfo {
    pub id: i32,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Commands: UI -> core (stdin)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command")]
#[serde(rename_all = "snake_case")]
pub enum StudyCommand {
    /// Create a session from pasted text and/or an uploaded file, then
    /// generate the full artifact set.
    StartStudy {
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        file: Option<FileData>,
    },
    GenerateMindMap {
        session_id: String,
    },
    GenerateFlashcards {
        session_id: String,
    },
    GenerateExam {
        session_id: String,
    },
    /// Massive-exam extraction from an uploaded question bank.
    ExtractExam {
        session_id: String,
    },
    Chat {
        #[serde(default)]
        session_id: Option<String>,
        text: String,
    },
    ListSessions {},
    OpenSession {
        id: String,
    },
    StartVoice {
        #[serde(default)]
        session_id: Option<String>,
    },
    StopVoice {},
    ListAudioDevices {},
    Ping {},
    Stop {},
}
