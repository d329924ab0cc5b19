//! Persistent study-session store.
//!
//! Sessions live in `sessions.json` in the data directory, newest first,
//! written atomically (temp file + rename) so a crash mid-write never
//! corrupts the file. The store is capped; the oldest sessions fall off.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{SessionSummary, StudySession};

/// Maximum number of sessions kept on disk.
const MAX_SESSIONS: usize = 50;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    sessions: Vec<StudySession>,
}

pub struct SessionStore {
    path: PathBuf,
    sessions: Vec<StudySession>,
}

impl SessionStore {
    /// Load the store from `<data_dir>/sessions.json`; a missing or
    /// unreadable file starts empty.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("sessions.json");
        let sessions = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<StoreData>(&contents) {
                Ok(data) => data.sessions,
                Err(e) => {
                    warn!("Failed to parse {}: {}", path.display(), e);
                    Vec::new()
                }
            },
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read {}: {}", path.display(), e);
                }
                Vec::new()
            }
        };
        if !sessions.is_empty() {
            info!(count = sessions.len(), "Loaded study sessions");
        }
        Self { path, sessions }
    }

    /// Insert a new session at the front and persist.
    pub fn insert(&mut self, session: StudySession) -> anyhow::Result<()> {
        self.sessions.insert(0, session);
        self.sessions.truncate(MAX_SESSIONS);
        self.save()
    }

    pub fn get(&self, id: &str) -> Option<&StudySession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Apply `f` to the session with the given id and persist.
    pub fn update<F>(&mut self, id: &str, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut StudySession),
    {
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| anyhow::anyhow!("unknown session: {id}"))?;
        f(session);
        self.save()
    }

    /// Newest-first listing for the UI.
    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.sessions
            .iter()
            .map(|s| SessionSummary {
                id: s.id.clone(),
                title: s.title.clone(),
                date: s.date.clone(),
            })
            .collect()
    }

    /// Most recently created session, if any.
    pub fn latest(&self) -> Option<&StudySession> {
        self.sessions.first()
    }

    /// Atomic write: temp file in the same directory, then rename.
    fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = dir.join(format!(".sessions.{}.tmp", std::process::id()));
        let data = StoreData {
            sessions: self.sessions.clone(),
        };
        std::fs::write(&tmp, serde_json::to_string_pretty(&data)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::study::StudySession;

    fn temp_data_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("edumind-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn sessions_survive_a_reload() {
        let dir = temp_data_dir();
        let mut store = SessionStore::load(&dir);
        let session = StudySession::new("photosynthesis notes".into(), None);
        let id = session.id.clone();
        store.insert(session).unwrap();
        store
            .update(&id, |s| {
                s.flashcards = Some(vec![crate::study::Flashcard {
                    id: "f1".into(),
                    front: "Q".into(),
                    back: "A".into(),
                }])
            })
            .unwrap();

        let reloaded = SessionStore::load(&dir);
        let found = reloaded.get(&id).unwrap();
        assert_eq!(found.content, "photosynthesis notes");
        assert_eq!(found.flashcards.as_ref().unwrap().len(), 1);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn newest_session_is_listed_first_and_cap_holds() {
        let dir = temp_data_dir();
        let mut store = SessionStore::load(&dir);
        for i in 0..(MAX_SESSIONS + 5) {
            store
                .insert(StudySession::new(format!("lesson {i}"), None))
                .unwrap();
        }
        let summaries = store.summaries();
        assert_eq!(summaries.len(), MAX_SESSIONS);
        assert!(summaries[0].title.starts_with(&format!("lesson {}", MAX_SESSIONS + 4)));
        assert_eq!(store.latest().unwrap().id, summaries[0].id);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn update_unknown_session_fails() {
        let dir = temp_data_dir();
        let mut store = SessionStore::load(&dir);
        assert!(store.update("missing", |_| {}).is_err());
        std::fs::remove_dir_all(dir).ok();
    }
}
