//! Study artifact generation: mind maps, flashcards, exams, tutoring.
//!
//! Each operation builds a prompt (plus any attached document) and asks
//! Gemini for JSON constrained to the artifact's schema. Content and
//! files are passed through verbatim; the model does all interpretation.

pub mod store;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::gemini::{GeminiClient, Part};

/// Node of the knowledge-structure tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MindMapNode {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<MindMapNode>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`. May be out of range if the model misfires;
    /// scoring then treats the question as never answered correctly.
    pub correct_answer: u32,
    pub explanation: String,
}

impl ExamQuestion {
    /// True when `choice` names the correct option. An out-of-range
    /// answer key never matches.
    #[allow(dead_code)]
    pub fn is_correct(&self, choice: u32) -> bool {
        (self.correct_answer as usize) < self.options.len() && choice == self.correct_answer
    }
}

/// Count correct answers; `answers` maps question id to chosen index.
#[allow(dead_code)]
pub fn score_exam(questions: &[ExamQuestion], answers: &std::collections::HashMap<String, u32>) -> usize {
    questions
        .iter()
        .filter(|q| answers.get(&q.id).is_some_and(|&choice| q.is_correct(choice)))
        .count()
}

/// An uploaded document or image, base64-wrapped with its MIME type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub data: String,
    pub mime_type: String,
    pub name: String,
}

/// One study session: the source material plus whatever artifacts have
/// been generated for it so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileData>,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mind_map: Option<MindMapNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flashcards: Option<Vec<Flashcard>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam: Option<Vec<ExamQuestion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_exam: Option<Vec<ExamQuestion>>,
}

impl StudySession {
    pub fn new(content: String, file: Option<FileData>) -> Self {
        let title = match &file {
            Some(f) => format!("Document: {}", f.name),
            None => {
                let head: String = content.chars().take(30).collect();
                if content.chars().count() > 30 {
                    format!("{head}...")
                } else {
                    head
                }
            }
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            content,
            file,
            date: chrono::Local::now().format("%Y-%m-%d").to_string(),
            mind_map: None,
            flashcards: None,
            exam: None,
            extracted_exam: None,
        }
    }
}

/// Compact listing entry for the UI sidebar.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub date: String,
}

// ---------------------------------------------------------------------------
// Generation service
// ---------------------------------------------------------------------------

/// Artifact generation over the Gemini client. Quick artifacts (mind map,
/// flashcards) use the flash-tier model; exams use the pro tier.
pub struct StudyService {
    client: GeminiClient,
    text_model: String,
    exam_model: String,
}

impl StudyService {
    pub fn new(client: GeminiClient, text_model: String, exam_model: String) -> Self {
        Self {
            client,
            text_model,
            exam_model,
        }
    }

    pub async fn summarize_to_mind_map(
        &self,
        content: &str,
        file: Option<&FileData>,
    ) -> anyhow::Result<MindMapNode> {
        let prompt = format!(
            "Summarize the following content into a hierarchical tree structure (JSON). \
             Text content: {content}"
        );
        self.client
            .generate_json(&self.text_model, prompt_parts(prompt, file), mind_map_schema())
            .await
    }

    pub async fn generate_flashcards(
        &self,
        content: &str,
        file: Option<&FileData>,
    ) -> anyhow::Result<Vec<Flashcard>> {
        let prompt = format!(
            "Create 5-10 flashcards from the following content. JSON format. \
             Text content: {content}"
        );
        self.client
            .generate_json(&self.text_model, prompt_parts(prompt, file), flashcards_schema())
            .await
    }

    pub async fn generate_exam(
        &self,
        content: &str,
        file: Option<&FileData>,
    ) -> anyhow::Result<Vec<ExamQuestion>> {
        let prompt = format!(
            "Create a multiple-choice exam of 10 questions from the following content. \
             JSON format. Text content: {content}"
        );
        self.client
            .generate_json(&self.exam_model, prompt_parts(prompt, file), exam_schema())
            .await
    }

    /// Pull every question out of an uploaded exam document, however many
    /// there are. Meant for large scanned question banks.
    pub async fn extract_exam(
        &self,
        content: &str,
        file: Option<&FileData>,
    ) -> anyhow::Result<Vec<ExamQuestion>> {
        let prompt = format!(
            "Extract every multiple-choice question that appears in the following \
             document, preserving the original wording of questions and options. \
             Include all questions, not a sample. For each one, identify the correct \
             option and write a short explanation. JSON format. Text content: {content}"
        );
        self.client
            .generate_json(&self.exam_model, prompt_parts(prompt, file), exam_schema())
            .await
    }

    /// Free-text tutoring grounded in the session's material.
    pub async fn tutor_reply(
        &self,
        content: &str,
        file: Option<&FileData>,
        question: &str,
    ) -> anyhow::Result<String> {
        let prompt = format!(
            "Use this lesson content: \"{content}\". Answer the user's question: {question}"
        );
        self.client
            .generate_text(&self.text_model, prompt_parts(prompt, file))
            .await
    }
}

/// Build prompt parts: instruction text plus the attached file, if any.
fn prompt_parts(text: String, file: Option<&FileData>) -> Vec<Part> {
    let mut parts = vec![Part::text(if text.is_empty() {
        "Analyze this document.".to_string()
    } else {
        text
    })];
    if let Some(f) = file {
        parts.push(Part::inline_data(f.mime_type.clone(), f.data.clone()));
    }
    parts
}

// ---------------------------------------------------------------------------
// Response schemas
// ---------------------------------------------------------------------------

fn mind_map_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": { "type": "STRING" },
            "children": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "children": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": { "name": { "type": "STRING" } }
                            }
                        }
                    }
                }
            }
        },
        "required": ["name"]
    })
}

fn flashcards_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "front": { "type": "STRING" },
                "back": { "type": "STRING" }
            },
            "required": ["id", "front", "back"]
        }
    })
}

fn exam_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "question": { "type": "STRING" },
                "options": { "type": "ARRAY", "items": { "type": "STRING" } },
                "correctAnswer": { "type": "INTEGER", "description": "Index of correct option (0-3)" },
                "explanation": { "type": "STRING" }
            },
            "required": ["id", "question", "options", "correctAnswer", "explanation"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn session_title_from_file_name() {
        let session = StudySession::new(
            String::new(),
            Some(FileData {
                data: "QUJD".into(),
                mime_type: "application/pdf".into(),
                name: "biology.pdf".into(),
            }),
        );
        assert_eq!(session.title, "Document: biology.pdf");
    }

    #[test]
    fn session_title_truncates_long_content() {
        let session = StudySession::new("x".repeat(80), None);
        assert_eq!(session.title.chars().count(), 33);
        assert!(session.title.ends_with("..."));

        let short = StudySession::new("cells".into(), None);
        assert_eq!(short.title, "cells");
    }

    #[test]
    fn exam_questions_decode_from_model_output() {
        let raw = r#"[{
            "id": "q1",
            "question": "What is the powerhouse of the cell?",
            "options": ["Nucleus", "Mitochondria", "Ribosome", "Golgi"],
            "correctAnswer": 1,
            "explanation": "Mitochondria produce ATP."
        }]"#;
        let questions: Vec<ExamQuestion> = serde_json::from_str(raw).unwrap();
        assert_eq!(questions[0].correct_answer, 1);
        assert!(questions[0].is_correct(1));
        assert!(!questions[0].is_correct(0));
    }

    #[test]
    fn scoring_ignores_out_of_range_answer_keys() {
        let q = ExamQuestion {
            id: "q1".into(),
            question: "?".into(),
            options: vec!["a".into(), "b".into()],
            correct_answer: 7,
            explanation: String::new(),
        };
        let mut answers = HashMap::new();
        answers.insert("q1".to_string(), 7u32);
        assert_eq!(score_exam(&[q], &answers), 0);
    }

    #[test]
    fn exam_schema_requires_every_field() {
        let schema = exam_schema();
        let required = schema["items"]["required"].as_array().unwrap();
        assert_eq!(required.len(), 5);
        assert!(required.iter().any(|v| v == "correctAnswer"));
    }

    #[test]
    fn mind_map_round_trips_without_children() {
        let node: MindMapNode = serde_json::from_str(r#"{"name": "Root"}"#).unwrap();
        assert_eq!(node.name, "Root");
        assert!(node.children.is_none());
        let json = serde_json::to_value(&node).unwrap();
        assert!(json.get("children").is_none());
    }
}
