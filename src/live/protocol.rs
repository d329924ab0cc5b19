//! Wire messages for the live-audio WebSocket.
//!
//! Outbound: one setup message, then a stream of base64 PCM media
//! chunks. Inbound: `setupComplete`, then `serverContent` carrying
//! either model speech or an interruption flag. Anything else is
//! ignored.

use serde::{Deserialize, Serialize};

use super::LiveEvent;
use crate::gemini::Content;

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SetupMessage {
    pub setup: Setup,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: SetupGenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupGenerationConfig {
    pub response_modalities: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MediaMessage {
    pub media: MediaBlob,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaBlob {
    pub data: String,
    pub mime_type: String,
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub interrupted: Option<bool>,
    #[serde(default)]
    pub turn_complete: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<TurnPart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnPart {
    #[serde(default)]
    pub inline_data: Option<MediaBlob>,
}

impl ServerMessage {
    /// Flatten one wire message into session events, in wire order.
    pub fn into_events(self) -> Vec<LiveEvent> {
        let mut events = Vec::new();
        if self.setup_complete.is_some() {
            events.push(LiveEvent::SetupComplete);
        }
        if let Some(content) = self.server_content {
            if content.interrupted == Some(true) {
                events.push(LiveEvent::Interrupted);
            }
            if let Some(turn) = content.model_turn {
                for part in turn.parts {
                    if let Some(blob) = part.inline_data {
                        events.push(LiveEvent::Audio { data: blob.data });
                    }
                }
            }
            if content.turn_complete == Some(true) {
                events.push(LiveEvent::TurnComplete);
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::pcm::CAPTURE_MIME;

    #[test]
    fn media_message_matches_wire_shape() {
        let msg = MediaMessage {
            media: MediaBlob {
                data: "AAAA".into(),
                mime_type: CAPTURE_MIME.into(),
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["media"]["data"], "AAAA");
        assert_eq!(json["media"]["mimeType"], "audio/pcm;rate=16000");
    }

    #[test]
    fn model_turn_parts_become_audio_events() {
        let raw = r#"{
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        {"inlineData": {"data": "AAEC", "mimeType": "audio/pcm;rate=24000"}},
                        {"inlineData": {"data": "AwQF", "mimeType": "audio/pcm;rate=24000"}}
                    ]
                }
            }
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let events = msg.into_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], LiveEvent::Audio { data } if data == "AAEC"));
        assert!(matches!(&events[1], LiveEvent::Audio { data } if data == "AwQF"));
    }

    #[test]
    fn interruption_flag_is_recognized() {
        let raw = r#"{"serverContent": {"interrupted": true}}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg.into_events()[..], [LiveEvent::Interrupted]));
    }

    #[test]
    fn setup_complete_and_unknown_fields_coexist() {
        let raw = r#"{"setupComplete": {}, "usageMetadata": {"tokens": 3}}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg.into_events()[..], [LiveEvent::SetupComplete]));
    }

    #[test]
    fn unrelated_message_produces_no_events() {
        let msg: ServerMessage = serde_json::from_str("{}").unwrap();
        assert!(msg.into_events().is_empty());
    }
}
