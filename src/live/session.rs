//! WebSocket transport for the live-audio session.
//!
//! The socket splits into an outbound half owned by the caller (audio
//! upload) and a reader task that translates inbound frames into
//! `LiveEvent`s. Events flow through a std mpsc channel so the playback
//! thread can consume them without a runtime handle.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::protocol::{MediaBlob, MediaMessage, ServerMessage, Setup, SetupGenerationConfig, SetupMessage};
use super::LiveEvent;
use crate::audio::pcm::CAPTURE_MIME;
use crate::gemini::{Content, Part};

const LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// An open bidirectional session. Owns the outbound half of the socket;
/// inbound frames arrive on the receiver returned by `connect`.
pub struct LiveSession {
    sink: WsSink,
}

impl LiveSession {
    /// Open the socket and send the setup message. The session is not
    /// usable for conversation until the server answers with
    /// `setupComplete` (surfaced as an event).
    pub async fn connect(
        api_key: &str,
        model: &str,
        system_instruction: Option<String>,
    ) -> anyhow::Result<(Self, std::sync::mpsc::Receiver<LiveEvent>)> {
        let uri: http::Uri = format!("{LIVE_ENDPOINT}?key={api_key}")
            .parse()
            .map_err(|e| anyhow::anyhow!("bad live endpoint: {e}"))?;
        let (ws, _response) = connect_async(uri)
            .await
            .map_err(|e| anyhow::anyhow!("live session connect failed: {e}"))?;
        info!(model, "Live session socket open");

        let (mut sink, stream) = ws.split();

        let setup = SetupMessage {
            setup: Setup {
                model: format!("models/{model}"),
                generation_config: SetupGenerationConfig {
                    response_modalities: vec!["AUDIO".to_string()],
                },
                system_instruction: system_instruction.map(|text| Content {
                    parts: vec![Part::text(text)],
                }),
            },
        };
        sink.send(Message::Text(serde_json::to_string(&setup)?))
            .await
            .map_err(|e| anyhow::anyhow!("failed to send session setup: {e}"))?;

        let (event_tx, event_rx) = std::sync::mpsc::channel();
        tokio::spawn(read_loop(stream, event_tx));

        Ok((Self { sink }, event_rx))
    }

    /// Forward one encoded microphone chunk, in capture order.
    pub async fn send_audio(&mut self, encoded: String) -> anyhow::Result<()> {
        let msg = MediaMessage {
            media: MediaBlob {
                data: encoded,
                mime_type: CAPTURE_MIME.to_string(),
            },
        };
        self.sink
            .send(Message::Text(serde_json::to_string(&msg)?))
            .await
            .map_err(|e| anyhow::anyhow!("audio send failed: {e}"))
    }

    /// Close the outbound half. Does not wait for the server to
    /// acknowledge; the reader winds down on its own.
    pub async fn close(mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

/// Translate inbound frames into events until the socket ends or the
/// receiver goes away.
async fn read_loop(mut stream: WsStream, events: std::sync::mpsc::Sender<LiveEvent>) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if !forward(text.as_bytes(), &events) {
                    return;
                }
            }
            Ok(Message::Binary(bytes)) => {
                if !forward(&bytes, &events) {
                    return;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // ping/pong handled by the transport
            Err(e) => {
                let _ = events.send(LiveEvent::Error {
                    message: e.to_string(),
                });
                return;
            }
        }
    }
    let _ = events.send(LiveEvent::Closed);
    debug!("Live session reader finished");
}

/// Parse one frame and push its events. Returns false once the receiver
/// is gone. Unknown frame shapes are ignored.
fn forward(payload: &[u8], events: &std::sync::mpsc::Sender<LiveEvent>) -> bool {
    let parsed: ServerMessage = match serde_json::from_slice(payload) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("Ignoring unparseable server frame: {e}");
            return true;
        }
    };
    for event in parsed.into_events() {
        if events.send(event).is_err() {
            return false;
        }
    }
    true
}
