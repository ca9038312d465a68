//! Websocket transport to the agent runtime.
//!
//! Each submission runs on its own worker thread that owns the socket for the
//! whole stream. Events travel back over a crossbeam channel tagged with the
//! submission's generation so the session client can discard late chunks from
//! a cancelled stream.

use crossbeam_channel::Sender;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect as websocket_connect, Message as WsMessage, WebSocket};

use crate::protocol::{Envelope, StreamEvent, SubmitFrame};

/// Poll interval for the cancel flag while blocked on a socket read.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// One stream event, stamped with the generation of the submission that
/// produced it.
#[derive(Debug, Clone)]
pub struct TransportEvent {
    pub generation: u64,
    pub event: StreamEvent,
}

/// Capability seam between the session client and the network, so tests can
/// script a stream without a server.
pub trait AgentTransport {
    /// Open a stream for one submission. Delivery is asynchronous; failures
    /// after this returns surface as [`StreamEvent::Error`] events.
    fn submit(&mut self, envelope: &Envelope, generation: u64) -> Result<(), String>;

    /// Ask the in-flight stream to stop. Idempotent; late events are handled
    /// by generation filtering, not by this call.
    fn cancel(&mut self);
}

/// Blocking websocket transport; one worker thread per submission.
pub struct WsTransport {
    url: String,
    assistant_id: String,
    events: Sender<TransportEvent>,
    cancel: Arc<AtomicBool>,
}

impl WsTransport {
    pub fn new(url: String, assistant_id: String, events: Sender<TransportEvent>) -> Self {
        Self {
            url,
            assistant_id,
            events,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl AgentTransport for WsTransport {
    fn submit(&mut self, envelope: &Envelope, generation: u64) -> Result<(), String> {
        let frame = SubmitFrame {
            assistant_id: &self.assistant_id,
            envelope,
        };
        let payload = serde_json::to_string(&frame)
            .map_err(|err| format!("failed to serialize submission: {err}"))?;

        // Fresh flag per submission; a cancelled worker keeps its own copy.
        self.cancel = Arc::new(AtomicBool::new(false));
        let worker = StreamWorker {
            url: self.url.clone(),
            payload,
            generation,
            events: self.events.clone(),
            cancel: Arc::clone(&self.cancel),
        };
        thread::Builder::new()
            .name(format!("ikochat-stream-{generation}"))
            .spawn(move || worker.run())
            .map_err(|err| format!("failed to spawn stream worker: {err}"))?;
        Ok(())
    }

    fn cancel(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

struct StreamWorker {
    url: String,
    payload: String,
    generation: u64,
    events: Sender<TransportEvent>,
    cancel: Arc<AtomicBool>,
}

impl StreamWorker {
    fn run(self) {
        if let Err(message) = self.run_inner() {
            self.emit(StreamEvent::Error {
                message,
                recoverable: true,
            });
        }
    }

    fn run_inner(&self) -> Result<(), String> {
        let (mut socket, _response) = websocket_connect(self.url.as_str())
            .map_err(|err| format!("failed to connect to agent at {}: {err}", self.url))?;
        set_read_timeout(&mut socket, Some(READ_POLL_INTERVAL));

        socket
            .send(WsMessage::Text(self.payload.clone().into()))
            .map_err(|err| format!("failed to send submission: {err}"))?;
        debug!(generation = self.generation, "submission sent");

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                debug!(generation = self.generation, "stream cancelled");
                let _ = socket.close(None);
                return Ok(());
            }
            let message = match socket.read() {
                Ok(message) => message,
                Err(tungstenite::Error::Io(err))
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    continue;
                }
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    // Server closed without a terminal event.
                    return Err("agent closed the stream unexpectedly".to_string());
                }
                Err(err) => return Err(format!("stream read failed: {err}")),
            };
            match message {
                WsMessage::Text(raw) => match serde_json::from_str::<StreamEvent>(&raw) {
                    Ok(event) => {
                        let finished = matches!(event, StreamEvent::Finished { .. });
                        self.emit(event);
                        if finished {
                            let _ = socket.close(None);
                            return Ok(());
                        }
                    }
                    Err(err) => {
                        warn!(generation = self.generation, "unparseable stream frame: {err}");
                    }
                },
                WsMessage::Close(_) => {
                    return Err("agent closed the stream unexpectedly".to_string());
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) => {}
                other => {
                    debug!(generation = self.generation, "ignoring frame: {other:?}");
                }
            }
        }
    }

    fn emit(&self, event: StreamEvent) {
        let _ = self.events.send(TransportEvent {
            generation: self.generation,
            event,
        });
    }
}

fn set_read_timeout(socket: &mut WebSocket<MaybeTlsStream<TcpStream>>, timeout: Option<Duration>) {
    // Only plain streams are expected here; TLS endpoints would need the
    // corresponding tungstenite feature.
    if let MaybeTlsStream::Plain(stream) = socket.get_mut() {
        let _ = stream.set_read_timeout(timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn submit_to_unreachable_agent_reports_recoverable_error() {
        let (tx, rx) = unbounded();
        let mut transport = WsTransport::new(
            "ws://127.0.0.1:1/session".to_string(),
            "agent".to_string(),
            tx,
        );
        let envelope = Envelope {
            messages: Vec::new(),
            initial_search_query_count: 1,
            max_research_loops: 1,
            reasoning_model: "model".into(),
            image: None,
            audio: None,
        };
        transport.submit(&envelope, 7).expect("worker spawns");

        let delivered = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("connection failure surfaces as an event");
        assert_eq!(delivered.generation, 7);
        match delivered.event {
            StreamEvent::Error {
                message,
                recoverable,
            } => {
                assert!(recoverable);
                assert!(message.contains("failed to connect"));
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[test]
    fn cancel_is_idempotent_without_an_active_stream() {
        let (tx, _rx) = unbounded();
        let mut transport = WsTransport::new("ws://localhost/x".into(), "agent".into(), tx);
        transport.cancel();
        transport.cancel();
    }
}
