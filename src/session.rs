//! Session stream client: transcript state, streaming updates, and cancel.
//!
//! Submissions append the human turn optimistically, before any network
//! round-trip. Every in-flight stream carries a generation number; cancelling
//! bumps the generation so chunks from the old stream are discarded even if
//! the worker takes a while to notice.

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use crate::message::{Message, Role};
use crate::playback::AudioPlayer;
use crate::protocol::{Envelope, StreamEvent};
use crate::transport::{AgentTransport, TransportEvent};

/// Drives one conversation against the agent runtime.
pub struct SessionClient {
    transport: Box<dyn AgentTransport>,
    events: Receiver<TransportEvent>,
    player: Box<dyn AudioPlayer>,
    messages: Vec<Message>,
    generation: u64,
    loading: bool,
    finished_seen: bool,
    status: Option<String>,
    last_error: Option<String>,
}

impl SessionClient {
    pub fn new(
        transport: Box<dyn AgentTransport>,
        events: Receiver<TransportEvent>,
        player: Box<dyn AudioPlayer>,
    ) -> Self {
        Self {
            transport,
            events,
            player,
            messages: Vec::new(),
            generation: 0,
            loading: false,
            finished_seen: false,
            status: None,
            last_error: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start a stream for one composed envelope.
    ///
    /// The envelope's newest message is the human turn the composer just
    /// built; it lands in the transcript immediately.
    pub fn submit(&mut self, envelope: &Envelope) -> Result<(), String> {
        if self.loading {
            return Err("a request is already in flight".to_string());
        }
        let human = envelope
            .messages
            .last()
            .filter(|m| m.role == Role::Human)
            .cloned()
            .ok_or_else(|| "envelope carries no human turn".to_string())?;

        self.generation += 1;
        self.finished_seen = false;
        self.status = None;
        self.last_error = None;
        self.messages.push(human);
        self.loading = true;

        if let Err(err) = self.transport.submit(envelope, self.generation) {
            // The optimistic turn stays; the user can retry without retyping.
            self.loading = false;
            self.last_error = Some(err.clone());
            return Err(err);
        }
        info!(generation = self.generation, "submission dispatched");
        Ok(())
    }

    /// Drain pending stream events. Returns true when anything changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(delivered) = self.events.try_recv() {
            if delivered.generation != self.generation {
                debug!(
                    stale = delivered.generation,
                    current = self.generation,
                    "discarding event from superseded stream"
                );
                continue;
            }
            self.apply(delivered.event);
            changed = true;
        }
        changed
    }

    fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::MessageDelta { id, text } => {
                match self.messages.last_mut() {
                    Some(last) if last.role == Role::Assistant && last.id == id => {
                        last.append_text(&text);
                    }
                    _ => self.messages.push(Message::assistant(id, text)),
                }
            }
            StreamEvent::Status { message } => {
                self.status = Some(message);
            }
            StreamEvent::Error {
                message,
                recoverable,
            } => {
                warn!(recoverable, "stream error: {message}");
                self.last_error = Some(message);
                self.status = None;
                self.loading = false;
            }
            StreamEvent::Finished { final_state } => {
                if self.finished_seen {
                    debug!("ignoring duplicate terminal event");
                    return;
                }
                self.finished_seen = true;
                self.loading = false;
                self.status = None;
                if let Some(audio) = final_state.audio_output {
                    // Playback is best-effort; a bad device never fails the turn.
                    if let Err(err) = self.player.play(&audio) {
                        warn!("reply playback failed: {err}");
                    }
                }
            }
        }
    }

    /// Stop the in-flight stream, keeping whatever text already arrived.
    pub fn cancel(&mut self) {
        if !self.loading {
            return;
        }
        self.transport.cancel();
        self.generation += 1;
        self.loading = false;
        self.status = None;
        info!("stream cancelled by user");
    }

    /// Drop the whole conversation and start fresh.
    pub fn reset(&mut self) {
        self.cancel();
        self.messages.clear();
        self.last_error = None;
        self.status = None;
    }
}
