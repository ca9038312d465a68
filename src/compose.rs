//! Submission composer: merges draft text, media, and effort tier into one envelope.
//!
//! Content-shape policy (the two upstream UI revisions disagreed; this is the
//! one we implement): structured bodies are a single merged object carrying
//! whichever of text/image/audio are present, and audio-only submissions get
//! a fixed placeholder label so the transcript always has human-readable text.

use crate::attachment::AttachmentManager;
use crate::capture::EncodedAudio;
use crate::message::{EffortTier, Message, MessageContent};
use crate::protocol::Envelope;

/// Label substituted for audio-only turns.
pub const AUDIO_PLACEHOLDER_LABEL: &str = "Говорна порака";

/// Owns the transient input state: draft text and the pending attachment.
/// Both are cleared only when a composition actually succeeds.
#[derive(Default)]
pub struct Composer {
    text: String,
    attachment: AttachmentManager,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn push_char(&mut self, ch: char) {
        self.text.push(ch);
    }

    pub fn pop_char(&mut self) {
        self.text.pop();
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    pub fn clear_text(&mut self) {
        self.text.clear();
    }

    pub fn attachment_mut(&mut self) -> &mut AttachmentManager {
        &mut self.attachment
    }

    pub fn has_attachment(&self) -> bool {
        self.attachment.pending().is_some()
    }

    /// Build the outbound envelope for one submission.
    ///
    /// Returns `None` when the draft is blank and no media is staged: an
    /// all-empty submission never reaches the network. On success the new
    /// human turn is appended to a copy of the prior transcript and the
    /// composer's transient state is cleared.
    pub fn compose(
        &mut self,
        audio: Option<EncodedAudio>,
        tier: EffortTier,
        model: &str,
        transcript: &[Message],
    ) -> Option<Envelope> {
        let trimmed = self.text.trim().to_string();
        let audio_uri = audio.map(|a| a.data_uri);

        if trimmed.is_empty() && audio_uri.is_none() && !self.has_attachment() {
            return None;
        }

        // Past the blank check, composition always succeeds, so the pending
        // slot can be consumed rather than cleared afterwards.
        let image_uri = self.attachment.take().map(|img| img.data_uri);

        // Shape resolution is deterministic: audio wins over image, and plain
        // text is used only when no media is present.
        let content = if audio_uri.is_some() {
            let label = if trimmed.is_empty() {
                AUDIO_PLACEHOLDER_LABEL.to_string()
            } else {
                trimmed
            };
            MessageContent::Structured {
                text: Some(label),
                image: image_uri.clone(),
                audio: audio_uri.clone(),
            }
        } else if image_uri.is_some() {
            MessageContent::Structured {
                text: (!trimmed.is_empty()).then_some(trimmed),
                image: image_uri.clone(),
                audio: None,
            }
        } else {
            MessageContent::Plain(trimmed)
        };

        let mut messages = transcript.to_vec();
        messages.push(Message::human(content));
        let counts = tier.counts();

        self.text.clear();

        Some(Envelope {
            messages,
            initial_search_query_count: counts.initial_search_query_count,
            max_research_loops: counts.max_research_loops,
            reasoning_model: model.to_string(),
            image: image_uri,
            audio: audio_uri,
        })
    }
}
