//! Conversation data model shared by the composer, session client, and wire protocol.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Who produced a conversational turn.
///
/// Wire values follow the agent runtime's message schema: human turns are
/// tagged `human`, assistant turns `ai`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "human")]
    Human,
    #[serde(rename = "ai")]
    Assistant,
}

/// Message body: plain text, or a structured payload carrying inline media.
///
/// A structured body always has at least one of text/image/audio populated;
/// use [`MessageContent::structured`] to keep that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Plain(String),
    Structured {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio: Option<String>,
    },
}

impl MessageContent {
    /// Build a structured body, or `None` when every field is absent/blank.
    pub fn structured(
        text: Option<String>,
        image: Option<String>,
        audio: Option<String>,
    ) -> Option<Self> {
        let text = text.filter(|t| !t.trim().is_empty());
        if text.is_none() && image.is_none() && audio.is_none() {
            return None;
        }
        Some(Self::Structured { text, image, audio })
    }

    /// Human-readable text for transcript rendering.
    pub fn display_text(&self) -> &str {
        match self {
            Self::Plain(text) => text,
            Self::Structured { text, .. } => text.as_deref().unwrap_or(""),
        }
    }

    /// True when the body carries inline media.
    pub fn has_media(&self) -> bool {
        matches!(
            self,
            Self::Structured { image, audio, .. } if image.is_some() || audio.is_some()
        )
    }
}

/// One conversational turn. Immutable once its stream ends; never deleted
/// outside a full session reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn human(content: MessageContent) -> Self {
        Self {
            id: next_message_id(),
            role: Role::Human,
            content,
        }
    }

    pub fn assistant(id: String, text: String) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: MessageContent::Plain(text),
        }
    }

    /// Append streamed text to this turn's body.
    pub fn append_text(&mut self, chunk: &str) {
        match &mut self.content {
            MessageContent::Plain(text) => text.push_str(chunk),
            MessageContent::Structured { text, .. } => {
                text.get_or_insert_with(String::new).push_str(chunk);
            }
        }
    }
}

static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Allocate a session-unique message id.
///
/// Millisecond timestamps alone collide under rapid submission, so a
/// process-local sequence component breaks ties.
pub fn next_message_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let seq = MESSAGE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{millis:x}-{seq:x}")
}

/// User-selected effort level controlling search breadth and research depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortTier {
    Low,
    #[default]
    Medium,
    High,
}

/// Tier-derived control parameters carried in the request envelope.
///
/// The default is the 0/0 pair, matching the agent contract's behavior for an
/// unrecognized tier; flag-level parsing rejects unknown tiers before this
/// default can matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EffortCounts {
    pub initial_search_query_count: u32,
    pub max_research_loops: u32,
}

impl EffortTier {
    /// Pure, total mapping from tier to search/loop counts.
    pub fn counts(self) -> EffortCounts {
        let (initial_search_query_count, max_research_loops) = match self {
            Self::Low => (1, 1),
            Self::Medium => (3, 3),
            Self::High => (5, 10),
        };
        EffortCounts {
            initial_search_query_count,
            max_research_loops,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Next tier in the UI cycle order.
    pub fn cycled(self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High => Self::Low,
        }
    }
}

impl std::fmt::Display for EffortTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
