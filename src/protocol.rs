//! Wire contract with the agent runtime so envelopes and stream updates stay stable.
//!
//! Requests and stream updates are JSON; stream events carry an `"event"` tag
//! field for type discrimination.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Outbound request bundle: full transcript plus control parameters and any
/// inline media for the newest human turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub messages: Vec<Message>,
    pub initial_search_query_count: u32,
    pub max_research_loops: u32,
    pub reasoning_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

/// Client → agent submission frame.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitFrame<'a> {
    pub assistant_id: &'a str,
    #[serde(flatten)]
    pub envelope: &'a Envelope,
}

/// Incremental updates streamed back by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum StreamEvent {
    /// Incremental assistant output; `text` appends to the turn with this id.
    #[serde(rename = "message")]
    MessageDelta { id: String, text: String },

    /// Human-readable progress update (search phase, loop count, ...).
    #[serde(rename = "status")]
    Status { message: String },

    /// Stream failure; `recoverable` signals whether the session may continue.
    #[serde(rename = "error")]
    Error { message: String, recoverable: bool },

    /// Terminal event; the final state may carry a synthesized audio reply.
    #[serde(rename = "finished")]
    Finished {
        #[serde(default)]
        final_state: FinalState,
    },
}

/// Final agent state delivered exactly once per stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_output: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, MessageContent};

    #[test]
    fn envelope_omits_absent_media_fields() {
        let envelope = Envelope {
            messages: vec![Message::human(MessageContent::Plain("zdravo".into()))],
            initial_search_query_count: 3,
            max_research_loops: 3,
            reasoning_model: "gemini-2.5-flash-preview-04-17".into(),
            image: None,
            audio: None,
        };
        let json = serde_json::to_value(&envelope).expect("serialize envelope");
        assert!(json.get("image").is_none());
        assert!(json.get("audio").is_none());
        assert_eq!(json["initial_search_query_count"], 3);
    }

    #[test]
    fn submit_frame_flattens_envelope_alongside_assistant_id() {
        let envelope = Envelope {
            messages: Vec::new(),
            initial_search_query_count: 1,
            max_research_loops: 1,
            reasoning_model: "model".into(),
            image: None,
            audio: Some("data:audio/wav;base64,UklG".into()),
        };
        let frame = SubmitFrame {
            assistant_id: "agent",
            envelope: &envelope,
        };
        let json = serde_json::to_value(&frame).expect("serialize frame");
        assert_eq!(json["assistant_id"], "agent");
        assert_eq!(json["audio"], "data:audio/wav;base64,UklG");
    }

    #[test]
    fn stream_events_deserialize_from_tagged_json() {
        let delta: StreamEvent =
            serde_json::from_str(r#"{"event":"message","id":"m1","text":"Ka"}"#)
                .expect("message event");
        assert_eq!(
            delta,
            StreamEvent::MessageDelta {
                id: "m1".into(),
                text: "Ka".into()
            }
        );

        let finished: StreamEvent = serde_json::from_str(r#"{"event":"finished"}"#)
            .expect("finished event without final state");
        assert_eq!(
            finished,
            StreamEvent::Finished {
                final_state: FinalState::default()
            }
        );

        let with_audio: StreamEvent = serde_json::from_str(
            r#"{"event":"finished","final_state":{"audio_output":"data:audio/wav;base64,UklG"}}"#,
        )
        .expect("finished event with audio");
        match with_audio {
            StreamEvent::Finished { final_state } => {
                assert_eq!(
                    final_state.audio_output.as_deref(),
                    Some("data:audio/wav;base64,UklG")
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
