//! CLI flag schema so runtime behavior is explicit and discoverable.

use clap::Parser;

use crate::message::EffortTier;

pub(crate) const DEFAULT_AGENT_URL: &str = "ws://127.0.0.1:8123/session";
pub(crate) const DEFAULT_ASSISTANT_ID: &str = "agent";
pub(crate) const DEFAULT_REASONING_MODEL: &str = "gemini-2.5-flash-preview-04-17";

/// Runtime configuration derived from CLI flags.
#[derive(Debug, Parser, Clone)]
#[command(name = "ikochat", about = "Terminal chat front-end for the Iko banking assistant", version)]
pub struct AppConfig {
    /// Websocket URL of the agent runtime
    #[arg(long = "agent-url", env = "IKOCHAT_AGENT_URL", default_value = DEFAULT_AGENT_URL)]
    pub agent_url: String,

    /// Assistant id sent with every submission
    #[arg(long = "assistant-id", default_value = DEFAULT_ASSISTANT_ID)]
    pub assistant_id: String,

    /// Reasoning model requested from the agent
    #[arg(long = "reasoning-model", default_value = DEFAULT_REASONING_MODEL)]
    pub reasoning_model: String,

    /// Starting effort tier (low, medium, high)
    #[arg(long = "effort", value_enum, default_value_t = EffortTier::Medium)]
    pub effort: EffortTier,

    /// Capture device name (substring match); defaults to the system input
    #[arg(long = "input-device")]
    pub input_device: Option<String>,

    /// List capture devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Disable playback of synthesized audio replies
    #[arg(long = "no-playback", default_value_t = false)]
    pub no_playback: bool,

    /// Enable JSON trace logging
    #[arg(long = "logs", default_value_t = false)]
    pub logs: bool,

    /// Force logging off, overriding --logs
    #[arg(long = "no-logs", default_value_t = false)]
    pub no_logs: bool,
}

impl AppConfig {
    /// Whether the JSON trace subscriber should be installed. `--no-logs`
    /// wins over `--logs` so a wrapper script can force logging off.
    pub fn tracing_enabled(&self) -> bool {
        self.logs && !self.no_logs
    }
}
