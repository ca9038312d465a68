//! Opt-in JSON trace log for debugging agent sessions after the fact.
//!
//! The subscriber appends to a single file so a crashed session leaves its
//! trail behind; nothing is written unless `--logs` is passed.

use crate::config::AppConfig;
use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_subscriber::fmt::time::UtcTime;

static SUBSCRIBER_INSTALLED: OnceLock<()> = OnceLock::new();

/// Where trace lines land. `IKOCHAT_TRACE_LOG` overrides the temp-dir default.
fn trace_log_path() -> PathBuf {
    env::var("IKOCHAT_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("ikochat_trace.jsonl"))
}

/// Install the trace subscriber if the config asks for it. Safe to call more
/// than once; an unwritable log path silently disables tracing rather than
/// failing startup.
pub fn init_tracing(config: &AppConfig) {
    if !config.tracing_enabled() {
        return;
    }
    SUBSCRIBER_INSTALLED.get_or_init(|| {
        let _ = install_file_subscriber(&trace_log_path());
    });
}

fn install_file_subscriber(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(file)
        .with_current_span(false)
        .with_span_list(false)
        .finish();
    // A second global subscriber is fine to lose; first install wins.
    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use std::time::{SystemTime, UNIX_EPOCH};

    // Serializes tests that touch IKOCHAT_TRACE_LOG.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn scratch_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock after epoch")
            .as_nanos();
        env::temp_dir().join(format!("ikochat-telemetry-{tag}-{nanos}.jsonl"))
    }

    #[test]
    fn trace_path_honors_env_override() {
        let _guard = ENV_LOCK.lock().expect("env lock");
        let path = scratch_path("override");
        env::set_var("IKOCHAT_TRACE_LOG", &path);
        assert_eq!(trace_log_path(), path);
        env::remove_var("IKOCHAT_TRACE_LOG");
    }

    #[test]
    fn trace_path_falls_back_to_temp_dir() {
        let _guard = ENV_LOCK.lock().expect("env lock");
        env::remove_var("IKOCHAT_TRACE_LOG");
        assert_eq!(trace_log_path(), env::temp_dir().join("ikochat_trace.jsonl"));
    }

    #[test]
    fn file_subscriber_creates_the_log_file() {
        let path = scratch_path("install");
        install_file_subscriber(&path).expect("open log file");
        assert!(path.exists());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn file_subscriber_reports_unwritable_paths() {
        let path = env::temp_dir().join("ikochat-no-such-dir").join("trace.jsonl");
        assert!(install_file_subscriber(&path).is_err());
    }
}
