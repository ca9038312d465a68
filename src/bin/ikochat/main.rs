//! Iko chat entrypoint: terminal front-end for the bank's conversational assistant.
//!
//! Wires the capture, composer, and session layers to a ratatui screen. The
//! streaming transport and microphone each run on worker threads; the UI
//! thread owns all state.

mod app;
mod event_loop;
mod ui;

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::unbounded;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;

use ikochat::capture::{list_input_devices, CpalMicrophone, Recorder};
use ikochat::terminal_restore::TerminalRestoreGuard;
use ikochat::{
    init_tracing, AppConfig, AudioPlayer, CpalPlayer, NullPlayer, SessionClient, WsTransport,
};

use crate::app::App;
use crate::event_loop::run_event_loop;

fn main() -> Result<()> {
    let config = AppConfig::parse();

    if config.list_input_devices {
        print_input_devices();
        return Ok(());
    }

    init_tracing(&config);

    let recorder = Recorder::new(Box::new(CpalMicrophone::new(config.input_device.as_deref())));
    let (events_tx, events_rx) = unbounded();
    let transport = WsTransport::new(
        config.agent_url.clone(),
        config.assistant_id.clone(),
        events_tx,
    );
    let player: Box<dyn AudioPlayer> = if config.no_playback {
        Box::new(NullPlayer)
    } else {
        Box::new(CpalPlayer)
    };
    let session = SessionClient::new(Box::new(transport), events_rx, player);
    let mut app = App::new(recorder, session, config.effort, config.reasoning_model);

    let terminal_guard = TerminalRestoreGuard::new();
    terminal_guard.enable_raw_mode()?;
    let mut stdout = io::stdout();
    terminal_guard.enter_alt_screen(&mut stdout)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_event_loop(&mut terminal, &mut app);

    drop(terminal);
    terminal_guard.restore();

    result
}

fn print_input_devices() {
    let devices = list_input_devices();
    if devices.is_empty() {
        println!("No audio input devices detected.");
        return;
    }
    println!("Available audio input devices:");
    for device in devices {
        println!("  {device}");
    }
}
