//! Shared TUI state and key dispatch for the Iko chat binary.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ikochat::capture::Recorder;
use ikochat::{Composer, EffortTier, SessionClient};
use ikochat::auth::LoginGate;
use std::fs;
use tracing::debug;

/// Canned prompts shown on the welcome screen; digits 1-3 insert them.
pub(crate) const SUGGESTIONS: [&str; 3] = [
    "Колку е каматата за станбен кредит?",
    "Како да отворам трансакциска сметка?",
    "Кои се провизиите за картички во странство?",
];

pub(crate) const ATTACH_COMMAND: &str = "/attach ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tab {
    Chat,
    Advisor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginField {
    Username,
    Password,
}

/// Transient login overlay state.
pub(crate) struct LoginForm {
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) focus: LoginField,
    pub(crate) error: Option<String>,
}

impl LoginForm {
    fn new() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            focus: LoginField::Username,
            error: None,
        }
    }

    fn active_field(&mut self) -> &mut String {
        match self.focus {
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
        }
    }
}

/// Everything the event loop and renderer share.
pub(crate) struct App {
    pub(crate) composer: Composer,
    pub(crate) recorder: Recorder,
    pub(crate) session: SessionClient,
    pub(crate) gate: LoginGate,
    pub(crate) effort: EffortTier,
    pub(crate) reasoning_model: String,
    pub(crate) tab: Tab,
    pub(crate) login: Option<LoginForm>,
    pub(crate) scroll: u16,
    pub(crate) flash: Option<String>,
}

impl App {
    pub(crate) fn new(
        recorder: Recorder,
        session: SessionClient,
        effort: EffortTier,
        reasoning_model: String,
    ) -> Self {
        Self {
            composer: Composer::new(),
            recorder,
            session,
            gate: LoginGate::new(),
            effort,
            reasoning_model,
            tab: Tab::Chat,
            login: None,
            scroll: 0,
            flash: None,
        }
    }

    /// The welcome screen shows until the first turn lands in the transcript.
    pub(crate) fn show_welcome(&self) -> bool {
        self.session.messages().is_empty()
    }

    /// Drive background work. Returns true when a redraw is needed.
    pub(crate) fn poll(&mut self) -> bool {
        self.recorder.poll();
        self.session.poll()
    }

    /// Interpret one keystroke. Returns true when the app should quit.
    pub(crate) fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.login.is_some() {
            self.handle_login_key(key);
            return false;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => {
                if self.session.is_loading() {
                    self.session.cancel();
                    return false;
                }
                return true;
            }
            KeyCode::Char('r') if ctrl => self.toggle_recording(),
            KeyCode::Char('e') if ctrl => {
                self.effort = self.effort.cycled();
            }
            KeyCode::Char('n') if ctrl => self.reset_session(),
            KeyCode::Char('t') if ctrl => self.switch_tab(),
            KeyCode::Enter => self.submit_input(),
            KeyCode::Backspace => self.composer.pop_char(),
            KeyCode::Esc => {
                if self.session.is_loading() {
                    self.session.cancel();
                } else {
                    self.composer.clear_text();
                }
            }
            KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
            KeyCode::Char(c) => {
                if !ctrl {
                    if self.show_welcome() && self.composer.text().is_empty() {
                        if let Some(digit) = c.to_digit(10) {
                            let index = digit.wrapping_sub(1) as usize;
                            if let Some(suggestion) = SUGGESTIONS.get(index) {
                                self.composer.set_text(suggestion);
                                return false;
                            }
                        }
                    }
                    self.composer.push_char(c);
                }
            }
            _ => {}
        }
        false
    }

    fn handle_login_key(&mut self, key: KeyEvent) {
        let Some(form) = self.login.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.login = None;
            }
            KeyCode::Tab => {
                form.focus = match form.focus {
                    LoginField::Username => LoginField::Password,
                    LoginField::Password => LoginField::Username,
                };
            }
            KeyCode::Backspace => {
                form.active_field().pop();
            }
            KeyCode::Enter => match form.focus {
                LoginField::Username => form.focus = LoginField::Password,
                LoginField::Password => {
                    match self.gate.login(&form.username, &form.password) {
                        Ok(()) => {
                            self.login = None;
                            self.tab = Tab::Advisor;
                        }
                        Err(err) => form.error = Some(err),
                    }
                }
            },
            KeyCode::Char(c) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL) {
                    form.active_field().push(c);
                }
            }
            _ => {}
        }
    }

    /// Switch tabs; the advisor tab is gated behind login.
    fn switch_tab(&mut self) {
        match self.tab {
            Tab::Chat => {
                if self.gate.is_authenticated() {
                    self.tab = Tab::Advisor;
                } else {
                    self.login = Some(LoginForm::new());
                }
            }
            Tab::Advisor => self.tab = Tab::Chat,
        }
    }

    fn submit_input(&mut self) {
        let text = self.composer.text().to_string();
        if let Some(path) = text.strip_prefix(ATTACH_COMMAND) {
            self.attach_file(path.trim());
            return;
        }

        let Some(envelope) = self.composer.compose(
            None,
            self.effort,
            &self.reasoning_model,
            self.session.messages(),
        ) else {
            return;
        };
        if let Err(err) = self.session.submit(&envelope) {
            self.flash = Some(err);
        } else {
            self.flash = None;
            self.scroll = 0;
        }
    }

    fn attach_file(&mut self, path: &str) {
        match fs::read(path) {
            Ok(bytes) => {
                if self.composer.attachment_mut().select(&bytes) {
                    self.flash = Some(format!("attached {path}"));
                    self.composer.clear_text();
                } else {
                    self.flash = Some(format!("{path} is not a supported image"));
                }
            }
            Err(err) => {
                self.flash = Some(format!("cannot read {path}: {err}"));
            }
        }
    }

    /// Start recording, or stop and submit the captured audio.
    fn toggle_recording(&mut self) {
        if self.recorder.is_recording() {
            match self.recorder.stop() {
                Ok(audio) => {
                    debug!(duration_ms = audio.duration_ms, "voice capture finished");
                    let Some(envelope) = self.composer.compose(
                        Some(audio),
                        self.effort,
                        &self.reasoning_model,
                        self.session.messages(),
                    ) else {
                        return;
                    };
                    if let Err(err) = self.session.submit(&envelope) {
                        self.flash = Some(err);
                    }
                }
                Err(err) => self.flash = Some(err),
            }
        } else if let Err(err) = self.recorder.start() {
            self.flash = Some(err);
        }
    }

    /// The terminal equivalent of starting over: everything transient goes.
    fn reset_session(&mut self) {
        self.session.reset();
        self.composer.clear_text();
        self.composer.attachment_mut().clear();
        self.scroll = 0;
        self.flash = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{unbounded, Sender};
    use ikochat::capture::{CaptureHandle, MicrophoneSource, PermissionState};
    use ikochat::protocol::{Envelope, StreamEvent};
    use ikochat::transport::{AgentTransport, TransportEvent};
    use ikochat::NullPlayer;

    struct NoopTransport;

    impl AgentTransport for NoopTransport {
        fn submit(&mut self, _envelope: &Envelope, _generation: u64) -> Result<(), String> {
            Ok(())
        }

        fn cancel(&mut self) {}
    }

    struct SilentHandle;

    impl CaptureHandle for SilentHandle {
        fn drain(&mut self) -> Vec<Vec<f32>> {
            vec![vec![0.25; 160]]
        }

        fn sample_rate(&self) -> u32 {
            16_000
        }
    }

    struct GrantedMicrophone;

    impl MicrophoneSource for GrantedMicrophone {
        fn query_permission(&self) -> PermissionState {
            PermissionState::Granted
        }

        fn request_permission(&mut self) -> Result<bool, String> {
            Ok(true)
        }

        fn open(&mut self) -> Result<Box<dyn CaptureHandle>, String> {
            Ok(Box::new(SilentHandle))
        }
    }

    fn test_app() -> (App, Sender<TransportEvent>) {
        let (tx, rx) = unbounded();
        let session = SessionClient::new(Box::new(NoopTransport), rx, Box::new(NullPlayer));
        let recorder = Recorder::new(Box::new(GrantedMicrophone));
        (
            App::new(recorder, session, EffortTier::Medium, "model".into()),
            tx,
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn typing_and_enter_submits_a_turn() {
        let (mut app, _tx) = test_app();
        type_text(&mut app, "zdravo");
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.session.messages().len(), 1);
        assert!(app.session.is_loading());
        assert!(app.composer.text().is_empty());
    }

    #[test]
    fn enter_on_blank_input_does_nothing() {
        let (mut app, _tx) = test_app();
        app.handle_key(key(KeyCode::Enter));
        assert!(app.session.messages().is_empty());
        assert!(!app.session.is_loading());
    }

    #[test]
    fn welcome_digit_inserts_suggestion() {
        let (mut app, _tx) = test_app();
        app.handle_key(key(KeyCode::Char('1')));
        assert_eq!(app.composer.text(), SUGGESTIONS[0]);
    }

    #[test]
    fn digits_type_normally_once_chatting() {
        let (mut app, _tx) = test_app();
        type_text(&mut app, "suma");
        app.handle_key(key(KeyCode::Enter));
        app.handle_key(key(KeyCode::Char('1')));
        assert_eq!(app.composer.text(), "1");
    }

    #[test]
    fn ctrl_e_cycles_effort_tier() {
        let (mut app, _tx) = test_app();
        assert_eq!(app.effort, EffortTier::Medium);
        app.handle_key(ctrl('e'));
        assert_eq!(app.effort, EffortTier::High);
        app.handle_key(ctrl('e'));
        assert_eq!(app.effort, EffortTier::Low);
    }

    #[test]
    fn ctrl_c_cancels_before_quitting() {
        let (mut app, _tx) = test_app();
        type_text(&mut app, "zdravo");
        app.handle_key(key(KeyCode::Enter));
        assert!(app.session.is_loading());

        let quit = app.handle_key(ctrl('c'));
        assert!(!quit, "first ctrl+c cancels the stream");
        assert!(!app.session.is_loading());

        let quit = app.handle_key(ctrl('c'));
        assert!(quit, "second ctrl+c quits");
    }

    #[test]
    fn record_toggle_captures_and_submits_audio() {
        let (mut app, _tx) = test_app();
        app.handle_key(ctrl('r'));
        assert!(app.recorder.is_recording());

        app.poll();
        app.handle_key(ctrl('r'));
        assert!(!app.recorder.is_recording());
        assert_eq!(app.session.messages().len(), 1);
        assert!(app.session.is_loading());
    }

    #[test]
    fn advisor_tab_is_gated_behind_login() {
        let (mut app, _tx) = test_app();
        app.handle_key(ctrl('t'));
        assert_eq!(app.tab, Tab::Chat);
        assert!(app.login.is_some(), "unauthenticated switch opens the form");

        type_text(&mut app, "marija");
        app.handle_key(key(KeyCode::Enter)); // moves focus to password
        type_text(&mut app, "tajna");
        app.handle_key(key(KeyCode::Enter));
        assert!(app.login.is_none());
        assert_eq!(app.tab, Tab::Advisor);
        assert!(app.gate.is_authenticated());

        // Once authenticated the gate stays open.
        app.handle_key(ctrl('t'));
        assert_eq!(app.tab, Tab::Chat);
        app.handle_key(ctrl('t'));
        assert_eq!(app.tab, Tab::Advisor);
    }

    #[test]
    fn login_rejects_blank_credentials_with_inline_error() {
        let (mut app, _tx) = test_app();
        app.handle_key(ctrl('t'));
        app.handle_key(key(KeyCode::Enter)); // empty username -> focus password
        app.handle_key(key(KeyCode::Enter)); // empty password -> error
        let form = app.login.as_ref().expect("form stays open");
        assert!(form.error.is_some());
        assert!(!app.gate.is_authenticated());
    }

    #[test]
    fn ctrl_n_resets_the_whole_session() {
        let (mut app, tx) = test_app();
        type_text(&mut app, "zdravo");
        app.handle_key(key(KeyCode::Enter));
        tx.send(TransportEvent {
            generation: 1,
            event: StreamEvent::MessageDelta {
                id: "a1".into(),
                text: "odgovor".into(),
            },
        })
        .expect("send");
        app.poll();
        assert_eq!(app.session.messages().len(), 2);

        app.handle_key(ctrl('n'));
        assert!(app.session.messages().is_empty());
        assert!(app.show_welcome());
        assert!(!app.session.is_loading());
    }

    #[test]
    fn attach_command_reports_missing_file() {
        let (mut app, _tx) = test_app();
        type_text(&mut app, "/attach /nonexistent/slika.png");
        app.handle_key(key(KeyCode::Enter));
        assert!(app
            .flash
            .as_deref()
            .is_some_and(|msg| msg.contains("cannot read")));
        assert!(!app.composer.has_attachment());
        assert!(app.session.messages().is_empty());
    }

    #[test]
    fn attach_command_stages_an_image_file() {
        let (mut app, _tx) = test_app();
        let path = std::env::temp_dir().join(format!(
            "ikochat-attach-test-{}.png",
            std::process::id()
        ));
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        png.extend_from_slice(&[0u8; 16]);
        fs::write(&path, &png).expect("write temp png");

        type_text(&mut app, &format!("/attach {}", path.display()));
        app.handle_key(key(KeyCode::Enter));
        let _ = fs::remove_file(&path);

        assert!(app.composer.has_attachment());
        assert!(app.composer.text().is_empty());
    }

    #[test]
    fn esc_clears_input_when_idle() {
        let (mut app, _tx) = test_app();
        type_text(&mut app, "nesto");
        app.handle_key(key(KeyCode::Esc));
        assert!(app.composer.text().is_empty());
    }
}
