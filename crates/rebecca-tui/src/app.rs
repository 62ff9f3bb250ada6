use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use rebecca_core::{
    conversations, speech, stream, ApiClient, AudioPlayer, AuthError, ChatError, ChatSession,
    Config, Credential, CredentialStore, LoginForm, RegisterForm, StreamEvent,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::tui::AppEvent;
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Register,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    History,
    Transcript,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Username,
    Password,
    Confirm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryStatus {
    Loading,
    Loaded,
    Failed(String),
}

/// Feedback line under the login and registration forms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMessage {
    Info(String),
    Error(String),
}

/// Everything the app needs from config and command line, already resolved
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub model: String,
    pub assistant_name: String,
    pub speech_enabled: bool,
    pub player: AudioPlayer,
    pub stall_timeout: Option<Duration>,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_url: config.api_url(),
            model: config.model(),
            assistant_name: config.assistant_name(),
            speech_enabled: config.speech_enabled(),
            player: AudioPlayer::from_config(config),
            stall_timeout: config.stall_timeout(),
        }
    }
}

const GUEST_NAME: &str = "You";

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Login / registration state
    pub login_form: LoginForm,
    pub register_form: RegisterForm,
    pub form_field: FormField,
    pub form_message: Option<FormMessage>,
    pub auth_pending: bool,

    // Chat state
    pub session: ChatSession,
    pub input_cursor: usize, // cursor position in session.input, in chars
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of transcript area for scroll calculations
    pub chat_width: u16,  // Width of transcript area for wrap calculations
    pub status_message: Option<String>,
    pub animation_frame: u8, // 0-2 for ellipsis animation
    follow_tail: Arc<AtomicBool>,

    // Conversation history panel
    pub history_state: ListState,
    pub history_status: HistoryStatus,

    // Panel areas for mouse hit-testing (updated during render)
    pub history_area: Option<Rect>,
    pub chat_area: Option<Rect>,

    // Services
    pub client: ApiClient,
    pub credentials: CredentialStore,
    pub settings: Settings,
    events: Option<UnboundedSender<AppEvent>>,
}

impl App {
    pub fn new(settings: Settings, credentials: CredentialStore) -> Self {
        let credential = match credentials.load() {
            Ok(credential) => credential,
            Err(err) => {
                tracing::warn!("Ignoring unreadable credentials: {:#}", err);
                None
            }
        };

        let mut client = ApiClient::new(&settings.api_url);
        let user_name = credential
            .as_ref()
            .map(|c| c.username.clone())
            .unwrap_or_else(|| GUEST_NAME.to_string());
        let signed_in = credential.is_some();
        client.set_credential(credential);

        let mut session = ChatSession::new(&settings.model, user_name, &settings.assistant_name);

        // Any transcript change pins the view to the newest text
        let follow_tail = Arc::new(AtomicBool::new(false));
        let flag = follow_tail.clone();
        session.subscribe(move |_| flag.store(true, Ordering::Relaxed));

        let (screen, input_mode, focus) = if signed_in {
            (Screen::Chat, InputMode::Editing, FocusPane::Input)
        } else {
            (Screen::Login, InputMode::Editing, FocusPane::Input)
        };

        Self {
            should_quit: false,
            screen,
            input_mode,
            focus,

            login_form: LoginForm::default(),
            register_form: RegisterForm::default(),
            form_field: FormField::Username,
            form_message: None,
            auth_pending: false,

            session,
            input_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            status_message: None,
            animation_frame: 0,
            follow_tail,

            history_state: ListState::default(),
            history_status: HistoryStatus::Loading,

            history_area: None,
            chat_area: None,

            client,
            credentials,
            settings,
            events: None,
        }
    }

    /// Give the app a way to post events from background tasks
    pub fn attach_events(&mut self, events: UnboundedSender<AppEvent>) {
        self.events = Some(events);
    }

    pub fn signed_in_user(&self) -> Option<&str> {
        self.client.credential().map(|c| c.username.as_str())
    }

    /// Fetch the conversation list in the background
    pub fn load_history(&mut self) {
        // The list is write-once for the life of the process
        if conversations::is_loaded() {
            self.history_status = HistoryStatus::Loaded;
            return;
        }
        let Some(events) = self.events.clone() else {
            return;
        };
        let client = self.client.clone();
        self.history_status = HistoryStatus::Loading;

        tokio::spawn(async move {
            let result = conversations::load(&client).await.map_err(|e| format!("{:#}", e));
            let _ = events.send(AppEvent::HistoryLoaded(result));
        });
    }

    pub fn history_loaded(&mut self, result: Result<usize, String>) {
        match result {
            Ok(count) => {
                tracing::info!(count, "conversation history loaded");
                self.history_status = HistoryStatus::Loaded;
                if !conversations::all().is_empty() && self.history_state.selected().is_none() {
                    self.history_state.select(Some(0));
                }
            }
            Err(err) => {
                tracing::warn!("Could not load conversation history: {}", err);
                self.history_status = HistoryStatus::Failed(err);
            }
        }
    }

    // Chat

    pub fn send_message(&mut self) {
        if self.session.is_streaming() {
            self.status_message = Some(format!(
                "{} is still answering, wait for the reply to finish",
                self.session.assistant_name()
            ));
            return;
        }

        let Some(request) = self.session.begin_send() else {
            return;
        };
        self.status_message = None;
        self.scroll_chat_to_bottom();

        match self.events.clone() {
            Some(events) => {
                stream::spawn_reply(
                    self.client.clone(),
                    request,
                    self.settings.stall_timeout,
                    move |event| {
                        let _ = events.send(AppEvent::Stream(event));
                    },
                );
            }
            None => {
                tracing::error!("no event loop attached, dropping chat request");
                self.apply_stream_event(StreamEvent::Failed(ChatError::Transport(
                    "event loop not running".to_string(),
                )));
            }
        }
    }

    pub fn apply_stream_event(&mut self, event: StreamEvent) {
        let completion = self.session.apply(event);

        // Completion clears the input field
        self.input_cursor = self.input_cursor.min(self.session.input.chars().count());

        if self.follow_tail.swap(false, Ordering::Relaxed) {
            self.scroll_chat_to_bottom();
        }

        let Some(completion) = completion else {
            return;
        };

        if self.settings.speech_enabled && !completion.text.trim().is_empty() {
            speech::speak_detached(
                self.client.clone(),
                self.settings.player.clone(),
                completion.text,
            );
        }
    }

    pub fn toggle_speech(&mut self) {
        self.settings.speech_enabled = !self.settings.speech_enabled;
        self.status_message = Some(if self.settings.speech_enabled {
            "Spoken replies on".to_string()
        } else {
            "Spoken replies off".to_string()
        });
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_streaming() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll the transcript so the newest line (and typing indicator) is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let total_lines = ui::transcript_lines(self, wrap_width).len();
        let total_lines = u16::try_from(total_lines).unwrap_or(u16::MAX);

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    pub fn scroll_chat_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn history_nav_down(&mut self) {
        let len = conversations::all().len();
        if len > 0 {
            let i = self.history_state.selected().map_or(0, |i| (i + 1).min(len - 1));
            self.history_state.select(Some(i));
        }
    }

    pub fn history_nav_up(&mut self) {
        let i = self.history_state.selected().unwrap_or(0);
        self.history_state.select(Some(i.saturating_sub(1)));
    }

    /// Copy the selected past prompt into the input line
    pub fn reuse_selected_prompt(&mut self) {
        let Some(conversation) = self
            .history_state
            .selected()
            .and_then(|i| conversations::all().get(i))
        else {
            return;
        };

        self.session.input = conversation.prompt.clone();
        self.input_cursor = self.session.input.chars().count();
        self.focus = FocusPane::Input;
        self.input_mode = InputMode::Editing;
    }

    // Login and registration

    pub fn show_login(&mut self) {
        self.screen = Screen::Login;
        self.form_field = FormField::Username;
        self.input_mode = InputMode::Editing;
    }

    pub fn show_register(&mut self) {
        self.screen = Screen::Register;
        self.form_field = FormField::Username;
        self.form_message = None;
        self.input_mode = InputMode::Editing;
    }

    pub fn form_fields(&self) -> &'static [FormField] {
        match self.screen {
            Screen::Register => &[FormField::Username, FormField::Password, FormField::Confirm],
            _ => &[FormField::Username, FormField::Password],
        }
    }

    pub fn next_form_field(&mut self) {
        let fields = self.form_fields();
        let idx = fields.iter().position(|f| *f == self.form_field).unwrap_or(0);
        self.form_field = fields[(idx + 1) % fields.len()];
    }

    pub fn prev_form_field(&mut self) {
        let fields = self.form_fields();
        let idx = fields.iter().position(|f| *f == self.form_field).unwrap_or(0);
        self.form_field = fields[(idx + fields.len() - 1) % fields.len()];
    }

    pub fn on_last_form_field(&self) -> bool {
        self.form_fields().last() == Some(&self.form_field)
    }

    pub fn form_field_mut(&mut self) -> Option<&mut String> {
        match (self.screen, self.form_field) {
            (Screen::Login, FormField::Username) => Some(&mut self.login_form.username),
            (Screen::Login, FormField::Password) => Some(&mut self.login_form.password),
            (Screen::Register, FormField::Username) => Some(&mut self.register_form.username),
            (Screen::Register, FormField::Password) => Some(&mut self.register_form.password),
            (Screen::Register, FormField::Confirm) => Some(&mut self.register_form.confirm_password),
            _ => None,
        }
    }

    /// Validate the login form and sign in on a background task.
    ///
    /// The result comes back as [`AppEvent::LoginFinished`].
    pub fn submit_login(&mut self) {
        if self.auth_pending {
            return;
        }
        if let Err(err) = self.login_form.validate() {
            self.form_message = Some(FormMessage::Error(err.to_string()));
            return;
        }

        let Some(events) = self.events.clone() else {
            tracing::error!("no event loop attached, dropping login");
            self.finish_login(Err(AuthError::Transport("event loop not running".to_string())));
            return;
        };

        let client = self.client.clone();
        let username = self.login_form.username.trim().to_string();
        let password = self.login_form.password.clone();
        self.auth_pending = true;
        self.form_message = Some(FormMessage::Info("Signing in...".to_string()));

        tokio::spawn(async move {
            let result = client.login(&username, &password).await;
            let _ = events.send(AppEvent::LoginFinished(result));
        });
    }

    pub fn finish_login(&mut self, result: Result<Credential, AuthError>) {
        self.auth_pending = false;

        match result {
            Ok(credential) => {
                tracing::info!(user = %credential.username, "signed in");
                if let Err(err) = self.credentials.save(&credential) {
                    tracing::warn!("Could not store credentials: {:#}", err);
                }
                self.session.set_user_name(credential.username.clone());
                self.client.set_credential(Some(credential));
                self.login_form.clear();
                self.form_message = None;

                self.screen = Screen::Chat;
                self.focus = FocusPane::Input;
                self.input_mode = InputMode::Editing;
                self.load_history();
            }
            Err(err) => {
                tracing::warn!("login failed: {}", err);
                self.login_form.password.clear();
                self.form_message = Some(FormMessage::Error(err.to_string()));
            }
        }
    }

    /// Validate the registration form and register on a background task.
    ///
    /// The result comes back as [`AppEvent::RegisterFinished`].
    pub fn submit_register(&mut self) {
        if self.auth_pending {
            return;
        }
        if let Err(err) = self.register_form.validate() {
            self.form_message = Some(FormMessage::Error(err.to_string()));
            return;
        }

        let username = self.register_form.username.trim().to_string();
        let Some(events) = self.events.clone() else {
            tracing::error!("no event loop attached, dropping registration");
            self.finish_register(
                username,
                Err(AuthError::Transport("event loop not running".to_string())),
            );
            return;
        };

        let client = self.client.clone();
        let password = self.register_form.password.clone();
        self.auth_pending = true;
        self.form_message = Some(FormMessage::Info("Creating account...".to_string()));

        tokio::spawn(async move {
            let result = client.register(&username, &password).await;
            let _ = events.send(AppEvent::RegisterFinished { username, result });
        });
    }

    pub fn finish_register(&mut self, username: String, result: Result<String, AuthError>) {
        self.auth_pending = false;

        match result {
            Ok(message) => {
                self.register_form.clear();
                self.login_form.username = username;
                self.show_login();
                self.form_field = FormField::Password;
                self.form_message = Some(FormMessage::Info(format!("{} Please log in.", message)));
            }
            Err(err) => {
                tracing::warn!("registration failed: {}", err);
                self.form_message = Some(FormMessage::Error(err.to_string()));
            }
        }
    }

    pub fn logout(&mut self) {
        if self.session.is_streaming() {
            self.status_message = Some("Wait for the reply to finish before logging out".to_string());
            return;
        }

        if let Err(err) = self.credentials.clear() {
            tracing::warn!("Could not remove stored credentials: {:#}", err);
        }
        self.client.set_credential(None);
        // The next user must not see or resend this conversation
        self.session.reset();
        self.input_cursor = 0;
        self.chat_scroll = 0;
        self.status_message = None;
        self.session.set_user_name(GUEST_NAME);
        self.form_message = Some(FormMessage::Info("Logged out".to_string()));
        self.show_login();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rebecca_core::Credential;

    pub(crate) fn test_app(dir: &tempfile::TempDir, signed_in: bool) -> App {
        let store = CredentialStore::new(dir.path().join("credentials.json"));
        if signed_in {
            store
                .save(&Credential {
                    username: "ana".to_string(),
                    token: "tok".to_string(),
                })
                .unwrap();
        }

        let settings = Settings {
            api_url: "http://127.0.0.1:9".to_string(),
            model: "rebecca".to_string(),
            assistant_name: "Rebecca".to_string(),
            speech_enabled: false,
            player: AudioPlayer::default(),
            stall_timeout: None,
        };
        App::new(settings, store)
    }

    #[test]
    fn test_starts_on_login_without_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir, false);
        assert_eq!(app.screen, Screen::Login);
        assert!(app.signed_in_user().is_none());
    }

    #[test]
    fn test_starts_in_chat_with_stored_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir, true);
        assert_eq!(app.screen, Screen::Chat);
        assert_eq!(app.signed_in_user(), Some("ana"));
        assert_eq!(app.session.user_name(), "ana");
    }

    #[test]
    fn test_stream_events_follow_tail() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, true);
        app.chat_height = 2;
        app.chat_width = 40;

        app.session.input = "hi".to_string();
        app.session.begin_send().unwrap();
        app.apply_stream_event(StreamEvent::Chunk("line one\nline two\nline three".to_string()));

        // Prompt takes 3 lines, reply 5, typing indicator 1. Two rows are visible.
        assert_eq!(app.chat_scroll, 7);
    }

    #[test]
    fn test_completion_resets_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, true);

        app.session.input = "hi".to_string();
        app.session.begin_send().unwrap();
        app.session.input = "draft".to_string();
        app.input_cursor = 5;

        app.apply_stream_event(StreamEvent::Finished { malformed: 0 });

        assert_eq!(app.session.input, "");
        assert_eq!(app.input_cursor, 0);
    }

    #[test]
    fn test_register_form_cycles_three_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, false);
        app.show_register();

        app.next_form_field();
        app.next_form_field();
        assert_eq!(app.form_field, FormField::Confirm);
        assert!(app.on_last_form_field());

        app.next_form_field();
        assert_eq!(app.form_field, FormField::Username);
        app.prev_form_field();
        assert_eq!(app.form_field, FormField::Confirm);
    }

    #[test]
    fn test_mismatched_passwords_never_reach_server() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, false);
        app.show_register();
        app.register_form.username = "ana".to_string();
        app.register_form.password = "one".to_string();
        app.register_form.confirm_password = "two".to_string();

        app.submit_register();

        assert_eq!(
            app.form_message,
            Some(FormMessage::Error("Passwords do not match!".to_string()))
        );
        assert_eq!(app.screen, Screen::Register);
        assert!(!app.auth_pending);
    }

    #[test]
    fn test_scroll_counts_rows_like_the_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, true);
        app.chat_width = 10;
        app.chat_height = 1;

        // Exactly one row wide, and a reply with a trailing newline
        app.session.input = "0123456789".to_string();
        app.session.begin_send().unwrap();
        app.apply_stream_event(StreamEvent::Chunk("ok\n".to_string()));
        app.apply_stream_event(StreamEvent::Finished { malformed: 0 });
        app.scroll_chat_to_bottom();

        // Prompt 3 rows, reply 3 rows, one row visible
        assert_eq!(app.chat_scroll, 5);

        // A word that does not fit moves to the next row
        app.session.input = "aaaa bbbbbbb".to_string();
        app.session.begin_send().unwrap();
        app.apply_stream_event(StreamEvent::Finished { malformed: 0 });
        app.scroll_chat_to_bottom();
        assert_eq!(app.chat_scroll, 5 + 4);
    }

    #[tokio::test]
    async fn test_login_runs_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, false);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        app.attach_events(tx);
        app.login_form.username = "ana".to_string();
        app.login_form.password = "pw".to_string();

        app.submit_login();
        assert!(app.auth_pending);
        assert_eq!(app.screen, Screen::Login);

        // A second Enter while waiting does not start another request
        app.submit_login();

        // Nothing listens on the discard port
        let result = match rx.recv().await.unwrap() {
            AppEvent::LoginFinished(result) => result,
            other => panic!("expected login result, got {:?}", other),
        };
        assert!(matches!(result, Err(AuthError::Transport(_))));
        app.finish_login(result);

        assert!(!app.auth_pending);
        assert_eq!(app.screen, Screen::Login);
        assert!(matches!(app.form_message, Some(FormMessage::Error(_))));
        assert_eq!(app.login_form.password, "");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_finished_login_opens_chat_and_stores_credential() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, false);
        app.auth_pending = true;

        app.finish_login(Ok(Credential {
            username: "bo".to_string(),
            token: "tok-bo".to_string(),
        }));

        assert_eq!(app.screen, Screen::Chat);
        assert_eq!(app.signed_in_user(), Some("bo"));
        assert_eq!(app.session.user_name(), "bo");
        assert_eq!(app.credentials.load().unwrap().unwrap().token, "tok-bo");
    }

    #[test]
    fn test_finished_register_returns_to_login() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, false);
        app.show_register();

        app.finish_register("bo".to_string(), Ok("User registered successfully".to_string()));

        assert_eq!(app.screen, Screen::Login);
        assert_eq!(app.login_form.username, "bo");
        assert_eq!(app.form_field, FormField::Password);
        assert_eq!(
            app.form_message,
            Some(FormMessage::Info("User registered successfully Please log in.".to_string()))
        );
    }

    #[test]
    fn test_next_user_does_not_inherit_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, true);

        app.session.input = "secret question".to_string();
        app.session.begin_send().unwrap();
        app.apply_stream_event(StreamEvent::Chunk("secret answer".to_string()));
        app.apply_stream_event(StreamEvent::Finished { malformed: 0 });

        app.logout();
        assert!(app.session.messages().is_empty());

        app.finish_login(Ok(Credential {
            username: "bo".to_string(),
            token: "tok-bo".to_string(),
        }));
        app.session.input = "hi".to_string();
        let request = app.session.begin_send().unwrap();

        assert_eq!(app.session.messages().len(), 1);
        assert!(request.messages.is_empty());
    }

    #[test]
    fn test_logout_clears_stored_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, true);

        app.logout();

        assert_eq!(app.screen, Screen::Login);
        assert!(app.signed_in_user().is_none());
        assert!(app.credentials.load().unwrap().is_none());
    }
}
