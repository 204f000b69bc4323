//! Terminal UI.
//!
//! - Centered window titled "Project Manager Setup"
//! - Setup screens show a step list on the left; auth screens use the full width
//! - Bottom button row, modal confirmations
//!
//! Backend calls run on a tokio runtime and report back over a channel; the UI thread only
//! ever reads snapshots of the session and the wizard.
//!
//! Note: Logging is file-only in TUI mode (stdout logging is disabled) to avoid corrupting the terminal UI.

mod draw;
mod input;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use log::{info, warn};
use ratatui::backend::{CrosstermBackend, TestBackend};
use ratatui::buffer::Buffer;
use ratatui::Terminal;
use std::future::Future;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::RemoteApi;
use crate::auth::guard::{self, GuardDecision, Route};
use crate::auth::{Session, SessionStatus};
use crate::models::{DatabaseCredentials, NewUser, OwnerUser, Role, User};
use crate::store::CredentialStore;
use crate::utils::validation;
use crate::wizard::{EngineStatus, SetupWizard, Step, StepEvent, WizardState};
use input::Form;

// Field indices per form.
const CONN_HOST: usize = 0;
const CONN_PORT: usize = 1;
const CONN_USER: usize = 2;
const CONN_PASSWORD: usize = 3;
const CONN_DATABASE: usize = 4;
const ACCOUNT_USERNAME: usize = 0;
const ACCOUNT_EMAIL: usize = 1;
const ACCOUNT_PASSWORD: usize = 2;
const ACCOUNT_CONFIRM: usize = 3;
/// Role selector sits after the four account inputs on the create-user screen.
const ROLE_FIELD: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Loading,
    Setup(Step),
    Login,
    Dashboard,
    CreateUser,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    RefreshEngine,
    TestConnection,
    CreateDatabase,
    CreateOwner,
    ImportData,
    SkipImport,
    ContinueToLogin,
    Login,
    OpenSetup,
    OpenCreateUser,
    Settings,
    Logout,
    SubmitUser,
    BackToDashboard,
    Home,
    Quit,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::RefreshEngine => "Refresh",
            Action::TestConnection => "Test Connection",
            Action::CreateDatabase => "Create Database",
            Action::CreateOwner => "Create Owner",
            Action::ImportData => "Import Data",
            Action::SkipImport => "Skip",
            Action::ContinueToLogin => "Continue to Login",
            Action::Login => "Login",
            Action::OpenSetup => "Run Setup",
            Action::OpenCreateUser => "Create User",
            Action::Settings => "Settings",
            Action::Logout => "Logout",
            Action::SubmitUser => "Create User",
            Action::BackToDashboard => "Back",
            Action::Home => "Home",
            Action::Quit => "Quit",
        }
    }

    /// Label shown while the action is in flight.
    pub fn busy_label(&self) -> &'static str {
        match self {
            Action::RefreshEngine => "Checking...",
            Action::TestConnection => "Testing...",
            Action::CreateDatabase => "Creating...",
            Action::CreateOwner => "Creating...",
            Action::ImportData => "Importing...",
            Action::Login => "Logging in...",
            Action::SubmitUser => "Creating...",
            _ => "Working...",
        }
    }

    fn is_local(&self) -> bool {
        matches!(
            self,
            Action::OpenSetup
                | Action::OpenCreateUser
                | Action::Settings
                | Action::BackToDashboard
                | Action::Home
                | Action::Quit
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FocusTarget {
    Field(usize),
    Button(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Modal {
    ConfirmQuit,
    Message { title: String, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Notice {
    Info(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionView {
    pub status: SessionStatus,
    pub user: Option<User>,
    pub configured: bool,
    pub database: Option<String>,
}

impl SessionView {
    fn loading() -> Self {
        Self {
            status: SessionStatus::Loading,
            user: None,
            configured: false,
            database: None,
        }
    }

    fn of(session: &Session) -> Self {
        let db = session.database_config();
        Self {
            status: session.status(),
            user: session.user(),
            configured: db.is_some(),
            database: db.and_then(|c| c.database),
        }
    }

    fn is_loading(&self) -> bool {
        self.status == SessionStatus::Loading
    }
}

enum UiMsg {
    SessionReady,
    EngineChecked(std::result::Result<EngineStatus, String>),
    WizardStep(std::result::Result<Step, String>),
    LoginFinished(std::result::Result<User, String>),
    LoggedOut,
    UserCreated(std::result::Result<String, String>),
    ConfigRefreshed,
}

/// What the UI needs to talk to the backend.
pub struct AppContext {
    pub api: Arc<dyn RemoteApi>,
    pub store: CredentialStore,
}

struct Services {
    runtime: tokio::runtime::Handle,
    tx: mpsc::Sender<UiMsg>,
    ctx: AppContext,
    session: Arc<Session>,
    wizard: Option<Arc<SetupWizard>>,
}

pub(crate) struct App {
    pub route: Route,
    pub session_view: SessionView,
    pub wizard_view: WizardState,
    pub engine_checked: bool,
    pub pending: Option<Action>,
    pub focus: FocusTarget,
    pub modal: Option<Modal>,
    pub notice: Option<Notice>,
    pub quit: bool,

    pub connection: Form,
    pub database: Form,
    pub owner: Form,
    pub import: Form,
    pub login: Form,
    pub new_user: Form,
    pub new_user_role: Role,

    services: Option<Services>,
}

fn connection_form(creds: &DatabaseCredentials) -> Form {
    let port = creds.port.to_string();
    Form::new(&[
        ("Host", creds.host.as_str(), false),
        ("Port", port.as_str(), false),
        ("Username", creds.user.as_str(), false),
        ("Password", creds.password.as_str(), true),
        ("Database (optional)", creds.database.as_deref().unwrap_or(""), false),
    ])
}

fn account_form() -> Form {
    Form::new(&[
        ("Username", "", false),
        ("Email", "", false),
        ("Password", "", true),
        ("Confirm Password", "", true),
    ])
}

impl App {
    fn new(services: Option<Services>) -> Self {
        Self {
            route: Route::Index,
            session_view: SessionView::loading(),
            wizard_view: WizardState::new(),
            engine_checked: false,
            pending: None,
            focus: FocusTarget::Button(0),
            modal: None,
            notice: None,
            quit: false,
            connection: connection_form(&DatabaseCredentials::default()),
            database: Form::new(&[(
                "Database Name",
                crate::models::requests::DEFAULT_DATABASE_NAME,
                false,
            )]),
            owner: account_form(),
            import: Form::new(&[("SQL file", "", false)]),
            login: Form::new(&[("Username", "", false), ("Password", "", true)]),
            new_user: account_form(),
            new_user_role: Role::Editor,
            services,
        }
    }

    pub fn screen(&self) -> Screen {
        match self.route {
            Route::Index => Screen::Loading,
            Route::Setup => Screen::Setup(self.wizard_view.step()),
            Route::Login => Screen::Login,
            Route::NotFound => Screen::NotFound,
            Route::Dashboard | Route::CreateUser => match guard::resolve(
                self.session_view.is_loading(),
                self.session_view.user.as_ref(),
                self.route,
            ) {
                GuardDecision::Render(Route::CreateUser) => Screen::CreateUser,
                GuardDecision::Render(_) => Screen::Dashboard,
                GuardDecision::Wait | GuardDecision::Redirect(_) => Screen::Loading,
            },
        }
    }

    pub fn buttons(&self) -> Vec<Action> {
        match self.screen() {
            Screen::Loading => vec![Action::Quit],
            Screen::Setup(Step::CheckEngine) => vec![Action::RefreshEngine, Action::Quit],
            Screen::Setup(Step::Connect) => vec![Action::TestConnection, Action::Quit],
            Screen::Setup(Step::CreateDatabase) => vec![Action::CreateDatabase, Action::Quit],
            Screen::Setup(Step::CreateOwner) => vec![Action::CreateOwner, Action::Quit],
            Screen::Setup(Step::ImportData) => {
                vec![Action::ImportData, Action::SkipImport, Action::Quit]
            }
            Screen::Setup(Step::Complete) => vec![Action::ContinueToLogin],
            Screen::Login => {
                let mut b = vec![Action::Login];
                if !self.session_view.configured {
                    b.push(Action::OpenSetup);
                }
                b.push(Action::Quit);
                b
            }
            Screen::Dashboard => {
                let mut b = Vec::new();
                if let Some(user) = &self.session_view.user {
                    if user.role.can_manage_users() {
                        b.push(Action::OpenCreateUser);
                    }
                    if user.role == Role::Owner {
                        b.push(Action::Settings);
                    }
                }
                b.push(Action::Logout);
                b.push(Action::Quit);
                b
            }
            Screen::CreateUser => vec![Action::SubmitUser, Action::BackToDashboard],
            Screen::NotFound => vec![Action::Home],
        }
    }

    pub fn field_count(&self) -> usize {
        match self.screen() {
            Screen::Setup(Step::Connect) => self.connection.len(),
            Screen::Setup(Step::CreateDatabase) => self.database.len(),
            Screen::Setup(Step::CreateOwner) => self.owner.len(),
            Screen::Setup(Step::ImportData) => self.import.len(),
            Screen::Login => self.login.len(),
            Screen::CreateUser => self.new_user.len() + 1,
            _ => 0,
        }
    }

    pub fn action_enabled(&self, action: Action) -> bool {
        action.is_local() || self.pending.is_none()
    }

    fn active_form_mut(&mut self) -> Option<&mut Form> {
        match self.screen() {
            Screen::Setup(Step::Connect) => Some(&mut self.connection),
            Screen::Setup(Step::CreateDatabase) => Some(&mut self.database),
            Screen::Setup(Step::CreateOwner) => Some(&mut self.owner),
            Screen::Setup(Step::ImportData) => Some(&mut self.import),
            Screen::Login => Some(&mut self.login),
            Screen::CreateUser => Some(&mut self.new_user),
            _ => None,
        }
    }

    fn reset_focus(&mut self) {
        self.focus = if self.field_count() > 0 {
            FocusTarget::Field(0)
        } else {
            FocusTarget::Button(0)
        };
    }

    fn focus_slots(&self) -> usize {
        self.field_count() + self.buttons().len()
    }

    fn focus_index(&self) -> usize {
        match self.focus {
            FocusTarget::Field(i) => i,
            FocusTarget::Button(i) => self.field_count() + i,
        }
    }

    fn set_focus_index(&mut self, idx: usize) {
        let fields = self.field_count();
        self.focus = if idx < fields {
            FocusTarget::Field(idx)
        } else {
            FocusTarget::Button(idx - fields)
        };
    }

    fn focus_next(&mut self) {
        let slots = self.focus_slots().max(1);
        self.set_focus_index((self.focus_index() + 1) % slots);
    }

    fn focus_prev(&mut self) {
        let slots = self.focus_slots().max(1);
        self.set_focus_index((self.focus_index() + slots - 1) % slots);
    }

    // ---------------------------------------------------------------------
    // Navigation
    // ---------------------------------------------------------------------

    fn refresh_views(&mut self) {
        if let Some(s) = &self.services {
            self.session_view = SessionView::of(&s.session);
            if let Some(w) = &s.wizard {
                self.wizard_view = w.state();
            }
        }
    }

    fn navigate(&mut self, route: Route) {
        self.refresh_views();
        let loading = self.session_view.is_loading();
        let user = self.session_view.user.clone();

        let target = match route {
            Route::Index if loading => Route::Index,
            Route::Index => guard::landing(user.as_ref(), self.session_view.configured),
            Route::Login => guard::login_redirect(user.as_ref()).unwrap_or(Route::Login),
            other => match guard::resolve(loading, user.as_ref(), other) {
                GuardDecision::Wait => other,
                GuardDecision::Render(r) => r,
                GuardDecision::Redirect(r) => {
                    info!(
                        "[PHASE: tui] [STEP: navigate] {} redirected to {}",
                        other.path(),
                        r.path()
                    );
                    return self.navigate(r);
                }
            },
        };

        let entering = target != self.route;
        if entering {
            info!(
                "[PHASE: tui] [STEP: navigate] {} -> {}",
                self.route.path(),
                target.path()
            );
        }
        self.route = target;
        if entering && target == Route::Setup {
            self.enter_setup();
        }
        if entering {
            self.reset_focus();
        }
    }

    /// Fresh wizard on each entry; the engine check starts immediately.
    fn enter_setup(&mut self) {
        let Some(s) = &mut self.services else {
            return;
        };
        let wizard = Arc::new(SetupWizard::new(s.ctx.api.clone(), s.ctx.store.clone()));
        self.wizard_view = wizard.state();
        s.wizard = Some(wizard);
        self.engine_checked = false;
        self.connection = connection_form(&DatabaseCredentials::default());
        self.owner = account_form();
        self.import = Form::new(&[("SQL file", "", false)]);
        self.perform(Action::RefreshEngine);
    }

    // ---------------------------------------------------------------------
    // Backend dispatch
    // ---------------------------------------------------------------------

    fn dispatch<F>(&mut self, action: Action, work: F)
    where
        F: Future<Output = UiMsg> + Send + 'static,
    {
        let Some(s) = &self.services else {
            return;
        };
        self.pending = Some(action);
        self.notice = None;
        let tx = s.tx.clone();
        s.runtime.spawn(async move {
            let msg = work.await;
            let _ = tx.send(msg);
        });
    }

    fn wizard(&self) -> Option<Arc<SetupWizard>> {
        self.services.as_ref().and_then(|s| s.wizard.clone())
    }

    fn session(&self) -> Option<Arc<Session>> {
        self.services.as_ref().map(|s| s.session.clone())
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.notice = Some(Notice::Error(message.into()));
    }

    fn perform(&mut self, action: Action) {
        if !self.action_enabled(action) {
            return;
        }

        match action {
            Action::Quit => self.quit = true,
            Action::Home => self.navigate(Route::Index),
            Action::OpenSetup => self.navigate(Route::Setup),
            Action::OpenCreateUser => self.navigate(Route::CreateUser),
            Action::BackToDashboard => self.navigate(Route::Dashboard),
            Action::Settings => {
                self.modal = Some(Modal::Message {
                    title: "Settings".to_string(),
                    body: "System settings are not available yet.".to_string(),
                });
            }
            Action::RefreshEngine => {
                if let Some(w) = self.wizard() {
                    self.dispatch(action, async move {
                        UiMsg::EngineChecked(w.check_engine().await.map_err(|e| e.to_string()))
                    });
                }
            }
            Action::TestConnection => {
                let port = match validation::parse_port(self.connection.value(CONN_PORT)) {
                    Ok(p) => p,
                    Err(e) => return self.fail(e.to_string()),
                };
                let mut creds = DatabaseCredentials::new(
                    self.connection.value(CONN_HOST).trim(),
                    port,
                    self.connection.value(CONN_USER).trim(),
                    self.connection.value(CONN_PASSWORD),
                );
                let database = self.connection.value(CONN_DATABASE).trim();
                if !database.is_empty() {
                    creds = creds.with_database(database);
                }
                if let Some(w) = self.wizard() {
                    self.dispatch(action, async move {
                        UiMsg::WizardStep(w.connect(creds).await.map_err(|e| e.to_string()))
                    });
                }
            }
            Action::CreateDatabase => {
                let name = self.database.value(0).trim().to_string();
                if let Some(w) = self.wizard() {
                    self.dispatch(action, async move {
                        UiMsg::WizardStep(w.create_database(&name).await.map_err(|e| e.to_string()))
                    });
                }
            }
            Action::CreateOwner => {
                if let Err(e) = validation::validate_account(
                    self.owner.value(ACCOUNT_USERNAME),
                    self.owner.value(ACCOUNT_EMAIL),
                    self.owner.value(ACCOUNT_PASSWORD),
                    self.owner.value(ACCOUNT_CONFIRM),
                ) {
                    return self.fail(e.to_string());
                }
                let owner = OwnerUser {
                    username: self.owner.value(ACCOUNT_USERNAME).trim().to_string(),
                    password: self.owner.value(ACCOUNT_PASSWORD).to_string(),
                    email: self.owner.value(ACCOUNT_EMAIL).trim().to_string(),
                };
                if let Some(w) = self.wizard() {
                    self.dispatch(action, async move {
                        UiMsg::WizardStep(w.create_owner(&owner).await.map_err(|e| e.to_string()))
                    });
                }
            }
            Action::ImportData => {
                let raw = self.import.value(0).trim().to_string();
                if raw.is_empty() {
                    return self.fail("Please select a SQL file to import");
                }
                let path = PathBuf::from(raw);
                if let Some(w) = self.wizard() {
                    self.dispatch(action, async move {
                        UiMsg::WizardStep(w.import_data(&path).await.map_err(|e| e.to_string()))
                    });
                }
            }
            Action::SkipImport => {
                if let Some(w) = self.wizard() {
                    self.dispatch(action, async move {
                        UiMsg::WizardStep(w.skip_import().await.map_err(|e| e.to_string()))
                    });
                }
            }
            Action::ContinueToLogin => {
                if let Some(session) = self.session() {
                    self.dispatch(action, async move {
                        session.refresh_database_config().await;
                        UiMsg::ConfigRefreshed
                    });
                }
            }
            Action::Login => {
                let username = self.login.value(0).trim().to_string();
                let password = self.login.value(1).to_string();
                if let Err(e) = validation::validate_login(&username, &password) {
                    return self.fail(e.to_string());
                }
                if let Some(session) = self.session() {
                    self.dispatch(action, async move {
                        UiMsg::LoginFinished(
                            session
                                .login(&username, &password)
                                .await
                                .map_err(|e| e.to_string()),
                        )
                    });
                }
            }
            Action::Logout => {
                if let Some(session) = self.session() {
                    self.dispatch(action, async move {
                        session.logout().await;
                        UiMsg::LoggedOut
                    });
                }
            }
            Action::SubmitUser => {
                if let Err(e) = validation::validate_account(
                    self.new_user.value(ACCOUNT_USERNAME),
                    self.new_user.value(ACCOUNT_EMAIL),
                    self.new_user.value(ACCOUNT_PASSWORD),
                    self.new_user.value(ACCOUNT_CONFIRM),
                ) {
                    return self.fail(e.to_string());
                }
                let new_user = NewUser {
                    username: self.new_user.value(ACCOUNT_USERNAME).trim().to_string(),
                    password: self.new_user.value(ACCOUNT_PASSWORD).to_string(),
                    email: self.new_user.value(ACCOUNT_EMAIL).trim().to_string(),
                    role: self.new_user_role,
                };
                if let Some(session) = self.session() {
                    self.dispatch(action, async move {
                        let username = new_user.username.clone();
                        UiMsg::UserCreated(
                            session
                                .create_user(&new_user)
                                .await
                                .map(|_| username)
                                .map_err(|e| e.to_string()),
                        )
                    });
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Results
    // ---------------------------------------------------------------------

    fn drain_messages(&mut self, rx: &mpsc::Receiver<UiMsg>) {
        while let Ok(msg) = rx.try_recv() {
            self.pending = None;
            self.refresh_views();
            match msg {
                UiMsg::SessionReady => {
                    let route = self.route;
                    self.route = Route::Index;
                    self.navigate(route);
                }
                UiMsg::EngineChecked(result) => {
                    self.engine_checked = true;
                    match result {
                        Ok(status) if status.ready() => {
                            self.notice =
                                Some(Notice::Info("MySQL is installed and running.".to_string()));
                            self.reset_focus();
                        }
                        Ok(status) if !status.installed => self.fail(
                            "MySQL Not Installed. Install MySQL Server, then press Refresh.",
                        ),
                        Ok(_) => self.fail(
                            "MySQL Service Not Running. Start the MySQL service, then press Refresh.",
                        ),
                        Err(e) => self.fail(e),
                    }
                }
                UiMsg::WizardStep(Ok(step)) => {
                    let message = match step {
                        Step::CreateDatabase => "Connection successful",
                        Step::CreateOwner => "Database created and schema set up successfully",
                        Step::ImportData => "Owner account created successfully",
                        Step::Complete => "Setup complete",
                        Step::CheckEngine | Step::Connect => "",
                    };
                    self.notice = (!message.is_empty()).then(|| Notice::Info(message.to_string()));
                    if step == Step::CreateDatabase {
                        if let Some(c) = self.wizard_view.credentials() {
                            let suggested = c.suggested_database_name().to_string();
                            self.database.set(0, suggested);
                        }
                    }
                    if step == Step::ImportData {
                        self.owner.clear_secrets();
                    }
                    self.reset_focus();
                }
                UiMsg::WizardStep(Err(e)) => self.fail(e),
                UiMsg::LoginFinished(Ok(user)) => {
                    self.login.clear_secrets();
                    self.navigate(Route::Dashboard);
                    self.notice = Some(Notice::Info(format!("Welcome back, {}!", user.username)));
                }
                UiMsg::LoginFinished(Err(e)) => self.fail(e),
                UiMsg::LoggedOut => {
                    self.navigate(Route::Login);
                    self.notice = Some(Notice::Info("Logged out successfully".to_string()));
                }
                UiMsg::UserCreated(Ok(username)) => {
                    self.new_user = account_form();
                    self.new_user_role = Role::Editor;
                    self.navigate(Route::Dashboard);
                    self.modal = Some(Modal::Message {
                        title: "User created".to_string(),
                        body: format!("User {} created successfully.", username),
                    });
                }
                UiMsg::UserCreated(Err(e)) => self.fail(e),
                UiMsg::ConfigRefreshed => {
                    if !self.session_view.configured {
                        warn!(
                            "[PHASE: tui] [STEP: continue_to_login] No database configuration found after setup"
                        );
                    }
                    self.navigate(Route::Login);
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Keys
    // ---------------------------------------------------------------------

    fn cycle_role(&mut self) {
        let allowed = self
            .session_view
            .user
            .as_ref()
            .map(|u| u.role.assignable_roles())
            .unwrap_or(&[]);
        if allowed.is_empty() {
            return;
        }
        let pos = allowed
            .iter()
            .position(|r| *r == self.new_user_role)
            .map(|i| (i + 1) % allowed.len())
            .unwrap_or(0);
        self.new_user_role = allowed[pos];
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.quit = true;
            return;
        }

        if let Some(modal) = self.modal.clone() {
            match modal {
                Modal::ConfirmQuit => match key.code {
                    KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                        self.modal = None;
                        self.quit = true;
                    }
                    KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => self.modal = None,
                    _ => {}
                },
                Modal::Message { .. } => {
                    if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                        self.modal = None;
                    }
                }
            }
            return;
        }

        match key.code {
            KeyCode::Esc => {
                self.modal = Some(Modal::ConfirmQuit);
                return;
            }
            KeyCode::Tab | KeyCode::Down => {
                self.focus_next();
                return;
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus_prev();
                return;
            }
            _ => {}
        }

        match self.focus {
            FocusTarget::Field(i) => {
                if self.screen() == Screen::CreateUser && i == ROLE_FIELD {
                    match key.code {
                        KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') => self.cycle_role(),
                        KeyCode::Enter => self.perform(Action::SubmitUser),
                        _ => {}
                    }
                    return;
                }
                if key.code == KeyCode::Enter {
                    if i + 1 >= self.field_count() {
                        if let Some(primary) = self.buttons().first().copied() {
                            self.perform(primary);
                        }
                    } else {
                        self.focus_next();
                    }
                    return;
                }
                if let Some(input) = self.active_form_mut().and_then(|f| f.input_mut(i)) {
                    input.handle_key(key.code);
                }
            }
            FocusTarget::Button(i) => {
                let buttons = self.buttons();
                match key.code {
                    KeyCode::Left if !buttons.is_empty() => {
                        self.focus = FocusTarget::Button((i + buttons.len() - 1) % buttons.len());
                    }
                    KeyCode::Right if !buttons.is_empty() => {
                        self.focus = FocusTarget::Button((i + 1) % buttons.len());
                    }
                    KeyCode::Enter | KeyCode::Char(' ') => {
                        if let Some(action) = buttons.get(i).copied() {
                            self.perform(action);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Preview states for the smoke renderer
    // ---------------------------------------------------------------------

    fn preview(target: &str) -> Self {
        let mut app = App::new(None);
        let sample_creds = DatabaseCredentials::default().with_database("project_manager");
        let owner = User {
            id: 1,
            username: "owner".to_string(),
            email: "owner@example.com".to_string(),
            role: Role::Owner,
        };

        let setup_events: &[StepEvent] = &[
            StepEvent::EngineChecked {
                installed: true,
                running: true,
            },
            StepEvent::Connected(DatabaseCredentials::default()),
            StepEvent::DatabaseProvisioned(sample_creds.clone()),
            StepEvent::OwnerCreated,
            StepEvent::ImportSkipped,
        ];
        let setup_depth = match target {
            "check" => Some(0),
            "connect" => Some(1),
            "database" => Some(2),
            "owner" => Some(3),
            "import" => Some(4),
            "complete" => Some(5),
            _ => None,
        };

        if let Some(depth) = setup_depth {
            app.session_view = SessionView {
                status: SessionStatus::Anonymous,
                user: None,
                configured: depth >= 3,
                database: None,
            };
            app.route = Route::Setup;
            if depth == 0 {
                let _ = app.wizard_view.apply(StepEvent::EngineChecked {
                    installed: true,
                    running: false,
                });
                app.engine_checked = true;
                app.notice = Some(Notice::Error(
                    "MySQL Service Not Running. Start the MySQL service, then press Refresh."
                        .to_string(),
                ));
            }
            for event in setup_events.iter().take(depth) {
                let _ = app.wizard_view.apply(event.clone());
            }
            app.engine_checked = true;
            app.reset_focus();
            return app;
        }

        match target {
            "index" => {}
            "login" => {
                app.session_view = SessionView {
                    status: SessionStatus::Anonymous,
                    user: None,
                    configured: true,
                    database: Some("project_manager".to_string()),
                };
                app.route = Route::Login;
            }
            "dashboard" | "create-user" => {
                app.session_view = SessionView {
                    status: SessionStatus::Authenticated,
                    user: Some(owner),
                    configured: true,
                    database: Some("project_manager".to_string()),
                };
                app.route = if target == "dashboard" {
                    Route::Dashboard
                } else {
                    Route::CreateUser
                };
            }
            _ => app.route = Route::NotFound,
        }
        app.reset_focus();
        app
    }
}

pub fn run(ctx: AppContext) -> Result<()> {
    info!("[PHASE: tui] [STEP: start] Starting TUI");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let mut terminal = setup_terminal()?;
    let result = run_loop(&mut terminal, &runtime, ctx);
    restore_terminal(&mut terminal)?;

    info!("[PHASE: tui] [STEP: exit] TUI closed");
    result
}

/// Render one frame of `target` into an in-memory buffer.
pub(crate) fn render_preview(target: &str, width: u16, height: u16) -> Result<Buffer> {
    let app = App::preview(target);
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend)?;
    terminal.draw(|f| draw::draw(f.size(), f, &app))?;
    Ok(terminal.backend().buffer().clone())
}

pub fn smoke(target: &str) -> Result<()> {
    info!(
        "[PHASE: tui] [STEP: smoke] Rendering single-frame TUI smoke target={}",
        target
    );

    let t = target.trim().to_ascii_lowercase();
    render_preview(&t, 100, 30)?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    runtime: &tokio::runtime::Runtime,
    ctx: AppContext,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let (tx, rx) = mpsc::channel::<UiMsg>();

    let session = Arc::new(Session::new(ctx.api.clone(), ctx.store.clone()));
    {
        let session = session.clone();
        let tx = tx.clone();
        runtime.spawn(async move {
            session.initialize().await;
            let _ = tx.send(UiMsg::SessionReady);
        });
    }

    let mut app = App::new(Some(Services {
        runtime: runtime.handle().clone(),
        tx,
        ctx,
        session,
        wizard: None,
    }));

    while !app.quit {
        app.drain_messages(&rx);
        terminal.draw(|f| draw::draw(f.size(), f, &app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key),
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }

    Ok(())
}
