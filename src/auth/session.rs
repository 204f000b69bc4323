// Session / auth context
//
// Owned by the composition root and shared by reference. Created in the loading state, then
// `initialize` reads the persisted user and database configuration. Login and user creation
// go through the backend with the persisted database configuration.

use log::{info, warn};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::{RemoteApi, RemoteError};
use crate::models::{DatabaseCredentials, NewUser, Role, User};
use crate::store::{CredentialStore, StoreError};
use crate::utils::busy::BusyFlag;
use crate::utils::validation;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Database configuration not found")]
    MissingConfiguration,
    #[error("You must be logged in")]
    NotAuthenticated,
    #[error("{0}")]
    Forbidden(String),
    #[error("Another request is still in progress")]
    Busy,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("Failed to update local session: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Loading,
    Anonymous,
    Authenticated,
}

#[derive(Debug, Default)]
struct SessionData {
    user: Option<User>,
    db_config: Option<DatabaseCredentials>,
}

pub struct Session {
    api: Arc<dyn RemoteApi>,
    store: CredentialStore,
    data: Mutex<SessionData>,
    loading: BusyFlag,
}

impl Session {
    /// A session in the loading state. Call [`initialize`](Self::initialize) before use.
    pub fn new(api: Arc<dyn RemoteApi>, store: CredentialStore) -> Self {
        Self {
            api,
            store,
            data: Mutex::new(SessionData::default()),
            loading: BusyFlag::new(true),
        }
    }

    fn data(&self) -> MutexGuard<'_, SessionData> {
        self.data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn initialize(&self) {
        let user = self.store.load_user().await;
        let db_config = self.store.load_database_config().await;
        info!(
            "[PHASE: session] [STEP: initialize] Session restored (user={}, configured={})",
            user.as_ref()
                .map(|u| format!("{}:{}", u.username, u.role))
                .unwrap_or_else(|| "none".to_string()),
            db_config.is_some()
        );
        {
            let mut data = self.data();
            data.user = user;
            data.db_config = db_config;
        }
        self.loading.clear();
    }

    pub fn status(&self) -> SessionStatus {
        if self.loading.is_set() {
            SessionStatus::Loading
        } else if self.data().user.is_some() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Anonymous
        }
    }

    pub fn user(&self) -> Option<User> {
        self.data().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.data().user.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    pub fn database_config(&self) -> Option<DatabaseCredentials> {
        self.data().db_config.clone()
    }

    pub fn is_configured(&self) -> bool {
        self.data().db_config.is_some()
    }

    /// Re-read the persisted database configuration. Login and user creation go through here so
    /// a record written or cleared after start-up is honoured.
    pub async fn refresh_database_config(&self) -> Option<DatabaseCredentials> {
        let db_config = self.store.load_database_config().await;
        self.data().db_config = db_config.clone();
        db_config
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User, SessionError> {
        let creds = self
            .refresh_database_config()
            .await
            .ok_or(SessionError::MissingConfiguration)?;
        validation::validate_login(username, password)
            .map_err(|e| SessionError::Validation(e.to_string()))?;
        let _loading = self.loading.try_acquire().ok_or(SessionError::Busy)?;

        let user = match self.api.login(&creds, username, password).await {
            Ok(u) => u,
            Err(e) => {
                warn!(
                    "[PHASE: session] [STEP: login] Login failed for {:?}: {}",
                    username, e
                );
                return Err(e.into());
            }
        };

        self.store.save_user(&user).await?;
        self.data().user = Some(user.clone());
        info!(
            "[PHASE: session] [STEP: login] Signed in as {:?} ({})",
            user.username, user.role
        );
        Ok(user)
    }

    /// Always succeeds; a failure to remove the persisted record is only logged.
    pub async fn logout(&self) {
        let previous = self.data().user.take();
        if let Err(e) = self.store.clear_user().await {
            warn!(
                "[PHASE: session] [STEP: logout] Failed to remove persisted user: {}",
                e
            );
        }
        info!(
            "[PHASE: session] [STEP: logout] Signed out {}",
            previous
                .map(|u| format!("{:?}", u.username))
                .unwrap_or_else(|| "(no user)".to_string())
        );
    }

    /// Create an admin or editor account. Does not change who is signed in.
    pub async fn create_user(&self, new_user: &NewUser) -> Result<(), SessionError> {
        let creds = self
            .refresh_database_config()
            .await
            .ok_or(SessionError::MissingConfiguration)?;
        let caller = self.user().ok_or(SessionError::NotAuthenticated)?;

        if !caller.role.can_manage_users() {
            return Err(SessionError::Forbidden(
                "You do not have permission to create users".to_string(),
            ));
        }
        if new_user.role == Role::Owner {
            return Err(SessionError::Forbidden(
                "Owner accounts can only be created during setup".to_string(),
            ));
        }
        if !caller.role.assignable_roles().contains(&new_user.role) {
            return Err(SessionError::Forbidden(format!(
                "Only an owner can create {} users",
                new_user.role
            )));
        }

        self.api.create_user(&creds, new_user).await?;
        info!(
            "[PHASE: session] [STEP: create_user] {} created {} user {:?}",
            caller.username, new_user.role, new_user.username
        );
        Ok(())
    }
}
