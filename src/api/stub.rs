// Stub backend for deterministic wizard/session tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{Operation, RemoteApi, RemoteError};
use crate::models::{DatabaseCredentials, NewUser, OwnerUser, Role, SqlFile, User};

/// Answers every call successfully unless told otherwise; counts calls per operation.
pub struct StubApi {
    pub installed: bool,
    pub running: bool,
    pub login_user: User,
    pub delay: Option<Duration>,
    failures: Mutex<HashMap<&'static str, RemoteError>>,
    calls: Mutex<HashMap<&'static str, u32>>,
    pub total_calls: AtomicU32,
    pub last_credentials: Mutex<Option<DatabaseCredentials>>,
    pub last_new_user: Mutex<Option<NewUser>>,
}

impl StubApi {
    pub fn new() -> Self {
        Self {
            installed: true,
            running: true,
            login_user: User {
                id: 1,
                username: "owner".into(),
                email: "owner@example.com".into(),
                role: Role::Owner,
            },
            delay: None,
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            total_calls: AtomicU32::new(0),
            last_credentials: Mutex::new(None),
            last_new_user: Mutex::new(None),
        }
    }

    pub fn with_engine(mut self, installed: bool, running: bool) -> Self {
        self.installed = installed;
        self.running = running;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_login_user(mut self, user: User) -> Self {
        self.login_user = user;
        self
    }

    /// Make `op` fail with a rejection carrying `message`.
    pub fn failing(self, op: Operation, message: &str) -> Self {
        self.failures.lock().unwrap().insert(
            op.step(),
            RemoteError::Rejected {
                code: 500,
                message: message.to_string(),
            },
        );
        self
    }

    pub fn calls(&self, op: Operation) -> u32 {
        self.calls.lock().unwrap().get(op.step()).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.total_calls.load(Ordering::SeqCst)
    }

    async fn record(
        &self,
        op: Operation,
        creds: Option<&DatabaseCredentials>,
    ) -> Result<(), RemoteError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(op.step()).or_insert(0) += 1;
        if let Some(c) = creds {
            *self.last_credentials.lock().unwrap() = Some(c.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.failures.lock().unwrap().get(op.step()) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteApi for StubApi {
    async fn check_installed(&self) -> Result<bool, RemoteError> {
        self.record(Operation::CheckInstalled, None).await?;
        Ok(self.installed)
    }

    async fn check_running(&self) -> Result<bool, RemoteError> {
        self.record(Operation::CheckRunning, None).await?;
        Ok(self.running)
    }

    async fn test_connection(&self, creds: &DatabaseCredentials) -> Result<(), RemoteError> {
        self.record(Operation::TestConnection, Some(creds)).await
    }

    async fn create_database(&self, creds: &DatabaseCredentials) -> Result<(), RemoteError> {
        self.record(Operation::CreateDatabase, Some(creds)).await
    }

    async fn setup_schema(&self, creds: &DatabaseCredentials) -> Result<(), RemoteError> {
        self.record(Operation::SetupSchema, Some(creds)).await
    }

    async fn create_owner(
        &self,
        creds: &DatabaseCredentials,
        _owner: &OwnerUser,
    ) -> Result<(), RemoteError> {
        self.record(Operation::CreateOwner, Some(creds)).await
    }

    async fn create_user(
        &self,
        creds: &DatabaseCredentials,
        user: &NewUser,
    ) -> Result<(), RemoteError> {
        *self.last_new_user.lock().unwrap() = Some(user.clone());
        self.record(Operation::CreateUser, Some(creds)).await
    }

    async fn import_sql(
        &self,
        creds: &DatabaseCredentials,
        _file: &SqlFile,
    ) -> Result<(), RemoteError> {
        self.record(Operation::ImportSql, Some(creds)).await
    }

    async fn login(
        &self,
        creds: &DatabaseCredentials,
        _username: &str,
        _password: &str,
    ) -> Result<User, RemoteError> {
        self.record(Operation::Login, Some(creds)).await?;
        Ok(self.login_user.clone())
    }
}
