// Remote operation client
//
// One call per setup-backend endpoint. The backend owns every MySQL operation; this side only
// sends the connection settings along and interprets the status code. A non-2xx body of the
// form `{ "message": "..." }` is surfaced verbatim, otherwise the operation's default text.

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::config::AppConfig;
use crate::models::requests::{CreateOwnerRequest, CreateUserRequest, LoginRequest};
use crate::models::responses::{ErrorBody, InstalledResponse, LoginResponse, RunningResponse};
use crate::models::{DatabaseCredentials, NewUser, OwnerUser, SqlFile, User};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Backend answered with a non-2xx status.
    #[error("{message}")]
    Rejected { code: u16, message: String },
    #[error("The request timed out")]
    Timeout,
    #[error("Could not reach the setup service: {0}")]
    Transport(String),
    #[error("Unexpected response from the setup service: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else if err.is_decode() {
            RemoteError::InvalidResponse(err.to_string())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

/// Backend endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CheckInstalled,
    CheckRunning,
    TestConnection,
    CreateDatabase,
    SetupSchema,
    CreateOwner,
    CreateUser,
    ImportSql,
    Login,
}

impl Operation {
    pub fn path(&self) -> &'static str {
        match self {
            Operation::CheckInstalled => "api/check-mysql-installed",
            Operation::CheckRunning => "api/check-mysql-running",
            Operation::TestConnection => "api/test-db-connection",
            Operation::CreateDatabase => "api/create-database",
            Operation::SetupSchema => "api/setup-schema",
            Operation::CreateOwner => "api/create-owner",
            Operation::CreateUser => "api/create-user",
            Operation::ImportSql => "api/import-sql",
            Operation::Login => "api/login",
        }
    }

    /// Shown when the backend rejects the call without a message.
    pub fn default_error(&self) -> &'static str {
        match self {
            Operation::CheckInstalled => "MySQL installation check failed",
            Operation::CheckRunning => "MySQL running check failed",
            Operation::TestConnection => "Database connection failed",
            Operation::CreateDatabase => "Failed to create database",
            Operation::SetupSchema => "Failed to setup database schema",
            Operation::CreateOwner => "Failed to create owner user",
            Operation::CreateUser => "User creation failed",
            Operation::ImportSql => "Failed to import SQL data",
            Operation::Login => "Login failed",
        }
    }

    /// Log step tag.
    pub fn step(&self) -> &'static str {
        match self {
            Operation::CheckInstalled => "check_installed",
            Operation::CheckRunning => "check_running",
            Operation::TestConnection => "test_connection",
            Operation::CreateDatabase => "create_database",
            Operation::SetupSchema => "setup_schema",
            Operation::CreateOwner => "create_owner",
            Operation::CreateUser => "create_user",
            Operation::ImportSql => "import_sql",
            Operation::Login => "login",
        }
    }
}

/// The setup backend, as seen by the wizard and the session.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn check_installed(&self) -> Result<bool, RemoteError>;
    async fn check_running(&self) -> Result<bool, RemoteError>;
    async fn test_connection(&self, creds: &DatabaseCredentials) -> Result<(), RemoteError>;
    async fn create_database(&self, creds: &DatabaseCredentials) -> Result<(), RemoteError>;
    async fn setup_schema(&self, creds: &DatabaseCredentials) -> Result<(), RemoteError>;
    async fn create_owner(
        &self,
        creds: &DatabaseCredentials,
        owner: &OwnerUser,
    ) -> Result<(), RemoteError>;
    async fn create_user(&self, creds: &DatabaseCredentials, user: &NewUser)
        -> Result<(), RemoteError>;
    async fn import_sql(&self, creds: &DatabaseCredentials, file: &SqlFile)
        -> Result<(), RemoteError>;
    async fn login(
        &self,
        creds: &DatabaseCredentials,
        username: &str,
        password: &str,
    ) -> Result<User, RemoteError>;
}

/// reqwest-backed [`RemoteApi`].
#[derive(Debug, Clone)]
pub struct HttpRemoteApi {
    client: reqwest::Client,
    base_url: Url,
    import_timeout: Duration,
}

impl HttpRemoteApi {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        import_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url.trim())
            .map_err(|e| anyhow::anyhow!("Invalid API base URL {:?}: {}", base_url, e))?;
        // Url::join replaces the last segment unless the path ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            import_timeout,
        })
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Self::new(
            &config.api_base_url,
            config.request_timeout(),
            config.import_timeout(),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, op: Operation) -> Result<Url, RemoteError> {
        self.base_url
            .join(op.path())
            .map_err(|e| RemoteError::Transport(format!("Invalid endpoint URL: {}", e)))
    }

    async fn get<T: DeserializeOwned>(&self, op: Operation) -> Result<T, RemoteError> {
        let url = self.endpoint(op)?;
        debug!("[PHASE: api] [STEP: {}] GET {}", op.step(), url);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;
        let body = read_success(op, resp).await?;
        decode(op, &body)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        op: Operation,
        body: &B,
    ) -> Result<String, RemoteError> {
        let url = self.endpoint(op)?;
        debug!("[PHASE: api] [STEP: {}] POST {}", op.step(), url);
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;
        read_success(op, resp).await
    }
}

/// Body text of a 2xx response, or the rejection built from a non-2xx one.
async fn read_success(op: Operation, resp: reqwest::Response) -> Result<String, RemoteError> {
    let status = resp.status();
    let text = resp.text().await.map_err(RemoteError::from_reqwest)?;

    if status.is_success() {
        return Ok(text);
    }

    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| op.default_error().to_string());

    warn!(
        "[PHASE: api] [STEP: {}] Backend rejected request: HTTP {} {}",
        op.step(),
        status.as_u16(),
        message
    );
    Err(RemoteError::Rejected {
        code: status.as_u16(),
        message,
    })
}

fn decode<T: DeserializeOwned>(op: Operation, body: &str) -> Result<T, RemoteError> {
    serde_json::from_str(body).map_err(|e| {
        warn!(
            "[PHASE: api] [STEP: {}] Could not decode response body: {}",
            op.step(),
            e
        );
        RemoteError::InvalidResponse(e.to_string())
    })
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn check_installed(&self) -> Result<bool, RemoteError> {
        let resp: InstalledResponse = self.get(Operation::CheckInstalled).await?;
        Ok(resp.installed)
    }

    async fn check_running(&self) -> Result<bool, RemoteError> {
        let resp: RunningResponse = self.get(Operation::CheckRunning).await?;
        Ok(resp.running)
    }

    async fn test_connection(&self, creds: &DatabaseCredentials) -> Result<(), RemoteError> {
        self.post_json(Operation::TestConnection, creds).await?;
        Ok(())
    }

    async fn create_database(&self, creds: &DatabaseCredentials) -> Result<(), RemoteError> {
        self.post_json(Operation::CreateDatabase, creds).await?;
        Ok(())
    }

    async fn setup_schema(&self, creds: &DatabaseCredentials) -> Result<(), RemoteError> {
        self.post_json(Operation::SetupSchema, creds).await?;
        Ok(())
    }

    async fn create_owner(
        &self,
        creds: &DatabaseCredentials,
        owner: &OwnerUser,
    ) -> Result<(), RemoteError> {
        let body = CreateOwnerRequest {
            credentials: creds,
            owner_user: owner,
        };
        self.post_json(Operation::CreateOwner, &body).await?;
        Ok(())
    }

    async fn create_user(
        &self,
        creds: &DatabaseCredentials,
        user: &NewUser,
    ) -> Result<(), RemoteError> {
        let body = CreateUserRequest {
            credentials: creds,
            user,
        };
        self.post_json(Operation::CreateUser, &body).await?;
        Ok(())
    }

    async fn import_sql(
        &self,
        creds: &DatabaseCredentials,
        file: &SqlFile,
    ) -> Result<(), RemoteError> {
        let op = Operation::ImportSql;
        let url = self.endpoint(op)?;
        let credentials_json = serde_json::to_string(creds)
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

        let part = Part::bytes(file.contents.clone())
            .file_name(file.file_name.clone())
            .mime_str("application/sql")
            .map_err(RemoteError::from_reqwest)?;
        let form = Form::new()
            .part("sqlFile", part)
            .text("credentials", credentials_json);

        info!(
            "[PHASE: api] [STEP: {}] Uploading {} ({} KB) to {}",
            op.step(),
            file.file_name,
            file.size_kb(),
            url
        );
        let resp = self
            .client
            .post(url)
            .multipart(form)
            .timeout(self.import_timeout)
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;
        read_success(op, resp).await?;
        Ok(())
    }

    async fn login(
        &self,
        creds: &DatabaseCredentials,
        username: &str,
        password: &str,
    ) -> Result<User, RemoteError> {
        let op = Operation::Login;
        let body = LoginRequest {
            credentials: creds,
            username,
            password,
        };
        let text = self.post_json(op, &body).await?;
        let resp: LoginResponse = decode(op, &text)?;
        Ok(resp.user)
    }
}
