// API request models
// Bodies sent to the setup backend under `/api/*`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::responses::Role;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_DATABASE_NAME: &str = "project_manager";

// =========================
// Database connection
// =========================

/// Connection settings for the MySQL server the backend operates on.
///
/// The same record is sent with every backend call and, once the database exists,
/// persisted under the `db_config` key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseCredentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl DatabaseCredentials {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            database: None,
        }
    }

    /// Copy of these credentials targeting `database`.
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..self.clone()
        }
    }

    /// Name suggested on the create-database step.
    pub fn suggested_database_name(&self) -> &str {
        self.database
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(DEFAULT_DATABASE_NAME)
    }
}

impl Default for DatabaseCredentials {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT, DEFAULT_USER, "")
    }
}

// Password never reaches Debug output (logs, panics in tests).
impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

// =========================
// Accounts
// =========================

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerUser {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl fmt::Debug for OwnerUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub role: Role,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOwnerRequest<'a> {
    pub credentials: &'a DatabaseCredentials,
    pub owner_user: &'a OwnerUser,
}

#[derive(Debug, Serialize)]
pub struct CreateUserRequest<'a> {
    pub credentials: &'a DatabaseCredentials,
    pub user: &'a NewUser,
}

#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub credentials: &'a DatabaseCredentials,
    pub username: &'a str,
    pub password: &'a str,
}

// =========================
// Import
// =========================

/// A `.sql` dump read from disk, uploaded as the `sqlFile` multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFile {
    pub file_name: String,
    pub contents: Vec<u8>,
}

impl SqlFile {
    pub fn size_kb(&self) -> f64 {
        self.contents.len() as f64 / 1024.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_omit_absent_database() {
        let creds = DatabaseCredentials::new("db.local", 3307, "admin", "pw");
        let json = serde_json::to_value(&creds).unwrap();
        assert_eq!(json["host"], "db.local");
        assert_eq!(json["port"], 3307);
        assert!(json.get("database").is_none());

        let with_db = creds.with_database("pm");
        let json = serde_json::to_value(&with_db).unwrap();
        assert_eq!(json["database"], "pm");
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = DatabaseCredentials::new("h", 1, "u", "hunter22");
        let dbg = format!("{:?}", creds);
        assert!(!dbg.contains("hunter22"), "password leaked: {}", dbg);
    }

    #[test]
    fn suggested_database_name_falls_back_to_default() {
        let creds = DatabaseCredentials::default();
        assert_eq!(creds.suggested_database_name(), DEFAULT_DATABASE_NAME);
        assert_eq!(
            creds.with_database("crm").suggested_database_name(),
            "crm"
        );
        assert_eq!(
            creds.with_database("  ").suggested_database_name(),
            DEFAULT_DATABASE_NAME
        );
    }

    #[test]
    fn create_owner_body_uses_owner_user_key() {
        let creds = DatabaseCredentials::default();
        let owner = OwnerUser {
            username: "boss".into(),
            password: "password1".into(),
            email: "boss@example.com".into(),
        };
        let body = serde_json::to_value(CreateOwnerRequest {
            credentials: &creds,
            owner_user: &owner,
        })
        .unwrap();
        assert_eq!(body["ownerUser"]["username"], "boss");
        assert_eq!(body["credentials"]["user"], "root");
    }
}
