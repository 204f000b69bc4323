// Credential store
//
// Typed access to the two persisted records: the database configuration written once the
// wizard has created the database, and the signed-in user. Both are JSON text; anything
// that fails to parse is treated as absent.

use super::{KeyValueStore, StoreError};
use crate::models::{DatabaseCredentials, User};
use crate::security::secret_protector::SecretProtector;
use crate::utils::logging::mask_credentials;
use log::{info, warn};
use std::sync::Arc;

pub const DB_CONFIG_KEY: &str = "db_config";
pub const USER_KEY: &str = "user";

#[derive(Clone)]
pub struct CredentialStore {
    records: Arc<dyn KeyValueStore>,
    secrets: Arc<SecretProtector>,
}

impl CredentialStore {
    pub fn new(records: Arc<dyn KeyValueStore>, secrets: Arc<SecretProtector>) -> Self {
        Self { records, secrets }
    }

    pub async fn load_database_config(&self) -> Option<DatabaseCredentials> {
        let raw = match self.records.get(DB_CONFIG_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(
                    "[PHASE: storage] [STEP: load_db_config] Failed to read database config: {}",
                    e
                );
                return None;
            }
        };

        let mut creds: DatabaseCredentials = match serde_json::from_str(&raw) {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "[PHASE: storage] [STEP: load_db_config] Ignoring malformed database config: {}",
                    e
                );
                return None;
            }
        };

        match self.secrets.unseal(&creds.password).await {
            Ok(plain) => creds.password = plain,
            Err(e) => {
                warn!(
                    "[PHASE: storage] [STEP: load_db_config] Stored password could not be unsealed: {}",
                    e
                );
                return None;
            }
        }

        Some(creds)
    }

    /// Persist `creds` with the password sealed.
    pub async fn save_database_config(&self, creds: &DatabaseCredentials) -> Result<(), StoreError> {
        let mut stored = creds.clone();
        stored.password = self
            .secrets
            .seal(&creds.password)
            .await
            .map_err(|e| StoreError::Secret(e.to_string()))?;

        let raw = serde_json::to_string(&stored)?;
        self.records.set(DB_CONFIG_KEY, &raw).await?;
        info!(
            "[PHASE: storage] [STEP: save_db_config] Database configuration saved ({})",
            mask_credentials(creds)
        );
        Ok(())
    }

    pub async fn clear_database_config(&self) -> Result<(), StoreError> {
        self.records.remove(DB_CONFIG_KEY).await?;
        info!("[PHASE: storage] [STEP: clear_db_config] Database configuration removed");
        Ok(())
    }

    /// Signed-in user, if any. A corrupt record is deleted on the way out.
    pub async fn load_user(&self) -> Option<User> {
        let raw = match self.records.get(USER_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(
                    "[PHASE: storage] [STEP: load_user] Failed to read user record: {}",
                    e
                );
                return None;
            }
        };

        match serde_json::from_str::<User>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(
                    "[PHASE: storage] [STEP: load_user] Discarding malformed user record: {}",
                    e
                );
                if let Err(e) = self.records.remove(USER_KEY).await {
                    warn!(
                        "[PHASE: storage] [STEP: load_user] Failed to remove malformed user record: {}",
                        e
                    );
                }
                None
            }
        }
    }

    pub async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let raw = serde_json::to_string(user)?;
        self.records.set(USER_KEY, &raw).await
    }

    pub async fn clear_user(&self) -> Result<(), StoreError> {
        self.records.remove(USER_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::security::secret_protector::default_key_path;
    use crate::store::{FileKeyValueStore, MemoryKeyValueStore};

    fn memory_store(dir: &std::path::Path) -> (Arc<MemoryKeyValueStore>, CredentialStore) {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let secrets = Arc::new(SecretProtector::new(default_key_path(dir)));
        (kv.clone(), CredentialStore::new(kv, secrets))
    }

    fn sample_user() -> User {
        User {
            id: 1,
            username: "owner".into(),
            email: "owner@example.com".into(),
            role: Role::Owner,
        }
    }

    #[tokio::test]
    async fn database_config_round_trip_seals_password() {
        let dir = tempfile::tempdir().unwrap();
        let (kv, store) = memory_store(dir.path());
        let creds = DatabaseCredentials::new("localhost", 3306, "root", "pw-123").with_database("pm");

        store.save_database_config(&creds).await.unwrap();

        let raw = kv.get(DB_CONFIG_KEY).await.unwrap().unwrap();
        assert!(!raw.contains("pw-123"), "password stored in clear: {}", raw);
        assert!(raw.contains("\"database\":\"pm\""));

        assert_eq!(store.load_database_config().await, Some(creds));
    }

    #[tokio::test]
    async fn database_config_survives_a_new_store_instance() {
        let dir = tempfile::tempdir().unwrap();
        let records = dir.path().join("records");
        let creds = DatabaseCredentials::new("db", 3310, "app", "pw").with_database("pm");

        let first = CredentialStore::new(
            Arc::new(FileKeyValueStore::new(&records)),
            Arc::new(SecretProtector::new(default_key_path(dir.path()))),
        );
        first.save_database_config(&creds).await.unwrap();

        let second = CredentialStore::new(
            Arc::new(FileKeyValueStore::new(&records)),
            Arc::new(SecretProtector::new(default_key_path(dir.path()))),
        );
        assert_eq!(second.load_database_config().await, Some(creds));
    }

    #[tokio::test]
    async fn plaintext_password_record_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let (kv, store) = memory_store(dir.path());
        kv.set(
            DB_CONFIG_KEY,
            r#"{"host":"h","port":3306,"user":"u","password":"plain"}"#,
        )
        .await
        .unwrap();
        let loaded = store.load_database_config().await.unwrap();
        assert_eq!(loaded.password, "plain");
        assert_eq!(loaded.database, None);
    }

    #[tokio::test]
    async fn malformed_database_config_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let (kv, store) = memory_store(dir.path());
        kv.set(DB_CONFIG_KEY, "{not json").await.unwrap();
        assert_eq!(store.load_database_config().await, None);
    }

    #[tokio::test]
    async fn clear_database_config_removes_record() {
        let dir = tempfile::tempdir().unwrap();
        let (_kv, store) = memory_store(dir.path());
        store
            .save_database_config(&DatabaseCredentials::default())
            .await
            .unwrap();
        store.clear_database_config().await.unwrap();
        assert_eq!(store.load_database_config().await, None);
    }

    #[tokio::test]
    async fn malformed_user_record_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let (kv, store) = memory_store(dir.path());
        kv.set(USER_KEY, "garbage").await.unwrap();

        assert_eq!(store.load_user().await, None);
        assert_eq!(kv.get(USER_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn user_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let (_kv, store) = memory_store(dir.path());
        store.save_user(&sample_user()).await.unwrap();
        assert_eq!(store.load_user().await, Some(sample_user()));
        store.clear_user().await.unwrap();
        assert_eq!(store.load_user().await, None);
    }
}
