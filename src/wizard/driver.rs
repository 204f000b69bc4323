// Setup wizard driver
//
// Runs one backend operation per step and advances the state machine only on success. Every
// operation holds the busy flag for its whole duration; a second submission while busy is
// rejected without touching the backend.

use log::{error, info, warn};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{EngineStatus, Step, StepEvent, WizardError, WizardState};
use crate::api::RemoteApi;
use crate::models::{DatabaseCredentials, OwnerUser, SqlFile};
use crate::security::crypto::sha256_hex;
use crate::store::CredentialStore;
use crate::utils::busy::{BusyFlag, BusyGuard};
use crate::utils::logging::mask_credentials;
use crate::utils::validation;

pub struct SetupWizard {
    state: Mutex<WizardState>,
    api: Arc<dyn RemoteApi>,
    store: CredentialStore,
    busy: BusyFlag,
    run_id: String,
}

impl SetupWizard {
    pub fn new(api: Arc<dyn RemoteApi>, store: CredentialStore) -> Self {
        let run_id = uuid::Uuid::new_v4().to_string();
        info!(
            "[PHASE: wizard] [STEP: start] Setup wizard started (run_id={})",
            run_id
        );
        Self {
            state: Mutex::new(WizardState::new()),
            api,
            store,
            busy: BusyFlag::default(),
            run_id,
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> WizardState {
        self.lock_state().clone()
    }

    pub fn step(&self) -> Step {
        self.lock_state().step()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_set()
    }

    fn lock_state(&self) -> MutexGuard<'_, WizardState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self) -> Result<BusyGuard, WizardError> {
        self.busy.try_acquire().ok_or(WizardError::Busy)
    }

    fn expect_step(&self, expected: Step, event: &'static str) -> Result<(), WizardError> {
        let step = self.step();
        if step != expected {
            return Err(WizardError::InvalidTransition { step, event });
        }
        Ok(())
    }

    fn credentials(&self) -> Result<DatabaseCredentials, WizardError> {
        self.lock_state().require_credentials().cloned()
    }

    fn advance(&self, event: StepEvent) -> Result<Step, WizardError> {
        let name = event.name();
        let next = self.lock_state().apply(event)?;
        info!(
            "[PHASE: wizard] [STEP: {}] Now on step {} \"{}\" (run_id={})",
            name,
            next.index(),
            next,
            self.run_id
        );
        Ok(next)
    }

    /// Step 0. Query the engine; a failed query counts as `false`.
    pub async fn check_engine(&self) -> Result<EngineStatus, WizardError> {
        let _busy = self.begin()?;
        self.expect_step(Step::CheckEngine, "engine_checked")?;

        let installed = match self.api.check_installed().await {
            Ok(v) => v,
            Err(e) => {
                error!(
                    "[PHASE: wizard] [STEP: check_engine] Error checking MySQL installation: {}",
                    e
                );
                false
            }
        };

        let running = if installed {
            match self.api.check_running().await {
                Ok(v) => v,
                Err(e) => {
                    error!(
                        "[PHASE: wizard] [STEP: check_engine] Error checking MySQL status: {}",
                        e
                    );
                    false
                }
            }
        } else {
            false
        };

        info!(
            "[PHASE: wizard] [STEP: check_engine] MySQL installed={} running={}",
            installed, running
        );
        self.advance(StepEvent::EngineChecked { installed, running })?;
        Ok(EngineStatus { installed, running })
    }

    /// Step 1. Test the connection and keep the credentials on success.
    pub async fn connect(&self, creds: DatabaseCredentials) -> Result<Step, WizardError> {
        let _busy = self.begin()?;
        self.expect_step(Step::Connect, "connected")?;
        validation::validate_credentials(&creds)
            .map_err(|e| WizardError::Validation(e.to_string()))?;

        info!(
            "[PHASE: wizard] [STEP: connect] Testing connection ({})",
            mask_credentials(&creds)
        );
        self.api.test_connection(&creds).await?;
        self.advance(StepEvent::Connected(creds))
    }

    /// Step 2. Create the database, set up its schema, persist the credentials, then advance.
    pub async fn create_database(&self, database_name: &str) -> Result<Step, WizardError> {
        let _busy = self.begin()?;
        self.expect_step(Step::CreateDatabase, "database_provisioned")?;
        let creds = self.credentials()?;
        validation::validate_database_name(database_name)
            .map_err(|e| WizardError::Validation(e.to_string()))?;

        let provisioned = creds.with_database(database_name);
        info!(
            "[PHASE: wizard] [STEP: create_database] Creating database ({})",
            mask_credentials(&provisioned)
        );
        self.api.create_database(&provisioned).await?;
        self.api.setup_schema(&provisioned).await?;

        if let Err(e) = self.store.save_database_config(&provisioned).await {
            error!(
                "[PHASE: wizard] [STEP: create_database] Database created but configuration could not be saved: {}",
                e
            );
            return Err(e.into());
        }
        self.advance(StepEvent::DatabaseProvisioned(provisioned))
    }

    /// Step 3.
    pub async fn create_owner(&self, owner: &OwnerUser) -> Result<Step, WizardError> {
        let _busy = self.begin()?;
        self.expect_step(Step::CreateOwner, "owner_created")?;
        let creds = self.credentials()?;
        validation::validate_account(&owner.username, &owner.email, &owner.password, &owner.password)
            .map_err(|e| WizardError::Validation(e.to_string()))?;

        self.api.create_owner(&creds, owner).await?;
        info!(
            "[PHASE: wizard] [STEP: create_owner] Owner account {:?} created",
            owner.username
        );
        self.advance(StepEvent::OwnerCreated)
    }

    /// Step 4. Upload a `.sql` dump.
    pub async fn import_data(&self, path: &Path) -> Result<Step, WizardError> {
        let _busy = self.begin()?;
        self.expect_step(Step::ImportData, "data_imported")?;
        let creds = self.credentials()?;
        validation::validate_sql_file_name(path)
            .map_err(|e| WizardError::Validation(e.to_string()))?;

        let contents = match tokio::fs::read(path).await {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "[PHASE: wizard] [STEP: import_data] Cannot read import file {:?}: {}",
                    path, e
                );
                return Err(WizardError::Validation(
                    "Please select a SQL file to import".to_string(),
                ));
            }
        };
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("import.sql")
            .to_string();
        let file = SqlFile {
            file_name,
            contents,
        };
        info!(
            "[PHASE: wizard] [STEP: import_data] Importing {} ({} KB, sha256={})",
            file.file_name,
            file.size_kb(),
            sha256_hex(&file.contents)
        );

        self.api.import_sql(&creds, &file).await?;
        self.advance(StepEvent::DataImported)
    }

    /// Step 4, without data.
    pub async fn skip_import(&self) -> Result<Step, WizardError> {
        let _busy = self.begin()?;
        self.advance(StepEvent::ImportSkipped)
    }
}
