//! Setup wizard.
//!
//! [`WizardState`] is the pure forward-only state machine; [`driver::SetupWizard`] performs
//! each step's backend call and feeds the outcome back in as a [`StepEvent`].

pub mod driver;

pub use driver::SetupWizard;

use std::fmt;

use crate::api::RemoteError;
use crate::models::DatabaseCredentials;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    CheckEngine,
    Connect,
    CreateDatabase,
    CreateOwner,
    ImportData,
    Complete,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::CheckEngine,
        Step::Connect,
        Step::CreateDatabase,
        Step::CreateOwner,
        Step::ImportData,
        Step::Complete,
    ];

    pub fn index(&self) -> usize {
        match self {
            Step::CheckEngine => 0,
            Step::Connect => 1,
            Step::CreateDatabase => 2,
            Step::CreateOwner => 3,
            Step::ImportData => 4,
            Step::Complete => 5,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Step::CheckEngine => "Check MySQL",
            Step::Connect => "Connect",
            Step::CreateDatabase => "Create Database",
            Step::CreateOwner => "Create Owner",
            Step::ImportData => "Import Data",
            Step::Complete => "Complete",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Step::Complete)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Successful outcome of a step's operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    EngineChecked { installed: bool, running: bool },
    Connected(DatabaseCredentials),
    DatabaseProvisioned(DatabaseCredentials),
    OwnerCreated,
    DataImported,
    ImportSkipped,
}

impl StepEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StepEvent::EngineChecked { .. } => "engine_checked",
            StepEvent::Connected(_) => "connected",
            StepEvent::DatabaseProvisioned(_) => "database_provisioned",
            StepEvent::OwnerCreated => "owner_created",
            StepEvent::DataImported => "data_imported",
            StepEvent::ImportSkipped => "import_skipped",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Cannot apply {event} while on step \"{step}\"")]
    InvalidTransition { step: Step, event: &'static str },
    #[error("Database credentials are missing on step \"{0}\"")]
    MissingCredentials(Step),
    #[error("Another operation is still in progress")]
    Busy,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("Failed to save database configuration: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatus {
    pub installed: bool,
    pub running: bool,
}

impl EngineStatus {
    pub fn ready(&self) -> bool {
        self.installed && self.running
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardState {
    step: Step,
    mysql_installed: bool,
    mysql_running: bool,
    credentials: Option<DatabaseCredentials>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardState {
    pub fn new() -> Self {
        Self {
            step: Step::CheckEngine,
            mysql_installed: false,
            mysql_running: false,
            credentials: None,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn engine_status(&self) -> EngineStatus {
        EngineStatus {
            installed: self.mysql_installed,
            running: self.mysql_running,
        }
    }

    pub fn credentials(&self) -> Option<&DatabaseCredentials> {
        self.credentials.as_ref()
    }

    /// Credentials required by steps 2-4.
    pub fn require_credentials(&self) -> Result<&DatabaseCredentials, WizardError> {
        self.credentials
            .as_ref()
            .ok_or(WizardError::MissingCredentials(self.step))
    }

    /// Apply `event` and return the resulting step. A rejected pairing leaves the state as it was.
    pub fn apply(&mut self, event: StepEvent) -> Result<Step, WizardError> {
        let next = match (self.step, event) {
            (Step::CheckEngine, StepEvent::EngineChecked { installed, running }) => {
                self.mysql_installed = installed;
                self.mysql_running = installed && running;
                if self.mysql_installed && self.mysql_running {
                    Step::Connect
                } else {
                    Step::CheckEngine
                }
            }
            (Step::Connect, StepEvent::Connected(creds)) => {
                self.credentials = Some(creds);
                Step::CreateDatabase
            }
            (Step::CreateDatabase, StepEvent::DatabaseProvisioned(creds)) => {
                self.require_credentials()?;
                self.credentials = Some(creds);
                Step::CreateOwner
            }
            (Step::CreateOwner, StepEvent::OwnerCreated) => {
                self.require_credentials()?;
                Step::ImportData
            }
            (Step::ImportData, StepEvent::DataImported | StepEvent::ImportSkipped) => {
                self.require_credentials()?;
                Step::Complete
            }
            (step, event) => {
                return Err(WizardError::InvalidTransition {
                    step,
                    event: event.name(),
                })
            }
        };
        self.step = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> DatabaseCredentials {
        DatabaseCredentials::new("localhost", 3306, "root", "pw")
    }

    fn at_import() -> WizardState {
        let mut s = WizardState::new();
        s.apply(StepEvent::EngineChecked {
            installed: true,
            running: true,
        })
        .unwrap();
        s.apply(StepEvent::Connected(creds())).unwrap();
        s.apply(StepEvent::DatabaseProvisioned(creds().with_database("pm")))
            .unwrap();
        s.apply(StepEvent::OwnerCreated).unwrap();
        s
    }

    #[test]
    fn step_indices_and_titles() {
        for (i, step) in Step::ALL.iter().enumerate() {
            assert_eq!(step.index(), i);
        }
        assert_eq!(Step::CheckEngine.to_string(), "Check MySQL");
        assert!(Step::Complete.is_terminal());
        assert!(!Step::ImportData.is_terminal());
    }

    #[test]
    fn engine_check_holds_until_both_flags() {
        let mut s = WizardState::new();
        assert_eq!(
            s.apply(StepEvent::EngineChecked {
                installed: true,
                running: false
            })
            .unwrap(),
            Step::CheckEngine
        );
        assert_eq!(
            s.engine_status(),
            EngineStatus {
                installed: true,
                running: false
            }
        );

        // Not installed means not running either.
        s.apply(StepEvent::EngineChecked {
            installed: false,
            running: true,
        })
        .unwrap();
        assert_eq!(s.engine_status(), EngineStatus::default());
        assert_eq!(s.step(), Step::CheckEngine);

        assert_eq!(
            s.apply(StepEvent::EngineChecked {
                installed: true,
                running: true
            })
            .unwrap(),
            Step::Connect
        );
    }

    #[test]
    fn connect_stores_credentials() {
        let mut s = WizardState::new();
        s.apply(StepEvent::EngineChecked {
            installed: true,
            running: true,
        })
        .unwrap();
        assert!(s.credentials().is_none());
        s.apply(StepEvent::Connected(creds())).unwrap();
        assert_eq!(s.step(), Step::CreateDatabase);
        assert_eq!(s.credentials(), Some(&creds()));
    }

    #[test]
    fn provisioning_replaces_credentials_with_database_name() {
        let mut s = WizardState::new();
        s.apply(StepEvent::EngineChecked {
            installed: true,
            running: true,
        })
        .unwrap();
        s.apply(StepEvent::Connected(creds())).unwrap();
        s.apply(StepEvent::DatabaseProvisioned(creds().with_database("pm")))
            .unwrap();
        assert_eq!(s.step(), Step::CreateOwner);
        assert_eq!(
            s.credentials().and_then(|c| c.database.as_deref()),
            Some("pm")
        );
    }

    #[test]
    fn import_or_skip_both_complete() {
        let mut imported = at_import();
        assert_eq!(imported.apply(StepEvent::DataImported).unwrap(), Step::Complete);

        let mut skipped = at_import();
        assert_eq!(skipped.apply(StepEvent::ImportSkipped).unwrap(), Step::Complete);
    }

    #[test]
    fn out_of_order_events_are_rejected_without_change() {
        let mut s = WizardState::new();
        let before = s.clone();
        let err = s.apply(StepEvent::OwnerCreated).unwrap_err();
        assert!(matches!(
            err,
            WizardError::InvalidTransition {
                step: Step::CheckEngine,
                event: "owner_created"
            }
        ));
        assert_eq!(s, before);

        let mut s = at_import();
        assert!(s.apply(StepEvent::Connected(creds())).is_err());
        assert_eq!(s.step(), Step::ImportData);
    }

    #[test]
    fn complete_is_terminal() {
        let mut s = at_import();
        s.apply(StepEvent::ImportSkipped).unwrap();
        for event in [
            StepEvent::EngineChecked {
                installed: true,
                running: true,
            },
            StepEvent::Connected(creds()),
            StepEvent::DatabaseProvisioned(creds()),
            StepEvent::OwnerCreated,
            StepEvent::DataImported,
            StepEvent::ImportSkipped,
        ] {
            assert!(s.apply(event).is_err());
            assert_eq!(s.step(), Step::Complete);
        }
    }
}
