// API response models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Account role, serialized lowercase on the wire and in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Editor,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Owner, Role::Admin, Role::Editor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Editor => "editor",
        }
    }

    /// Roles allowed to open the account-creation screen.
    pub fn can_manage_users(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    /// Roles this role may hand out through the generic create-user path.
    pub fn assignable_roles(&self) -> &'static [Role] {
        match self {
            Role::Owner => &[Role::Admin, Role::Editor],
            Role::Admin => &[Role::Editor],
            Role::Editor => &[],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstalledResponse {
    pub installed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunningResponse {
    pub running: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub user: User,
}

/// Failure body returned with any non-2xx status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_lowercase() {
        let user: User = serde_json::from_str(
            r#"{"id":7,"username":"ann","email":"ann@example.com","role":"admin"}"#,
        )
        .unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(serde_json::to_string(&Role::Editor).unwrap(), "\"editor\"");
    }

    #[test]
    fn unknown_role_is_rejected() {
        let parsed = serde_json::from_str::<User>(
            r#"{"id":1,"username":"x","email":"x@example.com","role":"root"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn only_owner_hands_out_admin() {
        assert!(Role::Owner.assignable_roles().contains(&Role::Admin));
        assert!(!Role::Admin.assignable_roles().contains(&Role::Admin));
        assert!(Role::Editor.assignable_roles().is_empty());
        assert!(Role::ALL
            .iter()
            .all(|r| !r.assignable_roles().contains(&Role::Owner)));
    }
}
