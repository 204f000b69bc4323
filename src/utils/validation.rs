// Input validation utilities
//
// Form checks that run before any backend call. Messages are shown to the operator as-is.

use anyhow::Result;
use regex::Regex;
use std::path::Path;

use crate::models::DatabaseCredentials;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Connection form: host and user required, port positive.
pub fn validate_credentials(creds: &DatabaseCredentials) -> Result<()> {
    if creds.host.trim().is_empty() {
        return Err(anyhow::anyhow!("Host is required"));
    }
    if creds.port == 0 {
        return Err(anyhow::anyhow!("Port must be a positive number"));
    }
    if creds.user.trim().is_empty() {
        return Err(anyhow::anyhow!("Username is required"));
    }
    Ok(())
}

/// Parse the port field of the connection form.
pub fn parse_port(raw: &str) -> Result<u16> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(anyhow::anyhow!("Port must be a positive number")),
    }
}

/// Validate database name (MySQL)
pub fn validate_database_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(anyhow::anyhow!("Database name is required"));
    }

    if name.chars().count() > 64 {
        return Err(anyhow::anyhow!("Database name cannot exceed 64 characters"));
    }

    if name.starts_with(' ') || name.ends_with(' ') {
        return Err(anyhow::anyhow!(
            "Database name cannot start or end with spaces"
        ));
    }

    // MySQL maps database names to directories
    let invalid_chars = ['/', '\\', '.', '\0'];
    if name.chars().any(|c| invalid_chars.contains(&c)) {
        return Err(anyhow::anyhow!("Database name contains invalid characters"));
    }

    Ok(())
}

/// Account form shared by the owner step and the create-user screen.
pub fn validate_account(username: &str, email: &str, password: &str, confirm: &str) -> Result<()> {
    if username.trim().chars().count() < MIN_USERNAME_LEN {
        return Err(anyhow::anyhow!("Username must be at least 3 characters"));
    }

    let email_re = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
        .map_err(|e| anyhow::anyhow!("Internal error: failed to compile email regex: {}", e))?;
    if !email_re.is_match(email.trim()) {
        return Err(anyhow::anyhow!("Please enter a valid email"));
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(anyhow::anyhow!("Password must be at least 8 characters"));
    }
    if password != confirm {
        return Err(anyhow::anyhow!("Passwords do not match"));
    }
    Ok(())
}

pub fn validate_login(username: &str, password: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(anyhow::anyhow!("Username is required"));
    }
    if password.is_empty() {
        return Err(anyhow::anyhow!("Password is required"));
    }
    Ok(())
}

/// Import file must carry a `.sql` extension (case-insensitive).
pub fn validate_sql_file_name(path: &Path) -> Result<()> {
    let is_sql = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("sql"))
        .unwrap_or(false);
    if !is_sql {
        return Err(anyhow::anyhow!("Please select a SQL file to import"));
    }
    Ok(())
}
