// Logging utilities
// Structured logging with JSON and human-readable formats

use crate::models::DatabaseCredentials;
use log::Level;
use serde_json::json;

/// Mask sensitive data in logs
pub fn mask_sensitive(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }

    let visible = 4;
    let start: String = chars[..visible].iter().collect();
    let end: String = chars[chars.len() - visible..].iter().collect();

    format!("{}...{}", start, end)
}

/// One-line summary of a connection target. Password is never included; the user is
/// partially masked.
pub fn mask_credentials(creds: &DatabaseCredentials) -> String {
    let mut out = format!(
        "host={} port={} user={} password=***",
        creds.host,
        creds.port,
        mask_sensitive(&creds.user)
    );
    if let Some(db) = creds.database.as_deref() {
        out.push_str(&format!(" database={}", db));
    }
    out
}

/// Parse phase and step from log message
/// Extracts [PHASE: ...] and [STEP: ...] patterns
pub fn parse_log_metadata(message: &str) -> (Option<String>, Option<String>, String) {
    let (phase, rest) = extract_tag(message, "[PHASE:");
    let (step, cleaned) = extract_tag(&rest, "[STEP:");
    (phase, step, cleaned)
}

fn extract_tag(message: &str, open: &str) -> (Option<String>, String) {
    let Some(start) = message.find(open) else {
        return (None, message.to_string());
    };
    let Some(end) = message[start..].find(']') else {
        return (None, message.to_string());
    };
    let value = message[start + open.len()..start + end].trim().to_string();
    let cleaned = format!("{} {}", &message[..start], &message[start + end + 1..])
        .trim()
        .to_string();
    (Some(value), cleaned)
}

/// Format log entry as JSON for structured logging
pub fn format_json_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
    run_id: Option<&str>,
) -> String {
    let mut log_entry = json!({
        "timestamp": timestamp,
        "level": level.as_str(),
        "target": target,
        "message": message,
    });

    if let Some(phase) = phase {
        log_entry["phase"] = json!(phase);
    }

    if let Some(step) = step {
        log_entry["step"] = json!(step);
    }

    if let Some(run_id) = run_id {
        log_entry["run_id"] = json!(run_id);
    }

    serde_json::to_string(&log_entry).unwrap_or_else(|_| "{}".to_string())
}

/// Format log entry as human-readable text
pub fn format_human_readable_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
) -> String {
    let mut log_line = format!("[{}] [{}]", timestamp, level.as_str());

    if let Some(phase) = phase {
        log_line.push_str(&format!(" [PHASE: {}]", phase));
    }

    if let Some(step) = step {
        log_line.push_str(&format!(" [STEP: {}]", step));
    }

    log_line.push_str(&format!(" [{}] {}", target, message));
    log_line
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Secret masking
    // -------------------------------------------------------------------------

    #[test]
    fn mask_sensitive_short_values_fully_masked() {
        assert_eq!(mask_sensitive("abc"), "***");
        assert_eq!(mask_sensitive("12345678"), "***");
        assert_eq!(mask_sensitive(""), "***");
    }

    #[test]
    fn mask_sensitive_long_values_partially_masked() {
        let masked = mask_sensitive("abcdefghijklmnop");
        assert_eq!(masked, "abcd...mnop");
    }

    #[test]
    fn mask_sensitive_handles_multibyte_input() {
        let masked = mask_sensitive("ééééééééééé");
        assert_eq!(masked, "éééé...éééé");
    }

    #[test]
    fn mask_credentials_never_leaks_password() {
        let creds = DatabaseCredentials::new("db.local", 3307, "administrator", "hunter2-secret")
            .with_database("project_manager");
        let masked = mask_credentials(&creds);

        assert!(!masked.contains("hunter2"), "password leaked: {}", masked);
        assert!(!masked.contains("administrator"), "user leaked: {}", masked);
        assert!(masked.contains("host=db.local"));
        assert!(masked.contains("port=3307"));
        assert!(masked.contains("password=***"));
        assert!(masked.contains("database=project_manager"));
    }

    #[test]
    fn mask_credentials_omits_missing_database() {
        let masked = mask_credentials(&DatabaseCredentials::default());
        assert!(!masked.contains("database="));
        assert!(masked.contains("user=***"));
    }

    // -------------------------------------------------------------------------
    // Metadata parsing and formatting
    // -------------------------------------------------------------------------

    #[test]
    fn parse_log_metadata_extracts_phase_and_step() {
        let (phase, step, msg) =
            parse_log_metadata("[PHASE: wizard] [STEP: connect] Connection test passed");
        assert_eq!(phase.as_deref(), Some("wizard"));
        assert_eq!(step.as_deref(), Some("connect"));
        assert_eq!(msg, "Connection test passed");
    }

    #[test]
    fn parse_log_metadata_without_tags_is_passthrough() {
        let (phase, step, msg) = parse_log_metadata("plain message");
        assert!(phase.is_none());
        assert!(step.is_none());
        assert_eq!(msg, "plain message");
    }

    #[test]
    fn parse_log_metadata_phase_only() {
        let (phase, step, msg) = parse_log_metadata("[PHASE: initialization] Logging ready");
        assert_eq!(phase.as_deref(), Some("initialization"));
        assert!(step.is_none());
        assert_eq!(msg, "Logging ready");
    }

    #[test]
    fn format_json_log_includes_optional_fields() {
        let line = format_json_log(
            "2024-01-01T00:00:00Z",
            Level::Info,
            "pm_setup::wizard",
            "advanced",
            Some("wizard"),
            Some("create_owner"),
            Some("run-1"),
        );
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["level"], "INFO");
        assert_eq!(v["phase"], "wizard");
        assert_eq!(v["step"], "create_owner");
        assert_eq!(v["run_id"], "run-1");
        assert_eq!(v["message"], "advanced");
    }

    #[test]
    fn format_json_log_skips_absent_fields() {
        let line = format_json_log("t", Level::Warn, "x", "m", None, None, None);
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert!(v.get("phase").is_none());
        assert!(v.get("step").is_none());
        assert!(v.get("run_id").is_none());
    }

    #[test]
    fn format_human_readable_log_layout() {
        let line = format_human_readable_log(
            "2024-01-01 00:00:00.000",
            Level::Error,
            "pm_setup::api",
            "Login failed",
            Some("session"),
            Some("login"),
        );
        assert_eq!(
            line,
            "[2024-01-01 00:00:00.000] [ERROR] [PHASE: session] [STEP: login] [pm_setup::api] Login failed"
        );
    }
}
