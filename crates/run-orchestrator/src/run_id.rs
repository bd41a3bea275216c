use chrono::Utc;
use uuid::Uuid;

/// `run_<unix millis>_<8 hex>`; the suffix keeps concurrent runs apart.
pub fn new_run_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("run_{}_{}", Utc::now().timestamp_millis(), &suffix[..8])
}

/// Run ids double as directory names, so only `[A-Za-z0-9_-]` is accepted.
pub fn is_valid_run_id(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= 128
        && candidate
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
}
