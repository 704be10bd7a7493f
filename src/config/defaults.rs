//! Default values for configuration

/// Default bind address for the REST server
pub fn default_server_bind() -> String {
    std::env::var("FIELDCHECK_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string())
}

/// Default maximum request body size (10 MiB)
pub fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Default SQLite pool size
pub fn default_max_connections() -> u32 {
    5
}

/// Drafts untouched for longer than this are eligible for cleanup
pub fn default_stale_after_days() -> i64 {
    7
}

/// Drafts saved within this window count as recent
pub fn default_recent_within_hours() -> i64 {
    24
}

/// Company recorded on a submission when the form does not name one
pub fn default_installation_company() -> String {
    "Inter-Trade Ltd.".to_string()
}

/// Form key holding the company name
pub fn default_company_key() -> String {
    "installationCompany".to_string()
}

/// Form key whose value decides the installation verification flag
pub fn default_pass_recommendation_key() -> String {
    "recommendation".to_string()
}

/// Value of the recommendation key that verifies the installation
pub fn default_pass_recommendation_value() -> String {
    "PASS".to_string()
}

/// Default: submit does not evaluate per-question rules
pub fn default_enforce_question_rules() -> bool {
    false
}
