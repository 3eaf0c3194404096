use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub bind: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_base_url = resolve_api_url(None, &lookup);
        let bind = non_empty(lookup("TEXTBOOK_BIND")).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let timeout_secs = lookup("TEXTBOOK_TIMEOUT_SECS")
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .max(1);

        Config {
            api_base_url,
            bind,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

/// Picks the backend base address: an explicit value wins, then
/// `TEXTBOOK_API_URL`, then `API_URL`, then the local default.
pub fn resolve_api_url(
    explicit: Option<String>,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    let url = non_empty(explicit)
        .or_else(|| non_empty(lookup("TEXTBOOK_API_URL")))
        .or_else(|| non_empty(lookup("API_URL")))
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    url.trim_end_matches('/').to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
