use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Startup settings, read once from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    /// Echo error chains to callers. Never enable in production.
    pub dev_mode: bool,
    pub static_dir: String,
    pub default_model: Option<String>,
    pub request_timeout: Duration,
    pub invite_app_name: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let dev_mode = lookup("APP_ENV")
            .or_else(|| lookup("NODE_ENV"))
            .map(|v| matches!(v.to_lowercase().as_str(), "development" | "dev" | "local"))
            .unwrap_or(false);

        let request_timeout = lookup("REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));

        Self {
            port,
            dev_mode,
            static_dir: lookup("STATIC_DIR").unwrap_or_else(|| "public".to_string()),
            default_model: lookup("DEFAULT_MODEL").filter(|m| !m.trim().is_empty()),
            request_timeout,
            invite_app_name: lookup("INVITE_APP_NAME").unwrap_or_else(|| "CTRL-ALT-FIT".to_string()),
        }
    }
}

/// Source of credentials, consulted on every request.
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// First non-empty value among `keys`.
    fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get(key))
    }
}

/// Reads credentials from the process environment. Empty values count as unset.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecrets;

impl SecretStore for EnvSecrets {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl SecretStore for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }
}
