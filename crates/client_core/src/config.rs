use std::{collections::HashMap, fs};

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub server_url: String,
    pub request_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            request_timeout_ms: 10_000,
        }
    }
}

/// Defaults, overridden by `client.toml`, overridden by environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("client.toml") {
        apply_file_overrides(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Ok(v) = std::env::var("APP__REQUEST_TIMEOUT_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_ms = parsed;
        }
    }

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("server_url") {
        settings.server_url = v.clone();
    }
    if let Some(v) = file_cfg.get("request_timeout_ms") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_ms = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_hold_without_overrides() {
        let settings = Settings::default();
        assert_eq!(settings.server_url, "http://127.0.0.1:8080");
        assert_eq!(settings.request_timeout_ms, 10_000);
    }

    #[test]
    fn file_overrides_apply() {
        let mut settings = Settings::default();
        apply_file_overrides(
            &mut settings,
            "server_url = \"https://data.example.com\"\nrequest_timeout_ms = \"2500\"\n",
        );
        assert_eq!(settings.server_url, "https://data.example.com");
        assert_eq!(settings.request_timeout_ms, 2_500);
    }

    #[test]
    fn malformed_timeout_keeps_the_default() {
        let mut settings = Settings::default();
        apply_file_overrides(&mut settings, "request_timeout_ms = \"soon\"\n");
        assert_eq!(settings.request_timeout_ms, 10_000);
    }

    #[test]
    fn malformed_file_is_ignored() {
        let mut settings = Settings::default();
        apply_file_overrides(&mut settings, "not toml at all [");
        assert_eq!(settings, Settings::default());
    }
}
