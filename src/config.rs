//! Configuration management for runreview using the prefer crate.

use chrono::{FixedOffset, Offset};
use serde::{Deserialize, Serialize};

use crate::listing::DEFAULT_PAGE_SIZE;

/// Default base URL of the review API.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the review API.
    pub api_url: String,
    /// Reviewer identity; annotations are only editable by their author.
    pub viewer: String,
    /// Rows per page.
    pub page_size: usize,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Display offset for timestamps, in minutes east of UTC.
    pub timezone_offset_minutes: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            viewer: std::env::var("USER").unwrap_or_default(),
            page_size: DEFAULT_PAGE_SIZE,
            user_agent: format!("runreview/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: 30,
            timezone_offset_minutes: 0,
        }
    }
}

impl Settings {
    /// Offset used when displaying timestamps. Out-of-range values fall back to UTC.
    pub fn display_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.timezone_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| chrono::Utc.fix())
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub viewer: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub request_timeout: Option<u64>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub timezone_offset_minutes: Option<i32>,
}

impl Config {
    /// Load configuration using prefer crate.
    /// Discovers runreview config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("runreview").await {
            Ok(pref_config) => Config {
                api_url: pref_config.get("api_url").ok(),
                viewer: pref_config.get("viewer").ok(),
                page_size: pref_config.get("page_size").ok(),
                request_timeout: pref_config.get("request_timeout").ok(),
                user_agent: pref_config.get("user_agent").ok(),
                timezone_offset_minutes: pref_config.get("timezone_offset_minutes").ok(),
            },
            Err(_) => {
                // No config file found, use defaults
                Self::default()
            }
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref api_url) = self.api_url {
            settings.api_url = api_url.clone();
        }
        if let Some(ref viewer) = self.viewer {
            settings.viewer = viewer.clone();
        }
        if let Some(page_size) = self.page_size.filter(|&n| n > 0) {
            settings.page_size = page_size;
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(offset) = self.timezone_offset_minutes {
            settings.timezone_offset_minutes = offset;
        }
    }
}

/// Load settings from configuration (async version).
pub async fn load_settings() -> Settings {
    let config = Config::load().await;
    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.api_url, "http://localhost:8000");
        assert_eq!(settings.page_size, 20);
        assert_eq!(settings.request_timeout, 30);
        assert!(settings.user_agent.starts_with("runreview/"));
    }

    #[test]
    fn test_apply_overrides_only_set_keys() {
        let config = Config {
            api_url: Some("https://review.example.com".into()),
            page_size: Some(0),
            timezone_offset_minutes: Some(330),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings);
        assert_eq!(settings.api_url, "https://review.example.com");
        assert_eq!(settings.page_size, 20);
        assert_eq!(settings.request_timeout, 30);
        assert_eq!(settings.display_offset().local_minus_utc(), 330 * 60);
    }

    #[test]
    fn test_out_of_range_offset_is_utc() {
        let settings = Settings {
            timezone_offset_minutes: 100_000,
            ..Default::default()
        };
        assert_eq!(settings.display_offset().local_minus_utc(), 0);
    }
}
