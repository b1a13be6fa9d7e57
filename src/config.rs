use std::env;
use std::path::PathBuf;
use anyhow::{Result, ensure};
use log::info;

use crate::datadog::Credentials;

pub const DEFAULT_SITE: &str = "datadoghq.com";
pub const DEFAULT_DATABASE: &str = "data/monitors.db";

pub struct Settings {
    pub api_key: String,
    pub app_key: String,
    pub site: String,
    pub database: PathBuf,
}

impl Settings {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            api_key: non_empty("DATADOG_API_KEY").unwrap_or_default(),
            app_key: non_empty("DATADOG_APP_KEY").unwrap_or_default(),
            site: non_empty("DATADOG_SITE")
                .unwrap_or_else(|| DEFAULT_SITE.to_string()),
            database: non_empty("DATABASE_PATH")
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string())
                .into(),
        }
    }

    pub fn validate(self) -> Result<Self> {
        info!("--- Checking env variables ---");
        info!("🌐 Site: {}", self.site);
        info!("🗄 Database: {:?}", self.database);

        ensure!(
            !self.site.contains("://") && !self.site.starts_with("api."),
            "DATADOG_SITE must be a bare site name like 'datadoghq.eu', got '{}'",
            self.site
        );

        Ok(self)
    }

    /// Only the fetch path needs keys; reports run on the local file alone.
    pub fn credentials(&self) -> Result<Credentials> {
        ensure!(!self.api_key.is_empty(), "Critical Error: DATADOG_API_KEY not set!");
        ensure!(!self.app_key.is_empty(), "Critical Error: DATADOG_APP_KEY not set!");

        Ok(Credentials::new(&self.api_key, &self.app_key, &self.site))
    }

    pub fn db_url(&self) -> String {
        format!("sqlite://{}", self.database.to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]);
        assert_eq!(s.site, DEFAULT_SITE);
        assert_eq!(s.db_url(), "sqlite://data/monitors.db");
        assert!(s.credentials().is_err());
    }

    #[test]
    fn test_explicit_values() {
        let s = settings(&[
            ("DATADOG_API_KEY", " abc "),
            ("DATADOG_APP_KEY", "def"),
            ("DATADOG_SITE", "datadoghq.eu"),
            ("DATABASE_PATH", "/tmp/dd.db"),
        ])
        .validate()
        .unwrap();

        let creds = s.credentials().unwrap();
        assert_eq!(creds.api_key, "abc");
        assert_eq!(creds.base_url(), "https://api.datadoghq.eu");
        assert_eq!(s.db_url(), "sqlite:///tmp/dd.db");
    }

    #[test]
    fn test_blank_site_falls_back_and_url_site_is_rejected() {
        assert_eq!(settings(&[("DATADOG_SITE", "  ")]).site, DEFAULT_SITE);
        assert!(settings(&[("DATADOG_SITE", "https://api.datadoghq.com")]).validate().is_err());
    }
}
