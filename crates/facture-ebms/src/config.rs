//! # EBMS Configuration
//!
//! Connection settings for the tax authority API and the issuing taxpayer's
//! identity.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FACTURE_EBMS_URL=https://ebms.obr.gov.bi:9443/ebms_api             │
//! │     FACTURE_EBMS_USERNAME=wsl400000356800                              │
//! │     FACTURE_EBMS_PASSWORD=...                                          │
//! │     FACTURE_TP_TIN=4000003568                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config PATH, or                                                  │
//! │     ~/.config/facture/facture.toml (Linux)                             │
//! │     ~/Library/Application Support/com.facture.facture/facture.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     timeouts 30s / 10s, empty credentials                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # facture.toml
//! [api]
//! base_url = "https://ebms.obr.gov.bi:9443/ebms_api"
//! username = "wsl400000356800"
//! password = "secret"
//! timeout_secs = 30
//! connect_timeout_secs = 10
//!
//! [taxpayer]
//! tp_type = "2"
//! name = "Kaze Trading SPRL"
//! tin = "4000003568"
//! trade_number = "RC 1234"
//! address_province = "Bujumbura"
//! address_commune = "Mukaza"
//! ```

use facture_core::ebms::TaxpayerProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// API Settings
// =============================================================================

/// Where and how to reach the tax authority.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL; endpoint paths (`/login/`, ...) are appended to it.
    #[serde(default)]
    pub base_url: String,

    /// Submission username. Also the second segment of every invoice identifier.
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Whole-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// TCP/TLS connect timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// Credentials never reach logs.
impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// =============================================================================
// Main EBMS Configuration
// =============================================================================

/// Complete EBMS configuration: API access plus the taxpayer profile that
/// fills the `tp_*` fields of every submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EbmsConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub taxpayer: TaxpayerProfile,
}

impl EbmsConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`path`, or `facture.toml` in the platform config dir)
    /// 3. Environment variables
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn load(path: Option<&Path>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading EBMS config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Checks the settings the sync flow can't work without.
    ///
    /// ## Rules
    /// - `base_url`, when set, must be http:// or https://
    /// - timeouts must be non-zero
    ///
    /// Credentials and TIN are checked by [`validate_for_sync`](Self::validate_for_sync)
    /// so that offline commands run with an empty config.
    pub fn validate(&self) -> SyncResult<()> {
        let url = self.api.base_url.trim();
        if !url.is_empty() && !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SyncError::InvalidConfig(format!(
                "base_url must start with http:// or https://, got: {}",
                url
            )));
        }

        if self.api.timeout_secs == 0 || self.api.connect_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "timeouts must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Everything [`validate`](Self::validate) checks, plus what a call to
    /// EBMS needs: base URL, credentials and the taxpayer TIN.
    pub fn validate_for_sync(&self) -> SyncResult<()> {
        self.validate()?;

        let missing = [
            ("api.base_url", self.api.base_url.trim()),
            ("api.username", self.api.username.trim()),
            ("api.password", self.api.password.as_str()),
            ("taxpayer.tin", self.taxpayer.tin.trim()),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(key, _)| key)
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            return Err(SyncError::InvalidConfig(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// Applies `FACTURE_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("FACTURE_EBMS_URL") {
            debug!(url = %url, "Overriding EBMS URL from environment");
            self.api.base_url = url;
        }
        if let Some(username) = lookup("FACTURE_EBMS_USERNAME") {
            self.api.username = username;
        }
        if let Some(password) = lookup("FACTURE_EBMS_PASSWORD") {
            self.api.password = password;
        }
        if let Some(timeout) = lookup("FACTURE_EBMS_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.api.timeout_secs = secs,
                Err(_) => warn!(value = %timeout, "Ignoring invalid FACTURE_EBMS_TIMEOUT_SECS"),
            }
        }

        let taxpayer = &mut self.taxpayer;
        let fields: [(&str, &mut String); 17] = [
            ("FACTURE_TP_TIN", &mut taxpayer.tin),
            ("FACTURE_TP_NAME", &mut taxpayer.name),
            ("FACTURE_TP_TYPE", &mut taxpayer.tp_type),
            ("FACTURE_TP_TRADE_NUMBER", &mut taxpayer.trade_number),
            ("FACTURE_TP_POSTAL_NUMBER", &mut taxpayer.postal_number),
            ("FACTURE_TP_PHONE", &mut taxpayer.phone_number),
            ("FACTURE_TP_ADDRESS_PROVINCE", &mut taxpayer.address_province),
            ("FACTURE_TP_ADDRESS_COMMUNE", &mut taxpayer.address_commune),
            ("FACTURE_TP_ADDRESS_QUARTIER", &mut taxpayer.address_quartier),
            ("FACTURE_TP_ADDRESS_AVENUE", &mut taxpayer.address_avenue),
            ("FACTURE_TP_ADDRESS_RUE", &mut taxpayer.address_rue),
            ("FACTURE_TP_ADDRESS_NUMBER", &mut taxpayer.address_number),
            ("FACTURE_TP_ACTIVITY_SECTOR", &mut taxpayer.activity_sector),
            ("FACTURE_TP_LEGAL_FORM", &mut taxpayer.legal_form),
            ("FACTURE_TP_CT_TAXPAYER", &mut taxpayer.ct_taxpayer),
            ("FACTURE_TP_TL_TAXPAYER", &mut taxpayer.tl_taxpayer),
            ("FACTURE_TP_ITEM_TAX_CATEGORY", &mut taxpayer.item_tax_category),
        ];
        for (key, field) in fields {
            if let Some(value) = lookup(key) {
                *field = value;
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "facture", "facture")
            .map(|dirs| dirs.config_dir().join("facture.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facture.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_defaults() {
        let config = EbmsConfig::default();
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert_eq!(config.api.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.taxpayer.tp_type, "1");
        assert!(config.validate().is_ok());
        assert!(config.validate_for_sync().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let (_dir, path) = write_config(
            r#"
            [api]
            base_url = "https://ebms.example.bi/ebms_api"
            username = "demo"
            password = "secret"
            timeout_secs = 5

            [taxpayer]
            name = "Kaze Trading SPRL"
            tin = "4000003568"
            address_commune = "Mukaza"
            "#,
        );

        let config = EbmsConfig::load(Some(&path)).unwrap();
        assert_eq!(config.api.base_url, "https://ebms.example.bi/ebms_api");
        assert_eq!(config.api.timeout_secs, 5);
        assert_eq!(config.api.connect_timeout_secs, 10);
        assert_eq!(config.taxpayer.tin, "4000003568");
        assert_eq!(config.taxpayer.address_commune, "Mukaza");
        assert_eq!(config.taxpayer.ct_taxpayer, "0");
        assert!(config.validate_for_sync().is_ok());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let (_dir, path) = write_config("[api\nbase_url = ");
        let err = EbmsConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, SyncError::ConfigLoadFailed(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("FACTURE_EBMS_URL", "http://localhost:9000"),
            ("FACTURE_EBMS_PASSWORD", "from-env"),
            ("FACTURE_TP_TIN", "4000009999"),
            ("FACTURE_EBMS_TIMEOUT_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = EbmsConfig::default();
        config.api.username = "from-file".into();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "http://localhost:9000");
        assert_eq!(config.api.username, "from-file");
        assert_eq!(config.api.password, "from-env");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.taxpayer.tin, "4000009999");
    }

    #[test]
    fn test_env_overrides_cover_whole_profile() {
        let env: HashMap<&str, &str> = [
            ("FACTURE_TP_POSTAL_NUMBER", "BP 1234"),
            ("FACTURE_TP_ADDRESS_AVENUE", "Avenue du Commerce"),
            ("FACTURE_TP_ADDRESS_RUE", "Rue 5"),
            ("FACTURE_TP_ADDRESS_NUMBER", "12"),
            ("FACTURE_TP_ACTIVITY_SECTOR", "Commerce"),
            ("FACTURE_TP_LEGAL_FORM", "SPRL"),
            ("FACTURE_TP_CT_TAXPAYER", "1"),
            ("FACTURE_TP_TL_TAXPAYER", "1"),
            ("FACTURE_TP_ITEM_TAX_CATEGORY", "5"),
        ]
        .into_iter()
        .collect();

        let mut config = EbmsConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        let tp = &config.taxpayer;
        assert_eq!(tp.postal_number, "BP 1234");
        assert_eq!(tp.address_avenue, "Avenue du Commerce");
        assert_eq!(tp.address_rue, "Rue 5");
        assert_eq!(tp.address_number, "12");
        assert_eq!(tp.activity_sector, "Commerce");
        assert_eq!(tp.legal_form, "SPRL");
        assert_eq!(tp.ct_taxpayer, "1");
        assert_eq!(tp.tl_taxpayer, "1");
        assert_eq!(tp.item_tax_category, "5");
        // Untouched fields keep their defaults.
        assert_eq!(tp.tp_type, "1");
    }

    #[test]
    fn test_validation() {
        let mut config = EbmsConfig::default();
        config.api.base_url = "ftp://ebms".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));

        config.api.base_url = "https://ebms".into();
        config.api.timeout_secs = 0;
        assert!(config.validate().is_err());

        config.api.timeout_secs = 30;
        config.api.username = "demo".into();
        let err = config.validate_for_sync().unwrap_err().to_string();
        assert!(err.contains("api.password"));
        assert!(err.contains("taxpayer.tin"));
        assert!(!err.contains("api.username"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = EbmsConfig::default();
        config.api.password = "hunter2".into();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
