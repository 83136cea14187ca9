use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_VAULT_URL: &str = "https://localhost:5000";

#[derive(Debug, Clone)]
pub struct Settings {
    pub vault_url: Url,
    /// The loopback vault usually serves a self-signed certificate.
    pub accept_invalid_certs: bool,
    /// `None` leaves the transport default in place.
    pub request_timeout: Option<Duration>,
    pub config_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid vault url {value:?}: {source}")]
    VaultUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("invalid KEEFILL_TIMEOUT_SECS={0:?}")]
    Timeout(String),
    #[error("no config directory available; set KEEFILL_CONFIG_PATH")]
    NoConfigDir,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let raw_url = get("KEEFILL_VAULT_URL").unwrap_or_else(|| DEFAULT_VAULT_URL.to_string());
        let vault_url = parse_vault_url(&raw_url)?;

        let accept_invalid_certs = get("KEEFILL_ACCEPT_INVALID_CERTS")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        let request_timeout = match get("KEEFILL_TIMEOUT_SECS") {
            Some(v) => {
                let secs: u64 = v.parse().map_err(|_| SettingsError::Timeout(v.clone()))?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let config_path = match get("KEEFILL_CONFIG_PATH") {
            Some(p) => PathBuf::from(p),
            None => default_config_path().ok_or(SettingsError::NoConfigDir)?,
        };

        Ok(Self {
            vault_url,
            accept_invalid_certs,
            request_timeout,
            config_path,
        })
    }
}

pub fn parse_vault_url(raw: &str) -> Result<Url, SettingsError> {
    Url::parse(raw).map_err(|source| SettingsError::VaultUrl {
        value: raw.to_string(),
        source,
    })
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("keefill").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_point_at_loopback_vault() {
        let s = Settings::from_lookup(lookup(&[("KEEFILL_CONFIG_PATH", "/tmp/k.json")])).unwrap();
        assert_eq!(s.vault_url.as_str(), "https://localhost:5000/");
        assert!(!s.accept_invalid_certs);
        assert!(s.request_timeout.is_none());
        assert_eq!(s.config_path, PathBuf::from("/tmp/k.json"));
    }

    #[test]
    fn env_overrides_are_trimmed() {
        let s = Settings::from_lookup(lookup(&[
            ("KEEFILL_VAULT_URL", " http://127.0.0.1:5050 "),
            ("KEEFILL_ACCEPT_INVALID_CERTS", "Yes"),
            ("KEEFILL_TIMEOUT_SECS", "7"),
            ("KEEFILL_CONFIG_PATH", "/tmp/k.json"),
        ]))
        .unwrap();
        assert_eq!(s.vault_url.as_str(), "http://127.0.0.1:5050/");
        assert!(s.accept_invalid_certs);
        assert_eq!(s.request_timeout, Some(Duration::from_secs(7)));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            Settings::from_lookup(lookup(&[("KEEFILL_VAULT_URL", "not a url")])),
            Err(SettingsError::VaultUrl { .. })
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[
                ("KEEFILL_TIMEOUT_SECS", "soon"),
                ("KEEFILL_CONFIG_PATH", "/tmp/k.json"),
            ])),
            Err(SettingsError::Timeout(_))
        ));
    }
}
