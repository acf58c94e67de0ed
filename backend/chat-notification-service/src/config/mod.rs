use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use taska_fcm_shared::client::DEFAULT_FCM_BASE_URL;

use crate::services::firestore::{FirestoreClient, DEFAULT_DATABASE, DEFAULT_FIRESTORE_BASE_URL};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub google: GoogleConfig,
    pub firestore: FirestoreConfig,
    pub fcm: FcmConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    /// Timeout applied to every outbound HTTP request
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// Falls back to the credentials file's `project_id` when unset
    pub project_id: Option<String>,
    /// Service account JSON; the metadata server is used when unset
    pub credentials_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirestoreConfig {
    pub database: String,
    pub emulator_host: Option<String>,
}

impl FirestoreConfig {
    pub fn base_url(&self) -> String {
        match &self.emulator_host {
            Some(host) => FirestoreClient::emulator_base_url(host),
            None => DEFAULT_FIRESTORE_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error + Send + Sync>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            app: AppConfig {
                env: var("APP_ENV").unwrap_or_else(|| "development".to_string()),
                port: var("PORT")
                    .or_else(|| var("APP_PORT"))
                    .unwrap_or_else(|| "8080".to_string())
                    .parse()?,
                http_timeout_secs: var("HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|| "10".to_string())
                    .parse()?,
            },
            google: GoogleConfig {
                project_id: var("GOOGLE_CLOUD_PROJECT").or_else(|| var("FIREBASE_PROJECT_ID")),
                credentials_path: var("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            },
            firestore: FirestoreConfig {
                database: var("FIRESTORE_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
                emulator_host: var("FIRESTORE_EMULATOR_HOST"),
            },
            fcm: FcmConfig {
                base_url: var("FCM_BASE_URL").unwrap_or_else(|| DEFAULT_FCM_BASE_URL.to_string()),
            },
            logging: LoggingConfig {
                format: match var("LOG_FORMAT").as_deref() {
                    Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                    _ => LogFormat::Pretty,
                },
            },
        })
    }
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.app.env, "development");
        assert_eq!(config.app.port, 8080);
        assert_eq!(config.app.http_timeout_secs, 10);
        assert_eq!(config.google.project_id, None);
        assert_eq!(config.firestore.database, "(default)");
        assert_eq!(config.firestore.base_url(), "https://firestore.googleapis.com/v1");
        assert_eq!(config.fcm.base_url, "https://fcm.googleapis.com");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_port_prefers_platform_variable() {
        let config = Config::from_lookup(lookup(&[("PORT", "9000"), ("APP_PORT", "7000")])).unwrap();
        assert_eq!(config.app.port, 9000);

        let config = Config::from_lookup(lookup(&[("APP_PORT", "7000")])).unwrap();
        assert_eq!(config.app.port, 7000);
    }

    #[test]
    fn test_emulator_and_project() {
        let config = Config::from_lookup(lookup(&[
            ("FIREBASE_PROJECT_ID", "taska-zurah"),
            ("FIRESTORE_EMULATOR_HOST", "localhost:8081"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.google.project_id.as_deref(), Some("taska-zurah"));
        assert_eq!(config.firestore.base_url(), "http://localhost:8081/v1");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_port() {
        assert!(Config::from_lookup(lookup(&[("PORT", "eighty")])).is_err());
    }
}
