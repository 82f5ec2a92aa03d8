//! Environment-backed runtime configuration for `powwow-client`.

use std::{
    env,
    error::Error,
    fmt,
    path::{Path, PathBuf},
};

const DEFAULT_DATA_DIR_ROOT: &str = "./.powwow-store";
const PENDING_CONTACTS_FILENAME: &str = "pending-contacts.json";
const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Which backend the client runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSelection {
    /// In-memory backend, used by the smoke binary and local development.
    Memory,
    /// Firebase project over REST.
    Firebase { project_id: String, api_key: String },
}

/// Cloudinary account settings for media uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudinarySettings {
    pub cloud_name: String,
    pub upload_preset: String,
}

/// Runtime configuration used by the client app.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub backend: BackendSelection,
    /// Media upload settings; image sends are rejected when absent.
    pub cloudinary: Option<CloudinarySettings>,
    /// Optional fixed data dir override for local persistence.
    pub data_dir_override: Option<PathBuf>,
    /// Listener poll cadence.
    pub poll_interval_ms: u64,
    /// Result cap for user search queries.
    pub search_limit: usize,
}

impl ClientConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let project_id = optional_trimmed_env("POWWOW_FIREBASE_PROJECT", &mut lookup);
        let api_key = optional_trimmed_env("POWWOW_FIREBASE_API_KEY", &mut lookup);
        let backend_name = optional_trimmed_env("POWWOW_BACKEND", &mut lookup);

        let backend = match backend_name.as_deref() {
            Some("memory") => BackendSelection::Memory,
            Some("firebase") | None => match (project_id, api_key) {
                (Some(project_id), Some(api_key)) => BackendSelection::Firebase {
                    project_id,
                    api_key,
                },
                // No Firebase credentials and no explicit selection: run the
                // in-memory backend rather than failing startup.
                (None, None) if backend_name.is_none() => BackendSelection::Memory,
                (None, _) => {
                    return Err(ConfigError::MissingValue {
                        key: "POWWOW_FIREBASE_PROJECT",
                    });
                }
                (_, None) => {
                    return Err(ConfigError::MissingValue {
                        key: "POWWOW_FIREBASE_API_KEY",
                    });
                }
            },
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "POWWOW_BACKEND",
                    value: other.to_owned(),
                    reason: "expected 'memory' or 'firebase'".to_owned(),
                });
            }
        };

        let cloud_name = optional_trimmed_env("POWWOW_CLOUDINARY_CLOUD", &mut lookup);
        let upload_preset = optional_trimmed_env("POWWOW_CLOUDINARY_PRESET", &mut lookup);
        let cloudinary = match (cloud_name, upload_preset) {
            (Some(cloud_name), Some(upload_preset)) => Some(CloudinarySettings {
                cloud_name,
                upload_preset,
            }),
            (None, None) => None,
            (None, _) => {
                return Err(ConfigError::MissingValue {
                    key: "POWWOW_CLOUDINARY_CLOUD",
                });
            }
            (_, None) => {
                return Err(ConfigError::MissingValue {
                    key: "POWWOW_CLOUDINARY_PRESET",
                });
            }
        };

        let data_dir_override =
            optional_trimmed_env("POWWOW_DATA_DIR", &mut lookup).map(PathBuf::from);
        let poll_interval_ms = parse_optional_u64(
            "POWWOW_POLL_INTERVAL_MS",
            DEFAULT_POLL_INTERVAL_MS,
            &mut lookup,
        )?;
        let search_limit =
            parse_optional_usize("POWWOW_SEARCH_LIMIT", DEFAULT_SEARCH_LIMIT, &mut lookup)?;

        if poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "POWWOW_POLL_INTERVAL_MS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        if search_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "POWWOW_SEARCH_LIMIT",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(Self {
            backend,
            cloudinary,
            data_dir_override,
            poll_interval_ms,
            search_limit,
        })
    }

    /// Location of the local pending-contact fallback file.
    pub fn pending_contacts_path(&self) -> PathBuf {
        match &self.data_dir_override {
            Some(data_dir) => data_dir.join(PENDING_CONTACTS_FILENAME),
            None => PathBuf::from(DEFAULT_DATA_DIR_ROOT).join(PENDING_CONTACTS_FILENAME),
        }
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    /// A variable required by the selected mode is absent.
    MissingValue { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
            Self::MissingValue { key } => write!(f, "missing required {key}"),
        }
    }
}

impl Error for ConfigError {}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_optional_u64<F>(key: &'static str, default: u64, lookup: &mut F) -> Result<u64, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    value
        .parse::<u64>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_optional_usize<F>(
    key: &'static str,
    default: usize,
    lookup: &mut F,
) -> Result<usize, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    value
        .parse::<usize>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let map = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        ClientConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_to_memory_backend_without_credentials() {
        let cfg = config_from_pairs(&[]).expect("empty env should parse");
        assert_eq!(cfg.backend, BackendSelection::Memory);
        assert_eq!(cfg.cloudinary, None);
        assert_eq!(cfg.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(cfg.search_limit, DEFAULT_SEARCH_LIMIT);
    }

    #[test]
    fn parses_firebase_backend_when_credentials_are_set() {
        let cfg = config_from_pairs(&[
            ("POWWOW_FIREBASE_PROJECT", "powwow-demo"),
            ("POWWOW_FIREBASE_API_KEY", "key-123"),
        ])
        .expect("config should parse");
        assert_eq!(
            cfg.backend,
            BackendSelection::Firebase {
                project_id: "powwow-demo".to_owned(),
                api_key: "key-123".to_owned(),
            }
        );
    }

    #[test]
    fn explicit_firebase_selection_requires_credentials() {
        let err = config_from_pairs(&[("POWWOW_BACKEND", "firebase")])
            .expect_err("missing credentials should fail");
        assert_eq!(
            err,
            ConfigError::MissingValue {
                key: "POWWOW_FIREBASE_PROJECT"
            }
        );
    }

    #[test]
    fn cloudinary_settings_come_as_a_pair() {
        let err = config_from_pairs(&[("POWWOW_CLOUDINARY_CLOUD", "demo")])
            .expect_err("half-configured cloudinary should fail");
        assert_eq!(
            err,
            ConfigError::MissingValue {
                key: "POWWOW_CLOUDINARY_PRESET"
            }
        );
    }

    #[test]
    fn pending_contacts_path_tracks_data_dir_mode() {
        let default_cfg = config_from_pairs(&[]).expect("default config should parse");
        assert_eq!(
            default_cfg.pending_contacts_path(),
            Path::new("./.powwow-store/pending-contacts.json")
        );

        let override_cfg = config_from_pairs(&[("POWWOW_DATA_DIR", "/tmp/powwow")])
            .expect("override config should parse");
        assert_eq!(
            override_cfg.pending_contacts_path(),
            Path::new("/tmp/powwow/pending-contacts.json")
        );
    }

    #[test]
    fn rejects_invalid_numeric_values() {
        let err = config_from_pairs(&[("POWWOW_POLL_INTERVAL_MS", "abc")])
            .expect_err("invalid poll interval should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "POWWOW_POLL_INTERVAL_MS",
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_backend_names() {
        let err = config_from_pairs(&[("POWWOW_BACKEND", "dynamo")])
            .expect_err("unknown backend should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "POWWOW_BACKEND",
                ..
            }
        ));
    }
}
