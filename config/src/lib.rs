//! Configuration for the verifier client.
//!
//! Settings come from an optional TOML file at `~/.verifier/config.toml` and are
//! resolved once at startup into [`ResolvedSettings`]. The backend base URL can be
//! overridden with the `VERIFIER_API_URL` environment variable.
//!
//! ```toml
//! [gateway]
//! base_url = "http://localhost/"
//! connect_timeout_secs = 10
//!
//! [demo]
//! latency_ms = 1500
//!
//! [storage]
//! credential_path = "~/.verifier/access_token"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use url::Url;

/// Environment variable that overrides `[gateway] base_url`.
pub const API_URL_ENV: &str = "VERIFIER_API_URL";

/// Same-origin default: a reverse proxy on this host routes `/api/...`.
pub const DEFAULT_ORIGIN: &str = "http://localhost/";

/// Fixed storage key (file name) for the persisted credential.
pub const CREDENTIAL_FILE_NAME: &str = "access_token";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_DEMO_LATENCY_MS: u64 = 1500;

#[derive(Debug, Default, Deserialize)]
pub struct VerifierConfig {
    pub gateway: Option<GatewaySection>,
    pub demo: Option<DemoSection>,
    pub storage: Option<StorageSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GatewaySection {
    /// Absolute URL, or a path resolved against [`DEFAULT_ORIGIN`]. Supports `${VAR}`.
    pub base_url: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DemoSection {
    /// Artificial latency for simulated operations.
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageSection {
    pub credential_path: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid backend base URL {value:?}: {source}")]
    InvalidBaseUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("backend base URL {0:?} must use http or https")]
    UnsupportedScheme(String),
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::InvalidBaseUrl { .. } | ConfigError::UnsupportedScheme(_) => None,
        }
    }
}

/// Settings after file, environment, and defaults have been merged.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    /// Always ends with `/` so endpoint paths join beneath it.
    pub base_url: Url,
    pub connect_timeout: Duration,
    pub simulated_latency: Duration,
    /// `None` when no home directory could be determined.
    pub credential_path: Option<PathBuf>,
}

impl VerifierConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Merge with the process environment. Called once at startup.
    pub fn resolve(&self) -> Result<ResolvedSettings, ConfigError> {
        let env_url = env::var(API_URL_ENV).ok().filter(|v| !v.trim().is_empty());
        self.resolve_with(env_url.as_deref())
    }

    fn resolve_with(&self, env_base_url: Option<&str>) -> Result<ResolvedSettings, ConfigError> {
        let gateway = self.gateway.as_ref();
        let raw_base = env_base_url
            .map(ToString::to_string)
            .or_else(|| gateway.and_then(|g| g.base_url.as_deref()).map(expand_env_vars));
        let base_url = resolve_base_url(raw_base.as_deref())?;

        let connect_timeout = Duration::from_secs(
            gateway
                .and_then(|g| g.connect_timeout_secs)
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        );

        let simulated_latency = Duration::from_millis(
            self.demo
                .as_ref()
                .and_then(|d| d.latency_ms)
                .unwrap_or(DEFAULT_DEMO_LATENCY_MS),
        );

        let credential_path = self
            .storage
            .as_ref()
            .and_then(|s| s.credential_path.as_deref())
            .map(|raw| expand_home(&expand_env_vars(raw)))
            .or_else(default_credential_path);

        tracing::debug!(%base_url, ?connect_timeout, ?simulated_latency, "Resolved settings");

        Ok(ResolvedSettings {
            base_url,
            connect_timeout,
            simulated_latency,
            credential_path,
        })
    }
}

/// Resolve a configured base URL, defaulting to the same-origin host.
///
/// Relative values (`/`, `/proxy/`) are joined onto [`DEFAULT_ORIGIN`].
pub fn resolve_base_url(raw: Option<&str>) -> Result<Url, ConfigError> {
    let raw = raw.map(str::trim).filter(|v| !v.is_empty());
    let invalid = |value: &str, source| ConfigError::InvalidBaseUrl {
        value: value.to_string(),
        source,
    };

    let mut url = match raw {
        None => Url::parse(DEFAULT_ORIGIN).map_err(|e| invalid(DEFAULT_ORIGIN, e))?,
        Some(value) => match Url::parse(value) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(DEFAULT_ORIGIN)
                .and_then(|origin| origin.join(value))
                .map_err(|e| invalid(value, e))?,
            Err(e) => return Err(invalid(value, e)),
        },
    };

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme(url.to_string()));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if var.is_empty() {
                    out.push_str("${}");
                } else {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

/// `~/.verifier`, the directory holding config, credential, and logs.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".verifier"))
}

pub fn config_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("config.toml"))
}

#[must_use]
pub fn default_credential_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join(CREDENTIAL_FILE_NAME))
}
