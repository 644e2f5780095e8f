//! Server configuration — a TOML file named by `--config` or the
//! `HABITS_CONFIG` environment variable.
//!
//! ```toml
//! auth_enabled = true
//! db_path = "habits.db"
//! log_level = "info"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 3000
//!
//! [server.tls]
//! enabled = false
//!
//! [[oidc_providers]]
//! id = "kc"
//! name = "Keycloak"
//! issuer_url = "https://kc.example/realms/main"
//! client_id = "habits"
//! client_secret = "..."
//! redirect_url = "https://habits.example/auth/callback/kc"
//! ```
//!
//! Validation failures are fatal at startup; the process exits non-zero.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use auth::model::ProviderConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading config: {0}")]
    Read(String),

    #[error("error parsing config: {0}")]
    Parse(String),

    #[error("invalid log_level: {0}")]
    InvalidLogLevel(String),

    #[error("oidc_providers[{0}]: {1} is required")]
    MissingProviderField(usize, &'static str),

    #[error("duplicate provider name {0:?} in oidc_providers")]
    DuplicateProviderName(String),

    #[error("authentication was enabled, but no OIDC providers were configured")]
    AuthWithoutProviders,

    #[error("server.tls enabled but cert_file or key_file missing")]
    TlsFilesMissing,

    #[error("server.tls.{0}: {1}")]
    TlsFileUnusable(&'static str, String),

    #[error("server.tls.key_file: {0} permissions too permissive ({1:#o}); expected 0600")]
    KeyFileTooPermissive(PathBuf, u32),
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub auth_enabled: bool,
    /// Default bearer token for the CLI; the server never reads it.
    pub auth_token: String,
    pub db_path: PathBuf,
    pub api_base_url: String,
    pub log_level: String,
    pub session_ttl_secs: u64,
    pub server: ServerSection,
    pub oidc_providers: Vec<ProviderConfig>,
    pub nudge: NudgeSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub tls: TlsSection,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            tls: TlsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsSection {
    pub enabled: bool,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// Settings for the reminder job; the server only loads and re-serves them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NudgeSection {
    pub notify_email: String,
    pub resend_api_key: String,
    pub threshold_hours: u32,
}

impl Default for NudgeSection {
    fn default() -> Self {
        Self {
            notify_email: String::new(),
            resend_api_key: String::new(),
            threshold_hours: 3,
        }
    }
}

impl ServerConfig {
    /// Resolve the config path: explicit flag, then `HABITS_CONFIG`, then
    /// `config.toml` in the working directory.
    pub fn resolve_path(flag: Option<&str>) -> PathBuf {
        if let Some(path) = flag {
            return PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("HABITS_CONFIG") {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        PathBuf::from("config.toml")
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {e}", path.display())))?;
        let mut config: ServerConfig =
            toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.apply_defaults();
        config.finalize()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_defaults(&mut self) {
        if self.db_path.as_os_str().is_empty() {
            self.db_path = PathBuf::from("habits.db");
        }
        if self.api_base_url.is_empty() {
            self.api_base_url = "http://localhost:3000".to_string();
        }
        if self.log_level.is_empty() {
            self.log_level = "info".to_string();
        }
        if self.session_ttl_secs == 0 {
            self.session_ttl_secs = 86_400;
        }
        if self.nudge.threshold_hours == 0 {
            self.nudge.threshold_hours = 3;
        }
    }

    fn finalize(&mut self) -> Result<(), ConfigError> {
        match self.log_level.to_lowercase().as_str() {
            "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::InvalidLogLevel(other.to_string())),
        }

        self.db_path = resolve_path(&self.db_path);
        if !self.server.tls.cert_file.as_os_str().is_empty() {
            self.server.tls.cert_file = resolve_path(&self.server.tls.cert_file);
        }
        if !self.server.tls.key_file.as_os_str().is_empty() {
            self.server.tls.key_file = resolve_path(&self.server.tls.key_file);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.tls.enabled {
            self.validate_tls()?;
        }

        if self.auth_enabled && self.oidc_providers.is_empty() {
            return Err(ConfigError::AuthWithoutProviders);
        }
        if !self.auth_enabled && !self.oidc_providers.is_empty() {
            warn!("OIDC providers have been configured, but auth is disabled");
        }

        let mut seen = HashSet::new();
        for (i, provider) in self.oidc_providers.iter().enumerate() {
            if provider.name.is_empty() {
                return Err(ConfigError::MissingProviderField(i, "name"));
            }
            if !seen.insert(provider.name.clone()) {
                return Err(ConfigError::DuplicateProviderName(provider.name.clone()));
            }
            if provider.id.is_empty() {
                return Err(ConfigError::MissingProviderField(i, "id"));
            }
            if provider.issuer_url.is_empty() {
                return Err(ConfigError::MissingProviderField(i, "issuer_url"));
            }
            if provider.redirect_url.is_empty() {
                return Err(ConfigError::MissingProviderField(i, "redirect_url"));
            }
            if provider.client_id.is_empty() {
                return Err(ConfigError::MissingProviderField(i, "client_id"));
            }
            if provider.client_secret.is_empty() {
                return Err(ConfigError::MissingProviderField(i, "client_secret"));
            }
        }
        Ok(())
    }

    fn validate_tls(&self) -> Result<(), ConfigError> {
        let tls = &self.server.tls;
        if tls.cert_file.as_os_str().is_empty() || tls.key_file.as_os_str().is_empty() {
            return Err(ConfigError::TlsFilesMissing);
        }

        check_readable(&tls.cert_file)
            .map_err(|e| ConfigError::TlsFileUnusable("cert_file", e))?;
        check_readable(&tls.key_file)
            .map_err(|e| ConfigError::TlsFileUnusable("key_file", e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let meta = std::fs::metadata(&tls.key_file)
                .map_err(|e| ConfigError::TlsFileUnusable("key_file", e.to_string()))?;
            let mode = meta.permissions().mode() & 0o777;
            // Group or world access to the private key is a refusal to start.
            if mode & 0o077 != 0 {
                return Err(ConfigError::KeyFileTooPermissive(tls.key_file.clone(), mode));
            }
        }
        Ok(())
    }

    /// The socket address string to bind.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Absolute, symlink-resolved path; falls back to the absolute form when
/// the file does not exist yet (e.g. a database to be created).
fn resolve_path(p: &Path) -> PathBuf {
    let abs = std::path::absolute(p).unwrap_or_else(|_| p.to_path_buf());
    std::fs::canonicalize(&abs).unwrap_or(abs)
}

fn check_readable(path: &Path) -> Result<(), String> {
    let meta = std::fs::metadata(path).map_err(|e| e.to_string())?;
    if !meta.is_file() {
        return Err(format!("{} is not a regular file", path.display()));
    }
    std::fs::File::open(path)
        .map(|_| ())
        .map_err(|e| format!("not readable: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_str(raw: &str) -> Result<ServerConfig, ConfigError> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(raw.as_bytes()).unwrap();
        ServerConfig::load(file.path())
    }

    const PROVIDER: &str = r#"
[[oidc_providers]]
id = "kc"
name = "Keycloak"
issuer_url = "https://kc.example/realms/main"
client_id = "habits"
client_secret = "s3cret"
redirect_url = "https://habits.example/auth/callback/kc"
"#;

    #[test]
    fn test_defaults() {
        let cfg = load_str("").unwrap();
        assert!(!cfg.auth_enabled);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.session_ttl_secs, 86_400);
        assert_eq!(cfg.nudge.threshold_hours, 3);
        assert!(cfg.db_path.is_absolute());
        assert!(cfg.db_path.ends_with("habits.db"));
        assert_eq!(cfg.listen_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_provider_scopes_default() {
        let cfg = load_str(&format!("auth_enabled = true\n{PROVIDER}")).unwrap();
        assert_eq!(
            cfg.oidc_providers[0].scopes,
            vec!["openid", "profile", "offline_access"]
        );
    }

    #[test]
    fn test_invalid_log_level() {
        let result = load_str("log_level = \"verbose\"");
        assert!(matches!(result, Err(ConfigError::InvalidLogLevel(_))));
    }

    #[test]
    fn test_auth_enabled_requires_providers() {
        let result = load_str("auth_enabled = true");
        assert!(matches!(result, Err(ConfigError::AuthWithoutProviders)));
    }

    #[test]
    fn test_provider_missing_field() {
        let result = load_str(
            r#"
auth_enabled = true
[[oidc_providers]]
id = "kc"
name = "Keycloak"
issuer_url = "https://kc.example"
client_id = "habits"
client_secret = ""
redirect_url = "https://habits.example/cb"
"#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::MissingProviderField(0, "client_secret"))
        ));
    }

    #[test]
    fn test_duplicate_provider_names() {
        let result = load_str(&format!("auth_enabled = true\n{PROVIDER}{PROVIDER}"));
        assert!(matches!(result, Err(ConfigError::DuplicateProviderName(_))));
    }

    #[test]
    fn test_tls_enabled_without_files() {
        let result = load_str("[server.tls]\nenabled = true");
        assert!(matches!(result, Err(ConfigError::TlsFilesMissing)));
    }

    #[test]
    fn test_tls_missing_cert_file() {
        let result = load_str(
            r#"
[server.tls]
enabled = true
cert_file = "/nonexistent/cert.pem"
key_file = "/nonexistent/key.pem"
"#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::TlsFileUnusable("cert_file", _))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, "cert").unwrap();
        std::fs::write(&key, "key").unwrap();

        let raw = format!(
            "[server.tls]\nenabled = true\ncert_file = {:?}\nkey_file = {:?}\n",
            cert, key
        );

        // Group-readable key: refused.
        std::fs::set_permissions(&key, std::fs::Permissions::from_mode(0o640)).unwrap();
        assert!(matches!(
            load_str(&raw),
            Err(ConfigError::KeyFileTooPermissive(_, _))
        ));

        // Owner-only: accepted.
        std::fs::set_permissions(&key, std::fs::Permissions::from_mode(0o600)).unwrap();
        let cfg = load_str(&raw).unwrap();
        assert!(cfg.server.tls.enabled);
    }

    #[test]
    fn test_resolve_path_prefers_flag_over_env() {
        assert_eq!(
            ServerConfig::resolve_path(Some("/etc/habits.toml")),
            PathBuf::from("/etc/habits.toml")
        );
    }
}
