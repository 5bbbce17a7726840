//! Server-side configuration, read from `/etc/crm/<context>.toml`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Directory holding named server contexts.
pub const CONFIG_DIR: &str = "/etc/crm";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the SQLite database.
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HS256 signing secret.
    pub secret: String,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: i64,
}

/// The bootstrap admin, created or promoted on every start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub email: String,
    /// argon2id PHC string; `crmd --hash-password` prints one.
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Largest accepted bulk customer import.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self { max_rows: default_max_rows() }
    }
}

fn default_access_ttl() -> i64 {
    3600
}

fn default_refresh_ttl() -> i64 {
    604800
}

fn default_max_rows() -> usize {
    1000
}

impl ServerConfig {
    /// Resolve a context name or path to a config file.
    ///
    /// Anything containing `/` or `.` is taken as a path; a bare name maps
    /// to `/etc/crm/<name>.toml`.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from(CONFIG_DIR).join(format!("{}.toml", name_or_path))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: ServerConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[storage]
data_dir = "/var/lib/crm"

[jwt]
secret = "s3cret"

[admin]
email = "admin@example.com"
password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2g"
"#;

    #[test]
    fn test_resolve_path() {
        assert_eq!(ServerConfig::resolve_path("prod"), PathBuf::from("/etc/crm/prod.toml"));
        assert_eq!(ServerConfig::resolve_path("./dev.toml"), PathBuf::from("./dev.toml"));
        assert_eq!(ServerConfig::resolve_path("/tmp/x"), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn test_load_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crm.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.storage.data_dir, "/var/lib/crm");
        assert_eq!(config.jwt.access_ttl_secs, 3600);
        assert_eq!(config.jwt.refresh_ttl_secs, 604800);
        assert_eq!(config.import.max_rows, 1000);
        assert_eq!(config.admin.email, "admin@example.com");
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = ServerConfig::load(&missing).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[storage]\n").unwrap();
        assert!(ServerConfig::load(&broken).is_err());
    }
}
