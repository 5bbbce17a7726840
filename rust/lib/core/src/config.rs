use std::path::{Path, PathBuf};

/// Storage and listener settings shared by the service binary and tests.
///
/// `crmd` fills this from its TOML config and CLI flags, then hands it to
/// storage initialization.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory holding the service's on-disk state.
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite database file.
    /// Defaults to `{data_dir}/crm.sqlite` if not specified.
    pub sqlite_path: Option<PathBuf>,

    /// Listen address for the HTTP server.
    pub listen: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            sqlite_path: None,
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Build a config rooted at `data_dir` with default file names.
    pub fn with_data_dir(data_dir: impl AsRef<Path>, listen: impl Into<String>) -> Self {
        Self {
            data_dir: Some(data_dir.as_ref().to_path_buf()),
            sqlite_path: None,
            listen: listen.into(),
        }
    }

    /// Resolve the SQLite database path, falling back to `{data_dir}/crm.sqlite`.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("crm.sqlite"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}
