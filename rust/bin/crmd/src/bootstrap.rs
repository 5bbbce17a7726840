//! Bootstrap: first-start checks and the initial admin account.
//!
//! When crmd starts:
//! 1. Verify the config is usable: if not, refuse to start.
//! 2. Ensure the configured admin exists and holds the `admin` role.

use auth::service::AuthService;
use auth::service::password::is_valid_hash;
use tracing::info;

use crate::config::ServerConfig;

/// Verify server configuration is ready for production use.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.admin.email.trim().is_empty() {
        anyhow::bail!("No admin email found in configuration.");
    }
    if config.admin.password_hash.is_empty() {
        anyhow::bail!(
            "No admin password hash found in configuration.\n\
             Run `crmd --hash-password <password>` and put the result in [admin]."
        );
    }
    if !is_valid_hash(&config.admin.password_hash) {
        anyhow::bail!("Admin password_hash is not a valid PHC string.");
    }
    if config.jwt.secret.is_empty() {
        anyhow::bail!("JWT secret is empty in configuration.");
    }
    if config.jwt.access_ttl_secs <= 0 || config.jwt.refresh_ttl_secs <= 0 {
        anyhow::bail!("JWT token lifetimes must be positive.");
    }
    if config.storage.data_dir.is_empty() {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    if config.import.max_rows == 0 {
        anyhow::bail!("import.max_rows must be at least 1.");
    }
    Ok(())
}

/// Ensure the configured admin account exists.
pub fn ensure_admin(auth: &AuthService, config: &ServerConfig) -> anyhow::Result<()> {
    let created = auth
        .ensure_admin(&config.admin.email, &config.admin.password_hash)
        .map_err(|e| anyhow::anyhow!("failed to bootstrap admin: {}", e))?;
    if created {
        info!("Created admin account {}", config.admin.email);
    } else {
        info!("Admin account {} already exists", config.admin.email);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdminConfig, ImportConfig, JwtConfig, StorageConfig};
    use auth::service::password::hash_password;

    fn config() -> ServerConfig {
        ServerConfig {
            storage: StorageConfig {
                data_dir: "/tmp/crm".to_string(),
            },
            jwt: JwtConfig {
                secret: "test".to_string(),
                access_ttl_secs: 3600,
                refresh_ttl_secs: 604800,
            },
            admin: AdminConfig {
                email: "admin@example.com".to_string(),
                password_hash: hash_password("admin-password").unwrap(),
            },
            import: ImportConfig::default(),
        }
    }

    #[test]
    fn test_verify_config_ok() {
        assert!(verify_config(&config()).is_ok());
    }

    #[test]
    fn test_verify_config_rejects_gaps() {
        let mut c = config();
        c.admin.password_hash = String::new();
        assert!(verify_config(&c).is_err());

        let mut c = config();
        c.admin.password_hash = "plaintext".to_string();
        assert!(verify_config(&c).is_err());

        let mut c = config();
        c.jwt.secret = String::new();
        assert!(verify_config(&c).is_err());

        let mut c = config();
        c.storage.data_dir = String::new();
        assert!(verify_config(&c).is_err());

        let mut c = config();
        c.import.max_rows = 0;
        assert!(verify_config(&c).is_err());
    }
}
