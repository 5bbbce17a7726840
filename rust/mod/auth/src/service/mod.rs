pub mod admin;
pub mod onboarding;
pub mod password;
pub mod schema;
pub mod session;
pub mod user;

use std::sync::Arc;

use crm_core::{RecordStore, ServiceError};
use crm_sql::SQLStore;

/// A `(table, column)` pair whose rows referencing a user id are deleted
/// before the user itself. Other modules register these so that a user
/// delete leaves no dangling rows behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeStep {
    pub table: String,
    pub column: String,
}

impl CascadeStep {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// A check run before a user delete. `sql` takes the user id as `?1`; every
/// row it returns (its `label` column) blocks the delete with 400.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteGuard {
    pub sql: String,
    pub reason: String,
}

impl DeleteGuard {
    pub fn new(sql: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            reason: reason.into(),
        }
    }
}

/// Configuration for the auth service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT signing secret (HS256).
    pub jwt_secret: String,
    /// Access token lifetime in seconds (default: 1h).
    pub access_token_ttl: i64,
    /// Refresh token lifetime in seconds (default: 7 days).
    pub refresh_token_ttl: i64,
    /// Minimum accepted password length.
    pub min_password_len: usize,
    /// Extra cascade steps run, in order, before the built-in ones.
    pub user_cascade: Vec<CascadeStep>,
    /// Checks that must all come back empty before a user may be deleted.
    pub user_delete_guards: Vec<DeleteGuard>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "crm-dev-secret-change-me".to_string(),
            access_token_ttl: 3600,
            refresh_token_ttl: 604800,
            min_password_len: 8,
            user_cascade: Vec::new(),
            user_delete_guards: Vec::new(),
        }
    }
}

/// The Auth service. Holds storage and configuration.
pub struct AuthService {
    pub(crate) records: RecordStore,
    pub(crate) config: AuthConfig,
}

impl AuthService {
    /// Create a new AuthService, initializing the DB schema.
    pub fn new(sql: Arc<dyn SQLStore>, config: AuthConfig) -> Result<Arc<Self>, ServiceError> {
        schema::init_schema(sql.as_ref())?;
        Ok(Arc::new(Self {
            records: RecordStore::new(sql),
            config,
        }))
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

/// Minimal shape check for an email address: `local@domain` with a dot in
/// the domain and no whitespace.
pub(crate) fn validate_email(email: &str) -> Result<(), ServiceError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!("invalid email address '{}'", email)))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@localhost").is_err());
        assert!(validate_email("ada @example.com").is_err());
    }
}
