pub mod access;
pub mod business;
pub mod contact;
pub mod customer;
pub mod deal;
pub mod import;
pub mod member;
pub mod schema;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use auth::service::{AuthService, CascadeStep, DeleteGuard};
use crm_core::{RecordStore, ServiceError, merge_patch};
use crm_sql::SQLStore;

/// Configuration for the CRM service.
#[derive(Debug, Clone)]
pub struct CrmConfig {
    /// Largest accepted bulk import.
    pub max_import_rows: usize,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self { max_import_rows: 1000 }
    }
}

/// Rows the auth module must delete before removing a user.
pub fn user_cascade_steps() -> Vec<CascadeStep> {
    vec![CascadeStep::new("business_users", "user_id")]
}

/// Checks the auth module runs before deleting a user: nobody may be deleted
/// while they are the only owner of a business.
pub fn user_delete_guards() -> Vec<DeleteGuard> {
    vec![DeleteGuard::new(
        "SELECT b.name AS label
         FROM business_users m
         JOIN businesses b ON b.id = m.business_id
         WHERE m.user_id = ?1 AND m.role = 'owner'
           AND (SELECT COUNT(*) FROM business_users o
                WHERE o.business_id = m.business_id AND o.role = 'owner') = 1
         ORDER BY b.name",
        "user is the only owner of",
    )]
}

/// The CRM service: businesses, memberships, customers, deals and contacts.
pub struct CrmService {
    pub(crate) records: RecordStore,
    pub(crate) auth: Arc<AuthService>,
    pub(crate) config: CrmConfig,
}

impl CrmService {
    /// Create a new CrmService, initializing the DB schema.
    ///
    /// `sql` must be the store `auth` was created on; memberships reference
    /// its users table.
    pub fn new(
        sql: Arc<dyn SQLStore>,
        auth: Arc<AuthService>,
        config: CrmConfig,
    ) -> Result<Arc<Self>, ServiceError> {
        schema::init_schema(sql.as_ref())?;
        Ok(Arc::new(Self {
            records: RecordStore::new(sql),
            auth,
            config,
        }))
    }

    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    pub fn config(&self) -> &CrmConfig {
        &self.config
    }
}

/// Trim an optional string, dropping it when blank.
pub(crate) fn clean(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Trim a required string; `Validation` when blank.
pub(crate) fn require_text(field: &str, value: &str) -> Result<String, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Apply a JSON merge-patch to a record. Keys listed in `fixed` can't be
/// patched.
pub(crate) fn apply_patch<T: Serialize + DeserializeOwned>(
    current: &T,
    patch: &serde_json::Value,
    fixed: &[&str],
) -> Result<T, ServiceError> {
    let Some(fields) = patch.as_object() else {
        return Err(ServiceError::Validation("patch must be a JSON object".into()));
    };
    if let Some(key) = fields.keys().find(|k| fixed.contains(&k.as_str())) {
        return Err(ServiceError::Validation(format!("field '{}' cannot be changed", key)));
    }

    let mut base =
        serde_json::to_value(current).map_err(|e| ServiceError::Internal(e.to_string()))?;
    merge_patch(&mut base, patch);
    serde_json::from_value(base).map_err(|e| ServiceError::Validation(format!("invalid patch: {}", e)))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use auth::model::{SignUp, SubmitOnboarding};
    use auth::service::password::hash_password;
    use auth::service::{AuthConfig, AuthService};
    use crm_sql::SqliteStore;

    use super::{CrmConfig, CrmService, user_cascade_steps, user_delete_guards};

    pub fn service() -> Arc<CrmService> {
        service_with(CrmConfig::default())
    }

    pub fn service_with(config: CrmConfig) -> Arc<CrmService> {
        let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
        let auth = AuthService::new(sql.clone(), AuthConfig {
            user_cascade: user_cascade_steps(),
            user_delete_guards: user_delete_guards(),
            ..Default::default()
        })
        .unwrap();
        CrmService::new(sql, auth, config).unwrap()
    }

    /// Sign up an onboarded user and return its id.
    pub fn user(svc: &CrmService, email: &str) -> String {
        let user = svc
            .auth
            .sign_up(SignUp {
                email: email.into(),
                password: "long-enough".into(),
                full_name: Some(email.split('@').next().unwrap_or(email).into()),
            })
            .unwrap();
        svc.auth
            .submit_onboarding(&user.id, SubmitOnboarding {
                company_name: "Acme".into(),
                industry: None,
                team_size: None,
                job_title: None,
                goals: Vec::new(),
                referral_source: None,
            })
            .unwrap();
        user.id
    }

    /// Create (or promote) a global admin and return its id.
    pub fn global_admin(svc: &CrmService) -> String {
        let hash = hash_password("admin-password").unwrap();
        svc.auth.ensure_admin("root@example.com", &hash).unwrap();
        svc.auth.find_user_by_email("root@example.com").unwrap().unwrap().id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct Thing {
        id: String,
        name: String,
        #[serde(default)]
        note: Option<String>,
    }

    #[test]
    fn test_apply_patch() {
        let thing = Thing { id: "t1".into(), name: "Widget".into(), note: Some("x".into()) };

        let patched = apply_patch(&thing, &json!({"name": "Gadget", "note": null}), &["id"]).unwrap();
        assert_eq!(patched.name, "Gadget");
        assert!(patched.note.is_none());

        assert!(matches!(
            apply_patch(&thing, &json!({"id": "t2"}), &["id"]),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            apply_patch(&thing, &json!({"name": null}), &["id"]),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            apply_patch(&thing, &json!(["not", "an", "object"]), &[]),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_text_helpers() {
        assert_eq!(clean(Some("  x ".into())).as_deref(), Some("x"));
        assert_eq!(clean(Some("   ".into())), None);
        assert_eq!(require_text("name", " Acme ").unwrap(), "Acme");
        assert!(require_text("name", "  ").is_err());
    }
}
