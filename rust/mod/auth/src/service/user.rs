use crm_core::{Cond, RecordStore, ServiceError, merge_patch, new_id, normalize_email, now_rfc3339};
use crm_sql::{Statement, Value};

use crate::model::{
    ChangePassword, Profile, RoleAssignment, SignUp, User, UserRole, UserSummary,
};
use crate::service::password::{hash_password, verify_password};
use crate::service::{AuthService, validate_email};

impl AuthService {
    /// Self-service registration. New users get the `user` role.
    pub fn sign_up(&self, input: SignUp) -> Result<User, ServiceError> {
        self.validate_password(&input.password)?;
        let hash = hash_password(&input.password)?;
        self.insert_user(&input.email, hash, input.full_name, UserRole::User)
    }

    /// Insert a user together with its profile and role in one transaction.
    pub(crate) fn insert_user(
        &self,
        email: &str,
        password_hash: String,
        full_name: Option<String>,
        role: UserRole,
    ) -> Result<User, ServiceError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        let full_name = full_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let now = now_rfc3339();
        let user = User {
            id: new_id(),
            email: email.clone(),
            active: true,
            last_sign_in_at: None,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        let profile = Profile {
            user_id: user.id.clone(),
            full_name: full_name.clone(),
            avatar_url: None,
            phone: None,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        let assignment = RoleAssignment {
            user_id: user.id.clone(),
            role,
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        let statements = [
            RecordStore::insert_statement("users", &user.id, &user, &[
                ("email", Value::Text(email.clone())),
                ("password_hash", Value::Text(password_hash)),
                ("active", Value::bool(true)),
                ("created_at", Value::Text(now.clone())),
                ("updated_at", Value::Text(now.clone())),
            ])?,
            RecordStore::insert_statement("profiles", &user.id, &profile, &[
                ("full_name", Value::opt_text(full_name.as_deref())),
                ("created_at", Value::Text(now.clone())),
                ("updated_at", Value::Text(now.clone())),
            ])?,
            RecordStore::insert_statement("user_roles", &user.id, &assignment, &[
                ("role", Value::Text(role.as_str().to_string())),
                ("created_at", Value::Text(now.clone())),
                ("updated_at", Value::Text(now)),
            ])?,
        ]
        .map(|(sql, params)| Statement::new(sql, params));

        self.records.sql().transaction(&statements).map_err(|e| {
            if e.is_constraint() {
                ServiceError::Conflict(format!("email '{}' is already registered", email))
            } else {
                ServiceError::from(e)
            }
        })?;

        tracing::info!(user_id = %user.id, role = role.as_str(), "user created");
        Ok(user)
    }

    pub(crate) fn validate_password(&self, password: &str) -> Result<(), ServiceError> {
        if password.chars().count() < self.config.min_password_len {
            return Err(ServiceError::Validation(format!(
                "password must be at least {} characters",
                self.config.min_password_len
            )));
        }
        Ok(())
    }

    /// Get a user by id.
    pub fn get_user(&self, id: &str) -> Result<User, ServiceError> {
        self.records.get("users", id)
    }

    /// Find a user and its password hash by email.
    pub(crate) fn find_credentials(&self, email: &str) -> Result<Option<(User, String)>, ServiceError> {
        let rows = self.records.sql().query(
            "SELECT data, password_hash FROM users WHERE email = ?1",
            &[Value::Text(normalize_email(email))],
        )?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let data = row
            .get_str("data")
            .ok_or_else(|| ServiceError::Internal("missing data column".into()))?;
        let user: User =
            serde_json::from_str(data).map_err(|e| ServiceError::Internal(e.to_string()))?;
        let hash = row.get_str("password_hash").unwrap_or_default().to_string();
        Ok(Some((user, hash)))
    }

    /// Look up a user by email.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        self.records
            .find_one("users", &[Cond::Eq("email", Value::Text(normalize_email(email)))])
    }

    pub fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, ServiceError> {
        self.records.find("profiles", user_id)
    }

    /// The user's application role; `user` when no assignment exists.
    pub fn get_role(&self, user_id: &str) -> Result<UserRole, ServiceError> {
        Ok(self
            .records
            .find::<RoleAssignment>("user_roles", user_id)?
            .map(|a| a.role)
            .unwrap_or_default())
    }

    /// A user joined with its profile, role and onboarding state.
    pub fn get_user_summary(&self, id: &str) -> Result<UserSummary, ServiceError> {
        let user = self.get_user(id)?;
        self.summarize(user)
    }

    pub(crate) fn summarize(&self, user: User) -> Result<UserSummary, ServiceError> {
        Ok(UserSummary {
            profile: self.get_profile(&user.id)?,
            role: self.get_role(&user.id)?,
            onboarded: self.is_onboarded(&user.id)?,
            user,
        })
    }

    /// Update the caller's profile with JSON merge-patch semantics.
    /// Only `full_name`, `avatar_url` and `phone` may change.
    pub fn update_profile(&self, user_id: &str, patch: serde_json::Value) -> Result<Profile, ServiceError> {
        let Some(fields) = patch.as_object() else {
            return Err(ServiceError::Validation("profile patch must be a JSON object".into()));
        };
        if let Some(key) = fields
            .keys()
            .find(|k| !matches!(k.as_str(), "full_name" | "avatar_url" | "phone"))
        {
            return Err(ServiceError::Validation(format!("profile field '{}' is not editable", key)));
        }

        let now = now_rfc3339();
        let current = match self.get_profile(user_id)? {
            Some(p) => p,
            None => {
                // Users created before profiles existed get one lazily.
                let user = self.get_user(user_id)?;
                let profile = Profile {
                    user_id: user.id.clone(),
                    full_name: None,
                    avatar_url: None,
                    phone: None,
                    created_at: now.clone(),
                    updated_at: now.clone(),
                };
                self.records.insert("profiles", user_id, &profile, &[
                    ("created_at", Value::Text(now.clone())),
                    ("updated_at", Value::Text(now.clone())),
                ])?;
                profile
            }
        };

        let mut base = serde_json::to_value(&current)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        merge_patch(&mut base, &patch);
        base["updated_at"] = serde_json::json!(now);

        let updated: Profile = serde_json::from_value(base)
            .map_err(|e| ServiceError::Validation(format!("invalid profile: {}", e)))?;

        self.records.update("profiles", user_id, &updated, &[
            ("full_name", Value::opt_text(updated.full_name.as_deref())),
            ("updated_at", Value::Text(now)),
        ])?;
        Ok(updated)
    }

    /// Change the caller's password and revoke every other session.
    pub fn change_password(
        &self,
        user_id: &str,
        current_session: &str,
        input: ChangePassword,
    ) -> Result<(), ServiceError> {
        let user = self.get_user(user_id)?;
        let (_, hash) = self
            .find_credentials(&user.email)?
            .ok_or_else(|| ServiceError::NotFound(format!("user '{}' not found", user_id)))?;

        if !verify_password(&input.current_password, &hash) {
            return Err(ServiceError::Unauthorized("current password is incorrect".into()));
        }
        self.validate_password(&input.new_password)?;

        let new_hash = hash_password(&input.new_password)?;
        self.records.sql().exec(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            &[
                Value::Text(new_hash),
                Value::Text(now_rfc3339()),
                Value::Text(user_id.to_string()),
            ],
        )?;
        self.revoke_user_sessions(user_id, Some(current_session))?;

        tracing::info!(user_id, "password changed");
        Ok(())
    }

    /// Persist an updated user record and its indexed columns.
    pub(crate) fn save_user(&self, user: &User) -> Result<(), ServiceError> {
        self.records.update("users", &user.id, user, &[
            ("active", Value::bool(user.active)),
            ("updated_at", Value::Text(user.updated_at.clone())),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing;

    fn sign_up(svc: &crate::service::AuthService, email: &str) -> User {
        svc.sign_up(SignUp {
            email: email.to_string(),
            password: "long-enough".to_string(),
            full_name: Some("Ada Lovelace".to_string()),
        })
        .unwrap()
    }

    #[test]
    fn test_sign_up_creates_profile_and_role() {
        let svc = testing::service();
        let user = sign_up(&svc, "  Ada@Example.com ");
        assert_eq!(user.email, "ada@example.com");
        assert!(user.active);

        let summary = svc.get_user_summary(&user.id).unwrap();
        assert_eq!(summary.role, UserRole::User);
        assert!(!summary.onboarded);
        assert_eq!(
            summary.profile.unwrap().full_name.as_deref(),
            Some("Ada Lovelace")
        );
    }

    #[test]
    fn test_sign_up_rejects_duplicates_and_bad_input() {
        let svc = testing::service();
        sign_up(&svc, "ada@example.com");

        let dup = svc.sign_up(SignUp {
            email: "ADA@example.com".into(),
            password: "long-enough".into(),
            full_name: None,
        });
        assert!(matches!(dup, Err(ServiceError::Conflict(_))));

        let short = svc.sign_up(SignUp {
            email: "bob@example.com".into(),
            password: "short".into(),
            full_name: None,
        });
        assert!(matches!(short, Err(ServiceError::Validation(_))));

        let bad_email = svc.sign_up(SignUp {
            email: "bob".into(),
            password: "long-enough".into(),
            full_name: None,
        });
        assert!(matches!(bad_email, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_find_credentials_keeps_hash_out_of_record() {
        let svc = testing::service();
        let user = sign_up(&svc, "ada@example.com");

        let (found, hash) = svc.find_credentials("ADA@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(verify_password("long-enough", &hash));

        let json = serde_json::to_string(&found).unwrap();
        assert!(!json.contains("argon2"));
    }

    #[test]
    fn test_update_profile() {
        let svc = testing::service();
        let user = sign_up(&svc, "ada@example.com");

        let updated = svc
            .update_profile(&user.id, serde_json::json!({"phone": "+44 20 7946 0000", "full_name": null}))
            .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("+44 20 7946 0000"));
        assert!(updated.full_name.is_none());

        let err = svc
            .update_profile(&user.id, serde_json::json!({"user_id": "someone-else"}))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn test_change_password() {
        let svc = testing::service();
        let user = sign_up(&svc, "ada@example.com");

        let wrong = svc.change_password(&user.id, "sid", ChangePassword {
            current_password: "nope-nope".into(),
            new_password: "brand-new-pass".into(),
        });
        assert!(matches!(wrong, Err(ServiceError::Unauthorized(_))));

        svc.change_password(&user.id, "sid", ChangePassword {
            current_password: "long-enough".into(),
            new_password: "brand-new-pass".into(),
        })
        .unwrap();

        let (_, hash) = svc.find_credentials("ada@example.com").unwrap().unwrap();
        assert!(verify_password("brand-new-pass", &hash));
    }
}
