//! Privileged user management. Every entry point re-checks the caller's role
//! in the store, so a stale token can't outlive a demotion.

use crm_core::{Cond, ListParams, ListResult, RecordStore, ServiceError, now_rfc3339};
use crm_sql::{Statement, Value};

use crate::model::{
    CreateUser, DeleteUserReport, RemovedRows, RoleAssignment, UpdateUser, User, UserRole,
    UserSummary,
};
use crate::service::password::{hash_password, is_valid_hash};
use crate::service::{AuthService, CascadeStep};

/// Rows owned by the auth module itself, removed after any registered steps.
fn builtin_cascade() -> Vec<CascadeStep> {
    vec![
        CascadeStep::new("sessions", "user_id"),
        CascadeStep::new("onboarding", "id"),
        CascadeStep::new("profiles", "id"),
        CascadeStep::new("user_roles", "id"),
    ]
}

impl AuthService {
    /// Fail with 403 unless the user holds the `admin` role.
    pub fn require_admin(&self, user_id: &str) -> Result<(), ServiceError> {
        if self.get_role(user_id)? == UserRole::Admin {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied("admin role required".into()))
        }
    }

    pub fn is_admin(&self, user_id: &str) -> Result<bool, ServiceError> {
        Ok(self.get_role(user_id)? == UserRole::Admin)
    }

    /// List every user with role, profile and onboarding state.
    /// `q` matches against the email.
    pub fn admin_list_users(
        &self,
        caller: &str,
        params: &ListParams,
    ) -> Result<ListResult<UserSummary>, ServiceError> {
        self.require_admin(caller)?;

        let mut conds = Vec::new();
        if let Some(q) = params.query() {
            conds.push(Cond::Search(vec!["email"], q.to_string()));
        }
        let (users, total): (Vec<User>, usize) =
            self.records
                .list("users", &conds, params.clamped_limit(), params.offset)?;

        let items = users
            .into_iter()
            .map(|u| self.summarize(u))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ListResult { items, total })
    }

    pub fn admin_get_user(&self, caller: &str, id: &str) -> Result<UserSummary, ServiceError> {
        self.require_admin(caller)?;
        self.get_user_summary(id)
    }

    /// Create a user on someone else's behalf.
    pub fn admin_create_user(&self, caller: &str, input: CreateUser) -> Result<UserSummary, ServiceError> {
        self.require_admin(caller)?;
        self.validate_password(&input.password)?;

        let hash = hash_password(&input.password)?;
        let user = self.insert_user(&input.email, hash, input.full_name, input.role)?;
        tracing::info!(admin = caller, user_id = %user.id, "admin created user");
        self.summarize(user)
    }

    /// Change another user's role or active flag.
    ///
    /// Admins can't demote or deactivate themselves, which keeps at least one
    /// admin around. Deactivation revokes the user's sessions.
    pub fn admin_update_user(
        &self,
        caller: &str,
        id: &str,
        patch: UpdateUser,
    ) -> Result<UserSummary, ServiceError> {
        self.require_admin(caller)?;
        let mut user = self.get_user(id)?;

        if caller == id {
            if patch.role.is_some_and(|r| r != UserRole::Admin) {
                return Err(ServiceError::Validation("admins cannot demote themselves".into()));
            }
            if patch.active == Some(false) {
                return Err(ServiceError::Validation("admins cannot deactivate themselves".into()));
            }
        }

        let now = now_rfc3339();
        if let Some(role) = patch.role {
            self.set_role(id, role, &now)?;
        }
        if let Some(active) = patch.active {
            if active != user.active {
                user.active = active;
                user.updated_at = now;
                self.save_user(&user)?;
                if !active {
                    let revoked = self.revoke_user_sessions(id, None)?;
                    tracing::info!(user_id = id, revoked, "user deactivated");
                }
            }
        }

        self.summarize(user)
    }

    fn set_role(&self, user_id: &str, role: UserRole, now: &str) -> Result<(), ServiceError> {
        let created_at = self
            .records
            .find::<RoleAssignment>("user_roles", user_id)?
            .map(|a| a.created_at)
            .unwrap_or_else(|| now.to_string());
        let assignment = RoleAssignment {
            user_id: user_id.to_string(),
            role,
            created_at: created_at.clone(),
            updated_at: now.to_string(),
        };
        let (sql, params) = RecordStore::insert_statement(
            "user_roles",
            user_id,
            &assignment,
            &[
                ("role", Value::Text(role.as_str().to_string())),
                ("created_at", Value::Text(created_at)),
                ("updated_at", Value::Text(now.to_string())),
            ],
        )?;
        // Upsert: the row may predate role assignment.
        let sql = sql.replacen("INSERT INTO", "INSERT OR REPLACE INTO", 1);
        self.records.sql().exec(&sql, &params)?;
        Ok(())
    }

    /// Delete a user and every row that references it, in one transaction.
    ///
    /// Registered cascade steps run first, then sessions, onboarding,
    /// profile, role, and finally the user row. The report lists the rows
    /// removed per table in that order.
    pub fn delete_user(&self, caller: &str, id: &str) -> Result<DeleteUserReport, ServiceError> {
        self.require_admin(caller)?;
        if caller == id {
            return Err(ServiceError::Validation("admins cannot delete themselves".into()));
        }
        self.get_user(id)?;
        self.check_delete_guards(id)?;

        let steps: Vec<CascadeStep> = self
            .config
            .user_cascade
            .iter()
            .cloned()
            .chain(builtin_cascade())
            .chain([CascadeStep::new("users", "id")])
            .collect();

        let statements: Vec<Statement> = steps
            .iter()
            .map(|s| {
                Statement::new(
                    format!("DELETE FROM {} WHERE {} = ?1", s.table, s.column),
                    vec![Value::Text(id.to_string())],
                )
            })
            .collect();

        let counts = self.records.sql().transaction(&statements)?;

        let removed: Vec<RemovedRows> = steps
            .into_iter()
            .zip(counts)
            .map(|(s, count)| RemovedRows { table: s.table, count })
            .collect();
        tracing::info!(admin = caller, user_id = id, ?removed, "user deleted");

        Ok(DeleteUserReport {
            user_id: id.to_string(),
            deleted: true,
            removed,
        })
    }

    fn check_delete_guards(&self, id: &str) -> Result<(), ServiceError> {
        for guard in &self.config.user_delete_guards {
            let rows = self.records.sql().query(&guard.sql, &[Value::Text(id.to_string())])?;
            if !rows.is_empty() {
                let labels: Vec<&str> = rows.iter().filter_map(|r| r.get_str("label")).collect();
                tracing::warn!(user_id = id, reason = %guard.reason, "user delete refused");
                return Err(ServiceError::Validation(format!(
                    "{}: {}",
                    guard.reason,
                    labels.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Make sure the configured bootstrap admin exists and holds the admin
    /// role. Returns true if the user had to be created.
    pub fn ensure_admin(&self, email: &str, password_hash: &str) -> Result<bool, ServiceError> {
        if !is_valid_hash(password_hash) {
            return Err(ServiceError::Validation("admin password_hash is not a PHC string".into()));
        }

        if let Some(user) = self.find_user_by_email(email)? {
            if self.get_role(&user.id)? != UserRole::Admin {
                self.set_role(&user.id, UserRole::Admin, &now_rfc3339())?;
                tracing::info!(user_id = %user.id, "promoted bootstrap user to admin");
            }
            return Ok(false);
        }

        let user = self.insert_user(
            email,
            password_hash.to_string(),
            Some("Administrator".to_string()),
            UserRole::Admin,
        )?;
        tracing::info!(user_id = %user.id, "created bootstrap admin");
        Ok(true)
    }
}
