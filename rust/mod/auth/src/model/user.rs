use serde::{Deserialize, Serialize};

use super::Profile;

/// An identity that can sign in. The password hash lives in its own column
/// and is never part of the serialized record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// Unique identifier (UUIDv4, no dashes).
    pub id: String,

    /// Sign-in email, stored trimmed and lowercased.
    pub email: String,

    /// Inactive users cannot sign in or refresh tokens.
    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sign_in_at: Option<String>,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// RFC 3339 last update timestamp.
    pub updated_at: String,
}

fn default_true() -> bool {
    true
}

/// Application-wide role. `Admin` unlocks the user-management endpoints and
/// bypasses business membership checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }
}

/// Stored row of the `user_roles` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: String,
    pub role: UserRole,
    pub created_at: String,
    pub updated_at: String,
}

/// Public sign-up request.
#[derive(Debug, Clone, Deserialize)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Sign-in request.
#[derive(Debug, Clone, Deserialize)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

/// Admin request to create a user directly.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: UserRole,
}

/// Admin patch for an existing user. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUser {
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Password change by the signed-in user.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

/// A user joined with its profile, role and onboarding state, as shown to
/// admins and returned by `/auth/me`.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub user: User,
    pub profile: Option<Profile>,
    pub role: UserRole,
    pub onboarded: bool,
}

/// Outcome of a cascading user delete.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteUserReport {
    pub user_id: String,
    pub deleted: bool,
    /// Rows removed per table, in deletion order.
    pub removed: Vec<RemovedRows>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RemovedRows {
    pub table: String,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_value(UserRole::Admin).unwrap(), "admin");
        let role: UserRole = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, UserRole::User);
        assert!(serde_json::from_str::<UserRole>("\"root\"").is_err());
    }

    #[test]
    fn create_user_defaults_to_plain_role() {
        let input: CreateUser =
            serde_json::from_str(r#"{"email":"a@b.co","password":"secret-pass"}"#).unwrap();
        assert_eq!(input.role, UserRole::User);
        assert!(input.full_name.is_none());
    }
}
