use crm_core::{Cond, ServiceError, new_id, now_rfc3339};
use crm_sql::Value;

use crate::model::{AddMember, Business, BusinessRole, Member, Membership, UpdateMember};
use crate::service::CrmService;
use crate::service::access::{Need, not_found};

impl CrmService {
    fn member_view(&self, m: Membership) -> Result<Member, ServiceError> {
        let email = match self.auth.get_user(&m.user_id) {
            Ok(user) => Some(user.email),
            Err(ServiceError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        let full_name = self.auth.get_profile(&m.user_id)?.and_then(|p| p.full_name);
        Ok(Member {
            user_id: m.user_id,
            email,
            full_name,
            role: m.role,
            joined_at: m.joined_at,
        })
    }

    fn owner_count(&self, business_id: &str) -> Result<usize, ServiceError> {
        self.records.count("business_users", &[
            Cond::Eq("business_id", Value::Text(business_id.to_string())),
            Cond::Eq("role", Value::Text(BusinessRole::Owner.as_str().to_string())),
        ])
    }

    fn require_member(&self, business_id: &str, user_id: &str) -> Result<Membership, ServiceError> {
        self.find_membership(business_id, user_id)?
            .ok_or_else(|| not_found("member", user_id))
    }

    /// Members of a business, in joining order. Visible to every member.
    pub fn list_members(&self, caller: &str, business_id: &str) -> Result<Vec<Member>, ServiceError> {
        self.records.get::<Business>("businesses", business_id)?;
        self.authorize(caller, business_id, Need::Read, not_found("business", business_id))?;

        self.records
            .list_all::<Membership>("business_users", &[Cond::Eq(
                "business_id",
                Value::Text(business_id.to_string()),
            )])?
            .into_iter()
            .map(|m| self.member_view(m))
            .collect()
    }

    /// Add an existing user to a business by email.
    /// Only owners may add another owner.
    pub fn add_member(&self, caller: &str, business_id: &str, input: AddMember) -> Result<Member, ServiceError> {
        self.records.get::<Business>("businesses", business_id)?;
        let caller_role =
            self.authorize(caller, business_id, Need::Manage, not_found("business", business_id))?;
        if input.role == BusinessRole::Owner && caller_role != BusinessRole::Owner {
            return Err(ServiceError::PermissionDenied("only owners can add owners".into()));
        }

        let user = self
            .auth
            .find_user_by_email(&input.email)?
            .ok_or_else(|| ServiceError::NotFound(format!("no user with email '{}'", input.email.trim())))?;
        if self.find_membership(business_id, &user.id)?.is_some() {
            return Err(ServiceError::Conflict(format!("'{}' is already a member", user.email)));
        }

        let now = now_rfc3339();
        let membership = Membership {
            id: new_id(),
            business_id: business_id.to_string(),
            user_id: user.id.clone(),
            role: input.role,
            joined_at: now.clone(),
        };
        self.records.insert("business_users", &membership.id, &membership, &[
            ("business_id", Value::Text(membership.business_id.clone())),
            ("user_id", Value::Text(membership.user_id.clone())),
            ("role", Value::Text(membership.role.as_str().to_string())),
            ("created_at", Value::Text(now)),
        ])?;

        tracing::info!(business_id, user_id = %user.id, role = input.role.as_str(), "member added");
        self.member_view(membership)
    }

    /// Change a member's role. Granting or taking away `owner` needs an
    /// owner, and the last owner can't be demoted.
    pub fn update_member(
        &self,
        caller: &str,
        business_id: &str,
        user_id: &str,
        input: UpdateMember,
    ) -> Result<Member, ServiceError> {
        self.records.get::<Business>("businesses", business_id)?;
        let caller_role =
            self.authorize(caller, business_id, Need::Manage, not_found("business", business_id))?;
        let mut membership = self.require_member(business_id, user_id)?;

        let touches_owner =
            membership.role == BusinessRole::Owner || input.role == BusinessRole::Owner;
        if touches_owner && caller_role != BusinessRole::Owner {
            return Err(ServiceError::PermissionDenied("only owners can change owner roles".into()));
        }
        if membership.role == BusinessRole::Owner
            && input.role != BusinessRole::Owner
            && self.owner_count(business_id)? <= 1
        {
            return Err(ServiceError::Validation("a business needs at least one owner".into()));
        }

        membership.role = input.role;
        self.records.update("business_users", &membership.id, &membership, &[
            ("role", Value::Text(membership.role.as_str().to_string())),
        ])?;
        self.member_view(membership)
    }

    /// Remove a member. Anyone may leave; removing others needs a business
    /// admin, removing an owner needs an owner. The last owner stays.
    pub fn remove_member(&self, caller: &str, business_id: &str, user_id: &str) -> Result<(), ServiceError> {
        self.records.get::<Business>("businesses", business_id)?;
        let hidden = not_found("business", business_id);
        let caller_role = if caller == user_id {
            self.authorize(caller, business_id, Need::Read, hidden)?
        } else {
            self.authorize(caller, business_id, Need::Manage, hidden)?
        };
        let membership = self.require_member(business_id, user_id)?;

        if membership.role == BusinessRole::Owner {
            if caller != user_id && caller_role != BusinessRole::Owner {
                return Err(ServiceError::PermissionDenied("only owners can remove owners".into()));
            }
            if self.owner_count(business_id)? <= 1 {
                return Err(ServiceError::Validation("a business needs at least one owner".into()));
            }
        }

        self.records.delete("business_users", &membership.id)?;
        tracing::info!(business_id, user_id, "member removed");
        Ok(())
    }
}
