//! Row-level authorization. A record is visible to members of its business;
//! what they may do depends on their role there. Global admins act as owners
//! of every business.
//!
//! Records the caller can't see are reported as `NotFound`, never
//! `PermissionDenied`, so ids of other tenants don't leak.

use crm_core::{Cond, ServiceError};
use crm_sql::Value;

use crate::model::{Business, BusinessRole, Membership};
use crate::service::CrmService;

/// What an operation needs from the caller's business role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Need {
    Read,
    Write,
    Manage,
    Own,
}

impl Need {
    fn allows(self, role: BusinessRole) -> bool {
        match self {
            Need::Read => true,
            Need::Write => role.can_write(),
            Need::Manage => role.can_manage(),
            Need::Own => role == BusinessRole::Owner,
        }
    }
}

pub(crate) fn not_found(kind: &str, id: &str) -> ServiceError {
    ServiceError::NotFound(format!("{} '{}' not found", kind, id))
}

impl CrmService {
    pub(crate) fn find_membership(
        &self,
        business_id: &str,
        user_id: &str,
    ) -> Result<Option<Membership>, ServiceError> {
        self.records.find_one("business_users", &[
            Cond::Eq("business_id", Value::Text(business_id.to_string())),
            Cond::Eq("user_id", Value::Text(user_id.to_string())),
        ])
    }

    /// Every membership of a user, oldest first.
    pub(crate) fn memberships_of(&self, user_id: &str) -> Result<Vec<Membership>, ServiceError> {
        self.records
            .list_all("business_users", &[Cond::Eq("user_id", Value::Text(user_id.to_string()))])
    }

    /// The caller's effective role in a business, `None` if they can't see it
    /// or it doesn't exist.
    pub fn role_in(&self, caller: &str, business_id: &str) -> Result<Option<BusinessRole>, ServiceError> {
        if self.auth.is_admin(caller)? {
            let exists = self.records.find::<Business>("businesses", business_id)?.is_some();
            return Ok(exists.then_some(BusinessRole::Owner));
        }
        Ok(self.find_membership(business_id, caller)?.map(|m| m.role))
    }

    /// Check the caller may act on `business_id`. `hidden` is the error
    /// returned when they can't see it at all.
    pub(crate) fn authorize(
        &self,
        caller: &str,
        business_id: &str,
        need: Need,
        hidden: ServiceError,
    ) -> Result<BusinessRole, ServiceError> {
        let Some(role) = self.role_in(caller, business_id)? else {
            return Err(hidden);
        };
        if !need.allows(role) {
            return Err(ServiceError::PermissionDenied(format!(
                "{} role does not allow this operation",
                role.as_str()
            )));
        }
        Ok(role)
    }

    /// Restrict a list query to the businesses the caller can see, or to one
    /// requested business.
    pub(crate) fn scope(
        &self,
        caller: &str,
        business_id: Option<&str>,
        conds: &mut Vec<Cond>,
    ) -> Result<(), ServiceError> {
        if let Some(id) = business_id {
            self.authorize(caller, id, Need::Read, not_found("business", id))?;
            conds.push(Cond::Eq("business_id", Value::Text(id.to_string())));
            return Ok(());
        }
        if self.auth.is_admin(caller)? {
            return Ok(());
        }
        let ids = self
            .memberships_of(caller)?
            .into_iter()
            .map(|m| Value::Text(m.business_id))
            .collect();
        conds.push(Cond::In("business_id", ids));
        Ok(())
    }

    /// The business new records go to: the explicit one if given (needs
    /// write access), otherwise the caller's earliest business they can
    /// write to.
    pub(crate) fn target_business(
        &self,
        caller: &str,
        explicit: Option<&str>,
    ) -> Result<String, ServiceError> {
        if let Some(id) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
            self.authorize(caller, id, Need::Write, not_found("business", id))?;
            return Ok(id.to_string());
        }
        self.memberships_of(caller)?
            .into_iter()
            .find(|m| m.role.can_write())
            .map(|m| m.business_id)
            .ok_or_else(|| {
                ServiceError::Validation(
                    "no business to write to; pass business_id or create a business first".into(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AddMember, CreateBusiness};
    use crate::service::testing;

    fn business(svc: &CrmService, owner: &str, name: &str) -> String {
        svc.create_business(owner, CreateBusiness {
            name: name.into(),
            industry: None,
            website: None,
            phone: None,
            address: None,
            description: None,
        })
        .unwrap()
        .business
        .id
    }

    #[test]
    fn test_role_in_and_admin_bypass() {
        let svc = testing::service();
        let ann = testing::user(&svc, "ann@example.com");
        let bob = testing::user(&svc, "bob@example.com");
        let root = testing::global_admin(&svc);
        let acme = business(&svc, &ann, "Acme");

        assert_eq!(svc.role_in(&ann, &acme).unwrap(), Some(BusinessRole::Owner));
        assert_eq!(svc.role_in(&bob, &acme).unwrap(), None);
        assert_eq!(svc.role_in(&root, &acme).unwrap(), Some(BusinessRole::Owner));

        let err = svc
            .authorize(&bob, &acme, Need::Read, not_found("business", &acme))
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn test_viewer_cannot_write() {
        let svc = testing::service();
        let ann = testing::user(&svc, "ann@example.com");
        let vic = testing::user(&svc, "vic@example.com");
        let acme = business(&svc, &ann, "Acme");
        svc.add_member(&ann, &acme, AddMember {
            email: "vic@example.com".into(),
            role: BusinessRole::Viewer,
        })
        .unwrap();

        assert!(svc.authorize(&vic, &acme, Need::Read, not_found("business", &acme)).is_ok());
        let err = svc
            .authorize(&vic, &acme, Need::Write, not_found("business", &acme))
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));

        // A viewer has no default business to write to.
        assert!(matches!(svc.target_business(&vic, None), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_target_business_prefers_earliest_writable() {
        let svc = testing::service();
        let ann = testing::user(&svc, "ann@example.com");
        let first = business(&svc, &ann, "First");
        let second = business(&svc, &ann, "Second");

        assert_eq!(svc.target_business(&ann, None).unwrap(), first);
        assert_eq!(svc.target_business(&ann, Some(&second)).unwrap(), second);
        assert!(matches!(
            svc.target_business(&ann, Some("nope")),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn test_admin_bypass_needs_existing_business() {
        let svc = testing::service();
        let root = testing::global_admin(&svc);

        assert_eq!(svc.role_in(&root, "does-not-exist").unwrap(), None);
        assert!(matches!(
            svc.target_business(&root, Some("does-not-exist")),
            Err(ServiceError::NotFound(_))
        ));
        let mut conds = Vec::new();
        assert!(matches!(
            svc.scope(&root, Some("does-not-exist"), &mut conds),
            Err(ServiceError::NotFound(_))
        ));
    }
}
