use crm_core::{ServiceError, now_rfc3339};
use crm_sql::Value;

use crate::model::{Onboarding, SubmitOnboarding};
use crate::service::AuthService;

fn trimmed(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl AuthService {
    /// Record the user's onboarding answers. Accepted exactly once.
    pub fn submit_onboarding(
        &self,
        user_id: &str,
        input: SubmitOnboarding,
    ) -> Result<Onboarding, ServiceError> {
        let company_name = input.company_name.trim().to_string();
        if company_name.is_empty() {
            return Err(ServiceError::Validation("company_name is required".into()));
        }
        if self.is_onboarded(user_id)? {
            return Err(ServiceError::Conflict("onboarding already completed".into()));
        }

        let now = now_rfc3339();
        let record = Onboarding {
            user_id: user_id.to_string(),
            company_name,
            industry: trimmed(input.industry),
            team_size: trimmed(input.team_size),
            job_title: trimmed(input.job_title),
            goals: input
                .goals
                .into_iter()
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect(),
            referral_source: trimmed(input.referral_source),
            completed_at: now.clone(),
        };

        self.records.insert("onboarding", user_id, &record, &[
            ("created_at", Value::Text(now)),
        ])?;
        tracing::info!(user_id, "onboarding completed");
        Ok(record)
    }

    pub fn get_onboarding(&self, user_id: &str) -> Result<Onboarding, ServiceError> {
        self.records
            .find("onboarding", user_id)?
            .ok_or_else(|| ServiceError::NotFound("onboarding not completed".into()))
    }

    pub fn is_onboarded(&self, user_id: &str) -> Result<bool, ServiceError> {
        Ok(self.records.find::<Onboarding>("onboarding", user_id)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SignUp;
    use crate::service::testing;

    fn answers(company: &str) -> SubmitOnboarding {
        SubmitOnboarding {
            company_name: company.into(),
            industry: Some(" Logistics ".into()),
            team_size: Some("11-50".into()),
            job_title: None,
            goals: vec!["track deals".into(), "  ".into()],
            referral_source: Some("".into()),
        }
    }

    #[test]
    fn test_submit_once() {
        let svc = testing::service();
        let user = svc
            .sign_up(SignUp {
                email: "ada@example.com".into(),
                password: "long-enough".into(),
                full_name: None,
            })
            .unwrap();

        assert!(!svc.is_onboarded(&user.id).unwrap());
        assert!(matches!(svc.get_onboarding(&user.id), Err(ServiceError::NotFound(_))));

        let record = svc.submit_onboarding(&user.id, answers("Acme Freight")).unwrap();
        assert_eq!(record.industry.as_deref(), Some("Logistics"));
        assert_eq!(record.goals, vec!["track deals".to_string()]);
        assert!(record.referral_source.is_none());
        assert!(svc.is_onboarded(&user.id).unwrap());

        let again = svc.submit_onboarding(&user.id, answers("Acme Freight"));
        assert!(matches!(again, Err(ServiceError::Conflict(_))));
    }

    #[test]
    fn test_company_name_required() {
        let svc = testing::service();
        let err = svc.submit_onboarding("whoever", answers("   ")).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
