use serde::{Deserialize, Serialize};

/// Survey answers captured once after sign-up. Until a user has a record
/// here, the CRM routes refuse them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Onboarding {
    pub user_id: String,
    pub company_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,

    /// Bucketed head count, e.g. "1-10", "11-50".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goals: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_source: Option<String>,

    pub completed_at: String,
}

/// Request body for `POST /auth/onboarding`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitOnboarding {
    pub company_name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub team_size: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub referral_source: Option<String>,
}
