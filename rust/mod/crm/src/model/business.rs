use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A tenant. Customers, deals and contacts always belong to exactly one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// User who created the business.
    pub owner_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBusiness {
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Role of a user inside one business, strongest first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusinessRole {
    Owner,
    Admin,
    #[default]
    Member,
    Viewer,
}

impl BusinessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessRole::Owner => "owner",
            BusinessRole::Admin => "admin",
            BusinessRole::Member => "member",
            BusinessRole::Viewer => "viewer",
        }
    }

    /// May create and edit customers, deals and contacts.
    pub fn can_write(&self) -> bool {
        !matches!(self, BusinessRole::Viewer)
    }

    /// May edit the business itself and manage its members.
    pub fn can_manage(&self) -> bool {
        matches!(self, BusinessRole::Owner | BusinessRole::Admin)
    }
}

/// Row of `business_users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub id: String,
    pub business_id: String,
    pub user_id: String,
    pub role: BusinessRole,
    pub joined_at: String,
}

/// A business as listed for the caller, with the caller's own role.
/// `role` is absent when a global admin looks at a business they don't
/// belong to.
#[derive(Debug, Clone, Serialize)]
pub struct BusinessView {
    #[serde(flatten)]
    pub business: Business,
    pub role: Option<BusinessRole>,
}

/// A member as listed for a business.
#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub user_id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: BusinessRole,
    pub joined_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddMember {
    pub email: String,
    #[serde(default)]
    pub role: BusinessRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMember {
    pub role: BusinessRole,
}

/// Per-stage deal totals in a [`BusinessSummary`].
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StageTotals {
    pub count: usize,
    pub value: f64,
}

/// Dashboard numbers for one business.
#[derive(Debug, Clone, Serialize)]
pub struct BusinessSummary {
    pub business_id: String,
    pub customers: usize,
    pub customers_by_status: BTreeMap<String, usize>,
    pub deals: usize,
    pub deals_by_stage: BTreeMap<String, StageTotals>,
    /// Total value of deals that are neither won nor lost.
    pub open_pipeline_value: f64,
    /// Open pipeline value weighted by each deal's probability.
    pub weighted_pipeline_value: f64,
    pub contacts: usize,
}
