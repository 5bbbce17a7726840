use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DealStage {
    #[default]
    Lead,
    Qualified,
    Proposal,
    Negotiation,
    Won,
    Lost,
}

impl DealStage {
    pub const ALL: [DealStage; 6] = [
        DealStage::Lead,
        DealStage::Qualified,
        DealStage::Proposal,
        DealStage::Negotiation,
        DealStage::Won,
        DealStage::Lost,
    ];

    /// Inverse of [`DealStage::as_str`].
    pub fn parse(s: &str) -> Option<DealStage> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DealStage::Lead => "lead",
            DealStage::Qualified => "qualified",
            DealStage::Proposal => "proposal",
            DealStage::Negotiation => "negotiation",
            DealStage::Won => "won",
            DealStage::Lost => "lost",
        }
    }

    /// Still in the pipeline.
    pub fn is_open(&self) -> bool {
        !matches!(self, DealStage::Won | DealStage::Lost)
    }

    /// Probability used when a deal is created without one.
    pub fn default_probability(&self) -> u8 {
        match self {
            DealStage::Lead => 10,
            DealStage::Qualified => 25,
            DealStage::Proposal => 50,
            DealStage::Negotiation => 75,
            DealStage::Won => 100,
            DealStage::Lost => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    /// Always the business of `customer_id`.
    pub business_id: String,
    pub customer_id: String,
    pub title: String,
    pub value: f64,
    pub currency: String,
    #[serde(default)]
    pub stage: DealStage,
    /// Win probability in percent, 0..=100.
    pub probability: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_close_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeal {
    pub customer_id: String,
    pub title: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub stage: DealStage,
    #[serde(default)]
    pub probability: Option<u8>,
    #[serde(default)]
    pub expected_close_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Query filters for listing deals.
#[derive(Debug, Default, Deserialize)]
pub struct DealFilters {
    #[serde(default)]
    pub business_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub stage: Option<DealStage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_helpers() {
        assert!(DealStage::Negotiation.is_open());
        assert!(!DealStage::Won.is_open());
        assert!(!DealStage::Lost.is_open());
        assert_eq!(DealStage::default().default_probability(), 10);
        assert_eq!(serde_json::to_value(DealStage::Proposal).unwrap(), "proposal");
        for stage in DealStage::ALL {
            assert_eq!(DealStage::parse(stage.as_str()), Some(stage));
        }
        assert_eq!(DealStage::parse("closed"), None);
    }
}
