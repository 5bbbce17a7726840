use serde::{Deserialize, Serialize};

/// Bulk customer import. Rows are kept as raw JSON so that a malformed row
/// fails on its own instead of rejecting the whole request.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportCustomers {
    #[serde(default)]
    pub business_id: Option<String>,
    pub customers: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Created,
    Updated,
    Failed,
}

/// Outcome of one import row.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRowResult {
    /// Position of the row in the request.
    pub index: usize,
    pub status: ImportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    /// The business every row was imported into.
    pub business_id: String,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub results: Vec<ImportRowResult>,
}
