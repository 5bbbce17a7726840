//! Bulk customer import.
//!
//! Rows are processed in order, each on its own: a bad row is reported and
//! the rest carry on. Rows with an `external_id` that already exists in the
//! target business update that customer instead of creating a new one.

use crm_core::{ServiceError, now_rfc3339};

use crate::model::{
    CreateCustomer, ImportCustomers, ImportReport, ImportRowResult, ImportStatus,
};
use crate::service::{CrmService, apply_patch};
use crate::service::customer::{FIXED_FIELDS, normalize};

impl CrmService {
    pub fn import_customers(&self, caller: &str, input: ImportCustomers) -> Result<ImportReport, ServiceError> {
        if input.customers.is_empty() {
            return Err(ServiceError::Validation("customers must not be empty".into()));
        }
        if input.customers.len() > self.config.max_import_rows {
            return Err(ServiceError::Validation(format!(
                "too many rows: {} (max {})",
                input.customers.len(),
                self.config.max_import_rows
            )));
        }

        let business_id = self.target_business(caller, input.business_id.as_deref())?;

        let mut report = ImportReport {
            business_id: business_id.clone(),
            created: 0,
            updated: 0,
            failed: 0,
            results: Vec::with_capacity(input.customers.len()),
        };
        for (index, row) in input.customers.into_iter().enumerate() {
            let result = match self.import_row(caller, &business_id, row) {
                Ok((status, id)) => ImportRowResult { index, status, id: Some(id), error: None },
                Err(e) => ImportRowResult {
                    index,
                    status: ImportStatus::Failed,
                    id: None,
                    error: Some(e.to_string()),
                },
            };
            match result.status {
                ImportStatus::Created => report.created += 1,
                ImportStatus::Updated => report.updated += 1,
                ImportStatus::Failed => report.failed += 1,
            }
            report.results.push(result);
        }

        tracing::info!(
            business_id = %business_id,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "customers imported"
        );
        Ok(report)
    }

    fn import_row(
        &self,
        caller: &str,
        business_id: &str,
        mut row: serde_json::Value,
    ) -> Result<(ImportStatus, String), ServiceError> {
        let Some(fields) = row.as_object_mut() else {
            return Err(ServiceError::Validation("row must be a JSON object".into()));
        };
        // Every row goes to the import's business.
        fields.remove("business_id");

        let external_id = fields
            .get("external_id")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        // A known external id is a partial update; only new rows need a name.
        if let Some(ext) = external_id {
            if let Some(existing) = self.find_by_external_id(business_id, &ext)? {
                let mut updated = normalize(apply_patch(&existing, &row, FIXED_FIELDS)?)?;
                updated.updated_at = now_rfc3339();
                self.save_customer(&updated)?;
                return Ok((ImportStatus::Updated, updated.id));
            }
        }

        let input: CreateCustomer = serde_json::from_value(row)
            .map_err(|e| ServiceError::Validation(format!("invalid row: {}", e)))?;
        let customer = self.new_customer(caller, business_id, input)?;
        self.insert_customer(&customer)?;
        Ok((ImportStatus::Created, customer.id))
    }
}
