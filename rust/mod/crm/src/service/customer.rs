use crm_core::{Cond, ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use crm_sql::{Statement, Value};

use crate::model::{CreateCustomer, Customer, CustomerFilters};
use crate::service::access::{Need, not_found};
use crate::service::{CrmService, apply_patch, clean, require_text};

pub(crate) const FIXED_FIELDS: &[&str] = &["id", "business_id", "created_by", "created_at", "updated_at"];

fn indexes(c: &Customer) -> Vec<(&'static str, Value)> {
    vec![
        ("business_id", Value::Text(c.business_id.clone())),
        ("name", Value::Text(c.name.clone())),
        ("email", Value::opt_text(c.email.as_deref())),
        ("company", Value::opt_text(c.company.as_deref())),
        ("status", Value::Text(c.status.as_str().to_string())),
        ("external_id", Value::opt_text(c.external_id.as_deref())),
        ("created_at", Value::Text(c.created_at.clone())),
        ("updated_at", Value::Text(c.updated_at.clone())),
    ]
}

/// Trim text fields and drop blank tags.
pub(crate) fn normalize(mut c: Customer) -> Result<Customer, ServiceError> {
    c.name = require_text("name", &c.name)?;
    c.email = clean(c.email);
    c.phone = clean(c.phone);
    c.company = clean(c.company);
    c.address = clean(c.address);
    c.source = clean(c.source);
    c.external_id = clean(c.external_id);
    c.notes = clean(c.notes);
    c.tags = c
        .tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    Ok(c)
}

impl CrmService {
    /// Build a validated customer for `business_id` without storing it.
    pub(crate) fn new_customer(
        &self,
        caller: &str,
        business_id: &str,
        input: CreateCustomer,
    ) -> Result<Customer, ServiceError> {
        let now = now_rfc3339();
        normalize(Customer {
            id: new_id(),
            business_id: business_id.to_string(),
            name: input.name,
            email: input.email,
            phone: input.phone,
            company: input.company,
            address: input.address,
            status: input.status,
            source: input.source,
            external_id: input.external_id,
            tags: input.tags,
            notes: input.notes,
            created_by: caller.to_string(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub(crate) fn insert_customer(&self, customer: &Customer) -> Result<(), ServiceError> {
        self.records
            .insert("customers", &customer.id, customer, &indexes(customer))
            .map_err(|e| duplicate_external_id(e, customer))
    }

    pub(crate) fn save_customer(&self, customer: &Customer) -> Result<(), ServiceError> {
        self.records
            .update("customers", &customer.id, customer, &indexes(customer))
            .map_err(|e| duplicate_external_id(e, customer))
    }

    pub(crate) fn find_by_external_id(
        &self,
        business_id: &str,
        external_id: &str,
    ) -> Result<Option<Customer>, ServiceError> {
        self.records.find_one("customers", &[
            Cond::Eq("business_id", Value::Text(business_id.to_string())),
            Cond::Eq("external_id", Value::Text(external_id.to_string())),
        ])
    }

    /// Create a customer in the given business, or the caller's default one.
    pub fn create_customer(&self, caller: &str, input: CreateCustomer) -> Result<Customer, ServiceError> {
        let business_id = self.target_business(caller, input.business_id.as_deref())?;
        let customer = self.new_customer(caller, &business_id, input)?;
        self.insert_customer(&customer)?;
        tracing::info!(customer_id = %customer.id, business_id = %business_id, "customer created");
        Ok(customer)
    }

    /// Load a customer the caller may act on with `need`.
    pub(crate) fn load_customer(&self, caller: &str, id: &str, need: Need) -> Result<Customer, ServiceError> {
        let customer: Customer = self.records.get("customers", id)?;
        self.authorize(caller, &customer.business_id, need, not_found("customer", id))?;
        Ok(customer)
    }

    pub fn get_customer(&self, caller: &str, id: &str) -> Result<Customer, ServiceError> {
        self.load_customer(caller, id, Need::Read)
    }

    /// Customers visible to the caller, newest first. `q` matches name,
    /// email and company.
    pub fn list_customers(
        &self,
        caller: &str,
        filters: &CustomerFilters,
        params: &ListParams,
    ) -> Result<ListResult<Customer>, ServiceError> {
        let mut conds = Vec::new();
        self.scope(caller, filters.business_id.as_deref(), &mut conds)?;
        if let Some(status) = filters.status {
            conds.push(Cond::Eq("status", Value::Text(status.as_str().to_string())));
        }
        if let Some(q) = params.query() {
            conds.push(Cond::Search(vec!["name", "email", "company"], q.to_string()));
        }

        let (items, total) =
            self.records
                .list("customers", &conds, params.clamped_limit(), params.offset)?;
        Ok(ListResult { items, total })
    }

    /// Merge-patch a customer.
    pub fn update_customer(
        &self,
        caller: &str,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Customer, ServiceError> {
        let current = self.load_customer(caller, id, Need::Write)?;
        let mut updated = normalize(apply_patch(&current, &patch, FIXED_FIELDS)?)?;
        updated.updated_at = now_rfc3339();
        self.save_customer(&updated)?;
        Ok(updated)
    }

    /// Delete a customer together with its deals and contacts.
    pub fn delete_customer(&self, caller: &str, id: &str) -> Result<(), ServiceError> {
        self.load_customer(caller, id, Need::Write)?;

        let statements: Vec<Statement> = [
            "DELETE FROM contacts WHERE customer_id = ?1",
            "DELETE FROM deals WHERE customer_id = ?1",
            "DELETE FROM customers WHERE id = ?1",
        ]
        .into_iter()
        .map(|sql| Statement::new(sql, vec![Value::Text(id.to_string())]))
        .collect();
        let counts = self.records.sql().transaction(&statements)?;

        tracing::info!(customer_id = id, contacts = counts[0], deals = counts[1], "customer deleted");
        Ok(())
    }

    /// Check a deal or contact in `business_id` may be pointed at
    /// `customer_id`. Records never move across businesses.
    pub(crate) fn check_customer_link(
        &self,
        caller: &str,
        business_id: &str,
        customer_id: &str,
    ) -> Result<(), ServiceError> {
        let customer = self.load_customer(caller, customer_id, Need::Write)?;
        if customer.business_id != business_id {
            return Err(ServiceError::Validation(
                "customer belongs to a different business".into(),
            ));
        }
        Ok(())
    }
}

fn duplicate_external_id(e: ServiceError, c: &Customer) -> ServiceError {
    match (e, c.external_id.as_deref()) {
        (ServiceError::Conflict(_), Some(ext)) => ServiceError::Conflict(format!(
            "a customer with external_id '{}' already exists in this business",
            ext
        )),
        (e, _) => e,
    }
}
