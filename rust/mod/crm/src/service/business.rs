use std::collections::{BTreeMap, HashMap};

use crm_core::{Cond, ListParams, ListResult, RecordStore, ServiceError, new_id, now_rfc3339};
use crm_sql::{Statement, Value};

use crate::model::{
    Business, BusinessRole, BusinessSummary, BusinessView, CreateBusiness, DealStage, Membership,
    StageTotals,
};
use crate::service::access::{Need, not_found};
use crate::service::{CrmService, apply_patch, clean, require_text};

const FIXED_FIELDS: &[&str] = &["id", "owner_id", "created_at", "updated_at"];

fn indexes(b: &Business) -> Vec<(&'static str, Value)> {
    vec![
        ("name", Value::Text(b.name.clone())),
        ("owner_id", Value::Text(b.owner_id.clone())),
        ("created_at", Value::Text(b.created_at.clone())),
        ("updated_at", Value::Text(b.updated_at.clone())),
    ]
}

impl CrmService {
    /// Create a business; the caller becomes its owner.
    pub fn create_business(&self, caller: &str, input: CreateBusiness) -> Result<BusinessView, ServiceError> {
        let now = now_rfc3339();
        let business = Business {
            id: new_id(),
            name: require_text("name", &input.name)?,
            industry: clean(input.industry),
            website: clean(input.website),
            phone: clean(input.phone),
            address: clean(input.address),
            description: clean(input.description),
            owner_id: caller.to_string(),
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        let membership = Membership {
            id: new_id(),
            business_id: business.id.clone(),
            user_id: caller.to_string(),
            role: BusinessRole::Owner,
            joined_at: now.clone(),
        };

        let statements = [
            RecordStore::insert_statement("businesses", &business.id, &business, &indexes(&business))?,
            RecordStore::insert_statement("business_users", &membership.id, &membership, &[
                ("business_id", Value::Text(membership.business_id.clone())),
                ("user_id", Value::Text(membership.user_id.clone())),
                ("role", Value::Text(BusinessRole::Owner.as_str().to_string())),
                ("created_at", Value::Text(now)),
            ])?,
        ]
        .map(|(sql, params)| Statement::new(sql, params));
        self.records.sql().transaction(&statements)?;

        tracing::info!(business_id = %business.id, owner = caller, "business created");
        Ok(BusinessView {
            business,
            role: Some(BusinessRole::Owner),
        })
    }

    /// Businesses the caller belongs to (every business for global admins),
    /// newest first. `q` matches the name.
    pub fn list_businesses(
        &self,
        caller: &str,
        params: &ListParams,
    ) -> Result<ListResult<BusinessView>, ServiceError> {
        let roles: HashMap<String, BusinessRole> = self
            .memberships_of(caller)?
            .into_iter()
            .map(|m| (m.business_id, m.role))
            .collect();

        let mut conds = Vec::new();
        if !self.auth.is_admin(caller)? {
            conds.push(Cond::In("id", roles.keys().cloned().map(Value::Text).collect()));
        }
        if let Some(q) = params.query() {
            conds.push(Cond::Search(vec!["name"], q.to_string()));
        }

        let (items, total): (Vec<Business>, usize) =
            self.records
                .list("businesses", &conds, params.clamped_limit(), params.offset)?;
        let items = items
            .into_iter()
            .map(|business| BusinessView {
                role: roles.get(&business.id).copied(),
                business,
            })
            .collect();
        Ok(ListResult { items, total })
    }

    pub fn get_business(&self, caller: &str, id: &str) -> Result<BusinessView, ServiceError> {
        let business: Business = self.records.get("businesses", id)?;
        self.authorize(caller, id, Need::Read, not_found("business", id))?;
        let role = self.find_membership(id, caller)?.map(|m| m.role);
        Ok(BusinessView { business, role })
    }

    /// Merge-patch a business. Owners and business admins only.
    pub fn update_business(
        &self,
        caller: &str,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<BusinessView, ServiceError> {
        let current: Business = self.records.get("businesses", id)?;
        self.authorize(caller, id, Need::Manage, not_found("business", id))?;

        let mut updated = apply_patch(&current, &patch, FIXED_FIELDS)?;
        updated.name = require_text("name", &updated.name)?;
        updated.updated_at = now_rfc3339();
        self.records.update("businesses", id, &updated, &indexes(&updated))?;

        let role = self.find_membership(id, caller)?.map(|m| m.role);
        Ok(BusinessView { business: updated, role })
    }

    /// Delete a business with its customers, deals, contacts and memberships.
    /// Owners only.
    pub fn delete_business(&self, caller: &str, id: &str) -> Result<(), ServiceError> {
        self.records.get::<Business>("businesses", id)?;
        self.authorize(caller, id, Need::Own, not_found("business", id))?;

        let statements: Vec<Statement> = [
            "DELETE FROM contacts WHERE business_id = ?1",
            "DELETE FROM deals WHERE business_id = ?1",
            "DELETE FROM customers WHERE business_id = ?1",
            "DELETE FROM business_users WHERE business_id = ?1",
            "DELETE FROM businesses WHERE id = ?1",
        ]
        .into_iter()
        .map(|sql| Statement::new(sql, vec![Value::Text(id.to_string())]))
        .collect();
        let counts = self.records.sql().transaction(&statements)?;

        tracing::info!(
            business_id = id,
            contacts = counts[0],
            deals = counts[1],
            customers = counts[2],
            members = counts[3],
            "business deleted"
        );
        Ok(())
    }

    /// Dashboard numbers for one business.
    pub fn business_summary(&self, caller: &str, id: &str) -> Result<BusinessSummary, ServiceError> {
        self.records.get::<Business>("businesses", id)?;
        self.authorize(caller, id, Need::Read, not_found("business", id))?;
        let param = [Value::Text(id.to_string())];

        let mut customers_by_status = BTreeMap::new();
        let rows = self.records.sql().query(
            "SELECT status, COUNT(*) AS cnt FROM customers WHERE business_id = ?1 GROUP BY status",
            &param,
        )?;
        for row in &rows {
            if let (Some(status), Some(cnt)) = (row.get_str("status"), row.get_i64("cnt")) {
                customers_by_status.insert(status.to_string(), cnt as usize);
            }
        }

        let mut deals_by_stage = BTreeMap::new();
        let rows = self.records.sql().query(
            "SELECT stage, COUNT(*) AS cnt, COALESCE(SUM(value), 0) AS total,
                    COALESCE(SUM(value * probability / 100.0), 0) AS weighted
             FROM deals WHERE business_id = ?1 GROUP BY stage",
            &param,
        )?;
        let mut open_pipeline_value = 0.0;
        let mut weighted_pipeline_value = 0.0;
        for row in &rows {
            let Some(stage) = row.get_str("stage") else { continue };
            let totals = StageTotals {
                count: row.get_i64("cnt").unwrap_or(0) as usize,
                value: row.get_f64("total").unwrap_or(0.0),
            };
            if DealStage::parse(stage).is_some_and(|s| s.is_open()) {
                open_pipeline_value += totals.value;
                weighted_pipeline_value += row.get_f64("weighted").unwrap_or(0.0);
            }
            deals_by_stage.insert(stage.to_string(), totals);
        }

        let by_business = [Cond::Eq("business_id", Value::Text(id.to_string()))];
        Ok(BusinessSummary {
            business_id: id.to_string(),
            customers: customers_by_status.values().sum(),
            customers_by_status,
            deals: deals_by_stage.values().map(|t| t.count).sum(),
            deals_by_stage,
            open_pipeline_value,
            weighted_pipeline_value,
            contacts: self.records.count("contacts", &by_business)?,
        })
    }
}
