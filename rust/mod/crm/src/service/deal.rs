use crm_core::{Cond, ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use crm_sql::Value;

use crate::model::{CreateDeal, Deal, DealFilters};
use crate::service::access::{Need, not_found};
use crate::service::{CrmService, apply_patch, clean, require_text};

const FIXED_FIELDS: &[&str] = &["id", "business_id", "created_by", "created_at", "updated_at"];
const DEFAULT_CURRENCY: &str = "USD";

fn indexes(d: &Deal) -> Vec<(&'static str, Value)> {
    vec![
        ("business_id", Value::Text(d.business_id.clone())),
        ("customer_id", Value::Text(d.customer_id.clone())),
        ("title", Value::Text(d.title.clone())),
        ("stage", Value::Text(d.stage.as_str().to_string())),
        ("value", Value::Real(d.value)),
        ("probability", Value::Integer(d.probability as i64)),
        ("created_at", Value::Text(d.created_at.clone())),
        ("updated_at", Value::Text(d.updated_at.clone())),
    ]
}

fn normalize(mut d: Deal) -> Result<Deal, ServiceError> {
    d.title = require_text("title", &d.title)?;
    if !d.value.is_finite() || d.value < 0.0 {
        return Err(ServiceError::Validation("value must be a non-negative number".into()));
    }
    if d.probability > 100 {
        return Err(ServiceError::Validation("probability must be between 0 and 100".into()));
    }
    d.currency = clean(Some(d.currency))
        .map(|c| c.to_uppercase())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    d.expected_close_date = clean(d.expected_close_date);
    d.notes = clean(d.notes);
    Ok(d)
}

impl CrmService {
    /// Create a deal for a customer. The deal joins the customer's business.
    pub fn create_deal(&self, caller: &str, input: CreateDeal) -> Result<Deal, ServiceError> {
        let customer = self.load_customer(caller, &input.customer_id, Need::Write)?;

        let now = now_rfc3339();
        let deal = normalize(Deal {
            id: new_id(),
            business_id: customer.business_id,
            customer_id: customer.id,
            title: input.title,
            value: input.value,
            currency: input.currency.unwrap_or_default(),
            stage: input.stage,
            probability: input
                .probability
                .unwrap_or_else(|| input.stage.default_probability()),
            expected_close_date: input.expected_close_date,
            notes: input.notes,
            created_by: caller.to_string(),
            created_at: now.clone(),
            updated_at: now,
        })?;

        self.records.insert("deals", &deal.id, &deal, &indexes(&deal))?;
        tracing::info!(deal_id = %deal.id, customer_id = %deal.customer_id, "deal created");
        Ok(deal)
    }

    fn load_deal(&self, caller: &str, id: &str, need: Need) -> Result<Deal, ServiceError> {
        let deal: Deal = self.records.get("deals", id)?;
        self.authorize(caller, &deal.business_id, need, not_found("deal", id))?;
        Ok(deal)
    }

    pub fn get_deal(&self, caller: &str, id: &str) -> Result<Deal, ServiceError> {
        self.load_deal(caller, id, Need::Read)
    }

    /// Deals visible to the caller, newest first. `q` matches the title.
    pub fn list_deals(
        &self,
        caller: &str,
        filters: &DealFilters,
        params: &ListParams,
    ) -> Result<ListResult<Deal>, ServiceError> {
        let mut conds = Vec::new();
        self.scope(caller, filters.business_id.as_deref(), &mut conds)?;
        if let Some(customer_id) = &filters.customer_id {
            conds.push(Cond::Eq("customer_id", Value::Text(customer_id.clone())));
        }
        if let Some(stage) = filters.stage {
            conds.push(Cond::Eq("stage", Value::Text(stage.as_str().to_string())));
        }
        if let Some(q) = params.query() {
            conds.push(Cond::Search(vec!["title"], q.to_string()));
        }

        let (items, total) =
            self.records
                .list("deals", &conds, params.clamped_limit(), params.offset)?;
        Ok(ListResult { items, total })
    }

    /// Merge-patch a deal. It may move to another customer of the same
    /// business.
    pub fn update_deal(
        &self,
        caller: &str,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Deal, ServiceError> {
        let current = self.load_deal(caller, id, Need::Write)?;
        let mut updated = normalize(apply_patch(&current, &patch, FIXED_FIELDS)?)?;
        if updated.customer_id != current.customer_id {
            self.check_customer_link(caller, &current.business_id, &updated.customer_id)?;
        }
        updated.updated_at = now_rfc3339();
        self.records.update("deals", id, &updated, &indexes(&updated))?;
        Ok(updated)
    }

    pub fn delete_deal(&self, caller: &str, id: &str) -> Result<(), ServiceError> {
        self.load_deal(caller, id, Need::Write)?;
        self.records.delete("deals", id)?;
        tracing::info!(deal_id = id, "deal deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::model::{CreateBusiness, CreateCustomer, CustomerStatus, DealStage};
    use crate::service::testing;

    fn setup() -> (std::sync::Arc<CrmService>, String, String) {
        let svc = testing::service();
        let ann = testing::user(&svc, "ann@example.com");
        svc.create_business(&ann, CreateBusiness {
            name: "Acme".into(),
            industry: None,
            website: None,
            phone: None,
            address: None,
            description: None,
        })
        .unwrap();
        let customer = customer(&svc, &ann, "Wayne");
        (svc, ann, customer)
    }

    fn customer(svc: &CrmService, caller: &str, name: &str) -> String {
        svc.create_customer(caller, CreateCustomer {
            business_id: None,
            name: name.into(),
            email: None,
            phone: None,
            company: None,
            address: None,
            status: CustomerStatus::Active,
            source: None,
            external_id: None,
            tags: Vec::new(),
            notes: None,
        })
        .unwrap()
        .id
    }

    fn input(customer_id: &str) -> CreateDeal {
        CreateDeal {
            customer_id: customer_id.into(),
            title: "Annual licence".into(),
            value: 1200.0,
            currency: Some(" eur ".into()),
            stage: DealStage::Proposal,
            probability: None,
            expected_close_date: Some("2026-12-31".into()),
            notes: None,
        }
    }

    #[test]
    fn test_create_deal() {
        let (svc, ann, cust) = setup();
        let deal = svc.create_deal(&ann, input(&cust)).unwrap();
        assert_eq!(deal.currency, "EUR");
        assert_eq!(deal.probability, 50);
        assert_eq!(deal.business_id, svc.get_customer(&ann, &cust).unwrap().business_id);

        let defaults = svc
            .create_deal(&ann, CreateDeal { currency: None, ..input(&cust) })
            .unwrap();
        assert_eq!(defaults.currency, "USD");
    }

    #[test]
    fn test_create_deal_validation() {
        let (svc, ann, cust) = setup();
        for bad in [
            CreateDeal { value: -1.0, ..input(&cust) },
            CreateDeal { probability: Some(101), ..input(&cust) },
            CreateDeal { title: "  ".into(), ..input(&cust) },
        ] {
            assert!(matches!(svc.create_deal(&ann, bad), Err(ServiceError::Validation(_))));
        }

        let bob = testing::user(&svc, "bob@example.com");
        assert!(matches!(svc.create_deal(&bob, input(&cust)), Err(ServiceError::NotFound(_))));
        assert!(matches!(
            svc.create_deal(&ann, input("missing")),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_and_update() {
        let (svc, ann, cust) = setup();
        let other = customer(&svc, &ann, "Stark");
        let deal = svc.create_deal(&ann, input(&cust)).unwrap();
        svc.create_deal(&ann, CreateDeal { stage: DealStage::Won, ..input(&other) }).unwrap();

        let won = svc
            .list_deals(&ann, &DealFilters { stage: Some(DealStage::Won), ..Default::default() }, &ListParams::default())
            .unwrap();
        assert_eq!(won.total, 1);
        let for_cust = svc
            .list_deals(&ann, &DealFilters { customer_id: Some(cust.clone()), ..Default::default() }, &ListParams::default())
            .unwrap();
        assert_eq!(for_cust.items[0].id, deal.id);

        let moved = svc
            .update_deal(&ann, &deal.id, json!({"customer_id": other, "stage": "negotiation"}))
            .unwrap();
        assert_eq!(moved.customer_id, other);
        assert_eq!(moved.stage, DealStage::Negotiation);

        assert!(matches!(
            svc.update_deal(&ann, &deal.id, json!({"value": -5})),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_deal_cannot_move_across_businesses() {
        let (svc, ann, cust) = setup();
        let deal = svc.create_deal(&ann, input(&cust)).unwrap();
        let globex = svc
            .create_business(&ann, CreateBusiness {
                name: "Globex".into(),
                industry: None,
                website: None,
                phone: None,
                address: None,
                description: None,
            })
            .unwrap()
            .business
            .id;
        let foreign = svc
            .create_customer(&ann, CreateCustomer {
                business_id: Some(globex),
                name: "Elsewhere".into(),
                email: None,
                phone: None,
                company: None,
                address: None,
                status: CustomerStatus::Lead,
                source: None,
                external_id: None,
                tags: Vec::new(),
                notes: None,
            })
            .unwrap()
            .id;

        let err = svc
            .update_deal(&ann, &deal.id, json!({"customer_id": foreign}))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        svc.delete_deal(&ann, &deal.id).unwrap();
        assert!(matches!(svc.get_deal(&ann, &deal.id), Err(ServiceError::NotFound(_))));
    }
}
