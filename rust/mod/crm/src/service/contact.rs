use crm_core::{Cond, ListParams, ListResult, RecordStore, ServiceError, new_id, now_rfc3339};
use crm_sql::{Statement, Value};

use crate::model::{Contact, ContactFilters, CreateContact};
use crate::service::access::{Need, not_found};
use crate::service::{CrmService, apply_patch, clean, require_text};

const FIXED_FIELDS: &[&str] = &["id", "business_id", "created_by", "created_at", "updated_at"];

fn indexes(c: &Contact) -> Vec<(&'static str, Value)> {
    vec![
        ("business_id", Value::Text(c.business_id.clone())),
        ("customer_id", Value::Text(c.customer_id.clone())),
        ("first_name", Value::Text(c.first_name.clone())),
        ("last_name", Value::opt_text(c.last_name.as_deref())),
        ("email", Value::opt_text(c.email.as_deref())),
        ("is_primary", Value::bool(c.is_primary)),
        ("created_at", Value::Text(c.created_at.clone())),
        ("updated_at", Value::Text(c.updated_at.clone())),
    ]
}

fn normalize(mut c: Contact) -> Result<Contact, ServiceError> {
    c.first_name = require_text("first_name", &c.first_name)?;
    c.last_name = clean(c.last_name);
    c.email = clean(c.email);
    c.phone = clean(c.phone);
    c.position = clean(c.position);
    c.notes = clean(c.notes);
    Ok(c)
}

/// Clear `is_primary` on the customer's other contacts.
fn demote_others(contact: &Contact) -> Statement {
    Statement::new(
        "UPDATE contacts
         SET is_primary = 0, data = json_set(data, '$.is_primary', json('false'))
         WHERE customer_id = ?1 AND id != ?2 AND is_primary = 1",
        vec![
            Value::Text(contact.customer_id.clone()),
            Value::Text(contact.id.clone()),
        ],
    )
}

impl CrmService {
    /// Create a contact for a customer. A new primary contact takes over
    /// from the previous one.
    pub fn create_contact(&self, caller: &str, input: CreateContact) -> Result<Contact, ServiceError> {
        let customer = self.load_customer(caller, &input.customer_id, Need::Write)?;

        let now = now_rfc3339();
        let contact = normalize(Contact {
            id: new_id(),
            business_id: customer.business_id,
            customer_id: customer.id,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            phone: input.phone,
            position: input.position,
            is_primary: input.is_primary,
            notes: input.notes,
            created_by: caller.to_string(),
            created_at: now.clone(),
            updated_at: now,
        })?;

        let (sql, params) =
            RecordStore::insert_statement("contacts", &contact.id, &contact, &indexes(&contact))?;
        let mut statements = vec![Statement::new(sql, params)];
        if contact.is_primary {
            statements.push(demote_others(&contact));
        }
        self.records.sql().transaction(&statements)?;

        tracing::info!(contact_id = %contact.id, customer_id = %contact.customer_id, "contact created");
        Ok(contact)
    }

    fn load_contact(&self, caller: &str, id: &str, need: Need) -> Result<Contact, ServiceError> {
        let contact: Contact = self.records.get("contacts", id)?;
        self.authorize(caller, &contact.business_id, need, not_found("contact", id))?;
        Ok(contact)
    }

    pub fn get_contact(&self, caller: &str, id: &str) -> Result<Contact, ServiceError> {
        self.load_contact(caller, id, Need::Read)
    }

    /// Contacts visible to the caller, newest first. `q` matches names and
    /// email.
    pub fn list_contacts(
        &self,
        caller: &str,
        filters: &ContactFilters,
        params: &ListParams,
    ) -> Result<ListResult<Contact>, ServiceError> {
        let mut conds = Vec::new();
        self.scope(caller, filters.business_id.as_deref(), &mut conds)?;
        if let Some(customer_id) = &filters.customer_id {
            conds.push(Cond::Eq("customer_id", Value::Text(customer_id.clone())));
        }
        if let Some(q) = params.query() {
            conds.push(Cond::Search(vec!["first_name", "last_name", "email"], q.to_string()));
        }

        let (items, total) =
            self.records
                .list("contacts", &conds, params.clamped_limit(), params.offset)?;
        Ok(ListResult { items, total })
    }

    /// Merge-patch a contact. It may move to another customer of the same
    /// business; becoming primary demotes the customer's other contacts.
    pub fn update_contact(
        &self,
        caller: &str,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Contact, ServiceError> {
        let current = self.load_contact(caller, id, Need::Write)?;
        let mut updated = normalize(apply_patch(&current, &patch, FIXED_FIELDS)?)?;
        if updated.customer_id != current.customer_id {
            self.check_customer_link(caller, &current.business_id, &updated.customer_id)?;
        }
        updated.updated_at = now_rfc3339();

        let (sql, params) =
            RecordStore::update_statement("contacts", id, &updated, &indexes(&updated))?;
        let mut statements = vec![Statement::new(sql, params)];
        if updated.is_primary {
            statements.push(demote_others(&updated));
        }
        self.records.sql().transaction(&statements)?;
        Ok(updated)
    }

    pub fn delete_contact(&self, caller: &str, id: &str) -> Result<(), ServiceError> {
        self.load_contact(caller, id, Need::Write)?;
        self.records.delete("contacts", id)?;
        tracing::info!(contact_id = id, "contact deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::model::{CreateBusiness, CreateCustomer, CustomerStatus};
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
        let customer = svc
            .create_customer(&ann, CreateCustomer {
                business_id: None,
                name: "Wayne Enterprises".into(),
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
            .id;
        (svc, ann, customer)
    }

    fn input(customer_id: &str, first_name: &str, is_primary: bool) -> CreateContact {
        CreateContact {
            customer_id: customer_id.into(),
            first_name: first_name.into(),
            last_name: Some("Wayne".into()),
            email: Some(format!("{}@wayne.test", first_name.to_lowercase())),
            phone: None,
            position: None,
            is_primary,
            notes: None,
        }
    }

    fn primaries(svc: &CrmService, caller: &str, customer: &str) -> Vec<String> {
        svc.list_contacts(
            caller,
            &ContactFilters { customer_id: Some(customer.into()), ..Default::default() },
            &ListParams::default(),
        )
        .unwrap()
        .items
        .into_iter()
        .filter(|c| c.is_primary)
        .map(|c| c.first_name)
        .collect()
    }

    #[test]
    fn test_single_primary_contact() {
        let (svc, ann, cust) = setup();
        svc.create_contact(&ann, input(&cust, "Bruce", true)).unwrap();
        assert_eq!(primaries(&svc, &ann, &cust), vec!["Bruce"]);

        let alfred = svc.create_contact(&ann, input(&cust, "Alfred", true)).unwrap();
        assert_eq!(primaries(&svc, &ann, &cust), vec!["Alfred"]);

        let dick = svc.create_contact(&ann, input(&cust, "Dick", false)).unwrap();
        assert_eq!(primaries(&svc, &ann, &cust), vec!["Alfred"]);

        svc.update_contact(&ann, &dick.id, json!({"is_primary": true})).unwrap();
        assert_eq!(primaries(&svc, &ann, &cust), vec!["Dick"]);
        assert!(!svc.get_contact(&ann, &alfred.id).unwrap().is_primary);
    }

    #[test]
    fn test_contact_crud_and_search() {
        let (svc, ann, cust) = setup();
        let bruce = svc.create_contact(&ann, input(&cust, "Bruce", false)).unwrap();
        svc.create_contact(&ann, input(&cust, "Alfred", false)).unwrap();

        let found = svc
            .list_contacts(
                &ann,
                &ContactFilters::default(),
                &ListParams { q: Some("bruce@".into()), ..Default::default() },
            )
            .unwrap();
        assert_eq!(found.total, 1);

        let updated = svc
            .update_contact(&ann, &bruce.id, json!({"position": "CEO", "last_name": null}))
            .unwrap();
        assert_eq!(updated.position.as_deref(), Some("CEO"));
        assert!(updated.last_name.is_none());

        assert!(matches!(
            svc.update_contact(&ann, &bruce.id, json!({"first_name": ""})),
            Err(ServiceError::Validation(_))
        ));

        let bob = testing::user(&svc, "bob@example.com");
        assert!(matches!(svc.get_contact(&bob, &bruce.id), Err(ServiceError::NotFound(_))));

        svc.delete_contact(&ann, &bruce.id).unwrap();
        assert!(matches!(svc.get_contact(&ann, &bruce.id), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn test_customer_delete_removes_contacts() {
        let (svc, ann, cust) = setup();
        svc.create_contact(&ann, input(&cust, "Bruce", true)).unwrap();
        svc.delete_customer(&ann, &cust).unwrap();
        assert_eq!(svc.records.count("contacts", &[]).unwrap(), 0);
    }
}
