//! CRM module: businesses and their members, customers, deals and contacts.
//!
//! Every record belongs to a business and is only visible to its members.
//! Roles inside a business (`owner`, `admin`, `member`, `viewer`) decide who
//! may change what; global admins from the auth module see everything.
//!
//! # Usage
//!
//! ```ignore
//! use crm::{CrmModule, service::{CrmConfig, user_cascade_steps, user_delete_guards}};
//!
//! let auth = AuthModule::new(sql.clone(), AuthConfig {
//!     user_cascade: user_cascade_steps(),
//!     user_delete_guards: user_delete_guards(),
//!     ..Default::default()
//! })?;
//! let crm = CrmModule::new(sql, auth.service().clone(), CrmConfig::default())?;
//! let router = crm.routes(); // Mounts /crm/*
//! ```

pub mod api;
pub mod model;
pub mod service;

use std::sync::Arc;

use axum::Router;

use auth::service::AuthService;
use crm_core::{Module, ServiceError};
use crm_sql::SQLStore;

use crate::service::{CrmConfig, CrmService};

/// CRM module implementing the Module trait.
pub struct CrmModule {
    service: Arc<CrmService>,
}

impl CrmModule {
    pub fn new(
        sql: Arc<dyn SQLStore>,
        auth: Arc<AuthService>,
        config: CrmConfig,
    ) -> Result<Self, ServiceError> {
        let service = CrmService::new(sql, auth, config)?;
        Ok(Self { service })
    }

    pub fn service(&self) -> &Arc<CrmService> {
        &self.service
    }
}

impl Module for CrmModule {
    fn name(&self) -> &str {
        "crm"
    }

    fn routes(&self) -> Router {
        api::build_router(self.service.clone())
    }
}
