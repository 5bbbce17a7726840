pub mod config;
pub mod error;
pub mod extract;
pub mod module;
pub mod store;
pub mod types;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use extract::{JsonBody, QueryParams};
pub use module::Module;
pub use store::{Cond, RecordStore};
pub use types::{ListParams, ListResult, merge_patch, new_id, normalize_email, now_rfc3339};
