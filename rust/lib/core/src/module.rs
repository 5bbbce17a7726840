use axum::Router;

/// A service module that contributes HTTP routes.
///
/// Each business module (auth, crm) implements this trait to register its
/// API endpoints. `crmd` collects all modules and merges their routers into
/// a single application router.
pub trait Module: Send + Sync {
    /// Module name, used for logging.
    fn name(&self) -> &str;

    /// Return the module's routes. Paths are absolute (`/auth/...`, `/crm/...`).
    fn routes(&self) -> Router;
}
