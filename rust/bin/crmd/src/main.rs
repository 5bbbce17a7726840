//! `crmd`: the CRM server binary.
//!
//! Usage:
//!   crmd -c <context-name-or-path> [--listen <addr>]
//!   crmd --hash-password <password>
//!
//! The context name resolves to `/etc/crm/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod bootstrap;
mod config;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use crm_core::Module;
use tracing::info;

use config::ServerConfig;

/// CRM server.
#[derive(Parser, Debug)]
#[command(name = "crmd", about = "CRM server", version)]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required_unless_present = "hash_password")]
    config: Option<String>,

    /// Listen address.
    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Print an argon2id hash of the given password for `[admin]` and exit.
    #[arg(long = "hash-password", value_name = "PASSWORD")]
    hash_password: Option<String>,
}

/// Open storage, initialize modules and build the application router.
fn build_app(server_config: &ServerConfig, core_config: &crm_core::ServiceConfig) -> anyhow::Result<Router> {
    let sql: Arc<dyn crm_sql::SQLStore> = Arc::new(
        crm_sql::SqliteStore::open(&core_config.resolve_sqlite_path())
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );

    let auth_config = auth::service::AuthConfig {
        jwt_secret: server_config.jwt.secret.clone(),
        access_token_ttl: server_config.jwt.access_ttl_secs,
        refresh_token_ttl: server_config.jwt.refresh_ttl_secs,
        user_cascade: crm::service::user_cascade_steps(),
        user_delete_guards: crm::service::user_delete_guards(),
        ..Default::default()
    };
    let auth_module = auth::AuthModule::new(Arc::clone(&sql), auth_config)?;
    info!("Auth module initialized");

    bootstrap::ensure_admin(auth_module.service(), server_config)?;

    let crm_module = crm::CrmModule::new(
        Arc::clone(&sql),
        Arc::clone(auth_module.service()),
        crm::service::CrmConfig {
            max_import_rows: server_config.import.max_rows,
        },
    )?;
    info!("CRM module initialized");

    let module_routes = vec![
        (auth_module.name(), auth_module.routes()),
        (crm_module.name(), crm_module.routes()),
    ];
    Ok(routes::build_router(module_routes))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Some(password) = cli.hash_password {
        let hash = auth::service::password::hash_password(&password)?;
        println!("{}", hash);
        return Ok(());
    }

    // Load server configuration.
    let context = cli.config.context("--config is required")?;
    let config_path = ServerConfig::resolve_path(&context);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;

    // Verify configuration is valid.
    bootstrap::verify_config(&server_config)?;

    // Initialize storage.
    let data_dir = std::path::PathBuf::from(&server_config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    let core_config = crm_core::ServiceConfig::with_data_dir(&data_dir, cli.listen.clone());

    let app = build_app(&server_config, &core_config)?;

    // Start server.
    let listener = tokio::net::TcpListener::bind(&core_config.listen).await?;
    info!("CRM server listening on {}", core_config.listen);
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::config::{AdminConfig, ImportConfig, JwtConfig, StorageConfig};

    fn server_config(data_dir: &std::path::Path) -> ServerConfig {
        ServerConfig {
            storage: StorageConfig {
                data_dir: data_dir.display().to_string(),
            },
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                access_ttl_secs: 3600,
                refresh_ttl_secs: 604800,
            },
            admin: AdminConfig {
                email: "admin@example.com".to_string(),
                password_hash: auth::service::password::hash_password("admin-password").unwrap(),
            },
            import: ImportConfig::default(),
        }
    }

    async fn api_call(router: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(b) => req
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["crmd", "-c", "prod"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("prod"));
        assert_eq!(cli.listen, "0.0.0.0:8080");

        let cli = Cli::try_parse_from(["crmd", "--hash-password", "pw"]).unwrap();
        assert!(cli.config.is_none());

        assert!(Cli::try_parse_from(["crmd"]).is_err());
    }

    #[tokio::test]
    async fn test_full_stack() {
        let dir = tempfile::tempdir().unwrap();
        let config = server_config(dir.path());
        let core = crm_core::ServiceConfig::with_data_dir(dir.path(), "127.0.0.1:0");
        let app = build_app(&config, &core).unwrap();
        assert!(dir.path().join("crm.sqlite").exists());

        let (status, health) = api_call(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "ok");
        let (_, version) = api_call(&app, "GET", "/version", None, None).await;
        assert_eq!(version["name"], "crmd");

        // Sign up, onboard and create a business.
        let (status, signup) = api_call(&app, "POST", "/auth/signup", None, Some(json!({
            "email": "ann@example.com",
            "password": "long-enough",
        })))
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let ann = signup["tokens"]["access_token"].as_str().unwrap().to_string();
        let ann_id = signup["user"]["id"].as_str().unwrap().to_string();

        let (status, _) = api_call(&app, "GET", "/crm/businesses", Some(&ann), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        api_call(&app, "POST", "/auth/onboarding", Some(&ann), Some(json!({"company_name": "Acme"}))).await;
        let (status, acme) = api_call(&app, "POST", "/crm/businesses", Some(&ann), Some(json!({"name": "Acme"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let acme_id = acme["id"].as_str().unwrap().to_string();

        let (status, login) = api_call(&app, "POST", "/auth/login", None, Some(json!({
            "email": "admin@example.com",
            "password": "admin-password",
        })))
        .await;
        assert_eq!(status, StatusCode::OK);
        let admin = login["access_token"].as_str().unwrap().to_string();
        let delete_ann = format!("/auth/admin/users/{}", ann_id);

        // Ann is Acme's only owner, so she can't be deleted yet.
        let (status, err) = api_call(&app, "DELETE", &delete_ann, Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "VALIDATION_FAILED");
        assert!(err["message"].as_str().unwrap().contains("Acme"));

        let (status, _) =
            api_call(&app, "DELETE", &format!("/crm/businesses/{}", acme_id), Some(&ann), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, report) = api_call(&app, "DELETE", &delete_ann, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["removed"][0], json!({"table": "business_users", "count": 0}));

        let (status, _) = api_call(&app, "GET", "/auth/me", Some(&ann), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_restart_keeps_admin() {
        let dir = tempfile::tempdir().unwrap();
        let config = server_config(dir.path());
        let core = crm_core::ServiceConfig::with_data_dir(dir.path(), "127.0.0.1:0");

        build_app(&config, &core).unwrap();
        let app = build_app(&config, &core).unwrap();

        let (status, _) = api_call(&app, "POST", "/auth/login", None, Some(json!({
            "email": "admin@example.com",
            "password": "admin-password",
        })))
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
