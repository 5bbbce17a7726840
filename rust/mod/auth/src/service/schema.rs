use crm_core::ServiceError;
use crm_sql::SQLStore;

/// Initialize the SQLite schema for all identity resources.
pub fn init_schema(sql: &dyn SQLStore) -> Result<(), ServiceError> {
    let statements = [
        // Users: sign-in identity. password_hash is kept out of `data`.
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",

        // Profiles: display details, keyed by user id
        "CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            full_name TEXT,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (id) REFERENCES users(id)
        )",

        // User roles: application-wide admin/user flag, keyed by user id
        "CREATE TABLE IF NOT EXISTS user_roles (
            id TEXT PRIMARY KEY,
            role TEXT NOT NULL DEFAULT 'user',
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (id) REFERENCES users(id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_user_roles_role ON user_roles(role)",

        // Sessions: token pair issuance records
        "CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            revoked INTEGER NOT NULL DEFAULT 0,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",

        // Onboarding: one-time survey answers, keyed by user id
        "CREATE TABLE IF NOT EXISTS onboarding (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (id) REFERENCES users(id)
        )",
    ];

    for stmt in &statements {
        sql.exec(stmt, &[])?;
    }

    Ok(())
}
