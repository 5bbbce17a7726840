use crm_core::ServiceError;
use crm_sql::SQLStore;

/// Initialize the SQLite schema for all CRM resources.
pub fn init_schema(sql: &dyn SQLStore) -> Result<(), ServiceError> {
    let statements = [
        // Businesses: tenants
        "CREATE TABLE IF NOT EXISTS businesses (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",

        // Business users: membership + role
        "CREATE TABLE IF NOT EXISTS business_users (
            id TEXT PRIMARY KEY,
            business_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            role TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (business_id, user_id),
            FOREIGN KEY (business_id) REFERENCES businesses(id),
            FOREIGN KEY (user_id) REFERENCES users(id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_business_users_user ON business_users(user_id)",

        // Customers
        "CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY,
            business_id TEXT NOT NULL,
            name TEXT NOT NULL,
            email TEXT,
            company TEXT,
            status TEXT NOT NULL,
            external_id TEXT,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (business_id) REFERENCES businesses(id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_customers_business ON customers(business_id, status)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_customers_external
            ON customers(business_id, external_id) WHERE external_id IS NOT NULL",

        // Deals: value and probability are columns for the summary aggregates
        "CREATE TABLE IF NOT EXISTS deals (
            id TEXT PRIMARY KEY,
            business_id TEXT NOT NULL,
            customer_id TEXT NOT NULL,
            title TEXT NOT NULL,
            stage TEXT NOT NULL,
            value REAL NOT NULL DEFAULT 0,
            probability INTEGER NOT NULL DEFAULT 0,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (business_id) REFERENCES businesses(id),
            FOREIGN KEY (customer_id) REFERENCES customers(id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_deals_business ON deals(business_id, stage)",
        "CREATE INDEX IF NOT EXISTS idx_deals_customer ON deals(customer_id)",

        // Contacts
        "CREATE TABLE IF NOT EXISTS contacts (
            id TEXT PRIMARY KEY,
            business_id TEXT NOT NULL,
            customer_id TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT,
            email TEXT,
            is_primary INTEGER NOT NULL DEFAULT 0,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (business_id) REFERENCES businesses(id),
            FOREIGN KEY (customer_id) REFERENCES customers(id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_contacts_business ON contacts(business_id)",
        "CREATE INDEX IF NOT EXISTS idx_contacts_customer ON contacts(customer_id)",
    ];

    for stmt in &statements {
        sql.exec(stmt, &[])?;
    }

    Ok(())
}
