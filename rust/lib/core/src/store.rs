//! JSON-document tables on top of [`SQLStore`].
//!
//! Every resource table has an `id` primary key, a `data` column holding the
//! serialized record, and a handful of indexed scalar columns used for
//! filtering and ordering. Services go through [`RecordStore`] for all
//! single-record CRUD and list queries.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crm_sql::{Row, SQLError, SQLStore, Value};

use crate::ServiceError;

impl From<SQLError> for ServiceError {
    fn from(e: SQLError) -> Self {
        match e {
            SQLError::Constraint(m) => ServiceError::Conflict(m),
            SQLError::ForeignKey(_) => {
                ServiceError::Validation("referenced record does not exist".into())
            }
            other => ServiceError::Storage(other.to_string()),
        }
    }
}

/// A WHERE-clause condition for [`RecordStore::list`] and [`RecordStore::count`].
#[derive(Debug, Clone)]
pub enum Cond {
    /// `column = value`
    Eq(&'static str, Value),
    /// `column IN (values...)`. An empty list matches nothing.
    In(&'static str, Vec<Value>),
    /// Case-insensitive substring match on any of the columns.
    Search(Vec<&'static str>, String),
}

/// Escape `%`, `_` and `\` so a search term only matches literally.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Render conditions into a WHERE clause, numbering placeholders from `?1`.
fn where_clause(conds: &[Cond], params: &mut Vec<Value>) -> String {
    let mut clauses = Vec::new();
    for cond in conds {
        match cond {
            Cond::Eq(col, val) => {
                params.push(val.clone());
                clauses.push(format!("{} = ?{}", col, params.len()));
            }
            Cond::In(col, vals) => {
                if vals.is_empty() {
                    clauses.push("0 = 1".to_string());
                    continue;
                }
                let mut slots = Vec::with_capacity(vals.len());
                for v in vals {
                    params.push(v.clone());
                    slots.push(format!("?{}", params.len()));
                }
                clauses.push(format!("{} IN ({})", col, slots.join(", ")));
            }
            Cond::Search(cols, term) => {
                params.push(Value::Text(format!("%{}%", escape_like(&term.to_lowercase()))));
                let idx = params.len();
                let ors: Vec<String> = cols
                    .iter()
                    .map(|c| format!("LOWER(COALESCE({}, '')) LIKE ?{} ESCAPE '\\'", c, idx))
                    .collect();
                clauses.push(format!("({})", ors.join(" OR ")));
            }
        }
    }
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

fn decode<T: DeserializeOwned>(row: &Row) -> Result<T, ServiceError> {
    let data = row
        .get_str("data")
        .ok_or_else(|| ServiceError::Internal("missing data column".into()))?;
    serde_json::from_str(data).map_err(|e| ServiceError::Internal(e.to_string()))
}

/// Generic record access shared by every module.
#[derive(Clone)]
pub struct RecordStore {
    sql: Arc<dyn SQLStore>,
}

impl RecordStore {
    pub fn new(sql: Arc<dyn SQLStore>) -> Self {
        Self { sql }
    }

    /// The underlying SQL store, for statements that don't fit the record model.
    pub fn sql(&self) -> &dyn SQLStore {
        self.sql.as_ref()
    }

    /// Serialize a record to its `data` column form.
    pub fn encode<T: Serialize>(record: &T) -> Result<Value, ServiceError> {
        serde_json::to_string(record)
            .map(Value::Text)
            .map_err(|e| ServiceError::Internal(e.to_string()))
    }

    /// Insert a record as JSON into a table with indexed columns.
    pub fn insert<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), ServiceError> {
        let (sql, params) = Self::insert_statement(table, id, record, indexes)?;
        self.sql.exec(&sql, &params)?;
        Ok(())
    }

    /// Build the INSERT used by [`RecordStore::insert`], for use in transactions.
    pub fn insert_statement<T: Serialize>(
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(String, Vec<Value>), ServiceError> {
        let mut cols = vec!["id", "data"];
        let mut placeholders = vec!["?1".to_string(), "?2".to_string()];
        let mut params = vec![Value::Text(id.to_string()), Self::encode(record)?];

        for (col, val) in indexes {
            cols.push(col);
            params.push(val.clone());
            placeholders.push(format!("?{}", params.len()));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            cols.join(", "),
            placeholders.join(", "),
        );
        Ok((sql, params))
    }

    /// Get a record by id, or `None` if absent.
    pub fn find<T: DeserializeOwned>(&self, table: &str, id: &str) -> Result<Option<T>, ServiceError> {
        let sql = format!("SELECT data FROM {} WHERE id = ?1", table);
        let rows = self.sql.query(&sql, &[Value::Text(id.to_string())])?;
        rows.first().map(decode).transpose()
    }

    /// Get a record by id; `NotFound` if absent.
    pub fn get<T: DeserializeOwned>(&self, table: &str, id: &str) -> Result<T, ServiceError> {
        self.find(table, id)?
            .ok_or_else(|| ServiceError::NotFound(format!("{} '{}' not found", singular(table), id)))
    }

    /// Get the first record matching the conditions.
    pub fn find_one<T: DeserializeOwned>(
        &self,
        table: &str,
        conds: &[Cond],
    ) -> Result<Option<T>, ServiceError> {
        let mut params = Vec::new();
        let where_sql = where_clause(conds, &mut params);
        let sql = format!("SELECT data FROM {}{} LIMIT 1", table, where_sql);
        let rows = self.sql.query(&sql, &params)?;
        rows.first().map(decode).transpose()
    }

    /// Update a record's JSON data and indexed columns.
    pub fn update<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), ServiceError> {
        let (sql, params) = Self::update_statement(table, id, record, indexes)?;
        if self.sql.exec(&sql, &params)? == 0 {
            return Err(ServiceError::NotFound(format!("{} '{}' not found", singular(table), id)));
        }
        Ok(())
    }

    /// Build the UPDATE used by [`RecordStore::update`], for use in transactions.
    pub fn update_statement<T: Serialize>(
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(String, Vec<Value>), ServiceError> {
        let mut sets = vec!["data = ?1".to_string()];
        let mut params: Vec<Value> = vec![Self::encode(record)?];

        for (col, val) in indexes {
            params.push(val.clone());
            sets.push(format!("{} = ?{}", col, params.len()));
        }

        params.push(Value::Text(id.to_string()));
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            sets.join(", "),
            params.len(),
        );
        Ok((sql, params))
    }

    /// Delete a record by id.
    pub fn delete(&self, table: &str, id: &str) -> Result<(), ServiceError> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", table);
        if self.sql.exec(&sql, &[Value::Text(id.to_string())])? == 0 {
            return Err(ServiceError::NotFound(format!("{} '{}' not found", singular(table), id)));
        }
        Ok(())
    }

    /// Count records matching the conditions.
    pub fn count(&self, table: &str, conds: &[Cond]) -> Result<usize, ServiceError> {
        let mut params = Vec::new();
        let where_sql = where_clause(conds, &mut params);
        let sql = format!("SELECT COUNT(*) AS cnt FROM {}{}", table, where_sql);
        let rows = self.sql.query(&sql, &params)?;
        Ok(rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0) as usize)
    }

    /// List records matching the conditions, newest first, with the total count.
    pub fn list<T: DeserializeOwned>(
        &self,
        table: &str,
        conds: &[Cond],
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<T>, usize), ServiceError> {
        let total = self.count(table, conds)?;

        let mut params = Vec::new();
        let where_sql = where_clause(conds, &mut params);
        params.push(Value::Integer(limit as i64));
        let limit_idx = params.len();
        params.push(Value::Integer(offset as i64));
        let offset_idx = params.len();

        let sql = format!(
            "SELECT data FROM {}{} ORDER BY created_at DESC, id LIMIT ?{} OFFSET ?{}",
            table, where_sql, limit_idx, offset_idx,
        );
        let rows = self.sql.query(&sql, &params)?;
        let items = rows.iter().map(decode).collect::<Result<Vec<T>, _>>()?;
        Ok((items, total))
    }

    /// All records matching the conditions, oldest first.
    pub fn list_all<T: DeserializeOwned>(
        &self,
        table: &str,
        conds: &[Cond],
    ) -> Result<Vec<T>, ServiceError> {
        let mut params = Vec::new();
        let where_sql = where_clause(conds, &mut params);
        let sql = format!("SELECT data FROM {}{} ORDER BY created_at, id", table, where_sql);
        let rows = self.sql.query(&sql, &params)?;
        rows.iter().map(decode).collect()
    }
}

/// `customers` -> `customer`, `businesses` -> `business`, for error messages.
fn singular(table: &str) -> &str {
    if let Some(stem) = table.strip_suffix("es").filter(|s| s.ends_with("ss")) {
        return stem;
    }
    table.strip_suffix('s').unwrap_or(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_sql::SqliteStore;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Note {
        id: String,
        title: String,
        owner: String,
    }

    fn store() -> RecordStore {
        let sql = SqliteStore::open_in_memory().unwrap();
        sql.exec(
            "CREATE TABLE notes (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                title TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            &[],
        )
        .unwrap();
        RecordStore::new(Arc::new(sql))
    }

    fn add(store: &RecordStore, id: &str, title: &str, owner: &str, at: &str) {
        let note = Note { id: id.into(), title: title.into(), owner: owner.into() };
        store
            .insert("notes", id, &note, &[
                ("owner", owner.into()),
                ("title", title.into()),
                ("created_at", at.into()),
            ])
            .unwrap();
    }

    #[test]
    fn test_crud() {
        let store = store();
        add(&store, "n1", "Kickoff", "ann", "2026-01-01T00:00:00Z");

        let got: Note = store.get("notes", "n1").unwrap();
        assert_eq!(got.title, "Kickoff");

        let changed = Note { id: "n1".into(), title: "Renamed".into(), owner: "ann".into() };
        store.update("notes", "n1", &changed, &[("title", "Renamed".into())]).unwrap();
        let got: Note = store.get("notes", "n1").unwrap();
        assert_eq!(got.title, "Renamed");

        store.delete("notes", "n1").unwrap();
        let err = store.get::<Note>("notes", "n1").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(err.to_string(), "note 'n1' not found");
    }

    #[test]
    fn test_singular() {
        assert_eq!(singular("customers"), "customer");
        assert_eq!(singular("businesses"), "business");
        assert_eq!(singular("onboarding"), "onboarding");
    }

    #[test]
    fn test_duplicate_insert_is_conflict() {
        let store = store();
        add(&store, "n1", "a", "ann", "2026-01-01T00:00:00Z");
        let note = Note { id: "n1".into(), title: "b".into(), owner: "ann".into() };
        let err = store
            .insert("notes", "n1", &note, &[
                ("owner", "ann".into()),
                ("title", "b".into()),
                ("created_at", "x".into()),
            ])
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn test_list_with_conditions() {
        let store = store();
        add(&store, "n1", "Quarterly review", "ann", "2026-01-01T00:00:00Z");
        add(&store, "n2", "Renewal call", "bob", "2026-01-02T00:00:00Z");
        add(&store, "n3", "Review pricing", "cid", "2026-01-03T00:00:00Z");

        let (items, total): (Vec<Note>, usize) = store
            .list("notes", &[Cond::Search(vec!["title"], "REVIEW".into())], 10, 0)
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(items[0].id, "n3");
        assert_eq!(items[1].id, "n1");

        let (items, total): (Vec<Note>, usize) = store
            .list("notes", &[Cond::In("owner", vec!["ann".into(), "bob".into()])], 1, 1)
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "n1");

        assert_eq!(store.count("notes", &[Cond::In("owner", vec![])]).unwrap(), 0);
        assert_eq!(store.count("notes", &[Cond::Eq("owner", "cid".into())]).unwrap(), 1);
    }

    #[test]
    fn test_search_wildcards_match_literally() {
        let store = store();
        add(&store, "n1", "Growth 50% plan", "ann", "2026-01-01T00:00:00Z");
        add(&store, "n2", "Renewal call", "bob", "2026-01-02T00:00:00Z");
        add(&store, "n3", "snake_case notes", "cid", "2026-01-03T00:00:00Z");

        let search = |q: &str| store.count("notes", &[Cond::Search(vec!["title"], q.into())]).unwrap();
        assert_eq!(search("%"), 1);
        assert_eq!(search("_"), 1);
        assert_eq!(search("50%"), 1);
        assert_eq!(search("e_c"), 1);
        assert_eq!(search("l_c"), 0);
        assert_eq!(escape_like(r"a%b_c\d"), r"a\%b\_c\\d");
    }

    #[test]
    fn test_missing_reference_is_validation() {
        let err = ServiceError::from(SQLError::ForeignKey("FOREIGN KEY constraint failed".into()));
        assert!(matches!(err, ServiceError::Validation(_)));
        let err = ServiceError::from(SQLError::Constraint("UNIQUE constraint failed".into()));
        assert!(matches!(err, ServiceError::Conflict(_)));
    }
}
