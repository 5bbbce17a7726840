use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    /// UNIQUE / NOT NULL / CHECK violation.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A referenced row does not exist.
    #[error("foreign key violation: {0}")]
    ForeignKey(String),

    #[error("connection error: {0}")]
    Connection(String),
}

impl SQLError {
    pub fn is_constraint(&self) -> bool {
        matches!(self, SQLError::Constraint(_))
    }
}
