//! SQL execution seam between the loader and a relational store.
//!
//! Statements use `?` positional placeholders. Executors translate them to
//! whatever the underlying driver expects.

use std::error::Error as StdError;

use thiserror::Error;

/// Parameter bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindValue {
    /// Text parameter; every attribute is bound as text and cast in SQL.
    Text(String),
    /// SQL `NULL`.
    Null,
}

impl BindValue {
    /// Borrow the text payload, `None` for [`BindValue::Null`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Null => None,
        }
    }
}

impl From<String> for BindValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for BindValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Option<String>> for BindValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Text)
    }
}

/// Failure reported by a [`SqlExecutor`] implementation.
#[derive(Debug, Error)]
#[error("{context}: {source}")]
pub struct ExecutorError {
    context: String,
    #[source]
    source: Box<dyn StdError + Send + Sync>,
}

impl ExecutorError {
    /// Wrap a driver error with a short description of the failed action.
    pub fn new(
        context: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Description of the failed action.
    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }
}

/// Relational store operations the loader depends on.
pub trait SqlExecutor {
    /// Number of catalog relations (tables, sequences, ...) named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when the catalog query fails.
    fn count_relations(&mut self, name: &str) -> Result<i64, ExecutorError>;

    /// Execute a parameterless statement such as DDL.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when the statement fails.
    fn execute(&mut self, sql: &str) -> Result<(), ExecutorError>;

    /// Execute `sql` once per row of bind values as a single unit.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when any row fails. Implementations should
    /// leave none of the batch's rows applied in that case.
    fn execute_batch(&mut self, sql: &str, rows: &[Vec<BindValue>]) -> Result<(), ExecutorError>;
}

impl<T: SqlExecutor + ?Sized> SqlExecutor for &mut T {
    fn count_relations(&mut self, name: &str) -> Result<i64, ExecutorError> {
        (**self).count_relations(name)
    }

    fn execute(&mut self, sql: &str) -> Result<(), ExecutorError> {
        (**self).execute(sql)
    }

    fn execute_batch(&mut self, sql: &str, rows: &[Vec<BindValue>]) -> Result<(), ExecutorError> {
        (**self).execute_batch(sql, rows)
    }
}

/// Errors raised while applying DDL or inserting batches.
#[derive(Debug, Error)]
pub enum SqlExecutionError {
    /// A DDL statement was rejected.
    #[error("failed to execute statement `{statement}`")]
    Ddl {
        /// Statement that failed.
        statement: String,
        /// Driver failure.
        #[source]
        source: ExecutorError,
    },
    /// A batch of inserts was rejected.
    #[error("failed to insert batch of {rows} rows")]
    Batch {
        /// Number of rows in the rejected batch.
        rows: usize,
        /// Driver failure.
        #[source]
        source: ExecutorError,
    },
}
