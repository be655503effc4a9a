//! PostgreSQL adapter for [`SqlExecutor`].

use postgres::types::ToSql;
use postgres::{Client, NoTls};
use shpload_core::{BindValue, ExecutorError, SqlExecutor};

/// [`SqlExecutor`] over a blocking `postgres` client.
///
/// Every batch runs in its own transaction, so a failed batch leaves earlier
/// batches committed and nothing of its own.
pub struct PostgresExecutor {
    client: Client,
}

impl std::fmt::Debug for PostgresExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresExecutor")
            .field("closed", &self.client.is_closed())
            .finish()
    }
}

impl PostgresExecutor {
    /// Connect without TLS using a libpq-style URL or key/value string.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when the connection cannot be established.
    pub fn connect(url: &str) -> Result<Self, ExecutorError> {
        let client =
            Client::connect(url, NoTls).map_err(|err| ExecutorError::new("connect", err))?;
        Ok(Self { client })
    }
}

/// Rewrite `?` placeholders as `$1`, `$2`, ... skipping quoted text.
fn numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0_usize;
    let mut quote: Option<char> = None;
    for ch in sql.chars() {
        match (quote, ch) {
            (Some(open), c) if c == open => {
                quote = None;
                out.push(c);
            }
            (Some(_), c) => out.push(c),
            (None, '\'' | '"') => {
                quote = Some(ch);
                out.push(ch);
            }
            (None, '?') => {
                index += 1;
                out.push('$');
                out.push_str(&index.to_string());
            }
            (None, c) => out.push(c),
        }
    }
    out
}

impl SqlExecutor for PostgresExecutor {
    fn count_relations(&mut self, name: &str) -> Result<i64, ExecutorError> {
        let row = self
            .client
            .query_one("SELECT count(*) FROM pg_class WHERE relname = $1", &[&name])
            .map_err(|err| ExecutorError::new(format!("catalog lookup for {name}"), err))?;
        row.try_get(0)
            .map_err(|err| ExecutorError::new(format!("catalog lookup for {name}"), err))
    }

    fn execute(&mut self, sql: &str) -> Result<(), ExecutorError> {
        self.client
            .batch_execute(sql)
            .map_err(|err| ExecutorError::new("execute statement", err))
    }

    fn execute_batch(&mut self, sql: &str, rows: &[Vec<BindValue>]) -> Result<(), ExecutorError> {
        let sql = numbered_placeholders(sql);
        let mut tx = self
            .client
            .transaction()
            .map_err(|err| ExecutorError::new("begin batch", err))?;
        let statement = tx
            .prepare(&sql)
            .map_err(|err| ExecutorError::new("prepare insert", err))?;
        for row in rows {
            let values: Vec<Option<&str>> = row.iter().map(BindValue::as_text).collect();
            let params: Vec<&(dyn ToSql + Sync)> = values
                .iter()
                .map(|value| value as &(dyn ToSql + Sync))
                .collect();
            tx.execute(&statement, &params)
                .map_err(|err| ExecutorError::new("insert row", err))?;
        }
        tx.commit()
            .map_err(|err| ExecutorError::new("commit batch", err))
    }
}
