//! In-memory collaborators for unit and behaviour tests.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::io;

use geo::Geometry;

use crate::feature::SourceFeature;
use crate::field::FieldDefinition;
use crate::source::{FeatureSource, FeatureStream, SourceError};
use crate::sql::{BindValue, ExecutorError, SqlExecutor};
use crate::transform::{CrsEngine, CrsEngineError};

/// One batch handed to [`RecordingExecutor::execute_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBatch {
    /// Statement text.
    pub sql: String,
    /// Bound rows.
    pub rows: Vec<Vec<BindValue>>,
}

/// `SqlExecutor` that records statements and tracks created relations.
///
/// Relations named by `CREATE SEQUENCE` / `CREATE TABLE` statements are
/// registered so later catalog lookups see them.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    relations: BTreeSet<String>,
    statements: Vec<String>,
    batches: Vec<RecordedBatch>,
    fail_catalog: bool,
    fail_statements: bool,
    fail_batch_at: Option<usize>,
    batch_attempts: usize,
}

impl RecordingExecutor {
    /// Pretend `name` already exists in the catalog.
    #[must_use]
    pub fn with_relation(mut self, name: &str) -> Self {
        self.relations.insert(name.to_owned());
        self
    }

    /// Fail every catalog lookup.
    #[must_use]
    pub fn failing_catalog(mut self) -> Self {
        self.fail_catalog = true;
        self
    }

    /// Fail every DDL statement.
    #[must_use]
    pub fn failing_statements(mut self) -> Self {
        self.fail_statements = true;
        self
    }

    /// Fail the batch with zero-based position `index`.
    #[must_use]
    pub fn failing_batch(mut self, index: usize) -> Self {
        self.fail_batch_at = Some(index);
        self
    }

    /// DDL statements executed so far.
    #[must_use]
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Batches accepted so far.
    #[must_use]
    pub fn batches(&self) -> &[RecordedBatch] {
        &self.batches
    }

    /// Total rows across accepted batches.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.batches.iter().map(|batch| batch.rows.len()).sum()
    }

    /// Whether `name` is known to the fake catalog.
    #[must_use]
    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains(name)
    }

    fn created_relation(sql: &str) -> Option<String> {
        let rest = ["CREATE SEQUENCE IF NOT EXISTS ", "CREATE TABLE IF NOT EXISTS "]
            .iter()
            .find_map(|prefix| sql.strip_prefix(prefix))?;
        let quoted = rest.strip_prefix('"')?;
        let end = quoted.find('"')?;
        quoted.get(..end).map(str::to_owned)
    }
}

impl SqlExecutor for RecordingExecutor {
    fn count_relations(&mut self, name: &str) -> Result<i64, ExecutorError> {
        if self.fail_catalog {
            return Err(ExecutorError::new("catalog lookup", "catalog unavailable"));
        }
        Ok(i64::from(self.relations.contains(name)))
    }

    fn execute(&mut self, sql: &str) -> Result<(), ExecutorError> {
        if self.fail_statements {
            return Err(ExecutorError::new("execute statement", "permission denied"));
        }
        if let Some(name) = Self::created_relation(sql) {
            self.relations.insert(name);
        }
        self.statements.push(sql.to_owned());
        Ok(())
    }

    fn execute_batch(&mut self, sql: &str, rows: &[Vec<BindValue>]) -> Result<(), ExecutorError> {
        let attempt = self.batch_attempts;
        self.batch_attempts += 1;
        if self.fail_batch_at == Some(attempt) {
            return Err(ExecutorError::new("execute batch", "constraint violated"));
        }
        self.batches.push(RecordedBatch {
            sql: sql.to_owned(),
            rows: rows.to_vec(),
        });
        Ok(())
    }
}

/// `FeatureSource` backed by a vector.
#[derive(Debug, Default)]
pub struct MemorySource {
    fields: Vec<FieldDefinition>,
    features: Vec<SourceFeature>,
    crs: Option<String>,
    encoding: Option<String>,
    fail_after: Option<usize>,
    fail_open: bool,
    dispose_calls: usize,
    streams_opened: usize,
}

impl MemorySource {
    /// Source yielding `features` with the given field layout.
    #[must_use]
    pub fn new(fields: Vec<FieldDefinition>, features: Vec<SourceFeature>) -> Self {
        Self {
            fields,
            features,
            ..Self::default()
        }
    }

    /// Attach a coordinate system description.
    #[must_use]
    pub fn with_crs(mut self, description: &str) -> Self {
        self.crs = Some(description.to_owned());
        self
    }

    /// Attach an encoding hint.
    #[must_use]
    pub fn with_encoding(mut self, label: &str) -> Self {
        self.encoding = Some(label.to_owned());
        self
    }

    /// Yield an I/O error after `count` features.
    #[must_use]
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Fail when the stream is opened.
    #[must_use]
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Number of `dispose` calls.
    #[must_use]
    pub const fn dispose_calls(&self) -> usize {
        self.dispose_calls
    }

    /// Number of streams opened.
    #[must_use]
    pub const fn streams_opened(&self) -> usize {
        self.streams_opened
    }
}

fn stream_error(message: &str) -> SourceError {
    SourceError::Io {
        path: "memory".into(),
        source: io::Error::other(message.to_owned()),
    }
}

impl FeatureSource for MemorySource {
    fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    fn crs_description(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    fn encoding_hint(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    fn features(&mut self) -> Result<FeatureStream<'_>, SourceError> {
        if self.fail_open {
            return Err(stream_error("stream unavailable"));
        }
        self.streams_opened += 1;
        let limit = self.fail_after.unwrap_or(usize::MAX);
        let fails = self.fail_after.is_some();
        let items = self.features.iter().cloned().map(Ok);
        let tail = fails.then(|| Err(stream_error("read interrupted")));
        Ok(Box::new(items.take(limit).chain(tail)))
    }

    fn dispose(&mut self) {
        self.dispose_calls += 1;
    }
}

/// `CrsEngine` counting its calls.
///
/// Transforms shift every coordinate by `(1, 1)` so tests can tell a
/// transformed geometry from the input.
#[derive(Debug, Default)]
pub struct CountingCrsEngine {
    lookup: Option<i32>,
    fail: bool,
    lookups: Cell<usize>,
    transforms: Cell<usize>,
}

impl CountingCrsEngine {
    /// Engine resolving every description to `code`.
    #[must_use]
    pub fn with_lookup(code: Option<i32>) -> Self {
        Self {
            lookup: code,
            ..Self::default()
        }
    }

    /// Engine failing every transform.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Number of lookups performed.
    #[must_use]
    pub fn lookup_calls(&self) -> usize {
        self.lookups.get()
    }

    /// Number of transforms performed.
    #[must_use]
    pub fn transform_calls(&self) -> usize {
        self.transforms.get()
    }
}

impl CrsEngine for CountingCrsEngine {
    fn lookup_epsg(&self, _description: &str) -> Result<Option<i32>, CrsEngineError> {
        self.lookups.set(self.lookups.get() + 1);
        Ok(self.lookup)
    }

    fn transform(
        &self,
        geometry: &Geometry<f64>,
        source_srid: i32,
        target_srid: i32,
    ) -> Result<Geometry<f64>, CrsEngineError> {
        use geo::MapCoords;

        self.transforms.set(self.transforms.get() + 1);
        if self.fail {
            return Err(CrsEngineError::UnsupportedTransform {
                source_srid,
                target_srid,
            });
        }
        Ok(geometry.map_coords(|c| geo::Coord {
            x: c.x + 1.0,
            y: c.y + 1.0,
        }))
    }
}
