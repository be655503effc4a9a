//! Relational schema derived from DBF field definitions.
//!
//! [`synthesize`] maps fields onto [`ColumnSpec`]s, [`TargetTable`] renders
//! the DDL and insert statements, and [`ensure_table_exists`] creates the
//! sequence and table only when the catalog does not already list them.

use std::collections::HashSet;
use std::fmt;

use log::{debug, info};
use thiserror::Error;

use crate::error::IngestError;
use crate::field::{FieldDefinition, FieldKind};
use crate::sql::{ExecutorError, SqlExecutionError, SqlExecutor};

/// Name of the single geometry column every target table carries.
pub const GEOMETRY_COLUMN: &str = "geom";

/// Historical spellings of the geometry attribute, matched case-insensitively.
pub const GEOMETRY_ALIASES: [&str; 2] = ["the_geom", "shape"];

/// Name of the surrogate key column fed by the table's sequence.
pub const PRIMARY_KEY_COLUMN: &str = "f_id";

const OTHER_VARCHAR_LENGTH: u16 = 255;

/// Errors raised while deriving or checking a relational schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A field definition had a blank name.
    #[error("field name must not be empty")]
    EmptyFieldName,
    /// A field definition declared a zero width.
    #[error("field {field:?} must declare a positive length")]
    InvalidLength {
        /// Offending field.
        field: String,
    },
    /// Two fields map onto the same column name.
    #[error("field {name:?} maps to a column that is already defined")]
    DuplicateField {
        /// Column name produced twice.
        name: String,
    },
    /// A field collides with the surrogate key column.
    #[error("field {name:?} collides with the primary key column")]
    ReservedColumn {
        /// Offending field.
        name: String,
    },
    /// The target table name was blank.
    #[error("target table name must not be empty")]
    EmptyTableName,
    /// The catalog existence query failed.
    #[error("failed to look up relation {name:?} in the catalog")]
    Catalog {
        /// Relation looked up.
        name: String,
        /// Executor failure.
        #[source]
        source: ExecutorError,
    },
}

/// Relational type of a synthesized column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// `numeric(precision, scale)`.
    Numeric {
        /// Total digits.
        precision: u16,
        /// Digits after the decimal point.
        scale: u16,
    },
    /// `varchar(n)`.
    Varchar(u16),
    /// `date`.
    Date,
    /// The store's native geometry type.
    Geometry,
}

impl ColumnType {
    /// Column type for a non-geometry field.
    ///
    /// ```
    /// use shpload_core::{ColumnType, FieldDefinition, FieldKind};
    ///
    /// # fn main() -> Result<(), shpload_core::SchemaError> {
    /// let area = FieldDefinition::new("AREA", FieldKind::Numeric, 12, 3)?;
    /// assert_eq!(ColumnType::for_field(&area).to_string(), "numeric(11,3)");
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn for_field(field: &FieldDefinition) -> Self {
        match field.kind() {
            FieldKind::Numeric => {
                let scale = field.decimal_places();
                let precision = if scale == 0 {
                    field.length()
                } else {
                    field.length().saturating_sub(1)
                };
                Self::Numeric { precision, scale }
            }
            FieldKind::Character => Self::Varchar(field.length()),
            FieldKind::Date => Self::Date,
            FieldKind::Other => Self::Varchar(OTHER_VARCHAR_LENGTH),
        }
    }

    /// Whether empty-string binds must be turned into `NULL` before casting.
    const fn needs_cast(self) -> bool {
        matches!(self, Self::Numeric { .. } | Self::Date)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric { precision, scale } => write!(f, "numeric({precision},{scale})"),
            Self::Varchar(len) => write!(f, "varchar({len})"),
            Self::Date => f.write_str("date"),
            Self::Geometry => f.write_str("geometry"),
        }
    }
}

/// One column of the target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    name: String,
    source_name: Option<String>,
    column_type: ColumnType,
}

impl ColumnSpec {
    /// The canonical geometry column.
    #[must_use]
    pub fn geometry() -> Self {
        Self {
            name: GEOMETRY_COLUMN.to_owned(),
            source_name: None,
            column_type: ColumnType::Geometry,
        }
    }

    /// Attribute column bound from the source field `source_name`.
    #[must_use]
    pub fn attribute(
        name: impl Into<String>,
        source_name: impl Into<String>,
        column_type: ColumnType,
    ) -> Self {
        Self {
            name: name.into(),
            source_name: Some(source_name.into()),
            column_type,
        }
    }

    /// Column name in the target table.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source attribute feeding this column, `None` for the geometry column.
    #[must_use]
    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    /// Relational type.
    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Whether this is the geometry column.
    #[must_use]
    pub fn is_geometry(&self) -> bool {
        self.column_type == ColumnType::Geometry
    }
}

fn is_geometry_alias(name: &str) -> bool {
    GEOMETRY_ALIASES
        .iter()
        .any(|alias| alias.eq_ignore_ascii_case(name))
}

/// Derive the ordered column list for `fields`.
///
/// The geometry column comes first when `geometry_field_names` is non-empty
/// or a field carries one of the [`GEOMETRY_ALIASES`]; such fields collapse
/// into that single column. The remaining fields follow in source order.
///
/// Attribute column names are the source field names lower-cased, so a
/// field `RoadName` becomes column `roadname`. Each column keeps the original
/// spelling in [`ColumnSpec::source_name`] for reading attribute values, and
/// fields that differ only in case are rejected as duplicates.
///
/// # Errors
///
/// Returns [`SchemaError::DuplicateField`] when two fields land on the same
/// column name, [`SchemaError::ReservedColumn`] for a field named like the
/// key column, and [`SchemaError::EmptyFieldName`] for a blank name.
///
/// # Examples
///
/// ```
/// use shpload_core::{synthesize, FieldDefinition, FieldKind};
///
/// # fn main() -> Result<(), shpload_core::SchemaError> {
/// let fields = vec![
///     FieldDefinition::new("NAME", FieldKind::Character, 20, 0)?,
///     FieldDefinition::new("SHAPE", FieldKind::Other, 10, 0)?,
/// ];
/// let columns = synthesize(&fields, &["the_geom"])?;
/// let names: Vec<_> = columns.iter().map(|c| c.name()).collect();
/// assert_eq!(names, ["geom", "name"]);
/// assert_eq!(columns[1].source_name(), Some("NAME"));
/// # Ok(())
/// # }
/// ```
pub fn synthesize(
    fields: &[FieldDefinition],
    geometry_field_names: &[&str],
) -> Result<Vec<ColumnSpec>, SchemaError> {
    let mut wants_geometry = !geometry_field_names.is_empty();
    let mut seen = HashSet::new();
    let mut attributes = Vec::with_capacity(fields.len());

    for field in fields {
        let source = field.name().trim();
        if source.is_empty() {
            return Err(SchemaError::EmptyFieldName);
        }
        if is_geometry_alias(source)
            || geometry_field_names
                .iter()
                .any(|geom| geom.eq_ignore_ascii_case(source))
        {
            wants_geometry = true;
            continue;
        }
        let column = source.to_lowercase();
        if column == PRIMARY_KEY_COLUMN {
            return Err(SchemaError::ReservedColumn {
                name: source.to_owned(),
            });
        }
        if column == GEOMETRY_COLUMN || !seen.insert(column.clone()) {
            return Err(SchemaError::DuplicateField {
                name: source.to_owned(),
            });
        }
        attributes.push(ColumnSpec::attribute(
            column,
            field.name(),
            ColumnType::for_field(field),
        ));
    }

    let mut columns = Vec::with_capacity(attributes.len() + 1);
    if wants_geometry {
        columns.push(ColumnSpec::geometry());
    }
    columns.extend(attributes);
    Ok(columns)
}

/// Quote an identifier for PostgreSQL, doubling embedded quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Target table description: name, key sequence and ordered columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTable {
    name: String,
    sequence: String,
    columns: Vec<ColumnSpec>,
}

impl TargetTable {
    /// Describe a target table. The sequence defaults to `<table>_seq`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::EmptyTableName`] for a blank table name.
    pub fn new(
        name: impl Into<String>,
        sequence: Option<String>,
        columns: Vec<ColumnSpec>,
    ) -> Result<Self, SchemaError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(SchemaError::EmptyTableName);
        }
        let sequence = sequence
            .map(|seq| seq.trim().to_owned())
            .filter(|seq| !seq.is_empty())
            .unwrap_or_else(|| format!("{name}_seq"));
        Ok(Self {
            name,
            sequence,
            columns,
        })
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sequence feeding the primary key.
    #[must_use]
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    /// Ordered columns, excluding the primary key.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// `CREATE SEQUENCE` statement for the key sequence.
    #[must_use]
    pub fn create_sequence_sql(&self) -> String {
        format!(
            "CREATE SEQUENCE IF NOT EXISTS {} INCREMENT BY 1 MINVALUE 1 NO MAXVALUE START WITH 1",
            quote_identifier(&self.sequence)
        )
    }

    /// `CREATE TABLE` statement with the key column followed by all columns.
    #[must_use]
    pub fn create_table_sql(&self) -> String {
        let mut definitions = vec![format!(
            "{} int8 NOT NULL PRIMARY KEY DEFAULT nextval('{}'::regclass)",
            quote_identifier(PRIMARY_KEY_COLUMN),
            quote_identifier(&self.sequence).replace('\'', "''")
        )];
        definitions.extend(
            self.columns
                .iter()
                .map(|c| format!("{} {}", quote_identifier(c.name()), c.column_type())),
        );
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(&self.name),
            definitions.join(", ")
        )
    }

    /// Parameterized insert with one `?` per column.
    ///
    /// `geometry_expr` replaces the geometry column's value and must contain
    /// exactly one `?` for the WKT text.
    #[must_use]
    pub fn insert_sql(&self, geometry_expr: &str) -> String {
        let names: Vec<String> = self
            .columns
            .iter()
            .map(|c| quote_identifier(c.name()))
            .collect();
        let values: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let ty = c.column_type();
                if ty == ColumnType::Geometry {
                    geometry_expr.to_owned()
                } else if ty.needs_cast() {
                    format!("CAST(NULLIF(?, '') AS {ty})")
                } else {
                    "?".to_owned()
                }
            })
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(&self.name),
            names.join(", "),
            values.join(", ")
        )
    }
}

/// What [`ensure_table_exists`] had to create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnsureOutcome {
    /// The sequence was absent and has been created.
    pub sequence_created: bool,
    /// The table was absent and has been created.
    pub table_created: bool,
}

fn relation_exists<E: SqlExecutor + ?Sized>(
    executor: &mut E,
    name: &str,
) -> Result<bool, SchemaError> {
    executor
        .count_relations(name)
        .map(|count| count > 0)
        .map_err(|source| SchemaError::Catalog {
            name: name.to_owned(),
            source,
        })
}

fn run_ddl<E: SqlExecutor + ?Sized>(executor: &mut E, sql: String) -> Result<(), IngestError> {
    debug!("{sql}");
    executor
        .execute(&sql)
        .map_err(|source| SqlExecutionError::Ddl {
            statement: sql,
            source,
        })?;
    Ok(())
}

/// Create the key sequence and the table unless the catalog already lists
/// them. Safe to call repeatedly; existing tables may hold rows.
///
/// # Errors
///
/// Returns [`IngestError::Schema`] when the catalog lookup fails and
/// [`IngestError::SqlExecution`] when a DDL statement is rejected.
pub fn ensure_table_exists<E: SqlExecutor + ?Sized>(
    table: &TargetTable,
    executor: &mut E,
) -> Result<EnsureOutcome, IngestError> {
    let mut outcome = EnsureOutcome::default();

    if !relation_exists(executor, table.sequence())? {
        run_ddl(executor, table.create_sequence_sql())?;
        info!("created sequence {}", table.sequence());
        outcome.sequence_created = true;
    }
    if !relation_exists(executor, table.name())? {
        run_ddl(executor, table.create_table_sql())?;
        info!("created table {}", table.name());
        outcome.table_created = true;
    }
    Ok(outcome)
}
