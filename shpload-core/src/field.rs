//! Attribute field definitions parsed from a DBF header.

use crate::schema::SchemaError;

/// Declared type of a DBF attribute field, reduced to the tags the schema
/// synthesizer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Fixed-point number (`N`).
    Numeric,
    /// Fixed-width text (`C`).
    Character,
    /// Calendar date stored as `YYYYMMDD` (`D`).
    Date,
    /// Any other tag (floating point, logical, memo, ...).
    Other,
}

impl FieldKind {
    /// Map a single-byte DBF type tag onto a [`FieldKind`].
    ///
    /// ```
    /// use shpload_core::FieldKind;
    ///
    /// assert_eq!(FieldKind::from_dbf_tag(b'N'), FieldKind::Numeric);
    /// assert_eq!(FieldKind::from_dbf_tag(b'L'), FieldKind::Other);
    /// ```
    #[must_use]
    pub const fn from_dbf_tag(tag: u8) -> Self {
        match tag.to_ascii_uppercase() {
            b'N' => Self::Numeric,
            b'C' => Self::Character,
            b'D' => Self::Date,
            _ => Self::Other,
        }
    }
}

/// A single attribute column declared by the source.
///
/// Instances are immutable once built. The decimal count is clamped on
/// construction so that it always stays below the declared length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    name: String,
    kind: FieldKind,
    length: u16,
    decimal_places: u16,
}

impl FieldDefinition {
    /// Validate and construct a [`FieldDefinition`].
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::EmptyFieldName`] for a blank name and
    /// [`SchemaError::InvalidLength`] when `length` is zero.
    ///
    /// ```
    /// use shpload_core::{FieldDefinition, FieldKind};
    ///
    /// # fn main() -> Result<(), shpload_core::SchemaError> {
    /// let field = FieldDefinition::new("AREA", FieldKind::Numeric, 4, 6)?;
    /// assert_eq!(field.decimal_places(), 3);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        name: impl Into<String>,
        kind: FieldKind,
        length: u16,
        decimal_places: u16,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SchemaError::EmptyFieldName);
        }
        let Some(max_decimals) = length.checked_sub(1) else {
            return Err(SchemaError::InvalidLength { field: name });
        };
        Ok(Self {
            name,
            kind,
            length,
            decimal_places: decimal_places.min(max_decimals),
        })
    }

    /// Field name as declared in the header.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared kind.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Declared width in characters.
    #[must_use]
    pub const fn length(&self) -> u16 {
        self.length
    }

    /// Clamped number of decimal places.
    #[must_use]
    pub const fn decimal_places(&self) -> u16 {
        self.decimal_places
    }
}
