//! Features read from a source: ordered attributes plus an optional geometry.

use std::fmt;

use geo::Geometry;

use crate::sql::BindValue;

/// Calendar date from a DBF `D` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DbfDate {
    /// Year.
    pub year: u16,
    /// Month, 1-12.
    pub month: u8,
    /// Day of month, 1-31.
    pub day: u8,
}

impl DbfDate {
    /// Parse an eight-digit `YYYYMMDD` value.
    ///
    /// ```
    /// use shpload_core::DbfDate;
    ///
    /// let date = DbfDate::parse_yyyymmdd("20240131").expect("date");
    /// assert_eq!(date.to_string(), "2024-01-31");
    /// assert!(DbfDate::parse_yyyymmdd("2024-1-3").is_none());
    /// ```
    #[must_use]
    pub fn parse_yyyymmdd(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.len() != 8 || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let year = text.get(0..4)?.parse().ok()?;
        let month = text.get(4..6)?.parse().ok()?;
        let day = text.get(6..8)?.parse().ok()?;
        ((1..=12).contains(&month) && (1..=31).contains(&day)).then_some(Self { year, month, day })
    }
}

impl fmt::Display for DbfDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Missing or blank value.
    Null,
    /// Text, already decoded.
    Text(String),
    /// Numeric value as its trimmed source text, so no digits are lost.
    Number(String),
    /// Logical value.
    Boolean(bool),
    /// Date value.
    Date(DbfDate),
}

impl AttributeValue {
    /// Numeric value from its source text.
    ///
    /// ```
    /// use shpload_core::AttributeValue;
    ///
    /// let value = AttributeValue::number("12.50");
    /// assert_eq!(value.as_f64(), Some(12.5));
    /// ```
    #[must_use]
    pub fn number(text: impl Into<String>) -> Self {
        Self::Number(text.into())
    }

    /// Numeric payload parsed as a float, if this is a well-formed number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(text) => text.parse().ok(),
            _ => None,
        }
    }

    /// Text payload, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Parameter for an insert. Nulls bind as the empty string.
    #[must_use]
    pub fn to_bind(&self) -> BindValue {
        match self {
            Self::Null => BindValue::Text(String::new()),
            Self::Text(text) | Self::Number(text) => BindValue::Text(text.clone()),
            Self::Boolean(value) => BindValue::Text(value.to_string()),
            Self::Date(date) => BindValue::Text(date.to_string()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Attribute values keyed by field name, in source field order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, AttributeValue)>,
}

impl Attributes {
    /// Empty attribute map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, replacing an earlier value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Value of `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Iterate entries in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Mutable access to values in field order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut AttributeValue> {
        self.entries.iter_mut().map(|(_, value)| value)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reorder onto `names`, filling missing names with nulls and dropping
    /// names not listed.
    #[must_use]
    pub fn project<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let entries = names
            .into_iter()
            .map(|name| {
                let value = self.get(name).cloned().unwrap_or(AttributeValue::Null);
                (name.to_owned(), value)
            })
            .collect();
        Self { entries }
    }
}

impl<K: Into<String>> FromIterator<(K, AttributeValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, AttributeValue)>>(iter: I) -> Self {
        let mut attributes = Self::new();
        for (key, value) in iter {
            attributes.insert(key, value);
        }
        attributes
    }
}

/// One feature read from a source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFeature {
    /// Attribute values in source field order.
    pub attributes: Attributes,
    /// Geometry in the source reference system, `None` for null shapes.
    pub geometry: Option<Geometry<f64>>,
    /// EPSG code of the source reference system, when known.
    pub srid: Option<i32>,
}

impl SourceFeature {
    /// Feature with the given attributes and geometry and no SRID.
    #[must_use]
    pub fn new(attributes: Attributes, geometry: Option<Geometry<f64>>) -> Self {
        Self {
            attributes,
            geometry,
            srid: None,
        }
    }

    /// Set the SRID.
    #[must_use]
    pub fn with_srid(mut self, srid: Option<i32>) -> Self {
        self.srid = srid;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AttributeValue::Null, "")]
    #[case(AttributeValue::Text("Main St".into()), "Main St")]
    #[case(AttributeValue::number("12"), "12")]
    #[case(AttributeValue::number("3.250"), "3.250")]
    #[case(AttributeValue::number("-0.5"), "-0.5")]
    #[case(AttributeValue::Boolean(true), "true")]
    #[case(AttributeValue::Date(DbfDate { year: 1999, month: 7, day: 4 }), "1999-07-04")]
    fn binds_values_as_text(#[case] value: AttributeValue, #[case] expected: &str) {
        assert_eq!(value.to_bind(), BindValue::Text(expected.into()));
    }

    #[rstest]
    fn numbers_bind_every_source_digit() {
        let value = AttributeValue::number("1234567890123456789");
        assert_eq!(value.to_bind(), BindValue::Text("1234567890123456789".into()));
    }

    #[rstest]
    #[case(AttributeValue::number("12.5"), Some(12.5))]
    #[case(AttributeValue::number("1.2.3"), None)]
    #[case(AttributeValue::from("12.5"), None)]
    fn numbers_parse_as_floats_on_request(
        #[case] value: AttributeValue,
        #[case] expected: Option<f64>,
    ) {
        assert_eq!(value.as_f64(), expected);
    }

    #[rstest]
    #[case("20241301")]
    #[case("20240100")]
    #[case("        ")]
    #[case("2024013")]
    fn rejects_invalid_dates(#[case] text: &str) {
        assert_eq!(DbfDate::parse_yyyymmdd(text), None);
    }

    #[rstest]
    fn insert_replaces_in_place() {
        let mut attrs: Attributes = [("A", AttributeValue::number("1")), ("B", "x".into())]
            .into_iter()
            .collect();
        attrs.insert("A", AttributeValue::Null);
        let keys: Vec<_> = attrs.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["A", "B"]);
        assert_eq!(attrs.get("A"), Some(&AttributeValue::Null));
    }

    #[rstest]
    fn project_pads_and_drops() {
        let attrs: Attributes = [("NAME", AttributeValue::from("a")), ("EXTRA", AttributeValue::number("2"))]
            .into_iter()
            .collect();
        let projected = attrs.project(["ID", "NAME"]);
        let entries: Vec<_> = projected.iter().collect();
        assert_eq!(
            entries,
            [
                ("ID", &AttributeValue::Null),
                ("NAME", &AttributeValue::Text("a".into()))
            ]
        );
    }
}
