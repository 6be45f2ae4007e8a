//! Contract records and their typed column view.
//!
//! A [`ContractRecord`] always carries one value per column of
//! [`FIELDS`](crate::feed::decoder::FIELDS), in column order. Values are kept
//! as the text the feed delivered; [`ContractRecord::typed_values`] is the
//! pre-persist step that turns monetary columns into numbers or nulls.
//!
//! The column names use the feed's own camelCase spelling so that CSV headers
//! and database columns line up with the upstream schema.

use crate::feed::decoder::FIELDS;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::warn;

/// How a column is typed once it leaves the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Dollar amount; empty means null, never zero.
    Money,
}

/// A column value after type coercion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
    Null,
}

impl FieldValue<'_> {
    /// Rendering used by delimited output: nulls become empty cells.
    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Text(text) => (*text).to_string(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Null => String::new(),
        }
    }
}

impl Serialize for FieldValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(text) => serializer.serialize_str(text),
            FieldValue::Number(n) => serializer.serialize_f64(*n),
            FieldValue::Null => serializer.serialize_none(),
        }
    }
}

/// Coerce a monetary cell.
///
/// # Arguments
///
/// * `column` - Column name, used only for the warning on bad input
/// * `raw` - Text as delivered by the feed
///
/// # Returns
///
/// [`FieldValue::Number`] for a finite decimal and [`FieldValue::Null`] for
/// empty text. Anything else is logged and also becomes null, never zero.
pub fn parse_money(column: &str, raw: &str) -> FieldValue<'static> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return FieldValue::Null;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => FieldValue::Number(n),
        _ => {
            warn!(column, value = %raw, "Unparseable monetary value; storing null");
            FieldValue::Null
        }
    }
}

/// One decoded feed entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractRecord {
    values: Vec<String>,
}

impl ContractRecord {
    /// Build a record from values in column order.
    ///
    /// Missing trailing values are filled with empty text and extra values
    /// are dropped, so the record always has exactly one value per column.
    pub fn from_values(mut values: Vec<String>) -> Self {
        values.resize(FIELDS.len(), String::new());
        Self { values }
    }

    /// Raw text of a column, or `None` for an unknown column name.
    pub fn get(&self, column: &str) -> Option<&str> {
        FIELDS
            .iter()
            .position(|spec| spec.column == column)
            .map(|i| self.values[i].as_str())
    }

    /// Typed values in column order.
    pub fn typed_values(&self) -> impl Iterator<Item = FieldValue<'_>> {
        FIELDS
            .iter()
            .zip(self.values.iter())
            .map(|(spec, value)| match spec.kind {
                FieldKind::Text => FieldValue::Text(value.as_str()),
                FieldKind::Money => parse_money(spec.column, value),
            })
    }
}

/// Serializes as a map of column name to typed value.
impl Serialize for ContractRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (spec, value) in FIELDS.iter().zip(self.typed_values()) {
            map.serialize_entry(spec.column, &value)?;
        }
        map.end()
    }
}

/// Column names in output order.
pub fn columns() -> impl Iterator<Item = &'static str> {
    FIELDS.iter().map(|spec| spec.column)
}
