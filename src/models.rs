//! Data models for the sales report.
//!
//! This module contains the per-line record, the accumulator that owns a
//! single aggregation run, and the derived report table.

use crate::error::LineParseError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Label of the row holding quantities for records without a SKU.
pub const NULL_SKU_LABEL: &str = "NULL_SKU";

/// Label of the closing grand-total row.
pub const TOTAL_LABEL: &str = "TOTAL";

/// Column headers of the rendered report.
pub const REPORT_COLUMNS: [&str; 2] = ["Product Variant SKU", "Net Items Sold"];

const SKU_FIELD: &str = "product_variant_sku";
const SOLD_FIELD: &str = "net_items_sold";

/// One parsed JSONL line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesRecord {
    /// Product variant SKU, `None` when absent or null.
    pub sku: Option<Sku>,
    /// Net items sold, 0 when the field is absent.
    pub sold: i64,
}

impl SalesRecord {
    /// Parse a trimmed, non-empty line into a record.
    pub fn parse(line: &str) -> Result<Self, LineParseError> {
        let value: Value = serde_json::from_str(line)?;
        let object = match value {
            Value::Object(object) => object,
            other => return Err(LineParseError::NotAnObject(json_kind(&other))),
        };
        Self::from_object(&object)
    }

    /// Extract the two relevant fields from a JSON object.
    pub fn from_object(object: &Map<String, Value>) -> Result<Self, LineParseError> {
        Ok(Self {
            sku: sku_from_value(object.get(SKU_FIELD)),
            sold: quantity_from_value(object.get(SOLD_FIELD))?,
        })
    }
}

/// A SKU key as it appeared in the input.
///
/// Strings and other JSON values are kept apart, so `"123"` and `123` total
/// separately even though both rows are labelled `123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sku {
    /// A JSON string, used verbatim.
    Text(String),
    /// Any other non-null JSON value, held as its compact JSON text.
    Json(String),
}

impl Sku {
    /// Text shown in the report row.
    pub fn label(&self) -> &str {
        match self {
            Sku::Text(text) | Sku::Json(text) => text,
        }
    }
}

fn sku_from_value(value: Option<&Value>) -> Option<Sku> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(Sku::Text(s.clone())),
        Some(other) => Some(Sku::Json(other.to_string())),
    }
}

/// Coerce `net_items_sold` to an integer, defaulting to 0 when absent.
fn quantity_from_value(value: Option<&Value>) -> Result<i64, LineParseError> {
    let Some(value) = value else {
        return Ok(0);
    };

    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64().filter(|f| n.as_u64().is_none() && f.is_finite()) {
                let truncated = f.trunc();
                if truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
                    Ok(truncated as i64)
                } else {
                    Err(LineParseError::InvalidQuantity(n.to_string()))
                }
            } else {
                Err(LineParseError::InvalidQuantity(n.to_string()))
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| LineParseError::InvalidQuantity(format!("{:?}", s))),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(LineParseError::InvalidQuantity(json_kind(other).to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Running totals for one aggregation run.
///
/// `grand_total` always equals `null_sku_total` plus the sum of every SKU
/// total; [`SalesTotals::add`] either applies a record completely or not at
/// all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SalesTotals {
    skus: Vec<(Sku, i64)>,
    index: HashMap<Sku, usize>,
    null_sku_total: i64,
    grand_total: i64,
}

impl SalesTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record's quantity to its SKU (or the null bucket) and the grand total.
    pub fn add(&mut self, record: &SalesRecord) -> Result<(), LineParseError> {
        let overflow = || LineParseError::Overflow(record.sold);

        let grand_total = self.grand_total.checked_add(record.sold).ok_or_else(overflow)?;

        match &record.sku {
            None => {
                self.null_sku_total = self
                    .null_sku_total
                    .checked_add(record.sold)
                    .ok_or_else(overflow)?;
            }
            Some(sku) => match self.index.get(sku) {
                Some(&slot) => {
                    let entry = &mut self.skus[slot].1;
                    *entry = entry.checked_add(record.sold).ok_or_else(overflow)?;
                }
                None => {
                    self.index.insert(sku.clone(), self.skus.len());
                    self.skus.push((sku.clone(), record.sold));
                }
            },
        }

        self.grand_total = grand_total;
        Ok(())
    }

    /// Total for a string SKU, if it has been seen.
    #[cfg(test)]
    pub fn sku_total(&self, sku: &str) -> Option<i64> {
        self.index
            .get(&Sku::Text(sku.to_string()))
            .map(|&slot| self.skus[slot].1)
    }

    /// SKU totals in first-seen order, keyed by row label.
    pub fn sku_totals(&self) -> impl Iterator<Item = (&str, i64)> {
        self.skus.iter().map(|(sku, total)| (sku.label(), *total))
    }

    pub fn distinct_skus(&self) -> usize {
        self.skus.len()
    }

    pub fn null_sku_total(&self) -> i64 {
        self.null_sku_total
    }

    pub fn grand_total(&self) -> i64 {
        self.grand_total
    }

    /// Build the report table: null bucket, SKUs in first-seen order, total.
    pub fn to_table(&self) -> ReportTable {
        let mut rows = Vec::with_capacity(self.skus.len() + 2);
        rows.push(ReportRow::new(NULL_SKU_LABEL, self.null_sku_total));
        rows.extend(
            self.skus
                .iter()
                .map(|(sku, total)| ReportRow::new(sku.label(), *total)),
        );
        rows.push(ReportRow::new(TOTAL_LABEL, self.grand_total));
        ReportTable { rows }
    }
}

/// A single `(label, value)` row of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub label: String,
    pub value: i64,
}

impl ReportRow {
    pub fn new(label: impl Into<String>, value: i64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Ordered report rows, built once from [`SalesTotals`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportTable {
    rows: Vec<ReportRow>,
}

impl ReportTable {
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    #[cfg(test)]
    pub fn pairs(&self) -> Vec<(&str, i64)> {
        self.rows
            .iter()
            .map(|row| (row.label.as_str(), row.value))
            .collect()
    }
}

/// Line counters for one aggregation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LineStats {
    /// Lines read from the input, blank ones included.
    pub lines_read: usize,
    /// Lines that were empty after trimming.
    pub blank_lines: usize,
    /// Lines that contributed to the totals.
    pub records: usize,
    /// Lines skipped because they could not be parsed.
    pub skipped_lines: usize,
}

/// Summary of a finished run, printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub source: String,
    pub output: String,
    pub generated_at: DateTime<Utc>,
    pub grand_total: i64,
    pub null_sku_total: i64,
    pub distinct_skus: usize,
    pub lines: LineStats,
    pub rows: Vec<ReportRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sku: Option<&str>, sold: i64) -> SalesRecord {
        SalesRecord {
            sku: sku.map(|s| Sku::Text(s.to_string())),
            sold,
        }
    }

    #[test]
    fn test_parse_full_record() {
        let rec = SalesRecord::parse(r#"{"product_variant_sku":"A1","net_items_sold":3}"#).unwrap();
        assert_eq!(rec, record(Some("A1"), 3));
    }

    #[test]
    fn test_parse_missing_fields() {
        let rec = SalesRecord::parse(r#"{"net_items_sold":5}"#).unwrap();
        assert_eq!(rec, record(None, 5));

        let rec = SalesRecord::parse(r#"{"product_variant_sku":"B2"}"#).unwrap();
        assert_eq!(rec, record(Some("B2"), 0));

        let rec = SalesRecord::parse(r#"{"product_variant_sku":null,"net_items_sold":1}"#).unwrap();
        assert_eq!(rec.sku, None);
    }

    #[test]
    fn test_quantity_coercion() {
        let sold = |line: &str| SalesRecord::parse(line).map(|r| r.sold);

        assert_eq!(sold(r#"{"net_items_sold":"4"}"#).unwrap(), 4);
        assert_eq!(sold(r#"{"net_items_sold":" -2 "}"#).unwrap(), -2);
        assert_eq!(sold(r#"{"net_items_sold":3.9}"#).unwrap(), 3);
        assert_eq!(sold(r#"{"net_items_sold":true}"#).unwrap(), 1);

        assert!(matches!(
            sold(r#"{"net_items_sold":"four"}"#),
            Err(LineParseError::InvalidQuantity(_))
        ));
        assert!(sold(r#"{"net_items_sold":"4.5"}"#).is_err());
        assert!(sold(r#"{"net_items_sold":null}"#).is_err());
        assert!(sold(r#"{"net_items_sold":[1]}"#).is_err());
        assert!(sold(r#"{"net_items_sold":18446744073709551615}"#).is_err());
    }

    #[test]
    fn test_non_object_and_bad_json() {
        assert!(matches!(
            SalesRecord::parse("[1, 2]"),
            Err(LineParseError::NotAnObject("an array"))
        ));
        assert!(matches!(
            SalesRecord::parse("not json"),
            Err(LineParseError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_non_string_sku_uses_json_text() {
        let rec = SalesRecord::parse(r#"{"product_variant_sku":123,"net_items_sold":1}"#).unwrap();
        assert_eq!(rec.sku, Some(Sku::Json("123".to_string())));
        assert_eq!(rec.sku.as_ref().map(Sku::label), Some("123"));

        let rec = SalesRecord::parse(r#"{"product_variant_sku":"123","net_items_sold":1}"#).unwrap();
        assert_eq!(rec.sku, Some(Sku::Text("123".to_string())));
    }

    #[test]
    fn test_string_and_number_skus_stay_separate() {
        let mut totals = SalesTotals::new();
        for line in [
            r#"{"product_variant_sku":"123","net_items_sold":1}"#,
            r#"{"product_variant_sku":123,"net_items_sold":2}"#,
            r#"{"product_variant_sku":"123","net_items_sold":4}"#,
        ] {
            totals.add(&SalesRecord::parse(line).unwrap()).unwrap();
        }

        assert_eq!(totals.distinct_skus(), 2);
        assert_eq!(totals.sku_total("123"), Some(5));
        assert_eq!(
            totals.to_table().pairs(),
            vec![("NULL_SKU", 0), ("123", 5), ("123", 2), ("TOTAL", 7)]
        );
    }

    #[test]
    fn test_totals_keep_first_seen_order() {
        let mut totals = SalesTotals::new();
        totals.add(&record(Some("B"), 1)).unwrap();
        totals.add(&record(Some("A"), 2)).unwrap();
        totals.add(&record(Some("B"), 3)).unwrap();
        totals.add(&record(None, 4)).unwrap();

        let skus: Vec<_> = totals.sku_totals().collect();
        assert_eq!(skus, vec![("B", 4), ("A", 2)]);
        assert_eq!(totals.null_sku_total(), 4);
        assert_eq!(totals.grand_total(), 10);
        assert_eq!(totals.sku_total("A"), Some(2));
        assert_eq!(totals.sku_total("C"), None);
    }

    #[test]
    fn test_overflow_leaves_totals_untouched() {
        let mut totals = SalesTotals::new();
        totals.add(&record(Some("A"), i64::MAX)).unwrap();
        let before = totals.clone();

        assert!(matches!(
            totals.add(&record(Some("A"), 1)),
            Err(LineParseError::Overflow(1))
        ));
        assert!(totals.add(&record(None, 1)).is_err());
        assert_eq!(totals, before);
    }

    #[test]
    fn test_table_bookends() {
        let totals = SalesTotals::new();
        assert_eq!(totals.to_table().pairs(), vec![("NULL_SKU", 0), ("TOTAL", 0)]);

        let mut totals = SalesTotals::new();
        totals.add(&record(Some("X"), 7)).unwrap();
        let table = totals.to_table();
        assert_eq!(table.rows().first().map(|r| r.label.as_str()), Some(NULL_SKU_LABEL));
        assert_eq!(table.rows().last().map(|r| r.label.as_str()), Some(TOTAL_LABEL));
        assert_eq!(table.rows().len(), 3);
    }
}
