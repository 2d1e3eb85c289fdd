//! XLSX report generation.
//!
//! This module turns aggregated sales totals into a styled single-sheet
//! workbook, and renders run summaries as text or JSON for the CLI.

use crate::analysis::{aggregate_lines, aggregate_reader, Aggregation};
use crate::config::ReportConfig;
use crate::error::ProcessingError;
use crate::models::{LineStats, ReportTable, RunSummary, REPORT_COLUMNS};
use anyhow::Result;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook};
use std::io::BufRead;
use tracing::{debug, info, warn};

/// MIME type of the rendered workbook.
pub const XLSX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Default download name for the rendered workbook.
pub const REPORT_FILENAME: &str = "sales_report.xlsx";

/// Longest string Excel stores in a single cell.
const MAX_CELL_CHARS: usize = 32_767;

/// Widest column Excel accepts.
const MAX_COLUMN_WIDTH: usize = 255;

/// Cosmetic settings for the rendered sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportStyle {
    pub sheet_name: String,
    /// Header fill as 0xRRGGBB.
    pub header_color: u32,
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self {
            sheet_name: "Sales Report".to_string(),
            header_color: 0xD7E4BC,
        }
    }
}

impl TryFrom<&ReportConfig> for ReportStyle {
    type Error = ProcessingError;

    fn try_from(config: &ReportConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            sheet_name: config.sheet_name.clone(),
            header_color: parse_hex_color(&config.header_color)?,
        })
    }
}

/// Parse a `#RRGGBB` colour string.
pub fn parse_hex_color(value: &str) -> Result<u32, ProcessingError> {
    let invalid = || ProcessingError::InvalidHeaderColor(value.to_string());

    let hex = value.trim().strip_prefix('#').ok_or_else(invalid)?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    u32::from_str_radix(hex, 16).map_err(|_| invalid())
}

/// A finished report: workbook bytes plus the counters it was built from.
#[derive(Debug, Clone)]
pub struct SalesReport {
    pub workbook: Vec<u8>,
    pub grand_total: i64,
    pub null_sku_total: i64,
    pub distinct_skus: usize,
    pub table: ReportTable,
    pub stats: LineStats,
}

impl SalesReport {
    /// Build the summary printed after a run.
    pub fn summary(&self, source: &str, output: &str) -> RunSummary {
        RunSummary {
            source: source.to_string(),
            output: output.to_string(),
            generated_at: chrono::Utc::now(),
            grand_total: self.grand_total,
            null_sku_total: self.null_sku_total,
            distinct_skus: self.distinct_skus,
            lines: self.stats,
            rows: self.table.rows().to_vec(),
        }
    }
}

/// Aggregate a sequence of raw lines and render the workbook.
pub fn build_report<I, L>(
    lines: I,
    style: &ReportStyle,
) -> Result<SalesReport, ProcessingError>
where
    I: IntoIterator<Item = L>,
    L: AsRef<[u8]>,
{
    finish_report(aggregate_lines(lines), style)
}

/// Aggregate a `\n`-delimited byte stream and render the workbook.
pub fn build_report_from_reader<R: BufRead>(
    reader: R,
    style: &ReportStyle,
) -> Result<SalesReport, ProcessingError> {
    finish_report(aggregate_reader(reader)?, style)
}

fn finish_report(
    aggregation: Aggregation,
    style: &ReportStyle,
) -> Result<SalesReport, ProcessingError> {
    let Aggregation { totals, stats } = aggregation;

    info!(
        "Aggregated {} records ({} skipped, {} blank) into {} SKUs",
        stats.records,
        stats.skipped_lines,
        stats.blank_lines,
        totals.distinct_skus()
    );

    let table = totals.to_table();
    let workbook = render_workbook(&table, style)?;

    Ok(SalesReport {
        workbook,
        grand_total: totals.grand_total(),
        null_sku_total: totals.null_sku_total(),
        distinct_skus: totals.distinct_skus(),
        table,
        stats,
    })
}

/// Render the report table into XLSX bytes.
pub fn render_workbook(
    table: &ReportTable,
    style: &ReportStyle,
) -> Result<Vec<u8>, ProcessingError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&style.sheet_name)?;

    let header_format = Format::new()
        .set_bold()
        .set_text_wrap()
        .set_align(FormatAlign::Top)
        .set_background_color(Color::RGB(style.header_color))
        .set_border(FormatBorder::Thin);

    for (col, header) in REPORT_COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (i, row) in table.rows().iter().enumerate() {
        let row_num = (i + 1) as u32;
        worksheet.write_string(row_num, 0, cell_text(&row.label))?;
        worksheet.write_number(row_num, 1, row.value as f64)?;
    }

    for (col, width) in column_widths(table).into_iter().enumerate() {
        worksheet.set_column_width(col as u16, width as f64)?;
    }

    let bytes = workbook.save_to_buffer()?;
    debug!(
        "Rendered workbook: {} rows, {} bytes",
        table.rows().len(),
        bytes.len()
    );

    Ok(bytes)
}

/// Cut a label to what fits in one cell.
fn cell_text(label: &str) -> String {
    match label.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => {
            warn!(
                "Label of {} characters truncated to {} to fit in a cell",
                label.chars().count(),
                MAX_CELL_CHARS
            );
            label[..cut].to_string()
        }
        None => label.to_string(),
    }
}

/// Column widths: the longest rendered cell, but at least header length + 2,
/// capped at Excel's maximum.
pub fn column_widths(table: &ReportTable) -> [usize; 2] {
    let label_len = table
        .rows()
        .iter()
        .map(|row| row.label.chars().count())
        .max()
        .unwrap_or(0);
    let value_len = table
        .rows()
        .iter()
        .map(|row| row.value.to_string().len())
        .max()
        .unwrap_or(0);

    [
        label_len
            .max(REPORT_COLUMNS[0].chars().count() + 2)
            .min(MAX_COLUMN_WIDTH),
        value_len
            .max(REPORT_COLUMNS[1].chars().count() + 2)
            .min(MAX_COLUMN_WIDTH),
    ]
}

/// Generate a human-readable run summary.
pub fn generate_text_summary(summary: &RunSummary) -> String {
    let mut output = String::new();

    output.push_str("📊 Sales Report Summary:\n");
    output.push_str(&format!("   Source: {}\n", summary.source));
    output.push_str(&format!(
        "   Lines: {} read | {} aggregated | {} skipped | {} blank\n",
        summary.lines.lines_read,
        summary.lines.records,
        summary.lines.skipped_lines,
        summary.lines.blank_lines
    ));
    output.push_str(&format!("   Distinct SKUs: {}\n", summary.distinct_skus));
    output.push_str(&format!("   Items without SKU: {}\n", summary.null_sku_total));
    output.push_str(&format!("   Total items sold: {}\n", summary.grand_total));

    output
}

/// Generate a JSON run summary.
pub fn generate_json_summary(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).map_err(Into::into)
}
