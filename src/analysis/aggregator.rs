//! Streaming aggregation of JSONL sales lines.
//!
//! Every line is decoded, parsed and folded into a [`SalesTotals`]
//! accumulator owned by the run. Bad lines are logged and skipped; only a
//! failure to read the underlying stream ends the run early.

use crate::error::{LineParseError, ProcessingError};
use crate::models::{LineStats, SalesRecord, SalesTotals};
use std::io::BufRead;
use tracing::{debug, warn};

/// UTF-8 byte-order mark, accepted only at the start of the stream.
const UTF8_BOM: &[u8; 3] = b"\xEF\xBB\xBF";

/// Result of consuming an input stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    pub totals: SalesTotals,
    pub stats: LineStats,
}

/// Incremental accumulator fed one raw line at a time.
#[derive(Debug, Default)]
pub struct Aggregator {
    totals: SalesTotals,
    stats: LineStats,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one raw line into the totals. Never fails; bad lines are skipped.
    pub fn push_line(&mut self, raw: &[u8]) {
        self.stats.lines_read += 1;
        let line_no = self.stats.lines_read;
        let raw = if line_no == 1 {
            raw.strip_prefix(UTF8_BOM).unwrap_or(raw)
        } else {
            raw
        };

        let outcome = parse_line(raw).and_then(|parsed| match parsed {
            Some(record) => self.totals.add(&record).map(|_| Some(record)),
            None => Ok(None),
        });

        match outcome {
            Ok(Some(record)) => {
                self.stats.records += 1;
                debug!(line = line_no, sku = ?record.sku, sold = record.sold, "Aggregated record");
            }
            Ok(None) => self.stats.blank_lines += 1,
            Err(e) => {
                self.stats.skipped_lines += 1;
                warn!("Skipping line {}: {} ({})", line_no, e, preview(raw));
            }
        }
    }

    pub fn finish(self) -> Aggregation {
        Aggregation {
            totals: self.totals,
            stats: self.stats,
        }
    }
}

/// Decode and parse a raw line. Returns `Ok(None)` for blank lines.
pub fn parse_line(raw: &[u8]) -> Result<Option<SalesRecord>, LineParseError> {
    let text = std::str::from_utf8(raw)?;
    let text = text.trim();

    if text.is_empty() {
        return Ok(None);
    }

    SalesRecord::parse(text).map(Some)
}

/// Aggregate an in-memory sequence of lines.
pub fn aggregate_lines<I, L>(lines: I) -> Aggregation
where
    I: IntoIterator<Item = L>,
    L: AsRef<[u8]>,
{
    let mut aggregator = Aggregator::new();
    for line in lines {
        aggregator.push_line(line.as_ref());
    }
    aggregator.finish()
}

/// Aggregate a byte stream split on `\n`.
pub fn aggregate_reader<R: BufRead>(mut reader: R) -> Result<Aggregation, ProcessingError> {
    let mut aggregator = Aggregator::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        aggregator.push_line(&buf);
    }

    Ok(aggregator.finish())
}

/// Short, lossy rendering of a line for log output.
fn preview(raw: &[u8]) -> String {
    const MAX_CHARS: usize = 80;

    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    if text.chars().count() > MAX_CHARS {
        let cut: String = text.chars().take(MAX_CHARS).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
