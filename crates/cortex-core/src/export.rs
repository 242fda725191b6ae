//! CSV export of query results.

use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::query::QueryResult;

/// `cortex_results_YYYYMMDD_HHMMSS.csv`, stamped in UTC.
pub fn export_filename(at: DateTime<Utc>) -> String {
    format!("cortex_results_{}.csv", at.format("%Y%m%d_%H%M%S"))
}

/// Header row plus one line per row. NULL cells become empty fields.
pub fn to_csv(result: &QueryResult) -> String {
    let mut out = String::new();
    push_record(&mut out, result.columns.iter().map(|c| Some(c.name.as_str())));
    for row in &result.rows {
        push_record(&mut out, row.iter().map(|cell| cell.as_deref()));
    }
    out
}

pub fn write_csv(dir: &Path, result: &QueryResult, at: DateTime<Utc>) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(export_filename(at));
    fs::write(&path, to_csv(result))?;
    Ok(path)
}

fn push_record<'a, I>(out: &mut String, fields: I)
where
    I: Iterator<Item = Option<&'a str>>,
{
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if let Some(value) = field {
            out.push_str(&escape(value));
        }
    }
    out.push('\n');
}

fn escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
