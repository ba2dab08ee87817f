//! Dataset emission: one timestamped CSV snapshot per run. Later snapshots
//! supersede earlier ones for "latest data" consumers; nothing is mutated
//! across runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use atis_core::TenderRecord;

pub const COLUMNS: [&str; 11] = [
    "tender_name",
    "tender_authority",
    "application_start_date",
    "tender_deadline",
    "period",
    "tender_location",
    "date_published",
    "tender_type",
    "source_url",
    "found_keywords",
    "state",
];

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub path: PathBuf,
    pub rows: usize,
}

pub fn snapshot_file_name(at: DateTime<Utc>) -> String {
    format!("tenders_{}.csv", at.format("%Y-%m-%d_%H-%M-%S"))
}

/// Writes the consolidated dataset to `<output_dir>/tenders_<timestamp>.csv`.
/// An empty dataset produces a header-only file.
pub fn write_snapshot(
    output_dir: &Path,
    at: DateTime<Utc>,
    records: &[TenderRecord],
) -> Result<Snapshot> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let path = output_dir.join(snapshot_file_name(at));

    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("creating snapshot {}", path.display()))?;
    writer.write_record(COLUMNS).context("writing header")?;
    for record in records {
        let keywords = record.keywords_joined();
        let state = record.state.to_string();
        writer
            .write_record([
                record.tender_name.as_str(),
                record.tender_authority.as_str(),
                record.application_start_date.as_str(),
                record.tender_deadline.as_str(),
                record.period.as_str(),
                record.tender_location.as_str(),
                record.date_published.as_str(),
                record.tender_type.as_str(),
                record.source_url.as_str(),
                keywords.as_str(),
                state.as_str(),
            ])
            .with_context(|| format!("writing row for {}", record.tender_name))?;
    }
    writer.flush().context("flushing snapshot")?;

    Ok(Snapshot {
        path,
        rows: records.len(),
    })
}
