use crate::job::JobOutcome;
use crate::naming::{resolve_collision, write_bytes_atomic};
use crate::progress::ProgressSnapshot;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const REPORT_HEADER: [&str; 7] = [
    "Original Filename",
    "Scanned for OCR",
    "First Page Ignored During Scan",
    "Pages Lacking OCR",
    "File OCR'd",
    "First Page Removed",
    "New Filename",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
    Ok,
    Failed { reason: String },
}

/// The durable projection of one processed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub original_filename: String,
    pub scanned: bool,
    /// `None` when no scan was requested.
    pub first_page_ignored_in_scan: Option<bool>,
    pub pages_lacking_text: u32,
    /// False when a scan was requested but could not read the file.
    pub scan_available: bool,
    pub recognized: bool,
    pub first_page_removed: bool,
    pub new_filename: String,
    pub output_path: Option<PathBuf>,
    pub status: RecordStatus,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl LogRecord {
    /// One table row, in [`REPORT_HEADER`] order.
    pub fn cells(&self) -> [String; 7] {
        [
            self.original_filename.clone(),
            yes_no(self.scanned).into(),
            self.first_page_ignored_in_scan
                .map(yes_no)
                .unwrap_or("N/A")
                .into(),
            self.pages_lacking_text.to_string(),
            yes_no(self.recognized).into(),
            yes_no(self.first_page_removed).into(),
            self.new_filename.clone(),
        ]
    }

    pub fn failed(&self) -> bool {
        matches!(self.status, RecordStatus::Failed { .. })
    }
}

fn yes_no(v: bool) -> &'static str {
    if v { "Yes" } else { "No" }
}

/// Append-only, queue-ordered collection of records for one job.
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    records: Vec<LogRecord>,
}

impl ReportBuilder {
    pub fn push(&mut self, record: LogRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn failures(&self) -> usize {
        self.records.iter().filter(|r| r.failed()).count()
    }

    pub fn finish(self, meta: ReportMeta) -> JobReport {
        JobReport {
            meta,
            records: self.records,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub job_id: String,
    pub started: String,
    pub finished: String,
    pub outcome: JobOutcome,
    pub total: usize,
    pub completed: usize,
    pub elapsed_secs: f64,
}

impl ReportMeta {
    pub fn new(
        job_id: &str,
        started: &str,
        finished: &str,
        outcome: JobOutcome,
        progress: &ProgressSnapshot,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            started: started.to_string(),
            finished: finished.to_string(),
            outcome,
            total: progress.total,
            completed: progress.completed,
            elapsed_secs: progress.elapsed.as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    #[serde(flatten)]
    pub meta: ReportMeta,
    pub records: Vec<LogRecord>,
}

impl JobReport {
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut w = csv::Writer::from_writer(Vec::new());
        w.write_record(REPORT_HEADER)?;
        for r in &self.records {
            w.write_record(r.cells())?;
        }
        w.into_inner().map_err(|e| anyhow::anyhow!("flushing CSV: {}", e.error()))
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportedReport {
    pub csv: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

/// Writes the enabled formats into `dir` as `<stem>_<date>.<ext>`, never replacing
/// an earlier export.
pub fn export(
    report: &JobReport,
    dir: &Path,
    stem: &str,
    date: &str,
    write_csv: bool,
    write_json: bool,
) -> Result<ExportedReport> {
    crate::util::ensure_dir(dir)?;
    let mut out = ExportedReport::default();
    if write_csv {
        let path = resolve_collision(&dir.join(format!("{stem}_{date}.csv")));
        write_bytes_atomic(&path, &report.to_csv()?)
            .with_context(|| format!("writing report: {}", path.display()))?;
        out.csv = Some(path);
    }
    if write_json {
        let path = resolve_collision(&dir.join(format!("{stem}_{date}.json")));
        write_bytes_atomic(&path, &report.to_json()?)
            .with_context(|| format!("writing report: {}", path.display()))?;
        out.json = Some(path);
    }
    Ok(out)
}
