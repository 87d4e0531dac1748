//! Per-day history store — one CSV per `(category, date)`.
//!
//! Layout under the data directory:
//!
//! ```text
//! history/gross/2024-05-01.csv       scored gross history
//! history/positions/2024-05-02.csv   scored position history
//! raw/gross/2024-05-01.csv           raw gross snapshot
//! raw/positions/2024-05-02.csv       raw position snapshot (previous-day input)
//! ```
//!
//! Writes go to a `.tmp` file that is renamed into place, so a re-run for the
//! same date replaces the file instead of appending. Reads order files by the
//! date in the file name, then by file name; files without a leading
//! `YYYY-MM-DD` are skipped. Rows are deduplicated on `(Date, Code)` keeping
//! the last occurrence.
//!
//! An unreadable file, or one whose header lacks any of the record's
//! columns, is a [`HistoryError`]: a silently truncated history would produce
//! wrong rankings. Only junk cell values read as zero.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shortwatch_core::domain::{GrossRow, PositionRow, ScoredGross, ScoredPosition};
use shortwatch_core::normalize::lenient_f64_or_zero;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt history file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("history file {path} has no `{column}` column")]
    MissingColumn { path: PathBuf, column: &'static str },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> HistoryError + '_ {
    move |source| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_err(path: &Path) -> impl FnOnce(csv::Error) -> HistoryError + '_ {
    move |source| HistoryError::Corrupt {
        path: path.to_path_buf(),
        source,
    }
}

/// A row type persisted one file per day.
pub trait HistoryRecord: Serialize + DeserializeOwned + Clone {
    /// Directory below the store root.
    const DIR: &'static str;
    /// Header written even when a day has no rows.
    const COLUMNS: &'static [&'static str];

    fn date(&self) -> NaiveDate;
    fn code(&self) -> &str;
}

// ── Scored history records ───────────────────────────────────────────

/// Gross history row: `Date,Code,Gross_num,PctGrossVsIssuedPct_num`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrossHistoryRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Gross_num", default, deserialize_with = "lenient_f64_or_zero")]
    pub gross_num: f64,
    #[serde(
        rename = "PctGrossVsIssuedPct_num",
        default,
        deserialize_with = "lenient_f64_or_zero"
    )]
    pub pct_gross_vs_issued_pct_num: f64,
}

impl From<&ScoredGross> for GrossHistoryRecord {
    fn from(row: &ScoredGross) -> Self {
        Self {
            date: row.date,
            code: row.code.clone(),
            gross_num: row.gross_num,
            pct_gross_vs_issued_pct_num: row.pct_gross_vs_issued_pct_num,
        }
    }
}

impl HistoryRecord for GrossHistoryRecord {
    const DIR: &'static str = "history/gross";
    const COLUMNS: &'static [&'static str] =
        &["Date", "Code", "Gross_num", "PctGrossVsIssuedPct_num"];

    fn date(&self) -> NaiveDate {
        self.date
    }
    fn code(&self) -> &str {
        &self.code
    }
}

/// Position history row:
/// `Date,Code,PctShort_pp_num,Delta_pp_num,DeltaShares_num,DaysToCover,ADV`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionHistoryRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "PctShort_pp_num", default, deserialize_with = "lenient_f64_or_zero")]
    pub pct_short_pp_num: f64,
    #[serde(rename = "Delta_pp_num", default, deserialize_with = "lenient_f64_or_zero")]
    pub delta_pp_num: f64,
    #[serde(rename = "DeltaShares_num", default, deserialize_with = "lenient_f64_or_zero")]
    pub delta_shares_num: f64,
    #[serde(rename = "DaysToCover", default, deserialize_with = "lenient_f64_or_zero")]
    pub days_to_cover: f64,
    #[serde(rename = "ADV", default, deserialize_with = "lenient_f64_or_zero")]
    pub adv: f64,
}

impl From<&ScoredPosition> for PositionHistoryRecord {
    fn from(row: &ScoredPosition) -> Self {
        Self {
            date: row.date,
            code: row.code.clone(),
            pct_short_pp_num: row.pct_short_pp_num,
            delta_pp_num: row.delta_pp_num,
            delta_shares_num: row.delta_shares_num,
            days_to_cover: row.days_to_cover,
            adv: row.adv,
        }
    }
}

impl HistoryRecord for PositionHistoryRecord {
    const DIR: &'static str = "history/positions";
    const COLUMNS: &'static [&'static str] = &[
        "Date",
        "Code",
        "PctShort_pp_num",
        "Delta_pp_num",
        "DeltaShares_num",
        "DaysToCover",
        "ADV",
    ];

    fn date(&self) -> NaiveDate {
        self.date
    }
    fn code(&self) -> &str {
        &self.code
    }
}

// ── Raw snapshot archive ─────────────────────────────────────────────

impl HistoryRecord for GrossRow {
    const DIR: &'static str = "raw/gross";
    const COLUMNS: &'static [&'static str] =
        &["Code", "Date", "Gross", "Issued", "PctGrossVsIssued"];

    fn date(&self) -> NaiveDate {
        self.date
    }
    fn code(&self) -> &str {
        &self.code
    }
}

impl HistoryRecord for PositionRow {
    const DIR: &'static str = "raw/positions";
    const COLUMNS: &'static [&'static str] =
        &["Code", "Date", "ReportedShort", "Issued", "PctShort"];

    fn date(&self) -> NaiveDate {
        self.date
    }
    fn code(&self) -> &str {
        &self.code
    }
}

// ── Store ────────────────────────────────────────────────────────────

/// A history file and the date parsed from its name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DayFile {
    pub date: NaiveDate,
    pub path: PathBuf,
}

/// Overview of one history category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub dir: &'static str,
    pub files: usize,
    pub days: usize,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
}

/// Leading `YYYY-MM-DD` of a file name.
pub fn date_prefix(file_name: &str) -> Option<NaiveDate> {
    let prefix = file_name.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Keep the last row per `(Date, Code)`, at the position of the first.
pub fn dedup_last<R: HistoryRecord>(rows: Vec<R>) -> Vec<R> {
    let mut out: Vec<R> = Vec::with_capacity(rows.len());
    let mut index: HashMap<(NaiveDate, String), usize> = HashMap::with_capacity(rows.len());
    for row in rows {
        let key = (row.date(), row.code().to_string());
        match index.get(&key) {
            Some(&i) => out[i] = row,
            None => {
                index.insert(key, out.len());
                out.push(row);
            }
        }
    }
    out
}

/// File-backed per-day store rooted at the data directory.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    root: PathBuf,
}

impl HistoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir<R: HistoryRecord>(&self) -> PathBuf {
        self.root.join(R::DIR)
    }

    /// Path of the canonical file for a date.
    pub fn day_path<R: HistoryRecord>(&self, date: NaiveDate) -> PathBuf {
        self.dir::<R>().join(format!("{}.csv", date.format("%Y-%m-%d")))
    }

    /// Write (or overwrite) the file for `date`. Atomic via `.tmp` + rename.
    pub fn write_day<R: HistoryRecord>(
        &self,
        date: NaiveDate,
        rows: &[R],
    ) -> Result<PathBuf, HistoryError> {
        let dir = self.dir::<R>();
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let path = self.day_path::<R>(date);
        let tmp = path.with_extension("csv.tmp");

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp)
            .map_err(csv_err(&tmp))?;
        writer.write_record(R::COLUMNS).map_err(csv_err(&tmp))?;
        for row in rows {
            writer.serialize(row).map_err(csv_err(&tmp))?;
        }
        writer.flush().map_err(io_err(&tmp))?;
        drop(writer);

        fs::rename(&tmp, &path).map_err(io_err(&path))?;
        tracing::debug!(path = %path.display(), rows = rows.len(), "history day written");
        Ok(path)
    }

    /// History files ordered by `(date, file name)`.
    pub fn files<R: HistoryRecord>(&self) -> Result<Vec<DayFile>, HistoryError> {
        let dir = self.dir::<R>();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&dir)(e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_err(&dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            match date_prefix(name) {
                Some(date) => files.push(DayFile { date, path }),
                None => tracing::warn!(path = %path.display(), "skipping history file without date prefix"),
            }
        }
        files.sort();
        Ok(files)
    }

    /// Distinct dates with at least one file, ascending.
    pub fn days<R: HistoryRecord>(&self) -> Result<Vec<NaiveDate>, HistoryError> {
        let days: BTreeSet<NaiveDate> = self.files::<R>()?.into_iter().map(|f| f.date).collect();
        Ok(days.into_iter().collect())
    }

    fn read_file<R: HistoryRecord>(path: &Path) -> Result<Vec<R>, HistoryError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(csv_err(path))?;
        let headers = reader.headers().map_err(csv_err(path))?;
        if let Some(column) = R::COLUMNS
            .iter()
            .copied()
            .find(|c| !headers.iter().any(|h| h == *c))
        {
            return Err(HistoryError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
        reader
            .deserialize::<R>()
            .map(|r| r.map_err(csv_err(path)))
            .collect()
    }

    fn load_files<R: HistoryRecord>(files: &[DayFile]) -> Result<Vec<R>, HistoryError> {
        let mut rows = Vec::new();
        for file in files {
            rows.extend(Self::read_file::<R>(&file.path)?);
        }
        let mut rows = dedup_last(rows);
        rows.sort_by_key(|r| r.date());
        Ok(rows)
    }

    /// Every row of the category, deduplicated, in date order.
    pub fn load_all<R: HistoryRecord>(&self) -> Result<Vec<R>, HistoryError> {
        Self::load_files(&self.files::<R>()?)
    }

    /// Rows of the last `n` distinct dates, deduplicated, in date order.
    pub fn load_last_n<R: HistoryRecord>(&self, n: usize) -> Result<Vec<R>, HistoryError> {
        let files = self.files::<R>()?;
        let days: BTreeSet<NaiveDate> = files.iter().map(|f| f.date).collect();
        let Some(&cutoff) = days.iter().rev().take(n).last() else {
            return Ok(Vec::new());
        };
        let window: Vec<DayFile> = files.into_iter().filter(|f| f.date >= cutoff).collect();
        Self::load_files(&window)
    }

    /// The newest day strictly before `date`, with its rows.
    pub fn latest_before<R: HistoryRecord>(
        &self,
        date: NaiveDate,
    ) -> Result<Option<(NaiveDate, Vec<R>)>, HistoryError> {
        let files = self.files::<R>()?;
        let Some(prev) = files.iter().map(|f| f.date).filter(|d| *d < date).max() else {
            return Ok(None);
        };
        let day: Vec<DayFile> = files.into_iter().filter(|f| f.date == prev).collect();
        Ok(Some((prev, Self::load_files(&day)?)))
    }

    pub fn summary<R: HistoryRecord>(&self) -> Result<HistorySummary, HistoryError> {
        let files = self.files::<R>()?;
        let days: BTreeSet<NaiveDate> = files.iter().map(|f| f.date).collect();
        Ok(HistorySummary {
            dir: R::DIR,
            files: files.len(),
            days: days.len(),
            first: days.iter().next().copied(),
            last: days.iter().next_back().copied(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn rec(day: u32, code: &str, delta_shares: f64) -> PositionHistoryRecord {
        PositionHistoryRecord {
            date: d(day),
            code: code.into(),
            pct_short_pp_num: 5.0,
            delta_pp_num: 0.0,
            delta_shares_num: delta_shares,
            days_to_cover: 0.0,
            adv: 0.0,
        }
    }

    #[test]
    fn write_then_read_day() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path());
        let path = store
            .write_day(d(1), &[rec(1, "ABC", -10.0), rec(1, "DEF", 5.0)])
            .unwrap();

        assert!(path.ends_with("history/positions/2024-05-01.csv"));
        assert!(!path.with_extension("csv.tmp").exists());

        let rows: Vec<PositionHistoryRecord> = store.load_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].delta_shares_num, -10.0);
    }

    #[test]
    fn rewrite_overwrites_instead_of_appending() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path());
        store.write_day(d(1), &[rec(1, "ABC", -10.0)]).unwrap();
        store.write_day(d(1), &[rec(1, "ABC", -20.0)]).unwrap();

        let rows: Vec<PositionHistoryRecord> = store.load_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].delta_shares_num, -20.0);
    }

    #[test]
    fn empty_day_keeps_header() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path());
        let path = store.write_day::<GrossHistoryRecord>(d(1), &[]).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert_eq!(text.trim(), "Date,Code,Gross_num,PctGrossVsIssuedPct_num");
    }

    #[test]
    fn duplicate_rows_keep_file_sorted_last() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path());
        let dir = store.dir::<PositionHistoryRecord>();
        fs::create_dir_all(&dir).unwrap();
        let header = PositionHistoryRecord::COLUMNS.join(",");
        fs::write(dir.join("2024-05-01.csv"), format!("{header}\n2024-05-01,ABC,5,0,-100,0,0\n")).unwrap();
        fs::write(dir.join("2024-05-01_fix.csv"), format!("{header}\n2024-05-01,ABC,5,0,-999,0,0\n")).unwrap();

        let rows: Vec<PositionHistoryRecord> = store.load_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].delta_shares_num, -999.0);
    }

    #[test]
    fn files_order_by_date_not_name() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path());
        let dir = store.dir::<PositionHistoryRecord>();
        fs::create_dir_all(&dir).unwrap();
        let header = PositionHistoryRecord::COLUMNS.join(",");
        fs::write(dir.join("2024-05-10.csv"), format!("{header}\n")).unwrap();
        fs::write(dir.join("2024-05-02_b.csv"), format!("{header}\n")).unwrap();
        fs::write(dir.join("2024-05-02_a.csv"), format!("{header}\n")).unwrap();
        fs::write(dir.join("notes.csv"), "junk\n").unwrap();
        fs::write(dir.join("2024-05-03.txt"), "junk\n").unwrap();

        let files = store.files::<PositionHistoryRecord>().unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["2024-05-02_a.csv", "2024-05-02_b.csv", "2024-05-10.csv"]);
        assert_eq!(store.days::<PositionHistoryRecord>().unwrap(), vec![d(2), d(10)]);
    }

    #[test]
    fn last_n_takes_distinct_dates() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path());
        for day in 1..=5 {
            store.write_day(d(day), &[rec(day, "ABC", -(day as f64))]).unwrap();
        }

        let rows: Vec<PositionHistoryRecord> = store.load_last_n(3).unwrap();
        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(3), d(4), d(5)]);

        let none: Vec<PositionHistoryRecord> = store.load_last_n(0).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn missing_directory_is_empty_history() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path().join("nowhere"));
        let rows: Vec<GrossHistoryRecord> = store.load_all().unwrap();
        assert!(rows.is_empty());
        assert_eq!(store.summary::<GrossHistoryRecord>().unwrap().days, 0);
    }

    #[test]
    fn junk_numbers_read_as_zero() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path());
        let dir = store.dir::<PositionHistoryRecord>();
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("2024-05-01.csv"),
            "Date,Code,PctShort_pp_num,Delta_pp_num,DeltaShares_num,DaysToCover,ADV\n\
             2024-05-01,ABC,n/a,-0.5,,inf,\n",
        )
        .unwrap();

        let rows: Vec<PositionHistoryRecord> = store.load_all().unwrap();
        assert_eq!(rows[0].pct_short_pp_num, 0.0);
        assert_eq!(rows[0].delta_pp_num, -0.5);
        assert_eq!(rows[0].delta_shares_num, 0.0);
        assert_eq!(rows[0].days_to_cover, 0.0);
    }

    #[test]
    fn missing_column_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path());
        let dir = store.dir::<PositionHistoryRecord>();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("2024-05-01.csv"), "Date,Code,PctShort_pp_num\n2024-05-01,ABC,9.0\n").unwrap();

        let err = store.load_all::<PositionHistoryRecord>().unwrap_err();
        assert!(matches!(err, HistoryError::MissingColumn { column: "Delta_pp_num", .. }));
        assert!(store.load_last_n::<PositionHistoryRecord>(3).is_err());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path());
        let dir = store.dir::<PositionHistoryRecord>();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("2024-05-01.csv"), "Code,PctShort_pp_num\nABC,1\n").unwrap();
        fs::write(
            dir.join("2024-05-02.csv"),
            "Date,Code,PctShort_pp_num,Delta_pp_num,DeltaShares_num,DaysToCover,ADV\n\
             2024-13-45,ABC,1,0,0,0,0\n",
        )
        .unwrap();

        let err = store.load_all::<PositionHistoryRecord>().unwrap_err();
        assert!(matches!(err, HistoryError::MissingColumn { column: "Date", .. }));

        fs::remove_file(dir.join("2024-05-01.csv")).unwrap();
        let err = store.load_all::<PositionHistoryRecord>().unwrap_err();
        assert!(matches!(err, HistoryError::Corrupt { .. }));
    }

    #[test]
    fn raw_archive_finds_previous_day() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path());
        let raw = |day: u32, pct: f64| PositionRow {
            code: "ABC".into(),
            date: d(day),
            reported_short: None,
            issued: Some(1_000_000.0),
            pct_short: Some(pct),
        };
        store.write_day(d(1), &[raw(1, 12.0)]).unwrap();
        store.write_day(d(2), &[raw(2, 10.0)]).unwrap();

        let (date, rows) = store.latest_before::<PositionRow>(d(2)).unwrap().unwrap();
        assert_eq!(date, d(1));
        assert_eq!(rows, vec![raw(1, 12.0)]);

        assert!(store.latest_before::<PositionRow>(d(1)).unwrap().is_none());
        // A re-run of the same day still compares against the day before.
        let (date, _) = store.latest_before::<PositionRow>(d(3)).unwrap().unwrap();
        assert_eq!(date, d(2));
    }

    #[test]
    fn raw_gross_keeps_missing_values() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path());
        let row = GrossRow {
            code: "ABC".into(),
            date: d(1),
            gross: Some(250_000.0),
            issued: None,
            vendor_pct: Some(0.0025),
        };
        store.write_day(d(1), &[row.clone()]).unwrap();
        let rows: Vec<GrossRow> = store.load_all().unwrap();
        assert_eq!(rows, vec![row]);
    }
}
