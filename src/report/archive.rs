//! Report persistence: archive the previous file, then overwrite it.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use thiserror::Error;
use tracing::info;

use super::assembler::{ist, Report};

/// Timestamp embedded in archive file names.
pub const ARCHIVE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to create archive directory {path}: {source}")]
    CreateArchiveDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to archive {from} to {to}: {source}")]
    Archive {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Where a publish left things.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub report_path: PathBuf,
    /// Copy of the previous report, if there was one.
    pub archived: Option<PathBuf>,
}

/// Writes the report file, keeping each previous version in an archive directory.
pub struct ReportWriter {
    report_path: PathBuf,
    archive_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(report_path: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_path: report_path.into(),
            archive_dir: archive_dir.into(),
        }
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    /// Archive the existing report (if any) and write `report` in its place.
    pub fn publish<Tz: TimeZone>(
        &self,
        report: &Report,
        generated_at: &DateTime<Tz>,
    ) -> Result<PublishOutcome, PersistenceError> {
        let archived = if self.report_path.exists() {
            Some(self.archive_previous(generated_at)?)
        } else {
            None
        };

        fs::write(&self.report_path, report.render()).map_err(|source| PersistenceError::Write {
            path: self.report_path.clone(),
            source,
        })?;
        info!("Wrote {}", self.report_path.display());

        Ok(PublishOutcome {
            report_path: self.report_path.clone(),
            archived,
        })
    }

    fn archive_previous<Tz: TimeZone>(
        &self,
        generated_at: &DateTime<Tz>,
    ) -> Result<PathBuf, PersistenceError> {
        fs::create_dir_all(&self.archive_dir).map_err(|source| {
            PersistenceError::CreateArchiveDir {
                path: self.archive_dir.clone(),
                source,
            }
        })?;

        let stamp = generated_at
            .with_timezone(&ist())
            .format(ARCHIVE_STAMP_FORMAT)
            .to_string();
        let target = self.archive_path(&stamp);

        fs::copy(&self.report_path, &target).map_err(|source| PersistenceError::Archive {
            from: self.report_path.clone(),
            to: target.clone(),
            source,
        })?;
        info!("Archived previous report to {}", target.display());

        Ok(target)
    }

    /// First free `<stem>_<stamp>[_n].<ext>` path in the archive directory.
    fn archive_path(&self, stamp: &str) -> PathBuf {
        let stem = self
            .report_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "REPORT".to_string());
        let ext = self
            .report_path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "md".to_string());

        let mut candidate = self.archive_dir.join(format!("{}_{}.{}", stem, stamp, ext));
        let mut n = 1;
        while candidate.exists() {
            candidate = self
                .archive_dir
                .join(format!("{}_{}_{}.{}", stem, stamp, n, ext));
            n += 1;
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceSeries;
    use crate::report::ReportAssembler;
    use chrono::{NaiveDate, Utc};
    use tempfile::tempdir;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(h, m, s)
                .unwrap(),
        )
    }

    fn report(stamp: &str, closes: Vec<f64>) -> Report {
        ReportAssembler::new("Archive Test").build(&["A"], stamp, |_| PriceSeries::new(closes.clone()))
    }

    fn archive_entries(dir: &Path) -> Vec<PathBuf> {
        if !dir.exists() {
            return vec![];
        }
        let mut entries: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        entries.sort();
        entries
    }

    #[test]
    fn test_first_publish_has_nothing_to_archive() {
        let dir = tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("README.md"), dir.path().join("history"));

        let outcome = writer.publish(&report("first", vec![1.0, 2.0]), &at(4, 0, 0)).unwrap();

        assert_eq!(outcome.archived, None);
        assert!(!dir.path().join("history").exists());
        let written = fs::read_to_string(writer.report_path()).unwrap();
        assert!(written.contains("*Last updated on: first*"));
    }

    #[test]
    fn test_second_publish_archives_first() {
        let dir = tempdir().unwrap();
        let history = dir.path().join("history");
        let writer = ReportWriter::new(dir.path().join("README.md"), &history);

        let first = report("first", vec![1.0, 2.0]);
        let second = report("second", vec![3.0, 2.0]);
        writer.publish(&first, &at(4, 0, 0)).unwrap();
        let outcome = writer.publish(&second, &at(5, 30, 15)).unwrap();

        let entries = archive_entries(&history);
        assert_eq!(entries.len(), 1);
        // 05:30:15 UTC is 11:00:15 IST
        assert_eq!(entries[0], history.join("README_20240102_110015.md"));
        assert_eq!(outcome.archived, Some(entries[0].clone()));

        assert_eq!(fs::read_to_string(&entries[0]).unwrap(), first.render());
        assert_eq!(fs::read_to_string(writer.report_path()).unwrap(), second.render());
    }

    #[test]
    fn test_same_second_does_not_overwrite_archive() {
        let dir = tempdir().unwrap();
        let history = dir.path().join("history");
        let writer = ReportWriter::new(dir.path().join("README.md"), &history);
        let moment = at(6, 0, 0);

        writer.publish(&report("one", vec![1.0]), &moment).unwrap();
        writer.publish(&report("two", vec![1.0]), &moment).unwrap();
        writer.publish(&report("three", vec![1.0]), &moment).unwrap();

        let entries = archive_entries(&history);
        assert_eq!(
            entries,
            vec![
                history.join("README_20240102_113000.md"),
                history.join("README_20240102_113000_1.md"),
            ]
        );
        assert!(fs::read_to_string(&entries[1]).unwrap().contains("two"));
    }

    #[test]
    fn test_unwritable_report_path_is_error() {
        let dir = tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("missing").join("README.md"), dir.path());
        let result = writer.publish(&report("x", vec![1.0]), &at(0, 0, 0));
        assert!(matches!(result, Err(PersistenceError::Write { .. })));
    }
}
