//! CSV persistence of drained samples.
//!
//! The layout is a header row naming each column for the session's
//! [`AcquisitionMode`], then one comma-delimited row per captured sample. Cells of
//! channels that were skipped after a read failure are left empty.
//!
//! [`CsvStorage::persist`] tries the requested path first and, if that fails,
//! retries once at a fixed fallback filename. Only when both writes fail is a
//! [`PersistError`] returned. A file whose write fails part-way is removed, so a
//! truncated CSV is never left next to the complete one.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::PersistError;
use crate::measurement::{AcquisitionMode, Sample};

/// Filename used when the requested output cannot be written.
pub const DEFAULT_FALLBACK_FILENAME: &str = "Thrust_values.csv";

/// Write `samples` as CSV to any writer.
pub fn write_csv<W: Write>(
    writer: W,
    mode: AcquisitionMode,
    samples: &[Sample],
) -> io::Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv.write_record(mode.columns())?;
    for sample in samples {
        csv.write_record(row(mode, sample))?;
    }
    csv.flush()?;
    Ok(())
}

fn row(mode: AcquisitionMode, sample: &Sample) -> Vec<String> {
    let cell = |value: f64, skipped: bool| {
        if skipped {
            String::new()
        } else {
            value.to_string()
        }
    };

    let mut fields = vec![
        sample.timestamp_ms.to_string(),
        cell(sample.force_newtons, sample.force_skipped()),
    ];
    if mode.includes_power() {
        fields.push(cell(sample.voltage_volts, sample.voltage_skipped()));
        fields.push(cell(sample.current_amps, sample.current_skipped()));
        fields.push(cell(sample.power_watts, sample.power_skipped()));
    }
    fields
}

/// Create (or truncate) `path` and write `samples` into it.
///
/// On a failed write the partially written file is deleted before the error is
/// returned.
pub fn write_csv_file(path: &Path, mode: AcquisitionMode, samples: &[Sample]) -> io::Result<()> {
    write_csv_file_with(path, mode, samples, io::BufWriter::new)
}

fn write_csv_file_with<W, F>(
    path: &Path,
    mode: AcquisitionMode,
    samples: &[Sample],
    wrap: F,
) -> io::Result<()>
where
    W: Write,
    F: FnOnce(File) -> W,
{
    let file = File::create(path)?;
    if let Err(e) = write_csv(wrap(file), mode, samples) {
        if let Err(remove_err) = std::fs::remove_file(path) {
            tracing::warn!(
                path = %path.display(),
                error = %remove_err,
                "could not remove partial csv"
            );
        }
        return Err(e);
    }
    Ok(())
}

/// CSV writer with a single fallback retry.
#[derive(Debug, Clone)]
pub struct CsvStorage {
    mode: AcquisitionMode,
    fallback_path: PathBuf,
}

impl CsvStorage {
    /// Storage for `mode` sessions with the given fallback file.
    pub fn new(mode: AcquisitionMode, fallback_path: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            fallback_path: fallback_path.into(),
        }
    }

    /// Where `persist` retries after the primary write fails.
    pub fn fallback_path(&self) -> &Path {
        &self.fallback_path
    }

    /// Persist to `primary`, falling back once to the fixed fallback path.
    ///
    /// Returns the path that was actually written.
    pub fn persist(&self, primary: &Path, samples: &[Sample]) -> Result<PathBuf, PersistError> {
        let primary_err = match write_csv_file(primary, self.mode, samples) {
            Ok(()) => {
                tracing::info!(path = %primary.display(), rows = samples.len(), "samples saved");
                return Ok(primary.to_path_buf());
            }
            Err(e) => e,
        };

        tracing::warn!(
            path = %primary.display(),
            fallback = %self.fallback_path.display(),
            error = %primary_err,
            "primary write failed, retrying at fallback"
        );

        match write_csv_file(&self.fallback_path, self.mode, samples) {
            Ok(()) => {
                tracing::info!(
                    path = %self.fallback_path.display(),
                    rows = samples.len(),
                    "samples saved to fallback"
                );
                Ok(self.fallback_path.clone())
            }
            Err(fallback_err) => {
                tracing::error!(error = %fallback_err, "fallback write failed");
                Err(PersistError {
                    primary_path: primary.to_path_buf(),
                    primary: primary_err,
                    fallback_path: self.fallback_path.clone(),
                    fallback: fallback_err,
                })
            }
        }
    }
}

/// Append `.csv` when `name` has no extension, as the operator usually types a bare name.
pub fn with_csv_extension(name: &str) -> PathBuf {
    let path = PathBuf::from(name);
    if path.extension().is_some() {
        path
    } else {
        path.with_extension("csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::SampleFlags;
    use tempfile::tempdir;

    fn render(mode: AcquisitionMode, samples: &[Sample]) -> String {
        let mut out = Vec::new();
        write_csv(&mut out, mode, samples).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn load_cell_layout() {
        let text = render(
            AcquisitionMode::LoadCell,
            &[Sample::force(50, 1.5), Sample::force(100, -2.25)],
        );
        assert_eq!(text, "Timestamp (ms),Force (N)\n50,1.5\n100,-2.25\n");
    }

    #[test]
    fn power_layout() {
        let text = render(
            AcquisitionMode::LoadCellAndPower,
            &[Sample::force(50, 1.0).with_power(16.0, 2.5)],
        );
        assert_eq!(
            text,
            "Timestamp (ms),Force (N),Voltage (V),Current (A),Power (W)\n50,1,16,2.5,40\n"
        );
    }

    #[test]
    fn skipped_channels_are_empty_cells() {
        let mut sample = Sample::force(50, 3.0);
        sample.flags = SampleFlags::POWER_SKIPPED
            | SampleFlags::VOLTAGE_SKIPPED
            | SampleFlags::CURRENT_SKIPPED;
        let text = render(AcquisitionMode::LoadCellAndPower, &[sample]);
        assert!(text.ends_with("50,3,,,\n"), "got {text:?}");
    }

    #[test]
    fn power_cells_are_blanked_per_channel() {
        let voltage_lost = Sample::force(50, 3.0).with_partial_power(None, Some(2.5));
        let current_lost = Sample::force(100, 3.0).with_partial_power(Some(16.0), None);
        let text = render(AcquisitionMode::LoadCellAndPower, &[voltage_lost, current_lost]);
        assert!(text.ends_with("50,3,,2.5,\n100,3,16,,\n"), "got {text:?}");
    }

    /// Accepts `budget` bytes, then fails every write.
    struct FailAfter {
        inner: File,
        budget: usize,
    }

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            let n = buf.len().min(self.budget);
            self.budget -= n;
            self.inner.write(&buf[..n])
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    #[test]
    fn failed_write_removes_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.csv");
        let samples: Vec<Sample> = (1..=50).map(|i| Sample::force(i * 50, 1.0)).collect();

        let err = write_csv_file_with(&path, AcquisitionMode::LoadCell, &samples, |file| {
            FailAfter {
                inner: file,
                budget: 40,
            }
        })
        .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert!(!path.exists());
    }

    #[test]
    fn empty_session_still_writes_header() {
        let text = render(AcquisitionMode::LoadCell, &[]);
        assert_eq!(text, "Timestamp (ms),Force (N)\n");
    }

    #[test]
    fn persist_writes_primary() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("run.csv");
        let storage = CsvStorage::new(AcquisitionMode::LoadCell, dir.path().join("fallback.csv"));

        let written = storage.persist(&primary, &[Sample::force(50, 1.0)]).unwrap();
        assert_eq!(written, primary);
        assert!(!storage.fallback_path().exists());
    }

    #[test]
    fn persist_falls_back_when_primary_unwritable() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("missing_dir").join("run.csv");
        let fallback = dir.path().join("fallback.csv");
        let storage = CsvStorage::new(AcquisitionMode::LoadCell, &fallback);

        let samples = [Sample::force(50, 1.0), Sample::force(100, 2.0)];
        let written = storage.persist(&primary, &samples).unwrap();
        assert_eq!(written, fallback);

        let text = std::fs::read_to_string(&fallback).unwrap();
        assert_eq!(text, render(AcquisitionMode::LoadCell, &samples));
    }

    #[test]
    fn persist_reports_both_failures() {
        let dir = tempdir().unwrap();
        let storage = CsvStorage::new(
            AcquisitionMode::LoadCell,
            dir.path().join("nope").join("fallback.csv"),
        );
        let err = storage
            .persist(&dir.path().join("also_nope").join("run.csv"), &[])
            .unwrap_err();
        assert_eq!(err.primary.kind(), io::ErrorKind::NotFound);
        assert_eq!(err.fallback.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn csv_extension_added_only_when_missing() {
        assert_eq!(with_csv_extension("thrust_data"), PathBuf::from("thrust_data.csv"));
        assert_eq!(with_csv_extension("run.txt"), PathBuf::from("run.txt"));
    }
}
