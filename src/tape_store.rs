//! File boundary of the pipeline: the pooled large-trade tape comes in as CSV,
//! the fitted parameters and the per-second intensity go out as artifacts.
//!
//! Artifacts are staged in a sibling `.tmp` file and renamed into place only
//! once fully written, so a failed run leaves any previous output untouched.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat};

use crate::error::{HawkesError, HawkesResult};
use crate::hawkes::IntensitySeries;
use crate::model::{EventSeries, FitReport};

/// Events read from a tape file plus the rows that could not be used.
#[derive(Debug, Clone)]
pub struct EventLoad {
    pub series: EventSeries,
    pub rows: usize,
    pub dropped: usize,
}

/// Read the epoch-millisecond `column` from a headered CSV file.
///
/// Other columns are ignored. Rows with a missing or unparseable timestamp are
/// dropped and counted; the remaining timestamps are sorted. Quoted fields may
/// not contain commas: such rows are dropped as well.
pub fn load_events(path: &Path, column: &str) -> HawkesResult<EventLoad> {
    let file = File::open(path)?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => {
            return Err(HawkesError::Artifact(format!(
                "{} is empty, expected a CSV header",
                path.display()
            )))
        }
    };
    let idx = split_fields(&header)
        .position(|name| name == column)
        .ok_or_else(|| {
            HawkesError::Artifact(format!(
                "{} has no '{}' column (header: {})",
                path.display(),
                column,
                header.trim()
            ))
        })?;

    let mut ts_ms = Vec::new();
    let mut rows = 0usize;
    let mut dropped = 0usize;
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        rows += 1;
        let parsed = field_at(&line, idx).and_then(parse_epoch_millis);
        match parsed {
            Some(ms) => ts_ms.push(ms),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::warn!(
            path = %path.display(),
            column,
            dropped,
            rows,
            "Dropped rows with missing or unparseable timestamps"
        );
    }
    if ts_ms.is_empty() {
        return Err(HawkesError::InvalidInput(format!(
            "{} contains no usable '{}' values ({} rows, {} dropped)",
            path.display(),
            column,
            rows,
            dropped
        )));
    }

    ts_ms.sort_unstable();
    let series = EventSeries::from_epoch_millis(&ts_ms)?;
    tracing::info!(
        path = %path.display(),
        events = series.len(),
        dropped,
        horizon_s = series.horizon(),
        "Loaded event tape"
    );
    Ok(EventLoad {
        series,
        rows,
        dropped,
    })
}

/// Write a single `ts_ms` column CSV.
pub fn write_events(path: &Path, ts_ms: &[i64]) -> HawkesResult<()> {
    write_atomically(path, |w| {
        writeln!(w, "ts_ms")?;
        for ms in ts_ms {
            writeln!(w, "{}", ms)?;
        }
        Ok(())
    })
}

pub fn write_fit_report(path: &Path, report: &FitReport) -> HawkesResult<()> {
    write_atomically(path, |w| write!(w, "{}", report))
}

pub fn read_fit_report(path: &Path) -> HawkesResult<FitReport> {
    let text = fs::read_to_string(path)?;
    text.parse::<FitReport>()
        .map_err(|e| HawkesError::Artifact(format!("{}: {}", path.display(), e)))
}

/// Write `t_sec,dt_utc,lambda` rows in grid order.
pub fn write_intensity(path: &Path, series: &IntensitySeries) -> HawkesResult<()> {
    // Resolve every timestamp before touching the filesystem.
    let mut rows = Vec::with_capacity(series.len());
    for sample in &series.samples {
        let dt = DateTime::from_timestamp(sample.t_sec, 0).ok_or_else(|| {
            HawkesError::InvalidInput(format!("t_sec {} is outside the UTC range", sample.t_sec))
        })?;
        rows.push((
            sample.t_sec,
            dt.to_rfc3339_opts(SecondsFormat::Secs, true),
            sample.lambda,
        ));
    }

    write_atomically(path, |w| {
        writeln!(w, "t_sec,dt_utc,lambda")?;
        for (t_sec, dt_utc, lambda) in &rows {
            writeln!(w, "{},{},{}", t_sec, dt_utc, lambda)?;
        }
        Ok(())
    })
}

fn split_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(',').map(|f| f.trim().trim_matches('"'))
}

/// Field `idx` of a data row, or `None` when a quoted field was split on an
/// embedded comma and column positions can no longer be trusted.
fn field_at(line: &str, idx: usize) -> Option<&str> {
    let mut found = None;
    for (i, raw) in line.split(',').enumerate() {
        let field = raw.trim();
        let opens = field.starts_with('"');
        let closes = field.len() > 1 && field.ends_with('"');
        if opens != closes {
            return None;
        }
        if i == idx {
            found = Some(field.trim_matches('"'));
        }
    }
    found
}

fn parse_epoch_millis(field: &str) -> Option<i64> {
    if field.is_empty() {
        return None;
    }
    if let Ok(ms) = field.parse::<i64>() {
        return Some(ms);
    }
    // Upstream tools sometimes emit integral floats ("1730764800123.0").
    let value = field.parse::<f64>().ok()?;
    (value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15).then_some(value as i64)
}

fn staging_path(path: &Path) -> HawkesResult<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        HawkesError::InvalidInput(format!("{} is not a file path", path.display()))
    })?;
    let mut staged = name.to_os_string();
    staged.push(".tmp");
    Ok(path.with_file_name(staged))
}

fn write_atomically<F>(path: &Path, body: F) -> HawkesResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let staged = staging_path(path)?;

    let written = File::create(&staged).and_then(|file| {
        let mut writer = BufWriter::new(file);
        body(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&staged);
        return Err(e.into());
    }

    fs::rename(&staged, path)?;
    Ok(())
}
