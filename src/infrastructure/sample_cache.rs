// Sample cache - Local data files converted to per-file CSV tables
use crate::domain::errors::DecodeError;
use crate::domain::samples::{Channel, GOOD_QUALITY};
use crate::infrastructure::cdf::{CdfFile, decode_series};
use crate::infrastructure::config::VariableLayout;
use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// One quality-passing sample as written to the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRow {
    pub filename: String,
    pub time_unix: f64,
    /// Empty unless a distance variable is configured.
    pub maven_sun_distance: Option<f64>,
    pub flag: i64,
    pub data_a: f64,
    pub data_c: f64,
    /// Earliest timestamp of the whole file, before quality filtering.
    pub time_unix_min: f64,
}

#[derive(Debug, Default)]
pub struct ConvertReport {
    pub converted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub rows: usize,
}

/// Files in `dir` whose name ends with `suffix`, sorted by name.
pub fn list_files(dir: &Path, suffix: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn read_rows(path: &Path, layout: &VariableLayout) -> Result<Vec<SampleRow>, DecodeError> {
    let cdf = CdfFile::open(path)?;
    let series = decode_series(&cdf, layout)?;
    let Some(time_unix_min) = series.first_timestamp() else {
        return Ok(Vec::new());
    };
    let distance = match &layout.sun_distance {
        Some(name) => {
            let values = cdf.read_f64(name)?.values;
            if values.len() != series.len() {
                return Err(DecodeError::bad_variable(
                    name,
                    format!("{} values for {} samples", values.len(), series.len()),
                ));
            }
            Some(values)
        }
        None => None,
    };
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (time, flag) = (series.timestamps(), series.flags());
    let (a, c) = (series.channel(Channel::A), series.channel(Channel::C));
    let rows = (0..series.len())
        .filter(|&i| flag[i] == GOOD_QUALITY)
        .map(|i| SampleRow {
            filename: filename.clone(),
            time_unix: time[i],
            maven_sun_distance: distance.as_ref().map(|d| d[i]),
            flag: flag[i],
            data_a: a[i],
            data_c: c[i],
            time_unix_min,
        })
        .collect();
    Ok(rows)
}

fn write_rows<W: std::io::Write>(writer: &mut csv::Writer<W>, rows: &[SampleRow]) -> anyhow::Result<()> {
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `<stem>.csv` beside every matching file and, when asked, one
/// combined table. Files that fail to decode are logged and skipped.
pub fn convert_directory(
    dir: &Path,
    suffix: &str,
    layout: &VariableLayout,
    combined: Option<&Path>,
) -> anyhow::Result<ConvertReport> {
    let files = list_files(dir, suffix)?;
    tracing::info!("Converting {} files from {}", files.len(), dir.display());

    let mut combined = match combined {
        Some(path) => Some(csv::Writer::from_writer(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => None,
    };
    let mut report = ConvertReport::default();

    for path in files {
        let rows = match read_rows(&path, layout) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                report.failed.push((path, e.to_string()));
                continue;
            }
        };

        let out = path.with_extension("csv");
        let mut writer = csv::Writer::from_writer(
            File::create(&out).with_context(|| format!("failed to create {}", out.display()))?,
        );
        write_rows(&mut writer, &rows)?;
        if let Some(writer) = combined.as_mut() {
            write_rows(writer, &rows)?;
        }

        tracing::debug!("{}: {} quality samples", out.display(), rows.len());
        report.rows += rows.len();
        report.converted.push(out);
    }

    tracing::info!(
        "Converted {} files ({} rows), {} failed",
        report.converted.len(),
        report.rows,
        report.failed.len()
    );
    Ok(report)
}
