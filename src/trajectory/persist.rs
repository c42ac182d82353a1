//! JSON array on disk, one object per point in walk order.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{WalkError, WalkResult};
use crate::trajectory::{parse_timestamp, Coordinate};

/// On-disk shape. `thought_process` may be absent or null.
#[derive(Debug, Deserialize)]
struct CoordinateRecord {
    x: f64,
    y: f64,
    timestamp: String,
    #[serde(default)]
    thought_process: Option<String>,
}

/// Writes the whole walk through a temp file + rename so readers never see a torn file.
///
/// Non-finite coordinates have no JSON form, so they are refused before anything is written.
pub fn write_trajectory(path: &Path, points: &[Coordinate]) -> WalkResult<()> {
    if let Some((index, p)) = points
        .iter()
        .enumerate()
        .find(|(_, p)| !(p.x.is_finite() && p.y.is_finite()))
    {
        return Err(WalkError::NonFinitePoint {
            index,
            x: p.x,
            y: p.y,
        });
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(points)?;
    let tmp = tmp_path(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    tracing::debug!(path = %path.display(), points = points.len(), "trajectory saved");
    Ok(())
}

/// `Ok(None)` when the file does not exist.
pub fn read_trajectory(path: &Path) -> WalkResult<Option<Vec<Coordinate>>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no trajectory file, starting empty");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let corrupt = |reason: String| WalkError::Deserialization {
        path: path.to_path_buf(),
        reason,
    };

    let content = String::from_utf8(bytes).map_err(|e| corrupt(e.to_string()))?;
    let records: Vec<CoordinateRecord> =
        serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;

    let mut points = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        if parse_timestamp(&record.timestamp).is_none() {
            return Err(corrupt(format!(
                "point {i}: timestamp '{}' is not ISO-8601",
                record.timestamp
            )));
        }
        points.push(Coordinate {
            x: record.x,
            y: record.y,
            timestamp: record.timestamp,
            thought_process: record.thought_process,
        });
    }

    tracing::info!(path = %path.display(), points = points.len(), "trajectory loaded");
    Ok(Some(points))
}

/// Deletes the persisted walk. A missing file is not an error.
pub fn remove_trajectory(path: &Path) -> WalkResult<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "trajectory file removed");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
