//! Append-only walk history and its plotting range.

pub mod persist;

use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::WalkResult;

/// Padding added around the bounding box on every side.
const RANGE_MARGIN: f64 = 10.0;
/// Minimum width and height of a computed range.
const RANGE_MIN_SPAN: f64 = 100.0;
const DEFAULT_RANGE: Range = Range {
    x: (-50.0, 50.0),
    y: (-50.0, 50.0),
};

/// One visited point of the walk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    /// ISO-8601, kept verbatim so persisted files round-trip exactly.
    pub timestamp: String,
    pub thought_process: Option<String>,
}

impl Coordinate {
    /// Timestamp normalized to UTC. Naive timestamps are taken as-is.
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.timestamp)
    }
}

/// Accepts RFC 3339 as well as the offset-less `YYYY-MM-DDTHH:MM:SS[.ffffff]` form.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// The instant a stored timestamp denotes. Offset-less values are local wall-clock time.
fn timestamp_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = parse_timestamp(raw)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Closed intervals `(min, max)` per axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Range {
    pub x: (f64, f64),
    pub y: (f64, f64),
}

impl Range {
    pub fn width(&self) -> f64 {
        self.x.1 - self.x.0
    }

    pub fn height(&self) -> f64 {
        self.y.1 - self.y.0
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x.0 && x <= self.x.1 && y >= self.y.0 && y <= self.y.1
    }
}

/// Pads `(min, max)` by the margin, then widens about its center to the minimum span.
fn fit_axis(min: f64, max: f64) -> (f64, f64) {
    let (lo, hi) = (min - RANGE_MARGIN, max + RANGE_MARGIN);
    if hi - lo < RANGE_MIN_SPAN {
        let center = (lo + hi) / 2.0;
        (center - RANGE_MIN_SPAN / 2.0, center + RANGE_MIN_SPAN / 2.0)
    } else {
        (lo, hi)
    }
}

#[derive(Debug, Default)]
pub struct TrajectoryStore {
    points: Vec<Coordinate>,
}

impl TrajectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<Coordinate>) -> Self {
        Self { points }
    }

    /// Appends a point stamped with the current time.
    pub fn add_point(&mut self, x: f64, y: f64, thought_process: Option<String>) -> &Coordinate {
        let timestamp = self.next_timestamp();
        self.points.push(Coordinate {
            x,
            y,
            timestamp,
            thought_process,
        });
        tracing::debug!(x, y, points = self.points.len(), "point appended");
        &self.points[self.points.len() - 1]
    }

    /// Wall-clock now, clamped so it never precedes the previous point.
    fn next_timestamp(&self) -> String {
        let now = Utc::now();
        let previous = self
            .points
            .last()
            .and_then(|p| timestamp_instant(&p.timestamp));
        let stamp = match previous {
            Some(prev) if now < prev => {
                tracing::warn!(previous = %prev, "clock behind last point; reusing its timestamp");
                prev
            }
            _ => now,
        };
        stamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn trajectory(&self) -> &[Coordinate] {
        &self.points
    }

    /// The last `n` points in order; fewer if the walk is shorter.
    pub fn last_n(&self, n: usize) -> &[Coordinate] {
        let start = self.points.len().saturating_sub(n);
        &self.points[start..]
    }

    pub fn last(&self) -> Option<&Coordinate> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn range(&self) -> Range {
        let Some(first) = self.points.first() else {
            return DEFAULT_RANGE;
        };
        let (mut x_min, mut x_max, mut y_min, mut y_max) = (first.x, first.x, first.y, first.y);
        for p in &self.points[1..] {
            x_min = x_min.min(p.x);
            x_max = x_max.max(p.x);
            y_min = y_min.min(p.y);
            y_max = y_max.max(p.y);
        }
        Range {
            x: fit_axis(x_min, x_max),
            y: fit_axis(y_min, y_max),
        }
    }

    pub fn save(&self, path: &Path) -> WalkResult<()> {
        persist::write_trajectory(path, &self.points)
    }

    /// Replaces the in-memory walk with the file's contents.
    ///
    /// A missing file leaves an empty walk. A corrupt one fails without
    /// touching the current points.
    pub fn load(&mut self, path: &Path) -> WalkResult<()> {
        let points = persist::read_trajectory(path)?.unwrap_or_default();
        self.points = points;
        Ok(())
    }
}
