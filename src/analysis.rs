//! Read-only statistics over a walk snapshot.
//!
//! All thresholds below are fixed calibration policy carried over for
//! compatibility with existing walks. None of them is derived from the data.

use std::f64::consts::PI;
use std::fmt;

use serde::Serialize;

use crate::trajectory::Coordinate;

/// A turn sharper than this between consecutive steps counts as a direction change.
pub const SHARP_TURN: f64 = PI / 4.0;
/// Step-length std-dev below which movement is uniform.
pub const UNIFORM_STEP_STD: f64 = 0.5;
/// Step-length std-dev below which movement is moderately varied.
pub const MODERATE_STEP_STD: f64 = 1.0;
/// Bearing std-dev (radians) below which the current heading is expected to hold.
pub const STEADY_BEARING_STD: f64 = 0.3;
/// Bearing std-dev (radians) below which a heading change is merely possible.
pub const WAVERING_BEARING_STD: f64 = 0.6;

const MIN_POINTS_FOR_PATTERNS: usize = 3;
/// Window used by the tendency forecast, and the minimum walk length for it.
const TENDENCY_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicStats {
    pub total_points: usize,
    pub total_distance: f64,
    pub average_step_size: f64,
    pub direction_changes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrimaryDirection {
    #[serde(rename = "E")]
    East,
    #[serde(rename = "NE")]
    NorthEast,
    #[serde(rename = "N")]
    North,
    #[serde(rename = "NW")]
    NorthWest,
    #[serde(rename = "W")]
    West,
    #[serde(rename = "SW")]
    SouthWest,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "SE")]
    SouthEast,
    #[serde(rename = "insufficient_data")]
    InsufficientData,
}

impl PrimaryDirection {
    const COMPASS: [PrimaryDirection; 8] = [
        PrimaryDirection::East,
        PrimaryDirection::NorthEast,
        PrimaryDirection::North,
        PrimaryDirection::NorthWest,
        PrimaryDirection::West,
        PrimaryDirection::SouthWest,
        PrimaryDirection::South,
        PrimaryDirection::SouthEast,
    ];

    /// Buckets a bearing in degrees into 45° sectors centered on the compass points.
    pub fn from_degrees(angle_deg: f64) -> Self {
        let index = ((angle_deg + 22.5).rem_euclid(360.0) / 45.0).floor() as usize;
        Self::COMPASS[index.min(7)]
    }

    pub fn label(&self) -> &'static str {
        match self {
            PrimaryDirection::East => "E",
            PrimaryDirection::NorthEast => "NE",
            PrimaryDirection::North => "N",
            PrimaryDirection::NorthWest => "NW",
            PrimaryDirection::West => "W",
            PrimaryDirection::SouthWest => "SW",
            PrimaryDirection::South => "S",
            PrimaryDirection::SouthEast => "SE",
            PrimaryDirection::InsufficientData => "insufficient_data",
        }
    }
}

impl fmt::Display for PrimaryDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MovementType {
    #[serde(rename = "uniform movement")]
    Uniform,
    #[serde(rename = "moderate variation")]
    Moderate,
    #[serde(rename = "drastic variation")]
    Drastic,
    #[serde(rename = "insufficient_data")]
    InsufficientData,
}

impl MovementType {
    fn from_step_std(std: f64) -> Self {
        if std < UNIFORM_STEP_STD {
            MovementType::Uniform
        } else if std < MODERATE_STEP_STD {
            MovementType::Moderate
        } else {
            MovementType::Drastic
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MovementType::Uniform => "uniform movement",
            MovementType::Moderate => "moderate variation",
            MovementType::Drastic => "drastic variation",
            MovementType::InsufficientData => "insufficient_data",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementPatterns {
    pub primary_direction: PrimaryDirection,
    pub movement_type: MovementType,
    pub area_coverage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tendency {
    #[serde(rename = "maintain current direction")]
    MaintainDirection,
    #[serde(rename = "may change direction")]
    MayChangeDirection,
    #[serde(rename = "direction uncertain")]
    DirectionUncertain,
    #[serde(rename = "insufficient_data")]
    InsufficientData,
}

impl Tendency {
    pub fn label(&self) -> &'static str {
        match self {
            Tendency::MaintainDirection => "maintain current direction",
            Tendency::MayChangeDirection => "may change direction",
            Tendency::DirectionUncertain => "direction uncertain",
            Tendency::InsufficientData => "insufficient_data",
        }
    }
}

impl fmt::Display for Tendency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TendencyForecast {
    pub tendency: Tendency,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub basic: BasicStats,
    pub patterns: MovementPatterns,
    pub tendency: TendencyForecast,
}

pub struct TrajectoryAnalyzer<'a> {
    points: &'a [Coordinate],
}

impl<'a> TrajectoryAnalyzer<'a> {
    pub fn new(points: &'a [Coordinate]) -> Self {
        Self { points }
    }

    pub fn report(&self) -> AnalysisReport {
        AnalysisReport {
            basic: self.basic_stats(),
            patterns: self.movement_patterns(),
            tendency: self.predict_tendency(),
        }
    }

    pub fn basic_stats(&self) -> BasicStats {
        let steps = step_vectors(self.points);
        let lengths: Vec<f64> = steps.iter().map(|&(dx, dy)| dx.hypot(dy)).collect();
        let total: f64 = lengths.iter().sum();
        let average = if lengths.is_empty() {
            0.0
        } else {
            total / lengths.len() as f64
        };

        let direction_changes = steps
            .windows(2)
            .filter(|w| turn_angle(bearing(w[0]), bearing(w[1])) > SHARP_TURN)
            .count();

        BasicStats {
            total_points: self.points.len(),
            total_distance: round2(total),
            average_step_size: round2(average),
            direction_changes,
        }
    }

    pub fn movement_patterns(&self) -> MovementPatterns {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return insufficient_patterns();
        };
        if self.points.len() < MIN_POINTS_FOR_PATTERNS {
            return insufficient_patterns();
        }

        let net = (last.x - first.x, last.y - first.y);
        let primary_direction = PrimaryDirection::from_degrees(bearing(net).to_degrees());

        let lengths: Vec<f64> = step_vectors(self.points)
            .iter()
            .map(|&(dx, dy)| dx.hypot(dy))
            .collect();
        let movement_type = MovementType::from_step_std(population_std(&lengths));

        let (mut x_min, mut x_max, mut y_min, mut y_max) = (first.x, first.x, first.y, first.y);
        for p in self.points {
            x_min = x_min.min(p.x);
            x_max = x_max.max(p.x);
            y_min = y_min.min(p.y);
            y_max = y_max.max(p.y);
        }

        MovementPatterns {
            primary_direction,
            movement_type,
            area_coverage: round2((x_max - x_min) * (y_max - y_min)),
        }
    }

    pub fn predict_tendency(&self) -> TendencyForecast {
        if self.points.len() < TENDENCY_WINDOW {
            return TendencyForecast {
                tendency: Tendency::InsufficientData,
                confidence: 0.0,
            };
        }

        let recent = &self.points[self.points.len() - TENDENCY_WINDOW..];
        let bearings: Vec<f64> = step_vectors(recent).into_iter().map(bearing).collect();
        let spread = population_std(&bearings);

        let (tendency, confidence) = if spread < STEADY_BEARING_STD {
            (Tendency::MaintainDirection, 0.8)
        } else if spread < WAVERING_BEARING_STD {
            (Tendency::MayChangeDirection, 0.5)
        } else {
            (Tendency::DirectionUncertain, 0.3)
        };
        TendencyForecast {
            tendency,
            confidence,
        }
    }
}

fn insufficient_patterns() -> MovementPatterns {
    MovementPatterns {
        primary_direction: PrimaryDirection::InsufficientData,
        movement_type: MovementType::InsufficientData,
        area_coverage: 0.0,
    }
}

fn step_vectors(points: &[Coordinate]) -> Vec<(f64, f64)> {
    points
        .windows(2)
        .map(|w| (w[1].x - w[0].x, w[1].y - w[0].y))
        .collect()
}

fn bearing((dx, dy): (f64, f64)) -> f64 {
    dy.atan2(dx)
}

/// Absolute difference of two bearings, folded into `[0, π]`.
fn turn_angle(a: f64, b: f64) -> f64 {
    let d = (b - a).abs();
    if d > PI {
        2.0 * PI - d
    } else {
        d
    }
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
