use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::analysis::{AnalysisReport, TrajectoryAnalyzer};
use crate::errors::{WalkError, WalkResult};
use crate::predictor::{PredictionSource, StepPredictor};
use crate::trajectory::{persist, Coordinate, Range, TrajectoryStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub coordinate: Coordinate,
    pub source: PredictionSource,
}

/// One walk bound to its persisted file.
///
/// Every mutation goes through `&mut self`, so a step's append and save
/// always land after its prediction has fully resolved.
pub struct WalkSession {
    pub session_id: String,
    store: TrajectoryStore,
    predictor: StepPredictor,
    path: PathBuf,
}

impl WalkSession {
    /// Restores the walk at `path`, or starts empty if there is none yet.
    pub fn open(path: impl Into<PathBuf>, predictor: StepPredictor) -> WalkResult<Self> {
        let path = path.into();
        let mut store = TrajectoryStore::new();
        store.load(&path)?;

        let session_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            session = %session_id,
            path = %path.display(),
            points = store.len(),
            offline = predictor.is_offline(),
            "walk session opened"
        );
        Ok(Self {
            session_id,
            store,
            predictor,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> &TrajectoryStore {
        &self.store
    }

    pub fn trajectory(&self) -> &[Coordinate] {
        self.store.trajectory()
    }

    pub fn range(&self) -> Range {
        self.store.range()
    }

    /// Predicts, appends and persists the next point.
    pub async fn step(&mut self) -> WalkResult<StepOutcome> {
        let prediction = self.predictor.predict_next_point(self.store.trajectory()).await;
        let rationale = (!prediction.rationale.is_empty()).then_some(prediction.rationale);
        let coordinate = self
            .store
            .add_point(prediction.x, prediction.y, rationale)
            .clone();
        self.store.save(&self.path)?;

        tracing::info!(
            session = %self.session_id,
            x = coordinate.x,
            y = coordinate.y,
            source = ?prediction.source,
            points = self.store.len(),
            "step recorded"
        );
        Ok(StepOutcome {
            coordinate,
            source: prediction.source,
        })
    }

    /// Appends a point chosen by the caller and persists it.
    ///
    /// Non-finite coordinates are refused and leave the walk untouched.
    pub fn add_point(
        &mut self,
        x: f64,
        y: f64,
        thought_process: Option<String>,
    ) -> WalkResult<Coordinate> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(WalkError::NonFinitePoint {
                index: self.store.len(),
                x,
                y,
            });
        }
        let coordinate = self.store.add_point(x, y, thought_process).clone();
        self.store.save(&self.path)?;
        Ok(coordinate)
    }

    /// Clears the walk and deletes its file.
    pub fn reset(&mut self) -> WalkResult<()> {
        persist::remove_trajectory(&self.path)?;
        self.store.clear();
        tracing::info!(session = %self.session_id, "walk reset");
        Ok(())
    }

    pub fn analyzer(&self) -> TrajectoryAnalyzer<'_> {
        TrajectoryAnalyzer::new(self.store.trajectory())
    }

    pub fn analyze(&self) -> AnalysisReport {
        self.analyzer().report()
    }
}
