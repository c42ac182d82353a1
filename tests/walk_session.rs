use std::sync::Arc;
use std::time::Duration;

use stepwalk::analysis::{MovementType, PrimaryDirection};
use stepwalk::config::AppConfig;
use stepwalk::llm::providers::replay::ReplayProvider;
use stepwalk::llm::types::CallConfig;
use stepwalk::predictor::{PredictionSource, StepPredictor};
use stepwalk::session::WalkSession;
use stepwalk::trajectory::TrajectoryStore;
use tempfile::tempdir;

fn call() -> CallConfig {
    CallConfig {
        model: "replay".into(),
        stream: true,
        temperature: 0.7,
        max_tokens: 1000,
    }
}

#[tokio::test]
async fn model_steps_persist_and_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trajectories").join("trajectory.json");

    let provider = Arc::new(ReplayProvider::from_text(
        "The walk so far drifts east, so I keep going.\n{\"x\": 42.5, \"y\": 0}",
    ));
    let predictor = StepPredictor::new(provider.clone(), call()).with_seed(1);
    let mut session = WalkSession::open(&path, predictor).unwrap();

    let first = session.step().await.unwrap();
    assert_eq!(first.source, PredictionSource::Initial);
    assert!(provider.requests().is_empty());

    let second = session.step().await.unwrap();
    assert_eq!(second.source, PredictionSource::Model);
    assert_eq!((second.coordinate.x, second.coordinate.y), (42.5, 0.0));
    assert_eq!(
        second.coordinate.thought_process.as_deref(),
        Some("The walk so far drifts east, so I keep going.")
    );
    assert_eq!(provider.requests().len(), 1);

    let mut reloaded = TrajectoryStore::new();
    reloaded.load(&path).unwrap();
    assert_eq!(reloaded.trajectory(), session.trajectory());

    let reopened = WalkSession::open(&path, StepPredictor::offline()).unwrap();
    assert_eq!(reopened.trajectory().len(), 2);
    let range = reopened.range();
    for p in reopened.trajectory() {
        assert!(range.contains(p.x, p.y));
    }
}

#[tokio::test]
async fn unusable_model_output_still_advances_the_walk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("walk.json");

    let provider = Arc::new(ReplayProvider::from_text("no coordinates today"));
    let predictor = StepPredictor::new(provider, call())
        .with_seed(8)
        .with_timeout(Duration::from_secs(5));
    let mut session = WalkSession::open(&path, predictor).unwrap();
    session.add_point(0.0, 0.0, None).unwrap();
    session.add_point(1.0, 0.0, None).unwrap();

    let outcome = session.step().await.unwrap();
    assert_eq!(outcome.source, PredictionSource::Fallback);
    assert_eq!(
        outcome.coordinate.thought_process.as_deref(),
        Some("simple rule-based fallback prediction")
    );
    assert_eq!(session.trajectory().len(), 3);
}

#[tokio::test]
async fn eastward_walk_analysis() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("walk.json");
    let mut session = WalkSession::open(path, StepPredictor::offline()).unwrap();
    for i in 0..6 {
        session.add_point(i as f64 * 3.0, 1.0, None).unwrap();
    }

    let report = session.analyze();
    assert_eq!(report.basic.total_points, 6);
    assert_eq!(report.basic.total_distance, 15.0);
    assert_eq!(report.basic.average_step_size, 3.0);
    assert_eq!(report.basic.direction_changes, 0);
    assert_eq!(report.patterns.primary_direction, PrimaryDirection::East);
    assert_eq!(report.patterns.movement_type, MovementType::Uniform);
    assert_eq!(report.tendency.confidence, 0.8);

    session.reset().unwrap();
    assert_eq!(session.analyze().basic.total_points, 0);
}

#[tokio::test]
async fn bootstrap_without_provider_runs_offline() {
    let dir = tempdir().unwrap();
    let mut config = AppConfig::default();
    config.storage.trajectory_file = dir.path().join("walk.json");
    config.predictor.seed = Some(99);

    let mut session = stepwalk::bootstrap_from(&config).unwrap();
    session.step().await.unwrap();
    let outcome = session.step().await.unwrap();
    assert_eq!(outcome.source, PredictionSource::Fallback);
    assert!(config.storage.trajectory_file.exists());
}
