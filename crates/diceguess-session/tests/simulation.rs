//! End-to-end games: bots on separate tokio tasks talking through the
//! in-process relay.

use std::time::Duration;

use diceguess_core::settings::RoundSettings;
use diceguess_session::config::SessionConfig;
use diceguess_session::{SessionError, run_simulation};

fn fast_config(bots: usize, rounds: u32, accuracy: f64) -> SessionConfig {
    let mut cfg = SessionConfig::default();
    cfg.round = RoundSettings {
        countdown_from: 1,
        countdown_interval_secs: 0.02,
        results_hold_secs: 0.02,
        ..RoundSettings::default()
    };
    cfg.room.dice_count = 3;
    cfg.room.round_count = rounds;
    cfg.sim.bot_count = bots;
    cfg.sim.bot_accuracy = accuracy;
    cfg.sim.think_min_secs = 0.01;
    cfg.sim.think_max_secs = 0.05;
    cfg.sim.tick_rate_hz = 100;
    cfg.sim.seed = Some(11);
    cfg.sim.timeout_secs = 20;
    cfg
}

#[tokio::test]
async fn accurate_bots_award_one_point_per_round() {
    let cfg = fast_config(3, 3, 1.0);
    let report = tokio::time::timeout(Duration::from_secs(30), run_simulation(&cfg))
        .await
        .expect("simulation should finish")
        .expect("simulation should succeed");

    assert_eq!(report.final_standings.len(), 3);
    assert!(report.is_consistent(), "peers disagree: {report:?}");

    let standings = report.standings();
    assert_eq!(standings.len(), 3);
    let total: u32 = standings.iter().map(|s| s.cumulative_score).sum();
    assert_eq!(total, 3);
    assert_eq!(standings[0].rank, 1);
    assert!(standings[0].cumulative_score >= 1);
}

#[tokio::test]
async fn wrong_answers_never_score() {
    let cfg = fast_config(2, 2, 0.0);
    let report = tokio::time::timeout(Duration::from_secs(30), run_simulation(&cfg))
        .await
        .expect("simulation should finish")
        .expect("simulation should succeed");

    assert!(report.is_consistent());
    for s in report.standings() {
        assert_eq!(s.cumulative_score, 0);
        assert_eq!(s.cumulative_correct_time_seconds, 0.0);
    }
}

#[tokio::test]
async fn full_room_of_four_finishes() {
    let cfg = fast_config(4, 2, 0.5);
    let report = tokio::time::timeout(Duration::from_secs(30), run_simulation(&cfg))
        .await
        .expect("simulation should finish")
        .expect("simulation should succeed");

    assert_eq!(report.final_standings.len(), 4);
    assert!(report.is_consistent());
    let total: u32 = report
        .standings()
        .iter()
        .map(|s| s.cumulative_score)
        .sum();
    assert!(total <= 2);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let cfg = fast_config(5, 2, 1.0);
    let result = run_simulation(&cfg).await;
    assert!(matches!(result, Err(SessionError::Config(_))));
}
