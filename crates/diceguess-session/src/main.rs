use tracing_subscriber::EnvFilter;

use diceguess_session::config::SessionConfig;
use diceguess_session::run_simulation;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args()
        .skip(1)
        .find_map(|a| a.strip_prefix("--config=").map(String::from))
    {
        Some(path) => SessionConfig::load_from(&path),
        None => SessionConfig::load(),
    };
    if let Err(e) = config.validate() {
        tracing::error!("invalid configuration: {e}");
        std::process::exit(1);
    }

    tracing::info!(
        bots = config.sim.bot_count,
        dice = config.room.dice_count,
        rounds = config.room.round_count,
        "diceguess simulation starting"
    );

    let report = match run_simulation(&config).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("simulation failed: {e}");
            std::process::exit(1);
        },
    };

    for s in report.standings() {
        tracing::info!(
            rank = s.rank,
            player = %s.display_name,
            score = s.cumulative_score,
            correct_time = s.cumulative_correct_time_seconds,
            "final standing"
        );
    }
    if !report.is_consistent() {
        tracing::error!(room = %report.room_code, "peers disagree on final standings");
        std::process::exit(2);
    }
}
