pub mod adaptive;
pub mod error;
pub mod game;
pub mod generation;
pub mod metrics;
pub mod models;
pub mod sensing;
pub mod session;
pub mod settings;
pub mod utils;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::Rng;
use tokio::time::{sleep, Duration};

use game::{GameController, GameReport};
use models::PerformanceMetrics;
use settings::{SettingsStore, ENV_SETTINGS_PATH};

const DEMO_ROUNDS: u32 = 3;
const DEMO_ROUND_SECS: u64 = 6;
const DEFAULT_SETTINGS_FILE: &str = "focusplay.json";

/// Run one simulated game end to end and print the persistence payload.
pub async fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("focusplay starting up...");

    let settings_path = std::env::var(ENV_SETTINGS_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let store = SettingsStore::new(settings_path)?;
    let settings = store.get();

    let controller = GameController::connect(&settings).await;
    log::info!("signal mode: {:?}", controller.signal());

    let report = play_demo_game(&controller).await;
    controller.shutdown().await;

    let report = report.context("demo game produced no report")?;
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize game report")?;
    println!("{json}");
    Ok(())
}

async fn play_demo_game(controller: &GameController) -> Option<GameReport> {
    let game_id = controller.start_game().await;
    log::info!("demo game {} started", game_id);

    let mut game_perf = PerformanceMetrics::new();
    for _ in 0..DEMO_ROUNDS {
        let round = controller.start_round().await?;
        let mut round_perf = PerformanceMetrics::new();

        for _ in 0..DEMO_ROUND_SECS {
            sleep(Duration::from_secs(1)).await;
            let (correct, reaction_ms, tag) = simulated_click(&controller.current_settings().await);
            round_perf.record_attempt(correct, reaction_ms, tag);
            game_perf.record_attempt(correct, reaction_ms, tag);

            let play = controller.play();
            let mut play = play.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            play.correct_clicks = round_perf.correct_attempts;
            play.wrong_clicks = round_perf.total_attempts - round_perf.correct_attempts;
        }

        let feedback = controller.feedback();
        log::info!("round {} feedback: {}", round, feedback.message);

        if let Some(report) = controller.end_round(&round_perf).await {
            log::info!(
                "round {}: attention {:.0}, verdict {:?}, next task \"{}\" ({:?})",
                report.round,
                report.attention.attention_score,
                report.decision.verdict,
                report.next_plan.task.instruction,
                report.plan_source
            );
        }
    }

    controller.end_game(&game_perf).await
}

/// A plausible click: harder settings mean more misses and slower reactions.
fn simulated_click(settings: &models::DifficultySettings) -> (bool, f64, Option<&'static str>) {
    let mut rng = rand::thread_rng();
    let miss_chance = 0.08 + f64::from(settings.level) * 0.04;
    let correct = !rng.gen_bool(miss_chance.min(0.9));
    let reaction_ms = rng.gen_range(700.0..1400.0) + f64::from(settings.item_count) * 60.0;

    let tag = if correct {
        None
    } else if reaction_ms < 1000.0 {
        Some("quick-click")
    } else {
        Some(["color-command", "text-command"][rng.gen_range(0..2)])
    };
    (correct, reaction_ms, tag)
}
