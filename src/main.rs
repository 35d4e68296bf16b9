use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use gridiron_grades::config::Config;
use gridiron_grades::db::{GradeCache, NoCache, SqliteCache};
use gridiron_grades::grading::coaching::efficiency_leaders;
use gridiron_grades::grading::Stage;
use gridiron_grades::records::{fetch_seasons, JsonDirProvider};
use gridiron_grades::run_grading;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;
    let params = config.grading_params();
    info!("Grading seasons {:?} with {:?}", config.seasons, params);

    // Results cache
    let cache: Arc<dyn GradeCache> = match &config.cache_path {
        Some(path) => {
            let cache = SqliteCache::open(path).with_context(|| format!("opening cache {}", path))?;
            info!("Results cache opened: {}", path);
            Arc::new(cache)
        }
        None => Arc::new(NoCache),
    };

    // Fetch every season before grading starts
    let provider = JsonDirProvider::new(&config.data_dir);
    let records = fetch_seasons(&provider, &config.seasons).await?;

    let run = {
        let cache = cache.clone();
        tokio::task::spawn_blocking(move || run_grading(records, &params, cache.as_ref()))
            .await
            .context("grading task panicked")??
    };

    let failures = run.failures().count();
    if failures > 0 {
        warn!("{} entities could not be graded", failures);
        for f in run.failures().take(20) {
            warn!("  {} [{}] {}", f.stage, f.season, f.error);
        }
    }

    let mut fallbacks: BTreeMap<Stage, usize> = BTreeMap::new();
    for d in run.diagnostics() {
        *fallbacks.entry(d.stage()).or_default() += 1;
        debug!("  {} [{}] {}", d.stage(), d.entity(), d);
    }
    for (stage, n) in &fallbacks {
        info!("{}: {} entities fell back or were left out for missing input", stage, n);
    }

    let coaches = run.coaches();
    let leaders = efficiency_leaders(&coaches, &params);
    if leaders.is_empty() {
        info!("No coach reached {} decided games with a roster snapshot", params.min_coach_games);
    } else {
        info!("Coaching efficiency leaders:");
        for (rank, c) in leaders.iter().take(config.leaderboard_size).enumerate() {
            info!(
                "  {:>2}. {} ({} {}, {}): base {:.1} -> {:.1} ({:+.1}, {})",
                rank + 1,
                c.coach,
                c.team,
                c.season,
                c.record,
                c.base_grade,
                c.adjusted_grade,
                c.efficiency,
                c.letter_grade
            );
        }
    }

    let json = serde_json::to_string_pretty(&run)?;
    tokio::fs::write(&config.output, json)
        .await
        .with_context(|| format!("writing {}", config.output.display()))?;
    info!("Wrote {} season(s) to {}", run.seasons.len(), config.output.display());

    Ok(())
}
