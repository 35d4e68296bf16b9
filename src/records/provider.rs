use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use super::models::SeasonRecords;

/// Trait that every statistical record source must implement.
#[async_trait]
pub trait StatRecordProvider: Send + Sync {
    /// Fetch all four record streams for one season.
    async fn fetch_season(&self, season: u16) -> Result<SeasonRecords>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Fetch every requested season concurrently. This is the only blocking
/// boundary of a grading run and happens once, before any grading starts.
pub async fn fetch_seasons(
    provider: &dyn StatRecordProvider,
    seasons: &[u16],
) -> Result<Vec<SeasonRecords>> {
    let mut unique = seasons.to_vec();
    unique.sort_unstable();
    unique.dedup();

    let futures: Vec<_> = unique
        .iter()
        .map(|&season| async move {
            let records = provider
                .fetch_season(season)
                .await
                .with_context(|| format!("{}: failed to fetch season {}", provider.name(), season))?;
            info!(
                "{}: season {} -> {} skill rows, {} plays, {} snap rows, {} games",
                provider.name(),
                season,
                records.skill_stats.len(),
                records.plays.len(),
                records.snaps.len(),
                records.schedule.len()
            );
            Ok::<_, anyhow::Error>(records)
        })
        .collect();

    futures_util::future::join_all(futures)
        .await
        .into_iter()
        .collect()
}

/// Provider over records already held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    seasons: BTreeMap<u16, SeasonRecords>,
}

impl InMemoryProvider {
    pub fn new(records: impl IntoIterator<Item = SeasonRecords>) -> Self {
        Self {
            seasons: records.into_iter().map(|r| (r.season, r)).collect(),
        }
    }
}

#[async_trait]
impl StatRecordProvider for InMemoryProvider {
    async fn fetch_season(&self, season: u16) -> Result<SeasonRecords> {
        self.seasons
            .get(&season)
            .cloned()
            .with_context(|| format!("season {} not loaded", season))
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_seasons_dedups_and_orders() {
        let provider = InMemoryProvider::new([SeasonRecords::new(2024), SeasonRecords::new(2023)]);
        let out = fetch_seasons(&provider, &[2024, 2023, 2024]).await.unwrap();
        let seasons: Vec<u16> = out.iter().map(|r| r.season).collect();
        assert_eq!(seasons, vec![2023, 2024]);
    }

    #[tokio::test]
    async fn unknown_season_is_an_error() {
        let provider = InMemoryProvider::new([SeasonRecords::new(2023)]);
        let err = fetch_seasons(&provider, &[2022]).await.unwrap_err();
        assert!(format!("{err:#}").contains("season 2022"));
    }
}
