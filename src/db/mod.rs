use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::grading::Stage;

/// Identity of one cached stage result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub stage: Stage,
    pub entity: String,
    pub season: u16,
}

impl CacheKey {
    pub fn new(stage: Stage, entity: impl Into<String>, season: u16) -> Self {
        Self {
            stage,
            entity: entity.into(),
            season,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.stage, self.season, self.entity)
    }
}

/// Store for computed stage results.
///
/// Implementations must tolerate concurrent `put`s of the same key; the
/// first stored value wins and later ones are dropped.
pub trait GradeCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<serde_json::Value>>;
    fn put(&self, key: &CacheKey, value: &serde_json::Value) -> Result<()>;
    fn name(&self) -> &str;
}

/// Cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl GradeCache for NoCache {
    fn get(&self, _key: &CacheKey) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    fn put(&self, _key: &CacheKey, _value: &serde_json::Value) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// SQLite-backed cache (single connection with mutex)
#[derive(Clone)]
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCache {
    /// Open (or create) the cache database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |r| r.get(0))?;
        tracing::debug!("Grade cache {} opened (journal_mode={})", path, mode);
        let cache = SqliteCache {
            conn: Arc::new(Mutex::new(conn)),
        };
        cache.run_migrations()?;
        Ok(cache)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("cache connection mutex poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// When the entry was first stored
    pub fn computed_at(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock()?;
        let at = conn
            .query_row(
                "SELECT computed_at FROM grade_cache WHERE stage=?1 AND entity=?2 AND season=?3",
                params![key.stage.as_str(), key.entity, key.season],
                |row| row.get(0),
            )
            .optional()?;
        Ok(at)
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM grade_cache", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    /// Drop every entry for a season
    pub fn invalidate_season(&self, season: u16) -> Result<usize> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM grade_cache WHERE season=?1", params![season])?;
        Ok(n)
    }
}

impl GradeCache for SqliteCache {
    fn get(&self, key: &CacheKey) -> Result<Option<serde_json::Value>> {
        let conn = self.lock()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM grade_cache WHERE stage=?1 AND entity=?2 AND season=?3",
                params![key.stage.as_str(), key.entity, key.season],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(p) => Ok(Some(serde_json::from_str(&p)?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &CacheKey, value: &serde_json::Value) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO grade_cache (stage, entity, season, payload, computed_at)
             VALUES (?1,?2,?3,?4,?5)",
            params![key.stage.as_str(), key.entity, key.season, payload, Utc::now()],
        )?;
        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS grade_cache (
    stage       TEXT    NOT NULL,
    entity      TEXT    NOT NULL,
    season      INTEGER NOT NULL,
    payload     TEXT    NOT NULL,
    computed_at TEXT    NOT NULL,
    PRIMARY KEY (stage, entity, season)
);

CREATE INDEX IF NOT EXISTS idx_grade_cache_season ON grade_cache(season);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_writer_wins() {
        let cache = SqliteCache::open(":memory:").unwrap();
        let key = CacheKey::new(Stage::TeamUnit, "p40-g3-s0.25-t1.5-c8", 2023);

        assert_eq!(cache.get(&key).unwrap(), None);
        cache.put(&key, &json!({"overall": 86.8})).unwrap();
        cache.put(&key, &json!({"overall": 1.0})).unwrap();

        assert_eq!(cache.get(&key).unwrap(), Some(json!({"overall": 86.8})));
        assert_eq!(cache.len().unwrap(), 1);
        assert!(cache.computed_at(&key).unwrap().is_some());
    }

    #[test]
    fn keys_are_scoped_by_stage_and_season() {
        let cache = SqliteCache::open(":memory:").unwrap();
        let a = CacheKey::new(Stage::Coaching, "x", 2022);
        let b = CacheKey::new(Stage::Coaching, "x", 2023);
        let c = CacheKey::new(Stage::Outlier, "x", 2023);
        cache.put(&a, &json!(1)).unwrap();
        cache.put(&b, &json!(2)).unwrap();
        cache.put(&c, &json!(3)).unwrap();
        assert_eq!(cache.get(&b).unwrap(), Some(json!(2)));

        assert_eq!(cache.invalidate_season(2023).unwrap(), 2);
        assert_eq!(cache.get(&b).unwrap(), None);
        assert_eq!(cache.get(&a).unwrap(), Some(json!(1)));
    }

    #[test]
    fn concurrent_population_is_safe() {
        let cache = SqliteCache::open(":memory:").unwrap();
        let key = CacheKey::new(Stage::Defensive, "p40-g3-s0.25-t1.5-c8", 2023);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                let key = key.clone();
                std::thread::spawn(move || cache.put(&key, &json!(i)).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len().unwrap(), 1);
        assert!(cache.get(&key).unwrap().is_some());
    }

    #[test]
    fn no_cache_never_hits() {
        let key = CacheKey::new(Stage::SkillPosition, "e", 2023);
        NoCache.put(&key, &json!(1)).unwrap();
        assert_eq!(NoCache.get(&key).unwrap(), None);
        assert_eq!(key.to_string(), "skill_position:2023:e");
    }
}
