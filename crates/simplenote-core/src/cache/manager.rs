use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Consider cache stale after 1 hour.
/// Notes edited elsewhere show up on the next sync after this.
const CACHE_STALE_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }
}

pub fn is_stale(cached_at: DateTime<Utc>) -> bool {
    (Utc::now() - cached_at).num_minutes() > CACHE_STALE_MINUTES
}

/// Human-friendly "time since" for a cache timestamp
pub fn age_display(cached_at: DateTime<Utc>) -> String {
    let minutes = (Utc::now() - cached_at).num_minutes();
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        let remaining_mins = minutes % 60;
        if remaining_mins >= 30 {
            // Round up: 1h 30m+ becomes 2h
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        let remaining_hours = (minutes % 1440) / 60;
        if remaining_hours >= 12 {
            // Round up: 1d 12h+ becomes 2d
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// Named JSON snapshots in the cache directory.
///
/// An in-memory manager keeps nothing on disk; caches built on it start
/// empty every time.
#[derive(Debug, Clone)]
pub struct CacheManager {
    cache_dir: Option<PathBuf>,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;
        Ok(Self {
            cache_dir: Some(cache_dir),
        })
    }

    pub fn in_memory() -> Self {
        Self { cache_dir: None }
    }

    fn cache_path(&self, name: &str) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", name)))
    }

    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let Some(path) = self.cache_path(name) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(cached))
    }

    pub fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let Some(path) = self.cache_path(name) else {
            return Ok(());
        };
        let cached = CachedData::new(data);
        let contents = serde_json::to_string_pretty(&cached)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace cache file: {}", name))?;
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let Some(path) = self.cache_path(name) else {
            return Ok(());
        };
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to delete cache file: {}", name))?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
