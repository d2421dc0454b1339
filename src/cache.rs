//! # Client Cache Module
//!
//! Questo modulo gestisce l'unico stato persistito lato client: il
//! marker dell'ultimo controllo aggiornamenti.
//!
//! ## Strategia di persistence:
//! - Un file JSON per backend (basato su hash dell'URL del server)
//! - Salvataggio in `~/.video-mixer/update_check_<hash>.json`
//! - Un marker più vecchio di 24 ore è considerato scaduto
//!
//! Il token di sessione NON viene mai persistito: viene rigenerato ad
//! ogni esecuzione.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;

/// How long a cached update check stays valid
const MARKER_TTL_HOURS: i64 = 24;

/// Result of the last `/api/check-update` call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateMarker {
    pub checked_at: DateTime<Utc>,
    pub has_update: bool,
    pub ahead: usize,
}

impl UpdateMarker {
    /// Whether the marker is recent enough to skip a new check
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.checked_at < Duration::hours(MARKER_TTL_HOURS)
    }
}

/// Manages the per-server cache file
pub struct CacheStore {
    marker_path: PathBuf,
}

impl CacheStore {
    /// Create a cache store for a specific backend URL
    pub async fn new(data_dir: Option<&Path>, server_url: &str) -> Result<Self> {
        let cache_dir = match data_dir {
            Some(dir) => dir.to_path_buf(),
            None => dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?
                .join(".video-mixer"),
        };

        fs::create_dir_all(&cache_dir).await?;

        // Un file per backend, nominato con l'hash dell'URL
        let mut hasher = Sha256::new();
        hasher.update(server_url.as_bytes());
        let hash = hex::encode(hasher.finalize())[..16].to_string();

        let marker_path = cache_dir.join(format!("update_check_{}.json", hash));

        Ok(Self { marker_path })
    }

    /// Load the cached marker, if any; corrupt files read as absent
    pub async fn load_marker(&self) -> Option<UpdateMarker> {
        let content = fs::read_to_string(&self.marker_path).await.ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Persist a new marker
    pub async fn save_marker(&self, marker: &UpdateMarker) -> Result<()> {
        let content = serde_json::to_string_pretty(marker)?;
        fs::write(&self.marker_path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn marker_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(Some(temp_dir.path()), "http://localhost:8000")
            .await
            .unwrap();

        assert!(store.load_marker().await.is_none());

        let marker = UpdateMarker {
            checked_at: Utc::now(),
            has_update: true,
            ahead: 3,
        };
        store.save_marker(&marker).await.unwrap();

        let loaded = store.load_marker().await.unwrap();
        assert_eq!(loaded, marker);
    }

    #[tokio::test]
    async fn different_servers_use_different_files() {
        let temp_dir = TempDir::new().unwrap();
        let a = CacheStore::new(Some(temp_dir.path()), "http://a:8000")
            .await
            .unwrap();
        let b = CacheStore::new(Some(temp_dir.path()), "http://b:8000")
            .await
            .unwrap();

        a.save_marker(&UpdateMarker {
            checked_at: Utc::now(),
            has_update: false,
            ahead: 0,
        })
        .await
        .unwrap();

        assert!(a.load_marker().await.is_some());
        assert!(b.load_marker().await.is_none());
    }

    #[test]
    fn marker_freshness_window() {
        let now = Utc::now();
        let fresh = UpdateMarker {
            checked_at: now - Duration::hours(23),
            has_update: false,
            ahead: 0,
        };
        let stale = UpdateMarker {
            checked_at: now - Duration::hours(25),
            has_update: false,
            ahead: 0,
        };

        assert!(fresh.is_fresh(now));
        assert!(!stale.is_fresh(now));
    }

    #[tokio::test]
    async fn corrupt_marker_reads_as_absent() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(Some(temp_dir.path()), "http://x:1")
            .await
            .unwrap();

        fs::write(&store.marker_path, "{not json").await.unwrap();
        assert!(store.load_marker().await.is_none());
    }
}
