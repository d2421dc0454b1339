//! # Backend API Client Module
//!
//! Questo modulo incapsula tutte le chiamate REST verso il backend.
//!
//! ## Responsabilità:
//! - Un metodo per ogni endpoint HTTP del backend
//! - DTO tipizzati per le risposte (serde)
//! - Mappa le risposte non-2xx in `MixerError::Api`
//! - Download degli artefatti via file temporaneo + rename atomico
//!
//! ## Endpoint coperti:
//! - `/api/upload/{session}/scan`: categorie lato server
//! - `/api/config`: blob di configurazione globale (GET/PUT)
//! - `/api/strategies`: catalogo strategie/preset/modalità
//! - `/api/assets/overview`: inventario asset
//! - `/api/tasks/upload`, `/api/tasks/{id}/cancel`: ciclo di vita task
//! - `/api/download/...`: artefatti binari
//! - `/api/history`, `/api/video-stats*`: storico e metriche
//! - `/api/env-check`, `/api/check-update`: diagnostica

use crate::config::ClientConfig;
use crate::error::MixerError;
use crate::launcher::TaskRequest;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One category as reported by the server-side scan
#[derive(Debug, Clone, Deserialize)]
pub struct ScannedCategory {
    pub folder: String,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Response of `GET /api/upload/{session}/scan`
#[derive(Debug, Clone, Deserialize)]
pub struct ScanResponse {
    #[serde(default)]
    pub categories: Vec<ScannedCategory>,
}

/// One named strategy with its default parameter set
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub defaults: serde_json::Value,
}

/// One anti-duplication intensity preset
#[derive(Debug, Clone, Deserialize)]
pub struct PresetInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// One output mixing mode
#[derive(Debug, Clone, Deserialize)]
pub struct ModeInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Response of `GET /api/strategies`
#[derive(Debug, Clone, Deserialize)]
pub struct StrategiesResponse {
    #[serde(default)]
    pub strategies: Vec<StrategyInfo>,
    #[serde(default)]
    pub strategy_presets: Vec<PresetInfo>,
    #[serde(default)]
    pub mixing_modes: Vec<ModeInfo>,
    #[serde(default)]
    pub sparkle_styles: Vec<String>,
    #[serde(default)]
    pub color_schemes: Vec<String>,
}

/// Sticker inventory, broken down by thematic category
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StickerAssets {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub categories: HashMap<String, u64>,
}

/// Sparkle inventory, broken down by style
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SparkleAssets {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub styles: HashMap<String, u64>,
}

/// Response of `GET /api/assets/overview`
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsOverview {
    #[serde(default)]
    pub stickers: StickerAssets,
    #[serde(default)]
    pub sparkles: SparkleAssets,
    /// Effect pool sizes (color_schemes, mask_styles, ...)
    #[serde(default)]
    pub effects: HashMap<String, u64>,
}

/// Acknowledgment of a submitted task
#[derive(Debug, Clone, Deserialize)]
pub struct TaskCreated {
    pub task_id: String,
    pub total: usize,
}

/// One archived task in the history list
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub completed: usize,
    #[serde(default)]
    pub failed: usize,
    #[serde(default)]
    pub elapsed: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub categories: Vec<HistoryCategory>,
}

/// Category summary inside a history entry
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryCategory {
    pub folder: String,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub count: usize,
}

/// Response of `GET /api/history`
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub tasks: Vec<HistoryEntry>,
}

/// Engagement metrics store (`GET /api/video-stats`)
#[derive(Debug, Clone, Deserialize)]
pub struct VideoStatsResponse {
    #[serde(default)]
    pub videos: Vec<serde_json::Value>,
}

/// Update body for one stats record (`PUT /api/video-stats`)
#[derive(Debug, Clone, Serialize)]
pub struct VideoStatUpdate {
    pub id: String,
    pub stats: serde_json::Value,
}

/// Presence/version info for one external tool
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCheck {
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Presence/count info for one asset directory
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetDirCheck {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub count: u64,
}

/// Asset section of the environment check
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetsCheck {
    #[serde(default)]
    pub stickers: AssetDirCheck,
    #[serde(default)]
    pub sparkles: AssetDirCheck,
}

/// Response of `GET /api/env-check`
#[derive(Debug, Clone, Deserialize)]
pub struct EnvCheck {
    #[serde(default)]
    pub ffmpeg: ToolCheck,
    #[serde(default)]
    pub ffprobe: ToolCheck,
    #[serde(default)]
    pub assets: AssetsCheck,
}

/// One upstream commit in the update check
#[derive(Debug, Clone, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    #[serde(default)]
    pub message: String,
}

/// Response of `GET /api/check-update`
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCheck {
    pub has_update: bool,
    #[serde(default)]
    pub ahead: usize,
    #[serde(default)]
    pub local_sha: Option<String>,
    #[serde(default)]
    pub commits: Vec<CommitInfo>,
    #[serde(default)]
    pub error: Option<String>,
}

/// HTTP client for the VideoMixer backend
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    transfer: reqwest::Client,
}

impl ApiClient {
    /// Build a client from validated configuration
    pub fn new(config: &ClientConfig) -> Result<Self, MixerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        // Upload e download non hanno un timeout complessivo: un video da
        // qualche GB impiega quanto serve. Resta il timeout di connessione.
        let transfer = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            base_url: config.server_url.trim_end_matches('/').to_string(),
            http,
            transfer,
        })
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The timeout-free client used for multipart uploads and downloads
    pub fn transfer(&self) -> &reqwest::Client {
        &self.transfer
    }

    /// Map a non-2xx response into `MixerError::Api`
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, MixerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(MixerError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, MixerError> {
        let response = self.http.get(self.url(path)).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// `GET /api/upload/{session}/scan` - authoritative category list
    pub async fn scan_session(&self, session_id: &str) -> Result<ScanResponse, MixerError> {
        self.get_json(&format!("/api/upload/{}/scan", session_id)).await
    }

    /// `GET /api/config` - the persisted configuration blob
    pub async fn get_config(&self) -> Result<serde_json::Value, MixerError> {
        self.get_json("/api/config").await
    }

    /// `PUT /api/config` - partial update, strategies are merged server-side
    pub async fn put_config(&self, body: &serde_json::Value) -> Result<(), MixerError> {
        let response = self.http.put(self.url("/api/config")).json(body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// `GET /api/strategies`
    pub async fn strategies(&self) -> Result<StrategiesResponse, MixerError> {
        self.get_json("/api/strategies").await
    }

    /// `GET /api/assets/overview`
    pub async fn assets_overview(&self) -> Result<AssetsOverview, MixerError> {
        self.get_json("/api/assets/overview").await
    }

    /// `POST /api/tasks/upload` - submit a remix job
    pub async fn submit_task(&self, request: &TaskRequest) -> Result<TaskCreated, MixerError> {
        let response = self
            .http
            .post(self.url("/api/tasks/upload"))
            .json(request)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// `POST /api/tasks/{id}/cancel` - cooperative cancellation request
    pub async fn cancel_task(&self, task_id: &str) -> Result<(), MixerError> {
        let response = self
            .http
            .post(self.url(&format!("/api/tasks/{}/cancel", task_id)))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// `GET /api/history`
    pub async fn history(&self) -> Result<HistoryResponse, MixerError> {
        self.get_json("/api/history").await
    }

    /// `DELETE /api/history`
    pub async fn clear_history(&self) -> Result<(), MixerError> {
        let response = self.http.delete(self.url("/api/history")).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// `GET /api/video-stats`
    pub async fn video_stats(&self) -> Result<VideoStatsResponse, MixerError> {
        self.get_json("/api/video-stats").await
    }

    /// `PUT /api/video-stats` - update one record
    pub async fn update_video_stat(&self, update: &VideoStatUpdate) -> Result<(), MixerError> {
        let response = self
            .http
            .put(self.url("/api/video-stats"))
            .json(update)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// `POST /api/video-stats/batch` - register new output records
    pub async fn batch_video_stats(&self, videos: &[serde_json::Value]) -> Result<(), MixerError> {
        let body = serde_json::json!({ "videos": videos });
        let response = self
            .http
            .post(self.url("/api/video-stats/batch"))
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// `GET /api/env-check`
    pub async fn env_check(&self) -> Result<EnvCheck, MixerError> {
        self.get_json("/api/env-check").await
    }

    /// `GET /api/check-update`
    pub async fn check_update(&self) -> Result<UpdateCheck, MixerError> {
        self.get_json("/api/check-update").await
    }

    /// Download one artifact (or the whole-task archive) to `dest_dir`.
    ///
    /// The body is streamed into a temp file in the destination directory
    /// and renamed into place only when complete, so an interrupted
    /// download never leaves a partial file under the final name.
    pub async fn download(
        &self,
        path: &str,
        dest_dir: &Path,
        filename: &str,
    ) -> Result<(PathBuf, u64), MixerError> {
        let response = self.transfer.get(self.url(path)).send().await?;
        let response = Self::check(response).await?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let mut temp = tempfile::NamedTempFile::new_in(dest_dir)?;

        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            temp.write_all(&chunk)?;
            written += chunk.len() as u64;
        }

        let final_path = dest_dir.join(filename);
        temp.persist(&final_path)
            .map_err(|e| MixerError::Io(e.error))?;

        Ok((final_path, written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_strategies_response() {
        let json = r#"{
            "strategies": [
                {"id": "handwriting", "name": "手写混剪",
                 "description": "手写/文案类视频，金色配色，14个贴纸",
                 "defaults": {"sticker_count": 14, "sparkle_style": "gold"}},
                {"id": "emotional", "name": "情感混剪"}
            ],
            "strategy_presets": [{"id": "balanced", "name": "均衡"}],
            "mixing_modes": [{"id": "standard"}, {"id": "blur_center"}],
            "sparkle_styles": ["gold", "pink"],
            "color_schemes": ["random", "金色暖调"]
        }"#;

        let parsed: StrategiesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.strategies.len(), 2);
        assert_eq!(parsed.strategies[0].id, "handwriting");
        assert_eq!(parsed.strategies[0].defaults["sticker_count"], 14);
        assert_eq!(parsed.strategy_presets[0].id, "balanced");
        assert_eq!(parsed.mixing_modes.len(), 2);
        assert_eq!(parsed.color_schemes[1], "金色暖调");
    }

    #[test]
    fn deserialize_env_check() {
        let json = r#"{
            "ffmpeg": {"installed": true, "path": "/usr/local/bin/ffmpeg", "version": "7.0"},
            "ffprobe": {"installed": false, "path": null},
            "assets": {
                "stickers": {"exists": true, "count": 19000},
                "sparkles": {"exists": false, "count": 0}
            }
        }"#;

        let parsed: EnvCheck = serde_json::from_str(json).unwrap();
        assert!(parsed.ffmpeg.installed);
        assert_eq!(parsed.ffmpeg.version.as_deref(), Some("7.0"));
        assert!(!parsed.ffprobe.installed);
        assert_eq!(parsed.assets.stickers.count, 19000);
        assert!(!parsed.assets.sparkles.exists);
    }

    #[test]
    fn deserialize_update_check() {
        let json = r#"{
            "has_update": true,
            "ahead": 2,
            "local_sha": "ab12cd3",
            "commits": [
                {"sha": "deadbee", "message": "fix sticker rotation"},
                {"sha": "cafef00", "message": "new sparkle pack"}
            ]
        }"#;

        let parsed: UpdateCheck = serde_json::from_str(json).unwrap();
        assert!(parsed.has_update);
        assert_eq!(parsed.ahead, 2);
        assert_eq!(parsed.commits[1].message, "new sparkle pack");

        // La variante "nessun aggiornamento" ha solo il flag
        let minimal: UpdateCheck =
            serde_json::from_str(r#"{"has_update": false}"#).unwrap();
        assert!(!minimal.has_update);
        assert!(minimal.commits.is_empty());
    }

    #[test]
    fn deserialize_assets_overview() {
        let json = r#"{
            "stickers": {"total": 120, "categories": {"花草自然": 80, "中式传统": 40}},
            "sparkles": {"total": 33, "styles": {"gold": 12, "pink": 21}},
            "effects": {"color_schemes": 8, "mask_styles": 5}
        }"#;

        let parsed: AssetsOverview = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.stickers.total, 120);
        assert_eq!(parsed.stickers.categories["花草自然"], 80);
        assert_eq!(parsed.sparkles.styles["pink"], 21);
        assert_eq!(parsed.effects["color_schemes"], 8);
    }

    #[test]
    fn deserialize_history_entry_with_missing_fields() {
        let json = r#"{"tasks": [{"id": "ab12cd34", "status": "completed",
            "total": 3, "completed": 3, "failed": 0, "elapsed": 58.2,
            "timestamp": "2025-11-02T10:15:00",
            "categories": [{"folder": "手写", "strategy": "handwriting", "count": 3}]}]}"#;

        let parsed: HistoryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.tasks.len(), 1);
        assert_eq!(parsed.tasks[0].categories[0].folder, "手写");
    }

    #[test]
    fn url_joins_without_double_slash() {
        let config = ClientConfig {
            server_url: "http://localhost:8000/".to_string(),
            ..Default::default()
        };
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(
            client.url("/api/strategies"),
            "http://localhost:8000/api/strategies"
        );
    }
}
