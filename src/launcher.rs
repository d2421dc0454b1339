//! # Job Launcher Module
//!
//! Costruisce e invia la richiesta di task al backend.
//!
//! ## Responsabilità:
//! - Traduce la mappa categoria → (strategia, varianti di output) nel
//!   body JSON di `POST /api/tasks/upload`
//! - Calcola il numero atteso di unità di lavoro (file × varianti)
//! - Nessuna logica di retry: un submit fallito torna come errore senza
//!   effetti collaterali

use crate::api::{ApiClient, ScannedCategory, TaskCreated};
use crate::error::MixerError;
use serde::{Deserialize, Serialize};

/// One (mode, preset) pair producing a single output artifact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputVariant {
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_preset: Option<String>,
}

impl OutputVariant {
    pub fn new(mode: &str, strategy_preset: Option<&str>) -> Self {
        Self {
            mode: mode.to_string(),
            strategy_preset: strategy_preset.map(str::to_string),
        }
    }
}

/// One source file with its requested output variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSpec {
    pub filename: String,
    pub outputs: Vec<OutputVariant>,
}

/// One category block of the task request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpec {
    pub folder: String,
    pub strategy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    pub files: Vec<FileSpec>,
}

/// Body of `POST /api/tasks/upload`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub session_id: String,
    pub categories: Vec<CategorySpec>,
}

impl TaskRequest {
    /// Expected job-file count: every file expands into one unit of
    /// work per output variant
    pub fn expected_total(&self) -> usize {
        self.categories
            .iter()
            .flat_map(|c| c.files.iter())
            .map(|f| f.outputs.len())
            .sum()
    }
}

/// Assemble a task request from the server-side scan result.
///
/// Every file in every category receives the same variant list; the
/// per-category strategy comes from the scan (server auto-detection)
/// unless an override is given.
pub fn build_request(
    session_id: &str,
    scanned: &[ScannedCategory],
    strategy_override: Option<&str>,
    config: Option<&serde_json::Value>,
    variants: &[OutputVariant],
) -> TaskRequest {
    let categories = scanned
        .iter()
        .map(|cat| CategorySpec {
            folder: cat.folder.clone(),
            strategy: strategy_override
                .map(str::to_string)
                .unwrap_or_else(|| cat.strategy.clone()),
            config: config.cloned(),
            files: cat
                .files
                .iter()
                .map(|name| FileSpec {
                    filename: name.clone(),
                    outputs: variants.to_vec(),
                })
                .collect(),
        })
        .collect();

    TaskRequest {
        session_id: session_id.to_string(),
        categories,
    }
}

/// Submits one job request and returns the server acknowledgment
pub struct JobLauncher {
    api: ApiClient,
}

impl JobLauncher {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Validate and submit. A rejected submission has no partial
    /// side effects to roll back.
    pub async fn submit(&self, request: &TaskRequest) -> Result<TaskCreated, MixerError> {
        if request.expected_total() == 0 {
            return Err(MixerError::Validation(
                "task request contains no (file, variant) pairs".to_string(),
            ));
        }

        let created = self.api.submit_task(request).await?;
        tracing::info!(
            task_id = %created.task_id,
            total = created.total,
            "Task submitted"
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanned(folder: &str, strategy: &str, files: &[&str]) -> ScannedCategory {
        serde_json::from_value(serde_json::json!({
            "folder": folder,
            "strategy": strategy,
            "files": files,
        }))
        .unwrap()
    }

    #[test]
    fn expected_total_is_files_times_variants() {
        let cats = vec![
            scanned("手写", "handwriting", &["a.mp4", "b.mp4"]),
            scanned("养生", "health", &["c.mp4"]),
        ];
        let variants = vec![
            OutputVariant::new("standard", Some("balanced")),
            OutputVariant::new("blur_center", Some("balanced")),
            OutputVariant::new("fake_player", None),
        ];

        let request = build_request("sess-1", &cats, None, None, &variants);
        assert_eq!(request.expected_total(), 9);
    }

    #[test]
    fn strategy_override_replaces_scanned_strategy() {
        let cats = vec![scanned("misc", "handwriting", &["a.mp4"])];
        let variants = vec![OutputVariant::new("standard", None)];

        let request = build_request("sess-1", &cats, Some("emotional"), None, &variants);
        assert_eq!(request.categories[0].strategy, "emotional");

        let request = build_request("sess-1", &cats, None, None, &variants);
        assert_eq!(request.categories[0].strategy, "handwriting");
    }

    #[test]
    fn request_serializes_to_wire_shape() {
        let cats = vec![scanned("手写", "handwriting", &["a.mp4"])];
        let variants = vec![OutputVariant::new("sandwich", Some("aggressive"))];
        let config = serde_json::json!({"sticker_count": 18});

        let request = build_request("sess-9", &cats, None, Some(&config), &variants);
        let wire = serde_json::to_value(&request).unwrap();

        assert_eq!(wire["session_id"], "sess-9");
        assert_eq!(wire["categories"][0]["folder"], "手写");
        assert_eq!(wire["categories"][0]["config"]["sticker_count"], 18);
        let output = &wire["categories"][0]["files"][0]["outputs"][0];
        assert_eq!(output["mode"], "sandwich");
        assert_eq!(output["strategy_preset"], "aggressive");
    }

    #[test]
    fn preset_is_omitted_when_absent() {
        let variant = OutputVariant::new("standard", None);
        let wire = serde_json::to_value(&variant).unwrap();
        assert!(wire.get("strategy_preset").is_none());
    }
}
