//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione del client.
//!
//! ## Responsabilità:
//! - Definisce la struct `ClientConfig` con i parametri di connessione
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `server_url`: URL base del backend (default: "http://127.0.0.1:8000")
//! - `timeout_secs`: Timeout richieste REST in secondi (default: 30)
//! - `data_dir`: Directory dati del client (default: None = `~/.video-mixer`)
//!
//! ## Validazione:
//! - Controlla che server_url sia http:// o https://
//! - Controlla che timeout_secs sia > 0
//!
//! ## Esempio:
//! ```rust
//! # use video_mixer_cli::config::ClientConfig;
//! # fn main() -> anyhow::Result<()> {
//! let config = ClientConfig {
//!     server_url: "http://192.168.1.20:8000".to_string(),
//!     ..Default::default()
//! };
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the VideoMixer client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the VideoMixer backend
    pub server_url: String,
    /// Timeout for REST requests in seconds
    pub timeout_secs: u64,
    /// Data directory for client-side caches (None = ~/.video-mixer)
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 30,
            data_dir: None,
        }
    }
}

impl ClientConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "Server URL must start with http:// or https://: {}",
                self.server_url
            ));
        }

        if self.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Request timeout must be greater than 0"));
        }

        Ok(())
    }

    /// The WebSocket base URL derived from `server_url` (http -> ws)
    pub fn ws_url(&self) -> String {
        if let Some(rest) = self.server_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.server_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.server_url.clone()
        }
    }

    /// Load configuration from file
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: ClientConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
