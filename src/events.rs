//! # Progress Event Protocol Module
//!
//! Questo modulo definisce i messaggi JSON scambiati con il backend.
//!
//! ## Responsabilità:
//! - Deserializza gli eventi del canale `/ws/progress/{task_id}`
//! - Deserializza gli eventi streaming di `/ws/env-install` e `/ws/git-pull`
//! - Classifica le righe di log ffmpeg per severità (solo styling)
//!
//! ## Tipi di messaggi progress:
//! - `state`: Resync completo dello stato (autoritativo, dopo riconnessione)
//! - `started`: Il task è entrato in esecuzione
//! - `file_start`: Inizio elaborazione di un file
//! - `file_log`: Una riga di output del processore per il file corrente
//! - `file_done`: Fine elaborazione di un file (successo o errore)
//! - `finished`: Fine task con statistiche finali
//! - `cancelled`: Task interrotto su richiesta
//!
//! I messaggi usano il campo `"type"` come tag, con i campi al livello
//! superiore (nessun envelope `data`).

use serde::{Deserialize, Serialize};

/// Result record for a single processed job file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileResult {
    pub filename: String,
    /// "done" or "failed"
    pub status: String,
    #[serde(default)]
    pub elapsed: f64,
    #[serde(default)]
    pub error: String,
}

impl FileResult {
    /// Whether this file completed successfully
    pub fn is_done(&self) -> bool {
        self.status == "done"
    }
}

/// Eventi del canale progress, taggati sul campo `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    /// Resync completo: sovrascrive lo stato del client
    #[serde(rename = "state")]
    State {
        status: String,
        completed: usize,
        failed: usize,
        total: usize,
        #[serde(default)]
        current_file: String,
        #[serde(default)]
        file_results: Vec<FileResult>,
    },

    /// Il task è partito
    #[serde(rename = "started")]
    Started { status: String, total: usize },

    /// Inizio elaborazione di un file specifico
    #[serde(rename = "file_start")]
    FileStart {
        filename: String,
        completed: usize,
        failed: usize,
        total: usize,
    },

    /// Riga di log del processore per il file corrente
    #[serde(rename = "file_log")]
    FileLog { filename: String, line: String },

    /// Fine elaborazione di un file specifico
    #[serde(rename = "file_done")]
    FileDone {
        filename: String,
        result: FileResult,
        completed: usize,
        failed: usize,
        total: usize,
    },

    /// Task completato (con o senza errori)
    #[serde(rename = "finished")]
    Finished {
        status: String,
        completed: usize,
        failed: usize,
        total: usize,
        #[serde(default)]
        elapsed: f64,
    },

    /// Task interrotto
    #[serde(rename = "cancelled")]
    Cancelled { status: String },
}

/// Eventi dei canali streaming (`/ws/env-install`, `/ws/git-pull`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Una riga di output del processo remoto
    #[serde(rename = "output")]
    Output { line: String },

    /// Il processo remoto è terminato
    #[serde(rename = "done")]
    Done {
        success: bool,
        #[serde(default)]
        error: String,
    },
}

/// Parse a progress-channel text message into a typed event.
///
/// Returns `Err` for malformed JSON or unknown `type` values.
/// Callers must drop the message and continue (no state change).
pub fn parse_event(text: &str) -> Result<ProgressEvent, serde_json::Error> {
    serde_json::from_str(text)
}

/// Parse an installer/update-channel text message.
pub fn parse_stream_event(text: &str) -> Result<StreamEvent, serde_json::Error> {
    serde_json::from_str(text)
}

/// Visual severity of a log line, for display styling only.
///
/// Classification is a pure function of line content and never
/// feeds back into the job state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    Error,
    Success,
    Progress,
    Info,
}

/// Classify a log line by keyword matching
pub fn classify_line(line: &str) -> LogSeverity {
    let lower = line.to_lowercase();

    if lower.contains("error") || lower.contains("failed") || line.contains("❌") || line.contains("失败") || line.contains("错误") {
        LogSeverity::Error
    } else if line.contains("✅") || line.contains("完成") || line.contains("成功") || lower.contains("success") {
        LogSeverity::Success
    } else if line.contains("time=") || line.contains("frame=") || line.contains("时长") || line.contains("进度") {
        LogSeverity::Progress
    } else {
        LogSeverity::Info
    }
}
