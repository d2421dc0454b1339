//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom del client.
//!
//! ## Responsabilità:
//! - Definisce `MixerError` enum per categorizzare tutti gli errori possibili
//! - Fornisce messaggi di errore descrittivi e strutturati
//! - Integra con `thiserror` per automatic error conversion
//! - Supporta error chaining per mantenere il contesto degli errori
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `Http`: Errori di trasporto HTTP verso il backend
//! - `Api`: Risposta del backend con status non-2xx
//! - `WebSocket`: Errori sul canale eventi live
//! - `Protocol`: Payload del server malformato o inatteso
//! - `Validation`: Errori di validazione input utente
//! - `Cancelled`: Operazione interrotta dall'utente
//!
//! ## Esempio:
//! ```rust
//! # use video_mixer_cli::error::MixerError;
//! # fn require_files(files: &[String]) -> Result<(), MixerError> {
//! if files.is_empty() {
//!     return Err(MixerError::Validation("no video files found".to_string()));
//! }
//! # Ok(())
//! # }
//! ```

/// Custom error types for the VideoMixer client
#[derive(thiserror::Error, Debug)]
pub enum MixerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Malformed server payload: {0}")]
    Protocol(String),

    #[error("Input validation error: {0}")]
    Validation(String),

    #[error("Operation cancelled")]
    Cancelled,
}
