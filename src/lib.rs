//! # VideoMixer Client Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione del client e validazione parametri
//! - `error`: Tipi di errore custom per diverse operazioni
//! - `api`: Client REST tipizzato verso il backend
//! - `events`: Protocollo eventi WebSocket e classificazione log
//! - `progress`: Macchina a stati del progresso task (reducer puro)
//! - `session`: Sessione di upload e inferenza categorie
//! - `uploader`: Upload sequenziale multipart con progress
//! - `launcher`: Costruzione e submit delle richieste di task
//! - `watch`: Connessione live con riconnessione e resync
//! - `display`: Rendering progress bar e log nel terminale
//! - `cache`: Marker persistito del controllo aggiornamenti
//!
//! ## Utilizzo:
//! ```rust
//! # fn main() -> Result<(), serde_json::Error> {
//! use video_mixer_cli::JobState;
//! use video_mixer_cli::events::parse_event;
//!
//! let mut state = JobState::running(4);
//! let event = parse_event(r#"{"type":"started","status":"running","total":4}"#)?;
//! state = state.apply(&event);
//! # assert_eq!(state.total, 4);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod launcher;
pub mod progress;
pub mod session;
pub mod uploader;
pub mod watch;

pub use config::ClientConfig;
pub use error::MixerError;
pub use progress::{JobState, JobStatus};
pub use session::UploadSession;
