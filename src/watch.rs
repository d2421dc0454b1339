//! # Live Progress Monitor Module
//!
//! Questo modulo possiede la connessione WebSocket verso il backend e
//! alimenta il reducer di `progress`.
//!
//! ## Responsabilità:
//! - Apre `/ws/progress/{task_id}` e consuma il flusso eventi
//! - Riconnessione a backoff fisso (2 secondi), illimitata finché
//!   l'ultimo stato noto è `running`
//! - Alla riconnessione il primo messaggio atteso è il resync `state`
//! - Payload malformati vengono scartati senza toccare lo stato
//! - Shutdown cooperativo via `CancellationToken`
//!
//! La connessione è posseduta dal monitor per tutta la sua durata.
//!
//! Il modulo segue anche i canali streaming una-tantum
//! (`/ws/env-install`, `/ws/git-pull`), che non prevedono riconnessione.

use crate::config::ClientConfig;
use crate::display::ProgressDisplay;
use crate::error::MixerError;
use crate::events::{parse_event, parse_stream_event, ProgressEvent, StreamEvent};
use crate::progress::{JobState, JobStatus};
use futures::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fixed delay between reconnection attempts
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Whether a dropped connection should be re-established.
///
/// Reconnection is unbounded while the last-known status is `running`;
/// a terminal (or never-started) job is left alone.
pub fn should_reconnect(state: &JobState) -> bool {
    state.status == JobStatus::Running
}

/// Follows one task's progress channel until a terminal status
pub struct JobMonitor {
    ws_url: String,
    task_id: String,
}

impl JobMonitor {
    pub fn new(config: &ClientConfig, task_id: &str) -> Self {
        Self {
            ws_url: format!("{}/ws/progress/{}", config.ws_url(), task_id),
            task_id: task_id.to_string(),
        }
    }

    /// The progress channel URL (visible for diagnostics)
    pub fn url(&self) -> &str {
        &self.ws_url
    }

    async fn connect(&self) -> Result<WsStream, MixerError> {
        let (ws_stream, _response) = connect_async(&self.ws_url)
            .await
            .map_err(|e| MixerError::WebSocket(format!("connect {}: {e}", self.ws_url)))?;
        info!(task_id = %self.task_id, "Progress channel connected");
        Ok(ws_stream)
    }

    /// Consume events until the job reaches a terminal status.
    ///
    /// Returns the final state snapshot. `initial` carries the
    /// last-known status: pass `JobState::running(total)` right after a
    /// submit acknowledgment so a failed first connect is retried.
    pub async fn follow(
        &self,
        initial: JobState,
        display: &ProgressDisplay,
        cancel: &CancellationToken,
    ) -> Result<JobState, MixerError> {
        let mut state = initial;
        display.render(&state);

        loop {
            let mut ws = tokio::select! {
                _ = cancel.cancelled() => return Err(MixerError::Cancelled),
                connected = self.connect() => match connected {
                    Ok(ws) => ws,
                    Err(e) => {
                        if !should_reconnect(&state) {
                            return Err(e);
                        }
                        warn!(task_id = %self.task_id, error = %e, "Connect failed, retrying");
                        tokio::select! {
                            _ = cancel.cancelled() => return Err(MixerError::Cancelled),
                            _ = tokio::time::sleep(RECONNECT_DELAY) => continue,
                        }
                    }
                },
            };

            loop {
                let message = tokio::select! {
                    _ = cancel.cancelled() => return Err(MixerError::Cancelled),
                    message = ws.next() => message,
                };

                match message {
                    Some(Ok(Message::Text(text))) => {
                        let event = match parse_event(&text) {
                            Ok(event) => event,
                            Err(e) => {
                                // Payload malformato: nessun cambio di stato
                                warn!(task_id = %self.task_id, error = %e, "Dropping malformed event");
                                continue;
                            }
                        };

                        if let ProgressEvent::FileLog { line, .. } = &event {
                            display.log_line(line);
                        }

                        state = state.apply(&event);
                        display.render(&state);

                        if state.status.is_terminal() {
                            debug!(task_id = %self.task_id, status = state.status.as_str(), "Terminal status reached");
                            return Ok(state);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong/binary: niente da fare
                    Some(Err(e)) => {
                        warn!(task_id = %self.task_id, error = %e, "Progress channel error");
                        break;
                    }
                }
            }

            // Connessione persa: riconnetti solo se il task risultava
            // ancora in esecuzione. Il primo messaggio dopo la
            // riconnessione è il resync `state` del server.
            if !should_reconnect(&state) {
                return Ok(state);
            }
            info!(task_id = %self.task_id, "Connection lost, reconnecting in {}s", RECONNECT_DELAY.as_secs());
            tokio::select! {
                _ = cancel.cancelled() => return Err(MixerError::Cancelled),
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }
}

/// Follow a one-shot streaming channel (installer / update pull).
///
/// Prints every `output` line through the callback and returns the
/// final `done` outcome. These channels never reconnect.
pub async fn follow_stream<F>(ws_url: &str, mut on_line: F) -> Result<(bool, String), MixerError>
where
    F: FnMut(&str),
{
    let (mut ws, _response) = connect_async(ws_url)
        .await
        .map_err(|e| MixerError::WebSocket(format!("connect {ws_url}: {e}")))?;

    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Text(text)) => match parse_stream_event(&text) {
                Ok(StreamEvent::Output { line }) => on_line(&line),
                Ok(StreamEvent::Done { success, error }) => return Ok((success, error)),
                Err(e) => {
                    warn!(error = %e, "Dropping malformed stream event");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => return Err(MixerError::WebSocket(e.to_string())),
        }
    }

    // Canale chiuso senza `done`: il processo remoto è morto
    Err(MixerError::Protocol(
        "stream closed before a done event".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_delay_is_two_seconds() {
        assert_eq!(RECONNECT_DELAY, Duration::from_secs(2));
    }

    #[test]
    fn reconnect_only_while_running() {
        assert!(should_reconnect(&JobState::running(3)));

        let mut done = JobState::running(3);
        done.status = JobStatus::Completed;
        assert!(!should_reconnect(&done));

        let mut cancelled = JobState::running(3);
        cancelled.status = JobStatus::Cancelled;
        assert!(!should_reconnect(&cancelled));

        assert!(!should_reconnect(&JobState::idle()));
    }

    #[test]
    fn monitor_builds_ws_url_from_config() {
        let config = ClientConfig {
            server_url: "http://127.0.0.1:8000".to_string(),
            ..Default::default()
        };
        let monitor = JobMonitor::new(&config, "ab12cd34");
        assert_eq!(monitor.url(), "ws://127.0.0.1:8000/ws/progress/ab12cd34");
    }
}
