//! # Job Progress State Machine Module
//!
//! Questo modulo mantiene lo stato di un task remoto a partire dal flusso
//! di eventi del canale `/ws/progress/{task_id}`.
//!
//! ## Responsabilità:
//! - Riduce gli eventi asincroni in uno snapshot `JobState` immutabile
//! - Traccia contatori completati/falliti, file corrente e storico risultati
//! - Mantiene un buffer di log limitato per il file in elaborazione
//! - Stima la percentuale di completamento dal log testuale di ffmpeg
//!
//! ## Macchina a stati (per task):
//! - `Idle` → `Running` alla conferma di submit (evento `started`)
//! - `Running` + `file_start`: nuovo file corrente, log e stima azzerati
//! - `Running` + `file_log`: append al buffer, scan delle ultime righe
//! - `Running` + `file_done`: incrementa un contatore, accoda il risultato
//! - `Running` + `finished` / `cancelled`: stato terminale
//! - qualsiasi stato + `state`: resync autoritativo (sovrascrive tutto,
//!   può anche riportare uno stato terminale a `Running`)
//!
//! ## Stima percentuale:
//! Il processore remoto stampa la durata totale (`时长: 12.5秒`) e ffmpeg
//! la posizione corrente (`time=00:00:06.25`). La percentuale è
//! `min(99, round(current/duration*100))`: il tetto a 99 è voluto, il 100%
//! compare solo quando arriva il `file_done` del file.
//!
//! ## Buffer di log:
//! Massimo 200 righe; superato il limite viene tagliato alle 150 più
//! recenti. Solo le ultime 5 righe vengono scansionate per i marcatori.
//!
//! Lo snapshot viene sostituito integralmente ad ogni evento: il reducer
//! non fa I/O ed è testabile senza runtime di rete.

use crate::events::{FileResult, ProgressEvent};
use regex::Regex;
use std::sync::OnceLock;

/// Maximum number of retained log lines
pub const LOG_BUFFER_CAP: usize = 200;
/// Lines kept after a trim
pub const LOG_BUFFER_TRIM: usize = 150;
/// How many trailing lines are scanned for progress markers
const PARSE_TAIL_LINES: usize = 5;

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"时长[:：]\s*([0-9]+(?:\.[0-9]+)?)\s*秒").unwrap())
}

fn time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"time=(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap())
}

/// Overall status of one submitted task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Parse the wire representation ("running", "completed", ...)
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "pending" | "idle" => Some(Self::Idle),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions (resync excepted)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Completion estimate for the file currently being processed.
///
/// Both fields start unset and are filled from log lines; the pair is
/// discarded whenever a new file starts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressEstimate {
    pub duration: Option<f64>,
    pub current_time: Option<f64>,
}

impl ProgressEstimate {
    /// Percentage shown while the file is running: capped at 99,
    /// 0 until a duration has been parsed.
    pub fn percent(&self) -> u8 {
        match (self.duration, self.current_time) {
            (Some(duration), Some(current)) if duration > 0.0 => {
                let pct = ((current / duration) * 100.0).round() as u64;
                pct.min(99) as u8
            }
            _ => 0,
        }
    }
}

/// Immutable snapshot of one task's progress.
///
/// `apply` consumes an event and returns the next snapshot; the caller
/// replaces its copy wholesale.
#[derive(Debug, Clone)]
pub struct JobState {
    pub status: JobStatus,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub current_file: Option<String>,
    pub log: Vec<String>,
    pub file_results: Vec<FileResult>,
    pub estimate: ProgressEstimate,
    /// Total elapsed seconds, reported by the terminal `finished` event
    pub elapsed: Option<f64>,
}

impl JobState {
    /// Fresh state before any event has been observed
    pub fn idle() -> Self {
        Self {
            status: JobStatus::Idle,
            completed: 0,
            failed: 0,
            total: 0,
            current_file: None,
            log: Vec::new(),
            file_results: Vec::new(),
            estimate: ProgressEstimate::default(),
            elapsed: None,
        }
    }

    /// State after a submission acknowledgment with a known file count
    pub fn running(total: usize) -> Self {
        Self {
            status: JobStatus::Running,
            total,
            ..Self::idle()
        }
    }

    /// Files that have reached a terminal per-file state
    pub fn finished_count(&self) -> usize {
        self.completed + self.failed
    }

    /// Percentage for the active file, only while the job is running
    pub fn current_percent(&self) -> Option<u8> {
        if self.status == JobStatus::Running && self.current_file.is_some() {
            Some(self.estimate.percent())
        } else {
            None
        }
    }

    /// Percentage to display for one specific file.
    ///
    /// Files with a recorded result are pinned at 100; the active file
    /// uses the parsed estimate (capped at 99); anything else is unknown.
    pub fn display_percent(&self, filename: &str) -> Option<u8> {
        if self.file_results.iter().any(|r| r.filename == filename) {
            return Some(100);
        }
        if self.status == JobStatus::Running && self.current_file.as_deref() == Some(filename) {
            return Some(self.estimate.percent());
        }
        None
    }

    /// Reduce one event into the next snapshot.
    ///
    /// Unknown status strings leave the current status untouched;
    /// the event's other fields are still applied.
    pub fn apply(&self, event: &ProgressEvent) -> JobState {
        let mut next = self.clone();

        match event {
            ProgressEvent::Started { status, total } => {
                next.status = JobStatus::from_wire(status).unwrap_or(JobStatus::Running);
                next.total = *total;
            }

            ProgressEvent::FileStart {
                filename, total, ..
            } => {
                next.current_file = Some(filename.clone());
                next.log.clear();
                next.estimate = ProgressEstimate::default();
                next.total = *total;
            }

            ProgressEvent::FileLog { line, .. } => {
                next.push_log_line(line);
            }

            ProgressEvent::FileDone { result, .. } => {
                if result.is_done() {
                    next.completed += 1;
                } else {
                    next.failed += 1;
                }
                next.file_results.push(result.clone());
                // Il file corrente resta visibile fino al prossimo
                // file_start o all'evento terminale
            }

            ProgressEvent::Finished {
                status, elapsed, ..
            } => {
                next.status = JobStatus::from_wire(status).unwrap_or(JobStatus::Completed);
                next.elapsed = Some(*elapsed);
                next.current_file = None;
                next.estimate = ProgressEstimate::default();
            }

            ProgressEvent::Cancelled { .. } => {
                next.status = JobStatus::Cancelled;
                next.current_file = None;
                next.estimate = ProgressEstimate::default();
            }

            ProgressEvent::State {
                status,
                completed,
                failed,
                total,
                current_file,
                file_results,
            } => {
                // Resync autoritativo: sovrascrive contatori, storico e
                // file corrente. Il log resta valido solo se il file
                // corrente non è cambiato nel frattempo.
                if let Some(status) = JobStatus::from_wire(status) {
                    next.status = status;
                }
                next.completed = *completed;
                next.failed = *failed;
                next.total = *total;
                next.file_results = file_results.clone();

                let incoming = if current_file.is_empty() {
                    None
                } else {
                    Some(current_file.clone())
                };
                if incoming != next.current_file {
                    next.log.clear();
                    next.estimate = ProgressEstimate::default();
                }
                next.current_file = incoming;
            }
        }

        next
    }

    /// Append a log line, enforce the buffer cap, rescan the tail
    fn push_log_line(&mut self, line: &str) {
        self.log.push(line.to_string());
        if self.log.len() > LOG_BUFFER_CAP {
            let excess = self.log.len() - LOG_BUFFER_TRIM;
            self.log.drain(..excess);
        }
        self.rescan_tail();
    }

    /// Scan the last few lines for duration / time markers.
    ///
    /// A line matching neither pattern leaves the previous estimate in
    /// place; the latest match in the tail wins.
    fn rescan_tail(&mut self) {
        let start = self.log.len().saturating_sub(PARSE_TAIL_LINES);
        for line in &self.log[start..] {
            if let Some(caps) = duration_regex().captures(line) {
                if let Ok(seconds) = caps[1].parse::<f64>() {
                    self.estimate.duration = Some(seconds);
                }
            }
            if let Some(caps) = time_regex().captures(line) {
                let hours: f64 = caps[1].parse().unwrap_or(0.0);
                let minutes: f64 = caps[2].parse().unwrap_or(0.0);
                let seconds: f64 = caps[3].parse().unwrap_or(0.0);
                self.estimate.current_time = Some(hours * 3600.0 + minutes * 60.0 + seconds);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::parse_event;

    fn done_event(name: &str, ok: bool) -> ProgressEvent {
        ProgressEvent::FileDone {
            filename: name.to_string(),
            result: FileResult {
                filename: name.to_string(),
                status: if ok { "done" } else { "failed" }.to_string(),
                elapsed: 1.0,
                error: if ok { String::new() } else { "exit code 1".to_string() },
            },
            completed: 0,
            failed: 0,
            total: 0,
        }
    }

    fn log_event(line: &str) -> ProgressEvent {
        ProgressEvent::FileLog {
            filename: "手写/a.mp4".to_string(),
            line: line.to_string(),
        }
    }

    fn start_event(name: &str) -> ProgressEvent {
        ProgressEvent::FileStart {
            filename: name.to_string(),
            completed: 0,
            failed: 0,
            total: 4,
        }
    }

    #[test]
    fn file_done_counts_are_exact() {
        let mut state = JobState::running(10);
        let outcomes = [true, false, true, true, false, true, true];

        for (n, ok) in outcomes.iter().enumerate() {
            state = state.apply(&done_event(&format!("f{n}.mp4"), *ok));
            assert_eq!(state.finished_count(), n + 1);
            assert_eq!(state.status, JobStatus::Running);
        }

        assert_eq!(state.completed, 5);
        assert_eq!(state.failed, 2);
        assert_eq!(state.file_results.len(), 7);
    }

    #[test]
    fn percentage_from_duration_and_time_markers() {
        let mut state = JobState::running(1);
        state = state.apply(&start_event("手写/a.mp4"));
        state = state.apply(&log_event("  时长: 12.5秒"));
        assert_eq!(state.current_percent(), Some(0));

        state = state.apply(&log_event(
            "frame=  187 fps= 30 q=28.0 size=512kB time=00:00:06.25 bitrate=671kbits/s",
        ));
        assert_eq!(state.current_percent(), Some(50));
    }

    #[test]
    fn percentage_never_reaches_100_while_running() {
        let mut state = JobState::running(1);
        state = state.apply(&start_event("a.mp4"));
        state = state.apply(&log_event("时长: 10.0秒"));
        state = state.apply(&log_event("time=00:00:09.99 bitrate=..."));
        assert_eq!(state.current_percent(), Some(99));

        // Anche oltre la durata dichiarata resta il tetto a 99
        state = state.apply(&log_event("time=00:00:15.00 bitrate=..."));
        assert_eq!(state.current_percent(), Some(99));
    }

    #[test]
    fn full_width_colon_duration_marker() {
        let mut state = JobState::running(1);
        state = state.apply(&start_event("a.mp4"));
        state = state.apply(&log_event("时长： 8秒"));
        assert_eq!(state.estimate.duration, Some(8.0));
    }

    #[test]
    fn unmatched_line_keeps_previous_estimate() {
        let mut state = JobState::running(1);
        state = state.apply(&start_event("a.mp4"));
        state = state.apply(&log_event("时长: 20.0秒"));
        state = state.apply(&log_event("time=00:00:05.00"));
        let before = state.estimate;

        state = state.apply(&log_event("applying sticker pool (14 items)"));
        assert_eq!(state.estimate, before);
        assert_eq!(state.current_percent(), Some(25));
    }

    #[test]
    fn done_file_is_pinned_at_100() {
        let mut state = JobState::running(2);
        state = state.apply(&start_event("a.mp4"));
        state = state.apply(&log_event("时长: 10.0秒"));
        state = state.apply(&log_event("time=00:00:09.90"));
        assert_eq!(state.display_percent("a.mp4"), Some(99));

        state = state.apply(&done_event("a.mp4", true));
        assert_eq!(state.display_percent("a.mp4"), Some(100));
        assert_eq!(state.display_percent("b.mp4"), None);
    }

    #[test]
    fn file_start_resets_log_and_estimate() {
        let mut state = JobState::running(2);
        state = state.apply(&start_event("a.mp4"));
        state = state.apply(&log_event("时长: 10.0秒"));
        state = state.apply(&log_event("time=00:00:05.00"));
        assert_eq!(state.current_percent(), Some(50));

        state = state.apply(&start_event("b.mp4"));
        assert!(state.log.is_empty());
        assert_eq!(state.estimate, ProgressEstimate::default());
        assert_eq!(state.current_percent(), Some(0));
        assert_eq!(state.current_file.as_deref(), Some("b.mp4"));
    }

    #[test]
    fn log_buffer_cap_and_trim() {
        let mut state = JobState::running(1);
        state = state.apply(&start_event("a.mp4"));

        for n in 0..LOG_BUFFER_CAP {
            state = state.apply(&log_event(&format!("line {n}")));
        }
        assert_eq!(state.log.len(), LOG_BUFFER_CAP);

        state = state.apply(&log_event("line 200"));
        assert_eq!(state.log.len(), LOG_BUFFER_TRIM);
        assert_eq!(state.log.first().map(String::as_str), Some("line 51"));
        assert_eq!(state.log.last().map(String::as_str), Some("line 200"));
    }

    #[test]
    fn duration_marker_outside_scan_window_is_ignored() {
        let mut state = JobState::running(1);
        state = state.apply(&start_event("a.mp4"));

        // Il marcatore finisce oltre le ultime 5 righe prima di essere letto
        let mut lines = vec!["时长: 30.0秒".to_string()];
        for n in 0..6 {
            lines.push(format!("noise {n}"));
        }
        let mut fresh = JobState::running(1).apply(&start_event("a.mp4"));
        for chunk in &lines {
            fresh = fresh.apply(&log_event(chunk));
        }
        // La durata è stata catturata al momento dell'append, e resta
        assert_eq!(fresh.estimate.duration, Some(30.0));

        // Ma una durata mai entrata nella finestra non viene mai vista
        state.log = lines.clone();
        state.estimate = ProgressEstimate::default();
        state = state.apply(&log_event("noise tail"));
        assert_eq!(state.estimate.duration, None);
    }

    #[test]
    fn state_resync_overwrites_everything() {
        let mut state = JobState::running(6);
        state = state.apply(&start_event("a.mp4"));
        state = state.apply(&done_event("a.mp4", true));
        assert_eq!(state.completed, 1);

        let resync = parse_event(
            r#"{"type":"state","status":"completed","completed":5,"failed":1,"total":6,"current_file":"","file_results":[
                {"filename":"f0","status":"done","elapsed":1,"error":""},
                {"filename":"f1","status":"done","elapsed":1,"error":""},
                {"filename":"f2","status":"done","elapsed":1,"error":""},
                {"filename":"f3","status":"done","elapsed":1,"error":""},
                {"filename":"f4","status":"done","elapsed":1,"error":""},
                {"filename":"f5","status":"failed","elapsed":1,"error":"exit code 1"}]}"#,
        )
        .unwrap();

        state = state.apply(&resync);
        assert_eq!(state.status, JobStatus::Completed);
        assert_eq!(state.completed, 5);
        assert_eq!(state.failed, 1);
        assert_eq!(state.file_results.len(), 6);
        assert_eq!(state.current_file, None);
    }

    #[test]
    fn state_resync_can_revive_a_terminal_state() {
        let mut state = JobState::running(2);
        state = state.apply(&ProgressEvent::Cancelled {
            status: "cancelled".to_string(),
        });
        assert!(state.status.is_terminal());

        let resync = parse_event(
            r#"{"type":"state","status":"running","completed":1,"failed":0,"total":2,"current_file":"b.mp4","file_results":[]}"#,
        )
        .unwrap();
        state = state.apply(&resync);
        assert_eq!(state.status, JobStatus::Running);
        assert_eq!(state.current_file.as_deref(), Some("b.mp4"));
    }

    #[test]
    fn finished_clears_current_file() {
        let mut state = JobState::running(1);
        state = state.apply(&start_event("a.mp4"));
        state = state.apply(&done_event("a.mp4", true));
        state = state.apply(&ProgressEvent::Finished {
            status: "completed".to_string(),
            completed: 1,
            failed: 0,
            total: 1,
            elapsed: 12.0,
        });

        assert_eq!(state.status, JobStatus::Completed);
        assert_eq!(state.current_file, None);
        assert_eq!(state.current_percent(), None);
        assert_eq!(state.elapsed, Some(12.0));
    }

    #[test]
    fn malformed_event_leaves_state_unchanged() {
        let state = JobState::running(3);
        // parse_event rifiuta il payload: il chiamante non ha nulla da applicare
        assert!(parse_event(r#"{"type":"file_done","result":42}"#).is_err());
        assert!(parse_event("{broken").is_err());
        assert_eq!(state.completed, 0);
        assert_eq!(state.status, JobStatus::Running);
    }

    #[test]
    fn cancelled_and_completed_are_mutually_exclusive() {
        let base = JobState::running(2);

        let cancelled = base.apply(&ProgressEvent::Cancelled {
            status: "cancelled".to_string(),
        });
        assert_eq!(cancelled.status, JobStatus::Cancelled);

        let finished = base.apply(&ProgressEvent::Finished {
            status: "completed".to_string(),
            completed: 2,
            failed: 0,
            total: 2,
            elapsed: 5.0,
        });
        assert_eq!(finished.status, JobStatus::Completed);
        assert_ne!(cancelled.status, finished.status);
    }
}
