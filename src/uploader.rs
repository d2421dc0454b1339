//! # Upload Coordinator Module
//!
//! Questo modulo carica i video sorgente sul backend, raggruppati per
//! categoria.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva dei video nella directory scelta (walkdir)
//! - Inferenza categoria dal nome della cartella (vedi `session`)
//! - Upload multipart strettamente sequenziale, un file alla volta
//! - Barra byte-progress per file, rimossa 800ms dopo il 100%
//! - Un upload fallito viene loggato e NON blocca i file successivi
//! - A fine batch rilegge SEMPRE la lista categorie dal server
//!   (`/api/upload/{session}/scan`): nessun merge lato client
//!
//! ## Formati supportati:
//! MP4, MOV, M4V, AVI, MKV, WebM, FLV, WMV (vedi `session::VIDEO_EXTENSIONS`)

use crate::api::{ApiClient, ScanResponse};
use crate::display::ProgressDisplay;
use crate::error::MixerError;
use crate::session::{build_upload_queue, is_video, QueuedFile};
use futures::TryStreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// How long a finished upload bar lingers at 100%
const FINISHED_BAR_LINGER: Duration = Duration::from_millis(800);

/// Outcome of one upload batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReport {
    pub uploaded: usize,
    pub failed: usize,
}

/// Streams user-selected files to the backend, one at a time
pub struct UploadCoordinator {
    api: ApiClient,
    session_id: String,
}

impl UploadCoordinator {
    pub fn new(api: ApiClient, session_id: String) -> Self {
        Self { api, session_id }
    }

    /// Find all supported video files under a directory.
    ///
    /// Hidden entries are skipped; results are sorted so category order
    /// is stable across runs.
    pub fn find_video_files(root: &Path) -> Result<Vec<PathBuf>, MixerError> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let hidden = path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true);
            if !hidden && is_video(path) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Upload every video under `root` as one batch.
    ///
    /// Returns the per-batch report together with the authoritative
    /// post-batch category list from the server.
    pub async fn upload_directory(
        &self,
        root: &Path,
    ) -> Result<(UploadReport, ScanResponse), MixerError> {
        let files = Self::find_video_files(root)?;
        if files.is_empty() {
            return Err(MixerError::Validation(format!(
                "no video files found under {}",
                root.display()
            )));
        }

        let queue = build_upload_queue(root, &files);
        let mut report = UploadReport::default();

        // Sequenziale: il file successivo parte solo quando il
        // precedente è concluso, bene o male
        for item in &queue {
            match self.upload_one(item).await {
                Ok(()) => report.uploaded += 1,
                Err(e) => {
                    warn!(
                        file = %item.path.display(),
                        error = %e,
                        "Upload failed, continuing with remaining files"
                    );
                    report.failed += 1;
                }
            }
        }

        // La lista categorie autoritativa arriva sempre dal server,
        // anche dopo un batch parzialmente fallito
        let scan = self.api.scan_session(&self.session_id).await?;
        Ok((report, scan))
    }

    /// Upload a single file with a live byte-progress bar
    async fn upload_one(&self, item: &QueuedFile) -> Result<(), MixerError> {
        let file = tokio::fs::File::open(&item.path).await?;
        let total_bytes = file.metadata().await?.len();

        let label = format!("{}/{}", item.category, item.filename);
        let bar = ProgressDisplay::upload_bar(total_bytes, &label);
        debug!(file = %item.path.display(), bytes = total_bytes, "Uploading");

        let progress = bar.clone();
        let stream = ReaderStream::new(file)
            .inspect_ok(move |chunk| progress.inc(chunk.len() as u64));

        let part = Part::stream_with_length(Body::wrap_stream(stream), total_bytes)
            .file_name(item.filename.clone())
            .mime_str("application/octet-stream")?;

        let form = Form::new()
            .text("session_id", self.session_id.clone())
            .text("category", item.category.clone())
            .part("files", part);

        let result = async {
            let response = self
                .api
                .transfer()
                .post(self.api.url("/api/upload"))
                .multipart(form)
                .send()
                .await?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let message = response.text().await.unwrap_or_default();
                return Err(MixerError::Api { status, message });
            }
            Ok(())
        }
        .await;

        match &result {
            Ok(()) => {
                bar.set_position(total_bytes);
                // La barra resta visibile al 100% per un attimo,
                // senza ritardare il file successivo
                let done = bar.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(FINISHED_BAR_LINGER).await;
                    done.finish_and_clear();
                });
            }
            Err(_) => bar.abandon(),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"v").unwrap();
    }

    #[test]
    fn discovery_finds_only_visible_videos() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        touch(&root.join("手写/a.mp4"));
        touch(&root.join("手写/b.MOV"));
        touch(&root.join("手写/.hidden.mp4"));
        touch(&root.join("手写/notes.txt"));
        touch(&root.join("c.webm"));

        let files = UploadCoordinator::find_video_files(root).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(files.len(), 3);
        assert!(names.contains(&"a.mp4".to_string()));
        assert!(names.contains(&"b.MOV".to_string()));
        assert!(names.contains(&"c.webm".to_string()));
    }

    #[test]
    fn discovery_is_sorted_for_stable_batches() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        touch(&root.join("b/z.mp4"));
        touch(&root.join("a/y.mp4"));

        let files = UploadCoordinator::find_video_files(root).unwrap();
        assert!(files[0].ends_with("a/y.mp4"));
        assert!(files[1].ends_with("b/z.mp4"));
    }
}
