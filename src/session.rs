//! # Upload Session Module
//!
//! Questo modulo modella la sessione di upload e l'inferenza delle categorie.
//!
//! ## Responsabilità:
//! - Genera il token di sessione (uno per esecuzione, mai persistito)
//! - Raggruppa i file selezionati in categorie dal nome della cartella
//! - Sanitizza i nomi categoria (niente separatori di path, mai vuoti)
//! - Riconosce i formati video supportati dal backend
//!
//! ## Inferenza categoria:
//! La categoria di un file è il nome della cartella che lo contiene
//! direttamente; i file appoggiati nella root selezionata ricadono in una
//! categoria con il nome della root stessa. `videos/手写/a.mp4` →
//! categoria `手写`; `videos/c.mp4` → categoria `videos`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Video formats the backend accepts
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "avi", "mkv", "webm", "flv", "wmv"];

/// Fallback label for categories whose name sanitizes to nothing
pub const DEFAULT_CATEGORY: &str = "未分类";

/// Check if a file is a supported video
pub fn is_video(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext_lower = ext.to_string_lossy().to_lowercase();
        VIDEO_EXTENSIONS.contains(&ext_lower.as_str())
    } else {
        false
    }
}

/// Strip path separators and whitespace from a category name.
///
/// Names are user- or folder-derived and end up in URLs and server-side
/// directory names; an empty result falls back to [`DEFAULT_CATEGORY`].
pub fn sanitize_category(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| *c != '/' && *c != '\\')
        .collect::<String>()
        .trim()
        .to_string();

    if cleaned.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        cleaned
    }
}

/// One folder-derived grouping of source files sharing a strategy
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub name: String,
    /// Ordered source file names (not paths - the backend re-roots them)
    pub files: Vec<String>,
}

/// An in-memory upload session.
///
/// The token is opaque to the client and regenerated on every run;
/// the category list mirrors the last authoritative server scan.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub id: String,
    pub categories: Vec<Category>,
}

impl UploadSession {
    /// Create a session with a fresh random token
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            categories: Vec::new(),
        }
    }
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}

/// A single file queued for upload, with its inferred category
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedFile {
    pub path: PathBuf,
    pub category: String,
    pub filename: String,
}

/// Group discovered files into categories relative to the chosen root.
///
/// The category is the immediate parent folder name; files sitting
/// directly inside `root` use the root folder's own name. Input order is
/// preserved within each category, categories appear in first-seen order.
pub fn group_by_category(root: &Path, files: &[PathBuf]) -> Vec<Category> {
    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();

    for path in files {
        let filename = match path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };

        let parent = path.parent().unwrap_or(root);
        let raw_name = if parent == root {
            root_name.clone()
        } else {
            parent
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| root_name.clone())
        };
        let category = sanitize_category(&raw_name);

        if !grouped.contains_key(&category) {
            order.push(category.clone());
        }
        grouped.entry(category).or_default().push(filename);
    }

    order
        .into_iter()
        .map(|name| {
            let files = grouped.remove(&name).unwrap_or_default();
            Category { name, files }
        })
        .collect()
}

/// Expand discovered paths into upload queue entries
pub fn build_upload_queue(root: &Path, files: &[PathBuf]) -> Vec<QueuedFile> {
    let mut queue = Vec::new();
    for path in files {
        let filename = match path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };
        let parent = path.parent().unwrap_or(root);
        let raw_name = if parent == root {
            root.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        } else {
            parent
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        };

        queue.push(QueuedFile {
            path: path.clone(),
            category: sanitize_category(&raw_name),
            filename,
        });
    }
    queue
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_video() {
        assert!(is_video(Path::new("a.mp4")));
        assert!(is_video(Path::new("b.MOV")));
        assert!(is_video(Path::new("手写/视频.webm")));
        assert!(!is_video(Path::new("c.png")));
        assert!(!is_video(Path::new("noext")));
    }

    #[test]
    fn test_sanitize_category() {
        assert_eq!(sanitize_category("手写"), "手写");
        assert_eq!(sanitize_category("a/b\\c"), "abc");
        assert_eq!(sanitize_category("  spaced  "), "spaced");
        assert_eq!(sanitize_category("///"), DEFAULT_CATEGORY);
        assert_eq!(sanitize_category(""), DEFAULT_CATEGORY);
    }

    #[test]
    fn subfolder_files_use_parent_folder_name() {
        let root = Path::new("videos");
        let files = vec![
            PathBuf::from("videos/手写/a.mp4"),
            PathBuf::from("videos/手写/b.mp4"),
        ];

        let categories = group_by_category(root, &files);
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "手写");
        assert_eq!(categories[0].files, vec!["a.mp4", "b.mp4"]);
    }

    #[test]
    fn root_level_files_use_root_folder_name() {
        let root = Path::new("videos");
        let files = vec![PathBuf::from("videos/c.mp4")];

        let categories = group_by_category(root, &files);
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "videos");
        assert_eq!(categories[0].files, vec!["c.mp4"]);
    }

    #[test]
    fn mixed_tree_keeps_first_seen_category_order() {
        let root = Path::new("in");
        let files = vec![
            PathBuf::from("in/情感/x.mp4"),
            PathBuf::from("in/y.mp4"),
            PathBuf::from("in/情感/z.mp4"),
            PathBuf::from("in/养生/w.mp4"),
        ];

        let categories = group_by_category(root, &files);
        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["情感", "in", "养生"]);
        assert_eq!(categories[0].files, vec!["x.mp4", "z.mp4"]);
    }

    #[test]
    fn session_tokens_are_unique_per_run() {
        let a = UploadSession::new();
        let b = UploadSession::new();
        assert_ne!(a.id, b.id);
        assert!(a.categories.is_empty());
    }

    #[test]
    fn upload_queue_carries_category_and_filename() {
        let root = Path::new("videos");
        let files = vec![
            PathBuf::from("videos/手写/a.mp4"),
            PathBuf::from("videos/c.mp4"),
        ];

        let queue = build_upload_queue(root, &files);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].category, "手写");
        assert_eq!(queue[0].filename, "a.mp4");
        assert_eq!(queue[1].category, "videos");
    }
}
