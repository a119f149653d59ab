use crate::error::Result;
use expimon_common::types::NotificationRun;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Filesystem store for notification run artifacts, one pretty-printed
/// JSON file per run for later audit.
pub struct RunStore {
    results_dir: PathBuf,
}

impl RunStore {
    pub fn new(results_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(results_dir)?;
        tracing::info!(path = %results_dir.display(), "Initialized run store");
        Ok(Self {
            results_dir: results_dir.to_path_buf(),
        })
    }

    /// The timestamp alone is only second-granular, so the file is
    /// created with create-new semantics and a numeric suffix is added
    /// when two runs start within the same second.
    pub fn save(&self, run: &NotificationRun) -> Result<PathBuf> {
        let stem = format!(
            "notification_check_{}",
            run.start_time.format("%Y%m%d_%H%M%S")
        );
        let json = serde_json::to_string_pretty(run)?;

        let mut attempt = 0u32;
        loop {
            let filename = if attempt == 0 {
                format!("{stem}.json")
            } else {
                format!("{stem}_{attempt}.json")
            };
            let path = self.results_dir.join(filename);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(json.as_bytes())?;
                    tracing::info!(path = %path.display(), "Saved notification run");
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Paths of all stored runs, oldest first.
    pub fn list_runs(&self) -> Result<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.results_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "json")
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("notification_check_"))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    pub fn load(&self, path: &Path) -> Result<NotificationRun> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
