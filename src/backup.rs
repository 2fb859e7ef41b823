//! Timestamped page-content backups.
//!
//! Every mutating operation snapshots the pre-mutation content here before
//! any remote write; risky mutations snapshot the result as well. Files
//! are immutable once written and never auto-deleted, so the directory is
//! append-only and listing works without locks.

use chrono::{DateTime, Local, Utc};
use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::models::BackupRef;

/// Snapshots hold storage-format markup.
const BACKUP_EXT: &str = "html";

/// Append-only store of timestamped page snapshots.
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Persist a snapshot as `<label>_<YYYYMMDD_HHMMSS>.html`.
    ///
    /// The directory is created on first use. A second save within the
    /// same second gets a numeric suffix instead of overwriting.
    pub fn save(&self, content: &str, label: &str) -> Result<BackupRef> {
        fs::create_dir_all(&self.dir)?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut path = self.dir.join(format!("{}_{}.{}", label, stamp, BACKUP_EXT));
        let mut n = 1;
        while path.exists() {
            path = self
                .dir
                .join(format!("{}_{}_{}.{}", label, stamp, n, BACKUP_EXT));
            n += 1;
        }
        fs::write(&path, content)?;
        Ok(BackupRef {
            path,
            label: label.to_string(),
            created: Utc::now(),
            size: content.len() as u64,
        })
    }

    /// List snapshots, newest first by modification time.
    pub fn list(&self) -> Result<Vec<BackupRef>> {
        let mut refs = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(refs),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BACKUP_EXT) {
                continue;
            }
            let meta = entry.metadata()?;
            let mtime = meta.modified()?;
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            refs.push(BackupRef {
                label: label_of(stem),
                created: DateTime::<Utc>::from(mtime),
                size: meta.len(),
                path,
            });
        }
        refs.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.path.cmp(&a.path)));
        Ok(refs)
    }

    /// Read a snapshot back.
    pub fn restore(&self, backup: &BackupRef) -> Result<String> {
        fs::read_to_string(&backup.path).map_err(Into::into)
    }

    /// Look a snapshot up by file name.
    pub fn find(&self, name: &str) -> Result<BackupRef> {
        self.list()?
            .into_iter()
            .find(|b| b.file_name() == name)
            .ok_or_else(|| Error::NotFound(format!("backup {}", name)))
    }
}

/// Strip the `_<YYYYMMDD>_<HHMMSS>` tail (and an optional collision
/// suffix) from a file stem, leaving the semantic label.
fn label_of(stem: &str) -> String {
    let mut parts: Vec<&str> = stem.split('_').collect();
    if let Some(last) = parts.last() {
        if last.len() < 6 && !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()) {
            parts.pop();
        }
    }
    let n = parts.len();
    if n >= 2 {
        let time_ok = parts[n - 1].len() == 6 && parts[n - 1].chars().all(|c| c.is_ascii_digit());
        let date_ok = parts[n - 2].len() == 8 && parts[n - 2].chars().all(|c| c.is_ascii_digit());
        if time_ok && date_ok {
            parts.truncate(n - 2);
        }
    }
    parts.join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_creates_one_file_and_lists_it_first() {
        let tmp = TempDir::new().unwrap();
        let store = BackupStore::new(tmp.path());

        let backup = store
            .save("<table>...</table>", "before_cleanup")
            .unwrap();
        assert!(backup.path.exists());
        assert!(backup.file_name().starts_with("before_cleanup_"));
        assert!(backup.file_name().ends_with(".html"));

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].file_name(), backup.file_name());
    }

    #[test]
    fn same_second_saves_do_not_overwrite() {
        let tmp = TempDir::new().unwrap();
        let store = BackupStore::new(tmp.path());

        let first = store.save("one", "snapshot").unwrap();
        let second = store.save("two", "snapshot").unwrap();
        assert_ne!(first.path, second.path);
        assert_eq!(store.list().unwrap().len(), 2);
        assert_eq!(store.restore(&first).unwrap(), "one");
        assert_eq!(store.restore(&second).unwrap(), "two");
    }

    #[test]
    fn restore_roundtrips_content() {
        let tmp = TempDir::new().unwrap();
        let store = BackupStore::new(tmp.path());
        let content = "<table><tbody><tr><td>äöü</td></tr></tbody></table>";

        let backup = store.save(content, "analysis").unwrap();
        assert_eq!(store.restore(&backup).unwrap(), content);
    }

    #[test]
    fn find_by_name_and_missing() {
        let tmp = TempDir::new().unwrap();
        let store = BackupStore::new(tmp.path());

        let backup = store.save("content", "before_restore").unwrap();
        let found = store.find(backup.file_name()).unwrap();
        assert_eq!(found.path, backup.path);

        let err = store.find("no_such_backup.html").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn list_on_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = BackupStore::new(tmp.path().join("never_created"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn label_recovered_from_stem() {
        assert_eq!(label_of("before_cleanup_20250922_163314"), "before_cleanup");
        assert_eq!(
            label_of("before_cleanup_20250922_163314_2"),
            "before_cleanup"
        );
        assert_eq!(label_of("analysis_20240101_000000"), "analysis");
        assert_eq!(label_of("odd_name"), "odd_name");
    }
}
