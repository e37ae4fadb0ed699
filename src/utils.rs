//! Filesystem helpers: working directories and cached file listings.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Creates every missing directory in `dirs`, returning the ones it created.
/// Runs before logging is up, so the caller logs the result.
pub fn create_directories(dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for dir in dirs {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
            created.push(dir.clone());
        }
    }
    Ok(created)
}

/// File names in `dir` ending in `ext`, without the extension, shortest first.
pub fn file_stems_with_ext(dir: &Path, ext: &str) -> Result<Vec<String>> {
    let mut stems: Vec<String> = fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            name.strip_suffix(ext).map(str::to_string)
        })
        .filter(|stem| !stem.is_empty())
        .collect();

    stems.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    Ok(stems)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_directories_reports_new_only() {
        let root = tempfile::tempdir().unwrap();
        let existing = root.path().join("data");
        fs::create_dir(&existing).unwrap();
        let fresh = root.path().join("analysis");

        let created = create_directories(&[existing.clone(), fresh.clone()]).unwrap();
        assert_eq!(created, vec![fresh.clone()]);
        assert!(fresh.is_dir());

        assert!(create_directories(&[existing, fresh]).unwrap().is_empty());
    }

    #[test]
    fn test_file_stems_sorted_by_length() {
        let root = tempfile::tempdir().unwrap();
        for name in ["WASP-52.csv", "HAT-P-7.csv", "KELT-11b.csv", "notes.txt"] {
            fs::write(root.path().join(name), "").unwrap();
        }

        let stems = file_stems_with_ext(root.path(), ".csv").unwrap();
        assert_eq!(stems, vec!["HAT-P-7", "WASP-52", "KELT-11b"]);
    }
}
