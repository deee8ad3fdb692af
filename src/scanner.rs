//! Local file scanner (C9): walk a path and run the secret matcher over
//! every file found, independent of the crawl engine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::entity::Secret;
use crate::error::FileScanError;
use crate::matcher::Handler;

/// Scan `target`: a single file is scanned directly, a directory is walked
/// recursively. Returns non-empty secret sets keyed by file path.
pub fn scan(target: &Path, matcher: &dyn Handler) -> Result<HashMap<PathBuf, Vec<Secret>>, FileScanError> {
    if !target.exists() {
        return Err(FileScanError::NotFound(target.display().to_string()));
    }

    let mut results = HashMap::new();
    if target.is_file() {
        if let Some(secrets) = scan_file(target, matcher) {
            results.insert(target.to_path_buf(), secrets);
        }
        return Ok(results);
    }

    for entry in WalkDir::new(target)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        if let Some(secrets) = scan_file(entry.path(), matcher) {
            results.insert(entry.path().to_path_buf(), secrets);
        }
    }
    Ok(results)
}

/// Scan a single path, failing if it's missing or is a directory.
pub fn scan_one(path: &Path, matcher: &dyn Handler) -> Result<Vec<Secret>, FileScanError> {
    if !path.exists() {
        return Err(FileScanError::NotFound(path.display().to_string()));
    }
    if path.is_dir() {
        return Err(FileScanError::IsDirectory(path.display().to_string()));
    }
    Ok(scan_file(path, matcher).unwrap_or_default())
}

fn scan_file(path: &Path, matcher: &dyn Handler) -> Option<Vec<Secret>> {
    let bytes = std::fs::read(path).ok()?;
    let text = String::from_utf8_lossy(&bytes);
    let secrets = matcher.handle(&text).ok()?;
    if secrets.is_empty() {
        None
    } else {
        Some(secrets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{Backend, SecretMatcher};
    use std::io::Write;

    fn matcher() -> SecretMatcher {
        let rules = vec![("Email", r"\b([a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,})\b")];
        let matcher = SecretMatcher::new(rules, Backend::Fallback).unwrap();
        matcher.init().unwrap();
        matcher
    }

    #[test]
    fn scan_one_rejects_missing_path() {
        let matcher = matcher();
        let err = scan_one(Path::new("/no/such/file-xyz"), &matcher).unwrap_err();
        assert!(matches!(err, FileScanError::NotFound(_)));
    }

    #[test]
    fn scan_one_rejects_directory() {
        let matcher = matcher();
        let err = scan_one(Path::new("."), &matcher).unwrap_err();
        assert!(matches!(err, FileScanError::IsDirectory(_)));
    }

    #[test]
    fn scan_directory_collects_only_files_with_secrets() {
        let dir = std::env::temp_dir().join(format!("scanner-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let hit = dir.join("hit.txt");
        std::fs::File::create(&hit)
            .unwrap()
            .write_all(b"contact admin@example.com now")
            .unwrap();

        let miss = dir.join("miss.txt");
        std::fs::File::create(&miss)
            .unwrap()
            .write_all(b"nothing interesting here")
            .unwrap();

        let matcher = matcher();
        let results = scan(&dir, &matcher).unwrap();

        assert!(results.contains_key(&hit));
        assert!(!results.contains_key(&miss));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
