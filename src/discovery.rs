// src/discovery.rs
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::error::{NetsieveError, Result};
use crate::types::ExecutableCandidate;

/// Lazily walks `root` for `.exe` files (case-insensitive).
///
/// `root` is expected to come from [`resolve_root`]. Entries that cannot be
/// read (permission denied, broken links, loops) are logged and skipped.
/// Yield order follows the filesystem.
pub fn walk(root: &Path, follow_links: bool) -> impl Iterator<Item = ExecutableCandidate> {
    WalkDir::new(root)
        .follow_links(follow_links)
        .into_iter()
        .filter_map(|item| match item {
            Ok(entry) => Some(entry),
            Err(e) => {
                let path = e.path().map_or_else(String::new, |p| p.display().to_string());
                warn!(path = %path, "skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_exe_name(entry.file_name()))
        .map(|entry| ExecutableCandidate::new(entry.path()))
}

/// Canonicalizes `root` and checks that it is a directory.
///
/// # Errors
/// Returns [`NetsieveError::Path`] on a missing root or a non-directory.
pub fn resolve_root(root: &Path) -> Result<PathBuf> {
    let path_error = |reason: String| NetsieveError::Path {
        path: root.to_path_buf(),
        reason,
    };
    let meta = fs::metadata(root).map_err(|e| path_error(e.to_string()))?;
    if !meta.is_dir() {
        return Err(path_error("not a directory".into()));
    }
    root.canonicalize().map_err(|e| path_error(e.to_string()))
}

fn is_exe_name(name: &OsStr) -> bool {
    name.to_string_lossy().to_ascii_lowercase().ends_with(".exe")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    #[test]
    fn test_exe_name_match() {
        assert!(is_exe_name(OsStr::new("game.exe")));
        assert!(is_exe_name(OsStr::new("SETUP.EXE")));
        assert!(is_exe_name(OsStr::new("Mixed.ExE")));
        assert!(!is_exe_name(OsStr::new("game.exe.bak")));
        assert!(!is_exe_name(OsStr::new("readme.txt")));
        assert!(!is_exe_name(OsStr::new("exe")));
    }

    #[test]
    fn test_walk_finds_nested_executables() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("a/b"))?;
        fs::write(dir.path().join("top.exe"), b"x")?;
        fs::write(dir.path().join("a/b/deep.EXE"), b"x")?;
        fs::write(dir.path().join("a/notes.txt"), b"x")?;
        fs::create_dir_all(dir.path().join("folder.exe"))?;

        let found: Vec<ExecutableCandidate> = walk(&resolve_root(dir.path())?, false).collect();
        let names: BTreeSet<&str> = found.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(names, BTreeSet::from(["deep.EXE", "top.exe"]));
        assert!(found.iter().all(|c| c.path.is_absolute()));
        Ok(())
    }

    #[test]
    fn test_missing_root_is_path_error() {
        let err = resolve_root(Path::new("/no/such/root/for/netsieve")).err();
        assert!(matches!(err, Some(NetsieveError::Path { .. })));
    }

    #[test]
    fn test_file_root_is_path_error() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let file = dir.path().join("single.exe");
        fs::write(&file, b"x")?;
        let err = resolve_root(&file).err();
        assert!(matches!(err, Some(NetsieveError::Path { .. })));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_is_skipped() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new()?;
        let locked = dir.path().join("locked");
        fs::create_dir_all(&locked)?;
        fs::write(locked.join("hidden.exe"), b"x")?;
        fs::write(dir.path().join("visible.exe"), b"x")?;
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;

        let names: BTreeSet<String> = walk(dir.path(), false).map(|c| c.filename).collect();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;

        assert!(names.contains("visible.exe"));
        Ok(())
    }
}
