use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Move a file, falling back to copy-then-delete when a plain rename is refused
/// (for example across volumes).
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    let rename_err = match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    debug!(
        "rename {} -> {} failed ({}), trying copy",
        from.display(),
        to.display(),
        rename_err
    );

    if let Err(e) = fs::copy(from, to) {
        debug!("copy fallback failed: {}", e);
        // A failed copy may leave a truncated destination behind.
        if from.exists() {
            let _ = fs::remove_file(to);
        }
        return Err(rename_err);
    }
    if let Err(e) = fs::remove_file(from) {
        // Source is still in place; drop the copy so only one file exists.
        let _ = fs::remove_file(to);
        return Err(e);
    }
    Ok(())
}

/// Delete `path` if something is there. Returns whether a file was removed.
pub fn remove_existing(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path)
}

pub fn dir_is_empty(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

/// Find a file in `dir` whose name equals `name`, ignoring case. An exact match wins.
pub fn find_file_named(dir: &Path, name: &str) -> io::Result<Option<PathBuf>> {
    let exact = dir.join(name);
    if exact.is_file() {
        return Ok(Some(exact));
    }

    let wanted = name.to_lowercase();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().to_lowercase() == wanted {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn move_file_relocates_contents() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a.exe");
        let to = dir.path().join("sub").join("a.exe");
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(&from, b"payload").unwrap();

        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"payload");
    }

    #[test]
    fn move_file_missing_source_is_an_error() {
        let dir = TempDir::new().unwrap();
        let res = move_file(&dir.path().join("nope"), &dir.path().join("dest"));
        assert!(res.is_err());
        assert!(!dir.path().join("dest").exists());
    }

    #[test]
    fn failed_move_leaves_source_and_no_stray_file() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a.exe");
        fs::write(&from, b"payload").unwrap();
        let to = dir.path().join("missing").join("a.exe");

        assert!(move_file(&from, &to).is_err());
        assert_eq!(fs::read(&from).unwrap(), b"payload");
        assert!(!to.exists());
    }

    #[test]
    fn remove_existing_tolerates_absence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x");
        assert!(!remove_existing(&path).unwrap());
        fs::write(&path, b"").unwrap();
        assert!(remove_existing(&path).unwrap());
    }

    #[test]
    fn find_file_named_ignores_case_and_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("other.exe")).unwrap();
        fs::write(dir.path().join("8021X.EXE"), b"").unwrap();

        let found = find_file_named(dir.path(), "8021x.exe").unwrap().unwrap();
        assert_eq!(
            found.file_name().unwrap().to_string_lossy().to_lowercase(),
            "8021x.exe"
        );
        assert!(find_file_named(dir.path(), "other.exe").unwrap().is_none());
    }

    #[test]
    fn ensure_dir_and_emptiness() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(dir_is_empty(&nested).unwrap());
        fs::write(nested.join("f"), b"").unwrap();
        assert!(!dir_is_empty(&nested).unwrap());
    }
}
