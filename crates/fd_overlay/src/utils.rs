//! Path normalization, hashing and small filesystem helpers.
//!
//! Relative asset paths are always stored with forward slashes so that a
//! snapshot written on one platform reads the same on another, and so that two
//! mods providing the same file compare equal regardless of how the directory
//! walk spelled the path.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use xxhash_rust::xxh3::{xxh3_64, Xxh3};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Normalize a path relative to some root into the canonical `a/b/c.ext` form.
///
/// Returns `None` when a component is not valid UTF-8 or when the path tries to
/// escape its root (`..`, absolute components).
pub fn normalize_rel_path(rel_path: &Path) -> Option<Utf8PathBuf> {
    let mut parts = Vec::new();
    for component in rel_path.components() {
        match component {
            std::path::Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            std::path::Component::CurDir => continue,
            _ => return None,
        }
    }

    if parts.is_empty() {
        return None;
    }

    Some(Utf8PathBuf::from(parts.join("/")))
}

/// Resolve `path` to its canonical absolute form.
///
/// Symlinks, `.` and `..` are resolved, so every spelling of one directory
/// maps to the same path. Windows verbatim prefixes (`\\?\C:\...`) are
/// stripped back to a plain drive path. Fails if `path` does not exist or the
/// result is not valid UTF-8.
pub fn canonicalize_utf8(path: &Utf8Path) -> io::Result<Utf8PathBuf> {
    let canonical = fs::canonicalize(path.as_std_path())?;
    let canonical = Utf8PathBuf::from_path_buf(canonical).map_err(|p| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} is not valid UTF-8", p.display()),
        )
    })?;

    match canonical.as_str().strip_prefix(r"\\?\") {
        Some(rest) if !rest.starts_with("UNC\\") => Ok(Utf8PathBuf::from(rest)),
        _ => Ok(canonical),
    }
}

/// Compute the directory name used to key a snapshot store by its asset root.
///
/// The key is the xxHash3 of the root path with separators normalized. Callers
/// pass the canonical root (see [`canonicalize_utf8`]), so the same
/// installation always maps to the same store.
pub fn store_key(asset_root: &Utf8Path) -> String {
    let normalized = asset_root.as_str().replace('\\', "/");
    let trimmed = normalized.trim_end_matches('/');
    format!("{:016x}", xxh3_64(trimmed.as_bytes()))
}

/// Copy `src` to `dst`, returning the number of bytes copied and their xxHash3.
///
/// `dst` is created or truncated. The data is flushed to disk before returning.
pub fn copy_hashed(src: &Path, dst: &Path) -> io::Result<(u64, u64)> {
    let mut reader = File::open(src)?;
    let mut writer = File::create(dst)?;
    let mut hasher = Xxh3::new();
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut size = 0u64;

    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        writer.write_all(&buf[..read])?;
        size += read as u64;
    }

    writer.sync_all()?;
    Ok((size, hasher.digest()))
}

/// Hash a file's content with xxHash3 without loading it fully into memory.
pub fn hash_file(path: &Path) -> io::Result<(u64, u64)> {
    let mut reader = File::open(path)?;
    let mut hasher = Xxh3::new();
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut size = 0u64;

    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        size += read as u64;
    }

    Ok((size, hasher.digest()))
}

/// Write `contents` to `path` through a temporary sibling and a rename, so a
/// crash leaves either the old or the new file, never a truncated one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}

/// Remove `dir` and then each empty parent up to (but excluding) `stop_at`.
///
/// Stops silently at the first directory that is not empty or cannot be removed.
pub fn prune_empty_dirs(dir: &Path, stop_at: &Path) {
    let mut current = Some(dir);
    while let Some(path) = current {
        if path == stop_at || !path.starts_with(stop_at) {
            break;
        }
        if fs::remove_dir(path).is_err() {
            break;
        }
        current = path.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_canonicalize_resolves_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join("game/assets")).unwrap();

        let direct = canonicalize_utf8(&root.join("game/assets")).unwrap();
        let aliased = canonicalize_utf8(&root.join("game/../game/./assets")).unwrap();

        assert_eq!(direct, aliased);
        assert_eq!(store_key(&direct), store_key(&aliased));
        assert!(canonicalize_utf8(&root.join("missing")).is_err());
    }

    #[test]
    fn test_normalize_nested_path() {
        let path = PathBuf::from("songs").join("bopeebo").join("Inst.ogg");
        let normalized = normalize_rel_path(&path).unwrap();
        assert_eq!(normalized, Utf8PathBuf::from("songs/bopeebo/Inst.ogg"));
    }

    #[test]
    fn test_normalize_skips_cur_dir() {
        let path = PathBuf::from("./data/week1.json");
        let normalized = normalize_rel_path(&path).unwrap();
        assert_eq!(normalized, Utf8PathBuf::from("data/week1.json"));
    }

    #[test]
    fn test_normalize_rejects_parent_dir() {
        assert!(normalize_rel_path(Path::new("../outside.txt")).is_none());
        assert!(normalize_rel_path(Path::new("data/../../x")).is_none());
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(normalize_rel_path(Path::new("")).is_none());
    }

    #[test]
    fn test_store_key_ignores_trailing_separator() {
        assert_eq!(
            store_key(Utf8Path::new("/games/fnf/assets")),
            store_key(Utf8Path::new("/games/fnf/assets/"))
        );
    }

    #[test]
    fn test_store_key_differs_per_root() {
        assert_ne!(
            store_key(Utf8Path::new("/games/fnf/assets")),
            store_key(Utf8Path::new("/games/fnf-2/assets"))
        );
        assert_eq!(store_key(Utf8Path::new("/x")).len(), 16);
    }

    #[test]
    fn test_copy_hashed_matches_hash_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");
        fs::write(&src, b"freaky on a friday night").unwrap();

        let copied = copy_hashed(&src, &dst).unwrap();
        assert_eq!(copied.0, 24);
        assert_eq!(fs::read(&dst).unwrap(), b"freaky on a friday night");
        assert_eq!(hash_file(&dst).unwrap(), copied);
        assert_eq!(copied.1, xxh3_64(b"freaky on a friday night"));
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_prune_empty_dirs_stops_at_root_and_non_empty() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::write(root.join("a/keep.txt"), b"x").unwrap();

        prune_empty_dirs(&root.join("a/b/c"), root);

        assert!(!root.join("a/b").exists());
        assert!(root.join("a").exists());
        assert!(root.exists());
    }
}
