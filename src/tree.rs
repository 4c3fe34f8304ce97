use std::{fs, path::Path};

use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::path::RelPath;

/// names starting with these are private: never built, served or indexed
pub const DEFAULT_IGNORE: &[&str] = &[".", "_"];

fn is_ignored(entry: &DirEntry, ignore_prefixes: &[&str]) -> bool {
    // the root itself is never ignored, even when called `_something`
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| ignore_prefixes.iter().any(|p| name.starts_with(p)))
            .unwrap_or(true)
}

/// symlinks are only kept when they point at a file inside the root
fn is_inside(entry: &DirEntry, canonical_root: &Path) -> bool {
    match fs::canonicalize(entry.path()) {
        Ok(target) => target.starts_with(canonical_root) && target.is_file(),
        Err(_) => false,
    }
}

/// every file under `root`, as root relative paths sorted by their full path
pub fn walk<T: AsRef<Path>>(root: T, ignore_prefixes: &[&str]) -> Result<Vec<RelPath>> {
    let root = root.as_ref();
    let canonical_root = fs::canonicalize(root).map_err(Error::with_path(root))?;
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_ignored(e, ignore_prefixes));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                // a file vanishing mid-walk isn't worth stopping for
                log::debug!("Skipping unreadable entry: {err}");
                continue;
            }
        };
        let ty = entry.file_type();
        if ty.is_dir() || (ty.is_symlink() && !is_inside(&entry, &canonical_root)) {
            continue;
        }
        match RelPath::from_root(root, entry.path()) {
            Ok(path) => files.push(path),
            Err(err) => log::warn!("Skipping `{}`: {err}", entry.path().display()),
        }
    }
    files.sort();
    Ok(files)
}

/// recursively copy a directory, used for project templates
pub fn copy_dir(from: impl AsRef<Path>, to: impl AsRef<Path>) -> std::io::Result<()> {
    fs::create_dir_all(&to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }
        let ty = entry.file_type()?;
        if ty.is_dir() {
            copy_dir(entry.path(), to.as_ref().join(entry.file_name()))?;
        } else {
            fs::copy(entry.path(), to.as_ref().join(entry.file_name()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    fn names(paths: &[RelPath]) -> Vec<&str> {
        paths.iter().map(RelPath::as_str).collect()
    }

    #[test]
    fn sorted_by_full_path() {
        let dir = tempfile::tempdir().unwrap();
        for rel in ["b/zz.html", "e.html", "a.html", "b/aa.html", "a/x.html", "b.html"] {
            touch(dir.path(), rel);
        }
        let files = walk(dir.path(), DEFAULT_IGNORE).unwrap();
        assert_eq!(
            names(&files),
            ["a.html", "a/x.html", "b.html", "b/aa.html", "b/zz.html", "e.html"]
        );
    }

    #[test]
    fn hidden_and_private_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        for rel in [
            ".DS_Store",
            "_layout.html",
            "_partials/nav.html",
            ".git/config",
            "sub/.hidden",
            "sub/page.html",
        ] {
            touch(dir.path(), rel);
        }
        let files = walk(dir.path(), DEFAULT_IGNORE).unwrap();
        assert_eq!(names(&files), ["sub/page.html"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_outside_the_root_are_skipped() {
        let outside = tempfile::tempdir().unwrap();
        touch(outside.path(), "secret.txt");
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "real.txt");
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("leak.txt"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("alias.txt"))
            .unwrap();
        let files = walk(dir.path(), DEFAULT_IGNORE).unwrap();
        assert_eq!(names(&files), ["alias.txt", "real.txt"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn odd_names_are_kept_or_skipped_alone() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        for rel in ["a\\..\\b.txt", "a\\b.txt", "index.html"] {
            touch(dir.path(), rel);
        }
        let not_unicode = std::ffi::OsStr::from_bytes(b"bad\xff.txt");
        fs::write(dir.path().join(not_unicode), "x").unwrap();

        let files = walk(dir.path(), DEFAULT_IGNORE).unwrap();
        assert_eq!(names(&files), ["a\\..\\b.txt", "a\\b.txt", "index.html"]);
        assert!(files[1].to_path(dir.path()).is_file());
    }

    #[test]
    fn copy_dir_skips_git() {
        let from = tempfile::tempdir().unwrap();
        touch(from.path(), "source/index.html");
        touch(from.path(), ".git/HEAD");
        let to = tempfile::tempdir().unwrap();
        copy_dir(from.path(), to.path().join("new")).unwrap();
        assert!(to.path().join("new/source/index.html").is_file());
        assert!(!to.path().join("new/.git").exists());
    }
}
