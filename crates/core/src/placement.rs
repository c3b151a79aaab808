use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Ensures the destination directory exists and moves the file there under
/// `file_name`, suffixing `_1`, `_2`, ... before the extension until a free
/// name is found. Returns the final path.
pub fn place(file: &Path, dest_dir: &Path, file_name: &str) -> Result<PathBuf> {
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("creating destination {:?}", dest_dir))?;
    let dest = resolve_collision(&dest_dir.join(file_name));
    move_file(file, &dest).with_context(|| format!("moving {:?} to {:?}", file, dest))?;
    Ok(dest)
}

pub fn resolve_collision(dest: &Path) -> PathBuf {
    if !dest.exists() {
        return dest.to_path_buf();
    }
    let stem = dest
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .to_string();
    let ext = dest
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut counter = 1;
    loop {
        let name = if ext.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, ext)
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Atomic rename within a volume; cross-device moves fall back to
/// copy-then-delete.
pub fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn place_creates_directory_and_moves() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("in.txt");
        fs::write(&src, b"hello").unwrap();
        let dest_dir = dir.path().join("organized").join("other");

        let placed = place(&src, &dest_dir, "report.txt").unwrap();
        assert_eq!(placed, dest_dir.join("report.txt"));
        assert!(!src.exists());
        assert_eq!(fs::read(&placed).unwrap(), b"hello");
    }

    #[test]
    fn collisions_get_numeric_suffixes() {
        let dir = tempdir().unwrap();
        let dest_dir = dir.path().join("cat");
        fs::create_dir_all(&dest_dir).unwrap();

        for expected in ["doc.txt", "doc_1.txt", "doc_2.txt"] {
            let src = dir.path().join("in.txt");
            fs::write(&src, b"x").unwrap();
            let placed = place(&src, &dest_dir, "doc.txt").unwrap();
            assert_eq!(placed.file_name().unwrap().to_str().unwrap(), expected);
        }
        assert!(dest_dir.join("doc.txt").exists());
        assert!(dest_dir.join("doc_1.txt").exists());
        assert!(dest_dir.join("doc_2.txt").exists());
    }

    #[test]
    fn suffix_goes_before_extension_and_handles_no_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes"), b"x").unwrap();
        let resolved = resolve_collision(&dir.path().join("notes"));
        assert_eq!(resolved.file_name().unwrap().to_str().unwrap(), "notes_1");
    }
}
