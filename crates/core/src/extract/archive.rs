//! Archive handlers: a bounded listing of member names plus short previews
//! of the first few text members. Nothing is ever unpacked to disk.

use super::{text::decode_bytes, Extraction};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const MAX_LISTED: usize = 20;
const MAX_PREVIEWS: usize = 3;
const PREVIEW_READ_BYTES: u64 = 1024;
const PREVIEW_CHARS: usize = 200;

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv", "json", "log", "xml", "html", "toml"];

pub fn extract_zip(path: &Path) -> Extraction {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => return Extraction::Failed(e.to_string()),
    };
    let mut archive = match zip::ZipArchive::new(file) {
        Ok(a) => a,
        Err(e) => return Extraction::Failed(format!("zip: {}", e)),
    };

    let mut names: Vec<String> = archive.file_names().map(String::from).collect();
    names.sort();
    let mut out = listing(&names);

    let mut previews = 0;
    for name in &names {
        if previews >= MAX_PREVIEWS || !is_text_member(name) {
            continue;
        }
        let mut member = match archive.by_name(name) {
            Ok(m) => m,
            Err(_) => continue,
        };
        let mut buf = Vec::new();
        if member
            .by_ref()
            .take(PREVIEW_READ_BYTES)
            .read_to_end(&mut buf)
            .is_err()
        {
            continue;
        }
        push_preview(&mut out, name, &buf);
        previews += 1;
    }
    Extraction::Text(out)
}

/// Plain and gzip-compressed tarballs. Tar streams allow only one forward
/// pass, so names and previews are gathered together.
pub fn extract_tar(path: &Path) -> Extraction {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => return Extraction::Failed(e.to_string()),
    };
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    let reader: Box<dyn Read> = if ext == "gz" || ext == "tgz" {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut archive = tar::Archive::new(reader);
    let entries = match archive.entries() {
        Ok(e) => e,
        Err(e) => return Extraction::Failed(format!("tar: {}", e)),
    };

    let mut names = Vec::new();
    let mut previews: Vec<(String, Vec<u8>)> = Vec::new();
    for entry in entries {
        let mut entry = match entry {
            Ok(e) => e,
            Err(e) => return Extraction::Failed(format!("tar entry: {}", e)),
        };
        let name = match entry.path() {
            Ok(p) => p.to_string_lossy().into_owned(),
            Err(_) => continue,
        };
        if previews.len() < MAX_PREVIEWS && is_text_member(&name) {
            let mut buf = Vec::new();
            if entry
                .by_ref()
                .take(PREVIEW_READ_BYTES)
                .read_to_end(&mut buf)
                .is_ok()
                && !buf.is_empty()
            {
                previews.push((name.clone(), buf));
            }
        }
        names.push(name);
    }
    names.sort();

    let mut out = listing(&names);
    for (name, buf) in &previews {
        push_preview(&mut out, name, buf);
    }
    Extraction::Text(out)
}

pub fn unsupported_note(path: &Path) -> Extraction {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("unknown");
    Extraction::Unsupported(format!(
        "Archive: {} ({} format, contents not listed)",
        name, ext
    ))
}

fn listing(names: &[String]) -> String {
    let mut out = format!("Archive contents ({} files):\n", names.len());
    for name in names.iter().take(MAX_LISTED) {
        out.push_str(name);
        out.push('\n');
    }
    if names.len() > MAX_LISTED {
        out.push_str(&format!("... and {} more files\n", names.len() - MAX_LISTED));
    }
    out
}

fn is_text_member(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn push_preview(out: &mut String, name: &str, bytes: &[u8]) {
    let text = decode_bytes(bytes, PREVIEW_CHARS);
    if text.trim().is_empty() {
        return;
    }
    out.push_str(&format!("\nPreview of {}:\n{}\n", name, text));
}
