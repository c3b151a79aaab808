//! Ebook handlers. EPUB is a zip of XHTML documents; a sample is drawn from
//! the beginning and the middle of the book so front matter alone never
//! dominates. Proprietary formats get a note.

use super::text::strip_markup;
use super::{truncate_chars, Extraction};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const SEGMENT_CHARS: usize = 1000;
/// Upper bound on gathered book text; enough to locate a meaningful middle.
const GATHER_LIMIT: usize = 256 * 1024;

pub fn extract_epub(path: &Path) -> Extraction {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => return Extraction::Failed(e.to_string()),
    };
    let mut archive = match zip::ZipArchive::new(file) {
        Ok(a) => a,
        Err(e) => return Extraction::Failed(format!("epub container: {}", e)),
    };

    let mut documents: Vec<String> = archive
        .file_names()
        .filter(|n| {
            let lower = n.to_lowercase();
            lower.ends_with(".xhtml") || lower.ends_with(".html") || lower.ends_with(".htm")
        })
        .map(String::from)
        .collect();
    documents.sort();
    if documents.is_empty() {
        return Extraction::Unsupported("EPUB with no readable documents".to_string());
    }

    let mut book = String::new();
    for name in &documents {
        if book.len() >= GATHER_LIMIT {
            break;
        }
        let mut member = match archive.by_name(name) {
            Ok(m) => m,
            Err(_) => continue,
        };
        let mut xml = String::new();
        if member.read_to_string(&mut xml).is_err() {
            continue;
        }
        if let Some(text) = strip_markup(&xml) {
            book.push_str(&text);
        }
    }
    if book.trim().is_empty() {
        return Extraction::Unsupported("EPUB with no extractable text".to_string());
    }

    let beginning = truncate_chars(&book, SEGMENT_CHARS);
    let total = book.chars().count();
    let mut out = format!("Beginning:\n{}\n", beginning);
    if total > SEGMENT_CHARS * 2 {
        let midpoint = total / 2;
        let middle: String = book
            .chars()
            .skip(midpoint)
            .take(SEGMENT_CHARS)
            .collect();
        out.push_str(&format!("\nMiddle:\n{}\n", middle));
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
        "Ebook: {} ({} format, text not extracted)",
        name, ext
    ))
}
