//! PDF handler: embedded text from the first few pages, with an OCR pass
//! for documents that look scanned.

use super::{Extraction, ToolSupport};
use lopdf::{Document, Object};
use std::path::Path;
use std::process::Command;
use tracing::debug;

const MAX_PAGES: usize = 5;
/// Below this much embedded text the document is treated as scanned.
const SCANNED_TEXT_FLOOR: usize = 100;

pub fn extract(path: &Path, ocr_languages: &str, tools: ToolSupport) -> Extraction {
    let doc = match Document::load(path) {
        Ok(d) => d,
        Err(e) => return Extraction::Failed(format!("pdf load: {}", e)),
    };

    let mut text = String::new();
    if let Some(meta) = metadata_block(&doc) {
        text.push_str("PDF Metadata:\n");
        text.push_str(&meta);
        text.push('\n');
    }

    let pages: Vec<u32> = doc.get_pages().keys().copied().take(MAX_PAGES).collect();
    text.push_str("Content:\n");
    match doc.extract_text(&pages) {
        Ok(body) => text.push_str(&body),
        Err(e) => debug!(file = %path.display(), "pdf text extraction: {}", e),
    }

    if text.trim().len() < SCANNED_TEXT_FLOOR && tools.pdftoppm && tools.tesseract {
        debug!(file = %path.display(), "pdf has little embedded text, attempting OCR");
        if let Some(ocr) = ocr_first_page(path, ocr_languages) {
            text.push_str("\nOCR Results:\n");
            text.push_str(&ocr);
        }
    }

    if text.trim().is_empty() {
        return Extraction::Unsupported("PDF document with no extractable text".to_string());
    }
    Extraction::Text(text)
}

fn metadata_block(doc: &Document) -> Option<String> {
    let info_id = doc.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = doc.get_dictionary(info_id).ok()?;
    let mut out = String::new();
    for (key, value) in info.iter() {
        if let Object::String(bytes, _) = value {
            let key = String::from_utf8_lossy(key);
            let value = String::from_utf8_lossy(bytes);
            if !value.trim().is_empty() {
                out.push_str(&format!("{}: {}\n", key, value.trim()));
            }
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Renders page 1 to a raster image with pdftoppm, then OCRs it. Both tools
/// were capability-checked at startup; any runtime failure just drops the
/// OCR appendix.
fn ocr_first_page(path: &Path, languages: &str) -> Option<String> {
    let workdir = tempfile::tempdir().ok()?;
    let prefix = workdir.path().join("page");
    let status = Command::new("pdftoppm")
        .args(["-png", "-singlefile", "-f", "1", "-l", "1"])
        .arg(path)
        .arg(&prefix)
        .output()
        .ok()?;
    if !status.status.success() {
        return None;
    }
    let image = prefix.with_extension("png");
    let out = Command::new("tesseract")
        .arg(&image)
        .arg("stdout")
        .args(["-l", languages])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&out.stdout).into_owned();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
