//! Image handler: header-level metadata plus OCR when tesseract is on the
//! host.

use super::{Extraction, ToolSupport};
use std::path::Path;
use std::process::Command;

pub fn extract(path: &Path, ocr_languages: &str, tools: ToolSupport) -> Extraction {
    let reader = match image::io::Reader::open(path) {
        Ok(r) => r,
        Err(e) => return Extraction::Failed(e.to_string()),
    };
    let reader = match reader.with_guessed_format() {
        Ok(r) => r,
        Err(e) => return Extraction::Failed(e.to_string()),
    };
    let format = reader
        .format()
        .map(|f| format!("{:?}", f))
        .unwrap_or_else(|| "unknown".to_string());

    let mut out = String::from("Image Metadata:\n");
    out.push_str(&format!("Format: {}\n", format));
    // Dimensions come from the header only; the pixels are never decoded.
    match reader.into_dimensions() {
        Ok((w, h)) => out.push_str(&format!("Dimensions: {}x{}\n", w, h)),
        Err(e) => return Extraction::Failed(format!("image header: {}", e)),
    }

    if tools.tesseract {
        match ocr(path, ocr_languages) {
            Some(text) => {
                out.push_str("OCR Text:\n");
                out.push_str(&text);
            }
            None => out.push_str("OCR Text: (none detected)\n"),
        }
    } else {
        out.push_str("OCR: not available on this host\n");
    }
    Extraction::Text(out)
}

fn ocr(path: &Path, languages: &str) -> Option<String> {
    let out = Command::new("tesseract")
        .arg(path)
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
