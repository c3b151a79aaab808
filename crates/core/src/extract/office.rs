//! Office document handlers. Modern Word files are zip containers holding
//! XML; spreadsheets go through calamine. Legacy binary formats only get a
//! descriptive note.

use super::text::strip_markup;
use super::Extraction;
use calamine::{open_workbook_auto, Reader};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const MAX_SHEETS: usize = 3;
const MAX_ROWS_PER_SHEET: usize = 5;

pub fn extract_docx(path: &Path) -> Extraction {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => return Extraction::Failed(e.to_string()),
    };
    let mut archive = match zip::ZipArchive::new(file) {
        Ok(a) => a,
        Err(e) => return Extraction::Failed(format!("docx container: {}", e)),
    };
    let mut document = match archive.by_name("word/document.xml") {
        Ok(d) => d,
        Err(e) => return Extraction::Failed(format!("word/document.xml: {}", e)),
    };
    let mut xml = String::new();
    if let Err(e) = document.read_to_string(&mut xml) {
        return Extraction::Failed(e.to_string());
    }

    match strip_markup(&xml) {
        Some(text) if !text.trim().is_empty() => Extraction::Text(text),
        _ => Extraction::Unsupported("Word document with no extractable text".to_string()),
    }
}

pub fn extract_spreadsheet(path: &Path, sample_length: usize) -> Extraction {
    let mut workbook = match open_workbook_auto(path) {
        Ok(w) => w,
        Err(e) => return Extraction::Failed(format!("spreadsheet: {}", e)),
    };
    let sheet_names = workbook.sheet_names().to_owned();
    let mut out = format!("Sheets: {}\n", sheet_names.join(", "));

    for name in sheet_names.iter().take(MAX_SHEETS) {
        let range = match workbook.worksheet_range(name) {
            Some(Ok(r)) => r,
            _ => continue,
        };
        out.push_str(&format!("\nSheet: {}\n", name));
        for row in range.rows().take(MAX_ROWS_PER_SHEET) {
            let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            out.push_str(&cells.join(" | "));
            out.push('\n');
        }
        if out.chars().count() >= sample_length {
            break;
        }
    }
    Extraction::Text(out)
}

/// Legacy binary office formats (.doc, .ppt) are not parsed; the note keeps
/// the file classifiable by name and type.
pub fn legacy_note(path: &Path) -> Extraction {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("unknown");
    Extraction::Unsupported(format!(
        "Office document: {} (legacy {} format, text not extracted)",
        name, ext
    ))
}
