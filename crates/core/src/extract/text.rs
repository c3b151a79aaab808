use super::{truncate_chars, Extraction};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs;
use std::io::Read;
use std::path::Path;

/// Reads up to a bounded prefix of the file and decodes it. Decode ladder:
/// strict UTF-8, then latin-1 unless the bytes look binary, then a hex
/// preview as the last resort.
pub fn extract_plain(path: &Path, sample_length: usize) -> Extraction {
    let bytes = match read_prefix(path, sample_length * 4) {
        Ok(b) => b,
        Err(e) => return Extraction::Failed(e.to_string()),
    };
    Extraction::Text(decode_bytes(&bytes, sample_length))
}

pub fn extract_json(path: &Path, sample_length: usize) -> Extraction {
    let raw = match fs::read(path) {
        Ok(b) => b,
        Err(e) => return Extraction::Failed(e.to_string()),
    };
    match serde_json::from_slice::<serde_json::Value>(&raw) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(pretty) => Extraction::Text(pretty),
            Err(e) => Extraction::Failed(e.to_string()),
        },
        // Not valid JSON after all; fall back to plain text.
        Err(_) => extract_plain(path, sample_length),
    }
}

/// XML/HTML: keep the character data, drop the tags. Falls back to a plain
/// read when the document is not well-formed.
pub fn extract_markup(path: &Path, sample_length: usize) -> Extraction {
    let raw = match fs::read(path) {
        Ok(b) => b,
        Err(e) => return Extraction::Failed(e.to_string()),
    };
    let source = decode_bytes(&raw, usize::MAX);
    match strip_markup(&source) {
        Some(text) if !text.trim().is_empty() => Extraction::Text(text),
        _ => extract_plain(path, sample_length),
    }
}

pub fn extract_csv(path: &Path, sample_length: usize) -> Extraction {
    let raw = match fs::read(path) {
        Ok(b) => b,
        Err(e) => return Extraction::Failed(e.to_string()),
    };
    let source = decode_bytes(&raw, sample_length * 4);
    let mut lines = source.lines();
    let headers = lines.next().unwrap_or_default();

    let mut out = format!("Headers: {}\n", headers.replace(',', ", "));
    out.push_str("Data Sample:\n");
    for line in lines.take(10) {
        out.push_str(&line.split(',').collect::<Vec<_>>().join(" | "));
        out.push('\n');
    }
    Extraction::Text(out)
}

/// Collects character data from an XML/HTML document, separating elements
/// with newlines. Returns None when parsing goes nowhere.
pub(crate) fn strip_markup(source: &str) -> Option<String> {
    let mut reader = Reader::from_reader(source.as_bytes());
    let mut buf = Vec::new();
    let mut out = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(t)) => {
                if let Ok(text) = t.unescape() {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        out.push_str(trimmed);
                        out.push('\n');
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
        buf.clear();
    }
    Some(out)
}

pub(crate) fn read_prefix(path: &Path, max_bytes: usize) -> std::io::Result<Vec<u8>> {
    let mut file = fs::File::open(path)?;
    let mut buf = Vec::new();
    file.by_ref().take(max_bytes as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// UTF-8 first; latin-1 for non-UTF-8 text; hex preview for bytes that look
/// binary (embedded NULs). A bounded prefix read can cut the last multibyte
/// character in half; everything before the cut is still valid UTF-8 and is
/// decoded as such rather than falling through to latin-1.
pub(crate) fn decode_bytes(bytes: &[u8], cap: usize) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => truncate_chars(s, cap),
        Err(e) if e.error_len().is_none() && e.valid_up_to() > 0 => {
            truncate_chars(&String::from_utf8_lossy(&bytes[..e.valid_up_to()]), cap)
        }
        Err(_) => {
            if bytes.contains(&0) {
                let hex: String = bytes.iter().take(50).map(|b| format!("{:02x}", b)).collect();
                format!("Binary data: {}...", hex)
            } else {
                let latin: String = bytes.iter().map(|&b| b as char).collect();
                truncate_chars(&latin, cap)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn json_is_pretty_printed() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("data.json");
        fs::write(&file, r#"{"invoice":12345,"total":100}"#).unwrap();
        match extract_json(&file, 1000) {
            Extraction::Text(t) => {
                assert!(t.contains("\"invoice\": 12345"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn invalid_json_falls_back_to_plain() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("data.json");
        fs::write(&file, "not { json").unwrap();
        assert_eq!(
            extract_json(&file, 1000),
            Extraction::Text("not { json".to_string())
        );
    }

    #[test]
    fn markup_tags_are_stripped() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("page.html");
        fs::write(&file, "<html><body><h1>Invoice</h1><p>Total due</p></body></html>").unwrap();
        match extract_markup(&file, 1000) {
            Extraction::Text(t) => {
                assert!(t.contains("Invoice"));
                assert!(t.contains("Total due"));
                assert!(!t.contains('<'));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn csv_reports_headers_and_rows() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("table.csv");
        fs::write(&file, "name,amount\nwidget,10\ngadget,20\n").unwrap();
        match extract_csv(&file, 1000) {
            Extraction::Text(t) => {
                assert!(t.starts_with("Headers: name, amount"));
                assert!(t.contains("widget | 10"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn latin1_bytes_decode_instead_of_failing() {
        // 0xE9 is 'é' in latin-1 and invalid mid-stream as UTF-8.
        let decoded = decode_bytes(&[b'c', b'a', b'f', 0xE9, b'!'], 100);
        assert_eq!(decoded, "café!");
    }

    #[test]
    fn incomplete_trailing_utf8_sequence_is_dropped() {
        // "café" in UTF-8, cut after the first byte of 'é'.
        let decoded = decode_bytes(&[b'c', b'a', b'f', 0xC3], 100);
        assert_eq!(decoded, "caf");
    }

    #[test]
    fn utf8_file_cut_mid_character_stays_utf8() {
        // '€' is three bytes, so the bounded prefix read is guaranteed to
        // split one; the sample must still decode as euros, not mojibake.
        let dir = tempdir().unwrap();
        let file = dir.path().join("euros.txt");
        fs::write(&file, "€".repeat(2000)).unwrap();
        match extract_plain(&file, 1000) {
            Extraction::Text(t) => {
                assert!(!t.is_empty());
                assert!(t.chars().all(|c| c == '€'));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn binary_bytes_become_hex_preview() {
        let decoded = decode_bytes(&[0x00, 0xFF, 0x00, 0x10], 100);
        assert!(decoded.starts_with("Binary data: 00ff"));
    }
}
