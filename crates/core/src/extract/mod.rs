//! Content extraction: per-format handlers behind one dispatcher. Every
//! outcome, including a failed extraction, maps to a bounded
//! [`ContentSample`] so the file is still classified and placed.

pub mod archive;
pub mod ebook;
pub mod image;
pub mod media;
pub mod office;
pub mod pdf;
pub mod text;

use crate::config::AppConfig;
use crate::models::ContentSample;
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;
use storage::ContentCache;
use tracing::{debug, warn};

/// Outcome of one format handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Extracted text, possibly partial.
    Text(String),
    /// The format is recognized but not extractable; the note still
    /// describes the file well enough to classify it.
    Unsupported(String),
    /// The handler hit a real error. Logged; mapped to a placeholder.
    Failed(String),
}

/// Host-tool capabilities, probed once at startup rather than per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolSupport {
    pub tesseract: bool,
    pub pdftoppm: bool,
    pub ffprobe: bool,
    pub symlink: bool,
}

impl ToolSupport {
    pub fn probe() -> Self {
        Self {
            tesseract: tool_available("tesseract"),
            pdftoppm: tool_available("pdftoppm"),
            ffprobe: tool_available("ffprobe"),
            symlink: cfg!(unix),
        }
    }
}

fn tool_available(name: &str) -> bool {
    Command::new(name)
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// File families the dispatcher routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    PlainText,
    Json,
    Markup,
    Csv,
    Pdf,
    WordModern,
    Spreadsheet,
    OfficeLegacy,
    Image,
    Audio,
    Video,
    ZipArchive,
    TarArchive,
    OtherArchive,
    Epub,
    OtherEbook,
    Other,
}

pub struct Extractor {
    sample_length: usize,
    ocr_languages: String,
    enable_audio: bool,
    enable_video: bool,
    enable_archives: bool,
    tools: ToolSupport,
}

impl Extractor {
    pub fn new(cfg: &AppConfig, tools: ToolSupport) -> Self {
        Self {
            sample_length: cfg.sample_length,
            ocr_languages: cfg.extraction.ocr_languages.join("+"),
            enable_audio: cfg.extraction.enable_audio_analysis,
            enable_video: cfg.extraction.enable_video_analysis,
            enable_archives: cfg.extraction.enable_archive_inspection,
            tools,
        }
    }

    pub fn tools(&self) -> ToolSupport {
        self.tools
    }

    /// Produces a bounded text sample for the file, consulting the content
    /// cache first. Never returns an error: failures become descriptive
    /// placeholder samples.
    pub fn extract(
        &self,
        path: &Path,
        hash: &str,
        cache: &Mutex<ContentCache>,
        cache_enabled: bool,
    ) -> ContentSample {
        if cache_enabled {
            let cache = cache.lock().expect("content cache mutex poisoned");
            if let Some(text) = cache.get(hash) {
                debug!(file = %path.display(), "content cache hit");
                return ContentSample {
                    hash: hash.to_string(),
                    text: text.clone(),
                };
            }
        }

        let (kind, mime) = self.detect_kind(path);
        let text = match self.dispatch(path, kind) {
            Extraction::Text(t) => truncate_chars(&t, self.sample_length),
            Extraction::Unsupported(note) => truncate_chars(&note, self.sample_length),
            Extraction::Failed(reason) => {
                warn!(file = %path.display(), mime = %mime, "extraction failed: {}", reason);
                placeholder(path, &mime, &reason)
            }
        };

        if cache_enabled {
            let mut cache = cache.lock().expect("content cache mutex poisoned");
            if let Err(e) = cache.insert(hash.to_string(), text.clone()) {
                warn!(error = %e, "failed to persist content cache");
            }
        }

        ContentSample {
            hash: hash.to_string(),
            text,
        }
    }

    fn dispatch(&self, path: &Path, kind: FileKind) -> Extraction {
        match kind {
            FileKind::PlainText => text::extract_plain(path, self.sample_length),
            FileKind::Json => text::extract_json(path, self.sample_length),
            FileKind::Markup => text::extract_markup(path, self.sample_length),
            FileKind::Csv => text::extract_csv(path, self.sample_length),
            FileKind::Pdf => pdf::extract(path, &self.ocr_languages, self.tools),
            FileKind::WordModern => office::extract_docx(path),
            FileKind::Spreadsheet => office::extract_spreadsheet(path, self.sample_length),
            FileKind::OfficeLegacy => office::legacy_note(path),
            FileKind::Image => image::extract(path, &self.ocr_languages, self.tools),
            FileKind::Audio => media::extract(path, "Audio", self.tools),
            FileKind::Video => media::extract(path, "Video", self.tools),
            FileKind::ZipArchive => archive::extract_zip(path),
            FileKind::TarArchive => archive::extract_tar(path),
            FileKind::OtherArchive => archive::unsupported_note(path),
            FileKind::Epub => ebook::extract_epub(path),
            FileKind::OtherEbook => ebook::unsupported_note(path),
            FileKind::Other => text::extract_plain(path, self.sample_length),
        }
    }

    fn detect_kind(&self, path: &Path) -> (FileKind, String) {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        let mime = infer::get_from_path(path)
            .ok()
            .flatten()
            .map(|t| t.mime_type().to_string())
            .unwrap_or_default();

        let kind = match ext.as_str() {
            "json" => FileKind::Json,
            "xml" | "html" | "htm" => FileKind::Markup,
            "csv" => FileKind::Csv,
            "txt" | "md" | "log" | "css" | "js" | "rs" | "py" | "toml" | "yaml" | "yml" => {
                FileKind::PlainText
            }
            "pdf" => FileKind::Pdf,
            "docx" => FileKind::WordModern,
            "xlsx" | "xls" | "ods" => FileKind::Spreadsheet,
            "doc" | "ppt" | "pptx" => FileKind::OfficeLegacy,
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tiff" | "webp" => FileKind::Image,
            "mp3" | "wav" | "ogg" | "flac" | "m4a" if self.enable_audio => FileKind::Audio,
            "mp4" | "avi" | "mov" | "mkv" | "webm" if self.enable_video => FileKind::Video,
            "zip" if self.enable_archives => FileKind::ZipArchive,
            "tar" | "gz" | "tgz" if self.enable_archives => FileKind::TarArchive,
            "rar" | "7z" if self.enable_archives => FileKind::OtherArchive,
            "epub" => FileKind::Epub,
            "mobi" | "azw" | "azw3" => FileKind::OtherEbook,
            _ => match mime.as_str() {
                "application/pdf" => FileKind::Pdf,
                m if m.starts_with("text/") => FileKind::PlainText,
                m if m.starts_with("image/") => FileKind::Image,
                m if m.starts_with("audio/") && self.enable_audio => FileKind::Audio,
                m if m.starts_with("video/") && self.enable_video => FileKind::Video,
                "application/zip" if self.enable_archives => FileKind::ZipArchive,
                "application/x-tar" | "application/gzip" if self.enable_archives => {
                    FileKind::TarArchive
                }
                "application/epub+zip" => FileKind::Epub,
                m if (m.contains("officedocument") || m.contains("msword")) => {
                    FileKind::OfficeLegacy
                }
                _ => FileKind::Other,
            },
        };
        (kind, mime)
    }
}

fn placeholder(path: &Path, mime: &str, reason: &str) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime = if mime.is_empty() { "unknown" } else { mime };
    format!(
        "Unable to extract content from {}. File type: {}. Error: {}",
        name,
        mime,
        truncate_chars(reason, 100)
    )
}

/// Truncates to at most `cap` characters on a char boundary.
pub(crate) fn truncate_chars(s: &str, cap: usize) -> String {
    match s.char_indices().nth(cap) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn extractor() -> Extractor {
        Extractor::new(&AppConfig::default(), ToolSupport::default())
    }

    fn small_extractor(sample_length: usize) -> Extractor {
        let cfg = AppConfig {
            sample_length,
            ..AppConfig::default()
        };
        Extractor::new(&cfg, ToolSupport::default())
    }

    fn open_cache(dir: &Path) -> Mutex<ContentCache> {
        Mutex::new(ContentCache::open(&dir.join("cache.json"), 100).unwrap())
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn sample_never_exceeds_cap() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("big.txt");
        fs::write(&file, "word ".repeat(500)).unwrap();
        let cache = open_cache(dir.path());

        let sample = small_extractor(64).extract(&file, "h1", &cache, true);
        assert!(sample.text.chars().count() <= 64);
    }

    #[test]
    fn second_extract_is_served_from_cache() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("note.txt");
        fs::write(&file, "original contents").unwrap();
        let cache = open_cache(dir.path());
        let ex = extractor();

        let first = ex.extract(&file, "samehash", &cache, true);
        // Rewriting the file without changing the (caller-supplied) hash
        // must not re-invoke the handler.
        fs::write(&file, "rewritten contents").unwrap();
        let second = ex.extract(&file, "samehash", &cache, true);
        assert_eq!(first.text, second.text);
        assert_eq!(second.text, "original contents");
    }

    #[test]
    fn cache_disabled_always_rereads() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("note.txt");
        fs::write(&file, "first").unwrap();
        let cache = open_cache(dir.path());
        let ex = extractor();

        let first = ex.extract(&file, "h", &cache, false);
        fs::write(&file, "second").unwrap();
        let second = ex.extract(&file, "h", &cache, false);
        assert_eq!(first.text, "first");
        assert_eq!(second.text, "second");
    }

    #[test]
    fn missing_file_yields_placeholder_not_error() {
        let dir = tempdir().unwrap();
        let cache = open_cache(dir.path());
        let sample = extractor().extract(&dir.path().join("gone.xyz"), "h", &cache, false);
        assert!(sample.text.contains("Unable to extract content"));
    }

    #[test]
    fn failed_extraction_placeholder_is_cached_too() {
        let dir = tempdir().unwrap();
        let cache = open_cache(dir.path());
        let missing = dir.path().join("gone.xyz");
        let ex = extractor();
        let first = ex.extract(&missing, "h", &cache, true);
        assert!(cache.lock().unwrap().contains("h"));
        let second = ex.extract(&missing, "h", &cache, true);
        assert_eq!(first.text, second.text);
    }
}
