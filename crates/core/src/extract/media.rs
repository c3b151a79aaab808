//! Audio/video handler backed by ffprobe. Without ffprobe on the host the
//! sample degrades to file size and type.

use super::{Extraction, ToolSupport};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;

pub fn extract(path: &Path, label: &str, tools: ToolSupport) -> Extraction {
    if !tools.ffprobe {
        return Extraction::Unsupported(fallback_note(path, label));
    }
    let out = match Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
    {
        Ok(o) => o,
        Err(e) => return Extraction::Failed(format!("ffprobe: {}", e)),
    };
    if !out.status.success() {
        return Extraction::Unsupported(fallback_note(path, label));
    }
    let probe: Value = match serde_json::from_slice(&out.stdout) {
        Ok(v) => v,
        Err(e) => return Extraction::Failed(format!("ffprobe output: {}", e)),
    };

    let mut text = format!("{} Metadata:\n", label);
    if let Some(format) = probe.get("format") {
        if let Some(name) = format.get("format_long_name").and_then(Value::as_str) {
            text.push_str(&format!("Container: {}\n", name));
        }
        if let Some(duration) = format.get("duration").and_then(Value::as_str) {
            text.push_str(&format!("Duration: {} seconds\n", duration));
        }
        if let Some(size) = format.get("size").and_then(Value::as_str) {
            text.push_str(&format!("Size: {} bytes\n", size));
        }
        if let Some(tags) = format.get("tags").and_then(Value::as_object) {
            for key in ["title", "artist", "album", "genre", "date", "comment"] {
                if let Some(v) = tags.get(key).and_then(Value::as_str) {
                    text.push_str(&format!("{}: {}\n", capitalize(key), v));
                }
            }
        }
    }
    if let Some(streams) = probe.get("streams").and_then(Value::as_array) {
        for stream in streams {
            match stream.get("codec_type").and_then(Value::as_str) {
                Some("video") => {
                    let codec = stream
                        .get("codec_name")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    let w = stream.get("width").and_then(Value::as_u64).unwrap_or(0);
                    let h = stream.get("height").and_then(Value::as_u64).unwrap_or(0);
                    text.push_str(&format!("Video stream: {} {}x{}\n", codec, w, h));
                }
                Some("audio") => {
                    let codec = stream
                        .get("codec_name")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    let rate = stream
                        .get("sample_rate")
                        .and_then(Value::as_str)
                        .unwrap_or("?");
                    let channels = stream.get("channels").and_then(Value::as_u64).unwrap_or(0);
                    text.push_str(&format!(
                        "Audio stream: {} {} Hz, {} channel(s)\n",
                        codec, rate, channels
                    ));
                }
                _ => {}
            }
        }
    }
    Extraction::Text(text)
}

fn fallback_note(path: &Path, label: &str) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    format!("{} file: {} ({} bytes, metadata not probed)", label, name, size)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
