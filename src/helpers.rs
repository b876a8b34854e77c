//! Free-standing helpers for stream bookkeeping, media preparation and
//! host response parsing.

use anyhow::Result;
use base64::Engine;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Append one interaction to a stream history and return the formatted
/// entry, stamped with local time as `[YYYY-MM-DD HH:MM:SS] {role}: {content}`.
pub fn update_stream_history(history: &mut Vec<String>, role: &str, content: &str) -> String {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let entry = format!("[{}] {}: {}", timestamp, role, content);
    history.push(entry.clone());
    entry
}

/// Downsample a raw RGB media file and encode it for embedding in a stream
/// payload.
///
/// The file's bytes are read as consecutive 3-byte RGB rows; every
/// `(1 / scale_factor)`-th row is kept and the sampled bytes are
/// base64-encoded. A `scale_factor` of 1.0 keeps everything. Fails when the
/// file cannot be read, when its length is not a whole number of rows, or
/// when the scale factor keeps no rows at all.
pub fn media_to_base64(media_path: impl AsRef<Path>, scale_factor: f64) -> Result<String> {
    let path = media_path.as_ref();
    let bytes = fs::read(path)
        .map_err(|e| anyhow::anyhow!("failed to read media file {}: {}", path.display(), e))?;

    if bytes.len() % 3 != 0 {
        return Err(anyhow::anyhow!(
            "media file {} is not a whole number of 3-byte RGB rows ({} bytes)",
            path.display(),
            bytes.len()
        ));
    }

    if !(scale_factor > 0.0) {
        return Err(anyhow::anyhow!(
            "scale factor must be positive, got {}",
            scale_factor
        ));
    }
    let step = (1.0 / scale_factor) as usize;
    if step == 0 {
        return Err(anyhow::anyhow!(
            "scale factor {} keeps no rows",
            scale_factor
        ));
    }

    let sampled: Vec<u8> = bytes
        .chunks_exact(3)
        .step_by(step)
        .flatten()
        .copied()
        .collect();

    Ok(base64::engine::general_purpose::STANDARD.encode(sampled))
}

/// Parse a host or stream processor response into a JSON object.
///
/// A surrounding markdown code fence is stripped first. If the remaining
/// text does not parse as a JSON object directly, the text is scanned for
/// balanced `{...}` candidates and the first one that parses as an object
/// wins. Fails when no candidate does.
pub fn parse_stream_response(response: &str) -> Result<Map<String, Value>> {
    let body = strip_code_fence(response);

    let reason = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(other) => format!("expected a JSON object, got {}", kind_of(&other)),
        Err(e) => e.to_string(),
    };

    for candidate in balanced_candidates(body) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate) {
            return Ok(map);
        }
    }

    Err(anyhow::anyhow!("could not parse stream response: {}", reason))
}

/// Drop the first and last lines of a ``` fence when the text is wrapped in
/// one, mirroring how hosts tend to wrap JSON answers.
fn strip_code_fence(text: &str) -> &str {
    if !(text.starts_with("```") && text.ends_with("```")) {
        return text;
    }
    match (text.find('\n'), text.rfind('\n')) {
        (Some(first), Some(last)) if first < last => &text[first + 1..last],
        _ => "",
    }
}

/// Top-level balanced `{...}` spans, left to right. Depth counting ignores
/// braces inside JSON strings; a mis-split candidate simply fails to parse
/// and the scan moves on.
fn balanced_candidates(text: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, b) in text.bytes().enumerate() {
        match b {
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    candidates.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    candidates
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
