//! Reads HAR captures and cookie snapshots off disk into the normalized model used
//! by the discovery engine. Grounded on this project's existing `har/parser.rs`
//! (the `serde_json::Deserializer::from_reader` + `.end()` discipline) and on
//! `integuru/util/har_processing.py` (the candidate-URL shortlist semantics).

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::error::{HarmapError, Result};
use crate::har::filters;
use crate::har::model::{CookieRecord, Entry, Har};
use crate::model::NormalizedEntry;

/// A single row of the candidate-URL shortlist shown to the oracle during action
/// identification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateUrl {
    pub method: String,
    pub url: String,
    pub content_type: String,
    pub preview: String,
}

/// Parses a HAR file from disk into normalized entries, preserving capture order.
pub fn parse_har_file(path: &Path) -> Result<Vec<NormalizedEntry>> {
    let har = read_har(path)?;
    Ok(har.log.entries.iter().map(NormalizedEntry::from_har_entry).collect())
}

/// Parses a HAR file from disk into raw entries, preserving capture order. The
/// discovery engine keeps both the raw and normalized form: raw entries feed
/// `list_candidate_urls` (which filters on unstripped headers), normalized
/// entries feed everything else.
pub fn read_har_entries(path: &Path) -> Result<Vec<Entry>> {
    let har = read_har(path)?;
    Ok(har.log.entries)
}

fn read_har(path: &Path) -> Result<Har> {
    let file = File::open(path).map_err(HarmapError::Io)?;
    let reader = BufReader::new(file);
    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    let har = Har::deserialize(&mut deserializer)
        .map_err(|e| HarmapError::InvalidHar(format!("{path:?}: {e}")))?;
    deserializer
        .end()
        .map_err(|e| HarmapError::InvalidHar(format!("{path:?}: trailing data after HAR: {e}")))?;
    Ok(har)
}

/// Parses a cookie snapshot (a JSON array of cookie records) into a name -> record
/// map. Last-wins for duplicate cookie names, matching `build_url_index`'s
/// last-wins-on-URL behavior.
pub fn parse_cookie_file(path: &Path) -> Result<HashMap<String, CookieRecord>> {
    let file = File::open(path).map_err(HarmapError::Io)?;
    let reader = BufReader::new(file);
    let records: Vec<CookieRecord> = serde_json::from_reader(reader)
        .map_err(|e| HarmapError::InvalidHar(format!("{path:?}: {e}")))?;
    let mut map = HashMap::with_capacity(records.len());
    for record in records {
        map.insert(record.name.clone(), record);
    }
    Ok(map)
}

/// Builds the last-wins URL -> index-into-`entries` map used by action-URL lookup.
pub fn build_url_index(entries: &[NormalizedEntry]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        index.insert(entry.request.url.clone(), i);
    }
    index
}

/// The filtered shortlist of candidate action URLs shown to the oracle: static
/// assets and telemetry-host/keyword matches are excluded per `har::filters`.
pub fn list_candidate_urls(har_entries: &[Entry]) -> Vec<CandidateUrl> {
    let mut out = Vec::new();
    for entry in har_entries {
        let url = &entry.request.url;
        let path = Url::parse(url).map(|u| u.path().to_string()).unwrap_or_default();

        if filters::is_excluded_extension(&path) {
            continue;
        }

        let mut request_text = url.to_ascii_lowercase();
        for header in &entry.request.headers {
            request_text.push_str(&header.name.to_ascii_lowercase());
            request_text.push_str(&header.value.to_ascii_lowercase());
        }
        if let Some(post_data) = &entry.request.post_data {
            if let Some(text) = &post_data.text {
                request_text.push_str(&text.to_ascii_lowercase());
            }
        }
        if filters::contains_excluded_keyword(&request_text) {
            continue;
        }

        let content_type = entry
            .response
            .content
            .mime_type
            .clone()
            .unwrap_or_default();
        let preview: String = entry
            .response
            .content
            .text
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(30)
            .collect();

        out.push(CandidateUrl {
            method: entry.request.method.clone(),
            url: url.clone(),
            content_type,
            preview,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_har(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn excludes_static_assets_and_tracking_keywords() {
        let json = r#"
        {
          "log": {
            "entries": [
              { "request": { "method": "GET", "url": "https://example.com/app.css", "headers": [] },
                "response": { "status": 200, "content": {} } },
              { "request": { "method": "GET", "url": "https://www.google-analytics.com/collect", "headers": [] },
                "response": { "status": 200, "content": {} } },
              { "request": { "method": "POST", "url": "https://api.example.com/do", "headers": [] },
                "response": { "status": 200, "content": { "mimeType": "application/json", "text": "{\"ok\":true}" } } }
            ]
          }
        }
        "#;
        let file = write_har(json);
        let har = read_har(file.path()).unwrap();
        let candidates = list_candidate_urls(&har.log.entries);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://api.example.com/do");
    }

    #[test]
    fn keeps_js_pdf_zip_map() {
        let json = r#"
        {
          "log": {
            "entries": [
              { "request": { "method": "GET", "url": "https://example.com/bundle.js", "headers": [] },
                "response": { "status": 200, "content": {} } },
              { "request": { "method": "GET", "url": "https://example.com/doc.pdf", "headers": [] },
                "response": { "status": 200, "content": {} } },
              { "request": { "method": "GET", "url": "https://example.com/archive.zip", "headers": [] },
                "response": { "status": 200, "content": {} } }
            ]
          }
        }
        "#;
        let file = write_har(json);
        let har = read_har(file.path()).unwrap();
        let candidates = list_candidate_urls(&har.log.entries);
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn rejects_trailing_garbage_after_har_object() {
        let json = r#"{"log":{"entries":[]}}garbage"#;
        let file = write_har(json);
        let err = parse_har_file(file.path()).unwrap_err();
        assert!(matches!(err, HarmapError::InvalidHar(_)));
    }

    #[test]
    fn parses_cookie_snapshot() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"[{"name":"csrf","value":"abc","domain":"example.com"}]"#)
            .unwrap();
        let cookies = parse_cookie_file(file.path()).unwrap();
        assert_eq!(cookies.get("csrf").unwrap().value, "abc");
    }
}
