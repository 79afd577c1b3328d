//! The excluded-from-candidates keyword/extension lists, verbatim from the
//! discovery-engine spec. Kept in one place since both the candidate-URL shortlist
//! (`har::loader::list_candidate_urls`) and request normalization (`model::Request`
//! header stripping) consult them.

/// URL path suffixes dropped from the oracle's candidate shortlist. Note `.js`,
/// `.pdf`, `.zip`, and `.map` are intentionally *not* in this list.
pub const EXCLUDED_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".ico", ".css", ".woff", ".woff2",
    ".ttf", ".otf", ".eot", ".mp3", ".mp4", ".wav", ".avi", ".mov", ".flv", ".wmv",
    ".webm", ".rar", ".7z", ".tar", ".gz", ".exe", ".dmg",
];

/// Case-insensitive keywords that, if present anywhere in a request's URL, headers,
/// or body, exclude it from the candidate shortlist (telemetry/analytics noise).
pub const EXCLUDED_KEYWORDS: &[&str] = &["google", "taboola", "datadog", "sentry"];

/// Header names containing any of these (case-insensitive) substrings are stripped
/// entirely from a normalized `Request`.
pub const EXCLUDED_HEADER_KEYWORDS: &[&str] = &[
    "cookie",
    "sec-",
    "accept",
    "user-agent",
    "referer",
    "relic",
    "sentry",
    "datadog",
    "amplitude",
    "mixpanel",
    "segment",
    "heap",
    "hotjar",
    "fullstory",
    "pendo",
    "optimizely",
    "adobe",
    "analytics",
    "tracking",
    "telemetry",
    "clarity",
    "matomo",
    "plausible",
];

pub fn is_excluded_extension(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    EXCLUDED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub fn contains_excluded_keyword(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    EXCLUDED_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

pub fn is_excluded_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    EXCLUDED_HEADER_KEYWORDS.iter().any(|kw| lower.contains(kw))
}
