use std::path::PathBuf;

use crate::error::Result;
use crate::har::loader::{list_candidate_urls, read_har_entries};

pub struct CandidatesOptions {
    pub har: PathBuf,
}

/// Lists the filtered candidate-URL shortlist without invoking the oracle --
/// a debug aid for sanity-checking the HAR-Loader filters (SS6).
pub fn run_candidates(options: &CandidatesOptions) -> Result<usize> {
    let har_entries = read_har_entries(&options.har)?;
    let candidates = list_candidate_urls(&har_entries);
    for candidate in &candidates {
        println!(
            "{:<6} {:<50} {:<25} {}",
            candidate.method, candidate.url, candidate.content_type, candidate.preview
        );
    }
    Ok(candidates.len())
}
