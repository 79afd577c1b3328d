mod candidates;
mod discover;

pub use candidates::{run_candidates, CandidatesOptions};
pub use discover::{run_discover, DiscoverOptions, DiscoverStats};
