//! Stable, supported API surface for embedding harmap.
//!
//! This module re-exports the types and functions intended for external use.
//! Treat the contents of this module as SemVer-stable.

pub use crate::commands::{
    run_candidates, run_discover, CandidatesOptions, DiscoverOptions, DiscoverStats,
};
pub use crate::dag::{reachable_from, DagStore, Node, NodeContent, NodeId, NodeKind, NodeUpdate};
pub use crate::discovery::{DiscoveryEngine, DiscoveryOutcome};
pub use crate::error::{HarmapError, Result};
pub use crate::har::filters;
pub use crate::har::loader::{
    build_url_index, list_candidate_urls, parse_cookie_file, parse_har_file, read_har_entries,
    CandidateUrl,
};
pub use crate::har::model::{CookieRecord, Entry, Har};
pub use crate::model::{Body, NormalizedEntry, Request, Response};
pub use crate::oracle::{HttpOracle, Oracle, OracleConfig, ScriptedOracle};
pub use crate::traversal::{
    dump_reverse_topological, emit_code, node_label, reverse_topological_order, EmissionResult,
    ObfuscationMap, TraversalEntry,
};
