//! Convenience prelude for common harmap embedding tasks.

pub use crate::api::{
    parse_har_file, DagStore, DiscoveryEngine, DiscoveryOutcome, HarmapError, HttpOracle, Node,
    NodeContent, NodeId, NodeKind, Oracle, OracleConfig, Result,
};
