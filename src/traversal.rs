//! Traversal & Emission (SS4.6): the reverse-topological walk that orders replay,
//! plus the obfuscation map and optional code-emission pipeline. Grounded on
//! `integuru/util/print.py` (`print_dag_in_reverse`, `generate_code`,
//! `aggregate_functions`, `generate_obfuscation_map`,
//! `swap_string_using_obfuscation_map`), with two deliberate improvements over that
//! reference: the obfuscation hash is a deterministic content hash rather than
//! Python's process-randomized `hash()`, and substitution sorts literals by
//! descending length first so a literal that is a substring of a longer one cannot
//! corrupt an already-substituted occurrence.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use serde_json::Value;

use crate::dag::{DagStore, NodeContent, NodeId, NodeKind};
use crate::error::Result;
use crate::oracle::Oracle;

/// One node in forward-printed or reverse-topological order, with enough context
/// to render a human-readable dump line.
pub struct TraversalEntry {
    pub id: NodeId,
    pub label: String,
}

/// Walks from every DAG source and visits each node only after all of its
/// successors, using a per-path `visited` guard (removed on unwind, so it only
/// detects a cycle on the active path) and a permanent `done` set (so a node
/// reachable via more than one consumer is printed exactly once).
pub fn reverse_topological_order(dag: &DagStore) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut done: HashSet<NodeId> = HashSet::new();

    for source in dag.sources() {
        let mut visiting: HashSet<NodeId> = HashSet::new();
        visit(dag, source, &mut visiting, &mut done, &mut order);
    }
    order
}

fn visit(dag: &DagStore, id: NodeId, visiting: &mut HashSet<NodeId>, done: &mut HashSet<NodeId>, order: &mut Vec<NodeId>) {
    if done.contains(&id) || visiting.contains(&id) {
        return;
    }
    visiting.insert(id);
    for &succ in dag.successors(id) {
        visit(dag, succ, visiting, done, order);
    }
    visiting.remove(&id);
    if done.insert(id) {
        order.push(id);
    }
}

pub fn node_label(dag: &DagStore, id: NodeId) -> String {
    match dag.get_node(id).map(|n| &n.content) {
        Some(NodeContent::Request { request, .. }) => format!("{} {}", request.method, request.url),
        Some(NodeContent::Cookie { name, .. }) => format!("cookie:{name}"),
        Some(NodeContent::NotFound { search_string }) => format!("not_found:{search_string}"),
        None => "<missing>".to_string(),
    }
}

pub fn dump_reverse_topological(dag: &DagStore) -> Vec<TraversalEntry> {
    reverse_topological_order(dag)
        .into_iter()
        .map(|id| TraversalEntry { label: node_label(dag, id), id })
        .collect()
}

/// A deterministic `literal -> var_<hash>` substitution table built from every
/// dynamic/extracted literal reachable from the DAG's sources.
pub struct ObfuscationMap {
    forward: HashMap<String, String>,
}

impl ObfuscationMap {
    pub fn build(dag: &DagStore) -> Self {
        let mut literals: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for node in dag.nodes() {
            for part in node.extracted_parts.iter().chain(node.dynamic_parts.iter()) {
                if seen.insert(part.clone()) {
                    literals.push(part.clone());
                }
            }
            if let NodeContent::Cookie { value, .. } = &node.content {
                if seen.insert(value.clone()) {
                    literals.push(value.clone());
                }
            }
        }

        let mut forward = HashMap::with_capacity(literals.len());
        for literal in literals {
            let mut hasher = DefaultHasher::new();
            literal.hash(&mut hasher);
            let ident = format!("var_{:016x}", hasher.finish());
            forward.insert(literal, ident);
        }
        ObfuscationMap { forward }
    }

    /// Replaces every occurrence of every literal with its safe identifier.
    /// Literals are substituted longest-first so a short literal that happens to
    /// be a substring of a longer one cannot partially corrupt an
    /// already-substituted occurrence.
    pub fn apply(&self, text: &str) -> String {
        let mut literals: Vec<&String> = self.forward.keys().collect();
        literals.sort_by_key(|l| std::cmp::Reverse(l.len()));

        let mut out = text.to_string();
        for literal in literals {
            if literal.is_empty() {
                continue;
            }
            let replacement = &self.forward[literal];
            out = out.replace(literal.as_str(), replacement);
        }
        out
    }

    pub fn get(&self, literal: &str) -> Option<&str> {
        self.forward.get(literal).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Recursively finds JSON key paths whose string value contains `needle`, used as
/// a code-emission hint for JSON responses (e.g. `log.token` instead of "somewhere
/// in this blob").
pub fn find_json_paths(value: &Value, needle: &str) -> Vec<String> {
    let mut paths = Vec::new();
    find_json_paths_rec(value, needle, String::new(), &mut paths);
    paths
}

fn find_json_paths_rec(value: &Value, needle: &str, prefix: String, out: &mut Vec<String>) {
    match value {
        Value::String(s) if s.contains(needle) => out.push(prefix),
        Value::Object(map) => {
            for (k, v) in map {
                let next = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
                find_json_paths_rec(v, needle, next, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                let next = format!("{prefix}[{i}]");
                find_json_paths_rec(v, needle, next, out);
            }
        }
        _ => {}
    }
}

/// Truncated context windows around every occurrence of `needle` in `text`, used
/// for large non-JSON responses so the emission prompt doesn't carry the whole body.
pub fn context_snippets(text: &str, needle: &str, window: usize) -> Vec<String> {
    if needle.is_empty() {
        return Vec::new();
    }
    let mut snippets = Vec::new();
    let mut start = 0;
    while let Some(pos) = text[start..].find(needle) {
        let abs = start + pos;
        let lo = abs.saturating_sub(window);
        let hi = (abs + needle.len() + window).min(text.len());
        let lo = floor_char_boundary(text, lo);
        let hi = ceil_char_boundary(text, hi);
        snippets.push(text[lo..hi].to_string());
        start = abs + needle.len();
        if start >= text.len() {
            break;
        }
    }
    snippets
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Response bodies above this size get context-window snippets instead of the full
/// body in the code-emission prompt (SS4.6).
pub const LARGE_RESPONSE_THRESHOLD: usize = 100_000;
const CONTEXT_WINDOW: usize = 50;

fn build_emission_prompt(dag: &DagStore, id: NodeId) -> String {
    let node = dag.get_node(id).expect("node must exist during emission");
    match &node.content {
        NodeContent::Request { request, response } => {
            let mut prompt = format!(
                "Request:\n{}\n\nExtracted parts this node must expose: {:?}\nRemaining dynamic parts (parameterize as function arguments): {:?}\n",
                request.canonical_curl(),
                node.extracted_parts,
                node.dynamic_parts,
            );

            let is_json = response.content_type.to_ascii_lowercase().contains("json");
            if is_json {
                if let Ok(value) = serde_json::from_str::<Value>(&response.body_text) {
                    for part in &node.extracted_parts {
                        let paths = find_json_paths(&value, part);
                        if !paths.is_empty() {
                            prompt.push_str(&format!("Suggested JSON key path(s) for '{part}': {paths:?}\n"));
                        }
                    }
                }
            } else if response.body_text.len() > LARGE_RESPONSE_THRESHOLD {
                for part in &node.extracted_parts {
                    let snippets = context_snippets(&response.body_text, part, CONTEXT_WINDOW);
                    for snippet in snippets {
                        prompt.push_str(&format!("Context around '{part}': ...{snippet}...\n"));
                    }
                }
            } else {
                prompt.push_str(&format!("Response body:\n{}\n", response.body_text));
            }
            prompt
        }
        NodeContent::Cookie { name, value } => {
            format!("Cookie '{name}' supplies extracted part(s) {:?} (sample value '{value}'). Emit a simple assignment.", node.extracted_parts)
        }
        NodeContent::NotFound { search_string } => {
            format!("No producer was found for literal '{search_string}'. Emit a placeholder that raises if used.")
        }
    }
}

/// Strips a leading/trailing markdown code fence the oracle may have wrapped its
/// answer in.
fn strip_code_fence(code: &str) -> String {
    let trimmed = code.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.trim_start_matches(|c: char| c.is_alphabetic());
        let rest = rest.strip_suffix("```").unwrap_or(rest);
        return rest.trim().to_string();
    }
    trimmed.to_string()
}

pub struct EmissionResult {
    pub obfuscation_map: ObfuscationMap,
    pub program: String,
}

/// Drives per-node snippet generation in replay order, applies the obfuscation map,
/// then stitches the snippets into one program via a second oracle call. This is
/// the only stage that uses the oracle's alternate model (handled inside
/// `Oracle::generate_code_snippet`/`aggregate_functions` with fallback to default).
pub fn emit_code(dag: &DagStore, oracle: &dyn Oracle) -> Result<EmissionResult> {
    let order = reverse_topological_order(dag);
    let obfuscation_map = ObfuscationMap::build(dag);

    let mut snippets = Vec::with_capacity(order.len());
    for id in order {
        let prompt = build_emission_prompt(dag, id);
        let snippet = oracle.generate_code_snippet(&prompt)?;
        snippets.push(obfuscation_map.apply(&snippet));
    }

    let program = oracle.aggregate_functions(&snippets)?;
    let program = strip_code_fence(&program);

    Ok(EmissionResult { obfuscation_map, program })
}
