//! The Discovery Engine (SS4.5): the fixed-point loop that expands a DAG from a
//! single identified action request until every dynamic value is sourced.
//! Grounded on `integuru`'s `graph_builder.py` (the dynamic-part-extraction ->
//! input-variable-reconciliation -> upstream-search -> loop-or-end iteration order)
//! and `integration_agent/agent.py` (the response/URL-decoded substring match
//! predicate used during upstream search).

use std::collections::HashMap;

use percent_encoding::percent_decode_str;

use crate::dag::{DagStore, NodeContent, NodeId, NodeKind, NodeUpdate};
use crate::error::{HarmapError, Result};
use crate::har::loader::{build_url_index, list_candidate_urls, CandidateUrl};
use crate::har::model::{CookieRecord, Entry as HarEntry};
use crate::model::NormalizedEntry;
use crate::oracle::Oracle;

pub struct DiscoveryEngine {
    har_entries: Vec<HarEntry>,
    normalized: Vec<NormalizedEntry>,
    url_index: HashMap<String, usize>,
    cookies: HashMap<String, CookieRecord>,
    input_vars: HashMap<String, String>,
    max_steps: usize,

    dag: DagStore,
    curl_index: HashMap<String, NodeId>,
    cookie_index: HashMap<String, NodeId>,
}

pub struct DiscoveryOutcome {
    pub dag: DagStore,
    pub master: NodeId,
    pub steps_used: usize,
    pub budget_exhausted: bool,
}

impl DiscoveryEngine {
    pub fn new(
        har_entries: Vec<HarEntry>,
        cookies: HashMap<String, CookieRecord>,
        input_vars: HashMap<String, String>,
        max_steps: usize,
    ) -> Self {
        let normalized: Vec<NormalizedEntry> =
            har_entries.iter().map(NormalizedEntry::from_har_entry).collect();
        let url_index = build_url_index(&normalized);
        DiscoveryEngine {
            har_entries,
            normalized,
            url_index,
            cookies,
            input_vars,
            max_steps,
            dag: DagStore::new(),
            curl_index: HashMap::new(),
            cookie_index: HashMap::new(),
        }
    }

    pub fn candidate_urls(&self) -> Vec<CandidateUrl> {
        list_candidate_urls(&self.har_entries)
    }

    /// Runs discovery to completion or until `max_steps` is exhausted (SS4.5).
    pub fn run(mut self, oracle: &dyn Oracle, user_prompt: &str) -> Result<DiscoveryOutcome> {
        let candidates = self.candidate_urls();
        if candidates.is_empty() {
            return Err(HarmapError::InvalidArgs(
                "no candidate action URLs survived HAR filtering".to_string(),
            ));
        }

        let action_url = oracle.identify_action_url(&candidates, user_prompt)?;
        let idx = *self.url_index.get(&action_url).ok_or_else(|| {
            HarmapError::Oracle(format!("action URL '{action_url}' not found in HAR entries"))
        })?;
        let entry = self.normalized[idx].clone();

        let master_id = self.dag.add_node(
            NodeKind::Master,
            NodeContent::Request { request: entry.request.clone(), response: entry.response.clone() },
            vec![],
            vec![],
            HashMap::new(),
        );
        self.curl_index.insert(entry.request.canonical_curl(), master_id);

        let mut todo = vec![master_id];
        let mut steps = 0usize;
        let mut budget_exhausted = false;

        while let Some(id) = todo.pop() {
            if steps >= self.max_steps {
                budget_exhausted = true;
                break;
            }
            steps += 1;
            self.expand_node(id, oracle, &mut todo)?;
        }

        Ok(DiscoveryOutcome { dag: self.dag, master: master_id, steps_used: steps, budget_exhausted })
    }

    fn expand_node(&mut self, id: NodeId, oracle: &dyn Oracle, todo: &mut Vec<NodeId>) -> Result<()> {
        let (request, _response) = match self.dag.get_node(id).map(|n| n.content.clone()) {
            Some(NodeContent::Request { request, response }) => (request, response),
            _ => return Ok(()),
        };

        // 3.b: JS assets are not treated as action carriers.
        if request.url.to_ascii_lowercase().ends_with(".js") {
            self.dag.update_node(id, NodeUpdate { dynamic_parts: Some(vec![]), ..Default::default() });
            return Ok(());
        }

        // 3.c: dynamic-part extraction.
        let mut dynamic_parts = oracle.identify_dynamic_parts(&request.minified_curl())?;

        let mut node_input_vars: HashMap<String, String> = HashMap::new();
        dynamic_parts.retain(|part| {
            if let Some((name, _)) = self.input_vars.iter().find(|(_, v)| v.as_str() == part) {
                node_input_vars.insert(name.clone(), part.clone());
                false
            } else {
                true
            }
        });

        // 3.d: input-variable reconciliation.
        if !self.input_vars.is_empty() {
            let full_curl = request.canonical_curl();
            let reconciled = oracle.identify_input_variables(&full_curl, &self.input_vars)?;
            for (name, literal) in &reconciled {
                node_input_vars.insert(name.clone(), literal.clone());
                dynamic_parts.retain(|p| p != literal);
            }
        }

        self.dag.update_node(
            id,
            NodeUpdate {
                dynamic_parts: Some(dynamic_parts.clone()),
                input_variables_extend: node_input_vars,
                ..Default::default()
            },
        );

        // 3.e: upstream search.
        for part in dynamic_parts {
            self.resolve_dynamic_part(id, &part, oracle, todo)?;
        }

        // 3.f: resolution state is now recorded entirely by edges.
        self.dag.update_node(id, NodeUpdate { dynamic_parts: Some(vec![]), ..Default::default() });

        // 3.g.
        if let Some(cycle) = self.dag.detect_cycles() {
            return Err(HarmapError::CycleDetected(format!("{cycle:?}")));
        }

        Ok(())
    }

    fn resolve_dynamic_part(
        &mut self,
        consumer: NodeId,
        part: &str,
        oracle: &dyn Oracle,
        todo: &mut Vec<NodeId>,
    ) -> Result<()> {
        // Cookie match first.
        if let Some(cookie_name) = self
            .cookies
            .iter()
            .find(|(_, record)| record.value.contains(part))
            .map(|(name, _)| name.clone())
        {
            let cookie_id = if let Some(&existing) = self.cookie_index.get(&cookie_name) {
                self.dag.update_node(
                    existing,
                    NodeUpdate { extracted_parts_append: vec![part.to_string()], ..Default::default() },
                );
                existing
            } else {
                let value = self.cookies[&cookie_name].value.clone();
                let new_id = self.dag.add_node(
                    NodeKind::Cookie,
                    NodeContent::Cookie { name: cookie_name.clone(), value },
                    vec![],
                    vec![part.to_string()],
                    HashMap::new(),
                );
                self.cookie_index.insert(cookie_name, new_id);
                new_id
            };
            self.dag.add_edge(consumer, cookie_id);
            return Ok(());
        }

        // Response search.
        let part_lower = part.to_ascii_lowercase();
        let decoded = percent_decode_str(part).decode_utf8_lossy().to_ascii_lowercase();

        let mut candidate_indices = Vec::new();
        for (i, entry) in self.normalized.iter().enumerate() {
            let curl_lower = entry.request.canonical_curl().to_ascii_lowercase();
            let response_lower = entry.response.body_text.to_ascii_lowercase();

            let branch_response_contains = response_lower.contains(&part_lower) && !curl_lower.contains(&part_lower);
            let branch_decoded_in_curl = curl_lower.contains(&decoded) && !response_lower.contains(&decoded);

            if branch_response_contains || branch_decoded_in_curl {
                candidate_indices.push(i);
            }
        }

        if candidate_indices.is_empty() {
            let not_found_id = self.dag.add_node(
                NodeKind::NotFound,
                NodeContent::NotFound { search_string: part.to_string() },
                vec![],
                vec![],
                HashMap::new(),
            );
            self.dag.add_edge(consumer, not_found_id);
            eprintln!("harmap: no producer found for dynamic part '{part}'");
            return Ok(());
        }

        let chosen = if candidate_indices.len() == 1 {
            candidate_indices[0]
        } else {
            let strings: Vec<String> = candidate_indices
                .iter()
                .map(|&i| self.normalized[i].request.canonical_curl())
                .collect();
            let picked = oracle.choose_simplest_request(&strings)?;
            candidate_indices[picked]
        };

        let producer = self.normalized[chosen].clone();
        let producer_is_js = producer.request.url.to_ascii_lowercase().ends_with(".js");
        let producer_is_html = producer.response.content_type.to_ascii_lowercase().contains("text/html");
        if producer_is_js || producer_is_html {
            // Treated as a shell page, not a producer: drop the literal entirely.
            return Ok(());
        }

        let producer_curl = producer.request.canonical_curl();
        if let Some(&existing) = self.curl_index.get(&producer_curl) {
            self.dag.update_node(
                existing,
                NodeUpdate { extracted_parts_append: vec![part.to_string()], ..Default::default() },
            );
            self.dag.add_edge(consumer, existing);
        } else {
            let new_id = self.dag.add_node(
                NodeKind::Curl,
                NodeContent::Request { request: producer.request, response: producer.response },
                vec![],
                vec![part.to_string()],
                HashMap::new(),
            );
            self.curl_index.insert(producer_curl, new_id);
            self.dag.add_edge(consumer, new_id);
            todo.push(new_id);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::har::model::{Content, Header, QueryParam, Request as HarRequest, Response as HarResponse};
    use crate::oracle::ScriptedOracle;

    fn har_entry(method: &str, url: &str, query: Vec<(&str, &str)>, status: i32, resp_text: &str) -> HarEntry {
        HarEntry {
            started_date_time: None,
            request: HarRequest {
                method: method.to_string(),
                url: url.to_string(),
                headers: vec![],
                query_string: if query.is_empty() {
                    None
                } else {
                    Some(query.into_iter().map(|(n, v)| QueryParam { name: n.into(), value: v.into() }).collect())
                },
                post_data: None,
            },
            response: HarResponse {
                status,
                content: Content { mime_type: Some("application/json".into()), text: Some(resp_text.into()), encoding: None },
            },
        }
    }

    #[allow(dead_code)]
    fn header_entry(name: &str, value: &str) -> Header {
        Header { name: name.into(), value: value.into() }
    }

    /// Scenario A: single-hop action (SS8).
    #[test]
    fn single_hop_action_produces_one_curl_node() {
        let entries = vec![
            har_entry("GET", "https://api.example.com/login", vec![], 200, r#"{"token":"T1"}"#),
            har_entry("POST", "https://api.example.com/do", vec![("t", "T1")], 200, "ok"),
        ];

        let oracle = ScriptedOracle::new();
        oracle.action_urls.borrow_mut().push_back("https://api.example.com/do".to_string());
        oracle.dynamic_parts.borrow_mut().push_back(vec!["T1".to_string()]);
        oracle.dynamic_parts.borrow_mut().push_back(vec![]); // producer node has no further dynamic parts

        let engine = DiscoveryEngine::new(entries, HashMap::new(), HashMap::new(), 15);
        let outcome = engine.run(&oracle, "perform the action").unwrap();

        assert!(!outcome.budget_exhausted);
        assert!(outcome.dag.detect_cycles().is_none());
        assert_eq!(outcome.dag.sources(), vec![outcome.master]);

        let master = outcome.dag.get_node(outcome.master).unwrap();
        assert_eq!(master.kind as u8, NodeKind::Master as u8);
        let successors = outcome.dag.successors(outcome.master);
        assert_eq!(successors.len(), 1);
        let producer = outcome.dag.get_node(successors[0]).unwrap();
        assert!(matches!(producer.kind, NodeKind::Curl));
        assert_eq!(producer.extracted_parts, vec!["T1".to_string()]);
    }

    /// Scenario B: cookie source.
    #[test]
    fn cookie_match_precedes_response_search() {
        let entries = vec![har_entry("POST", "https://api.example.com/do", vec![], 200, "contains abc too")];
        let mut cookies = HashMap::new();
        cookies.insert(
            "csrf".to_string(),
            CookieRecord {
                name: "csrf".into(),
                value: "abc".into(),
                domain: None,
                path: None,
                expires: None,
                http_only: None,
                secure: None,
                same_site: None,
            },
        );

        let oracle = ScriptedOracle::new();
        oracle.action_urls.borrow_mut().push_back("https://api.example.com/do".to_string());
        oracle.dynamic_parts.borrow_mut().push_back(vec!["abc".to_string()]);

        let engine = DiscoveryEngine::new(entries, cookies, HashMap::new(), 15);
        let outcome = engine.run(&oracle, "perform the action").unwrap();

        let successors = outcome.dag.successors(outcome.master);
        assert_eq!(successors.len(), 1);
        let node = outcome.dag.get_node(successors[0]).unwrap();
        assert!(matches!(node.kind, NodeKind::Cookie));
        assert_eq!(node.extracted_parts, vec!["abc".to_string()]);
    }

    /// Scenario C: input variable reconciliation short-circuits upstream search.
    #[test]
    fn input_variables_are_not_searched_upstream() {
        let entries = vec![har_entry(
            "POST",
            "https://api.example.com/transfer",
            vec![("amount", "100"), ("to", "alice")],
            200,
            "ok",
        )];

        let mut input_vars = HashMap::new();
        input_vars.insert("amount".to_string(), "100".to_string());
        input_vars.insert("recipient".to_string(), "alice".to_string());

        let oracle = ScriptedOracle::new();
        oracle.action_urls.borrow_mut().push_back("https://api.example.com/transfer".to_string());
        // Both literals are recognized as input-variable values before the
        // extraction step's filter even asks the oracle anything further.
        oracle.dynamic_parts.borrow_mut().push_back(vec!["100".to_string(), "alice".to_string()]);

        let engine = DiscoveryEngine::new(entries, HashMap::new(), input_vars, 15);
        let outcome = engine.run(&oracle, "transfer money").unwrap();

        let master = outcome.dag.get_node(outcome.master).unwrap();
        assert!(master.dynamic_parts.is_empty());
        assert_eq!(master.input_variables.get("amount").unwrap(), "100");
        assert_eq!(master.input_variables.get("recipient").unwrap(), "alice");
        assert!(outcome.dag.successors(outcome.master).is_empty());
    }

    /// Scenario E: not found.
    #[test]
    fn unmatched_literal_becomes_not_found_node() {
        let entries = vec![har_entry("POST", "https://api.example.com/do", vec![], 200, "nothing relevant")];

        let oracle = ScriptedOracle::new();
        oracle.action_urls.borrow_mut().push_back("https://api.example.com/do".to_string());
        oracle.dynamic_parts.borrow_mut().push_back(vec!["Z".to_string()]);

        let engine = DiscoveryEngine::new(entries, HashMap::new(), HashMap::new(), 15);
        let outcome = engine.run(&oracle, "perform the action").unwrap();

        let successors = outcome.dag.successors(outcome.master);
        assert_eq!(successors.len(), 1);
        let node = outcome.dag.get_node(successors[0]).unwrap();
        assert!(matches!(node.kind, NodeKind::NotFound));
    }

    /// Scenario F: coalesced producer. Two dynamic parts both resolve to the same
    /// upstream request; it must appear as exactly one node carrying both literals
    /// in first-seen order, not two duplicate nodes.
    #[test]
    fn two_literals_from_the_same_producer_coalesce_into_one_node() {
        let entries = vec![
            har_entry("GET", "https://api.example.com/session", vec![], 200, r#"{"a":"A1","b":"B1"}"#),
            har_entry("POST", "https://api.example.com/master", vec![("a", "A1"), ("b", "B1")], 200, "ok"),
        ];

        let oracle = ScriptedOracle::new();
        oracle.action_urls.borrow_mut().push_back("https://api.example.com/master".to_string());
        oracle.dynamic_parts.borrow_mut().push_back(vec!["A1".to_string(), "B1".to_string()]);
        oracle.dynamic_parts.borrow_mut().push_back(vec![]);

        let engine = DiscoveryEngine::new(entries, HashMap::new(), HashMap::new(), 15);
        let outcome = engine.run(&oracle, "perform the action").unwrap();

        let successors = outcome.dag.successors(outcome.master);
        assert_eq!(successors.len(), 1, "both literals should coalesce onto the single session producer");
        let node = outcome.dag.get_node(successors[0]).unwrap();
        assert_eq!(node.extracted_parts, vec!["A1".to_string(), "B1".to_string()]);
    }

    /// Boundary: empty candidate list is a configuration error, not an oracle call.
    #[test]
    fn empty_candidate_list_is_a_configuration_error() {
        let entries = vec![har_entry("GET", "https://example.com/app.css", vec![], 200, "")];
        let oracle = ScriptedOracle::new();
        let engine = DiscoveryEngine::new(entries, HashMap::new(), HashMap::new(), 15);
        let err = engine.run(&oracle, "perform the action").unwrap_err();
        assert!(matches!(err, HarmapError::InvalidArgs(_)));
    }

    /// Budget: max_steps caps iterations without failing the run.
    #[test]
    fn max_steps_budget_is_non_fatal() {
        let entries = vec![
            har_entry("GET", "https://api.example.com/login", vec![], 200, r#"{"token":"T1"}"#),
            har_entry("POST", "https://api.example.com/do", vec![("t", "T1")], 200, "ok"),
        ];

        let oracle = ScriptedOracle::new();
        oracle.action_urls.borrow_mut().push_back("https://api.example.com/do".to_string());
        oracle.dynamic_parts.borrow_mut().push_back(vec!["T1".to_string()]);

        let engine = DiscoveryEngine::new(entries, HashMap::new(), HashMap::new(), 1);
        let outcome = engine.run(&oracle, "perform the action").unwrap();
        assert!(outcome.budget_exhausted);
    }
}
