//! The Oracle Client (SS4.4): a uniform wrapper over a remote LLM's
//! function-calling interface. Grounded on `integuru/util/LLM.py` (default/alternate
//! model selection with fallback-to-default) and on this project's existing
//! `commands/replay.rs`/`commands/otel.rs`, which use a blocking `ureq::Agent` for
//! every outbound HTTP call this project makes rather than an async stack.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{HarmapError, Result};
use crate::har::loader::CandidateUrl;

/// The four reasoning calls required by the discovery engine, plus the two calls
/// used only during optional code emission (SS4.6), which is the sole stage where
/// the alternate ("stronger") model applies.
pub trait Oracle {
    fn identify_action_url(&self, candidates: &[CandidateUrl], user_prompt: &str) -> Result<String>;

    fn identify_dynamic_parts(&self, minified_curl: &str) -> Result<Vec<String>>;

    fn identify_input_variables(
        &self,
        curl: &str,
        input_variable_map: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>>;

    fn choose_simplest_request(&self, requests_as_strings: &[String]) -> Result<usize>;

    fn generate_code_snippet(&self, prompt: &str) -> Result<String>;

    fn aggregate_functions(&self, snippets: &[String]) -> Result<String>;
}

/// Model selection: a default model used for the four reasoning calls, and an
/// optional stronger model the emission stage may switch to. Failure of the
/// alternate model falls back to the default.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub default_model: String,
    pub alternate_model: Option<String>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            default_model: "gpt-4o".to_string(),
            alternate_model: None,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
        }
    }
}

/// A function-calling-capable HTTP oracle. Talks to any OpenAI-compatible
/// chat-completions-with-tools endpoint over a blocking `ureq::Agent`.
pub struct HttpOracle {
    config: OracleConfig,
    agent: ureq::Agent,
}

impl HttpOracle {
    pub fn new(config: OracleConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout_read(config.read_timeout)
            .build();
        HttpOracle { config, agent }
    }

    fn call_function(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        function_name: &str,
        parameters_schema: Value,
    ) -> Result<Value> {
        let body = json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "tools": [{
                "type": "function",
                "function": {
                    "name": function_name,
                    "parameters": parameters_schema,
                }
            }],
            "tool_choice": {"type": "function", "function": {"name": function_name}},
        });

        let mut request = self.agent.post(&self.config.endpoint);
        if let Some(key) = &self.config.api_key {
            request = request.set("Authorization", &format!("Bearer {key}"));
        }

        let response = request.send_json(body).map_err(|err| match err {
            ureq::Error::Status(code, resp) => {
                let detail = resp.into_string().unwrap_or_default();
                HarmapError::Oracle(format!("oracle HTTP {code}: {detail}"))
            }
            ureq::Error::Transport(t) => HarmapError::Oracle(format!("oracle transport error: {t}")),
        })?;

        let parsed: ChatCompletionResponse = response
            .into_json()
            .map_err(|e| HarmapError::Oracle(format!("malformed oracle response: {e}")))?;

        let call = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.tool_calls)
            .and_then(|calls| calls.into_iter().next())
            .ok_or_else(|| HarmapError::Oracle("oracle returned no tool call".to_string()))?;

        serde_json::from_str(&call.function.arguments)
            .map_err(|e| HarmapError::Oracle(format!("malformed function arguments: {e}")))
    }

    /// Runs `call` against the alternate model if configured, falling back to the
    /// default model on any failure (SS4.4/SS4.6).
    fn call_with_fallback(&self, system_prompt: &str, user_prompt: &str, function_name: &str, schema: Value) -> Result<Value> {
        if let Some(alternate) = &self.config.alternate_model {
            match self.call_function(alternate, system_prompt, user_prompt, function_name, schema.clone()) {
                Ok(value) => return Ok(value),
                Err(_) => {
                    eprintln!("alternate model '{alternate}' failed; falling back to default model");
                }
            }
        }
        self.call_function(&self.config.default_model, system_prompt, user_prompt, function_name, schema)
    }
}

impl Oracle for HttpOracle {
    fn identify_action_url(&self, candidates: &[CandidateUrl], user_prompt: &str) -> Result<String> {
        let listing: String = candidates
            .iter()
            .map(|c| format!("{} {} [{}] {}", c.method, c.url, c.content_type, c.preview))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Candidate requests captured from a browser session:\n{listing}\n\nUser-described action: {user_prompt}\n\nPick the single request that performs this action."
        );
        let schema = json!({
            "type": "object",
            "properties": {"url": {"type": "string"}},
            "required": ["url"],
        });
        let value = self.call_function(
            &self.config.default_model,
            "You identify which captured HTTP request performs a described user action.",
            &prompt,
            "identify_action_url",
            schema,
        )?;
        let url = value
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| HarmapError::Oracle("identify_action_url: missing 'url'".to_string()))?
            .to_string();
        if !candidates.iter().any(|c| c.url == url) {
            return Err(HarmapError::Oracle(format!(
                "oracle chose URL '{url}' outside the candidate list"
            )));
        }
        Ok(url)
    }

    fn identify_dynamic_parts(&self, minified_curl: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Request:\n{minified_curl}\n\nList the literal values in this request that are server-validated per-session (IDs, tokens, nonces) and must be sourced from elsewhere. Do not list keys, arbitrary user data, cookies, or common tracking headers."
        );
        let schema = json!({
            "type": "object",
            "properties": {"parts": {"type": "array", "items": {"type": "string"}}},
            "required": ["parts"],
        });
        let value = self.call_function(
            &self.config.default_model,
            "You identify server-validated dynamic values inside an HTTP request.",
            &prompt,
            "identify_dynamic_parts",
            schema,
        )?;
        Ok(value
            .get("parts")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default())
    }

    fn identify_input_variables(
        &self,
        curl: &str,
        input_variable_map: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>> {
        let vars: String = input_variable_map
            .iter()
            .map(|(k, v)| format!("{k} = {v}"))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Request:\n{curl}\n\nCaller-supplied variables:\n{vars}\n\nReport only the variables whose value literally appears in the request, mapped to that literal as it appears."
        );
        let schema = json!({
            "type": "object",
            "properties": {"variables": {"type": "object", "additionalProperties": {"type": "string"}}},
            "required": ["variables"],
        });
        let value = self.call_function(
            &self.config.default_model,
            "You reconcile caller-supplied input variables against a request's literal contents.",
            &prompt,
            "identify_input_variables",
            schema,
        )?;
        let mut out = HashMap::new();
        if let Some(obj) = value.get("variables").and_then(Value::as_object) {
            for (k, v) in obj {
                if let Some(s) = v.as_str() {
                    out.insert(k.clone(), s.to_string());
                }
            }
        }
        Ok(out)
    }

    fn choose_simplest_request(&self, requests_as_strings: &[String]) -> Result<usize> {
        let listing: String = requests_as_strings
            .iter()
            .enumerate()
            .map(|(i, s)| format!("[{i}] {s}"))
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = format!(
            "Multiple candidate upstream requests could have produced the same value:\n{listing}\n\nPick the index of the one with the fewest further dependencies."
        );
        let schema = json!({
            "type": "object",
            "properties": {"index": {"type": "integer"}},
            "required": ["index"],
        });
        let value = self.call_function(
            &self.config.default_model,
            "You pick the simplest of several candidate HTTP requests.",
            &prompt,
            "choose_simplest_request",
            schema,
        )?;
        let index = value
            .get("index")
            .and_then(Value::as_u64)
            .ok_or_else(|| HarmapError::Oracle("choose_simplest_request: missing 'index'".to_string()))?
            as usize;
        if index >= requests_as_strings.len() {
            return Err(HarmapError::Oracle(format!(
                "oracle chose index {index} outside range 0..{}",
                requests_as_strings.len()
            )));
        }
        Ok(index)
    }

    fn generate_code_snippet(&self, prompt: &str) -> Result<String> {
        let schema = json!({
            "type": "object",
            "properties": {"code": {"type": "string"}},
            "required": ["code"],
        });
        let value = self.call_with_fallback(
            "You write a callable code snippet that reproduces one HTTP request in a dependency chain.",
            prompt,
            "generate_code_snippet",
            schema,
        )?;
        value
            .get("code")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| HarmapError::Oracle("generate_code_snippet: missing 'code'".to_string()))
    }

    fn aggregate_functions(&self, snippets: &[String]) -> Result<String> {
        let joined = snippets.join("\n\n");
        let prompt = format!(
            "Stitch the following per-request snippets into one runnable program, wiring each snippet's output into the next snippet's input:\n\n{joined}"
        );
        let schema = json!({
            "type": "object",
            "properties": {"code": {"type": "string"}},
            "required": ["code"],
        });
        let value = self.call_with_fallback(
            "You stitch a sequence of HTTP-request snippets into one runnable program.",
            &prompt,
            "aggregate_functions",
            schema,
        )?;
        value
            .get("code")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| HarmapError::Oracle("aggregate_functions: missing 'code'".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize, Serialize)]
struct FunctionCall {
    arguments: String,
}

/// A deterministic, scripted `Oracle` used by the discovery engine's own tests
/// (SS9: "oracle as a pure side-effecting dependency"). Each method pulls its next
/// scripted answer off a queue; calling it past the end of the queue is a test
/// authoring error and panics immediately, to make missing stub setup obvious.
#[derive(Default)]
pub struct ScriptedOracle {
    pub action_urls: std::cell::RefCell<std::collections::VecDeque<String>>,
    pub dynamic_parts: std::cell::RefCell<std::collections::VecDeque<Vec<String>>>,
    pub input_variables: std::cell::RefCell<std::collections::VecDeque<HashMap<String, String>>>,
    pub simplest_choices: std::cell::RefCell<std::collections::VecDeque<usize>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Oracle for ScriptedOracle {
    fn identify_action_url(&self, _candidates: &[CandidateUrl], _user_prompt: &str) -> Result<String> {
        Ok(self
            .action_urls
            .borrow_mut()
            .pop_front()
            .expect("ScriptedOracle: no scripted action_url left"))
    }

    fn identify_dynamic_parts(&self, _minified_curl: &str) -> Result<Vec<String>> {
        Ok(self
            .dynamic_parts
            .borrow_mut()
            .pop_front()
            .expect("ScriptedOracle: no scripted dynamic_parts left"))
    }

    fn identify_input_variables(
        &self,
        _curl: &str,
        _input_variable_map: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>> {
        Ok(self.input_variables.borrow_mut().pop_front().unwrap_or_default())
    }

    fn choose_simplest_request(&self, requests_as_strings: &[String]) -> Result<usize> {
        let idx = self
            .simplest_choices
            .borrow_mut()
            .pop_front()
            .expect("ScriptedOracle: no scripted simplest choice left");
        if idx >= requests_as_strings.len() {
            return Err(HarmapError::Oracle("scripted index out of range".to_string()));
        }
        Ok(idx)
    }

    fn generate_code_snippet(&self, prompt: &str) -> Result<String> {
        Ok(format!("# snippet for: {prompt}"))
    }

    fn aggregate_functions(&self, snippets: &[String]) -> Result<String> {
        Ok(snippets.join("\n"))
    }
}
