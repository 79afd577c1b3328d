//! Config-file + CLI-flag layering (SS6), in the shape this project's existing
//! `config.rs`/`router.rs` use: an `Option<T>`-field config struct merged from
//! every config file found on a search path, then overridden field-by-field by
//! whatever CLI flags the caller actually passed.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discover: Option<DiscoverConfig>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DiscoverConfig {
    pub har: Option<PathBuf>,
    pub cookies: Option<PathBuf>,
    pub model: Option<String>,
    pub alternate_model: Option<String>,
    pub max_steps: Option<usize>,
    pub oracle_endpoint: Option<String>,
    pub oracle_api_key_env: Option<String>,
    pub format: Option<String>,
    pub out: Option<PathBuf>,
}

impl DiscoverConfig {
    fn merge(&mut self, other: DiscoverConfig) {
        merge_opt(&mut self.har, other.har);
        merge_opt(&mut self.cookies, other.cookies);
        merge_opt(&mut self.model, other.model);
        merge_opt(&mut self.alternate_model, other.alternate_model);
        merge_opt(&mut self.max_steps, other.max_steps);
        merge_opt(&mut self.oracle_endpoint, other.oracle_endpoint);
        merge_opt(&mut self.oracle_api_key_env, other.oracle_api_key_env);
        merge_opt(&mut self.format, other.format);
        merge_opt(&mut self.out, other.out);
    }
}

fn merge_opt<T>(base: &mut Option<T>, other: Option<T>) {
    if other.is_some() {
        *base = other;
    }
}

/// Built-in literal defaults, the final fallback once no config file and no CLI
/// flag supplied a value (SS6).
#[derive(Clone, Debug, Serialize)]
pub struct ResolvedDiscoverConfig {
    pub har: PathBuf,
    pub cookies: PathBuf,
    pub model: String,
    pub alternate_model: Option<String>,
    pub max_steps: usize,
    pub oracle_endpoint: String,
    pub oracle_api_key_env: String,
    pub format: String,
    pub out: PathBuf,
}

impl Default for ResolvedDiscoverConfig {
    fn default() -> Self {
        ResolvedDiscoverConfig {
            har: PathBuf::from("network_requests.har"),
            cookies: PathBuf::from("cookies.json"),
            model: "gpt-4o".to_string(),
            alternate_model: None,
            max_steps: 15,
            oracle_endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            oracle_api_key_env: "OPENAI_API_KEY".to_string(),
            format: "text".to_string(),
            out: PathBuf::from("."),
        }
    }
}

impl ResolvedDiscoverConfig {
    pub fn from_config(config: &Config) -> Self {
        let mut resolved = ResolvedDiscoverConfig::default();
        if let Some(cfg) = &config.discover {
            if let Some(v) = &cfg.har {
                resolved.har = v.clone();
            }
            if let Some(v) = &cfg.cookies {
                resolved.cookies = v.clone();
            }
            if let Some(v) = &cfg.model {
                resolved.model = v.clone();
            }
            if cfg.alternate_model.is_some() {
                resolved.alternate_model = cfg.alternate_model.clone();
            }
            if let Some(v) = cfg.max_steps {
                resolved.max_steps = v;
            }
            if let Some(v) = &cfg.oracle_endpoint {
                resolved.oracle_endpoint = v.clone();
            }
            if let Some(v) = &cfg.oracle_api_key_env {
                resolved.oracle_api_key_env = v.clone();
            }
            if let Some(v) = &cfg.format {
                resolved.format = v.clone();
            }
            if let Some(v) = &cfg.out {
                resolved.out = v.clone();
            }
        }
        resolved
    }
}

/// Loads every `harmap.toml`/`.harmaprc` found on the search path (home directory,
/// XDG config dir, and every ancestor of the current directory), merging later
/// (more specific) files over earlier ones. `override_path`, when given (the
/// CLI's `--config <PATH>`), is read instead of the search path.
pub fn load_config(override_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = override_path {
        let contents = fs::read_to_string(path)?;
        return Ok(toml::from_str(&contents)?);
    }

    let mut config = Config::default();
    for path in config_search_paths() {
        if !path.exists() {
            continue;
        }
        let contents = fs::read_to_string(&path)?;
        let parsed: Config = toml::from_str(&contents)?;
        merge_section(&mut config.discover, parsed.discover, DiscoverConfig::merge);
    }
    Ok(config)
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
    if let Some(other_section) = other {
        match base {
            Some(existing) => merge(existing, other_section),
            None => *base = Some(other_section),
        }
    }
}

fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(home) = home_dir() {
        if let Some(config_home) = config_home_dir(&home) {
            paths.push(config_home.join("harmap").join("harmap.toml"));
        }
        paths.push(home.join(".harmaprc"));
    }

    if let Ok(cwd) = env::current_dir() {
        let mut dirs = Vec::new();
        let mut current: Option<&Path> = Some(cwd.as_path());
        while let Some(dir) = current {
            dirs.push(dir.to_path_buf());
            current = dir.parent();
        }
        dirs.reverse();
        for dir in dirs {
            paths.push(dir.join(".harmaprc"));
            paths.push(dir.join("harmap.toml"));
        }
    }

    paths
}

fn config_home_dir(home: &Path) -> Option<PathBuf> {
    if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg));
    }
    Some(home.join(".config"))
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
}

pub fn render_config(config: &ResolvedDiscoverConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}
