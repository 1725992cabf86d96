//! Application-level configuration loading: match rules, timer cadence and access tokens.

use std::{collections::HashMap, env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

use crate::state::{access::Role, matches::MatchRules};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BRACKET_LIVE_CONFIG_PATH";

const DEFAULT_MATCH_DURATION_SECS: u32 = 180;
const DEFAULT_ADD_TIME_SECS: u32 = 30;
const DEFAULT_PENALTY: &str = "Warning";
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_PERSIST_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_FOCUS_THRESHOLD_SECS: u32 = 30;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    rules: MatchRules,
    tick_interval: Duration,
    persist_timeout: Duration,
    focus_threshold_secs: u32,
    admin_tokens: Vec<String>,
    referee_tokens: HashMap<String, String>,
    enforce_referee_assignment: bool,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        admins = app_config.admin_tokens.len(),
                        referees = app_config.referee_tokens.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Rules applied by referee commands and bracket generation.
    pub fn rules(&self) -> &MatchRules {
        &self.rules
    }

    /// Period of the match timer loop.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Upper bound for a single storage write issued by the engine.
    pub fn persist_timeout(&self) -> Duration {
        self.persist_timeout
    }

    /// Remaining seconds under which an active match counts as "about to finish".
    pub fn focus_threshold_secs(&self) -> u32 {
        self.focus_threshold_secs
    }

    /// Whether referees may only control the matches assigned to them.
    pub fn enforce_referee_assignment(&self) -> bool {
        self.enforce_referee_assignment
    }

    /// Resolve the role carried by an opaque access token.
    pub fn resolve_role(&self, token: Option<&str>) -> Role {
        let Some(token) = token.filter(|value| !value.is_empty()) else {
            return Role::Viewer;
        };

        if self.admin_tokens.iter().any(|admin| admin == token) {
            return Role::Admin;
        }

        match self.referee_tokens.get(token) {
            Some(referee_id) => Role::Referee(referee_id.clone()),
            None => Role::Viewer,
        }
    }

    /// Return a copy with the given admin token registered. Mostly useful for tests and tooling.
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_tokens.push(token.into());
        self
    }

    /// Return a copy with the given referee token registered.
    pub fn with_referee_token(
        mut self,
        token: impl Into<String>,
        referee_id: impl Into<String>,
    ) -> Self {
        self.referee_tokens.insert(token.into(), referee_id.into());
        self
    }

    /// Return a copy with a different storage write deadline.
    pub fn with_persist_timeout(mut self, limit: Duration) -> Self {
        self.persist_timeout = limit;
        self
    }

    /// Return a copy ticking at a different period.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Return a copy that restricts referees to their assigned matches.
    pub fn with_referee_assignment(mut self, enforce: bool) -> Self {
        self.enforce_referee_assignment = enforce;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules: MatchRules::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            persist_timeout: DEFAULT_PERSIST_TIMEOUT,
            focus_threshold_secs: DEFAULT_FOCUS_THRESHOLD_SECS,
            admin_tokens: Vec::new(),
            referee_tokens: HashMap::new(),
            enforce_referee_assignment: false,
        }
    }
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            match_duration_secs: DEFAULT_MATCH_DURATION_SECS,
            add_time_secs: DEFAULT_ADD_TIME_SECS,
            default_penalty: DEFAULT_PENALTY.to_string(),
        }
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    match_duration_secs: Option<u32>,
    #[serde(default)]
    add_time_secs: Option<u32>,
    #[serde(default)]
    default_penalty: Option<String>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default, rename = "tick_interval_ms")]
    tick_interval: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default, rename = "persist_timeout_ms")]
    persist_timeout: Option<Duration>,
    #[serde(default)]
    focus_threshold_secs: Option<u32>,
    #[serde(default)]
    admin_tokens: Vec<String>,
    #[serde(default)]
    referees: Vec<RawReferee>,
    #[serde(default)]
    enforce_referee_assignment: bool,
}

#[derive(Debug, Deserialize)]
/// JSON representation of a referee access entry.
struct RawReferee {
    token: String,
    referee_id: String,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = MatchRules::default();
        let rules = MatchRules {
            match_duration_secs: value
                .match_duration_secs
                .unwrap_or(defaults.match_duration_secs),
            add_time_secs: value.add_time_secs.unwrap_or(defaults.add_time_secs),
            default_penalty: value
                .default_penalty
                .filter(|label| !label.trim().is_empty())
                .unwrap_or(defaults.default_penalty),
        };

        Self {
            rules,
            tick_interval: value
                .tick_interval
                .filter(|interval| !interval.is_zero())
                .unwrap_or(DEFAULT_TICK_INTERVAL),
            persist_timeout: value.persist_timeout.unwrap_or(DEFAULT_PERSIST_TIMEOUT),
            focus_threshold_secs: value
                .focus_threshold_secs
                .unwrap_or(DEFAULT_FOCUS_THRESHOLD_SECS),
            admin_tokens: value.admin_tokens,
            referee_tokens: value
                .referees
                .into_iter()
                .map(|referee| (referee.token, referee.referee_id))
                .collect(),
            enforce_referee_assignment: value.enforce_referee_assignment,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
