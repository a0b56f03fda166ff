use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::feature::{Feature, LibraryType};
use crate::schedule::RunTime;

/// Listing a large library can keep Plex busy for minutes.
const MIN_TIMEOUT_SECS: u64 = 180;

/// Raw configuration for the audit, before validation.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaidConfig {
    /// Plex server base URL (required)
    pub plex_url: Option<String>,
    /// Plex authentication token (required)
    pub plex_token: Option<String>,
    /// HTTP timeout in seconds for every server request
    pub timeout_secs: u64,
    /// Run a single audit pass and exit
    pub run_once: bool,
    /// Daily run time, `HH:MM` or `HH:MM:SS`
    pub run_time: String,
    /// In recurring mode, also run once right after start-up
    pub run_on_startup: bool,
    /// Library types to skip entirely (movie, show, photo)
    pub skip_library_types: Vec<String>,
    /// Library titles to skip entirely
    pub skip_library_names: Vec<String>,
    pub check_previews: bool,
    pub check_voice_activity: bool,
    pub check_intro_markers: bool,
    pub check_credits_markers: bool,
    /// Enable debug logging
    pub debug: bool,
    /// Directory for the rotating log file; console only when unset
    pub log_dir: Option<PathBuf>,
    /// Idle-loop wake-up interval in seconds
    pub poll_interval_secs: u64,
    /// Environment values that could not be parsed, reported by `validate`
    #[serde(skip)]
    rejected_env: Vec<(String, String)>,
}

impl std::fmt::Debug for MaidConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaidConfig")
            .field("plex_url", &self.plex_url)
            .field("plex_token", &self.plex_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("run_once", &self.run_once)
            .field("run_time", &self.run_time)
            .field("run_on_startup", &self.run_on_startup)
            .field("skip_library_types", &self.skip_library_types)
            .field("skip_library_names", &self.skip_library_names)
            .field("check_previews", &self.check_previews)
            .field("check_voice_activity", &self.check_voice_activity)
            .field("check_intro_markers", &self.check_intro_markers)
            .field("check_credits_markers", &self.check_credits_markers)
            .field("debug", &self.debug)
            .field("log_dir", &self.log_dir)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .finish()
    }
}

impl Default for MaidConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl MaidConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            plex_url: None,
            plex_token: None,
            timeout_secs: 600,
            run_once: false,
            run_time: "00:00".to_string(),
            run_on_startup: true,
            skip_library_types: Vec::new(),
            skip_library_names: Vec::new(),
            check_previews: true,
            check_voice_activity: false,
            check_intro_markers: false,
            check_credits_markers: false,
            debug: false,
            log_dir: None,
            poll_interval_secs: 1,
            rejected_env: Vec::new(),
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            }
        }

        Ok(config)
    }

    /// Override fields from the process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Override fields from environment-style key/value lookups.
    ///
    /// Unset keys leave the current value alone.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PLEX_URL") {
            self.plex_url = non_empty(v);
        }
        if let Some(v) = lookup("PLEX_TOKEN") {
            self.plex_token = non_empty(v);
        }
        if let Some(v) = lookup("PLEX_TIMEOUT") {
            match v.trim().parse() {
                Ok(secs) => self.timeout_secs = secs,
                Err(_) => self.rejected_env.push(("PLEX_TIMEOUT".to_string(), v)),
            }
        }
        if let Some(v) = lookup("RUN_ONCE") {
            self.run_once = parse_flag(&v);
        }
        if let Some(v) = lookup("RUN_TIME") {
            self.run_time = v.trim().to_string();
        }
        if let Some(v) = lookup("RUN_ON_STARTUP") {
            self.run_on_startup = parse_flag(&v);
        }
        if let Some(v) = lookup("SKIP_LIBRARY_TYPES") {
            self.skip_library_types = parse_list(&v);
        }
        if let Some(v) = lookup("SKIP_LIBRARY_NAMES") {
            self.skip_library_names = parse_list(&v);
        }
        if let Some(v) = lookup("CHECK_PREVIEWS") {
            self.check_previews = parse_flag(&v);
        }
        if let Some(v) = lookup("CHECK_VOICE_ACTIVITY") {
            self.check_voice_activity = parse_flag(&v);
        }
        if let Some(v) = lookup("CHECK_INTRO_MARKERS") {
            self.check_intro_markers = parse_flag(&v);
        }
        if let Some(v) = lookup("CHECK_CREDITS_MARKERS") {
            self.check_credits_markers = parse_flag(&v);
        }
        if let Some(v) = lookup("DEBUG") {
            self.debug = parse_flag(&v);
        }
        if let Some(v) = lookup("LOG_DIR") {
            self.log_dir = non_empty(v).map(PathBuf::from);
        }
        if let Some(v) = lookup("POLL_INTERVAL") {
            match v.trim().parse() {
                Ok(secs) => self.poll_interval_secs = secs,
                Err(_) => self.rejected_env.push(("POLL_INTERVAL".to_string(), v)),
            }
        }
    }

    /// Features switched on, in evaluation order.
    pub fn enabled_features(&self) -> Vec<Feature> {
        Feature::ALL
            .into_iter()
            .filter(|f| match f {
                Feature::Bif => self.check_previews,
                Feature::VoiceActivity => self.check_voice_activity,
                Feature::IntroMarker => self.check_intro_markers,
                Feature::CreditsMarker => self.check_credits_markers,
            })
            .collect()
    }

    /// Validate, logging the problem when the configuration is unusable.
    pub fn plan(&self) -> Option<AuditPlan> {
        match self.validate() {
            Ok(plan) => Some(plan),
            Err(e) => {
                error!("Invalid configuration: {}", e);
                None
            }
        }
    }

    /// Check everything that can be checked without a server and produce a plan.
    ///
    /// Out-of-range numbers are clamped and unparsable ones ignored, each
    /// with a warning. Call after logging is initialised.
    pub fn validate(&self) -> Result<AuditPlan, ConfigError> {
        let server_url = self
            .plex_url
            .clone()
            .ok_or(ConfigError::MissingCredential("PLEX_URL"))?;
        let token = self
            .plex_token
            .clone()
            .ok_or(ConfigError::MissingCredential("PLEX_TOKEN"))?;

        let skip_types = self
            .skip_library_types
            .iter()
            .map(|t| t.parse::<LibraryType>())
            .collect::<Result<HashSet<_>, _>>()?;

        let run_time = RunTime::parse(&self.run_time)?;

        let features = self.enabled_features();
        if features.is_empty() {
            return Err(ConfigError::NoFeatureEnabled);
        }

        for (key, value) in &self.rejected_env {
            warn!("Ignoring {}={:?}: expected a whole number of seconds", key, value);
        }
        if self.timeout_secs < MIN_TIMEOUT_SECS {
            warn!(
                "Request timeout of {}s is too short, using {}s",
                self.timeout_secs, MIN_TIMEOUT_SECS
            );
        }
        if self.poll_interval_secs == 0 {
            warn!("Poll interval of 0s is not allowed, using 1s");
        }

        Ok(AuditPlan {
            server_url,
            token,
            timeout: Duration::from_secs(self.timeout_secs.max(MIN_TIMEOUT_SECS)),
            mode: if self.run_once {
                RunMode::Once
            } else {
                RunMode::Daily(run_time)
            },
            run_on_startup: self.run_on_startup,
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            skip_types,
            skip_names: self.skip_library_names.iter().cloned().collect(),
            features,
            debug: self.debug,
            log_dir: self.log_dir.clone(),
        })
    }
}

/// One-shot or daily recurring execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Daily(RunTime),
}

/// Validated configuration, fixed for the life of the process.
#[derive(Clone)]
pub struct AuditPlan {
    pub server_url: String,
    pub token: String,
    pub timeout: Duration,
    pub mode: RunMode,
    pub run_on_startup: bool,
    pub poll_interval: Duration,
    pub skip_types: HashSet<LibraryType>,
    pub skip_names: HashSet<String>,
    pub features: Vec<Feature>,
    pub debug: bool,
    pub log_dir: Option<PathBuf>,
}

impl std::fmt::Debug for AuditPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditPlan")
            .field("server_url", &self.server_url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("mode", &self.mode)
            .field("run_on_startup", &self.run_on_startup)
            .field("poll_interval", &self.poll_interval)
            .field("skip_types", &self.skip_types)
            .field("skip_names", &self.skip_names)
            .field("features", &self.features)
            .field("debug", &self.debug)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

fn non_empty(v: String) -> Option<String> {
    let v = v.trim();
    (!v.is_empty()).then(|| v.to_string())
}

/// Unrecognised non-empty values count as set.
pub fn parse_flag(v: &str) -> bool {
    !matches!(
        v.trim().to_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

pub fn parse_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
