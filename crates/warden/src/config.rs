use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use warden_policy::combining::{CombiningAlgorithmRegistry, ONLY_ONE_APPLICABLE};
use warden_policy::value::temporal::parse_offset;
use warden_policy::EngineOptions;

use crate::error::{RootError, RootResult};

/// Which repository holds the deployed policies.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKind {
    /// Keeps deployment order; ordered root algorithms rely on it.
    #[default]
    Ordered,
    Unordered,
}

/// Configuration for the decision point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdpConfig {
    /// Policy-combining algorithm applied across the deployed policies.
    #[serde(default = "default_root_algorithm")]
    pub root_combining_algorithm: String,

    /// Time zone assumed for date and time values without one (`Z` or `±hh:mm`).
    #[serde(default = "default_timezone")]
    pub implicit_timezone: String,

    /// Timeout in milliseconds for a single remote policy lookup.
    #[serde(default = "default_reference_timeout")]
    pub reference_timeout_ms: u64,

    /// Maximum nesting of policy references.
    #[serde(default = "default_max_reference_depth")]
    pub max_reference_depth: usize,

    /// Include the applicable policy ids in every response.
    #[serde(default)]
    pub return_policy_id_list: bool,

    #[serde(default)]
    pub repository: RepositoryKind,
}

fn default_root_algorithm() -> String {
    ONLY_ONE_APPLICABLE.to_string()
}

fn default_timezone() -> String {
    "Z".to_string()
}

fn default_reference_timeout() -> u64 {
    2_000
}

fn default_max_reference_depth() -> usize {
    16
}

impl Default for PdpConfig {
    fn default() -> Self {
        Self {
            root_combining_algorithm: default_root_algorithm(),
            implicit_timezone: default_timezone(),
            reference_timeout_ms: default_reference_timeout(),
            max_reference_depth: default_max_reference_depth(),
            return_policy_id_list: false,
            repository: RepositoryKind::default(),
        }
    }
}

impl PdpConfig {
    /// Translate into engine options. Assumes [`RootConfig::validate`] passed.
    pub fn engine_options(&self) -> RootResult<EngineOptions> {
        let implicit_offset = parse_offset(&self.implicit_timezone).map_err(RootError::Config)?;
        Ok(EngineOptions {
            root_combining_algorithm: self.root_combining_algorithm.clone(),
            implicit_offset,
            max_reference_depth: self.max_reference_depth,
            return_policy_id_list: self.return_policy_id_list,
            reference_timeout: Duration::from_millis(self.reference_timeout_ms),
        })
    }
}

/// Policy documents deployed at start-up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoliciesConfig {
    /// JSON files, each holding one policy or policy set or an array of them.
    /// Relative paths are resolved against the working directory.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

/// Top-level configuration for the Warden binary.
///
/// Loaded from a TOML file (typically `~/.warden/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootConfig {
    #[serde(default)]
    pub pdp: PdpConfig,

    #[serde(default)]
    pub policies: PoliciesConfig,
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl RootConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        let algorithms = CombiningAlgorithmRegistry::standard();
        if algorithms
            .policy_algorithm(&self.pdp.root_combining_algorithm)
            .is_none()
        {
            return Err(RootError::Config(format!(
                "root_combining_algorithm '{}' is not a policy-combining algorithm",
                self.pdp.root_combining_algorithm
            )));
        }
        parse_offset(&self.pdp.implicit_timezone).map_err(RootError::Config)?;
        if self.pdp.reference_timeout_ms == 0 {
            return Err(RootError::Config("reference_timeout_ms must be > 0".into()));
        }
        if self.pdp.max_reference_depth == 0 {
            return Err(RootError::Config("max_reference_depth must be > 0".into()));
        }
        Ok(())
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".warden/config.toml")
    }
}
