//! Run configuration types.
//!
//! [`RunConfig`] is the top-level description of one instrumentation run:
//! the target URL, the ordered passes with their network/cache conditions and
//! collector lists, the checks to execute, and the weighted categories that
//! aggregate them. Loaded from `lumen.toml` via [`crate::ConfigLoader`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Name of the canonical pass whose capture is published under the plain
/// `NetworkRecords` / `Trace` artifact names.
pub const DEFAULT_PASS: &str = "default";

/// Network condition applied before a pass navigates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetworkCondition {
    /// Leave the connection untouched.
    None,
    /// Emulate a constrained connection.
    Throttled {
        latency_ms: u64,
        download_kbps: u64,
        upload_kbps: u64,
    },
    /// Emulate a dropped connection.
    Offline,
}

impl Default for NetworkCondition {
    fn default() -> Self {
        NetworkCondition::None
    }
}

/// One controlled page-load cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassConfig {
    pub name: String,
    #[serde(default)]
    pub network: NetworkCondition,
    #[serde(default)]
    pub disable_cache: bool,
    #[serde(default)]
    pub record_trace: bool,
    #[serde(default)]
    pub record_network: bool,
    /// Whether the pass navigates to the run's target URL.
    #[serde(default = "default_true")]
    pub navigate: bool,
    /// Maximum wait for the load-complete signal.
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
    /// How long recording keeps running after load, to capture post-load
    /// asynchronous work.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Collector names, resolved against the collector catalog, invoked in
    /// this order.
    #[serde(default)]
    pub collectors: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_load_timeout_ms() -> u64 {
    30_000
}

fn default_settle_delay_ms() -> u64 {
    1_000
}

impl PassConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// A check to execute, by catalog name, with an optional weight override
/// applied wherever a category references the check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// One member of a category: a check name and its aggregation weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryMemberConfig {
    pub check: String,
    pub weight: f64,
}

/// A named, weighted grouping of check results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub members: Vec<CategoryMemberConfig>,
}

/// Full description of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub url: String,
    pub passes: Vec<PassConfig>,
    pub checks: Vec<CheckConfig>,
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            url: String::new(),
            passes: vec![PassConfig {
                name: DEFAULT_PASS.into(),
                network: NetworkCondition::None,
                disable_cache: true,
                record_trace: true,
                record_network: true,
                navigate: true,
                load_timeout_ms: default_load_timeout_ms(),
                settle_delay_ms: default_settle_delay_ms(),
                collectors: vec!["FinalUrl".into(), "ConsoleMessages".into()],
            }],
            checks: vec![
                CheckConfig {
                    name: "first-paint-latency".into(),
                    weight: None,
                },
                CheckConfig {
                    name: "all-requests-secure".into(),
                    weight: None,
                },
                CheckConfig {
                    name: "critical-chain-depth".into(),
                    weight: None,
                },
            ],
            categories: vec![CategoryConfig {
                name: "performance".into(),
                members: vec![
                    CategoryMemberConfig {
                        check: "first-paint-latency".into(),
                        weight: 5.0,
                    },
                    CategoryMemberConfig {
                        check: "all-requests-secure".into(),
                        weight: 3.0,
                    },
                    CategoryMemberConfig {
                        check: "critical-chain-depth".into(),
                        weight: 1.0,
                    },
                ],
            }],
        }
    }
}

impl RunConfig {
    /// Structural validation, run after loading and before a run starts.
    ///
    /// Catches the configuration errors the pipeline cannot recover from:
    /// duplicate pass names, duplicate check references, category members
    /// pointing at checks that are not configured, and passes that would do
    /// nothing at all.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::MissingUrl);
        }
        if self.passes.is_empty() {
            return Err(ConfigError::NoPasses);
        }

        let mut pass_names = HashSet::new();
        for pass in &self.passes {
            if !pass_names.insert(pass.name.as_str()) {
                return Err(ConfigError::DuplicatePass {
                    name: pass.name.clone(),
                });
            }
            if pass.collectors.is_empty() && !pass.record_trace && !pass.record_network {
                return Err(ConfigError::EmptyPass {
                    name: pass.name.clone(),
                });
            }
        }

        let mut check_names = HashSet::new();
        for check in &self.checks {
            if !check_names.insert(check.name.as_str()) {
                return Err(ConfigError::DuplicateCheck {
                    name: check.name.clone(),
                });
            }
        }

        for category in &self.categories {
            for member in &category.members {
                if !check_names.contains(member.check.as_str()) {
                    return Err(ConfigError::UnknownCheck {
                        category: category.name.clone(),
                        check: member.check.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Configuration errors detected before a run starts.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("run config has no target url")]
    MissingUrl,

    #[error("run config declares no passes")]
    NoPasses,

    #[error("pass '{name}' is declared twice")]
    DuplicatePass { name: String },

    #[error("pass '{name}' has no collectors and records nothing")]
    EmptyPass { name: String },

    #[error("check '{name}' is configured twice")]
    DuplicateCheck { name: String },

    #[error("category '{category}' references unconfigured check '{check}'")]
    UnknownCheck { category: String, check: String },

    #[error("failed to parse config: {detail}")]
    Parse { detail: String },

    #[error("failed to read config file '{path}': {detail}")]
    Io { path: String, detail: String },
}
