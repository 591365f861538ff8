//! `pulse.toml` handling.
//!
//! Every section is optional; a missing file means defaults throughout.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::Engine;
use crate::mapping::{default_same_as_rules, SameAsRule};
use crate::ranking::DEFAULT_TOP_N;
use crate::signal::SignalThresholds;
use crate::stages::{StageDef, StageTable};

pub const DEFAULT_CONFIG_FILE: &str = "pulse.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub signal: SignalThresholds,

    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub report: ReportConfig,

    /// Same-as copy rules applied before scoring.
    #[serde(default = "default_same_as_rules")]
    pub same_as: Vec<SameAsRule>,

    /// Stage -> factor table.
    #[serde(default = "default_stages")]
    pub stages: Vec<StageDef>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signal: SignalThresholds::default(),
            ranking: RankingConfig::default(),
            report: ReportConfig::default(),
            same_as: default_same_as_rules(),
            stages: default_stages(),
        }
    }
}

fn default_stages() -> Vec<StageDef> {
    StageTable::default().stages().to_vec()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Segments with fewer respondents are masked in rendered output.
    #[serde(default = "default_min_n")]
    pub min_n_to_show: usize,

    /// Respondent attribute used for segment breakdowns.
    #[serde(default = "default_segment_by")]
    pub segment_by: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            min_n_to_show: default_min_n(),
            segment_by: default_segment_by(),
        }
    }
}

fn default_min_n() -> usize {
    5
}

fn default_segment_by() -> String {
    "store_code".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("Failed to serialize default config")
    }

    /// Builds the aggregation engine. Fails on a malformed stage table.
    pub fn engine(&self) -> Result<Engine> {
        let stages = StageTable::new(self.stages.clone()).context("Invalid stage table in config")?;
        Ok(Engine {
            stages,
            same_as: self.same_as.clone(),
            thresholds: self.signal,
            top_n: self.ranking.top_n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[signal]
mean_threshold = 4.0

[ranking]
top_n = 5

[[same_as]]
source = 10
target = 11
roles = ["MANAGER"]
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.signal.mean_threshold, 4.0);
        assert_eq!(config.signal.negative_rate_threshold, 0.10);
        assert_eq!(config.ranking.top_n, 5);
        assert_eq!(config.report, ReportConfig::default());
        assert_eq!(
            config.same_as,
            vec![SameAsRule {
                source: 10,
                target: 11,
                roles: vec![Role::Manager]
            }]
        );
        assert_eq!(config.stages.len(), 3);
    }

    #[test]
    fn default_toml_round_trips() {
        let text = Config::default_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn duplicate_stage_ids_are_rejected() {
        let mut config = Config::default();
        config.stages[1].id = "C1".to_string();
        assert!(config.engine().is_err());
        assert_eq!(Config::default().engine().unwrap().top_n, 3);
    }

    #[test]
    fn stage_tables_breaking_the_three_stage_shape_are_rejected() {
        let mut two_stages = Config::default();
        two_stages.stages.pop();
        let err = two_stages.engine().unwrap_err();
        assert!(format!("{err:#}").contains("must have 3 stages, found 2"));

        let mut shared_factor = Config::default();
        shared_factor.stages[1].factors.push("F01".to_string());
        let err = shared_factor.engine().unwrap_err();
        assert!(format!("{err:#}").contains("factor F01 is listed under both C1 and C2"));

        let mut both = Config::default();
        both.stages.pop();
        both.stages[1].factors.push("F01".to_string());
        assert!(both.engine().is_err());
    }
}
