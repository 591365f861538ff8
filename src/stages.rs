use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::Catalog;

pub const STAGE_COUNT: usize = 3;

/// One of the top-level stages and the factors that feed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDef {
    pub id: String,
    pub name: String,
    pub factors: Vec<String>,
}

/// Fixed stage -> factor lookup. Built once at startup and validated against
/// the catalog before any aggregation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTable {
    stages: Vec<StageDef>,
}

impl Default for StageTable {
    fn default() -> Self {
        fn ids(range: std::ops::RangeInclusive<u32>) -> Vec<String> {
            range.map(|i| format!("F{i:02}")).collect()
        }

        Self {
            stages: vec![
                StageDef {
                    id: "C1".to_string(),
                    name: "STAGE1 Sources of organizational vitality".to_string(),
                    factors: ids(1..=9),
                },
                StageDef {
                    id: "C2".to_string(),
                    name: "STAGE2 Engagement".to_string(),
                    factors: ids(10..=11),
                },
                StageDef {
                    id: "C3".to_string(),
                    name: "STAGE3 Team strength and sustainability".to_string(),
                    factors: ids(12..=18),
                },
            ],
        }
    }
}

impl StageTable {
    /// Rejects duplicate stage ids, a stage count other than
    /// [`STAGE_COUNT`], and factors claimed by more than one stage.
    pub fn new(stages: Vec<StageDef>) -> Result<Self, EngineError> {
        let mut seen = HashSet::new();
        for stage in &stages {
            if !seen.insert(stage.id.as_str()) {
                return Err(EngineError::DuplicateStage(stage.id.clone()));
            }
        }
        if stages.len() != STAGE_COUNT {
            return Err(EngineError::StageCount {
                expected: STAGE_COUNT,
                found: stages.len(),
            });
        }

        let mut owner: HashMap<&str, &str> = HashMap::new();
        for stage in &stages {
            for factor in &stage.factors {
                if let Some(first) = owner.insert(factor.as_str(), stage.id.as_str()) {
                    return Err(EngineError::FactorInSeveralStages {
                        factor: factor.clone(),
                        first: first.to_string(),
                        second: stage.id.clone(),
                    });
                }
            }
        }
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[StageDef] {
        &self.stages
    }

    /// Checks every stage factor and every factor element against the
    /// catalog, and that no catalog factor is left outside the stages.
    pub fn validate(&self, catalog: &Catalog) -> Result<(), EngineError> {
        let factor_ids: HashSet<&str> = catalog.factors.iter().map(|f| f.factor_id.as_str()).collect();
        let element_ids: HashSet<&str> = catalog
            .elements
            .iter()
            .map(|e| e.element_id.as_str())
            .collect();

        for stage in &self.stages {
            if let Some(missing) = stage.factors.iter().find(|f| !factor_ids.contains(f.as_str())) {
                return Err(EngineError::UnknownFactor {
                    stage: stage.id.clone(),
                    factor: missing.clone(),
                });
            }
        }
        let staged: HashSet<&str> = self
            .stages
            .iter()
            .flat_map(|s| s.factors.iter().map(String::as_str))
            .collect();
        if let Some(loose) = catalog
            .factors
            .iter()
            .find(|f| !staged.contains(f.factor_id.as_str()))
        {
            return Err(EngineError::UnstagedFactor(loose.factor_id.clone()));
        }
        for factor in &catalog.factors {
            if let Some(missing) = factor
                .element_ids
                .iter()
                .find(|e| !element_ids.contains(e.as_str()))
            {
                return Err(EngineError::UnknownElement {
                    factor: factor.factor_id.clone(),
                    element: missing.clone(),
                });
            }
        }
        Ok(())
    }
}
