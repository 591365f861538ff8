use thiserror::Error;

/// Conditions the aggregation engine reports to its caller. Everything else
/// (unknown roles, orphan questions, missing values) is dropped silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no observations to aggregate for survey {survey_id}")]
    NoData { survey_id: String },

    #[error("stage {stage} references unknown factor {factor}")]
    UnknownFactor { stage: String, factor: String },

    #[error("factor {factor} references unknown element {element}")]
    UnknownElement { factor: String, element: String },

    #[error("factor {0} is not assigned to any stage")]
    UnstagedFactor(String),

    #[error("stage {0} is defined more than once")]
    DuplicateStage(String),

    #[error("stage table must have {expected} stages, found {found}")]
    StageCount { expected: usize, found: usize },

    #[error("factor {factor} is listed under both {first} and {second}")]
    FactorInSeveralStages {
        factor: String,
        first: String,
        second: String,
    },
}
