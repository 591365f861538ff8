use chrono::{DateTime, Datelike, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::models::{Catalog, OrgUnit, Respondent, Response, SegmentScore, SurveySummary};
use crate::org::{segment_labeler, OrgFilter};

pub const OVERALL_SURVEY_ID: &str = "overall";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodData {
    pub summary: SurveySummary,
    pub segments: Vec<SegmentScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub generated_at: DateTime<Utc>,
    pub current: PeriodData,
    pub prev1: Option<PeriodData>,
    pub prev2: Option<PeriodData>,
    pub overall_avg: Option<PeriodData>,
}

/// Responses of one survey period as loaded from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodResponses {
    pub survey_id: String,
    pub responses: Vec<Response>,
}

/// Everything a comparison needs besides the period responses.
#[derive(Debug, Clone, Copy)]
pub struct Population<'a> {
    pub respondents: &'a [Respondent],
    pub org_units: &'a [OrgUnit],
    pub catalog: &'a Catalog,
}

pub fn current_survey_id() -> String {
    let today = Local::now().date_naive();
    format!("{}-{:02}", today.year(), today.month())
}

/// The two survey ids following `as_of` in a newest-first list.
pub fn previous_ids<'a>(
    all_ids: &'a [String],
    as_of: &str,
) -> (Option<&'a str>, Option<&'a str>) {
    let Some(idx) = all_ids.iter().position(|id| id == as_of) else {
        return (None, None);
    };
    (
        all_ids.get(idx + 1).map(String::as_str),
        all_ids.get(idx + 2).map(String::as_str),
    )
}

/// Summary plus segments for one period, or `None` when the period has no
/// usable responses.
pub fn build_period(
    engine: &Engine,
    survey_id: &str,
    responses: &[Response],
    respondents: &[Respondent],
    org_units: &[OrgUnit],
    catalog: &Catalog,
    segment_by: &str,
) -> Result<Option<PeriodData>, EngineError> {
    let summary = match engine.summarize(survey_id, responses, respondents, catalog) {
        Ok(summary) => summary,
        Err(EngineError::NoData { .. }) => {
            debug!(survey_id, "no data for period");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let segments = engine.segment_scores(
        responses,
        respondents,
        catalog,
        segment_by,
        segment_labeler(segment_by, org_units),
    );
    Ok(Some(PeriodData { summary, segments }))
}

/// Current period against the two prior ones, plus a baseline pooling every
/// period. The org filter narrows the period views; the baseline always
/// covers the whole organisation. `periods` must be ordered newest first.
pub fn compare_periods(
    engine: &Engine,
    as_of: &str,
    periods: &[PeriodResponses],
    population: Population<'_>,
    filter: &OrgFilter,
    segment_by: &str,
    generated_at: DateTime<Utc>,
) -> Result<Comparison, EngineError> {
    let Population {
        respondents,
        org_units,
        catalog,
    } = population;
    let scoped = filter.apply(respondents, org_units);
    let ids: Vec<String> = periods.iter().map(|p| p.survey_id.clone()).collect();
    let (prev1_id, prev2_id) = previous_ids(&ids, as_of);

    let period = |id: Option<&str>| -> Result<Option<PeriodData>, EngineError> {
        let Some(id) = id else {
            return Ok(None);
        };
        let responses = periods
            .iter()
            .find(|p| p.survey_id == id)
            .map(|p| p.responses.as_slice())
            .unwrap_or_default();
        build_period(engine, id, responses, &scoped, org_units, catalog, segment_by)
    };

    let (current, (prev1, prev2)) = rayon::join(
        || period(Some(as_of)),
        || rayon::join(|| period(prev1_id), || period(prev2_id)),
    );
    let current = current?.ok_or_else(|| EngineError::NoData {
        survey_id: as_of.to_string(),
    })?;

    let pooled: Vec<Response> = periods
        .iter()
        .flat_map(|p| p.responses.iter().cloned())
        .collect();
    let overall_avg = build_period(
        engine,
        OVERALL_SURVEY_ID,
        &pooled,
        respondents,
        org_units,
        catalog,
        segment_by,
    )?;
    if overall_avg.is_none() {
        warn!("no responses available for the overall baseline");
    }

    Ok(Comparison {
        generated_at,
        current,
        prev1: prev1?,
        prev2: prev2?,
        overall_avg,
    })
}
