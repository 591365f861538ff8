//! The aggregation pipeline: responses -> expansion -> element -> factor ->
//! {stage, overall, rankings, signals}, optionally repeated per segment.
//!
//! Every entry point is a pure function of its inputs. Nothing is cached
//! between calls, so concurrent callers can share one `Engine`.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use rayon::prelude::*;
use tracing::debug;

use crate::aggregate::{category_scores, element_scores, factor_scores, overall_score};
use crate::error::EngineError;
use crate::mapping::{default_same_as_rules, expand, ExpandedResponses, SameAsRule};
use crate::models::{
    Catalog, CategoryScore, ElementScore, FactorScore, Respondent, Response, SegmentScore,
    Signals, SurveySummary,
};
use crate::participation::response_rate;
use crate::ranking::{strengths, weaknesses, DEFAULT_TOP_N};
use crate::signal::{
    category_signal, element_signal, factor_signal, overall_signal, SignalResult,
    SignalThresholds,
};
use crate::stages::StageTable;

pub const UNKNOWN_SEGMENT: &str = "unknown";

#[derive(Debug, Clone)]
pub struct Engine {
    pub stages: StageTable,
    pub same_as: Vec<SameAsRule>,
    pub thresholds: SignalThresholds,
    pub top_n: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            stages: StageTable::default(),
            same_as: default_same_as_rules(),
            thresholds: SignalThresholds::default(),
            top_n: DEFAULT_TOP_N,
        }
    }
}

struct Hierarchy {
    elements: Vec<ElementScore>,
    factors: Vec<FactorScore>,
    categories: Vec<CategoryScore>,
    overall: Option<f64>,
}

impl Engine {
    /// Drops responses from inactive or unknown respondents.
    pub fn active_responses(
        &self,
        responses: &[Response],
        respondents: &[Respondent],
    ) -> Vec<Response> {
        let active: HashSet<&str> = respondents
            .iter()
            .filter(|r| r.active)
            .map(|r| r.respondent_id.as_str())
            .collect();
        let kept: Vec<Response> = responses
            .iter()
            .filter(|r| active.contains(r.respondent_id.as_str()))
            .cloned()
            .collect();
        if kept.len() != responses.len() {
            debug!(
                dropped = responses.len() - kept.len(),
                "excluded responses from inactive or unknown respondents"
            );
        }
        kept
    }

    fn score_hierarchy(&self, expanded: &ExpandedResponses, catalog: &Catalog) -> Hierarchy {
        let elements = element_scores(expanded, &catalog.questions, &catalog.elements);
        let factors = factor_scores(&elements, &catalog.factors);
        let categories = category_scores(&factors, &self.stages);
        let overall = overall_score(&factors);
        Hierarchy {
            elements,
            factors,
            categories,
            overall,
        }
    }

    fn signals(&self, hierarchy: &Hierarchy) -> Signals {
        let t = &self.thresholds;
        Signals {
            overall: overall_signal(hierarchy.overall, &hierarchy.elements, t).into(),
            categories: hierarchy
                .categories
                .iter()
                .map(|c| {
                    let signal = SignalResult::from(category_signal(c.mean, &c.distribution, t));
                    (c.category_id.clone(), signal)
                })
                .collect(),
            factors: hierarchy
                .factors
                .iter()
                .map(|f| (f.factor_id.clone(), SignalResult::from(factor_signal(f, t))))
                .collect(),
            elements: hierarchy
                .elements
                .iter()
                .map(|e| (e.element_id.clone(), SignalResult::from(element_signal(e, t))))
                .collect(),
        }
    }

    /// Full summary for one survey period.
    ///
    /// Fails with [`EngineError::NoData`] when no response survives the
    /// active-respondent filter.
    pub fn summarize(
        &self,
        survey_id: &str,
        responses: &[Response],
        respondents: &[Respondent],
        catalog: &Catalog,
    ) -> Result<SurveySummary, EngineError> {
        let scoped = self.active_responses(responses, respondents);
        if scoped.is_empty() {
            return Err(EngineError::NoData {
                survey_id: survey_id.to_string(),
            });
        }

        let rate = response_rate(&scoped, respondents, &catalog.questions, None);
        let expanded = expand(scoped, respondents, &self.same_as);
        let hierarchy = self.score_hierarchy(&expanded, catalog);
        let signals = self.signals(&hierarchy);

        debug!(
            survey_id,
            responses = expanded.len(),
            participants = rate.by_respondent.answered,
            "summarized survey"
        );

        Ok(SurveySummary {
            survey_id: survey_id.to_string(),
            overall_score: hierarchy.overall,
            strengths: strengths(&hierarchy.elements, self.top_n),
            weaknesses: weaknesses(&hierarchy.elements, self.top_n),
            category_scores: hierarchy.categories,
            factor_scores: hierarchy.factors,
            element_scores: hierarchy.elements,
            response_rate: rate,
            signals,
            n: rate.by_respondent.answered,
        })
    }

    /// Re-runs the element-to-overall pipeline once per value of the
    /// respondent attribute `segment_by`. Respondents without the attribute
    /// fall into `"unknown"`. Segments are returned largest first.
    pub fn segment_scores<L>(
        &self,
        responses: &[Response],
        respondents: &[Respondent],
        catalog: &Catalog,
        segment_by: &str,
        label: L,
    ) -> Vec<SegmentScore>
    where
        L: Fn(&str) -> String + Sync,
    {
        let scoped = self.active_responses(responses, respondents);
        let expanded = expand(scoped, respondents, &self.same_as);

        let segment_of: BTreeMap<&str, String> = respondents
            .iter()
            .map(|r| {
                let key = r
                    .attribute(segment_by)
                    .unwrap_or_else(|| UNKNOWN_SEGMENT.to_string());
                (r.respondent_id.as_str(), key)
            })
            .collect();

        let mut partitions: BTreeMap<String, Vec<Response>> = BTreeMap::new();
        for response in expanded.into_inner() {
            let key = segment_of
                .get(response.respondent_id.as_str())
                .cloned()
                .unwrap_or_else(|| UNKNOWN_SEGMENT.to_string());
            partitions.entry(key).or_default().push(response);
        }
        debug!(segment_by, segments = partitions.len(), "partitioned responses");

        let mut segments: Vec<SegmentScore> = partitions
            .into_par_iter()
            .map(|(key, part)| {
                let n = part
                    .iter()
                    .map(|r| r.respondent_id.as_str())
                    .collect::<BTreeSet<_>>()
                    .len();
                let hierarchy =
                    self.score_hierarchy(&ExpandedResponses::from_expanded(part), catalog);
                SegmentScore {
                    segment_name: label(&key),
                    segment_key: key,
                    n,
                    overall_score: hierarchy.overall,
                    category_scores: hierarchy.categories,
                    factor_scores: hierarchy.factors,
                    element_scores: hierarchy.elements,
                }
            })
            .collect();

        segments.sort_by(|a, b| b.n.cmp(&a.n).then_with(|| a.segment_key.cmp(&b.segment_key)));
        segments
    }
}
