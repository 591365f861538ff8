use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::models::{Question, Respondent, Response, SurveySummary};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// One row per respondent, one column per question in catalog order.
/// Prefixed with a UTF-8 BOM so spreadsheet tools pick the right encoding.
pub fn raw_data_csv(
    responses: &[Response],
    respondents: &[Respondent],
    questions: &[Question],
) -> anyhow::Result<Vec<u8>> {
    let mut ordered: Vec<&Question> = questions.iter().collect();
    ordered.sort_by_key(|q| q.order);

    let people: HashMap<&str, &Respondent> = respondents
        .iter()
        .map(|r| (r.respondent_id.as_str(), r))
        .collect();
    let mut answers: BTreeMap<&str, HashMap<&str, Option<f64>>> = BTreeMap::new();
    for r in responses {
        answers
            .entry(r.respondent_id.as_str())
            .or_default()
            .insert(r.question_id.as_str(), r.value);
    }

    let mut wtr = csv::Writer::from_writer(UTF8_BOM.to_vec());
    let mut header = vec!["RespondentID", "StoreCode", "Role"];
    header.extend(ordered.iter().map(|q| q.text.as_str()));
    wtr.write_record(&header)?;

    for (respondent_id, given) in &answers {
        let person = people.get(respondent_id);
        let mut record = vec![
            respondent_id.to_string(),
            person.map(|p| p.store_code.clone()).unwrap_or_default(),
            person.map(|p| p.role.to_string()).unwrap_or_default(),
        ];
        record.extend(ordered.iter().map(|q| {
            given
                .get(q.question_id.as_str())
                .copied()
                .flatten()
                .map(|v| v.to_string())
                .unwrap_or_default()
        }));
        wtr.write_record(&record)?;
    }

    wtr.into_inner().context("failed to finish CSV output")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedScore {
    pub name: String,
    pub score: Option<f64>,
}

/// The reduced view handed to the prose-commentary service. Only names and
/// scores leave the system; no respondent-level data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisDigest {
    pub overall_score: Option<f64>,
    pub top_strengths: Vec<NamedScore>,
    pub bottom_weaknesses: Vec<NamedScore>,
    pub factor_scores: Vec<NamedScore>,
}

impl From<&SurveySummary> for AnalysisDigest {
    fn from(summary: &SurveySummary) -> Self {
        let named = |name: &str, score: Option<f64>| NamedScore {
            name: name.to_string(),
            score,
        };
        Self {
            overall_score: summary.overall_score,
            top_strengths: summary
                .strengths
                .iter()
                .map(|s| named(&s.element_name, Some(s.mean)))
                .collect(),
            bottom_weaknesses: summary
                .weaknesses
                .iter()
                .map(|w| named(&w.element_name, Some(w.mean)))
                .collect(),
            factor_scores: summary
                .factor_scores
                .iter()
                .map(|f| named(&f.factor_name, f.mean))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Tabled)]
pub struct FactorRow {
    #[tabled(rename = "Factor")]
    pub factor: String,
    #[tabled(rename = "Score")]
    pub score: String,
    #[tabled(rename = "Bottom2")]
    pub bottom2: String,
    #[tabled(rename = "Signal")]
    pub signal: String,
}

pub fn factor_rows(summary: &SurveySummary) -> Vec<FactorRow> {
    summary
        .factor_scores
        .iter()
        .map(|f| {
            let pooled =
                crate::scale::pooled_distribution(f.elements.iter().map(|e| &e.distribution));
            FactorRow {
                factor: f.factor_name.clone(),
                score: f.mean.map_or_else(|| "-".to_string(), |m| format!("{m:.2}")),
                bottom2: format!("{:.1}%", pooled.bottom2 * 100.0),
                signal: summary
                    .signals
                    .factors
                    .get(&f.factor_id)
                    .map_or_else(|| "-".to_string(), |s| s.label.clone()),
            }
        })
        .collect()
}

pub fn preview_table<T: Tabled>(rows: Vec<T>) -> String {
    if rows.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(rows).with(Style::markdown()).to_string()
}
