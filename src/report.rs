use std::fmt::{self, Write};

use serde::Serialize;

use crate::models::{FactorScore, SegmentScore, SurveySummary};
use crate::periods::{Comparison, PeriodData};

pub const MASK: &str = "***";

/// A value hidden from output when its sample is too small.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Masked<T> {
    Shown(T),
    Hidden,
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Masked::Shown(value) => fmt::Display::fmt(value, f),
            Masked::Hidden => f.write_str(MASK),
        }
    }
}

pub fn mask_if_small_n<T>(value: T, n: usize, min_n: usize) -> Masked<T> {
    if n < min_n {
        Masked::Hidden
    } else {
        Masked::Shown(value)
    }
}

fn score(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

fn delta(current: Option<f64>, previous: Option<f64>) -> String {
    match (current, previous) {
        (Some(c), Some(p)) => format!("{:+.2}", c - p),
        _ => "-".to_string(),
    }
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

fn previous_factor(previous: Option<&PeriodData>, factor_id: &str) -> Option<f64> {
    previous?
        .summary
        .factor_scores
        .iter()
        .find(|f| f.factor_id == factor_id)
        .and_then(|f| f.mean)
}

fn factor_row(
    output: &mut String,
    summary: &SurveySummary,
    factor: &FactorScore,
    prev: Option<&PeriodData>,
) {
    let signal = summary
        .signals
        .factors
        .get(&factor.factor_id)
        .map_or("-", |s| s.label.as_str());
    let _ = writeln!(
        output,
        "| {} | {} | {} | {} |",
        factor.factor_name,
        score(factor.mean),
        delta(factor.mean, previous_factor(prev, &factor.factor_id)),
        signal
    );
}

fn segment_row(output: &mut String, segment: &SegmentScore, min_n: usize) {
    let stages: Vec<String> = segment
        .category_scores
        .iter()
        .map(|c| mask_if_small_n(score(c.mean), segment.n, min_n).to_string())
        .collect();
    let _ = writeln!(
        output,
        "| {} | {} | {} | {} |",
        segment.segment_name,
        segment.n,
        mask_if_small_n(score(segment.overall_score), segment.n, min_n),
        stages.join(" | ")
    );
}

pub fn build_report(comparison: &Comparison, min_n: usize) -> String {
    let current = &comparison.current;
    let summary = &current.summary;
    let prev = comparison.prev1.as_ref();

    let mut output = String::new();

    let _ = writeln!(output, "# Engagement Pulse Report");
    let _ = writeln!(
        output,
        "Survey {} ({} respondents), generated {}",
        summary.survey_id,
        summary.n,
        comparison.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overall");
    let _ = writeln!(
        output,
        "- Overall index: {} ({})",
        score(summary.overall_score),
        summary.signals.overall.label
    );
    if let Some(p) = prev {
        let _ = writeln!(
            output,
            "- Change vs {}: {}",
            p.summary.survey_id,
            delta(summary.overall_score, p.summary.overall_score)
        );
    }
    if let Some(baseline) = &comparison.overall_avg {
        let _ = writeln!(
            output,
            "- All-period baseline: {}",
            score(baseline.summary.overall_score)
        );
    }
    let rate = &summary.response_rate;
    let _ = writeln!(
        output,
        "- Response rate: {} of people ({}/{}), {} of questions ({}/{})",
        percent(rate.by_respondent.rate),
        rate.by_respondent.answered,
        rate.by_respondent.total,
        percent(rate.by_question.rate),
        rate.by_question.answered,
        rate.by_question.total
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Stages");
    let _ = writeln!(output, "| Stage | Score | Bottom2 | Signal |");
    let _ = writeln!(output, "| :--- | :---: | :---: | :---: |");
    for category in &summary.category_scores {
        let signal = summary
            .signals
            .categories
            .get(&category.category_id)
            .map_or("-", |s| s.label.as_str());
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            category.category_name,
            score(category.mean),
            percent(category.distribution.bottom2),
            signal
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Factors");
    let _ = writeln!(output, "| Factor | Score | Change | Signal |");
    let _ = writeln!(output, "| :--- | :---: | :---: | :---: |");
    for factor in &summary.factor_scores {
        factor_row(&mut output, summary, factor, prev);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Strengths");
    if summary.strengths.is_empty() {
        let _ = writeln!(output, "No scored elements for this survey.");
    }
    for s in &summary.strengths {
        let _ = writeln!(output, "{}. **{}** ({:.2})", s.rank, s.element_name, s.mean);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weaknesses");
    if summary.weaknesses.is_empty() {
        let _ = writeln!(output, "No scored elements for this survey.");
    }
    for w in &summary.weaknesses {
        let _ = writeln!(output, "{}. **{}** ({:.2})", w.rank, w.element_name, w.mean);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Segments");
    if current.segments.is_empty() {
        let _ = writeln!(output, "No segments for this survey.");
    } else {
        let stage_names: Vec<&str> = summary
            .category_scores
            .iter()
            .map(|c| c.category_id.as_str())
            .collect();
        let _ = writeln!(output, "| Segment | n | Overall | {} |", stage_names.join(" | "));
        let _ = writeln!(
            output,
            "| :--- | ---: | :---: |{}",
            " :---: |".repeat(stage_names.len())
        );
        for segment in &current.segments {
            segment_row(&mut output, segment, min_n);
        }
        let _ = writeln!(output);
        let _ = writeln!(output, "Segments with fewer than {min_n} respondents are shown as {MASK}.");
    }

    output
}
