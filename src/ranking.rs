use std::cmp::Ordering;

use crate::models::{ElementScore, StrengthWeakness};

pub const DEFAULT_TOP_N: usize = 3;

pub fn strengths(element_scores: &[ElementScore], top_n: usize) -> Vec<StrengthWeakness> {
    ranked(element_scores, top_n, |a, b| b.partial_cmp(&a))
}

pub fn weaknesses(element_scores: &[ElementScore], bottom_n: usize) -> Vec<StrengthWeakness> {
    ranked(element_scores, bottom_n, |a, b| a.partial_cmp(&b))
}

// `sort_by` is stable, so equal means keep their input order.
fn ranked<F>(element_scores: &[ElementScore], limit: usize, order: F) -> Vec<StrengthWeakness>
where
    F: Fn(f64, f64) -> Option<Ordering>,
{
    let mut scored: Vec<(&ElementScore, f64)> = element_scores
        .iter()
        .filter_map(|es| es.mean.map(|m| (es, m)))
        .collect();
    scored.sort_by(|a, b| order(a.1, b.1).unwrap_or(Ordering::Equal));

    scored
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(idx, (es, mean))| StrengthWeakness {
            element_id: es.element_id.clone(),
            element_name: es.element_name.clone(),
            mean,
            rank: idx + 1,
        })
        .collect()
}
