//! Role-aware response rates.
//!
//! Each role has an expected question set (questions administered to it). A
//! response only counts when its question is in the respondent's expected
//! set, so answers to another role's form never inflate either rate.

use std::collections::{HashMap, HashSet};

use crate::models::{Question, RateCount, Respondent, Response, ResponseRate, Role};

fn expected_by_role(questions: &[Question]) -> HashMap<Role, HashSet<&str>> {
    Role::ALL
        .iter()
        .map(|role| {
            let ids = questions
                .iter()
                .filter(|q| q.administered_to(*role))
                .map(|q| q.question_id.as_str())
                .collect();
            (*role, ids)
        })
        .collect()
}

fn rate(answered: usize, total: usize) -> RateCount {
    RateCount {
        answered,
        total,
        rate: if total > 0 {
            answered as f64 / total as f64
        } else {
            0.0
        },
    }
}

/// Per-person and per-question rates over active respondents, optionally
/// restricted to one role.
pub fn response_rate(
    responses: &[Response],
    respondents: &[Respondent],
    questions: &[Question],
    role_filter: Option<Role>,
) -> ResponseRate {
    let expected = expected_by_role(questions);
    let targets: HashMap<&str, Role> = respondents
        .iter()
        .filter(|r| r.active && role_filter.map_or(true, |role| r.role == role))
        .map(|r| (r.respondent_id.as_str(), r.role))
        .collect();

    let expected_total: usize = targets
        .values()
        .map(|role| expected.get(role).map_or(0, HashSet::len))
        .sum();

    let mut answered_pairs: HashSet<(&str, &str)> = HashSet::new();
    let mut answered_people: HashSet<&str> = HashSet::new();
    for response in responses {
        if response.valid_value().is_none() {
            continue;
        }
        let Some(role) = targets.get(response.respondent_id.as_str()) else {
            continue;
        };
        let in_form = expected
            .get(role)
            .is_some_and(|ids| ids.contains(response.question_id.as_str()));
        if !in_form {
            continue;
        }
        if answered_pairs.insert((response.respondent_id.as_str(), response.question_id.as_str())) {
            answered_people.insert(response.respondent_id.as_str());
        }
    }

    ResponseRate {
        by_respondent: rate(answered_people.len(), targets.len()),
        by_question: rate(answered_pairs.len(), expected_total),
    }
}
