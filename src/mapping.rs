use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Respondent, Response, Role};

/// "Same as No. X" rule: answers to `source` also count for `target` when
/// given by one of `roles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SameAsRule {
    pub source: u32,
    pub target: u32,
    #[serde(default = "default_rule_roles")]
    pub roles: Vec<Role>,
}

fn default_rule_roles() -> Vec<Role> {
    vec![Role::Staff, Role::Pa]
}

pub fn default_same_as_rules() -> Vec<SameAsRule> {
    [(34, 37), (35, 38), (36, 39)]
        .into_iter()
        .map(|(source, target)| SameAsRule {
            source,
            target,
            roles: default_rule_roles(),
        })
        .collect()
}

/// Observations that went through the same-as expansion exactly once.
///
/// Scoring functions only accept this type, so a raw set cannot be scored
/// without expansion and an expanded set cannot be expanded again.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedResponses(Vec<Response>);

impl ExpandedResponses {
    /// Wraps observations that need no expansion (e.g. a partition of an
    /// already expanded set).
    pub(crate) fn from_expanded(responses: Vec<Response>) -> Self {
        Self(responses)
    }

    pub fn as_slice(&self) -> &[Response] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Response> {
        self.0
    }
}

/// Splits `"STAFF-Q33"` into `("STAFF", 33)`.
pub fn question_number(question_id: &str) -> Option<(&str, u32)> {
    let (prefix, digits) = question_id.rsplit_once("-Q")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|n| (prefix, n))
}

pub fn renumber(prefix: &str, number: u32) -> String {
    format!("{prefix}-Q{number:02}")
}

/// Appends one synthetic observation per matching (role, source question)
/// answer. Originals are kept as they are.
pub fn expand(
    responses: Vec<Response>,
    respondents: &[Respondent],
    rules: &[SameAsRule],
) -> ExpandedResponses {
    let roles: HashMap<&str, Role> = respondents
        .iter()
        .map(|r| (r.respondent_id.as_str(), r.role))
        .collect();

    let mut extra = Vec::new();
    for response in &responses {
        let Some(role) = roles.get(response.respondent_id.as_str()) else {
            continue;
        };
        let Some((prefix, number)) = question_number(&response.question_id) else {
            continue;
        };
        if let Some(rule) = rules
            .iter()
            .find(|rule| rule.source == number && rule.roles.contains(role))
        {
            extra.push(Response {
                question_id: renumber(prefix, rule.target),
                ..response.clone()
            });
        }
    }

    debug!(
        original = responses.len(),
        synthesized = extra.len(),
        "applied same-as expansion"
    );

    let mut expanded = responses;
    expanded.extend(extra);
    ExpandedResponses(expanded)
}
