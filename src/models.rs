use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::signal::SignalResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Manager,
    Staff,
    Pa,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Manager, Role::Staff, Role::Pa];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Manager => "MANAGER",
            Role::Staff => "STAFF",
            Role::Pa => "PA",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "MANAGER" => Ok(Role::Manager),
            "STAFF" => Ok(Role::Staff),
            "PA" => Ok(Role::Pa),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// A single rating prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    pub element_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub order: i32,
}

impl Question {
    pub fn administered_to(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// The scoring unit: values of every question pointing at it are pooled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub element_id: String,
    pub element_name: String,
    #[serde(default)]
    pub factor_id: String,
    #[serde(default)]
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub factor_id: String,
    pub factor_name: String,
    #[serde(default)]
    pub element_ids: Vec<String>,
    #[serde(default)]
    pub order: i32,
}

/// The question master: what is asked, how it rolls up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub questions: Vec<Question>,
    pub elements: Vec<Element>,
    pub factors: Vec<Factor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub survey_id: String,
    pub respondent_id: String,
    pub question_id: String,
    pub value: Option<f64>,
}

impl Response {
    /// The rating if it is usable for scoring: present and on the 1-5 scale.
    pub fn valid_value(&self) -> Option<f64> {
        self.value.filter(|v| crate::scale::is_rating(*v))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Respondent {
    pub respondent_id: String,
    pub role: Role,
    pub store_code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub join_year: Option<i32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub age_band: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub active: bool,
}

impl Respondent {
    /// Looks up a segmentable attribute by key. Built-in fields win over the
    /// free-form attribute bag.
    pub fn attribute(&self, key: &str) -> Option<String> {
        match key {
            "store_code" => Some(self.store_code.clone()),
            "role" => Some(self.role.to_string()),
            "join_year" => self.join_year.map(|y| y.to_string()),
            "gender" => self.gender.clone(),
            "age_band" => self.age_band.clone(),
            other => self.attributes.get(other).cloned(),
        }
        .filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgUnit {
    pub store_code: String,
    pub store_name: String,
    pub active: bool,
    #[serde(default)]
    pub hq: Option<String>,
    #[serde(default)]
    pub dept: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub business_type: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub bottom2: f64,
    pub mid: f64,
    pub top2: f64,
    pub n: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementScore {
    pub element_id: String,
    pub element_name: String,
    pub mean: Option<f64>,
    pub distribution: Distribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub factor_id: String,
    pub factor_name: String,
    pub mean: Option<f64>,
    pub elements: Vec<ElementScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category_id: String,
    pub category_name: String,
    pub mean: Option<f64>,
    pub factors: Vec<FactorScore>,
    pub distribution: Distribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthWeakness {
    pub element_id: String,
    pub element_name: String,
    pub mean: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateCount {
    pub answered: usize,
    pub total: usize,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseRate {
    pub by_respondent: RateCount,
    pub by_question: RateCount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    pub overall: SignalResult,
    pub categories: BTreeMap<String, SignalResult>,
    pub factors: BTreeMap<String, SignalResult>,
    pub elements: BTreeMap<String, SignalResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveySummary {
    pub survey_id: String,
    pub overall_score: Option<f64>,
    pub category_scores: Vec<CategoryScore>,
    pub factor_scores: Vec<FactorScore>,
    pub element_scores: Vec<ElementScore>,
    pub strengths: Vec<StrengthWeakness>,
    pub weaknesses: Vec<StrengthWeakness>,
    pub response_rate: ResponseRate,
    pub signals: Signals,
    pub n: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentScore {
    pub segment_key: String,
    pub segment_name: String,
    pub n: usize,
    pub overall_score: Option<f64>,
    pub category_scores: Vec<CategoryScore>,
    pub factor_scores: Vec<FactorScore>,
    pub element_scores: Vec<ElementScore>,
}
