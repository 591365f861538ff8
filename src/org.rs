use std::collections::HashMap;

use crate::models::{OrgUnit, Respondent};

/// Organisation scope for a summary. `None` (or `"all"`) leaves a level
/// unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgFilter {
    pub hq: Option<String>,
    pub dept: Option<String>,
    pub area: Option<String>,
    pub office: Option<String>,
}

fn constraint(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty() && *v != "all")
}

fn matches(constraint: Option<&str>, actual: Option<&str>) -> bool {
    constraint.map_or(true, |wanted| actual == Some(wanted))
}

impl OrgFilter {
    pub fn is_unconstrained(&self) -> bool {
        [&self.hq, &self.dept, &self.area, &self.office]
            .into_iter()
            .all(|v| constraint(v).is_none())
    }

    /// Respondents whose store satisfies every constraint. With any
    /// constraint set, respondents on an unknown store are dropped.
    pub fn apply(&self, respondents: &[Respondent], org_units: &[OrgUnit]) -> Vec<Respondent> {
        if self.is_unconstrained() {
            return respondents.to_vec();
        }
        let units: HashMap<&str, &OrgUnit> = org_units
            .iter()
            .map(|ou| (ou.store_code.as_str(), ou))
            .collect();

        respondents
            .iter()
            .filter(|r| {
                let Some(unit) = units.get(r.store_code.as_str()) else {
                    return false;
                };
                matches(constraint(&self.hq), unit.hq.as_deref())
                    && matches(constraint(&self.dept), unit.dept.as_deref())
                    && matches(constraint(&self.area), unit.area.as_deref())
                    && matches(constraint(&self.office), Some(unit.store_code.as_str()))
            })
            .cloned()
            .collect()
    }
}

/// Resolves segment keys to display names. Only store codes have names;
/// anything else is shown as-is.
pub fn segment_labeler(
    segment_by: &str,
    org_units: &[OrgUnit],
) -> impl Fn(&str) -> String + Sync {
    let names: HashMap<String, String> = if segment_by == "store_code" {
        org_units
            .iter()
            .map(|ou| (ou.store_code.clone(), ou.store_name.clone()))
            .collect()
    } else {
        HashMap::new()
    };
    move |key: &str| names.get(key).cloned().unwrap_or_else(|| key.to_string())
}
