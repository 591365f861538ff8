use std::collections::HashMap;

use crate::mapping::ExpandedResponses;
use crate::models::{CategoryScore, Element, ElementScore, Factor, FactorScore, Question};
use crate::scale::{distribution, mean, mean_of_means, pooled_distribution};
use crate::stages::StageTable;

/// Collapses line breaks and runs of whitespace into single spaces.
pub fn normalize_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pools every observation whose question belongs to an element. Output
/// follows element display order; observations on unknown questions are
/// dropped.
pub fn element_scores(
    responses: &ExpandedResponses,
    questions: &[Question],
    elements: &[Element],
) -> Vec<ElementScore> {
    let question_to_element: HashMap<&str, &str> = questions
        .iter()
        .map(|q| (q.question_id.as_str(), q.element_id.as_str()))
        .collect();

    let mut values: HashMap<&str, Vec<Option<f64>>> = elements
        .iter()
        .map(|e| (e.element_id.as_str(), Vec::new()))
        .collect();

    for response in responses.as_slice() {
        let Some(element_id) = question_to_element.get(response.question_id.as_str()) else {
            continue;
        };
        if let Some(bucket) = values.get_mut(element_id) {
            bucket.push(response.valid_value());
        }
    }

    let mut ordered: Vec<&Element> = elements.iter().collect();
    ordered.sort_by_key(|e| e.order);

    ordered
        .into_iter()
        .map(|e| {
            let pooled = values
                .get(e.element_id.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();
            ElementScore {
                element_id: e.element_id.clone(),
                element_name: normalize_label(&e.element_name),
                mean: mean(pooled),
                distribution: distribution(pooled),
            }
        })
        .collect()
}

/// Mean of the element means for each factor, ignoring elements without a
/// mean. Element sample sizes are deliberately not used as weights.
pub fn factor_scores(element_scores: &[ElementScore], factors: &[Factor]) -> Vec<FactorScore> {
    let by_id: HashMap<&str, &ElementScore> = element_scores
        .iter()
        .map(|es| (es.element_id.as_str(), es))
        .collect();

    let mut ordered: Vec<&Factor> = factors.iter().collect();
    ordered.sort_by_key(|f| f.order);

    ordered
        .into_iter()
        .map(|f| {
            let members: Vec<ElementScore> = f
                .element_ids
                .iter()
                .filter_map(|id| by_id.get(id.as_str()).map(|es| (*es).clone()))
                .collect();
            FactorScore {
                factor_id: f.factor_id.clone(),
                factor_name: normalize_label(&f.factor_name),
                mean: mean_of_means(members.iter().map(|es| es.mean)),
                elements: members,
            }
        })
        .collect()
}

/// Stage means are unweighted over factor means; stage distributions are
/// pooled over every member element, weighted by observation count.
pub fn category_scores(factor_scores: &[FactorScore], stages: &StageTable) -> Vec<CategoryScore> {
    stages
        .stages()
        .iter()
        .map(|stage| {
            let members: Vec<FactorScore> = factor_scores
                .iter()
                .filter(|fs| stage.factors.contains(&fs.factor_id))
                .cloned()
                .collect();
            let distribution = pooled_distribution(
                members
                    .iter()
                    .flat_map(|fs| fs.elements.iter())
                    .map(|es| &es.distribution),
            );
            CategoryScore {
                category_id: stage.id.clone(),
                category_name: stage.name.clone(),
                mean: mean_of_means(members.iter().map(|fs| fs.mean)),
                factors: members,
                distribution,
            }
        })
        .collect()
}

/// Flat mean across all factor means, independent of stage membership.
pub fn overall_score(factor_scores: &[FactorScore]) -> Option<f64> {
    mean_of_means(factor_scores.iter().map(|fs| fs.mean))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Distribution, Response, Role};
    use crate::stages::StageDef;

    fn question(id: &str, element_id: &str) -> Question {
        Question {
            question_id: id.to_string(),
            element_id: element_id.to_string(),
            text: id.to_string(),
            roles: vec![Role::Manager],
            order: 0,
        }
    }

    fn element(id: &str, order: i32) -> Element {
        Element {
            element_id: id.to_string(),
            element_name: format!("Element\n {id}  "),
            factor_id: String::new(),
            order,
        }
    }

    fn factor(id: &str, elements: &[&str], order: i32) -> Factor {
        Factor {
            factor_id: id.to_string(),
            factor_name: id.to_string(),
            element_ids: elements.iter().map(|e| e.to_string()).collect(),
            order,
        }
    }

    fn responses(rows: &[(&str, &str, Option<f64>)]) -> ExpandedResponses {
        ExpandedResponses::from_expanded(
            rows.iter()
                .map(|(who, q, v)| Response {
                    survey_id: "2026-02".to_string(),
                    respondent_id: who.to_string(),
                    question_id: q.to_string(),
                    value: *v,
                })
                .collect(),
        )
    }

    fn scored(id: &str, mean: Option<f64>, n: usize, bottom2: f64) -> ElementScore {
        ElementScore {
            element_id: id.to_string(),
            element_name: id.to_string(),
            mean,
            distribution: Distribution {
                bottom2,
                mid: 0.0,
                top2: 1.0 - bottom2,
                n,
            },
        }
    }

    #[test]
    fn labels_are_normalized() {
        assert_eq!(normalize_label("  Team\r\n  spirit\t"), "Team spirit");
        assert_eq!(normalize_label(""), "");
    }

    #[test]
    fn element_scores_pool_questions_in_display_order() {
        let questions = vec![question("Q1", "E2"), question("Q2", "E2"), question("Q3", "E1")];
        let elements = vec![element("E2", 2), element("E1", 1), element("E3", 3)];
        let input = responses(&[
            ("R1", "Q1", Some(4.0)),
            ("R1", "Q2", Some(2.0)),
            ("R1", "Q3", Some(5.0)),
            ("R2", "Q2", None),
            ("R2", "Q99", Some(1.0)),
        ]);

        let scores = element_scores(&input, &questions, &elements);

        let ids: Vec<&str> = scores.iter().map(|s| s.element_id.as_str()).collect();
        assert_eq!(ids, vec!["E1", "E2", "E3"]);
        assert_eq!(scores[0].mean, Some(5.0));
        assert_eq!(scores[1].mean, Some(3.0));
        assert_eq!(scores[1].distribution.n, 2);
        assert_eq!(scores[2].mean, None);
        assert_eq!(scores[2].distribution.n, 0);
        assert_eq!(scores[0].element_name, "Element E1");
    }

    #[test]
    fn factor_mean_ignores_sample_size() {
        let elements = vec![scored("E1", Some(5.0), 1, 0.0), scored("E2", Some(1.0), 1000, 1.0)];
        let factors = vec![factor("F01", &["E1", "E2"], 1)];
        let scores = factor_scores(&elements, &factors);
        assert_eq!(scores[0].mean, Some(3.0));
    }

    #[test]
    fn factor_mean_skips_missing_elements() {
        let elements = vec![scored("E1", Some(4.0), 3, 0.0), scored("E2", None, 0, 0.0)];
        let factors = vec![
            factor("F02", &["E2"], 2),
            factor("F01", &["E1", "E2", "E404"], 1),
        ];
        let scores = factor_scores(&elements, &factors);
        assert_eq!(scores[0].factor_id, "F01");
        assert_eq!(scores[0].mean, Some(4.0));
        assert_eq!(scores[0].elements.len(), 2);
        assert_eq!(scores[1].mean, None);
    }

    #[test]
    fn category_mean_is_unweighted_but_distribution_is_pooled() {
        let factors = vec![
            FactorScore {
                factor_id: "F01".to_string(),
                factor_name: "A".to_string(),
                mean: Some(5.0),
                elements: vec![scored("E1", Some(5.0), 1, 0.0)],
            },
            FactorScore {
                factor_id: "F02".to_string(),
                factor_name: "B".to_string(),
                mean: Some(2.0),
                elements: vec![scored("E2", Some(2.0), 3, 1.0)],
            },
            FactorScore {
                factor_id: "F03".to_string(),
                factor_name: "C".to_string(),
                mean: None,
                elements: vec![],
            },
        ];
        let stages = StageTable::new(vec![
            StageDef {
                id: "C1".to_string(),
                name: "First".to_string(),
                factors: vec!["F01".to_string(), "F02".to_string()],
            },
            StageDef {
                id: "C2".to_string(),
                name: "Second".to_string(),
                factors: vec!["F03".to_string()],
            },
            StageDef {
                id: "C3".to_string(),
                name: "Third".to_string(),
                factors: vec![],
            },
        ])
        .unwrap();

        let categories = category_scores(&factors, &stages);

        assert_eq!(categories[0].mean, Some(3.5));
        assert_eq!(categories[0].distribution.n, 4);
        assert!((categories[0].distribution.bottom2 - 0.75).abs() < 1e-12);
        assert_eq!(categories[1].mean, None);
        assert_eq!(categories[1].distribution, Distribution::default());
        assert_eq!(overall_score(&factors), Some(3.5));
    }
}
