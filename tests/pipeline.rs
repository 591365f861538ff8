use std::collections::BTreeMap;
use std::path::Path;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

use engagement_pulse::catalog::load_catalog;
use engagement_pulse::export::raw_data_csv;
use engagement_pulse::models::{Catalog, OrgUnit, Respondent, Response, Role};
use engagement_pulse::org::OrgFilter;
use engagement_pulse::periods::{compare_periods, PeriodResponses, Population, OVERALL_SURVEY_ID};
use engagement_pulse::report::{build_report, MASK};
use engagement_pulse::stages::StageTable;
use engagement_pulse::{Engine, EngineError};

fn catalog() -> Catalog {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("questions/questions.json");
    load_catalog(&path, &StageTable::default()).unwrap()
}

fn org_units() -> Vec<OrgUnit> {
    [("S01", "Ginza", "HQ1"), ("S02", "Shibuya", "HQ1"), ("S03", "Umeda", "HQ2")]
        .into_iter()
        .map(|(code, name, hq)| OrgUnit {
            store_code: code.to_string(),
            store_name: name.to_string(),
            active: true,
            hq: Some(hq.to_string()),
            dept: None,
            section: None,
            area: None,
            business_type: None,
        })
        .collect()
}

fn respondent(id: &str, role: Role, store: &str) -> Respondent {
    Respondent {
        respondent_id: id.to_string(),
        role,
        store_code: store.to_string(),
        name: None,
        join_year: Some(2020),
        gender: None,
        age_band: None,
        attributes: BTreeMap::new(),
        active: true,
    }
}

fn respondents() -> Vec<Respondent> {
    vec![
        respondent("M1", Role::Manager, "S01"),
        respondent("ST1", Role::Staff, "S01"),
        respondent("ST2", Role::Staff, "S01"),
        respondent("P1", Role::Pa, "S02"),
        respondent("ST3", Role::Staff, "S02"),
        respondent("M2", Role::Manager, "S03"),
        respondent("P2", Role::Pa, "S03"),
    ]
}

/// Every respondent answers their whole form with a deterministic pattern.
fn full_period(survey_id: &str, shift: usize, catalog: &Catalog) -> Vec<Response> {
    respondents()
        .iter()
        .enumerate()
        .flat_map(|(i, r)| {
            catalog
                .questions
                .iter()
                .filter(move |q| q.administered_to(r.role))
                .map(move |q| Response {
                    survey_id: survey_id.to_string(),
                    respondent_id: r.respondent_id.clone(),
                    question_id: q.question_id.clone(),
                    value: Some(((i + shift + q.order as usize) % 5 + 1) as f64),
                })
        })
        .collect()
}

#[test]
fn full_catalog_summary_is_complete_and_repeatable() {
    let catalog = catalog();
    let engine = Engine::default();
    let people = respondents();
    let responses = full_period("2026-02", 0, &catalog);

    let first = engine
        .summarize("2026-02", &responses, &people, &catalog)
        .unwrap();
    let second = engine
        .summarize("2026-02", &responses, &people, &catalog)
        .unwrap();
    assert_eq!(first, second);

    assert_eq!(first.n, people.len());
    assert_eq!(first.factor_scores.len(), 18);
    assert!(first.factor_scores.iter().all(|f| f.mean.is_some()));
    assert_eq!(first.category_scores.len(), 3);
    assert_eq!(first.strengths.len(), 3);
    assert_eq!(first.weaknesses.len(), 3);
    assert_eq!(first.response_rate.by_respondent.rate, 1.0);
    assert_eq!(first.response_rate.by_question.rate, 1.0);

    let overall = first.overall_score.unwrap();
    assert!((1.0..=5.0).contains(&overall));
    assert_eq!(first.signals.factors.len(), 18);
    assert_eq!(first.signals.categories.len(), 3);
}

#[test]
fn same_as_answers_score_the_target_without_changing_input() {
    let catalog = catalog();
    let people = respondents();
    let responses = vec![Response {
        survey_id: "2026-02".to_string(),
        respondent_id: "ST1".to_string(),
        question_id: "STAFF-Q34".to_string(),
        value: Some(1.0),
    }];
    let before = responses.clone();

    let summary = Engine::default()
        .summarize("2026-02", &responses, &people, &catalog)
        .unwrap();
    assert_eq!(responses, before);

    let mean_of = |id: &str| {
        summary
            .element_scores
            .iter()
            .find(|e| e.element_id == id)
            .and_then(|e| e.mean)
    };
    assert_eq!(mean_of("E34"), Some(1.0));
    assert_eq!(mean_of("E31"), Some(1.0));
    // The synthetic copy is not an extra answer.
    assert_eq!(summary.response_rate.by_question.answered, 1);
}

#[test]
fn manager_same_as_source_is_not_copied() {
    let catalog = catalog();
    let responses = vec![Response {
        survey_id: "2026-02".to_string(),
        respondent_id: "M1".to_string(),
        question_id: "MANAGER-Q34".to_string(),
        value: Some(5.0),
    }];

    let summary = Engine::default()
        .summarize("2026-02", &responses, &respondents(), &catalog)
        .unwrap();
    let e31 = summary
        .element_scores
        .iter()
        .find(|e| e.element_id == "E31")
        .unwrap();
    assert_eq!(e31.mean, None);
}

#[test]
fn comparison_uses_two_prior_periods_and_an_unfiltered_baseline() {
    let catalog = catalog();
    let people = respondents();
    let units = org_units();
    let periods: Vec<PeriodResponses> = [("2026-02", 0), ("2025-11", 1), ("2025-08", 2), ("2025-05", 3)]
        .into_iter()
        .map(|(id, shift)| PeriodResponses {
            survey_id: id.to_string(),
            responses: full_period(id, shift, &catalog),
        })
        .collect();
    let population = Population {
        respondents: &people,
        org_units: &units,
        catalog: &catalog,
    };
    let generated_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let filter = OrgFilter {
        hq: Some("HQ2".to_string()),
        ..OrgFilter::default()
    };

    let comparison = compare_periods(
        &Engine::default(),
        "2025-11",
        &periods,
        population,
        &filter,
        "store_code",
        generated_at,
    )
    .unwrap();

    assert_eq!(comparison.generated_at, generated_at);
    assert_eq!(comparison.current.summary.survey_id, "2025-11");
    assert_eq!(comparison.current.summary.n, 2);
    assert_eq!(
        comparison.prev1.as_ref().map(|p| p.summary.survey_id.as_str()),
        Some("2025-08")
    );
    assert_eq!(
        comparison.prev2.as_ref().map(|p| p.summary.survey_id.as_str()),
        Some("2025-05")
    );

    let segments = &comparison.current.segments;
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].segment_key, "S03");
    assert_eq!(segments[0].segment_name, "Umeda");

    let baseline = comparison.overall_avg.as_ref().unwrap();
    assert_eq!(baseline.summary.survey_id, OVERALL_SURVEY_ID);
    assert_eq!(baseline.summary.n, people.len());
    assert_eq!(baseline.segments.len(), 3);
}

#[test]
fn comparison_for_an_absent_period_is_no_data() {
    let catalog = catalog();
    let people = respondents();
    let units = org_units();
    let periods = vec![PeriodResponses {
        survey_id: "2026-02".to_string(),
        responses: full_period("2026-02", 0, &catalog),
    }];

    let err = compare_periods(
        &Engine::default(),
        "2026-05",
        &periods,
        Population {
            respondents: &people,
            org_units: &units,
            catalog: &catalog,
        },
        &OrgFilter::default(),
        "store_code",
        Utc::now(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        EngineError::NoData {
            survey_id: "2026-05".to_string()
        }
    );
}

#[test]
fn report_masks_small_segments() {
    let catalog = catalog();
    let people = respondents();
    let units = org_units();
    let periods = vec![
        PeriodResponses {
            survey_id: "2026-02".to_string(),
            responses: full_period("2026-02", 0, &catalog),
        },
        PeriodResponses {
            survey_id: "2025-08".to_string(),
            responses: full_period("2025-08", 1, &catalog),
        },
    ];
    let comparison = compare_periods(
        &Engine::default(),
        "2026-02",
        &periods,
        Population {
            respondents: &people,
            org_units: &units,
            catalog: &catalog,
        },
        &OrgFilter::default(),
        "store_code",
        Utc::now(),
    )
    .unwrap();

    let report = build_report(&comparison, 3);
    assert!(report.starts_with("# Engagement Pulse Report"));
    assert!(report.contains("## Factors"));
    assert!(report.contains("Change vs 2025-08"));
    // S01 has three respondents and is shown; S02 and S03 have two each.
    assert!(report.contains("| Ginza | 3 |"));
    assert!(report.contains(&format!("| Umeda | 2 | {MASK} |")));
}

#[test]
fn raw_export_has_a_column_per_catalog_question() {
    let catalog = catalog();
    let people = respondents();
    let responses = full_period("2026-02", 0, &catalog);

    let bytes = raw_data_csv(&responses, &people, &catalog.questions).unwrap();
    let mut reader = csv::Reader::from_reader(&bytes[3..]);
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.len(), 3 + catalog.questions.len());
    assert_eq!(reader.records().count(), people.len());
}
