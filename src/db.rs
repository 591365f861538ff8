use std::collections::BTreeMap;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{OrgUnit, Respondent, Response, Role};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub inserted: usize,
    pub skipped: usize,
}

async fn upsert_org_unit(pool: &PgPool, unit: &OrgUnit) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO engagement_pulse.org_units
        (store_code, store_name, active, hq, dept, section, area, business_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (store_code) DO UPDATE
        SET store_name = EXCLUDED.store_name, active = EXCLUDED.active,
            hq = EXCLUDED.hq, dept = EXCLUDED.dept, section = EXCLUDED.section,
            area = EXCLUDED.area, business_type = EXCLUDED.business_type
        "#,
    )
    .bind(&unit.store_code)
    .bind(&unit.store_name)
    .bind(unit.active)
    .bind(&unit.hq)
    .bind(&unit.dept)
    .bind(&unit.section)
    .bind(&unit.area)
    .bind(&unit.business_type)
    .execute(pool)
    .await?;
    Ok(())
}

async fn upsert_respondent(pool: &PgPool, respondent: &Respondent) -> anyhow::Result<()> {
    let attributes = serde_json::to_string(&respondent.attributes)?;
    sqlx::query(
        r#"
        INSERT INTO engagement_pulse.respondents
        (respondent_id, role, store_code, name, join_year, gender, age_band, attributes, active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8::jsonb, $9)
        ON CONFLICT (respondent_id) DO UPDATE
        SET role = EXCLUDED.role, store_code = EXCLUDED.store_code, name = EXCLUDED.name,
            join_year = EXCLUDED.join_year, gender = EXCLUDED.gender,
            age_band = EXCLUDED.age_band, attributes = EXCLUDED.attributes,
            active = EXCLUDED.active
        "#,
    )
    .bind(&respondent.respondent_id)
    .bind(respondent.role.as_str())
    .bind(&respondent.store_code)
    .bind(&respondent.name)
    .bind(respondent.join_year)
    .bind(&respondent.gender)
    .bind(&respondent.age_band)
    .bind(attributes)
    .bind(respondent.active)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns whether a new row was written; replays of the same source key
/// are ignored.
async fn insert_response(
    pool: &PgPool,
    response: &Response,
    submitted_at: DateTime<Utc>,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO engagement_pulse.responses
        (id, survey_id, respondent_id, question_id, value, submitted_at, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&response.survey_id)
    .bind(&response.respondent_id)
    .bind(&response.question_id)
    .bind(response.value.map(|v| v as i16))
    .bind(submitted_at)
    .bind(source_key)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let stores = vec![
        ("S001", "Harbor Street", "East", "Retail", "North"),
        ("S002", "Station Plaza", "East", "Retail", "South"),
        ("S003", "Riverside Mall", "West", "Outlet", "Central"),
    ];
    for (code, name, hq, dept, area) in &stores {
        upsert_org_unit(
            pool,
            &OrgUnit {
                store_code: code.to_string(),
                store_name: name.to_string(),
                active: true,
                hq: Some(hq.to_string()),
                dept: Some(dept.to_string()),
                section: None,
                area: Some(area.to_string()),
                business_type: Some("store".to_string()),
            },
        )
        .await?;
    }

    let roles = [Role::Manager, Role::Staff, Role::Staff, Role::Pa, Role::Pa, Role::Staff];
    let age_bands = ["20s", "30s", "40s", "50s"];
    let mut respondents = Vec::new();
    for (store_idx, (code, ..)) in stores.iter().enumerate() {
        for (idx, role) in roles.iter().enumerate() {
            let seq = store_idx * roles.len() + idx;
            respondents.push(Respondent {
                respondent_id: format!("R{:04}", seq + 1),
                role: *role,
                store_code: code.to_string(),
                name: None,
                join_year: Some(2015 + (seq % 9) as i32),
                gender: Some(if seq % 2 == 0 { "F" } else { "M" }.to_string()),
                age_band: Some(age_bands[seq % age_bands.len()].to_string()),
                attributes: BTreeMap::new(),
                active: seq % 11 != 10,
            });
        }
    }
    for respondent in &respondents {
        upsert_respondent(pool, respondent).await?;
    }

    let now = Utc::now();
    for (period_idx, survey_id) in ["2025-08", "2026-02"].iter().enumerate() {
        let submitted_at = now - Duration::days(180 * (1 - period_idx as i64));
        for (seq, respondent) in respondents.iter().enumerate() {
            if (seq + period_idx) % 7 == 0 {
                continue;
            }
            for number in 1..=36u32 {
                let value = 1 + ((seq as u32 * 7 + number * 3 + period_idx as u32) % 5);
                let response = Response {
                    survey_id: survey_id.to_string(),
                    respondent_id: respondent.respondent_id.clone(),
                    question_id: format!("{}-Q{number:02}", respondent.role),
                    value: Some(f64::from(value)),
                };
                let source_key = format!(
                    "seed-{survey_id}-{}-{}",
                    response.respondent_id, response.question_id
                );
                insert_response(pool, &response, submitted_at, &source_key).await?;
            }
        }
    }

    Ok(())
}

pub async fn fetch_respondents(pool: &PgPool) -> anyhow::Result<Vec<Respondent>> {
    let rows = sqlx::query(
        "SELECT respondent_id, role, store_code, name, join_year, gender, age_band, \
         attributes::text AS attributes, active \
         FROM engagement_pulse.respondents ORDER BY respondent_id",
    )
    .fetch_all(pool)
    .await?;

    let mut respondents = Vec::with_capacity(rows.len());
    for row in rows {
        let respondent_id: String = row.get("respondent_id");
        let role_text: String = row.get("role");
        let role = match role_text.parse::<Role>() {
            Ok(role) => role,
            Err(e) => {
                warn!(%respondent_id, "skipping respondent: {e}");
                continue;
            }
        };
        let attributes: String = row.get("attributes");
        respondents.push(Respondent {
            role,
            store_code: row.get("store_code"),
            name: row.get("name"),
            join_year: row.get("join_year"),
            gender: row.get("gender"),
            age_band: row.get("age_band"),
            attributes: serde_json::from_str(&attributes)
                .with_context(|| format!("bad attributes for respondent {respondent_id}"))?,
            active: row.get("active"),
            respondent_id,
        });
    }
    Ok(respondents)
}

pub async fn fetch_org_units(pool: &PgPool) -> anyhow::Result<Vec<OrgUnit>> {
    let rows = sqlx::query(
        "SELECT store_code, store_name, active, hq, dept, section, area, business_type \
         FROM engagement_pulse.org_units ORDER BY store_code",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| OrgUnit {
            store_code: row.get("store_code"),
            store_name: row.get("store_name"),
            active: row.get("active"),
            hq: row.get("hq"),
            dept: row.get("dept"),
            section: row.get("section"),
            area: row.get("area"),
            business_type: row.get("business_type"),
        })
        .collect())
}

/// Survey ids (`YYYY-MM`), newest first.
pub async fn list_survey_ids(pool: &PgPool) -> anyhow::Result<Vec<String>> {
    let rows = sqlx::query(
        "SELECT DISTINCT survey_id FROM engagement_pulse.responses \
         WHERE survey_id ~ '^[0-9]{4}-[0-9]{2}$' ORDER BY survey_id DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|row| row.get("survey_id")).collect())
}

/// Latest submission per (respondent, question) for one survey.
pub async fn fetch_responses(pool: &PgPool, survey_id: &str) -> anyhow::Result<Vec<Response>> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT ON (respondent_id, question_id)
            survey_id, respondent_id, question_id, value
        FROM engagement_pulse.responses
        WHERE survey_id = $1
        ORDER BY respondent_id, question_id, submitted_at DESC
        "#,
    )
    .bind(survey_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Response {
            survey_id: row.get("survey_id"),
            respondent_id: row.get("respondent_id"),
            question_id: row.get("question_id"),
            value: row.get::<Option<i16>, _>("value").map(f64::from),
        })
        .collect())
}

pub async fn import_respondents_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<ImportStats> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        respondent_id: String,
        role: String,
        store_code: String,
        name: Option<String>,
        join_year: Option<i32>,
        gender: Option<String>,
        age_band: Option<String>,
        active: Option<bool>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut stats = ImportStats::default();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let role = match row.role.parse::<Role>() {
            Ok(role) => role,
            Err(e) => {
                warn!(line = line + 2, "skipping respondent {}: {e}", row.respondent_id);
                stats.skipped += 1;
                continue;
            }
        };
        upsert_respondent(
            pool,
            &Respondent {
                respondent_id: row.respondent_id,
                role,
                store_code: row.store_code,
                name: row.name,
                join_year: row.join_year,
                gender: row.gender,
                age_band: row.age_band,
                attributes: BTreeMap::new(),
                active: row.active.unwrap_or(true),
            },
        )
        .await?;
        stats.inserted += 1;
    }

    info!(?stats, "imported respondents from {}", csv_path.display());
    Ok(stats)
}

pub async fn import_responses_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<ImportStats> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        survey_id: String,
        respondent_id: String,
        question_id: String,
        value: Option<i16>,
        submitted_at: Option<DateTime<Utc>>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut stats = ImportStats::default();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        if let Some(value) = row.value.filter(|v| !(1..=5).contains(v)) {
            warn!(line = line + 2, value, "skipping out-of-range rating");
            stats.skipped += 1;
            continue;
        }

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        let response = Response {
            survey_id: row.survey_id,
            respondent_id: row.respondent_id,
            question_id: row.question_id,
            value: row.value.map(f64::from),
        };

        if insert_response(pool, &response, row.submitted_at.unwrap_or_else(Utc::now), &source_key)
            .await?
        {
            stats.inserted += 1;
        } else {
            stats.skipped += 1;
        }
    }

    info!(?stats, "imported responses from {}", csv_path.display());
    Ok(stats)
}
