use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::models::Catalog;
use crate::stages::StageTable;

pub const DEFAULT_CATALOG_PATH: &str = "questions/questions.json";

/// Reads the question master and checks it against the stage table once,
/// before any aggregation runs.
pub fn load_catalog(path: &Path, stages: &StageTable) -> anyhow::Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    let mut catalog: Catalog = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse catalog {}", path.display()))?;

    link_factor_elements(&mut catalog);
    stages
        .validate(&catalog)
        .with_context(|| format!("catalog {} does not match stage table", path.display()))?;

    info!(
        questions = catalog.questions.len(),
        elements = catalog.elements.len(),
        factors = catalog.factors.len(),
        "loaded catalog"
    );
    Ok(catalog)
}

/// Factors listing no elements take the elements that name them as parent,
/// in element display order.
pub fn link_factor_elements(catalog: &mut Catalog) {
    let mut elements: Vec<_> = catalog.elements.iter().collect();
    elements.sort_by_key(|e| e.order);

    for factor in catalog.factors.iter_mut().filter(|f| f.element_ids.is_empty()) {
        factor.element_ids = elements
            .iter()
            .filter(|e| e.factor_id == factor.factor_id)
            .map(|e| e.element_id.clone())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CATALOG: &str = r#"{
      "questions": [
        {"question_id": "MANAGER-Q01", "element_id": "E02", "text": "I know our goals", "roles": ["MANAGER"], "order": 1},
        {"question_id": "STAFF-Q01", "element_id": "E01", "text": "My manager listens", "roles": ["STAFF", "PA"], "order": 2}
      ],
      "elements": [
        {"element_id": "E02", "element_name": "Goals", "factor_id": "F01", "order": 2},
        {"element_id": "E01", "element_name": "Listening", "factor_id": "F01", "order": 1}
      ],
      "factors": [
        {"factor_id": "F01", "factor_name": "Direction", "order": 1}
      ]
    }"#;

    fn one_factor_stages() -> StageTable {
        let stage = |id: &str, factors: Vec<String>| crate::stages::StageDef {
            id: id.to_string(),
            name: format!("Stage {id}"),
            factors,
        };
        StageTable::new(vec![
            stage("C1", vec!["F01".to_string()]),
            stage("C2", vec![]),
            stage("C3", vec![]),
        ])
        .unwrap()
    }

    #[test]
    fn loads_and_links_elements() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let catalog = load_catalog(file.path(), &one_factor_stages()).unwrap();
        assert_eq!(catalog.questions.len(), 2);
        assert_eq!(catalog.factors[0].element_ids, vec!["E01", "E02"]);
    }

    #[test]
    fn unknown_stage_factor_fails_at_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let err = load_catalog(file.path(), &StageTable::default()).unwrap_err();
        assert!(format!("{err:#}").contains("unknown factor F02"));
    }
}
