//! Template commands: import definitions and inspect structure

use crate::db::ChecklistDb;
use crate::error::{Error, Result};
use crate::model::{TemplateDefinition, TemplateStructure};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const BUNDLED_TEMPLATE: &str = include_str!("../../templates/sdd_installation.toml");

/// The installation checklist shipped with fieldcheck
pub fn bundled_template() -> Result<TemplateDefinition> {
    TemplateDefinition::from_toml(BUNDLED_TEMPLATE)
}

/// Read a definition file, choosing the format by extension
pub fn load_definition(path: &Path) -> Result<TemplateDefinition> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => TemplateDefinition::from_toml(&content),
        Some("json") => TemplateDefinition::from_json(&content),
        _ => Err(Error::Config(format!(
            "Unsupported template file (expected .toml or .json): {}",
            path.display()
        ))),
    }
}

/// Summary of a template's shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub id: String,
    pub name: String,
    pub version: String,
    pub is_active: bool,
    pub sections: Vec<SectionSummary>,
    pub total_questions: usize,
    pub required_questions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSummary {
    pub order: i64,
    pub title: String,
    pub questions: usize,
    pub required: usize,
}

impl From<&TemplateStructure> for TemplateSummary {
    fn from(structure: &TemplateStructure) -> Self {
        Self {
            id: structure.template.id.clone(),
            name: structure.template.name.clone(),
            version: structure.template.version.clone(),
            is_active: structure.template.is_active,
            sections: structure
                .sections
                .iter()
                .map(|s| SectionSummary {
                    order: s.section.sort_order,
                    title: s.section.title.clone(),
                    questions: s.questions_count(),
                    required: s.required_questions_count(),
                })
                .collect(),
            total_questions: structure.total_questions_count(),
            required_questions: structure.required_questions_count(),
        }
    }
}

/// Import a template definition; `None` imports the bundled checklist
pub async fn cmd_template_import(db: &ChecklistDb, path: Option<&Path>) -> Result<TemplateSummary> {
    let definition = match path {
        Some(path) => {
            info!("Importing template from {:?}", path);
            load_definition(path)?
        }
        None => {
            info!("Importing bundled installation checklist");
            bundled_template()?
        }
    };

    let structure = db.import_template(definition).await?;
    Ok(TemplateSummary::from(&structure))
}

/// Show a template by id, or the active one
pub async fn cmd_template_show(db: &ChecklistDb, id: Option<&str>) -> Result<TemplateSummary> {
    let structure = match id {
        Some(id) => db.get_template_with_structure(id).await?,
        None => db.get_active_template_with_structure().await?,
    };
    Ok(TemplateSummary::from(&structure))
}

/// Print a template summary to console
pub fn print_template_summary(summary: &TemplateSummary) {
    let active = if summary.is_active { " (active)" } else { "" };
    println!("\n📋 {} v{}{}", summary.name, summary.version, active);
    println!("ID: {}", summary.id);
    println!();

    for section in &summary.sections {
        println!(
            "  {:>2}. {}: {} questions ({} required)",
            section.order, section.title, section.questions, section.required
        );
    }

    println!(
        "\nTotal: {} questions, {} required",
        summary.total_questions, summary.required_questions
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;
    use crate::model::QuestionType;

    #[test]
    fn test_bundled_template_parses() {
        let definition = bundled_template().unwrap();
        assert_eq!(definition.name, "Solar Direct Drive Refrigerator Installation");
        assert_eq!(definition.sections.len(), 8);
        let recommendation = definition
            .sections
            .iter()
            .flat_map(|s| s.questions.iter())
            .find(|q| q.question_code == "recommendation")
            .unwrap();
        assert_eq!(recommendation.question_type, QuestionType::Select);
        assert_eq!(
            recommendation.options.as_deref(),
            Some(&["PASS".to_string(), "FAIL".to_string()][..])
        );
    }

    #[tokio::test]
    async fn test_import_bundled_template() {
        let (db, _tmp) = setup_test_db().await;

        let summary = cmd_template_import(&db, None).await.unwrap();
        assert!(summary.is_active);
        assert_eq!(summary.sections.len(), 8);
        assert_eq!(summary.total_questions, 33);
        assert_eq!(summary.required_questions, 26);
        assert_eq!(summary.sections[0].order, 1);

        let shown = cmd_template_show(&db, None).await.unwrap();
        assert_eq!(shown.id, summary.id);

        let structure = db.get_active_template_with_structure().await.unwrap();
        let quantity = structure.question_by_code("solar_panel_quantity").unwrap();
        assert_eq!(
            quantity.validation_rules.as_deref(),
            Some("required|integer|min:1")
        );
    }

    #[tokio::test]
    async fn test_import_json_definition() {
        let (db, tmp) = setup_test_db().await;
        let path = tmp.path().join("cold-room.json");
        std::fs::write(
            &path,
            r#"{
                "name": "Cold Room",
                "version": "0.1",
                "sections": [
                    {"title": "CHECK 1", "questions": [
                        {"question_code": "door_seal_ok", "question_text": "Door seal intact?", "type": "yes_no"}
                    ]}
                ]
            }"#,
        )
        .unwrap();

        let summary = cmd_template_import(&db, Some(&path)).await.unwrap();
        assert_eq!(summary.name, "Cold Room");
        assert_eq!(summary.total_questions, 1);
        assert_eq!(summary.required_questions, 1);
    }

    #[test]
    fn test_unsupported_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("template.yaml");
        std::fs::write(&path, "name: x").unwrap();
        assert!(matches!(load_definition(&path), Err(Error::Config(_))));
    }
}
