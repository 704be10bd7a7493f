//! Template store: templates, sections and questions

use super::{new_id, ChecklistDb};
use crate::error::{Error, Result};
use crate::model::{
    NewQuestion, NewSection, NewTemplate, Question, QuestionPatch, ReorderEntry, Section,
    SectionPatch, SectionWithQuestions, Template, TemplateDefinition, TemplatePatch,
    TemplateStructure,
};
use crate::rules::QuestionRules;
use sqlx::SqliteConnection;
use std::collections::HashMap;
use tracing::{debug, info};

impl ChecklistDb {
    // ===== Template Operations =====

    /// First active template by insertion order
    pub async fn get_active_template(&self) -> Result<Option<Template>> {
        let template = sqlx::query_as::<_, Template>(
            "SELECT * FROM checklist_templates WHERE is_active = 1 ORDER BY rowid LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(template)
    }

    /// Active template with ordered sections and questions
    pub async fn get_active_template_with_structure(&self) -> Result<TemplateStructure> {
        let template = self
            .get_active_template()
            .await?
            .ok_or(Error::NoActiveTemplate)?;
        self.load_structure(template).await
    }

    pub async fn get_template(&self, id: &str) -> Result<Option<Template>> {
        let template =
            sqlx::query_as::<_, Template>("SELECT * FROM checklist_templates WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(template)
    }

    pub async fn get_template_with_structure(&self, id: &str) -> Result<TemplateStructure> {
        let template = self
            .get_template(id)
            .await?
            .ok_or_else(|| Error::TemplateNotFound(id.to_string()))?;
        self.load_structure(template).await
    }

    /// All active templates with structure, newest first
    pub async fn list_active_templates(&self) -> Result<Vec<TemplateStructure>> {
        let templates = sqlx::query_as::<_, Template>(
            "SELECT * FROM checklist_templates WHERE is_active = 1 ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut structures = Vec::with_capacity(templates.len());
        for template in templates {
            structures.push(self.load_structure(template).await?);
        }
        Ok(structures)
    }

    /// Every template, newest first
    pub async fn list_templates(&self) -> Result<Vec<Template>> {
        let templates = sqlx::query_as::<_, Template>(
            "SELECT * FROM checklist_templates ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(templates)
    }

    /// Create a template; an active one deactivates all others
    pub async fn create_template(&self, new: NewTemplate) -> Result<Template> {
        new.validate()?;
        let now = self.timestamp();
        let template = Template {
            id: new_id(),
            name: new.name.trim().to_string(),
            version: new.version.trim().to_string(),
            is_active: new.is_active,
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        let mut tx = self.pool.begin().await?;
        if template.is_active {
            deactivate_others(&mut *tx, &template.id, &now).await?;
        }
        insert_template(&mut *tx, &template).await?;
        tx.commit().await?;

        info!(template_id = %template.id, "Created template '{}'", template.name);
        Ok(template)
    }

    pub async fn update_template(&self, id: &str, patch: TemplatePatch) -> Result<Template> {
        patch.validate()?;
        let now = self.timestamp();

        let mut tx = self.pool.begin().await?;
        let mut template = fetch_template(&mut *tx, id).await?;

        if let Some(name) = patch.name {
            template.name = name.trim().to_string();
        }
        if let Some(version) = patch.version {
            template.version = version.trim().to_string();
        }
        if let Some(is_active) = patch.is_active {
            template.is_active = is_active;
            if is_active {
                deactivate_others(&mut *tx, id, &now).await?;
            }
        }
        template.updated_at = now;

        sqlx::query(
            r#"
            UPDATE checklist_templates
            SET name = ?, version = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&template.name)
        .bind(&template.version)
        .bind(template.is_active)
        .bind(&template.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(template_id = %id, "Updated template");
        Ok(template)
    }

    /// Delete a template with its sections, questions and drafts
    pub async fn delete_template(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        fetch_template(&mut *tx, id).await?;

        let submissions: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM checklist_submissions WHERE template_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if submissions > 0 {
            return Err(Error::Conflict(
                "Cannot delete checklist that has submissions. Please delete the submissions first."
                    .to_string(),
            ));
        }

        sqlx::query("DELETE FROM checklist_drafts WHERE template_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "DELETE FROM checklist_questions WHERE section_id IN (SELECT id FROM checklist_sections WHERE template_id = ?)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM checklist_sections WHERE template_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM checklist_templates WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(template_id = %id, "Deleted template");
        Ok(())
    }

    /// Create a whole template from a definition in one transaction
    pub async fn import_template(&self, mut definition: TemplateDefinition) -> Result<TemplateStructure> {
        definition.normalize()?;
        let now = self.timestamp();
        let template = Template {
            id: new_id(),
            name: definition.name.trim().to_string(),
            version: definition.version.trim().to_string(),
            is_active: definition.is_active,
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        let mut tx = self.pool.begin().await?;
        if template.is_active {
            deactivate_others(&mut *tx, &template.id, &now).await?;
        }
        insert_template(&mut *tx, &template).await?;

        let mut question_count = 0usize;
        for block in &definition.sections {
            let section = Section {
                id: new_id(),
                template_id: template.id.clone(),
                title: block.title.trim().to_string(),
                description: block.description.clone(),
                sort_order: block.order.unwrap_or(0),
                created_at: now.clone(),
                updated_at: now.clone(),
            };
            insert_section(&mut *tx, &section).await?;

            for question in &block.questions {
                insert_question(&mut *tx, &section.id, question, &now).await?;
                question_count += 1;
            }
        }
        tx.commit().await?;

        info!(
            template_id = %template.id,
            sections = definition.sections.len(),
            questions = question_count,
            "Imported template '{}' v{}",
            template.name,
            template.version
        );
        self.get_template_with_structure(&template.id).await
    }

    async fn load_structure(&self, template: Template) -> Result<TemplateStructure> {
        let sections = sqlx::query_as::<_, Section>(
            "SELECT * FROM checklist_sections WHERE template_id = ? ORDER BY sort_order, rowid",
        )
        .bind(&template.id)
        .fetch_all(&self.pool)
        .await?;

        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT q.* FROM checklist_questions q
            JOIN checklist_sections s ON s.id = q.section_id
            WHERE s.template_id = ?
            ORDER BY q.sort_order, q.rowid
            "#,
        )
        .bind(&template.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(TemplateStructure {
            template,
            sections: group_questions(sections, questions),
        })
    }

    // ===== Section Operations =====

    /// Ordered sections of a template, each with ordered questions
    pub async fn list_sections(&self, template_id: &str) -> Result<Vec<SectionWithQuestions>> {
        Ok(self.get_template_with_structure(template_id).await?.sections)
    }

    pub async fn get_section(&self, template_id: &str, section_id: &str) -> Result<SectionWithQuestions> {
        let mut conn = self.pool.acquire().await?;
        let section = fetch_section(&mut *conn, template_id, section_id).await?;
        let questions = section_questions(&mut *conn, section_id).await?;
        Ok(SectionWithQuestions { section, questions })
    }

    pub async fn create_section(&self, template_id: &str, new: NewSection) -> Result<Section> {
        new.validate()?;
        let now = self.timestamp();

        let mut conn = self.pool.acquire().await?;
        fetch_template(&mut *conn, template_id).await?;

        let section = Section {
            id: new_id(),
            template_id: template_id.to_string(),
            title: new.title.trim().to_string(),
            description: new.description,
            sort_order: new.order.unwrap_or(0),
            created_at: now.clone(),
            updated_at: now,
        };
        insert_section(&mut *conn, &section).await?;

        debug!(section_id = %section.id, "Created section '{}'", section.title);
        Ok(section)
    }

    pub async fn update_section(
        &self,
        template_id: &str,
        section_id: &str,
        patch: SectionPatch,
    ) -> Result<Section> {
        patch.validate()?;
        let mut conn = self.pool.acquire().await?;
        let mut section = fetch_section(&mut *conn, template_id, section_id).await?;

        if let Some(title) = patch.title {
            section.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            section.description = Some(description);
        }
        if let Some(order) = patch.order {
            section.sort_order = order;
        }
        section.updated_at = self.timestamp();

        sqlx::query(
            r#"
            UPDATE checklist_sections
            SET title = ?, description = ?, sort_order = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&section.title)
        .bind(&section.description)
        .bind(section.sort_order)
        .bind(&section.updated_at)
        .bind(section_id)
        .execute(&mut *conn)
        .await?;

        Ok(section)
    }

    /// Delete an empty section; sections holding questions are a conflict
    pub async fn delete_section(&self, template_id: &str, section_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        fetch_section(&mut *tx, template_id, section_id).await?;

        let questions: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM checklist_questions WHERE section_id = ?")
                .bind(section_id)
                .fetch_one(&mut *tx)
                .await?;
        if questions > 0 {
            return Err(Error::Conflict(
                "Cannot delete section that contains questions. Please delete the questions first."
                    .to_string(),
            ));
        }

        sqlx::query("DELETE FROM checklist_sections WHERE id = ?")
            .bind(section_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(section_id = %section_id, "Deleted section");
        Ok(())
    }

    /// Apply a batch of section orders; ids outside the template abort
    /// the whole batch
    pub async fn reorder_sections(
        &self,
        template_id: &str,
        entries: &[ReorderEntry],
    ) -> Result<Vec<Section>> {
        check_reorder("sections", entries)?;
        let now = self.timestamp();

        let mut tx = self.pool.begin().await?;
        fetch_template(&mut *tx, template_id).await?;
        for entry in entries {
            let updated = sqlx::query(
                "UPDATE checklist_sections SET sort_order = ?, updated_at = ? WHERE id = ? AND template_id = ?",
            )
            .bind(entry.order)
            .bind(&now)
            .bind(&entry.id)
            .bind(template_id)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                return Err(Error::SectionNotFound(entry.id.clone()));
            }
        }
        tx.commit().await?;

        let sections = sqlx::query_as::<_, Section>(
            "SELECT * FROM checklist_sections WHERE template_id = ? ORDER BY sort_order, rowid",
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sections)
    }

    // ===== Question Operations =====

    pub async fn list_questions(&self, template_id: &str, section_id: &str) -> Result<Vec<Question>> {
        let mut conn = self.pool.acquire().await?;
        fetch_section(&mut *conn, template_id, section_id).await?;
        section_questions(&mut *conn, section_id).await
    }

    pub async fn get_question(
        &self,
        template_id: &str,
        section_id: &str,
        question_id: &str,
    ) -> Result<Question> {
        let mut conn = self.pool.acquire().await?;
        fetch_section(&mut *conn, template_id, section_id).await?;
        fetch_question(&mut *conn, section_id, question_id).await
    }

    pub async fn create_question(
        &self,
        template_id: &str,
        section_id: &str,
        new: NewQuestion,
    ) -> Result<Question> {
        new.validate()?;
        let now = self.timestamp();

        let mut tx = self.pool.begin().await?;
        fetch_section(&mut *tx, template_id, section_id).await?;
        let question = insert_question(&mut *tx, section_id, &new, &now).await?;
        tx.commit().await?;

        debug!(question_id = %question.id, code = %question.question_code, "Created question");
        Ok(question)
    }

    pub async fn update_question(
        &self,
        template_id: &str,
        section_id: &str,
        question_id: &str,
        patch: QuestionPatch,
    ) -> Result<Question> {
        let mut tx = self.pool.begin().await?;
        fetch_section(&mut *tx, template_id, section_id).await?;
        let mut question = fetch_question(&mut *tx, section_id, question_id).await?;
        patch.validate(&question)?;

        if let Some(code) = patch.question_code {
            let code = code.trim().to_string();
            ensure_code_available(&mut *tx, &code, Some(question_id)).await?;
            question.question_code = code;
        }
        if let Some(text) = patch.question_text {
            question.question_text = text;
        }
        if let Some(question_type) = patch.question_type {
            question.question_type = question_type;
        }
        if let Some(options) = patch.options {
            question.options = Some(sqlx::types::Json(options));
        }
        if let Some(required) = patch.required {
            question.required = required;
        }
        if let Some(rules) = patch.validation_rules {
            question.validation_rules = Some(rules).filter(|r| !r.trim().is_empty());
        }
        if let Some(placeholder) = patch.placeholder {
            question.placeholder = Some(placeholder);
        }
        if let Some(order) = patch.order {
            question.sort_order = order;
        }
        question.updated_at = self.timestamp();

        sqlx::query(
            r#"
            UPDATE checklist_questions
            SET question_code = ?, question_text = ?, question_type = ?, options = ?,
                required = ?, validation_rules = ?, placeholder = ?, sort_order = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&question.question_code)
        .bind(&question.question_text)
        .bind(question.question_type.as_str())
        .bind(encode_options(&question)?)
        .bind(question.required)
        .bind(&question.validation_rules)
        .bind(&question.placeholder)
        .bind(question.sort_order)
        .bind(&question.updated_at)
        .bind(question_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(question)
    }

    /// Delete an unanswered question; answered questions are a conflict
    pub async fn delete_question(
        &self,
        template_id: &str,
        section_id: &str,
        question_id: &str,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        fetch_section(&mut *tx, template_id, section_id).await?;
        fetch_question(&mut *tx, section_id, question_id).await?;

        let answers: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM checklist_answers WHERE question_id = ?")
                .bind(question_id)
                .fetch_one(&mut *tx)
                .await?;
        if answers > 0 {
            return Err(Error::Conflict(
                "Cannot delete question that has answers. Please delete the answers first."
                    .to_string(),
            ));
        }

        sqlx::query("DELETE FROM checklist_questions WHERE id = ?")
            .bind(question_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(question_id = %question_id, "Deleted question");
        Ok(())
    }

    pub async fn reorder_questions(
        &self,
        template_id: &str,
        section_id: &str,
        entries: &[ReorderEntry],
    ) -> Result<Vec<Question>> {
        check_reorder("questions", entries)?;
        let now = self.timestamp();

        let mut tx = self.pool.begin().await?;
        fetch_section(&mut *tx, template_id, section_id).await?;
        for entry in entries {
            let updated = sqlx::query(
                "UPDATE checklist_questions SET sort_order = ?, updated_at = ? WHERE id = ? AND section_id = ?",
            )
            .bind(entry.order)
            .bind(&now)
            .bind(&entry.id)
            .bind(section_id)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                return Err(Error::QuestionNotFound(entry.id.clone()));
            }
        }
        let questions = section_questions(&mut *tx, section_id).await?;
        tx.commit().await?;
        Ok(questions)
    }

    /// Effective rules, type and required flag of a question
    pub async fn question_rules(
        &self,
        template_id: &str,
        section_id: &str,
        question_id: &str,
    ) -> Result<QuestionRules> {
        let question = self.get_question(template_id, section_id, question_id).await?;
        Ok(crate::rules::question_rules(&question))
    }
}

fn group_questions(sections: Vec<Section>, questions: Vec<Question>) -> Vec<SectionWithQuestions> {
    let mut by_section: HashMap<String, Vec<Question>> = HashMap::new();
    for question in questions {
        by_section
            .entry(question.section_id.clone())
            .or_default()
            .push(question);
    }

    sections
        .into_iter()
        .map(|section| {
            let questions = by_section.remove(&section.id).unwrap_or_default();
            SectionWithQuestions { section, questions }
        })
        .collect()
}

fn check_reorder(field: &str, entries: &[ReorderEntry]) -> Result<()> {
    if entries.is_empty() {
        return Err(Error::invalid(field, "is required"));
    }
    if entries.iter().any(|e| e.order < 0) {
        return Err(Error::invalid(field, "orders must be at least 0"));
    }
    Ok(())
}

fn encode_options(question: &Question) -> Result<Option<String>> {
    Ok(question
        .options
        .as_ref()
        .map(|o| serde_json::to_string(&o.0))
        .transpose()?)
}

async fn fetch_template(conn: &mut SqliteConnection, id: &str) -> Result<Template> {
    sqlx::query_as::<_, Template>("SELECT * FROM checklist_templates WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::TemplateNotFound(id.to_string()))
}

async fn fetch_section(conn: &mut SqliteConnection, template_id: &str, section_id: &str) -> Result<Section> {
    fetch_template(&mut *conn, template_id).await?;
    sqlx::query_as::<_, Section>("SELECT * FROM checklist_sections WHERE id = ? AND template_id = ?")
        .bind(section_id)
        .bind(template_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::SectionNotFound(section_id.to_string()))
}

async fn fetch_question(conn: &mut SqliteConnection, section_id: &str, question_id: &str) -> Result<Question> {
    sqlx::query_as::<_, Question>("SELECT * FROM checklist_questions WHERE id = ? AND section_id = ?")
        .bind(question_id)
        .bind(section_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::QuestionNotFound(question_id.to_string()))
}

async fn section_questions(conn: &mut SqliteConnection, section_id: &str) -> Result<Vec<Question>> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT * FROM checklist_questions WHERE section_id = ? ORDER BY sort_order, rowid",
    )
    .bind(section_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(questions)
}

async fn deactivate_others(conn: &mut SqliteConnection, keep_id: &str, now: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE checklist_templates SET is_active = 0, updated_at = ? WHERE is_active = 1 AND id != ?",
    )
    .bind(now)
    .bind(keep_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() > 0 {
        debug!(count = result.rows_affected(), "Deactivated previously active templates");
    }
    Ok(())
}

async fn insert_template(conn: &mut SqliteConnection, template: &Template) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO checklist_templates (id, name, version, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&template.id)
    .bind(&template.name)
    .bind(&template.version)
    .bind(template.is_active)
    .bind(&template.created_at)
    .bind(&template.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_section(conn: &mut SqliteConnection, section: &Section) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO checklist_sections (id, template_id, title, description, sort_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&section.id)
    .bind(&section.template_id)
    .bind(&section.title)
    .bind(&section.description)
    .bind(section.sort_order)
    .bind(&section.created_at)
    .bind(&section.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn ensure_code_available(
    conn: &mut SqliteConnection,
    code: &str,
    exclude_id: Option<&str>,
) -> Result<()> {
    let taken: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM checklist_questions WHERE question_code = ? AND id != ?",
    )
    .bind(code)
    .bind(exclude_id.unwrap_or(""))
    .fetch_one(&mut *conn)
    .await?;

    if taken > 0 {
        return Err(Error::invalid(
            "question_code",
            format!("'{}' has already been taken", code),
        ));
    }
    Ok(())
}

async fn insert_question(
    conn: &mut SqliteConnection,
    section_id: &str,
    new: &NewQuestion,
    now: &str,
) -> Result<Question> {
    let code = new.question_code.trim().to_string();
    ensure_code_available(&mut *conn, &code, None).await?;

    let question = Question {
        id: new_id(),
        section_id: section_id.to_string(),
        question_code: code,
        question_text: new.question_text.clone(),
        question_type: new.question_type,
        options: new.options.clone().map(sqlx::types::Json),
        required: new.required,
        validation_rules: new
            .validation_rules
            .clone()
            .filter(|r| !r.trim().is_empty()),
        placeholder: new.placeholder.clone(),
        sort_order: new.order.unwrap_or(0),
        created_at: now.to_string(),
        updated_at: now.to_string(),
    };

    sqlx::query(
        r#"
        INSERT INTO checklist_questions
            (id, section_id, question_code, question_text, question_type, options, required,
             validation_rules, placeholder, sort_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&question.id)
    .bind(&question.section_id)
    .bind(&question.question_code)
    .bind(&question.question_text)
    .bind(question.question_type.as_str())
    .bind(encode_options(&question)?)
    .bind(question.required)
    .bind(&question.validation_rules)
    .bind(&question.placeholder)
    .bind(question.sort_order)
    .bind(&question.created_at)
    .bind(&question.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(question)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::model::QuestionType;

    #[tokio::test]
    async fn test_active_template_structure_is_ordered() {
        let (db, _tmp) = setup_test_db().await;
        assert!(matches!(
            db.get_active_template_with_structure().await,
            Err(Error::NoActiveTemplate)
        ));

        let seeded = seed_template(&db).await;
        let structure = db.get_active_template_with_structure().await.unwrap();
        assert_eq!(structure.template.id, seeded.template.id);
        assert_eq!(structure.sections.len(), 2);
        assert_eq!(structure.total_questions_count(), 2);
        assert_eq!(structure.required_questions_count(), 2);
        assert!(structure
            .sections
            .windows(2)
            .all(|w| w[0].section.sort_order <= w[1].section.sort_order));
    }

    #[tokio::test]
    async fn test_section_and_question_ordering_with_ties() {
        let (db, _tmp) = setup_test_db().await;
        let template = db
            .create_template(NewTemplate {
                name: "Ordering".into(),
                version: "1".into(),
                is_active: true,
            })
            .await
            .unwrap();

        let later = db
            .create_section(
                &template.id,
                NewSection {
                    title: "Later".into(),
                    description: None,
                    order: Some(5),
                },
            )
            .await
            .unwrap();
        let first = db
            .create_section(
                &template.id,
                NewSection {
                    title: "First".into(),
                    description: None,
                    order: Some(1),
                },
            )
            .await
            .unwrap();

        for (code, order) in [("b", 2), ("a", 1), ("tie", 2)] {
            let mut q = question(code, QuestionType::Text, false);
            q.order = Some(order);
            db.create_question(&template.id, &first.id, q).await.unwrap();
        }

        let structure = db.get_template_with_structure(&template.id).await.unwrap();
        let titles: Vec<_> = structure.sections.iter().map(|s| s.section.title.as_str()).collect();
        assert_eq!(titles, ["First", "Later"]);
        assert_eq!(structure.sections[1].section.id, later.id);

        let codes: Vec<_> = structure.sections[0]
            .questions
            .iter()
            .map(|q| q.question_code.as_str())
            .collect();
        assert_eq!(codes, ["a", "b", "tie"]);
    }

    #[tokio::test]
    async fn test_single_active_template() {
        let (db, _tmp) = setup_test_db().await;
        let first = seed_template(&db).await;
        let second = db
            .create_template(NewTemplate {
                name: "Second".into(),
                version: "2.0".into(),
                is_active: true,
            })
            .await
            .unwrap();

        let active = db.get_active_template().await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
        let first = db.get_template(&first.template.id).await.unwrap().unwrap();
        assert!(!first.is_active);

        db.update_template(
            &first.id,
            TemplatePatch {
                is_active: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let active = db.list_active_templates().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].template.id, first.id);
    }

    #[tokio::test]
    async fn test_template_validation() {
        let (db, _tmp) = setup_test_db().await;
        let err = db
            .create_template(NewTemplate {
                name: "x".repeat(256),
                version: "".into(),
                is_active: false,
            })
            .await
            .unwrap_err();
        let Error::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains("name"));
        assert!(errors.contains("version"));
    }

    #[tokio::test]
    async fn test_delete_section_with_questions_conflicts() {
        let (db, _tmp) = setup_test_db().await;
        let structure = seed_template(&db).await;
        let section = &structure.sections[0];

        let err = db
            .delete_section(&structure.template.id, &section.section.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let question = &section.questions[0];
        db.delete_question(&structure.template.id, &section.section.id, &question.id)
            .await
            .unwrap();
        db.delete_section(&structure.template.id, &section.section.id)
            .await
            .unwrap();

        let sections = db.list_sections(&structure.template.id).await.unwrap();
        assert_eq!(sections.len(), 1);
    }

    #[tokio::test]
    async fn test_question_code_unique() {
        let (db, _tmp) = setup_test_db().await;
        let structure = seed_template(&db).await;
        let template_id = &structure.template.id;
        let section = &structure.sections[0].section;

        let mut duplicate = question("panel_ok", QuestionType::YesNo, true);
        duplicate.order = Some(2);
        let err = db
            .create_question(template_id, &section.id, duplicate)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ref e) if e.contains("question_code")));

        // Renaming a question to its own code is allowed
        let existing = &structure.sections[0].questions[0];
        let updated = db
            .update_question(
                template_id,
                &section.id,
                &existing.id,
                QuestionPatch {
                    question_code: Some("panel_ok".into()),
                    question_text: Some("Panel fitted correctly?".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.question_text, "Panel fitted correctly?");

        let err = db
            .update_question(
                template_id,
                &section.id,
                &existing.id,
                QuestionPatch {
                    question_code: Some("recommendation".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_reorder_sections() {
        let (db, _tmp) = setup_test_db().await;
        let structure = seed_template(&db).await;
        let template_id = &structure.template.id;
        let first = &structure.sections[0].section;
        let second = &structure.sections[1].section;

        let sections = db
            .reorder_sections(
                template_id,
                &[
                    ReorderEntry { id: first.id.clone(), order: 2 },
                    ReorderEntry { id: second.id.clone(), order: 1 },
                ],
            )
            .await
            .unwrap();
        assert_eq!(sections[0].id, second.id);
        assert_eq!(sections[1].id, first.id);
    }

    #[tokio::test]
    async fn test_reorder_rejects_foreign_ids_atomically() {
        let (db, _tmp) = setup_test_db().await;
        let structure = seed_template(&db).await;
        let template_id = &structure.template.id;
        let first = &structure.sections[0].section;

        let err = db
            .reorder_sections(
                template_id,
                &[
                    ReorderEntry { id: first.id.clone(), order: 9 },
                    ReorderEntry { id: "missing".into(), order: 1 },
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SectionNotFound(_)));

        let section = db.get_section(template_id, &first.id).await.unwrap();
        assert_eq!(section.section.sort_order, first.sort_order);
    }

    #[tokio::test]
    async fn test_question_rules_endpoint_data() {
        let (db, _tmp) = setup_test_db().await;
        let structure = seed_template(&db).await;
        let section = &structure.sections[0];
        let rules = db
            .question_rules(
                &structure.template.id,
                &section.section.id,
                &section.questions[0].id,
            )
            .await
            .unwrap();
        assert_eq!(rules.validation_rules_array, vec!["required"]);
        assert_eq!(rules.question_type, QuestionType::YesNo);
        assert!(rules.is_required);
    }

    #[tokio::test]
    async fn test_lookups_scoped_to_parent() {
        let (db, _tmp) = setup_test_db().await;
        let structure = seed_template(&db).await;
        let other = db
            .create_template(NewTemplate {
                name: "Other".into(),
                version: "1".into(),
                is_active: false,
            })
            .await
            .unwrap();

        let err = db
            .get_section(&other.id, &structure.sections[0].section.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SectionNotFound(_)));

        let err = db
            .get_question(
                &structure.template.id,
                &structure.sections[1].section.id,
                &structure.sections[0].questions[0].id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::QuestionNotFound(_)));

        assert!(matches!(
            db.get_template_with_structure("nope").await,
            Err(Error::TemplateNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_template_cascades() {
        let (db, _tmp) = setup_test_db().await;
        let structure = seed_template(&db).await;
        db.delete_template(&structure.template.id).await.unwrap();

        let questions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM checklist_questions")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(questions, 0);
        assert!(db.get_active_template().await.unwrap().is_none());
    }
}
