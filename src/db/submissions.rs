//! Submission engine and lifecycle transitions

use super::installations::set_verified;
use super::{new_id, ChecklistDb};
use crate::error::{Error, Result, ValidationErrors};
use crate::model::{
    Answer, AnswerWithQuestion, FormData, FormValue, Question, Submission, SubmissionDetail,
    SubmissionHeader, SubmissionStatus, SubmitRequest, TemplateStructure,
};
use crate::projection::{encode, project_answer};
use crate::rules::validate_form;
use sqlx::SqliteConnection;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

impl ChecklistDb {
    // ===== Submission Operations =====

    /// Submit a completed checklist for an installation against the active
    /// template
    ///
    /// The submission row, its answers, the draft removal and the
    /// installation verification all commit together or not at all.
    pub async fn submit(&self, installation_id: &str, request: &SubmitRequest) -> Result<Submission> {
        let structure = self.get_active_template_with_structure().await?;
        let (header, form) = request.validate()?;
        self.require_installation(installation_id).await?;

        if self.submission.enforce_question_rules {
            validate_form(&structure, &form).into_result()?;
        }

        self.write_submission(installation_id, &structure, &header, &form)
            .await
    }

    async fn write_submission(
        &self,
        installation_id: &str,
        structure: &TemplateStructure,
        header: &SubmissionHeader,
        form: &FormData,
    ) -> Result<Submission> {
        let now = self.timestamp();
        let settings = &self.submission;

        let installation_company = match form.get(&settings.company_key) {
            Some(FormValue::Text(company)) if !company.trim().is_empty() => company.clone(),
            _ => settings.default_installation_company.clone(),
        };
        let passed = form
            .get(&settings.pass_recommendation_key)
            .and_then(FormValue::as_str)
            == Some(settings.pass_recommendation_value.as_str());

        let submission = Submission {
            id: new_id(),
            installation_id: installation_id.to_string(),
            template_id: structure.template.id.clone(),
            status: SubmissionStatus::Submitted,
            progress_percentage: 100,
            checklist_date: header.checklist_date.to_string(),
            installation_technician: header.installation_technician.clone(),
            installation_company,
            technician_signature: header.technician_signature.clone(),
            health_center_signature: header.health_center_signature.clone(),
            health_center_name: header.health_center_name.clone(),
            completion_date: header.completion_date.to_string(),
            created_at: now.clone(),
            updated_at: now.clone(),
            deleted_at: None,
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Transaction(e.to_string()))?;

        let written = async {
            insert_submission(&mut *tx, &submission).await?;

            let mut written = 0usize;
            for question in structure.questions() {
                let Some(value) = form.get(&question.question_code) else {
                    continue;
                };
                let Some(answer) = encode(question.question_type, value) else {
                    continue;
                };
                insert_answer(&mut *tx, &submission.id, question, &answer, &now).await?;
                written += 1;
            }

            sqlx::query("DELETE FROM checklist_drafts WHERE installation_id = ? AND template_id = ?")
                .bind(installation_id)
                .bind(&submission.template_id)
                .execute(&mut *tx)
                .await?;

            if passed {
                set_verified(&mut *tx, installation_id, true, &now).await?;
            }
            Ok::<usize, Error>(written)
        }
        .await;

        let written = match written {
            Ok(written) => written,
            Err(e) => {
                error!(installation_id = %installation_id, "Submission failed, rolling back: {}", e);
                if let Err(rollback) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback);
                }
                return Err(Error::Transaction(failure_cause(e)));
            }
        };

        tx.commit()
            .await
            .map_err(|e| Error::Transaction(e.to_string()))?;

        info!(
            installation_id = %installation_id,
            submission_id = %submission.id,
            answers = written,
            verified = passed,
            "Checklist submitted"
        );
        Ok(submission)
    }

    /// Evaluate a form against the active template without writing anything
    pub async fn validate_active_form(&self, form: &FormData) -> Result<ValidationErrors> {
        let structure = self.get_active_template_with_structure().await?;
        Ok(validate_form(&structure, form))
    }

    /// Submitted and verified checklists of an installation, newest first
    pub async fn list_installation_submissions(
        &self,
        installation_id: &str,
    ) -> Result<Vec<SubmissionDetail>> {
        self.require_installation(installation_id).await?;

        let submissions = sqlx::query_as::<_, Submission>(
            r#"
            SELECT * FROM checklist_submissions
            WHERE installation_id = ? AND deleted_at IS NULL AND status IN (?, ?)
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(installation_id)
        .bind(SubmissionStatus::Submitted.to_string())
        .bind(SubmissionStatus::Verified.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut details = Vec::with_capacity(submissions.len());
        for submission in submissions {
            details.push(self.load_detail(submission).await?);
        }
        Ok(details)
    }

    /// Non-deleted submission row
    pub async fn find_submission(&self, id: &str) -> Result<Option<Submission>> {
        let submission = sqlx::query_as::<_, Submission>(
            "SELECT * FROM checklist_submissions WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(submission)
    }

    /// Submission with template, answers and their questions
    pub async fn get_submission(&self, id: &str) -> Result<SubmissionDetail> {
        let submission = self.require_submission(id).await?;
        self.load_detail(submission).await
    }

    /// Stored answer for a question code, resolved through the code rather
    /// than the question id
    pub async fn answer_for_code(&self, submission_id: &str, code: &str) -> Result<Option<String>> {
        self.require_submission(submission_id).await?;

        let answer: Option<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT a.answer FROM checklist_answers a
            JOIN checklist_questions q ON q.id = a.question_id
            WHERE a.submission_id = ? AND q.question_code = ?
            "#,
        )
        .bind(submission_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(answer.flatten())
    }

    /// Move a submission from `submitted` to `verified`
    pub async fn verify_submission(&self, id: &str) -> Result<Submission> {
        let mut submission = self.require_submission(id).await?;
        let target = SubmissionStatus::Verified;
        if !submission.status.can_transition_to(target) {
            return Err(Error::InvalidTransition {
                from: submission.status.to_string(),
                to: target.to_string(),
            });
        }

        let now = self.timestamp();
        let result = sqlx::query(
            "UPDATE checklist_submissions SET status = ?, updated_at = ? WHERE id = ? AND status = ? AND deleted_at IS NULL",
        )
        .bind(target.to_string())
        .bind(&now)
        .bind(id)
        .bind(submission.status.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Lost a race with another transition
            return Err(Error::InvalidTransition {
                from: submission.status.to_string(),
                to: target.to_string(),
            });
        }

        info!(submission_id = %id, "Submission verified");
        submission.status = target;
        submission.updated_at = now;
        Ok(submission)
    }

    /// Soft-delete a submission; its answers stay in place
    pub async fn delete_submission(&self, id: &str) -> Result<()> {
        let now = self.timestamp();
        let result = sqlx::query(
            "UPDATE checklist_submissions SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::SubmissionNotFound(id.to_string()));
        }
        debug!(submission_id = %id, "Soft-deleted submission");
        Ok(())
    }

    async fn require_submission(&self, id: &str) -> Result<Submission> {
        self.find_submission(id)
            .await?
            .ok_or_else(|| Error::SubmissionNotFound(id.to_string()))
    }

    async fn load_detail(&self, submission: Submission) -> Result<SubmissionDetail> {
        let template = self
            .get_template(&submission.template_id)
            .await?
            .ok_or_else(|| Error::TemplateNotFound(submission.template_id.clone()))?;

        let answers = sqlx::query_as::<_, Answer>(
            r#"
            SELECT a.* FROM checklist_answers a
            JOIN checklist_questions q ON q.id = a.question_id
            JOIN checklist_sections s ON s.id = q.section_id
            WHERE a.submission_id = ?
            ORDER BY s.sort_order, s.rowid, q.sort_order, q.rowid
            "#,
        )
        .bind(&submission.id)
        .fetch_all(&self.pool)
        .await?;

        let mut questions: HashMap<String, Question> = sqlx::query_as::<_, Question>(
            r#"
            SELECT q.* FROM checklist_questions q
            JOIN checklist_answers a ON a.question_id = q.id
            WHERE a.submission_id = ?
            "#,
        )
        .bind(&submission.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|q| (q.id.clone(), q))
        .collect();

        let answers = answers
            .into_iter()
            .filter_map(|answer| {
                let question = questions.remove(&answer.question_id)?;
                Some(AnswerWithQuestion {
                    value: project_answer(&answer, &question),
                    answer,
                    question,
                })
            })
            .collect();

        Ok(SubmissionDetail {
            submission,
            template,
            answers,
        })
    }
}

fn failure_cause(err: Error) -> String {
    match err {
        Error::Database(e) => e.to_string(),
        other => other.to_string(),
    }
}

async fn insert_submission(conn: &mut SqliteConnection, submission: &Submission) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO checklist_submissions
            (id, installation_id, template_id, status, progress_percentage, checklist_date,
             installation_technician, installation_company, technician_signature,
             health_center_signature, health_center_name, completion_date,
             created_at, updated_at, deleted_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)
        "#,
    )
    .bind(&submission.id)
    .bind(&submission.installation_id)
    .bind(&submission.template_id)
    .bind(submission.status.to_string())
    .bind(submission.progress_percentage)
    .bind(&submission.checklist_date)
    .bind(&submission.installation_technician)
    .bind(&submission.installation_company)
    .bind(&submission.technician_signature)
    .bind(&submission.health_center_signature)
    .bind(&submission.health_center_name)
    .bind(&submission.completion_date)
    .bind(&submission.created_at)
    .bind(&submission.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_answer(
    conn: &mut SqliteConnection,
    submission_id: &str,
    question: &Question,
    answer: &str,
    now: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO checklist_answers (id, submission_id, question_id, answer, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new_id())
    .bind(submission_id)
    .bind(&question.id)
    .bind(answer)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::model::{
        FormValue, QuestionType, SaveDraftRequest, SectionDefinition, TemplateDefinition,
    };
    use crate::projection::AnswerValue;
    use serde_json::{json, Value};

    fn request(form_data: Value) -> SubmitRequest {
        SubmitRequest {
            form_data: Some(form_data),
            checklist_date: Some(json!("2025-10-14")),
            installation_technician: Some(json!("Ada Obi")),
            technician_signature: Some(json!("data:image/png;base64,AAA")),
            health_center_signature: Some(json!("data:image/png;base64,BBB")),
            health_center_name: Some(json!("Kano PHC")),
            completion_date: Some(json!("2025-10-15")),
        }
    }

    async fn count(db: &ChecklistDb, table: &str) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        sqlx::query_scalar(&sql)
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    async fn abc_template(db: &ChecklistDb) -> TemplateStructure {
        db.import_template(TemplateDefinition {
            name: "ABC".into(),
            version: "1".into(),
            is_active: true,
            sections: vec![SectionDefinition {
                title: "Only".into(),
                description: None,
                order: None,
                questions: vec![
                    question("A", QuestionType::Text, true),
                    question("B", QuestionType::Text, false),
                    question("C", QuestionType::Text, false),
                ],
            }],
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_panel_ok() {
        let (db, _tmp) = setup_test_db().await;
        let structure = seed_template(&db).await;
        let template_id = &structure.template.id;
        db.register_installation("inst-1", None).await.unwrap();

        let mut draft_form = FormData::new();
        draft_form.insert("panel_ok".into(), "yes".into());
        let draft = db
            .save_draft("inst-1", template_id, &draft_form, 50, None)
            .await
            .unwrap();
        assert_eq!(draft.form_value("panel_ok"), Some(&FormValue::from("yes")));

        let submission = db
            .submit(
                "inst-1",
                &request(json!({"panel_ok": "yes", "recommendation": "PASS"})),
            )
            .await
            .unwrap();
        assert_eq!(submission.status, SubmissionStatus::Submitted);
        assert_eq!(submission.progress_percentage, 100);
        assert_eq!(submission.installation_company, "Inter-Trade Ltd.");

        let detail = db.get_submission(&submission.id).await.unwrap();
        assert_eq!(detail.answers.len(), 2);
        assert_eq!(detail.answer_for_code("panel_ok"), Some("yes"));
        assert_eq!(detail.answers[0].value, AnswerValue::Bool(true));

        assert!(db.get_draft("inst-1", template_id).await.unwrap().is_none());
        let installation = db.require_installation("inst-1").await.unwrap();
        assert!(installation.verified_by_health_officer);
    }

    #[tokio::test]
    async fn test_only_non_empty_known_answers_are_written() {
        let (db, _tmp) = setup_test_db().await;
        abc_template(&db).await;
        db.register_installation("inst-1", None).await.unwrap();

        let submission = db
            .submit("inst-1", &request(json!({"A": "x", "C": "", "typo": "ignored"})))
            .await
            .unwrap();

        let detail = db.get_submission(&submission.id).await.unwrap();
        assert_eq!(detail.answers.len(), 1);
        assert_eq!(detail.answers[0].question.question_code, "A");
        assert_eq!(db.answer_for_code(&submission.id, "A").await.unwrap().as_deref(), Some("x"));
        assert_eq!(db.answer_for_code(&submission.id, "B").await.unwrap(), None);
        assert_eq!(count(&db, "checklist_answers").await, 1);
    }

    #[tokio::test]
    async fn test_structured_values_are_accepted() {
        let (db, _tmp) = setup_test_db().await;
        let structure = abc_template(&db).await;
        db.register_installation("inst-1", None).await.unwrap();

        let form = json!({
            "A": "x",
            "B": {"lat": 1.0, "lng": 2.0},
            "gps": {"lat": 1.0, "lng": 2.0},
            "counts": [1, 2]
        });
        let submission = db.submit("inst-1", &request(form.clone())).await.unwrap();

        assert_eq!(count(&db, "checklist_answers").await, 2);
        assert_eq!(
            db.answer_for_code(&submission.id, "B").await.unwrap().as_deref(),
            Some(r#"{"lat":1.0,"lng":2.0}"#)
        );

        // Drafts keep the whole document, unmatched keys included
        db.register_installation("inst-2", None).await.unwrap();
        let input = SaveDraftRequest {
            form_data: Some(form),
            progress_percentage: Some(json!(30)),
            section: None,
        }
        .validate()
        .unwrap();
        let draft = db
            .save_draft("inst-2", &structure.template.id, &input.form_data, 30, None)
            .await
            .unwrap();
        assert_eq!(draft.form_value("counts"), Some(&FormValue::Other(json!([1, 2]))));
    }

    #[tokio::test]
    async fn test_recommendation_side_effect() {
        let (db, _tmp) = setup_test_db().await;
        seed_template(&db).await;
        db.register_installation("fail", None).await.unwrap();
        db.register_installation("absent", None).await.unwrap();

        db.submit("fail", &request(json!({"panel_ok": "no", "recommendation": "FAIL"})))
            .await
            .unwrap();
        db.submit("absent", &request(json!({"panel_ok": "yes"})))
            .await
            .unwrap();

        assert!(!db.require_installation("fail").await.unwrap().verified_by_health_officer);
        assert!(!db.require_installation("absent").await.unwrap().verified_by_health_officer);
    }

    #[tokio::test]
    async fn test_submit_rolls_back_on_failure() {
        let (db, _tmp) = setup_test_db().await;
        let structure = abc_template(&db).await;
        db.register_installation("inst-1", None).await.unwrap();

        let mut draft_form = FormData::new();
        draft_form.insert("A".into(), "x".into());
        db.save_draft("inst-1", &structure.template.id, &draft_form, 30, None)
            .await
            .unwrap();

        sqlx::query(
            r#"
            CREATE TRIGGER fail_answer BEFORE INSERT ON checklist_answers
            WHEN NEW.answer = 'explode'
            BEGIN
                SELECT RAISE(ABORT, 'injected failure');
            END
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = db
            .submit(
                "inst-1",
                &request(json!({"A": "x", "B": "explode", "recommendation": "PASS"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transaction(_)));
        assert!(err.to_string().contains("injected failure"));

        assert_eq!(count(&db, "checklist_submissions").await, 0);
        assert_eq!(count(&db, "checklist_answers").await, 0);
        assert!(db
            .get_draft("inst-1", &structure.template.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_submit_preconditions() {
        let (db, _tmp) = setup_test_db().await;
        db.register_installation("inst-1", None).await.unwrap();

        let err = db
            .submit("inst-1", &request(json!({"panel_ok": "yes"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoActiveTemplate));

        seed_template(&db).await;
        let mut bad = request(json!({"panel_ok": "yes"}));
        bad.health_center_name = None;
        bad.completion_date = Some(json!("soon"));
        let Error::Validation(errors) = db.submit("inst-1", &bad).await.unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(errors.contains("health_center_name"));
        assert!(errors.contains("completion_date"));

        let err = db
            .submit("ghost", &request(json!({"panel_ok": "yes"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InstallationNotFound(_)));
        assert_eq!(count(&db, "checklist_submissions").await, 0);
    }

    #[tokio::test]
    async fn test_company_from_form() {
        let (db, _tmp) = setup_test_db().await;
        seed_template(&db).await;
        db.register_installation("inst-1", None).await.unwrap();

        let submission = db
            .submit(
                "inst-1",
                &request(json!({"panel_ok": "yes", "installationCompany": "SolarCo"})),
            )
            .await
            .unwrap();
        assert_eq!(submission.installation_company, "SolarCo");
    }

    #[tokio::test]
    async fn test_strict_mode_checks_rules() {
        let (db, _tmp) = setup_test_db().await;
        seed_template(&db).await;
        db.register_installation("inst-1", None).await.unwrap();

        let mut settings = db.submission_config().clone();
        settings.enforce_question_rules = true;
        let strict = db.clone().with_submission_config(settings);

        let Error::Validation(errors) = strict
            .submit("inst-1", &request(json!({"panel_ok": "maybe"})))
            .await
            .unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert!(errors.contains("panel_ok"));
        assert!(errors.contains("recommendation"));

        // The permissive default accepts the same form
        db.submit("inst-1", &request(json!({"panel_ok": "maybe"})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_answered_question_cannot_be_deleted() {
        let (db, _tmp) = setup_test_db().await;
        let structure = seed_template(&db).await;
        db.register_installation("inst-1", None).await.unwrap();
        db.submit("inst-1", &request(json!({"panel_ok": "yes"})))
            .await
            .unwrap();

        let section = &structure.sections[0];
        let question = &section.questions[0];
        let err = db
            .delete_question(&structure.template.id, &section.section.id, &question.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(db
            .get_question(&structure.template.id, &section.section.id, &question.id)
            .await
            .is_ok());

        let err = db.delete_template(&structure.template.id).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_verify_lifecycle() {
        let (db, _tmp) = setup_test_db().await;
        seed_template(&db).await;
        db.register_installation("inst-1", None).await.unwrap();
        let submission = db
            .submit("inst-1", &request(json!({"panel_ok": "yes"})))
            .await
            .unwrap();

        let verified = db.verify_submission(&submission.id).await.unwrap();
        assert_eq!(verified.status, SubmissionStatus::Verified);

        let err = db.verify_submission(&submission.id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));

        let listed = db.list_installation_submissions("inst-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].submission.is_verified());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_submission() {
        let (db, _tmp) = setup_test_db().await;
        seed_template(&db).await;
        db.register_installation("inst-1", None).await.unwrap();

        let first = db
            .submit("inst-1", &request(json!({"panel_ok": "yes"})))
            .await
            .unwrap();
        let second = db
            .submit("inst-1", &request(json!({"panel_ok": "no"})))
            .await
            .unwrap();

        let listed = db.list_installation_submissions("inst-1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].submission.id, second.id);

        db.delete_submission(&first.id).await.unwrap();
        let listed = db.list_installation_submissions("inst-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(matches!(
            db.get_submission(&first.id).await,
            Err(Error::SubmissionNotFound(_))
        ));
        assert!(matches!(
            db.delete_submission(&first.id).await,
            Err(Error::SubmissionNotFound(_))
        ));
        assert_eq!(count(&db, "checklist_answers").await, 2);
    }

    #[tokio::test]
    async fn test_list_answers_grouped_by_section() {
        let (db, _tmp) = setup_test_db().await;
        let structure = seed_template(&db).await;
        db.register_installation("inst-1", None).await.unwrap();
        let submission = db
            .submit(
                "inst-1",
                &request(json!({"panel_ok": true, "recommendation": "PASS"})),
            )
            .await
            .unwrap();

        let detail = db.get_submission(&submission.id).await.unwrap();
        let grouped = detail.answers_by_section();
        assert_eq!(grouped.len(), 2);
        let first_section = structure.sections[0].section.id.as_str();
        assert_eq!(grouped[first_section][0].answer.answer.as_deref(), Some("yes"));
    }
}
