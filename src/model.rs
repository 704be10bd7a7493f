//! Checklist domain types
//!
//! Row types map 1:1 to the SQLite tables in [`crate::db`]; the request types
//! at the bottom carry loosely-typed client input until it is validated.

use crate::error::{Error, Result, ValidationErrors};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Maximum length of short text columns (names, titles, signatures)
pub const MAX_SHORT_TEXT: usize = 255;

/// Maximum length of a question code
pub const MAX_QUESTION_CODE: usize = 100;

/// Maximum length of a template version label
pub const MAX_VERSION: usize = 50;

/// Question input types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum QuestionType {
    YesNo,
    Text,
    Number,
    Select,
    Textarea,
    Date,
    Signature,
}

impl QuestionType {
    pub const ALL: [QuestionType; 7] = [
        QuestionType::YesNo,
        QuestionType::Text,
        QuestionType::Number,
        QuestionType::Select,
        QuestionType::Textarea,
        QuestionType::Date,
        QuestionType::Signature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::YesNo => "yes_no",
            QuestionType::Text => "text",
            QuestionType::Number => "number",
            QuestionType::Select => "select",
            QuestionType::Textarea => "textarea",
            QuestionType::Date => "date",
            QuestionType::Signature => "signature",
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        QuestionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.to_lowercase())
            .ok_or_else(|| Error::invalid("type", format!("unknown question type: {}", s)))
    }
}

/// Lifecycle of a submitted checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    Verified,
}

impl SubmissionStatus {
    /// Only forward moves are allowed: draft → submitted → verified
    pub fn can_transition_to(self, next: SubmissionStatus) -> bool {
        matches!(
            (self, next),
            (SubmissionStatus::Draft, SubmissionStatus::Submitted)
                | (SubmissionStatus::Submitted, SubmissionStatus::Verified)
        )
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionStatus::Draft => write!(f, "draft"),
            SubmissionStatus::Submitted => write!(f, "submitted"),
            SubmissionStatus::Verified => write!(f, "verified"),
        }
    }
}

impl FromStr for SubmissionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(SubmissionStatus::Draft),
            "submitted" => Ok(SubmissionStatus::Submitted),
            "verified" => Ok(SubmissionStatus::Verified),
            _ => Err(Error::invalid(
                "status",
                format!("unknown submission status: {}", s),
            )),
        }
    }
}

/// A single client-supplied form value
///
/// Form documents are schemaless. Scalars and string lists get their own
/// arms; any other JSON (objects, mixed arrays) is carried as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<String>),
    Other(Value),
}

impl FormValue {
    /// Absent for submission purposes: null or the empty string
    pub fn is_blank(&self) -> bool {
        match self {
            FormValue::Null => true,
            FormValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Empty in the looser sense used for progress checks
    pub fn is_empty(&self) -> bool {
        match self {
            FormValue::List(items) => items.is_empty(),
            FormValue::Bool(b) => !b,
            FormValue::Text(s) => s.is_empty() || s == "0",
            FormValue::Number(n) => n.as_f64() == Some(0.0),
            FormValue::Null => true,
            FormValue::Other(Value::Array(items)) => items.is_empty(),
            FormValue::Other(Value::Object(map)) => map.is_empty(),
            FormValue::Other(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FormValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        FormValue::Text(value.to_string())
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        FormValue::Text(value)
    }
}

impl From<bool> for FormValue {
    fn from(value: bool) -> Self {
        FormValue::Bool(value)
    }
}

impl From<i64> for FormValue {
    fn from(value: i64) -> Self {
        FormValue::Number(value.into())
    }
}

impl From<Value> for FormValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FormValue::Null,
            Value::Bool(b) => FormValue::Bool(b),
            Value::Number(n) => FormValue::Number(n),
            Value::String(s) => FormValue::Text(s),
            Value::Array(items) if items.iter().all(Value::is_string) => FormValue::List(
                items
                    .into_iter()
                    .filter_map(|i| match i {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            other => FormValue::Other(other),
        }
    }
}

impl From<Vec<String>> for FormValue {
    fn from(value: Vec<String>) -> Self {
        FormValue::List(value)
    }
}

/// Form document keyed by question code
pub type FormData = BTreeMap<String, FormValue>;

/// A checklist template
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub version: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// An ordered section of a template
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub template_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "order")]
    pub sort_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A question within a section
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub section_id: String,
    pub question_code: String,
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub options: Option<Json<Vec<String>>>,
    pub required: bool,
    pub validation_rules: Option<String>,
    pub placeholder: Option<String>,
    #[serde(rename = "order")]
    pub sort_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Question {
    pub fn options(&self) -> &[String] {
        self.options.as_ref().map(|o| o.0.as_slice()).unwrap_or(&[])
    }
}

/// Section with its ordered questions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionWithQuestions {
    #[serde(flatten)]
    pub section: Section,
    pub questions: Vec<Question>,
}

impl SectionWithQuestions {
    pub fn questions_count(&self) -> usize {
        self.questions.len()
    }

    pub fn required_questions_count(&self) -> usize {
        self.questions.iter().filter(|q| q.required).count()
    }
}

/// Template with ordered sections and questions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateStructure {
    #[serde(flatten)]
    pub template: Template,
    pub sections: Vec<SectionWithQuestions>,
}

impl TemplateStructure {
    /// All questions in display order
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.sections.iter().flat_map(|s| s.questions.iter())
    }

    pub fn question_by_code(&self, code: &str) -> Option<&Question> {
        self.questions().find(|q| q.question_code == code)
    }

    pub fn total_questions_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions_count()).sum()
    }

    pub fn required_questions_count(&self) -> usize {
        self.sections
            .iter()
            .map(|s| s.required_questions_count())
            .sum()
    }
}

/// Per-installation scratch copy of a form in progress
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    pub installation_id: String,
    pub template_id: String,
    pub form_data: Json<FormData>,
    pub progress_percentage: i32,
    pub last_saved_section: Option<String>,
    pub last_saved_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Draft {
    pub fn form_data(&self) -> &FormData {
        &self.form_data.0
    }

    pub fn form_value(&self, code: &str) -> Option<&FormValue> {
        self.form_data.0.get(code)
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.last_saved_at)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    }

    /// Saved within `hours` of `now`
    pub fn is_recent_at(&self, now: DateTime<Utc>, hours: i64) -> bool {
        self.last_saved()
            .map(|saved| saved > now - chrono::Duration::hours(hours))
            .unwrap_or(false)
    }

    /// Not saved for more than `days` before `now`
    pub fn is_stale_at(&self, now: DateTime<Utc>, days: i64) -> bool {
        self.last_saved()
            .map(|saved| saved < now - chrono::Duration::days(days))
            .unwrap_or(false)
    }

    /// Whether any question of a section whose title contains `fragment`
    /// has a non-empty value in this draft
    pub fn section_started(&self, structure: &TemplateStructure, fragment: &str) -> bool {
        structure
            .sections
            .iter()
            .filter(|s| s.section.title.contains(fragment))
            .flat_map(|s| s.questions.iter())
            .any(|q| {
                self.form_value(&q.question_code)
                    .map(|v| !v.is_empty())
                    .unwrap_or(false)
            })
    }
}

/// A finalized checklist instance
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub installation_id: String,
    pub template_id: String,
    pub status: SubmissionStatus,
    pub progress_percentage: i32,
    pub checklist_date: String,
    pub installation_technician: String,
    pub installation_company: String,
    pub technician_signature: String,
    pub health_center_signature: String,
    pub health_center_name: String,
    pub completion_date: String,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

impl Submission {
    pub fn is_verified(&self) -> bool {
        self.status == SubmissionStatus::Verified
    }
}

/// One stored answer; always a string at rest
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Answer {
    pub id: String,
    pub submission_id: String,
    pub question_id: String,
    pub answer: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Answer joined with its question definition and typed value
#[derive(Debug, Clone, Serialize)]
pub struct AnswerWithQuestion {
    #[serde(flatten)]
    pub answer: Answer,
    pub value: crate::projection::AnswerValue,
    pub question: Question,
}

/// Submission with its template and eagerly loaded answers
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionDetail {
    #[serde(flatten)]
    pub submission: Submission,
    pub template: Template,
    pub answers: Vec<AnswerWithQuestion>,
}

impl SubmissionDetail {
    /// Raw stored answer for a question code
    pub fn answer_for_code(&self, code: &str) -> Option<&str> {
        self.answers
            .iter()
            .find(|a| a.question.question_code == code)
            .and_then(|a| a.answer.answer.as_deref())
    }

    /// Answers grouped by owning section id
    pub fn answers_by_section(&self) -> BTreeMap<&str, Vec<&AnswerWithQuestion>> {
        let mut grouped: BTreeMap<&str, Vec<&AnswerWithQuestion>> = BTreeMap::new();
        for answer in &self.answers {
            grouped
                .entry(answer.question.section_id.as_str())
                .or_default()
                .push(answer);
        }
        grouped
    }
}

/// The installation a checklist is filled for
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Installation {
    pub id: String,
    pub label: Option<String>,
    pub verified_by_health_officer: bool,
    pub created_at: String,
    pub updated_at: String,
}

// ===== Administrative input =====

/// New template fields
#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub is_active: bool,
}

impl NewTemplate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        check_text(&mut errors, "name", Some(&self.name), MAX_SHORT_TEXT);
        check_text(&mut errors, "version", Some(&self.version), MAX_VERSION);
        errors.into_result()
    }
}

/// Partial template update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub version: Option<String>,
    pub is_active: Option<bool>,
}

impl TemplatePatch {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        check_text(&mut errors, "name", self.name.as_deref(), MAX_SHORT_TEXT);
        check_text(&mut errors, "version", self.version.as_deref(), MAX_VERSION);
        errors.into_result()
    }
}

/// New section fields
#[derive(Debug, Clone, Deserialize)]
pub struct NewSection {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
}

impl NewSection {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        check_text(&mut errors, "title", Some(&self.title), MAX_SHORT_TEXT);
        match self.order {
            None => errors.add("order", "is required"),
            Some(order) => check_order(&mut errors, order),
        }
        errors.into_result()
    }
}

/// Partial section update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub order: Option<i64>,
}

impl SectionPatch {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        check_text(&mut errors, "title", self.title.as_deref(), MAX_SHORT_TEXT);
        if let Some(order) = self.order {
            check_order(&mut errors, order);
        }
        errors.into_result()
    }
}

fn default_required() -> bool {
    true
}

/// New question fields
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub question_code: String,
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub validation_rules: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
}

impl NewQuestion {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        check_text(
            &mut errors,
            "question_code",
            Some(&self.question_code),
            MAX_QUESTION_CODE,
        );
        if self.question_text.trim().is_empty() {
            errors.add("question_text", "is required");
        }
        check_optional_text(
            &mut errors,
            "validation_rules",
            self.validation_rules.as_deref(),
        );
        check_optional_text(&mut errors, "placeholder", self.placeholder.as_deref());
        check_rules(&mut errors, self.validation_rules.as_deref());
        check_options(&mut errors, self.question_type, self.options.as_deref());
        match self.order {
            None => errors.add("order", "is required"),
            Some(order) => check_order(&mut errors, order),
        }
        errors.into_result()
    }
}

/// Partial question update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionPatch {
    pub question_code: Option<String>,
    pub question_text: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<QuestionType>,
    pub options: Option<Vec<String>>,
    pub required: Option<bool>,
    pub validation_rules: Option<String>,
    pub placeholder: Option<String>,
    pub order: Option<i64>,
}

impl QuestionPatch {
    /// Validate against the question being patched, so type/options
    /// consistency is checked on the merged result
    pub fn validate(&self, current: &Question) -> Result<()> {
        let mut errors = ValidationErrors::new();
        check_text(
            &mut errors,
            "question_code",
            self.question_code.as_deref(),
            MAX_QUESTION_CODE,
        );
        if let Some(text) = &self.question_text {
            if text.trim().is_empty() {
                errors.add("question_text", "must not be empty");
            }
        }
        check_optional_text(
            &mut errors,
            "validation_rules",
            self.validation_rules.as_deref(),
        );
        check_optional_text(&mut errors, "placeholder", self.placeholder.as_deref());
        check_rules(&mut errors, self.validation_rules.as_deref());

        let question_type = self.question_type.unwrap_or(current.question_type);
        let options = self
            .options
            .as_deref()
            .or_else(|| current.options.as_ref().map(|o| o.0.as_slice()));
        check_options(&mut errors, question_type, options);

        if let Some(order) = self.order {
            check_order(&mut errors, order);
        }
        errors.into_result()
    }
}

/// One entry of a bulk reorder request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderEntry {
    pub id: String,
    pub order: i64,
}

/// Whole-template definition used for bulk import
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateDefinition {
    pub name: String,
    pub version: String,
    #[serde(default = "default_required")]
    pub is_active: bool,
    #[serde(default)]
    pub sections: Vec<SectionDefinition>,
}

/// Section block inside a [`TemplateDefinition`]
#[derive(Debug, Clone, Deserialize)]
pub struct SectionDefinition {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub questions: Vec<NewQuestion>,
}

impl TemplateDefinition {
    /// Parse a definition from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parse a definition from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Fill missing orders from position and validate every part
    pub fn normalize(&mut self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if let Err(Error::Validation(e)) = (NewTemplate {
            name: self.name.clone(),
            version: self.version.clone(),
            is_active: self.is_active,
        })
        .validate()
        {
            errors.extend(e);
        }

        let mut seen_codes = std::collections::HashSet::new();
        for (s_idx, section) in self.sections.iter_mut().enumerate() {
            section.order.get_or_insert(s_idx as i64 + 1);
            let new_section = NewSection {
                title: section.title.clone(),
                description: section.description.clone(),
                order: section.order,
            };
            if let Err(Error::Validation(e)) = new_section.validate() {
                for field in e.fields() {
                    for message in e.messages(field) {
                        errors.add(format!("sections.{}.{}", s_idx, field), message.clone());
                    }
                }
            }

            for (q_idx, question) in section.questions.iter_mut().enumerate() {
                question.order.get_or_insert(q_idx as i64 + 1);
                let prefix = format!("sections.{}.questions.{}", s_idx, q_idx);
                if let Err(Error::Validation(e)) = question.validate() {
                    for field in e.fields() {
                        for message in e.messages(field) {
                            errors.add(format!("{}.{}", prefix, field), message.clone());
                        }
                    }
                }
                if !seen_codes.insert(question.question_code.clone()) {
                    errors.add(
                        format!("{}.question_code", prefix),
                        format!("duplicate question code '{}'", question.question_code),
                    );
                }
            }
        }

        errors.into_result()
    }
}

fn check_text(errors: &mut ValidationErrors, field: &str, value: Option<&str>, max: usize) {
    if let Some(value) = value {
        if value.trim().is_empty() {
            errors.add(field, "is required");
        } else if value.chars().count() > max {
            errors.add(field, format!("may not be greater than {} characters", max));
        }
    }
}

fn check_optional_text(errors: &mut ValidationErrors, field: &str, value: Option<&str>) {
    if let Some(value) = value {
        if value.chars().count() > MAX_SHORT_TEXT {
            errors.add(
                field,
                format!("may not be greater than {} characters", MAX_SHORT_TEXT),
            );
        }
    }
}

fn check_order(errors: &mut ValidationErrors, order: i64) {
    if order < 0 {
        errors.add("order", "must be at least 0");
    }
}

fn check_rules(errors: &mut ValidationErrors, rules: Option<&str>) {
    if let Some(raw) = rules {
        if let Err(message) = crate::rules::parse_rules(raw) {
            errors.add("validation_rules", message);
        }
    }
}

fn check_options(errors: &mut ValidationErrors, question_type: QuestionType, options: Option<&[String]>) {
    if question_type == QuestionType::Select && options.map(|o| o.is_empty()).unwrap_or(true) {
        errors.add("options", "are required for select questions");
    }
    if let Some(options) = options {
        if options.iter().any(|o| o.trim().is_empty()) {
            errors.add("options", "must not contain empty entries");
        }
    }
}

// ===== Client requests =====

/// Body of a draft save
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveDraftRequest {
    #[serde(default)]
    pub form_data: Option<Value>,
    #[serde(default)]
    pub progress_percentage: Option<Value>,
    #[serde(default)]
    pub section: Option<Value>,
}

/// Validated draft save
#[derive(Debug, Clone, PartialEq)]
pub struct DraftInput {
    pub form_data: FormData,
    pub progress_percentage: i32,
    pub section: Option<String>,
}

impl SaveDraftRequest {
    pub fn validate(&self) -> Result<DraftInput> {
        let mut errors = ValidationErrors::new();
        let form_data = parse_form_data(&mut errors, "form_data", self.form_data.as_ref());
        let progress = parse_progress(&mut errors, self.progress_percentage.as_ref());

        let section = match &self.section {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                errors.add("section", "must be a string");
                None
            }
        };

        errors.into_result()?;
        match (form_data, progress) {
            (Some(form_data), Some(progress_percentage)) => Ok(DraftInput {
                form_data,
                progress_percentage,
                section,
            }),
            _ => Err(Error::Other("draft input incomplete after validation".into())),
        }
    }
}

/// Body of a checklist submission
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub form_data: Option<Value>,
    #[serde(default)]
    pub checklist_date: Option<Value>,
    #[serde(default)]
    pub installation_technician: Option<Value>,
    #[serde(default)]
    pub technician_signature: Option<Value>,
    #[serde(default)]
    pub health_center_signature: Option<Value>,
    #[serde(default)]
    pub health_center_name: Option<Value>,
    #[serde(default)]
    pub completion_date: Option<Value>,
}

/// Validated submission header fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHeader {
    pub checklist_date: NaiveDate,
    pub installation_technician: String,
    pub technician_signature: String,
    pub health_center_signature: String,
    pub health_center_name: String,
    pub completion_date: NaiveDate,
}

impl SubmitRequest {
    /// Check every header field and the form document, reporting all
    /// failures at once
    pub fn validate(&self) -> Result<(SubmissionHeader, FormData)> {
        let mut errors = ValidationErrors::new();
        let form_data = parse_form_data(&mut errors, "form_data", self.form_data.as_ref());
        let checklist_date =
            required_date(&mut errors, "checklist_date", self.checklist_date.as_ref());
        let installation_technician = required_string(
            &mut errors,
            "installation_technician",
            self.installation_technician.as_ref(),
        );
        let technician_signature = required_string(
            &mut errors,
            "technician_signature",
            self.technician_signature.as_ref(),
        );
        let health_center_signature = required_string(
            &mut errors,
            "health_center_signature",
            self.health_center_signature.as_ref(),
        );
        let health_center_name = required_string(
            &mut errors,
            "health_center_name",
            self.health_center_name.as_ref(),
        );
        let completion_date =
            required_date(&mut errors, "completion_date", self.completion_date.as_ref());

        errors.into_result()?;

        match (
            form_data,
            checklist_date,
            installation_technician,
            technician_signature,
            health_center_signature,
            health_center_name,
            completion_date,
        ) {
            (
                Some(form_data),
                Some(checklist_date),
                Some(installation_technician),
                Some(technician_signature),
                Some(health_center_signature),
                Some(health_center_name),
                Some(completion_date),
            ) => Ok((
                SubmissionHeader {
                    checklist_date,
                    installation_technician,
                    technician_signature,
                    health_center_signature,
                    health_center_name,
                    completion_date,
                },
                form_data,
            )),
            _ => Err(Error::Other(
                "submission input incomplete after validation".into(),
            )),
        }
    }
}

/// Parse a date given as `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or an RFC 3339
/// timestamp
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|d| d.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|d| d.date_naive()))
}

/// Parse a client `form_data` object on its own
pub fn form_data_from_json(value: Option<&Value>) -> Result<FormData> {
    let mut errors = ValidationErrors::new();
    let form = parse_form_data(&mut errors, "form_data", value);
    errors.into_result()?;
    form.ok_or_else(|| Error::invalid("form_data", "is required"))
}

fn parse_form_data(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&Value>,
) -> Option<FormData> {
    let object = match value {
        None | Some(Value::Null) => {
            errors.add(field, "is required");
            return None;
        }
        Some(Value::Object(map)) if map.is_empty() => {
            errors.add(field, "is required");
            return None;
        }
        Some(Value::Object(map)) => map,
        Some(_) => {
            errors.add(field, "must be an object keyed by question code");
            return None;
        }
    };

    let form = object
        .iter()
        .map(|(key, raw)| (key.clone(), FormValue::from(raw.clone())))
        .collect();
    Some(form)
}

fn parse_progress(errors: &mut ValidationErrors, value: Option<&Value>) -> Option<i32> {
    match value {
        None | Some(Value::Null) => {
            errors.add("progress_percentage", "is required");
            None
        }
        Some(Value::Number(n)) => match n.as_i64() {
            Some(p) if (0..=100).contains(&p) => Some(p as i32),
            Some(_) => {
                errors.add("progress_percentage", "must be between 0 and 100");
                None
            }
            None => {
                errors.add("progress_percentage", "must be an integer");
                None
            }
        },
        Some(_) => {
            errors.add("progress_percentage", "must be an integer");
            None
        }
    }
}

fn required_string(errors: &mut ValidationErrors, field: &str, value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => {
            errors.add(field, "is required");
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.add(field, "is required");
            None
        }
        Some(Value::String(s)) if s.chars().count() > MAX_SHORT_TEXT => {
            errors.add(
                field,
                format!("may not be greater than {} characters", MAX_SHORT_TEXT),
            );
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.add(field, "must be a string");
            None
        }
    }
}

fn required_date(errors: &mut ValidationErrors, field: &str, value: Option<&Value>) -> Option<NaiveDate> {
    match value {
        None | Some(Value::Null) => {
            errors.add(field, "is required");
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.add(field, "is required");
            None
        }
        Some(Value::String(s)) => {
            let parsed = parse_date(s);
            if parsed.is_none() {
                errors.add(field, "is not a valid date");
            }
            parsed
        }
        Some(_) => {
            errors.add(field, "is not a valid date");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_question_type_round_trip() {
        for t in QuestionType::ALL {
            assert_eq!(t.as_str().parse::<QuestionType>().unwrap(), t);
        }
        assert!("checkbox".parse::<QuestionType>().is_err());
        assert_eq!(
            serde_json::to_value(QuestionType::YesNo).unwrap(),
            json!("yes_no")
        );
    }

    #[test]
    fn test_status_transitions() {
        use SubmissionStatus::*;
        assert!(Draft.can_transition_to(Submitted));
        assert!(Submitted.can_transition_to(Verified));
        assert!(!Verified.can_transition_to(Submitted));
        assert!(!Verified.can_transition_to(Draft));
        assert!(!Submitted.can_transition_to(Draft));
        assert!(!Verified.can_transition_to(Verified));
    }

    #[test]
    fn test_form_value_shapes() {
        let form: FormData = serde_json::from_value(json!({
            "a": "text",
            "b": 3,
            "c": true,
            "d": ["x", "y"],
            "e": null,
            "f": ""
        }))
        .unwrap();

        assert_eq!(form["a"], FormValue::Text("text".into()));
        assert!(matches!(form["b"], FormValue::Number(_)));
        assert_eq!(form["c"], FormValue::Bool(true));
        assert_eq!(form["d"], FormValue::List(vec!["x".into(), "y".into()]));
        assert!(form["e"].is_blank());
        assert!(form["f"].is_blank());
        assert!(!form["d"].is_blank());
    }

    #[test]
    fn test_submit_request_reports_every_missing_field() {
        let request = SubmitRequest {
            form_data: Some(json!({"panel_ok": "yes"})),
            checklist_date: Some(json!("not a date")),
            installation_technician: Some(json!(42)),
            ..Default::default()
        };

        let err = request.validate().unwrap_err();
        let Error::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains("checklist_date"));
        assert_eq!(errors.messages("installation_technician"), ["must be a string"]);
        assert!(errors.contains("technician_signature"));
        assert!(errors.contains("health_center_signature"));
        assert!(errors.contains("health_center_name"));
        assert!(errors.contains("completion_date"));
        assert!(!errors.contains("form_data"));
    }

    #[test]
    fn test_submit_request_valid() {
        let request = SubmitRequest {
            form_data: Some(json!({"panel_ok": "yes", "qty": 2})),
            checklist_date: Some(json!("2025-10-14")),
            installation_technician: Some(json!("Ada")),
            technician_signature: Some(json!("ada-sig")),
            health_center_signature: Some(json!("hc-sig")),
            health_center_name: Some(json!("Kano PHC")),
            completion_date: Some(json!("2025-10-15T09:30:00Z")),
        };

        let (header, form) = request.validate().unwrap();
        assert_eq!(header.checklist_date.to_string(), "2025-10-14");
        assert_eq!(header.completion_date.to_string(), "2025-10-15");
        assert_eq!(form.len(), 2);
    }

    #[test]
    fn test_draft_request_bounds() {
        let request = SaveDraftRequest {
            form_data: Some(json!({"a": "b"})),
            progress_percentage: Some(json!(101)),
            section: None,
        };
        assert!(request.validate().is_err());

        let request = SaveDraftRequest {
            form_data: Some(json!(["not", "an", "object"])),
            progress_percentage: Some(json!(50)),
            section: Some(json!("CHECK 1")),
        };
        assert!(request.validate().is_err());

        let request = SaveDraftRequest {
            form_data: Some(json!({"a": "b"})),
            progress_percentage: Some(json!(50)),
            section: Some(json!("CHECK 1")),
        };
        let input = request.validate().unwrap();
        assert_eq!(input.progress_percentage, 50);
        assert_eq!(input.section.as_deref(), Some("CHECK 1"));
    }

    #[test]
    fn test_structured_form_values_are_carried() {
        let request = SaveDraftRequest {
            form_data: Some(json!({
                "panel_ok": "yes",
                "gps": {"lat": 1.0, "lng": 2.0},
                "counts": [1, 2],
                "mixed": ["a", 1]
            })),
            progress_percentage: Some(json!(10)),
            section: None,
        };
        let input = request.validate().unwrap();
        assert_eq!(input.form_data["panel_ok"], FormValue::Text("yes".into()));
        assert_eq!(
            input.form_data["gps"],
            FormValue::Other(json!({"lat": 1.0, "lng": 2.0}))
        );
        assert_eq!(input.form_data["counts"], FormValue::Other(json!([1, 2])));
        assert_eq!(input.form_data["mixed"], FormValue::Other(json!(["a", 1])));
        assert!(FormValue::Other(json!({})).is_empty());
        assert!(!input.form_data["gps"].is_empty());
    }

    #[test]
    fn test_submit_request_accepts_date_time_strings() {
        let request = SubmitRequest {
            form_data: Some(json!({"panel_ok": "yes"})),
            checklist_date: Some(json!("2025-10-14 09:30:00")),
            installation_technician: Some(json!("Ada")),
            technician_signature: Some(json!("ada-sig")),
            health_center_signature: Some(json!("hc-sig")),
            health_center_name: Some(json!("Kano PHC")),
            completion_date: Some(json!("2025-10-15 17:05:59")),
        };

        let (header, _) = request.validate().unwrap();
        assert_eq!(header.checklist_date.to_string(), "2025-10-14");
        assert_eq!(header.completion_date.to_string(), "2025-10-15");

        assert!(parse_date("2025-10-14 25:00:00").is_none());
        assert!(parse_date("14/10/2025").is_none());
    }

    #[test]
    fn test_new_question_requires_options_for_select() {
        let question = NewQuestion {
            question_code: "recommendation".into(),
            question_text: "Recommendation".into(),
            question_type: QuestionType::Select,
            options: None,
            required: true,
            validation_rules: Some("required".into()),
            placeholder: None,
            order: Some(1),
        };
        let Error::Validation(errors) = question.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(errors.contains("options"));
    }

    #[test]
    fn test_new_question_rejects_unknown_rule() {
        let question = NewQuestion {
            question_code: "qty".into(),
            question_text: "Quantity".into(),
            question_type: QuestionType::Number,
            options: None,
            required: true,
            validation_rules: Some("required|between:1,5".into()),
            placeholder: None,
            order: Some(1),
        };
        let Error::Validation(errors) = question.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(errors.contains("validation_rules"));
    }

    #[test]
    fn test_definition_normalize_fills_order_and_detects_duplicates() {
        let mut definition = TemplateDefinition::from_toml(
            r#"
name = "Demo"
version = "1.0"

[[sections]]
title = "First"

[[sections.questions]]
question_code = "a"
question_text = "A?"
type = "yes_no"

[[sections.questions]]
question_code = "a"
question_text = "A again?"
type = "text"
"#,
        )
        .unwrap();

        let Error::Validation(errors) = definition.normalize().unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(errors.contains("sections.0.questions.1.question_code"));
        assert_eq!(definition.sections[0].order, Some(1));
        assert_eq!(definition.sections[0].questions[1].order, Some(2));
    }
}
