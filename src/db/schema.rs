//! SQLite schema definition

/// SQL schema for the checklist database
pub const SCHEMA_SQL: &str = r#"
-- Installations: the collaborator a checklist is filled for
CREATE TABLE IF NOT EXISTS installations (
    id TEXT PRIMARY KEY,
    label TEXT,
    verified_by_health_officer INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Templates: versioned checklist definitions
CREATE TABLE IF NOT EXISTS checklist_templates (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Sections: ordered groups of questions
CREATE TABLE IF NOT EXISTS checklist_sections (
    id TEXT PRIMARY KEY,
    template_id TEXT NOT NULL REFERENCES checklist_templates(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Questions: keyed externally by question_code
CREATE TABLE IF NOT EXISTS checklist_questions (
    id TEXT PRIMARY KEY,
    section_id TEXT NOT NULL REFERENCES checklist_sections(id) ON DELETE CASCADE,
    question_code TEXT NOT NULL UNIQUE,
    question_text TEXT NOT NULL,
    question_type TEXT NOT NULL DEFAULT 'yes_no',
    options TEXT,
    required INTEGER NOT NULL DEFAULT 1,
    validation_rules TEXT,
    placeholder TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Drafts: one scratch form per (installation, template)
CREATE TABLE IF NOT EXISTS checklist_drafts (
    id TEXT PRIMARY KEY,
    installation_id TEXT NOT NULL REFERENCES installations(id) ON DELETE CASCADE,
    template_id TEXT NOT NULL REFERENCES checklist_templates(id) ON DELETE CASCADE,
    form_data TEXT NOT NULL,
    progress_percentage INTEGER NOT NULL DEFAULT 0,
    last_saved_section TEXT,
    last_saved_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(installation_id, template_id)
);

-- Submissions: finalized checklist instances (soft-deletable)
CREATE TABLE IF NOT EXISTS checklist_submissions (
    id TEXT PRIMARY KEY,
    installation_id TEXT NOT NULL REFERENCES installations(id),
    template_id TEXT NOT NULL REFERENCES checklist_templates(id),
    status TEXT NOT NULL DEFAULT 'draft',
    progress_percentage INTEGER NOT NULL DEFAULT 0,
    checklist_date TEXT NOT NULL,
    installation_technician TEXT NOT NULL,
    installation_company TEXT NOT NULL,
    technician_signature TEXT NOT NULL,
    health_center_signature TEXT NOT NULL,
    health_center_name TEXT NOT NULL,
    completion_date TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

-- Answers: one string per (submission, question)
CREATE TABLE IF NOT EXISTS checklist_answers (
    id TEXT PRIMARY KEY,
    submission_id TEXT NOT NULL REFERENCES checklist_submissions(id) ON DELETE CASCADE,
    question_id TEXT NOT NULL REFERENCES checklist_questions(id),
    answer TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(submission_id, question_id)
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_sections_template ON checklist_sections(template_id, sort_order);
CREATE INDEX IF NOT EXISTS idx_questions_section ON checklist_questions(section_id, sort_order);
CREATE INDEX IF NOT EXISTS idx_drafts_last_saved ON checklist_drafts(last_saved_at);
CREATE INDEX IF NOT EXISTS idx_submissions_installation ON checklist_submissions(installation_id, status);
CREATE INDEX IF NOT EXISTS idx_answers_question ON checklist_answers(question_id);
"#;
