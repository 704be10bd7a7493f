//! Custom error types for fieldcheck

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Field-level validation failures, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Merge another set of failures into this one
    pub fn extend(&mut self, other: ValidationErrors) {
        for (field, messages) in other.fields {
            self.fields.entry(field).or_default().extend(messages);
        }
    }

    /// `Ok(())` when nothing was recorded, otherwise `Err(Error::Validation)`
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Coarse classification used at the API boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    TooLarge,
    Transaction,
    Unexpected,
}

/// Main error type for fieldcheck operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("No active checklist found")]
    NoActiveTemplate,

    #[error("Checklist not found: {0}")]
    TemplateNotFound(String),

    #[error("Checklist section not found: {0}")]
    SectionNotFound(String),

    #[error("Checklist question not found: {0}")]
    QuestionNotFound(String),

    #[error("Installation not found: {0}")]
    InstallationNotFound(String),

    #[error("Draft not found: {0}")]
    DraftNotFound(String),

    #[error("Submission not found: {0}")]
    SubmissionNotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Cannot move submission from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("Failed to submit checklist: {0}")]
    Transaction(String),

    #[error("Not initialized: run 'fieldcheck init' first")]
    NotInitialized,

    #[error("Already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a single-field validation failure
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        Error::Validation(errors)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NoActiveTemplate
            | Error::TemplateNotFound(_)
            | Error::SectionNotFound(_)
            | Error::QuestionNotFound(_)
            | Error::InstallationNotFound(_)
            | Error::DraftNotFound(_)
            | Error::SubmissionNotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) | Error::InvalidTransition { .. } => ErrorKind::Conflict,
            Error::PayloadTooLarge(_) => ErrorKind::TooLarge,
            Error::Transaction(_) => ErrorKind::Transaction,
            _ => ErrorKind::Unexpected,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Result type alias for fieldcheck
pub type Result<T> = std::result::Result<T, Error>;
