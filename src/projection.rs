//! Typed views over stored answers
//!
//! Answers are always strings at rest. Reading one back goes through the
//! owning question's type; writing goes the other way through [`encode`].

use crate::model::{Answer, FormValue, Question, QuestionType};
use serde::Serialize;

/// Typed answer value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Number(Option<f64>),
    Text(Option<String>),
}

impl AnswerValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnswerValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(n) => *n,
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(s) => s.as_deref(),
            _ => None,
        }
    }
}

/// Project a stored string through a question type
///
/// `yes_no` is true only for the exact string `"yes"`; `number` is null
/// unless the string parses as a finite number. Everything else is returned
/// verbatim, including JSON-encoded lists.
pub fn project(question_type: QuestionType, raw: Option<&str>) -> AnswerValue {
    match question_type {
        QuestionType::YesNo => AnswerValue::Bool(raw == Some("yes")),
        QuestionType::Number => AnswerValue::Number(raw.and_then(parse_numeric)),
        QuestionType::Select
        | QuestionType::Date
        | QuestionType::Text
        | QuestionType::Textarea
        | QuestionType::Signature => AnswerValue::Text(raw.map(String::from)),
    }
}

pub fn project_answer(answer: &Answer, question: &Question) -> AnswerValue {
    project(question.question_type, answer.answer.as_deref())
}

/// Encode a form value for storage, or `None` when it should not be stored
pub fn encode(question_type: QuestionType, value: &FormValue) -> Option<String> {
    match value {
        FormValue::Null => None,
        FormValue::Text(s) if s.is_empty() => None,
        FormValue::Text(s) => Some(s.clone()),
        FormValue::Bool(b) if question_type == QuestionType::YesNo => {
            Some(if *b { "yes" } else { "no" }.to_string())
        }
        FormValue::Bool(b) => Some(b.to_string()),
        FormValue::Number(n) => Some(n.to_string()),
        FormValue::List(items) => Some(serde_json::to_string(items).unwrap_or_default()),
        FormValue::Other(raw) => Some(raw.to_string()),
    }
}

/// Decode a JSON-encoded list answer written from a list value
pub fn decode_list(raw: &str) -> Option<Vec<String>> {
    serde_json::from_str(raw).ok()
}

fn parse_numeric(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}
