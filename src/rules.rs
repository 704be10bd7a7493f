//! Per-question validation rules
//!
//! Questions carry an optional pipe-delimited rule string such as
//! `required|integer|min:1`. It is parsed once into [`Rule`] values and
//! evaluated by matching on the variant.

use crate::error::ValidationErrors;
use crate::model::{parse_date, FormData, FormValue, Question, QuestionType, TemplateStructure};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// A single validation rule token
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    Nullable,
    String,
    Integer,
    Numeric,
    Boolean,
    Date,
    Array,
    Min(f64),
    Max(f64),
    In(Vec<String>),
}

impl Rule {
    fn is_numeric_kind(&self) -> bool {
        matches!(self, Rule::Integer | Rule::Numeric)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => write!(f, "required"),
            Rule::Nullable => write!(f, "nullable"),
            Rule::String => write!(f, "string"),
            Rule::Integer => write!(f, "integer"),
            Rule::Numeric => write!(f, "numeric"),
            Rule::Boolean => write!(f, "boolean"),
            Rule::Date => write!(f, "date"),
            Rule::Array => write!(f, "array"),
            Rule::Min(n) => write!(f, "min:{}", format_bound(*n)),
            Rule::Max(n) => write!(f, "max:{}", format_bound(*n)),
            Rule::In(values) => write!(f, "in:{}", values.join(",")),
        }
    }
}

impl FromStr for Rule {
    type Err = String;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        let (name, arg) = match token.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg.trim())),
            None => (token, None),
        };

        let bound = |arg: Option<&str>| -> Result<f64, String> {
            arg.and_then(|a| a.parse::<f64>().ok())
                .filter(|n| n.is_finite())
                .ok_or_else(|| format!("rule '{}' needs a numeric argument", name))
        };

        match (name.to_lowercase().as_str(), arg) {
            ("required", None) => Ok(Rule::Required),
            ("nullable", None) => Ok(Rule::Nullable),
            ("string", None) => Ok(Rule::String),
            ("integer", None) => Ok(Rule::Integer),
            ("numeric", None) => Ok(Rule::Numeric),
            ("boolean", None) => Ok(Rule::Boolean),
            ("date", None) => Ok(Rule::Date),
            ("array", None) => Ok(Rule::Array),
            ("min", arg) => bound(arg).map(Rule::Min),
            ("max", arg) => bound(arg).map(Rule::Max),
            ("in", Some(arg)) if !arg.is_empty() => Ok(Rule::In(
                arg.split(',').map(|v| v.trim().to_string()).collect(),
            )),
            _ => Err(format!("unsupported rule '{}'", token)),
        }
    }
}

/// Parse a pipe-delimited rule string, failing on the first bad token
pub fn parse_rules(raw: &str) -> Result<Vec<Rule>, String> {
    raw.split('|')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(Rule::from_str)
        .collect()
}

/// Rules in force for a question: its declared rules, or `required` /
/// `nullable` from the required flag when none are declared
pub fn effective_rules(question: &Question) -> Vec<Rule> {
    let declared = match question.validation_rules.as_deref() {
        Some(raw) => parse_rules(raw).unwrap_or_else(|e| {
            warn!(question_code = %question.question_code, "Ignoring invalid rules: {}", e);
            Vec::new()
        }),
        None => Vec::new(),
    };

    if !declared.is_empty() {
        return declared;
    }

    if question.required {
        vec![Rule::Required]
    } else {
        vec![Rule::Nullable]
    }
}

/// Rule summary for a question, as exposed to form builders
#[derive(Debug, Clone, Serialize)]
pub struct QuestionRules {
    pub question_id: String,
    pub question_code: String,
    pub validation_rules_array: Vec<String>,
    pub question_type: QuestionType,
    pub is_required: bool,
}

pub fn question_rules(question: &Question) -> QuestionRules {
    QuestionRules {
        question_id: question.id.clone(),
        question_code: question.question_code.clone(),
        validation_rules_array: effective_rules(question)
            .iter()
            .map(ToString::to_string)
            .collect(),
        question_type: question.question_type,
        is_required: question.required,
    }
}

/// Evaluate a question's rules and type constraints against one value,
/// returning every failure message
pub fn check_value(question: &Question, value: Option<&FormValue>) -> Vec<String> {
    let rules = effective_rules(question);
    let blank = value.map(is_blank_for_rules).unwrap_or(true);

    if blank {
        return if rules.contains(&Rule::Required) {
            vec!["is required".to_string()]
        } else {
            Vec::new()
        };
    }

    let Some(value) = value else {
        return Vec::new();
    };

    let numeric = question.question_type == QuestionType::Number
        || rules.iter().any(Rule::is_numeric_kind)
        || matches!(value, FormValue::Number(_));

    let mut messages: Vec<String> = rules
        .iter()
        .filter_map(|rule| evaluate(rule, value, numeric))
        .collect();

    if let Some(message) = check_type(question, value) {
        messages.push(message);
    }
    messages
}

/// Validate a whole form against a template, keyed by question code
pub fn validate_form(structure: &TemplateStructure, form: &FormData) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for question in structure.questions() {
        for message in check_value(question, form.get(&question.question_code)) {
            errors.add(question.question_code.clone(), message);
        }
    }
    errors
}

fn is_blank_for_rules(value: &FormValue) -> bool {
    match value {
        FormValue::List(items) => items.is_empty(),
        FormValue::Other(_) => value.is_empty(),
        other => other.is_blank(),
    }
}

fn evaluate(rule: &Rule, value: &FormValue, numeric: bool) -> Option<String> {
    match rule {
        Rule::Required | Rule::Nullable => None,
        Rule::String => {
            (!matches!(value, FormValue::Text(_))).then(|| "must be a string".to_string())
        }
        Rule::Integer => (!is_integer(value)).then(|| "must be an integer".to_string()),
        Rule::Numeric => (number_of(value).is_none()).then(|| "must be a number".to_string()),
        Rule::Boolean => (!is_boolean(value)).then(|| "must be true or false".to_string()),
        Rule::Date => {
            let ok = value.as_str().map(|s| parse_date(s).is_some()).unwrap_or(false);
            (!ok).then(|| "is not a valid date".to_string())
        }
        Rule::Array => {
            (!matches!(value, FormValue::List(_))).then(|| "must be a list".to_string())
        }
        Rule::Min(bound) => {
            let size = size_of(value, numeric)?;
            (size < *bound).then(|| min_message(*bound, value, numeric))
        }
        Rule::Max(bound) => {
            let size = size_of(value, numeric)?;
            (size > *bound).then(|| max_message(*bound, value, numeric))
        }
        Rule::In(allowed) => {
            let ok = match value {
                FormValue::List(items) => items.iter().all(|i| allowed.contains(i)),
                other => scalar_text(other)
                    .map(|s| allowed.contains(&s))
                    .unwrap_or(false),
            };
            (!ok).then(|| format!("must be one of: {}", allowed.join(", ")))
        }
    }
}

fn check_type(question: &Question, value: &FormValue) -> Option<String> {
    match question.question_type {
        QuestionType::YesNo => match value {
            FormValue::Bool(_) => None,
            FormValue::Text(s) if s == "yes" || s == "no" => None,
            _ => Some("must be yes or no".to_string()),
        },
        QuestionType::Number => number_of(value)
            .is_none()
            .then(|| "must be a number".to_string()),
        QuestionType::Select => {
            let options = question.options();
            if options.is_empty() {
                return None;
            }
            let ok = match value {
                FormValue::Text(s) => options.contains(s),
                FormValue::List(items) => items.iter().all(|i| options.contains(i)),
                _ => false,
            };
            (!ok).then(|| format!("must be one of: {}", options.join(", ")))
        }
        QuestionType::Date => {
            let ok = value.as_str().map(|s| parse_date(s).is_some()).unwrap_or(false);
            (!ok).then(|| "is not a valid date".to_string())
        }
        QuestionType::Text | QuestionType::Textarea | QuestionType::Signature => None,
    }
}

fn number_of(value: &FormValue) -> Option<f64> {
    match value {
        FormValue::Number(n) => n.as_f64(),
        FormValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn is_integer(value: &FormValue) -> bool {
    match value {
        FormValue::Number(n) => n.is_i64() || n.is_u64(),
        FormValue::Text(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    }
}

fn is_boolean(value: &FormValue) -> bool {
    match value {
        FormValue::Bool(_) => true,
        FormValue::Number(n) => matches!(n.as_i64(), Some(0) | Some(1)),
        FormValue::Text(s) => matches!(s.as_str(), "0" | "1" | "true" | "false"),
        _ => false,
    }
}

fn scalar_text(value: &FormValue) -> Option<String> {
    match value {
        FormValue::Text(s) => Some(s.clone()),
        FormValue::Number(n) => Some(n.to_string()),
        FormValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Magnitude compared by `min`/`max`: the number itself, list length, or
/// character count
fn size_of(value: &FormValue, numeric: bool) -> Option<f64> {
    match value {
        FormValue::List(items) => Some(items.len() as f64),
        FormValue::Text(s) if !numeric => Some(s.chars().count() as f64),
        FormValue::Bool(_) | FormValue::Null => None,
        other => number_of(other),
    }
}

fn min_message(bound: f64, value: &FormValue, numeric: bool) -> String {
    match value {
        FormValue::List(_) => format!("must have at least {} items", format_bound(bound)),
        _ if numeric => format!("must be at least {}", format_bound(bound)),
        _ => format!("must be at least {} characters", format_bound(bound)),
    }
}

fn max_message(bound: f64, value: &FormValue, numeric: bool) -> String {
    match value {
        FormValue::List(_) => format!("may not have more than {} items", format_bound(bound)),
        _ if numeric => format!("may not be greater than {}", format_bound(bound)),
        _ => format!("may not be greater than {} characters", format_bound(bound)),
    }
}

fn format_bound(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn question(question_type: QuestionType, required: bool, rules: Option<&str>) -> Question {
        Question {
            id: "q1".to_string(),
            section_id: "s1".to_string(),
            question_code: "code".to_string(),
            question_text: "Question?".to_string(),
            question_type,
            options: None,
            required,
            validation_rules: rules.map(String::from),
            placeholder: None,
            sort_order: 1,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_parse_rules() {
        let rules = parse_rules("required|integer|min:1|max:10.5|in:a, b").unwrap();
        assert_eq!(
            rules,
            vec![
                Rule::Required,
                Rule::Integer,
                Rule::Min(1.0),
                Rule::Max(10.5),
                Rule::In(vec!["a".into(), "b".into()]),
            ]
        );

        assert!(parse_rules("required|regex:/x/").is_err());
        assert!(parse_rules("min:abc").is_err());
        assert!(parse_rules("").unwrap().is_empty());
    }

    #[test]
    fn test_rule_display_round_trips() {
        for token in ["required", "nullable", "min:1", "max:2.5", "in:x,y"] {
            let rule: Rule = token.parse().unwrap();
            assert_eq!(rule.to_string(), token);
        }
    }

    #[test]
    fn test_default_rules_follow_required_flag() {
        let q = question(QuestionType::Text, true, None);
        assert_eq!(effective_rules(&q), vec![Rule::Required]);

        let q = question(QuestionType::Text, false, None);
        assert_eq!(effective_rules(&q), vec![Rule::Nullable]);

        let q = question(QuestionType::Text, false, Some("  "));
        assert_eq!(effective_rules(&q), vec![Rule::Nullable]);
    }

    #[test]
    fn test_required_and_nullable() {
        let required = question(QuestionType::Text, true, Some("required"));
        assert_eq!(check_value(&required, None), vec!["is required"]);
        assert_eq!(
            check_value(&required, Some(&FormValue::Text(String::new()))),
            vec!["is required"]
        );
        assert!(check_value(&required, Some(&"ok".into())).is_empty());

        let optional = question(QuestionType::Number, false, Some("nullable|integer"));
        assert!(check_value(&optional, None).is_empty());
        assert!(check_value(&optional, Some(&FormValue::Null)).is_empty());
    }

    #[test]
    fn test_integer_min() {
        let q = question(QuestionType::Number, true, Some("required|integer|min:1"));
        assert!(check_value(&q, Some(&FormValue::from(2))).is_empty());
        assert!(check_value(&q, Some(&"3".into())).is_empty());
        assert_eq!(
            check_value(&q, Some(&FormValue::from(0))),
            vec!["must be at least 1"]
        );

        let messages = check_value(&q, Some(&"1.5".into()));
        assert_eq!(messages, vec!["must be an integer"]);

        let messages = check_value(&q, Some(&"lots".into()));
        assert!(messages.contains(&"must be an integer".to_string()));
        assert!(messages.contains(&"must be a number".to_string()));
    }

    #[test]
    fn test_string_length_bounds() {
        let q = question(QuestionType::Text, true, Some("required|string|max:5"));
        assert!(check_value(&q, Some(&"short".into())).is_empty());
        assert_eq!(
            check_value(&q, Some(&"too long".into())),
            vec!["may not be greater than 5 characters"]
        );
    }

    #[test]
    fn test_yes_no_type_check() {
        let q = question(QuestionType::YesNo, true, None);
        assert!(check_value(&q, Some(&"yes".into())).is_empty());
        assert!(check_value(&q, Some(&FormValue::Bool(false))).is_empty());
        assert_eq!(
            check_value(&q, Some(&"maybe".into())),
            vec!["must be yes or no"]
        );
    }

    #[test]
    fn test_date_accepts_plain_and_timestamped_values() {
        let q = question(QuestionType::Date, true, Some("required|date"));
        for value in ["2025-10-14", "2025-10-14 09:30:00", "2025-10-14T09:30:00Z"] {
            assert!(check_value(&q, Some(&value.into())).is_empty(), "{value}");
        }

        let messages = check_value(&q, Some(&"14/10/2025".into()));
        assert_eq!(messages, vec!["is not a valid date", "is not a valid date"]);
    }

    #[test]
    fn test_structured_value_counts_as_present() {
        let q = question(QuestionType::Text, true, Some("required"));
        let gps = FormValue::from(serde_json::json!({"lat": 1.0}));
        assert!(check_value(&q, Some(&gps)).is_empty());

        let empty = FormValue::from(serde_json::json!({}));
        assert_eq!(check_value(&q, Some(&empty)), vec!["is required"]);
    }

    #[test]
    fn test_select_options() {
        let mut q = question(QuestionType::Select, true, None);
        q.options = Some(Json(vec!["PASS".into(), "FAIL".into()]));

        assert!(check_value(&q, Some(&"PASS".into())).is_empty());
        assert_eq!(
            check_value(&q, Some(&"pass".into())),
            vec!["must be one of: PASS, FAIL"]
        );
    }

    #[test]
    fn test_validate_form_keys_by_code() {
        use crate::model::{Section, SectionWithQuestions, Template};

        let mut a = question(QuestionType::YesNo, true, None);
        a.question_code = "a".into();
        let mut b = question(QuestionType::Number, false, Some("nullable|integer|min:0"));
        b.question_code = "b".into();

        let structure = TemplateStructure {
            template: Template {
                id: "t".into(),
                name: "T".into(),
                version: "1".into(),
                is_active: true,
                created_at: String::new(),
                updated_at: String::new(),
            },
            sections: vec![SectionWithQuestions {
                section: Section {
                    id: "s1".into(),
                    template_id: "t".into(),
                    title: "S".into(),
                    description: None,
                    sort_order: 1,
                    created_at: String::new(),
                    updated_at: String::new(),
                },
                questions: vec![a, b],
            }],
        };

        let mut form = FormData::new();
        form.insert("b".into(), FormValue::from(-1));
        let errors = validate_form(&structure, &form);
        assert_eq!(errors.messages("a"), ["is required"]);
        assert_eq!(errors.messages("b"), ["must be at least 0"]);

        form.insert("a".into(), "yes".into());
        form.insert("b".into(), FormValue::from(4));
        assert!(validate_form(&structure, &form).is_empty());
    }

    #[test]
    fn test_question_rules_summary() {
        let q = question(QuestionType::Text, false, None);
        let summary = question_rules(&q);
        assert_eq!(summary.validation_rules_array, vec!["nullable"]);
        assert!(!summary.is_required);
    }
}
