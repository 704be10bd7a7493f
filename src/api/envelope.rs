//! Uniform JSON envelope and error mapping

use crate::error::{Error, ErrorKind, ValidationErrors};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

/// Body shape shared by every endpoint
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
}

pub type ApiResult = Result<Response, ApiError>;

/// 200 with a data payload
pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    respond(StatusCode::OK, message, Some(data))
}

/// 201 with the created resource
pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    respond(StatusCode::CREATED, message, Some(data))
}

/// 200 with only a message
pub fn message(message: impl Into<String>) -> Response {
    respond::<()>(StatusCode::OK, message, None)
}

fn respond<T: Serialize>(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Response {
    let body = Envelope {
        success: status.is_success(),
        message: message.into(),
        data,
        errors: None,
    };
    (status, Json(body)).into_response()
}

/// Crate error rendered as an envelope
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::Validation | ErrorKind::Conflict => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::Transaction | ErrorKind::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                let (field, message) = data_error_field(&err.body_text());
                Self(Error::invalid(field, message))
            }
            other if other.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Self(Error::PayloadTooLarge(other.body_text()))
            }
            other => Self(Error::invalid("body", other.body_text())),
        }
    }
}

/// Pull the field path out of a body deserialization failure
///
/// Nested failures read `path: message`; a missing top-level field only
/// names the field inside backticks.
fn data_error_field(text: &str) -> (String, String) {
    let detail = text
        .split_once("target type: ")
        .map(|(_, d)| d)
        .unwrap_or(text);
    let detail = detail.split(" at line ").next().unwrap_or(detail);

    if let Some((path, message)) = detail.split_once(": ") {
        if !path.is_empty() && !path.contains(' ') {
            return (path.to_string(), message.to_string());
        }
    }
    if let Some(field) = detail
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next())
    {
        return (field.to_string(), "is required".to_string());
    }
    ("body".to_string(), detail.to_string())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (message, errors) = match self.0 {
            Error::Validation(errors) => ("The given data was invalid.".to_string(), Some(errors)),
            err => match err.kind() {
                ErrorKind::Unexpected => {
                    error!("Unhandled error: {}", err);
                    ("Internal server error".to_string(), None)
                }
                ErrorKind::Transaction => {
                    error!("{}", err);
                    (err.to_string(), None)
                }
                _ => (err.to_string(), None),
            },
        };

        let body: Envelope<()> = Envelope {
            success: false,
            message,
            data: None,
            errors,
        };
        (status, Json(body)).into_response()
    }
}
