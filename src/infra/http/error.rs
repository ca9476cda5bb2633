use std::error::Error as StdError;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::{AppError, ErrorReport};
use crate::application::repos::SourceError;
use crate::domain::error::DomainError;

const SOURCE: &str = "infra::http::api";

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const UPSTREAM_REJECTED: &str = "upstream_rejected";
    pub const UPSTREAM_UNAVAILABLE: &str = "upstream_unavailable";
    pub const UPSTREAM_MALFORMED: &str = "upstream_malformed";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            report: None,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Bearer token required",
            None,
        )
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    fn with_report(mut self, error: &dyn StdError) -> Self {
        self.report = Some(ErrorReport::from_error(SOURCE, self.status, error));
        self
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let api = match &err {
            AppError::InvalidQuery(detail) => {
                Self::bad_request("Invalid query", Some(detail.clone()))
            }
            AppError::NotFound(_) => Self::not_found("Resource not found"),
            AppError::Domain(DomainError::Validation { message }) => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                codes::INVALID_INPUT,
                "Invalid input",
                Some(message.clone()),
            ),
            AppError::Domain(DomainError::NotFound { .. }) => {
                Self::not_found("Resource not found")
            }
            AppError::Domain(_) => internal(),
            AppError::Source(source) => from_source(source),
            AppError::Infra(_) | AppError::Unexpected(_) => internal(),
        };
        api.with_report(&err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request("Invalid query string", Some(rejection.body_text()))
            .with_report(&rejection)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("Invalid request body", Some(rejection.body_text()))
            .with_report(&rejection)
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request("Invalid path parameter", Some(rejection.body_text()))
            .with_report(&rejection)
    }
}

fn from_source(err: &SourceError) -> ApiError {
    match err {
        SourceError::NotFound { .. } => ApiError::not_found("Resource not found"),
        SourceError::Invalid { message } => ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message.clone()),
        ),
        SourceError::Rejected { status, .. } => ApiError::new(
            StatusCode::BAD_GATEWAY,
            codes::UPSTREAM_REJECTED,
            "Content backend rejected the request",
            Some(format!("backend status {status}")),
        ),
        SourceError::Transport { .. } => ApiError::new(
            StatusCode::BAD_GATEWAY,
            codes::UPSTREAM_UNAVAILABLE,
            "Content backend unreachable",
            None,
        ),
        SourceError::Decode { .. } => ApiError::new(
            StatusCode::BAD_GATEWAY,
            codes::UPSTREAM_MALFORMED,
            "Content backend returned an unexpected response",
            None,
        ),
        SourceError::Unexpected { .. } => internal(),
    }
}

fn internal() -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        codes::INTERNAL,
        "Internal error",
        None,
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.unwrap_or_else(|| {
            ErrorReport::from_message(
                SOURCE,
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            )
        });
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        // The logging middleware reads the report back out of the extensions.
        report.attach(&mut response);
        response
    }
}
