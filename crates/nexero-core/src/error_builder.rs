use crate::problemdetails;
use axum::http::StatusCode;
use serde::Serialize;
use std::collections::HashMap;

/// Fluent builder for `application/problem+json` responses.
///
/// Empty members are left out of the rendered document; every problem
/// carries the server time it was produced at.
pub struct ErrorBuilder {
    status: StatusCode,
    type_: String,
    title: String,
    detail: String,
    instance: String,
    values: HashMap<String, serde_json::Value>,
}

impl ErrorBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            type_: String::new(),
            title: String::new(),
            detail: String::new(),
            instance: String::new(),
            values: HashMap::new(),
        }
    }

    pub fn type_(mut self, type_: impl Into<String>) -> Self {
        self.type_ = type_.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    pub fn value<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.values.insert(key.to_string(), value);
        }
        self
    }

    pub fn build(self) -> problemdetails::Problem {
        let mut problem = problemdetails::new(self.status)
            .with_value("timestamp", chrono::Utc::now().to_rfc3339());

        if !self.type_.is_empty() {
            problem = problem.with_type(self.type_);
        }
        if !self.title.is_empty() {
            problem = problem.with_title(self.title);
        }
        if !self.detail.is_empty() {
            problem = problem.with_detail(self.detail);
        }
        if !self.instance.is_empty() {
            problem = problem.with_instance(self.instance);
        }

        for (key, value) in self.values {
            problem = problem.with_value(&key, value);
        }

        problem
    }
}

// Common error builders
pub fn internal_server_error() -> ErrorBuilder {
    ErrorBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
        .type_("/probs/internal-server-error")
        .title("Internal Server Error")
        .detail("An unexpected error occurred. Please try again later.")
        .value("error_code", "INTERNAL_SERVER_ERROR")
}

pub fn not_found() -> ErrorBuilder {
    ErrorBuilder::new(StatusCode::NOT_FOUND)
        .type_("/probs/not-found")
        .title("Resource Not Found")
        .value("error_code", "NOT_FOUND")
}

pub fn bad_request() -> ErrorBuilder {
    ErrorBuilder::new(StatusCode::BAD_REQUEST)
        .type_("/probs/bad-request")
        .title("Bad Request")
        .detail("The request was malformed or invalid")
        .value("error_code", "BAD_REQUEST")
}
