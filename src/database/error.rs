use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde_json::{json, Value};
use warp::{
    http::StatusCode,
    reject::Reject,
    reply::{self, Reply, Response},
};

/// Error kinds exposed over the API, each with a fixed status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlError {
    InvalidRequest,
    Unauthorized,
    InvalidSession,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

impl HtmlError {
    pub fn code(&self) -> u16 {
        match self {
            HtmlError::InvalidRequest => 400,
            HtmlError::Unauthorized | HtmlError::InvalidSession => 401,
            HtmlError::Forbidden => 403,
            HtmlError::NotFound => 404,
            HtmlError::MethodNotAllowed => 405,
            HtmlError::InternalServerError => 500,
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            kind: self,
            info: info.to_string(),
            fields: None,
        }
    }

    pub fn default(self) -> Error {
        let info = match self {
            HtmlError::InvalidRequest => "Invalid request",
            HtmlError::Unauthorized => "Authentication credentials were not provided.",
            HtmlError::InvalidSession => "Invalid token.",
            HtmlError::Forbidden => "You do not have permission to perform this action.",
            HtmlError::NotFound => "Not found.",
            HtmlError::MethodNotAllowed => "Method not allowed.",
            HtmlError::InternalServerError => "Internal server error.",
        };

        self.new(info)
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    kind: HtmlError,
    info: String,
    fields: Option<BTreeMap<String, Vec<String>>>,
}

impl Error {
    pub fn kind(&self) -> HtmlError {
        self.kind
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn fields(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        self.fields.as_ref()
    }

    /// 400 with a single field-level message.
    pub fn field(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::default();
        errors.add(field, message);
        errors.into_error()
    }

    pub fn body(&self) -> Value {
        match (&self.kind, &self.fields) {
            (_, Some(fields)) => json!(fields),
            (HtmlError::InvalidRequest, None) => json!({ "errors": self.info }),
            _ => json!({ "detail": self.info }),
        }
    }

    pub fn to_response(&self) -> Response {
        let status =
            StatusCode::from_u16(self.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        reply::with_status(reply::json(&self.body()), status).into_response()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.info, self.code())
    }
}

impl std::error::Error for Error {}
impl Reject for Error {}

/// Collects field-level validation messages before failing a request.
#[derive(Debug, Default)]
pub struct FieldErrors {
    inner: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: &str) {
        self.inner
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn into_error(self) -> Error {
        Error {
            kind: HtmlError::InvalidRequest,
            info: String::from("Validation failed"),
            fields: Some(self.inner),
        }
    }

    pub fn into_result(self) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }
        Err(self.into_error())
    }
}

pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => Self::new(format!(
                "{} ({})",
                e.message(),
                e.code().unwrap_or_default()
            )),
            sqlx::Error::RowNotFound => Self::new(String::from("RowNotFound")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            e => Self::new(format!("{e}")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        log::error!("Query failed: {}", value.info);
        HtmlError::InternalServerError.default()
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        HtmlError::InvalidRequest.new(&value.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}

#[cfg(test)]
mod tests {
    use warp::reject::Rejection;

    use super::*;

    #[test]
    fn converts_into_a_findable_rejection() {
        let rejection = Rejection::from(HtmlError::Forbidden.default());
        let error = rejection.find::<Error>().unwrap();

        assert_eq!(error.code(), 403);
        assert_eq!(error.info(), "You do not have permission to perform this action.");
    }

    #[test]
    fn relation_errors_use_errors_key() {
        let error = HtmlError::InvalidRequest.new("Recipe is not in the shopping cart");

        assert_eq!(error.code(), 400);
        assert_eq!(
            error.body(),
            json!({ "errors": "Recipe is not in the shopping cart" })
        );
    }

    #[test]
    fn field_errors_group_messages_per_field() {
        let mut errors = FieldErrors::default();
        errors.add("amount", "Ensure this value is greater than or equal to 1.");
        errors.add("amount", "This field is required.");
        errors.add("tags", "This list may not be empty.");

        let error = errors.into_result().unwrap_err();
        assert_eq!(error.code(), 400);
        assert_eq!(
            error.body(),
            json!({
                "amount": [
                    "Ensure this value is greater than or equal to 1.",
                    "This field is required."
                ],
                "tags": ["This list may not be empty."]
            })
        );
    }

    #[test]
    fn empty_field_errors_pass() {
        assert!(FieldErrors::default().into_result().is_ok());
    }

    #[test]
    fn auth_errors_use_detail_key() {
        let error = HtmlError::Unauthorized.default();

        assert_eq!(error.code(), 401);
        assert_eq!(
            error.body(),
            json!({ "detail": "Authentication credentials were not provided." })
        );
        assert_eq!(HtmlError::Forbidden.default().code(), 403);
    }

    #[test]
    fn query_errors_become_internal_errors() {
        let error: Error = QueryError::from(sqlx::Error::PoolTimedOut).into();

        assert_eq!(error.kind(), HtmlError::InternalServerError);
        assert_eq!(error.info(), "Internal server error.");
    }

    #[test]
    fn response_carries_status() {
        let response = HtmlError::NotFound.default().to_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
