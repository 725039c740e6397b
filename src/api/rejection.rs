use std::convert::Infallible;

use warp::{
    body::BodyDeserializeError,
    reject::{
        InvalidHeader, InvalidQuery, MethodNotAllowed, PayloadTooLarge, Rejection,
        UnsupportedMediaType,
    },
    reply::Response,
};

use crate::error::{Error, HtmlError};

/// Turns every rejection into the JSON error body clients expect.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let error = if let Some(error) = err.find::<Error>() {
        error.clone()
    } else if err.is_not_found() {
        HtmlError::NotFound.default()
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        Error::field("non_field_errors", &e.to_string())
    } else if err.find::<PayloadTooLarge>().is_some() {
        HtmlError::InvalidRequest.new("Request body is too large")
    } else if err.find::<UnsupportedMediaType>().is_some() {
        HtmlError::InvalidRequest.new("Unsupported media type")
    } else if err.find::<InvalidQuery>().is_some() || err.find::<InvalidHeader>().is_some() {
        HtmlError::InvalidRequest.default()
    } else if err.find::<MethodNotAllowed>().is_some() {
        HtmlError::MethodNotAllowed.default()
    } else {
        log::error!("Unhandled rejection: {err:?}");
        HtmlError::InternalServerError.default()
    };

    if error.code() >= 500 {
        log::warn!("Request failed: {error}");
    }

    Ok(error.to_response())
}
