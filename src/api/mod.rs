//! REST surface: every route lives under `/api` and answers with JSON,
//! except the shopping-list download.

use std::convert::Infallible;

use serde::{de::DeserializeOwned, Serialize};
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{self, Reply, Response},
    Filter,
};

use crate::{context::Context, form::Form};

mod auth;
mod ingredients;
mod recipes;
mod rejection;
mod tags;
mod users;

pub use rejection::handle_rejection;

const BODY_LIMIT: u64 = 256 * 1024;

pub fn routes(ctx: Context) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let api = auth::routes(ctx.clone())
        .or(users::routes(ctx.clone()))
        .unify()
        .or(tags::routes(ctx.clone()))
        .unify()
        .or(ingredients::routes(ctx.clone()))
        .unify()
        .or(recipes::routes(ctx));

    warp::path("api")
        .and(api.unify())
        .recover(handle_rejection)
        .unify()
        .with(warp::log("recipe_share::api"))
}

pub(crate) fn json_reply<T: Serialize>(value: &T, status: StatusCode) -> Response {
    reply::with_status(reply::json(value), status).into_response()
}

pub(crate) fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub(crate) fn json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(BODY_LIMIT).and(warp::body::json())
}

/// Raw query string as a [`Form`]; a missing query string is an empty form.
pub(crate) fn with_form() -> impl Filter<Extract = (Form,), Error = Rejection> + Clone {
    warp::query::raw()
        .or(warp::any().map(String::new))
        .unify()
        .and_then(|raw: String| async move { Form::from_query(&raw).map_err(Rejection::from) })
}
