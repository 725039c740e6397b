use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reject::Rejection,
    reply::Response,
    Filter,
};

use super::{json_body, json_reply, no_content};
use crate::{
    actions::{login_user, logout_user},
    context::Context,
    form::LoginPayload,
    jwt::SessionData,
    middleware::{with_context, with_session},
    schema::AuthToken,
};

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(json_body::<LoginPayload>())
        .and(with_context(ctx.clone()))
        .and_then(login);

    let logout = warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx))
        .and_then(logout);

    login.or(logout).unify().boxed()
}

async fn login(payload: LoginPayload, ctx: Context) -> Result<Response, Rejection> {
    let (email, password) = payload.validate()?;
    let auth_token = login_user(&ctx, &email, &password).await?;

    Ok(json_reply(&AuthToken { auth_token }, StatusCode::CREATED))
}

async fn logout(session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    logout_user(&ctx.pool, &session).await?;
    Ok(no_content())
}
